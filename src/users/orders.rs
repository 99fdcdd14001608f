use serde::Deserialize;
use tracing::{debug, warn};

use crate::db::models::{Order, User};
use crate::error::{AppError, DatabaseError};

#[derive(Debug, Deserialize)]
pub struct NewOrderRequest {
    pub order: Order,
}

/// Status fields an order update may touch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderPatch {
    pub order_status: Option<String>,
    pub payment_status: Option<String>,
    pub payment_method: Option<String>,
    pub delivery_status: Option<String>,
    pub return_status: Option<String>,
}

impl OrderPatch {
    fn apply(self, order: &mut Order) {
        if let Some(v) = self.order_status {
            order.order_status = v;
        }
        if let Some(v) = self.payment_status {
            order.payment_status = v;
        }
        if let Some(v) = self.payment_method {
            order.payment_method = v;
        }
        if let Some(v) = self.delivery_status {
            order.delivery_status = v;
        }
        if let Some(v) = self.return_status {
            order.return_status = v;
        }
    }
}

pub fn add_order(user: &mut User, order: Order) -> Result<(), AppError> {
    if user.orders.iter().any(|o| o.order_id == order.order_id) {
        return Err(DatabaseError::Duplicate.into());
    }
    if order.items.is_empty() {
        warn!(user_id = %user.id, order_id = %order.order_id, "Order has no items");
    } else {
        debug!(order_id = %order.order_id, items = order.items.len(), payment_method = %order.payment_method, "Adding order");
    }
    user.orders.insert(0, order);
    Ok(())
}

pub fn update_order(user: &mut User, order_id: &str, patch: OrderPatch) -> Result<(), AppError> {
    let order = user
        .orders
        .iter_mut()
        .find(|o| o.order_id == order_id)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    patch.apply(order);
    Ok(())
}

pub fn has_active_cod_orders(user: &User) -> bool {
    user.orders.iter().any(|o| {
        o.payment_method.eq_ignore_ascii_case("cod") && o.order_status.eq_ignore_ascii_case("confirmed")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order(id: &str, method: &str, status: &str) -> Order {
        Order {
            order_id: id.to_string(),
            order_status: status.to_string(),
            payment_status: "not paid".to_string(),
            payment_method: method.to_string(),
            delivery_status: "pending".to_string(),
            return_status: "none".to_string(),
            items: Vec::new(),
            total_price: 99.0,
            order_date: Utc::now(),
            address: None,
        }
    }

    #[test]
    fn test_add_order_newest_first_and_rejects_duplicates() {
        let mut user = User::new("+919999900000".to_string());
        add_order(&mut user, order("A", "cod", "pending")).unwrap();
        add_order(&mut user, order("B", "upi", "pending")).unwrap();
        assert_eq!(user.orders[0].order_id, "B");

        let err = add_order(&mut user, order("A", "cod", "pending")).unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::Duplicate)));
        assert_eq!(user.orders.len(), 2);
    }

    #[test]
    fn test_update_order_patches_only_given_fields() {
        let mut user = User::new("+919999900000".to_string());
        add_order(&mut user, order("A", "cod", "pending")).unwrap();

        let patch = OrderPatch {
            order_status: Some("confirmed".into()),
            ..Default::default()
        };
        update_order(&mut user, "A", patch).unwrap();
        assert_eq!(user.orders[0].order_status, "confirmed");
        assert_eq!(user.orders[0].payment_method, "cod");

        let missing = update_order(&mut user, "Z", OrderPatch::default());
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_cod_detection_is_case_insensitive() {
        let mut user = User::new("+919999900000".to_string());
        add_order(&mut user, order("A", "COD", "pending")).unwrap();
        add_order(&mut user, order("B", "upi", "Confirmed")).unwrap();
        assert!(!has_active_cod_orders(&user));

        add_order(&mut user, order("C", "Cod", "CONFIRMED")).unwrap();
        assert!(has_active_cod_orders(&user));
    }
}
