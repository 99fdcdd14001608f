use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user document. Everything a user owns (addresses, orders, sessions)
/// lives inside it and is written back as one unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub mobile_number: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub primary_address: Option<PrimaryAddress>,
    #[serde(default)]
    pub saved_address: Vec<SavedAddress>,
    #[serde(default)]
    pub selected_recent_address: Option<SavedAddress>,
    #[serde(default)]
    pub multiple_recent_addresses: Vec<RecentAddress>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub login_dates: Vec<DateTime<Utc>>,
    pub account_created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub refresh_tokens: Vec<RefreshTokenRecord>,
}

impl User {
    pub fn new(mobile_number: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            mobile_number,
            name: String::new(),
            email: String::new(),
            primary_address: None,
            saved_address: Vec::new(),
            selected_recent_address: None,
            multiple_recent_addresses: Vec::new(),
            orders: Vec::new(),
            login_dates: Vec::new(),
            account_created_at: Utc::now(),
            is_verified: false,
            refresh_tokens: Vec::new(),
        }
    }

    /// The document as served to its owner: session tokens are never echoed back.
    pub fn public_view(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.remove("refresh_tokens");
        }
        value
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            mobile_number: self.mobile_number.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: Uuid,
    pub mobile_number: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub device: Option<String>,
}

impl RefreshTokenRecord {
    pub fn new(token: String, device: Option<String>) -> Self {
        Self {
            token,
            created_at: Utc::now(),
            device,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrimaryAddress {
    pub name: Option<String>,
    pub apartment: Option<String>,
    pub street: Option<String>,
    pub instructions: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedAddress {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub apartment: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub lat: f64,
    pub lon: f64,
    pub address: String,
    #[serde(default)]
    pub pincode: String,
    #[serde(default)]
    pub receiver_name: String,
    #[serde(default)]
    pub receiver_mobile: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentAddress {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub address: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub pincode: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&RecentAddress> for SavedAddress {
    fn from(recent: &RecentAddress) -> Self {
        Self {
            id: recent.id,
            name: String::new(),
            apartment: String::new(),
            street: String::new(),
            instructions: String::new(),
            kind: recent.kind.clone(),
            lat: recent.lat,
            lon: recent.lon,
            address: recent.address.clone(),
            pincode: recent.pincode.clone().unwrap_or_default(),
            receiver_name: String::new(),
            receiver_mobile: String::new(),
            updated_at: recent.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub order_status: String,
    pub payment_status: String,
    #[serde(default = "unknown_payment_method")]
    pub payment_method: String,
    pub delivery_status: String,
    #[serde(default = "no_return")]
    pub return_status: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub total_price: f64,
    #[serde(default = "Utc::now")]
    pub order_date: DateTime<Utc>,
    #[serde(default)]
    pub address: Option<OrderAddress>,
}

fn unknown_payment_method() -> String {
    "unknown".to_string()
}

fn no_return() -> String {
    "none".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub item_id: String,
    pub item_name: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderAddress {
    pub name: Option<String>,
    pub apartment: Option<String>,
    pub street: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub pincode: Option<String>,
    pub address: Option<String>,
}
