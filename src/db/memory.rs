use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::User;
use crate::db::store::{user_not_found, UserMutation, UserStore};
use crate::error::AppError;

/// Process-local user store. A single write guard covers each
/// read-modify-write, which gives the same isolation as a row lock.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_or_create_by_phone(&self, mobile_number: &str) -> Result<User, AppError> {
        let mut users = self.users.write().await;

        if let Some(user) = users.values().find(|u| u.mobile_number == mobile_number) {
            return Ok(user.clone());
        }

        let user = User::new(mobile_number.to_string());
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_user_by_phone(&self, mobile_number: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.mobile_number == mobile_number).cloned())
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<Uuid>, AppError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.refresh_tokens.iter().any(|r| r.token == token))
            .map(|u| u.id))
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Uuid>, AppError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.orders.iter().any(|o| o.order_id == order_id))
            .map(|u| u.id))
    }

    async fn update_user(&self, id: Uuid, mutation: UserMutation) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        let current = users.get(&id).ok_or_else(user_not_found)?;

        // Mutate a copy so a failed mutation leaves nothing behind.
        let mut draft = current.clone();
        mutation(&mut draft)?;
        users.insert(id, draft.clone());
        Ok(draft)
    }
}
