use async_trait::async_trait;
use uuid::Uuid;

use crate::db::models::User;
use crate::error::AppError;

/// A change applied to a locked user document. Returning an error aborts the
/// whole update and leaves the stored document untouched.
pub type UserMutation = Box<dyn FnOnce(&mut User) -> Result<(), AppError> + Send>;

/// Document-style access to users.
///
/// `update_user` is the only write path for an existing user and must be
/// atomic with respect to every other `update_user` on the same id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the user for `mobile_number`, creating an unverified one if needed.
    async fn find_or_create_by_phone(&self, mobile_number: &str) -> Result<User, AppError>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn get_user_by_phone(&self, mobile_number: &str) -> Result<Option<User>, AppError>;

    /// Id of the user whose session list currently holds `token`.
    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<Uuid>, AppError>;

    /// Id of the user owning the order `order_id`.
    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Uuid>, AppError>;

    /// Read-modify-write of one user document. Fails with `NotFound` when the
    /// user does not exist.
    async fn update_user(&self, id: Uuid, mutation: UserMutation) -> Result<User, AppError>;
}

pub(crate) fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}
