use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::models::User;
use crate::db::store::{user_not_found, UserMutation, UserStore};
use crate::error::{AppError, DatabaseError};

/// PostgreSQL-backed user store. Each user is one row holding a JSONB
/// document; updates lock the row for the duration of the mutation.
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| AppError::DatabaseError(DatabaseError::ConnectionError(e.to_string())))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>, AppError> {
        Ok(self.pool.as_ref().begin().await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn lock_user(
        id: Uuid,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<Option<User>, AppError> {
        let row: Option<(Json<User>,)> =
            sqlx::query_as("SELECT document FROM users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut **transaction)
                .await?;

        Ok(row.map(|(Json(user),)| user))
    }

    async fn write_user(
        user: &User,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET document = $2, updated_at = $3 WHERE id = $1")
            .bind(user.id)
            .bind(Json(user))
            .bind(Utc::now())
            .execute(&mut **transaction)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for DbOperations {
    async fn find_or_create_by_phone(&self, mobile_number: &str) -> Result<User, AppError> {
        let candidate = User::new(mobile_number.to_string());

        let inserted = sqlx::query(
            r#"
            INSERT INTO users (id, mobile_number, document, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (mobile_number) DO NOTHING
            "#,
        )
        .bind(candidate.id)
        .bind(&candidate.mobile_number)
        .bind(Json(&candidate))
        .bind(candidate.account_created_at)
        .execute(self.pool.as_ref())
        .await?;

        if inserted.rows_affected() == 1 {
            debug!(user_id = %candidate.id, "Created user for new mobile number");
            return Ok(candidate);
        }

        self.get_user_by_phone(mobile_number)
            .await?
            .ok_or_else(user_not_found)
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row: Option<(Json<User>,)> = sqlx::query_as("SELECT document FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(row.map(|(Json(user),)| user))
    }

    async fn get_user_by_phone(&self, mobile_number: &str) -> Result<Option<User>, AppError> {
        let row: Option<(Json<User>,)> =
            sqlx::query_as("SELECT document FROM users WHERE mobile_number = $1")
                .bind(mobile_number)
                .fetch_optional(self.pool.as_ref())
                .await?;

        Ok(row.map(|(Json(user),)| user))
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<Uuid>, AppError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM users
            WHERE document @> jsonb_build_object(
                'refresh_tokens', jsonb_build_array(jsonb_build_object('token', $1::text))
            )
            LIMIT 1
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|(id,)| id))
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Uuid>, AppError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM users
            WHERE document @> jsonb_build_object(
                'orders', jsonb_build_array(jsonb_build_object('orderId', $1::text))
            )
            LIMIT 1
            "#,
        )
        .bind(order_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|(id,)| id))
    }

    async fn update_user(&self, id: Uuid, mutation: UserMutation) -> Result<User, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let mut user = match Self::lock_user(id, &mut transaction).await? {
            Some(user) => user,
            None => {
                transaction.rollback().await?;
                return Err(user_not_found());
            }
        };

        if let Err(e) = mutation(&mut user) {
            transaction.rollback().await?;
            return Err(e);
        }

        match Self::write_user(&user, &mut transaction).await {
            Ok(()) => {
                transaction.commit().await?;
                Ok(user)
            }
            Err(e) => {
                warn!(user_id = %id, error = %e, "Rolling back user update");
                transaction.rollback().await?;
                Err(e)
            }
        }
    }
}
