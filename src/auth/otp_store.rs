//! Pending one-time codes, keyed by phone number.
//!
//! A pending code and its attempt counter live and die together: they are
//! created in one step, share one time-to-live and are removed in one step.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOtp {
    pub phone: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
}

impl PendingOtp {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Stores `code` with a zeroed attempt counter unless a code is already
    /// pending for `phone`. Returns `false` when one was.
    async fn put(&self, phone: &str, code: &str, ttl: Duration) -> Result<bool, AppError>;

    async fn get(&self, phone: &str) -> Result<Option<String>, AppError>;

    /// Atomically bumps the attempt counter. `None` if nothing is pending.
    async fn increment_attempts(&self, phone: &str) -> Result<Option<u32>, AppError>;

    /// Drops code and counter; returns whether anything was pending.
    async fn clear(&self, phone: &str) -> Result<bool, AppError>;
}

/// Single-process store with lazy expiry.
#[derive(Default)]
pub struct InMemoryOtpStore {
    entries: Arc<Mutex<HashMap<String, PendingOtp>>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pending(&self, phone: &str) -> Option<PendingOtp> {
        let mut entries = self.entries.lock().await;
        Self::live_entry(&mut entries, phone).cloned()
    }

    /// Drops every expired entry.
    pub async fn cleanup(&self) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, otp| !otp.is_expired());
    }

    fn live_entry<'a>(
        entries: &'a mut HashMap<String, PendingOtp>,
        phone: &str,
    ) -> Option<&'a mut PendingOtp> {
        if entries.get(phone).is_some_and(PendingOtp::is_expired) {
            entries.remove(phone);
        }
        entries.get_mut(phone)
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn put(&self, phone: &str, code: &str, ttl: Duration) -> Result<bool, AppError> {
        let mut entries = self.entries.lock().await;
        if Self::live_entry(&mut entries, phone).is_some() {
            return Ok(false);
        }

        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::InternalError(format!("Invalid OTP ttl: {}", e)))?;
        let now = Utc::now();
        entries.insert(
            phone.to_string(),
            PendingOtp {
                phone: phone.to_string(),
                code: code.to_string(),
                created_at: now,
                expires_at: now + ttl,
                attempts: 0,
            },
        );
        Ok(true)
    }

    async fn get(&self, phone: &str) -> Result<Option<String>, AppError> {
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, phone).map(|otp| otp.code.clone()))
    }

    async fn increment_attempts(&self, phone: &str) -> Result<Option<u32>, AppError> {
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, phone).map(|otp| {
            otp.attempts += 1;
            otp.attempts
        }))
    }

    async fn clear(&self, phone: &str) -> Result<bool, AppError> {
        let mut entries = self.entries.lock().await;
        let live = Self::live_entry(&mut entries, phone).is_some();
        entries.remove(phone);
        Ok(live)
    }
}

const PUT_IF_ABSENT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1], 'code', ARGV[1], 'attempts', 0)
redis.call('EXPIRE', KEYS[1], ARGV[2])
return 1
"#;

const INCREMENT_IF_PRESENT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return -1
end
return redis.call('HINCRBY', KEYS[1], 'attempts', 1)
"#;

/// Redis store: one hash per phone (`otp:{phone}` with `code` and `attempts`),
/// expired by Redis itself. Create and increment run as Lua scripts so each
/// is a single atomic step on the server.
#[derive(Clone)]
pub struct RedisOtpStore {
    conn_manager: ConnectionManager,
    put_script: Arc<Script>,
    increment_script: Arc<Script>,
}

impl RedisOtpStore {
    pub async fn new(redis_url: &str) -> Result<Self, AppError> {
        let client = Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await?;

        Ok(Self {
            conn_manager,
            put_script: Arc::new(Script::new(PUT_IF_ABSENT)),
            increment_script: Arc::new(Script::new(INCREMENT_IF_PRESENT)),
        })
    }

    fn otp_key(phone: &str) -> String {
        format!("otp:{}", phone)
    }
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    async fn put(&self, phone: &str, code: &str, ttl: Duration) -> Result<bool, AppError> {
        let mut conn = self.conn_manager.clone();
        let created: i64 = self
            .put_script
            .key(Self::otp_key(phone))
            .arg(code)
            .arg(ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;

        debug!(phone = %phone, created = created == 1, "Stored pending OTP in Redis");
        Ok(created == 1)
    }

    async fn get(&self, phone: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn_manager.clone();
        let code: Option<String> = conn.hget(Self::otp_key(phone), "code").await?;
        Ok(code)
    }

    async fn increment_attempts(&self, phone: &str) -> Result<Option<u32>, AppError> {
        let mut conn = self.conn_manager.clone();
        let attempts: i64 = self
            .increment_script
            .key(Self::otp_key(phone))
            .invoke_async(&mut conn)
            .await?;

        Ok(u32::try_from(attempts).ok())
    }

    async fn clear(&self, phone: &str) -> Result<bool, AppError> {
        let mut conn = self.conn_manager.clone();
        let removed: i64 = conn.del(Self::otp_key(phone)).await?;
        Ok(removed > 0)
    }
}
