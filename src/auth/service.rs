use chrono::Utc;
use constant_time_eq::constant_time_eq;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::otp_store::OtpStore;
use crate::auth::rate_limit::RateLimiter;
use crate::auth::session::SessionPolicy;
use crate::auth::token::{TokenIssuer, TokenPair};
use crate::config::Settings;
use crate::db::models::{RefreshTokenRecord, User, UserSummary};
use crate::db::store::UserStore;
use crate::error::{AppError, AuthError};
use crate::notify::NotificationGateway;

#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    /// Lifetime of a pending code and of its attempt counter.
    pub ttl: Duration,
    pub max_attempts: u32,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerifiedSession {
    pub user_id: Uuid,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone)]
pub struct RefreshedSession {
    pub tokens: TokenPair,
    pub user: UserSummary,
}

/// Orchestrates phone login: send code, verify code, rotate refresh tokens,
/// log out, and resolve access tokens to users.
pub struct AuthService {
    otp_store: Arc<dyn OtpStore>,
    gateway: Arc<dyn NotificationGateway>,
    users: Arc<dyn UserStore>,
    tokens: TokenIssuer,
    otp_policy: OtpPolicy,
    sessions: SessionPolicy,
    rate_limiter: Option<RateLimiter>,
}

pub fn generate_otp() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

fn require(value: &str, message: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(message.to_string()));
    }
    Ok(trimmed.to_string())
}

impl AuthService {
    pub fn new(
        otp_store: Arc<dyn OtpStore>,
        gateway: Arc<dyn NotificationGateway>,
        users: Arc<dyn UserStore>,
        tokens: TokenIssuer,
    ) -> Self {
        Self {
            otp_store,
            gateway,
            users,
            tokens,
            otp_policy: OtpPolicy::default(),
            sessions: SessionPolicy::default(),
            rate_limiter: None,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        otp_store: Arc<dyn OtpStore>,
        gateway: Arc<dyn NotificationGateway>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        let mut service = Self::new(otp_store, gateway, users, TokenIssuer::from_config(&settings.auth))
            .with_otp_policy(OtpPolicy {
                ttl: Duration::from_secs(settings.otp.ttl_seconds),
                max_attempts: settings.otp.max_attempts,
            })
            .with_session_policy(SessionPolicy::new(settings.auth.max_devices));

        if settings.rate_limit.enabled {
            service = service.with_rate_limiter(RateLimiter::new((&settings.rate_limit).into()));
        }
        service
    }

    pub fn with_otp_policy(mut self, policy: OtpPolicy) -> Self {
        self.otp_policy = policy;
        self
    }

    pub fn with_session_policy(mut self, policy: SessionPolicy) -> Self {
        self.sessions = policy;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.rate_limiter.as_ref()
    }

    pub async fn send_otp(&self, mobile_number: &str) -> Result<(), AppError> {
        let phone = require(mobile_number, "Mobile number is required")?;

        if let Some(limiter) = &self.rate_limiter {
            if !limiter.check_rate_limit(&phone).await {
                warn!(phone = %phone, "OTP request rate limited");
                return Err(AuthError::RateLimited.into());
            }
        }

        self.users.find_or_create_by_phone(&phone).await?;

        let code = generate_otp();
        if !self.otp_store.put(&phone, &code, self.otp_policy.ttl).await? {
            info!(phone = %phone, "OTP already pending, not resending");
            return Err(AuthError::OtpAlreadyPending.into());
        }

        let minutes = (self.otp_policy.ttl.as_secs() / 60).max(1);
        let message = format!("Your OTP is {}. It is valid for {} minutes.", code, minutes);

        if let Err(e) = self.gateway.send(&phone, &message).await {
            error!(phone = %phone, error = %e, "OTP dispatch failed, discarding pending code");
            if let Err(clear_err) = self.otp_store.clear(&phone).await {
                error!(phone = %phone, error = %clear_err, "Failed to discard undeliverable OTP");
            }
            return Err(match e {
                AppError::DependencyError(_) => e,
                other => AppError::DependencyError(format!("Failed to send OTP: {}", other)),
            });
        }

        info!(phone = %phone, "OTP sent");
        Ok(())
    }

    pub async fn verify_otp(
        &self,
        mobile_number: &str,
        code: &str,
        device: Option<String>,
    ) -> Result<VerifiedSession, AppError> {
        let missing = "Mobile number and OTP code are required";
        let phone = require(mobile_number, missing)?;
        let code = require(code, missing)?;

        let saved = self
            .otp_store
            .get(&phone)
            .await?
            .ok_or(AuthError::OtpExpiredOrNotFound)?;

        if !constant_time_eq(code.as_bytes(), saved.as_bytes()) {
            let attempts = self
                .otp_store
                .increment_attempts(&phone)
                .await?
                .ok_or(AuthError::OtpExpiredOrNotFound)?;

            if attempts >= self.otp_policy.max_attempts {
                // Concurrent losers that also overshot see the code as gone.
                if !self.otp_store.clear(&phone).await? {
                    return Err(AuthError::OtpExpiredOrNotFound.into());
                }
                warn!(phone = %phone, attempts, "OTP attempts exhausted, pending code purged");
                return Err(AuthError::OtpLocked.into());
            }

            let attempts_left = self.otp_policy.max_attempts - attempts;
            debug!(phone = %phone, attempts_left, "Incorrect OTP");
            return Err(AuthError::IncorrectOtp { attempts_left }.into());
        }

        // Only the request that actually removes the code may log in with it.
        if !self.otp_store.clear(&phone).await? {
            return Err(AuthError::OtpExpiredOrNotFound.into());
        }

        let user = self.users.find_or_create_by_phone(&phone).await?;
        let tokens = self.tokens.issue(user.id)?;

        let record = RefreshTokenRecord::new(tokens.refresh_token.clone(), device);
        let sessions = self.sessions;
        let user = self
            .users
            .update_user(
                user.id,
                Box::new(move |u: &mut User| {
                    u.is_verified = true;
                    u.login_dates.push(Utc::now());
                    let evicted = sessions.admit(&mut u.refresh_tokens, record);
                    if !evicted.is_empty() {
                        debug!(user_id = %u.id, evicted = evicted.len(), "Evicted oldest device sessions");
                    }
                    Ok(())
                }),
            )
            .await?;

        info!(user_id = %user.id, "OTP verified, session issued");
        Ok(VerifiedSession {
            user_id: user.id,
            tokens,
        })
    }

    pub async fn refresh(
        &self,
        refresh_token: Option<&str>,
        device: Option<String>,
    ) -> Result<RefreshedSession, AppError> {
        let presented = refresh_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?
            .to_string();

        let user_id = self.tokens.verify_refresh(&presented)?.user_id()?;
        let tokens = self.tokens.issue(user_id)?;

        let record = RefreshTokenRecord::new(tokens.refresh_token.clone(), device);
        let sessions = self.sessions;
        let old = presented.clone();
        let result = self
            .users
            .update_user(
                user_id,
                Box::new(move |u: &mut User| {
                    if !sessions.revoke(&mut u.refresh_tokens, &old) {
                        return Err(AppError::from(AuthError::TokenNotRecognized));
                    }
                    sessions.admit(&mut u.refresh_tokens, record);
                    Ok(())
                }),
            )
            .await;

        let user = match result {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => {
                warn!(user_id = %user_id, "Refresh token names a missing user");
                return Err(AuthError::TokenNotRecognized.into());
            }
            Err(e) => {
                if matches!(e, AppError::AuthError(AuthError::TokenNotRecognized)) {
                    warn!(user_id = %user_id, "Refresh token not in session list (revoked or reused)");
                }
                return Err(e);
            }
        };

        info!(user_id = %user.id, "Refresh token rotated");
        Ok(RefreshedSession {
            tokens,
            user: user.summary(),
        })
    }

    /// Removes the session holding `refresh_token`, if any. Store failures are
    /// logged, never reported to the caller.
    pub async fn logout(&self, refresh_token: Option<&str>) {
        let token = match refresh_token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => token.to_string(),
            None => return,
        };

        let user_id = match self.users.find_by_refresh_token(&token).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!("Logout with unknown refresh token");
                return;
            }
            Err(e) => {
                error!(error = %e, "Session lookup failed during logout");
                return;
            }
        };

        let sessions = self.sessions;
        let result = self
            .users
            .update_user(
                user_id,
                Box::new(move |u: &mut User| {
                    sessions.revoke(&mut u.refresh_tokens, &token);
                    Ok(())
                }),
            )
            .await;

        match result {
            Ok(_) | Err(AppError::NotFound(_)) => info!(user_id = %user_id, "Session logged out"),
            Err(e) => error!(user_id = %user_id, error = %e, "Failed to revoke session on logout"),
        }
    }

    pub async fn authenticate(&self, access_token: &str) -> Result<User, AppError> {
        let user_id = self.tokens.verify_access(access_token)?.user_id()?;
        self.users
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}
