//! Authentication module for the delivery backend
//!
//! Phone-number OTP login, rotating refresh-token sessions with a
//! per-user device cap, and bearer access-token resolution.

pub mod extractor;
pub mod handlers;
pub mod otp_store;
mod rate_limit;
mod service;
pub mod session;
pub mod token;

pub use extractor::{bearer_token, AuthenticatedUser};
pub use otp_store::{InMemoryOtpStore, OtpStore, PendingOtp, RedisOtpStore};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use service::{generate_otp, AuthService, OtpPolicy, RefreshedSession, VerifiedSession};
pub use session::SessionPolicy;
pub use token::{Claims, TokenIssuer, TokenPair};
