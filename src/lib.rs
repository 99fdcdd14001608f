pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod notify;
pub mod users;

use actix_web::{web, HttpResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, InMemoryOtpStore, OtpStore, RateLimitConfig, RateLimiter, RedisOtpStore};
pub use db::{DbOperations, InMemoryUserStore, User, UserStore};
pub use notify::NotificationGateway;

use config::{OtpStoreKind, StorageBackend};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth: Arc<AuthService>,
    pub users: Arc<dyn UserStore>,
    pub db: Option<Arc<DbOperations>>,
    otp_memory: Option<Arc<InMemoryOtpStore>>,
}

impl AppState {
    /// Connects the configured backends. PostgreSQL migrations run here.
    pub async fn new(config: Settings) -> Result<Self> {
        let (users, db): (Arc<dyn UserStore>, Option<Arc<DbOperations>>) = match config.database.backend {
            StorageBackend::Postgres => {
                let db = Arc::new(
                    DbOperations::new_with_options(
                        &config.database.url,
                        config.database.max_connections,
                        Duration::from_secs(5),
                    )
                    .await?,
                );
                db.migrate().await?;
                info!("Connected to PostgreSQL, migrations applied");
                (db.clone(), Some(db))
            }
            StorageBackend::Memory => {
                info!("Using in-memory user store");
                (Arc::new(InMemoryUserStore::new()), None)
            }
        };

        let (otp_store, otp_memory): (Arc<dyn OtpStore>, Option<Arc<InMemoryOtpStore>>) =
            match config.otp.store {
                OtpStoreKind::Redis => (Arc::new(RedisOtpStore::new(&config.otp.redis_url).await?), None),
                OtpStoreKind::Memory => {
                    let store = Arc::new(InMemoryOtpStore::new());
                    (store.clone(), Some(store))
                }
            };

        let gateway = notify::gateway_from_config(&config.sms)?;

        let mut state = Self::from_parts(config, otp_store, gateway, users);
        state.db = db;
        state.otp_memory = otp_memory;
        Ok(state)
    }

    /// Assembles state around already-built stores and gateway.
    pub fn from_parts(
        config: Settings,
        otp_store: Arc<dyn OtpStore>,
        gateway: Arc<dyn NotificationGateway>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        let auth = AuthService::from_settings(&config, otp_store, gateway, users.clone());
        Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            users,
            db: None,
            otp_memory: None,
        }
    }

    /// Sweeps expired rate-limit windows and in-memory OTPs.
    pub async fn run_maintenance(&self) {
        if let Some(limiter) = self.auth.rate_limiter() {
            limiter.cleanup().await;
        }
        if let Some(otp) = &self.otp_memory {
            otp.cleanup().await;
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        if let Some(db) = &self.db {
            db.close().await;
        }
        Ok(())
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into());

    cfg.app_data(json_config)
        .route("/health", web::get().to(health_check))
        .service(
            web::scope("/auth")
                .route("/send-otp", web::post().to(auth::handlers::send_otp))
                .route("/verify-otp", web::post().to(auth::handlers::verify_otp))
                .route("/refresh-token", web::post().to(auth::handlers::refresh_token))
                .route("/logout", web::post().to(auth::handlers::logout)),
        )
        .service(
            web::scope("/user")
                .route("/me", web::get().to(users::handlers::me))
                .route("/update", web::put().to(users::handlers::update_details))
                .route("/saved-address", web::post().to(users::handlers::add_saved_address))
                .route("/saved-address/{id}", web::put().to(users::handlers::update_saved_address))
                .route("/saved-address/{id}", web::delete().to(users::handlers::delete_saved_address))
                .route("/recent-address/{id}", web::delete().to(users::handlers::delete_recent_address))
                .route("/has-active-cod-orders", web::get().to(users::handlers::has_active_cod_orders))
                .route("/orders/{order_id}", web::put().to(users::handlers::update_order))
                .route("/{user_id}/orders", web::post().to(users::handlers::add_order)),
        );
}
