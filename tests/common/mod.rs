#![allow(dead_code, unused_macros)]

use dropfleet_server::notify::ConsoleGateway;
use dropfleet_server::{AppState, InMemoryOtpStore, InMemoryUserStore, Settings};
use std::sync::Arc;

pub const INTERNAL_KEY: &str = "test_internal_key";

pub struct TestBackends {
    pub state: AppState,
    pub otp: Arc<InMemoryOtpStore>,
    pub users: Arc<InMemoryUserStore>,
}

pub fn backends_with(config: Settings) -> TestBackends {
    let otp = Arc::new(InMemoryOtpStore::new());
    let users = Arc::new(InMemoryUserStore::new());
    let state = AppState::from_parts(
        config,
        otp.clone(),
        Arc::new(ConsoleGateway::new()),
        users.clone(),
    );
    TestBackends { state, otp, users }
}

pub fn backends() -> TestBackends {
    backends_with(Settings::new_for_test().expect("Failed to load test config"))
}

/// Sends a code, reads it back from the store, verifies it, and evaluates
/// to the verify response body.
macro_rules! login {
    ($app:expr, $otp:expr, $phone:expr) => {{
        let resp = actix_web::test::TestRequest::post()
            .uri("/auth/send-otp")
            .set_json(serde_json::json!({ "mobileNumber": $phone }))
            .send_request(&$app)
            .await;
        assert_eq!(resp.status(), 200);

        let code = $otp.pending($phone).await.expect("code should be pending").code;
        let resp = actix_web::test::TestRequest::post()
            .uri("/auth/verify-otp")
            .insert_header(("user-agent", "integration-test"))
            .set_json(serde_json::json!({ "mobileNumber": $phone, "code": code }))
            .send_request(&$app)
            .await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = actix_web::test::read_body_json(resp).await;
        body
    }};
}
