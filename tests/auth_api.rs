#[macro_use]
mod common;

use actix_web::{test, web, App};
use dropfleet_server::configure_routes;
use serde_json::{json, Value};

const PHONE: &str = "+919999900000";

#[actix_web::test]
async fn test_login_refresh_logout_flow() {
    let backends = common::backends();
    let otp = backends.otp.clone();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(backends.state.clone()))
            .configure(configure_routes),
    )
    .await;

    let verified = login!(app, otp, PHONE);
    assert_eq!(verified["success"], true);
    assert_eq!(verified["message"], "OTP verified successfully");
    assert!(verified["userId"].is_string());
    let access = verified["accessToken"].as_str().unwrap().to_string();
    let refresh = verified["refreshToken"].as_str().unwrap().to_string();

    // Code is single-use.
    assert!(otp.pending(PHONE).await.is_none());

    let resp = test::TestRequest::get()
        .uri("/user/me")
        .insert_header(("Authorization", format!("Bearer {}", access)))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let me: Value = test::read_body_json(resp).await;
    assert_eq!(me["mobile_number"], PHONE);
    assert_eq!(me["is_verified"], true);
    assert!(me.get("refresh_tokens").is_none());

    let resp = test::TestRequest::post()
        .uri("/auth/refresh-token")
        .set_json(json!({ "refreshToken": refresh }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let rotated: Value = test::read_body_json(resp).await;
    assert_eq!(rotated["message"], "Token refreshed");
    assert_eq!(rotated["user"]["mobile_number"], PHONE);
    let new_refresh = rotated["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(new_refresh, refresh);

    // The rotated-out token is no longer accepted.
    let resp = test::TestRequest::post()
        .uri("/auth/refresh-token")
        .set_json(json!({ "refreshToken": refresh }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 403);

    let resp = test::TestRequest::post()
        .uri("/auth/logout")
        .insert_header(("Authorization", format!("Bearer {}", new_refresh)))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Logged out");

    let resp = test::TestRequest::post()
        .uri("/auth/refresh-token")
        .set_json(json!({ "refreshToken": new_refresh }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 403);

    // Logging out again is harmless.
    let resp = test::TestRequest::post()
        .uri("/auth/logout")
        .set_json(json!({ "refreshToken": new_refresh }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_resend_while_pending_is_rejected() {
    let backends = common::backends();
    let otp = backends.otp.clone();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(backends.state.clone()))
            .configure(configure_routes),
    )
    .await;

    let send = || {
        test::TestRequest::post()
            .uri("/auth/send-otp")
            .set_json(json!({ "mobileNumber": PHONE }))
    };

    let resp = send().send_request(&app).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    let first = otp.pending(PHONE).await.unwrap().code;

    let resp = send().send_request(&app).await;
    assert_eq!(resp.status(), 429);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("already sent"));

    assert_eq!(otp.pending(PHONE).await.unwrap().code, first);
}

#[actix_web::test]
async fn test_wrong_codes_count_down_then_lock() {
    let backends = common::backends();
    let otp = backends.otp.clone();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(backends.state.clone()))
            .configure(configure_routes),
    )
    .await;

    let resp = test::TestRequest::post()
        .uri("/auth/send-otp")
        .set_json(json!({ "mobileNumber": PHONE }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);

    let code = otp.pending(PHONE).await.unwrap().code;
    let wrong = if code == "000000" { "111111" } else { "000000" };
    let verify = |c: &str| {
        test::TestRequest::post()
            .uri("/auth/verify-otp")
            .set_json(json!({ "mobileNumber": PHONE, "code": c }))
    };

    for expected_left in [2, 1] {
        let resp = verify(wrong).send_request(&app).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Incorrect OTP");
        assert_eq!(body["attemptsLeft"], expected_left);
    }

    let resp = verify(wrong).send_request(&app).await;
    assert_eq!(resp.status(), 403);
    assert!(otp.pending(PHONE).await.is_none());

    // Even the right code is gone now.
    let resp = verify(&code).send_request(&app).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "OTP expired or not found");
}

#[actix_web::test]
async fn test_request_validation() {
    let backends = common::backends();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(backends.state.clone()))
            .configure(configure_routes),
    )
    .await;

    let resp = test::TestRequest::post()
        .uri("/auth/send-otp")
        .set_json(json!({}))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Mobile number is required");

    let resp = test::TestRequest::post()
        .uri("/auth/verify-otp")
        .set_json(json!({ "mobileNumber": PHONE }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 400);

    let resp = test::TestRequest::post()
        .uri("/auth/send-otp")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
}

#[actix_web::test]
async fn test_token_errors() {
    let backends = common::backends();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(backends.state.clone()))
            .configure(configure_routes),
    )
    .await;

    let resp = test::TestRequest::post()
        .uri("/auth/refresh-token")
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Refresh token is required");

    let resp = test::TestRequest::post()
        .uri("/auth/refresh-token")
        .set_json(json!({ "refreshToken": "not-a-jwt" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);

    let resp = test::TestRequest::get().uri("/user/me").send_request(&app).await;
    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Access denied");

    let resp = test::TestRequest::get()
        .uri("/user/me")
        .insert_header(("Authorization", "Bearer garbage"))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_fourth_device_evicts_oldest_session() {
    let mut config = dropfleet_server::Settings::new_for_test().unwrap();
    config.rate_limit.max_requests = 10;
    let backends = common::backends_with(config);
    let otp = backends.otp.clone();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(backends.state.clone()))
            .configure(configure_routes),
    )
    .await;

    let mut refresh_tokens = Vec::new();
    for _ in 0..4 {
        let body = login!(app, otp, PHONE);
        refresh_tokens.push(body["refreshToken"].as_str().unwrap().to_string());
    }

    let refresh = |token: &str| {
        test::TestRequest::post()
            .uri("/auth/refresh-token")
            .set_json(json!({ "refreshToken": token }))
    };

    let resp = refresh(&refresh_tokens[0]).send_request(&app).await;
    assert_eq!(resp.status(), 403);

    for token in &refresh_tokens[1..] {
        let resp = refresh(token).send_request(&app).await;
        assert_eq!(resp.status(), 200);
    }
}

#[actix_web::test]
async fn test_send_rate_limit() {
    let backends = common::backends();
    let otp = backends.otp.clone();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(backends.state.clone()))
            .configure(configure_routes),
    )
    .await;

    // Three accepted requests per window, pending or not.
    for _ in 0..3 {
        login!(app, otp, PHONE);
    }

    let resp = test::TestRequest::post()
        .uri("/auth/send-otp")
        .set_json(json!({ "mobileNumber": PHONE }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 429);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("Too many"));
}
