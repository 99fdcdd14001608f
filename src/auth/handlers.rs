use actix_web::http::header::USER_AGENT;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::extractor::bearer_token;
use crate::db::models::UserSummary;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    #[serde(default)]
    pub mobile_number: String,
}

#[derive(Debug, Serialize)]
pub struct SendOtpResponse {
    pub success: bool,
    pub message: String,
}

pub async fn send_otp(
    req: web::Json<SendOtpRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received OTP request for: {}", req.mobile_number);
    match state.auth.send_otp(&req.mobile_number).await {
        Ok(()) => Ok(HttpResponse::Ok().json(SendOtpResponse {
            success: true,
            message: "OTP sent successfully".to_string(),
        })),
        Err(e) => {
            error!("OTP request failed for {}: {}", req.mobile_number, e);
            Err(e)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub mobile_number: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResponse {
    pub success: bool,
    pub message: String,
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

fn device_label(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

pub async fn verify_otp(
    http_req: HttpRequest,
    req: web::Json<VerifyOtpRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received OTP verification for: {}", req.mobile_number);
    let session = state
        .auth
        .verify_otp(&req.mobile_number, &req.code, device_label(&http_req))
        .await?;

    Ok(HttpResponse::Ok().json(VerifyOtpResponse {
        success: true,
        message: "OTP verified successfully".to_string(),
        user_id: session.user_id,
        access_token: session.tokens.access_token,
        refresh_token: session.tokens.refresh_token,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenResponse {
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserSummary,
}

/// Body wins over the `Authorization` header when both carry a token.
fn presented_refresh_token(
    http_req: &HttpRequest,
    body: Option<web::Json<RefreshTokenRequest>>,
) -> Option<String> {
    body.and_then(|b| b.into_inner().refresh_token)
        .filter(|t| !t.trim().is_empty())
        .or_else(|| bearer_token(http_req))
}

pub async fn refresh_token(
    http_req: HttpRequest,
    body: Option<web::Json<RefreshTokenRequest>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = presented_refresh_token(&http_req, body);
    let refreshed = state
        .auth
        .refresh(token.as_deref(), device_label(&http_req))
        .await?;

    Ok(HttpResponse::Ok().json(RefreshTokenResponse {
        message: "Token refreshed".to_string(),
        access_token: refreshed.tokens.access_token,
        refresh_token: refreshed.tokens.refresh_token,
        user: refreshed.user,
    }))
}

pub async fn logout(
    http_req: HttpRequest,
    body: Option<web::Json<RefreshTokenRequest>>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let token = presented_refresh_token(&http_req, body);
    state.auth.logout(token.as_deref()).await;

    HttpResponse::Ok().json(serde_json::json!({
        "message": "Logged out"
    }))
}
