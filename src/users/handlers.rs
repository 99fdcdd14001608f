use actix_web::{web, HttpRequest, HttpResponse};
use constant_time_eq::constant_time_eq;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::extractor::{bearer_token, AuthenticatedUser};
use crate::db::models::User;
use crate::error::{AppError, AuthError, DatabaseError};
use crate::users::addresses::{self, AddressInput, ProfileUpdate};
use crate::users::orders::{self, NewOrderRequest, OrderPatch};
use crate::AppState;

pub const INTERNAL_API_KEY_HEADER: &str = "x-internal-api-key";

fn is_internal_caller(req: &HttpRequest, state: &AppState) -> bool {
    let expected = &state.config.auth.internal_api_key;
    !expected.is_empty()
        && req
            .headers()
            .get(INTERNAL_API_KEY_HEADER)
            .and_then(|h| h.to_str().ok())
            .map_or(false, |key| constant_time_eq(key.as_bytes(), expected.as_bytes()))
}

pub async fn me(AuthenticatedUser(user): AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(user.public_view())
}

pub async fn update_details(
    AuthenticatedUser(user): AuthenticatedUser,
    update: web::Json<ProfileUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let update = update.into_inner();
    let user = state
        .users
        .update_user(
            user.id,
            Box::new(move |u: &mut User| addresses::apply_profile_update(u, update)),
        )
        .await?;

    info!(user_id = %user.id, "Profile updated");
    Ok(HttpResponse::Ok().json(user.public_view()))
}

pub async fn add_saved_address(
    AuthenticatedUser(user): AuthenticatedUser,
    input: web::Json<AddressInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let input = input.into_inner();
    let user = state
        .users
        .update_user(
            user.id,
            Box::new(move |u: &mut User| addresses::add_saved_address(u, input).map(|_| ())),
        )
        .await?;

    // Inserted at the front within the same update.
    Ok(HttpResponse::Ok().json(json!({
        "message": "Address added successfully",
        "new_address": user.saved_address.first(),
        "saved_address": user.saved_address,
        "selected_recent_address": user.selected_recent_address,
    })))
}

pub async fn update_saved_address(
    AuthenticatedUser(user): AuthenticatedUser,
    path: web::Path<Uuid>,
    input: web::Json<AddressInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let address_id = path.into_inner();
    let input = input.into_inner();
    let user = state
        .users
        .update_user(
            user.id,
            Box::new(move |u: &mut User| {
                addresses::update_saved_address(u, address_id, input).map(|_| ())
            }),
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Saved address updated successfully",
        "saved_address": user.saved_address,
        "selected_recent_address": user.selected_recent_address,
    })))
}

pub async fn delete_saved_address(
    AuthenticatedUser(user): AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let address_id = path.into_inner();
    let user = state
        .users
        .update_user(
            user.id,
            Box::new(move |u: &mut User| addresses::delete_saved_address(u, address_id)),
        )
        .await?;

    Ok(removed_response(&user))
}

pub async fn delete_recent_address(
    AuthenticatedUser(user): AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let address_id = path.into_inner();
    let user = state
        .users
        .update_user(
            user.id,
            Box::new(move |u: &mut User| addresses::delete_recent_address(u, address_id)),
        )
        .await?;

    Ok(removed_response(&user))
}

fn removed_response(user: &User) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Address removed successfully",
        "saved_address": user.saved_address,
        "multiple_recent_addresses": user.multiple_recent_addresses,
        "selected_recent_address": user.selected_recent_address,
    }))
}

pub async fn add_order(
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<NewOrderRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !is_internal_caller(&req, &state) {
        warn!("Order submission without a valid internal key");
        return Err(AuthError::Forbidden.into());
    }

    let user_id = path.into_inner();
    let order = body.into_inner().order;

    if let Some(owner) = state.users.find_by_order_id(&order.order_id).await? {
        warn!(order_id = %order.order_id, owner = %owner, "Order id already recorded");
        return Err(DatabaseError::Duplicate.into());
    }

    let order_id = order.order_id.clone();
    state
        .users
        .update_user(
            user_id,
            Box::new(move |u: &mut User| orders::add_order(u, order)),
        )
        .await?;

    info!(user_id = %user_id, order_id = %order_id, "Order added");
    Ok(HttpResponse::Ok().json(json!({ "message": "Order added successfully" })))
}

pub async fn update_order(
    req: HttpRequest,
    path: web::Path<String>,
    patch: web::Json<OrderPatch>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let user_id = if is_internal_caller(&req, &state) {
        state
            .users
            .find_by_order_id(&order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found for this order".to_string()))?
    } else {
        let token = bearer_token(&req).ok_or(AuthError::AccessDenied)?;
        state.auth.authenticate(&token).await?.id
    };

    let patch = patch.into_inner();
    let target = order_id.clone();
    state
        .users
        .update_user(
            user_id,
            Box::new(move |u: &mut User| orders::update_order(u, &target, patch)),
        )
        .await?;

    info!(user_id = %user_id, order_id = %order_id, "Order updated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Order updated successfully" })))
}

pub async fn has_active_cod_orders(AuthenticatedUser(user): AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "hasActiveCodOrders": orders::has_active_cod_orders(&user)
    }))
}
