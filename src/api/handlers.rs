use axum::{extract::{Path, State}, http::StatusCode, Json};
use uuid::Uuid;
use validator::Validate;
use crate::api::auth::AuthUser;
use crate::api::dto::{CartRequest, PaypalCaptureRequest, ReconcileRequest, StatusUpdateRequest, StripeConfirmRequest};
use crate::api::error::ApiResponse;
use crate::api::AppState;
use crate::domain::aggregates::Order;
use crate::domain::status::{OrderGroupStatus, OrderItemStatus};
use crate::gateway::{GatewayOrder, PaymentIntent};
use crate::settlement::{CartPreview, ReconciliationResult, StatusChange};
use crate::{Result, SettlementError};

type ApiResult<T> = Result<Json<ApiResponse<T>>>;

pub async fn place_order(State(s): State<AppState>, AuthUser(actor): AuthUser, Json(r): Json<CartRequest>) -> Result<(StatusCode, Json<ApiResponse<Order>>)> {
    r.validate()?;
    let (address_id, cart) = r.into_cart();
    let order = s.settlement.place_order(actor.id, address_id, &cart).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Order placed", order))))
}

pub async fn preview_cart(State(s): State<AppState>, AuthUser(actor): AuthUser, Json(r): Json<CartRequest>) -> ApiResult<CartPreview> {
    r.validate()?;
    let (address_id, cart) = r.into_cart();
    let preview = s.settlement.preview_cart(actor.id, address_id, &cart).await?;
    Ok(Json(ApiResponse::ok("Cart priced", preview)))
}

pub async fn get_order(State(s): State<AppState>, AuthUser(actor): AuthUser, Path(id): Path<Uuid>) -> ApiResult<Order> {
    let order = s.settlement.get_order(&actor, id).await?;
    Ok(Json(ApiResponse::ok("Order found", order)))
}

pub async fn create_payment_intent(State(s): State<AppState>, AuthUser(actor): AuthUser, Path(id): Path<Uuid>) -> ApiResult<PaymentIntent> {
    let intent = s.checkout.create_payment_intent(&actor, id).await?;
    Ok(Json(ApiResponse::ok("Payment intent created", intent)))
}

pub async fn create_gateway_order(State(s): State<AppState>, AuthUser(actor): AuthUser, Path(id): Path<Uuid>) -> ApiResult<GatewayOrder> {
    let order = s.checkout.create_gateway_order(&actor, id).await?;
    Ok(Json(ApiResponse::ok("Gateway order created", order)))
}

pub async fn confirm_stripe(State(s): State<AppState>, AuthUser(actor): AuthUser, Path(id): Path<Uuid>, Json(r): Json<StripeConfirmRequest>) -> ApiResult<ReconciliationResult> {
    r.validate()?;
    let result = s.reconciler.confirm_stripe(&actor, id, r.payment_intent_id.trim()).await?;
    Ok(Json(reconciled(result)))
}

pub async fn capture_paypal(State(s): State<AppState>, AuthUser(actor): AuthUser, Path(id): Path<Uuid>, Json(r): Json<PaypalCaptureRequest>) -> ApiResult<ReconciliationResult> {
    r.validate()?;
    let result = s.reconciler.capture_paypal(&actor, id, r.gateway_order_id.trim()).await?;
    Ok(Json(reconciled(result)))
}

pub async fn reconcile(State(s): State<AppState>, AuthUser(actor): AuthUser, Path(id): Path<Uuid>, Json(r): Json<ReconcileRequest>) -> ApiResult<ReconciliationResult> {
    if !actor.is_admin() { return Err(SettlementError::Forbidden); }
    let result = s.reconciler.reconcile(id, &r.confirmation).await?;
    Ok(Json(reconciled(result)))
}

pub async fn update_group_status(State(s): State<AppState>, AuthUser(actor): AuthUser, Path(id): Path<Uuid>, Json(r): Json<StatusUpdateRequest>) -> ApiResult<StatusChange<OrderGroupStatus>> {
    r.validate()?;
    let status: OrderGroupStatus = r.status.parse().map_err(|e: crate::domain::status::UnknownStatus| SettlementError::Validation(e.to_string()))?;
    let change = s.fulfillment.update_order_group_status(&actor, id, status).await?;
    Ok(Json(ApiResponse::ok(format!("Order group is {}", change.to), change)))
}

pub async fn update_item_status(State(s): State<AppState>, AuthUser(actor): AuthUser, Path(id): Path<Uuid>, Json(r): Json<StatusUpdateRequest>) -> ApiResult<StatusChange<OrderItemStatus>> {
    r.validate()?;
    let status: OrderItemStatus = r.status.parse().map_err(|e: crate::domain::status::UnknownStatus| SettlementError::Validation(e.to_string()))?;
    let change = s.fulfillment.update_order_item_status(&actor, id, status).await?;
    Ok(Json(ApiResponse::ok(format!("Order item is {}", change.to), change)))
}

/// Declines are a completed reconciliation, reported with `success: false`.
fn reconciled(result: ReconciliationResult) -> ApiResponse<ReconciliationResult> {
    ApiResponse { success: result.success, message: result.message.clone(), code: None, data: Some(result) }
}
