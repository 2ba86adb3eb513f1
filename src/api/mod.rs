//! HTTP surface.

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;

use axum::{routing::{get, post, put}, Json, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::gateway::Gateways;
use crate::publisher::EventPublisher;
use crate::settlement::{CheckoutService, FulfillmentService, OrderSettlementService, PaymentCaptureReconciler};
use crate::store::SettlementStore;

pub use error::ApiResponse;

#[derive(Clone)]
pub struct AppState {
    pub settlement: OrderSettlementService,
    pub checkout: CheckoutService,
    pub reconciler: PaymentCaptureReconciler,
    pub fulfillment: FulfillmentService,
}

impl AppState {
    pub fn new(store: Arc<dyn SettlementStore>, publisher: EventPublisher, gateways: Gateways, currency: &str) -> Self {
        Self {
            settlement: OrderSettlementService::new(store.clone(), publisher.clone(), currency),
            checkout: CheckoutService::new(store.clone(), gateways.clone()),
            reconciler: PaymentCaptureReconciler::new(store.clone(), publisher.clone(), gateways),
            fulfillment: FulfillmentService::new(store, publisher),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "marketplace-settlement"})) }))
        .route("/api/v1/cart/preview", post(handlers::preview_cart))
        .route("/api/v1/orders", post(handlers::place_order))
        .route("/api/v1/orders/:id", get(handlers::get_order))
        .route("/api/v1/orders/:id/payment-intent", post(handlers::create_payment_intent))
        .route("/api/v1/orders/:id/paypal-order", post(handlers::create_gateway_order))
        .route("/api/v1/orders/:id/payments/stripe", post(handlers::confirm_stripe))
        .route("/api/v1/orders/:id/payments/paypal", post(handlers::capture_paypal))
        .route("/api/v1/orders/:id/payments/reconcile", post(handlers::reconcile))
        .route("/api/v1/order-groups/:id/status", put(handlers::update_group_status))
        .route("/api/v1/order-items/:id/status", put(handlers::update_item_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
