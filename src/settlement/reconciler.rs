//! Payment Capture Reconciler
//!
//! Both gateway flows end here. A confirmation is normalized, then applied in
//! one store transaction: the payment row is upserted by order id, PENDING moves
//! to PAID or FAILED, and the first move into PAID decrements stock for every
//! item. Replaying a confirmation refreshes the payment row and nothing else.
//! A confirmation only settles the order it was created for, and a success
//! must cover the order total exactly.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use crate::domain::aggregates::{CaptureReport, CaptureTransition, GatewayConfirmation, PaymentOutcome, PaymentStatus};
use crate::domain::events::{DomainEvent, InventoryEvent, OrderEvent};
use crate::gateway::Gateways;
use crate::identity::Actor;
use crate::publisher::EventPublisher;
use crate::store::SettlementStore;
use crate::{Result, SettlementError};

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    /// True when the order ends up PAID.
    pub success: bool,
    pub message: String,
    pub order_id: Uuid,
    pub payment_status: PaymentStatus,
    pub transition: CaptureTransition,
    pub back_ordered_items: Vec<Uuid>,
}

impl ReconciliationResult {
    fn from_report(report: &CaptureReport) -> Self {
        let message = match report.transition {
            CaptureTransition::MarkPaid => "Payment captured".to_string(),
            CaptureTransition::AlreadyPaid => "Payment already captured".to_string(),
            CaptureTransition::MarkFailed => format!("Payment failed: {}", report.payment.status),
            CaptureTransition::AlreadyFailed => "Payment already recorded as failed".to_string(),
        };
        let payment_status = report.transition.resulting_status();
        Self {
            success: payment_status == PaymentStatus::Paid,
            message,
            order_id: report.order_id,
            payment_status,
            transition: report.transition,
            back_ordered_items: report.shortfalls.iter().map(|s| s.order_item_id).collect(),
        }
    }
}

#[derive(Clone)]
pub struct PaymentCaptureReconciler {
    store: Arc<dyn SettlementStore>,
    publisher: EventPublisher,
    gateways: Gateways,
}

impl PaymentCaptureReconciler {
    pub fn new(store: Arc<dyn SettlementStore>, publisher: EventPublisher, gateways: Gateways) -> Self {
        Self { store, publisher, gateways }
    }

    /// Verifies a client-confirmed intent server side, then reconciles it.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn confirm_stripe(&self, actor: &Actor, order_id: Uuid, intent_id: &str) -> Result<ReconciliationResult> {
        self.authorize(actor, order_id).await?;
        let confirmation = self.gateways.stripe()?.retrieve_payment_intent(intent_id).await?;
        self.reconcile(order_id, &GatewayConfirmation::Stripe(confirmation)).await
    }

    /// Captures a buyer-approved gateway order, then reconciles the capture.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn capture_paypal(&self, actor: &Actor, order_id: Uuid, gateway_order_id: &str) -> Result<ReconciliationResult> {
        self.authorize(actor, order_id).await?;
        let confirmation = self.gateways.paypal()?.capture_order(gateway_order_id).await?;
        self.reconcile(order_id, &GatewayConfirmation::Paypal(confirmation)).await
    }

    /// Applies a gateway confirmation to the order exactly once.
    #[instrument(skip(self, confirmation), fields(gateway_payment_id = confirmation.gateway_payment_id()))]
    pub async fn reconcile(&self, order_id: Uuid, confirmation: &GatewayConfirmation) -> Result<ReconciliationResult> {
        let order = self.store.find_order(order_id).await?.ok_or(SettlementError::OrderNotFound(order_id))?;
        let payment = confirmation.normalize(&order.currency)?;
        if let Err(reason) = payment.verify_for(order_id, order.total, &order.currency) {
            error!(%order_id, gateway_payment_id = %payment.gateway_payment_id, %reason, "confirmation rejected for order");
            return Err(SettlementError::PaymentMismatch { order_id, reason });
        }

        let report = match self.store.capture_payment(order_id, &payment).await {
            Ok(report) => report,
            Err(e) => {
                if let SettlementError::PaymentAlreadyFinalized { status: PaymentStatus::Failed, .. } = &e {
                    if payment.outcome == PaymentOutcome::Succeeded {
                        error!(%order_id, gateway_payment_id = %payment.gateway_payment_id, "payment succeeded for an order already marked FAILED");
                    }
                }
                return Err(e);
            }
        };

        if let Some(previous) = &report.replaced_payment_id {
            warn!(%order_id, %previous, current = %report.payment.payment_intent_id, "payment id changed for order");
        }

        let mut events = Vec::new();
        match report.transition {
            CaptureTransition::MarkPaid => {
                info!(%order_id, amount = %payment.amount, "order paid");
                events.push(DomainEvent::Order(OrderEvent::Paid {
                    order_id, gateway_payment_id: payment.gateway_payment_id.clone(), amount: payment.amount,
                }));
            }
            CaptureTransition::MarkFailed => {
                info!(%order_id, gateway_status = %payment.gateway_status, "payment failed");
                events.push(DomainEvent::Order(OrderEvent::PaymentFailed {
                    order_id, gateway_payment_id: payment.gateway_payment_id.clone(), gateway_status: payment.gateway_status.clone(),
                }));
            }
            CaptureTransition::AlreadyPaid | CaptureTransition::AlreadyFailed => {
                info!(%order_id, transition = ?report.transition, "repeated confirmation, payment row refreshed");
            }
        }
        for shortfall in &report.shortfalls {
            error!(
                %order_id, order_item_id = %shortfall.order_item_id, size_id = %shortfall.size_id,
                requested = shortfall.requested, available = shortfall.available, shortfall = shortfall.shortfall,
                "paid units exceed stock, item back-ordered"
            );
            events.push(DomainEvent::Inventory(InventoryEvent::Shortfall(shortfall.clone())));
        }
        self.publisher.publish(events).await;

        Ok(ReconciliationResult::from_report(&report))
    }

    async fn authorize(&self, actor: &Actor, order_id: Uuid) -> Result<()> {
        let order = self.store.find_order(order_id).await?.ok_or(SettlementError::OrderNotFound(order_id))?;
        actor.ensure_owns(order.buyer_id)
    }
}
