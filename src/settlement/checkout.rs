//! Payment initiation for placed orders.

use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use crate::domain::aggregates::{Order, PaymentStatus};
use crate::gateway::{GatewayOrder, Gateways, PaymentIntent};
use crate::identity::Actor;
use crate::store::SettlementStore;
use crate::{Result, SettlementError};

#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn SettlementStore>,
    gateways: Gateways,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn SettlementStore>, gateways: Gateways) -> Self { Self { store, gateways } }

    /// Intent for the persisted order total. The client confirms it directly
    /// with the gateway and reports back through the reconciler.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn create_payment_intent(&self, actor: &Actor, order_id: Uuid) -> Result<PaymentIntent> {
        let gateway = self.gateways.stripe()?;
        let order = self.payable_order(actor, order_id).await?;
        let intent = gateway.create_payment_intent(order.total, &order.currency, order.id).await?;
        info!(%order_id, intent_id = %intent.id, amount = %order.total, "payment intent created");
        Ok(intent)
    }

    /// Gateway order the buyer approves before the server captures it.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn create_gateway_order(&self, actor: &Actor, order_id: Uuid) -> Result<GatewayOrder> {
        let gateway = self.gateways.paypal()?;
        let order = self.payable_order(actor, order_id).await?;
        let gateway_order = gateway.create_order(order.total, &order.currency, order.id).await?;
        info!(%order_id, gateway_order_id = %gateway_order.id, amount = %order.total, "gateway order created");
        Ok(gateway_order)
    }

    async fn payable_order(&self, actor: &Actor, order_id: Uuid) -> Result<Order> {
        let order = self.store.find_order(order_id).await?.ok_or(SettlementError::OrderNotFound(order_id))?;
        actor.ensure_owns(order.buyer_id)?;
        if order.payment_status != PaymentStatus::Pending {
            return Err(SettlementError::PaymentAlreadyFinalized { order_id, status: order.payment_status });
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{GatewayConfirmation, StripeConfirmation};
    use crate::gateway::GatewayError;
    use crate::publisher::EventPublisher;
    use crate::settlement::testing::{cart, Shop, StubPaypal, StubStripe};
    use crate::settlement::{OrderSettlementService, PaymentCaptureReconciler};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_intent_only_for_pending_orders() {
        let shop = Shop::new().await;
        let line = shop.line(Uuid::new_v4(), 1000, 1, 5).await;
        let order = OrderSettlementService::new(shop.store.clone(), EventPublisher::disabled(), "USD")
            .place_order(shop.buyer, shop.address, &cart(vec![line])).await.unwrap();
        let stub = Arc::new(StubStripe::new("succeeded", order.total.minor()));
        let gateways = Gateways { stripe: Some(stub.clone()), paypal: None };
        let checkout = CheckoutService::new(shop.store.clone(), gateways.clone());
        let buyer = Actor::buyer(shop.buyer);

        let intent = checkout.create_payment_intent(&buyer, order.id).await.unwrap();
        assert_eq!(intent.client_secret, "secret_abc");

        let paid = GatewayConfirmation::Stripe(StripeConfirmation {
            id: intent.id, status: "succeeded".into(), amount: order.total.minor(), currency: "usd".into(),
            order_reference: Some(order.id.to_string()),
        });
        PaymentCaptureReconciler::new(shop.store.clone(), EventPublisher::disabled(), gateways)
            .reconcile(order.id, &paid).await.unwrap();

        let err = checkout.create_payment_intent(&buyer, order.id).await.unwrap_err();
        assert!(matches!(err, SettlementError::PaymentAlreadyFinalized { status: PaymentStatus::Paid, .. }));
        assert_eq!(stub.intents.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gateway_order_for_other_buyer_forbidden() {
        let shop = Shop::new().await;
        let line = shop.line(Uuid::new_v4(), 1000, 1, 5).await;
        let order = OrderSettlementService::new(shop.store.clone(), EventPublisher::disabled(), "USD")
            .place_order(shop.buyer, shop.address, &cart(vec![line])).await.unwrap();
        let gateways = Gateways { stripe: None, paypal: Some(Arc::new(StubPaypal { status: None, value: String::new(), reference: None })) };
        let checkout = CheckoutService::new(shop.store.clone(), gateways);

        assert!(checkout.create_gateway_order(&Actor::buyer(shop.buyer), order.id).await.is_ok());
        let err = checkout.create_gateway_order(&Actor::buyer(Uuid::new_v4()), order.id).await.unwrap_err();
        assert!(matches!(err, SettlementError::Forbidden));
    }

    #[tokio::test]
    async fn test_missing_gateway_is_reported() {
        let shop = Shop::new().await;
        let checkout = CheckoutService::new(shop.store.clone(), Gateways::default());
        let err = checkout.create_payment_intent(&Actor::buyer(shop.buyer), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SettlementError::Gateway(GatewayError::NotConfigured("stripe"))));
    }
}
