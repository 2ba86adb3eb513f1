//! Settlement pipeline: pricing a cart, persisting it as an order, taking
//! payment and moving fulfillment forward.

pub mod checkout;
pub mod discount;
pub mod fulfillment;
pub mod grouping;
pub mod reconciler;
pub mod service;
pub mod shipping;

pub use checkout::CheckoutService;
pub use fulfillment::{FulfillmentService, StatusChange};
pub use reconciler::{PaymentCaptureReconciler, ReconciliationResult};
pub use service::{CartPreview, OrderSettlementService};

#[cfg(test)]
pub(crate) mod testing {
    //! Seeded memory store and stub gateways shared by the service tests.

    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;
    use crate::domain::aggregates::{
        CartLineItem, CartSnapshot, PaypalAmount, PaypalConfirmation, ShippingAddress, ShippingRate, Size, StripeConfirmation,
    };
    use crate::domain::value_objects::{Money, Quantity};
    use crate::gateway::{CaptureGateway, GatewayError, GatewayOrder, IntentGateway, PaymentIntent};
    use crate::store::MemoryStore;

    pub struct Shop {
        pub store: std::sync::Arc<MemoryStore>,
        pub buyer: Uuid,
        pub address: Uuid,
    }

    impl Shop {
        pub async fn new() -> Self {
            let store = std::sync::Arc::new(MemoryStore::new());
            let (buyer, address) = (Uuid::new_v4(), Uuid::new_v4());
            store.put_address(ShippingAddress {
                id: address, user_id: buyer, recipient: "Ada Buyer".into(), line1: "1 Main St".into(),
                city: "Springfield".into(), postal_code: "12345".into(), country: "US".into(), ..Default::default()
            }).await;
            Self { store, buyer, address }
        }

        /// Adds a size with `stock` units and returns a cart line for it.
        pub async fn line(&self, seller_id: Uuid, price: u32, qty: u32, stock: i32) -> CartLineItem {
            let size_id = Uuid::new_v4();
            let variant_id = Uuid::new_v4();
            self.store.put_size(Size { id: size_id, variant_id, quantity: stock }).await;
            CartLineItem {
                product_id: Uuid::new_v4(), variant_id, size_id, seller_id, unit_price: Money::cents(price),
                quantity: Quantity::new(qty).unwrap(), weight_kg: None, shipping: ShippingRate::Fixed { fee: Money::cents(500) },
            }
        }
    }

    pub fn cart(items: Vec<CartLineItem>) -> CartSnapshot {
        CartSnapshot { items, coupons: vec![] }
    }

    /// Intent gateway answering every lookup with a fixed status.
    pub struct StubStripe {
        pub status: String,
        pub amount: i64,
        pub intents: AtomicUsize,
    }

    impl StubStripe {
        pub fn new(status: &str, amount: i64) -> Self {
            Self { status: status.into(), amount, intents: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl IntentGateway for StubStripe {
        async fn create_payment_intent(&self, _amount: Money, _currency: &str, order_id: Uuid) -> Result<PaymentIntent, GatewayError> {
            self.intents.fetch_add(1, Ordering::SeqCst);
            Ok(PaymentIntent { id: format!("pi_{}", order_id.simple()), client_secret: "secret_abc".into() })
        }

        /// Intents created above are named after their order, standing in for `metadata.order_id`.
        async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<StripeConfirmation, GatewayError> {
            let order_reference = intent_id.strip_prefix("pi_").and_then(|id| Uuid::parse_str(id).ok()).map(|id| id.to_string());
            Ok(StripeConfirmation {
                id: intent_id.into(), status: self.status.clone(), amount: self.amount, currency: "usd".into(), order_reference,
            })
        }
    }

    /// Capture gateway that either completes, declines or times out.
    pub struct StubPaypal {
        pub status: Option<String>,
        pub value: String,
        /// Order the gateway order was created for.
        pub reference: Option<Uuid>,
    }

    #[async_trait]
    impl CaptureGateway for StubPaypal {
        async fn create_order(&self, _amount: Money, _currency: &str, _order_id: Uuid) -> Result<GatewayOrder, GatewayError> {
            Ok(GatewayOrder { id: "5O190127TN364715T".into() })
        }

        async fn capture_order(&self, gateway_order_id: &str) -> Result<PaypalConfirmation, GatewayError> {
            let status = self.status.clone().ok_or(GatewayError::Timeout)?;
            let completed = status == "COMPLETED";
            let amount = completed.then(|| PaypalAmount { currency_code: "USD".into(), value: self.value.clone() });
            Ok(PaypalConfirmation {
                id: gateway_order_id.into(), amount, reference_id: self.reference.map(|r| r.to_string()),
                capture_status: completed.then(|| status.clone()), status,
            })
        }
    }
}
