//! Aggregates module
pub mod cart;
pub mod coupon;
pub mod inventory;
pub mod order;
pub mod payment;
pub mod shipping;

pub use cart::{AppliedCoupon, CartLineItem, CartSnapshot};
pub use coupon::Coupon;
pub use inventory::{decrement_stock, find_shortage, requested_by_size, InventoryShortfall, Size, StockDecrement, StockShortage};
pub use order::{Order, OrderError, OrderGroup, OrderGroupDraft, OrderItem, PaymentStatus, ShippingAddress};
pub use payment::{
    CaptureConflict, CaptureReport, CaptureTransition, ConfirmationError, ConfirmationMismatch, GatewayConfirmation, PaymentConfirmation,
    PaymentDetails, PaymentMethod, PaymentOutcome, PaypalAmount, PaypalConfirmation, StripeConfirmation,
};
pub use shipping::{SellerShipping, ShippingMethod, ShippingRate};
