//! Checkout domain layer for the order-fulfillment core.
//!
//! This crate provides:
//! - `CheckoutService`, the order assembler that turns a validated cart
//!   into one atomic store commit
//! - conservation-pledge and rewards-accrual policy
//! - the payment gateway and notification trait boundaries with
//!   in-memory implementations
//! - `ConfirmationService` for applying at-least-once payment webhooks

pub mod cart;
pub mod confirmation;
pub mod conservation;
pub mod error;
pub mod gateway;
pub mod notifier;
pub mod rewards;
pub mod service;

pub use cart::{CartLine, CheckoutRequest};
pub use confirmation::ConfirmationService;
pub use error::CheckoutError;
pub use gateway::{GatewayRef, InMemoryPaymentGateway, PaymentGateway};
pub use notifier::{InMemoryNotifier, Notifier};
pub use service::{CheckoutConfig, CheckoutOutcome, CheckoutService};
