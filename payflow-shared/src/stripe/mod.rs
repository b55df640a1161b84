/// Stripe Connect integration
///
/// Everything PayFlow knows about the payment processor lives here: the wire
/// types, the REST client behind the [`client::StripeApi`] trait, webhook
/// signature verification, and an in-memory mock used by the integration
/// tests.
///
/// # Modules
///
/// - [`types`]: Connected account, account link, and event payloads
/// - [`client`]: `StripeApi` trait and the reqwest-backed `StripeClient`
/// - [`webhook`]: `Stripe-Signature` verification with replay tolerance
/// - [`mock`]: Configurable in-memory `StripeApi` implementation

pub mod client;
pub mod mock;
pub mod types;
pub mod webhook;

pub use client::{StripeApi, StripeClient, StripeError};
pub use types::{Account, AccountLink, Event};
