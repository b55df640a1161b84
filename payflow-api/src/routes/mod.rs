/// API route handlers
///
/// Organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Authentication endpoints (register, login, refresh)
/// - `connect`: Merchant account provisioning and status polling
/// - `webhooks`: Inbound signed processor events

pub mod auth;
pub mod connect;
pub mod health;
pub mod webhooks;
