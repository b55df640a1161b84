//! # PayFlow Shared Library
//!
//! This crate contains the types, models, and integrations shared by the
//! PayFlow API server: the merchant account ledger, user accounts,
//! authentication primitives, and the Stripe Connect client.
//!
//! ## Module Organization
//!
//! - `models`: Database models (users, merchant account ledger)
//! - `auth`: Authentication utilities (passwords, JWT, Axum middleware)
//! - `db`: Connection pool and migration runner
//! - `stripe`: Stripe Connect client, webhook signatures, mock client

pub mod auth;
pub mod db;
pub mod models;
pub mod stripe;

/// Current version of the PayFlow shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
