//! # PayFlow API Server Library
//!
//! Core functionality for the PayFlow API server: merchant onboarding onto
//! Stripe Connect and reconciliation of the local account ledger.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Cross-cutting HTTP middleware
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
