//! # Flagdeck API Server Library
//!
//! This library provides the HTTP surface of Flagdeck, a feature flag
//! management service.
//!
//! ## Modules
//!
//! - `app`: Application state, router builder and authentication layer
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
