//! # Flagdeck Shared Library
//!
//! Domain types, authentication primitives, access policy and persistence
//! used by the Flagdeck API server.
//!
//! ## Module Organization
//!
//! - `models`: users, projects, feature flags and their change sets
//! - `auth`: password hashing, tokens, request authentication, access policy
//! - `store`: repository traits with Postgres and in-memory backends
//! - `db`: Postgres pool and migrations

pub mod auth;
pub mod db;
pub mod models;
pub mod store;

/// Current version of the Flagdeck shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
