//! Felicity event engine
//!
//! Core of a campus fest platform: event lifecycle and phase-aware editing,
//! registrations and merchandise orders with atomic capacity and stock
//! guards, ticket issuance, order approval, and attendance scanning.

pub mod config;
pub mod database;
pub mod lifecycle;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{ErrorKind, FelicityError, Result};

// Re-export main components for easy access
pub use database::{DatabaseService, MemoryStore, Store};
pub use services::Engine;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
