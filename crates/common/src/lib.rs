//! NoteForge Common Library
//!
//! Shared code for the NoteForge services including:
//! - Database models and repository patterns
//! - Entitlement evaluation
//! - Upgrade workflow engine
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod entitlement;
pub mod errors;
pub mod metrics;
pub mod upgrade;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::Repository;
pub use entitlement::{evaluate, Entitlement};
pub use errors::{AppError, Result};
pub use upgrade::UpgradeWorkflow;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Note ceiling for tenants on the free plan
pub const FREE_PLAN_NOTE_LIMIT: i64 = 3;

/// Reason recorded when an upgrade request omits one
pub const DEFAULT_UPGRADE_REASON: &str =
    "Requesting upgrade to Pro plan for unlimited notes";
