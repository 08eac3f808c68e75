//! Shared types, error model, configuration, and collaborator seams for leadflow.
//!
//! This crate is the foundation depended on by all other leadflow crates.
//! It provides:
//! - [`LeadflowError`]: the unified error type
//! - Domain types ([`InputRecord`], [`Category`], [`ClassifiedRecord`], [`RunSummary`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)
//! - The [`LeadStore`], [`CategoryService`], and [`LeadSink`] traits

pub mod config;
pub mod error;
pub mod ports;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, OpenRouterConfig, RunConfig, WebhookConfig, config_dir,
    config_file_path, expand_home, init_config, load_config, load_config_from, resolve_api_key,
    validate_webhook_url,
};
pub use error::{LeadflowError, Result};
pub use ports::{CategoryService, LeadSink, LeadStore};
pub use types::{
    Category, CategoryCounts, ClassificationRequest, ClassifiedRecord, DeliveryPayload,
    FallbackReason, INITIAL_LEAD_STATUS, InputRecord, NewLead, RunSummary, StoredLead,
    normalize_email,
};
