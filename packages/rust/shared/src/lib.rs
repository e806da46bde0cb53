//! Shared types, error model, and configuration for RulesForge.
//!
//! This crate is the foundation depended on by all other RulesForge crates.
//! It provides:
//! - [`RulesForgeError`] — the unified error type
//! - Domain types ([`Category`], [`ParserStatus`], [`RunManifest`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, OutputConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{Result, RulesForgeError};
pub use types::{CURRENT_SCHEMA_VERSION, Category, ManifestEntry, ParserStatus, RunManifest};
