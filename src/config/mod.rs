//! Configuration module for Lemma-Search
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use lemma_search::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Sites to index: {}", config.sites.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, IndexingConfig, MorphologyConfig, SearchConfig, SiteEntry, StorageConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
