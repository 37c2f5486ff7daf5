//! Configuration module for catalog-mirror
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use catalog_mirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Mirroring {}", config.source.service_index_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DownloadConfig, JsonFormatting, OutputConfig, SourceConfig,
    DEFAULT_CURSOR_SUFFIX, DEFAULT_PARALLEL_DOWNLOADS, DEFAULT_SERVICE_INDEX_URL,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::validate;
