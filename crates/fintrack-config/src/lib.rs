//! Configuration for the fintrack client.
//!
//! Provides TOML-based configuration with:
//! - The API server to talk to (`[api]`)
//! - Where persisted session state lives (`[storage]`)
//! - Optional JSON file logging (`[logging]`)
//! - Config file layering (user config + project-local overrides)
//! - Environment overrides (`FINTRACK_API_URL`)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, save_config,
    user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
