//! Shared configuration utilities for Splice binaries
//!
//! Generic YAML loading/saving plus the standard config locations. Each
//! binary defines its own config struct (with `#[serde(default)]` sections)
//! and loads it through here.
//!
//! ```ignore
//! use splice_core::config::{default_config_path, load_config};
//!
//! let config: ClientConfig = load_config(&default_config_path("client.yaml"));
//! ```

mod io;
mod paths;

pub use io::{load_config, read_config, save_config};
pub use paths::{config_dir, default_config_path};
