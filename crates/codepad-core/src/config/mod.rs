//! Configuration module
//!
//! YAML configuration for the engine, the complexity advisor and the HTTP server.
//! Every section is optional; missing values fall back to the defaults in `types`.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

#[cfg(test)]
mod tests;

use crate::errors::EngineError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<CodepadConfig, EngineError> {
    ConfigLoader::from_file(path).await
}
