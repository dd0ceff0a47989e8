//! TOML configuration file parsing.
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::ConfigError;

/// Deserialize a TOML file into `T`.
///
/// A missing file deserializes the empty document when `required` is
/// `false`, so every key falls back to its serde default. An explicitly
/// requested file must exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read (or is missing
/// while `required`), and [`ConfigError::Parse`] if it is not valid TOML for
/// `T`.
pub fn load_config<T: DeserializeOwned>(path: &Path, required: bool) -> Result<T, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => String::new(),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })
}
