//! Daemon configuration
//!
//! Read from a TOML file; every section and key is optional.
//!
//! ```toml
//! [modes]
//! dir = "/etc/usb-moded/dyn-modes"
//! diag_dir = "/etc/usb-moded/diag"
//! diagnostic = false
//!
//! [features]
//! tethering = true
//!
//! [logging]
//! level = "info"
//! ```

mod schema;

pub use schema::*;

use std::path::Path;
use tracing::info;

use crate::error::{AppError, Result};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/usb-moded/usb-moded.toml";

impl DaemonConfig {
    /// Load configuration from `path`
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Self::parse(&content)
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = DaemonConfig::load(&dir.path().join("none.toml")).unwrap();
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(config.modes.dir, PathBuf::from(crate::modes::DEFAULT_MODE_DIR));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file() {
        let config = DaemonConfig::parse(
            r#"
[modes]
diag_dir = "/tmp/diag"
diagnostic = true

[features]
tethering = true
"#,
        )
        .unwrap();

        assert_eq!(config.modes.dir, PathBuf::from(crate::modes::DEFAULT_MODE_DIR));
        assert_eq!(config.modes.dirs().select(true), Path::new("/tmp/diag"));
        assert!(config.modes.diagnostic);
        assert!(config.features.parse_options().tethering);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[modes\ndir = 3").unwrap();

        let err = DaemonConfig::load(&path).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
