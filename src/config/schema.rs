use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::modes::{ModeDirs, ParseOptions, DEFAULT_DIAG_MODE_DIR, DEFAULT_MODE_DIR};

/// Main daemon configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Mode catalog settings
    pub modes: ModesConfig,
    /// Optional features
    pub features: FeaturesConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Mode catalog configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModesConfig {
    /// Directory with normal mode files
    pub dir: PathBuf,
    /// Directory with diagnostic mode files
    pub diag_dir: PathBuf,
    /// Load the diagnostic directory instead of the normal one
    pub diagnostic: bool,
}

impl Default for ModesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_MODE_DIR),
            diag_dir: PathBuf::from(DEFAULT_DIAG_MODE_DIR),
            diagnostic: false,
        }
    }
}

impl ModesConfig {
    pub fn dirs(&self) -> ModeDirs {
        ModeDirs {
            dir: self.dir.clone(),
            diag_dir: self.diag_dir.clone(),
        }
    }
}

/// Optional feature configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Read the tethering technology (`connman_tethering`) from mode files
    pub tethering: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            tethering: ParseOptions::default().tethering,
        }
    }
}

impl FeaturesConfig {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            tethering: self.tethering,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level (error, warn, info, verbose, debug, trace)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
