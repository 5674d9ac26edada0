//! WinFs configuration

use crate::native::StdNativeFs;
use crate::path::PathNormalizer;
use crate::{FsError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WinFsConfig {
    pub path: PathConfig,
    pub service: ServiceConfig,
    pub native: NativeConfig,
    pub dispatch: DispatchConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub separator: Separator,
    /// Resolve relative paths against this directory instead of the cwd
    pub base_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Separator {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "\\")]
    Backslash,
    #[serde(rename = "/")]
    Slash,
}

impl Separator {
    pub fn as_char(self) -> char {
        match self {
            Separator::Auto => std::path::MAIN_SEPARATOR,
            Separator::Backslash => '\\',
            Separator::Slash => '/',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Route operations through the name service at all
    pub enabled: bool,
    /// Code page the service interprets names in
    pub code_page: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            code_page: crate::encoding::CP_UTF8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeConfig {
    /// Limit native calls to paths representable in this ANSI code page
    pub narrow_code_page: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Create directories through the name service (recursive-aware)
    pub service_mkdir: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when RUST_LOG is not set
    pub level: String,
    /// Also write JSON logs to the data directory
    pub file: bool,
    /// Delete log files older than this many days
    pub retain_days: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: false,
            retain_days: 7,
        }
    }
}

impl WinFsConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("Using default configuration");
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| FsError::Config(e.to_string()))?;
        tracing::info!("Configuration loaded from {:?}", path);
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| FsError::Config(e.to_string()))?;
        std::fs::write(path, content)?;

        tracing::info!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        ProjectDirs::from("com", "WinFs", "WinFs")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("./config.toml"))
    }

    /// Reject settings the platform cannot honor
    ///
    /// The separator must be one the OS accepts in paths: the native one,
    /// or `/` on Windows.
    pub fn validate(&self) -> Result<()> {
        let separator = self.path.separator.as_char();
        if separator == std::path::MAIN_SEPARATOR || (cfg!(windows) && separator == '/') {
            return Ok(());
        }
        Err(FsError::Config(format!(
            "path separator {:?} is not usable on this platform",
            separator
        )))
    }

    /// Normalizer described by the `[path]` section
    pub fn normalizer(&self) -> PathNormalizer {
        let normalizer = PathNormalizer::new().with_separator(self.path.separator.as_char());
        match &self.path.base_dir {
            Some(base) => normalizer.with_base(base.clone()),
            None => normalizer,
        }
    }

    /// Native filesystem described by the `[native]` section
    pub fn native(&self) -> Result<StdNativeFs> {
        match self.native.narrow_code_page {
            Some(code_page) => StdNativeFs::narrow(code_page),
            None => Ok(StdNativeFs::new()),
        }
    }
}
