use serde::{Deserialize, Serialize};

use crate::error::HalError;

/// Top-level configuration, loaded from glshim.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlShimConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Poll the native error flag after every replayed command
    #[serde(default = "default_true")]
    pub check_errors: bool,
    /// Emit a debug event for every replayed command
    #[serde(default)]
    pub log_commands: bool,
    /// Flush the context at the end of every submit
    #[serde(default = "default_true")]
    pub flush_on_submit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    /// Default framebuffer width in pixels
    #[serde(default = "default_width")]
    pub width: u32,
    /// Default framebuffer height in pixels
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_true")]
    pub vsync: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when GLSHIM_LOG is not set
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            check_errors: true,
            log_commands: false,
            flush_on_submit: true,
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            vsync: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl GlShimConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, HalError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, HalError> {
        let config: GlShimConfig =
            toml::from_str(content).map_err(|e| HalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file if it exists, otherwise return defaults.
    pub fn load_or_default(path: &str) -> Self {
        Self::load(path).unwrap_or_default()
    }

    pub fn to_toml(&self) -> Result<String, HalError> {
        toml::to_string_pretty(self).map_err(|e| HalError::Config(e.to_string()))
    }

    fn validate(&self) -> Result<(), HalError> {
        if self.surface.width == 0 || self.surface.height == 0 {
            return Err(HalError::Config(format!(
                "surface size must be non-zero, got {}x{}",
                self.surface.width, self.surface.height
            )));
        }
        Ok(())
    }
}

/// Returns the default config file path.
/// Search order:
/// 1. System-wide config: `/etc/glshim/glshim.toml`
/// 2. Local fallback: `./glshim.toml`
pub fn default_config_path() -> String {
    let system_path = "/etc/glshim/glshim.toml";
    if std::path::Path::new(system_path).exists() {
        return system_path.to_string();
    }
    "glshim.toml".to_string()
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

fn default_filter() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
