//! Configuration resolution for Talita.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config dir>/talita/settings.json`)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Complete Talita configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub keys: KeyConfig,
    #[serde(default)]
    pub code: CodeConfig,
    #[serde(default)]
    pub contacts: ContactsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Local keypair settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct KeyConfig {
    #[serde(default)]
    pub strength: KeyStrength,
}

/// RSA modulus size used for the session keypair.
///
/// There is deliberately no variant below 2048 bits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrength {
    #[default]
    Rsa2048,
    Rsa3072,
    Rsa4096,
}

impl KeyStrength {
    /// Every accepted strength, weakest first.
    pub const ALL: [Self; 3] = [Self::Rsa2048, Self::Rsa3072, Self::Rsa4096];

    /// Modulus size in bits.
    pub const fn bits(self) -> usize {
        match self {
            Self::Rsa2048 => 2048,
            Self::Rsa3072 => 3072,
            Self::Rsa4096 => 4096,
        }
    }

    /// Map an exact modulus size back to a strength.
    pub fn from_bits(bits: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.bits() == bits)
    }
}

impl fmt::Display for KeyStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rsa{}", self.bits())
    }
}

impl FromStr for KeyStrength {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches("rsa");
        digits
            .parse::<usize>()
            .ok()
            .and_then(Self::from_bits)
            .ok_or_else(|| Error::Config(format!("Unsupported key strength: {s}")))
    }
}

/// QR code rendering settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeConfig {
    #[serde(default)]
    pub error_correction: ErrorCorrection,
    /// Edge length of the rendered code in pixels.
    #[serde(default = "default_size_px")]
    pub size_px: u32,
}

const fn default_size_px() -> u32 {
    400
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            error_correction: ErrorCorrection::default(),
            size_px: default_size_px(),
        }
    }
}

/// QR error-correction level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCorrection {
    Low,
    #[default]
    Medium,
    Quartile,
    High,
}

impl ErrorCorrection {
    /// Byte-mode data capacity of the largest QR symbol (version 40).
    pub const fn byte_capacity(self) -> usize {
        match self {
            Self::Low => 2953,
            Self::Medium => 2331,
            Self::Quartile => 1663,
            Self::High => 1273,
        }
    }
}

impl fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::Quartile => "quartile",
            Self::High => "high",
        };
        f.write_str(name)
    }
}

impl FromStr for ErrorCorrection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(Self::Low),
            "m" | "medium" => Ok(Self::Medium),
            "q" | "quartile" => Ok(Self::Quartile),
            "h" | "high" => Ok(Self::High),
            other => Err(Error::Config(format!(
                "Unknown error-correction level: {other}"
            ))),
        }
    }
}

/// Contact store settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContactsConfig {
    /// Override for the contact store file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ContactsConfig {
    /// The configured store path, falling back to the platform data dir.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(default_contacts_path)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// A settings file as written: every field optional, so a file only
/// overrides what it names.
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    #[serde(default)]
    keys: KeyOverlay,
    #[serde(default)]
    code: CodeOverlay,
    #[serde(default)]
    contacts: ContactsOverlay,
    #[serde(default)]
    log: LogOverlay,
}

#[derive(Debug, Default, Deserialize)]
struct KeyOverlay {
    strength: Option<KeyStrength>,
}

#[derive(Debug, Default, Deserialize)]
struct CodeOverlay {
    error_correction: Option<ErrorCorrection>,
    size_px: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ContactsOverlay {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LogOverlay {
    level: Option<String>,
    json: Option<bool>,
}

/// Load configuration with hierarchical resolution.
///
/// `explicit` must exist when given; the global file is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        let global = load_config_file(&global_path)?;
        merge_config(&mut config, global);
        debug!(path = %global_path.display(), "Loaded global config");
    }

    if let Some(path) = explicit {
        let file = load_config_file(path)?;
        merge_config(&mut config, file);
        debug!(path = %path.display(), "Loaded config file");
    }

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("talita").join("settings.json"))
}

/// Get the default contact store path.
pub fn default_contacts_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("talita").join("contacts.json"))
}

fn load_config_file(path: &Path) -> Result<ConfigOverlay> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, overlay: ConfigOverlay) {
    if let Some(strength) = overlay.keys.strength {
        base.keys.strength = strength;
    }
    if let Some(level) = overlay.code.error_correction {
        base.code.error_correction = level;
    }
    if let Some(size) = overlay.code.size_px {
        base.code.size_px = size;
    }
    if let Some(path) = overlay.contacts.path {
        base.contacts.path = Some(path);
    }
    if let Some(level) = overlay.log.level {
        base.log.level = level;
    }
    if let Some(json) = overlay.log.json {
        base.log.json = json;
    }
}

fn apply_env_overrides(config: &mut Config) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Apply `TALITA_*` overrides from `lookup`. Unparseable values are ignored.
fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(strength) = lookup("TALITA_KEY_BITS").and_then(|v| v.parse().ok()) {
        config.keys.strength = strength;
    }
    if let Some(level) = lookup("TALITA_EC_LEVEL").and_then(|v| v.parse().ok()) {
        config.code.error_correction = level;
    }
    if let Some(path) = lookup("TALITA_CONTACTS_PATH") {
        config.contacts.path = Some(PathBuf::from(path));
    }
    if let Some(level) = lookup("TALITA_LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(val) = lookup("TALITA_LOG_JSON") {
        config.log.json = matches!(val.as_str(), "1" | "true" | "yes");
    }
}
