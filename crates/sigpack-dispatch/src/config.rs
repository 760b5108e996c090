//! Configuration for the packer
//!
//! Sources, highest priority first:
//! 1. Environment variables (`SIGPACK_*`)
//! 2. The configuration file named by `SIGPACK_CONFIG` (TOML, YAML or JSON)
//! 3. Built-in defaults

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::{DEFAULT_ARTIFACT_DIR, DEFAULT_SYMBOL_PREFIX};
use crate::launch::{DEFAULT_BLOCKS_PER_MULTIPROCESSOR, DEFAULT_THREADS_PER_BLOCK};
use crate::telemetry::DEFAULT_LAUNCH_LOG_CAPACITY;

/// Which kernel backend the composition root should try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendPreference {
    Auto,
    Host,
    Dylib,
}

impl Default for BackendPreference {
    fn default() -> Self {
        Self::Auto
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PackerConfig {
    /// Preferred backend (auto, host, dylib)
    pub backend: BackendPreference,
    /// Fall back to the host backend when the preferred one is unavailable
    pub allow_host_fallback: bool,
    /// Directory holding `<op_kind>_kernel_artifact` files
    pub artifact_dir: PathBuf,
    /// Prefix of kernel entry symbols
    pub symbol_prefix: String,
    pub threads_per_block: u32,
    pub blocks_per_multiprocessor: u32,
    /// Overrides the multiprocessor count reported by the backend
    pub multiprocessor_count: Option<u32>,
    /// Log kernel attributes at info level after every launch
    pub debug_kernel_attributes: bool,
    /// Number of launches kept in the telemetry launch log
    pub launch_log_capacity: usize,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            allow_host_fallback: true,
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            symbol_prefix: DEFAULT_SYMBOL_PREFIX.to_string(),
            threads_per_block: DEFAULT_THREADS_PER_BLOCK,
            blocks_per_multiprocessor: DEFAULT_BLOCKS_PER_MULTIPROCESSOR,
            multiprocessor_count: None,
            debug_kernel_attributes: false,
            launch_log_capacity: DEFAULT_LAUNCH_LOG_CAPACITY,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from `SIGPACK_CONFIG` (if set) and apply environment overrides.
    pub fn load() -> Result<PackerConfig> {
        let mut config = match env::var("SIGPACK_CONFIG") {
            Ok(path) if !path.trim().is_empty() => {
                let path = PathBuf::from(path);
                info!("Loading sigpack configuration from: {}", path.display());
                Self::load_from_file(&path)?
            }
            _ => {
                debug!("No SIGPACK_CONFIG set, using defaults");
                PackerConfig::default()
            }
        };
        Self::apply_environment_variables(&mut config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<PackerConfig> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            _ => {
                if let Ok(config) = toml::from_str(&content) {
                    config
                } else if let Ok(config) = serde_yaml::from_str(&content) {
                    config
                } else if let Ok(config) = serde_json::from_str(&content) {
                    config
                } else {
                    return Err(anyhow::anyhow!(
                        "Could not parse config file {} (tried TOML, YAML, JSON)",
                        path.display()
                    ));
                }
            }
        };

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_environment_variables(config: &mut PackerConfig) -> Result<()> {
        if let Ok(backend) = env::var("SIGPACK_BACKEND") {
            config.backend = match backend.trim().to_ascii_lowercase().as_str() {
                "auto" => BackendPreference::Auto,
                "host" => BackendPreference::Host,
                "dylib" => BackendPreference::Dylib,
                other => {
                    return Err(anyhow::anyhow!(
                        "Invalid SIGPACK_BACKEND '{other}' (expected auto, host or dylib)"
                    ))
                }
            };
        }

        if let Ok(dir) = env::var("SIGPACK_ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(dir);
        }

        if let Ok(prefix) = env::var("SIGPACK_SYMBOL_PREFIX") {
            config.symbol_prefix = prefix;
        }

        if let Some(tpb) = env_u32("SIGPACK_TPB") {
            config.threads_per_block = tpb;
        }

        if let Some(blocks) = env_u32("SIGPACK_BLOCKS_PER_SM") {
            config.blocks_per_multiprocessor = blocks;
        }

        if let Some(count) = env_u32("SIGPACK_SM_COUNT") {
            config.multiprocessor_count = Some(count);
        }

        if let Some(flag) = env::var("SIGPACK_DEBUG_KERNELS")
            .ok()
            .and_then(|v| parse_bool(&v))
        {
            config.debug_kernel_attributes = flag;
        }

        Ok(())
    }
}

fn env_u32(name: &str) -> Option<u32> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            debug!("Ignoring {name}={raw}: expected a positive integer");
            None
        }
    }
}

/// Parse a boolean from environment variable text
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
