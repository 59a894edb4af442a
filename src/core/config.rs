//! Configuration management for retarget
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/retarget/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::{Result, TargetingError};
use crate::core::types::WaitPolicy;

/// Deepest shadow-root nesting any page walk follows
pub const MAX_SHADOW_DEPTH: usize = 5;

/// Shortest and longest accepted positional path
pub const MIN_PATH_DEPTH: usize = 10;
pub const MAX_PATH_DEPTH: usize = 15;

/// Main configuration for retarget
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Browser configuration
    pub browser: BrowserConfig,
    /// Page scan configuration
    #[serde(default)]
    pub scan: ScanConfig,
    /// Fallback executor configuration
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Agent behaviour configuration
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Browser automation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Session name for agent-browser
    pub session_name: String,
    /// Whether to run in headed mode (visible browser)
    pub headed: bool,
    /// Navigation timeout in ms
    pub navigation_timeout_ms: u64,
    /// Delay after navigation so client-side rendering can settle
    pub settle_delay_ms: u64,
    /// Load state that ends a navigation
    #[serde(default)]
    pub wait_policy: WaitPolicy,
}

/// DOM scan and descriptor builder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Emit structural locators (positional, relationship, attribute-based)
    pub structural: bool,
    /// Maximum shadow-root nesting walked, at most [`MAX_SHADOW_DEPTH`]
    pub max_shadow_depth: usize,
    /// Maximum segments in positional paths, clamped to 10..=15
    pub max_path_depth: usize,
    /// Maximum characters kept in a text snippet
    pub text_snippet_len: usize,
    /// Text selectors are only emitted below this length
    pub text_selector_max_len: usize,
    /// Pattern for ids and data values that look framework-generated
    pub random_id_pattern: String,
    /// Include invisible elements in the scan
    pub include_hidden: bool,
}

/// Fallback executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Budget for one selector or XPath attempt in ms
    pub strategy_timeout_ms: u64,
    /// Delay between locate polls inside one attempt in ms
    pub poll_interval_ms: u64,
    /// Try a mouse click at the last known box centre before fuzzy matching
    pub coordinate_fallback: bool,
    /// Fuzzy scores must be strictly greater than this
    pub fuzzy_threshold: u32,
    /// Maximum corner distance in px for the position bonus
    pub position_tolerance_px: f64,
    /// Duration of a `wait` step without an explicit value, in ms
    pub default_wait_ms: u64,
}

/// Agent behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Whether to show debug output
    pub debug: bool,
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            session_name: env::var("RETARGET_BROWSER_SESSION")
                .unwrap_or_else(|_| "retarget".to_string()),
            headed: env::var("RETARGET_BROWSER_HEADED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            navigation_timeout_ms: 30000,
            settle_delay_ms: env::var("RETARGET_SETTLE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1500),
            wait_policy: WaitPolicy::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            structural: true,
            max_shadow_depth: 5,
            max_path_depth: 12,
            text_snippet_len: 200,
            text_selector_max_len: 100,
            random_id_pattern: env::var("RETARGET_RANDOM_ID_PATTERN")
                .unwrap_or_else(|_| r"^[a-f0-9-]{20,}$".to_string()),
            include_hidden: false,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            strategy_timeout_ms: env::var("RETARGET_STRATEGY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            poll_interval_ms: 50,
            coordinate_fallback: true,
            fuzzy_threshold: 30,
            position_tolerance_px: 50.0,
            default_wait_ms: 1000,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            debug: env::var("RETARGET_DEBUG")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            log_level: "info".to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Per-strategy budget as a duration
    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_millis(self.strategy_timeout_ms)
    }

    /// Poll interval as a duration, never zero
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl ScanConfig {
    /// Shadow-root depth within the supported bound
    pub fn shadow_depth(&self) -> usize {
        self.max_shadow_depth.min(MAX_SHADOW_DEPTH)
    }

    /// Positional path depth within the supported range
    pub fn path_depth(&self) -> usize {
        self.max_path_depth.clamp(MIN_PATH_DEPTH, MAX_PATH_DEPTH)
    }
}

impl BrowserConfig {
    /// Navigation timeout as a duration
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Settle delay as a duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("retarget")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        if let Ok(config) = Self::load_from_file() {
            return config;
        }

        Self::default()
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(TargetingError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| TargetingError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| TargetingError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|e| {
                TargetingError::config(format!("Failed to create config dir: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TargetingError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| TargetingError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Save configuration and return the path
    pub fn save_and_get_path(&self) -> Result<PathBuf> {
        self.save()?;
        Ok(Self::config_file())
    }
}
