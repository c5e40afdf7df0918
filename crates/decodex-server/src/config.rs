//! Server configuration

use decodex_core::EngineConfig;
use decodex_ngram::BigramConfig;
use serde::{Deserialize, Serialize};
use std::{
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server binding address
    pub bind: SocketAddr,

    /// CORS configuration
    pub cors: CorsConfig,

    /// Request limits
    pub limits: RequestLimits,

    /// Comparison engine settings
    pub engine: EngineConfig,

    /// Bigram backend settings
    pub backend: BigramConfig,

    /// Front-end page and assets
    pub frontend: FrontendConfig,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,

    /// Allowed origins; `*` allows any
    pub allowed_origins: Vec<String>,

    /// Max age for preflight requests, in seconds
    pub max_age: u64,
}

/// Request size and time limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLimits {
    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Time allowed for one comparison, in seconds
    pub request_timeout: u64,

    /// Comparisons allowed to run at once
    pub max_concurrent_requests: usize,
}

/// Front-end configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Directory holding `index.html` and its assets
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            cors: CorsConfig::default(),
            limits: RequestLimits::default(),
            engine: EngineConfig::default(),
            backend: BigramConfig::default(),
            frontend: FrontendConfig::default(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            max_age: 3600,
        }
    }
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1MB
            request_timeout: 120,
            max_concurrent_requests: 8,
        }
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from("./static"),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file, with `DECODEX_*` environment overrides
    pub fn from_file(path: &Path) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("DECODEX").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Save configuration to file
    pub fn to_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    /// Check values that would make the server unusable
    pub fn validate(&self) -> Result<(), String> {
        if self.limits.max_concurrent_requests == 0 {
            return Err("limits.max_concurrent_requests must be at least 1".to_string());
        }
        if self.limits.request_timeout == 0 {
            return Err("limits.request_timeout must be at least 1 second".to_string());
        }
        if self.engine.max_length_limit == 0 {
            return Err("engine.max_length_limit must be at least 1".to_string());
        }
        if self.engine.default_max_length == 0
            || self.engine.default_max_length > self.engine.max_length_limit
        {
            return Err(format!(
                "engine.default_max_length must be between 1 and {}",
                self.engine.max_length_limit
            ));
        }
        if !(self.backend.smoothing.is_finite() && self.backend.smoothing > 0.0) {
            return Err("backend.smoothing must be a positive number".to_string());
        }
        Ok(())
    }
}
