use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for bidflow
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BidflowConfig {
    /// REST API settings
    pub api: ApiConfig,
    /// Event feed settings
    pub realtime: RealtimeConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL of the bids API, e.g. http://localhost:8000/api/bids
    pub base_url: String,
    /// Bearer token (can be set via env var)
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout_seconds: u64,
    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,
    /// How long a fetched bid stays cached
    pub cache_ttl_seconds: u64,
    /// Page size used when walking list endpoints
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Sustained requests per second
    pub requests_per_second: u32,
    /// Burst capacity
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RealtimeConfig {
    /// WebSocket URL of the notification feed
    pub ws_url: String,
    /// Interval between `ping` messages
    pub heartbeat_interval_seconds: u64,
    /// Consecutive reconnect attempts before giving up
    pub max_reconnect_attempts: u32,
    /// First reconnect delay; doubles on every failed attempt
    pub reconnect_base_delay_ms: u64,
    /// Upper bound for a single reconnect delay
    pub reconnect_max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON log lines instead of plain text
    pub json_logs: bool,
}

impl Default for BidflowConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:8000/api/bids".to_string(),
                token: None, // Will be read from env var or bidflow.toml
                timeout_seconds: 30,
                rate_limit: RateLimitConfig {
                    requests_per_second: 5,
                    burst_capacity: 20,
                },
                cache_ttl_seconds: 30,
                page_size: 20,
            },
            realtime: RealtimeConfig {
                ws_url: "ws://localhost:8000/ws/notifications/".to_string(),
                heartbeat_interval_seconds: 30,
                max_reconnect_attempts: 5,
                reconnect_base_delay_ms: 1000,
                reconnect_max_delay_ms: 30_000,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: true,
            },
        }
    }
}

impl BidflowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (bidflow.toml, .bidflow-rc)
    /// 3. Environment variables (prefixed with BIDFLOW_, `__` between sections)
    pub fn load() -> Result<Self> {
        let defaults = toml::to_string(&Self::default())?;
        let mut builder =
            Config::builder().add_source(File::from_str(&defaults, FileFormat::Toml));

        if Path::new("bidflow.toml").exists() {
            builder = builder.add_source(File::with_name("bidflow"));
        }

        if Path::new(".bidflow-rc").exists() {
            builder = builder.add_source(File::with_name(".bidflow-rc").format(FileFormat::Toml));
        }

        // e.g. BIDFLOW_API__BASE_URL, BIDFLOW_REALTIME__WS_URL
        builder = builder.add_source(
            Environment::with_prefix("BIDFLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut bidflow_config: BidflowConfig = config.try_deserialize()?;

        if bidflow_config.api.token.is_none() {
            if let Ok(token) = std::env::var("BIDFLOW_API_TOKEN") {
                bidflow_config.api.token = Some(token);
            }
        }

        Ok(bidflow_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<BidflowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = BidflowConfig::load_env_file();
        BidflowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static BidflowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
