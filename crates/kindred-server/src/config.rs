use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

use kindred_storage::MAX_BATCH_OPS;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Push gateway used for notifications
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// In-process trigger runtime
    #[serde(default)]
    pub triggers: TriggersConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Gateway validation
        match self.gateway.kind {
            GatewayKind::Fcm => {
                if self.gateway.project_id.as_deref().unwrap_or("").is_empty() {
                    return Err("gateway.kind=fcm requires gateway.project_id".into());
                }
                if self.gateway.access_token.as_deref().unwrap_or("").is_empty() {
                    return Err("gateway.kind=fcm requires gateway.access_token".into());
                }
            }
            GatewayKind::Log => {}
        }
        if self.gateway.timeout_ms == 0 {
            return Err("gateway.timeout_ms must be > 0".into());
        }
        // Trigger validation
        if self.triggers.hook_timeout_secs == 0 {
            return Err("triggers.hook_timeout_secs must be > 0".into());
        }
        if self.triggers.buffer_size == 0 {
            return Err("triggers.buffer_size must be > 0".into());
        }
        // Retention validation
        self.retention.validate()?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    /// Firebase Cloud Messaging HTTP v1
    Fcm,
    /// Log messages instead of sending them
    #[default]
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub kind: GatewayKind,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Overrides the FCM base URL
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_gateway_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_gateway_timeout_ms() -> u64 {
    10_000
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            kind: GatewayKind::default(),
            project_id: None,
            access_token: None,
            endpoint: None,
            timeout_ms: default_gateway_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggersConfig {
    /// Run handlers for documents created through this process
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Wall-clock budget of one handler invocation
    #[serde(default = "default_hook_timeout_secs")]
    pub hook_timeout_secs: u64,
    /// Per-subscriber queue of document events; writers wait when it is full
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_true() -> bool {
    true
}
fn default_hook_timeout_secs() -> u64 {
    60
}
fn default_buffer_size() -> usize {
    1024
}

impl TriggersConfig {
    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout_secs)
    }
}

impl Default for TriggersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hook_timeout_secs: default_hook_timeout_secs(),
            buffer_size: default_buffer_size(),
        }
    }
}

/// Retention sweeps. Each sweeper runs on its own interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Start the background scheduler
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Log what would be deleted without committing anything
    #[serde(default)]
    pub dry_run: bool,
    /// Operations per atomic batch, capped at the store maximum
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    #[serde(default = "SweeperConfig::interests")]
    pub interests: SweeperConfig,
    #[serde(default = "SweeperConfig::friendships")]
    pub friendships: SweeperConfig,
    #[serde(default)]
    pub chat_batches: ChatBatchSweeperConfig,
    #[serde(default = "SweeperConfig::processed_events")]
    pub processed_events: SweeperConfig,
}

fn default_batch_limit() -> usize {
    MAX_BATCH_OPS
}

impl RetentionConfig {
    fn validate(&self) -> Result<(), String> {
        if self.batch_limit < 2 || self.batch_limit > MAX_BATCH_OPS {
            return Err(format!(
                "retention.batch_limit must be between 2 and {MAX_BATCH_OPS}"
            ));
        }
        for (name, sweeper) in [
            ("interests", &self.interests),
            ("friendships", &self.friendships),
            ("processed_events", &self.processed_events),
        ] {
            if !sweeper.enabled {
                continue;
            }
            if sweeper.interval_hours == 0 {
                return Err(format!("retention.{name}.interval_hours must be > 0"));
            }
            if sweeper.window_days == 0 {
                return Err(format!("retention.{name}.window_days must be > 0"));
            }
        }
        if self.chat_batches.enabled {
            if self.chat_batches.interval_hours == 0 {
                return Err("retention.chat_batches.interval_hours must be > 0".into());
            }
            if self.chat_batches.window_hours == 0 {
                return Err("retention.chat_batches.window_hours must be > 0".into());
            }
        }
        Ok(())
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dry_run: false,
            batch_limit: default_batch_limit(),
            interests: SweeperConfig::interests(),
            friendships: SweeperConfig::friendships(),
            chat_batches: ChatBatchSweeperConfig::default(),
            processed_events: SweeperConfig::processed_events(),
        }
    }
}

/// Sweeper over a flat collection with a window in days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sweep_interval_hours")]
    pub interval_hours: u64,
    #[serde(default = "default_window_days")]
    pub window_days: u64,
    /// Decrement the counter each deleted record contributed to
    #[serde(default = "default_true")]
    pub compensate_counter: bool,
}

fn default_sweep_interval_hours() -> u64 {
    24
}
fn default_window_days() -> u64 {
    30
}

impl SweeperConfig {
    fn interests() -> Self {
        Self {
            enabled: true,
            interval_hours: default_sweep_interval_hours(),
            window_days: default_window_days(),
            compensate_counter: true,
        }
    }

    fn friendships() -> Self {
        Self::interests()
    }

    fn processed_events() -> Self {
        Self {
            window_days: 7,
            compensate_counter: false,
            ..Self::interests()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours * 3600)
    }

    pub fn window(&self) -> time::Duration {
        time::Duration::days(self.window_days as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatBatchSweeperConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_chat_interval_hours")]
    pub interval_hours: u64,
    #[serde(default = "default_chat_window_hours")]
    pub window_hours: u64,
}

fn default_chat_interval_hours() -> u64 {
    12
}
fn default_chat_window_hours() -> u64 {
    12
}

impl ChatBatchSweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours * 3600)
    }

    pub fn window(&self) -> time::Duration {
        time::Duration::hours(self.window_hours as i64)
    }
}

impl Default for ChatBatchSweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: default_chat_interval_hours(),
            window_hours: default_chat_window_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MaintenanceConfig {
    /// Permit full counter resets. Each reset still needs its confirmation text.
    #[serde(default)]
    pub allow_reset: bool,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "kindred.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., KINDRED__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("KINDRED")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
