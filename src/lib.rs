//! Gridboard
//!
//! Backend for a collaborative project board:
//! - File-backed document store for polymorphic project documents
//! - Tagged/heuristic wire codec shared between client and server
//! - Real-time multi-client update broadcast over WebSocket
//! - Background analytics aggregation and due-task notification

pub mod analytics;
pub mod api;
pub mod board;
pub mod error;
pub mod events;
pub mod notify;
pub mod store;
pub mod sync;

use analytics::Aggregator;
use anyhow::Result;
use events::EventBus;
use notify::{LogNotifier, NotificationScheduler, Notifier, WebhookNotifier};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use store::DocumentStore;
use sync::SessionRegistry;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub notifications: NotificationsYamlConfig,
    pub analytics: AnalyticsYamlConfig,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
    pub data_dir: String,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: "./data".into(),
        }
    }
}

/// Notification scheduler section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationsYamlConfig {
    /// Seconds between scans (the first scan runs at startup).
    pub interval_secs: u64,
    /// How far ahead of the due time a task is considered "due soon".
    pub lookahead_hours: i64,
    /// Webhook endpoint for notices. Absent → notices only reach the log.
    pub webhook_url: Option<String>,
}

impl Default for NotificationsYamlConfig {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            lookahead_hours: 24,
            webhook_url: None,
        }
    }
}

/// Analytics section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsYamlConfig {
    /// Time-to-live of the memoized report, in seconds.
    pub cache_ttl_secs: u64,
    /// Window used when a request does not specify one.
    pub default_window_days: u32,
}

impl Default for AnalyticsYamlConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 30,
            default_window_days: 30,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub data_dir: String,
    pub notify_interval_secs: u64,
    pub notify_lookahead_hours: i64,
    pub notify_webhook_url: Option<String>,
    pub analytics_ttl_secs: u64,
    pub analytics_window_days: u32,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        Ok(Self {
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.server.port),
            data_dir: std::env::var("DATA_DIR").unwrap_or(yaml.server.data_dir),
            notify_interval_secs: std::env::var("NOTIFY_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.notifications.interval_secs),
            notify_lookahead_hours: std::env::var("NOTIFY_LOOKAHEAD_HOURS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.notifications.lookahead_hours),
            notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .or(yaml.notifications.webhook_url),
            analytics_ttl_secs: std::env::var("ANALYTICS_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.analytics.cache_ttl_secs),
            analytics_window_days: std::env::var("ANALYTICS_WINDOW_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.analytics.default_window_days),
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Application state
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub bus: EventBus,
    pub registry: Arc<SessionRegistry>,
    pub aggregator: Arc<Aggregator>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state with all services initialized
    pub fn new(config: Config) -> Result<Self> {
        let store = Arc::new(DocumentStore::new(&config.data_dir)?);
        let aggregator = Arc::new(Aggregator::new(
            Arc::clone(&store),
            Duration::from_secs(config.analytics_ttl_secs),
        ));

        Ok(Self {
            store,
            bus: EventBus::default(),
            registry: Arc::new(SessionRegistry::new()),
            aggregator,
            config: Arc::new(config),
        })
    }
}

/// Build the notifier configured for this deployment.
pub fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    match &config.notify_webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(url)?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

/// Start the server: HTTP + WebSocket listener plus the notification
/// scheduler background task.
pub async fn start_server(config: Config) -> Result<()> {
    let port = config.server_port;
    let state = AppState::new(config)?;

    let notifier = build_notifier(&state.config)?;
    let scheduler = Arc::new(NotificationScheduler::new(
        Arc::clone(&state.store),
        notifier,
        Duration::from_secs(state.config.notify_interval_secs),
        state.config.notify_lookahead_hours,
    ));
    let _scan_loop = scheduler.spawn();

    let router = api::create_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("gridboard listening on {addr}");
    axum::serve(listener, router).await?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
