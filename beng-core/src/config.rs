use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BengConfig {
    #[serde(default)]
    pub listener: ListenerConfig,

    #[serde(default)]
    pub translation: TranslationConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// HTTP listener address (client-facing).
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Number of worker threads/processes (0 = one per CPU).
    #[serde(default)]
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// UNIX-domain socket path of the translation server.
    #[serde(default = "default_translation_socket")]
    pub socket_path: PathBuf,

    /// Maximum number of entries kept in the translation cache.
    #[serde(default = "default_translation_cache_entries")]
    pub cache_max_entries: usize,

    /// Maximum summed size (bytes) of cached translation responses.
    #[serde(default = "default_translation_cache_bytes")]
    pub cache_max_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Largest response body eligible for caching.
    #[serde(default = "default_cache_max_body")]
    pub max_body_bytes: usize,

    /// Maximum size of the rubber (large-object) arena mapping.
    #[serde(default = "default_rubber_max_size")]
    pub rubber_max_size_bytes: usize,

    /// brutto_size : netto_size ratio that triggers auto-compaction.
    #[serde(default = "default_compaction_ratio")]
    pub compaction_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Idle connections kept per upstream address.
    #[serde(default = "default_idle_per_address")]
    pub idle_per_address_max: usize,

    /// Global cap across all addresses.
    #[serde(default = "default_idle_global_max")]
    pub idle_global_max: usize,

    /// Idle-connection expiry, seconds.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_read_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_write_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_backend_secs: u64,
    #[serde(default = "default_widget_body_secs")]
    pub widget_body_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub prometheus_path: String,
    #[serde(default = "default_metrics_addr")]
    pub prometheus_addr: SocketAddr,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            workers: 0,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            socket_path: default_translation_socket(),
            cache_max_entries: default_translation_cache_entries(),
            cache_max_bytes: default_translation_cache_bytes(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: default_cache_max_body(),
            rubber_max_size_bytes: default_rubber_max_size(),
            compaction_ratio: default_compaction_ratio(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_per_address_max: default_idle_per_address(),
            idle_global_max: default_idle_global_max(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_timeout_secs(),
            request_read_secs: default_request_timeout_secs(),
            request_write_secs: default_request_timeout_secs(),
            idle_backend_secs: default_idle_timeout_secs(),
            widget_body_secs: default_widget_body_secs(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            prometheus_enabled: true,
            prometheus_path: default_metrics_path(),
            prometheus_addr: default_metrics_addr(),
        }
    }
}

impl Default for BengConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            translation: TranslationConfig::default(),
            cache: CacheConfig::default(),
            pool: PoolConfig::default(),
            timeouts: TimeoutsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl BengConfig {
    /// Load configuration from a YAML file layered with `BENG_`-prefixed
    /// environment variables (`__` nesting separator), e.g.
    /// `BENG_LISTENER__HTTP_ADDR`.
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        } else {
            for default_path in &["beng-proxy.yaml", "/etc/beng-proxy/beng-proxy.yaml"] {
                if std::path::Path::new(default_path).exists() {
                    figment = figment.merge(Yaml::file(default_path));
                    break;
                }
            }
        }

        figment = figment.merge(Env::prefixed("BENG_").split("__"));

        let config: Self = figment.extract()?;
        Ok(config)
    }

    /// Resolve `workers == 0` to the number of available CPUs.
    pub fn effective_workers(&self) -> usize {
        if self.listener.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.listener.workers
        }
    }
}

fn default_http_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_translation_socket() -> PathBuf {
    PathBuf::from("/run/beng-proxy/translation.socket")
}

fn default_translation_cache_entries() -> usize {
    4096
}

fn default_translation_cache_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_cache_max_body() -> usize {
    256 * 1024
}

fn default_rubber_max_size() -> usize {
    256 * 1024 * 1024
}

fn default_compaction_ratio() -> f64 {
    3.0
}

fn default_idle_per_address() -> usize {
    16
}

fn default_idle_global_max() -> usize {
    256
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_widget_body_secs() -> u64 {
    10
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_metrics_addr() -> SocketAddr {
    "0.0.0.0:9090".parse().unwrap()
}

fn default_true() -> bool {
    true
}
