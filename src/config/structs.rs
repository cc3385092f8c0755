use serde::{Deserialize, Serialize};

/// 静态配置（从 TOML 加载，启动时使用）
///
/// - server: 监听地址、端口、worker 数量
/// - database: 数据库连接与重试
/// - cache: zone / 候选广告缓存
/// - logging: 日志配置
/// - serving: 投放相关的超时与地址
/// - features: 功能开关
/// - events: 事件队列与计数器批量刷新
///
/// 启动后各服务只接收自己需要的那一部分，核心逻辑不读取全局配置。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub serving: ServingConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > 配置文件 > 默认值
    /// ENV 前缀：ADS，分隔符：__
    /// 示例：ADS__SERVER__PORT=9000
    pub fn load_from(path: &str) -> Self {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖
            .add_source(
                Environment::with_prefix("ADS")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_zone_ttl_secs")]
    pub zone_ttl_secs: u64,
    #[serde(default = "default_campaign_ttl_secs")]
    pub campaign_ttl_secs: u64,
    #[serde(default = "default_memory_capacity")]
    pub max_capacity: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_true")]
    pub enable_rotation: bool,
}

/// 投放配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingConfig {
    /// 跟踪像素 / 点击 URL 的前缀，例如 https://ads.example.com
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_vast_fetch_timeout_ms")]
    pub vast_fetch_timeout_ms: u64,
    #[serde(default = "default_bid_timeout_ms")]
    pub bid_timeout_ms: u64,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: u64,
    #[serde(default = "default_slow_request_ms")]
    pub slow_request_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// 功能开关
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_true")]
    pub vast: bool,
    #[serde(default = "default_true")]
    pub rtb: bool,
    #[serde(default = "default_true")]
    pub openrtb: bool,
    #[serde(default = "default_true")]
    pub ssp: bool,
}

impl FeaturesConfig {
    pub fn rtb_enabled(&self) -> bool {
        self.rtb && self.openrtb
    }
}

/// 事件队列配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

// ============================================================
// Default value functions
// ============================================================

fn default_true() -> bool {
    true
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_database_url() -> String {
    "adserver.db".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_zone_ttl_secs() -> u64 {
    300
}

fn default_campaign_ttl_secs() -> u64 {
    600
}

fn default_memory_capacity() -> u64 {
    10000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_vast_fetch_timeout_ms() -> u64 {
    1500
}

fn default_bid_timeout_ms() -> u64 {
    1000
}

fn default_max_candidates() -> u64 {
    20
}

fn default_slow_request_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    "AdServer/1.0 (VAST)".to_string()
}

fn default_flush_threshold() -> usize {
    50
}

fn default_flush_interval_secs() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    10000
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            zone_ttl_secs: default_zone_ttl_secs(),
            campaign_ttl_secs: default_campaign_ttl_secs(),
            max_capacity: default_memory_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: true,
        }
    }
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            vast_fetch_timeout_ms: default_vast_fetch_timeout_ms(),
            bid_timeout_ms: default_bid_timeout_ms(),
            max_candidates: default_max_candidates(),
            slow_request_ms: default_slow_request_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            vast: true,
            rtb: true,
            openrtb: true,
            ssp: true,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            flush_threshold: default_flush_threshold(),
            flush_interval_secs: default_flush_interval_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StaticConfig::default();
        assert_eq!(config.cache.zone_ttl_secs, 300);
        assert_eq!(config.cache.campaign_ttl_secs, 600);
        assert_eq!(config.serving.max_candidates, 20);
        assert_eq!(config.events.flush_threshold, 50);
        assert!(config.features.rtb_enabled());
    }

    #[test]
    fn test_sample_config_roundtrips() {
        let sample = StaticConfig::generate_sample_config();
        assert!(sample.contains("[serving]"));
        let parsed: StaticConfig = toml::from_str(&sample).expect("sample must parse");
        assert_eq!(parsed.serving.user_agent, "AdServer/1.0 (VAST)");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: StaticConfig = toml::from_str(
            r#"
            [features]
            openrtb = false

            [serving]
            base_url = "https://ads.example.com"
            "#,
        )
        .expect("partial config must parse");
        assert!(!parsed.features.rtb_enabled());
        assert!(parsed.features.vast);
        assert_eq!(parsed.serving.base_url, "https://ads.example.com");
        assert_eq!(parsed.serving.bid_timeout_ms, 1000);
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let config = StaticConfig::load_from("/nonexistent/adserver-config.toml");
        assert_eq!(config.events.queue_capacity, 10000);
    }
}
