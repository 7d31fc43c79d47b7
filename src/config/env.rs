use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::tasks::dispatcher::DEFAULT_LINK_LIMIT;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub cache: CacheConfig,
    pub scan: ScanConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
    pub sweep_cron: String,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub link_limit: usize,
    pub rpc_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub db_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(300_000),
            max_entries: 1_000,
            sweep_cron: "0 * * * * *".to_string(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            link_limit: DEFAULT_LINK_LIMIT,
            rpc_timeout: Duration::from_millis(15_000),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid service url {value:?}: {source}")]
    InvalidUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}
