use std::{env, time::Duration};

use url::Url;

use super::env::{
    AppConfig, CacheConfig, ConfigError, DirectoryConfig, LoggingConfig, ScanConfig,
    ServiceConfig,
};

const DEFAULT_API_URL: &str = "http://localhost:5000";

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_url = env::var("PHISHGUARD_API_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let base_url = Url::parse(raw_url.trim()).map_err(|source| ConfigError::InvalidUrl {
            value: raw_url.clone(),
            source,
        })?;

        let service = ServiceConfig {
            base_url,
            request_timeout: parse_millis("REQUEST_TIMEOUT_MS", 10_000),
        };

        let cache_defaults = CacheConfig::default();
        let cache = CacheConfig {
            ttl: parse_millis("CACHE_TTL_MS", cache_defaults.ttl.as_millis() as u64),
            max_entries: parse_usize("CACHE_MAX_ENTRIES").unwrap_or(cache_defaults.max_entries),
            sweep_cron: env::var("CACHE_SWEEP_CRON")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(cache_defaults.sweep_cron),
        };
        if cache.max_entries == 0 {
            return Err(ConfigError::Zero("CACHE_MAX_ENTRIES"));
        }

        let scan = ScanConfig {
            link_limit: parse_usize("LINK_SCAN_LIMIT").unwrap_or(ScanConfig::default().link_limit),
            rpc_timeout: parse_millis("RPC_TIMEOUT_MS", 15_000),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            db_filename: env::var("DB_FILENAME").unwrap_or_else(|_| "phishguard.db".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        Ok(Self {
            service,
            cache,
            scan,
            directories,
            logging,
        })
    }
}

fn parse_usize(key: &str) -> Option<usize> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
}

fn parse_millis(key: &str, default: u64) -> Duration {
    Duration::from_millis(
        env::var(key)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(default),
    )
}
