use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePool;

use crate::domain::{Settings, SettingsPatch};

pub const AUTO_SCAN: &str = "autoScan";
pub const SHOW_NOTIFICATIONS: &str = "showNotifications";
pub const SCAN_LINKS: &str = "scanLinks";

/// Key-value settings store. Values are JSON encoded; unknown or missing keys
/// read as enabled.
#[derive(Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn flag(&self, key: &str) -> Result<Option<bool>> {
        let row: Option<(String,)> = sqlx::query_as(r#"SELECT value FROM settings WHERE key = ?1"#)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read setting {key}"))?;

        match row {
            Some((raw,)) => {
                let value = serde_json::from_str::<bool>(&raw)
                    .with_context(|| format!("setting {key} is not a boolean: {raw}"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Reads a flag, treating missing values and read failures as enabled.
    pub async fn flag_or_enabled(&self, key: &str) -> bool {
        match self.flag(key).await {
            Ok(value) => value.unwrap_or(true),
            Err(err) => {
                tracing::warn!(target: "db", error = %err, key, "setting unavailable; assuming enabled");
                true
            }
        }
    }

    pub async fn load(&self) -> Result<Settings> {
        let defaults = Settings::default();
        Ok(Settings {
            auto_scan: self.flag(AUTO_SCAN).await?.unwrap_or(defaults.auto_scan),
            show_notifications: self
                .flag(SHOW_NOTIFICATIONS)
                .await?
                .unwrap_or(defaults.show_notifications),
            scan_links: self.flag(SCAN_LINKS).await?.unwrap_or(defaults.scan_links),
        })
    }

    pub async fn set_flag(&self, key: &str, value: bool) -> Result<()> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO settings (key, value, updated_at)
                VALUES (?1, ?2, CURRENT_TIMESTAMP)"#,
        )
        .bind(key)
        .bind(serde_json::to_string(&value)?)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write setting {key}"))?;
        Ok(())
    }

    pub async fn update(&self, patch: SettingsPatch) -> Result<Settings> {
        let updates = [
            (AUTO_SCAN, patch.auto_scan),
            (SHOW_NOTIFICATIONS, patch.show_notifications),
            (SCAN_LINKS, patch.scan_links),
        ];
        for (key, value) in updates {
            if let Some(value) = value {
                self.set_flag(key, value).await?;
            }
        }
        self.load().await
    }
}
