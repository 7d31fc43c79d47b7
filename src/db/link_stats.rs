use std::collections::HashMap;

use anyhow::Result;
use sqlx::{sqlite::SqlitePool, FromRow};

use crate::domain::PageLinkStats;

#[derive(Clone)]
pub struct LinkStatsRepository {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct LinkStatsRow {
    page_url: String,
    total: i64,
    safe: i64,
    suspicious: i64,
    malicious: i64,
}

impl From<&LinkStatsRow> for PageLinkStats {
    fn from(row: &LinkStatsRow) -> Self {
        let count = |value: i64| u32::try_from(value).unwrap_or(0);
        Self {
            total: count(row.total),
            safe: count(row.safe),
            suspicious: count(row.suspicious),
            malicious: count(row.malicious),
        }
    }
}

impl LinkStatsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replaces whatever was recorded for `page_url`.
    pub async fn store(&self, page_url: &str, stats: &PageLinkStats) -> Result<()> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO page_link_stats
                (page_url, total, safe, suspicious, malicious, scanned_at)
                VALUES (?1, ?2, ?3, ?4, ?5, CURRENT_TIMESTAMP)"#,
        )
        .bind(page_url)
        .bind(i64::from(stats.total))
        .bind(i64::from(stats.safe))
        .bind(i64::from(stats.suspicious))
        .bind(i64::from(stats.malicious))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn all(&self) -> Result<HashMap<String, PageLinkStats>> {
        let rows = sqlx::query_as::<_, LinkStatsRow>(
            r#"SELECT page_url, total, safe, suspicious, malicious FROM page_link_stats"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| (row.page_url.clone(), PageLinkStats::from(row)))
            .collect())
    }
}
