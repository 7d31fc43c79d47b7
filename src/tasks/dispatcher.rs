use std::{collections::HashSet, sync::Arc};

use url::Url;

use crate::{
    badge::{BadgeBoard, BadgeEvent},
    cache::VerdictCache,
    db::link_stats::LinkStatsRepository,
    domain::{LinkVerdict, PageLinkStats, TabId, Verdict},
    infrastructure::notifier::AlertNotifier,
    service::{protocol::parse_verdict, ClassificationService, ServiceError},
};

pub const DEFAULT_LINK_LIMIT: usize = 50;

/// Outcome of one bulk link pass over a page.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub stats: PageLinkStats,
    pub links: Vec<LinkVerdict>,
}

pub struct ScanDispatcher {
    service: Arc<dyn ClassificationService>,
    cache: Arc<VerdictCache>,
    badges: Arc<BadgeBoard>,
    alerts: Arc<AlertNotifier>,
    link_stats: LinkStatsRepository,
}

impl ScanDispatcher {
    pub fn new(
        service: Arc<dyn ClassificationService>,
        cache: Arc<VerdictCache>,
        badges: Arc<BadgeBoard>,
        alerts: Arc<AlertNotifier>,
        link_stats: LinkStatsRepository,
    ) -> Self {
        Self {
            service,
            cache,
            badges,
            alerts,
            link_stats,
        }
    }

    /// Classifies the page shown in `tab_id` and repaints its badge.
    ///
    /// Non-HTTP(S) URLs clear the badge and return `Ok(None)` without touching
    /// the cache or the service. Failures leave the badge in `Error` and are
    /// not retried here.
    pub async fn scan(&self, url: &str, tab_id: TabId) -> Result<Option<Verdict>, ServiceError> {
        if !is_eligible(url) {
            tracing::debug!(target: "scan", tab = %tab_id, url, "not an http(s) page; skipping");
            self.badges.apply(tab_id, BadgeEvent::Ineligible);
            return Ok(None);
        }

        self.badges.apply(tab_id, BadgeEvent::ScanStarted);

        let verdict = match self.lookup(url).await {
            Ok(verdict) => verdict,
            Err(err) => {
                tracing::warn!(target: "scan", tab = %tab_id, url, error = %err, "scan failed");
                self.badges.apply(tab_id, BadgeEvent::Failed);
                return Err(err);
            }
        };

        self.badges.apply(tab_id, BadgeEvent::Resolved(verdict.risk));
        if verdict.is_malicious() {
            self.alerts.notify(tab_id, url, &verdict).await;
        }

        tracing::info!(
            target: "scan",
            tab = %tab_id,
            url,
            risk = verdict.risk.as_str(),
            score = verdict.score,
            "page classified"
        );
        Ok(Some(verdict))
    }

    /// Classifies the links found on `page_url`, one remote call at a time.
    ///
    /// `total` counts the distinct links offered, while only the first `limit`
    /// of them are looked up. Link lookups leave the page badge and alerts
    /// alone; failed or non-HTTP links are skipped.
    pub async fn scan_many(
        &self,
        page_url: &str,
        urls: &[String],
        tab_id: TabId,
        limit: usize,
    ) -> BatchReport {
        let mut seen = HashSet::with_capacity(urls.len());
        let unique: Vec<&str> = urls
            .iter()
            .map(String::as_str)
            .filter(|url| seen.insert(*url))
            .collect();

        let mut report = BatchReport {
            stats: PageLinkStats {
                total: u32::try_from(unique.len()).unwrap_or(u32::MAX),
                ..Default::default()
            },
            links: Vec::new(),
        };

        for url in unique.into_iter().take(limit) {
            if !is_eligible(url) {
                tracing::debug!(target: "scan", tab = %tab_id, url, "skipping non-http link");
                continue;
            }
            match self.lookup(url).await {
                Ok(verdict) => {
                    report.stats.record(verdict.risk);
                    report.links.push(LinkVerdict {
                        url: url.to_string(),
                        risk: verdict.risk,
                    });
                }
                Err(err) => {
                    tracing::warn!(target: "scan", tab = %tab_id, url, error = %err, "link scan failed");
                }
            }
        }

        if let Err(err) = self.link_stats.store(page_url, &report.stats).await {
            tracing::error!(target: "db", page = page_url, error = %err, "failed to persist link stats");
        }

        tracing::info!(
            target: "scan",
            tab = %tab_id,
            page = page_url,
            total = report.stats.total,
            scanned = report.stats.scanned(),
            malicious = report.stats.malicious,
            "link scan finished"
        );
        report
    }

    async fn lookup(&self, url: &str) -> Result<Verdict, ServiceError> {
        if let Some(entry) = self.cache.get(url) {
            tracing::debug!(target: "cache", key = %entry.key, "verdict cache hit");
            return Ok(entry.verdict);
        }

        let body = self.service.check_url(url).await?;
        let verdict = parse_verdict(&body)?;
        self.cache.put(url, verdict.clone());
        Ok(verdict)
    }
}

const SCANNABLE_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Only URLs that literally start with `http://` or `https://` (any case) and
/// parse as URLs are sent for classification.
pub fn is_eligible(url: &str) -> bool {
    let prefixed = SCANNABLE_SCHEMES.iter().any(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
    });
    prefixed && Url::parse(url).is_ok()
}
