use std::{sync::Arc, time::Duration};

use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    badge::{BadgeBoard, BadgeEvent},
    config::ScanConfig,
    db::{
        link_stats::LinkStatsRepository,
        settings::{SettingsRepository, AUTO_SCAN, SCAN_LINKS},
    },
    domain::{InboundFrame, OutboundFrame, Request, SenderInfo, Settings, TabId},
    service::{protocol::ListResponse, ClassificationService, ListAction},
    tasks::dispatcher::{is_eligible, ScanDispatcher},
};

use super::outbox::Outbox;

/// Entry point for every message coming from the popup, the content script
/// and the browser shell's lifecycle hooks.
///
/// Request/response actions resolve to `Some(response)` within
/// [`ScanConfig::rpc_timeout`]. Lifecycle events and `linksExtracted` are
/// fire-and-forget and resolve to `None`; their remote calls are bounded by
/// the HTTP client timeout instead.
pub struct MessageRouter {
    dispatcher: Arc<ScanDispatcher>,
    service: Arc<dyn ClassificationService>,
    badges: Arc<BadgeBoard>,
    settings: SettingsRepository,
    link_stats: LinkStatsRepository,
    outbox: Outbox,
    config: ScanConfig,
}

impl MessageRouter {
    pub fn new(
        dispatcher: Arc<ScanDispatcher>,
        service: Arc<dyn ClassificationService>,
        badges: Arc<BadgeBoard>,
        settings: SettingsRepository,
        link_stats: LinkStatsRepository,
        outbox: Outbox,
        config: ScanConfig,
    ) -> Self {
        Self {
            dispatcher,
            service,
            badges,
            settings,
            link_stats,
            outbox,
            config,
        }
    }

    pub async fn handle(self: Arc<Self>, frame: InboundFrame) -> Option<Value> {
        let InboundFrame {
            id,
            sender,
            request,
        } = frame;
        let action = request.action();
        tracing::debug!(target: "router", action, id, "inbound message");

        let Some(limit) = self.timeout_for(&request) else {
            return self.dispatch(request, sender).await;
        };

        // The work keeps running past the deadline so its badge still settles.
        let router = self.clone();
        let work = tokio::spawn(async move { router.dispatch(request, sender).await });
        match tokio::time::timeout(limit, work).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                tracing::error!(target: "router", action, error = %err, "handler task failed");
                Some(error_response(format!("{action} failed")))
            }
            Err(_) => {
                tracing::warn!(target: "router", action, ?limit, "handler timed out");
                Some(error_response(format!("{action} timed out after {limit:?}")))
            }
        }
    }

    fn timeout_for(&self, request: &Request) -> Option<Duration> {
        match request {
            Request::LinksExtracted { .. }
            | Request::TabActivated { .. }
            | Request::TabUpdated { .. }
            | Request::NavigationCompleted { .. } => None,
            _ => Some(self.config.rpc_timeout),
        }
    }

    async fn dispatch(&self, request: Request, sender: Option<SenderInfo>) -> Option<Value> {
        match request {
            Request::UpdateBadge { risk, tab_id } => {
                self.badges.apply(tab_id, BadgeEvent::Label(&risk));
                Some(json!({ "success": true }))
            }
            Request::ScanUrl { url, tab_id } => Some(match self.dispatcher.scan(&url, tab_id).await {
                Ok(Some(verdict)) => to_response(&verdict),
                Ok(None) => error_response("only http(s) pages can be scanned"),
                Err(err) => error_response(err.to_string()),
            }),
            Request::CheckUrl { url } => Some(self.check_url(&url).await),
            Request::GetStats => Some(self.stats().await),
            Request::LinksExtracted { links } => {
                self.links_extracted(links, sender).await;
                None
            }
            Request::TabActivated { tab_id, url } => {
                self.auto_scan(tab_id, url.as_deref()).await;
                None
            }
            Request::TabUpdated {
                tab_id,
                url,
                status,
            } => {
                if status.as_deref() == Some("complete") {
                    self.auto_scan(tab_id, url.as_deref()).await;
                }
                None
            }
            Request::NavigationCompleted {
                tab_id,
                url,
                frame_id,
            } => {
                if frame_id == 0 {
                    self.auto_scan(tab_id, Some(&url)).await;
                }
                None
            }
            Request::ReportUrl { url } => Some(self.submit(ListAction::Report, &url).await),
            Request::WhitelistUrl { url } => Some(self.submit(ListAction::Whitelist, &url).await),
            Request::BlacklistUrl { url } => Some(self.submit(ListAction::Blacklist, &url).await),
            Request::GetSettings => Some(to_response(&self.current_settings().await)),
            Request::UpdateSettings { settings } => Some(match self.settings.update(settings).await {
                Ok(settings) => to_response(&settings),
                Err(err) => {
                    tracing::error!(target: "db", error = %err, "failed to update settings");
                    error_response("settings could not be saved")
                }
            }),
            Request::CheckHealth => Some(json!({ "online": self.service.is_online().await })),
        }
    }

    async fn check_url(&self, url: &str) -> Value {
        if !is_eligible(url) {
            return error_response("only http(s) pages can be scanned");
        }
        match self.service.check_url(url).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(target: "router", url, error = %err, "checkUrl failed");
                error_response(err.to_string())
            }
        }
    }

    async fn stats(&self) -> Value {
        match self.link_stats.all().await {
            Ok(stats) => to_response(&stats),
            Err(err) => {
                tracing::warn!(target: "db", error = %err, "link stats unavailable");
                json!({})
            }
        }
    }

    async fn current_settings(&self) -> Settings {
        self.settings.load().await.unwrap_or_else(|err| {
            tracing::warn!(target: "db", error = %err, "settings unavailable; using defaults");
            Settings::default()
        })
    }

    async fn submit(&self, action: ListAction, url: &str) -> Value {
        match self.service.submit(action, url).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(target: "router", ?action, url, error = %err, "list request failed");
                to_response(&ListResponse {
                    ok: false,
                    error: Some(err.to_string()),
                })
            }
        }
    }

    async fn auto_scan(&self, tab_id: TabId, url: Option<&str>) {
        let Some(url) = url.filter(|url| is_eligible(url)) else {
            self.badges.apply(tab_id, BadgeEvent::Ineligible);
            return;
        };
        if !self.settings.flag_or_enabled(AUTO_SCAN).await {
            tracing::debug!(target: "router", tab = %tab_id, "auto scan disabled");
            return;
        }
        // Failures already painted the badge and were logged.
        let _ = self.dispatcher.scan(url, tab_id).await;
    }

    async fn links_extracted(&self, links: Vec<String>, sender: Option<SenderInfo>) {
        let Some((tab_id, page_url)) = sender.and_then(|s| Some((s.tab_id?, s.url?))) else {
            tracing::warn!(target: "router", "linksExtracted without a sending tab; ignored");
            return;
        };
        if !self.settings.flag_or_enabled(SCAN_LINKS).await {
            tracing::debug!(target: "router", tab = %tab_id, "link scanning disabled");
            return;
        }

        let report = self
            .dispatcher
            .scan_many(&page_url, &links, tab_id, self.config.link_limit)
            .await;
        self.outbox.send(OutboundFrame::HighlightLinks {
            tab_id,
            links: report.links,
        });
    }
}

pub fn error_response(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

fn to_response<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| error_response(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::{
        badge::BadgeState,
        cache::VerdictCache,
        db::{memory_pool, settings::SHOW_NOTIFICATIONS},
        domain::{PageLinkStats, RiskTier},
        infrastructure::{clock::SystemClock, notifier::AlertNotifier},
        service::fake::FakeService,
    };

    struct Harness {
        router: Arc<MessageRouter>,
        service: Arc<FakeService>,
        badges: Arc<BadgeBoard>,
        settings: SettingsRepository,
        frames: UnboundedReceiver<OutboundFrame>,
    }

    async fn harness(service: FakeService) -> Harness {
        harness_with(
            service,
            ScanConfig {
                link_limit: 2,
                rpc_timeout: StdDuration::from_secs(5),
            },
        )
        .await
    }

    async fn harness_with(service: FakeService, config: ScanConfig) -> Harness {
        let pool = memory_pool().await;
        let (outbox, frames) = Outbox::channel();
        let service = Arc::new(service);
        let cache = Arc::new(VerdictCache::with_limits(
            StdDuration::from_secs(300),
            1000,
            Arc::new(SystemClock),
        ));
        let badges = Arc::new(BadgeBoard::new(outbox.clone()));
        let settings = SettingsRepository::new(pool.clone());
        let link_stats = LinkStatsRepository::new(pool);
        let alerts = Arc::new(AlertNotifier::new(settings.clone(), outbox.clone()));
        let dispatcher = Arc::new(ScanDispatcher::new(
            service.clone(),
            cache,
            badges.clone(),
            alerts,
            link_stats.clone(),
        ));
        let router = Arc::new(MessageRouter::new(
            dispatcher,
            service.clone(),
            badges.clone(),
            settings.clone(),
            link_stats,
            outbox,
            config,
        ));
        Harness {
            router,
            service,
            badges,
            settings,
            frames,
        }
    }

    async fn send(h: &Harness, message: Value) -> Option<Value> {
        let frame: InboundFrame = serde_json::from_value(message).unwrap();
        h.router.clone().handle(frame).await
    }

    #[tokio::test]
    async fn update_badge_accepts_any_label() {
        let h = harness(FakeService::safe()).await;
        let response = send(&h, json!({"action": "updateBadge", "risk": "suspicious", "tabId": 4})).await;
        assert_eq!(response, Some(json!({ "success": true })));
        assert_eq!(h.badges.state(TabId(4)), Some(BadgeState::Suspicious));

        send(&h, json!({"action": "updateBadge", "risk": "???", "tabId": 4})).await;
        assert_eq!(h.badges.state(TabId(4)), Some(BadgeState::Unknown));
    }

    #[tokio::test]
    async fn scan_url_returns_verdict_or_error() {
        let fake = FakeService::safe();
        fake.fail("https://down.test/");
        let h = harness(fake).await;

        let ok = send(&h, json!({"action": "scanUrl", "url": "https://a.test/", "tabId": 1}))
            .await
            .unwrap();
        assert_eq!(ok["risk"], "safe");
        assert_eq!(ok["reasons"], json!([]));

        let failed = send(&h, json!({"action": "scanUrl", "url": "https://down.test/", "tabId": 1}))
            .await
            .unwrap();
        assert!(failed["error"].is_string());

        let skipped = send(&h, json!({"action": "scanUrl", "url": "about:blank", "tabId": 1}))
            .await
            .unwrap();
        assert!(skipped["error"].is_string());
        assert_eq!(h.badges.state(TabId(1)), Some(BadgeState::Cleared));
    }

    #[tokio::test]
    async fn slow_scan_times_out_but_badge_still_settles() {
        let h = harness_with(
            FakeService::safe().slow(StdDuration::from_millis(200)),
            ScanConfig {
                link_limit: 2,
                rpc_timeout: StdDuration::from_millis(50),
            },
        )
        .await;

        let response = send(&h, json!({"action": "scanUrl", "url": "https://slow.test/", "tabId": 6}))
            .await
            .unwrap();
        let message = response["error"].as_str().expect("error reply");
        assert!(message.contains("timed out"), "{message}");
        assert_eq!(h.badges.state(TabId(6)), Some(BadgeState::Loading));

        tokio::time::sleep(StdDuration::from_millis(400)).await;
        assert_eq!(h.badges.state(TabId(6)), Some(BadgeState::Safe));
        assert_eq!(h.service.calls(), 1);
    }

    #[tokio::test]
    async fn malformed_http_prefixes_never_reach_the_service() {
        let h = harness(FakeService::safe()).await;
        for url in ["http:evil.test", "https:/evil.test", "  http://evil.test"] {
            let checked = send(&h, json!({"action": "checkUrl", "url": url})).await.unwrap();
            assert!(checked["error"].is_string(), "{url}");

            send(&h, json!({"action": "tabActivated", "tabId": 9, "url": url})).await;
            assert_eq!(h.badges.state(TabId(9)), Some(BadgeState::Cleared), "{url}");
        }
        assert_eq!(h.service.calls(), 0);
    }

    #[tokio::test]
    async fn check_url_passes_raw_body_through() {
        let fake = FakeService::safe();
        fake.respond(
            "https://x.test/",
            json!({ "risk": "suspicious", "score": 0.4, "reasons": ["new_domain"], "extra": 1 }),
        );
        let h = harness(fake).await;

        let body = send(&h, json!({"action": "checkUrl", "url": "https://x.test/"}))
            .await
            .unwrap();
        assert_eq!(body["extra"], 1);
        assert_eq!(body["reasons"], json!(["new_domain"]));
        assert!(h.badges.state(TabId(0)).is_none());
    }

    #[tokio::test]
    async fn lifecycle_events_respect_auto_scan() {
        let h = harness(FakeService::safe()).await;

        let none = send(&h, json!({"action": "tabActivated", "tabId": 2, "url": "https://a.test/"})).await;
        assert!(none.is_none());
        assert_eq!(h.badges.state(TabId(2)), Some(BadgeState::Safe));

        send(&h, json!({"action": "tabUpdated", "tabId": 3, "url": "https://b.test/", "status": "loading"})).await;
        assert_eq!(h.badges.state(TabId(3)), None);

        send(&h, json!({"action": "navigationCompleted", "tabId": 3, "url": "https://b.test/", "frameId": 7})).await;
        assert_eq!(h.badges.state(TabId(3)), None);

        h.settings.set_flag(AUTO_SCAN, false).await.unwrap();
        send(&h, json!({"action": "navigationCompleted", "tabId": 3, "url": "https://b.test/", "frameId": 0})).await;
        assert_eq!(h.badges.state(TabId(3)), None);
        assert_eq!(h.service.calls(), 1);

        send(&h, json!({"action": "tabActivated", "tabId": 2})).await;
        assert_eq!(h.badges.state(TabId(2)), Some(BadgeState::Cleared));
    }

    #[tokio::test]
    async fn links_extracted_scans_highlights_and_persists() {
        let fake = FakeService::safe();
        fake.respond(
            "https://phish.test/",
            json!({ "risk": "malicious", "score": 0.97, "reasons": [] }),
        );
        let mut h = harness(fake).await;

        let response = send(
            &h,
            json!({
                "action": "linksExtracted",
                "links": ["https://phish.test/", "https://ok.test/", "https://late.test/", "https://ok.test/"],
                "sender": { "tabId": 8, "url": "https://page.test/" }
            }),
        )
        .await;
        assert!(response.is_none());
        assert_eq!(h.service.calls(), 2, "capped by link_limit");

        let mut highlighted = None;
        while let Ok(frame) = h.frames.try_recv() {
            if let OutboundFrame::HighlightLinks { tab_id, links } = frame {
                highlighted = Some((tab_id, links));
            }
        }
        let (tab_id, links) = highlighted.expect("highlight frame");
        assert_eq!(tab_id, TabId(8));
        assert_eq!(links[0].risk, RiskTier::Malicious);

        let stats = send(&h, json!({"action": "getStats"})).await.unwrap();
        let page: PageLinkStats = serde_json::from_value(stats["https://page.test/"].clone()).unwrap();
        assert_eq!(
            page,
            PageLinkStats {
                total: 3,
                safe: 1,
                suspicious: 0,
                malicious: 1,
            }
        );
    }

    #[tokio::test]
    async fn links_extracted_respects_scan_links_setting() {
        let h = harness(FakeService::safe()).await;
        h.settings.set_flag(SCAN_LINKS, false).await.unwrap();

        send(
            &h,
            json!({
                "action": "linksExtracted",
                "links": ["https://a.test/"],
                "sender": { "tabId": 1, "url": "https://page.test/" }
            }),
        )
        .await;
        assert_eq!(h.service.calls(), 0);
        assert_eq!(send(&h, json!({"action": "getStats"})).await, Some(json!({})));
    }

    #[tokio::test]
    async fn settings_round_trip_through_rpc() {
        let h = harness(FakeService::safe()).await;
        let initial = send(&h, json!({"action": "getSettings"})).await.unwrap();
        assert_eq!(
            initial,
            json!({ "autoScan": true, "showNotifications": true, "scanLinks": true })
        );

        let updated = send(
            &h,
            json!({"action": "updateSettings", "settings": { "showNotifications": false }}),
        )
        .await
        .unwrap();
        assert_eq!(updated["showNotifications"], false);
        assert_eq!(h.settings.flag(SHOW_NOTIFICATIONS).await.unwrap(), Some(false));
    }

    #[tokio::test]
    async fn list_actions_and_health() {
        let fake = FakeService::offline();
        fake.fail("https://refused.test/");
        let h = harness(fake).await;

        let ok = send(&h, json!({"action": "reportUrl", "url": "https://a.test/"})).await;
        assert_eq!(ok, Some(json!({ "ok": true })));

        let refused = send(&h, json!({"action": "blacklistUrl", "url": "https://refused.test/"}))
            .await
            .unwrap();
        assert_eq!(refused["ok"], false);
        assert!(refused["error"].is_string());

        let health = send(&h, json!({"action": "checkHealth"})).await;
        assert_eq!(health, Some(json!({ "online": false })));
    }
}
