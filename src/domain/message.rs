use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::badge::BadgeState;

use super::types::{LinkVerdict, SettingsPatch, TabId};

/// A single message forwarded by the browser shell.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub sender: Option<SenderInfo>,
    #[serde(flatten)]
    pub request: Request,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderInfo {
    pub tab_id: Option<TabId>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    UpdateBadge {
        risk: String,
        tab_id: TabId,
    },
    ScanUrl {
        url: String,
        tab_id: TabId,
    },
    CheckUrl {
        url: String,
    },
    GetStats,
    LinksExtracted {
        #[serde(default)]
        links: Vec<String>,
    },
    TabActivated {
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
    },
    TabUpdated {
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        status: Option<String>,
    },
    NavigationCompleted {
        tab_id: TabId,
        url: String,
        #[serde(default)]
        frame_id: i64,
    },
    ReportUrl {
        url: String,
    },
    WhitelistUrl {
        url: String,
    },
    BlacklistUrl {
        url: String,
    },
    GetSettings,
    UpdateSettings {
        #[serde(default)]
        settings: SettingsPatch,
    },
    CheckHealth,
}

impl Request {
    pub fn action(&self) -> &'static str {
        match self {
            Request::UpdateBadge { .. } => "updateBadge",
            Request::ScanUrl { .. } => "scanUrl",
            Request::CheckUrl { .. } => "checkUrl",
            Request::GetStats => "getStats",
            Request::LinksExtracted { .. } => "linksExtracted",
            Request::TabActivated { .. } => "tabActivated",
            Request::TabUpdated { .. } => "tabUpdated",
            Request::NavigationCompleted { .. } => "navigationCompleted",
            Request::ReportUrl { .. } => "reportUrl",
            Request::WhitelistUrl { .. } => "whitelistUrl",
            Request::BlacklistUrl { .. } => "blacklistUrl",
            Request::GetSettings => "getSettings",
            Request::UpdateSettings { .. } => "updateSettings",
            Request::CheckHealth => "checkHealth",
        }
    }
}

/// Instructions and replies written back to the browser shell.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutboundFrame {
    Reply {
        id: u64,
        response: Value,
    },
    Badge {
        tab_id: TabId,
        state: BadgeState,
        text: &'static str,
        color: &'static str,
    },
    Notification {
        tab_id: TabId,
        url: String,
        title: String,
        message: String,
        score: f64,
        reasons: Vec<String>,
    },
    HighlightLinks {
        tab_id: TabId,
        links: Vec<LinkVerdict>,
    },
}
