use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque tab identity handed to us by the browser shell. Never assumed to
/// survive a browser restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Safe,
    Suspicious,
    Malicious,
}

impl RiskTier {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "safe" => Some(Self::Safe),
            "suspicious" => Some(Self::Suspicious),
            "malicious" => Some(Self::Malicious),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Suspicious => "suspicious",
            Self::Malicious => "malicious",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub risk: RiskTier,
    pub score: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl Verdict {
    pub fn is_malicious(&self) -> bool {
        self.risk == RiskTier::Malicious
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinkStats {
    pub total: u32,
    pub safe: u32,
    pub suspicious: u32,
    pub malicious: u32,
}

impl PageLinkStats {
    pub fn record(&mut self, risk: RiskTier) {
        match risk {
            RiskTier::Safe => self.safe += 1,
            RiskTier::Suspicious => self.suspicious += 1,
            RiskTier::Malicious => self.malicious += 1,
        }
    }

    pub fn scanned(&self) -> u32 {
        self.safe + self.suspicious + self.malicious
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkVerdict {
    pub url: String,
    pub risk: RiskTier,
}

/// User toggles persisted by the settings repository. Missing keys are
/// treated as enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub auto_scan: bool,
    pub show_notifications: bool,
    pub scan_links: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_scan: true,
            show_notifications: true,
            scan_links: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub auto_scan: Option<bool>,
    pub show_notifications: Option<bool>,
    pub scan_links: Option<bool>,
}
