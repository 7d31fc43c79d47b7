use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;

use crate::{
    bridge::outbox::Outbox,
    domain::{OutboundFrame, RiskTier, TabId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeState {
    Cleared,
    Loading,
    Safe,
    Suspicious,
    Malicious,
    Error,
    Unknown,
}

impl BadgeState {
    pub fn text(&self) -> &'static str {
        match self {
            BadgeState::Cleared => "",
            BadgeState::Loading => "...",
            BadgeState::Safe => "OK",
            BadgeState::Suspicious => "?",
            BadgeState::Malicious => "!",
            BadgeState::Error | BadgeState::Unknown => "ERR",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            BadgeState::Cleared => "#00000000",
            BadgeState::Loading => "#9aa0a6",
            BadgeState::Safe => "#1e8e3e",
            BadgeState::Suspicious => "#f9ab00",
            BadgeState::Malicious => "#d93025",
            BadgeState::Error | BadgeState::Unknown => "#5f6368",
        }
    }

    /// Next state for an event. The badge only mirrors the latest event, so
    /// the current state matters only for logging.
    pub fn on(self, event: BadgeEvent<'_>) -> BadgeState {
        match event {
            BadgeEvent::Ineligible => BadgeState::Cleared,
            BadgeEvent::ScanStarted => BadgeState::Loading,
            BadgeEvent::Failed => BadgeState::Error,
            BadgeEvent::Resolved(risk) => risk.into(),
            BadgeEvent::Label(label) => match RiskTier::parse(label) {
                Some(risk) => risk.into(),
                None => BadgeState::Unknown,
            },
        }
    }
}

impl From<RiskTier> for BadgeState {
    fn from(risk: RiskTier) -> Self {
        match risk {
            RiskTier::Safe => BadgeState::Safe,
            RiskTier::Suspicious => BadgeState::Suspicious,
            RiskTier::Malicious => BadgeState::Malicious,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BadgeEvent<'a> {
    Ineligible,
    ScanStarted,
    Resolved(RiskTier),
    Failed,
    /// A tier reported by a collaborator as free text.
    Label(&'a str),
}

/// Per-tab badge states plus the channel that paints them.
pub struct BadgeBoard {
    tabs: Mutex<HashMap<TabId, BadgeState>>,
    outbox: Outbox,
}

impl BadgeBoard {
    pub fn new(outbox: Outbox) -> Self {
        Self {
            tabs: Mutex::new(HashMap::new()),
            outbox,
        }
    }

    pub fn apply(&self, tab_id: TabId, event: BadgeEvent<'_>) -> BadgeState {
        let next = {
            let mut tabs = self.tabs.lock();
            let current = tabs.get(&tab_id).copied().unwrap_or(BadgeState::Cleared);
            let next = current.on(event);
            tabs.insert(tab_id, next);
            if current != next {
                tracing::debug!(
                    target: "badge",
                    tab = %tab_id,
                    from = ?current,
                    to = ?next,
                    "badge transition"
                );
            }
            next
        };

        self.outbox.send(OutboundFrame::Badge {
            tab_id,
            state: next,
            text: next.text(),
            color: next.color(),
        });
        next
    }

    pub fn state(&self, tab_id: TabId) -> Option<BadgeState> {
        self.tabs.lock().get(&tab_id).copied()
    }
}
