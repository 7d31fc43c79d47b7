use crate::{
    bridge::outbox::Outbox,
    db::settings::{SettingsRepository, SHOW_NOTIFICATIONS},
    domain::{OutboundFrame, TabId, Verdict},
};

/// Raises a user-facing alert for each malicious verdict while the
/// `showNotifications` setting allows it.
pub struct AlertNotifier {
    settings: SettingsRepository,
    outbox: Outbox,
}

impl AlertNotifier {
    pub fn new(settings: SettingsRepository, outbox: Outbox) -> Self {
        Self { settings, outbox }
    }

    /// Returns whether an alert was sent.
    pub async fn notify(&self, tab_id: TabId, url: &str, verdict: &Verdict) -> bool {
        if !verdict.is_malicious() {
            return false;
        }
        if !self.settings.flag_or_enabled(SHOW_NOTIFICATIONS).await {
            tracing::debug!(target: "alert", tab = %tab_id, url, "notifications disabled");
            return false;
        }

        tracing::info!(
            target: "alert",
            tab = %tab_id,
            url,
            score = verdict.score,
            "malicious page alert"
        );
        self.outbox.send(OutboundFrame::Notification {
            tab_id,
            url: url.to_string(),
            title: "Phishing warning".to_string(),
            message: alert_message(url, verdict),
            score: verdict.score,
            reasons: verdict.reasons.clone(),
        });
        true
    }
}

fn alert_message(url: &str, verdict: &Verdict) -> String {
    let mut message = format!(
        "{url} looks malicious (risk score {:.0}%).",
        verdict.score * 100.0
    );
    if !verdict.reasons.is_empty() {
        message.push_str(" Reasons: ");
        message.push_str(&verdict.reasons.join(", "));
    }
    message
}
