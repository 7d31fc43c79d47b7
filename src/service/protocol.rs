use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{RiskTier, Verdict};

use super::ServiceError;

pub const CHECK_URL_PATH: &str = "api/check-url";

#[derive(Debug, Serialize)]
pub struct UrlPayload<'a> {
    pub url: &'a str,
}

/// Boundary endpoints the popup uses for reporting and list management.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListAction {
    Report,
    Whitelist,
    Blacklist,
}

impl ListAction {
    pub fn path(&self) -> &'static str {
        match self {
            ListAction::Report => "api/report-url",
            ListAction::Whitelist => "api/whitelist",
            ListAction::Blacklist => "api/blacklist",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckUrlBody {
    risk: String,
    score: f64,
    #[serde(default)]
    reasons: Vec<String>,
}

/// Returns the message of an `error` field, if the service set one.
pub fn error_field(body: &Value) -> Option<String> {
    match body.get("error") {
        None | Some(Value::Null) => None,
        Some(Value::String(message)) => Some(message.clone()),
        Some(other) => Some(other.to_string()),
    }
}

pub fn parse_verdict(body: &Value) -> Result<Verdict, ServiceError> {
    if let Some(message) = error_field(body) {
        return Err(ServiceError::Rejected(message));
    }

    let parsed: CheckUrlBody = serde_json::from_value(body.clone())
        .map_err(|err| ServiceError::Malformed(err.to_string()))?;

    let risk = RiskTier::parse(&parsed.risk)
        .ok_or_else(|| ServiceError::Malformed(format!("unknown risk tier {:?}", parsed.risk)))?;

    if !parsed.score.is_finite() {
        return Err(ServiceError::Malformed("score is not a number".to_string()));
    }

    Ok(Verdict {
        risk,
        score: parsed.score.clamp(0.0, 1.0),
        reasons: parsed.reasons,
    })
}
