pub mod message;
pub mod types;

pub use message::{InboundFrame, OutboundFrame, Request, SenderInfo};
pub use types::{
    LinkVerdict, PageLinkStats, RiskTier, Settings, SettingsPatch, TabId, Verdict,
};
