use serde::{Deserialize, Serialize};

/// Raw inbound event as posted by the template provider webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEventPayload {
    pub from: String,
    pub body: Option<String>,
    pub button_payload: Option<String>,
    pub message_id: Option<String>,
    pub kind: Option<String>,
    pub media_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdatePayload {
    pub message_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InboundOutcome {
    pub claimed: bool,
    pub handled_by: Option<&'static str>,
}

impl InboundOutcome {
    pub fn claimed_by(handler: &'static str) -> Self {
        Self {
            claimed: true,
            handled_by: Some(handler),
        }
    }

    pub fn unclaimed() -> Self {
        Self {
            claimed: false,
            handled_by: None,
        }
    }
}

/// Fixed quick-reply button tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickReplyToken {
    ConfirmYes,
    ConfirmCancel,
    ConfirmReschedule,
}

impl QuickReplyToken {
    pub fn parse(payload: &str) -> Option<Self> {
        match payload.trim() {
            "confirm_yes" => Some(QuickReplyToken::ConfirmYes),
            "confirm_cancel" => Some(QuickReplyToken::ConfirmCancel),
            "confirm_reschedule" => Some(QuickReplyToken::ConfirmReschedule),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tokens() {
        assert_eq!(
            QuickReplyToken::parse("confirm_yes"),
            Some(QuickReplyToken::ConfirmYes)
        );
        assert_eq!(
            QuickReplyToken::parse(" confirm_cancel "),
            Some(QuickReplyToken::ConfirmCancel)
        );
        assert_eq!(
            QuickReplyToken::parse("confirm_reschedule"),
            Some(QuickReplyToken::ConfirmReschedule)
        );
    }

    #[test]
    fn rejects_free_text() {
        assert_eq!(QuickReplyToken::parse("si"), None);
        assert_eq!(QuickReplyToken::parse("CONFIRM_YES"), None);
        assert_eq!(QuickReplyToken::parse(""), None);
    }
}
