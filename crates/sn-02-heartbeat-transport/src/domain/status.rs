//! # Response Classification
//!
//! Maps a raw channel response onto what the retry loop should do next.

use crate::domain::errors::RejectReason;
use crate::ports::outbound::ChannelResponse;
use shared_types::{ErrorBody, HubAck};

/// What a single attempt amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Acknowledged by the hub.
    Ack(HubAck),
    /// Worth retrying.
    Transient { reason: String, overload: bool },
    /// Final refusal.
    Rejected { reason: RejectReason, message: String },
}

/// Classify an HTTP-style response from the hub.
#[must_use]
pub fn classify_response(response: &ChannelResponse) -> Verdict {
    match response.status {
        200 => match HubAck::from_json(&response.body) {
            Ok(ack) => Verdict::Ack(ack),
            Err(e) => Verdict::Transient {
                reason: format!("missing ack: {}", e),
                overload: false,
            },
        },
        401 => Verdict::Rejected {
            reason: RejectReason::Unauthorized,
            message: error_message(&response.body),
        },
        409 => Verdict::Rejected {
            reason: RejectReason::Conflict,
            message: error_message(&response.body),
        },
        503 => Verdict::Transient {
            reason: "hub overloaded (503)".to_string(),
            overload: true,
        },
        status if (500..600).contains(&status) => Verdict::Transient {
            reason: format!("hub error ({})", status),
            overload: false,
        },
        status if (400..500).contains(&status) => Verdict::Rejected {
            reason: RejectReason::Status(status),
            message: error_message(&response.body),
        },
        status => Verdict::Transient {
            reason: format!("unexpected status {}", status),
            overload: false,
        },
    }
}

fn error_message(body: &[u8]) -> String {
    ErrorBody::from_json(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned())
}
