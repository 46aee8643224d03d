//! Two-field acknowledgment reply.
//!
//! Every inbound segment message is answered with `CODE|reason`, where `CODE` is
//! `ACK` or `NACK`. The reply only states whether the message was accepted locally.

use crate::{Hl7Error, Hl7Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckCode {
    Ack,
    Nack,
}

impl AckCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckCode::Ack => "ACK",
            AckCode::Nack => "NACK",
        }
    }
}

/// An ACK/NACK reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acknowledgment {
    pub code: AckCode,
    pub reason: String,
}

impl Acknowledgment {
    pub fn ack(reason: impl Into<String>) -> Self {
        Self {
            code: AckCode::Ack,
            reason: reason.into(),
        }
    }

    pub fn nack(reason: impl Into<String>) -> Self {
        Self {
            code: AckCode::Nack,
            reason: reason.into(),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.code == AckCode::Ack
    }

    /// Render as `CODE|reason`.
    pub fn render(&self) -> String {
        format!("{}|{}", self.code.as_str(), self.reason)
    }

    /// Parse a `CODE|reason` reply.
    ///
    /// # Errors
    ///
    /// Returns [`Hl7Error::InvalidAcknowledgment`] if the code is neither `ACK` nor `NACK`.
    pub fn parse(text: &str) -> Hl7Result<Self> {
        let text = text.trim();
        let (code, reason) = text.split_once('|').unwrap_or((text, ""));
        let code = match code {
            "ACK" => AckCode::Ack,
            "NACK" => AckCode::Nack,
            _ => return Err(Hl7Error::InvalidAcknowledgment(text.to_string())),
        };
        Ok(Self {
            code,
            reason: reason.to_string(),
        })
    }
}

impl std::fmt::Display for Acknowledgment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.code.as_str(), self.reason)
    }
}
