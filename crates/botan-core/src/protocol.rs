//! Wire message contracts shared by the HTTP and WebSocket surfaces.
//!
//! Every frame is a JSON object tagged by `kind`. Unknown or malformed
//! inbound frames are a protocol error answered with `kind: "error"`, never
//! a dropped connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reflection::{ReasoningResult, ReflectionResult};
use crate::session::ReactionEvaluation;

/// Inbound client frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A dialogue turn from a participant.
    Chat {
        text: String,
        client_id: String,
        #[serde(default)]
        enable_voice: bool,
        #[serde(default)]
        enable_reflection: Option<bool>,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Handshake from a read-only observer.
    ObserverConnect {
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
}

/// Evaluation summary attached to a chat response.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationPayload {
    pub score: u8,
    pub category: String,
    pub rationale: Vec<String>,
    /// Lagged evaluation of the previous turn, when this message produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_turn_reaction: Option<ReactionEvaluation>,
}

/// Outbound server frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Acknowledges a new connection.
    Connected {
        connection_id: String,
        timestamp: DateTime<Utc>,
    },
    /// The assistant's reply to a chat turn, with its evaluation and the
    /// intermediate stage results when the reflect/reason stages ran.
    ChatResponse {
        text: String,
        evaluation: EvaluationPayload,
        #[serde(skip_serializing_if = "Option::is_none")]
        reflection: Option<ReflectionResult>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning: Option<ReasoningResult>,
        #[serde(skip_serializing_if = "Option::is_none")]
        audio_url: Option<String>,
        generation_failed: bool,
        timestamp: DateTime<Utc>,
    },
    /// Subtitle fan-out to observers after a completed turn.
    Subtitle {
        text: String,
        speaker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Protocol or processing error. The connection stays open.
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn subtitle(text: impl Into<String>, speaker_id: impl Into<String>) -> Self {
        Self::Subtitle {
            text: text.into(),
            speaker_id: speaker_id.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_frame_deserializes_with_defaults() {
        let raw = r#"{"kind": "chat", "text": "おはよう", "client_id": "viewer-1"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::Chat { text, enable_voice, enable_reflection, .. } => {
                assert_eq!(text, "おはよう");
                assert!(!enable_voice);
                assert!(enable_reflection.is_none());
            }
            _ => panic!("expected chat frame"),
        }
    }

    #[test]
    fn test_observer_connect_deserializes() {
        let raw = r#"{"kind": "observer_connect"}"#;
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(raw).unwrap(),
            ClientMessage::ObserverConnect { .. }
        ));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let raw = r#"{"kind": "shutdown"}"#;
        assert!(serde_json::from_str::<ClientMessage>(raw).is_err());
    }

    #[test]
    fn test_subtitle_frame_serializes_with_kind_tag() {
        let frame = ServerMessage::subtitle("やっほ〜！", "botan");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["kind"], "subtitle");
        assert_eq!(json["speaker_id"], "botan");
    }
}
