//! Request handlers. The turn-processing path is shared between the REST
//! endpoint and the participant WebSocket; both end in [`process_turn`].

mod chat;
mod ws;

pub use chat::{chat, config_view, health, index, stats};
pub use ws::{ws_chat, ws_observe};

use botan_core::{
    ConnectionGroup, EvaluationPayload, ReasoningResult, ReflectionResult, ServerMessage,
};

use crate::state::AppState;

/// Subtitle speaker id used for observer fan-out.
const SPEAKER_ID: &str = "botan";

/// Result of one processed chat turn, transport-agnostic. The REST and
/// WebSocket surfaces each render it into their own response shape.
pub(crate) struct TurnReply {
    pub text: String,
    pub evaluation: EvaluationPayload,
    pub reflection: Option<ReflectionResult>,
    pub reasoning: Option<ReasoningResult>,
    pub audio_url: Option<String>,
    pub generation_failed: bool,
}

impl TurnReply {
    pub fn into_frame(self) -> ServerMessage {
        ServerMessage::ChatResponse {
            text: self.text,
            evaluation: self.evaluation,
            reflection: self.reflection,
            reasoning: self.reasoning,
            audio_url: self.audio_url,
            generation_failed: self.generation_failed,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Runs one inbound chat message through the pipeline for its session.
/// Also fans the reply out to observers as a subtitle, unless generation
/// fell back. `Err` carries a user-facing message for invalid input.
pub(crate) async fn process_turn(
    state: &AppState,
    client_id: &str,
    text: &str,
    enable_reflection: Option<bool>,
    enable_voice: bool,
) -> Result<TurnReply, String> {
    if text.trim().is_empty() {
        return Err("メッセージが空です".to_string());
    }

    let session = state.session_for(client_id);
    // One critical section: the lagged evaluation of the previous turn and
    // the new turn land together.
    let outcome = {
        let mut session = session.lock().await;
        state
            .pipeline
            .run(
                &mut session,
                text,
                enable_reflection.unwrap_or(state.config.enable_reflection),
            )
            .await
    };

    let audio_url = if enable_voice && !outcome.turn.generation_failed {
        state
            .voice
            .synthesize(&outcome.turn.assistant_text, SPEAKER_ID)
            .await
    } else {
        None
    };

    if !outcome.turn.generation_failed {
        let delivered = state.registry.broadcast(
            ConnectionGroup::Observer,
            &ServerMessage::subtitle(outcome.turn.assistant_text.clone(), SPEAKER_ID),
        );
        tracing::debug!(target: "botan::gateway", delivered, "subtitle fan-out");
    }

    Ok(TurnReply {
        text: outcome.turn.assistant_text,
        evaluation: EvaluationPayload {
            score: outcome.turn.self_evaluation.score,
            category: outcome.turn.self_evaluation.category.label().to_string(),
            rationale: outcome.turn.self_evaluation.rationale,
            previous_turn_reaction: outcome.previous_reaction,
        },
        reflection: outcome.turn.reflection,
        reasoning: outcome.turn.reasoning,
        audio_url,
        generation_failed: outcome.turn.generation_failed,
    })
}
