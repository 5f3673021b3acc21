//! REST surface: banner, health, one-shot chat, statistics, and a sanitized
//! view of the running configuration.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use botan_core::{
    ConnectionGroup, EvaluationPayload, ReasoningResult, ReflectionResult, SessionStats,
};

use crate::state::SharedState;

pub async fn index(State(state): State<SharedState>) -> String {
    format!("{} is running", state.config.app_name)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
    #[serde(default)]
    pub enable_voice: bool,
    #[serde(default)]
    pub enable_reflection: Option<bool>,
}

#[derive(Serialize)]
pub struct ChatApiResponse {
    pub response: String,
    pub self_evaluation: EvaluationPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reflection: Option<ReflectionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    pub generation_failed: bool,
}

/// One-shot chat without a WebSocket. Same pipeline, same session keying as
/// the participant socket (`user_id` maps to the socket's `client_id`).
pub async fn chat(
    State(state): State<SharedState>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    match super::process_turn(
        &state,
        &req.user_id,
        &req.message,
        req.enable_reflection,
        req.enable_voice,
    )
    .await
    {
        Ok(reply) => (
            StatusCode::OK,
            Json(serde_json::json!(ChatApiResponse {
                response: reply.text,
                self_evaluation: reply.evaluation,
                reflection: reply.reflection,
                reasoning: reply.reasoning,
                audio_url: reply.audio_url,
                generation_failed: reply.generation_failed,
            })),
        ),
        Err(message) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": message })),
        ),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub client_id: Option<String>,
}

#[derive(Serialize)]
pub struct GlobalStats {
    pub active_participants: usize,
    pub active_observers: usize,
    pub sessions: BTreeMap<String, SessionStats>,
}

/// Session statistics: one session by `client_id`, or a global view with
/// active connection counts and every session keyed by client id.
pub async fn stats(
    State(state): State<SharedState>,
    Query(query): Query<StatsQuery>,
) -> impl IntoResponse {
    if let Some(client_id) = query.client_id {
        let session = state.sessions.get(&client_id).map(|s| s.clone());
        return match session {
            Some(session) => {
                let stats = session.lock().await.statistics();
                (StatusCode::OK, Json(serde_json::json!(stats)))
            }
            None => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "unknown client_id" })),
            ),
        };
    }

    // Clone handles out first; map guards must not live across awaits.
    let handles: Vec<_> = state
        .sessions
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().clone()))
        .collect();
    let mut sessions = BTreeMap::new();
    for (client_id, session) in handles {
        sessions.insert(client_id, session.lock().await.statistics());
    }

    let view = GlobalStats {
        active_participants: state.registry.count(ConnectionGroup::Participant),
        active_observers: state.registry.count(ConnectionGroup::Observer),
        sessions,
    };
    (StatusCode::OK, Json(serde_json::json!(view)))
}

/// Sanitized configuration view. Hosts stay internal; only behavior-relevant
/// settings are exposed.
pub async fn config_view(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "app_name": state.config.app_name,
        "model": state.config.model,
        "analysis_model": state.config.analysis_model,
        "enable_reflection": state.config.enable_reflection,
        "generation_timeout_secs": state.config.generation_timeout_secs,
        "persona": state.persona.name,
    }))
}
