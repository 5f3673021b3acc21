//! Turn pipeline: the staged processing of one inbound user message.
//!
//! Stages run in a fixed order: lagged evaluation of the previous turn,
//! optional reflect/reason, generation, self-evaluation, record. The
//! reflect/reason stages and the generation call are the only suspension
//! points; everything after the generation result is synchronous.
//!
//! Generation failure is not an error for the caller: the turn completes
//! with an apologetic in-character fallback and `generation_failed` set, so
//! the dialogue keeps moving and the failure stays visible in the record.

use std::sync::Arc;
use std::time::Duration;

use crate::bridge::{ChatMessage, GenerationBridge};
use crate::evaluation::{Category, HeuristicScorer};
use crate::persona::PersonaProfile;
use crate::reflection::ReflectionEngine;
use crate::session::{ReactionEvaluation, Session, Turn};

/// In-character reply used when the collaborator fails or times out.
pub const GENERATION_FALLBACK: &str = "えーっと、調子悪いかも...";

/// How many recent turns of context the reflect stage sees.
const CONTEXT_TURNS: usize = 3;

/// Pipeline stage, in processing order. Used for stage-transition logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Received,
    Reflecting,
    Reasoning,
    Generating,
    SelfEvaluating,
    Complete,
}

/// Result of one pipeline run: the completed turn plus the lagged
/// evaluation that this message triggered for the *previous* turn.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub turn: Turn,
    pub previous_reaction: Option<ReactionEvaluation>,
}

/// Drives one message through all stages against a single session.
///
/// The pipeline itself is stateless across calls; all conversation state
/// lives in the [`Session`] handed to [`run`](Self::run). Callers hold the
/// session lock across the whole call so the lagged evaluation and the new
/// turn land atomically.
pub struct TurnPipeline {
    bridge: Arc<dyn GenerationBridge>,
    reflection: ReflectionEngine,
    scorer: HeuristicScorer,
    persona: PersonaProfile,
    generation_timeout: Duration,
}

impl TurnPipeline {
    pub fn new(
        bridge: Arc<dyn GenerationBridge>,
        persona: PersonaProfile,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            reflection: ReflectionEngine::new(bridge.clone()),
            scorer: HeuristicScorer::new(persona.clone()),
            bridge,
            persona,
            generation_timeout,
        }
    }

    /// Process one user message end to end.
    pub async fn run(
        &self,
        session: &mut Session,
        user_input: &str,
        enable_reflection: bool,
    ) -> PipelineOutcome {
        self.trace(TurnStage::Received);

        // The new message is the reaction signal for the previous turn.
        let previous_reaction = session.evaluate_previous_turn(user_input);

        let category = Category::infer(user_input);
        let context = session.recent_context(CONTEXT_TURNS, &self.persona.name);

        let (reflection, reasoning) = if enable_reflection {
            self.trace(TurnStage::Reflecting);
            let reflection = self.reflection.reflect(user_input, &context).await;
            self.trace(TurnStage::Reasoning);
            let reasoning = self
                .reflection
                .reason(user_input, &reflection, &self.persona)
                .await;
            (Some(reflection), Some(reasoning))
        } else {
            (None, None)
        };

        self.trace(TurnStage::Generating);
        session.push_exchange(ChatMessage::user(user_input));
        let messages = self.compose_messages(session, reasoning.as_ref());

        let (assistant_text, generation_failed) =
            match tokio::time::timeout(self.generation_timeout, self.bridge.chat(&messages)).await
            {
                Ok(Ok(text)) => (text, false),
                Ok(Err(e)) => {
                    tracing::warn!(target: "botan::pipeline", error = %e, "generation failed");
                    (GENERATION_FALLBACK.to_string(), true)
                }
                Err(_) => {
                    tracing::warn!(
                        target: "botan::pipeline",
                        timeout_secs = self.generation_timeout.as_secs(),
                        "generation timed out"
                    );
                    (GENERATION_FALLBACK.to_string(), true)
                }
            };
        // The fallback enters the log too, so roles keep alternating.
        session.push_exchange(ChatMessage::assistant(assistant_text.clone()));

        self.trace(TurnStage::SelfEvaluating);
        let self_evaluation = self.scorer.evaluate(user_input, &assistant_text, category);

        let turn = Turn {
            timestamp: chrono::Utc::now(),
            user_text: user_input.to_string(),
            assistant_text,
            reflection,
            reasoning,
            generation_failed,
            self_evaluation,
            reaction_evaluation: None,
        };
        session.append_turn(turn.clone());

        self.trace(TurnStage::Complete);
        tracing::info!(
            target: "botan::pipeline",
            score = turn.self_evaluation.score,
            category = turn.self_evaluation.category.label(),
            failed = turn.generation_failed,
            "turn complete"
        );

        PipelineOutcome { turn, previous_reaction }
    }

    /// System prompt (persona sheet, optionally extended with the reasoned
    /// strategy) followed by the rolling exchange log.
    fn compose_messages(
        &self,
        session: &Session,
        reasoning: Option<&crate::reflection::ReasoningResult>,
    ) -> Vec<ChatMessage> {
        let mut system = self.persona.profile.clone();
        if let Some(r) = reasoning {
            system.push_str(&format!(
                "\n\n【今回の応答方針】\nアプローチ: {}\n方向性: {}",
                r.approach, r.direction
            ));
            if !r.avoid.is_empty() {
                system.push_str(&format!("\n避けること: {}", r.avoid.join("、")));
            }
        }

        let mut messages = Vec::with_capacity(session.exchange_log().len() + 1);
        messages.push(ChatMessage::system(system));
        messages.extend_from_slice(session.exchange_log());
        messages
    }

    fn trace(&self, stage: TurnStage) {
        tracing::debug!(target: "botan::pipeline", stage = ?stage, "stage transition");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, CoreResult};
    use async_trait::async_trait;

    struct CannedBridge(&'static str);

    #[async_trait]
    impl GenerationBridge for CannedBridge {
        async fn chat(&self, _messages: &[ChatMessage]) -> CoreResult<String> {
            Ok(self.0.to_string())
        }
        async fn complete(&self, _prompt: &str) -> CoreResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingBridge;

    #[async_trait]
    impl GenerationBridge for FailingBridge {
        async fn chat(&self, _messages: &[ChatMessage]) -> CoreResult<String> {
            Err(CoreError::Bridge("connection refused".to_string()))
        }
        async fn complete(&self, _prompt: &str) -> CoreResult<String> {
            Err(CoreError::Bridge("connection refused".to_string()))
        }
    }

    struct StalledBridge;

    #[async_trait]
    impl GenerationBridge for StalledBridge {
        async fn chat(&self, _messages: &[ChatMessage]) -> CoreResult<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }
        async fn complete(&self, _prompt: &str) -> CoreResult<String> {
            Ok(String::new())
        }
    }

    fn pipeline(bridge: Arc<dyn GenerationBridge>) -> TurnPipeline {
        TurnPipeline::new(bridge, PersonaProfile::default(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_successful_turn_is_recorded() {
        let p = pipeline(Arc::new(CannedBridge("やっほ〜！元気だよ！")));
        let mut session = Session::new();

        let outcome = p.run(&mut session, "おはよう", false).await;
        assert!(!outcome.turn.generation_failed);
        assert!(outcome.previous_reaction.is_none());
        assert!((1..=5).contains(&outcome.turn.self_evaluation.score));
        assert_eq!(session.turns().len(), 1);
        assert_eq!(session.exchange_log().len(), 2);
    }

    #[tokio::test]
    async fn test_bridge_failure_degrades_to_fallback() {
        let p = pipeline(Arc::new(FailingBridge));
        let mut session = Session::new();

        let outcome = p.run(&mut session, "おはよう", false).await;
        assert!(outcome.turn.generation_failed);
        assert_eq!(outcome.turn.assistant_text, GENERATION_FALLBACK);
        // The failed turn still gets a self-evaluation and enters history.
        assert_eq!(session.turns().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_bridge_times_out_to_fallback() {
        let p = TurnPipeline::new(
            Arc::new(StalledBridge),
            PersonaProfile::default(),
            Duration::from_millis(100),
        );
        let mut session = Session::new();

        let outcome = p.run(&mut session, "おはよう", false).await;
        assert!(outcome.turn.generation_failed);
        assert_eq!(outcome.turn.assistant_text, GENERATION_FALLBACK);
    }

    #[tokio::test]
    async fn test_reflection_stages_attach_when_enabled() {
        let raw = r#"{"intent": "挨拶", "emotion": "喜", "key_points": [], "tone": "カジュアル"}"#;
        let p = pipeline(Arc::new(CannedBridge(raw)));
        let mut session = Session::new();

        let outcome = p.run(&mut session, "おはよう", true).await;
        assert!(outcome.turn.reflection.is_some());
        assert!(outcome.turn.reasoning.is_some());

        let skipped = p.run(&mut session, "今日も暑いね", false).await;
        assert!(skipped.turn.reflection.is_none());
    }

    #[tokio::test]
    async fn test_second_message_triggers_lagged_evaluation() {
        let p = pipeline(Arc::new(CannedBridge("え〜わかんない！")));
        let mut session = Session::new();

        p.run(&mut session, "おはよう", false).await;
        let outcome = p
            .run(&mut session, "笑 それでどうやって勉強するの？", false)
            .await;

        let reaction = outcome.previous_reaction.expect("previous turn evaluated");
        assert!(reaction.reaction_score > 0.0);
        assert!(session.turns()[0].reaction_evaluation.is_some());
        // The new turn itself still awaits its own reaction.
        assert!(session.turns()[1].reaction_evaluation.is_none());
    }
}
