//! End-to-end dialogue flow over a canned generation bridge: two turns,
//! lagged evaluation of the first, statistics, and persistence.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use botan_core::{
    ChatMessage, CoreResult, GenerationBridge, PersonaProfile, ReactionLabel, Session,
    SessionRecord, TurnPipeline,
};

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

fn pipeline(reply: &'static str) -> TurnPipeline {
    TurnPipeline::new(
        Arc::new(CannedBridge(reply)),
        PersonaProfile::default(),
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn test_two_turn_flow_with_lagged_evaluation() {
    let p = pipeline("うん！ぼたん元気！");
    let mut session = Session::new();

    // First turn: no prior turn, so nothing to evaluate retroactively.
    let first = p.run(&mut session, "おはよう", false).await;
    assert!(first.previous_reaction.is_none());
    assert_eq!(first.turn.self_evaluation.score, 4);
    assert!(session.turns()[0].reaction_evaluation.is_none());

    // Second turn: an engaged follow-up (laughter + deepening question)
    // retroactively scores the first turn above its self-assessment.
    let second = p
        .run(&mut session, "笑 それでどうやって勉強するの？", false)
        .await;
    let reaction = second.previous_reaction.expect("first turn evaluated");
    assert_eq!(reaction.reaction_type, ReactionLabel::VeryPositive);
    assert!(reaction.combined_score > first.turn.self_evaluation.score as f32);

    // The evaluation landed on the stored turn, and the second turn still
    // awaits its own.
    assert!(session.turns()[0].reaction_evaluation.is_some());
    assert!(session.turns()[1].reaction_evaluation.is_none());
}

#[tokio::test]
async fn test_statistics_reflect_combined_scores() {
    let p = pipeline("うん！ぼたん元気！");
    let mut session = Session::new();

    p.run(&mut session, "おはよう", false).await;
    p.run(&mut session, "笑 それでどうやって勉強するの？", false)
        .await;

    let stats = session.statistics();
    assert_eq!(stats.total_turns, 2);
    assert_eq!(stats.turns_with_reaction, 1);
    assert_eq!(stats.average_score, 4.0);
    // First turn combined 5.0, second falls back to its self-score 4.0.
    assert_eq!(stats.average_combined_score, 4.5);
    assert_eq!(stats.high_quality_turns, 2);
}

#[tokio::test]
async fn test_persisted_record_round_trips() {
    let p = pipeline("うん！ぼたん元気！");
    let mut session = Session::new();

    p.run(&mut session, "おはよう", false).await;
    p.run(&mut session, "笑 それでどうやって勉強するの？", false)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = session
        .persist(dir.path().to_str().unwrap(), "elyza:botan_custom")
        .unwrap();

    let raw = std::fs::read_to_string(path).unwrap();
    let record: SessionRecord = serde_json::from_str(&raw).unwrap();
    assert_eq!(record.model, "elyza:botan_custom");
    assert_eq!(record.conversations.len(), 2);
    assert_eq!(record.statistics, session.statistics());
    assert!(record.session_end >= record.session_start);
}
