//! Session: ordered turn history, the lagged reaction evaluation, and
//! running statistics.
//!
//! The one-turn lag is an explicit state transition on [`Turn`]: a turn is
//! created with `reaction_evaluation: None` and receives it exactly once,
//! when the *next* user message for the same session arrives. A client that
//! disconnects first leaves the field permanently absent; that is recorded
//! in the statistics, not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::bridge::ChatMessage;
use crate::error::CoreResult;
use crate::evaluation::{analyze_user_reaction, combine, ReactionLabel, SelfEvaluation};
use crate::reflection::{ReasoningResult, ReflectionResult};

/// Reaction-based evaluation of a turn, filled in retroactively.
/// Immutable once created; a session never overwrites one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEvaluation {
    /// Reaction score in [-2.0, +2.0].
    pub reaction_score: f32,
    pub reaction_type: ReactionLabel,
    pub rationale: Vec<String>,
    /// Self-score corrected by the reaction, in [1.0, 5.0].
    pub combined_score: f32,
}

/// One user/assistant exchange plus its evaluations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub timestamp: DateTime<Utc>,
    pub user_text: String,
    pub assistant_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<ReflectionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningResult>,
    /// True when the assistant text is the apologetic fallback after a
    /// collaborator transport failure or timeout.
    #[serde(default)]
    pub generation_failed: bool,
    pub self_evaluation: SelfEvaluation,
    /// Set once, by the next inbound user message. Never overwritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction_evaluation: Option<ReactionEvaluation>,
}

/// Running statistics, always derivable by folding over the turn list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionStats {
    pub total_turns: usize,
    /// Mean self-score.
    pub average_score: f32,
    /// Mean combined score; turns without a reaction fall back to self-score.
    pub average_combined_score: f32,
    pub min_score: u8,
    pub max_score: u8,
    /// Turns whose combined score is >= 4.
    pub high_quality_turns: usize,
    /// Turns that received a reaction evaluation at all.
    pub turns_with_reaction: usize,
}

/// Persisted session record (best-effort, on session end).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_start: DateTime<Utc>,
    pub session_end: DateTime<Utc>,
    pub model: String,
    pub statistics: SessionStats,
    pub conversations: Vec<Turn>,
}

/// One logical conversation. Owned by the process for its lifetime; callers
/// serialize access per session (one critical section covers the lagged
/// evaluation and the pipeline run for an inbound message).
#[derive(Debug)]
pub struct Session {
    started_at: DateTime<Utc>,
    turns: Vec<Turn>,
    /// Rolling role-tagged exchange log handed to the generation bridge.
    exchange_log: Vec<ChatMessage>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            turns: Vec::new(),
            exchange_log: Vec::new(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn exchange_log(&self) -> &[ChatMessage] {
        &self.exchange_log
    }

    pub fn push_exchange(&mut self, message: ChatMessage) {
        self.exchange_log.push(message);
    }

    /// Recent conversation context for the reflect stage, oldest first.
    pub fn recent_context(&self, max_turns: usize, persona_name: &str) -> String {
        self.exchange_log
            .iter()
            .rev()
            .take(max_turns * 2)
            .rev()
            .map(|m| {
                let speaker = if m.role == "user" { "ユーザー" } else { persona_name };
                format!("{}: {}", speaker, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Appends a completed turn. Its reaction evaluation must be unset; the
    /// next inbound message fills it in.
    pub fn append_turn(&mut self, turn: Turn) {
        debug_assert!(turn.reaction_evaluation.is_none());
        self.turns.push(turn);
    }

    /// Lagged evaluation: scores the most recent turn using the newly arrived
    /// user input. No-op when there is no prior turn or it was already
    /// evaluated (the evaluation is written exactly once).
    ///
    /// Returns a copy of the evaluation that was attached, if any.
    pub fn evaluate_previous_turn(&mut self, next_user_input: &str) -> Option<ReactionEvaluation> {
        let previous_user = if self.turns.len() >= 2 {
            Some(self.turns[self.turns.len() - 2].user_text.clone())
        } else {
            None
        };

        let last = self.turns.last_mut()?;
        if last.reaction_evaluation.is_some() {
            return None;
        }

        let analysis = analyze_user_reaction(
            &last.assistant_text,
            next_user_input,
            previous_user.as_deref(),
        );
        let breakdown = combine(last.self_evaluation.score, analysis.score);
        let evaluation = ReactionEvaluation {
            reaction_score: analysis.score,
            reaction_type: analysis.label,
            rationale: analysis.rationale,
            combined_score: breakdown.combined_score,
        };

        tracing::debug!(
            target: "botan::session",
            reaction = evaluation.reaction_score,
            combined = evaluation.combined_score,
            "lagged reaction evaluation attached"
        );

        last.reaction_evaluation = Some(evaluation.clone());
        Some(evaluation)
    }

    /// Pure fold over the turn list; never maintained incrementally, so it
    /// cannot drift from the history.
    pub fn statistics(&self) -> SessionStats {
        if self.turns.is_empty() {
            return SessionStats::default();
        }

        let self_scores: Vec<u8> = self.turns.iter().map(|t| t.self_evaluation.score).collect();
        let combined_scores: Vec<f32> = self
            .turns
            .iter()
            .map(|t| {
                t.reaction_evaluation
                    .as_ref()
                    .map(|r| r.combined_score)
                    .unwrap_or(t.self_evaluation.score as f32)
            })
            .collect();

        let total = self_scores.len();
        SessionStats {
            total_turns: total,
            average_score: self_scores.iter().map(|&s| s as f32).sum::<f32>() / total as f32,
            average_combined_score: combined_scores.iter().sum::<f32>() / total as f32,
            min_score: self_scores.iter().copied().min().unwrap_or(0),
            max_score: self_scores.iter().copied().max().unwrap_or(0),
            high_quality_turns: combined_scores.iter().filter(|&&s| s >= 4.0).count(),
            turns_with_reaction: self
                .turns
                .iter()
                .filter(|t| t.reaction_evaluation.is_some())
                .count(),
        }
    }

    /// Drops the turn history and exchange log (explicit history clear).
    pub fn clear(&mut self) {
        self.turns.clear();
        self.exchange_log.clear();
    }

    /// Snapshot for persistence.
    pub fn to_record(&self, model: &str) -> SessionRecord {
        SessionRecord {
            session_start: self.started_at,
            session_end: Utc::now(),
            model: model.to_string(),
            statistics: self.statistics(),
            conversations: self.turns.clone(),
        }
    }

    /// Best-effort write of the session record. Callers log failures; the
    /// session itself is unaffected either way.
    pub fn persist(&self, dir: &str, model: &str) -> CoreResult<PathBuf> {
        let record = self.to_record(model);
        std::fs::create_dir_all(dir)?;
        let filename = format!(
            "learning_session_{}.json",
            self.started_at.format("%Y%m%d_%H%M%S")
        );
        let path = PathBuf::from(dir).join(filename);
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Category;

    fn turn(user: &str, assistant: &str, score: u8) -> Turn {
        Turn {
            timestamp: Utc::now(),
            user_text: user.to_string(),
            assistant_text: assistant.to_string(),
            reflection: None,
            reasoning: None,
            generation_failed: false,
            self_evaluation: SelfEvaluation {
                score,
                category: Category::CasualRegister,
                rationale: Vec::new(),
            },
            reaction_evaluation: None,
        }
    }

    #[test]
    fn test_reaction_is_unset_until_next_turn_arrives() {
        let mut session = Session::new();
        session.append_turn(turn("おはよう", "やっほ〜！おはよ！", 4));
        assert!(session.turns()[0].reaction_evaluation.is_none());

        let attached = session.evaluate_previous_turn("笑 それでどうやって勉強するの？");
        assert!(attached.is_some());
        assert!(session.turns()[0].reaction_evaluation.is_some());
    }

    #[test]
    fn test_reaction_is_never_overwritten() {
        let mut session = Session::new();
        session.append_turn(turn("おはよう", "やっほ〜！", 4));
        session.evaluate_previous_turn("笑 面白いじゃん");
        let first = session.turns()[0]
            .reaction_evaluation
            .as_ref()
            .unwrap()
            .reaction_score;

        // A second message must not rewrite the existing evaluation.
        assert!(session.evaluate_previous_turn("へー").is_none());
        let second = session.turns()[0]
            .reaction_evaluation
            .as_ref()
            .unwrap()
            .reaction_score;
        assert_eq!(first, second);
    }

    #[test]
    fn test_statistics_match_fresh_recomputation() {
        let mut session = Session::new();
        session.append_turn(turn("おはよう", "やっほ〜！", 4));
        session.evaluate_previous_turn("笑 それで最近どう？");
        session.append_turn(turn("笑 それで最近どう？", "めっちゃ元気だよ！", 5));
        session.append_turn(turn("そっか", "うん！", 3));

        let stored = session.statistics();
        let recomputed = session.statistics();
        assert_eq!(stored, recomputed);
        assert_eq!(stored.total_turns, 3);
        assert_eq!(stored.turns_with_reaction, 1);
        assert_eq!(stored.min_score, 3);
        assert_eq!(stored.max_score, 5);
    }

    #[test]
    fn test_combined_average_falls_back_to_self_score() {
        let mut session = Session::new();
        session.append_turn(turn("おはよう", "やっほ〜！", 4));
        let stats = session.statistics();
        assert_eq!(stats.average_combined_score, 4.0);
        assert_eq!(stats.turns_with_reaction, 0);
    }

    #[test]
    fn test_empty_session_statistics_are_zero() {
        let stats = Session::new().statistics();
        assert_eq!(stats.total_turns, 0);
        assert_eq!(stats.average_score, 0.0);
    }

    #[test]
    fn test_persist_writes_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new();
        session.append_turn(turn("おはよう", "やっほ〜！", 4));

        let path = session
            .persist(dir.path().to_str().unwrap(), "elyza:botan_custom")
            .unwrap();
        let raw = std::fs::read_to_string(path).unwrap();
        let record: SessionRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.conversations.len(), 1);
        assert_eq!(record.model, "elyza:botan_custom");
    }

    #[test]
    fn test_clear_resets_history_and_log() {
        let mut session = Session::new();
        session.push_exchange(ChatMessage::user("おはよう"));
        session.append_turn(turn("おはよう", "やっほ〜！", 4));
        session.clear();
        assert!(session.turns().is_empty());
        assert!(session.exchange_log().is_empty());
    }
}
