//! Reaction-based evaluation of the *previous* assistant response.
//!
//! Pure function over `(prior assistant text, next user input, the user input
//! before that)`. The score is additive from 0.0, classified into a label
//! before clamping to [-2.0, +2.0]. Topic-abruptness uses character-set
//! overlap since Japanese text carries no word boundaries.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Reaction class, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionLabel {
    VeryPositive,
    Positive,
    Neutral,
    Negative,
    VeryNegative,
}

impl ReactionLabel {
    /// Fixed thresholds over the pre-clamp sum.
    fn classify(score: f32) -> Self {
        if score >= 1.5 {
            Self::VeryPositive
        } else if score >= 0.5 {
            Self::Positive
        } else if score >= -0.5 {
            Self::Neutral
        } else if score >= -1.5 {
            Self::Negative
        } else {
            Self::VeryNegative
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::VeryPositive => "非常にポジティブ",
            Self::Positive => "ポジティブ",
            Self::Neutral => "ニュートラル",
            Self::Negative => "ネガティブ",
            Self::VeryNegative => "非常にネガティブ",
        }
    }
}

/// Raw analyzer output, before aggregation with the self-score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionAnalysis {
    /// Clamped score in [-2.0, +2.0].
    pub score: f32,
    pub label: ReactionLabel,
    pub rationale: Vec<String>,
}

const DEEPENING_PATTERNS: &[&str] = &["それで", "どうして", "なんで", "詳しく", "もっと", "例えば"];
const EMPATHY_PATTERNS: &[&str] = &["わかる", "そうだよね", "マジで", "確かに", "いいね", "面白い"];
const LAUGH_PATTERNS: &[&str] = &["笑", "w", "草", "ww", "www", "面白"];
const SHORT_REPLIES: &[&str] = &["うん", "そう", "はい", "へー", "ふーん", "まあ", "..."];

/// Char-set overlap below this, on a long-enough reply, counts as an abrupt
/// topic change.
const TOPIC_OVERLAP_THRESHOLD: f32 = 0.1;

/// Analyze how the user reacted to the prior assistant response.
///
/// `previous_user_input` is the user text *before* the one being analyzed;
/// it enables the progression and abruptness checks.
pub fn analyze_user_reaction(
    prior_response: &str,
    next_user_input: &str,
    previous_user_input: Option<&str>,
) -> ReactionAnalysis {
    let mut score = 0.0_f32;
    let mut rationale = Vec::new();

    let prior_len = prior_response.chars().count();
    let user_len = next_user_input.chars().count();

    // Positive reactions
    if DEEPENING_PATTERNS.iter().any(|p| next_user_input.contains(p)) {
        score += 1.5;
        rationale.push("✅ ユーザーが話題を深掘りしている（会話が続いている）".to_string());
    }

    if EMPATHY_PATTERNS.iter().any(|p| next_user_input.contains(p)) {
        score += 1.0;
        rationale.push("✅ ユーザーが共感・同意している".to_string());
    }

    if LAUGH_PATTERNS.iter().any(|p| next_user_input.contains(p)) {
        score += 1.5;
        rationale.push("✅ ユーザーが笑っている（良い反応）".to_string());
    }

    if let Some(prev) = previous_user_input {
        if user_len > 10 && prev != next_user_input {
            score += 0.5;
            rationale.push("✅ 会話が自然に発展している".to_string());
        }
    }

    // Negative reactions
    if let Some(prev) = previous_user_input {
        let prev_chars: HashSet<char> = prev.chars().collect();
        let next_chars: HashSet<char> = next_user_input.chars().collect();
        let overlap = if prev_chars.is_empty() {
            0.0
        } else {
            prev_chars.intersection(&next_chars).count() as f32 / prev_chars.len() as f32
        };
        if overlap < TOPIC_OVERLAP_THRESHOLD && user_len > 5 {
            score -= 1.0;
            rationale.push("❌ ユーザーが話題を変えた（応答に興味がない？）".to_string());
        }
    }

    if SHORT_REPLIES.contains(&next_user_input) || user_len <= 3 {
        score -= 1.5;
        rationale.push("❌ ユーザーの返事が短い（無関心？）".to_string());
    }

    if let Some(prev) = previous_user_input {
        if prev.trim() == next_user_input.trim() {
            score -= 2.0;
            rationale.push("❌ ユーザーが同じ質問を繰り返している（答えていない）".to_string());
        }
    }

    // Turn-taking balance
    if prior_len > 100 {
        if user_len < 10 {
            score -= 1.5;
            rationale.push("❌ 自分語りしすぎ → ユーザーが短文（キャッチボールできてない）".to_string());
        } else {
            rationale.push("⚠️ 応答が長い（100文字超）が、ユーザーは続けている".to_string());
        }
    } else if (30..=70).contains(&prior_len) {
        if user_len >= 10 {
            score += 0.5;
            rationale.push("✅ 応答が適度 → ユーザーが続ける（良いキャッチボール）".to_string());
        }
    } else if prior_len < 20 && user_len < 10 {
        score -= 0.5;
        rationale.push("❌ 応答が短すぎ → ユーザーも短い（会話が盛り上がってない）".to_string());
    }

    let label = ReactionLabel::classify(score);
    ReactionAnalysis {
        score: score.clamp(-2.0, 2.0),
        label,
        rationale,
    }
}
