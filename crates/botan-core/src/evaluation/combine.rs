//! Score aggregation: the reaction score is a *correction* to the
//! self-assessment, not an independent vote, so the blend is additive.

use serde::{Deserialize, Serialize};

/// How a combined score was assembled, kept for auditability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub self_score: u8,
    pub reaction_score: f32,
    /// Reaction rescaled from [-2, +2] to [-1, +1] before the blend.
    pub reaction_adjustment: f32,
    pub combined_score: f32,
}

/// Blend a 1–5 self-score with a [-2, +2] reaction score.
/// `combined = clamp(self + reaction / 2, 1, 5)`.
pub fn combine(self_score: u8, reaction_score: f32) -> ScoreBreakdown {
    let reaction_adjustment = reaction_score / 2.0;
    let combined_score = (self_score as f32 + reaction_adjustment).clamp(1.0, 5.0);
    ScoreBreakdown {
        self_score,
        reaction_score,
        reaction_adjustment,
        combined_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_clamps_ceiling_and_floor() {
        assert_eq!(combine(5, 2.0).combined_score, 5.0);
        assert_eq!(combine(1, -2.0).combined_score, 1.0);
    }

    #[test]
    fn test_neutral_reaction_is_identity() {
        for s in 1..=5u8 {
            assert_eq!(combine(s, 0.0).combined_score, s as f32);
        }
    }

    #[test]
    fn test_positive_reaction_raises_midrange_score() {
        let breakdown = combine(3, 1.0);
        assert_eq!(breakdown.combined_score, 3.5);
        assert_eq!(breakdown.reaction_adjustment, 0.5);
    }
}
