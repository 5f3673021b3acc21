//! Response-quality evaluation: the rule-based self-evaluator, the lagged
//! reaction analyzer, and the score aggregator. Everything here is
//! synchronous, CPU-only, and deterministic.

mod combine;
mod reaction;
mod self_eval;

pub use combine::{combine, ScoreBreakdown};
pub use reaction::{analyze_user_reaction, ReactionAnalysis, ReactionLabel};
pub use self_eval::{Category, HeuristicScorer, SelfEvaluation};
