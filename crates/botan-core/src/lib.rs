//! botan-core: dialogue turn orchestration and lagged evaluation for the
//! Botan persona (session registry, staged turn pipeline, rule-based
//! self-evaluation, reaction-based lagged evaluation, score aggregation).
//!
//! Re-exports the full public surface so the gateway and tools keep a
//! consistent API.

mod bridge;
mod config;
mod error;
pub mod evaluation;
mod persona;
mod pipeline;
mod protocol;
mod reflection;
mod registry;
mod session;

pub use bridge::{ChatMessage, GenerationBridge, OllamaBridge, Parsed};
pub use config::CoreConfig;
pub use error::{CoreError, CoreResult, RegistryError};
pub use evaluation::{
    analyze_user_reaction, combine, Category, HeuristicScorer, ReactionAnalysis, ReactionLabel,
    ScoreBreakdown, SelfEvaluation,
};
pub use persona::PersonaProfile;
pub use pipeline::{PipelineOutcome, TurnPipeline, TurnStage, GENERATION_FALLBACK};
pub use protocol::{ClientMessage, EvaluationPayload, ServerMessage};
pub use reflection::{ReasoningResult, ReflectionEngine, ReflectionResult};
pub use registry::{ConnectionGroup, ConnectionRegistry};
pub use session::{ReactionEvaluation, Session, SessionRecord, SessionStats, Turn};
