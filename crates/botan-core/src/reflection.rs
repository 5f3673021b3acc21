//! Reflect/reason stage: intent analysis and response-strategy selection.
//!
//! Both stages send an analysis prompt to the generation collaborator and
//! expect JSON back. Model output that cannot be parsed degrades into an
//! explicit fallback structure carrying the raw text, never an error.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::bridge::{GenerationBridge, Parsed};
use crate::persona::PersonaProfile;

/// Intent analysis of one user input (reflect stage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionResult {
    /// What the user is asking for. `"不明"` when the output was unparsable.
    #[serde(default = "unknown_intent")]
    pub intent: String,
    /// Detected emotion (喜怒哀楽 or ニュートラル).
    #[serde(default = "neutral_emotion")]
    pub emotion: String,
    /// Keywords and named entities worth keeping.
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Suggested response tone.
    #[serde(default = "casual_tone")]
    pub tone: String,
    /// Raw model output, kept for diagnostics when parsing failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_analysis: Option<String>,
}

fn unknown_intent() -> String {
    "不明".to_string()
}

fn neutral_emotion() -> String {
    "ニュートラル".to_string()
}

fn casual_tone() -> String {
    "カジュアル".to_string()
}

impl ReflectionResult {
    /// Fallback when the collaborator returned unstructured text.
    pub fn unparsed(raw: String) -> Self {
        Self {
            intent: unknown_intent(),
            emotion: neutral_emotion(),
            key_points: Vec::new(),
            tone: casual_tone(),
            raw_analysis: Some(raw),
        }
    }
}

/// Response strategy derived from the reflection (reason stage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningResult {
    /// Chosen approach (answer / empathize / joke / deflect ...).
    #[serde(default = "default_approach")]
    pub approach: String,
    /// Persona traits to lean on.
    #[serde(default)]
    pub persona_elements: Vec<String>,
    /// Things the response must avoid.
    #[serde(default)]
    pub avoid: Vec<String>,
    /// Concrete direction for the reply.
    #[serde(default = "default_direction")]
    pub direction: String,
    /// Raw model output, kept for diagnostics when parsing failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_reasoning: Option<String>,
}

fn default_approach() -> String {
    "カジュアルな会話".to_string()
}

fn default_direction() -> String {
    "楽しく返す".to_string()
}

impl ReasoningResult {
    /// Fallback when the collaborator returned unstructured text.
    pub fn unparsed(raw: String) -> Self {
        Self {
            approach: default_approach(),
            persona_elements: vec!["明るさ".to_string(), "ギャル語".to_string()],
            avoid: vec!["説教".to_string()],
            direction: default_direction(),
            raw_reasoning: Some(raw),
        }
    }
}

/// Runs the optional reflect → reason stages against the collaborator.
pub struct ReflectionEngine {
    bridge: Arc<dyn GenerationBridge>,
}

impl ReflectionEngine {
    pub fn new(bridge: Arc<dyn GenerationBridge>) -> Self {
        Self { bridge }
    }

    /// Reflect: analyze the user input against recent conversation context.
    /// Collaborator failure or unparsable output both degrade to the fallback.
    pub async fn reflect(&self, user_input: &str, context: &str) -> ReflectionResult {
        let prompt = format!(
            "以下のユーザー入力を分析してください。\n\n\
             【ユーザー入力】\n{}\n\n\
             【過去の文脈】\n{}\n\n\
             【分析項目】\n\
             1. 意図（何を求めているか）\n\
             2. 感情（喜怒哀楽、ニュートラル）\n\
             3. 重要ポイント（キーワード、固有名詞）\n\
             4. 応答のトーン（カジュアル/フォーマル/励まし/共感など）\n\n\
             JSON形式で {{\"intent\", \"emotion\", \"key_points\", \"tone\"}} を返してください。",
            user_input,
            if context.is_empty() { "なし" } else { context },
        );

        match self.bridge.complete(&prompt).await {
            Ok(raw) => match Parsed::<ReflectionResult>::from_completion(&raw) {
                Parsed::Structured(result) => result,
                Parsed::Unstructured(raw) => {
                    tracing::debug!(target: "botan::pipeline", "reflection output unparsable, using fallback");
                    ReflectionResult::unparsed(raw)
                }
            },
            Err(e) => {
                tracing::warn!(target: "botan::pipeline", error = %e, "reflection call failed");
                ReflectionResult::unparsed(String::new())
            }
        }
    }

    /// Reason: derive a response strategy from the reflection and persona.
    pub async fn reason(
        &self,
        user_input: &str,
        reflection: &ReflectionResult,
        persona: &PersonaProfile,
    ) -> ReasoningResult {
        let reflection_json =
            serde_json::to_string_pretty(reflection).unwrap_or_else(|_| "{}".to_string());
        let prompt = format!(
            "{}として、以下の情報を元に応答戦略を考えてください。\n\n\
             【キャラクター】\n{}\n\n\
             【ユーザー入力】\n{}\n\n\
             【入力分析結果】\n{}\n\n\
             【応答戦略を考える】\n\
             1. どのような応答アプローチが適切か\n\
             2. キャラクターらしさをどう表現するか\n\
             3. 避けるべきこと\n\
             4. 具体的な応答の方向性\n\n\
             JSON形式で {{\"approach\", \"persona_elements\", \"avoid\", \"direction\"}} を返してください。",
            persona.name, persona.profile, user_input, reflection_json,
        );

        match self.bridge.complete(&prompt).await {
            Ok(raw) => match Parsed::<ReasoningResult>::from_completion(&raw) {
                Parsed::Structured(result) => result,
                Parsed::Unstructured(raw) => {
                    tracing::debug!(target: "botan::pipeline", "reasoning output unparsable, using fallback");
                    ReasoningResult::unparsed(raw)
                }
            },
            Err(e) => {
                tracing::warn!(target: "botan::pipeline", error = %e, "reasoning call failed");
                ReasoningResult::unparsed(String::new())
            }
        }
    }
}
