//! Persona profile for the synthetic speaker.
//!
//! The profile text is injected into the reasoning stage; the name variants
//! drive the name-recognition rule in the self-evaluator.

use serde::{Deserialize, Serialize};

/// Character profile of the persona the pipeline speaks as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaProfile {
    /// Display name used as `speaker_id` on subtitle events.
    pub name: String,
    /// Every spelling of the name that counts as self-reference in a prompt.
    pub name_variants: Vec<String>,
    /// Free-form character sheet handed to the reasoning stage.
    pub profile: String,
}

impl Default for PersonaProfile {
    fn default() -> Self {
        Self {
            name: "牡丹".to_string(),
            name_variants: vec![
                "ボタン".to_string(),
                "牡丹".to_string(),
                "ぼたん".to_string(),
            ],
            profile: "17歳の明るく元気な女子高生ギャル「牡丹」\n\
                      - ギャル語を自然に使う\n\
                      - 明るくポジティブ\n\
                      - 知識をひけらかさない\n\
                      - 相手を「オジサン」と呼ぶ"
                .to_string(),
        }
    }
}

impl PersonaProfile {
    /// True when the text mentions the persona by any known spelling.
    pub fn mentioned_in(&self, text: &str) -> bool {
        self.name_variants.iter().any(|v| text.contains(v.as_str()))
    }
}
