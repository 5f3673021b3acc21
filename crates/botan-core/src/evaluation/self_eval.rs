//! Rule-based self-evaluation of one assistant response.
//!
//! Deterministic and panic-free: indicator groups are data, not code paths.
//! Each group fires at most once per response, positives are deliberately
//! smaller than negatives (sounding explanatory is punished harder than
//! sounding casual is rewarded), and length is scored on a tiered band that
//! gets monotonically harsher past 50 characters.
//!
//! The literal weights were tuned by trial against recorded conversations;
//! they are plain constants here, not load-bearing contracts.

use serde::{Deserialize, Serialize};

use crate::persona::PersonaProfile;

/// Mutually exclusive evaluation category, inferred from the user prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Factual question: the persona should deflect, not lecture.
    KnowledgeDeflection,
    /// Emotional statement: the persona should respond with feeling.
    EmotionalResponse,
    /// Everything else: casual register is what counts.
    CasualRegister,
}

impl Category {
    /// Keyword heuristic over the user input.
    pub fn infer(user_input: &str) -> Self {
        const KNOWLEDGE_KEYWORDS: &[&str] = &["何", "教えて", "どのくらい", "メートル", "って何"];
        const EMOTION_KEYWORDS: &[&str] = &["嬉しい", "疲れ", "可愛い", "ボタン", "牡丹"];

        if KNOWLEDGE_KEYWORDS.iter().any(|kw| user_input.contains(kw)) {
            Self::KnowledgeDeflection
        } else if EMOTION_KEYWORDS.iter().any(|kw| user_input.contains(kw)) {
            Self::EmotionalResponse
        } else {
            Self::CasualRegister
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::KnowledgeDeflection => "知識をひけらかさない",
            Self::EmotionalResponse => "感情表現",
            Self::CasualRegister => "ギャル語",
        }
    }
}

/// Result of the rule-based self-evaluation. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfEvaluation {
    /// Integer quality score, 1–5.
    pub score: u8,
    pub category: Category,
    /// Ordered human-readable rationale (auditability, not machine use).
    pub rationale: Vec<String>,
}

/// One indicator group: a named phrase set with a signed weight.
/// Fires at most once per response, on the first matching phrase.
struct IndicatorGroup {
    name: &'static str,
    phrases: &'static [&'static str],
    weight: f32,
}

const BASELINE: f32 = 2.5;

const POSITIVE_GROUPS: &[IndicatorGroup] = &[
    IndicatorGroup { name: "ギャル語使用", phrases: &["じゃん", "よね", "だよ", "って"], weight: 0.5 },
    IndicatorGroup { name: "感情表現", phrases: &["マジで", "ヤバい", "めっちゃ", "え〜", "わ〜"], weight: 0.5 },
    IndicatorGroup { name: "ごまかし", phrases: &["わかんない", "忘れ", "知らな", "苦手"], weight: 0.5 },
    IndicatorGroup { name: "一人称", phrases: &["ぼたん"], weight: 0.5 },
];

const NEGATIVE_GROUPS: &[IndicatorGroup] = &[
    IndicatorGroup { name: "AIっぽい", phrases: &["です。", "ます。", "について", "られます", "ございます", "なります"], weight: -1.0 },
    IndicatorGroup { name: "詳しすぎ", phrases: &["メートル", "センチ", "キロ", "詳しく", "具体的", "正確"], weight: -1.0 },
    IndicatorGroup { name: "堅い表現", phrases: &["説明", "解説", "情報", "データ", "一般的", "場合", "例えば"], weight: -1.0 },
    IndicatorGroup { name: "教科書的", phrases: &["とは", "という", "といった", "などの", "つまり", "要するに"], weight: -1.0 },
    IndicatorGroup { name: "長文説明", phrases: &["それで", "なので", "だから", "ですが、", "ますが、"], weight: -1.0 },
    IndicatorGroup { name: "難しいカタカナ語", phrases: &["システム", "プログラム", "アルゴリズム", "データ", "プロセス", "メカニズム"], weight: -1.0 },
    IndicatorGroup { name: "難しい言葉", phrases: &["実装", "機能", "設定", "構造", "処理", "最適", "効率"], weight: -0.8 },
];

/// Length bands: `(inclusive upper bound in chars, adjustment)`, checked in
/// order; responses longer than the last bound take `LENGTH_OVERFLOW`.
const LENGTH_TIERS: &[(usize, f32, &str)] = &[
    (50, 1.0, "✅ 簡潔な応答（50文字以内）"),
    (70, -0.3, "⚠️ やや長い（50-70文字）"),
    (100, -1.3, "❌ 長すぎる（70-100文字）"),
    (150, -2.5, "❌❌ 長ったらしい（100-150文字）"),
];
const LENGTH_OVERFLOW: (f32, &str) = (-3.0, "❌❌ 長ったらしい（150文字超）");

/// Hiragana proportion above this earns the lexical-simplicity bonus.
const HIRAGANA_RATIO_THRESHOLD: f32 = 0.6;
const HIRAGANA_BONUS: f32 = 0.5;

const DEFLECTION_WORDS: &[&str] = &["わかんない", "知らない", "忘れ", "苦手"];
const HEDGE_MARKERS: &[&str] = &["？", "かも", "〜", "くらい"];
const EMOTIONAL_WORDS: &[&str] = &[
    "嬉しい", "楽しい", "わかる", "いいね", "かわいい", "疲れた", "大変", "気になる", "興味",
];
const QUESTION_REACTIONS: &[&str] = &["何", "教えて", "？"];
const CASUAL_ENDINGS: &[&str] = &["じゃん", "よね", "だよ", "かも", "って"];

/// Category-aware rule-based scorer for the persona's responses.
pub struct HeuristicScorer {
    persona: PersonaProfile,
}

impl HeuristicScorer {
    pub fn new(persona: PersonaProfile) -> Self {
        Self { persona }
    }

    /// Score one `(prompt, response)` pair. Never fails: empty input is
    /// treated as length 0 with neutral defaults.
    pub fn evaluate(&self, prompt: &str, response: &str, category: Category) -> SelfEvaluation {
        let mut total = BASELINE;
        let mut rationale = Vec::new();
        let response_len = response.chars().count();

        for group in POSITIVE_GROUPS {
            if let Some(phrase) = group.phrases.iter().find(|p| response.contains(**p)) {
                total += group.weight;
                rationale.push(format!("✅ {}: '{}'を使用", group.name, phrase));
            }
        }

        for group in NEGATIVE_GROUPS {
            if let Some(phrase) = group.phrases.iter().find(|p| response.contains(**p)) {
                total += group.weight;
                rationale.push(format!("❌ {}: '{}'を使用", group.name, phrase));
            }
        }

        let (length_adjustment, length_note) = LENGTH_TIERS
            .iter()
            .find(|(bound, _, _)| response_len <= *bound)
            .map(|(_, adj, note)| (*adj, *note))
            .unwrap_or(LENGTH_OVERFLOW);
        total += length_adjustment;
        rationale.push(length_note.to_string());

        if response_len > 0 {
            let hiragana = response
                .chars()
                .filter(|c| ('\u{3040}'..='\u{309F}').contains(c))
                .count();
            if hiragana as f32 / response_len as f32 > HIRAGANA_RATIO_THRESHOLD {
                total += HIRAGANA_BONUS;
                rationale.push("✅ ひらがな多め（語彙力少なく見える）".to_string());
            }
        }

        total += match category {
            Category::KnowledgeDeflection => self.score_deflection(response, response_len, &mut rationale),
            Category::EmotionalResponse => self.score_emotion(response, &mut rationale),
            Category::CasualRegister => self.score_casual(response, &mut rationale),
        };

        total += self.score_name_recognition(prompt, response, &mut rationale);

        // Ties round to even, so an exact 2.5 total stays a 2.
        let score = total.clamp(1.0, 5.0).round_ties_even() as u8;
        SelfEvaluation { score, category, rationale }
    }

    /// Knowledge questions: precise answers are penalized, short deflections
    /// rewarded, and the shorter the deflection the better.
    fn score_deflection(&self, response: &str, len: usize, rationale: &mut Vec<String>) -> f32 {
        let mut adjustment = 0.0;

        let has_digit = response
            .chars()
            .any(|c| c.is_ascii_digit() || ('０'..='９').contains(&c));
        if has_digit {
            if HEDGE_MARKERS.iter().any(|m| response.contains(m)) {
                adjustment += 0.5;
                rationale.push("✅ 数字を使っているが曖昧".to_string());
            } else {
                adjustment -= 1.5;
                rationale.push("❌ 正確な数字を答えている".to_string());
            }
        }

        if DEFLECTION_WORDS.iter().any(|w| response.contains(w)) {
            if len < 30 {
                adjustment += 2.0;
                rationale.push("✅✅ 短くサッとごまかす（完璧）".to_string());
            } else if len < 50 {
                adjustment += 1.0;
                rationale.push("✅ ごまかしているが少し長い".to_string());
            } else {
                adjustment -= 0.5;
                rationale.push("❌ 長々とごまかしている（AIっぽい）".to_string());
            }
        } else if len > 30 {
            adjustment -= 1.0;
            rationale.push("❌ 知識を説明している".to_string());
        }

        adjustment
    }

    /// Emotional prompts: reward empathy or a curious question back, plus
    /// expressing the persona's own feelings.
    fn score_emotion(&self, response: &str, rationale: &mut Vec<String>) -> f32 {
        let mut adjustment = 0.0;

        let has_emotion = EMOTIONAL_WORDS.iter().any(|w| response.contains(w));
        let asks_back = QUESTION_REACTIONS.iter().any(|w| response.contains(w));
        if has_emotion || asks_back {
            adjustment += 0.5;
            rationale.push("✅ 感情的な応答あり".to_string());
        } else {
            adjustment -= 0.5;
            rationale.push("❌ 感情的な応答が不足".to_string());
        }

        let self_emotion = self
            .persona
            .name_variants
            .iter()
            .flat_map(|v| [format!("{}も", v), format!("{}、", v), format!("{}が", v)])
            .chain(["あたしも".to_string(), "私も".to_string()])
            .any(|marker| response.contains(&marker));
        if self_emotion {
            adjustment += 0.5;
            rationale.push("✅ 自分の感情も表現".to_string());
        }

        adjustment
    }

    /// Casual register: count distinct casual sentence endings.
    fn score_casual(&self, response: &str, rationale: &mut Vec<String>) -> f32 {
        let ending_count = CASUAL_ENDINGS.iter().filter(|e| response.contains(**e)).count();
        match ending_count {
            0 => {
                rationale.push("❌ ギャル語の語尾が不足".to_string());
                -0.5
            }
            1 => {
                rationale.push("✅ ギャル語の語尾あり".to_string());
                0.3
            }
            _ => {
                rationale.push("✅ ギャル語の語尾が豊富".to_string());
                0.5
            }
        }
    }

    /// When the prompt names the persona, the response must treat it as
    /// self-reference; answering as if it meant something else is penalized.
    fn score_name_recognition(
        &self,
        prompt: &str,
        response: &str,
        rationale: &mut Vec<String>,
    ) -> f32 {
        if !self.persona.mentioned_in(prompt) {
            return 0.0;
        }

        let acknowledged = self
            .persona
            .name_variants
            .iter()
            .map(|v| format!("{}のこと", v))
            .chain(["自分のこと".to_string(), "私のこと".to_string()])
            .any(|marker| response.contains(&marker));

        if acknowledged {
            rationale.push("✅✅ 名前を認識して反応（重要）".to_string());
            1.5
        } else {
            rationale.push("❌ 名前を認識せず別の解釈".to_string());
            -1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> HeuristicScorer {
        HeuristicScorer::new(PersonaProfile::default())
    }

    #[test]
    fn test_formal_long_response_scores_low() {
        // Formal/explanatory markers, padded past 100 chars.
        let response = "です。について説明します。".repeat(10);
        assert!(response.chars().count() > 100);
        let eval = scorer().evaluate("東京タワーって何？", &response, Category::CasualRegister);
        assert!(eval.score <= 2, "score was {}", eval.score);
    }

    #[test]
    fn test_short_evasive_casual_response_scores_high() {
        let eval = scorer().evaluate(
            "東京タワーって何メートル？",
            "え〜わかんない！",
            Category::KnowledgeDeflection,
        );
        assert!(eval.score >= 4, "score was {}", eval.score);
    }

    #[test]
    fn test_precise_number_penalized_in_knowledge_category() {
        let hedged = scorer().evaluate("富士山の高さは？", "3776メートルくらいかも？", Category::KnowledgeDeflection);
        let precise = scorer().evaluate("富士山の高さは？", "3776メートルです。", Category::KnowledgeDeflection);
        assert!(hedged.score > precise.score);
    }

    #[test]
    fn test_name_recognition_rewarded() {
        let acknowledged = scorer().evaluate(
            "ボタンって可愛いね",
            "え、ぼたんのこと？マジで嬉しいじゃん！",
            Category::EmotionalResponse,
        );
        let ignored = scorer().evaluate(
            "ボタンって可愛いね",
            "服のボタンの話？",
            Category::EmotionalResponse,
        );
        assert!(acknowledged.score > ignored.score);
        assert!(acknowledged
            .rationale
            .iter()
            .any(|r| r.contains("名前を認識して反応")));
    }

    #[test]
    fn test_exact_half_total_rounds_to_even() {
        // Two positive groups, hiragana bonus, short length, zero casual
        // endings: 2.5 + 0.5 + 0.5 + 1.0 + 0.5 - 0.5 = 4.5, which rounds
        // down to the even 4.
        let eval = scorer().evaluate("おはよう", "え〜わかんないなあ", Category::CasualRegister);
        assert_eq!(eval.score, 4);
    }

    #[test]
    fn test_empty_response_is_neutral_not_panicking() {
        let eval = scorer().evaluate("", "", Category::CasualRegister);
        assert!((1..=5).contains(&eval.score));
    }

    #[test]
    fn test_category_inference() {
        assert_eq!(Category::infer("東京タワーって何メートル？"), Category::KnowledgeDeflection);
        assert_eq!(Category::infer("今日めっちゃ嬉しいことがあった！"), Category::EmotionalResponse);
        assert_eq!(Category::infer("おはよう"), Category::CasualRegister);
    }

    #[test]
    fn test_length_penalty_is_monotonic_past_floor() {
        let s = scorer();
        let base = "うん、げんきだよ";
        let bands = [
            base.chars().take(8).collect::<String>(),
            "ねー".repeat(30),  // 60 chars
            "ねー".repeat(45),  // 90 chars
            "ねー".repeat(65),  // 130 chars
            "ねー".repeat(90),  // 180 chars
        ];
        let scores: Vec<u8> = bands
            .iter()
            .map(|r| s.evaluate("最近どう？", r, Category::CasualRegister).score)
            .collect();
        for pair in scores.windows(2) {
            assert!(pair[0] >= pair[1], "scores not monotonic: {:?}", scores);
        }
    }
}
