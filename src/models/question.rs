//! Question and evaluation types (§3 "Question", "Evaluation").

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Easy,
    Medium,
    Hard,
}

impl Level {
    /// Iteration order used by `ask_question`: easy, then medium, then hard.
    pub const ORDER: [Level; 3] = [Level::Easy, Level::Medium, Level::Hard];

    pub fn next(self) -> Option<Level> {
        match self {
            Level::Easy => Some(Level::Medium),
            Level::Medium => Some(Level::Hard),
            Level::Hard => None,
        }
    }

    /// Default counts generated per level (§4.3.2).
    pub fn default_count(self) -> usize {
        match self {
            Level::Easy => 5,
            Level::Medium => 5,
            Level::Hard => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Question {
    pub id: String,
    pub level: Level,
    pub text: String,
    pub grounding_context: String,
    pub expected_points: Vec<String>,
    pub slide_reference: Option<u32>,
}

/// One batch of generated questions for a single level (§4.3.2).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct QuestionBatch {
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Evaluation {
    pub question_id: String,
    pub score: u8,
    pub feedback: String,
    pub demonstrates_understanding: bool,
    pub flagged_concerns: Vec<String>,
}

impl Evaluation {
    /// Clamp a raw LLM-reported score into the documented `[1..10]` range
    /// (§3 "Evaluation" invariant) instead of trusting the model output.
    pub fn clamp_score(score: i64) -> u8 {
        score.clamp(1, 10) as u8
    }
}
