//! AI-content detection and final report types (§4.3.1, §4.3.4).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionVerdict {
    LikelyAi,
    PossiblyAi,
    LikelyHuman,
    Uncertain,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SectionResult {
    pub slide_number: u32,
    pub result: SectionVerdict,
    pub confidence: u8,
    pub indicators: Vec<String>,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AiDetectionReport {
    pub overall_result: SectionVerdict,
    pub overall_confidence: u8,
    pub total_sections: usize,
    pub ai_likely_sections: usize,
    pub sections: Vec<SectionResult>,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Pass,
    ConditionalPass,
    Fail,
    NeedsReview,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct FinalReport {
    pub technical_understanding: u8,
    pub project_ownership: u8,
    pub communication_clarity: u8,
    pub ai_content_concerns: Vec<String>,
    pub knowledge_gaps: Vec<String>,
    pub overall_assessment: String,
    pub recommendation: Recommendation,
    pub next_steps: Vec<String>,
}
