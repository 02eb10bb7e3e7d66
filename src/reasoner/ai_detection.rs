//! AI-content detection task (§4.3.1).

use crate::config::RetryConfig;
use crate::error::ProviderError;
use crate::models::{AiDetectionReport, Slide};
use crate::orchestrator::circuit_breaker::CircuitBreaker;
use crate::providers::LlmProvider;

const SYSTEM_PROMPT: &str = "You are an expert reviewer of student project presentations. \
Given the slides of a presentation, assess for each slide whether its content reads as \
written or substantially assisted by an AI writing tool, versus written by the student \
themselves. Base your judgment on indicators like generic phrasing, absence of \
project-specific detail, inconsistent voice, and overly polished structure. Be conservative: \
prefer `uncertain` over a confident wrong call when evidence is thin.";

pub async fn detect_ai_content(
    llm: &dyn LlmProvider,
    model: &str,
    slides: &[Slide],
    retry: &RetryConfig,
    breaker: &CircuitBreaker,
) -> Result<AiDetectionReport, ProviderError> {
    let user_prompt = render_slides(slides);
    super::run_structured_task::<AiDetectionReport>(
        llm,
        model,
        SYSTEM_PROMPT,
        &user_prompt,
        retry,
        breaker,
        "llm.detect_ai_content",
    )
    .await
}

fn render_slides(slides: &[Slide]) -> String {
    let mut out = String::new();
    for slide in slides {
        out.push_str(&format!("### Slide {}\n", slide.number));
        if let Some(title) = &slide.title {
            out.push_str(&format!("Title: {title}\n"));
        }
        if !slide.content.is_empty() {
            out.push_str(&format!("{}\n", slide.content));
        }
        for bullet in &slide.bullets {
            out.push_str(&format!("- {bullet}\n"));
        }
        out.push('\n');
    }
    out
}
