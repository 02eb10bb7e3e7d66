//! Question generation task (§4.3.2): produces a pool of questions at one
//! difficulty level, grounded in retrieved artifact chunks.

use uuid::Uuid;

use crate::config::RetryConfig;
use crate::error::ProviderError;
use crate::models::{Level, Question, QuestionBatch, RetrievedChunk};
use crate::orchestrator::circuit_breaker::CircuitBreaker;
use crate::providers::LlmProvider;

const SYSTEM_PROMPT_PREFIX: &str = "You are interviewing a student about their project. \
Generate interview questions strictly grounded in the provided slide excerpts - never invent \
details the excerpts don't support. Each question must name the expected points a strong \
answer would cover and, where applicable, the slide number it's grounded in.";

pub async fn generate_questions(
    llm: &dyn LlmProvider,
    model: &str,
    level: Level,
    count: usize,
    context: &[RetrievedChunk],
    retry: &RetryConfig,
    breaker: &CircuitBreaker,
) -> Result<Vec<Question>, ProviderError> {
    let system_prompt = format!(
        "{SYSTEM_PROMPT_PREFIX} Generate exactly {count} questions at '{level:?}' difficulty."
    );
    let user_prompt = render_context(context);
    let operation = format!("llm.generate_questions.{level:?}");

    let batch: QuestionBatch =
        super::run_structured_task(llm, model, &system_prompt, &user_prompt, retry, breaker, &operation).await?;

    Ok(batch
        .questions
        .into_iter()
        .take(count)
        .map(|mut q| {
            q.id = Uuid::new_v4().to_string();
            q.level = level;
            q
        })
        .collect())
}

fn render_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return "No artifact excerpts are available; ask only generic process questions.".to_string();
    }
    let mut out = String::new();
    for chunk in chunks {
        out.push_str(&format!(
            "[Slide {}{}]\n{}\n\n",
            chunk.slide_number,
            chunk
                .slide_title
                .as_ref()
                .map(|t| format!(" - {t}"))
                .unwrap_or_default(),
            chunk.text
        ));
    }
    out
}
