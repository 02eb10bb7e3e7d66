//! Answer evaluation task (§4.3.3).

use crate::config::RetryConfig;
use crate::error::ProviderError;
use crate::models::{Evaluation, Question, RetrievedChunk};
use crate::orchestrator::circuit_breaker::CircuitBreaker;
use crate::providers::LlmProvider;

const SYSTEM_PROMPT: &str = "You are evaluating a candidate's spoken answer to an interview \
question about their own project. Score from 1 (no understanding) to 10 (expert command), \
and flag anything in the answer that contradicts the project artifact or sounds memorized \
rather than understood.";

pub async fn evaluate_answer(
    llm: &dyn LlmProvider,
    model: &str,
    question: &Question,
    candidate_answer: &str,
    context: &[RetrievedChunk],
    retry: &RetryConfig,
    breaker: &CircuitBreaker,
) -> Result<Evaluation, ProviderError> {
    let user_prompt = format!(
        "Question: {}\nExpected points: {}\nGrounding context: {}\nRetrieved artifact excerpts:\n{}\n\nCandidate's answer:\n{}",
        question.text,
        question.expected_points.join("; "),
        question.grounding_context,
        render_context(context),
        candidate_answer,
    );

    let mut evaluation: Evaluation =
        super::run_structured_task(llm, model, SYSTEM_PROMPT, &user_prompt, retry, breaker, "llm.evaluate_answer")
            .await?;
    evaluation.question_id = question.id.clone();
    evaluation.score = Evaluation::clamp_score(evaluation.score as i64);
    Ok(evaluation)
}

fn render_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return "(none)".to_string();
    }
    chunks
        .iter()
        .map(|c| format!("[Slide {}] {}", c.slide_number, c.text))
        .collect::<Vec<_>>()
        .join("\n")
}
