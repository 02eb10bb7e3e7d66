//! Final report synthesis task (§4.3.4).

use crate::config::RetryConfig;
use crate::error::ProviderError;
use crate::models::{AiDetectionReport, Evaluation, FinalReport, Question};
use crate::orchestrator::circuit_breaker::CircuitBreaker;
use crate::providers::LlmProvider;

const SYSTEM_PROMPT: &str = "You are writing the final assessment of a project review \
session. Synthesize the candidate's demonstrated understanding, ownership of the work, and \
communication quality across all answered questions, and factor in the AI-content detection \
findings when judging ownership. Recommend pass, conditional_pass, fail, or needs_review.";

pub async fn generate_final_report(
    llm: &dyn LlmProvider,
    model: &str,
    questions_asked: &[Question],
    evaluations: &[Evaluation],
    ai_detection: &AiDetectionReport,
    retry: &RetryConfig,
    breaker: &CircuitBreaker,
) -> Result<FinalReport, ProviderError> {
    let user_prompt = render_summary(questions_asked, evaluations, ai_detection);
    super::run_structured_task(
        llm,
        model,
        SYSTEM_PROMPT,
        &user_prompt,
        retry,
        breaker,
        "llm.generate_final_report",
    )
    .await
}

fn render_summary(
    questions_asked: &[Question],
    evaluations: &[Evaluation],
    ai_detection: &AiDetectionReport,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "AI-content detection: overall={:?} confidence={} summary={}\n\n",
        ai_detection.overall_result, ai_detection.overall_confidence, ai_detection.summary
    ));
    for question in questions_asked {
        let evaluation = evaluations.iter().find(|e| e.question_id == question.id);
        out.push_str(&format!("Q ({:?}): {}\n", question.level, question.text));
        match evaluation {
            Some(e) => out.push_str(&format!(
                "  score={} understood={} feedback={}\n",
                e.score, e.demonstrates_understanding, e.feedback
            )),
            None => out.push_str("  (not answered)\n"),
        }
    }
    out
}
