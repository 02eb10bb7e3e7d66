//! Node implementations (§4.6). Each node takes the shared context and the
//! session it's driving, mutates the session, and returns where to go next.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::warn;

use super::{reducers, NodeId, NodeOutcome};
use crate::checkpoint::CheckpointStore;
use crate::config::OrchestratorConfig;
use crate::error::{IngestError, OrchestratorError, ProviderError};
use crate::models::{CheckpointReason, Level, TranscriptRole};
use crate::orchestrator::circuit_breaker::CircuitBreaker;
use crate::orchestrator::retry::with_retry;
use crate::pipeline::DialoguePipeline;
use crate::providers::LlmProvider;
use crate::reasoner;
use crate::retrieval::RetrievalIndex;

/// Everything a node needs beyond the session it's driving.
pub struct NodeContext {
    pub retrieval: Arc<dyn RetrievalIndex>,
    pub llm: Arc<dyn LlmProvider>,
    pub pipeline: Arc<Mutex<dyn DialoguePipeline>>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub config: OrchestratorConfig,
    /// Breaker over LLM-backed reasoner calls, keyed per task (§4.8).
    pub circuit_breaker_llm: Arc<CircuitBreaker>,
    /// Breaker over generic (retrieval) calls, keyed per operation (§4.8).
    pub circuit_breaker_generic: Arc<CircuitBreaker>,
}

/// Maps a retrieval failure onto the three-kind taxonomy `with_retry`/
/// `CircuitBreaker` understand: parsing and empty-artifact outcomes are
/// business-logic failures, not transient faults, so only embed/store
/// failures are treated as retryable.
fn ingest_error_to_provider(err: IngestError) -> ProviderError {
    match err {
        IngestError::Parse(message) => ProviderError::NonRetryable(message),
        IngestError::Empty => ProviderError::NonRetryable("artifact produced zero chunks".to_string()),
        IngestError::Embed { chunk_index, message } => {
            ProviderError::RetryableTransient(format!("embed chunk {chunk_index}: {message}"))
        }
        IngestError::Store(message) => ProviderError::RetryableTransient(message),
    }
}

fn provider_error_to_ingest(err: ProviderError) -> IngestError {
    match err {
        ProviderError::NonRetryable(message) => IngestError::Parse(message),
        ProviderError::RetryableTransient(message) => IngestError::Store(message),
        ProviderError::Timeout(elapsed) => IngestError::Store(format!("timed out after {elapsed:?}")),
        ProviderError::CircuitOpen { operation } => IngestError::Store(format!("circuit open for {operation}")),
    }
}

/// Ingests an artifact through the retry/circuit-breaker wrappers (§4.8),
/// keyed so a flaky embedding backend never trips the LLM breaker.
async fn retrying_ingest(
    ctx: &NodeContext,
    session_id: &str,
    artifact: &crate::models::Artifact,
) -> Result<Vec<crate::models::StoredChunk>, IngestError> {
    let operation = "retrieval.ingest";
    ctx.circuit_breaker_generic
        .call(operation, || {
            with_retry(&ctx.config.retry_generic, operation, || async {
                ctx.retrieval.ingest(session_id, artifact).await.map_err(ingest_error_to_provider)
            })
        })
        .await
        .map_err(provider_error_to_ingest)
}

/// Searches through the retry/circuit-breaker wrappers; per §4.1 search
/// never fails the caller, so an exhausted retry budget still falls back to
/// an empty result rather than propagating.
async fn retrying_search(
    ctx: &NodeContext,
    session_id: &str,
    query: &str,
    top_k: usize,
) -> Vec<crate::models::RetrievedChunk> {
    let operation = "retrieval.search";
    ctx.circuit_breaker_generic
        .call(operation, || {
            with_retry(&ctx.config.retry_generic, operation, || async {
                ctx.retrieval.search(session_id, query, top_k).await.map_err(ingest_error_to_provider)
            })
        })
        .await
        .unwrap_or_default()
}

pub async fn dispatch(
    node: NodeId,
    ctx: &NodeContext,
    session: &mut crate::models::Session,
) -> Result<NodeOutcome, OrchestratorError> {
    let outcome = match node {
        NodeId::Initialise => initialise(ctx, session).await,
        NodeId::AwaitUpload => await_upload(ctx, session).await,
        NodeId::RouteUpload => route_upload(session),
        NodeId::Parse => parse(ctx, session).await,
        NodeId::DetectAi => detect_ai(ctx, session).await,
        NodeId::GenerateQuestions => generate_questions(ctx, session).await,
        NodeId::AskQuestion => ask_question(ctx, session).await,
        NodeId::RouteQuestion => route_question(ctx, session).await,
        NodeId::Evaluate => evaluate(ctx, session).await,
        NodeId::TransitionLevel => transition_level(session),
        NodeId::GenerateReport => generate_report(ctx, session).await,
        NodeId::Closing => closing(ctx, session).await,
        NodeId::OnError => on_error(ctx, session).await,
    }?;

    let node_phase = super::phase_for_node(node);
    if session.phase.can_advance_to(node_phase) {
        session.phase = node_phase;
    }
    Ok(outcome)
}

async fn save_checkpoint(
    ctx: &NodeContext,
    session: &crate::models::Session,
    source_node: &str,
    reason: CheckpointReason,
) {
    if let Err(err) = ctx.checkpoints.save(session, source_node, reason, None).await {
        warn!(%err, node = source_node, "checkpoint save failed");
    }
}

async fn initialise(
    ctx: &NodeContext,
    session: &mut crate::models::Session,
) -> Result<NodeOutcome, OrchestratorError> {
    let greeting = format!(
        "Hi {}, welcome to your project review for \"{}\". Please upload your slides when you're ready.",
        session.candidate.display_name, session.project_title
    );
    ctx.pipeline.lock().await.speak(&greeting).await?;
    session.push_transcript(TranscriptRole::Ai, &greeting, Utc::now());
    session.last_ai_utterance = Some(greeting);
    save_checkpoint(ctx, session, "initialise", CheckpointReason::PhaseTransition).await;
    Ok(NodeOutcome::GoTo(NodeId::AwaitUpload))
}

async fn await_upload(
    ctx: &NodeContext,
    session: &mut crate::models::Session,
) -> Result<NodeOutcome, OrchestratorError> {
    if session.has_artifact() {
        return Ok(NodeOutcome::GoTo(NodeId::RouteUpload));
    }
    if ctx.config.mock_ingestion {
        session.artifact_uri = Some(format!("mock://{}", session.session_id));
        session.artifact = Some(crate::models::Artifact {
            source_uri: session.artifact_uri.clone(),
            slides: vec![crate::models::Slide {
                number: 1,
                title: Some(session.project_title.clone()),
                content: session
                    .project_description
                    .clone()
                    .unwrap_or_else(|| "No description provided.".to_string()),
                bullets: vec![],
            }],
        });
        return Ok(NodeOutcome::GoTo(NodeId::RouteUpload));
    }
    // No artifact yet and mocking is disabled: halt here. The orchestrator
    // re-enters at this node once an upload-complete event attaches an
    // artifact to the session (§4.6 "Edge cases": no busy-waiting).
    Ok(NodeOutcome::Halt)
}

fn route_upload(session: &mut crate::models::Session) -> Result<NodeOutcome, OrchestratorError> {
    if session.has_artifact() {
        Ok(NodeOutcome::GoTo(NodeId::Parse))
    } else {
        session.last_error = Some("route_upload reached without an artifact".to_string());
        Ok(NodeOutcome::GoTo(NodeId::OnError))
    }
}

async fn parse(
    ctx: &NodeContext,
    session: &mut crate::models::Session,
) -> Result<NodeOutcome, OrchestratorError> {
    let Some(artifact) = session.artifact.clone() else {
        session.last_error = Some("parse reached without a parsed artifact".to_string());
        return Ok(NodeOutcome::GoTo(NodeId::OnError));
    };

    match retrying_ingest(ctx, &session.session_id, &artifact).await {
        Ok(_chunks) => {
            save_checkpoint(ctx, session, "parse", CheckpointReason::PhaseTransition).await;
            Ok(NodeOutcome::GoTo(NodeId::DetectAi))
        }
        Err(err) => {
            session.error_count += 1;
            session.last_error = Some(err.to_string());
            Ok(NodeOutcome::GoTo(NodeId::OnError))
        }
    }
}

async fn detect_ai(
    ctx: &NodeContext,
    session: &mut crate::models::Session,
) -> Result<NodeOutcome, OrchestratorError> {
    let slides = session.artifact.as_ref().map(|a| a.slides.clone()).unwrap_or_default();
    match reasoner::detect_ai_content(
        ctx.llm.as_ref(),
        &ctx.config.providers.llm_model,
        &slides,
        &ctx.config.retry_llm,
        &ctx.circuit_breaker_llm,
    )
    .await
    {
        Ok(report) => {
            session.ai_detection_report = Some(report);
            save_checkpoint(ctx, session, "detect_ai", CheckpointReason::PhaseTransition).await;
            Ok(NodeOutcome::GoTo(NodeId::GenerateQuestions))
        }
        Err(err) => {
            session.error_count += 1;
            session.last_error = Some(err.to_string());
            Ok(NodeOutcome::GoTo(NodeId::OnError))
        }
    }
}

async fn generate_questions(
    ctx: &NodeContext,
    session: &mut crate::models::Session,
) -> Result<NodeOutcome, OrchestratorError> {
    let query = format!("{} {}", session.project_title, session.project_description.clone().unwrap_or_default());
    let context = retrying_search(ctx, &session.session_id, &query, 8).await;

    for level in Level::ORDER {
        match reasoner::generate_questions(
            ctx.llm.as_ref(),
            &ctx.config.providers.llm_model,
            level,
            level.default_count(),
            &context,
            &ctx.config.retry_llm,
            &ctx.circuit_breaker_llm,
        )
        .await
        {
            Ok(mut questions) => {
                questions.reverse(); // pop() takes from the back; keep generation order on ask
                session.question_pool.insert(level, questions);
            }
            Err(err) => {
                session.error_count += 1;
                session.last_error = Some(err.to_string());
                return Ok(NodeOutcome::GoTo(NodeId::OnError));
            }
        }
    }

    session.current_level = Level::Easy;
    save_checkpoint(ctx, session, "generate_questions", CheckpointReason::PhaseTransition).await;
    Ok(NodeOutcome::GoTo(NodeId::AskQuestion))
}

async fn ask_question(
    ctx: &NodeContext,
    session: &mut crate::models::Session,
) -> Result<NodeOutcome, OrchestratorError> {
    let Some(question) = reducers::pop_next_question(session) else {
        session.last_error = Some("ask_question reached with an empty pool".to_string());
        return Ok(NodeOutcome::GoTo(NodeId::OnError));
    };

    ctx.pipeline.lock().await.speak(&question.text).await?;
    session.push_transcript(TranscriptRole::Ai, &question.text, Utc::now());
    session.last_ai_utterance = Some(question.text.clone());
    session.time.current_question_started_at = Some(Utc::now());
    session.current_question_timeouts = 0;
    session.current_question = Some(question);
    save_checkpoint(ctx, session, "ask_question", CheckpointReason::BeforeQuestion).await;
    Ok(NodeOutcome::GoTo(NodeId::RouteQuestion))
}

/// Outcome of waiting out the answer-timeout budget in `route_question`:
/// the loop inside keeps consuming non-terminal pipeline events (interim
/// transcripts, speaking-state changes, reconnects) without abandoning the
/// question, and only surfaces once something actually resolves the wait.
enum AnswerWait {
    Answer(String),
    Disconnected,
    /// The pipeline's event stream ended (`next_event` returned `None`):
    /// genuinely nothing more will ever arrive for this question.
    StreamClosed,
}

async fn route_question(
    ctx: &NodeContext,
    session: &mut crate::models::Session,
) -> Result<NodeOutcome, OrchestratorError> {
    let wait = timeout(ctx.config.checkpoint.answer_timeout, async {
        loop {
            let mut pipeline = ctx.pipeline.lock().await;
            let event = pipeline.next_event().await;
            drop(pipeline);
            match event {
                None => return AnswerWait::StreamClosed,
                Some(crate::pipeline::PipelineEvent::CandidateUtterance(text)) => {
                    return AnswerWait::Answer(text)
                }
                Some(crate::pipeline::PipelineEvent::Disconnected) => return AnswerWait::Disconnected,
                // Interim transcripts, speaking-state changes, and
                // reconnects don't resolve the question: keep waiting on
                // the same timeout budget (§4.2/§4.4).
                Some(
                    crate::pipeline::PipelineEvent::PartialUtterance(_)
                    | crate::pipeline::PipelineEvent::CandidateStartedSpeaking
                    | crate::pipeline::PipelineEvent::CandidateStoppedSpeaking
                    | crate::pipeline::PipelineEvent::Reconnected,
                ) => continue,
            }
        }
    })
    .await;

    match wait {
        Ok(AnswerWait::Answer(text)) => {
            session.push_transcript(TranscriptRole::Candidate, &text, Utc::now());
            session.pending_answer = Some(text);
            Ok(NodeOutcome::GoTo(NodeId::Evaluate))
        }
        Ok(AnswerWait::Disconnected) => {
            session.connection_state = crate::models::ConnectionState::Disconnected;
            session.last_error = Some("candidate disconnected while awaiting an answer".to_string());
            Ok(NodeOutcome::GoTo(NodeId::OnError))
        }
        Ok(AnswerWait::StreamClosed) => Ok(NodeOutcome::GoTo(NodeId::AskQuestion)),
        Err(_elapsed) => {
            session.current_question_timeouts += 1;
            if session.current_question_timeouts == 1 {
                let rephrase = session
                    .current_question
                    .as_ref()
                    .map(|q| format!("Take your time. To rephrase: {}", q.text))
                    .unwrap_or_default();
                ctx.pipeline.lock().await.speak(&rephrase).await?;
                session.push_transcript(TranscriptRole::Ai, &rephrase, Utc::now());
                Ok(NodeOutcome::GoTo(NodeId::AskQuestion))
            } else {
                session.pending_answer = None;
                Ok(NodeOutcome::GoTo(NodeId::Evaluate))
            }
        }
    }
}

async fn evaluate(
    ctx: &NodeContext,
    session: &mut crate::models::Session,
) -> Result<NodeOutcome, OrchestratorError> {
    let Some(question) = session.current_question.take() else {
        session.last_error = Some("evaluate reached without a current question".to_string());
        return Ok(NodeOutcome::GoTo(NodeId::OnError));
    };

    // A second consecutive answer-timeout routes here with no pending
    // answer: the question is skipped outright, with no evaluation emitted
    // and no record of it among `questions_asked` (§4.6 "Tie-breaks", §8
    // property 11, scenario S3).
    let Some(answer) = session.pending_answer.take() else {
        save_checkpoint(ctx, session, "evaluate", CheckpointReason::AfterEvaluation).await;
        return Ok(NodeOutcome::GoTo(NodeId::TransitionLevel));
    };

    let context = retrying_search(ctx, &session.session_id, &question.text, 5).await;
    let evaluation = match reasoner::evaluate_answer(
        ctx.llm.as_ref(),
        &ctx.config.providers.llm_model,
        &question,
        &answer,
        &context,
        &ctx.config.retry_llm,
        &ctx.circuit_breaker_llm,
    )
    .await
    {
        Ok(evaluation) => evaluation,
        Err(err) => {
            session.error_count += 1;
            session.last_error = Some(err.to_string());
            return Ok(NodeOutcome::GoTo(NodeId::OnError));
        }
    };

    session.questions_asked.push(question);
    session.evaluations.push(evaluation);
    save_checkpoint(ctx, session, "evaluate", CheckpointReason::AfterEvaluation).await;
    Ok(NodeOutcome::GoTo(NodeId::TransitionLevel))
}

fn transition_level(session: &mut crate::models::Session) -> Result<NodeOutcome, OrchestratorError> {
    session.current_question = None;
    if session.questions_asked.len() >= session.evaluations.len()
        && session.questions_asked.len() < max_questions_hard_cap()
        && reducers::has_more_questions(session)
    {
        Ok(NodeOutcome::GoTo(NodeId::AskQuestion))
    } else {
        Ok(NodeOutcome::GoTo(NodeId::GenerateReport))
    }
}

/// Hard ceiling on total questions asked regardless of pool size (§8
/// property 1: `|questions_asked| <= 10`).
fn max_questions_hard_cap() -> usize {
    10
}

async fn generate_report(
    ctx: &NodeContext,
    session: &mut crate::models::Session,
) -> Result<NodeOutcome, OrchestratorError> {
    let Some(ai_detection) = session.ai_detection_report.clone() else {
        session.last_error = Some("generate_report reached without an AI-detection report".to_string());
        return Ok(NodeOutcome::GoTo(NodeId::OnError));
    };

    match reasoner::generate_final_report(
        ctx.llm.as_ref(),
        &ctx.config.providers.llm_model,
        &session.questions_asked,
        &session.evaluations,
        &ai_detection,
        &ctx.config.retry_llm,
        &ctx.circuit_breaker_llm,
    )
    .await
    {
        Ok(report) => {
            session.final_report = Some(report);
            save_checkpoint(ctx, session, "generate_report", CheckpointReason::PhaseTransition).await;
            Ok(NodeOutcome::GoTo(NodeId::Closing))
        }
        Err(err) => {
            session.error_count += 1;
            session.last_error = Some(err.to_string());
            Ok(NodeOutcome::GoTo(NodeId::OnError))
        }
    }
}

async fn closing(
    ctx: &NodeContext,
    session: &mut crate::models::Session,
) -> Result<NodeOutcome, OrchestratorError> {
    let closing_line = "Thanks for walking me through your project. Your report is ready.".to_string();
    ctx.pipeline.lock().await.speak(&closing_line).await?;
    session.push_transcript(TranscriptRole::Ai, &closing_line, Utc::now());
    save_checkpoint(ctx, session, "closing", CheckpointReason::PhaseTransition).await;
    Ok(NodeOutcome::Halt)
}

async fn on_error(
    ctx: &NodeContext,
    session: &mut crate::models::Session,
) -> Result<NodeOutcome, OrchestratorError> {
    session.error_count += 1;
    warn!(session_id = %session.session_id, error = ?session.last_error, "session entered error phase");
    save_checkpoint(ctx, session, "on_error", CheckpointReason::EmergencyPause).await;
    Ok(NodeOutcome::Halt)
}
