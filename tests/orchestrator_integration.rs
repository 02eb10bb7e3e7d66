//! Integration tests driving the full session graph through
//! `ReviewOrchestrator` with stub providers standing in for real vendors.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use review_orchestrator::checkpoint::InMemoryCheckpointStore;
use review_orchestrator::error::{OrchestratorError, ProviderError};
use review_orchestrator::models::{Artifact, CandidateDescriptor, Phase, Slide};
use review_orchestrator::pipeline::{DialoguePipeline, PipelineEvent};
use review_orchestrator::providers::{ChatRequest, ChatStream, EmbeddingProvider, LlmProvider};
use review_orchestrator::retrieval::{InMemoryRetrievalIndex, ProviderEmbedder};
use review_orchestrator::workflow::NodeId;
use review_orchestrator::{OrchestratorConfig, ReviewOrchestrator};

/// A `LlmProvider` that returns a fixed sequence of structured-output
/// fixtures rather than calling a real vendor. Each `structured_chat` call
/// consumes the next fixture in order, mirroring the sequence the node
/// graph actually issues: one AI-detection report, one `QuestionBatch` per
/// level, one `Evaluation` per question, one `FinalReport`.
struct ScriptedLlm {
    responses: Vec<Value>,
    next: AtomicUsize,
}

impl ScriptedLlm {
    fn new(responses: Vec<Value>) -> Self {
        Self {
            responses,
            next: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat_stream(&self, _request: &ChatRequest) -> Result<ChatStream, ProviderError> {
        unimplemented!("not exercised by the node graph")
    }

    async fn structured_chat(&self, _request: &ChatRequest, _schema: &Value) -> Result<Value, ProviderError> {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(index)
            .cloned()
            .ok_or_else(|| ProviderError::NonRetryable(format!("scripted LLM exhausted at call {index}")))
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedLlm {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0, 0.0]).collect())
    }
}

/// A `DialoguePipeline` that answers every question with a canned response
/// and records every line the orchestrator speaks.
struct ScriptedPipeline {
    spoken: Vec<String>,
    answer: mpsc::Receiver<PipelineEvent>,
    feeder: mpsc::Sender<PipelineEvent>,
    fed_once: bool,
}

impl ScriptedPipeline {
    fn new() -> Self {
        let (feeder, answer) = mpsc::channel(16);
        Self {
            spoken: Vec::new(),
            answer,
            feeder,
            fed_once: false,
        }
    }
}

#[async_trait]
impl DialoguePipeline for ScriptedPipeline {
    async fn next_event(&mut self) -> Option<PipelineEvent> {
        if !self.fed_once {
            self.fed_once = true;
            let _ = self
                .feeder
                .send(PipelineEvent::CandidateUtterance("a scripted answer".to_string()))
                .await;
        }
        self.answer.recv().await
    }

    async fn speak(&mut self, text: &str) -> Result<(), ProviderError> {
        self.spoken.push(text.to_string());
        Ok(())
    }
}

fn ai_detection_fixture() -> Value {
    json!({
        "overall_result": "likely_human",
        "overall_confidence": 80,
        "total_sections": 1,
        "ai_likely_sections": 0,
        "sections": [{
            "slide_number": 1,
            "result": "likely_human",
            "confidence": 80,
            "indicators": [],
            "explanation": "Plain, specific phrasing throughout.",
        }],
        "summary": "No strong indicators of AI-generated content.",
    })
}

fn question_batch_fixture(level: &str, count: usize) -> Value {
    let questions: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "id": format!("placeholder-{level}-{i}"),
                "level": level,
                "text": format!("{level} question {i}"),
                "grounding_context": "slide 1",
                "expected_points": ["point a"],
                "slide_reference": 1,
            })
        })
        .collect();
    json!({ "questions": questions })
}

fn evaluation_fixture() -> Value {
    json!({
        "question_id": "placeholder",
        "score": 7,
        "feedback": "Solid answer with minor gaps.",
        "demonstrates_understanding": true,
        "flagged_concerns": [],
    })
}

fn final_report_fixture() -> Value {
    json!({
        "technical_understanding": 7,
        "project_ownership": 8,
        "communication_clarity": 7,
        "ai_content_concerns": [],
        "knowledge_gaps": ["edge case handling"],
        "overall_assessment": "Candidate demonstrated solid ownership of the project.",
        "recommendation": "pass",
        "next_steps": ["Review error handling paths in a follow-up"],
    })
}

/// Builds the fixture sequence for a run that asks exactly one question per
/// level (three total) before reaching the report.
fn scripted_llm_for_one_question_per_level() -> ScriptedLlm {
    let mut responses = vec![ai_detection_fixture()];
    for level in ["easy", "medium", "hard"] {
        responses.push(question_batch_fixture(level, 1));
    }
    for _ in 0..3 {
        responses.push(evaluation_fixture());
    }
    responses.push(final_report_fixture());
    ScriptedLlm::new(responses)
}

#[tokio::test]
async fn full_session_runs_to_completion_with_final_report() {
    let mut config = OrchestratorConfig::load_with_env();
    config.mock_ingestion = true;

    let llm: Arc<dyn LlmProvider> = Arc::new(scripted_llm_for_one_question_per_level());
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(ScriptedLlm::new(vec![]));
    let retrieval = Arc::new(InMemoryRetrievalIndex::new(Arc::new(ProviderEmbedder(embedder))));
    let checkpoints = Arc::new(InMemoryCheckpointStore::new(config.checkpoint.ring_capacity));

    let orchestrator = ReviewOrchestrator::new(config, retrieval, llm, checkpoints).unwrap();
    let pipeline = Arc::new(Mutex::new(ScriptedPipeline::new()));

    orchestrator
        .start_session(
            "session-1",
            "room-1",
            CandidateDescriptor {
                id: "candidate-1".to_string(),
                display_name: "Ada".to_string(),
            },
            "Graph Database Engine",
            Some("A small embedded graph database written from scratch.".to_string()),
            pipeline.clone(),
        )
        .await
        .expect("session should run to completion without error");

    let session = orchestrator
        .session_snapshot("session-1")
        .await
        .expect("session should still be registered after completion");

    assert_eq!(session.phase, Phase::Completed);
    assert_eq!(session.questions_asked.len(), 3);
    assert_eq!(session.evaluations.len(), 3);
    assert!(session.final_report.is_some());
    assert!(session.ai_detection_report.is_some());
    assert!(session.error_count == 0);
}

#[tokio::test]
async fn missing_artifact_without_mock_ingestion_halts_awaiting_upload() {
    let mut config = OrchestratorConfig::load_with_env();
    config.mock_ingestion = false;

    let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedLlm::new(vec![]));
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(ScriptedLlm::new(vec![]));
    let retrieval = Arc::new(InMemoryRetrievalIndex::new(Arc::new(ProviderEmbedder(embedder))));
    let checkpoints = Arc::new(InMemoryCheckpointStore::new(config.checkpoint.ring_capacity));

    let orchestrator = ReviewOrchestrator::new(config, retrieval, llm, checkpoints).unwrap();
    let pipeline = Arc::new(Mutex::new(ScriptedPipeline::new()));

    orchestrator
        .start_session(
            "session-2",
            "room-2",
            CandidateDescriptor {
                id: "candidate-2".to_string(),
                display_name: "Grace".to_string(),
            },
            "Untitled",
            None,
            pipeline,
        )
        .await
        .expect("halting to await an upload is not an error");

    let session = orchestrator.session_snapshot("session-2").await.unwrap();
    assert_eq!(session.phase, Phase::Upload);
    assert!(session.artifact.is_none());
}

#[tokio::test]
async fn resuming_after_an_out_of_band_artifact_attachment_proceeds_past_upload() {
    let mut config = OrchestratorConfig::load_with_env();
    config.mock_ingestion = false;

    let llm: Arc<dyn LlmProvider> = Arc::new(scripted_llm_for_one_question_per_level());
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(ScriptedLlm::new(vec![]));
    let retrieval = Arc::new(InMemoryRetrievalIndex::new(Arc::new(ProviderEmbedder(embedder))));
    let checkpoints = Arc::new(InMemoryCheckpointStore::new(config.checkpoint.ring_capacity));

    let orchestrator = ReviewOrchestrator::new(config, retrieval, llm, checkpoints).unwrap();
    let pipeline = Arc::new(Mutex::new(ScriptedPipeline::new()));

    orchestrator
        .start_session(
            "session-3",
            "room-3",
            CandidateDescriptor {
                id: "candidate-3".to_string(),
                display_name: "Linus".to_string(),
            },
            "Kernel Scheduler",
            None,
            pipeline.clone(),
        )
        .await
        .unwrap();

    let session_handle = orchestrator.session_snapshot("session-3").await.unwrap();
    assert_eq!(session_handle.phase, Phase::Upload);
    assert!(session_handle.artifact.is_none());

    // Simulate an upload-complete webhook attaching the parsed artifact,
    // then resume exactly at the node that routes on its presence.
    orchestrator
        .attach_artifact(
            "session-3",
            Artifact {
                source_uri: Some("https://example.invalid/deck.pdf".to_string()),
                slides: vec![Slide {
                    number: 1,
                    title: Some("Kernel Scheduler".to_string()),
                    content: "A round-robin scheduler with priority aging.".to_string(),
                    bullets: vec!["O(1) dispatch".to_string()],
                }],
            },
        )
        .await
        .expect("session should still be registered");

    orchestrator
        .resume_session("session-3", pipeline, NodeId::RouteUpload)
        .await
        .expect("session should run to completion once the artifact is attached");

    let session = orchestrator.session_snapshot("session-3").await.unwrap();
    assert_eq!(session.phase, Phase::Completed);
    assert!(session.final_report.is_some());
}

/// A pipeline whose `next_event` never resolves, so a driven session
/// blocks forever at `route_question` until cancelled externally.
struct StallingPipeline;

#[async_trait]
impl DialoguePipeline for StallingPipeline {
    async fn next_event(&mut self) -> Option<PipelineEvent> {
        std::future::pending().await
    }

    async fn speak(&mut self, _text: &str) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[tokio::test]
async fn cancelling_a_stalled_session_unblocks_its_drive_loop() {
    let mut config = OrchestratorConfig::load_with_env();
    config.mock_ingestion = true;
    config.checkpoint.answer_timeout = std::time::Duration::from_secs(3600);

    let llm: Arc<dyn LlmProvider> = Arc::new(scripted_llm_for_one_question_per_level());
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(ScriptedLlm::new(vec![]));
    let retrieval = Arc::new(InMemoryRetrievalIndex::new(Arc::new(ProviderEmbedder(embedder))));
    let checkpoints = Arc::new(InMemoryCheckpointStore::new(config.checkpoint.ring_capacity));

    let orchestrator = Arc::new(ReviewOrchestrator::new(config, retrieval, llm, checkpoints).unwrap());
    let pipeline = Arc::new(Mutex::new(StallingPipeline));

    let driving = {
        let orchestrator = orchestrator.clone();
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            orchestrator
                .start_session(
                    "session-4",
                    "room-4",
                    CandidateDescriptor {
                        id: "candidate-4".to_string(),
                        display_name: "Margaret".to_string(),
                    },
                    "Compiler Backend",
                    None,
                    pipeline,
                )
                .await
        })
    };

    // Give the driver a moment to reach the stalled `route_question` wait,
    // then cancel it from outside the drive loop.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    orchestrator.cancel_session("session-4").await;

    let result = driving.await.expect("drive task should not panic");
    assert!(matches!(result, Err(OrchestratorError::Cancelled)));
}
