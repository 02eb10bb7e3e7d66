//! The top-level orchestrator (component G): hosts many concurrent
//! sessions, each driven by the workflow engine, and exposes the entry
//! points an external room/signaling layer calls into (§4.7, §5).

pub mod circuit_breaker;
pub mod retry;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

use circuit_breaker::CircuitBreaker;

use crate::checkpoint::CheckpointStore;
use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::models::{Artifact, CandidateDescriptor, Session};
use crate::pipeline::DialoguePipeline;
use crate::providers::LlmProvider;
use crate::retrieval::RetrievalIndex;
use crate::workflow::{NodeContext, NodeId, WorkflowEngine};

/// Registry of live sessions, keyed by session id. Mirrors the
/// read-mostly/write-rarely access pattern: most calls only need to look up
/// an existing session, so lookups take a read lock and only creation takes
/// a write lock (§4.7 "Multi-session registry").
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, session_id: &str, initial: Session) -> Arc<Mutex<Session>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(session_id) {
                return Arc::clone(session);
            }
        }

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(session_id) {
            return Arc::clone(session);
        }
        let session = Arc::new(Mutex::new(initial));
        sessions.insert(session_id.to_string(), Arc::clone(&session));
        session
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(session_id).map(Arc::clone)
    }

    pub async fn remove(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.write().await.remove(session_id)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-session cancellation tokens, so `cancel_session` can reach a task it
/// doesn't otherwise hold a handle to.
pub struct CancellationRegistry {
    tokens: RwLock<HashMap<String, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
        }
    }

    pub async fn issue(&self, session_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens.write().await.insert(session_id.to_string(), token.clone());
        token
    }

    pub async fn cancel(&self, session_id: &str) {
        if let Some(token) = self.tokens.write().await.remove(session_id) {
            token.cancel();
        }
    }
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Wires together every collaborating component and hosts however many
/// concurrent sessions the process is asked to run (§4.7).
pub struct ReviewOrchestrator {
    config: OrchestratorConfig,
    engine: WorkflowEngine,
    retrieval: Arc<dyn RetrievalIndex>,
    llm: Arc<dyn LlmProvider>,
    checkpoints: Arc<dyn CheckpointStore>,
    sessions: SessionRegistry,
    cancellations: CancellationRegistry,
    /// Breaker over LLM-backed reasoner calls (§4.8), shared across sessions.
    circuit_breaker_llm: Arc<CircuitBreaker>,
    /// Breaker over generic (retrieval) calls (§4.8), shared across sessions.
    circuit_breaker_generic: Arc<CircuitBreaker>,
}

impl ReviewOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        retrieval: Arc<dyn RetrievalIndex>,
        llm: Arc<dyn LlmProvider>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Result<Self, OrchestratorError> {
        let circuit_breaker_llm = Arc::new(CircuitBreaker::new(
            config.retry_llm.circuit_failure_threshold,
            config.retry_llm.circuit_reset_after,
        ));
        let circuit_breaker_generic = Arc::new(CircuitBreaker::new(
            config.retry_generic.circuit_failure_threshold,
            config.retry_generic.circuit_reset_after,
        ));
        Ok(Self {
            config,
            engine: WorkflowEngine::new()?,
            retrieval,
            llm,
            checkpoints,
            sessions: SessionRegistry::new(),
            cancellations: CancellationRegistry::new(),
            circuit_breaker_llm,
            circuit_breaker_generic,
        })
    }

    /// Starts a new session: registers it, builds its pipeline, and runs the
    /// workflow engine from `Initialise` until it halts (awaiting upload, a
    /// question response, or a terminal phase).
    pub async fn start_session(
        &self,
        session_id: &str,
        room_id: &str,
        candidate: CandidateDescriptor,
        project_title: &str,
        project_description: Option<String>,
        pipeline: Arc<Mutex<dyn DialoguePipeline>>,
    ) -> Result<(), OrchestratorError> {
        let session = Session::new(
            session_id,
            room_id,
            candidate,
            project_title,
            project_description,
            None,
            Utc::now(),
        );
        let handle = self.sessions.get_or_create(session_id, session).await;
        let token = self.cancellations.issue(session_id).await;

        self.drive(handle, pipeline, token, NodeId::Initialise).await
    }

    /// Re-enters a halted session (e.g. after an upload completes, or an
    /// answer arrives via the room) at the given node.
    pub async fn resume_session(
        &self,
        session_id: &str,
        pipeline: Arc<Mutex<dyn DialoguePipeline>>,
        at: NodeId,
    ) -> Result<(), OrchestratorError> {
        let handle = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| OrchestratorError::RoomDisconnected(session_id.to_string()))?;
        let token = self.cancellations.issue(session_id).await;
        self.drive(handle, pipeline, token, at).await
    }

    pub async fn cancel_session(&self, session_id: &str) {
        self.cancellations.cancel(session_id).await;
    }

    /// Attaches an artifact to a session that is halted awaiting one (e.g.
    /// from an upload-complete webhook), without driving the workflow
    /// engine. Callers then call `resume_session` at `NodeId::RouteUpload`.
    pub async fn attach_artifact(&self, session_id: &str, artifact: Artifact) -> Result<(), OrchestratorError> {
        let handle = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| OrchestratorError::RoomDisconnected(session_id.to_string()))?;
        let mut session = handle.lock().await;
        session.artifact_uri = artifact.source_uri.clone();
        session.artifact = Some(artifact);
        Ok(())
    }

    pub async fn session_snapshot(&self, session_id: &str) -> Option<Session> {
        let handle = self.sessions.get(session_id).await?;
        Some(handle.lock().await.clone())
    }

    async fn drive(
        &self,
        handle: Arc<Mutex<Session>>,
        pipeline: Arc<Mutex<dyn DialoguePipeline>>,
        token: CancellationToken,
        start: NodeId,
    ) -> Result<(), OrchestratorError> {
        let ctx = NodeContext {
            retrieval: Arc::clone(&self.retrieval),
            llm: Arc::clone(&self.llm),
            pipeline,
            checkpoints: Arc::clone(&self.checkpoints),
            config: self.config.clone(),
            circuit_breaker_llm: Arc::clone(&self.circuit_breaker_llm),
            circuit_breaker_generic: Arc::clone(&self.circuit_breaker_generic),
        };

        let periodic_handle = crate::checkpoint::spawn_periodic_checkpointing(
            Arc::clone(&self.checkpoints),
            handle.lock().await.session_id.clone(),
            self.config.checkpoint.periodic_interval,
            token.clone(),
            {
                let handle = Arc::clone(&handle);
                move || {
                    let handle = Arc::clone(&handle);
                    async move { Some(handle.lock().await.clone()) }
                }
            },
        );

        // `engine.run` only ever takes the session mutex for the span of a
        // single node transition, cloning the state out and writing it back
        // rather than holding the guard across a node that can block for
        // the full answer-timeout (§4.5 "periodic checkpointing must be
        // able to observe a session mid-run").
        let result = tokio::select! {
            result = self.engine.run(&ctx, &handle, start) => result,
            _ = token.cancelled() => {
                info!("session run cancelled");
                Err(OrchestratorError::Cancelled)
            }
        };

        periodic_handle.abort();
        result
    }
}
