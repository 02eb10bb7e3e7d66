pub mod checkpoint;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod providers;
pub mod reasoner;
pub mod retrieval;
pub mod workflow;

pub use config::OrchestratorConfig;
pub use error::{CheckpointError, IngestError, OrchestratorError, ProviderError, WorkflowError};
pub use models::{Phase, Session};
pub use orchestrator::{CancellationRegistry, ReviewOrchestrator, SessionRegistry};
pub use workflow::{NodeContext, NodeId, WorkflowEngine};
