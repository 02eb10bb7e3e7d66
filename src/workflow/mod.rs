//! The workflow engine (component F): drives a session through its phase
//! DAG node by node, validating every transition against a construction-time
//! route map (§4.6, §4.6 expansion "Route-map validation").

mod nodes;
mod reducers;

pub use nodes::NodeContext;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::error::{OrchestratorError, WorkflowError};
use crate::models::{Phase, Session};

/// Named nodes of the review session graph (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Initialise,
    AwaitUpload,
    RouteUpload,
    Parse,
    DetectAi,
    GenerateQuestions,
    AskQuestion,
    RouteQuestion,
    Evaluate,
    TransitionLevel,
    GenerateReport,
    Closing,
    OnError,
}

impl NodeId {
    fn as_str(self) -> &'static str {
        match self {
            NodeId::Initialise => "initialise",
            NodeId::AwaitUpload => "await_upload",
            NodeId::RouteUpload => "route_upload",
            NodeId::Parse => "parse",
            NodeId::DetectAi => "detect_ai",
            NodeId::GenerateQuestions => "generate_questions",
            NodeId::AskQuestion => "ask_question",
            NodeId::RouteQuestion => "route_question",
            NodeId::Evaluate => "evaluate",
            NodeId::TransitionLevel => "transition_level",
            NodeId::GenerateReport => "generate_report",
            NodeId::Closing => "closing",
            NodeId::OnError => "on_error",
        }
    }
}

/// What a node asks the engine to do next.
pub enum NodeOutcome {
    GoTo(NodeId),
    /// The session has reached a phase with no outgoing node (`Completed`
    /// or a terminal `Error`); the engine stops driving it.
    Halt,
}

/// The static routing graph: which nodes a given node may legally hand off
/// to. Built once at engine construction and checked on every dispatch so a
/// node bug (a typo'd `GoTo`) surfaces as a typed error immediately instead
/// of silently wandering off the documented graph.
fn route_map() -> HashMap<NodeId, Vec<NodeId>> {
    use NodeId::*;
    HashMap::from([
        (Initialise, vec![AwaitUpload]),
        (AwaitUpload, vec![RouteUpload]),
        (RouteUpload, vec![Parse, OnError]),
        (Parse, vec![DetectAi, OnError]),
        (DetectAi, vec![GenerateQuestions, OnError]),
        (GenerateQuestions, vec![AskQuestion, OnError]),
        (AskQuestion, vec![RouteQuestion]),
        (RouteQuestion, vec![Evaluate, AskQuestion]),
        (Evaluate, vec![TransitionLevel, OnError]),
        (TransitionLevel, vec![AskQuestion, GenerateReport]),
        (GenerateReport, vec![Closing, OnError]),
        (Closing, vec![]),
        (OnError, vec![]),
    ])
}

/// Drives a single session node-by-node, validating phase transitions and
/// route-map membership before applying either (§8 property 3).
pub struct WorkflowEngine {
    routes: HashMap<NodeId, Vec<NodeId>>,
}

impl WorkflowEngine {
    /// Builds the engine, validating that the route map is internally
    /// consistent (every node referenced as a target is itself a key) so a
    /// malformed graph is rejected at startup rather than at run time.
    pub fn new() -> Result<Self, WorkflowError> {
        let routes = route_map();
        for targets in routes.values() {
            for target in targets {
                if !routes.contains_key(target) {
                    return Err(WorkflowError::UnknownNode(target.as_str().to_string()));
                }
            }
        }
        Ok(Self { routes })
    }

    /// Runs nodes starting at `start` until a node returns `Halt`.
    ///
    /// The session's mutex is only ever held long enough to clone it out
    /// before a node and write the mutated copy back after — never across
    /// the node dispatch itself, since a node like `route_question` can
    /// block for the whole answer-timeout. That keeps the lock available
    /// for periodic checkpointing (and any other reader) between every
    /// single node transition (§4.5, §4.6).
    #[instrument(skip(self, ctx, handle))]
    pub async fn run(
        &self,
        ctx: &NodeContext,
        handle: &Arc<Mutex<Session>>,
        start: NodeId,
    ) -> Result<(), OrchestratorError> {
        let mut current = start;
        loop {
            let mut working = handle.lock().await.clone();
            info!(node = current.as_str(), phase = ?working.phase, "dispatching node");
            let outcome = nodes::dispatch(current, ctx, &mut working).await;
            *handle.lock().await = working;

            match outcome? {
                NodeOutcome::Halt => return Ok(()),
                NodeOutcome::GoTo(next) => {
                    self.validate_route(current, next)?;
                    current = next;
                }
            }
        }
    }

    fn validate_route(&self, from: NodeId, to: NodeId) -> Result<(), WorkflowError> {
        let allowed = self
            .routes
            .get(&from)
            .ok_or_else(|| WorkflowError::UnknownNode(from.as_str().to_string()))?;
        if allowed.contains(&to) {
            Ok(())
        } else {
            Err(WorkflowError::UnknownRoute {
                node: from.as_str().to_string(),
                route: to.as_str().to_string(),
            })
        }
    }
}

/// §8 property 3: every phase reachable via `route_map` stays inside the
/// DAG declared on `Phase` itself.
pub fn phase_for_node(node: NodeId) -> Phase {
    match node {
        NodeId::Initialise | NodeId::AwaitUpload | NodeId::RouteUpload => Phase::Upload,
        NodeId::Parse => Phase::Parsing,
        NodeId::DetectAi => Phase::AiDetection,
        NodeId::GenerateQuestions => Phase::QuestionGeneration,
        NodeId::AskQuestion | NodeId::RouteQuestion | NodeId::Evaluate | NodeId::TransitionLevel => {
            Phase::Questioning
        }
        NodeId::GenerateReport => Phase::ReportGeneration,
        NodeId::Closing => Phase::Completed,
        NodeId::OnError => Phase::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_map_only_targets_known_nodes() {
        assert!(WorkflowEngine::new().is_ok());
    }

    #[test]
    fn phase_for_node_matches_dag_order() {
        assert_eq!(phase_for_node(NodeId::Parse), Phase::Parsing);
        assert!(Phase::Upload.can_advance_to(phase_for_node(NodeId::Parse)));
    }
}
