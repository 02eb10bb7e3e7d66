//! The live `Session` (§3 "Session") and its lifecycle phases (§4.6).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::Artifact;
use super::question::{Evaluation, Level, Question};
use super::report::{AiDetectionReport, FinalReport};

/// Coarse lifecycle marker (§4.6 "Phases").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Upload,
    Parsing,
    AiDetection,
    QuestionGeneration,
    Questioning,
    ReportGeneration,
    Completed,
    Error,
}

impl Phase {
    /// The DAG of legal phase transitions (§4.6, §8 property 3). A node may
    /// only advance the session's phase to one of the values returned here.
    pub fn successors(self) -> &'static [Phase] {
        match self {
            Phase::Upload => &[Phase::Parsing],
            Phase::Parsing => &[Phase::AiDetection, Phase::Error],
            Phase::AiDetection => &[Phase::QuestionGeneration, Phase::Error],
            Phase::QuestionGeneration => &[Phase::Questioning, Phase::Error],
            Phase::Questioning => &[Phase::ReportGeneration, Phase::Error],
            Phase::ReportGeneration => &[Phase::Completed, Phase::Error],
            Phase::Completed => &[],
            Phase::Error => &[],
        }
    }

    pub fn can_advance_to(self, next: Phase) -> bool {
        next == self || self.successors().contains(&next)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Reconnecting,
    Disconnected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptRole {
    Candidate,
    Ai,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptEntry {
    pub role: TranscriptRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateDescriptor {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeState {
    pub started_at: DateTime<Utc>,
    pub current_question_started_at: Option<DateTime<Utc>>,
    pub accumulated_duration_secs: i64,
}

impl TimeState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            current_question_started_at: None,
            accumulated_duration_secs: 0,
        }
    }
}

/// The per-review session state. Owned exclusively by the orchestrator; all
/// mutation flows through the workflow engine (component F), which is the
/// only writer (§5 "Scheduling model").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub room_id: String,
    pub candidate: CandidateDescriptor,
    pub project_title: String,
    pub project_description: Option<String>,
    pub artifact_uri: Option<String>,
    pub artifact: Option<Artifact>,
    pub phase: Phase,
    pub current_question: Option<Question>,
    /// The candidate's transcribed answer to `current_question`, staged
    /// here between `route_question` receiving it and `evaluate` consuming
    /// it (not part of the durable record once evaluated).
    pub pending_answer: Option<String>,
    /// Remaining pool, partitioned by level, in generation order.
    pub question_pool: BTreeMap<Level, Vec<Question>>,
    pub current_level: Level,
    pub questions_asked: Vec<Question>,
    pub evaluations: Vec<Evaluation>,
    pub transcript: Vec<TranscriptEntry>,
    pub last_ai_utterance: Option<String>,
    pub connection_state: ConnectionState,
    pub last_heartbeat: DateTime<Utc>,
    pub time: TimeState,
    pub error_count: u32,
    pub last_error: Option<String>,
    pub ai_detection_report: Option<AiDetectionReport>,
    pub final_report: Option<FinalReport>,
    /// Number of timeouts already applied to the current question (§4.6
    /// "Tie-breaks": rephrase on first, skip on second).
    pub current_question_timeouts: u32,
}

impl Session {
    pub fn new(
        session_id: impl Into<String>,
        room_id: impl Into<String>,
        candidate: CandidateDescriptor,
        project_title: impl Into<String>,
        project_description: Option<String>,
        artifact_uri: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            room_id: room_id.into(),
            candidate,
            project_title: project_title.into(),
            project_description,
            artifact_uri,
            artifact: None,
            phase: Phase::Upload,
            current_question: None,
            pending_answer: None,
            question_pool: BTreeMap::new(),
            current_level: Level::Easy,
            questions_asked: Vec::new(),
            evaluations: Vec::new(),
            transcript: Vec::new(),
            last_ai_utterance: None,
            connection_state: ConnectionState::Connected,
            last_heartbeat: now,
            time: TimeState::new(now),
            error_count: 0,
            last_error: None,
            ai_detection_report: None,
            final_report: None,
            current_question_timeouts: 0,
        }
    }

    /// §8 property 1: `|evaluations| <= |questions_asked| <= 10`.
    pub fn invariant_question_counts_hold(&self, max_questions: usize) -> bool {
        self.evaluations.len() <= self.questions_asked.len()
            && self.questions_asked.len() <= max_questions
    }

    pub fn has_artifact(&self) -> bool {
        self.artifact_uri.is_some() || self.artifact.is_some()
    }

    pub fn push_transcript(&mut self, role: TranscriptRole, text: impl Into<String>, now: DateTime<Utc>) {
        self.transcript.push(TranscriptEntry {
            role,
            text: text.into(),
            timestamp: now,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> Session {
        Session::new(
            "s1",
            "room1",
            CandidateDescriptor {
                id: "c1".into(),
                display_name: "Ada".into(),
            },
            "Project X",
            None,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn phase_dag_rejects_skips() {
        assert!(Phase::Upload.can_advance_to(Phase::Parsing));
        assert!(!Phase::Upload.can_advance_to(Phase::Questioning));
        assert!(Phase::Completed.successors().is_empty());
    }

    #[test]
    fn question_count_invariant() {
        let session = sample_session();
        assert!(session.invariant_question_counts_hold(10));
    }
}
