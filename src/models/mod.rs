mod artifact;
mod checkpoint;
mod question;
mod report;
mod session;

pub use artifact::{Artifact, RetrievedChunk, Slide, StoredChunk};
pub use checkpoint::{Checkpoint, CheckpointMetadata, CheckpointReason};
pub use question::{Evaluation, Level, Question, QuestionBatch};
pub use report::{AiDetectionReport, FinalReport, Recommendation, SectionResult, SectionVerdict};
pub use session::{
    CandidateDescriptor, ConnectionState, Phase, Session, TimeState, TranscriptEntry,
    TranscriptRole,
};
