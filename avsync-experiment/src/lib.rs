pub mod clock;
pub mod config;
pub mod output;
pub mod response;
pub mod schedule;
pub mod scoring;
pub mod session;
pub mod sink;
pub mod trial;

pub use clock::{ClockError, ClockEvent, StimulusClock, Step};
pub use config::{ExperimentConfig, PhaseDurations, SubmissionMode};
pub use output::{Cue, RecordingOutput, StimulusOutput, VisibleSet};
pub use response::{CapturedResponse, ResponseCapture};
pub use schedule::build_schedule;
pub use scoring::{ScoringRule, SessionAggregator, SessionSummary};
pub use session::SessionState;
pub use sink::{
    BatchPayload, BestEffort, JsonFileSink, MemorySink, OfflineSink, PersistenceSink,
    QuestionnairePayload, ResponsePayload, SinkError, Submission,
};
pub use trial::{ActiveTrial, TrialTimestamps};
