use thiserror::Error;

/// Configuration problems that stop the experiment before the first trial.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SOA list is empty; at least one trial is required")]
    EmptySchedule,

    #[error("stimulus handle is empty")]
    EmptyStimulus,

    #[error("stimulus asset {handle:?} is unusable: {reason}")]
    InvalidStimulus { handle: String, reason: String },

    /// An audio-leading SOA whose visual onset would come after the display
    /// hold has already ended.
    #[error("SOA {soa_ms} ms puts the visual onset past the {display_ms} ms display hold")]
    SoaOutsideHold { soa_ms: i32, display_ms: u64 },

    #[error("phase duration `{0}` must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("questionnaire needs {expected} answers, got {actual}")]
    QuestionnaireLength { expected: usize, actual: usize },

    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {reason}")]
    Parse { path: String, reason: String },
}
