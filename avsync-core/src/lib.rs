pub mod error;
pub mod participant;
pub mod phase;
pub mod pointer;
pub mod stimulus;
pub mod trial;

pub use error::ConfigError;
pub use participant::{
    Participant, ParticipantId, ParticipantRecord, QUESTIONNAIRE_ITEMS, Questionnaire,
};
pub use phase::{SessionStage, TrialPhase};
pub use pointer::{PointerPosition, PointerSample};
pub use stimulus::{Element, Modality, StimulusRef};
pub use trial::{TrialResult, TrialSpec, UserResponse};
