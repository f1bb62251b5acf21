use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of items on the pre-experiment questionnaire.
pub const QUESTIONNAIRE_ITEMS: usize = 18;

/// Demographics collected before the experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub age: u32,
    pub gender: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for ids synthesized locally because registration failed.
    pub fn is_offline(&self) -> bool {
        self.0.starts_with("offline-")
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Participant as it appears in the outbound batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    pub participant_id: ParticipantId,
    pub age: u32,
    pub gender: String,
}

impl ParticipantRecord {
    pub fn new(participant_id: ParticipantId, participant: &Participant) -> Self {
        Self {
            participant_id,
            age: participant.age,
            gender: participant.gender.clone(),
        }
    }
}

/// Likert answers, one per questionnaire item, in item order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Questionnaire(Vec<i32>);

impl Questionnaire {
    pub fn new(answers: Vec<i32>) -> Result<Self, ConfigError> {
        if answers.len() != QUESTIONNAIRE_ITEMS {
            return Err(ConfigError::QuestionnaireLength {
                expected: QUESTIONNAIRE_ITEMS,
                actual: answers.len(),
            });
        }
        Ok(Self(answers))
    }

    pub fn answers(&self) -> &[i32] {
        &self.0
    }
}
