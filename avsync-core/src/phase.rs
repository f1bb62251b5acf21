use serde::{Deserialize, Serialize};

/// Stages a session moves through, from enrollment to the summary screen.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    #[default]
    Enrollment,
    Questionnaire,
    Instructions,
    Trials,
    Complete,
}

impl SessionStage {
    pub fn next(&self) -> Option<Self> {
        use SessionStage::*;
        Some(match self {
            Enrollment => Questionnaire,
            Questionnaire => Instructions,
            Instructions => Trials,
            Trials => Complete,
            Complete => return None,
        })
    }

    pub fn is_trials(&self) -> bool {
        matches!(self, Self::Trials)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Where the current trial is in its presentation sequence.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum TrialPhase {
    /// No trial running.
    #[default]
    Idle,
    Fixation,
    /// Onset tick through the end of the display hold.
    Presentation,
    /// Blank pause between stimulus clear and the response window.
    Gap,
    Response,
}

impl TrialPhase {
    pub fn accepts_response(&self) -> bool {
        matches!(self, Self::Response)
    }
}
