use crate::pointer::{PointerPosition, PointerSample};
use crate::stimulus::{Modality, StimulusRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One scheduled trial. Derived fields are fixed by [`TrialSpec::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialSpec {
    trial_number: usize,
    soa_ms: i32,
    delay_ms: u32,
    had_offset: bool,
    audio_leads: bool,
    stimulus_ref: StimulusRef,
}

impl TrialSpec {
    /// `soa_ms < 0` means the beep leads, `> 0` means the visual leads.
    pub fn new(trial_number: usize, soa_ms: i32, stimulus_ref: StimulusRef) -> Self {
        Self {
            trial_number,
            soa_ms,
            delay_ms: soa_ms.unsigned_abs(),
            had_offset: soa_ms != 0,
            audio_leads: soa_ms < 0,
            stimulus_ref,
        }
    }

    /// 1-based position in the presented order.
    pub fn trial_number(&self) -> usize {
        self.trial_number
    }

    pub fn soa_ms(&self) -> i32 {
        self.soa_ms
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    pub fn had_offset(&self) -> bool {
        self.had_offset
    }

    pub fn audio_leads(&self) -> bool {
        self.audio_leads
    }

    pub fn stimulus_ref(&self) -> &StimulusRef {
        &self.stimulus_ref
    }

    /// Modality whose onset fires on the onset tick.
    pub fn leading(&self) -> Modality {
        if self.audio_leads {
            Modality::Audio
        } else {
            Modality::Visual
        }
    }

    pub fn lagging(&self) -> Modality {
        self.leading().other()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserResponse {
    Together,
    Delay,
}

impl UserResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserResponse::Together => "together",
            UserResponse::Delay => "delay",
        }
    }
}

impl fmt::Display for UserResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded outcome of one trial, built once when the response lands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResult {
    #[serde(flatten)]
    spec: TrialSpec,
    user_response: UserResponse,
    correct: bool,
    reaction_time_ms: u64,
    final_pointer: Option<PointerPosition>,
    trajectory: Vec<PointerSample>,
}

impl TrialResult {
    pub fn new(
        spec: TrialSpec,
        user_response: UserResponse,
        correct: bool,
        reaction_time_ms: u64,
        final_pointer: Option<PointerPosition>,
        trajectory: Vec<PointerSample>,
    ) -> Self {
        Self {
            spec,
            user_response,
            correct,
            reaction_time_ms,
            final_pointer,
            trajectory,
        }
    }

    pub fn spec(&self) -> &TrialSpec {
        &self.spec
    }

    pub fn trial_number(&self) -> usize {
        self.spec.trial_number
    }

    pub fn user_response(&self) -> UserResponse {
        self.user_response
    }

    pub fn correct(&self) -> bool {
        self.correct
    }

    pub fn reaction_time_ms(&self) -> u64 {
        self.reaction_time_ms
    }

    pub fn final_pointer(&self) -> Option<PointerPosition> {
        self.final_pointer
    }

    pub fn trajectory(&self) -> &[PointerSample] {
        &self.trajectory
    }
}
