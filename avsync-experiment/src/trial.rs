use avsync_core::{TrialPhase, TrialSpec};

/// The trial the clock is currently driving.
#[derive(Debug, Clone)]
pub struct ActiveTrial {
    pub spec: TrialSpec,
    pub phase: TrialPhase,
    pub timestamps: TrialTimestamps,
}

impl ActiveTrial {
    pub fn new(spec: TrialSpec, started_ns: u64) -> Self {
        Self {
            spec,
            phase: TrialPhase::Fixation,
            timestamps: TrialTimestamps {
                fixation_start: started_ns,
                ..TrialTimestamps::default()
            },
        }
    }
}

/// Actual fire times on the clock's timer, in nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrialTimestamps {
    pub fixation_start: u64,
    pub onset: Option<u64>,
    pub visual_onset: Option<u64>,
    pub audio_onset: Option<u64>,
    pub visual_offset: Option<u64>,
    pub window_open: Option<u64>,
}
