use crate::response::ResponseCapture;
use avsync_core::{TrialResult, TrialSpec};

/// State of the one active session. Only the stimulus clock and the
/// response capture it owns write to it.
#[derive(Debug, Clone)]
pub struct SessionState {
    generation: u64,
    schedule: Vec<TrialSpec>,
    schedule_index: usize,
    results: Vec<TrialResult>,
    capture: ResponseCapture,
}

impl SessionState {
    pub fn new(capture_trajectory: bool) -> Self {
        Self {
            generation: 0,
            schedule: Vec::new(),
            schedule_index: 0,
            results: Vec::new(),
            capture: ResponseCapture::new(capture_trajectory),
        }
    }

    /// Restart counter; scheduled callbacks carry the value they were
    /// created under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn schedule(&self) -> &[TrialSpec] {
        &self.schedule
    }

    pub fn schedule_index(&self) -> usize {
        self.schedule_index
    }

    pub fn results(&self) -> &[TrialResult] {
        &self.results
    }

    pub fn is_tracking(&self) -> bool {
        self.capture.is_tracking()
    }

    pub fn capture(&self) -> &ResponseCapture {
        &self.capture
    }

    pub(crate) fn capture_mut(&mut self) -> &mut ResponseCapture {
        &mut self.capture
    }

    pub fn current_spec(&self) -> Option<&TrialSpec> {
        self.schedule.get(self.schedule_index)
    }

    pub fn is_exhausted(&self) -> bool {
        !self.schedule.is_empty() && self.schedule_index >= self.schedule.len()
    }

    pub(crate) fn begin(&mut self, schedule: Vec<TrialSpec>) {
        self.schedule = schedule;
        self.schedule_index = 0;
        self.results.clear();
        self.capture.reset();
    }

    pub(crate) fn push_result(&mut self, result: TrialResult) {
        self.results.push(result);
        self.schedule_index += 1;
    }

    /// Drops everything and invalidates callbacks from the old generation.
    pub(crate) fn reset(&mut self) {
        self.generation += 1;
        self.schedule.clear();
        self.schedule_index = 0;
        self.results.clear();
        self.capture.reset();
    }
}
