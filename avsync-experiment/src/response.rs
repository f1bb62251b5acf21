use avsync_core::{PointerPosition, PointerSample, UserResponse};
use avsync_timing::ns_to_ms;
use tracing::trace;

/// What the capture hands back when a response control is activated.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedResponse {
    pub user_response: UserResponse,
    pub reaction_time_ms: u64,
    pub final_pointer: Option<PointerPosition>,
    pub trajectory: Vec<PointerSample>,
}

/// Records the participant's choice, reaction time and pointer path for one
/// response window at a time.
#[derive(Debug, Clone)]
pub struct ResponseCapture {
    capture_trajectory: bool,
    window_open_ns: Option<u64>,
    is_tracking: bool,
    last_pointer: Option<PointerPosition>,
    trajectory: Vec<PointerSample>,
}

impl ResponseCapture {
    pub fn new(capture_trajectory: bool) -> Self {
        Self {
            capture_trajectory,
            window_open_ns: None,
            is_tracking: false,
            last_pointer: None,
            trajectory: Vec::new(),
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.is_tracking
    }

    pub fn is_open(&self) -> bool {
        self.window_open_ns.is_some()
    }

    pub fn samples(&self) -> &[PointerSample] {
        &self.trajectory
    }

    /// Opens the response window; tracking starts now.
    pub fn open(&mut self, now_ns: u64) {
        self.window_open_ns = Some(now_ns);
        self.is_tracking = true;
        self.trajectory.clear();
    }

    /// Feeds one raw pointer-move notification. Returns whether it was kept
    /// as a trajectory sample.
    pub fn record_pointer(&mut self, position: PointerPosition, now_ns: u64) -> bool {
        self.last_pointer = Some(position);

        let Some(open_ns) = self.window_open_ns.filter(|_| self.is_tracking) else {
            trace!("pointer sample outside response window dropped");
            return false;
        };
        if !self.capture_trajectory {
            return false;
        }

        let floor = self.trajectory.last().map_or(0, |s| s.elapsed_ms);
        let elapsed_ms = ns_to_ms(now_ns.saturating_sub(open_ns)).max(floor);
        self.trajectory.push(PointerSample {
            x: position.x,
            y: position.y,
            elapsed_ms,
        });
        true
    }

    /// Registers a control activation. The first one in an open window wins;
    /// anything else returns `None`.
    pub fn register(
        &mut self,
        user_response: UserResponse,
        position: Option<PointerPosition>,
        now_ns: u64,
    ) -> Option<CapturedResponse> {
        let Some(open_ns) = self.window_open_ns.take() else {
            trace!("{user_response} activation outside response window ignored");
            return None;
        };
        self.is_tracking = false;
        if position.is_some() {
            self.last_pointer = position;
        }

        let reaction_time_ms = ns_to_ms(now_ns.saturating_sub(open_ns));
        let mut trajectory = std::mem::take(&mut self.trajectory);
        // no sample may postdate the response
        for sample in &mut trajectory {
            sample.elapsed_ms = sample.elapsed_ms.min(reaction_time_ms);
        }

        Some(CapturedResponse {
            user_response,
            reaction_time_ms,
            final_pointer: self.last_pointer,
            trajectory,
        })
    }

    /// Forgets any open window and collected samples.
    pub fn reset(&mut self) {
        self.window_open_ns = None;
        self.is_tracking = false;
        self.last_pointer = None;
        self.trajectory.clear();
    }
}
