use serde::{Deserialize, Serialize};

/// Pointer location in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

impl PointerPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One pointer-move notification observed during an open response window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerSample {
    pub x: f64,
    pub y: f64,
    /// Milliseconds since the response window opened.
    pub elapsed_ms: u64,
}
