use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to the visual asset shown during a trial.
///
/// The engine never interprets it; the host decides whether it names a
/// built-in shape or an image on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StimulusRef(String);

impl StimulusRef {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for StimulusRef {
    fn default() -> Self {
        Self::new("builtin:disk")
    }
}

impl fmt::Display for StimulusRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two stimulus channels whose onsets are offset by the SOA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Visual,
    Audio,
}

impl Modality {
    pub fn other(self) -> Self {
        match self {
            Modality::Visual => Modality::Audio,
            Modality::Audio => Modality::Visual,
        }
    }
}

/// Things the presentation layer can show or hide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    Fixation,
    Stimulus,
    ResponseControls,
}
