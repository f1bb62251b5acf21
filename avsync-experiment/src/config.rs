use avsync_core::{ConfigError, StimulusRef};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Fixed phase durations of every trial, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDurations {
    #[serde(default = "PhaseDurations::default_fixation_ms")]
    pub fixation_ms: u64,
    /// Visual hold measured from the onset tick.
    #[serde(default = "PhaseDurations::default_display_ms")]
    pub display_ms: u64,
    #[serde(default = "PhaseDurations::default_gap_ms")]
    pub gap_ms: u64,
}

impl PhaseDurations {
    fn default_fixation_ms() -> u64 {
        1000
    }
    fn default_display_ms() -> u64 {
        500
    }
    fn default_gap_ms() -> u64 {
        500
    }
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            fixation_ms: Self::default_fixation_ms(),
            display_ms: Self::default_display_ms(),
            gap_ms: Self::default_gap_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionMode {
    /// Each trial result is submitted as soon as it is recorded.
    PerTrial,
    /// One batch with every result is submitted when the session ends.
    #[default]
    Batch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Signed SOAs, one trial each. Negative means the beep leads.
    #[serde(default = "ExperimentConfig::default_soa_ms")]
    pub soa_ms: Vec<i32>,
    #[serde(default)]
    pub timing: PhaseDurations,
    #[serde(default = "ExperimentConfig::default_capture_trajectory")]
    pub capture_trajectory: bool,
    #[serde(default)]
    pub submission_mode: SubmissionMode,
    #[serde(default)]
    pub stimulus: StimulusRef,
}

impl ExperimentConfig {
    fn default_soa_ms() -> Vec<i32> {
        vec![
            -300, -200, -150, -100, -50, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 50, 100, 150, 200, 300,
        ]
    }
    fn default_capture_trajectory() -> bool {
        true
    }

    pub fn trial_count(&self) -> usize {
        self.soa_ms.len()
    }

    /// Checks everything that must hold before a trial block may start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.soa_ms.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }
        if self.stimulus.is_empty() {
            return Err(ConfigError::EmptyStimulus);
        }
        let t = &self.timing;
        for (name, value) in [
            ("fixation_ms", t.fixation_ms),
            ("display_ms", t.display_ms),
            ("gap_ms", t.gap_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        // the hold runs from the onset tick, so a late visual would never show
        if let Some(&soa_ms) = self
            .soa_ms
            .iter()
            .find(|&&soa| soa < 0 && u64::from(soa.unsigned_abs()) >= t.display_ms)
        {
            return Err(ConfigError::SoaOutsideHold {
                soa_ms,
                display_ms: t.display_ms,
            });
        }
        Ok(())
    }

    pub fn from_toml_str(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(contents).map_err(|err| ConfigError::Parse {
            path: origin.to_string(),
            reason: err.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads a TOML config; a missing file yields the defaults, a broken one
    /// is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        if !path.exists() {
            info!("Config {origin} not found, using defaults");
            let cfg = Self::default();
            cfg.validate()?;
            return Ok(cfg);
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: origin.clone(),
            source,
        })?;
        let cfg = Self::from_toml_str(&contents, &origin)?;
        info!(
            "Loaded config {origin}: {} trials, trajectory capture {}",
            cfg.trial_count(),
            cfg.capture_trajectory
        );
        Ok(cfg)
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            soa_ms: Self::default_soa_ms(),
            timing: PhaseDurations::default(),
            capture_trajectory: Self::default_capture_trajectory(),
            submission_mode: SubmissionMode::default(),
            stimulus: StimulusRef::default(),
        }
    }
}
