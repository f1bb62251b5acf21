//! Outbound persistence. Every submission is attempted once; the engine goes
//! through [`BestEffort`], which logs failures and never returns them.

use avsync_core::{
    Participant, ParticipantId, ParticipantRecord, PointerSample, Questionnaire, TrialResult,
    UserResponse,
};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
    #[error("persistence I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnairePayload {
    pub participant_id: ParticipantId,
    pub answers: Vec<i32>,
}

impl QuestionnairePayload {
    pub fn new(participant_id: &ParticipantId, questionnaire: &Questionnaire) -> Self {
        Self {
            participant_id: participant_id.clone(),
            answers: questionnaire.answers().to_vec(),
        }
    }
}

/// Single-trial submission used in per-trial mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    pub participant_id: ParticipantId,
    pub trial_number: usize,
    pub soa: i32,
    pub delay_ms: u32,
    pub had_delay: bool,
    pub beep_first: bool,
    pub user_response: UserResponse,
    pub reaction_time_ms: u64,
    pub final_mouse_x: Option<f64>,
    pub final_mouse_y: Option<f64>,
    pub mouse_trajectory: Vec<PointerSample>,
}

impl ResponsePayload {
    pub fn new(participant_id: &ParticipantId, result: &TrialResult) -> Self {
        let spec = result.spec();
        Self {
            participant_id: participant_id.clone(),
            trial_number: spec.trial_number(),
            soa: spec.soa_ms(),
            delay_ms: spec.delay_ms(),
            had_delay: spec.had_offset(),
            beep_first: spec.audio_leads(),
            user_response: result.user_response(),
            reaction_time_ms: result.reaction_time_ms(),
            final_mouse_x: result.final_pointer().map(|p| p.x),
            final_mouse_y: result.final_pointer().map(|p| p.y),
            mouse_trajectory: result.trajectory().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPayload {
    pub participant: ParticipantRecord,
    pub questionnaire: Vec<i32>,
    pub trials: Vec<TrialResult>,
}

/// Remote or local store for experiment data.
pub trait PersistenceSink {
    fn register_participant(&mut self, participant: &Participant)
    -> Result<ParticipantId, SinkError>;
    fn submit_questionnaire(&mut self, payload: &QuestionnairePayload) -> Result<(), SinkError>;
    fn submit_response(&mut self, payload: &ResponsePayload) -> Result<(), SinkError>;
    fn submit_batch(&mut self, payload: &BatchPayload) -> Result<(), SinkError>;
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Id used when registration fails so the session can continue offline.
pub fn offline_participant_id() -> ParticipantId {
    ParticipantId::new(format!(
        "offline-{}-{:04x}",
        unix_millis(),
        rand::random::<u16>()
    ))
}

/// Wraps a sink so that no failure ever reaches the caller.
pub struct BestEffort<S> {
    inner: S,
}

impl<S: PersistenceSink> BestEffort<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn register_participant(&mut self, participant: &Participant) -> ParticipantId {
        match self.inner.register_participant(participant) {
            Ok(id) => {
                debug!("Participant registered as {id}");
                id
            }
            Err(e) => {
                let id = offline_participant_id();
                warn!("Participant registration failed ({e}); running offline as {id}");
                id
            }
        }
    }

    pub fn submit_questionnaire(&mut self, payload: &QuestionnairePayload) {
        if let Err(e) = self.inner.submit_questionnaire(payload) {
            warn!("Questionnaire not saved: {e}");
        }
    }

    pub fn submit_response(&mut self, payload: &ResponsePayload) {
        if let Err(e) = self.inner.submit_response(payload) {
            warn!("Response for trial {} not saved: {e}", payload.trial_number);
        }
    }

    pub fn submit_batch(&mut self, payload: &BatchPayload) {
        match self.inner.submit_batch(payload) {
            Ok(()) => debug!("Batch of {} trials submitted", payload.trials.len()),
            Err(e) => warn!("Session batch not saved: {e}"),
        }
    }
}

/// Sink that is never reachable.
#[derive(Debug, Clone, Default)]
pub struct OfflineSink;

impl PersistenceSink for OfflineSink {
    fn register_participant(&mut self, _: &Participant) -> Result<ParticipantId, SinkError> {
        Err(SinkError::Unavailable("offline".into()))
    }
    fn submit_questionnaire(&mut self, _: &QuestionnairePayload) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("offline".into()))
    }
    fn submit_response(&mut self, _: &ResponsePayload) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("offline".into()))
    }
    fn submit_batch(&mut self, _: &BatchPayload) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("offline".into()))
    }
}

/// Appends each submission as one JSON line to a per-kind file.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub const PARTICIPANTS: &'static str = "participants.jsonl";
    pub const QUESTIONNAIRES: &'static str = "questionnaires.jsonl";
    pub const RESPONSES: &'static str = "responses.jsonl";
    pub const SESSIONS: &'static str = "sessions.jsonl";

    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn append<T: Serialize>(&self, file: &str, value: &T) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))?;
        f.write_all(&line)?;
        Ok(())
    }
}

impl PersistenceSink for JsonFileSink {
    fn register_participant(
        &mut self,
        participant: &Participant,
    ) -> Result<ParticipantId, SinkError> {
        let id = ParticipantId::new(format!("p-{}", unix_millis()));
        self.append(
            Self::PARTICIPANTS,
            &ParticipantRecord::new(id.clone(), participant),
        )?;
        Ok(id)
    }

    fn submit_questionnaire(&mut self, payload: &QuestionnairePayload) -> Result<(), SinkError> {
        self.append(Self::QUESTIONNAIRES, payload)
    }

    fn submit_response(&mut self, payload: &ResponsePayload) -> Result<(), SinkError> {
        self.append(Self::RESPONSES, payload)
    }

    fn submit_batch(&mut self, payload: &BatchPayload) -> Result<(), SinkError> {
        self.append(Self::SESSIONS, payload)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Participant(Participant),
    Questionnaire(QuestionnairePayload),
    Response(ResponsePayload),
    Batch(BatchPayload),
}

/// Keeps every submission in memory; can be told to fail every call after
/// recording it.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub submissions: Vec<Submission>,
    pub fail: bool,
}

impl MemorySink {
    pub fn failing() -> Self {
        Self {
            submissions: Vec::new(),
            fail: true,
        }
    }

    fn record(&mut self, submission: Submission) -> Result<(), SinkError> {
        self.submissions.push(submission);
        if self.fail {
            Err(SinkError::Unavailable("memory sink set to fail".into()))
        } else {
            Ok(())
        }
    }

    pub fn responses(&self) -> impl Iterator<Item = &ResponsePayload> {
        self.submissions.iter().filter_map(|s| match s {
            Submission::Response(r) => Some(r),
            _ => None,
        })
    }

    pub fn batches(&self) -> impl Iterator<Item = &BatchPayload> {
        self.submissions.iter().filter_map(|s| match s {
            Submission::Batch(b) => Some(b),
            _ => None,
        })
    }
}

impl PersistenceSink for MemorySink {
    fn register_participant(
        &mut self,
        participant: &Participant,
    ) -> Result<ParticipantId, SinkError> {
        self.record(Submission::Participant(participant.clone()))?;
        Ok(ParticipantId::new(format!("mem-{}", self.submissions.len())))
    }

    fn submit_questionnaire(&mut self, payload: &QuestionnairePayload) -> Result<(), SinkError> {
        self.record(Submission::Questionnaire(payload.clone()))
    }

    fn submit_response(&mut self, payload: &ResponsePayload) -> Result<(), SinkError> {
        self.record(Submission::Response(payload.clone()))
    }

    fn submit_batch(&mut self, payload: &BatchPayload) -> Result<(), SinkError> {
        self.record(Submission::Batch(payload.clone()))
    }
}
