use crate::config::{ExperimentConfig, SubmissionMode};
use crate::output::StimulusOutput;
use crate::schedule::build_schedule;
use crate::scoring::{SessionAggregator, SessionSummary};
use crate::session::SessionState;
use crate::sink::{BestEffort, PersistenceSink, QuestionnairePayload, ResponsePayload};
use crate::trial::ActiveTrial;
use avsync_core::{
    ConfigError, Element, Modality, Participant, ParticipantId, ParticipantRecord,
    PointerPosition, Questionnaire, SessionStage, TrialPhase, TrialResult, UserResponse,
};
use avsync_timing::{Scheduled, Timeline, Timer, ms_to_ns};
use std::time::Duration;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, trace};

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("cannot do that during {actual:?}; expected {expected:?}")]
    Stage {
        expected: SessionStage,
        actual: SessionStage,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Phase transition a scheduled callback performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FixationElapsed,
    LaggingOnset(Modality),
    DisplayElapsed,
    GapElapsed,
}

/// A scheduled callback, tagged with the session generation and trial it
/// was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockEvent {
    pub generation: u64,
    pub trial_index: usize,
    pub step: Step,
}

/// Drives the session: stage changes, the per-trial phase sequence, response
/// registration and hand-off to the aggregator.
pub struct StimulusClock<T, R, O, S>
where
    T: Timer,
    R: Rng,
    O: StimulusOutput,
    S: PersistenceSink,
{
    config: ExperimentConfig,
    timer: T,
    rng: R,
    output: O,
    sink: BestEffort<S>,
    timeline: Timeline<ClockEvent>,
    session: SessionState,
    aggregator: SessionAggregator,
    stage: SessionStage,
    current: Option<ActiveTrial>,
    participant: Option<ParticipantRecord>,
    questionnaire: Option<Questionnaire>,
    summary: Option<SessionSummary>,
}

impl<T, R, O, S> StimulusClock<T, R, O, S>
where
    T: Timer,
    R: Rng,
    O: StimulusOutput,
    S: PersistenceSink,
{
    pub fn new(
        config: ExperimentConfig,
        timer: T,
        rng: R,
        output: O,
        sink: S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            aggregator: SessionAggregator::for_soas(&config.soa_ms),
            session: SessionState::new(config.capture_trajectory),
            config,
            timer,
            rng,
            output,
            sink: BestEffort::new(sink),
            timeline: Timeline::new(),
            stage: SessionStage::default(),
            current: None,
            participant: None,
            questionnaire: None,
            summary: None,
        })
    }

    fn expect_stage(&self, expected: SessionStage) -> Result<(), ClockError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(ClockError::Stage {
                expected,
                actual: self.stage,
            })
        }
    }

    fn advance_stage(&mut self) {
        if let Some(next) = self.stage.next() {
            info!("Stage {:?} -> {:?}", self.stage, next);
            self.stage = next;
        }
    }

    /// Registers the participant. A failed registration still succeeds with
    /// an offline id.
    pub fn enroll(&mut self, participant: Participant) -> Result<ParticipantId, ClockError> {
        self.expect_stage(SessionStage::Enrollment)?;
        let id = self.sink.register_participant(&participant);
        self.participant = Some(ParticipantRecord::new(id.clone(), &participant));
        self.advance_stage();
        Ok(id)
    }

    pub fn submit_questionnaire(&mut self, questionnaire: Questionnaire) -> Result<(), ClockError> {
        self.expect_stage(SessionStage::Questionnaire)?;
        if let Some(record) = &self.participant {
            self.sink.submit_questionnaire(&QuestionnairePayload::new(
                &record.participant_id,
                &questionnaire,
            ));
        }
        self.questionnaire = Some(questionnaire);
        self.advance_stage();
        Ok(())
    }

    /// Builds a freshly shuffled schedule and starts the first trial.
    pub fn start(&mut self) -> Result<(), ClockError> {
        self.expect_stage(SessionStage::Instructions)?;
        let schedule = build_schedule(&self.config.soa_ms, &self.config.stimulus, &mut self.rng)?;
        info!(
            "Starting {} trials (generation {})",
            schedule.len(),
            self.session.generation()
        );
        self.session.begin(schedule);
        self.advance_stage();
        let now = self.timer.now();
        self.start_trial(now);
        Ok(())
    }

    /// Clear + fixation for the trial at the current schedule index.
    fn start_trial(&mut self, base_ns: u64) {
        let Some(spec) = self.session.current_spec().cloned() else {
            return;
        };
        self.output.hide(Element::Stimulus);
        self.output.hide(Element::ResponseControls);
        self.output.show(Element::Fixation);

        info!(
            "Trial {}/{}: soa {} ms",
            spec.trial_number(),
            self.session.schedule().len(),
            spec.soa_ms()
        );
        self.current = Some(ActiveTrial::new(spec, self.timer.now()));
        self.schedule(base_ns + ms_to_ns(self.config.timing.fixation_ms), Step::FixationElapsed);
    }

    fn schedule(&mut self, due_ns: u64, step: Step) {
        self.timeline.schedule_at(
            due_ns,
            ClockEvent {
                generation: self.session.generation(),
                trial_index: self.session.schedule_index(),
                step,
            },
        );
    }

    /// Fires every callback that is due. Call this from the host loop.
    pub fn poll(&mut self) -> usize {
        let now = self.timer.now();
        let mut fired = 0;
        while let Some(Scheduled { due_ns, event }) = self.timeline.pop_due(now) {
            debug!(
                "{:?} fired {} us late",
                event.step,
                now.saturating_sub(due_ns) / 1_000
            );
            self.fire(event, due_ns);
            fired += 1;
        }
        fired
    }

    /// Applies one scheduled callback. Callbacks from an earlier generation or
    /// another trial, or that do not match the current phase, do nothing. A
    /// lagging tone belongs to its trial rather than to a phase and plays
    /// whenever it comes due.
    pub fn fire(&mut self, event: ClockEvent, due_ns: u64) {
        if event.generation != self.session.generation()
            || event.trial_index != self.session.schedule_index()
        {
            debug!("Stale {:?} ignored", event);
            return;
        }
        let Some(phase) = self.current.as_ref().map(|t| t.phase) else {
            debug!("{:?} with no active trial ignored", event.step);
            return;
        };

        match (phase, event.step) {
            (TrialPhase::Fixation, Step::FixationElapsed) => self.onset(due_ns),
            (TrialPhase::Presentation, Step::LaggingOnset(modality)) => self.trigger(modality),
            // a lagging tone may land after the display hold
            (_, Step::LaggingOnset(Modality::Audio)) => self.trigger(Modality::Audio),
            (TrialPhase::Presentation, Step::DisplayElapsed) => {
                self.output.hide(Element::Stimulus);
                let now = self.timer.now();
                if let Some(trial) = self.current.as_mut() {
                    trial.phase = TrialPhase::Gap;
                    trial.timestamps.visual_offset = Some(now);
                }
                self.schedule(due_ns + ms_to_ns(self.config.timing.gap_ms), Step::GapElapsed);
            }
            (TrialPhase::Gap, Step::GapElapsed) => self.open_response_window(),
            (phase, step) => debug!("{step:?} ignored during {phase:?}"),
        }
    }

    fn onset(&mut self, due_ns: u64) {
        self.output.hide(Element::Fixation);
        let now = self.timer.now();
        let Some(trial) = self.current.as_mut() else {
            return;
        };
        trial.phase = TrialPhase::Presentation;
        trial.timestamps.onset = Some(now);
        let (leading, lagging, delay_ms) = (
            trial.spec.leading(),
            trial.spec.lagging(),
            trial.spec.delay_ms(),
        );

        self.trigger(leading);
        if delay_ms == 0 {
            self.trigger(lagging);
        } else {
            self.schedule(
                due_ns + ms_to_ns(u64::from(delay_ms)),
                Step::LaggingOnset(lagging),
            );
        }
        self.schedule(
            due_ns + ms_to_ns(self.config.timing.display_ms),
            Step::DisplayElapsed,
        );
    }

    fn trigger(&mut self, modality: Modality) {
        let now = self.timer.now();
        match modality {
            Modality::Visual => self.output.show(Element::Stimulus),
            Modality::Audio => self.output.emit_tone(),
        }
        if let Some(trial) = self.current.as_mut() {
            let slot = match modality {
                Modality::Visual => &mut trial.timestamps.visual_onset,
                Modality::Audio => &mut trial.timestamps.audio_onset,
            };
            *slot = Some(now);
        }
    }

    fn open_response_window(&mut self) {
        self.output.show(Element::ResponseControls);
        let now = self.timer.now();
        self.session.capture_mut().open(now);
        if let Some(trial) = self.current.as_mut() {
            trial.phase = TrialPhase::Response;
            trial.timestamps.window_open = Some(now);
        }
        debug!("Response window open");
    }

    /// Forwards a pointer-move notification to the response capture.
    pub fn record_pointer(&mut self, position: PointerPosition) -> bool {
        let now = self.timer.now();
        self.session.capture_mut().record_pointer(position, now)
    }

    /// Activates one of the two response controls. Returns the recorded
    /// result, or `None` when no response window is open.
    pub fn respond(
        &mut self,
        response: UserResponse,
        position: Option<PointerPosition>,
    ) -> Option<&TrialResult> {
        let in_window = self.stage.is_trials()
            && self
                .current
                .as_ref()
                .is_some_and(|t| t.phase.accepts_response());
        if !in_window {
            trace!("{response} outside response window ignored");
            return None;
        }

        let now = self.timer.now();
        let captured = self
            .session
            .capture_mut()
            .register(response, position, now)?;
        let trial = self.current.take()?;
        self.output.hide(Element::ResponseControls);

        let correct = self.aggregator.score(&trial.spec, response);
        info!(
            "Trial {} answered {} ({}) in {} ms",
            trial.spec.trial_number(),
            response,
            if correct { "correct" } else { "incorrect" },
            captured.reaction_time_ms
        );
        let result = TrialResult::new(
            trial.spec,
            captured.user_response,
            correct,
            captured.reaction_time_ms,
            captured.final_pointer,
            captured.trajectory,
        );

        if self.config.submission_mode == SubmissionMode::PerTrial {
            if let Some(record) = &self.participant {
                let payload = ResponsePayload::new(&record.participant_id, &result);
                self.sink.submit_response(&payload);
            }
        }

        self.session.push_result(result);
        if self.session.is_exhausted() {
            self.finish();
        } else {
            self.start_trial(now);
        }
        self.session.results().last()
    }

    fn finish(&mut self) {
        self.output.hide(Element::Fixation);
        self.output.hide(Element::Stimulus);
        self.output.hide(Element::ResponseControls);

        let summary = self.aggregator.summarize(self.session.results());
        info!(
            "Session complete: {} / {} correct ({:.1}%)",
            summary.correct, summary.total, summary.accuracy_pct
        );
        if self.config.submission_mode == SubmissionMode::Batch {
            if let Some(record) = &self.participant {
                let batch = self.aggregator.batch(
                    record,
                    self.questionnaire.as_ref(),
                    self.session.results(),
                );
                self.sink.submit_batch(&batch);
            }
        }
        self.summary = Some(summary);
        self.advance_stage();
    }

    /// Back to enrollment with nothing carried over. Pending callbacks are
    /// cancelled and any that still arrive are ignored.
    pub fn restart(&mut self) {
        let cancelled = self.timeline.clear();
        self.session.reset();
        self.current = None;
        self.participant = None;
        self.questionnaire = None;
        self.summary = None;
        self.output.hide(Element::Fixation);
        self.output.hide(Element::Stimulus);
        self.output.hide(Element::ResponseControls);
        self.stage = SessionStage::Enrollment;
        info!(
            "Session restarted (generation {}, {cancelled} pending callbacks cancelled)",
            self.session.generation()
        );
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timeline.next_due()
    }

    /// Time left until the next callback is due, zero when one is overdue.
    pub fn time_to_next_deadline(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|due| Duration::from_nanos(due.saturating_sub(self.timer.now())))
    }

    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    pub fn phase(&self) -> TrialPhase {
        self.current.as_ref().map_or(TrialPhase::Idle, |t| t.phase)
    }

    pub fn current_trial(&self) -> Option<&ActiveTrial> {
        self.current.as_ref()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn results(&self) -> &[TrialResult] {
        self.session.results()
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn participant(&self) -> Option<&ParticipantRecord> {
        self.participant.as_ref()
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn sink(&self) -> &BestEffort<S> {
        &self.sink
    }

    /// `(current, total)` while trials are running, 1-based.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.stage.is_trials().then(|| {
            (
                self.session.schedule_index() + 1,
                self.session.schedule().len(),
            )
        })
    }
}
