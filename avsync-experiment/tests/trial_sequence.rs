use avsync_core::{
    Element, Participant, PointerPosition, Questionnaire, SessionStage, TrialPhase, UserResponse,
};
use avsync_experiment::{
    ClockEvent, Cue, ExperimentConfig, MemorySink, RecordingOutput, StimulusClock, Step,
};
use avsync_timing::{Timer, VirtualTimer, ms_to_ns};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

type Clock = StimulusClock<VirtualTimer, ChaCha8Rng, RecordingOutput<VirtualTimer>, MemorySink>;

fn clock_for(soas: &[i32]) -> (Clock, VirtualTimer) {
    let timer = VirtualTimer::new();
    let config = ExperimentConfig {
        soa_ms: soas.to_vec(),
        ..ExperimentConfig::default()
    };
    let clock = StimulusClock::new(
        config,
        timer.clone(),
        ChaCha8Rng::seed_from_u64(1),
        RecordingOutput::new(timer.clone()),
        MemorySink::default(),
    )
    .unwrap();
    (clock, timer)
}

fn start(clock: &mut Clock) {
    clock
        .enroll(Participant {
            age: 24,
            gender: "other".into(),
        })
        .unwrap();
    clock
        .submit_questionnaire(Questionnaire::new(vec![3; 18]).unwrap())
        .unwrap();
    clock.start().unwrap();
}

/// Steps virtual time to `ms`, landing exactly on every deadline on the way.
fn run_until(clock: &mut Clock, timer: &VirtualTimer, ms: u64) {
    let target = ms_to_ns(ms);
    while let Some(due) = clock.next_deadline().filter(|&due| due <= target) {
        timer.set_ms(due / 1_000_000);
        clock.poll();
    }
    timer.set_ms(ms);
    clock.poll();
}

fn ms(times: Vec<u64>) -> Vec<u64> {
    times.into_iter().map(|t| t / 1_000_000).collect()
}

#[test]
fn visual_leading_trial_follows_phase_timing() {
    let (mut clock, timer) = clock_for(&[100]);
    start(&mut clock);
    assert_eq!(clock.phase(), TrialPhase::Fixation);

    run_until(&mut clock, &timer, 2500);
    let out = clock.output();
    assert_eq!(ms(out.times_of(Cue::Show(Element::Fixation))), vec![0]);
    assert_eq!(ms(out.times_of(Cue::Hide(Element::Fixation))), vec![1000]);
    assert_eq!(ms(out.times_of(Cue::Show(Element::Stimulus))), vec![1000]);
    assert_eq!(ms(out.times_of(Cue::Tone)), vec![1100]);
    assert_eq!(ms(out.times_of(Cue::Show(Element::ResponseControls))), vec![2000]);

    let hides = ms(out.times_of(Cue::Hide(Element::Stimulus)));
    assert_eq!(hides.last(), Some(&1500));
    assert_eq!(clock.phase(), TrialPhase::Response);
    assert!(clock.session().is_tracking());
}

#[test]
fn audio_leading_trial_beeps_first_and_keeps_visual_hold() {
    let (mut clock, timer) = clock_for(&[-100]);
    start(&mut clock);
    run_until(&mut clock, &timer, 2000);

    let out = clock.output();
    assert_eq!(ms(out.times_of(Cue::Tone)), vec![1000]);
    assert_eq!(ms(out.times_of(Cue::Show(Element::Stimulus))), vec![1100]);
    assert_eq!(
        ms(out.times_of(Cue::Hide(Element::Stimulus))).last(),
        Some(&1500)
    );

    let stamps = &clock.current_trial().unwrap().timestamps;
    let lag = stamps.visual_onset.unwrap() - stamps.audio_onset.unwrap();
    assert_eq!(lag, ms_to_ns(100));
}

#[test]
fn lagging_tone_past_the_hold_plays_during_the_gap() {
    let (mut clock, timer) = clock_for(&[600]);
    start(&mut clock);

    run_until(&mut clock, &timer, 1599);
    assert_eq!(clock.phase(), TrialPhase::Gap);
    assert_eq!(clock.output().tones(), 0);

    run_until(&mut clock, &timer, 1600);
    assert_eq!(clock.phase(), TrialPhase::Gap);
    let out = clock.output();
    assert_eq!(ms(out.times_of(Cue::Tone)), vec![1600]);
    assert_eq!(ms(out.times_of(Cue::Show(Element::Stimulus))), vec![1000]);
    assert_eq!(
        ms(out.times_of(Cue::Hide(Element::Stimulus))).last(),
        Some(&1500)
    );

    let stamps = &clock.current_trial().unwrap().timestamps;
    assert_eq!(stamps.audio_onset, Some(ms_to_ns(1600)));

    run_until(&mut clock, &timer, 2000);
    assert_eq!(
        ms(clock.output().times_of(Cue::Show(Element::ResponseControls))),
        vec![2000]
    );
    assert_eq!(clock.phase(), TrialPhase::Response);
    assert_eq!(clock.output().tones(), 1);
}

#[test]
fn time_to_next_deadline_counts_down_and_clears_in_the_window() {
    use std::time::Duration;

    let (mut clock, timer) = clock_for(&[100]);
    assert_eq!(clock.time_to_next_deadline(), None);
    start(&mut clock);
    assert_eq!(clock.time_to_next_deadline(), Some(Duration::from_millis(1000)));

    timer.set_ms(400);
    assert_eq!(clock.time_to_next_deadline(), Some(Duration::from_millis(600)));
    // overdue reads as zero until polled
    timer.set_ms(1050);
    assert_eq!(clock.time_to_next_deadline(), Some(Duration::ZERO));
    clock.poll();
    assert_eq!(clock.time_to_next_deadline(), Some(Duration::from_millis(50)));

    run_until(&mut clock, &timer, 2000);
    assert_eq!(clock.phase(), TrialPhase::Response);
    assert_eq!(clock.time_to_next_deadline(), None);
}

#[test]
fn simultaneous_trial_fires_both_in_one_tick() {
    let (mut clock, timer) = clock_for(&[0]);
    start(&mut clock);
    run_until(&mut clock, &timer, 1000);

    let out = clock.output();
    assert_eq!(ms(out.times_of(Cue::Tone)), vec![1000]);
    assert_eq!(ms(out.times_of(Cue::Show(Element::Stimulus))), vec![1000]);
    // visual first, then the tone
    let onset_cues: Vec<Cue> = out
        .cues
        .iter()
        .filter(|(t, _)| *t == ms_to_ns(1000))
        .map(|(_, c)| *c)
        .collect();
    assert_eq!(
        onset_cues,
        vec![
            Cue::Hide(Element::Fixation),
            Cue::Show(Element::Stimulus),
            Cue::Tone
        ]
    );
    // only the display hold remains scheduled
    assert_eq!(clock.next_deadline(), Some(ms_to_ns(1500)));
}

#[test]
fn late_poll_catches_up_without_drift() {
    let (mut clock, timer) = clock_for(&[200]);
    start(&mut clock);

    // one poll long after everything was due
    timer.set_ms(5000);
    clock.poll();
    assert_eq!(clock.phase(), TrialPhase::Response);
    assert_eq!(clock.output().tones(), 1);
    assert!(clock.output().visible.response_controls);
    assert!(!clock.output().visible.stimulus);
}

#[test]
fn response_window_waits_without_timeout() {
    let (mut clock, timer) = clock_for(&[100, 0]);
    start(&mut clock);
    run_until(&mut clock, &timer, 2000);
    let cues_before = clock.output().cues.len();

    run_until(&mut clock, &timer, 600_000);
    assert_eq!(clock.phase(), TrialPhase::Response);
    assert_eq!(clock.output().cues.len(), cues_before);
    assert_eq!(clock.next_deadline(), None);

    let result = clock.respond(UserResponse::Delay, None).unwrap();
    assert_eq!(result.reaction_time_ms(), 598_000);
}

#[test]
fn responses_outside_the_window_are_ignored() {
    let (mut clock, timer) = clock_for(&[100]);
    assert!(clock.respond(UserResponse::Delay, None).is_none());

    start(&mut clock);
    assert!(clock.respond(UserResponse::Delay, None).is_none());
    run_until(&mut clock, &timer, 1200);
    assert_eq!(clock.phase(), TrialPhase::Presentation);
    assert!(clock.respond(UserResponse::Together, None).is_none());
    run_until(&mut clock, &timer, 1700);
    assert_eq!(clock.phase(), TrialPhase::Gap);
    assert!(clock.respond(UserResponse::Together, None).is_none());

    assert!(clock.results().is_empty());
    assert_eq!(clock.session().schedule_index(), 0);
}

#[test]
fn second_activation_in_same_window_is_ignored() {
    let (mut clock, timer) = clock_for(&[100, 200]);
    start(&mut clock);
    run_until(&mut clock, &timer, 2000);

    assert!(clock.respond(UserResponse::Delay, None).is_some());
    assert!(clock.respond(UserResponse::Together, None).is_none());
    assert_eq!(clock.results().len(), 1);
    assert_eq!(clock.phase(), TrialPhase::Fixation);
}

#[test]
fn pointer_is_sampled_only_while_window_is_open() {
    let (mut clock, timer) = clock_for(&[100, -100]);
    start(&mut clock);

    assert!(!clock.record_pointer(PointerPosition::new(1.0, 1.0)));
    run_until(&mut clock, &timer, 2000);
    assert!(clock.record_pointer(PointerPosition::new(10.0, 10.0)));
    timer.advance_ms(20);
    assert!(clock.record_pointer(PointerPosition::new(20.0, 15.0)));
    timer.advance_ms(30);

    let result = clock
        .respond(UserResponse::Delay, Some(PointerPosition::new(21.0, 16.0)))
        .unwrap()
        .clone();
    assert_eq!(result.reaction_time_ms(), 50);
    let elapsed: Vec<u64> = result.trajectory().iter().map(|s| s.elapsed_ms).collect();
    assert_eq!(elapsed, vec![0, 20]);
    assert_eq!(result.final_pointer(), Some(PointerPosition::new(21.0, 16.0)));

    assert!(!clock.session().is_tracking());
    assert!(!clock.record_pointer(PointerPosition::new(30.0, 30.0)));
}

#[test]
fn next_trial_starts_from_the_response_instant() {
    let (mut clock, timer) = clock_for(&[100, 100]);
    start(&mut clock);
    run_until(&mut clock, &timer, 2300);
    clock.respond(UserResponse::Delay, None).unwrap();

    assert_eq!(clock.session().schedule_index(), 1);
    assert_eq!(clock.next_deadline(), Some(ms_to_ns(3300)));
    assert!(clock.output().visible.fixation);
    assert!(!clock.output().visible.response_controls);
}

#[test]
fn stale_callbacks_do_nothing() {
    let (mut clock, timer) = clock_for(&[100, 200]);
    start(&mut clock);
    let generation = clock.session().generation();
    clock.output_mut().clear();

    clock.fire(
        ClockEvent {
            generation: generation + 7,
            trial_index: 0,
            step: Step::FixationElapsed,
        },
        timer.now(),
    );
    clock.fire(
        ClockEvent {
            generation,
            trial_index: 1,
            step: Step::FixationElapsed,
        },
        timer.now(),
    );
    clock.fire(
        ClockEvent {
            generation,
            trial_index: 0,
            step: Step::GapElapsed,
        },
        timer.now(),
    );

    assert!(clock.output().cues.is_empty());
    assert_eq!(clock.phase(), TrialPhase::Fixation);
}

#[test]
fn restart_mid_session_resets_and_silences_old_timers() {
    let (mut clock, timer) = clock_for(&[100, 200, 0]);
    start(&mut clock);
    run_until(&mut clock, &timer, 2000);
    clock.respond(UserResponse::Delay, None).unwrap();
    run_until(&mut clock, &timer, 3200);
    let old_generation = clock.session().generation();
    assert!(clock.next_deadline().is_some());

    clock.restart();
    assert_eq!(clock.stage(), SessionStage::Enrollment);
    assert_eq!(clock.session().schedule_index(), 0);
    assert!(clock.results().is_empty());
    assert_eq!(clock.next_deadline(), None);
    assert!(clock.output().visible.is_blank());

    clock.output_mut().clear();
    run_until(&mut clock, &timer, 20_000);
    clock.fire(
        ClockEvent {
            generation: old_generation,
            trial_index: 0,
            step: Step::DisplayElapsed,
        },
        timer.now(),
    );
    assert!(clock.output().cues.is_empty());
    assert_eq!(clock.phase(), TrialPhase::Idle);
}
