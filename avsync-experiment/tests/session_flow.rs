use avsync_core::{
    ConfigError, Participant, PointerPosition, Questionnaire, SessionStage, TrialResult,
    UserResponse,
};
use avsync_experiment::{
    ClockError, ExperimentConfig, MemorySink, RecordingOutput, StimulusClock, SubmissionMode,
    Submission,
};
use avsync_timing::VirtualTimer;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

type Clock = StimulusClock<VirtualTimer, ChaCha8Rng, RecordingOutput<VirtualTimer>, MemorySink>;

fn clock_with(
    soas: &[i32],
    mode: SubmissionMode,
    sink: MemorySink,
    seed: u64,
) -> (Clock, VirtualTimer) {
    let timer = VirtualTimer::new();
    let config = ExperimentConfig {
        soa_ms: soas.to_vec(),
        submission_mode: mode,
        ..ExperimentConfig::default()
    };
    let clock = StimulusClock::new(
        config,
        timer.clone(),
        ChaCha8Rng::seed_from_u64(seed),
        RecordingOutput::new(timer.clone()),
        sink,
    )
    .unwrap();
    (clock, timer)
}

fn enroll_and_start(clock: &mut Clock) {
    clock
        .enroll(Participant {
            age: 31,
            gender: "female".into(),
        })
        .unwrap();
    clock
        .submit_questionnaire(Questionnaire::new((1..=18).collect()).unwrap())
        .unwrap();
    clock.start().unwrap();
}

/// Runs every remaining trial, answering with `answer(soa)` after
/// `rt_ms` and a couple of pointer moves.
fn run_session(
    clock: &mut Clock,
    timer: &VirtualTimer,
    rt_ms: u64,
    mut answer: impl FnMut(i32) -> UserResponse,
) {
    while clock.stage() == SessionStage::Trials {
        timer.advance_ms(2000);
        clock.poll();
        let soa = clock.current_trial().unwrap().spec.soa_ms();
        clock.record_pointer(PointerPosition::new(100.0, 100.0));
        timer.advance_ms(rt_ms / 2);
        clock.record_pointer(PointerPosition::new(150.0, 120.0));
        timer.advance_ms(rt_ms - rt_ms / 2);
        assert!(clock.respond(answer(soa), None).is_some());
    }
}

fn truthful(soa: i32) -> UserResponse {
    if soa == 0 {
        UserResponse::Together
    } else {
        UserResponse::Delay
    }
}

fn soa_order(results: &[TrialResult]) -> Vec<i32> {
    results.iter().map(|r| r.spec().soa_ms()).collect()
}

#[test]
fn completed_session_has_one_result_per_trial_in_order() {
    let soas = [-300, -200, -100, 0, 0, 100, 200, 300];
    let (mut clock, timer) = clock_with(&soas, SubmissionMode::Batch, MemorySink::default(), 9);
    enroll_and_start(&mut clock);
    run_session(&mut clock, &timer, 450, truthful);

    assert_eq!(clock.stage(), SessionStage::Complete);
    let results = clock.results();
    assert_eq!(results.len(), soas.len());
    let numbers: Vec<usize> = results.iter().map(|r| r.trial_number()).collect();
    assert_eq!(numbers, (1..=soas.len()).collect::<Vec<_>>());

    let mut presented = soa_order(results);
    presented.sort_unstable();
    assert_eq!(presented, soas.to_vec());

    for r in results {
        assert_eq!(r.reaction_time_ms(), 450);
        let elapsed: Vec<u64> = r.trajectory().iter().map(|s| s.elapsed_ms).collect();
        assert_eq!(elapsed, vec![0, 225]);
        assert!(elapsed.iter().all(|&e| e <= r.reaction_time_ms()));
        assert!(r.correct());
    }
    assert_eq!(clock.summary().unwrap().accuracy_pct, 100.0);
}

#[test]
fn reference_scoring_cases() {
    let soas = [0, -100, 100];

    let (mut clock, timer) = clock_with(&soas, SubmissionMode::Batch, MemorySink::default(), 2);
    enroll_and_start(&mut clock);
    run_session(&mut clock, &timer, 300, truthful);
    assert!(clock.results().iter().all(|r| r.correct()));

    let (mut clock, timer) = clock_with(&soas, SubmissionMode::Batch, MemorySink::default(), 2);
    enroll_and_start(&mut clock);
    run_session(&mut clock, &timer, 300, |soa| match truthful(soa) {
        UserResponse::Together => UserResponse::Delay,
        UserResponse::Delay => UserResponse::Together,
    });
    assert!(clock.results().iter().all(|r| !r.correct()));
    assert_eq!(clock.summary().unwrap().accuracy_pct, 0.0);
}

#[test]
fn all_offset_configuration_only_rewards_delay() {
    let (mut clock, timer) =
        clock_with(&[-100, 100, 200], SubmissionMode::Batch, MemorySink::default(), 4);
    enroll_and_start(&mut clock);
    let mut answers =
        [UserResponse::Delay, UserResponse::Together, UserResponse::Delay].into_iter();
    run_session(&mut clock, &timer, 200, |_| answers.next().unwrap());

    let correct: Vec<bool> = clock.results().iter().map(|r| r.correct()).collect();
    assert_eq!(correct, vec![true, false, true]);
    assert_eq!(clock.summary().unwrap().accuracy_pct, 66.7);
}

#[test]
fn batch_mode_submits_once_at_the_end() {
    let soas = [0, 100, -100, 50];
    let (mut clock, timer) = clock_with(&soas, SubmissionMode::Batch, MemorySink::default(), 5);
    enroll_and_start(&mut clock);
    run_session(&mut clock, &timer, 250, truthful);

    let sink = clock.sink().inner();
    assert!(matches!(sink.submissions[0], Submission::Participant(_)));
    assert!(matches!(sink.submissions[1], Submission::Questionnaire(_)));
    assert_eq!(sink.responses().count(), 0);
    let batches: Vec<_> = sink.batches().collect();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].trials, clock.results().to_vec());
    assert_eq!(batches[0].questionnaire, (1..=18).collect::<Vec<i32>>());
    assert_eq!(
        &batches[0].participant,
        clock.participant().unwrap()
    );
}

#[test]
fn per_trial_mode_submits_every_response() {
    let soas = [0, 100, -100];
    let (mut clock, timer) = clock_with(&soas, SubmissionMode::PerTrial, MemorySink::default(), 6);
    enroll_and_start(&mut clock);
    run_session(&mut clock, &timer, 250, truthful);

    let sink = clock.sink().inner();
    assert_eq!(sink.batches().count(), 0);
    let responses: Vec<_> = sink.responses().collect();
    assert_eq!(responses.len(), 3);
    for (payload, result) in responses.iter().zip(clock.results()) {
        assert_eq!(payload.trial_number, result.trial_number());
        assert_eq!(payload.soa, result.spec().soa_ms());
        assert_eq!(payload.beep_first, result.spec().audio_leads());
        assert_eq!(payload.mouse_trajectory.len(), 2);
    }
}

#[test]
fn failing_sink_never_disturbs_local_results() {
    let soas = [0, 100];
    let (mut clock, timer) = clock_with(&soas, SubmissionMode::PerTrial, MemorySink::failing(), 8);
    enroll_and_start(&mut clock);
    assert!(clock.participant().unwrap().participant_id.is_offline());

    run_session(&mut clock, &timer, 250, truthful);
    assert_eq!(clock.stage(), SessionStage::Complete);
    assert_eq!(clock.results().len(), 2);
    assert_eq!(clock.summary().unwrap().completed, 2);
    // each submission was attempted exactly once
    assert_eq!(clock.sink().inner().submissions.len(), 1 + 1 + 2);
}

#[test]
fn every_session_gets_a_fresh_order() {
    let soas: Vec<i32> = (1..=10).map(|i| i * 10).collect();
    let (mut clock, timer) = clock_with(&soas, SubmissionMode::Batch, MemorySink::default(), 10);

    enroll_and_start(&mut clock);
    run_session(&mut clock, &timer, 100, truthful);
    let first = soa_order(clock.results());

    clock.restart();
    enroll_and_start(&mut clock);
    run_session(&mut clock, &timer, 100, truthful);
    let second = soa_order(clock.results());

    assert_ne!(first, second);
}

#[test]
fn stages_must_be_followed_in_order() {
    let (mut clock, _) = clock_with(&[0], SubmissionMode::Batch, MemorySink::default(), 0);
    assert!(matches!(
        clock.start(),
        Err(ClockError::Stage {
            expected: SessionStage::Instructions,
            actual: SessionStage::Enrollment
        })
    ));
    assert!(clock
        .submit_questionnaire(Questionnaire::new(vec![0; 18]).unwrap())
        .is_err());
    clock
        .enroll(Participant {
            age: 40,
            gender: "male".into(),
        })
        .unwrap();
    assert_eq!(clock.stage(), SessionStage::Questionnaire);
}

#[test]
fn invalid_configuration_never_starts() {
    let timer = VirtualTimer::new();
    let result = StimulusClock::new(
        ExperimentConfig {
            soa_ms: Vec::new(),
            ..ExperimentConfig::default()
        },
        timer.clone(),
        ChaCha8Rng::seed_from_u64(0),
        RecordingOutput::new(timer),
        MemorySink::default(),
    );
    assert!(matches!(result, Err(ConfigError::EmptySchedule)));
}

#[test]
fn progress_reports_current_trial() {
    let (mut clock, timer) =
        clock_with(&[0, 100, 200], SubmissionMode::Batch, MemorySink::default(), 1);
    assert_eq!(clock.progress(), None);
    enroll_and_start(&mut clock);
    assert_eq!(clock.progress(), Some((1, 3)));
    timer.advance_ms(2000);
    clock.poll();
    clock.respond(UserResponse::Delay, None).unwrap();
    assert_eq!(clock.progress(), Some((2, 3)));
}
