use avsync_core::{ConfigError, StimulusRef, TrialSpec};
use rand::Rng;
use rand::seq::SliceRandom;

/// Builds the presented trial order: a uniform shuffle of `soas`, numbered
/// 1..=N after shuffling.
pub fn build_schedule<R: Rng + ?Sized>(
    soas: &[i32],
    stimulus: &StimulusRef,
    rng: &mut R,
) -> Result<Vec<TrialSpec>, ConfigError> {
    if soas.is_empty() {
        return Err(ConfigError::EmptySchedule);
    }
    if stimulus.is_empty() {
        return Err(ConfigError::EmptyStimulus);
    }

    let mut order = soas.to_vec();
    order.shuffle(rng);

    Ok(order
        .into_iter()
        .enumerate()
        .map(|(i, soa)| TrialSpec::new(i + 1, soa, stimulus.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    fn sorted(mut v: Vec<i32>) -> Vec<i32> {
        v.sort_unstable();
        v
    }

    #[test]
    fn schedule_is_a_permutation_of_the_config() {
        let soas = [-300, -100, 0, 0, 50, 100, 300];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let schedule = build_schedule(&soas, &StimulusRef::default(), &mut rng).unwrap();
            let presented: Vec<i32> = schedule.iter().map(|t| t.soa_ms()).collect();
            assert_eq!(sorted(presented), sorted(soas.to_vec()));
        }
    }

    #[test]
    fn trial_numbers_follow_presented_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let schedule =
            build_schedule(&[10, 20, 30, 40], &StimulusRef::default(), &mut rng).unwrap();
        let numbers: Vec<usize> = schedule.iter().map(|t| t.trial_number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn three_condition_example_has_one_of_each_kind() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let schedule =
            build_schedule(&[300, -100, 0], &StimulusRef::default(), &mut rng).unwrap();

        let audio_leading: Vec<_> = schedule.iter().filter(|t| t.audio_leads()).collect();
        assert_eq!(audio_leading.len(), 1);
        assert_eq!(audio_leading[0].soa_ms(), -100);

        let visual_leading: Vec<_> = schedule
            .iter()
            .filter(|t| !t.audio_leads() && t.had_offset())
            .collect();
        assert_eq!(visual_leading.len(), 1);
        assert_eq!(visual_leading[0].soa_ms(), 300);

        let simultaneous: Vec<_> = schedule.iter().filter(|t| !t.had_offset()).collect();
        assert_eq!(simultaneous.len(), 1);
        assert_eq!(simultaneous[0].soa_ms(), 0);
    }

    #[test]
    fn every_order_of_three_shows_up() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut counts: HashMap<Vec<i32>, usize> = HashMap::new();
        for _ in 0..6000 {
            let order: Vec<i32> = build_schedule(&[1, 2, 3], &StimulusRef::default(), &mut rng)
                .unwrap()
                .iter()
                .map(|t| t.soa_ms())
                .collect();
            *counts.entry(order).or_default() += 1;
        }
        assert_eq!(counts.len(), 6);
        for (order, n) in counts {
            assert!((800..1200).contains(&n), "{order:?} drawn {n} times");
        }
    }

    #[test]
    fn consecutive_builds_draw_fresh_orders() {
        let soas: Vec<i32> = (1..=12).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let a = build_schedule(&soas, &StimulusRef::default(), &mut rng).unwrap();
        let b = build_schedule(&soas, &StimulusRef::default(), &mut rng).unwrap();
        let soa = |s: &[TrialSpec]| s.iter().map(|t| t.soa_ms()).collect::<Vec<_>>();
        assert_ne!(soa(&a), soa(&b));
    }

    #[test]
    fn empty_inputs_are_config_errors() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            build_schedule(&[], &StimulusRef::default(), &mut rng),
            Err(ConfigError::EmptySchedule)
        ));
        assert!(matches!(
            build_schedule(&[0], &StimulusRef::new("  "), &mut rng),
            Err(ConfigError::EmptyStimulus)
        ));
    }
}
