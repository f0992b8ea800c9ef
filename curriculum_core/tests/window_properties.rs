use evo_curriculum_core::{Condition, Specialist, SpecialistConfig};
use proptest::prelude::*;

fn conditions(outcomes: &[bool], shift: f64) -> Vec<Condition> {
    outcomes
        .iter()
        .enumerate()
        .map(|(i, &good)| {
            let x = if good { 1.0 } else { -1.0 } + shift + i as f64 * 1e-3;
            Condition::from_parts(&[x], if good { 1.0 } else { 0.0 })
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prefit_and_postfit_cover_the_same_batch(
        fit in 1usize..40,
        score in 1usize..40,
        historical in any::<bool>(),
        generations in prop::collection::vec(prop::collection::vec(any::<bool>(), 0..60), 1..8),
    ) {
        let config = SpecialistConfig::new(1, fit, score, 30).with_historical(historical);
        let mut specialist = Specialist::configure("prop", config).unwrap();

        for (index, outcomes) in generations.iter().enumerate() {
            let generation = index as u64 + 1;
            specialist.set_generation(generation);
            let ingested = specialist.ingest(&conditions(outcomes, index as f64 * 0.01));
            prop_assert_eq!(ingested, outcomes.len());

            let pending_before = specialist.pending();
            let outcome = specialist.process().unwrap().unwrap();
            prop_assert_eq!(outcome.generation, generation);
            prop_assert_eq!(outcome.prefit.total(), outcome.postfit.total());
            prop_assert_eq!(outcome.prefit.total() as usize % score, 0);
            prop_assert_eq!(pending_before - specialist.pending(), outcome.prefit.total() as usize);
            prop_assert!(specialist.pending() < score);
        }
        prop_assert_eq!(specialist.tracker().len(), generations.len());
    }

    #[test]
    fn inactive_generations_leave_no_trace(
        start in 2u64..20,
        sizes in prop::collection::vec(0usize..30, 1..10),
    ) {
        let mut specialist =
            Specialist::configure("late", SpecialistConfig::new(start, 5, 5, 5)).unwrap();
        for (index, &size) in sizes.iter().enumerate() {
            let generation = index as u64;
            specialist.set_generation(generation);
            let accepted = specialist.ingest(&conditions(&vec![true; size], 0.0));
            let outcome = specialist.process().unwrap();
            if generation < start {
                prop_assert_eq!(accepted, 0);
                prop_assert!(outcome.is_none());
            } else {
                prop_assert!(outcome.is_some());
            }
        }
        let active = sizes.len().saturating_sub(start as usize);
        prop_assert_eq!(specialist.tracker().len(), active);
    }
}
