use evo_curriculum_core::{
    batch_specialists, read_confusion_stream, Condition, ModelConfig, ModelKind, Specialist,
    SpecialistConfig, SpecialistError, SpecialistRegistry,
};

/// `n` conditions whose ground truth alternates good/bad, starting with good
/// when `offset` is even. The first feature separates the two classes.
fn alternating(n: usize, offset: usize) -> Vec<Condition> {
    (0..n)
        .map(|i| {
            let good = (i + offset) % 2 == 0;
            let signal = if good { 0.8 } else { 0.2 };
            let noise = (i % 5) as f64 * 0.01;
            Condition::from_parts(&[signal + noise, noise], if good { 1.0 } else { 0.0 })
        })
        .collect()
}

fn drive(specialist: &mut Specialist, generation: u64, conditions: &[Condition]) {
    specialist.set_generation(generation);
    specialist.ingest(conditions);
}

#[test]
fn sp50_first_active_generation_scores_before_any_fit() {
    let mut sp50 = Specialist::configure("sp50", SpecialistConfig::new(1000, 50, 50, 50)).unwrap();

    drive(&mut sp50, 999, &alternating(50, 0));
    assert_eq!(sp50.pending(), 0);
    assert!(sp50.process().unwrap().is_none());

    drive(&mut sp50, 1000, &alternating(50, 0));
    let first = sp50.process().unwrap().unwrap();
    assert_eq!(first.generation, 1000);
    assert_eq!(first.prefit, first.postfit);
    assert_eq!(first.prefit.total(), 50);
    // an unfitted model predicts every condition negative
    assert_eq!(first.prefit.tp + first.prefit.fp, 0);
    assert_eq!(sp50.fit_count(), 0);

    drive(&mut sp50, 1001, &alternating(50, 1));
    let second = sp50.process().unwrap().unwrap();
    assert_eq!(sp50.fit_count(), 1);
    assert_eq!(second.prefit, first.prefit);
    assert!(second.model_changed());
    assert!(second.postfit.accuracy() > second.prefit.accuracy());

    drive(&mut sp50, 1002, &alternating(50, 0));
    let third = sp50.process().unwrap().unwrap();
    assert_eq!(third.prefit.total(), third.postfit.total());
    assert_eq!(sp50.tracker().len(), 3);
    assert_eq!(sp50.pending(), 0);
}

#[test]
fn inactive_specialist_ingests_nothing() {
    let mut sp = Specialist::configure("late", SpecialistConfig::new(10, 5, 5, 5)).unwrap();
    for generation in 0..10 {
        drive(&mut sp, generation, &alternating(5, 0));
        assert!(!sp.is_active());
        assert!(sp.process().unwrap().is_none());
    }
    assert_eq!(sp.pending(), 0);
    assert_eq!(sp.retained(), 0);
    assert!(sp.tracker().is_empty());
}

#[test]
fn trial_mismatch_is_tolerated() {
    let mut sp = Specialist::configure("sp10", SpecialistConfig::new(0, 10, 10, 20)).unwrap();
    drive(&mut sp, 1, &alternating(10, 0));
    assert!(matches!(
        sp.validate_generation_trials(),
        Err(SpecialistError::InsufficientData { expected: 20, got: 10, .. })
    ));
    let outcome = sp.process().unwrap().unwrap();
    assert_eq!(outcome.prefit.total(), 10);
    assert_eq!(sp.trial_mismatches(), 1);
}

#[test]
fn registry_emits_one_outcome_per_active_specialist() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = SpecialistRegistry::new("curriculum", dir.path());
    registry
        .add_specialists(batch_specialists(3, &[20, 50], 50, false))
        .unwrap();
    assert_eq!(registry.names(), vec!["sp20", "sp50"]);

    for generation in 1..=6 {
        registry.set_generation(generation);
        let receivers = registry.update_data(&alternating(50, generation as usize));
        let outcomes = registry.process_generation();
        if generation < 3 {
            assert_eq!(receivers, 0);
            assert!(outcomes.is_empty());
        } else {
            assert_eq!(receivers, 2);
            let names: Vec<&str> = outcomes.iter().map(|(n, _)| n.as_str()).collect();
            assert_eq!(names, vec!["sp20", "sp50"]);
            for (_, outcome) in &outcomes {
                assert_eq!(outcome.generation, generation);
                assert_eq!(outcome.prefit.total(), outcome.postfit.total());
            }
        }
        registry.save_stg();
    }

    // sp20 scores 40 of every 50 and carries the rest forward
    let sp20 = registry.get("sp20").unwrap();
    assert!(sp20.pending() < 20);
    assert_eq!(sp20.tracker().len(), 4);

    let rows = read_confusion_stream(registry.stream_path()).unwrap();
    assert_eq!(rows.len(), 8);
}

#[test]
fn duplicate_names_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = SpecialistRegistry::new("curriculum", dir.path());
    registry
        .add_specialist("sp50", SpecialistConfig::new(0, 50, 50, 50))
        .unwrap();
    let err = registry
        .add_specialist("sp50", SpecialistConfig::new(0, 10, 10, 10))
        .unwrap_err();
    assert!(matches!(err, SpecialistError::DuplicateName { .. }));
    assert_eq!(registry.len(), 1);
}

#[test]
fn full_state_roundtrip_through_registry() {
    let dir = tempfile::tempdir().unwrap();
    let configs = || {
        let mut configs = batch_specialists(1, &[10, 30], 25, true);
        configs.push((
            "centroid".to_string(),
            SpecialistConfig::new(2, 20, 15, 25).with_model(ModelConfig {
                kind: ModelKind::Centroid,
                ..ModelConfig::default()
            }),
        ));
        configs
    };

    let mut original = SpecialistRegistry::new("curriculum", dir.path());
    original.add_specialists(configs()).unwrap();
    for generation in 1..=5 {
        original.set_generation(generation);
        original.update_data(&alternating(25, generation as usize));
        original.process_generation();
    }
    original.save().unwrap();

    let mut restored = SpecialistRegistry::new("curriculum", dir.path());
    restored.add_specialists(configs()).unwrap();
    restored.load().unwrap();
    assert_eq!(restored.generation(), 5);

    for (a, b) in original.specialists().zip(restored.specialists()) {
        assert_eq!(a.name(), b.name());
        assert_eq!(a.window(), b.window());
        assert_eq!(a.tracker().rows(), b.tracker().rows());
        assert_eq!(a.model().parameters(), b.model().parameters());
        assert_eq!(a.fit_count(), b.fit_count());
    }

    // both continue identically
    original.set_generation(6);
    restored.set_generation(6);
    original.update_data(&alternating(25, 6));
    restored.update_data(&alternating(25, 6));
    assert_eq!(original.process_generation(), restored.process_generation());
}

#[test]
fn save_is_idempotent_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = SpecialistRegistry::new("curriculum", dir.path());
    registry
        .add_specialists(batch_specialists(1, &[10], 10, false))
        .unwrap();
    for generation in 1..=3 {
        registry.set_generation(generation);
        registry.update_data(&alternating(13, 0));
        registry.process_generation();
    }

    registry.save().unwrap();
    let specialist_path = registry
        .get("sp10")
        .unwrap()
        .checkpoint_path(registry.specialists_dir());
    let first = (
        std::fs::read(&specialist_path).unwrap(),
        std::fs::read(registry.manifest_path()).unwrap(),
    );
    registry.save().unwrap();
    let second = (
        std::fs::read(&specialist_path).unwrap(),
        std::fs::read(registry.manifest_path()).unwrap(),
    );
    assert_eq!(first, second);
}

#[test]
fn load_rejects_mismatched_registry() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = SpecialistRegistry::new("curriculum", dir.path());
    registry
        .add_specialists(batch_specialists(1, &[10, 20], 10, false))
        .unwrap();
    registry.save().unwrap();

    let mut other = SpecialistRegistry::new("curriculum", dir.path());
    other
        .add_specialists(batch_specialists(1, &[10], 10, false))
        .unwrap();
    assert!(matches!(
        other.load(),
        Err(SpecialistError::Persistence { .. })
    ));
}
