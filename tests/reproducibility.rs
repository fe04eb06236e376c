// Histories run with the same seed must be identical, serially or in parallel

use std::sync::Arc;

use mc_collision::{
    CollisionHandler, CollisionMode, CollisionOutcome, CrossSectionTable, DistributionFactory,
    InfiniteMedium, Interpolation, Material, ParticleState, RandomStream, Reaction, ReactionType,
    ScatteringDistribution, Settings, Species, TabulatedScatteringData,
};
use rayon::prelude::*;

const MAX_COLLISIONS: u32 = 50;

#[derive(Debug, Clone, PartialEq)]
struct HistoryResult {
    energy: f64,
    weight: f64,
    position: [f64; 3],
    collisions: u32,
    last_outcome: Option<CollisionOutcome>,
}

fn carbon() -> Arc<Material> {
    let elastic_data = TabulatedScatteringData::from_json_str(r#"{"awr": 11.8969}"#).unwrap();
    let elastic = Reaction::new(
        ReactionType::Elastic,
        Species::Neutron,
        Interpolation::LinLin,
        Arc::new(CrossSectionTable::constant(1e-11, 20.0, 4.7).unwrap()),
        Arc::new(
            DistributionFactory::build(&elastic_data, ReactionType::Elastic, Interpolation::LinLin)
                .unwrap(),
        ),
    )
    .unwrap();
    let capture = Reaction::new(
        ReactionType::Capture,
        Species::Neutron,
        Interpolation::LogLog,
        Arc::new(CrossSectionTable::new(vec![1e-11, 20.0], vec![0.5, 0.001]).unwrap()),
        Arc::new(ScatteringDistribution::absorption()),
    )
    .unwrap();
    Arc::new(
        Material::new(6, Species::Neutron, 0.08)
            .unwrap()
            .with_name("graphite")
            .with_reaction(elastic)
            .unwrap()
            .with_reaction(capture)
            .unwrap(),
    )
}

fn handler(collision_mode: CollisionMode) -> CollisionHandler<InfiniteMedium> {
    let settings = Settings {
        collision_mode,
        seed: 42,
        ..Default::default()
    };
    let mut handler = CollisionHandler::new(InfiniteMedium::default(), settings).unwrap();
    handler
        .register_material(Species::Neutron, 1, carbon())
        .unwrap();
    handler
}

fn run_history<S: RandomStream>(
    handler: &CollisionHandler<InfiniteMedium>,
    stream: &mut S,
) -> HistoryResult {
    let mut particle = ParticleState::new(Species::Neutron, [0.0; 3], [0.0, 0.0, 1.0], 2.0);
    let mut last_outcome = None;
    while particle.alive && particle.collision_number < MAX_COLLISIONS {
        let distance = handler
            .sample_distance_to_collision(&particle, stream)
            .unwrap();
        particle.advance(distance);
        let outcome = handler.process_collision(&mut particle, stream).unwrap();
        last_outcome = Some(outcome);
        if outcome.is_terminal() {
            break;
        }
    }
    HistoryResult {
        energy: particle.energy,
        weight: particle.weight,
        position: particle.position,
        collisions: particle.collision_number,
        last_outcome,
    }
}

fn run_serial(handler: &CollisionHandler<InfiniteMedium>, histories: u64) -> Vec<HistoryResult> {
    (0..histories)
        .map(|history| {
            let mut stream = handler.settings().stream_for_history(history);
            run_history(handler, &mut stream)
        })
        .collect()
}

#[test]
fn test_same_seed_reproduces_histories() {
    for mode in [CollisionMode::Analogue, CollisionMode::ImplicitCapture] {
        let first = run_serial(&handler(mode), 200);
        let second = run_serial(&handler(mode), 200);
        assert_eq!(first, second, "{:?} histories differ between runs", mode);
    }
}

#[test]
fn test_different_histories_diverge() {
    let results = run_serial(&handler(CollisionMode::Analogue), 20);
    let distinct = results
        .iter()
        .filter(|r| r.position != results[0].position)
        .count();
    assert!(distinct > 0);
}

#[test]
fn test_parallel_histories_match_serial() {
    let handler = handler(CollisionMode::ImplicitCapture);
    let serial = run_serial(&handler, 500);
    let parallel: Vec<HistoryResult> = (0..500u64)
        .into_par_iter()
        .map(|history| {
            let mut stream = handler.settings().stream_for_history(history);
            run_history(&handler, &mut stream)
        })
        .collect();
    assert_eq!(serial, parallel);
}

#[test]
fn test_histories_lose_energy() {
    for result in run_serial(&handler(CollisionMode::Analogue), 100) {
        assert!(result.energy <= 2.0);
        assert!(result.collisions >= 1);
        assert!(result.energy > 0.0);
    }
}
