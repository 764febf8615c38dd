use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use hf_core::types::packed_index;
use hf_core::{
    Collision, CreatorConfig, FitterVariant, PrimaryVertex, TrackIndexProng3, TrackRecord,
    TrackState, pdg,
};
use hf_vertex::{CandidateCreator, FitSettings, ParticleHypothesis, build_fitter};
use std::hint::black_box;

fn track(position: [f64; 3], momentum: [f64; 3], charge: i32) -> TrackState {
    let mut covariance = [0.0; 21];
    for i in 0..3 {
        covariance[packed_index(i, i)] = 1e-4;
        covariance[packed_index(i + 3, i + 3)] = 1e-5;
    }
    TrackState { position, momentum, charge, covariance }
}

fn triplet_tracks(shift: f64) -> [TrackState; 3] {
    [
        track([0.1 + shift, 0.02, 0.3], [1.2, 0.3, 0.5], 1),
        track([-0.02, 0.09 + shift, 0.32], [-0.4, 0.9, 0.2], -1),
        track([0.07, -0.08, 0.45 + shift], [0.3, -0.5, 0.8], 1),
    ]
}

fn primary_vertex() -> PrimaryVertex {
    PrimaryVertex { position: [0.0; 3], covariance: [1e-6, 0.0, 1e-6, 0.0, 0.0, 1e-6] }
}

fn bench_single_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("vertex_fit");
    let tracks = triplet_tracks(0.0);
    let species = [pdg::PROTON, -pdg::K_PLUS, pdg::PI_PLUS];
    let prongs = [
        ParticleHypothesis::new(&tracks[0], species[0]).unwrap(),
        ParticleHypothesis::new(&tracks[1], species[1]).unwrap(),
        ParticleHypothesis::new(&tracks[2], species[2]).unwrap(),
    ];
    let pv = primary_vertex();

    for variant in [FitterVariant::Kalman, FitterVariant::Iterative] {
        let fitter = build_fitter(variant, FitSettings::default());
        group.bench_function(fitter.name().to_string(), |b| {
            b.iter(|| black_box(fitter.fit(black_box(&prongs), &pv, 5.0)))
        });
    }
    group.finish();
}

fn bench_creator(c: &mut Criterion) {
    let mut group = c.benchmark_group("creator_process");

    for n in [100usize, 1_000, 10_000] {
        let collisions = vec![Collision { global_index: 0, vertex: primary_vertex() }];
        let mut tracks = Vec::with_capacity(3 * n);
        let mut triplets = Vec::with_capacity(n);
        for i in 0..n {
            let shift = ((i * 7919) % 1000) as f64 * 1e-5;
            for (k, state) in triplet_tracks(shift).into_iter().enumerate() {
                tracks.push(TrackRecord { global_index: 3 * i + k, collision: 0, state });
            }
            triplets.push(TrackIndexProng3 { prongs: [3 * i, 3 * i + 1, 3 * i + 2], hf_flag: 1 });
        }
        let creator = CandidateCreator::new(CreatorConfig::default()).unwrap();

        group.bench_with_input(BenchmarkId::new("kalman", n), &n, |b, _| {
            b.iter(|| black_box(creator.process(&collisions, &tracks, &triplets)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_fit, bench_creator);
criterion_main!(benches);
