//! # Sentinel Fleet Benchmarks
//!
//! | Path | Operation |
//! |------|-----------|
//! | node | salted digest + Ed25519 signature of one sample |
//! | hub  | decode, verify and score one heartbeat body |
//! | hub  | liveness sweep over a large ledger |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::RngCore;
use shared_crypto::Ed25519KeyPair;
use shared_types::{ControllableTimeSource, EntropySample, HeartbeatWire, NodeId, TimeSource};
use sn_01_proof_pipeline::{Ed25519Signer, ProofPipeline, ProofProducer, Sha256Digester};
use shared_bus::InMemoryEventBus;
use sn_04_hub_aggregator::test_utils::{FleetFixture, InMemoryHubStore};
use sn_04_hub_aggregator::{EventBusSink, HubAggregator, HubApi, HubConfig};
use std::sync::Arc;
use std::time::Duration;

fn bench_proof_production(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let pipeline = ProofPipeline::new(
        Sha256Digester,
        Ed25519Signer::new(Ed25519KeyPair::from_seed([9; 32])),
    );
    let node = NodeId::new("sentinel-bench");

    let mut group = c.benchmark_group("node-proof-pipeline");
    group.measurement_time(Duration::from_secs(5));
    for size in [1024usize, 4096, 65536] {
        let mut bytes = vec![0u8; size];
        rand::thread_rng().fill_bytes(&mut bytes);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("produce_proof", size), &bytes, |b, bytes| {
            let mut sequence = 0u64;
            b.iter(|| {
                sequence += 1;
                let sample = EntropySample::new(bytes.clone(), shared_types::UnixMillis(1));
                runtime
                    .block_on(pipeline.produce_proof(&node, sequence, sample))
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_heartbeat_admission(c: &mut Criterion) {
    let fleet = FleetFixture::new(64);
    let clock = Arc::new(ControllableTimeSource::new(1_700_000_000_000));
    let hub = HubAggregator::new(
        HubConfig::default(),
        fleet.directory(),
        EventBusSink::new(Arc::new(InMemoryEventBus::new())),
        Arc::new(InMemoryHubStore::default()),
        clock.clone(),
    )
    .unwrap();

    let mut group = c.benchmark_group("hub-admission");
    group.throughput(Throughput::Elements(1));
    let mut sequence = 0u64;
    group.bench_function("on_heartbeat_body", |b| {
        b.iter(|| {
            sequence += 1;
            let index = (sequence % 64) as usize;
            let body = HeartbeatWire::from(&fleet.heartbeat(index, sequence, clock.now()))
                .to_json()
                .unwrap();
            black_box(hub.on_heartbeat_body(&body).unwrap())
        })
    });
    group.finish();
}

fn bench_liveness_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub-liveness-sweep");
    for size in [100usize, 1_000] {
        let fleet = FleetFixture::new(size);
        let clock = Arc::new(ControllableTimeSource::new(1_700_000_000_000));
        let hub = HubAggregator::new(
            HubConfig::default(),
            fleet.directory(),
            EventBusSink::new(Arc::new(InMemoryEventBus::new())),
            Arc::new(InMemoryHubStore::default()),
            clock.clone(),
        )
        .unwrap();
        for index in 0..size {
            hub.on_heartbeat(fleet.heartbeat(index, 1, clock.now())).unwrap();
        }
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("sweep", size), &hub, |b, hub| {
            b.iter(|| black_box(hub.sweep_liveness()))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_proof_production,
    bench_heartbeat_admission,
    bench_liveness_sweep
);
criterion_main!(benches);
