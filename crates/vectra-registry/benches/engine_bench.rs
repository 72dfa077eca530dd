//! Criterion benchmarks for the block scheduler
//!
//! Run with: cargo bench -p vectra-registry

#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use vectra_core::{
    ContainerDescription, DspEngine, EngineConfig, GraphDescription, ProcDescription,
    ProcessorRegistry, TransportInfo,
};
use vectra_registry::WithBuiltins;

const SAMPLE_RATE: f32 = 48000.0;
const HOST_SIZES: &[usize] = &[64, 100, 256, 1024];
const VECTOR_SIZES: &[usize] = &[32, 64];

fn voice_graph() -> GraphDescription {
    GraphDescription::new()
        .node(
            ContainerDescription::per_voice("voices")
                .node(ProcDescription::new("osc", "sine"))
                .node(ProcDescription::new("amp", "multiply"))
                .connect("/the_midi_inputs.pitch", "osc.freq")
                .with_voice_channel()
                .connect("osc.out", "amp.in1")
                .connect("/the_midi_inputs.gate", "amp.in2")
                .with_voice_channel(),
        )
        .output("voices/amp", "out", 0)
        .output("voices/amp", "out", 1)
        .publish("voices/amp", "out", "voices")
}

fn engine(max_voices: usize, host: usize, vector: usize) -> DspEngine {
    let config = EngineConfig {
        max_voices,
        ..EngineConfig::default()
    };
    let mut engine = DspEngine::new(config, ProcessorRegistry::with_builtins())
        .expect("valid config");
    engine.build_graph(&voice_graph()).expect("graph builds");
    engine.compile().expect("graph compiles");
    engine.prepare(SAMPLE_RATE, host, vector).expect("engine prepares");
    for note in 0..max_voices as u8 {
        engine.add_note_on(60 + note, 100, 0);
    }
    engine
}

// ============================================================================
// Scheduler benchmarks
// ============================================================================

fn bench_host_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("Scheduler");

    for &vector in VECTOR_SIZES {
        for &host in HOST_SIZES {
            let mut engine = engine(8, host, vector);
            let mut left = vec![0.0f32; host];
            let mut right = vec![0.0f32; host];
            let transport = TransportInfo::default();

            group.bench_with_input(
                BenchmarkId::new(format!("V{vector}"), host),
                &host,
                |b, &frames| {
                    b.iter(|| {
                        engine.process_block(
                            &[],
                            &mut [left.as_mut_slice(), right.as_mut_slice()],
                            frames,
                            &transport,
                        );
                        black_box(left[0] + right[0])
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_voice_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("Voices");

    for &voices in &[1usize, 4, 16] {
        let mut engine = engine(voices, 256, 64);
        let mut left = vec![0.0f32; 256];
        let mut right = vec![0.0f32; 256];
        let transport = TransportInfo::default();

        group.bench_with_input(BenchmarkId::from_parameter(voices), &voices, |b, _| {
            b.iter(|| {
                engine.process_block(
                    &[],
                    &mut [left.as_mut_slice(), right.as_mut_slice()],
                    256,
                    &transport,
                );
                black_box(left[255])
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_host_sizes, bench_voice_counts);
criterion_main!(benches);
