//! Offline engine run.
//!
//! Drives a patch with silent input for a fixed duration, cycling through a
//! pattern of host callback sizes, then reports output peaks, published
//! signals and the engine's diagnostics.

use std::path::PathBuf;

use clap::Args;
use vectra_core::{ProcessorRegistry, SignalBuffer, TransportInfo};
use vectra_registry::WithBuiltins;

use super::common::{load_patch, patch_name};

/// Drive a patch offline.
#[derive(Args)]
pub struct RunArgs {
    /// Patch file (TOML). The bundled demo is used when omitted.
    pub patch: Option<PathBuf>,

    /// Sample rate in Hz
    #[arg(long, default_value = "48000")]
    pub sample_rate: f32,

    /// Host callback sizes, cycled in order (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = "256")]
    pub host_sizes: Vec<usize>,

    /// Processing vector size (0 uses the patch setting)
    #[arg(long, default_value = "0")]
    pub vector_size: usize,

    /// Duration to render in seconds
    #[arg(long, default_value = "1.0")]
    pub seconds: f32,

    /// MIDI notes to start at time zero
    #[arg(long, value_delimiter = ',')]
    pub notes: Vec<u8>,

    /// Tempo reported to the host phasor
    #[arg(long, default_value = "120")]
    pub bpm: f64,

    /// Measure processing time
    #[arg(long)]
    pub stats: bool,
}

/// Run the run command.
pub fn run(args: RunArgs) -> anyhow::Result<()> {
    if args.host_sizes.is_empty() || args.host_sizes.contains(&0) {
        anyhow::bail!("host sizes must be non-empty and non-zero");
    }
    if args.seconds.is_nan() || args.seconds <= 0.0 {
        anyhow::bail!("duration must be positive");
    }

    let mut patch = load_patch(args.patch.as_deref())?;
    if args.stats {
        patch.engine.collect_stats = true;
    }
    let mut engine = patch.instantiate(ProcessorRegistry::with_builtins())?;

    let max_host = args.host_sizes.iter().copied().max().unwrap_or(1);
    engine.prepare(args.sample_rate, max_host, args.vector_size)?;

    for &note in &args.notes {
        if !engine.add_note_on(note, 100, 0) {
            tracing::warn!(note, "event queue full, note dropped");
        }
    }

    let channels = engine.config().output_channels;
    let inputs: Vec<Vec<f32>> = vec![vec![0.0; max_host]; engine.config().input_channels];
    let mut outputs: Vec<Vec<f32>> = vec![vec![0.0; max_host]; channels];
    let mut peaks = vec![0.0f32; channels];

    let total = (f64::from(args.seconds) * f64::from(args.sample_rate)) as usize;
    let mut rendered = 0usize;
    let mut transport = TransportInfo {
        bpm: args.bpm,
        playing: true,
        ..TransportInfo::default()
    };

    for &size in args.host_sizes.iter().cycle() {
        if rendered >= total {
            break;
        }
        let frames = size.min(total - rendered);
        transport.secs = rendered as f64 / f64::from(args.sample_rate);
        transport.ppq_position = transport.secs * transport.bpm / 60.0;

        let in_slices: Vec<&[f32]> = inputs.iter().map(|c| &c[..frames]).collect();
        let mut out_slices: Vec<&mut [f32]> =
            outputs.iter_mut().map(|c| &mut c[..frames]).collect();
        engine.process_block(&in_slices, &mut out_slices, frames, &transport);

        for (peak, out) in peaks.iter_mut().zip(&outputs) {
            *peak = out[..frames].iter().fold(*peak, |p, s| p.max(s.abs()));
        }
        rendered += frames;
    }

    println!("Patch:       {}", patch_name(&patch));
    println!(
        "Rendered:    {} samples at {} Hz, vector {}, latency {} samples",
        rendered,
        args.sample_rate,
        engine.vector_size(),
        engine.latency()
    );
    for (channel, peak) in peaks.iter().enumerate() {
        println!("Peak out {channel}:  {peak:.4}");
    }

    if !patch.graph.signals.is_empty() {
        println!();
        println!("Published signals:");
        for signal in &patch.graph.signals {
            let alias = &signal.alias;
            let voices = engine.published_voice_count(alias).max(1);
            let mut dest = SignalBuffer::new(engine.published_buffer_length(alias).max(1), voices);
            let read = engine.read_published(alias, &mut dest);
            let last: Vec<String> = (0..read.rows)
                .map(|row| format!("{:.3}", dest.row(row)[read.samples.saturating_sub(1)]))
                .collect();
            println!(
                "  {:16}  rows: {}  samples: {}  last: [{}]",
                alias,
                read.rows,
                read.samples,
                last.join(", ")
            );
        }
    }

    let diag = engine.diagnostics();
    println!();
    println!("Callbacks:   {}", diag.callbacks);
    println!("Vectors:     {}", diag.vectors);
    println!("Starvation:  {}", diag.starvation_events);
    println!("Faults:      {}", diag.numeric_faults);
    println!("Tap drops:   {}", diag.dropped_tap_samples);
    if let Some(stats) = engine.last_stats() {
        println!(
            "CPU:         {:.3} us/sample, {:.2}% of real time",
            stats.micros_per_sample,
            stats.cpu_fraction * 100.0
        );
    }

    if diag.starvation_events > 0 {
        tracing::warn!(
            events = diag.starvation_events,
            "engine reported data starvation"
        );
    }

    Ok(())
}
