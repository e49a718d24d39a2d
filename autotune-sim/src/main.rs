//! # autotune-sim - headless pitch correction harness
//!
//! Runs one correction engine against a synthetic singing voice (a sine with
//! vibrato and a configurable detune) and in-memory shifter/gate primitives,
//! logging every command the engine issues.
//!
//! ```text
//! RUST_LOG=debug autotune-sim --freq 450 --key C --scale major --seconds 2
//! ```

use anyhow::{Context, Result};
use autotune_core::{
    AutoTune, Effect, EngineConfig, FrameSource, HostChain, NodeHandle, NoiseGate, PitchShifter,
    Settings, StatePatch,
};
use clap::Parser;
use parking_lot::Mutex;
use std::f32::consts::PI;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Parser)]
#[command(name = "autotune-sim", about = "Drive the pitch correction engine with a synthetic voice")]
struct Args {
    /// Centre frequency of the synthetic voice in Hz
    #[arg(long, default_value_t = 450.0)]
    freq: f32,

    /// Vibrato depth in cents
    #[arg(long, default_value_t = 30.0)]
    vibrato_cents: f32,

    /// Vibrato rate in Hz
    #[arg(long, default_value_t = 5.5)]
    vibrato_hz: f32,

    /// Key root, e.g. C, F#, Bb
    #[arg(long)]
    key: Option<String>,

    /// Scale name, e.g. major, minor, blues
    #[arg(long)]
    scale: Option<String>,

    /// Retune time in seconds (clamped to 0.01..=0.4)
    #[arg(long)]
    retune: Option<f32>,

    /// How long to run the engine, in seconds
    #[arg(long, default_value_t = 2.0)]
    seconds: f32,

    /// Engine config JSON (tick interval, band, thresholds)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Settings JSON to apply before starting
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the final settings to this JSON file
    #[arg(long)]
    save: Option<PathBuf>,
}

/// A sine voice with vibrato whose clock follows wall time, so every read
/// sees the most recent stretch of "signal".
struct SyntheticVoice {
    base_freq: f32,
    vibrato_cents: f32,
    vibrato_hz: f32,
    started: Instant,
}

impl SyntheticVoice {
    fn instantaneous_freq(&self, t: f32) -> f32 {
        let cents = self.vibrato_cents * (2.0 * PI * self.vibrato_hz * t).sin();
        self.base_freq * 2.0_f32.powf(cents / 1200.0)
    }
}

impl FrameSource for SyntheticVoice {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn read_frame(&mut self, frame: &mut [f32]) -> Result<()> {
        let dt = 1.0 / SAMPLE_RATE as f32;
        let end = self.started.elapsed().as_secs_f32();
        let start = (end - frame.len() as f32 * dt).max(0.0);
        let mut phase = 0.0f32;
        for (i, sample) in frame.iter_mut().enumerate() {
            let t = start + i as f32 * dt;
            phase = (phase + 2.0 * PI * self.instantaneous_freq(t) * dt) % (2.0 * PI);
            *sample = 0.4 * phase.sin();
        }
        Ok(())
    }

    fn release(&mut self) {
        log::debug!("synthetic voice released");
    }
}

/// Counters shared between the fake primitives and `main`.
#[derive(Debug, Default)]
struct Telemetry {
    ramps: usize,
    current_shift: f32,
    largest_shift: f32,
}

struct LoggingShifter(Arc<Mutex<Telemetry>>);

impl PitchShifter for LoggingShifter {
    fn ramp_to(&mut self, semitones: f32, duration_secs: f32) -> Result<()> {
        log::debug!("shifter: ramp to {semitones:+.3} st over {duration_secs:.3} s");
        let mut telemetry = self.0.lock();
        telemetry.ramps += 1;
        telemetry.current_shift = semitones;
        if semitones.abs() > telemetry.largest_shift.abs() {
            telemetry.largest_shift = semitones;
        }
        Ok(())
    }
}

struct LoggingGate;

impl NoiseGate for LoggingGate {
    fn set_threshold(&mut self, db: f32) -> Result<()> {
        log::info!("gate: threshold {db} dB");
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading engine config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let telemetry = Arc::new(Mutex::new(Telemetry::default()));
    let voice = SyntheticVoice {
        base_freq: args.freq,
        vibrato_cents: args.vibrato_cents,
        vibrato_hz: args.vibrato_hz,
        started: Instant::now(),
    };
    let chain = HostChain::new(
        voice,
        LoggingShifter(Arc::clone(&telemetry)),
        LoggingGate,
        NodeHandle(0),
        NodeHandle(1),
    );
    let mut engine = AutoTune::new(config, chain);

    if let Some(path) = &args.settings {
        let value: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(path)
                .with_context(|| format!("reading settings from {}", path.display()))?,
        )?;
        engine.set_state_json(&value);
    }
    engine.set_state(&StatePatch {
        key: args.key.clone(),
        scale: args.scale.clone(),
        retune: args.retune,
        ..StatePatch::default()
    });

    log::info!(
        "voice {:.1} Hz (±{} cents @ {} Hz), routing {:?} -> {:?}",
        args.freq,
        args.vibrato_cents,
        args.vibrato_hz,
        engine.input(),
        engine.output()
    );

    engine.start()?;
    std::thread::sleep(Duration::from_secs_f32(args.seconds.max(0.0)));
    let state_while_running = engine.state();
    engine.stop();

    {
        let telemetry = telemetry.lock();
        log::info!(
            "{} ramp commands, largest shift {:+.3} st, final shift {:+.3} st",
            telemetry.ramps,
            telemetry.largest_shift,
            telemetry.current_shift
        );
    }
    println!("{}", serde_json::to_string_pretty(&state_while_running)?);

    if let Some(path) = &args.save {
        Settings::from(&engine.state())
            .save(path)
            .with_context(|| format!("saving settings to {}", path.display()))?;
        log::info!("settings saved to {}", path.display());
    }

    engine.dispose();
    Ok(())
}
