//! Test doubles for the host audio graph.

use crate::audio::{FrameSource, HostChain, NodeHandle, NoiseGate, PitchShifter};
use anyhow::{Result, bail};
use parking_lot::Mutex;
use std::f32::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const TEST_SAMPLE_RATE: u32 = 44_100;

/// `n` samples of a sine at `freq` Hz, starting at phase zero.
pub fn sine(freq: f32, sample_rate: u32, n: usize, amplitude: f32) -> Vec<f32> {
    (0..n)
        .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

#[derive(Default)]
struct Shared {
    /// `None` produces silence.
    frequency: Mutex<Option<f32>>,
    fail_reads: AtomicBool,
    fail_ramps: AtomicBool,
    reads: AtomicUsize,
    released: AtomicBool,
    ramps: Mutex<Vec<(f32, f32)>>,
    gate_thresholds: Mutex<Vec<f32>>,
}

/// A scripted host: a sine source plus recording shifter and gate, all
/// observable from the test through this handle.
#[derive(Clone)]
pub struct TestHost {
    shared: Arc<Shared>,
}

impl TestHost {
    pub fn new(frequency: f32) -> Self {
        let host = Self {
            shared: Arc::new(Shared::default()),
        };
        host.set_frequency(Some(frequency));
        host
    }

    pub fn chain(&self) -> HostChain {
        HostChain::new(
            TestSource(self.clone()),
            TestShifter(self.clone()),
            TestGate(self.clone()),
            NodeHandle(1),
            NodeHandle(2),
        )
    }

    pub fn set_frequency(&self, frequency: Option<f32>) {
        *self.shared.frequency.lock() = frequency;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.shared.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_ramps(&self, fail: bool) {
        self.shared.fail_ramps.store(fail, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.shared.reads.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    /// Every ramp the shifter accepted, as `(semitones, duration_secs)`.
    pub fn ramps(&self) -> Vec<(f32, f32)> {
        self.shared.ramps.lock().clone()
    }

    pub fn last_ramp(&self) -> Option<(f32, f32)> {
        self.shared.ramps.lock().last().copied()
    }

    pub fn gate_thresholds(&self) -> Vec<f32> {
        self.shared.gate_thresholds.lock().clone()
    }
}

struct TestSource(TestHost);

impl FrameSource for TestSource {
    fn sample_rate(&self) -> u32 {
        TEST_SAMPLE_RATE
    }

    fn read_frame(&mut self, frame: &mut [f32]) -> Result<()> {
        let shared = &self.0.shared;
        shared.reads.fetch_add(1, Ordering::SeqCst);
        if shared.fail_reads.load(Ordering::SeqCst) {
            bail!("analysis tap disconnected");
        }
        match *shared.frequency.lock() {
            Some(freq) => {
                let samples = sine(freq, TEST_SAMPLE_RATE, frame.len(), 0.5);
                frame.copy_from_slice(&samples);
            }
            None => frame.fill(0.0),
        }
        Ok(())
    }

    fn release(&mut self) {
        self.0.shared.released.store(true, Ordering::SeqCst);
    }
}

struct TestShifter(TestHost);

impl PitchShifter for TestShifter {
    fn ramp_to(&mut self, semitones: f32, duration_secs: f32) -> Result<()> {
        if self.0.shared.fail_ramps.load(Ordering::SeqCst) {
            bail!("shifter offline");
        }
        self.0.shared.ramps.lock().push((semitones, duration_secs));
        Ok(())
    }
}

struct TestGate(TestHost);

impl NoiseGate for TestGate {
    fn set_threshold(&mut self, db: f32) -> Result<()> {
        self.0.shared.gate_thresholds.lock().push(db);
        Ok(())
    }
}
