//! # Host Audio Graph Boundary
//!
//! The correction engine never touches audio devices or runs the pitch-shift
//! DSP itself. The host audio graph supplies an analysis tap on the
//! pre-effect signal and two command surfaces: a noise gate followed by a
//! pitch shifter on the signal path. These traits are the whole contract.
//!
//! Commands are fire-and-forget. An `Err` is logged by the controller and
//! never stops the tick loop.

use anyhow::Result;

/// Default number of samples in one analysis frame.
///
/// 2048 samples is ~46 ms at 44.1 kHz, enough for two periods of an 80 Hz
/// voice while keeping the O(tau_max * N) difference pass cheap.
pub const FRAME_SIZE: usize = 2048;

/// Continuously refreshed time-domain snapshot of the pre-effect signal.
pub trait FrameSource: Send {
    /// Sample rate of the frames, in Hz.
    fn sample_rate(&self) -> u32;

    /// Copies the most recent samples into `frame`, filling it completely.
    fn read_frame(&mut self, frame: &mut [f32]) -> Result<()>;

    /// Releases the analysis handle. Called once on dispose.
    fn release(&mut self) {}
}

/// Smoothed pitch-shift primitive on the signal path.
pub trait PitchShifter: Send {
    /// Ramps the shift to `semitones` over `duration_secs`.
    fn ramp_to(&mut self, semitones: f32, duration_secs: f32) -> Result<()>;
}

/// Amplitude gate in front of the shifter.
pub trait NoiseGate: Send {
    fn set_threshold(&mut self, db: f32) -> Result<()>;
}

/// Opaque identifier of a node in the host's routing graph.
///
/// The engine hands these back unchanged so the host can splice the
/// gate → shifter chain into its routing. The id has no meaning here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub u64);

/// Everything the host provides for one corrected voice.
pub struct HostChain {
    pub source: Box<dyn FrameSource>,
    pub shifter: Box<dyn PitchShifter>,
    pub gate: Box<dyn NoiseGate>,
    /// Signal-path entry point (the gate's input).
    pub input: NodeHandle,
    /// Signal-path exit point (the shifter's output).
    pub output: NodeHandle,
}

impl HostChain {
    pub fn new(
        source: impl FrameSource + 'static,
        shifter: impl PitchShifter + 'static,
        gate: impl NoiseGate + 'static,
        input: NodeHandle,
        output: NodeHandle,
    ) -> Self {
        Self {
            source: Box::new(source),
            shifter: Box::new(shifter),
            gate: Box::new(gate),
            input,
            output,
        }
    }
}

impl std::fmt::Debug for HostChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostChain")
            .field("sample_rate", &self.source.sample_rate())
            .field("input", &self.input)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}
