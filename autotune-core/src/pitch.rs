//! # Pitch Detection Module
//!
//! Monophonic fundamental-frequency estimation with the YIN algorithm,
//! tuned for a singing voice: a narrow frequency band, a small frame, and a
//! hard silence floor that acts as the detector's own noise gate.
//!
//! ## Features
//! - DC removal and RMS silence gating
//! - Cumulative-mean-normalized difference (CMND) with first-dip search
//! - Parabolic interpolation for sub-sample lag accuracy
//! - Reusable scratch buffers so the per-tick path does not allocate

use crate::DetectionResult;

/// Default CMND threshold below which a lag counts as a period candidate.
pub const DEFAULT_YIN_THRESHOLD: f32 = 0.15;

/// Default RMS silence floor (linear, roughly -42 dBFS).
pub const DEFAULT_SILENCE_FLOOR: f32 = 0.008;

/// Denominators below this are treated as zero.
const EPSILON: f32 = 1e-12;

/// Parameters of a [`YinDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorParams {
    /// Lowest frequency reported, in Hz.
    pub fmin: f32,
    /// Highest frequency reported, in Hz.
    pub fmax: f32,
    /// CMND threshold for the first-dip search.
    pub threshold: f32,
    /// RMS below which the frame is considered silent.
    pub silence_floor: f32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            fmin: 80.0,
            fmax: 1000.0,
            threshold: DEFAULT_YIN_THRESHOLD,
            silence_floor: DEFAULT_SILENCE_FLOOR,
        }
    }
}

/// A YIN pitch detector that owns its working buffers.
///
/// The buffers grow to fit the largest frame seen and are reused afterwards.
/// [`YinDetector::release`] hands the memory back.
#[derive(Debug, Clone, Default)]
pub struct YinDetector {
    params: DetectorParams,
    /// DC-free copy of the input frame
    centered: Vec<f32>,
    /// d(tau), then overwritten in place with cmnd(tau)
    yin_buffer: Vec<f32>,
}

impl YinDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self {
            params,
            centered: Vec::new(),
            yin_buffer: Vec::new(),
        }
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Frees the scratch buffers. The detector stays usable and will
    /// reallocate on the next call.
    pub fn release(&mut self) {
        self.centered = Vec::new();
        self.yin_buffer = Vec::new();
    }

    /// Estimates the fundamental frequency of `frame`.
    ///
    /// Never fails: silent, degenerate or aperiodic input all come back as
    /// [`DetectionResult::UNVOICED`].
    pub fn detect(&mut self, frame: &[f32], sample_rate: u32) -> DetectionResult {
        let DetectorParams {
            fmin,
            fmax,
            threshold,
            silence_floor,
        } = self.params;

        let frame_size = frame.len();
        if frame_size < 8
            || sample_rate == 0
            || !(fmin > 0.0)
            || !(fmax > fmin)
            || frame.iter().any(|s| !s.is_finite())
        {
            return DetectionResult::UNVOICED;
        }

        // --- DC removal ---
        let mean = frame.iter().sum::<f32>() / frame_size as f32;
        self.centered.clear();
        self.centered.extend(frame.iter().map(|&s| s - mean));

        // --- Noise gate: RMS against the silence floor ---
        let rms = (self.centered.iter().map(|&s| s * s).sum::<f32>() / frame_size as f32).sqrt();
        if rms < silence_floor {
            return DetectionResult::UNVOICED;
        }

        // --- Usable lag range ---
        let sr = sample_rate as f32;
        let (shortest_lag, longest_lag) = (sr / fmax, sr / fmin);
        if !shortest_lag.is_finite() || !longest_lag.is_finite() {
            return DetectionResult::UNVOICED;
        }
        let tau_min = shortest_lag.floor() as usize;
        let tau_max = (longest_lag.floor() as usize).min((frame_size / 2).saturating_sub(1));
        if tau_max <= tau_min.saturating_add(2) {
            return DetectionResult::UNVOICED;
        }

        self.difference_function(tau_max);
        self.cumulative_mean_normalized_difference();
        let cmnd = &self.yin_buffer;

        // --- First dip below the threshold, walked down to its local minimum ---
        let Some(mut tau) = (tau_min.max(1)..=tau_max).find(|&t| cmnd[t] < threshold) else {
            return DetectionResult::UNVOICED;
        };
        while tau < tau_max && cmnd[tau + 1] < cmnd[tau] {
            tau += 1;
        }

        let refined_tau = parabolic_interpolation(cmnd, tau);
        let frequency = sr / refined_tau;
        let confidence = (1.0 - cmnd[tau]).clamp(0.0, 1.0);

        if !frequency.is_finite() || frequency < fmin || frequency > fmax {
            return DetectionResult::UNVOICED;
        }

        DetectionResult::voiced(frequency, confidence)
    }

    /// Squared-difference function d(tau) for tau in [1, tau_max], integrated
    /// over a fixed window of half the frame.
    fn difference_function(&mut self, tau_max: usize) {
        let window = self.centered.len() / 2;
        let signal = &self.centered;

        self.yin_buffer.clear();
        self.yin_buffer.resize(tau_max + 1, 0.0);
        for tau in 1..=tau_max {
            self.yin_buffer[tau] = signal[..window]
                .iter()
                .zip(&signal[tau..tau + window])
                .map(|(a, b)| {
                    let delta = a - b;
                    delta * delta
                })
                .sum();
        }
    }

    /// Rewrites d(tau) in place as cmnd(tau) = d(tau) * tau / sum(d(1..=tau)),
    /// with cmnd(0) = 1.
    fn cumulative_mean_normalized_difference(&mut self) {
        let mut running_sum = 0.0;
        self.yin_buffer[0] = 1.0;
        for tau in 1..self.yin_buffer.len() {
            running_sum += self.yin_buffer[tau];
            if running_sum > EPSILON {
                self.yin_buffer[tau] *= tau as f32 / running_sum;
            } else {
                self.yin_buffer[tau] = 1.0;
            }
        }
    }
}

/// Refines an integer lag with the vertex of the parabola through its
/// neighbours. Falls back to the integer lag at the buffer edges or when the
/// curve is flat.
fn parabolic_interpolation(cmnd: &[f32], tau: usize) -> f32 {
    if tau < 1 || tau + 1 >= cmnd.len() {
        return tau as f32;
    }
    let y1 = cmnd[tau - 1];
    let y2 = cmnd[tau];
    let y3 = cmnd[tau + 1];

    let denominator = y1 - 2.0 * y2 + y3;
    if denominator.abs() < EPSILON {
        return tau as f32;
    }
    let shift = (y1 - y3) / (2.0 * denominator);
    if shift.is_finite() && shift.abs() <= 1.0 {
        tau as f32 + shift
    } else {
        tau as f32
    }
}

/// Detects the pitch of one frame with default threshold and silence floor.
///
/// Pure: allocates its own scratch space and holds no state between calls.
pub fn detect(frame: &[f32], sample_rate: u32, fmin: f32, fmax: f32) -> DetectionResult {
    YinDetector::new(DetectorParams {
        fmin,
        fmax,
        ..DetectorParams::default()
    })
    .detect(frame, sample_rate)
}
