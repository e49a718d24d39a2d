//! # Correction Engine
//!
//! One [`AutoTune`] instance per corrected voice. The instance owns its
//! controller and a tick worker thread; nothing is shared between instances.
//!
//! ## Lifecycle
//! - **Idle**: constructed, no worker.
//! - **Running**: a worker thread ticks the controller every
//!   `tick_interval_ms`.
//! - `stop()` cancels the worker, joins it, then ramps the shift to zero.
//!   Once `stop()` returns no further tick runs.
//! - `dispose()` stops and releases detection buffers and the host's
//!   analysis handle. A disposed engine refuses to start.
//!
//! Ticks never overlap: they all run on the one worker thread, and the
//! ticker channel holds at most one pending tick, so a slow tick makes the
//! next one late rather than concurrent.

use crate::audio::{HostChain, NodeHandle};
use crate::config::EngineConfig;
use crate::controller::{CorrectionState, Corrector, StatePatch};
use crate::error::{EngineError, EngineResult};
use crossbeam_channel::{Sender, select};
use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Capability interface shared by every effect the host can instantiate.
pub trait Effect {
    /// Read-only snapshot of the effect's state.
    type State;
    /// Partial configuration update.
    type Patch;

    /// Begins periodic processing. No-op if already running.
    fn start(&mut self) -> EngineResult<()>;

    /// Stops processing and returns the signal path to neutral. Safe to
    /// call in any state.
    fn stop(&mut self);

    fn state(&self) -> Self::State;

    fn set_state(&mut self, patch: &Self::Patch);

    /// Stops and releases all owned resources. Idempotent.
    fn dispose(&mut self);
}

/// The tick worker of a running engine.
#[derive(Debug)]
struct TickWorker {
    running: Arc<AtomicBool>,
    shutdown_tx: Sender<()>,
    thread_handle: JoinHandle<()>,
}

/// Real-time pitch correction for one voice.
#[derive(Debug)]
pub struct AutoTune {
    corrector: Arc<Mutex<Corrector>>,
    worker: Option<TickWorker>,
    input: NodeHandle,
    output: NodeHandle,
    disposed: bool,
}

impl AutoTune {
    /// Creates an idle engine bound to the host's chain for this voice.
    pub fn new(config: EngineConfig, chain: HostChain) -> Self {
        let HostChain {
            source,
            shifter,
            gate,
            input,
            output,
        } = chain;
        Self {
            corrector: Arc::new(Mutex::new(Corrector::new(config, source, shifter, gate))),
            worker: None,
            input,
            output,
            disposed: false,
        }
    }

    /// Signal-path entry point for the host's routing graph.
    pub fn input(&self) -> NodeHandle {
        self.input
    }

    /// Signal-path exit point for the host's routing graph.
    pub fn output(&self) -> NodeHandle {
        self.output
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Applies a loosely typed JSON update, ignoring mismatched fields.
    pub fn set_state_json(&mut self, value: &serde_json::Value) {
        self.set_state(&StatePatch::from_json(value));
    }

    fn spawn_worker(&self) -> EngineResult<TickWorker> {
        let interval = self.corrector.lock().config().tick_interval();
        let running = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let corrector = Arc::clone(&self.corrector);
        let flag = Arc::clone(&running);

        let thread_handle = thread::Builder::new()
            .name("autotune-tick".to_string())
            .spawn(move || {
                let ticker = crossbeam_channel::tick(interval);
                log::debug!("tick worker started ({interval:?} interval)");
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            if !flag.load(Ordering::Acquire) {
                                break;
                            }
                            let outcome = catch_unwind(AssertUnwindSafe(|| corrector.lock().tick()));
                            if outcome.is_err() {
                                log::error!("tick panicked; continuing with the next tick");
                            }
                        },
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                log::debug!("tick worker finished");
            })
            .map_err(EngineError::Spawn)?;

        Ok(TickWorker {
            running,
            shutdown_tx,
            thread_handle,
        })
    }
}

impl Effect for AutoTune {
    type State = CorrectionState;
    type Patch = StatePatch;

    fn start(&mut self) -> EngineResult<()> {
        if self.disposed {
            return Err(EngineError::Disposed);
        }
        if self.worker.is_some() {
            return Ok(());
        }
        self.worker = Some(self.spawn_worker()?);
        log::info!("pitch correction started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.running.store(false, Ordering::Release);
            let _ = worker.shutdown_tx.try_send(());
            if worker.thread_handle.join().is_err() {
                log::error!("tick worker terminated abnormally");
            }
            log::info!("pitch correction stopped");
        }
        if !self.corrector.lock().release_to_zero() {
            log::warn!("could not return the pitch shift to zero on stop");
        }
    }

    fn state(&self) -> CorrectionState {
        self.corrector.lock().state().clone()
    }

    fn set_state(&mut self, patch: &StatePatch) {
        self.corrector.lock().apply(patch);
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.stop();
        self.corrector.lock().release_resources();
        self.disposed = true;
        log::debug!("engine disposed");
    }
}

impl Drop for AutoTune {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHost;
    use serde_json::json;
    use std::time::Duration;

    fn fast_config() -> EngineConfig {
        EngineConfig {
            tick_interval_ms: 5,
            ..EngineConfig::default()
        }
    }

    fn stop_ramps(host: &TestHost) -> usize {
        host.ramps().iter().filter(|&&r| r == (0.0, 0.1)).count()
    }

    #[test]
    fn test_running_engine_corrects_periodically() {
        let host = TestHost::new(450.0);
        let mut engine = AutoTune::new(fast_config(), host.chain());
        assert!(!engine.is_running());

        engine.start().unwrap();
        assert!(engine.is_running());
        thread::sleep(Duration::from_millis(80));
        engine.stop();

        assert!(host.reads() >= 2, "only {} ticks ran", host.reads());
        let ramps = host.ramps();
        assert!(ramps.iter().any(|&(s, d)| (s + 0.39).abs() < 0.03 && d == 0.05));
        assert_eq!(engine.state().target_midi, None);
    }

    #[test]
    fn test_start_twice_is_a_no_op() {
        let host = TestHost::new(440.0);
        let mut engine = AutoTune::new(fast_config(), host.chain());
        engine.start().unwrap();
        engine.start().unwrap();
        assert!(engine.is_running());
        engine.stop();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_no_tick_after_stop_and_single_zero_ramp() {
        let host = TestHost::new(440.0);
        host.set_frequency(None);
        let mut engine = AutoTune::new(fast_config(), host.chain());
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(40));
        engine.stop();

        let reads = host.reads();
        let ramps = host.ramps();
        assert_eq!(ramps.last(), Some(&(0.0, 0.1)));
        assert_eq!(stop_ramps(&host), 1);

        thread::sleep(Duration::from_millis(40));
        assert_eq!(host.reads(), reads);
        assert_eq!(host.ramps().len(), ramps.len());
    }

    #[test]
    fn test_stop_from_idle_still_zeroes_shift() {
        let host = TestHost::new(440.0);
        let mut engine = AutoTune::new(fast_config(), host.chain());
        engine.stop();
        assert_eq!(host.ramps(), vec![(0.0, 0.1)]);
        assert_eq!(host.reads(), 0);
    }

    #[test]
    fn test_engine_can_restart_after_stop() {
        let host = TestHost::new(440.0);
        let mut engine = AutoTune::new(fast_config(), host.chain());
        engine.start().unwrap();
        engine.stop();
        let reads = host.reads();
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(60));
        engine.stop();
        assert!(host.reads() > reads);
    }

    #[test]
    fn test_state_updates_while_running() {
        let host = TestHost::new(440.0);
        let mut engine = AutoTune::new(fast_config(), host.chain());
        engine.start().unwrap();
        engine.set_state_json(&json!({ "key": "A", "scale": "minor", "retune": 0.4, "gateDb": "loud" }));
        thread::sleep(Duration::from_millis(100));
        engine.stop();

        let state = engine.state();
        assert_eq!(state.key_pitch_class, 9);
        assert_eq!(state.scale_name, "minor");
        assert_eq!(state.retune_seconds, 0.4);
        assert_eq!(state.gate_threshold_db, -50.0);
        assert!(host.ramps().iter().any(|&(_, d)| d == 0.4));
    }

    #[test]
    fn test_faulty_host_does_not_halt_ticks() {
        let host = TestHost::new(440.0);
        host.fail_reads(true);
        host.fail_ramps(true);
        let mut engine = AutoTune::new(fast_config(), host.chain());
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(40));
        let faulted_reads = host.reads();
        assert!(faulted_reads >= 2);

        host.fail_reads(false);
        host.fail_ramps(false);
        thread::sleep(Duration::from_millis(100));
        engine.stop();
        assert!(host.reads() > faulted_reads);
        assert!(host.ramps().iter().any(|&(_, d)| d == 0.05));
    }

    #[test]
    fn test_dispose_releases_and_refuses_restart() {
        let host = TestHost::new(440.0);
        let mut engine = AutoTune::new(fast_config(), host.chain());
        assert_eq!(engine.input(), NodeHandle(1));
        assert_eq!(engine.output(), NodeHandle(2));
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(20));

        engine.dispose();
        assert!(engine.is_disposed());
        assert!(!engine.is_running());
        assert!(host.released());
        assert_eq!(stop_ramps(&host), 1);
        assert!(matches!(engine.start(), Err(EngineError::Disposed)));

        engine.dispose();
        drop(engine);
        assert_eq!(stop_ramps(&host), 1);
    }

    #[test]
    fn test_drop_disposes_running_engine() {
        let host = TestHost::new(440.0);
        host.set_frequency(None);
        {
            let mut engine = AutoTune::new(fast_config(), host.chain());
            engine.start().unwrap();
            thread::sleep(Duration::from_millis(20));
        }
        assert!(host.released());
        assert_eq!(host.last_ramp(), Some((0.0, 0.1)));
        let reads = host.reads();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(host.reads(), reads);
    }

    #[test]
    fn test_engines_do_not_share_state() {
        let a_host = TestHost::new(440.0);
        let b_host = TestHost::new(440.0);
        let mut a = AutoTune::new(fast_config(), a_host.chain());
        let mut b = AutoTune::new(fast_config(), b_host.chain());
        a.set_state(&StatePatch {
            key: Some("G".into()),
            ..Default::default()
        });
        assert_eq!(a.state().key_pitch_class, 7);
        assert_eq!(b.state().key_pitch_class, 0);
        b.stop();
        assert!(a_host.ramps().is_empty());
    }
}
