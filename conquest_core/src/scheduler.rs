//! Periodic timers for round-end and autosave, plus the in-progress guard that
//! keeps round passes from overlapping.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};
use thiserror::Error;
use tracing::{debug, error, info};

pub type TimerCallback = Box<dyn FnMut() + Send + 'static>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("timer interval must be positive")]
    ZeroInterval,
    #[error("failed to spawn timer thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Fires callbacks on a fixed cadence. A callback never runs concurrently with
/// itself.
pub trait Scheduler {
    fn schedule_periodic(
        &mut self,
        name: &str,
        interval: Duration,
        callback: TimerCallback,
    ) -> Result<(), SchedulerError>;
}

struct TimerThread {
    name: String,
    stop_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TimerThread {
    fn stop(&mut self) {
        // Dropping the sender disconnects the stop channel and wakes the thread.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(target: "conquest::scheduler", timer = %self.name, "timer.join_failed");
            }
        }
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One OS thread per timer, each driven by a `crossbeam_channel::tick`.
///
/// A panicking callback is caught and logged; the timer keeps firing.
#[derive(Default)]
pub struct ThreadScheduler {
    timers: Vec<TimerThread>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Stops every timer and waits for in-flight callbacks to finish.
    pub fn shutdown(&mut self) {
        for timer in &mut self.timers {
            timer.stop();
        }
        self.timers.clear();
        info!(target: "conquest::scheduler", "scheduler.stopped");
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule_periodic(
        &mut self,
        name: &str,
        interval: Duration,
        mut callback: TimerCallback,
    ) -> Result<(), SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let timer_name = name.to_string();
        let handle = thread::Builder::new()
            .name(format!("timer-{}", name))
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            debug!(target: "conquest::scheduler", timer = %timer_name, "timer.fired");
                            if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                                error!(
                                    target: "conquest::scheduler",
                                    timer = %timer_name,
                                    "timer.callback_panicked"
                                );
                            }
                        }
                    }
                }
            })
            .map_err(|source| SchedulerError::Spawn {
                name: name.to_string(),
                source,
            })?;

        info!(
            target: "conquest::scheduler",
            timer = name,
            interval_ms = interval.as_millis() as u64,
            "timer.scheduled"
        );
        self.timers.push(TimerThread {
            name: name.to_string(),
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        });
        Ok(())
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        if !self.timers.is_empty() {
            self.shutdown();
        }
    }
}

/// In-progress flag for round passes.
#[derive(Debug, Clone, Default)]
pub struct RoundGuard {
    running: Arc<AtomicBool>,
}

/// Held for the duration of one pass; releases the guard when dropped,
/// including during unwinding.
#[derive(Debug)]
pub struct PassToken {
    running: Arc<AtomicBool>,
}

impl RoundGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another pass holds the guard.
    pub fn try_begin(&self) -> Option<PassToken> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassToken {
                running: Arc::clone(&self.running),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for PassToken {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
