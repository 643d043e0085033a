//! Time and node budgeting for a single search call.
//!
//! Simplified from the teacher's `time_control.rs`: this spec's `SearchConfig`
//! only exposes `maxDepth` and `maxTimeMs` (no UCI clock/increment
//! allocation), so the best-move-stability/score-stability/node-fraction soft
//! time adjustments the teacher derives from a running game don't apply here
//! -- every search is a one-shot call with a fixed budget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::params::CHECKUP_INTERVAL;

#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_depth: Option<usize>,
    pub max_time: Option<Duration>,
}

impl SearchLimits {
    pub fn depth(depth: usize) -> Self {
        Self { max_depth: Some(depth), max_time: None }
    }

    pub fn time(time: Duration) -> Self {
        Self { max_depth: None, max_time: Some(time) }
    }
}

/// Tracks elapsed time and a shared stop flag a caller can use to abort an
/// in-flight search from another thread (the worker's STOP command).
#[derive(Debug, Clone)]
pub struct TimeController {
    limits: SearchLimits,
    start: Instant,
    stop: Arc<AtomicBool>,
    next_checkup: u64,
    stop_early: bool,
}

/// A cloneable handle used to abort a running search from outside the
/// search thread.
#[derive(Clone)]
pub struct TimeControlHandle {
    stop: Arc<AtomicBool>,
}

impl TimeControlHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl TimeController {
    pub fn new(limits: SearchLimits) -> (Self, TimeControlHandle) {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = TimeControlHandle { stop: stop.clone() };

        let tc = Self {
            limits,
            start: Instant::now(),
            stop,
            next_checkup: CHECKUP_INTERVAL,
            stop_early: false,
        };

        (tc, handle)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Checked every `CHECKUP_INTERVAL` nodes: cheap atomics/clock reads the
    /// rest of the time.
    pub fn should_continue(&mut self, nodes: u64) -> bool {
        if nodes < self.next_checkup {
            return true;
        }
        self.next_checkup = nodes + CHECKUP_INTERVAL;

        if self.stopped() {
            return false;
        }

        match self.limits.max_time {
            Some(max_time) => self.elapsed() < max_time,
            None => true,
        }
    }

    /// Whether the iterative-deepening loop should start another iteration
    /// at `depth`.
    pub fn should_start_iteration(&self, depth: usize) -> bool {
        if depth <= 1 {
            return true;
        }

        if self.stopped() || self.stop_early {
            return false;
        }

        if let Some(max_depth) = self.limits.max_depth {
            if depth > max_depth {
                return false;
            }
        }

        if let Some(max_time) = self.limits.max_time {
            return self.elapsed() < max_time;
        }

        true
    }

    /// Signal the driver to not bother starting another ID iteration (e.g.
    /// when there's only one legal move).
    pub fn stop_early(&mut self) {
        self.stop_early = true;
    }
}
