//! Debounced flush scheduling.
//!
//! Each store owns one flush worker thread. Mutations call
//! [`Flusher::schedule`], which (re)arms a deadline `delay` after the call;
//! the worker runs the flush job once the deadline passes without a newer
//! request. The schedule is a small state machine:
//!
//! ```text
//!            schedule                 deadline
//!   Idle ─────────────▶ Armed ─────────────────▶ Flushing ──▶ Idle
//!                         ▲                          │
//!                         │  job done                │ schedule
//!                         └──── ArmedWhileFlushing ◀─┘
//! ```
//!
//! Only the worker runs the job, so at most one flush executes at a time,
//! and a request that arrives mid-flush is re-armed rather than dropped.
//! On shutdown an armed flush runs immediately before the thread exits.

use crate::error::CoreResult;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::trace;

/// Scheduling state of a store's flush worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPhase {
    /// Nothing to write.
    Idle,
    /// A flush is due at the current deadline.
    Armed,
    /// The worker is writing a snapshot.
    Flushing,
    /// Writing, and another flush was requested meanwhile.
    ArmedWhileFlushing,
}

struct Schedule {
    phase: FlushPhase,
    deadline: Instant,
    shutdown: bool,
}

struct Shared {
    schedule: Mutex<Schedule>,
    changed: Condvar,
    delay: Duration,
}

/// Handle to a flush worker thread. Dropping it flushes anything armed and
/// joins the thread.
pub(crate) struct Flusher {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Flusher {
    /// Spawns the worker thread for the collection `name`.
    pub(crate) fn spawn<F>(name: &str, delay: Duration, job: F) -> CoreResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            schedule: Mutex::new(Schedule {
                phase: FlushPhase::Idle,
                deadline: Instant::now(),
                shutdown: false,
            }),
            changed: Condvar::new(),
            delay,
        });

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("docstore-flush-{name}"))
            .spawn(move || run(&worker, job))?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Requests a flush `delay` from now, pushing back any armed deadline.
    pub(crate) fn schedule(&self) {
        let mut schedule = self.shared.schedule.lock();
        schedule.deadline = Instant::now() + self.shared.delay;
        schedule.phase = match schedule.phase {
            FlushPhase::Idle | FlushPhase::Armed => FlushPhase::Armed,
            FlushPhase::Flushing | FlushPhase::ArmedWhileFlushing => {
                FlushPhase::ArmedWhileFlushing
            }
        };
        trace!(phase = ?schedule.phase, "flush scheduled");
        self.shared.changed.notify_all();
    }

    /// Withdraws a pending request that an explicit flush is about to cover.
    ///
    /// Returns `true` if a request was pending.
    pub(crate) fn cancel_pending(&self) -> bool {
        let mut schedule = self.shared.schedule.lock();
        let (next, was_pending) = match schedule.phase {
            FlushPhase::Armed => (FlushPhase::Idle, true),
            FlushPhase::ArmedWhileFlushing => (FlushPhase::Flushing, true),
            phase => (phase, false),
        };
        schedule.phase = next;
        self.shared.changed.notify_all();
        was_pending
    }

    /// Returns the current phase.
    pub(crate) fn phase(&self) -> FlushPhase {
        self.shared.schedule.lock().phase
    }

    /// Blocks until the worker is idle or `timeout` elapses.
    ///
    /// Returns `true` if the worker is idle.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut schedule = self.shared.schedule.lock();
        while schedule.phase != FlushPhase::Idle {
            if self
                .shared
                .changed
                .wait_until(&mut schedule, deadline)
                .timed_out()
            {
                return schedule.phase == FlushPhase::Idle;
            }
        }
        true
    }
}

impl Drop for Flusher {
    fn drop(&mut self) {
        {
            let mut schedule = self.shared.schedule.lock();
            schedule.shutdown = true;
            self.shared.changed.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run<F: FnMut()>(shared: &Shared, mut job: F) {
    let mut schedule = shared.schedule.lock();
    loop {
        match schedule.phase {
            FlushPhase::Idle => {
                if schedule.shutdown {
                    break;
                }
                shared.changed.wait(&mut schedule);
            }
            FlushPhase::Armed => {
                let deadline = schedule.deadline;
                if !schedule.shutdown && Instant::now() < deadline {
                    shared.changed.wait_until(&mut schedule, deadline);
                    continue;
                }
                flush_once(shared, &mut schedule, &mut job);
            }
            // Only this thread enters Flushing, and it leaves it before
            // looping again; wait out any transient state.
            FlushPhase::Flushing | FlushPhase::ArmedWhileFlushing => {
                shared.changed.wait(&mut schedule);
            }
        }
    }
    trace!("flush worker stopped");
}

fn flush_once<F: FnMut()>(shared: &Shared, schedule: &mut MutexGuard<'_, Schedule>, job: &mut F) {
    schedule.phase = FlushPhase::Flushing;
    shared.changed.notify_all();

    MutexGuard::unlocked(schedule, job);

    schedule.phase = match schedule.phase {
        FlushPhase::ArmedWhileFlushing => FlushPhase::Armed,
        _ => FlushPhase::Idle,
    };
    shared.changed.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_flusher(delay: Duration) -> (Flusher, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let flusher = Flusher::spawn("test", delay, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        (flusher, runs)
    }

    #[test]
    fn idle_until_scheduled() {
        let (flusher, runs) = counting_flusher(Duration::ZERO);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(flusher.phase(), FlushPhase::Idle);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn burst_collapses_into_one_run() {
        let (flusher, runs) = counting_flusher(Duration::from_millis(100));

        flusher.schedule();
        flusher.schedule();
        flusher.schedule();
        assert_eq!(flusher.phase(), FlushPhase::Armed);

        assert!(flusher.wait_idle(Duration::from_secs(5)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn runs_only_after_delay() {
        let (flusher, runs) = counting_flusher(Duration::from_millis(300));
        let start = Instant::now();

        flusher.schedule();
        assert!(flusher.wait_idle(Duration::from_secs(5)));

        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn request_during_flush_runs_again() {
        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&started);
        let flusher = Flusher::spawn("slow", Duration::ZERO, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
        })
        .unwrap();

        flusher.schedule();
        while started.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        flusher.schedule();
        assert_eq!(flusher.phase(), FlushPhase::ArmedWhileFlushing);

        assert!(flusher.wait_idle(Duration::from_secs(5)));
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cancel_pending_withdraws_armed_request() {
        let (flusher, runs) = counting_flusher(Duration::from_secs(60));

        flusher.schedule();
        assert!(flusher.cancel_pending());
        assert_eq!(flusher.phase(), FlushPhase::Idle);
        assert!(!flusher.cancel_pending());

        drop(flusher);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn drop_runs_armed_flush() {
        let (flusher, runs) = counting_flusher(Duration::from_secs(60));

        flusher.schedule();
        drop(flusher);

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
