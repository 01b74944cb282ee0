// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The worker thread pool and the per-generation barrier driver.
//!
//! Workers are spawned once and live for the pool's lifetime; a generation
//! releases them through the gate and captures them again rather than
//! spawning fresh threads. The driver's sequence per generation:
//!
//! 1. lower the term latch
//! 2. open the gate (workers proceed)
//! 3. poll until every worker reports `Working` (entry observed)
//! 4. close the gate, raise the term latch
//! 5. poll until every worker reports `Finished` (exit observed)
//!
//! Step 3 is stable: a worker cannot slip back to `Finished` while the
//! latch is down, so "all `Working`" means every worker entered *this*
//! generation, and no generation can be double-counted.
//!
//! Shutdown is cooperative: a pool-wide stop flag checked at the gate, set
//! on drop before the gate is opened one final time.

use super::gate::{Gate, TermLatch};
use super::worker::{WorkerCtx, WorkerState, STATE_FINISHED, STATE_WORKING};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long the driver sleeps between state-poll sweeps.
const POLL_INTERVAL: Duration = Duration::from_micros(50);

/// Owns the worker threads and drives the generation barrier.
pub(crate) struct ThreadPool {
    handles: Vec<JoinHandle<()>>,
    states: Arc<[WorkerState]>,
    gate: Arc<Gate>,
    latch: Arc<TermLatch>,
    stop: Arc<AtomicBool>,
}

impl ThreadPool {
    /// Spawn one parked worker per context.
    ///
    /// `make_body` builds each worker's generation body; the body is called
    /// exactly once per generation with the worker's own context. Workers
    /// block at the gate until the first [`run_generation`](Self::run_generation).
    pub(crate) fn start<F>(
        ctxs: Vec<WorkerCtx>,
        mut make_body: impl FnMut(&WorkerCtx) -> F,
    ) -> Result<Self>
    where
        F: FnMut(&mut WorkerCtx) + Send + 'static,
    {
        let states: Arc<[WorkerState]> = (0..ctxs.len()).map(|_| WorkerState::new()).collect();

        let mut pool = Self {
            handles: Vec::with_capacity(ctxs.len()),
            states,
            gate: Arc::new(Gate::new()),
            latch: Arc::new(TermLatch::new()),
            stop: Arc::new(AtomicBool::new(false)),
        };

        for mut ctx in ctxs {
            let body = make_body(&ctx);
            let gate = Arc::clone(&pool.gate);
            let latch = Arc::clone(&pool.latch);
            let stop = Arc::clone(&pool.stop);
            let states = Arc::clone(&pool.states);
            let tid = ctx.tid();

            let handle = thread::Builder::new()
                .name(format!("evopool-worker-{tid}"))
                .spawn(move || {
                    worker_main(&mut ctx, body, &gate, &latch, &stop, &states[tid]);
                })
                .map_err(Error::ThreadSpawn)?;
            // If a later spawn fails, Drop stops and joins the workers
            // already running.
            pool.handles.push(handle);
        }

        Ok(pool)
    }

    /// Release every worker for one generation and capture them again.
    ///
    /// On return every worker has finished its slice and is parked at the
    /// gate; all their population writes are visible to the caller.
    pub(crate) fn run_generation(&self) {
        // Order matters: the latch must be down before any worker passes
        // the gate, or a fast worker could finish and re-enter.
        self.latch.reset();
        self.gate.open();
        self.wait_all(STATE_WORKING);

        self.gate.close();
        self.latch.set();
        self.wait_all(STATE_FINISHED);
    }

    /// Poll until every worker reports `state`.
    fn wait_all(&self, state: u8) {
        loop {
            if self.states.iter().all(|s| s.is(state)) {
                return;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Number of workers.
    pub(crate) fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Whether every worker currently reports `Finished`. Introspection for
    /// barrier-symmetry checks; always true between generations.
    pub(crate) fn all_finished(&self) -> bool {
        self.states.iter().all(|s| s.is(STATE_FINISHED))
    }

    /// Whether the term latch is raised. Always true between generations.
    pub(crate) fn term_ready(&self) -> bool {
        self.latch.is_set()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        // Workers are parked at the gate; open it so they observe the stop
        // flag, then join them.
        self.gate.open();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// The worker main loop. One gate traversal per generation doubles as the
/// exit gate of generation `g` and the entry gate of `g+1`.
fn worker_main<F: FnMut(&mut WorkerCtx)>(
    ctx: &mut WorkerCtx,
    mut body: F,
    gate: &Gate,
    latch: &TermLatch,
    stop: &AtomicBool,
    state: &WorkerState,
) {
    log::debug!(
        "[WORKER] tid={} slice={:?} parked at the gate",
        ctx.tid(),
        ctx.slice()
    );

    gate.pass();
    while !stop.load(Ordering::Acquire) {
        state.store(STATE_WORKING);
        body(ctx);
        // Hold here until the driver has re-closed the gate; reporting
        // Finished earlier could let this worker be counted twice.
        latch.wait();
        state.store(STATE_FINISHED);
        gate.pass();
    }

    log::debug!("[WORKER] tid={} terminating", ctx.tid());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn ctxs(n: usize) -> Vec<WorkerCtx> {
        super::super::worker::slice_bounds(n * 4, n)
            .into_iter()
            .enumerate()
            .map(|(tid, slice)| WorkerCtx::new(tid, slice, [1, 2, 3]))
            .collect()
    }

    #[test]
    fn test_generation_runs_every_worker_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = ThreadPool::start(ctxs(4), |_| {
            let counter = Arc::clone(&counter);
            move |_ctx: &mut WorkerCtx| {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

        pool.run_generation();
        assert_eq!(counter.load(Ordering::SeqCst), 4);

        pool.run_generation();
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_barrier_symmetry_after_generation() {
        let pool = ThreadPool::start(ctxs(3), |_| |_: &mut WorkerCtx| {}).unwrap();
        for _ in 0..5 {
            pool.run_generation();
            assert!(pool.all_finished());
            assert!(pool.term_ready());
        }
    }

    #[test]
    fn test_workers_park_until_released() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = ThreadPool::start(ctxs(2), |_| {
            let counter = Arc::clone(&counter);
            move |_: &mut WorkerCtx| {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

        // No generation dispatched yet: the body must not have run.
        thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        pool.run_generation();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_without_any_generation() {
        let pool = ThreadPool::start(ctxs(4), |_| |_: &mut WorkerCtx| {}).unwrap();
        assert_eq!(pool.workers(), 4);
        drop(pool); // must not hang
    }

    #[test]
    fn test_drop_after_generations() {
        let pool = ThreadPool::start(ctxs(2), |_| |_: &mut WorkerCtx| {}).unwrap();
        for _ in 0..3 {
            pool.run_generation();
        }
        drop(pool); // must not hang
    }

    #[test]
    fn test_bodies_see_own_ctx() {
        let seen: Arc<parking_lot::Mutex<Vec<usize>>> =
            Arc::new(parking_lot::Mutex::new(Vec::new()));
        let pool = ThreadPool::start(ctxs(3), |_| {
            let seen = Arc::clone(&seen);
            move |ctx: &mut WorkerCtx| {
                seen.lock().push(ctx.tid());
            }
        })
        .unwrap();

        pool.run_generation();
        let mut tids = seen.lock().clone();
        tids.sort_unstable();
        assert_eq!(tids, vec![0, 1, 2]);
    }
}
