// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Barrier primitives: the driver-held gate and the term-ready latch.
//!
//! Together these give the release/capture barrier the driver operates once
//! per generation. The gate plays the role of a lock the driver holds
//! between generations: workers funnel through it ("pass") only while the
//! driver has opened it. The latch is the handshake that stops a worker
//! from finishing generation `g` and re-entering `g+1` before the driver
//! has observed its arrival in `g`.
//!
//! # Memory Ordering Strategy
//!
//! - The gate's mutex acquire/release orders driver writes (dispersal,
//!   parameter swaps) before worker reads of the next generation.
//! - The latch flag uses Release on set and Acquire on every check, so a
//!   worker that sees the latch up also sees everything the driver wrote
//!   before raising it.

use crossbeam::utils::Backoff;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

/// A gate workers pass through and the driver opens/closes.
///
/// Closed is the parked state: `pass` blocks until the driver opens the
/// gate. Any number of workers may pass while it is open; passing does not
/// consume the open state.
pub(crate) struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    /// Create a closed gate (the driver "holds" it).
    pub(crate) fn new() -> Self {
        Self {
            open: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    /// Open the gate and wake every parked worker.
    pub(crate) fn open(&self) {
        *self.open.lock() = true;
        self.cv.notify_all();
    }

    /// Close the gate; workers arriving after this block in [`pass`](Self::pass).
    pub(crate) fn close(&self) {
        *self.open.lock() = false;
    }

    /// Block until the gate is open, then return without consuming it.
    pub(crate) fn pass(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cv.wait(&mut open);
        }
    }
}

/// The term-ready handshake: an atomic fast path with a condvar fallback.
///
/// The driver resets the latch before releasing the workers and sets it
/// only after it has re-closed the gate. A worker that finished its slice
/// waits here, which guarantees the driver observed its `Working` state
/// before the worker may report `Finished`.
pub(crate) struct TermLatch {
    ready: AtomicBool,
    lock: Mutex<()>,
    cv: Condvar,
}

impl TermLatch {
    pub(crate) fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            lock: Mutex::new(()),
            cv: Condvar::new(),
        }
    }

    /// Lower the latch. Called by the driver only, with all workers parked.
    pub(crate) fn reset(&self) {
        self.ready.store(false, Ordering::Release);
    }

    /// Raise the latch and wake waiters.
    pub(crate) fn set(&self) {
        self.ready.store(true, Ordering::Release);
        // Taking the lock orders the store against a waiter that checked the
        // flag and is about to sleep; without it the notify could be lost.
        let _guard = self.lock.lock();
        self.cv.notify_all();
    }

    /// Whether the latch is currently raised.
    pub(crate) fn is_set(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Wait until the latch is raised: a short spin for the common case
    /// where the driver is mid-capture, then a condvar sleep.
    pub(crate) fn wait(&self) {
        let backoff = Backoff::new();
        while !backoff.is_completed() {
            if self.ready.load(Ordering::Acquire) {
                return;
            }
            backoff.snooze();
        }

        let mut guard = self.lock.lock();
        while !self.ready.load(Ordering::Acquire) {
            self.cv.wait(&mut guard);
        }
    }
}
