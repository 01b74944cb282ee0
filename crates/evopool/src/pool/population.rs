// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared population storage.
//!
//! The population is one contiguous slab of [`Solution`] records, shared
//! between the driver and the worker threads. There is no lock around it;
//! the safety contract is the generation barrier:
//!
//! - during a generation, worker `w` has exclusive logical ownership of its
//!   slice `[start, stop)`, and the slices are disjoint;
//! - between generations (workers parked at the gate), the driver has
//!   exclusive ownership of the whole slab;
//! - hand-over in both directions is ordered by the gate mutex and the
//!   Release/Acquire worker-state flags.
//!
//! Every access method is `unsafe` and restates which part of that contract
//! the caller must uphold.

use super::problem::Solution;
use std::cell::UnsafeCell;
use std::ops::Range;

/// Fixed-size slab of solutions with interior mutability.
pub(crate) struct Population<G> {
    /// Owns the slab; dropped (and genomes with it) when the pool goes away.
    #[allow(dead_code)]
    slots: UnsafeCell<Box<[Solution<G>]>>,
    /// Cached base pointer, so carving slices never materializes a reference
    /// to the whole slab.
    ptr: *mut Solution<G>,
    len: usize,
}

// SAFETY: Population is Send + Sync because all access goes through the
// unsafe slice methods below, whose callers promise the barrier-protocol
// exclusivity described in the module docs. The raw pointer is derived from
// the owned slab and never reassigned.
unsafe impl<G: Send> Send for Population<G> {}
unsafe impl<G: Send> Sync for Population<G> {}

impl<G> Population<G> {
    pub(crate) fn new(slots: Vec<Solution<G>>) -> Self {
        let mut slab = slots.into_boxed_slice();
        let ptr = slab.as_mut_ptr();
        let len = slab.len();
        Self {
            slots: UnsafeCell::new(slab),
            ptr,
            len,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Mutable view of `range`.
    ///
    /// # Safety
    /// The caller must have exclusive logical ownership of `range` under
    /// the barrier protocol (a worker inside a generation for its own
    /// slice, or the driver between generations), and `range` must lie
    /// within `[0, len)`.
    #[inline]
    pub(crate) unsafe fn slice_mut(&self, range: Range<usize>) -> &mut [Solution<G>] {
        debug_assert!(range.start <= range.end && range.end <= self.len);
        std::slice::from_raw_parts_mut(self.ptr.add(range.start), range.end - range.start)
    }

    /// Mutable view of the whole population.
    ///
    /// # Safety
    /// Driver only, between generations (every worker parked at the gate).
    #[inline]
    pub(crate) unsafe fn all_mut(&self) -> &mut [Solution<G>] {
        self.slice_mut(0..self.len)
    }

    /// Shared view of the whole population.
    ///
    /// # Safety
    /// No worker may be inside a generation, and no mutable view may be
    /// live. The public API guarantees this by requiring `&mut GenePool`
    /// to run a generation.
    #[inline]
    pub(crate) unsafe fn all(&self) -> &[Solution<G>] {
        std::slice::from_raw_parts(self.ptr, self.len)
    }
}
