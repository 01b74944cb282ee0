// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lane-partitioned fixed-size block allocator.
//!
//! The allocator carves one contiguous region into `buckets` lanes of
//! `blocks_per_bucket` blocks, each `block_size` bytes. Every lane has its
//! own bitmap (one bit per block, 1 = allocated). The intended discipline is
//! that lane `w` is used only by worker `w`; under that discipline no CAS
//! loop or lock is needed, because a lane's bitmap has a single writer.
//!
//! # Memory Ordering Strategy
//!
//! Bitmap words are atomics so that adjacent lanes may share a cache line
//! without the program being ill-formed, but per-lane single ownership means
//! plain Release stores and Acquire loads suffice:
//!
//! - **Release** on bitmap updates: pairs with the Acquire load the same
//!   lane owner performs on its next scan, and with the barrier-level
//!   synchronization that hands a lane to another thread between
//!   generations.
//! - No compare-exchange: two threads never race on the same lane's words
//!   while the lane discipline holds.
//!
//! # Tolerated Misuse
//!
//! Runtime misuse never corrupts the bitmap: an out-of-range lane returns
//! `None`/no-ops, a pointer outside the lane or not on a block boundary is
//! ignored, and freeing an already-free block is a no-op.

use crate::error::{Error, Result};
use std::cell::UnsafeCell;
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

/// Bits per bitmap word.
const WORD_BITS: usize = 32;

/// Fixed-size block pool partitioned into per-worker lanes.
///
/// Allocation is deterministic first-fit: scan the lane's bitmap for the
/// first word that is not `0xFFFF_FFFF`, then take its lowest clear bit.
///
/// # Example
/// ```
/// use evopool::BucketAllocator;
///
/// let pool = BucketAllocator::new(2, 16, 100).unwrap();
/// let block = pool.alloc(0).expect("lane 0 has free blocks");
/// pool.free(0, block);
/// ```
pub struct BucketAllocator {
    /// Backing region, `buckets * blocks_per_bucket * block_size` bytes,
    /// allocated as u64 words so the base is 8-byte aligned: block sizes
    /// that are multiples of 8 yield blocks naturally aligned for typed
    /// payloads (f64 parameter vectors and the like).
    data: UnsafeCell<Box<[u64]>>,
    /// Base address of `data`, cached so handing out block pointers never
    /// forms a reference to the whole region.
    base: *mut u8,
    /// One bitmap per lane, `words_per_bucket` words each, stored back to back.
    bitmaps: Box<[AtomicU32]>,
    buckets: usize,
    block_size: usize,
    blocks_per_bucket: usize,
    words_per_bucket: usize,
}

// SAFETY: BucketAllocator is Send + Sync because:
// - bitmap words are atomics, so concurrent lane scans are well-defined
// - block memory is only reachable through pointers returned by alloc(), and
//   the lane discipline (one owner per lane) makes those regions disjoint
//   across threads
// - `base` is derived once from the owned region and never reassigned
unsafe impl Send for BucketAllocator {}
unsafe impl Sync for BucketAllocator {}

impl BucketAllocator {
    /// Create an allocator with `buckets` lanes of `blocks_per_bucket`
    /// blocks, each `block_size` bytes, all free.
    ///
    /// Fails with [`Error::OutOfMemory`] when any dimension is zero or the
    /// total byte size overflows `usize`.
    pub fn new(buckets: usize, block_size: usize, blocks_per_bucket: usize) -> Result<Self> {
        if buckets == 0 || block_size == 0 || blocks_per_bucket == 0 {
            return Err(Error::OutOfMemory);
        }
        let total = buckets
            .checked_mul(block_size)
            .and_then(|b| b.checked_mul(blocks_per_bucket))
            .ok_or(Error::OutOfMemory)?;

        let words_per_bucket = blocks_per_bucket.div_ceil(WORD_BITS);
        let bitmaps: Box<[AtomicU32]> = (0..buckets * words_per_bucket)
            .map(|_| AtomicU32::new(0))
            .collect();

        let mut region = vec![0u64; total.div_ceil(8)].into_boxed_slice();
        let base = region.as_mut_ptr().cast::<u8>();

        Ok(Self {
            data: UnsafeCell::new(region),
            base,
            bitmaps,
            buckets,
            block_size,
            blocks_per_bucket,
            words_per_bucket,
        })
    }

    /// Number of lanes.
    #[inline]
    #[must_use]
    pub fn buckets(&self) -> usize {
        self.buckets
    }

    /// Size of every block in bytes.
    #[inline]
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Capacity of every lane in blocks.
    #[inline]
    #[must_use]
    pub fn blocks_per_bucket(&self) -> usize {
        self.blocks_per_bucket
    }

    /// Bitmap words belonging to `lane`.
    #[inline]
    fn lane_words(&self, lane: usize) -> &[AtomicU32] {
        let start = lane * self.words_per_bucket;
        &self.bitmaps[start..start + self.words_per_bucket]
    }

    /// Byte offset of the start of `lane` within the backing region.
    #[inline]
    fn lane_base_offset(&self, lane: usize) -> usize {
        lane * self.blocks_per_bucket * self.block_size
    }

    /// Allocate the first free block of `lane`.
    ///
    /// Returns `None` when the lane is out of range or full. Must only be
    /// called by the owner of `lane`; the returned pointer is valid (and
    /// exclusively owned by the caller) until it is passed back to
    /// [`free`](Self::free) or the allocator is dropped.
    pub fn alloc(&self, lane: usize) -> Option<NonNull<u8>> {
        if lane >= self.buckets {
            return None;
        }

        let words = self.lane_words(lane);
        for (idx, word) in words.iter().enumerate() {
            let bits = word.load(Ordering::Acquire);
            if bits == u32::MAX {
                continue;
            }
            let bit = (!bits).trailing_zeros() as usize;
            let block = idx * WORD_BITS + bit;
            // The last word may cover bits past the lane capacity.
            if block >= self.blocks_per_bucket {
                return None;
            }
            // Single lane owner: a plain store cannot race with another
            // writer of this word. Release pairs with the Acquire above and
            // with the generation barrier when the lane changes hands.
            word.store(bits | (1 << bit), Ordering::Release);

            let offset = self.lane_base_offset(lane) + block * self.block_size;
            // SAFETY:
            // 1. `base` points at the start of the owned region, which is
            //    `buckets * blocks_per_bucket * block_size` bytes long.
            // 2. `lane < buckets` and `block < blocks_per_bucket`, so
            //    `offset + block_size <= total` and the block lies entirely
            //    inside the region.
            // 3. The bitmap bit was clear, so no other live pointer names
            //    this block.
            let ptr = unsafe { self.base.add(offset) };
            return NonNull::new(ptr);
        }

        None
    }

    /// Return a block to `lane`.
    ///
    /// Silently ignores out-of-range lanes, pointers outside the lane
    /// region, pointers that are not on a block boundary, and blocks whose
    /// bit is already clear (double free). Must only be called by the owner
    /// of `lane`.
    pub fn free(&self, lane: usize, ptr: NonNull<u8>) {
        if lane >= self.buckets {
            return;
        }

        let lane_base = self.base as usize + self.lane_base_offset(lane);
        let addr = ptr.as_ptr() as usize;
        let Some(offset) = addr.checked_sub(lane_base) else {
            return;
        };
        if offset % self.block_size != 0 {
            return;
        }
        let block = offset / self.block_size;
        if block >= self.blocks_per_bucket {
            return;
        }

        let word = &self.lane_words(lane)[block / WORD_BITS];
        let mask = 1u32 << (block % WORD_BITS);
        let bits = word.load(Ordering::Acquire);
        if bits & mask != 0 {
            word.store(bits & !mask, Ordering::Release);
        }
    }

    /// Number of live (allocated) blocks in `lane`, or `None` when the lane
    /// is out of range. Diagnostic; also the liveness oracle the tests use.
    #[must_use]
    pub fn live_blocks(&self, lane: usize) -> Option<usize> {
        if lane >= self.buckets {
            return None;
        }
        Some(
            self.lane_words(lane)
                .iter()
                .map(|w| w.load(Ordering::Acquire).count_ones() as usize)
                .sum(),
        )
    }

    /// Render the allocation bitmap of `lane` as a `0`/`1` string, one
    /// character per block. Diagnostic.
    #[must_use]
    pub fn dump_lane(&self, lane: usize) -> Option<String> {
        if lane >= self.buckets {
            return None;
        }
        let words = self.lane_words(lane);
        let mut out = String::with_capacity(self.blocks_per_bucket);
        for block in 0..self.blocks_per_bucket {
            let bits = words[block / WORD_BITS].load(Ordering::Acquire);
            out.push(if bits & (1 << (block % WORD_BITS)) != 0 {
                '1'
            } else {
                '0'
            });
        }
        Some(out)
    }
}

impl fmt::Debug for BucketAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketAllocator")
            .field("buckets", &self.buckets)
            .field("block_size", &self.block_size)
            .field("blocks_per_bucket", &self.blocks_per_bucket)
            .finish()
    }
}
