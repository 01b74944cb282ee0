// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # evopool - Parallel evolutionary-search engine
//!
//! Given a problem definition (how to create a candidate solution, score
//! it, and combine two parents into a child), evopool maintains a fixed
//! population that improves under selection and variation, either inline
//! (sequential mode) or across persistent worker threads that share the
//! population (SMP mode).
//!
//! ## Quick Start
//!
//! ```rust
//! use evopool::{GenePool, Params, Problem, Solution, WorkerCtx};
//!
//! struct Sphere;
//!
//! impl Problem for Sphere {
//!     type Genome = f64;
//!     fn init(&self, ctx: &mut WorkerCtx) -> f64 {
//!         ctx.rand() * 2.0 - 1.0
//!     }
//!     fn fitness(&self, x: &mut f64) -> f64 {
//!         *x * *x
//!     }
//!     fn mutate(&self, p1: &Solution<f64>, p2: &Solution<f64>, ctx: &mut WorkerCtx) -> f64 {
//!         (p1.genome + p2.genome) / 2.0 + ctx.rand() * 0.01 - 0.005
//!     }
//! }
//!
//! let mut pool = GenePool::smp(1000, 4, Params::default(), Sphere)?;
//! for _ in 0..50 {
//!     pool.iterate();
//! }
//! println!("avg fitness: {}", pool.avg_fitness());
//! # Ok::<(), evopool::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                        GenePool                              |
//! |   population | params | Problem callbacks | dispersal        |
//! +--------------------------------------------------------------+
//! |                     engine (SMP mode)                        |
//! |   WorkerCtx per worker | gate + term latch barrier           |
//! +--------------------------------------------------------------+
//! |                      rt primitives                           |
//! |   BucketAllocator (per-worker lanes) | Rand48 streams        |
//! +--------------------------------------------------------------+
//! ```
//!
//! Each generation, every worker re-scores its slice of the population,
//! sorts it best-first, and replaces the tail with children bred from the
//! head. The driver then optionally swaps random pairs across slices
//! (dispersal) so the per-worker subpopulations do not drift apart.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`GenePool`] | Owns the population and dispatches generations |
//! | [`Problem`] | User callbacks: init / fitness / mutate / destroy / swap |
//! | [`Params`] | Reproduction rate, breed fitness, dispersal, seed triple |
//! | [`WorkerCtx`] | Per-worker id, slice, and private PRNG stream |
//! | [`BucketAllocator`] | Lane-partitioned fixed-size block pool |
//!
//! ## Memory model seen by callbacks
//!
//! During a generation each worker owns its population slice exclusively;
//! callbacks never observe another worker's solutions. A callback that
//! allocates private payload state should use the worker's lane
//! (`ctx.tid()`) of a [`BucketAllocator`], which makes allocation and
//! free lock-free.

/// Worker orchestration: contexts, partition, barrier-driven thread pool.
pub mod engine;
mod error;
/// The gene pool: population, parameters, generation dispatch.
pub mod pool;
/// Runtime primitives: bucket allocator and rand48 PRNG.
pub mod rt;

pub use engine::{slice_bounds, WorkerCtx};
pub use error::{Error, Result};
pub use pool::{GenePool, Params, Problem, Solution};
pub use rt::{BucketAllocator, Rand48};

/// evopool version string.
pub const VERSION: &str = "0.3.1";
