// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The gene pool: population ownership, generation dispatch, dispersal and
//! fitness utilities.
//!
//! A pool is created in one of two modes. [`GenePool::smp`] spawns `W`
//! persistent workers that share the population under the generation
//! barrier; [`GenePool::seq`] keeps a single pseudo-worker (tid 0, slice =
//! the whole population) and iterates inline. Both run the identical
//! five-step generation from [`breed`].
//!
//! Driver-side access to the population (dispersal, fitness utilities, the
//! `solutions` accessor) is safe because running a generation requires
//! `&mut self`: whenever the driver holds the pool, every worker is parked
//! at the gate.

mod breed;
mod params;
mod population;
mod problem;

pub use params::Params;
pub use problem::{Problem, Solution};

use crate::engine::{slice_bounds, ThreadPool, WorkerCtx};
use crate::error::{Error, Result};
use crate::rt::Rand48;
use arc_swap::ArcSwap;
use population::Population;
use std::ops::Range;
use std::sync::Arc;

/// State shared between the driver and the worker threads.
struct Shared<P: Problem> {
    pop: Population<P::Genome>,
    problem: P,
    params: ArcSwap<Params>,
}

/// Execution mode: inline pseudo-worker or persistent thread pool.
enum Exec {
    Seq(WorkerCtx),
    Smp(ThreadPool),
}

/// A population of solutions evolving under a [`Problem`].
///
/// # Example
/// ```
/// use evopool::{GenePool, Params, Problem, Solution, WorkerCtx};
///
/// struct SquareRootOfFive;
///
/// impl Problem for SquareRootOfFive {
///     type Genome = f64;
///     fn init(&self, ctx: &mut WorkerCtx) -> f64 {
///         ctx.rand() * 10.0
///     }
///     fn fitness(&self, x: &mut f64) -> f64 {
///         (*x * *x - 5.0).abs()
///     }
///     fn mutate(&self, p1: &Solution<f64>, p2: &Solution<f64>, ctx: &mut WorkerCtx) -> f64 {
///         let base = if p1.fitness <= p2.fitness { p1.genome } else { p2.genome };
///         base + ctx.rand() * 0.001 - 0.0005
///     }
/// }
///
/// let mut pool = GenePool::seq(200, Params::default(), SquareRootOfFive).unwrap();
/// for _ in 0..100 {
///     pool.iterate();
/// }
/// let avg = pool.avg_fitness();
/// assert!(avg.is_finite());
/// ```
pub struct GenePool<P: Problem> {
    shared: Arc<Shared<P>>,
    exec: Exec,
    slices: Vec<Range<usize>>,
    driver_rng: Rand48,
}

impl<P: Problem> GenePool<P> {
    /// Create an SMP pool: `solutions` slots split across `workers`
    /// persistent threads.
    ///
    /// Requires `solutions >= workers >= 1`. Every slot is initialized via
    /// [`Problem::init`] with the context of its owning worker before the
    /// workers are released, so lane discipline holds from the start.
    pub fn smp(solutions: usize, workers: usize, params: Params, problem: P) -> Result<Self> {
        params.validate()?;
        if workers == 0 || solutions < workers {
            return Err(Error::InvalidGeometry { solutions, workers });
        }

        let slices = slice_bounds(solutions, workers);
        let mut ctxs: Vec<WorkerCtx> = slices
            .iter()
            .enumerate()
            .map(|(tid, s)| WorkerCtx::new(tid, s.clone(), params.seed))
            .collect();

        let slots = init_population(&problem, &mut ctxs);
        let driver_rng = Rand48::new(params.seed);
        let shared = Arc::new(Shared {
            pop: Population::new(slots),
            problem,
            params: ArcSwap::from_pointee(params),
        });

        let workers = ThreadPool::start(ctxs, |_| {
            let shared = Arc::clone(&shared);
            move |ctx: &mut WorkerCtx| {
                let params = shared.params.load();
                // SAFETY: inside a generation this worker exclusively owns
                // its slice; slices are disjoint and within bounds.
                let slice = unsafe { shared.pop.slice_mut(ctx.slice()) };
                breed::run_generation(&shared.problem, &params, slice, ctx);
            }
        })?;

        log::info!(
            "[POOL] smp pool up: {} solutions across {} workers",
            solutions,
            workers.workers()
        );

        Ok(Self {
            shared,
            exec: Exec::Smp(workers),
            slices,
            driver_rng,
        })
    }

    /// Create a sequential pool: one pseudo-worker, no threads.
    pub fn seq(solutions: usize, params: Params, problem: P) -> Result<Self> {
        params.validate()?;
        if solutions == 0 {
            return Err(Error::InvalidGeometry {
                solutions,
                workers: 1,
            });
        }

        let mut ctxs = vec![WorkerCtx::new(0, 0..solutions, params.seed)];
        let slots = init_population(&problem, &mut ctxs);
        let driver_rng = Rand48::new(params.seed);
        let ctx = ctxs.pop().unwrap_or_else(|| unreachable!());

        log::info!("[POOL] sequential pool up: {} solutions", solutions);

        Ok(Self {
            shared: Arc::new(Shared {
                pop: Population::new(slots),
                problem,
                params: ArcSwap::from_pointee(params),
            }),
            exec: Exec::Seq(ctx),
            slices: vec![0..solutions],
            driver_rng,
        })
    }

    /// Run exactly one generation.
    ///
    /// SMP: release the workers through the barrier, capture them, then
    /// disperse. Sequential: run the generation inline over the whole
    /// population.
    pub fn iterate(&mut self) {
        match &mut self.exec {
            Exec::Smp(workers) => {
                workers.run_generation();
                self.disperse();
            }
            Exec::Seq(ctx) => {
                let params = self.shared.params.load();
                // SAFETY: `&mut self` means no other view of the population
                // exists; the single pseudo-worker owns all of it.
                let slice = unsafe { self.shared.pop.all_mut() };
                breed::run_generation(&self.shared.problem, &params, slice, ctx);
            }
        }
    }

    /// Replace the algorithm parameters.
    ///
    /// Takes effect at the next generation (workers snapshot parameters at
    /// generation entry). Seed triples are consumed at creation only;
    /// replacing them does not re-seed the worker streams.
    pub fn set_params(&mut self, params: Params) -> Result<()> {
        params.validate()?;
        self.shared.params.store(Arc::new(params));
        Ok(())
    }

    /// Cross-slice mixing: swap `⌊gene_dispersal · N⌋` random index pairs
    /// across the whole population. Payload contents and fitness move;
    /// allocator-owned pointers stay in place (see [`Problem::swap`]).
    fn disperse(&mut self) {
        let d = self.shared.params.load().gene_dispersal;
        let n = self.shared.pop.len();
        let pairs = (d * n as f64) as usize;
        if pairs == 0 {
            return;
        }

        // SAFETY: every worker is parked at the gate after run_generation,
        // so the driver exclusively owns the whole population.
        let slots = unsafe { self.shared.pop.all_mut() };
        let mut swapped = 0usize;
        for _ in 0..pairs {
            let i = self.driver_rng.next_index(n);
            let j = self.driver_rng.next_index(n);
            if i == j {
                continue;
            }
            let (lo, hi) = if i < j { (i, j) } else { (j, i) };
            let (head, tail) = slots.split_at_mut(hi);
            let (a, b) = (&mut head[lo], &mut tail[0]);
            std::mem::swap(&mut a.fitness, &mut b.fitness);
            self.shared.problem.swap(&mut a.genome, &mut b.genome);
            swapped += 1;
        }
        log::debug!("[POOL] dispersal swapped {} pairs", swapped);
    }

    /// Re-evaluate every slot and return the mean fitness.
    pub fn avg_fitness(&mut self) -> f64 {
        // SAFETY: `&mut self` means workers are parked and no other views live.
        let slots = unsafe { self.shared.pop.all_mut() };
        let mut total = 0.0;
        for sol in slots.iter_mut() {
            sol.fitness = self.shared.problem.fitness(&mut sol.genome);
            total += sol.fitness;
        }
        total / slots.len() as f64
    }

    /// Re-evaluate every slot and log its fitness. Diagnostic.
    pub fn display_fitnesses(&mut self) {
        // SAFETY: `&mut self` means workers are parked and no other views live.
        let slots = unsafe { self.shared.pop.all_mut() };
        for (i, sol) in slots.iter_mut().enumerate() {
            sol.fitness = self.shared.problem.fitness(&mut sol.genome);
            log::info!("[POOL] solution {:5}: fitness={}", i, sol.fitness);
        }
    }

    /// The population, readable between generations. Fitness values are
    /// whatever the last sweep stored.
    #[must_use]
    pub fn solutions(&self) -> &[Solution<P::Genome>] {
        // SAFETY: generations require `&mut self`, so while this shared
        // borrow lives no worker can be inside one.
        unsafe { self.shared.pop.all() }
    }

    /// The slot with the smallest stored fitness.
    #[must_use]
    pub fn best(&self) -> Option<&Solution<P::Genome>> {
        self.solutions()
            .iter()
            .min_by(|a, b| a.fitness.total_cmp(&b.fitness))
    }

    /// The problem definition this pool evolves against.
    #[must_use]
    pub fn problem(&self) -> &P {
        &self.shared.problem
    }

    /// Population size.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.pop.len()
    }

    /// Whether the population is empty (never true for a constructed pool).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.pop.len() == 0
    }

    /// Number of workers (1 for sequential pools).
    #[must_use]
    pub fn workers(&self) -> usize {
        self.slices.len()
    }

    /// The population partition, one slice per worker.
    #[must_use]
    pub fn slices(&self) -> &[Range<usize>] {
        &self.slices
    }

    /// Whether every worker currently reports finished. Always true between
    /// generations; trivially true for sequential pools.
    #[must_use]
    pub fn workers_finished(&self) -> bool {
        match &self.exec {
            Exec::Smp(workers) => workers.all_finished(),
            Exec::Seq(_) => true,
        }
    }

    /// Whether the term-ready latch is raised. Always true after an SMP
    /// generation; trivially true for sequential pools.
    #[must_use]
    pub fn term_ready(&self) -> bool {
        match &self.exec {
            Exec::Smp(workers) => workers.term_ready(),
            Exec::Seq(_) => true,
        }
    }
}

/// Build the initial population on the driver thread, each slot via its
/// owning worker's context.
fn init_population<P: Problem>(
    problem: &P,
    ctxs: &mut [WorkerCtx],
) -> Vec<Solution<P::Genome>> {
    let total = ctxs.last().map_or(0, |c| c.slice().end);
    let mut slots = Vec::with_capacity(total);
    for ctx in ctxs.iter_mut() {
        for _ in ctx.slice() {
            let genome = problem.init(ctx);
            slots.push(Solution::new(genome));
        }
    }
    slots
}
