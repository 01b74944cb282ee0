// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The mixture-estimation problem: genomes hold their parameter vectors in
//! lane-allocated blocks.
//!
//! Each genome owns one block of `3k` doubles (`mu[0..k]`, `sigma[k..2k]`,
//! `weight[2k..3k]`) inside a [`BucketAllocator`], allocated from the lane
//! of the worker that created it and returned there when the genome is
//! retired. Dispersal must therefore *deep-swap* parameter values rather
//! than exchange blocks, which is exactly what the [`Problem::swap`]
//! override does. Blocks still held when the pool tears down are reclaimed
//! wholesale when the allocator itself drops.
//!
//! Fitness is `FITNESS_CEILING - log-likelihood`, cached in the genome until
//! it is rebuilt, so the engine's repeated sweeps stay cheap.

use evopool::{BucketAllocator, Problem, Solution, WorkerCtx};
use std::ptr::NonNull;
use std::sync::Arc;

/// Everything above this is "worse than anything the data can produce";
/// fitness is the distance of the log-likelihood below this ceiling, which
/// turns likelihood maximization into the engine's minimization.
pub const FITNESS_CEILING: f64 = 1.0e12;

/// Width of the window used to shift probability mass between components.
pub const PROB_VAR: f64 = 0.01;

/// 1 / sqrt(2*pi), the unit-normal PDF normalization.
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// One expected component of the mixture: search ranges for its mean and
/// deviation plus per-generation perturbation windows.
#[derive(Debug, Clone)]
pub struct Normal {
    pub name: String,
    pub mu_min: f64,
    pub mu_max: f64,
    pub sigma_min: f64,
    pub sigma_max: f64,
    pub mu_var: f64,
    pub sigma_var: f64,
}

/// A candidate parameterization of the mixture. The parameter vector lives
/// in an allocator block; the struct itself is plain data the engine moves
/// freely.
pub struct MixtureGenome {
    /// `3 * components` doubles: means, deviations, weights.
    theta: NonNull<f64>,
    components: usize,
    /// Lane the block came from; matches the owning worker's tid while the
    /// genome is inside a generation.
    lane: usize,
    /// Cached-fitness flag: cleared whenever the parameters change.
    solved: bool,
    mle: f64,
}

// SAFETY: the genome exclusively owns its block (the allocator bitmap bit
// stays set until destroy), so moving the struct across threads moves that
// exclusive ownership with it. Cross-thread hand-over only happens through
// the engine's generation barrier.
unsafe impl Send for MixtureGenome {}

impl MixtureGenome {
    #[inline]
    fn theta(&self) -> &[f64] {
        // SAFETY: the block holds 3*components f64s, exclusively ours.
        unsafe { std::slice::from_raw_parts(self.theta.as_ptr(), 3 * self.components) }
    }

    #[inline]
    fn theta_mut(&mut self) -> &mut [f64] {
        // SAFETY: as above, and &mut self guarantees unique access.
        unsafe { std::slice::from_raw_parts_mut(self.theta.as_ptr(), 3 * self.components) }
    }

    #[inline]
    pub fn mu(&self, i: usize) -> f64 {
        self.theta()[i]
    }

    #[inline]
    pub fn sigma(&self, i: usize) -> f64 {
        self.theta()[self.components + i]
    }

    #[inline]
    pub fn weight(&self, i: usize) -> f64 {
        self.theta()[2 * self.components + i]
    }
}

/// The problem definition shared by all workers.
pub struct MixtureProblem {
    norms: Vec<Normal>,
    samples: Vec<f64>,
    blocks: Arc<BucketAllocator>,
}

impl MixtureProblem {
    /// Build the problem and size the parameter-block pool the way the
    /// engine will use it: steady-state population plus twice the
    /// per-generation child headroom, split across lanes; the last lane
    /// absorbs the partition remainder.
    pub fn new(
        norms: Vec<Normal>,
        samples: Vec<f64>,
        workers: usize,
        pop_size: usize,
        rep_rate: f64,
    ) -> evopool::Result<Self> {
        if workers == 0 || pop_size < workers {
            return Err(evopool::Error::InvalidGeometry {
                solutions: pop_size,
                workers,
            });
        }
        let children = (rep_rate * pop_size as f64) as usize;
        let per_lane = (pop_size + 2 * children).div_ceil(workers) + pop_size % workers;
        let block_size = 3 * norms.len() * std::mem::size_of::<f64>();
        let blocks = Arc::new(BucketAllocator::new(workers, block_size, per_lane)?);

        log::info!(
            "[MIXTURE] parameter pool: {} lanes x {} blocks x {} bytes",
            workers,
            per_lane,
            block_size
        );

        Ok(Self {
            norms,
            samples,
            blocks,
        })
    }

    pub fn norms(&self) -> &[Normal] {
        &self.norms
    }

    pub fn allocator(&self) -> &Arc<BucketAllocator> {
        &self.blocks
    }

    fn components(&self) -> usize {
        self.norms.len()
    }

    /// Take one block from `lane` for a fresh parameter vector.
    fn alloc_theta(&self, lane: usize) -> NonNull<f64> {
        self.blocks
            .alloc(lane)
            .expect("mixture parameter pool exhausted; lane sized too small")
            .cast::<f64>()
    }

    /// Weighted mixture density at one sample point.
    fn density(&self, genome: &MixtureGenome, x: f64) -> f64 {
        let k = self.components();
        let mut sum = 0.0;
        for i in 0..k {
            let sigma = genome.sigma(i).abs();
            let z = (x - genome.mu(i)) / sigma;
            sum += genome.weight(i) * INV_SQRT_2PI * (-0.5 * z * z).exp() / sigma;
        }
        sum
    }
}

impl Problem for MixtureProblem {
    type Genome = MixtureGenome;

    fn init(&self, ctx: &mut WorkerCtx) -> MixtureGenome {
        let k = self.components();
        let lane = ctx.tid();
        let theta = self.alloc_theta(lane);
        let mut genome = MixtureGenome {
            theta,
            components: k,
            lane,
            solved: false,
            mle: 0.0,
        };

        for i in 0..k {
            let n = &self.norms[i];
            let mu = n.mu_min + ctx.rand() * (n.mu_max - n.mu_min);
            let sigma = n.sigma_min + ctx.rand() * (n.sigma_max - n.sigma_min);
            let t = genome.theta_mut();
            t[i] = mu;
            t[k + i] = sigma;
            t[2 * k + i] = 1.0 / k as f64;
        }
        genome
    }

    fn fitness(&self, genome: &mut MixtureGenome) -> f64 {
        if genome.solved {
            return genome.mle;
        }

        let mut loglik = 0.0;
        for &x in &self.samples {
            loglik += self.density(genome, x).ln();
        }

        genome.solved = true;
        genome.mle = FITNESS_CEILING - loglik;
        genome.mle
    }

    fn mutate(
        &self,
        p1: &Solution<MixtureGenome>,
        p2: &Solution<MixtureGenome>,
        ctx: &mut WorkerCtx,
    ) -> MixtureGenome {
        let k = self.components();
        let lane = ctx.tid();
        let theta = self.alloc_theta(lane);
        let mut child = MixtureGenome {
            theta,
            components: k,
            lane,
            solved: false,
            mle: 0.0,
        };

        // Single-point crossover on means and deviations. Weights are taken
        // wholesale from parent 1; crossing them over unbalances the sum.
        let cpoint = ctx.rng().next_index(k);
        let (g1, g2) = (&p1.genome, &p2.genome);
        {
            let t = child.theta_mut();
            for i in 0..k {
                let from = if i < cpoint { g1 } else { g2 };
                t[i] = from.mu(i);
                t[k + i] = from.sigma(i);
                t[2 * k + i] = g1.weight(i);
            }
        }

        // Windowed perturbation of every component.
        for i in 0..k {
            let n = &self.norms[i];
            let d_mu = ctx.rand() * n.mu_var - n.mu_var / 2.0;
            let d_sigma = ctx.rand() * n.sigma_var - n.sigma_var / 2.0;
            let t = child.theta_mut();
            t[i] += d_mu;
            t[k + i] += d_sigma;
        }

        // One probability-mass shift per child; the weights must keep
        // summing to one, so mass moves between exactly two components.
        if k > 1 {
            let d_prob = ctx.rand() * PROB_VAR - PROB_VAR / 2.0;
            let plus = ctx.rng().next_index(k);
            let minus = loop {
                let cand = ctx.rng().next_index(k);
                if cand != plus {
                    break cand;
                }
            };
            let t = child.theta_mut();
            t[2 * k + plus] += d_prob;
            t[2 * k + minus] -= d_prob;
        }

        child
    }

    fn destroy(&self, genome: MixtureGenome, _ctx: &mut WorkerCtx) {
        self.blocks.free(genome.lane, genome.theta.cast());
    }

    fn swap(&self, left: &mut MixtureGenome, right: &mut MixtureGenome) {
        // Deep swap: exchange parameter *values* and the fitness cache, but
        // leave each block in its home lane.
        left.theta_mut().swap_with_slice(right.theta_mut());
        std::mem::swap(&mut left.solved, &mut right.solved);
        std::mem::swap(&mut left.mle, &mut right.mle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evopool::{GenePool, Params};

    fn two_component_norms() -> Vec<Normal> {
        vec![
            Normal {
                name: "left".into(),
                mu_min: -1.0,
                mu_max: 1.0,
                sigma_min: 0.2,
                sigma_max: 1.5,
                mu_var: 0.01,
                sigma_var: 0.01,
            },
            Normal {
                name: "right".into(),
                mu_min: 3.0,
                mu_max: 5.0,
                sigma_min: 0.2,
                sigma_max: 1.5,
                mu_var: 0.01,
                sigma_var: 0.01,
            },
        ]
    }

    /// Deterministic two-bump sample set around 0 and 4.
    fn synthetic_samples() -> Vec<f64> {
        let mut samples = Vec::new();
        for i in 0..40 {
            samples.push((i as f64 / 40.0 - 0.5) * 0.8);
            samples.push(4.0 + (i as f64 / 40.0 - 0.5) * 0.8);
        }
        samples
    }

    fn params() -> Params {
        Params {
            reproduction_rate: 0.25,
            breed_fitness: 0.25,
            gene_dispersal: 0.1,
            seed: [7, 20, 1969],
        }
    }

    #[test]
    fn test_block_liveness_tracks_population() {
        let problem =
            MixtureProblem::new(two_component_norms(), synthetic_samples(), 2, 40, 0.25).unwrap();
        let blocks = Arc::clone(problem.allocator());

        let mut pool = GenePool::smp(40, 2, params(), problem).unwrap();

        let live = |alloc: &BucketAllocator| -> usize {
            (0..alloc.buckets()).map(|l| alloc.live_blocks(l).unwrap()).sum()
        };
        assert_eq!(live(&blocks), 40, "init allocates one block per slot");

        for _ in 0..10 {
            pool.iterate();
            // Every child allocation is matched by a victim free.
            assert_eq!(live(&blocks), 40, "block leak or double free");
        }
    }

    #[test]
    fn test_fitness_improves_on_synthetic_mixture() {
        let problem =
            MixtureProblem::new(two_component_norms(), synthetic_samples(), 2, 60, 0.25).unwrap();
        let mut pool = GenePool::smp(60, 2, params(), problem).unwrap();

        let initial = pool.avg_fitness();
        for _ in 0..40 {
            pool.iterate();
        }
        let final_avg = pool.avg_fitness();
        assert!(
            final_avg < initial,
            "no improvement: {} -> {}",
            initial,
            final_avg
        );
        // Sanity: fitness stays in the ceiling-relative regime.
        assert!(final_avg < FITNESS_CEILING * 1.01);
    }

    #[test]
    fn test_deep_swap_leaves_blocks_in_place() {
        let problem =
            MixtureProblem::new(two_component_norms(), synthetic_samples(), 2, 4, 0.25).unwrap();

        let mut ctx0 = test_ctx(0);
        let mut ctx1 = test_ctx(1);
        let mut a = problem.init(&mut ctx0);
        let mut b = problem.init(&mut ctx1);

        let (a_ptr, b_ptr) = (a.theta, b.theta);
        let (a_mu, b_mu) = (a.mu(0), b.mu(0));

        problem.swap(&mut a, &mut b);

        assert_eq!(a.theta, a_ptr, "swap moved a's block");
        assert_eq!(b.theta, b_ptr, "swap moved b's block");
        assert_eq!(a.mu(0), b_mu);
        assert_eq!(b.mu(0), a_mu);
    }

    #[test]
    fn test_fitness_is_cached_until_rebuilt() {
        let problem =
            MixtureProblem::new(two_component_norms(), synthetic_samples(), 1, 4, 0.25).unwrap();
        let mut ctx = test_ctx(0);
        let mut g = problem.init(&mut ctx);

        let first = problem.fitness(&mut g);
        let second = problem.fitness(&mut g);
        assert_eq!(first, second);
        assert!(g.solved);
    }

    /// Standalone contexts for driver-side callback tests; lane = tid.
    fn test_ctx(tid: usize) -> WorkerCtx {
        WorkerCtx::new(tid, 0..4, [11, 12, 13])
    }
}
