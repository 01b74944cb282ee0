// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The per-worker generation: sweep, sort, breed, replace.
//!
//! The same routine serves both execution modes: a worker runs it over its
//! slice, the sequential pool runs it over the whole population.

use super::params::Params;
use super::problem::{Problem, Solution};
use crate::engine::WorkerCtx;

/// Run one generation over `slice`.
///
/// 1. Re-evaluate every slot's fitness.
/// 2. Sort the slice ascending (best first).
/// 3. Breed `⌊reproduction_rate · len⌋` children from parents drawn
///    uniformly out of the best `⌊breed_fitness · len⌋` slots, each child
///    replacing a slot at the tail (`victim = len − 1 − (i mod window)`).
///
/// Parents are drawn with a rejection loop so `p1 != p2`; a window of one
/// degenerates to `p1 == p2 == 0`, otherwise the loop could never exit.
/// Children are installed before their predecessor genome is retired, and
/// a retired slot is never read again.
pub(crate) fn run_generation<P: Problem>(
    problem: &P,
    params: &Params,
    slice: &mut [Solution<P::Genome>],
    ctx: &mut WorkerCtx,
) {
    let len = slice.len();
    if len == 0 {
        return;
    }

    for sol in slice.iter_mut() {
        sol.fitness = problem.fitness(&mut sol.genome);
    }

    slice.sort_unstable_by(|a, b| a.fitness.total_cmp(&b.fitness));

    let reproduce = (params.reproduction_rate * len as f64) as usize;
    if reproduce == 0 {
        return;
    }
    // A zero-wide window would leave nothing to breed from; clamp so tiny
    // slices still reproduce from their single best slot.
    let window = ((params.breed_fitness * len as f64) as usize).max(1);

    for i in 0..reproduce {
        let p1 = ctx.rng().next_index(window);
        let p2 = if window < 2 {
            p1
        } else {
            loop {
                let cand = ctx.rng().next_index(window);
                if cand != p1 {
                    break cand;
                }
            }
        };

        let child = Solution::new(problem.mutate(&slice[p1], &slice[p2], ctx));
        let victim = len - 1 - (i % window);
        let old = std::mem::replace(&mut slice[victim], child);
        problem.destroy(old.genome, ctx);
    }
}
