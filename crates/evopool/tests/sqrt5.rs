// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::cast_precision_loss)] // Stats need this
#![allow(clippy::float_cmp)] // Test assertions with constants
#![allow(clippy::uninlined_format_args)] // Test readability over pedantic

//! Sequential square-root-of-five search.
//!
//! The classic smoke test: minimize |x^2 - 5| over a population of 200 with
//! a tiny breeder window (top 2) and two children per generation. The run
//! must push the population average below 1e-2 and land at least one slot
//! within 1e-2 of sqrt(5).

use evopool::{GenePool, Params, Problem, Solution, WorkerCtx};

const VARIANCE: f64 = 0.0005;

struct SqrtFive;

impl Problem for SqrtFive {
    type Genome = f64;

    fn init(&self, ctx: &mut WorkerCtx) -> f64 {
        ctx.rand() * 10.0
    }

    fn fitness(&self, x: &mut f64) -> f64 {
        (*x * *x - 5.0).abs()
    }

    fn mutate(&self, p1: &Solution<f64>, p2: &Solution<f64>, ctx: &mut WorkerCtx) -> f64 {
        let base = if p1.fitness <= p2.fitness {
            p1.genome
        } else {
            p2.genome
        };
        base + ctx.rand() * VARIANCE - VARIANCE / 2.0
    }
}

#[test]
fn sequential_sqrt5_converges() {
    let params = Params {
        reproduction_rate: 0.01,
        breed_fitness: 0.01,
        gene_dispersal: 0.0,
        seed: [2674, 1507, 5555],
    };

    let mut pool = GenePool::seq(200, params, SqrtFive).unwrap();

    let initial = pool.avg_fitness();

    // Two children per generation walk the population toward sqrt(5); the
    // cap leaves room for an unlucky initial draw far from the root.
    let mut avg = initial;
    let mut generations = 0;
    while generations < 2000 {
        pool.iterate();
        generations += 1;
        if generations % 25 == 0 {
            avg = pool.avg_fitness();
            if avg < 1e-2 {
                break;
            }
        }
    }

    assert!(avg < initial, "no improvement at all: {} -> {}", initial, avg);
    assert!(
        avg < 1e-2,
        "average fitness stuck at {} after {} generations",
        avg,
        generations
    );

    let sqrt5 = 5.0_f64.sqrt();
    let closest = pool
        .solutions()
        .iter()
        .map(|s| (s.genome - sqrt5).abs())
        .fold(f64::INFINITY, f64::min);
    assert!(closest < 1e-2, "closest |x - sqrt(5)| = {}", closest);
}

#[test]
fn sequential_run_is_reproducible() {
    let run = || {
        let params = Params {
            reproduction_rate: 0.01,
            breed_fitness: 0.01,
            gene_dispersal: 0.0,
            seed: [2674, 1507, 5555],
        };
        let mut pool = GenePool::seq(200, params, SqrtFive).unwrap();
        for _ in 0..50 {
            pool.iterate();
        }
        pool.avg_fitness()
    };
    assert_eq!(run(), run());
}
