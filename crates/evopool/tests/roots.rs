// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::cast_precision_loss)] // Stats need this
#![allow(clippy::uninlined_format_args)] // Test readability over pedantic

//! Polynomial-root search: x^2 - 3 over a population seeded in [-1, 1].
//!
//! Both roots (+-sqrt(3)) lie *outside* the initial range, so the run only
//! converges if mutation can walk the population out of its seed interval.
//! Convergence = average fitness at or below the per-child variance, the
//! same stopping rule the root-finder tool uses.

use evopool::{GenePool, Params, Problem, Solution, WorkerCtx};

struct Polynomial {
    /// `coeffs[i]` multiplies `x^i`.
    coeffs: Vec<f64>,
    x_min: f64,
    x_max: f64,
    variance: f64,
}

impl Problem for Polynomial {
    type Genome = f64;

    fn init(&self, ctx: &mut WorkerCtx) -> f64 {
        self.x_min + ctx.rand() * (self.x_max - self.x_min)
    }

    fn fitness(&self, x: &mut f64) -> f64 {
        let mut sum = 0.0;
        let mut power = 1.0;
        for &a in &self.coeffs {
            sum += a * power;
            power *= *x;
        }
        sum.abs()
    }

    fn mutate(&self, p1: &Solution<f64>, p2: &Solution<f64>, ctx: &mut WorkerCtx) -> f64 {
        let base = if p1.fitness <= p2.fitness {
            p1.genome
        } else {
            p2.genome
        };
        base + ctx.rand() * self.variance - self.variance / 2.0
    }
}

#[test]
fn finds_root_of_x_squared_minus_three() {
    let variance = 0.01;
    let problem = Polynomial {
        coeffs: vec![-3.0, 0.0, 1.0],
        x_min: -1.0,
        x_max: 1.0,
        variance,
    };
    let params = Params {
        reproduction_rate: 0.25,
        breed_fitness: 0.25,
        gene_dispersal: 0.0,
        seed: [7, 20, 1969],
    };

    let mut pool = GenePool::seq(200, params, problem).unwrap();

    let mut converged_at = None;
    for iteration in 1..=1000 {
        pool.iterate();
        if pool.avg_fitness() <= variance {
            converged_at = Some(iteration);
            break;
        }
    }

    let iterations = converged_at.expect("did not converge within 1000 iterations");
    assert!(iterations >= 1, "converged before any generation ran");

    let sqrt3 = 3.0_f64.sqrt();
    let best = pool.best().expect("population is non-empty");
    let distance = (best.genome.abs() - sqrt3).abs();
    assert!(
        distance < 0.05,
        "best x = {} is not within 0.05 of a root",
        best.genome
    );
}

#[test]
fn linear_polynomial_root() {
    // 2x - 1: root at 0.5, inside the seed range; converges quickly.
    let variance = 0.005;
    let problem = Polynomial {
        coeffs: vec![-1.0, 2.0],
        x_min: -1.0,
        x_max: 1.0,
        variance,
    };
    let mut pool = GenePool::seq(100, Params::default(), problem).unwrap();

    let mut converged = false;
    for _ in 0..500 {
        pool.iterate();
        if pool.avg_fitness() <= variance {
            converged = true;
            break;
        }
    }
    assert!(converged, "linear root search did not converge");

    let best = pool.best().expect("population is non-empty");
    assert!((best.genome - 0.5).abs() < 0.05);
}
