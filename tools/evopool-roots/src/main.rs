// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! evopool-roots - polynomial root search on the sequential engine.
//!
//! Minimizes `|a0 + a1*x + a2*x^2 + ... + an*x^n|` over a population of
//! candidate x values. Obviously a closed-form problem; the point is a
//! small, observable workload for the engine.
//!
//! ```text
//! evopool-roots --coeff=-3,0,1 --pop-size=200 --max-iter=1000 --converge
//! ```

use clap::Parser;
use evopool::{GenePool, Params, Problem, Solution, WorkerCtx};

/// Search for real roots of a polynomial with an evolutionary population.
#[derive(Parser, Debug)]
#[command(name = "evopool-roots")]
#[command(version, about = "Find polynomial roots with evolutionary search")]
struct Args {
    /// Coefficients a0,a1,...,an of a0 + a1*x + ... + an*x^n
    #[arg(long, value_delimiter = ',', required = true, allow_hyphen_values = true)]
    coeff: Vec<f64>,

    /// Lower bound of the initial population range
    #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
    x_min: f64,

    /// Upper bound of the initial population range
    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    x_max: f64,

    /// Population size
    #[arg(long, default_value_t = 200)]
    pop_size: usize,

    /// Fraction of the population replaced by children each generation
    #[arg(long, default_value_t = 0.25)]
    rep_rate: f64,

    /// Fraction of the population allowed to breed
    #[arg(long, default_value_t = 0.25)]
    breed_fitness: f64,

    /// Maximum number of generations
    #[arg(long, default_value_t = 1000)]
    max_iter: usize,

    /// Width of the uniform perturbation applied to each child
    #[arg(long, default_value_t = 0.001)]
    variance: f64,

    /// rand48 seed triple s1,s2,s3
    #[arg(long, value_delimiter = ',', num_args = 3, default_values_t = [7u16, 20, 1969])]
    seed: Vec<u16>,

    /// Stop once the average fitness drops to the variance
    #[arg(long)]
    converge: bool,

    /// Print the population before and after the run
    #[arg(long, short)]
    verbose: bool,
}

/// The objective: |p(x)|, with children bred from the better parent.
struct RootSearch {
    coeffs: Vec<f64>,
    x_min: f64,
    x_max: f64,
    variance: f64,
}

impl Problem for RootSearch {
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

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    if args.coeff.iter().all(|&a| a == 0.0) {
        return Err("all coefficients are zero; every x is a root".into());
    }
    if args.x_max <= args.x_min {
        return Err(format!("empty range [{}, {}]", args.x_min, args.x_max).into());
    }

    println!("# solving {} for |p(x)| = 0", format_poly(&args.coeff));
    println!("#   population: {}", args.pop_size);
    println!("#   range:      [{}, {}]", args.x_min, args.x_max);
    println!("#   rep-rate:   {}", args.rep_rate);
    println!("#   breed-fit:  {}", args.breed_fitness);
    println!("#   variance:   {}", args.variance);
    println!("#   max-iter:   {}", args.max_iter);

    let params = Params {
        reproduction_rate: args.rep_rate,
        breed_fitness: args.breed_fitness,
        gene_dispersal: 0.0,
        seed: [args.seed[0], args.seed[1], args.seed[2]],
    };
    let problem = RootSearch {
        coeffs: args.coeff.clone(),
        x_min: args.x_min,
        x_max: args.x_max,
        variance: args.variance,
    };

    let mut pool = GenePool::seq(args.pop_size, params, problem)?;

    if args.verbose {
        print_population(&mut pool, "initial");
    }

    let mut iterations = 0;
    while iterations < args.max_iter {
        pool.iterate();
        iterations += 1;

        if args.converge {
            let avg = pool.avg_fitness();
            if avg <= args.variance {
                println!("# converged after {} iterations: avg fitness={}", iterations, avg);
                break;
            }
            log::debug!("[ROOTS] iteration {}: avg fitness={}", iterations, avg);
        }
    }

    let avg = pool.avg_fitness();
    let best = pool.best().ok_or("empty population")?;
    println!("# done after {} iterations, avg fitness={}", iterations, avg);
    println!("# best: x = {:<12.8} |p(x)| = {:.3e}", best.genome, best.fitness);

    if args.verbose {
        print_population(&mut pool, "final");
    }

    Ok(())
}

fn print_population(pool: &mut GenePool<RootSearch>, label: &str) {
    println!("# {} population:", label);
    pool.avg_fitness(); // refresh fitness values
    for (i, sol) in pool.solutions().iter().enumerate() {
        println!(
            "#   {:6}: x = {:<12.6} fitness = {:.6}",
            i, sol.genome, sol.fitness
        );
    }
}

fn format_poly(coeffs: &[f64]) -> String {
    let terms: Vec<String> = coeffs
        .iter()
        .enumerate()
        .filter(|(_, &a)| a != 0.0)
        .map(|(i, a)| match i {
            0 => format!("{}", a),
            1 => format!("{}*x", a),
            _ => format!("{}*x^{}", a, i),
        })
        .collect();
    terms.join(" + ")
}
