// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! evopool-mixture - Gaussian-mixture maximum-likelihood estimation.
//!
//! Given a sample file and a description of the expected components, search
//! for the mixture parameters (mean, deviation, weight per component) that
//! maximize the data's likelihood. Runs on the SMP engine; parameter
//! vectors live in a lane-partitioned block pool so workers allocate and
//! retire genomes without locking.
//!
//! ```text
//! evopool-mixture --data samples.txt --norms mixture.txt \
//!     --pop-size 400 --threads 4 --max-iter 500 --converge
//! ```

mod parse;
mod problem;

use clap::Parser;
use evopool::{GenePool, Params};
use problem::MixtureProblem;
use std::path::PathBuf;

/// Fit a mixture of normal distributions to sampled data.
#[derive(Parser, Debug)]
#[command(name = "evopool-mixture")]
#[command(version, about = "Gaussian-mixture MLE via evolutionary search")]
struct Args {
    /// File with one sample value per line
    #[arg(long, short = 'd')]
    data: PathBuf,

    /// File describing the expected components:
    /// `name (mu_min,mu_max) (sigma_min,sigma_max) mu_var sigma_var`
    #[arg(long, short = 'n')]
    norms: PathBuf,

    /// Population size
    #[arg(long, default_value_t = 100)]
    pop_size: usize,

    /// Fraction of each slice replaced by children per generation
    #[arg(long, default_value_t = 0.25)]
    rep_rate: f64,

    /// Fraction of each slice allowed to breed
    #[arg(long, default_value_t = 0.25)]
    breed_fitness: f64,

    /// Fraction of the population swapped across slices after each generation
    #[arg(long, short = 'D', default_value_t = 0.0)]
    dispersal: f64,

    /// Worker thread count
    #[arg(long, short = 't', default_value_t = 1)]
    threads: usize,

    /// Maximum number of generations
    #[arg(long, default_value_t = 100)]
    max_iter: usize,

    /// rand48 seed triple s1,s2,s3
    #[arg(long, value_delimiter = ',', num_args = 3, default_values_t = [7u16, 20, 1969])]
    seed: Vec<u16>,

    /// Print `iteration<TAB>average-fitness` every generation
    #[arg(long)]
    converge: bool,

    /// Print every solution before and after the run
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let norms = parse::read_norms_file(&args.norms)?;
    let samples = parse::read_samples_file(&args.data)?;
    println!(
        "# {} samples, {} expected components, {} worker(s)",
        samples.len(),
        norms.len(),
        args.threads
    );

    let params = Params {
        reproduction_rate: args.rep_rate,
        breed_fitness: args.breed_fitness,
        gene_dispersal: args.dispersal,
        seed: [args.seed[0], args.seed[1], args.seed[2]],
    };

    let problem = MixtureProblem::new(
        norms,
        samples,
        args.threads,
        args.pop_size,
        args.rep_rate,
    )?;

    let mut pool = GenePool::smp(args.pop_size, args.threads, params, problem)?;

    if args.verbose {
        pool.avg_fitness(); // refresh fitness for the dump
        print_population(&pool, "initial");
    }

    let mut iter = 0;
    while iter < args.max_iter {
        pool.iterate();
        iter += 1;

        if args.converge {
            println!("{}\t{}", iter, pool.avg_fitness());
        }
    }

    let avg = pool.avg_fitness();
    println!("# finished after {} generations, avg fitness={}", iter, avg);

    if args.verbose {
        print_population(&pool, "final");
    }

    if let Some(best) = pool.best() {
        println!("# best solution (fitness={}):", best.fitness);
        print_genome(&pool, &best.genome);
    }

    Ok(())
}

fn print_population(pool: &GenePool<MixtureProblem>, label: &str) {
    println!("# {} population:", label);
    for (i, sol) in pool.solutions().iter().enumerate() {
        println!("#  solution {:5}: fitness={}", i, sol.fitness);
    }
}

fn print_genome(pool: &GenePool<MixtureProblem>, genome: &problem::MixtureGenome) {
    let norms = pool.problem().norms();
    for (i, n) in norms.iter().enumerate() {
        println!(
            "#   {:<16} mu={:<12.6} sigma={:<12.6} weight={:.6}",
            n.name,
            genome.mu(i),
            genome.sigma(i),
            genome.weight(i)
        );
    }
}
