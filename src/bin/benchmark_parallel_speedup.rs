//! Run the same seeded Monte Carlo batch sequentially and in parallel, then print timings and
//! speedup.
//!
//! Usage: cargo run --release --bin benchmark_parallel_speedup [-- --workers N]

use std::process;
use std::time::Instant;

use skirmish::analysis::{run_monte_carlo, run_monte_carlo_parallel, MonteCarloConfig};
use skirmish::combat::{BattleConfig, DamageFormula, UnitStats};
use skirmish::parallel::WorkerPool;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let workers = args
        .iter()
        .position(|a| a == "--workers")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);

    let unit1 = UnitStats::new("duelist", 2400.0, 90.0, 20.0, 1.5)
        .with_crit(0.25, 2.0)
        .with_accuracy(0.9);
    let unit2 = UnitStats::new("sentinel", 3000.0, 75.0, 35.0, 1.1)
        .with_crit(0.1, 1.5)
        .with_evasion(0.15);
    let battle = BattleConfig::default().with_formula(DamageFormula::Random);
    let config = MonteCarloConfig::default().with_runs(20_000).with_seed(12345);
    let pool = WorkerPool::with_workers(workers);

    println!(
        "Monte Carlo: {} runs ({} vs {}, {} workers)",
        config.runs,
        unit1.id,
        unit2.id,
        pool.effective_workers()
    );
    println!();

    let t0 = Instant::now();
    let sequential = match run_monte_carlo(&unit1, &unit2, &battle, &config) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("sequential run failed: {err}");
            process::exit(1);
        }
    };
    let elapsed_seq = t0.elapsed();
    let seq_ms = elapsed_seq.as_secs_f64() * 1000.0;
    println!("Sequential:  {:.2} ms  ({:.1} sims/s)", seq_ms, config.runs as f64 / elapsed_seq.as_secs_f64());

    let t0 = Instant::now();
    let parallel = match run_monte_carlo_parallel(&unit1, &unit2, &battle, &config, &pool) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("parallel run failed: {err}");
            process::exit(1);
        }
    };
    let elapsed_par = t0.elapsed();
    let par_ms = elapsed_par.as_secs_f64() * 1000.0;
    println!("Parallel:    {:.2} ms  ({:.1} sims/s)", par_ms, config.runs as f64 / elapsed_par.as_secs_f64());

    println!();
    println!("Speedup:     {:.2}x faster (parallel vs sequential)", seq_ms / par_ms);

    assert_eq!(sequential.unit1_wins, parallel.unit1_wins, "unit1 wins mismatch");
    assert_eq!(sequential.draws, parallel.draws, "draw count mismatch");
    assert_eq!(sequential.duration_histogram, parallel.duration_histogram, "histogram mismatch");
    println!("(Results match sequential vs parallel)");
}
