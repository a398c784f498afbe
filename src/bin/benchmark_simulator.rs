//! Run the 1v1 simulator in a tight loop and optionally append one line to a log file for trend
//! tracking.
//!
//! Usage:
//!   cargo run --release --bin benchmark_simulator
//!   cargo run --release --bin benchmark_simulator -- --log
//!
//! --log  Append one row to benchmark_log.csv (date, battles_per_sec, battles_per_min, ticks_per_sec, ticks_per_battle).

use std::fs::OpenOptions;
use std::io::Write;
use std::process;
use std::time::Instant;

use skirmish::combat::{run_battle, BattleConfig, DamageFormula, Rng, TraceMode, UnitStats};

// Run for at least this long or this many battles
const MIN_DURATION_MS: u128 = 2000;
const MIN_BATTLES: u32 = 500;
const LOG_PATH: &str = "benchmark_log.csv";

fn main() {
    let log = std::env::args().any(|a| a == "--log");

    let unit1 = UnitStats::new("vanguard", 5000.0, 120.0, 30.0, 1.2)
        .with_crit(0.2, 1.8)
        .with_accuracy(0.95);
    let unit2 = UnitStats::new("bulwark", 6000.0, 100.0, 45.0, 1.0)
        .with_crit(0.1, 1.5)
        .with_evasion(0.05);
    let config = BattleConfig::default()
        .with_formula(DamageFormula::Mmorpg)
        .with_trace(TraceMode::Off);
    let ticks_per_battle = config.tick_count();

    let mut rng = Rng::new(7);
    let start = Instant::now();
    let mut battles: u32 = 0;
    let mut simulated_secs = 0.0;
    while start.elapsed().as_millis() < MIN_DURATION_MS || battles < MIN_BATTLES {
        simulated_secs += run_battle(&unit1, &unit2, &config, &mut rng).duration;
        battles += 1;
    }
    let elapsed_secs = start.elapsed().as_secs_f64();

    let battles_per_sec = battles as f64 / elapsed_secs;
    let battles_per_min = battles_per_sec * 60.0;
    let ticks_per_sec = simulated_secs / config.time_step / elapsed_secs;

    println!("Simulator benchmark (up to {} ticks/battle):", ticks_per_battle);
    println!("  Battles:     {}", battles);
    println!("  Duration:    {:.2} s", elapsed_secs);
    println!("  Battles/s:   {:.2}", battles_per_sec);
    println!("  Battles/min: {:.2}", battles_per_min);
    println!("  Ticks/s:     {:.2}", ticks_per_sec);

    if log {
        let date = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let line = format!(
            "{},{:.4},{:.4},{:.4},{}\n",
            date, battles_per_sec, battles_per_min, ticks_per_sec, ticks_per_battle
        );
        if let Err(err) = append_log(&line) {
            eprintln!("failed to append {LOG_PATH}: {err}");
            process::exit(1);
        }
        println!("Appended to {}", LOG_PATH);
    }
}

fn append_log(line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(LOG_PATH)?;
    if file.metadata().map(|m| m.len() == 0).unwrap_or(true) {
        file.write_all(b"date,battles_per_sec,battles_per_min,ticks_per_sec,ticks_per_battle\n")?;
    }
    file.write_all(line.as_bytes())?;
    file.flush()
}
