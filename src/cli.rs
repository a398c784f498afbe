use std::error::Error;
use std::io;

use serde::Serialize;

use crate::analysis::monte_carlo::{
    run_monte_carlo_parallel, run_team_monte_carlo_parallel, SimulationResult, TeamSimulationResult,
};
use crate::combat::export_csv::{
    write_battle_log_csv, write_histogram_csv, write_team_units_csv,
};
use crate::combat::{apply_synergies, simulate_battle, simulate_team_battle, Rng};
use crate::error::SimError;
use crate::parallel::WorkerPool;
use crate::scenario::{load_scenario, validate_scenario, Scenario};

const USAGE: &str = "usage: skirmish <duel|team|simulate|validate> <scenario.json|yaml> \
[--runs N] [--seed N] [--workers N] [--csv] [--table]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Duel,
    Team,
    Simulate,
    Validate,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("duel") => Some(Command::Duel),
        Some("team") => Some(Command::Team),
        Some("simulate") => Some(Command::Simulate),
        Some("validate") => Some(Command::Validate),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub path: String,
    pub runs: Option<usize>,
    pub seed: Option<u64>,
    pub workers: usize,
    pub format: OutputFormat,
}

/// Parses everything after the command name. Errors are usage messages.
pub fn parse_options(args: &[String]) -> Result<Options, String> {
    let mut path = None;
    let mut runs = None;
    let mut seed = None;
    let mut workers = 0;
    let mut format = OutputFormat::Json;

    let mut rest = args.iter().skip(2);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--runs" => runs = Some(parse_flag_value(rest.next(), "runs")?),
            "--seed" => seed = Some(parse_flag_value(rest.next(), "seed")?),
            "--workers" => workers = parse_flag_value(rest.next(), "workers")?,
            "--csv" => format = OutputFormat::Csv,
            "--table" => format = OutputFormat::Table,
            flag if flag.starts_with("--") => return Err(format!("unknown flag '{flag}'")),
            value if path.is_none() => path = Some(value.to_string()),
            value => return Err(format!("unexpected argument '{value}'")),
        }
    }

    Ok(Options {
        path: path.ok_or_else(|| "missing scenario path".to_string())?,
        runs,
        seed,
        workers,
        format,
    })
}

fn parse_flag_value<T: std::str::FromStr>(raw: Option<&String>, name: &str) -> Result<T, String> {
    let value = raw.ok_or_else(|| format!("--{name} needs a value"))?;
    value
        .parse::<T>()
        .map_err(|_| format!("invalid {name} '{value}'"))
}

pub fn run_with_args(args: &[String]) -> i32 {
    let Some(command) = parse_command(args) else {
        eprintln!("{USAGE}");
        return 2;
    };
    let options = match parse_options(args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("{USAGE}");
            return 2;
        }
    };
    let scenario = match load_scenario(&options.path) {
        Ok(scenario) => scenario,
        Err(err) => {
            eprintln!("{}", describe(&err));
            return 1;
        }
    };

    match command {
        Command::Duel => handle_duel(&scenario, &options),
        Command::Team => handle_team(&scenario, &options),
        Command::Simulate => handle_simulate(scenario, &options),
        Command::Validate => handle_validate(&scenario, &options),
    }
}

fn handle_duel(scenario: &Scenario, options: &Options) -> i32 {
    let Scenario::Duel(duel) = scenario else {
        eprintln!("'{}' is not a duel scenario", options.path);
        return 2;
    };
    let mut rng = seeded_rng(options.seed.or(duel.monte_carlo.seed));
    let result = match simulate_battle(&duel.unit1, &duel.unit2, &duel.battle, &mut rng) {
        Ok(result) => result,
        Err(err) => return report_failure("duel", &err),
    };

    match options.format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Csv => finish_csv(write_battle_log_csv(io::stdout().lock(), &result.log)),
        OutputFormat::Table => {
            println!("winner\tduration\tunit1_hp\tunit2_hp\tunit1_damage\tunit2_damage");
            println!(
                "{:?}\t{:.2}\t{:.1}\t{:.1}\t{:.1}\t{:.1}",
                result.winner,
                result.duration,
                result.unit1_final_hp,
                result.unit2_final_hp,
                result.unit1_total_damage(),
                result.unit2_total_damage()
            );
            0
        }
    }
}

fn handle_team(scenario: &Scenario, options: &Options) -> i32 {
    let Scenario::Team(team) = scenario else {
        eprintln!("'{}' is not a team scenario", options.path);
        return 2;
    };
    let team1 = apply_synergies(&team.team1, &team.team1_synergies);
    let team2 = apply_synergies(&team.team2, &team.team2_synergies);
    let mut rng = seeded_rng(options.seed.or(team.monte_carlo.seed));
    let result = match simulate_team_battle(&team1, &team2, &team.battle, team.targeting, &mut rng) {
        Ok(result) => result,
        Err(err) => return report_failure("team battle", &err),
    };

    match options.format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Csv => finish_csv(write_battle_log_csv(io::stdout().lock(), &result.log)),
        OutputFormat::Table => {
            println!("id\tteam\tdamage_dealt\tdamage_taken\tkills\tsurvived");
            for unit in &result.units {
                println!(
                    "{}\t{}\t{:.1}\t{:.1}\t{}\t{}",
                    unit.id, unit.team, unit.damage_dealt, unit.damage_taken, unit.kills, unit.survived
                );
            }
            0
        }
    }
}

fn handle_simulate(mut scenario: Scenario, options: &Options) -> i32 {
    let config = scenario.monte_carlo_mut();
    if let Some(runs) = options.runs {
        config.runs = runs;
    }
    if options.seed.is_some() {
        config.seed = options.seed;
    }
    let pool = WorkerPool::with_workers(options.workers);

    match &scenario {
        Scenario::Duel(duel) => {
            match run_monte_carlo_parallel(&duel.unit1, &duel.unit2, &duel.battle, &duel.monte_carlo, &pool) {
                Ok(result) => emit_duel_summary(&result, options.format),
                Err(err) => report_failure("simulation", &err),
            }
        }
        Scenario::Team(team) => {
            match run_team_monte_carlo_parallel(&team.matchup(), &team.monte_carlo, &pool) {
                Ok(result) => emit_team_summary(&result, options.format),
                Err(err) => report_failure("simulation", &err),
            }
        }
    }
}

fn emit_duel_summary(result: &SimulationResult, format: OutputFormat) -> i32 {
    match format {
        OutputFormat::Json => print_json(result),
        OutputFormat::Csv => finish_csv(write_histogram_csv(io::stdout().lock(), &result.duration_histogram)),
        OutputFormat::Table => {
            println!("unit\twin_rate\tci_low\tci_high\tavg_damage\tavg_dps\ttheoretical_dps\tttk_median");
            for unit in [&result.unit1, &result.unit2] {
                println!(
                    "{}\t{:.4}\t{:.4}\t{:.4}\t{:.1}\t{:.2}\t{:.2}\t{:.2}",
                    unit.id,
                    unit.win_rate,
                    unit.win_rate_ci.lower,
                    unit.win_rate_ci.upper,
                    unit.avg_damage,
                    unit.avg_dps,
                    unit.theoretical_dps,
                    unit.ttk.median
                );
            }
            println!("draw\t{:.4}", result.draw_rate);
            0
        }
    }
}

fn emit_team_summary(result: &TeamSimulationResult, format: OutputFormat) -> i32 {
    match format {
        OutputFormat::Json => print_json(result),
        OutputFormat::Csv => finish_csv(write_team_units_csv(io::stdout().lock(), &result.units)),
        OutputFormat::Table => {
            println!("side\twin_rate\tci_low\tci_high\tavg_survivors\tavg_damage");
            println!(
                "team1\t{:.4}\t{:.4}\t{:.4}\t{:.2}\t{:.1}",
                result.team1_win_rate,
                result.team1_win_rate_ci.lower,
                result.team1_win_rate_ci.upper,
                result.avg_team1_survivors,
                result.avg_team1_damage
            );
            println!(
                "team2\t{:.4}\t{:.4}\t{:.4}\t{:.2}\t{:.1}",
                result.team2_win_rate,
                result.team2_win_rate_ci.lower,
                result.team2_win_rate_ci.upper,
                result.avg_team2_survivors,
                result.avg_team2_damage
            );
            println!("draw\t{:.4}", result.draw_rate);
            0
        }
    }
}

fn handle_validate(scenario: &Scenario, options: &Options) -> i32 {
    let report = validate_scenario(scenario);
    for diagnostic in &report.diagnostics {
        eprintln!("- {diagnostic}");
    }
    if report.has_errors() {
        eprintln!(
            "validation failed: {} error(s), {} warning(s)",
            report.errors().count(),
            report.warnings().count()
        );
        1
    } else {
        println!(
            "validation passed: {} ({} warning(s))",
            options.path,
            report.warnings().count()
        );
        0
    }
}

fn seeded_rng(seed: Option<u64>) -> Rng {
    seed.map_or_else(Rng::from_entropy, Rng::new)
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize result: {err}");
            1
        }
    }
}

fn finish_csv(outcome: crate::error::Result<()>) -> i32 {
    match outcome {
        Ok(()) => 0,
        Err(err) => report_failure("csv export", &err),
    }
}

fn report_failure(what: &str, err: &SimError) -> i32 {
    eprintln!("{what} failed: {}", describe(err));
    1
}

/// The error message followed by its source chain.
fn describe(err: &SimError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
