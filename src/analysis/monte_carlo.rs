//! Repeated-battle aggregation for 1v1 duels and team matchups.
//!
//! Every run `i` draws from its own RNG seeded with `derive_seed(base_seed, i)`, so the same seed
//! gives the same counts, histograms and order statistics whether runs execute sequentially or on
//! a Rayon pool. Runs are grouped into chunks; cancellation is checked and progress reported
//! between chunks. Partial tallies are folded per worker and merged, and only the first
//! `sample_size` battles are kept whole.
//!
//! Durations, damage totals and kill times are kept as one `f64` per run so histograms span the
//! observed range and percentiles are exact. That memory grows linearly with `runs` (8 bytes per
//! run per series); battle logs and whole results stay bounded by `sample_size`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::analytical::theoretical_dps;
use crate::analysis::statistics::{
    histogram, wilson_interval, ConfidenceInterval, ConfidenceLevel, DistributionSummary,
    HistogramBin, RangeSummary, RunningStats, DEFAULT_HISTOGRAM_BINS,
};
use crate::combat::engine::{run_battle, validate_duel, BattleResult, BattleWinner};
use crate::combat::rng::{entropy_seed, Rng};
use crate::combat::stats::{BattleConfig, Synergy, TargetingMode, TeamSide, TraceMode, UnitStats};
use crate::combat::synergy::{active_synergies, apply_synergies};
use crate::combat::team::{run_team_battle, validate_rosters, TeamBattleResult, TeamWinner};
use crate::error::{Result, SimError};
use crate::parallel::{chunk_ranges, CancellationToken, Progress, WorkerPool};

pub const DEFAULT_RUNS: usize = 1000;
pub const DEFAULT_SAMPLE_SIZE: usize = 10;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub runs: usize,
    pub confidence: ConfidenceLevel,
    pub histogram_bins: usize,
    /// Battles kept whole (with their log) in the result.
    pub sample_size: usize,
    /// Runs between cancellation checks and progress callbacks.
    pub chunk_size: usize,
    /// Base seed. `None` draws one from OS entropy.
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            runs: DEFAULT_RUNS,
            confidence: ConfidenceLevel::default(),
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            sample_size: DEFAULT_SAMPLE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            seed: None,
        }
    }
}

impl MonteCarloConfig {
    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SimError::InvalidConfig("monte_carlo.chunk_size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Rosters, synergies and battle settings for a team Monte Carlo run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMatchup {
    pub team1: Vec<UnitStats>,
    pub team2: Vec<UnitStats>,
    #[serde(default)]
    pub team1_synergies: Vec<Synergy>,
    #[serde(default)]
    pub team2_synergies: Vec<Synergy>,
    #[serde(default)]
    pub targeting: TargetingMode,
    #[serde(default)]
    pub battle: BattleConfig,
}

impl TeamMatchup {
    pub fn new(team1: Vec<UnitStats>, team2: Vec<UnitStats>, battle: BattleConfig) -> Self {
        Self {
            team1,
            team2,
            team1_synergies: Vec::new(),
            team2_synergies: Vec::new(),
            targeting: TargetingMode::default(),
            battle,
        }
    }

    pub fn with_targeting(mut self, targeting: TargetingMode) -> Self {
        self.targeting = targeting;
        self
    }

    pub fn with_synergies(mut self, team1: Vec<Synergy>, team2: Vec<Synergy>) -> Self {
        self.team1_synergies = team1;
        self.team2_synergies = team2;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub id: String,
    pub name: String,
    pub wins: usize,
    pub win_rate: f64,
    pub win_rate_ci: ConfidenceInterval,
    pub avg_damage: f64,
    /// Average damage over average battle duration.
    pub avg_dps: f64,
    /// Closed-form expectation, ignoring defense and misses.
    pub theoretical_dps: f64,
    /// Average remaining hp over the runs this unit won.
    pub avg_survival_hp: f64,
    pub observed_hit_rate: f64,
    pub observed_crit_rate: f64,
    pub avg_skill_casts: f64,
    /// Seconds needed to kill the opponent, over the runs that ended in a kill.
    pub ttk: DistributionSummary,
    pub damage_histogram: Vec<HistogramBin>,
    pub ttk_histogram: Vec<HistogramBin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub runs: usize,
    pub seed: u64,
    pub confidence: ConfidenceLevel,
    pub unit1_wins: usize,
    pub unit2_wins: usize,
    pub draws: usize,
    pub unit1_win_rate: f64,
    pub unit2_win_rate: f64,
    pub draw_rate: f64,
    pub duration: RangeSummary,
    pub duration_histogram: Vec<HistogramBin>,
    pub unit1: UnitSummary,
    pub unit2: UnitSummary,
    pub samples: Vec<BattleResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamUnitSummary {
    pub id: String,
    pub name: String,
    pub team: TeamSide,
    pub avg_damage_dealt: f64,
    pub avg_damage_taken: f64,
    pub avg_dps: f64,
    pub avg_kills: f64,
    pub survival_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSimulationResult {
    pub runs: usize,
    pub seed: u64,
    pub confidence: ConfidenceLevel,
    pub team1_wins: usize,
    pub team2_wins: usize,
    pub draws: usize,
    pub team1_win_rate: f64,
    pub team2_win_rate: f64,
    pub draw_rate: f64,
    pub team1_win_rate_ci: ConfidenceInterval,
    pub team2_win_rate_ci: ConfidenceInterval,
    pub duration: RangeSummary,
    pub duration_histogram: Vec<HistogramBin>,
    /// Seconds until the opposing team was wiped, over team 1 wins by elimination.
    pub team1_ttk: DistributionSummary,
    pub team2_ttk: DistributionSummary,
    pub avg_team1_survivors: f64,
    pub avg_team2_survivors: f64,
    pub avg_team1_damage: f64,
    pub avg_team2_damage: f64,
    pub team1_active_synergies: Vec<String>,
    pub team2_active_synergies: Vec<String>,
    /// Team 1 rows first, then team 2, each in roster order.
    pub units: Vec<TeamUnitSummary>,
    pub samples: Vec<TeamBattleResult>,
}

/// Mergeable per-worker state. Merging must not depend on which worker ran which index, apart
/// from floating-point summation order.
trait Tally: Default + Send {
    type Outcome: Send;

    fn record(&mut self, index: usize, outcome: Self::Outcome, retain: bool);

    fn merge(&mut self, other: Self);
}

#[derive(Clone, Copy)]
enum Execution<'a> {
    Sequential,
    Parallel(&'a WorkerPool),
}

fn drive<T, F>(
    config: &MonteCarloConfig,
    execution: Execution<'_>,
    cancel: Option<&CancellationToken>,
    on_progress: &mut dyn FnMut(Progress),
    run_one: F,
) -> Result<T>
where
    T: Tally,
    F: Fn(usize) -> T::Outcome + Sync,
{
    let total = config.runs;
    let sample_size = config.sample_size;
    let mut tally = T::default();
    let ready = match execution {
        Execution::Sequential => None,
        Execution::Parallel(pool) => Some(pool.build()?),
    };

    for (start, end) in chunk_ranges(total, config.chunk_size) {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            info!(completed = start, total, "monte carlo run cancelled");
            return Err(SimError::Cancelled {
                completed: start,
                total,
            });
        }

        let chunk = match &ready {
            None => {
                let mut chunk = T::default();
                for index in start..end {
                    chunk.record(index, run_one(index), index < sample_size);
                }
                chunk
            }
            Some(pool) => pool.install(|| {
                (start..end)
                    .into_par_iter()
                    .fold(T::default, |mut acc, index| {
                        acc.record(index, run_one(index), index < sample_size);
                        acc
                    })
                    .reduce(T::default, |mut left, right| {
                        left.merge(right);
                        left
                    })
            }),
        };
        tally.merge(chunk);

        debug!(completed = end, total, "monte carlo chunk finished");
        on_progress(Progress::new(end, total));
    }
    Ok(tally)
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn per_second(amount: f64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        amount / seconds
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------------------------
// 1v1
// ---------------------------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SideTally {
    wins: usize,
    damage: RunningStats,
    /// One entry per run; feeds the damage histogram.
    damage_samples: Vec<f64>,
    survival_hp: RunningStats,
    ttk: Vec<f64>,
    attacks: u64,
    hits: u64,
    crits: u64,
    skill_casts: u64,
}

impl SideTally {
    fn merge(&mut self, other: SideTally) {
        self.wins += other.wins;
        self.damage.merge(&other.damage);
        self.damage_samples.extend(other.damage_samples);
        self.survival_hp.merge(&other.survival_hp);
        self.ttk.extend(other.ttk);
        self.attacks += other.attacks;
        self.hits += other.hits;
        self.crits += other.crits;
        self.skill_casts += other.skill_casts;
    }

    fn summarize(
        self,
        unit: &UnitStats,
        runs: usize,
        avg_duration: f64,
        config: &MonteCarloConfig,
    ) -> UnitSummary {
        let avg_damage = self.damage.mean();
        UnitSummary {
            id: unit.id.clone(),
            name: unit.name.clone(),
            wins: self.wins,
            win_rate: rate(self.wins, runs),
            win_rate_ci: wilson_interval(self.wins, runs, config.confidence),
            avg_damage,
            avg_dps: per_second(avg_damage, avg_duration),
            theoretical_dps: theoretical_dps(unit),
            avg_survival_hp: self.survival_hp.mean(),
            observed_hit_rate: ratio_u64(self.hits, self.attacks),
            observed_crit_rate: ratio_u64(self.crits, self.attacks),
            avg_skill_casts: if runs == 0 { 0.0 } else { self.skill_casts as f64 / runs as f64 },
            ttk: DistributionSummary::from_samples(&self.ttk),
            damage_histogram: histogram(&self.damage_samples, config.histogram_bins),
            ttk_histogram: histogram(&self.ttk, config.histogram_bins),
        }
    }
}

fn ratio_u64(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[derive(Debug, Default)]
struct DuelTally {
    draws: usize,
    /// One entry per run; feeds the duration histogram.
    durations: Vec<f64>,
    duration_stats: RunningStats,
    unit1: SideTally,
    unit2: SideTally,
    samples: Vec<(usize, BattleResult)>,
}

impl Tally for DuelTally {
    type Outcome = BattleResult;

    fn record(&mut self, index: usize, outcome: BattleResult, retain: bool) {
        self.durations.push(outcome.duration);
        self.duration_stats.push(outcome.duration);

        for (side, counters) in [(&mut self.unit1, &outcome.unit1), (&mut self.unit2, &outcome.unit2)] {
            side.damage.push(counters.damage_dealt);
            side.damage_samples.push(counters.damage_dealt);
            side.attacks += u64::from(counters.attacks);
            side.hits += u64::from(counters.hits);
            side.crits += u64::from(counters.crits);
            side.skill_casts += u64::from(counters.skill_casts);
        }

        match outcome.winner {
            BattleWinner::Unit1 => {
                self.unit1.wins += 1;
                self.unit1.survival_hp.push(outcome.unit1_final_hp);
                if outcome.unit2_final_hp <= 0.0 {
                    self.unit1.ttk.push(outcome.duration);
                }
            }
            BattleWinner::Unit2 => {
                self.unit2.wins += 1;
                self.unit2.survival_hp.push(outcome.unit2_final_hp);
                if outcome.unit1_final_hp <= 0.0 {
                    self.unit2.ttk.push(outcome.duration);
                }
            }
            BattleWinner::Draw => self.draws += 1,
        }

        if retain {
            self.samples.push((index, outcome));
        }
    }

    fn merge(&mut self, other: Self) {
        self.draws += other.draws;
        self.durations.extend(other.durations);
        self.duration_stats.merge(&other.duration_stats);
        self.unit1.merge(other.unit1);
        self.unit2.merge(other.unit2);
        self.samples.extend(other.samples);
    }
}

impl DuelTally {
    fn finish(
        mut self,
        unit1: &UnitStats,
        unit2: &UnitStats,
        seed: u64,
        config: &MonteCarloConfig,
    ) -> SimulationResult {
        let runs = config.runs;
        let avg_duration = self.duration_stats.mean();
        self.samples.sort_by_key(|(index, _)| *index);
        let unit1_wins = self.unit1.wins;
        let unit2_wins = self.unit2.wins;

        SimulationResult {
            runs,
            seed,
            confidence: config.confidence,
            unit1_wins,
            unit2_wins,
            draws: self.draws,
            unit1_win_rate: rate(unit1_wins, runs),
            unit2_win_rate: rate(unit2_wins, runs),
            draw_rate: rate(self.draws, runs),
            duration: self.duration_stats.summary(),
            duration_histogram: histogram(&self.durations, config.histogram_bins),
            unit1: self.unit1.summarize(unit1, runs, avg_duration, config),
            unit2: self.unit2.summarize(unit2, runs, avg_duration, config),
            samples: self.samples.into_iter().map(|(_, result)| result).collect(),
        }
    }
}

/// Runs `config.runs` duels on the calling thread.
pub fn run_monte_carlo(
    unit1: &UnitStats,
    unit2: &UnitStats,
    battle: &BattleConfig,
    config: &MonteCarloConfig,
) -> Result<SimulationResult> {
    run_duels(unit1, unit2, battle, config, Execution::Sequential, None, &mut |_: Progress| {})
}

/// Like [run_monte_carlo] but spreads each chunk over `pool`. Same seed, same aggregates.
pub fn run_monte_carlo_parallel(
    unit1: &UnitStats,
    unit2: &UnitStats,
    battle: &BattleConfig,
    config: &MonteCarloConfig,
    pool: &WorkerPool,
) -> Result<SimulationResult> {
    run_duels(unit1, unit2, battle, config, Execution::Parallel(pool), None, &mut |_: Progress| {})
}

/// Parallel run that reports progress after every chunk and stops with [SimError::Cancelled]
/// once `cancel` is set. Nothing is returned for a cancelled run.
pub fn run_monte_carlo_with_progress(
    unit1: &UnitStats,
    unit2: &UnitStats,
    battle: &BattleConfig,
    config: &MonteCarloConfig,
    pool: &WorkerPool,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(Progress),
) -> Result<SimulationResult> {
    run_duels(
        unit1,
        unit2,
        battle,
        config,
        Execution::Parallel(pool),
        Some(cancel),
        &mut on_progress,
    )
}

fn run_duels(
    unit1: &UnitStats,
    unit2: &UnitStats,
    battle: &BattleConfig,
    config: &MonteCarloConfig,
    execution: Execution<'_>,
    cancel: Option<&CancellationToken>,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<SimulationResult> {
    config.validate()?;
    validate_duel(unit1, unit2, battle)?;

    let seed = config.seed.unwrap_or_else(entropy_seed);
    let traced = *battle;
    let untraced = battle.with_trace(TraceMode::Off);
    let sample_size = config.sample_size;
    debug!(runs = config.runs, seed, unit1 = %unit1.id, unit2 = %unit2.id, "starting duel monte carlo");

    let tally: DuelTally = drive(config, execution, cancel, on_progress, |index| {
        let battle = if index < sample_size { &traced } else { &untraced };
        let mut rng = Rng::for_run(seed, index as u64);
        run_battle(unit1, unit2, battle, &mut rng)
    })?;

    let result = tally.finish(unit1, unit2, seed, config);
    info!(
        runs = result.runs,
        unit1_win_rate = result.unit1_win_rate,
        unit2_win_rate = result.unit2_win_rate,
        draw_rate = result.draw_rate,
        "duel monte carlo finished"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
struct UnitTally {
    damage_dealt: RunningStats,
    damage_taken: RunningStats,
    kills: u64,
    survived: usize,
}

impl UnitTally {
    fn merge(&mut self, other: &UnitTally) {
        self.damage_dealt.merge(&other.damage_dealt);
        self.damage_taken.merge(&other.damage_taken);
        self.kills += other.kills;
        self.survived += other.survived;
    }
}

#[derive(Debug, Default)]
struct TeamTally {
    team1_wins: usize,
    team2_wins: usize,
    draws: usize,
    durations: Vec<f64>,
    duration_stats: RunningStats,
    team1_ttk: Vec<f64>,
    team2_ttk: Vec<f64>,
    team1_survivors: RunningStats,
    team2_survivors: RunningStats,
    team1_damage: RunningStats,
    team2_damage: RunningStats,
    units: Vec<UnitTally>,
    samples: Vec<(usize, TeamBattleResult)>,
}

impl Tally for TeamTally {
    type Outcome = TeamBattleResult;

    fn record(&mut self, index: usize, outcome: TeamBattleResult, retain: bool) {
        self.durations.push(outcome.duration);
        self.duration_stats.push(outcome.duration);
        self.team1_survivors.push(outcome.team1_survivors as f64);
        self.team2_survivors.push(outcome.team2_survivors as f64);
        self.team1_damage.push(outcome.team1_total_damage);
        self.team2_damage.push(outcome.team2_total_damage);

        match outcome.winner {
            TeamWinner::Team1 => {
                self.team1_wins += 1;
                if outcome.team2_survivors == 0 {
                    self.team1_ttk.push(outcome.duration);
                }
            }
            TeamWinner::Team2 => {
                self.team2_wins += 1;
                if outcome.team1_survivors == 0 {
                    self.team2_ttk.push(outcome.duration);
                }
            }
            TeamWinner::Draw => self.draws += 1,
        }

        if self.units.is_empty() {
            self.units = vec![UnitTally::default(); outcome.units.len()];
        }
        for (tally, unit) in self.units.iter_mut().zip(&outcome.units) {
            tally.damage_dealt.push(unit.damage_dealt);
            tally.damage_taken.push(unit.damage_taken);
            tally.kills += u64::from(unit.kills);
            if unit.survived {
                tally.survived += 1;
            }
        }

        if retain {
            self.samples.push((index, outcome));
        }
    }

    fn merge(&mut self, other: Self) {
        self.team1_wins += other.team1_wins;
        self.team2_wins += other.team2_wins;
        self.draws += other.draws;
        self.durations.extend(other.durations);
        self.duration_stats.merge(&other.duration_stats);
        self.team1_ttk.extend(other.team1_ttk);
        self.team2_ttk.extend(other.team2_ttk);
        self.team1_survivors.merge(&other.team1_survivors);
        self.team2_survivors.merge(&other.team2_survivors);
        self.team1_damage.merge(&other.team1_damage);
        self.team2_damage.merge(&other.team2_damage);
        if self.units.is_empty() {
            self.units = other.units;
        } else {
            for (mine, theirs) in self.units.iter_mut().zip(&other.units) {
                mine.merge(theirs);
            }
        }
        self.samples.extend(other.samples);
    }
}

impl TeamTally {
    fn finish(
        mut self,
        team1: &[UnitStats],
        team2: &[UnitStats],
        synergies: (Vec<String>, Vec<String>),
        seed: u64,
        config: &MonteCarloConfig,
    ) -> TeamSimulationResult {
        let runs = config.runs;
        let avg_duration = self.duration_stats.mean();
        self.samples.sort_by_key(|(index, _)| *index);

        let roster = team1
            .iter()
            .map(|unit| (unit, TeamSide::Team1))
            .chain(team2.iter().map(|unit| (unit, TeamSide::Team2)));
        let units = roster
            .enumerate()
            .map(|(slot, (unit, team))| {
                let tally = self.units.get(slot).cloned().unwrap_or_default();
                let avg_damage_dealt = tally.damage_dealt.mean();
                TeamUnitSummary {
                    id: unit.id.clone(),
                    name: unit.name.clone(),
                    team,
                    avg_damage_dealt,
                    avg_damage_taken: tally.damage_taken.mean(),
                    avg_dps: per_second(avg_damage_dealt, avg_duration),
                    avg_kills: if runs == 0 { 0.0 } else { tally.kills as f64 / runs as f64 },
                    survival_rate: rate(tally.survived, runs),
                }
            })
            .collect();

        let (team1_active_synergies, team2_active_synergies) = synergies;
        TeamSimulationResult {
            runs,
            seed,
            confidence: config.confidence,
            team1_wins: self.team1_wins,
            team2_wins: self.team2_wins,
            draws: self.draws,
            team1_win_rate: rate(self.team1_wins, runs),
            team2_win_rate: rate(self.team2_wins, runs),
            draw_rate: rate(self.draws, runs),
            team1_win_rate_ci: wilson_interval(self.team1_wins, runs, config.confidence),
            team2_win_rate_ci: wilson_interval(self.team2_wins, runs, config.confidence),
            duration: self.duration_stats.summary(),
            duration_histogram: histogram(&self.durations, config.histogram_bins),
            team1_ttk: DistributionSummary::from_samples(&self.team1_ttk),
            team2_ttk: DistributionSummary::from_samples(&self.team2_ttk),
            avg_team1_survivors: self.team1_survivors.mean(),
            avg_team2_survivors: self.team2_survivors.mean(),
            avg_team1_damage: self.team1_damage.mean(),
            avg_team2_damage: self.team2_damage.mean(),
            team1_active_synergies,
            team2_active_synergies,
            units,
            samples: self.samples.into_iter().map(|(_, result)| result).collect(),
        }
    }
}

/// Runs `config.runs` team battles on the calling thread. Synergies are applied once, before the
/// first run.
pub fn run_team_monte_carlo(matchup: &TeamMatchup, config: &MonteCarloConfig) -> Result<TeamSimulationResult> {
    run_teams(matchup, config, Execution::Sequential, None, &mut |_: Progress| {})
}

pub fn run_team_monte_carlo_parallel(
    matchup: &TeamMatchup,
    config: &MonteCarloConfig,
    pool: &WorkerPool,
) -> Result<TeamSimulationResult> {
    run_teams(matchup, config, Execution::Parallel(pool), None, &mut |_: Progress| {})
}

pub fn run_team_monte_carlo_with_progress(
    matchup: &TeamMatchup,
    config: &MonteCarloConfig,
    pool: &WorkerPool,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(Progress),
) -> Result<TeamSimulationResult> {
    run_teams(matchup, config, Execution::Parallel(pool), Some(cancel), &mut on_progress)
}

fn run_teams(
    matchup: &TeamMatchup,
    config: &MonteCarloConfig,
    execution: Execution<'_>,
    cancel: Option<&CancellationToken>,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<TeamSimulationResult> {
    config.validate()?;
    let team1 = apply_synergies(&matchup.team1, &matchup.team1_synergies);
    let team2 = apply_synergies(&matchup.team2, &matchup.team2_synergies);
    validate_rosters(&team1, &team2, &matchup.battle)?;

    let synergies = (
        owned(active_synergies(&matchup.team1, &matchup.team1_synergies)),
        owned(active_synergies(&matchup.team2, &matchup.team2_synergies)),
    );
    let seed = config.seed.unwrap_or_else(entropy_seed);
    let traced = matchup.battle;
    let untraced = matchup.battle.with_trace(TraceMode::Off);
    let sample_size = config.sample_size;
    let targeting = matchup.targeting;
    debug!(
        runs = config.runs,
        seed,
        team1 = team1.len(),
        team2 = team2.len(),
        ?targeting,
        "starting team monte carlo"
    );

    let tally: TeamTally = drive(config, execution, cancel, on_progress, |index| {
        let battle = if index < sample_size { &traced } else { &untraced };
        let mut rng = Rng::for_run(seed, index as u64);
        run_team_battle(&team1, &team2, battle, targeting, &mut rng)
    })?;

    let result = tally.finish(&team1, &team2, synergies, seed, config);
    info!(
        runs = result.runs,
        team1_win_rate = result.team1_win_rate,
        team2_win_rate = result.team2_win_rate,
        draw_rate = result.draw_rate,
        "team monte carlo finished"
    );
    Ok(result)
}

fn owned(ids: Vec<&str>) -> Vec<String> {
    ids.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::stats::DamageFormula;

    fn duelists() -> (UnitStats, UnitStats) {
        (
            UnitStats::new("knight", 400.0, 30.0, 5.0, 1.0)
                .with_name("Sir Knight")
                .with_crit(0.25, 2.0),
            UnitStats::new("archer", 300.0, 25.0, 2.0, 1.5).with_evasion(0.1),
        )
    }

    #[test]
    fn counts_cover_every_run() {
        let (a, b) = duelists();
        let config = MonteCarloConfig::default().with_runs(250).with_seed(5);
        let result = run_monte_carlo(&a, &b, &BattleConfig::default(), &config).expect("valid input");
        assert_eq!(result.unit1_wins + result.unit2_wins + result.draws, 250);
        assert_eq!(result.duration_histogram.iter().map(|bin| bin.count).sum::<usize>(), 250);
        assert_eq!(result.unit1.damage_histogram.iter().map(|bin| bin.count).sum::<usize>(), 250);
        assert!((result.unit1_win_rate + result.unit2_win_rate + result.draw_rate - 1.0).abs() < 1e-9);
        assert_eq!(result.unit1.id, "knight");
        assert_eq!(result.unit1.name, "Sir Knight");
        assert_eq!(result.unit2.name, "archer");
    }

    #[test]
    fn only_sampled_runs_are_retained_and_traced() {
        let (a, b) = duelists();
        let config = MonteCarloConfig {
            runs: 40,
            sample_size: 3,
            chunk_size: 7,
            seed: Some(9),
            ..MonteCarloConfig::default()
        };
        let result = run_monte_carlo(&a, &b, &BattleConfig::default(), &config).expect("valid input");
        assert_eq!(result.samples.len(), 3);
        assert!(result.samples.iter().all(|sample| !sample.log.is_empty()));
    }

    #[test]
    fn sampled_runs_match_direct_simulation() {
        let (a, b) = duelists();
        let battle = BattleConfig::default().with_formula(DamageFormula::Random);
        let config = MonteCarloConfig::default().with_runs(20).with_seed(77);
        let result = run_monte_carlo(&a, &b, &battle, &config).expect("valid input");
        for (index, sample) in result.samples.iter().enumerate() {
            let mut rng = Rng::for_run(77, index as u64);
            assert_eq!(sample, &run_battle(&a, &b, &battle, &mut rng));
        }
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let (a, b) = duelists();
        let config = MonteCarloConfig {
            chunk_size: 0,
            ..MonteCarloConfig::default()
        };
        let err = run_monte_carlo(&a, &b, &BattleConfig::default(), &config).expect_err("chunk size 0");
        assert!(matches!(err, SimError::InvalidConfig(_)));
    }

    #[test]
    fn zero_runs_give_empty_aggregates() {
        let (a, b) = duelists();
        let config = MonteCarloConfig::default().with_runs(0).with_seed(1);
        let result = run_monte_carlo(&a, &b, &BattleConfig::default(), &config).expect("valid input");
        assert_eq!(result.unit1_win_rate, 0.0);
        assert!(result.duration_histogram.is_empty());
        assert_eq!(result.unit1.win_rate_ci, ConfidenceInterval { lower: 0.0, upper: 1.0 });
    }

    #[test]
    fn team_unit_rows_follow_roster_order() {
        let matchup = TeamMatchup::new(
            vec![
                UnitStats::new("a1", 100.0, 10.0, 0.0, 1.0),
                UnitStats::new("a2", 100.0, 10.0, 0.0, 1.0),
            ],
            vec![UnitStats::new("b1", 150.0, 12.0, 0.0, 1.0)],
            BattleConfig::default(),
        );
        let config = MonteCarloConfig::default().with_runs(30).with_seed(3);
        let result = run_team_monte_carlo(&matchup, &config).expect("valid input");
        let ids: Vec<&str> = result.units.iter().map(|unit| unit.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "b1"]);
        assert_eq!(result.units[2].team, TeamSide::Team2);
        assert_eq!(result.team1_wins + result.team2_wins + result.draws, 30);
    }
}
