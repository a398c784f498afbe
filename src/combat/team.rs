//! N:N battles. Each living unit keeps its own attack timer; every tick walks team 1 then team 2 in
//! roster order, and each due unit picks a living enemy by [TargetingMode] and strikes at once.

use serde::{Deserialize, Serialize};

use crate::combat::damage::{resolve_damage, DamageOutcome};
use crate::combat::engine::{BattleLogEntry, TraceCollector, DRAW_RATIO_TOLERANCE, EPSILON};
use crate::combat::rng::Rng;
use crate::combat::stats::{hp_ratio, BattleConfig, TargetingMode, TeamSide, UnitStats};
use crate::error::{Result, SimError};
use crate::scenario::validate::{ensure_valid, validate_battle_config, validate_unit, ValidationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamWinner {
    Team1,
    Team2,
    Draw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOutcome {
    pub id: String,
    pub name: String,
    pub team: TeamSide,
    pub damage_dealt: f64,
    pub damage_taken: f64,
    pub kills: u32,
    pub survived: bool,
    pub final_hp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamBattleResult {
    pub winner: TeamWinner,
    pub duration: f64,
    pub team1_survivors: usize,
    pub team2_survivors: usize,
    pub team1_total_damage: f64,
    pub team2_total_damage: f64,
    /// Team 1 rows first, then team 2, each in roster order.
    pub units: Vec<UnitOutcome>,
    pub log: Vec<BattleLogEntry>,
}

#[derive(Debug)]
struct Combatant<'a> {
    stats: &'a UnitStats,
    hp: f64,
    next_attack: f64,
    interval: f64,
    alive: bool,
    damage_dealt: f64,
    damage_taken: f64,
    kills: u32,
}

impl<'a> Combatant<'a> {
    fn new(stats: &'a UnitStats) -> Self {
        let interval = stats.attack_interval();
        Self {
            stats,
            hp: stats.hp,
            next_attack: interval,
            interval,
            alive: stats.hp > 0.0,
            damage_dealt: 0.0,
            damage_taken: 0.0,
            kills: 0,
        }
    }

    fn outcome(&self, team: TeamSide) -> UnitOutcome {
        UnitOutcome {
            id: self.stats.id.clone(),
            name: self.stats.name.clone(),
            team,
            damage_dealt: self.damage_dealt,
            damage_taken: self.damage_taken,
            kills: self.kills,
            survived: self.alive,
            final_hp: self.hp,
        }
    }
}

fn living(team: &[Combatant<'_>]) -> usize {
    team.iter().filter(|unit| unit.alive).count()
}

fn hp_ratio_sum(team: &[Combatant<'_>]) -> f64 {
    team.iter()
        .filter(|unit| unit.alive)
        .map(|unit| hp_ratio(unit.hp, unit.stats.max_hp))
        .sum()
}

/// Picks a living enemy index, or `None` when the enemy team is wiped. Ties go to roster order.
fn pick_target(enemies: &[Combatant<'_>], mode: TargetingMode, rng: &mut Rng) -> Option<usize> {
    match mode {
        TargetingMode::Focused => enemies.iter().position(|unit| unit.alive),
        TargetingMode::LowestHp => enemies
            .iter()
            .enumerate()
            .filter(|(_, unit)| unit.alive)
            .fold(None, |best: Option<(usize, f64)>, (index, unit)| match best {
                Some((_, hp)) if hp <= unit.hp => best,
                _ => Some((index, unit.hp)),
            })
            .map(|(index, _)| index),
        TargetingMode::HighestAtk => enemies
            .iter()
            .enumerate()
            .filter(|(_, unit)| unit.alive)
            .fold(None, |best: Option<(usize, f64)>, (index, unit)| match best {
                Some((_, atk)) if atk >= unit.stats.atk => best,
                _ => Some((index, unit.stats.atk)),
            })
            .map(|(index, _)| index),
        TargetingMode::Random => {
            let pool: Vec<usize> = enemies
                .iter()
                .enumerate()
                .filter(|(_, unit)| unit.alive)
                .map(|(index, _)| index)
                .collect();
            (!pool.is_empty()).then(|| pool[rng.index(pool.len())])
        }
    }
}

/// Validates both rosters and the config, then runs one team battle.
pub fn simulate_team_battle(
    team1: &[UnitStats],
    team2: &[UnitStats],
    config: &BattleConfig,
    targeting: TargetingMode,
    rng: &mut Rng,
) -> Result<TeamBattleResult> {
    validate_rosters(team1, team2, config)?;
    Ok(run_team_battle(team1, team2, config, targeting, rng))
}

pub(crate) fn validate_rosters(team1: &[UnitStats], team2: &[UnitStats], config: &BattleConfig) -> Result<()> {
    if team1.is_empty() {
        return Err(SimError::EmptyRoster(TeamSide::Team1));
    }
    if team2.is_empty() {
        return Err(SimError::EmptyRoster(TeamSide::Team2));
    }
    let mut report = ValidationReport::default();
    for unit in team1.iter().chain(team2) {
        validate_unit(unit, &mut report);
    }
    validate_battle_config(config, &mut report);
    ensure_valid(&report)
}

/// Runs one team battle on pre-validated rosters.
pub fn run_team_battle(
    team1: &[UnitStats],
    team2: &[UnitStats],
    config: &BattleConfig,
    targeting: TargetingMode,
    rng: &mut Rng,
) -> TeamBattleResult {
    let mut first: Vec<Combatant<'_>> = team1.iter().map(Combatant::new).collect();
    let mut second: Vec<Combatant<'_>> = team2.iter().map(Combatant::new).collect();
    let mut trace = TraceCollector::new(config.trace);
    let mut now = 0.0;
    let mut finished = living(&first) == 0 || living(&second) == 0;

    for tick in 1..=config.tick_count() {
        if finished {
            break;
        }
        now = tick as f64 * config.time_step;
        finished = run_side(&mut first, &mut second, now, config, targeting, rng, &mut trace)
            || run_side(&mut second, &mut first, now, config, targeting, rng, &mut trace);
    }
    if !finished {
        now = config.max_duration;
    }

    let team1_survivors = living(&first);
    let team2_survivors = living(&second);
    let winner = match (team1_survivors, team2_survivors) {
        (0, 0) => TeamWinner::Draw,
        (0, _) => TeamWinner::Team2,
        (_, 0) => TeamWinner::Team1,
        (a, b) if a > b => TeamWinner::Team1,
        (a, b) if a < b => TeamWinner::Team2,
        _ => {
            let diff = hp_ratio_sum(&first) - hp_ratio_sum(&second);
            if diff.abs() < DRAW_RATIO_TOLERANCE {
                TeamWinner::Draw
            } else if diff > 0.0 {
                TeamWinner::Team1
            } else {
                TeamWinner::Team2
            }
        }
    };

    let units = first
        .iter()
        .map(|unit| unit.outcome(TeamSide::Team1))
        .chain(second.iter().map(|unit| unit.outcome(TeamSide::Team2)))
        .collect();

    TeamBattleResult {
        winner,
        duration: now,
        team1_survivors,
        team2_survivors,
        team1_total_damage: first.iter().map(|unit| unit.damage_dealt).sum(),
        team2_total_damage: second.iter().map(|unit| unit.damage_dealt).sum(),
        units,
        log: trace.into_entries(),
    }
}

/// Lets every due unit of `attackers` strike once. Returns true once `defenders` is wiped out.
fn run_side(
    attackers: &mut [Combatant<'_>],
    defenders: &mut [Combatant<'_>],
    now: f64,
    config: &BattleConfig,
    targeting: TargetingMode,
    rng: &mut Rng,
    trace: &mut TraceCollector,
) -> bool {
    for attacker in attackers.iter_mut() {
        if !attacker.alive || now + EPSILON < attacker.next_attack {
            continue;
        }
        let Some(target_index) = pick_target(defenders, targeting, rng) else {
            return true;
        };
        let target = &mut defenders[target_index];
        let outcome = resolve_damage(
            attacker.stats,
            target.stats,
            config.damage_formula,
            config.defense_formula,
            config.armor_penetration.as_ref(),
            rng,
        );
        attacker.next_attack += attacker.interval;
        strike(attacker, target, &outcome, now, config.allow_overkill, trace);
    }
    living(defenders) == 0
}

fn strike(
    attacker: &mut Combatant<'_>,
    target: &mut Combatant<'_>,
    outcome: &DamageOutcome,
    now: f64,
    allow_overkill: bool,
    trace: &mut TraceCollector,
) {
    if !outcome.is_miss {
        let applied = if allow_overkill {
            outcome.damage
        } else {
            outcome.damage.min(target.hp.max(0.0))
        };
        target.hp -= outcome.damage;
        if !allow_overkill {
            target.hp = target.hp.max(0.0);
        }
        attacker.damage_dealt += applied;
        target.damage_taken += applied;
    }
    let remaining = target.hp;
    trace.record(|| BattleLogEntry::attack(now, &attacker.stats.id, &target.stats.id, outcome, remaining));

    if target.hp <= 0.0 {
        target.alive = false;
        attacker.kills += 1;
        trace.record(|| BattleLogEntry::death(now, &target.stats.id, remaining));
    }
}
