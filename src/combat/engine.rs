//! Tick-based 1v1 battle resolution.
//!
//! Both units carry independent attack timers. When both are due on the same tick, both attacks
//! are resolved against the pre-tick state before either is applied, so neither side gains from
//! being computed first.

use serde::{Deserialize, Serialize};

use crate::combat::damage::{resolve_damage, resolve_skill_damage, skill_raw_damage, DamageOutcome};
use crate::combat::rng::Rng;
use crate::combat::stats::{hp_ratio, BattleConfig, Skill, TraceMode, UnitStats};
use crate::combat::triggers::{should_trigger, TriggerContext};
use crate::error::Result;
use crate::scenario::validate::{ensure_valid, validate_battle_config, validate_unit, ValidationReport};

pub const EPSILON: f64 = 1e-9;

/// HP-ratio gap under which a timed-out battle is a draw.
pub const DRAW_RATIO_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleAction {
    Attack,
    Skill,
    Buff,
    Debuff,
    Heal,
    Death,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleLogEntry {
    pub time: f64,
    pub actor: String,
    pub action: BattleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_crit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_miss: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_hp: Option<f64>,
}

impl BattleLogEntry {
    pub fn attack(time: f64, actor: &str, target: &str, outcome: &DamageOutcome, remaining_hp: f64) -> Self {
        Self {
            time,
            actor: actor.to_string(),
            action: BattleAction::Attack,
            target: Some(target.to_string()),
            damage: Some(outcome.damage),
            is_crit: Some(outcome.is_crit),
            is_miss: Some(outcome.is_miss),
            skill_name: None,
            remaining_hp: Some(remaining_hp),
        }
    }

    pub fn skill(time: f64, actor: &str, target: &str, skill: &str, damage: f64, remaining_hp: f64) -> Self {
        Self {
            time,
            actor: actor.to_string(),
            action: BattleAction::Skill,
            target: Some(target.to_string()),
            damage: Some(damage),
            is_crit: None,
            is_miss: None,
            skill_name: Some(skill.to_string()),
            remaining_hp: Some(remaining_hp),
        }
    }

    pub fn death(time: f64, actor: &str, remaining_hp: f64) -> Self {
        Self {
            time,
            actor: actor.to_string(),
            action: BattleAction::Death,
            target: None,
            damage: None,
            is_crit: None,
            is_miss: None,
            skill_name: None,
            remaining_hp: Some(remaining_hp),
        }
    }
}

/// Append-only log that records only when tracing is on.
#[derive(Debug, Clone, Default)]
pub struct TraceCollector {
    enabled: bool,
    entries: Vec<BattleLogEntry>,
}

impl TraceCollector {
    pub fn new(mode: TraceMode) -> Self {
        Self {
            enabled: mode == TraceMode::Events,
            entries: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Builds the entry lazily so disabled traces cost nothing.
    pub fn record(&mut self, entry: impl FnOnce() -> BattleLogEntry) {
        if self.enabled {
            self.entries.push(entry());
        }
    }

    pub fn into_entries(self) -> Vec<BattleLogEntry> {
        self.entries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleWinner {
    Unit1,
    Unit2,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleState {
    Running,
    Unit1Dead,
    Unit2Dead,
    BothDead,
    TimedOut,
}

impl BattleState {
    fn from_hp(unit1_hp: f64, unit2_hp: f64) -> Self {
        match (unit1_hp <= 0.0, unit2_hp <= 0.0) {
            (true, true) => Self::BothDead,
            (true, false) => Self::Unit1Dead,
            (false, true) => Self::Unit2Dead,
            (false, false) => Self::Running,
        }
    }

    fn resolve(self, unit1_ratio: f64, unit2_ratio: f64) -> BattleWinner {
        match self {
            Self::BothDead => BattleWinner::Draw,
            Self::Unit1Dead => BattleWinner::Unit2,
            Self::Unit2Dead => BattleWinner::Unit1,
            Self::Running | Self::TimedOut => {
                if (unit1_ratio - unit2_ratio).abs() < DRAW_RATIO_TOLERANCE {
                    BattleWinner::Draw
                } else if unit1_ratio > unit2_ratio {
                    BattleWinner::Unit1
                } else {
                    BattleWinner::Unit2
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatCounters {
    pub attacks: u32,
    pub hits: u32,
    pub crits: u32,
    pub misses: u32,
    pub skill_casts: u32,
    pub damage_dealt: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleResult {
    pub winner: BattleWinner,
    pub duration: f64,
    pub unit1_final_hp: f64,
    pub unit2_final_hp: f64,
    pub unit1_max_hp: f64,
    pub unit2_max_hp: f64,
    pub unit1: CombatCounters,
    pub unit2: CombatCounters,
    pub log: Vec<BattleLogEntry>,
}

impl BattleResult {
    pub fn unit1_total_damage(&self) -> f64 {
        self.unit1.damage_dealt
    }

    pub fn unit2_total_damage(&self) -> f64 {
        self.unit2.damage_dealt
    }
}

/// Mutable per-battle state for one side. Owned by a single battle run.
#[derive(Debug)]
struct Fighter<'a> {
    stats: &'a UnitStats,
    hp: f64,
    next_attack: f64,
    interval: f64,
    skill_ready_at: Vec<f64>,
    counters: CombatCounters,
}

impl<'a> Fighter<'a> {
    fn new(stats: &'a UnitStats) -> Self {
        let interval = stats.attack_interval();
        Self {
            stats,
            hp: stats.hp,
            next_attack: interval,
            interval,
            skill_ready_at: vec![0.0; stats.skills.len()],
            counters: CombatCounters::default(),
        }
    }

    fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    fn is_due(&self, now: f64) -> bool {
        now + EPSILON >= self.next_attack
    }

    fn hp_ratio(&self) -> f64 {
        hp_ratio(self.hp, self.stats.max_hp)
    }

    fn record_attack(&mut self, outcome: &DamageOutcome) {
        self.next_attack += self.interval;
        self.counters.attacks += 1;
        if outcome.is_miss {
            self.counters.misses += 1;
        } else {
            self.counters.hits += 1;
        }
        if outcome.is_crit {
            self.counters.crits += 1;
        }
    }

    /// Applies incoming damage and returns the amount that counts as dealt.
    fn take_damage(&mut self, damage: f64, allow_overkill: bool) -> f64 {
        if allow_overkill {
            self.hp -= damage;
            damage
        } else {
            let applied = damage.min(self.hp.max(0.0));
            self.hp = (self.hp - damage).max(0.0);
            applied
        }
    }
}

/// Validates both units and the config, then runs one battle.
pub fn simulate_battle(
    unit1: &UnitStats,
    unit2: &UnitStats,
    config: &BattleConfig,
    rng: &mut Rng,
) -> Result<BattleResult> {
    validate_duel(unit1, unit2, config)?;
    Ok(run_battle(unit1, unit2, config, rng))
}

pub(crate) fn validate_duel(unit1: &UnitStats, unit2: &UnitStats, config: &BattleConfig) -> Result<()> {
    let mut report = ValidationReport::default();
    validate_unit(unit1, &mut report);
    validate_unit(unit2, &mut report);
    validate_battle_config(config, &mut report);
    ensure_valid(&report)
}

/// Runs one battle without re-validating. Callers must have validated the inputs; the Monte Carlo
/// runner does so once per batch.
pub fn run_battle(
    unit1: &UnitStats,
    unit2: &UnitStats,
    config: &BattleConfig,
    rng: &mut Rng,
) -> BattleResult {
    let mut first = Fighter::new(unit1);
    let mut second = Fighter::new(unit2);
    let mut trace = TraceCollector::new(config.trace);
    let mut state = BattleState::from_hp(first.hp, second.hp);
    let mut now = 0.0;

    for tick in 1..=config.tick_count() {
        if state != BattleState::Running {
            break;
        }
        now = tick as f64 * config.time_step;

        let first_due = first.is_due(now);
        let second_due = second.is_due(now);
        if !first_due && !second_due {
            continue;
        }

        // Both rolls see the pre-tick state.
        let first_outcome = first_due.then(|| {
            resolve_damage(
                first.stats,
                second.stats,
                config.damage_formula,
                config.defense_formula,
                config.armor_penetration.as_ref(),
                rng,
            )
        });
        let second_outcome = second_due.then(|| {
            resolve_damage(
                second.stats,
                first.stats,
                config.damage_formula,
                config.defense_formula,
                config.armor_penetration.as_ref(),
                rng,
            )
        });

        if let Some(outcome) = first_outcome {
            apply_attack(&mut first, &mut second, &outcome, now, config, &mut trace);
        }
        if let Some(outcome) = second_outcome {
            apply_attack(&mut second, &mut first, &outcome, now, config, &mut trace);
        }

        if config.skills_enabled && first.is_alive() && second.is_alive() {
            // Both sides roll their skills against the post-attack state before either lands.
            let first_casts = match first_outcome {
                Some(outcome) => plan_skills(&first, &second, &outcome, now, config, rng),
                None => Vec::new(),
            };
            let second_casts = match second_outcome {
                Some(outcome) => plan_skills(&second, &first, &outcome, now, config, rng),
                None => Vec::new(),
            };
            land_skills(&mut first, &mut second, first_casts, now, config, &mut trace);
            land_skills(&mut second, &mut first, second_casts, now, config, &mut trace);
        }

        if !first.is_alive() {
            let hp = first.hp;
            trace.record(|| BattleLogEntry::death(now, &unit1.id, hp));
        }
        if !second.is_alive() {
            let hp = second.hp;
            trace.record(|| BattleLogEntry::death(now, &unit2.id, hp));
        }
        state = BattleState::from_hp(first.hp, second.hp);
    }

    if state == BattleState::Running {
        state = BattleState::TimedOut;
        now = config.max_duration;
    }
    let winner = state.resolve(first.hp_ratio(), second.hp_ratio());

    BattleResult {
        winner,
        duration: now,
        unit1_final_hp: first.hp,
        unit2_final_hp: second.hp,
        unit1_max_hp: unit1.max_hp,
        unit2_max_hp: unit2.max_hp,
        unit1: first.counters,
        unit2: second.counters,
        log: trace.into_entries(),
    }
}

fn apply_attack(
    attacker: &mut Fighter<'_>,
    defender: &mut Fighter<'_>,
    outcome: &DamageOutcome,
    now: f64,
    config: &BattleConfig,
    trace: &mut TraceCollector,
) {
    attacker.record_attack(outcome);
    if !outcome.is_miss {
        attacker.counters.damage_dealt += defender.take_damage(outcome.damage, config.allow_overkill);
    }
    let remaining = defender.hp;
    trace.record(|| {
        BattleLogEntry::attack(now, &attacker.stats.id, &defender.stats.id, outcome, remaining)
    });
}

/// A skill that fired this tick, held back until both sides have rolled.
#[derive(Debug, Clone, Copy)]
struct SkillCast<'a> {
    index: usize,
    skill: &'a Skill,
    damage: f64,
}

/// Evaluates the caster's skills in list order. The target's projected hp drops with each
/// planned cast, and planning stops once it would be dead.
fn plan_skills<'a>(
    caster: &Fighter<'a>,
    target: &Fighter<'_>,
    last_attack: &DamageOutcome,
    now: f64,
    config: &BattleConfig,
    rng: &mut Rng,
) -> Vec<SkillCast<'a>> {
    let stats: &'a UnitStats = caster.stats;
    let mut projected_hp = target.hp;
    let mut casts = Vec::new();
    for (index, skill) in stats.skills.iter().enumerate() {
        if projected_hp <= 0.0 {
            break;
        }
        if now + EPSILON < caster.skill_ready_at[index] {
            continue;
        }
        let context = TriggerContext {
            caster_hp_ratio: caster.hp_ratio(),
            target_hp_ratio: hp_ratio(projected_hp, target.stats.max_hp),
            turn_count: caster.counters.attacks,
            last_action_was_hit: !last_attack.is_miss,
            last_action_was_crit: last_attack.is_crit,
        };
        let fires = skill
            .trigger
            .as_ref()
            .map_or(true, |trigger| should_trigger(trigger, &context, rng));
        if !fires {
            continue;
        }
        let damage = skill_damage(stats, target.stats, skill, config, rng);
        projected_hp -= damage;
        casts.push(SkillCast { index, skill, damage });
    }
    casts
}

fn land_skills(
    caster: &mut Fighter<'_>,
    target: &mut Fighter<'_>,
    casts: Vec<SkillCast<'_>>,
    now: f64,
    config: &BattleConfig,
    trace: &mut TraceCollector,
) {
    for cast in casts {
        caster.skill_ready_at[cast.index] = now + cast.skill.cooldown;
        caster.counters.skill_casts += 1;
        caster.counters.damage_dealt += target.take_damage(cast.damage, config.allow_overkill);
        let remaining = target.hp;
        trace.record(|| {
            BattleLogEntry::skill(now, &caster.stats.id, &target.stats.id, &cast.skill.name, cast.damage, remaining)
        });
    }
}

fn skill_damage(
    caster: &UnitStats,
    target: &UnitStats,
    skill: &Skill,
    config: &BattleConfig,
    rng: &mut Rng,
) -> f64 {
    let raw = skill_raw_damage(caster, skill.damage, skill.damage_kind);
    resolve_skill_damage(raw, target.def, config.damage_formula, rng)
}

/// Serializes a battle log as JSON for UI/debug.
pub fn serialize_log_json(log: &[BattleLogEntry]) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string(log)
}
