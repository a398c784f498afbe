//! Plain data records consumed by the simulators: unit stats, skills, buffs, synergies and the
//! battle configuration. All of them are value objects built fresh per simulation call.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TIME_STEP: f64 = 0.1;
pub const DEFAULT_MAX_DURATION: f64 = 60.0;
pub const DEFAULT_CRIT_DAMAGE: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub id: String,
    pub name: String,
    pub hp: f64,
    pub max_hp: f64,
    pub atk: f64,
    pub def: f64,
    /// Attacks per second. Must be positive.
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crit_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crit_damage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evasion: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<Skill>,
}

impl UnitStats {
    /// Full-health unit with neutral modifiers.
    pub fn new(id: impl Into<String>, hp: f64, atk: f64, def: f64, speed: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            hp,
            max_hp: hp,
            atk,
            def,
            speed,
            crit_rate: None,
            crit_damage: None,
            accuracy: None,
            evasion: None,
            skills: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_crit(mut self, rate: f64, damage: f64) -> Self {
        self.crit_rate = Some(rate);
        self.crit_damage = Some(damage);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_evasion(mut self, evasion: f64) -> Self {
        self.evasion = Some(evasion);
        self
    }

    pub fn with_skill(mut self, skill: Skill) -> Self {
        self.skills.push(skill);
        self
    }

    pub fn crit_rate(&self) -> f64 {
        self.crit_rate.unwrap_or(0.0)
    }

    pub fn crit_damage(&self) -> f64 {
        self.crit_damage.unwrap_or(DEFAULT_CRIT_DAMAGE)
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy.unwrap_or(1.0)
    }

    pub fn evasion(&self) -> f64 {
        self.evasion.unwrap_or(0.0)
    }

    /// Seconds between attacks. Callers validate `speed > 0` before simulating.
    pub fn attack_interval(&self) -> f64 {
        1.0 / self.speed
    }

    pub fn hp_ratio(&self) -> f64 {
        hp_ratio(self.hp, self.max_hp)
    }

    /// Reads a numeric stat by key.
    pub fn stat(&self, key: StatKey) -> f64 {
        match key {
            StatKey::Hp => self.hp,
            StatKey::MaxHp => self.max_hp,
            StatKey::Atk => self.atk,
            StatKey::Def => self.def,
            StatKey::Speed => self.speed,
            StatKey::CritRate => self.crit_rate(),
            StatKey::CritDamage => self.crit_damage(),
            StatKey::Accuracy => self.accuracy(),
            StatKey::Evasion => self.evasion(),
        }
    }

    pub fn set_stat(&mut self, key: StatKey, value: f64) {
        match key {
            StatKey::Hp => self.hp = value,
            StatKey::MaxHp => self.max_hp = value,
            StatKey::Atk => self.atk = value,
            StatKey::Def => self.def = value,
            StatKey::Speed => self.speed = value,
            StatKey::CritRate => self.crit_rate = Some(value),
            StatKey::CritDamage => self.crit_damage = Some(value),
            StatKey::Accuracy => self.accuracy = Some(value),
            StatKey::Evasion => self.evasion = Some(value),
        }
    }
}

pub fn hp_ratio(hp: f64, max_hp: f64) -> f64 {
    if max_hp > 0.0 {
        hp / max_hp
    } else {
        0.0
    }
}

/// Numeric stats a [Buff] may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatKey {
    Hp,
    MaxHp,
    Atk,
    Def,
    Speed,
    CritRate,
    CritDamage,
    Accuracy,
    Evasion,
}

impl StatKey {
    /// Accepts snake_case and camelCase stat names. Anything else is not a numeric stat.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "hp" => Some(Self::Hp),
            "max_hp" | "maxHp" => Some(Self::MaxHp),
            "atk" => Some(Self::Atk),
            "def" => Some(Self::Def),
            "speed" => Some(Self::Speed),
            "crit_rate" | "critRate" => Some(Self::CritRate),
            "crit_damage" | "critDamage" => Some(Self::CritDamage),
            "accuracy" => Some(Self::Accuracy),
            "evasion" => Some(Self::Evasion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillDamageKind {
    /// `damage` is a flat amount.
    Flat,
    /// `damage` multiplies the caster's atk.
    Multiplier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub damage: f64,
    pub damage_kind: SkillDamageKind,
    /// Seconds before the skill may be evaluated again after firing.
    pub cooldown: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<SkillTrigger>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    HpBelow,
    HpAbove,
    Turn,
    OnHit,
    OnCrit,
    Always,
}

/// Whose HP ratio an `hp_below` / `hp_above` trigger reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSubject {
    #[default]
    Caster,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillTrigger {
    pub kind: TriggerKind,
    #[serde(default)]
    pub value: f64,
    /// Firing probability in [0, 1]; absent means always.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chance: Option<f64>,
    #[serde(default)]
    pub subject: TriggerSubject,
}

impl SkillTrigger {
    pub fn new(kind: TriggerKind, value: f64) -> Self {
        Self {
            kind,
            value,
            chance: None,
            subject: TriggerSubject::Caster,
        }
    }

    pub fn with_chance(mut self, chance: f64) -> Self {
        self.chance = Some(chance);
        self
    }

    pub fn on_target(mut self) -> Self {
        self.subject = TriggerSubject::Target;
        self
    }

    pub fn chance(&self) -> f64 {
        self.chance.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buff {
    /// Target stat name, e.g. `atk` or `crit_rate`.
    pub stat: String,
    pub value: f64,
    #[serde(default)]
    pub is_percent: bool,
    /// Carried for the authoring layer; roster buffs are applied once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Buff {
    pub fn flat(stat: impl Into<String>, value: f64) -> Self {
        Self {
            stat: stat.into(),
            value,
            is_percent: false,
            duration: None,
        }
    }

    pub fn percent(stat: impl Into<String>, value: f64) -> Self {
        Self {
            stat: stat.into(),
            value,
            is_percent: true,
            duration: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synergy {
    pub id: String,
    pub required_units: Vec<String>,
    pub buffs: Vec<Buff>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmorPenetrationConfig {
    /// Defender-side debuff, fraction of defense removed first.
    pub percent_reduction: f64,
    pub flat_reduction: f64,
    /// Attacker-side penetration, applied after reductions.
    pub percent_penetration: f64,
    pub flat_penetration: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageFormula {
    #[default]
    Simple,
    Mmorpg,
    Percentage,
    Random,
    Multiplicative,
}

/// Only consulted by [DamageFormula::Multiplicative].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefenseFormula {
    #[default]
    Subtractive,
    Divisive,
    Multiplicative,
    Logarithmic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetingMode {
    Random,
    LowestHp,
    HighestAtk,
    #[default]
    Focused,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceMode {
    Off,
    #[default]
    Events,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Seconds of simulated time before the battle is resolved by HP ratio.
    pub max_duration: f64,
    pub time_step: f64,
    pub damage_formula: DamageFormula,
    pub defense_formula: DefenseFormula,
    pub allow_overkill: bool,
    pub armor_penetration: Option<ArmorPenetrationConfig>,
    pub skills_enabled: bool,
    pub trace: TraceMode,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            max_duration: DEFAULT_MAX_DURATION,
            time_step: DEFAULT_TIME_STEP,
            damage_formula: DamageFormula::Simple,
            defense_formula: DefenseFormula::Subtractive,
            allow_overkill: false,
            armor_penetration: None,
            skills_enabled: true,
            trace: TraceMode::Events,
        }
    }
}

impl BattleConfig {
    pub fn with_formula(mut self, formula: DamageFormula) -> Self {
        self.damage_formula = formula;
        self
    }

    pub fn with_trace(mut self, trace: TraceMode) -> Self {
        self.trace = trace;
        self
    }

    /// Number of whole ticks in `max_duration`.
    pub fn tick_count(&self) -> u64 {
        (self.max_duration / self.time_step + crate::combat::EPSILON).floor() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    Team1,
    Team2,
}

impl fmt::Display for TeamSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Team1 => write!(f, "team1"),
            Self::Team2 => write!(f, "team2"),
        }
    }
}
