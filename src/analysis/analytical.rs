//! Closed-form expectations used to sanity-check the stochastic results.

use crate::combat::damage::{defense_reduction, hit_chance};
use crate::combat::{DefenseFormula, UnitStats};

/// atk × speed × (1 + critRate × (critDamage − 1)). Ignores defense and misses.
pub fn theoretical_dps(unit: &UnitStats) -> f64 {
    unit.atk * unit.speed * (1.0 + unit.crit_rate() * (unit.crit_damage() - 1.0))
}

/// Expected DPS against `defender`, folding in hit chance but not defense.
pub fn expected_hit_dps(attacker: &UnitStats, defender: &UnitStats) -> f64 {
    theoretical_dps(attacker) * hit_chance(attacker, defender)
}

/// HP scaled by the fractional reduction `formula` grants at `unit.def`. Subtractive defense is
/// not a fraction, so the raw hp is returned.
pub fn effective_hp(unit: &UnitStats, formula: DefenseFormula) -> f64 {
    match formula {
        DefenseFormula::Subtractive => unit.hp,
        other => unit.hp / (1.0 - defense_reduction(other, unit.def)),
    }
}
