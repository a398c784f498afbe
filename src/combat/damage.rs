//! Hit, crit and damage resolution for one attacker/defender pair.
//!
//! Inputs are assumed finite and non-negative (checked once by scenario validation before a
//! battle starts); under that precondition every formula here returns a finite, non-negative
//! damage value.

use serde::{Deserialize, Serialize};

use crate::combat::rng::Rng;
use crate::combat::stats::{
    ArmorPenetrationConfig, DamageFormula, DefenseFormula, SkillDamageKind, UnitStats,
};

/// Upper bound on fractional damage reduction for the capped formulas.
pub const REDUCTION_CAP: f64 = 0.9;
pub const RANDOM_VARIANCE_LOW: f64 = 0.9;
pub const RANDOM_VARIANCE_HIGH: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageOutcome {
    /// Rounded, always integral.
    pub damage: f64,
    pub is_crit: bool,
    pub is_miss: bool,
    pub effective_defense: f64,
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

pub fn hit_chance(attacker: &UnitStats, defender: &UnitStats) -> f64 {
    clamp01(attacker.accuracy() - defender.evasion())
}

/// Defense left after reductions then penetration, each flat step floored at 0.
pub fn effective_defense(base_defense: f64, penetration: Option<&ArmorPenetrationConfig>) -> f64 {
    let Some(pen) = penetration else {
        return base_defense;
    };
    let mut defense = base_defense * (1.0 - clamp01(pen.percent_reduction));
    defense = (defense - pen.flat_reduction).max(0.0);
    defense *= 1.0 - clamp01(pen.percent_penetration);
    (defense - pen.flat_penetration).max(0.0)
}

/// Fractional (or, for subtractive, absolute) reduction granted by `defense`.
pub fn defense_reduction(formula: DefenseFormula, defense: f64) -> f64 {
    match formula {
        DefenseFormula::Subtractive => defense,
        DefenseFormula::Divisive => defense / (defense + 100.0),
        DefenseFormula::Multiplicative => (defense / 100.0).min(REDUCTION_CAP),
        DefenseFormula::Logarithmic => ((defense + 10.0).log10() / 5.0).min(REDUCTION_CAP),
    }
}

fn simple_damage(atk: f64, defense: f64) -> f64 {
    (atk - defense).max(1.0)
}

fn mmorpg_damage(atk: f64, defense: f64) -> f64 {
    atk * 100.0 / (100.0 + defense)
}

fn percentage_damage(atk: f64, defense: f64) -> f64 {
    atk * (1.0 - (defense / 200.0).min(REDUCTION_CAP))
}

fn random_damage(atk: f64, defense: f64, rng: &mut Rng) -> f64 {
    let roll = rng.range_f64(RANDOM_VARIANCE_LOW, RANDOM_VARIANCE_HIGH);
    (atk * roll - defense).max(1.0)
}

fn multiplicative_damage(atk: f64, defense: f64, defense_formula: DefenseFormula) -> f64 {
    let reduction = defense_reduction(defense_formula, defense);
    match defense_formula {
        DefenseFormula::Subtractive => simple_damage(atk, reduction),
        _ => atk * (1.0 - reduction),
    }
}

/// Pre-crit damage for a basic attack under `formula`.
pub fn base_damage(
    atk: f64,
    defense: f64,
    formula: DamageFormula,
    defense_formula: DefenseFormula,
    rng: &mut Rng,
) -> f64 {
    match formula {
        DamageFormula::Simple => simple_damage(atk, defense),
        DamageFormula::Mmorpg => mmorpg_damage(atk, defense),
        DamageFormula::Percentage => percentage_damage(atk, defense),
        DamageFormula::Random => random_damage(atk, defense, rng),
        DamageFormula::Multiplicative => multiplicative_damage(atk, defense, defense_formula),
    }
}

/// Resolves one basic attack. Draw order: hit roll, then (on hit) crit roll, then any
/// formula variance.
pub fn resolve_damage(
    attacker: &UnitStats,
    defender: &UnitStats,
    formula: DamageFormula,
    defense_formula: DefenseFormula,
    penetration: Option<&ArmorPenetrationConfig>,
    rng: &mut Rng,
) -> DamageOutcome {
    if rng.next_f64() > hit_chance(attacker, defender) {
        return DamageOutcome {
            damage: 0.0,
            is_crit: false,
            is_miss: true,
            effective_defense: defender.def,
        };
    }

    let is_crit = rng.next_f64() < attacker.crit_rate();
    let crit_multiplier = if is_crit { attacker.crit_damage() } else { 1.0 };

    let effective_def = effective_defense(defender.def, penetration);
    let raw = base_damage(attacker.atk, effective_def, formula, defense_formula, rng);

    DamageOutcome {
        damage: (raw * crit_multiplier).round().max(0.0),
        is_crit,
        is_miss: false,
        effective_defense: effective_def,
    }
}

pub fn skill_raw_damage(caster: &UnitStats, damage: f64, kind: SkillDamageKind) -> f64 {
    match kind {
        SkillDamageKind::Flat => damage,
        SkillDamageKind::Multiplier => caster.atk * damage,
    }
}

/// Skill damage against the target's raw def: same formula as basic attacks, no armor
/// penetration, and the multiplicative formula reduces subtractively instead of consulting the
/// configured defense formula.
pub fn resolve_skill_damage(
    raw_damage: f64,
    target_defense: f64,
    formula: DamageFormula,
    rng: &mut Rng,
) -> f64 {
    let damage = match formula {
        DamageFormula::Multiplicative => simple_damage(raw_damage, target_defense),
        other => base_damage(
            raw_damage,
            target_defense,
            other,
            DefenseFormula::Subtractive,
            rng,
        ),
    };
    damage.round().max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(atk: f64, def: f64) -> UnitStats {
        UnitStats::new("u", 100.0, atk, def, 1.0)
    }

    #[test]
    fn no_penetration_leaves_defense_unchanged() {
        assert_eq!(effective_defense(42.0, None), 42.0);
    }

    #[test]
    fn penetration_steps_floor_at_zero() {
        let pen = ArmorPenetrationConfig {
            percent_reduction: 0.0,
            flat_reduction: 500.0,
            percent_penetration: 0.0,
            flat_penetration: 500.0,
        };
        assert_eq!(effective_defense(100.0, Some(&pen)), 0.0);
    }

    #[test]
    fn penetration_percent_terms_are_clamped() {
        let pen = ArmorPenetrationConfig {
            percent_reduction: -1.0,
            flat_reduction: 0.0,
            percent_penetration: 3.0,
            flat_penetration: 0.0,
        };
        assert_eq!(effective_defense(80.0, Some(&pen)), 0.0);
    }

    #[test]
    fn capped_formulas_never_exceed_ninety_percent() {
        assert_eq!(defense_reduction(DefenseFormula::Multiplicative, 1e6), REDUCTION_CAP);
        assert_eq!(defense_reduction(DefenseFormula::Logarithmic, 1e12), REDUCTION_CAP);
        let mut rng = Rng::new(1);
        let dmg = base_damage(100.0, 1e9, DamageFormula::Percentage, DefenseFormula::Subtractive, &mut rng);
        assert!((dmg - 10.0).abs() < 1e-9);
    }

    #[test]
    fn divisive_and_mmorpg_approach_but_never_reach_full_reduction() {
        let reduction = defense_reduction(DefenseFormula::Divisive, 1e9);
        assert!(reduction < 1.0);
        let mut rng = Rng::new(1);
        let dmg = base_damage(100.0, 1e6, DamageFormula::Mmorpg, DefenseFormula::Subtractive, &mut rng);
        assert!(dmg > 0.0);
    }

    #[test]
    fn logarithmic_reduction_matches_closed_form() {
        let expected = (90.0f64 + 10.0).log10() / 5.0;
        assert!((defense_reduction(DefenseFormula::Logarithmic, 90.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn guaranteed_miss_short_circuits() {
        let attacker = unit(100.0, 0.0).with_accuracy(0.5);
        let defender = unit(0.0, 30.0).with_evasion(0.5);
        let mut rng = Rng::new(11);
        for _ in 0..200 {
            let outcome = resolve_damage(
                &attacker,
                &defender,
                DamageFormula::Simple,
                DefenseFormula::Subtractive,
                None,
                &mut rng,
            );
            if outcome.is_miss {
                assert_eq!(outcome.damage, 0.0);
                assert_eq!(outcome.effective_defense, 30.0);
                assert!(!outcome.is_crit);
            }
        }
    }

    #[test]
    fn guaranteed_crit_applies_crit_multiplier() {
        let attacker = unit(100.0, 0.0).with_crit(1.0, 2.0);
        let defender = unit(0.0, 20.0);
        let mut rng = Rng::new(5);
        let outcome = resolve_damage(
            &attacker,
            &defender,
            DamageFormula::Simple,
            DefenseFormula::Subtractive,
            None,
            &mut rng,
        );
        assert!(outcome.is_crit);
        assert_eq!(outcome.damage, 160.0);
    }

    #[test]
    fn skill_damage_under_multiplicative_reduces_subtractively() {
        let mut rng = Rng::new(2);
        let dmg = resolve_skill_damage(150.0, 50.0, DamageFormula::Multiplicative, &mut rng);
        assert_eq!(dmg, 100.0);
        let mmorpg = resolve_skill_damage(150.0, 50.0, DamageFormula::Mmorpg, &mut rng);
        assert_eq!(mmorpg, 100.0);
    }

    #[test]
    fn skill_raw_damage_scales_with_atk_for_multipliers() {
        let caster = unit(40.0, 0.0);
        assert_eq!(skill_raw_damage(&caster, 2.5, SkillDamageKind::Multiplier), 100.0);
        assert_eq!(skill_raw_damage(&caster, 25.0, SkillDamageKind::Flat), 25.0);
    }
}
