use skirmish::combat::{
    base_damage, effective_defense, resolve_damage, resolve_skill_damage, run_battle,
    serialize_log_json, simulate_battle, ArmorPenetrationConfig, BattleAction, BattleConfig,
    BattleWinner, DamageFormula, DefenseFormula, Rng, Skill, SkillDamageKind, SkillTrigger,
    TraceMode, TriggerKind, UnitStats, REDUCTION_CAP,
};
use skirmish::SimError;
use serde_json::Value;

fn approx_eq(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "expected {b}, got {a}");
}

fn finisher(trigger: SkillTrigger) -> Skill {
    Skill {
        id: "finisher".to_string(),
        name: "Finisher".to_string(),
        damage: 500.0,
        damage_kind: SkillDamageKind::Flat,
        cooldown: 100.0,
        trigger: Some(trigger),
    }
}

#[test]
fn simple_formula_is_atk_minus_def_floored_at_one() {
    let mut rng = Rng::new(3);
    for (atk, def, expected) in [(50.0, 20.0, 30.0), (5.0, 20.0, 1.0), (0.0, 0.0, 1.0), (80.0, 0.0, 80.0)] {
        let attacker = UnitStats::new("a", 100.0, atk, 0.0, 1.0);
        let defender = UnitStats::new("d", 100.0, 0.0, def, 1.0);
        let outcome = resolve_damage(
            &attacker,
            &defender,
            DamageFormula::Simple,
            DefenseFormula::Subtractive,
            None,
            &mut rng,
        );
        assert!(!outcome.is_miss && !outcome.is_crit);
        assert_eq!(outcome.damage, expected, "atk={atk} def={def}");
    }
}

#[test]
fn armor_penetration_applies_in_fixed_order() {
    let pen = ArmorPenetrationConfig {
        percent_reduction: 0.5,
        flat_reduction: 10.0,
        percent_penetration: 0.5,
        flat_penetration: 5.0,
    };
    approx_eq(effective_defense(100.0, Some(&pen)), 15.0, 1e-12);
    approx_eq(effective_defense(100.0, None), 100.0, 0.0);
}

#[test]
fn capped_formulas_never_exceed_ninety_percent_reduction() {
    let mut rng = Rng::new(1);
    approx_eq(
        base_damage(100.0, 10_000.0, DamageFormula::Percentage, DefenseFormula::Subtractive, &mut rng),
        100.0 * (1.0 - REDUCTION_CAP),
        1e-9,
    );
    for defense_formula in [DefenseFormula::Multiplicative, DefenseFormula::Logarithmic] {
        let damage = base_damage(100.0, 1.0e9, DamageFormula::Multiplicative, defense_formula, &mut rng);
        approx_eq(damage, 100.0 * (1.0 - REDUCTION_CAP), 1e-9);
    }
    let divisive = base_damage(100.0, 1.0e9, DamageFormula::Multiplicative, DefenseFormula::Divisive, &mut rng);
    assert!(divisive > 0.0 && divisive < 1e-3);
}

#[test]
fn skill_damage_under_multiplicative_formula_reduces_subtractively() {
    let mut rng = Rng::new(1);
    let basic = base_damage(100.0, 100.0, DamageFormula::Multiplicative, DefenseFormula::Divisive, &mut rng);
    approx_eq(basic, 50.0, 1e-9);
    let skill = resolve_skill_damage(100.0, 100.0, DamageFormula::Multiplicative, &mut rng);
    assert_eq!(skill, 1.0);
}

#[test]
fn strong_unit_kills_harmless_unit_on_first_attack() {
    let a = UnitStats::new("a", 1000.0, 100.0, 0.0, 1.0);
    let b = UnitStats::new("b", 50.0, 0.0, 0.0, 1.0);
    let mut rng = Rng::new(11);
    let result = simulate_battle(&a, &b, &BattleConfig::default(), &mut rng).expect("valid units");

    assert_eq!(result.winner, BattleWinner::Unit1);
    approx_eq(result.duration, 1.0, 1e-9);
    assert_eq!(result.unit2_final_hp, 0.0);
    assert!(result.unit1_final_hp >= 999.0);
    assert_eq!(result.unit1.attacks, 1);
    assert_eq!(result.unit1_total_damage(), 50.0);
    assert!(result
        .log
        .iter()
        .any(|entry| entry.action == BattleAction::Death && entry.actor == "b"));
}

#[test]
fn identical_deterministic_units_give_identical_results() {
    let unit = UnitStats::new("twin", 500.0, 40.0, 10.0, 1.3);
    let config = BattleConfig::default();
    let reference = run_battle(&unit, &unit, &config, &mut Rng::new(0));
    for seed in 1..25 {
        let result = run_battle(&unit, &unit, &config, &mut Rng::new(seed));
        assert_eq!(result.winner, reference.winner);
        assert_eq!(result.duration, reference.duration);
    }
    // Simultaneous attacks finish both twins on the same tick.
    assert_eq!(reference.winner, BattleWinner::Draw);
}

#[test]
fn timeout_is_decided_by_hp_ratio() {
    let config = BattleConfig {
        max_duration: 10.0,
        ..BattleConfig::default()
    };
    let weak = UnitStats::new("weak", 1000.0, 10.0, 0.0, 1.0);
    let strong = UnitStats::new("strong", 1000.0, 20.0, 0.0, 1.0);
    let result = run_battle(&weak, &strong, &config, &mut Rng::new(2));
    assert_eq!(result.winner, BattleWinner::Unit2);
    approx_eq(result.duration, 10.0, 1e-9);
    assert_eq!(result.unit1_final_hp, 800.0);
    assert_eq!(result.unit2_final_hp, 900.0);

    let mirror = run_battle(&weak, &weak, &config, &mut Rng::new(2));
    assert_eq!(mirror.winner, BattleWinner::Draw);
}

#[test]
fn overkill_flag_controls_hp_floor_and_accounting() {
    let a = UnitStats::new("a", 1000.0, 100.0, 0.0, 1.0);
    let b = UnitStats::new("b", 50.0, 0.0, 0.0, 1.0);

    let floored = run_battle(&a, &b, &BattleConfig::default(), &mut Rng::new(1));
    assert_eq!(floored.unit2_final_hp, 0.0);
    assert_eq!(floored.unit1.damage_dealt, 50.0);

    let config = BattleConfig {
        allow_overkill: true,
        ..BattleConfig::default()
    };
    let overkill = run_battle(&a, &b, &config, &mut Rng::new(1));
    assert_eq!(overkill.unit2_final_hp, -50.0);
    assert_eq!(overkill.unit1.damage_dealt, 100.0);
    assert_eq!(overkill.winner, BattleWinner::Unit1);
}

#[test]
fn triggered_skill_fires_after_basic_attack() {
    let caster = UnitStats::new("caster", 10_000.0, 60.0, 0.0, 1.0)
        .with_skill(finisher(SkillTrigger::new(TriggerKind::HpBelow, 0.5).on_target()));
    let target = UnitStats::new("target", 100.0, 1.0, 0.0, 1.0);

    let result = run_battle(&caster, &target, &BattleConfig::default(), &mut Rng::new(5));
    assert_eq!(result.winner, BattleWinner::Unit1);
    approx_eq(result.duration, 1.0, 1e-9);
    assert_eq!(result.unit1.skill_casts, 1);
    assert_eq!(result.unit1.damage_dealt, 100.0);
    let skill_entry = result
        .log
        .iter()
        .find(|entry| entry.action == BattleAction::Skill)
        .expect("skill should be logged");
    assert_eq!(skill_entry.skill_name.as_deref(), Some("Finisher"));
    assert_eq!(skill_entry.damage, Some(500.0));

    let config = BattleConfig {
        skills_enabled: false,
        ..BattleConfig::default()
    };
    let without = run_battle(&caster, &target, &config, &mut Rng::new(5));
    assert_eq!(without.unit1.skill_casts, 0);
    approx_eq(without.duration, 2.0, 1e-9);
}

#[test]
fn caster_hp_trigger_waits_for_threshold() {
    // The caster's own hp never drops below half, so the skill never fires.
    let caster = UnitStats::new("caster", 10_000.0, 60.0, 0.0, 1.0)
        .with_skill(finisher(SkillTrigger::new(TriggerKind::HpBelow, 0.5)));
    let target = UnitStats::new("target", 100.0, 1.0, 0.0, 1.0);
    let result = run_battle(&caster, &target, &BattleConfig::default(), &mut Rng::new(5));
    assert_eq!(result.unit1.skill_casts, 0);
    approx_eq(result.duration, 2.0, 1e-9);
}

#[test]
fn zero_chance_trigger_never_fires() {
    let caster = UnitStats::new("caster", 1000.0, 10.0, 0.0, 2.0)
        .with_skill(finisher(SkillTrigger::new(TriggerKind::Always, 0.0).with_chance(0.0)));
    let target = UnitStats::new("target", 1000.0, 10.0, 0.0, 2.0);
    let result = run_battle(&caster, &target, &BattleConfig::default(), &mut Rng::new(8));
    assert_eq!(result.unit1.skill_casts, 0);
}

#[test]
fn non_positive_speed_is_rejected_before_the_battle() {
    let stalled = UnitStats::new("stalled", 100.0, 10.0, 0.0, 0.0);
    let other = UnitStats::new("other", 100.0, 10.0, 0.0, 1.0);
    let err = simulate_battle(&stalled, &other, &BattleConfig::default(), &mut Rng::new(1))
        .expect_err("speed 0 must be rejected");
    assert!(matches!(err, SimError::InvalidUnit { ref unit, .. } if unit == "stalled"));
}

#[test]
fn trace_off_keeps_counters_but_no_log() {
    let a = UnitStats::new("a", 300.0, 25.0, 5.0, 1.2).with_crit(0.3, 2.0);
    let b = UnitStats::new("b", 300.0, 20.0, 5.0, 1.0).with_evasion(0.2);
    let config = BattleConfig::default().with_trace(TraceMode::Off);
    let quiet = run_battle(&a, &b, &config, &mut Rng::new(21));
    let traced = run_battle(&a, &b, &BattleConfig::default(), &mut Rng::new(21));

    assert!(quiet.log.is_empty());
    assert!(!traced.log.is_empty());
    assert_eq!(quiet.unit1, traced.unit1);
    assert_eq!(quiet.winner, traced.winner);
    assert_eq!(quiet.unit1.attacks, quiet.unit1.hits + quiet.unit1.misses);
}

#[test]
fn serialize_log_json_emits_snake_case_actions() {
    let a = UnitStats::new("a", 1000.0, 100.0, 0.0, 1.0);
    let b = UnitStats::new("b", 50.0, 0.0, 0.0, 1.0);
    let result = run_battle(&a, &b, &BattleConfig::default(), &mut Rng::new(1));
    let payload = serialize_log_json(&result.log).expect("log should serialize");
    let value: Value = serde_json::from_str(&payload).expect("valid json");
    let entries = value.as_array().expect("array of entries");
    assert!(entries.iter().any(|entry| entry["action"] == "attack"));
    assert!(entries.iter().any(|entry| entry["action"] == "death"));
    assert!(entries.iter().all(|entry| entry["time"].is_number()));
}

fn nuke() -> Skill {
    Skill {
        id: "nuke".to_string(),
        name: "Nuke".to_string(),
        damage: 1000.0,
        damage_kind: SkillDamageKind::Flat,
        cooldown: 5.0,
        trigger: None,
    }
}

#[test]
fn mirrored_lethal_skills_land_on_the_same_tick() {
    let twin = UnitStats::new("twin", 500.0, 10.0, 0.0, 1.0).with_skill(nuke());
    for seed in 0..20 {
        let result = run_battle(&twin, &twin, &BattleConfig::default(), &mut Rng::new(seed));
        assert_eq!(result.winner, BattleWinner::Draw, "seed={seed}");
        approx_eq(result.duration, 1.0, 1e-9);
        assert_eq!(result.unit1_final_hp, 0.0);
        assert_eq!(result.unit2_final_hp, 0.0);
        assert_eq!(result.unit1.skill_casts, 1);
        assert_eq!(result.unit2.skill_casts, 1);
        assert_eq!(result.unit1.damage_dealt, 500.0);
        assert_eq!(result.unit2.damage_dealt, 500.0);
    }
}

#[test]
fn skills_of_one_caster_stop_once_the_target_would_die() {
    let caster = UnitStats::new("caster", 5000.0, 10.0, 0.0, 1.0)
        .with_skill(nuke())
        .with_skill(Skill {
            id: "echo".to_string(),
            ..nuke()
        });
    let target = UnitStats::new("target", 800.0, 1.0, 0.0, 1.0);
    let result = run_battle(&caster, &target, &BattleConfig::default(), &mut Rng::new(4));
    assert_eq!(result.winner, BattleWinner::Unit1);
    assert_eq!(result.unit1.skill_casts, 1);
    assert_eq!(result.unit1.damage_dealt, 800.0);
}

#[test]
fn death_entry_reports_negative_hp_under_overkill() {
    let a = UnitStats::new("a", 1000.0, 100.0, 0.0, 1.0);
    let b = UnitStats::new("b", 50.0, 0.0, 0.0, 1.0);
    let config = BattleConfig {
        allow_overkill: true,
        ..BattleConfig::default()
    };
    let result = run_battle(&a, &b, &config, &mut Rng::new(1));
    let death = result
        .log
        .iter()
        .find(|entry| entry.action == BattleAction::Death)
        .expect("death should be logged");
    assert_eq!(death.actor, "b");
    assert_eq!(death.remaining_hp, Some(-50.0));
}

#[test]
fn uncapped_formulas_match_closed_forms() {
    let mut rng = Rng::new(6);
    let percentage = base_damage(100.0, 100.0, DamageFormula::Percentage, DefenseFormula::Subtractive, &mut rng);
    approx_eq(percentage, 50.0, 1e-9);
    let mmorpg = base_damage(100.0, 100.0, DamageFormula::Mmorpg, DefenseFormula::Subtractive, &mut rng);
    approx_eq(mmorpg, 50.0, 1e-9);
    let mmorpg_light = base_damage(150.0, 50.0, DamageFormula::Mmorpg, DefenseFormula::Subtractive, &mut rng);
    approx_eq(mmorpg_light, 100.0, 1e-9);
}

#[test]
fn random_formula_varies_within_ten_percent_and_floors_at_one() {
    let mut rng = Rng::new(13);
    for _ in 0..2_000 {
        let spread = base_damage(100.0, 0.0, DamageFormula::Random, DefenseFormula::Subtractive, &mut rng);
        assert!((90.0..=110.0).contains(&spread), "damage={spread}");
        let blocked = base_damage(10.0, 100.0, DamageFormula::Random, DefenseFormula::Subtractive, &mut rng);
        assert_eq!(blocked, 1.0);
    }
}
