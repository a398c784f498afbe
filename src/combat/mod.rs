pub mod damage;
pub mod engine;
pub mod export_csv;
pub mod rng;
pub mod stats;
pub mod synergy;
pub mod team;
pub mod triggers;

pub use damage::{
    base_damage, defense_reduction, effective_defense, hit_chance, resolve_damage,
    resolve_skill_damage, skill_raw_damage, DamageOutcome, REDUCTION_CAP,
};
pub use engine::{
    run_battle, serialize_log_json, simulate_battle, BattleAction, BattleLogEntry, BattleResult,
    BattleState, BattleWinner, CombatCounters, TraceCollector, DRAW_RATIO_TOLERANCE, EPSILON,
};
pub use export_csv::{
    battle_log_to_csv, histogram_to_csv, write_battle_log_csv, write_histogram_csv,
    write_team_units_csv,
};
pub use rng::{derive_seed, entropy_seed, Rng};
pub use stats::{
    ArmorPenetrationConfig, BattleConfig, Buff, DamageFormula, DefenseFormula, Skill,
    SkillDamageKind, SkillTrigger, StatKey, Synergy, TargetingMode, TeamSide, TraceMode,
    TriggerKind, TriggerSubject, UnitStats,
};
pub use synergy::{active_synergies, apply_synergies, gather_contributions, is_synergy_active};
pub use team::{run_team_battle, simulate_team_battle, TeamBattleResult, TeamWinner, UnitOutcome};
pub use triggers::{should_trigger, TriggerContext};
