use skirmish::analysis::{run_team_monte_carlo, MonteCarloConfig, TeamMatchup};
use skirmish::combat::{
    active_synergies, apply_synergies, run_team_battle, simulate_team_battle, BattleAction,
    BattleConfig, Buff, Rng, Synergy, TargetingMode, TeamSide, TeamWinner, UnitStats,
};
use skirmish::SimError;

fn approx_eq(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "expected {b}, got {a}");
}

fn strong_trio() -> Vec<UnitStats> {
    (1..=3)
        .map(|i| UnitStats::new(format!("knight{i}"), 1000.0, 200.0, 0.0, 1.0))
        .collect()
}

fn synergy(id: &str, required: &[&str], buffs: Vec<Buff>) -> Synergy {
    Synergy {
        id: id.to_string(),
        required_units: required.iter().map(|id| id.to_string()).collect(),
        buffs,
    }
}

#[test]
fn focused_trio_kills_lone_unit_before_it_acts() {
    let lone = vec![UnitStats::new("lone", 100.0, 10.0, 0.0, 1.0)];
    let result = simulate_team_battle(
        &strong_trio(),
        &lone,
        &BattleConfig::default(),
        TargetingMode::Focused,
        &mut Rng::new(4),
    )
    .expect("valid rosters");

    assert_eq!(result.winner, TeamWinner::Team1);
    approx_eq(result.duration, 1.0, 1e-9);
    assert_eq!(result.team1_survivors, 3);
    assert_eq!(result.team2_survivors, 0);
    assert_eq!(result.team2_total_damage, 0.0);
    assert_eq!(result.units[0].kills, 1);
    assert_eq!(result.units[1].kills, 0);
    assert!(!result.units[3].survived);
    assert_eq!(result.units[3].team, TeamSide::Team2);
}

#[test]
fn focused_trio_wins_every_monte_carlo_run() {
    let matchup = TeamMatchup::new(
        strong_trio(),
        vec![UnitStats::new("lone", 100.0, 10.0, 0.0, 1.0)],
        BattleConfig::default(),
    )
    .with_targeting(TargetingMode::Focused);
    let config = MonteCarloConfig::default().with_runs(1000).with_seed(17);
    let result = run_team_monte_carlo(&matchup, &config).expect("valid matchup");

    assert_eq!(result.team1_wins, 1000);
    approx_eq(result.team1_win_rate, 1.0, 0.0);
    assert!(result.team1_win_rate_ci.lower > 0.95, "ci={:?}", result.team1_win_rate_ci);
    approx_eq(result.team1_win_rate_ci.upper, 1.0, 1e-12);
    approx_eq(result.team1_ttk.median, 1.0, 1e-9);
    approx_eq(result.avg_team1_survivors, 3.0, 1e-12);
    approx_eq(result.units[3].survival_rate, 0.0, 0.0);
}

#[test]
fn lowest_hp_targeting_opens_on_the_weakest_enemy() {
    let team1 = vec![UnitStats::new("striker", 1000.0, 50.0, 0.0, 1.0)];
    let team2 = vec![
        UnitStats::new("wall", 300.0, 1.0, 0.0, 1.0),
        UnitStats::new("weak", 40.0, 1.0, 0.0, 1.0),
    ];
    let result = run_team_battle(&team1, &team2, &BattleConfig::default(), TargetingMode::LowestHp, &mut Rng::new(1));

    let first_attack = result
        .log
        .iter()
        .find(|entry| entry.action == BattleAction::Attack)
        .expect("at least one attack");
    assert_eq!(first_attack.actor, "striker");
    assert_eq!(first_attack.target.as_deref(), Some("weak"));
    assert_eq!(result.winner, TeamWinner::Team1);
    assert_eq!(result.units[0].kills, 2);
}

#[test]
fn highest_atk_targeting_prefers_the_biggest_threat() {
    let team1 = vec![UnitStats::new("striker", 1000.0, 50.0, 0.0, 1.0)];
    let team2 = vec![
        UnitStats::new("healer", 200.0, 5.0, 0.0, 1.0),
        UnitStats::new("brute", 200.0, 30.0, 0.0, 1.0),
    ];
    let result = run_team_battle(&team1, &team2, &BattleConfig::default(), TargetingMode::HighestAtk, &mut Rng::new(1));
    assert_eq!(result.log[0].target.as_deref(), Some("brute"));
}

#[test]
fn equal_survivors_at_timeout_use_hp_ratio_sum() {
    let config = BattleConfig {
        max_duration: 5.0,
        ..BattleConfig::default()
    };
    let team1 = vec![UnitStats::new("a", 1000.0, 30.0, 0.0, 1.0)];
    let team2 = vec![UnitStats::new("b", 1000.0, 10.0, 0.0, 1.0)];
    let result = run_team_battle(&team1, &team2, &config, TargetingMode::Focused, &mut Rng::new(1));
    assert_eq!(result.winner, TeamWinner::Team1);
    approx_eq(result.duration, 5.0, 1e-9);
    assert_eq!(result.team1_survivors, 1);
    assert_eq!(result.team2_survivors, 1);

    let mirror = run_team_battle(&team2, &team2, &config, TargetingMode::Focused, &mut Rng::new(1));
    assert_eq!(mirror.winner, TeamWinner::Draw);
}

#[test]
fn empty_rosters_are_rejected() {
    let err = simulate_team_battle(
        &strong_trio(),
        &[],
        &BattleConfig::default(),
        TargetingMode::Random,
        &mut Rng::new(1),
    )
    .expect_err("team2 is empty");
    assert!(matches!(err, SimError::EmptyRoster(TeamSide::Team2)));
}

#[test]
fn synergy_requires_presence_not_survival_and_leaves_input_untouched() {
    let roster = vec![
        UnitStats::new("mage", 100.0, 40.0, 5.0, 1.0),
        UnitStats::new("priest", 0.0, 10.0, 5.0, 1.0),
    ];
    let synergies = vec![
        synergy(
            "arcane_bond",
            &["mage", "priest"],
            vec![Buff::percent("atk", 0.5), Buff::flat("def", 10.0), Buff::flat("mana", 99.0)],
        ),
        synergy("missing", &["mage", "rogue"], vec![Buff::flat("atk", 1000.0)]),
    ];

    let buffed = apply_synergies(&roster, &synergies);
    assert_eq!(active_synergies(&roster, &synergies), vec!["arcane_bond"]);
    approx_eq(buffed[0].atk, 60.0, 1e-9);
    approx_eq(buffed[0].def, 15.0, 1e-9);
    approx_eq(buffed[1].atk, 15.0, 1e-9);
    assert_eq!(roster[0].atk, 40.0);
}

#[test]
fn stacked_percent_buffs_compound_in_order() {
    let roster = vec![UnitStats::new("solo", 100.0, 100.0, 0.0, 1.0)];
    let synergies = vec![
        synergy("first", &["solo"], vec![Buff::percent("atk", 0.1), Buff::flat("atk", 10.0)]),
        synergy("second", &["solo"], vec![Buff::percent("atk", 0.1)]),
    ];
    let buffed = apply_synergies(&roster, &synergies);
    approx_eq(buffed[0].atk, (100.0 * 1.1 + 10.0) * 1.1, 1e-9);
}

#[test]
fn team_monte_carlo_reports_active_synergies_and_buffed_damage() {
    let team1 = vec![UnitStats::new("duo_a", 500.0, 20.0, 0.0, 1.0), UnitStats::new("duo_b", 500.0, 20.0, 0.0, 1.0)];
    let team2 = vec![UnitStats::new("foe", 2000.0, 15.0, 0.0, 1.0)];
    let matchup = TeamMatchup::new(team1, team2, BattleConfig::default()).with_synergies(
        vec![synergy("pair", &["duo_a", "duo_b"], vec![Buff::percent("atk", 1.0)])],
        Vec::new(),
    );
    let config = MonteCarloConfig::default().with_runs(20).with_seed(2);
    let result = run_team_monte_carlo(&matchup, &config).expect("valid matchup");

    assert_eq!(result.team1_active_synergies, vec!["pair".to_string()]);
    assert!(result.team2_active_synergies.is_empty());
    // 2 units x 40 atk against 2000 hp: the foe dies on the 25th second.
    approx_eq(result.team1_ttk.median, 25.0, 1e-9);
    approx_eq(result.units[0].avg_damage_dealt, 1000.0, 1e-9);
}
