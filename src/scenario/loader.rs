//! Scenario files: a duel or team matchup plus its battle and Monte Carlo settings.
//!
//! JSON by default; `.yaml` / `.yml` files are read as YAML. The top-level `mode` tag selects
//! the variant.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::monte_carlo::{MonteCarloConfig, TeamMatchup};
use crate::combat::stats::{BattleConfig, Synergy, TargetingMode, UnitStats};
use crate::error::{Result, SimError};
use crate::scenario::validate::{
    validate_battle_config, validate_roster, validate_unit, DiagnosticScope, ValidationReport,
    ValidationSeverity,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuelScenario {
    pub unit1: UnitStats,
    pub unit2: UnitStats,
    #[serde(default)]
    pub battle: BattleConfig,
    #[serde(default)]
    pub monte_carlo: MonteCarloConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamScenario {
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
    #[serde(default)]
    pub monte_carlo: MonteCarloConfig,
}

impl TeamScenario {
    pub fn matchup(&self) -> TeamMatchup {
        TeamMatchup::new(self.team1.clone(), self.team2.clone(), self.battle)
            .with_targeting(self.targeting)
            .with_synergies(self.team1_synergies.clone(), self.team2_synergies.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Scenario {
    Duel(DuelScenario),
    Team(TeamScenario),
}

impl Scenario {
    pub fn battle(&self) -> &BattleConfig {
        match self {
            Self::Duel(duel) => &duel.battle,
            Self::Team(team) => &team.battle,
        }
    }

    pub fn monte_carlo(&self) -> &MonteCarloConfig {
        match self {
            Self::Duel(duel) => &duel.monte_carlo,
            Self::Team(team) => &team.monte_carlo,
        }
    }

    pub fn monte_carlo_mut(&mut self) -> &mut MonteCarloConfig {
        match self {
            Self::Duel(duel) => &mut duel.monte_carlo,
            Self::Team(team) => &mut team.monte_carlo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioFormat {
    Json,
    Yaml,
}

impl ScenarioFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

pub fn parse_scenario(raw: &str, format: ScenarioFormat) -> Result<Scenario> {
    let scenario = match format {
        ScenarioFormat::Json => serde_json::from_str(raw)?,
        ScenarioFormat::Yaml => serde_yaml::from_str(raw)?,
    };
    Ok(scenario)
}

pub fn load_scenario(path: impl AsRef<Path>) -> Result<Scenario> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| SimError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let scenario = parse_scenario(&raw, ScenarioFormat::from_path(path))?;
    tracing::debug!(path = %path.display(), "loaded scenario");
    Ok(scenario)
}

/// Every diagnostic for the scenario, without stopping at the first error.
pub fn validate_scenario(scenario: &Scenario) -> ValidationReport {
    let mut report = ValidationReport::default();
    match scenario {
        Scenario::Duel(duel) => {
            validate_unit(&duel.unit1, &mut report);
            validate_unit(&duel.unit2, &mut report);
            if duel.unit1.id == duel.unit2.id {
                report.push(
                    ValidationSeverity::Warning,
                    DiagnosticScope::Scenario,
                    "duel",
                    format!("both units share the id '{}'", duel.unit1.id),
                );
            }
        }
        Scenario::Team(team) => {
            for (label, roster, synergies) in [
                ("team1", &team.team1, &team.team1_synergies),
                ("team2", &team.team2, &team.team2_synergies),
            ] {
                if roster.is_empty() {
                    report.push(ValidationSeverity::Error, DiagnosticScope::Scenario, label, "roster is empty");
                }
                for unit in roster {
                    validate_unit(unit, &mut report);
                }
                validate_roster(label, roster, synergies, &mut report);
            }
        }
    }
    validate_battle_config(scenario.battle(), &mut report);
    if scenario.monte_carlo().chunk_size == 0 {
        report.push(
            ValidationSeverity::Error,
            DiagnosticScope::Config,
            "monte_carlo.chunk_size",
            "must be positive",
        );
    }
    report
}
