//! Precondition checks run once before a simulation starts.
//!
//! Errors reject the input (e.g. a non-positive speed would give an undefined attack cadence).
//! Warnings flag values outside their documented ranges that the engine still tolerates.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::combat::{BattleConfig, Skill, Synergy, UnitStats};
use crate::error::{Result, SimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationSeverity {
    Error,
    Warning,
    Info,
}

impl ValidationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a diagnostic is about, used to pick the error variant on rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticScope {
    Unit,
    Config,
    Scenario,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDiagnostic {
    pub severity: ValidationSeverity,
    pub scope: DiagnosticScope,
    pub context: String,
    pub message: String,
}

impl fmt::Display for ValidationDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.context, self.message)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    pub fn push(
        &mut self,
        severity: ValidationSeverity,
        scope: DiagnosticScope,
        context: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(ValidationDiagnostic {
            severity,
            scope,
            context: context.into(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diag| diag.severity == ValidationSeverity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|diag| diag.severity == ValidationSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|diag| diag.severity == ValidationSeverity::Warning)
    }
}

/// Logs warnings and turns the first error into a [SimError].
pub fn ensure_valid(report: &ValidationReport) -> Result<()> {
    for warning in report.warnings() {
        tracing::warn!(context = %warning.context, "{}", warning.message);
    }
    let Some(first) = report.errors().next() else {
        return Ok(());
    };
    Err(match first.scope {
        DiagnosticScope::Unit => SimError::InvalidUnit {
            unit: first.context.clone(),
            message: first.message.clone(),
        },
        DiagnosticScope::Config | DiagnosticScope::Scenario => {
            SimError::InvalidConfig(format!("{}: {}", first.context, first.message))
        }
    })
}

fn in_unit_interval(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

pub fn validate_unit(unit: &UnitStats, report: &mut ValidationReport) {
    let context = unit.id.as_str();
    let mut error = |message: String| {
        report.push(ValidationSeverity::Error, DiagnosticScope::Unit, context, message)
    };

    let required = [
        ("hp", unit.hp),
        ("max_hp", unit.max_hp),
        ("atk", unit.atk),
        ("def", unit.def),
        ("speed", unit.speed),
    ];
    let optional = [
        ("crit_rate", unit.crit_rate),
        ("crit_damage", unit.crit_damage),
        ("accuracy", unit.accuracy),
        ("evasion", unit.evasion),
    ];
    for (name, value) in required
        .iter()
        .copied()
        .chain(optional.iter().filter_map(|(name, value)| value.map(|v| (*name, v))))
    {
        if !value.is_finite() {
            error(format!("{name} must be finite, got {value}"));
        } else if value < 0.0 {
            error(format!("{name} must not be negative, got {value}"));
        }
    }
    if unit.max_hp.is_finite() && unit.max_hp <= 0.0 {
        error(format!("max_hp must be positive, got {}", unit.max_hp));
    }
    if unit.speed.is_finite() && unit.speed <= 0.0 {
        error(format!("speed must be positive, got {}", unit.speed));
    }

    if unit.hp == 0.0 {
        report.push(ValidationSeverity::Warning, DiagnosticScope::Unit, context, "unit starts with 0 hp");
    }
    if unit.hp > unit.max_hp {
        report.push(
            ValidationSeverity::Warning,
            DiagnosticScope::Unit,
            context,
            format!("hp {} exceeds max_hp {}", unit.hp, unit.max_hp),
        );
    }
    for (name, value) in [
        ("crit_rate", unit.crit_rate),
        ("accuracy", unit.accuracy),
        ("evasion", unit.evasion),
    ] {
        if let Some(value) = value.filter(|v| v.is_finite() && !in_unit_interval(*v)) {
            report.push(
                ValidationSeverity::Warning,
                DiagnosticScope::Unit,
                context,
                format!("{name} {value} is outside [0, 1]"),
            );
        }
    }
    if let Some(crit_damage) = unit.crit_damage.filter(|v| v.is_finite() && *v < 1.0) {
        report.push(
            ValidationSeverity::Warning,
            DiagnosticScope::Unit,
            context,
            format!("crit_damage {crit_damage} is below 1"),
        );
    }

    for skill in &unit.skills {
        validate_skill(context, skill, report);
    }
}

fn validate_skill(unit_id: &str, skill: &Skill, report: &mut ValidationReport) {
    let context = format!("{unit_id}.skills.{}", skill.id);
    if !skill.damage.is_finite() || skill.damage < 0.0 {
        report.push(
            ValidationSeverity::Error,
            DiagnosticScope::Unit,
            context.clone(),
            format!("damage must be finite and non-negative, got {}", skill.damage),
        );
    }
    if !skill.cooldown.is_finite() || skill.cooldown < 0.0 {
        report.push(
            ValidationSeverity::Error,
            DiagnosticScope::Unit,
            context.clone(),
            format!("cooldown must be finite and non-negative, got {}", skill.cooldown),
        );
    }
    if let Some(chance) = skill.trigger.and_then(|t| t.chance).filter(|c| !in_unit_interval(*c)) {
        report.push(
            ValidationSeverity::Warning,
            DiagnosticScope::Unit,
            context,
            format!("trigger chance {chance} is outside [0, 1]"),
        );
    }
}

pub fn validate_battle_config(config: &BattleConfig, report: &mut ValidationReport) {
    if !config.time_step.is_finite() || config.time_step <= 0.0 {
        report.push(
            ValidationSeverity::Error,
            DiagnosticScope::Config,
            "battle.time_step",
            format!("must be positive, got {}", config.time_step),
        );
    }
    if !config.max_duration.is_finite() || config.max_duration < 0.0 {
        report.push(
            ValidationSeverity::Error,
            DiagnosticScope::Config,
            "battle.max_duration",
            format!("must be finite and non-negative, got {}", config.max_duration),
        );
    }
    if let Some(pen) = &config.armor_penetration {
        for (name, value) in [
            ("flat_reduction", pen.flat_reduction),
            ("flat_penetration", pen.flat_penetration),
        ] {
            if !value.is_finite() || value < 0.0 {
                report.push(
                    ValidationSeverity::Warning,
                    DiagnosticScope::Config,
                    format!("battle.armor_penetration.{name}"),
                    format!("expected a non-negative amount, got {value}"),
                );
            }
        }
    }
}

/// Warns about duplicated ids in a roster and about synergies that can never fire.
pub fn validate_roster(label: &str, roster: &[UnitStats], synergies: &[Synergy], report: &mut ValidationReport) {
    let mut seen = HashSet::new();
    for unit in roster {
        if unit.id.trim().is_empty() {
            report.push(ValidationSeverity::Error, DiagnosticScope::Scenario, label, "unit with empty id");
        } else if !seen.insert(unit.id.as_str()) {
            report.push(
                ValidationSeverity::Warning,
                DiagnosticScope::Scenario,
                label,
                format!("duplicate unit id '{}'", unit.id),
            );
        }
    }
    for synergy in synergies {
        for required in &synergy.required_units {
            if !seen.contains(required.as_str()) {
                report.push(
                    ValidationSeverity::Warning,
                    DiagnosticScope::Scenario,
                    format!("{label}.synergies.{}", synergy.id),
                    format!("required unit '{required}' is not in the roster"),
                );
            }
        }
    }
}
