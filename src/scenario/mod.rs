pub mod loader;
pub mod validate;

pub use loader::{
    load_scenario, parse_scenario, validate_scenario, DuelScenario, Scenario, ScenarioFormat,
    TeamScenario,
};
pub use validate::{
    ensure_valid, validate_battle_config, validate_roster, validate_unit, DiagnosticScope,
    ValidationDiagnostic, ValidationReport, ValidationSeverity,
};
