pub mod analytical;
pub mod monte_carlo;
pub mod statistics;

pub use analytical::{effective_hp, expected_hit_dps, theoretical_dps};
pub use monte_carlo::{
    run_monte_carlo, run_monte_carlo_parallel, run_monte_carlo_with_progress, run_team_monte_carlo,
    run_team_monte_carlo_parallel, run_team_monte_carlo_with_progress, MonteCarloConfig,
    SimulationResult, TeamMatchup, TeamSimulationResult, TeamUnitSummary, UnitSummary,
};
pub use statistics::{
    histogram, median, percentile, wilson_interval, ConfidenceInterval, ConfidenceLevel,
    DistributionSummary, HistogramBin, RangeSummary, RunningStats,
};
