//! Errors surfaced to callers.
//!
//! Simulations only fail before the first tick (precondition violations) or when a chunked run
//! is cancelled; everything else is loading, parsing and export failures from the outer layers.

use std::io;

use thiserror::Error;

use crate::combat::TeamSide;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("unit '{unit}': {message}")]
    InvalidUnit { unit: String, message: String },

    #[error("invalid battle config: {0}")]
    InvalidConfig(String),

    #[error("{0} roster is empty")]
    EmptyRoster(TeamSide),

    #[error("simulation cancelled after {completed} of {total} runs")]
    Cancelled { completed: usize, total: usize },

    #[error("unable to read '{path}'")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("unable to parse json scenario")]
    Json(#[from] serde_json::Error),

    #[error("unable to parse yaml scenario")]
    Yaml(#[from] serde_yaml::Error),

    #[error("csv export failed")]
    Csv(#[from] csv::Error),

    #[error("unable to build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
