pub mod analysis;
pub mod cli;
pub mod combat;
pub mod error;
pub mod parallel;
pub mod scenario;

pub use error::{Result, SimError};
