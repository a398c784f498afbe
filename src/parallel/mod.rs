pub mod batch;
pub mod pool;
pub mod progress;

pub use batch::chunk_ranges;
pub use pool::{ReadyPool, WorkerPool};
pub use progress::{CancellationToken, Progress};
