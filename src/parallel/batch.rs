//! Batch distribution for parallel simulation.
//!
//! Splits a run count into chunks for cancellation checkpoints and progress reporting. Rayon
//! spreads the runs of one chunk over the worker pool.

/// Consecutive ranges of at most `chunk_size` items covering `[0, total)`.
///
/// # Example
/// ```
/// # use skirmish::parallel::chunk_ranges;
/// assert_eq!(chunk_ranges(2500, 1000), vec![(0, 1000), (1000, 2000), (2000, 2500)]);
/// ```
pub fn chunk_ranges(total: usize, chunk_size: usize) -> Vec<(usize, usize)> {
    if total == 0 {
        return Vec::new();
    }
    let chunk_size = chunk_size.max(1);
    (0..total)
        .step_by(chunk_size)
        .map(|start| (start, (start + chunk_size).min(total)))
        .collect()
}
