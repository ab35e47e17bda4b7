//! Batch parallelism
//!
//! Every example in a batch is transformed independently, so batch entry
//! points fan out over examples with these helpers. With the `parallel`
//! feature they run on rayon's work-stealing pool; without it they fall back
//! to sequential iteration with the same signatures and the same output
//! ordering.
//!
//! Work *within* an example (phase unwrapping and cumulative sums along the
//! time axis) is never split across threads.

use crate::error::SpectralResult;

/// Configure the global thread pool with the specified number of threads.
///
/// Only the first call takes effect (rayon limitation); later calls report
/// the size of the pool that is already running.
///
/// # Arguments
///
/// * `num_threads` - Number of threads to use. If None, uses rayon's default
///   (typically the number of logical CPUs).
#[cfg(feature = "parallel")]
pub fn configure_thread_pool(num_threads: Option<usize>) -> SpectralResult<usize> {
    use rayon::ThreadPoolBuilder;

    let builder = ThreadPoolBuilder::new();
    let builder = if let Some(n) = num_threads {
        builder.num_threads(n)
    } else {
        builder
    };

    match builder.build_global() {
        Ok(()) => Ok(rayon::current_num_threads()),
        // Already initialized
        Err(_) => Ok(rayon::current_num_threads()),
    }
}

/// Sequential fallback - no thread pool to configure.
#[cfg(not(feature = "parallel"))]
pub fn configure_thread_pool(num_threads: Option<usize>) -> SpectralResult<usize> {
    let _ = num_threads;
    Ok(1)
}

/// Parallel map that collects Results, short-circuiting on first error.
#[cfg(feature = "parallel")]
pub fn parallel_try_map<T, F>(range: std::ops::Range<usize>, f: F) -> SpectralResult<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> SpectralResult<T> + Send + Sync,
{
    use rayon::prelude::*;
    range.into_par_iter().map(f).collect()
}

/// Sequential fallback for try_map.
#[cfg(not(feature = "parallel"))]
pub fn parallel_try_map<T, F>(range: std::ops::Range<usize>, f: F) -> SpectralResult<Vec<T>>
where
    F: Fn(usize) -> SpectralResult<T>,
{
    range.map(f).collect()
}
