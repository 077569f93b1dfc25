//! Parallelism configuration and thread pool setup.

use rayon::prelude::*;

// =============================================================================
// Parallelism Configuration
// =============================================================================

/// Whether parallel execution is allowed.
///
/// This is a simple flag passed down to per-sample loops. When `Parallel`,
/// components may use `rayon` parallel iterators; when `Sequential`, they
/// must iterate on the calling thread.
///
/// The actual thread pool is set up at the API level via `n_threads`
/// (see [`run_with_threads`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parallelism {
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if rayon pool has multiple threads, sequential otherwise)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    #[inline]
    pub fn maybe_par_bridge_for_each<T, I, F>(self, iter: I, f: F)
    where
        T: Send,
        I: Iterator<Item = T> + Send,
        F: Fn(T) + Sync + Send,
    {
        if self.is_parallel() {
            iter.par_bridge().for_each(f);
        } else {
            iter.for_each(f);
        }
    }

    /// Fallible parallel bridge with per-thread initialization.
    ///
    /// The `init` closure is called once per rayon work split (in parallel
    /// mode) or once total (in sequential mode), and the state is reused for
    /// every item handled there. Stops at the first error; in parallel mode
    /// which error is returned is unspecified when several items fail.
    #[inline]
    pub fn maybe_par_bridge_try_for_each_init<T, E, I, INIT, S, F>(
        self,
        iter: I,
        init: INIT,
        f: F,
    ) -> Result<(), E>
    where
        T: Send,
        E: Send,
        I: Iterator<Item = T> + Send,
        INIT: Fn() -> S + Sync + Send,
        F: Fn(&mut S, T) -> Result<(), E> + Sync + Send,
    {
        if self.is_parallel() {
            iter.par_bridge().try_for_each_init(init, f)
        } else {
            let mut state = init();
            iter.map(|item| f(&mut state, item)).collect()
        }
    }
}

// =============================================================================
// Thread Pool Setup
// =============================================================================

/// Run a closure with the appropriate thread pool.
///
/// Thread count semantics:
/// - `0` = auto (use the current rayon pool)
/// - `1` = sequential (no thread pool)
/// - `n > 1` = use exactly `n` threads
///
/// Falls back to the current pool if a dedicated pool cannot be built.
///
/// # Example
///
/// ```
/// use treeshap::run_with_threads;
///
/// assert!(!run_with_threads(1, |p| p.is_parallel()));
/// assert_eq!(run_with_threads(2, |_| rayon::current_num_threads()), 2);
/// ```
#[inline]
pub fn run_with_threads<T: Send>(n_threads: usize, f: impl FnOnce(Parallelism) -> T + Send) -> T {
    match Parallelism::from_threads(n_threads) {
        Parallelism::Sequential => f(Parallelism::Sequential),
        Parallelism::Parallel if n_threads == 0 => f(Parallelism::Parallel),
        Parallelism::Parallel => match rayon::ThreadPoolBuilder::new().num_threads(n_threads).build() {
            Ok(pool) => pool.install(|| f(Parallelism::Parallel)),
            Err(err) => {
                tracing::warn!(n_threads, %err, "failed to build thread pool, using the global pool");
                f(Parallelism::Parallel)
            }
        },
    }
}
