//! Solver configuration.

/// Configurable parameters used during solving.
pub struct SolverConfig {
    /// Byte limit of the clause storage that forces a reduction. (Default: 1300 MB)
    pub memory_limit_bytes: usize,

    /// Initial inner and outer restart interval in conflicts. (Default: 100)
    pub min_restart_interval: u64,

    /// Upper bound of the outer restart interval. (Default: 1000000)
    pub max_restart_interval: u64,

    /// Restart interval growth factor in percent. (Default: 110)
    pub restart_factor_percent: u64,

    /// Growth factor in percent for the learned clause limit and the forced
    /// reduce interval. (Default: 105)
    pub reduce_factor_percent: u64,

    /// Initial number of conflicts between forced reductions. (Default: 100000)
    pub initial_forced_reduce: u64,

    /// Lower bound on the random decision spread, i.e. at most one random
    /// decision per this many decisions. (Default: 100)
    pub min_random_spread: u64,

    /// Upper bound on the random decision spread. (Default: 10000)
    pub max_random_spread: u64,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            memory_limit_bytes: 1300 << 20,
            min_restart_interval: 100,
            max_restart_interval: 1_000_000,
            restart_factor_percent: 110,
            reduce_factor_percent: 105,
            initial_forced_reduce: 100_000,
            min_random_spread: 100,
            max_random_spread: 10_000,
        }
    }
}
