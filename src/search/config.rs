//! Configuration for candidate generation

/// Configuration for the permutation heuristic run by a generator.
#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    /// Seed for random number generator (None = random seed)
    pub seed: Option<u64>,
}

impl SearchConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_seed_option(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}
