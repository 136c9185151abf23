use chrono::Duration;

/// Tunables for the classification engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Ceiling for outbound inference requests per trailing minute.
    pub requests_per_minute: usize,

    /// How long a cached label stays valid.
    pub cache_ttl: Duration,

    /// Expired cache entries are swept every this many classifications.
    pub cache_sweep_every: u32,

    /// Remote inference attempts before falling back to the keyword default.
    pub max_inference_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 30,
            cache_ttl: Duration::hours(24),
            cache_sweep_every: 100,
            max_inference_attempts: 3,
        }
    }
}
