//! Engine tuning knobs.

use std::time::Duration;

/// Configuration recognised by the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Max concurrent node invocations across all executions.
    pub worker_count: usize,
    /// Master cache switch; overrides per-execution `use_cache = true`.
    pub cache_enabled: bool,
    /// LRU cap on the result cache.
    pub cache_max_entries: usize,
    /// Default TTL for cacheable node results.
    pub cache_default_ttl: Duration,
    /// Default deadline for submitted executions; `None` means unlimited.
    pub execution_timeout: Option<Duration>,
    /// If true, a failed node's output is treated as `null` and successor
    /// levels still run; the execution is marked failed at the end.
    pub continue_on_error: bool,
    /// Maximum number of times a retryable node failure is retried.
    pub max_retries: u32,
    /// Base delay for exponential back-off between retries.
    pub retry_base_delay: Duration,
    /// Node kind whose results form the execution's final output.
    pub sink_kind: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            cache_enabled: true,
            cache_max_entries: 1000,
            cache_default_ttl: Duration::from_secs(3600),
            execution_timeout: None,
            continue_on_error: false,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(100),
            sink_kind: nodes::builtin::OUTPUT_KIND.to_string(),
        }
    }
}
