//! Metric names emitted by the tiered cache.

pub const METRIC_CACHE_HIT_TOTAL: &str = "confreader_cache_hit_total";
pub const METRIC_CACHE_MISS_TOTAL: &str = "confreader_cache_miss_total";
pub const METRIC_DISTRIBUTED_ERROR_TOTAL: &str = "confreader_distributed_error_total";
pub const METRIC_REFRESH_TOTAL: &str = "confreader_refresh_total";
pub const METRIC_REFRESH_MS: &str = "confreader_refresh_ms";
pub const METRIC_SNAPSHOT_ENTRIES: &str = "confreader_snapshot_entries";
