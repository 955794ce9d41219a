//! Runtime statistics for the conversion daemon.
//!
//! Provides structs for the in-flight attempt, system load, and aggregate
//! counters with JSON serialization support.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// The attempt currently being processed, if any.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptStats {
    pub id: String,
    pub source_path: String,
    pub stage: String,
}

/// System-level metrics for resource monitoring
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemStats {
    pub cpu_usage_percent: f32,
    pub mem_usage_percent: f32,
    pub load_avg_1: f32,
    pub load_avg_5: f32,
    pub load_avg_15: f32,
}

/// Complete statistics snapshot including the current attempt, system load,
/// and aggregate counters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsSnapshot {
    pub timestamp_unix_ms: i64,
    pub current: Option<AttemptStats>,
    pub system: SystemStats,
    pub queue_len: usize,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub original_bytes_total: u64,
    pub converted_bytes_total: u64,
}

/// Shared statistics state for concurrent access across daemon components
pub type SharedStats = Arc<RwLock<StatsSnapshot>>;

impl Default for SystemStats {
    fn default() -> Self {
        Self {
            cpu_usage_percent: 0.0,
            mem_usage_percent: 0.0,
            load_avg_1: 0.0,
            load_avg_5: 0.0,
            load_avg_15: 0.0,
        }
    }
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self {
            timestamp_unix_ms: 0,
            current: None,
            system: SystemStats::default(),
            queue_len: 0,
            completed: 0,
            failed: 0,
            skipped: 0,
            original_bytes_total: 0,
            converted_bytes_total: 0,
        }
    }
}

/// Creates a new SharedStats instance with default values
pub fn new_shared_stats() -> SharedStats {
    Arc::new(RwLock::new(StatsSnapshot::default()))
}

/// Milliseconds since the Unix epoch, for snapshot timestamps.
pub fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Collects current system metrics using sysinfo
pub fn collect_system_stats() -> SystemStats {
    use sysinfo::System;

    let mut sys = System::new();
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let cpu_usage = sys.global_cpu_usage();
    let total_memory = sys.total_memory();
    let used_memory = sys.used_memory();
    let mem_usage = if total_memory > 0 {
        (used_memory as f64 / total_memory as f64 * 100.0) as f32
    } else {
        0.0
    };

    let load_avg = System::load_average();

    SystemStats {
        cpu_usage_percent: cpu_usage,
        mem_usage_percent: mem_usage,
        load_avg_1: load_avg.one as f32,
        load_avg_5: load_avg.five as f32,
        load_avg_15: load_avg.fifteen as f32,
    }
}
