//! Per-session write statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Counters updated by a session's write path
#[derive(Debug)]
pub struct SessionStats {
    /// Records that reached the volume
    records_written: AtomicU64,
    /// Records dropped by the level filter
    records_filtered: AtomicU64,
    /// Bytes handed to the volume backend, after the buffer transform
    bytes_written: AtomicU64,
    /// Index records appended
    index_records: AtomicU64,
    /// Volumes opened, including the first one
    volumes_opened: AtomicU64,
    /// Durability syncs performed
    syncs: AtomicU64,
    /// Time spent inside `write`, in nanoseconds
    write_duration_ns: AtomicU64,

    start_time: Instant,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            records_written: AtomicU64::new(0),
            records_filtered: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            index_records: AtomicU64::new(0),
            volumes_opened: AtomicU64::new(0),
            syncs: AtomicU64::new(0),
            write_duration_ns: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Count one written record of `bytes` bytes
    pub fn record_written(&self, bytes: u64, duration: Duration) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        self.write_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Count one record dropped by the level filter
    pub fn record_filtered(&self) {
        self.records_filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one index record
    pub fn index_record_written(&self) {
        self.index_records.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one opened volume
    pub fn volume_opened(&self) {
        self.volumes_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one sync
    pub fn synced(&self) {
        self.syncs.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_written: self.records_written.load(Ordering::Relaxed),
            records_filtered: self.records_filtered.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            index_records: self.index_records.load(Ordering::Relaxed),
            volumes_opened: self.volumes_opened.load(Ordering::Relaxed),
            syncs: self.syncs.load(Ordering::Relaxed),
            write_duration: Duration::from_nanos(self.write_duration_ns.load(Ordering::Relaxed)),
            uptime: self.start_time.elapsed(),
        }
    }

    /// Zero the counters
    pub fn reset(&self) {
        self.records_written.store(0, Ordering::Relaxed);
        self.records_filtered.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
        self.index_records.store(0, Ordering::Relaxed);
        // volumes_opened is a property of the session, not a rate
        self.syncs.store(0, Ordering::Relaxed);
        self.write_duration_ns.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of a session's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub records_written: u64,
    pub records_filtered: u64,
    pub bytes_written: u64,
    pub index_records: u64,
    pub volumes_opened: u64,
    pub syncs: u64,
    pub write_duration: Duration,
    pub uptime: Duration,
}

impl StatsSnapshot {
    /// Mean time spent per written record
    pub fn avg_write_duration(&self) -> Option<Duration> {
        if self.records_written == 0 {
            return None;
        }
        Some(self.write_duration / self.records_written as u32)
    }

    /// Render the snapshot for humans
    pub fn report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Session Statistics ===\n\n");
        report.push_str(&format!("Uptime: {:?}\n\n", self.uptime));

        report.push_str("Records:\n");
        report.push_str(&format!("  Written: {}\n", self.records_written));
        report.push_str(&format!("  Filtered: {}\n", self.records_filtered));
        report.push_str(&format!("  Index Records: {}\n", self.index_records));

        report.push_str("\nVolumes:\n");
        report.push_str(&format!("  Opened: {}\n", self.volumes_opened));
        report.push_str(&format!("  Bytes Written: {}\n", self.bytes_written));
        report.push_str(&format!("  Syncs: {}\n", self.syncs));

        if let Some(avg) = self.avg_write_duration() {
            report.push_str(&format!("\nAvg. Write Time: {}µs\n", avg.as_micros()));
        }

        report
    }
}
