//! Running ingestion statistics
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

const MAX_LATENCY_SAMPLES: usize = 1000;

pub struct Stats {
    pub received: u64,
    pub failed: u64,
    pub bytes_received: u64,

    // ingest latency in microseconds
    latencies: VecDeque<u64>,

    pub start_time: Instant,
    pub started_at: DateTime<Local>,
    pub last_update: Option<DateTime<Local>>,
}

/// Point-in-time view of [`Stats`] with the derived rates filled in.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub received: u64,
    pub failed: u64,
    pub bytes_received: u64,
    /// Fraction in `0.0..=1.0`.
    pub success_rate: f64,
    pub rate_per_second: f64,
    pub elapsed_secs: f64,
    pub latency_mean_ms: f64,
    pub latency_median_ms: f64,
    pub latency_p99_ms: f64,
    pub last_update: Option<DateTime<Local>>,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            received: 0,
            failed: 0,
            bytes_received: 0,
            latencies: VecDeque::with_capacity(MAX_LATENCY_SAMPLES),
            start_time: Instant::now(),
            started_at: Local::now(),
            last_update: None,
        }
    }

    pub fn record_success(&mut self, len: usize) {
        self.received += 1;
        self.bytes_received += len as u64;
        self.last_update = Some(Local::now());
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn add_latency(&mut self, latency_us: u64) {
        if self.latencies.len() >= MAX_LATENCY_SAMPLES {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency_us);
    }

    /// (mean, median, p99) in milliseconds.
    pub fn latency_stats(&self) -> (f64, f64, f64) {
        if self.latencies.is_empty() {
            return (0.0, 0.0, 0.0);
        }

        let mut data: Vec<u64> = self.latencies.iter().copied().collect();
        data.sort_unstable();

        let mean = data.iter().sum::<u64>() as f64 / data.len() as f64;

        let median = if data.len() % 2 == 0 {
            let mid = data.len() / 2;
            (data[mid - 1] + data[mid]) as f64 / 2.0
        } else {
            data[data.len() / 2] as f64
        };

        let p99_index = ((data.len() as f64 * 0.99) as usize).min(data.len() - 1);
        let p99 = data[p99_index] as f64;

        (mean / 1000.0, median / 1000.0, p99 / 1000.0)
    }

    /// Share of datagrams that became snapshots; 0 before anything arrived.
    pub fn success_rate(&self) -> f64 {
        let total = self.received + self.failed;
        if total == 0 {
            0.0
        } else {
            self.received as f64 / total as f64
        }
    }

    fn rate(received: u64, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            received as f64 / secs
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> StatsSummary {
        let elapsed = self.start_time.elapsed();
        let (mean_ms, median_ms, p99_ms) = self.latency_stats();
        StatsSummary {
            received: self.received,
            failed: self.failed,
            bytes_received: self.bytes_received,
            success_rate: self.success_rate(),
            rate_per_second: Self::rate(self.received, elapsed),
            elapsed_secs: elapsed.as_secs_f64(),
            latency_mean_ms: mean_ms,
            latency_median_ms: median_ms,
            latency_p99_ms: p99_ms,
            last_update: self.last_update,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Packets received: {}", self.received)?;
        writeln!(f, "Packets failed: {}", self.failed)?;
        if self.received > 0 {
            writeln!(f, "Success rate: {:.1}%", self.success_rate * 100.0)?;
        }
        writeln!(f, "Duration: {:.1} seconds", self.elapsed_secs)?;
        if self.elapsed_secs > 0.0 {
            writeln!(f, "Average rate: {:.2} updates/sec", self.rate_per_second)?;
        }
        if self.received > 0 {
            writeln!(
                f,
                "Ingest latency: mean={:.3}ms median={:.3}ms p99={:.3}ms",
                self.latency_mean_ms, self.latency_median_ms, self.latency_p99_ms
            )?;
        }
        if let Some(last) = self.last_update {
            writeln!(f, "Last update: {}", last.format("%H:%M:%S"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_is_zero_before_any_datagram() {
        let stats = Stats::new();
        assert_eq!(stats.success_rate(), 0.0);
        assert_eq!(stats.summary().success_rate, 0.0);
    }

    #[test]
    fn success_rate_counts_failures() {
        let mut stats = Stats::new();
        stats.record_success(100);
        stats.record_success(100);
        stats.record_success(100);
        stats.record_failure();
        assert_eq!(stats.success_rate(), 0.75);
        assert_eq!(stats.bytes_received, 300);
        assert!(stats.last_update.is_some());
    }

    #[test]
    fn rate_is_zero_for_zero_elapsed() {
        assert_eq!(Stats::rate(10, Duration::ZERO), 0.0);
        assert_eq!(Stats::rate(10, Duration::from_secs(4)), 2.5);
    }

    #[test]
    fn latency_window_is_bounded() {
        let mut stats = Stats::new();
        for i in 0..(MAX_LATENCY_SAMPLES as u64 + 500) {
            stats.add_latency(i);
        }
        assert_eq!(stats.latencies.len(), MAX_LATENCY_SAMPLES);
        assert_eq!(stats.latencies.front(), Some(&500));
    }

    #[test]
    fn latency_stats_in_milliseconds() {
        let mut stats = Stats::new();
        for us in [1000, 2000, 3000, 4000] {
            stats.add_latency(us);
        }
        let (mean, median, p99) = stats.latency_stats();
        assert_eq!(mean, 2.5);
        assert_eq!(median, 2.5);
        assert_eq!(p99, 4.0);
    }

    #[test]
    fn summary_reports_latency_median() {
        let mut stats = Stats::new();
        stats.record_success(10);
        for us in [500, 1500, 9000] {
            stats.add_latency(us);
        }
        let summary = stats.summary();
        assert_eq!(summary.latency_median_ms, 1.5);
        assert!(summary.to_string().contains("median=1.500ms"));
    }

    #[test]
    fn summary_text_hides_rate_without_successes() {
        let mut stats = Stats::new();
        stats.record_failure();
        let text = stats.summary().to_string();
        assert!(text.contains("Packets failed: 1"));
        assert!(!text.contains("Success rate"));
        assert!(!text.contains("Last update"));
    }
}
