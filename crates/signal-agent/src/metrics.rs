use std::collections::VecDeque;
use std::time::Instant;

use crate::scheduler::TickReport;

const RECENT_TICKS: usize = 20;

/// Structured telemetry for the signal agent.
/// Tracks per-tick timing, aggregate counters, and a rolling failure window.
pub struct AgentMetrics {
    pub ticks_run: u64,
    pub evaluations_completed: u64,
    pub evaluations_failed: u64,
    pub evaluations_skipped: u64,
    pub alerts_raised: u64,
    pub records_stored: u64,
    pub records_failed: u64,

    pub last_tick_duration_ms: u64,

    // (failed, attempted) per recent tick
    recent_ticks: VecDeque<(usize, usize)>,
    log_interval_ticks: u64,
}

impl AgentMetrics {
    pub fn new(log_interval_ticks: u64) -> Self {
        Self {
            ticks_run: 0,
            evaluations_completed: 0,
            evaluations_failed: 0,
            evaluations_skipped: 0,
            alerts_raised: 0,
            records_stored: 0,
            records_failed: 0,
            last_tick_duration_ms: 0,
            recent_ticks: VecDeque::with_capacity(RECENT_TICKS),
            log_interval_ticks,
        }
    }

    pub fn start_timer() -> Instant {
        Instant::now()
    }

    pub fn finish_tick(&mut self, report: &TickReport, tick_start: Instant) {
        self.last_tick_duration_ms = tick_start.elapsed().as_millis() as u64;
        self.ticks_run += 1;

        self.evaluations_completed += report.completed.len() as u64;
        self.evaluations_failed += report.failed.len() as u64;
        self.evaluations_skipped += report.skipped.len() as u64;
        self.alerts_raised += report.alerted.len() as u64;
        self.records_stored += report.records_stored as u64;
        self.records_failed += report.records_failed as u64;

        self.recent_ticks
            .push_back((report.failed.len(), report.completed.len() + report.failed.len()));
        if self.recent_ticks.len() > RECENT_TICKS {
            self.recent_ticks.pop_front();
        }

        if self.log_interval_ticks > 0 && self.ticks_run % self.log_interval_ticks == 0 {
            self.log_metrics();
        }
    }

    /// Share of failed evaluations over the last 20 ticks (0-100%)
    pub fn recent_failure_rate(&self) -> f64 {
        let (failed, attempted) = self
            .recent_ticks
            .iter()
            .fold((0, 0), |(f, a), (tf, ta)| (f + tf, a + ta));
        if attempted == 0 {
            return 0.0;
        }
        failed as f64 / attempted as f64 * 100.0
    }

    /// Emit structured telemetry via tracing
    pub fn log_metrics(&self) {
        tracing::info!(
            ticks = self.ticks_run,
            evaluations_completed = self.evaluations_completed,
            evaluations_failed = self.evaluations_failed,
            evaluations_skipped = self.evaluations_skipped,
            alerts_raised = self.alerts_raised,
            records_stored = self.records_stored,
            records_failed = self.records_failed,
            recent_failure_rate = %format!("{:.1}%", self.recent_failure_rate()),
            last_tick_ms = self.last_tick_duration_ms,
            "Agent metrics summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(completed: usize, failed: usize) -> TickReport {
        TickReport {
            completed: (0..completed).map(|i| format!("OK{}", i)).collect(),
            failed: (0..failed).map(|i| (format!("BAD{}", i), "boom".to_string())).collect(),
            records_stored: completed,
            ..TickReport::default()
        }
    }

    #[test]
    fn test_counters_accumulate() {
        let mut metrics = AgentMetrics::new(0);
        metrics.finish_tick(&report(3, 1), Instant::now());
        metrics.finish_tick(&report(2, 0), Instant::now());

        assert_eq!(metrics.ticks_run, 2);
        assert_eq!(metrics.evaluations_completed, 5);
        assert_eq!(metrics.evaluations_failed, 1);
        assert_eq!(metrics.records_stored, 5);
        // 1 failure out of 6 attempts
        assert!((metrics.recent_failure_rate() - 100.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_failure_window_rolls() {
        let mut metrics = AgentMetrics::new(0);
        metrics.finish_tick(&report(0, 4), Instant::now());
        for _ in 0..RECENT_TICKS {
            metrics.finish_tick(&report(2, 0), Instant::now());
        }
        assert_eq!(metrics.recent_failure_rate(), 0.0);
        assert_eq!(metrics.evaluations_failed, 4);
    }

    #[test]
    fn test_empty_failure_rate() {
        assert_eq!(AgentMetrics::new(5).recent_failure_rate(), 0.0);
    }
}
