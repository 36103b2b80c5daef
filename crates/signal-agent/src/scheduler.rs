use analysis_core::{AnalysisError, EvaluationRecord, RecordSink, SignalDirection};
use analysis_orchestrator::SignalPipeline;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notification_service::Notifier;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::metrics::AgentMetrics;

/// Produces one evaluation record per instrument.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, instrument: &str) -> Result<EvaluationRecord, AnalysisError>;
}

#[async_trait]
impl Evaluator for SignalPipeline {
    async fn evaluate(&self, instrument: &str) -> Result<EvaluationRecord, AnalysisError> {
        SignalPipeline::evaluate(self, instrument).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentStatus {
    Idle,
    Running,
    Done,
    Failed,
}

impl InstrumentStatus {
    pub fn can_transition_to(self, next: InstrumentStatus) -> bool {
        use InstrumentStatus::*;
        matches!(
            (self, next),
            (Idle, Running) | (Running, Done) | (Running, Failed) | (Done, Idle) | (Failed, Idle)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InstrumentStatus::Done | InstrumentStatus::Failed)
    }
}

/// What the most recent evaluation of an instrument produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LastOutcome {
    Signal { direction: SignalDirection, confidence: f64 },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEntry {
    pub status: InstrumentStatus,
    pub last_outcome: Option<LastOutcome>,
    pub last_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatusError {
    #[error("unknown instrument {0}")]
    UnknownInstrument(String),
    #[error("illegal status transition for {instrument}: {from:?} -> {to:?}")]
    IllegalTransition {
        instrument: String,
        from: InstrumentStatus,
        to: InstrumentStatus,
    },
}

/// Per-instrument status. Only writes are serialized; evaluations never hold the lock.
pub struct StatusTable {
    entries: RwLock<HashMap<String, StatusEntry>>,
}

impl StatusTable {
    pub fn new(instruments: &[String]) -> Self {
        let entries = instruments
            .iter()
            .map(|i| {
                (
                    i.clone(),
                    StatusEntry {
                        status: InstrumentStatus::Idle,
                        last_outcome: None,
                        last_run: None,
                    },
                )
            })
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub async fn transition(
        &self,
        instrument: &str,
        next: InstrumentStatus,
        outcome: Option<LastOutcome>,
    ) -> Result<(), StatusError> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(instrument) else {
            let err = StatusError::UnknownInstrument(instrument.to_string());
            tracing::warn!(error = %err, "status transition rejected");
            return Err(err);
        };

        if !entry.status.can_transition_to(next) {
            let err = StatusError::IllegalTransition {
                instrument: instrument.to_string(),
                from: entry.status,
                to: next,
            };
            tracing::warn!(error = %err, "status transition rejected");
            return Err(err);
        }

        entry.status = next;
        if next == InstrumentStatus::Running {
            entry.last_run = Some(Utc::now());
        }
        if outcome.is_some() {
            entry.last_outcome = outcome;
        }
        Ok(())
    }

    pub async fn get(&self, instrument: &str) -> Option<StatusEntry> {
        self.entries.read().await.get(instrument).cloned()
    }

    /// All entries, ordered by instrument.
    pub async fn snapshot(&self) -> Vec<(String, StatusEntry)> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Return every DONE/FAILED instrument to IDLE, keeping its last outcome.
    pub async fn reset_terminal(&self) -> usize {
        let mut entries = self.entries.write().await;
        let mut reset = 0;
        for entry in entries.values_mut().filter(|e| e.status.is_terminal()) {
            entry.status = InstrumentStatus::Idle;
            reset += 1;
        }
        reset
    }
}

/// Decides which records are worth a notification.
#[derive(Debug, Clone, Copy)]
pub struct AlertGate {
    threshold: f64,
}

impl AlertGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Strictly above the threshold.
    pub fn should_alert(&self, record: &EvaluationRecord) -> bool {
        record.signal.confidence() > self.threshold
    }
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub completed: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<String>,
    pub alerted: Vec<String>,
    pub records_stored: usize,
    pub records_failed: usize,
    pub cancelled: bool,
    pub duration: Duration,
}

pub struct Scheduler {
    evaluator: Arc<dyn Evaluator>,
    notifier: Arc<dyn Notifier>,
    sink: Option<Arc<dyn RecordSink>>,
    gate: AlertGate,
    instruments: Vec<String>,
    status: Arc<StatusTable>,
    last_tick: Option<DateTime<Utc>>,
    pending_alerts: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        notifier: Arc<dyn Notifier>,
        gate: AlertGate,
        instruments: Vec<String>,
    ) -> Self {
        Self {
            evaluator,
            notifier,
            sink: None,
            gate,
            status: Arc::new(StatusTable::new(&instruments)),
            instruments,
            last_tick: None,
            pending_alerts: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn status(&self) -> Arc<StatusTable> {
        Arc::clone(&self.status)
    }

    pub fn last_tick(&self) -> Option<DateTime<Utc>> {
        self.last_tick
    }

    /// Tick on `every` until `shutdown` turns true or its sender goes away.
    pub async fn run(&mut self, every: Duration, mut shutdown: watch::Receiver<bool>, metrics: &mut AgentMetrics) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let tick_start = AgentMetrics::start_timer();
                    let report = self.run_tick(&shutdown).await;
                    metrics.finish_tick(&report, tick_start);
                    if report.cancelled {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Shutdown signal received, finishing pending alerts...");
        self.drain_alerts(Duration::from_secs(10)).await;
        metrics.log_metrics();
    }

    /// Evaluate every instrument once. Each evaluation is its own task; a
    /// failing instrument never affects the others.
    pub async fn run_tick(&mut self, shutdown: &watch::Receiver<bool>) -> TickReport {
        let started = Instant::now();
        let started_at = Utc::now();
        self.last_tick = Some(started_at);
        self.pending_alerts.retain(|h| !h.is_finished());

        let mut report = TickReport {
            started_at,
            ..TickReport::default()
        };
        let mut tasks = JoinSet::new();

        // Dispatch does not block, so this only skips work when shutdown is
        // already requested; evaluations already spawned always finish.
        for (i, instrument) in self.instruments.iter().enumerate() {
            if *shutdown.borrow() {
                report.cancelled = true;
                report.skipped.extend(self.instruments[i..].iter().cloned());
                tracing::info!(skipped = report.skipped.len(), "tick cancelled before dispatch");
                break;
            }
            if self
                .status
                .transition(instrument, InstrumentStatus::Running, None)
                .await
                .is_err()
            {
                report.skipped.push(instrument.clone());
                continue;
            }

            let evaluator = Arc::clone(&self.evaluator);
            let instrument = instrument.clone();
            tasks.spawn(async move {
                let result = evaluator.evaluate(&instrument).await;
                (instrument, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((instrument, Ok(record))) => self.on_success(instrument, record, &mut report).await,
                Ok((instrument, Err(e))) => self.on_failure(instrument, e.to_string(), &mut report).await,
                Err(e) => tracing::error!(error = %e, "evaluation task aborted"),
            }
        }

        // A task that panicked leaves its instrument RUNNING.
        for (instrument, entry) in self.status.snapshot().await {
            if entry.status == InstrumentStatus::Running {
                self.on_failure(instrument, "evaluation task aborted".to_string(), &mut report)
                    .await;
            }
        }

        self.status.reset_terminal().await;
        report.duration = started.elapsed();

        tracing::info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            alerted = report.alerted.len(),
            duration_ms = report.duration.as_millis() as u64,
            "tick complete"
        );
        report
    }

    async fn on_success(&mut self, instrument: String, record: EvaluationRecord, report: &mut TickReport) {
        let outcome = LastOutcome::Signal {
            direction: record.signal.direction(),
            confidence: record.signal.confidence(),
        };
        self.status
            .transition(&instrument, InstrumentStatus::Done, Some(outcome))
            .await
            .ok();

        if let Some(sink) = &self.sink {
            match sink.store(&record).await {
                Ok(()) => report.records_stored += 1,
                Err(e) => {
                    report.records_failed += 1;
                    tracing::warn!(instrument = %instrument, sink = sink.name(), error = %e, "failed to store record");
                }
            }
        }

        if self.gate.should_alert(&record) {
            tracing::info!(
                instrument = %instrument,
                confidence = %format!("{:.1}", record.signal.confidence()),
                threshold = self.gate.threshold(),
                "alert threshold crossed"
            );
            report.alerted.push(instrument.clone());
            let notifier = Arc::clone(&self.notifier);
            self.pending_alerts.push(tokio::spawn(async move {
                if let Err(e) = notifier.notify(&record).await {
                    tracing::warn!(instrument = record.instrument(), error = %e, "alert delivery failed");
                }
            }));
        }

        report.completed.push(instrument);
    }

    async fn on_failure(&self, instrument: String, reason: String, report: &mut TickReport) {
        tracing::warn!(instrument = %instrument, error = %reason, "evaluation failed");
        self.status
            .transition(
                &instrument,
                InstrumentStatus::Failed,
                Some(LastOutcome::Failed { reason: reason.clone() }),
            )
            .await
            .ok();
        report.failed.push((instrument, reason));
    }

    /// Wait for in-flight alert deliveries, up to `timeout`.
    pub async fn drain_alerts(&mut self, timeout: Duration) {
        let pending: Vec<_> = self.pending_alerts.drain(..).collect();
        let count = pending.len();
        let all = async {
            for handle in pending {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "alert task aborted");
                }
            }
        };
        if tokio::time::timeout(timeout, all).await.is_err() {
            tracing::warn!(count, "alert deliveries still pending at shutdown");
        }
    }
}
