//! Metrics capability for batch outcomes.
//!
//! Recording is best-effort: a failing sink is logged and never affects the pipeline.

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
#[error("Metrics sink error: {0}")]
pub struct MetricsError(pub String);

pub trait MetricsSink: Send + Sync {
    fn record_batch_result(
        &self,
        success: bool,
        batch_size: usize,
        used_fallback: bool,
    ) -> Result<(), MetricsError>;
}

/// Record a batch result, swallowing sink failures with a warning.
pub fn record_batch_best_effort(
    sink: &dyn MetricsSink,
    success: bool,
    batch_size: usize,
    used_fallback: bool,
) {
    if let Err(err) = sink.record_batch_result(success, batch_size, used_fallback) {
        warn!(
            success,
            batch_size,
            used_fallback,
            error = %err,
            "failed to record batch metrics"
        );
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_batch_result(&self, _: bool, _: usize, _: bool) -> Result<(), MetricsError> {
        Ok(())
    }
}

/// Aggregated counters kept by [`InMemoryMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchMetrics {
    pub batches: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: usize,
    pub used_fallback: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    inner: Mutex<BatchMetrics>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BatchMetrics {
        *self.inner.lock()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record_batch_result(
        &self,
        success: bool,
        batch_size: usize,
        used_fallback: bool,
    ) -> Result<(), MetricsError> {
        let mut metrics = self.inner.lock();
        metrics.batches += 1;
        metrics.items += batch_size;
        if success {
            metrics.succeeded += 1;
        } else {
            metrics.failed += 1;
        }
        if used_fallback {
            metrics.used_fallback += 1;
        }
        Ok(())
    }
}
