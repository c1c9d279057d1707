//! Fan-out statistics: delivered/dropped counters per §9's observability requirements.

use std::sync::atomic::{AtomicU64, Ordering};

/// Why a single per-target enqueue attempt did not result in delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The enqueue deadline elapsed before the queue accepted the event.
    Timeout,
    /// The caller's cancellation signal fired before the queue accepted the event.
    ContextCancelled,
    /// The enqueue task panicked.
    Panic,
    /// The subscriber's receiver was already dropped.
    Closed,
}

impl DropReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ContextCancelled => "context_cancelled",
            Self::Panic => "panic",
            Self::Closed => "closed",
        }
    }
}

/// Atomic counters the router updates on every fan-out, read by health and
/// metrics surfaces.
#[derive(Debug, Default)]
pub struct RouterStats {
    delivered: AtomicU64,
    dropped_timeout: AtomicU64,
    dropped_cancelled: AtomicU64,
    dropped_panic: AtomicU64,
    dropped_closed: AtomicU64,
    no_subscriber: AtomicU64,
}

impl RouterStats {
    /// Builds a zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one successful delivery.
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one dropped delivery attempt with `reason`, logging at WARN.
    pub fn record_dropped(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::Timeout => &self.dropped_timeout,
            DropReason::ContextCancelled => &self.dropped_cancelled,
            DropReason::Panic => &self.dropped_panic,
            DropReason::Closed => &self.dropped_closed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(reason = reason.as_str(), "dropped fan-out target");
    }

    /// Records a publish that matched zero subscriber queues.
    pub fn record_no_subscriber(&self) {
        self.no_subscriber.fetch_add(1, Ordering::Relaxed);
    }

    /// Total events successfully delivered across all fan-outs.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Total fan-out attempts dropped for `reason`.
    #[must_use]
    pub fn dropped(&self, reason: DropReason) -> u64 {
        match reason {
            DropReason::Timeout => self.dropped_timeout.load(Ordering::Relaxed),
            DropReason::ContextCancelled => self.dropped_cancelled.load(Ordering::Relaxed),
            DropReason::Panic => self.dropped_panic.load(Ordering::Relaxed),
            DropReason::Closed => self.dropped_closed.load(Ordering::Relaxed),
        }
    }

    /// Total publishes that matched zero subscriber queues.
    #[must_use]
    pub fn no_subscriber_count(&self) -> u64 {
        self.no_subscriber.load(Ordering::Relaxed)
    }
}
