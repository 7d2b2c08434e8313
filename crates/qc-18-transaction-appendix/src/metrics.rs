//! # Appendix Metrics
//!
//! Prometheus metrics for the appendix subsystem and its quorum engine.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! qc-18-transaction-appendix = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `appendix_polls_registered_total` - Counter of pending polls created
//! - `appendix_polls_resolved_total` - Counter of resolved polls (by outcome)
//! - `appendix_poll_persist_failures_total` - Counter of polls the store refused
//! - `appendix_rejected_total` - Counter of appendices failing validation (by kind)

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Total pending polls registered
    pub static ref POLLS_REGISTERED: IntCounter = register_int_counter!(
        "appendix_polls_registered_total",
        "Total number of pending polls registered"
    )
    .expect("Failed to create POLLS_REGISTERED metric");

    /// Total polls resolved, labeled by outcome
    pub static ref POLLS_RESOLVED: IntCounterVec = register_int_counter_vec!(
        "appendix_polls_resolved_total",
        "Total number of polls resolved",
        &["outcome"]
    )
    .expect("Failed to create POLLS_RESOLVED metric");

    /// Total poll persistence failures
    pub static ref POLL_PERSIST_FAILURES: IntCounter = register_int_counter!(
        "appendix_poll_persist_failures_total",
        "Total number of pending polls that could not be persisted"
    )
    .expect("Failed to create POLL_PERSIST_FAILURES metric");

    /// Total appendices rejected, labeled by kind
    pub static ref APPENDICES_REJECTED: IntCounterVec = register_int_counter_vec!(
        "appendix_rejected_total",
        "Total number of appendices rejected by validation",
        &["kind"]
    )
    .expect("Failed to create APPENDICES_REJECTED metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

#[cfg(feature = "metrics")]
pub fn record_poll_registered() {
    POLLS_REGISTERED.inc();
}

/// Record a poll resolution ("approved" or "rejected")
#[cfg(feature = "metrics")]
pub fn record_poll_resolved(outcome: &str) {
    POLLS_RESOLVED.with_label_values(&[outcome]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_poll_persist_failure() {
    POLL_PERSIST_FAILURES.inc();
}

/// Record a rejected appendix by canonical name
#[cfg(feature = "metrics")]
pub fn record_appendix_rejected(kind: &str) {
    APPENDICES_REJECTED.with_label_values(&[kind]).inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_poll_registered() {}

#[cfg(not(feature = "metrics"))]
pub fn record_poll_resolved(_outcome: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_poll_persist_failure() {}

#[cfg(not(feature = "metrics"))]
pub fn record_appendix_rejected(_kind: &str) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_callable_in_any_build() {
        record_poll_registered();
        record_poll_resolved("approved");
        record_poll_persist_failure();
        record_appendix_rejected("TwoPhased");
    }
}
