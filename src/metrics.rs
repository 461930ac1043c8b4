//! Prometheus metrics for the balance engine.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_with_registry, register_histogram_with_registry, Counter, Encoder, Histogram,
    HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

pub struct Metrics {
    pub registry: Registry,

    pub http_requests_total: Counter,
    pub balance_queries_total: Counter,

    pub transactions_applied_total: Counter,
    pub transactions_duplicate_total: Counter,
    pub transactions_failed_total: Counter,
    pub transaction_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = register_counter_with_registry!(
            Opts::new("balance_http_requests_total", "Total HTTP requests processed"),
            registry
        )?;

        let balance_queries_total = register_counter_with_registry!(
            Opts::new("balance_queries_total", "Balance lookups served"),
            registry
        )?;

        let transactions_applied_total = register_counter_with_registry!(
            Opts::new("balance_transactions_applied_total", "Transactions applied to the ledger"),
            registry
        )?;

        let transactions_duplicate_total = register_counter_with_registry!(
            Opts::new(
                "balance_transactions_duplicate_total",
                "Transactions skipped as already processed"
            ),
            registry
        )?;

        let transactions_failed_total = register_counter_with_registry!(
            Opts::new("balance_transactions_failed_total", "Transactions that failed to process"),
            registry
        )?;

        let transaction_duration_seconds = register_histogram_with_registry!(
            HistogramOpts::new(
                "balance_transaction_duration_seconds",
                "Transaction processing duration in seconds"
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            registry
        )?;

        Ok(Self {
            registry,
            http_requests_total,
            balance_queries_total,
            transactions_applied_total,
            transactions_duplicate_total,
            transactions_failed_total,
            transaction_duration_seconds,
        })
    }

    /// Export all metrics in Prometheus text format
    pub fn export(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});
