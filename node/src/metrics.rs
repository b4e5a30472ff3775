//! # Prometheus Metrics
//!
//! Flow counters and latency for a simulation run. The registry is dumped
//! in text exposition format after the run when `--metrics` is given.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] with the
//! `remit` prefix.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;

use remit_protocol::flows::FlowError;

#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Flows started, by kind.
    pub flows_started_total: IntCounterVec,
    /// Flows finished, by kind and outcome (`ok` or the error kind).
    pub flows_completed_total: IntCounterVec,
    /// Wall-clock flow latency in seconds, by kind.
    pub flow_latency_seconds: HistogramVec,
    /// Nodes running on the simulated network.
    pub nodes: IntGauge,
}

impl NodeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("remit".into()), None)?;

        let flows_started_total = IntCounterVec::new(
            Opts::new("flows_started_total", "Total number of flows started"),
            &["kind"],
        )?;
        registry.register(Box::new(flows_started_total.clone()))?;

        let flows_completed_total = IntCounterVec::new(
            Opts::new(
                "flows_completed_total",
                "Total number of flows finished, by outcome",
            ),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(flows_completed_total.clone()))?;

        let flow_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "flow_latency_seconds",
                "End-to-end flow latency in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0,
            ]),
            &["kind"],
        )?;
        registry.register(Box::new(flow_latency_seconds.clone()))?;

        let nodes = IntGauge::new("nodes", "Nodes on the simulated network")?;
        registry.register(Box::new(nodes.clone()))?;

        Ok(Self {
            registry,
            flows_started_total,
            flows_completed_total,
            flow_latency_seconds,
            nodes,
        })
    }

    pub fn flow_started(&self, kind: &str) {
        self.flows_started_total.with_label_values(&[kind]).inc();
    }

    /// Records the outcome and latency of a finished flow.
    pub fn flow_finished<T>(&self, kind: &str, result: &Result<T, FlowError>, elapsed: Duration) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        self.flows_completed_total
            .with_label_values(&[kind, outcome])
            .inc();
        self.flow_latency_seconds
            .with_label_values(&[kind])
            .observe(elapsed.as_secs_f64());
    }

    /// Encodes all registered metrics into the Prometheus text format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_are_labelled() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.flow_started("approve");
        metrics.flow_finished::<()>("approve", &Ok(()), Duration::from_millis(3));
        metrics.flow_finished::<()>(
            "approve",
            &Err(FlowError::NotFound {
                prefix: "ab".into(),
            }),
            Duration::from_millis(1),
        );

        let text = metrics.encode().unwrap();
        assert!(text.contains("remit_flows_started_total{kind=\"approve\"} 1"));
        assert!(text.contains("outcome=\"ok\""));
        assert!(text.contains("outcome=\"not_found\""));
        assert!(text.contains("remit_flow_latency_seconds_count{kind=\"approve\"} 2"));
    }
}
