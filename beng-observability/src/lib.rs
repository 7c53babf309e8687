pub mod metrics;
pub mod prometheus_exporter;

pub use metrics::MetricsCollector;
pub use prometheus_exporter::render_metrics;
