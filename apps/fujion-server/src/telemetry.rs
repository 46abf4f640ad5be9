use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const METRIC_SESSIONS_ACTIVE: &str = "fujion_sessions_active";
pub const METRIC_REQUESTS_TOTAL: &str = "fujion_requests_total";
pub const METRIC_REQUEST_FAILURES_TOTAL: &str = "fujion_request_failures_total";
pub const METRIC_INVOCATIONS_SENT_TOTAL: &str = "fujion_invocations_sent_total";
pub const METRIC_PAGES_REAPED_TOTAL: &str = "fujion_pages_reaped_total";

pub struct Telemetry {
    metrics_handle: PrometheusHandle,
}

impl Telemetry {
    pub fn init() -> Result<Self> {
        let metrics_handle = PrometheusBuilder::new()
            .install_recorder()
            .context("failed to install Prometheus metrics recorder")?;

        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
            .context("failed to initialise tracing subscriber")?;

        Ok(Self { metrics_handle })
    }

    pub fn metrics_handle(&self) -> PrometheusHandle {
        self.metrics_handle.clone()
    }
}
