//! Logging for `pipeline-server`.
//!
//! Every request produces a `graphql.*` span, the board work under it a
//! `crm.*` span, and store calls a `db.deal.*` span. The default filter keeps
//! those at `info` and quiets per-request HTTP and SQL chatter. With an OTLP
//! endpoint the same spans are exported, so a slow `crm.update_stage` can be
//! traced down to its `db.deal.update_stage` transaction.

use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{self as sdk, Resource};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: OnceCell<()> = OnceCell::new();

/// Filter used when neither the caller nor `RUST_LOG` sets one.
pub const DEFAULT_FILTER: &str = "info,tower_http=warn,sea_orm=warn";

/// Where the server's logs and spans go. `service_name` labels exported spans.
#[derive(Clone, Debug)]
pub struct ObsConfig {
    pub service_name: &'static str,
    pub env_filter: Option<String>,
    pub otlp_endpoint: Option<String>,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            service_name: "pipeline-server",
            env_filter: None,
            otlp_endpoint: None,
        }
    }
}

impl ObsConfig {
    /// Explicit settings first, then `RUST_LOG` / `OTLP_ENDPOINT`.
    pub fn resolve(self) -> Self {
        let env_filter = self
            .env_filter
            .or_else(|| std::env::var("RUST_LOG").ok())
            .filter(|value| !value.trim().is_empty());
        let otlp_endpoint = self
            .otlp_endpoint
            .or_else(|| std::env::var("OTLP_ENDPOINT").ok())
            .filter(|value| !value.trim().is_empty());
        Self {
            service_name: self.service_name,
            env_filter,
            otlp_endpoint,
        }
    }

    fn filter(&self) -> &str {
        self.env_filter.as_deref().unwrap_or(DEFAULT_FILTER)
    }
}

/// Install the server's subscriber once per process; later calls return
/// `Ok` without touching it. Spans are exported only when `otlp_endpoint`
/// resolves to a value.
pub fn init_tracing(config: ObsConfig) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }
    let config = config.resolve();

    let env_filter = EnvFilter::try_new(config.filter())?;
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let tracer = span_export(config.service_name, endpoint)?.tracer(config.service_name);
            registry
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()?;
            tracing::info!(endpoint, service = config.service_name, "OTLP span export enabled");
        }
        None => registry.try_init()?,
    }

    INIT.set(())
        .map_err(|_| anyhow!("tracing already initialized"))?;
    Ok(())
}

/// Batched OTLP/HTTP export tagged with the service name.
fn span_export(service_name: &'static str, endpoint: &str) -> Result<sdk::trace::SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .build()?;
    let resource = Resource::builder().with_service_name(service_name).build();
    Ok(sdk::trace::SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}
