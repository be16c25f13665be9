//! Console logging and the request correlation ID.
//!
//! Log output always goes to stderr; stdout carries the rendered tables and
//! JSON the CLI prints. The active [`TraceContext`] travels with a task and is
//! sent to the API as [`REQUEST_ID_HEADER`] on every call made inside it.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;
use thiserror::Error;
use tokio::task_local;
use tracing::Subscriber;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, registry::LookupSpan};

use crate::config::AppConfig;

/// Header carrying the correlation ID on outbound API requests.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
}

impl TraceContext {
    pub fn generate() -> Self {
        Self {
            trace_id: new_correlation_id(),
        }
    }
}

task_local! {
    static ACTIVE_TRACE_CONTEXT: TraceContext;
}

#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to bridge `log` records into tracing: {0}")]
    LogBridge(#[from] log::SetLoggerError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install the console subscriber for this process.
///
/// Later calls are no-ops. `RUST_LOG` takes precedence over the configured
/// level. The subscriber is installed with `set_global_default` because the
/// `log` bridge is set up here, capped at the configured level.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let installed = install(config);
    if installed.is_err() {
        INSTALLED.store(false, Ordering::SeqCst);
    }
    installed
}

fn install(config: &AppConfig) -> Result<(), TelemetryInitError> {
    LogTracer::builder()
        .with_max_level(bridge_level(&config.log_level))
        .init()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer(&config.log_format));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn console_layer<S>(format: &str) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        "pretty" => fmt::layer()
            .pretty()
            .with_writer(io::stderr)
            .with_target(false)
            .boxed(),
        _ => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_current_span(false)
            .boxed(),
    }
}

// A directive list such as `affiliate_console=debug,warn` has no single
// level; let every record through and leave it to the `EnvFilter`.
fn bridge_level(directives: &str) -> LevelFilter {
    directives.trim().parse().unwrap_or(LevelFilter::Trace)
}

/// Run `future` with `context` as the task's trace context.
pub async fn with_trace_context<Fut, R>(context: TraceContext, future: Fut) -> R
where
    Fut: std::future::Future<Output = R>,
{
    ACTIVE_TRACE_CONTEXT.scope(context, future).await
}

pub fn current_trace_id() -> Option<String> {
    ACTIVE_TRACE_CONTEXT
        .try_with(|ctx| ctx.trace_id.clone())
        .ok()
}

/// Active trace ID, or a fresh one for calls made outside any context.
pub fn trace_id_or_generate() -> String {
    current_trace_id().unwrap_or_else(new_correlation_id)
}

fn new_correlation_id() -> String {
    format!("corr-{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}
