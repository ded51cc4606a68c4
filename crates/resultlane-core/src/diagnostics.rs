use std::{fs, path::Path};

use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::DiagnosticsConfig;

pub const DEFAULT_FILTER: &str = "info,resultlane_core=trace";

/// Keeps the file writer alive; logs stop reaching the file once dropped.
pub struct TelemetryGuard {
    pub session_id: Uuid,
    _file_guard: WorkerGuard,
}

pub fn init_tracing(log_dir: impl AsRef<Path>) -> anyhow::Result<TelemetryGuard> {
    init_tracing_with_options(log_dir, "resultlane", DEFAULT_FILTER)
}

pub fn init_tracing_from_config(config: &DiagnosticsConfig) -> anyhow::Result<TelemetryGuard> {
    init_tracing_with_options(
        &config.log_dir,
        &config.trace_file_prefix,
        &config.rust_log_filter,
    )
}

/// Installs compact stdout logs and a JSON log file
/// `<file_prefix>-<timestamp>.log` in `log_dir`. `RUST_LOG` overrides
/// `default_filter`.
pub fn init_tracing_with_options(
    log_dir: impl AsRef<Path>,
    file_prefix: &str,
    default_filter: &str,
) -> anyhow::Result<TelemetryGuard> {
    let log_dir = log_dir.as_ref();
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory: {}", log_dir.display()))?;

    let session_id = Uuid::new_v4();
    let file_name = format!("{file_prefix}-{}.log", Utc::now().format("%Y%m%d-%H%M%S"));
    let (file_writer, file_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, &file_name));

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let initialized = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_thread_ids(true)
                .with_target(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(file_writer),
        )
        .try_init();
    match initialized {
        Ok(()) => info!(%session_id, file = %file_name, "tracing initialized"),
        Err(error) => warn!(?error, "a tracing subscriber is already installed"),
    }

    Ok(TelemetryGuard {
        session_id,
        _file_guard: file_guard,
    })
}
