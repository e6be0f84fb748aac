//! Unified logging module for services
//!
//! Console output plus an optional daily-rolling log file, both using the
//! `timestamp [LEVEL] message` line format. HTTP access lines go to the
//! `api_access` target and can be routed to their own file.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter,
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{Error, Result};

/// Target used by the HTTP access logger
pub const API_ACCESS_TARGET: &str = "api_access";

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2026-10-17T08:15:02.113542Z [INFO] Refreshed http://... : 12 rules`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Keeps the non-blocking file writers alive for the life of the process
static GUARDS: OnceLock<Mutex<Vec<WorkerGuard>>> = OnceLock::new();

/// Logger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Service name, used for the default filter and the log file names
    pub service_name: String,
    /// Default filter when `RUST_LOG` is unset (e.g. "info")
    pub level: String,
    /// Directory for log files; `None` disables file output
    pub log_dir: Option<PathBuf>,
    /// JSON lines in the log file instead of the bracketed format
    pub enable_json: bool,
    /// Write `api_access` lines to a separate `{service}_api.log`
    pub enable_api_log: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            level: "info".to_string(),
            log_dir: Some(PathBuf::from("logs")),
            enable_json: false,
            enable_api_log: true,
        }
    }
}

impl LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub fn default_directive(&self) -> String {
        let crate_name = self.service_name.replace('-', "_");
        format!(
            "{},{}=debug,{}={}",
            self.level, crate_name, API_ACCESS_TARGET, self.level
        )
    }
}

/// Initialize the global subscriber
///
/// `RUST_LOG` takes precedence over `config.level`.
pub fn init_with_config(config: &LogConfig) -> Result<()> {
    let directive = std::env::var("RUST_LOG").unwrap_or_else(|_| config.default_directive());
    let env_filter = EnvFilter::try_new(&directive)
        .map_err(|e| Error::Logging(format!("Invalid log filter '{}': {}", directive, e)))?;

    let console_layer = fmt::layer()
        .with_ansi(true)
        .event_format(BracketedLevelFormat)
        .boxed();

    let mut file_layers = Vec::new();
    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;

        let appender =
            tracing_appender::rolling::daily(log_dir, format!("{}.log", config.service_name));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        keep_guard(guard);

        let business = if config.enable_json {
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .event_format(BracketedLevelFormat)
                .boxed()
        };
        let route_api = config.enable_api_log;
        file_layers.push(
            business
                .with_filter(filter::filter_fn(move |metadata| {
                    !route_api || metadata.target() != API_ACCESS_TARGET
                }))
                .boxed(),
        );

        if config.enable_api_log {
            let api_appender = tracing_appender::rolling::daily(
                log_dir,
                format!("{}_api.log", config.service_name),
            );
            let (api_writer, api_guard) = tracing_appender::non_blocking(api_appender);
            keep_guard(api_guard);

            file_layers.push(
                fmt::layer()
                    .with_writer(api_writer)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat)
                    .with_filter(filter::filter_fn(|metadata| {
                        metadata.target() == API_ACCESS_TARGET
                    }))
                    .boxed(),
            );
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layers)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing::info!(
        "Logging: {} @ {}",
        config.service_name,
        config
            .log_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "console".to_string())
    );

    Ok(())
}

fn keep_guard(guard: WorkerGuard) {
    let guards = GUARDS.get_or_init(|| Mutex::new(Vec::new()));
    match guards.lock() {
        Ok(mut guards) => guards.push(guard),
        Err(poisoned) => poisoned.into_inner().push(guard),
    }
}

/// Truncate body string to maximum length, on a char boundary
fn truncate_body(body: &str, max_length: usize) -> String {
    if body.len() <= max_length {
        return body.to_string();
    }
    let mut cut = max_length;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}[truncated {} bytes]", &body[..cut], body.len() - cut)
}

/// HTTP API request logger middleware
///
/// - **INFO**: modifying requests (POST/PUT/PATCH/DELETE), no body
/// - **DEBUG**: every request; JSON bodies of modifying requests are included,
///   truncated to 500 bytes
///
/// Add it to the router before `.with_state()`:
/// ```rust,ignore
/// let app = Router::new()
///     // ... routes ...
///     .layer(middleware::from_fn(http_request_logger))
///     .with_state(state);
/// ```
#[cfg(feature = "axum")]
pub async fn http_request_logger(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    use axum::body::Body;
    use std::time::Instant;
    use tracing::{debug, info, level_enabled};

    const MAX_BODY_LENGTH: usize = 500;

    let method = req.method().clone();
    let uri = req.uri().clone();
    let modifying = matches!(method.as_str(), "POST" | "PUT" | "PATCH" | "DELETE");
    let is_json = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);
    let start = Instant::now();

    let (req, body_str) = if level_enabled!(Level::DEBUG) && modifying && is_json {
        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("Failed to read request body: {}", e);
                let new_req = axum::extract::Request::from_parts(parts, Body::empty());
                return next.run(new_req).await;
            },
        };
        let body_str = match std::str::from_utf8(&bytes) {
            Ok(s) => truncate_body(s, MAX_BODY_LENGTH),
            Err(_) => "<binary data>".to_string(),
        };
        (
            axum::extract::Request::from_parts(parts, Body::from(bytes)),
            Some(body_str),
        )
    } else {
        (req, None)
    };

    let response = next.run(req).await;
    let duration = start.elapsed();
    let status = response.status();

    if modifying {
        info!(
            target: "api_access",
            method = %method,
            path = %uri.path(),
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "HTTP request"
        );
    }

    match body_str {
        Some(body) => debug!(
            target: "api_access",
            method = %method,
            path = %uri.path(),
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            request_body = %body,
            "HTTP request (detailed)"
        ),
        None if !modifying => debug!(
            target: "api_access",
            method = %method,
            path = %uri.path(),
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "HTTP request"
        ),
        None => {},
    }

    response
}
