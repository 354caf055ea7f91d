use std::io::{self, IsTerminal};
use std::sync::OnceLock;
use std::time::Duration;

use indicatif::ProgressStyle;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use tracing::{Level, Metadata, Subscriber};
use tracing_indicatif::{IndicatifLayer, TickSettings};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, filter, fmt};

use crate::error::TelemetryError;

/// Upload spans render as byte counters on an interactive stderr.
const UPLOAD_PROGRESS_TEMPLATE: &str =
    "{spinner:.cyan.bold} {msg} {wide_bar:.cyan/blue} {binary_bytes}/{binary_total_bytes}";

const DEFAULT_DIRECTIVE: &str = "warn";

static TRACING_INITIALISED: OnceLock<Result<(), TelemetryError>> = OnceLock::new();

/// How log events reach stderr.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum OutputMode {
    /// Human-readable events with progress bars for upload spans.
    Interactive,
    /// One JSON object per event.
    Json,
}

impl OutputMode {
    fn detect(stderr_is_terminal: bool) -> Self {
        if stderr_is_terminal && io::stderr().is_terminal() {
            Self::Interactive
        } else {
            Self::Json
        }
    }
}

/// Installs the process-wide tracing subscriber on first call.
///
/// `log_level` takes precedence over `RUST_LOG`; without either only
/// warnings are shown. Later calls return the first outcome.
pub(crate) fn initialise_tracing(
    service_name: &str,
    stderr_is_terminal: bool,
    log_level: Option<&str>,
) -> Result<(), &'static TelemetryError> {
    TRACING_INITIALISED
        .get_or_init(|| {
            install(
                service_name,
                OutputMode::detect(stderr_is_terminal),
                log_filter(log_level),
            )
        })
        .as_ref()
        .copied()
}

fn log_filter(log_level: Option<&str>) -> EnvFilter {
    match log_level {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

fn install(
    service_name: &str,
    mode: OutputMode,
    log_filter: EnvFilter,
) -> Result<(), TelemetryError> {
    let provider = SdkTracerProvider::builder().build();
    let tracer = provider.tracer(service_name.to_owned());
    global::set_tracer_provider(provider);
    subscriber(mode, log_filter, &tracer).try_init()?;
    Ok(())
}

/// Assembles the layer stack for `mode` without installing it.
fn subscriber(
    mode: OutputMode,
    log_filter: EnvFilter,
    tracer: &SdkTracer,
) -> Box<dyn Subscriber + Send + Sync> {
    match mode {
        OutputMode::Interactive => {
            let indicatif = IndicatifLayer::new()
                .with_progress_style(upload_progress_style())
                .with_tick_settings(TickSettings {
                    default_tick_interval: Some(Duration::from_millis(90)),
                    ..TickSettings::default()
                });
            let events = fmt::layer()
                .pretty()
                .with_target(false)
                .with_writer(indicatif.get_stderr_writer())
                .with_filter(log_filter);
            Box::new(
                tracing_subscriber::registry()
                    .with(events)
                    .with(indicatif.with_filter(filter::filter_fn(is_progress_span)))
                    .with(OpenTelemetryLayer::new(tracer.clone())),
            )
        }
        OutputMode::Json => {
            let events = fmt::layer()
                .json()
                .with_target(false)
                .with_current_span(false)
                .with_filter(log_filter);
            Box::new(
                tracing_subscriber::registry()
                    .with(events)
                    .with(OpenTelemetryLayer::new(tracer.clone())),
            )
        }
    }
}

fn upload_progress_style() -> ProgressStyle {
    ProgressStyle::with_template(UPLOAD_PROGRESS_TEMPLATE)
        .unwrap_or_else(|_error| ProgressStyle::default_spinner())
}

/// Only spans that opt in with a `progress` field get a bar.
fn is_progress_span(metadata: &Metadata<'_>) -> bool {
    metadata.is_span()
        && metadata.target().starts_with("vivolink::")
        && *metadata.level() <= Level::INFO
        && metadata.fields().field("progress").is_some()
}

#[cfg(test)]
mod tests {
    use opentelemetry::trace::TracerProvider as _;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn explicit_level_overrides_environment() {
        assert_eq!("trace", log_filter(Some("trace")).to_string());
    }

    #[test]
    fn upload_progress_template_parses() {
        assert!(ProgressStyle::with_template(UPLOAD_PROGRESS_TEMPLATE).is_ok());
    }

    #[test]
    fn piped_stderr_logs_json() {
        assert_eq!(OutputMode::Json, OutputMode::detect(false));
    }

    #[rstest]
    #[case::interactive(OutputMode::Interactive)]
    #[case::json(OutputMode::Json)]
    fn both_output_modes_assemble_a_subscriber(#[case] mode: OutputMode) {
        let tracer = SdkTracerProvider::builder().build().tracer("vivolink-test");
        let stack = subscriber(mode, log_filter(Some("trace")), &tracer);

        tracing::subscriber::with_default(stack, || {
            let span = tracing::info_span!("upload", progress = true);
            let _entered = span.enter();
            tracing::info!(bytes = 4, "chunk written");
        });
    }
}
