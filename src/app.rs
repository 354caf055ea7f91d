use std::io;

use anyhow::Result;
use tracing::instrument;

use crate::cli::{Command, LogLevel, OutputFormat};
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};

/// Runs the CLI command, printing JSON results.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = vivolink::Args::try_parse_from(["vivolink", "encode", "--event", "pair-start"])?;
/// let mut out = Vec::new();
/// vivolink::run(args.into_command(), &mut out).await?;
/// assert!(String::from_utf8(out)?.contains("\"message_type\": \"0x13A6\""));
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the command fails, or
/// output writing fails.
pub async fn run<W>(command: Command, out: &mut W) -> Result<()>
where
    W: io::Write,
{
    run_with_log_level(command, out, None, OutputFormat::Json).await
}

/// Runs the CLI command with an explicit telemetry log-level override.
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the command fails, or
/// output writing fails.
pub async fn run_with_log_level<W>(
    command: Command,
    out: &mut W,
    log_level: Option<LogLevel>,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    run_with_clients_and_log_level(
        command,
        out,
        &SystemTerminalClient,
        log_level,
        output_format,
    )
    .await
}

/// Runs the CLI command with an injected terminal client.
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the command fails, or
/// output writing fails.
pub async fn run_with_clients<W>(
    command: Command,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    run_with_clients_and_log_level(command, out, terminal_client, None, output_format).await
}

/// Runs the CLI command with injected clients and explicit telemetry settings.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// struct FakeTerminal;
/// impl vivolink::TerminalClient for FakeTerminal {
///     fn stdout_is_terminal(&self) -> bool { false }
///     fn stderr_is_terminal(&self) -> bool { false }
/// }
///
/// let args = vivolink::Args::try_parse_from(["vivolink", "--log-level", "debug", "types"])?;
/// let log_level = args.log_level();
/// let mut out = Vec::new();
/// vivolink::run_with_clients_and_log_level(
///     args.into_command(),
///     &mut out,
///     &FakeTerminal,
///     log_level,
///     vivolink::OutputFormat::Pretty,
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the command fails, or
/// output writing fails.
#[instrument(
    skip(out, terminal_client),
    level = "info",
    fields(command = %command_name(&command), ?log_level)
)]
pub async fn run_with_clients_and_log_level<W>(
    command: Command,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    log_level: Option<LogLevel>,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        "vivolink",
        terminal_client.stderr_is_terminal(),
        log_level.map(LogLevel::as_filter),
    )?;

    match command {
        Command::Encode(args) => {
            crate::cli::encode::run(&args, out, terminal_client, output_format)
        }
        Command::Decode(args) => {
            crate::cli::decode::run(&args, out, terminal_client, output_format)
        }
        Command::Simulate(args) => {
            crate::cli::simulate::run(&args, out, terminal_client, output_format).await
        }
        Command::Types => crate::cli::types::run(out, terminal_client, output_format),
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Encode(_args) => "encode",
        Command::Decode(_args) => "decode",
        Command::Simulate(_args) => "simulate",
        Command::Types => "types",
    }
}
