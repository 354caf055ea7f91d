use std::path::PathBuf;
use std::time::Duration;

use clap::builder::TypedValueParser as _;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use crate::config::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_REPLY_TIMEOUT, DEFAULT_TRANSFER_LIMIT, LinkConfig,
};
use crate::messages::SystemEventKind;
use crate::protocol::MessageType;
use crate::wire::{ChecksumAlgorithm, ChecksumPolicy, DEFAULT_MAX_CHUNK_LEN};

/// Command-line options for the vivofit 3 link tool.
#[derive(Debug, Parser)]
#[command(
    name = "vivolink",
    about = "Encode, decode and simulate vivofit 3 link traffic."
)]
pub struct Args {
    /// Output style; defaults to pretty on a terminal and JSON otherwise.
    #[arg(long, global = true, value_enum)]
    output_format: Option<OutputFormat>,
    /// Log verbosity; overrides `RUST_LOG`.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use vivolink::{Args, Command};
    ///
    /// let args = Args::new(Command::Types);
    /// assert_eq!(None, args.log_level());
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            output_format: None,
            log_level: None,
            command,
        }
    }

    #[must_use]
    pub fn with_output_format(mut self, output_format: OutputFormat) -> Self {
        self.output_format = Some(output_format);
        self
    }

    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output_format
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Output rendering for command results.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Log verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter directive for this level.
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Wrap a message into a frame and the chunks written to the transport.
    Encode(EncodeArgs),
    /// Reassemble and decode frames captured from the transport.
    Decode(DecodeArgs),
    /// Run a scripted exchange against an in-memory device.
    Simulate(SimulateArgs),
    /// List the catalogued message types.
    Types,
}

/// Framing and link settings shared by every command.
#[derive(Debug, Clone, ClapArgs)]
pub struct LinkArgs {
    /// CRC-16 variant for the frame checksum.
    #[arg(long, default_value_t = ChecksumAlgorithm::Ibm)]
    checksum: ChecksumAlgorithm,
    /// What to do with frames whose checksum does not match.
    #[arg(long, default_value_t = ChecksumPolicy::LogOnly)]
    checksum_policy: ChecksumPolicy,
    /// Largest transport write in bytes.
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_CHUNK_LEN,
        value_parser = clap::value_parser!(u16).range(1..).map(usize::from)
    )]
    max_chunk_len: usize,
    /// Wait for each correlated reply (e.g. `250ms`, `5s`).
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    reply_timeout: Duration,
    /// Wait for the device to announce itself after connecting.
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    handshake_timeout: Duration,
    /// File bytes carried by one transfer message.
    #[arg(long, default_value_t = DEFAULT_TRANSFER_LIMIT)]
    transfer_limit: usize,
}

impl Default for LinkArgs {
    fn default() -> Self {
        Self {
            checksum: ChecksumAlgorithm::default(),
            checksum_policy: ChecksumPolicy::default(),
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            transfer_limit: DEFAULT_TRANSFER_LIMIT,
        }
    }
}

impl LinkArgs {
    /// Builds the link configuration these flags describe.
    #[must_use]
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig::builder()
            .checksum(self.checksum)
            .checksum_policy(self.checksum_policy)
            .max_chunk_len(self.max_chunk_len)
            .reply_timeout(self.reply_timeout)
            .handshake_timeout(self.handshake_timeout)
            .transfer_limit(self.transfer_limit)
            .build()
    }
}

/// Arguments for the `encode` command.
#[derive(Debug, ClapArgs)]
pub struct EncodeArgs {
    /// Message type code, hexadecimal (`0x13A6`) or decimal.
    #[arg(long = "type", value_name = "TYPE", conflicts_with = "event")]
    message_type: Option<MessageType>,
    /// Message body as hexadecimal bytes.
    #[arg(long, default_value = "", requires = "message_type")]
    body: String,
    /// Encode a system event by name instead of a raw body.
    #[arg(long, value_enum, required_unless_present = "message_type")]
    event: Option<EventName>,
    #[command(flatten)]
    link: LinkArgs,
}

impl EncodeArgs {
    /// Encodes a raw message of `message_type` carrying `body_hex`.
    ///
    /// ```
    /// # async fn demo() -> anyhow::Result<()> {
    /// use vivolink::{Command, EncodeArgs, MessageType};
    ///
    /// let args = EncodeArgs::raw(MessageType::SYSTEM_EVENT, "03 01 00");
    /// let mut out = Vec::new();
    /// vivolink::run(Command::Encode(args), &mut out).await?;
    /// assert!(String::from_utf8(out)?.contains("0001020905a6130301"));
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn raw(message_type: MessageType, body_hex: impl Into<String>) -> Self {
        Self {
            message_type: Some(message_type),
            body: body_hex.into(),
            event: None,
            link: LinkArgs::default(),
        }
    }

    /// Encodes one system event.
    #[must_use]
    pub fn event(event: EventName) -> Self {
        Self {
            message_type: None,
            body: String::new(),
            event: Some(event),
            link: LinkArgs::default(),
        }
    }

    pub(crate) fn message_type(&self) -> Option<MessageType> {
        self.message_type
    }

    pub(crate) fn body(&self) -> &str {
        &self.body
    }

    pub(crate) fn event_kind(&self) -> Option<SystemEventKind> {
        self.event.map(EventName::kind)
    }

    pub(crate) fn link(&self) -> &LinkArgs {
        &self.link
    }
}

/// System events the `encode` command knows by name.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum EventName {
    SyncComplete,
    SyncFail,
    FactoryReset,
    PairStart,
    PairComplete,
    PairFail,
    SyncReady,
    DeviceDisconnect,
    TimeUpdated,
}

impl EventName {
    fn kind(self) -> SystemEventKind {
        match self {
            Self::SyncComplete => SystemEventKind::SyncComplete,
            Self::SyncFail => SystemEventKind::SyncFail,
            Self::FactoryReset => SystemEventKind::FactoryReset,
            Self::PairStart => SystemEventKind::PairStart,
            Self::PairComplete => SystemEventKind::PairComplete,
            Self::PairFail => SystemEventKind::PairFail,
            Self::SyncReady => SystemEventKind::SyncReady,
            Self::DeviceDisconnect => SystemEventKind::DeviceDisconnect,
            Self::TimeUpdated => SystemEventKind::TimeUpdated,
        }
    }
}

/// Arguments for the `decode` command.
#[derive(Debug, ClapArgs)]
pub struct DecodeArgs {
    /// Captured bytes as hexadecimal; whitespace, `:` and `,` are ignored.
    #[arg(required_unless_present = "input", conflicts_with = "input")]
    hex: Option<String>,
    /// Read the hexadecimal capture from a file instead.
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,
    #[command(flatten)]
    link: LinkArgs,
}

impl DecodeArgs {
    /// Decodes an inline hexadecimal capture.
    ///
    /// ```
    /// # async fn demo() -> anyhow::Result<()> {
    /// use vivolink::{Command, DecodeArgs};
    ///
    /// let args = DecodeArgs::hex("00 01 02 09 05 A6 13 03 01 03 64 0D 00");
    /// let mut out = Vec::new();
    /// vivolink::run(Command::Decode(args), &mut out).await?;
    /// assert!(String::from_utf8(out)?.contains("pair_start"));
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn hex(capture: impl Into<String>) -> Self {
        Self {
            hex: Some(capture.into()),
            input: None,
            link: LinkArgs::default(),
        }
    }

    /// Decodes the capture stored at `path`.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            hex: None,
            input: Some(path.into()),
            link: LinkArgs::default(),
        }
    }

    pub(crate) fn inline_hex(&self) -> Option<&str> {
        self.hex.as_deref()
    }

    pub(crate) fn input(&self) -> Option<&PathBuf> {
        self.input.as_ref()
    }

    pub(crate) fn link(&self) -> &LinkArgs {
        &self.link
    }
}

/// Arguments for the `simulate` command.
#[derive(Debug, ClapArgs)]
pub struct SimulateArgs {
    #[command(flatten)]
    link: LinkArgs,
    #[command(subcommand)]
    scenario: Scenario,
}

impl SimulateArgs {
    #[must_use]
    pub fn new(scenario: Scenario) -> Self {
        Self {
            link: LinkArgs::default(),
            scenario,
        }
    }

    pub(crate) fn link(&self) -> &LinkArgs {
        &self.link
    }

    pub(crate) fn scenario(&self) -> &Scenario {
        &self.scenario
    }
}

/// Exchange run by `simulate`.
#[derive(Debug, Clone, Subcommand)]
pub enum Scenario {
    /// Connect and wait for the device to announce itself.
    Handshake,
    /// Upload a file after the handshake.
    Upload(UploadArgs),
    /// Run the pairing sequence with the default settings file.
    Pair,
}

impl Scenario {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Handshake => "handshake",
            Self::Upload(_args) => "upload",
            Self::Pair => "pair",
        }
    }
}

/// File source for the `simulate upload` scenario.
#[derive(Debug, Clone, ClapArgs)]
pub struct UploadArgs {
    /// Upload this file.
    #[arg(long, value_name = "PATH", conflicts_with = "size")]
    file: Option<PathBuf>,
    /// Upload this many generated bytes.
    #[arg(long, default_value_t = 45)]
    size: usize,
    /// File subtype announced to the device.
    #[arg(long, default_value_t = 0x09)]
    subtype: u8,
}

impl UploadArgs {
    /// Uploads `size` generated bytes with the settings subtype.
    #[must_use]
    pub fn generated(size: usize) -> Self {
        Self {
            file: None,
            size,
            subtype: 0x09,
        }
    }

    /// Uploads the contents of `path` with the settings subtype.
    #[must_use]
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            size: 0,
            subtype: 0x09,
        }
    }

    pub(crate) fn file(&self) -> Option<&PathBuf> {
        self.file.as_ref()
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn subtype(&self) -> u8 {
        self.subtype
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clap::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn encode_requires_type_or_event() {
        let result = Args::try_parse_from(["vivolink", "encode"]);

        let error = result.expect_err("encode without --type or --event should fail parsing");
        assert_eq!(ErrorKind::MissingRequiredArgument, error.kind());
    }

    #[test]
    fn encode_rejects_type_together_with_event() {
        let result = Args::try_parse_from([
            "vivolink",
            "encode",
            "--type",
            "0x13A6",
            "--event",
            "pair-start",
        ]);

        let error = result.expect_err("--type and --event should conflict");
        assert_eq!(ErrorKind::ArgumentConflict, error.kind());
    }

    #[rstest]
    #[case::hex("0x13A6")]
    #[case::decimal("5030")]
    fn encode_accepts_hex_and_decimal_types(#[case] raw: &str) {
        let args = Args::try_parse_from(["vivolink", "encode", "--type", raw])
            .expect("a numeric message type should parse");

        let Command::Encode(encode) = args.into_command() else {
            panic!("expected the encode command");
        };
        assert_eq!(Some(MessageType::SYSTEM_EVENT), encode.message_type());
    }

    #[test]
    fn link_flags_build_link_config() {
        let args = Args::try_parse_from([
            "vivolink",
            "simulate",
            "--checksum",
            "xmodem",
            "--checksum-policy",
            "enforce",
            "--reply-timeout",
            "250ms",
            "--transfer-limit",
            "20",
            "handshake",
        ])
        .expect("valid link flags should parse");

        let Command::Simulate(simulate) = args.into_command() else {
            panic!("expected the simulate command");
        };
        let config = simulate.link().link_config();
        assert_eq!(ChecksumAlgorithm::Xmodem, config.checksum());
        assert_eq!(ChecksumPolicy::Enforce, config.checksum_policy());
        assert_eq!(Duration::from_millis(250), config.reply_timeout());
        assert_eq!(20, config.transfer_limit());
        assert_matches!(simulate.scenario(), Scenario::Handshake);
    }

    #[test]
    fn zero_chunk_length_is_rejected() {
        let result = Args::try_parse_from([
            "vivolink",
            "encode",
            "--event",
            "pair-start",
            "--max-chunk-len",
            "0",
        ]);

        let error = result.expect_err("a zero chunk length should fail validation");
        assert_eq!(ErrorKind::ValueValidation, error.kind());
    }

    #[test]
    fn decode_takes_inline_hex_or_file_but_not_both() {
        let result = Args::try_parse_from(["vivolink", "decode", "00", "--input", "capture.hex"]);

        let error = result.expect_err("inline hex and --input should conflict");
        assert_eq!(ErrorKind::ArgumentConflict, error.kind());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let args = Args::try_parse_from([
            "vivolink",
            "types",
            "--output-format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("global flags should parse after the subcommand");

        assert_eq!(Some(OutputFormat::Json), args.output_format());
        assert_eq!(Some("debug"), args.log_level().map(LogLevel::as_filter));
    }
}
