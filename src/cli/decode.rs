use std::io;

use anyhow::Result;
use serde::Serialize;
use serde_with::{hex::Hex, serde_as};
use tracing::{instrument, warn};

use crate::cli::{DecodeArgs, OutputFormat, write_json_line};
use crate::error::CliConfigError;
use crate::messages::Message;
use crate::protocol::MessageType;
use crate::terminal::TerminalClient;
use crate::wire::{ChunkReassembler, FramePipeline};

use super::ui::{DecodeView, Painter};

/// Parses hexadecimal text, ignoring whitespace, `:` and `,` separators.
pub(crate) fn parse_hex(text: &str) -> Result<Vec<u8>, CliConfigError> {
    let digits: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != ',')
        .collect();
    hex::decode(digits).map_err(|source| CliConfigError::InvalidHex { source })
}

/// One frame found in a capture.
#[serde_as]
#[derive(Debug, Serialize)]
pub(crate) struct DecodedFrame {
    index: usize,
    #[serde_as(as = "Hex")]
    frame: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_type: Option<MessageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl DecodedFrame {
    fn new(index: usize, frame: Vec<u8>, pipeline: &FramePipeline) -> Self {
        let mut decoded = Self {
            index,
            frame,
            message_type: None,
            message: None,
            error: None,
        };
        let payload = match pipeline.decode(&decoded.frame) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(index, %error, "dropping malformed frame");
                decoded.error = Some(error.to_string());
                return decoded;
            }
        };
        match Message::decode(&payload) {
            Ok(message) => {
                decoded.message_type = Some(message.message_type());
                decoded.message = Some(message);
            }
            Err(error) => {
                warn!(index, %error, "frame payload is not a valid message");
                decoded.message_type = crate::messages::split_header(&payload)
                    .ok()
                    .map(|(message_type, _body)| message_type);
                decoded.error = Some(error.to_string());
            }
        }
        decoded
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub(crate) fn message_type(&self) -> Option<MessageType> {
        self.message_type
    }

    pub(crate) fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    pub(crate) fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Frames recovered from one capture.
#[derive(Debug, Serialize)]
pub(crate) struct DecodeReport {
    frames: Vec<DecodedFrame>,
    /// Bytes of an unterminated frame left at the end of the capture.
    incomplete_bytes: usize,
}

impl DecodeReport {
    pub(crate) fn frames(&self) -> &[DecodedFrame] {
        &self.frames
    }

    pub(crate) fn incomplete_bytes(&self) -> usize {
        self.incomplete_bytes
    }
}

pub(crate) fn decode_capture(capture: &[u8], pipeline: &FramePipeline) -> DecodeReport {
    let mut reassembler = ChunkReassembler::default();
    let frames = reassembler
        .push(capture)
        .into_iter()
        .enumerate()
        .map(|(index, frame)| DecodedFrame::new(index, frame, pipeline))
        .collect();
    DecodeReport {
        frames,
        incomplete_bytes: reassembler.pending_len(),
    }
}

fn read_capture(args: &DecodeArgs) -> Result<Vec<u8>, CliConfigError> {
    match (args.inline_hex(), args.input()) {
        (Some(text), _) => parse_hex(text),
        (None, Some(path)) => {
            let text =
                std::fs::read_to_string(path).map_err(|source| CliConfigError::ReadInput {
                    path: path.display().to_string(),
                    source,
                })?;
            parse_hex(&text)
        }
        (None, None) => Ok(Vec::new()),
    }
}

/// Executes the `decode` command.
#[instrument(skip(args, out, terminal_client), level = "info", fields(?output_format))]
pub(crate) fn run<W>(
    args: &DecodeArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let capture = read_capture(args)?;
    let pipeline = args.link().link_config().pipeline();
    let report = decode_capture(&capture, &pipeline);
    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", DecodeView::new(&report, &painter))?;
        }
        OutputFormat::Json => write_json_line(out, &report)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::messages::{SystemEvent, SystemEventKind};
    use crate::wire::ChecksumPolicy;

    const PAIR_START_FRAME: &str = "00 01 02 09 05 A6 13 03 01 03 64 0D 00";

    #[rstest]
    #[case::spaced("0A 0b", vec![0x0A, 0x0B])]
    #[case::colons("0a:0b", vec![0x0A, 0x0B])]
    #[case::commas_and_newlines("0a,\n0b", vec![0x0A, 0x0B])]
    #[case::empty("", vec![])]
    fn parse_hex_ignores_separators(#[case] text: &str, #[case] expected: Vec<u8>) {
        assert_eq!(expected, parse_hex(text).expect("separated hex should parse"));
    }

    #[test]
    fn parse_hex_rejects_odd_digit_count() {
        assert_matches!(parse_hex("ABC"), Err(CliConfigError::InvalidHex { .. }));
    }

    #[test]
    fn capture_with_two_frames_decodes_both() {
        let capture = parse_hex(&format!("{PAIR_START_FRAME} {PAIR_START_FRAME}"))
            .expect("capture should parse");
        let report = decode_capture(&capture, &FramePipeline::default());

        assert_eq!(2, report.frames().len());
        assert_eq!(0, report.incomplete_bytes());
        let expected = Message::from(SystemEvent::new(SystemEventKind::PairStart, vec![0x00]));
        assert_eq!(Some(&expected), report.frames()[1].message());
    }

    #[test]
    fn corrupt_checksum_is_reported_when_enforced() {
        let capture = parse_hex("00 01 02 09 05 A6 13 03 01 03 64 0E 00")
            .expect("capture should parse");
        let pipeline = FramePipeline::builder()
            .checksum_policy(ChecksumPolicy::Enforce)
            .build();
        let report = decode_capture(&capture, &pipeline);

        let frame = &report.frames()[0];
        assert_eq!(None, frame.message());
        assert!(
            frame
                .error()
                .is_some_and(|error| error.starts_with("checksum mismatch"))
        );
    }

    #[test]
    fn trailing_partial_frame_is_counted() {
        let capture = parse_hex("00 01 02 09 05 A6").expect("capture should parse");
        let report = decode_capture(&capture, &FramePipeline::default());

        assert!(report.frames().is_empty());
        assert_eq!(5, report.incomplete_bytes());
    }
}
