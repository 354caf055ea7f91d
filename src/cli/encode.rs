use std::io;

use anyhow::Result;
use serde::Serialize;
use serde_with::{hex::Hex, serde_as};
use tracing::instrument;

use crate::cli::{EncodeArgs, OutputFormat, write_json_line};
use crate::error::CliConfigError;
use crate::messages::{Message, RawMessage, SystemEvent};
use crate::protocol::MessageType;
use crate::terminal::TerminalClient;

use super::decode::parse_hex;
use super::ui::{EncodeView, Painter};

/// Wire forms of one encoded message.
#[serde_as]
#[derive(Debug, Serialize)]
pub(crate) struct EncodeReport {
    message_type: MessageType,
    name: &'static str,
    #[serde_as(as = "Hex")]
    payload: Vec<u8>,
    #[serde_as(as = "Hex")]
    frame: Vec<u8>,
    #[serde_as(as = "Vec<Hex>")]
    chunks: Vec<Vec<u8>>,
}

impl EncodeReport {
    pub(crate) fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub(crate) fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub(crate) fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }
}

fn message_from(args: &EncodeArgs) -> Result<Message, CliConfigError> {
    if let Some(kind) = args.event_kind() {
        return Ok(Message::from(SystemEvent::from(kind)));
    }
    let message_type = args.message_type().unwrap_or(MessageType::SYSTEM_EVENT);
    let body = parse_hex(args.body())?;
    Ok(Message::decode(&raw_payload(message_type, &body)).unwrap_or_else(|_| {
        Message::Raw(RawMessage::new(message_type, body))
    }))
}

fn raw_payload(message_type: MessageType, body: &[u8]) -> Vec<u8> {
    let mut payload = message_type.as_raw().to_le_bytes().to_vec();
    payload.extend_from_slice(body);
    payload
}

pub(crate) fn encode(args: &EncodeArgs) -> Result<EncodeReport> {
    let message = message_from(args)?;
    let pipeline = args.link().link_config().pipeline();
    let payload = message.to_payload()?;
    let frame = pipeline.encode(&payload)?;
    let chunks = pipeline.encode_chunks(&payload)?;
    Ok(EncodeReport {
        message_type: message.message_type(),
        name: message.message_type().name(),
        payload,
        frame,
        chunks,
    })
}

/// Executes the `encode` command.
#[instrument(skip(args, out, terminal_client), level = "info", fields(?output_format))]
pub(crate) fn run<W>(
    args: &EncodeArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let report = encode(args)?;
    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", EncodeView::new(&report, &painter))?;
        }
        OutputFormat::Json => write_json_line(out, &report)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::cli::EventName;
    use crate::utils::format_hex;

    #[test]
    fn named_event_encodes_with_empty_extra_marker() {
        let report = encode(&EncodeArgs::event(EventName::PairStart))
            .expect("a named event should encode");

        assert_eq!(MessageType::SYSTEM_EVENT, report.message_type());
        assert_snapshot!(format_hex(report.payload()), @"A6 13 03 01 00");
        assert_snapshot!(format_hex(report.frame()), @"00 01 02 09 05 A6 13 03 01 03 64 0D 00");
    }

    #[test]
    fn typed_body_is_re_encoded_through_its_variant() {
        let report = encode(&EncodeArgs::raw(MessageType::SYSTEM_EVENT, "03 01 00"))
            .expect("a system event body should encode");

        assert_eq!("system_event", report.name());
        assert_eq!(&[0xA6, 0x13, 0x03, 0x01, 0x00], report.payload());
    }

    #[test]
    fn unknown_type_keeps_raw_body() {
        let report = encode(&EncodeArgs::raw(MessageType::new(0x1234), "AA"))
            .expect("an unknown type should encode as raw bytes");

        assert_eq!("unknown", report.name());
        assert_eq!(&[0x34, 0x12, 0xAA], report.payload());
    }

    #[test]
    fn long_frames_split_into_chunks() {
        let body = "11".repeat(40);
        let report = encode(&EncodeArgs::raw(MessageType::FIT_DATA, body))
            .expect("a raw FIT body should encode");

        let lengths: Vec<usize> = report.chunks().iter().map(Vec::len).collect();
        assert_eq!(vec![20, 20, 10], lengths);
        assert_eq!(report.frame(), report.chunks().concat());
    }

    #[test]
    fn invalid_body_hex_is_rejected() {
        let error = encode(&EncodeArgs::raw(MessageType::SYSTEM_EVENT, "0G"))
            .expect_err("non-hex body should fail");

        assert!(error.to_string().starts_with("invalid hex payload"));
    }
}
