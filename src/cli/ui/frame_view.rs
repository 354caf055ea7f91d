use std::fmt::{self, Display, Formatter};

use crate::cli::decode::{DecodeReport, DecodedFrame};
use crate::cli::encode::EncodeReport;
use crate::utils::format_hex;

use super::painter::Painter;

/// Renders the wire forms of an encoded message.
pub(crate) struct EncodeView<'a> {
    report: &'a EncodeReport,
    painter: &'a Painter,
}

impl<'a> EncodeView<'a> {
    pub(crate) fn new(report: &'a EncodeReport, painter: &'a Painter) -> Self {
        Self { report, painter }
    }
}

impl Display for EncodeView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let report = self.report;
        write!(
            f,
            "{} {} {}",
            self.painter.heading("Message:"),
            self.painter.value(report.message_type().to_string()),
            self.painter.muted(format!("({})", report.name()))
        )?;
        write!(
            f,
            "\n  {} {}",
            self.painter.muted("payload"),
            format_hex(report.payload())
        )?;
        write!(
            f,
            "\n  {}   {}",
            self.painter.muted("frame"),
            format_hex(report.frame())
        )?;
        write!(
            f,
            "\n{}",
            self.painter
                .heading(format!("Chunks ({}):", report.chunks().len()))
        )?;
        for (index, chunk) in report.chunks().iter().enumerate() {
            write!(
                f,
                "\n  {} {}",
                self.painter.muted(format!("[{index:02}]")),
                format_hex(chunk)
            )?;
        }
        Ok(())
    }
}

/// Renders every frame recovered from a capture.
pub(crate) struct DecodeView<'a> {
    report: &'a DecodeReport,
    painter: &'a Painter,
}

impl<'a> DecodeView<'a> {
    pub(crate) fn new(report: &'a DecodeReport, painter: &'a Painter) -> Self {
        Self { report, painter }
    }

    fn frame_line(&self, frame: &DecodedFrame) -> Result<String, fmt::Error> {
        let index = self.painter.muted(format!("[{:04}]", frame.index()));
        let type_label = frame
            .message_type()
            .map_or_else(|| self.painter.value("?"), |message_type| {
                self.painter.message_type(message_type)
            });
        let detail = match (frame.message(), frame.error()) {
            (Some(message), _) => serde_json::to_string(message).map_err(|_| fmt::Error)?,
            (None, Some(error)) => self.painter.warning(format!("malformed: {error}")),
            (None, None) => String::new(),
        };
        Ok(format!(
            "{index} {type_label} {detail}\n       {}",
            self.painter
                .muted(format!("raw={}", format_hex(frame.frame())))
        ))
    }
}

impl Display for DecodeView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let frames = self.report.frames();
        write!(
            f,
            "{}",
            self.painter.heading(format!("Frames ({}):", frames.len()))
        )?;
        for frame in frames {
            write!(f, "\n{}", self.frame_line(frame)?)?;
        }
        let incomplete = self.report.incomplete_bytes();
        if incomplete > 0 {
            write!(
                f,
                "\n{} {incomplete} byte(s) without a closing delimiter",
                self.painter.warning("Incomplete:")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::cli::decode::{decode_capture, parse_hex};
    use crate::cli::encode::encode;
    use crate::cli::{EncodeArgs, EventName};
    use crate::wire::FramePipeline;

    #[test]
    fn encode_view_lists_frame_and_chunks() {
        let report =
            encode(&EncodeArgs::event(EventName::PairStart)).expect("a named event should encode");
        let painter = Painter::new(false);

        assert_snapshot!(EncodeView::new(&report, &painter).to_string(), @r"
        Message: 0x13A6 (system_event)
          payload A6 13 03 01 00
          frame   00 01 02 09 05 A6 13 03 01 03 64 0D 00
        Chunks (1):
          [00] 00 01 02 09 05 A6 13 03 01 03 64 0D 00
        ");
    }

    #[test]
    fn decode_view_shows_messages_and_leftovers() {
        let capture = parse_hex("00 01 02 09 05 A6 13 03 01 03 64 0D 00 00 01 02")
            .expect("capture should parse");
        let report = decode_capture(&capture, &FramePipeline::default());
        let painter = Painter::new(false);

        assert_snapshot!(DecodeView::new(&report, &painter).to_string(), @r#"
        Frames (1):
        [0000] 0x13A6 system_event {"kind":"system_event","body":{"kind":"pair_start","extra":"00"}}
               raw=00 01 02 09 05 A6 13 03 01 03 64 0D 00
        Incomplete: 2 byte(s) without a closing delimiter
        "#);
    }
}
