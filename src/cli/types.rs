use std::io;

use anyhow::Result;
use serde::Serialize;
use tracing::instrument;

use crate::cli::{OutputFormat, write_json_line};
use crate::protocol::{self, Direction, MessageType};
use crate::terminal::TerminalClient;

use super::ui::{CatalogueView, Painter};

/// One row of the message catalogue.
#[derive(Debug, Serialize)]
pub(crate) struct CatalogueEntry {
    message_type: MessageType,
    name: &'static str,
    direction: Direction,
}

impl CatalogueEntry {
    pub(crate) fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn direction(&self) -> Direction {
        self.direction
    }
}

/// Catalogued message kinds ordered by type code.
pub(crate) fn catalogue() -> Vec<CatalogueEntry> {
    let mut entries: Vec<CatalogueEntry> = protocol::known_kinds()
        .map(protocol::message_metadata)
        .map(|metadata| CatalogueEntry {
            message_type: metadata.message_type(),
            name: metadata.name(),
            direction: metadata.direction(),
        })
        .collect();
    entries.sort_by_key(CatalogueEntry::message_type);
    entries
}

/// Executes the `types` command.
#[instrument(skip(out, terminal_client), level = "info", fields(?output_format))]
pub(crate) fn run<W>(
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let entries = catalogue();
    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", CatalogueView::new(&entries, &painter))?;
        }
        OutputFormat::Json => write_json_line(out, &entries)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn catalogue_is_sorted_by_type_code() {
        let codes: Vec<u16> = catalogue()
            .iter()
            .map(|entry| entry.message_type().as_raw())
            .collect();

        assert_eq!(
            vec![
                0x1388, 0x138B, 0x138C, 0x138D, 0x1393, 0x1394, 0x13A0, 0x13A2, 0x13A3, 0x13A6
            ],
            codes
        );
    }
}
