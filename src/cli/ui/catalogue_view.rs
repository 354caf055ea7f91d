use std::fmt::{self, Display, Formatter};

use crate::cli::types::CatalogueEntry;

use super::painter::Painter;

/// Renders the message catalogue, one type per line.
pub(crate) struct CatalogueView<'a> {
    entries: &'a [CatalogueEntry],
    painter: &'a Painter,
}

impl<'a> CatalogueView<'a> {
    pub(crate) fn new(entries: &'a [CatalogueEntry], painter: &'a Painter) -> Self {
        Self { entries, painter }
    }
}

impl Display for CatalogueView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.painter.heading("Message types:"))?;
        for entry in self.entries {
            write!(
                f,
                "\n  {} {:<24} {}",
                self.painter.value(entry.message_type().to_string()),
                entry.name(),
                self.painter.muted(entry.direction().to_string())
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::cli::types::catalogue;

    #[test]
    fn catalogue_lists_every_known_type() {
        let entries = catalogue();
        let painter = Painter::new(false);

        assert_snapshot!(CatalogueView::new(&entries, &painter).to_string(), @r"
        Message types:
          0x1388 acknowledgement          both
          0x138B upload_request           host->device
          0x138C file_transfer_data       host->device
          0x138D create_file              host->device
          0x1393 fit_definition           both
          0x1394 fit_data                 both
          0x13A0 device_information       both
          0x13A2 set_settings             host->device
          0x13A3 queued_download_request  device->host
          0x13A6 system_event             both
        ");
    }
}
