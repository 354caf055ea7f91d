use std::fmt::{self, Display, Formatter};

use crate::cli::simulate::SimulationReport;

use super::painter::Painter;

/// Renders the outcome of a simulated exchange.
pub(crate) struct SimulationView<'a> {
    report: &'a SimulationReport,
    painter: &'a Painter,
}

impl<'a> SimulationView<'a> {
    pub(crate) fn new(report: &'a SimulationReport, painter: &'a Painter) -> Self {
        Self { report, painter }
    }

    fn row(&self, f: &mut Formatter<'_>, field: &str, value: &str) -> fmt::Result {
        write!(f, "\n  {} {value}", self.painter.muted(format!("{field:<15}")))
    }
}

impl Display for SimulationView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let report = self.report;
        write!(
            f,
            "{} {}",
            self.painter.heading("Simulation:"),
            self.painter.value(report.scenario())
        )?;

        self.row(f, "link state", &self.painter.link_state(report.state()))?;
        let messages = report
            .host_messages()
            .iter()
            .map(|message_type| self.painter.message_type(*message_type))
            .collect::<Vec<_>>()
            .join(", ");
        self.row(f, "host messages", &messages)?;
        self.row(f, "chunks written", &report.chunks_written().to_string())?;

        let Some(receipt) = report.upload() else {
            return Ok(());
        };
        write!(f, "\n{}", self.painter.heading("Upload:"))?;
        self.row(f, "file index", &receipt.file_index().to_string())?;
        self.row(f, "start offset", &receipt.start_offset().to_string())?;
        let offsets = receipt
            .offsets()
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        self.row(
            f,
            "transfers",
            &format!("{} ({offsets})", receipt.transfer_count()),
        )?;
        self.row(f, "final offset", &receipt.final_offset().to_string())?;
        self.row(f, "device bytes", &report.uploaded_bytes().to_string())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::cli::simulate::simulate;
    use crate::cli::{Scenario, SimulateArgs, UploadArgs};

    #[tokio::test]
    async fn upload_simulation_lists_transfer_offsets() {
        let report = simulate(&SimulateArgs::new(Scenario::Upload(UploadArgs::generated(300))))
            .await
            .expect("upload simulation should succeed");
        let painter = Painter::new(false);

        let rendered = SimulationView::new(&report, &painter).to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!("Simulation: upload", lines[0]);
        assert_eq!("  link state      closed", lines[1]);
        assert!(rendered.contains("\n  transfers       2 (0, 256)\n"));
        assert!(rendered.ends_with("  device bytes    300"));
    }
}
