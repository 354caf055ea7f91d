use std::io;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::instrument;

use crate::cli::{OutputFormat, Scenario, SimulateArgs, UploadArgs, write_json_line};
use crate::error::CliConfigError;
use crate::handlers::{
    FileUpload, PairingHandler, SystemEventHandler, UploadHandler, UploadReceipt,
};
use crate::link::{FakeDevice, FakeDeviceConfig, LinkSession, LinkState, Transport};
use crate::protocol::MessageType;
use crate::store::MemoryStore;
use crate::terminal::TerminalClient;

use super::ui::{Painter, SimulationView};

/// Outcome of one simulated exchange.
#[derive(Debug, Serialize)]
pub(crate) struct SimulationReport {
    scenario: &'static str,
    state: LinkState,
    #[serde(skip_serializing_if = "Option::is_none")]
    upload: Option<UploadReceipt>,
    uploaded_bytes: usize,
    /// Types of the messages the device received, in arrival order.
    host_messages: Vec<MessageType>,
    chunks_written: usize,
}

impl SimulationReport {
    pub(crate) fn scenario(&self) -> &'static str {
        self.scenario
    }

    pub(crate) fn state(&self) -> LinkState {
        self.state
    }

    pub(crate) fn upload(&self) -> Option<&UploadReceipt> {
        self.upload.as_ref()
    }

    pub(crate) fn uploaded_bytes(&self) -> usize {
        self.uploaded_bytes
    }

    pub(crate) fn host_messages(&self) -> &[MessageType] {
        &self.host_messages
    }

    pub(crate) fn chunks_written(&self) -> usize {
        self.chunks_written
    }
}

fn file_upload(args: &UploadArgs) -> Result<FileUpload, CliConfigError> {
    let data = match args.file() {
        Some(path) => std::fs::read(path).map_err(|source| CliConfigError::ReadInput {
            path: path.display().to_string(),
            source,
        })?,
        None => (0..=u8::MAX).cycle().take(args.size()).collect(),
    };
    Ok(FileUpload::builder()
        .data(data)
        .subtype(args.subtype())
        .build())
}

pub(crate) async fn simulate(args: &SimulateArgs) -> Result<SimulationReport> {
    let config = args.link().link_config();
    let device = Arc::new(FakeDevice::new(
        FakeDeviceConfig::builder()
            .pipeline(config.pipeline())
            .max_chunk_len(config.max_chunk_len())
            .build(),
    ));
    let transport: Arc<dyn Transport> = Arc::clone(&device) as Arc<dyn Transport>;
    let link = LinkSession::open(transport, config.clone(), Arc::new(MemoryStore::new())).await?;
    link.wait_until_initialized(config.handshake_timeout()).await?;

    let scenario = args.scenario();
    let upload = match scenario {
        Scenario::Handshake => None,
        Scenario::Upload(upload_args) => {
            Some(UploadHandler::upload(&link, &file_upload(upload_args)?).await?)
        }
        Scenario::Pair => Some(PairingHandler::pair(&link).await?),
    };
    SystemEventHandler::finish_sync(&link).await?;

    Ok(SimulationReport {
        scenario: scenario.name(),
        state: link.state(),
        upload,
        uploaded_bytes: device.uploaded().len(),
        host_messages: device.received_types(),
        chunks_written: device.chunks_written(),
    })
}

/// Executes the `simulate` command.
#[instrument(
    skip(args, out, terminal_client),
    level = "info",
    fields(scenario = args.scenario().name(), ?output_format)
)]
pub(crate) async fn run<W>(
    args: &SimulateArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let report = simulate(args).await?;
    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", SimulationView::new(&report, &painter))?;
        }
        OutputFormat::Json => write_json_line(out, &report)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn handshake_acknowledges_announcement_then_finishes_sync() {
        let report = simulate(&SimulateArgs::new(Scenario::Handshake))
            .await
            .expect("handshake simulation should succeed");

        assert_eq!(LinkState::Closed, report.state());
        assert_eq!(
            vec![MessageType::ACKNOWLEDGEMENT, MessageType::SYSTEM_EVENT],
            report.host_messages()
        );
        assert_eq!(None, report.upload());
    }

    #[tokio::test]
    async fn generated_upload_reaches_the_device() {
        let args = SimulateArgs::new(Scenario::Upload(UploadArgs::generated(600)));
        let report = simulate(&args)
            .await
            .expect("upload simulation should succeed");

        let receipt = report.upload().expect("upload should produce a receipt");
        assert_eq!(600, receipt.final_offset());
        assert_eq!(vec![0, 256, 512], receipt.offsets());
        assert_eq!(600, report.uploaded_bytes());
    }

    #[test]
    fn generated_data_cycles_through_every_byte_value() {
        let upload = file_upload(&UploadArgs::generated(258)).expect("generated data needs no IO");

        assert_eq!(258, upload.len());
        assert_eq!(&[0xFF, 0x00, 0x01], &upload.data()[255..]);
    }

    #[test]
    fn missing_upload_file_is_reported() {
        let args = UploadArgs::from_file("/nonexistent/vivolink/settings.fit");

        let error = file_upload(&args).expect_err("a missing file should fail to read");
        assert_matches!(error, CliConfigError::ReadInput { .. });
    }
}
