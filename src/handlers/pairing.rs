use tracing::{info, instrument, warn};

use super::system_events::SystemEventHandler;
use super::upload::{FileUpload, UploadError, UploadHandler, UploadReceipt};
use crate::link::LinkSession;
use crate::messages::SystemEventKind;

/// File subtype of the device settings file sent while pairing.
pub const SETTINGS_FILE_SUBTYPE: u8 = 0x09;

/// Settings file the vendor app sends to a freshly paired vivofit 3.
pub const DEFAULT_SETTINGS_FILE: &[u8] = include_bytes!("default_settings.fit");

/// Drives the pairing sequence: pair start, settings upload, pair complete.
pub struct PairingHandler;

impl PairingHandler {
    /// Pairs using [`DEFAULT_SETTINGS_FILE`].
    ///
    /// # Errors
    ///
    /// See [`PairingHandler::pair_with_settings`].
    pub async fn pair(link: &LinkSession) -> Result<UploadReceipt, UploadError> {
        Self::pair_with_settings(link, DEFAULT_SETTINGS_FILE.to_vec()).await
    }

    /// Pairs, uploading `settings` as the device settings file.
    ///
    /// When the upload fails the device is told pairing failed and the
    /// upload error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] when an event cannot be sent or the settings
    /// upload fails.
    #[instrument(skip_all, level = "debug", fields(settings_len = settings.len()))]
    pub async fn pair_with_settings(
        link: &LinkSession,
        settings: Vec<u8>,
    ) -> Result<UploadReceipt, UploadError> {
        SystemEventHandler::notify(link, SystemEventKind::PairStart).await?;

        let upload = FileUpload::builder()
            .data(settings)
            .subtype(SETTINGS_FILE_SUBTYPE)
            .build();
        match UploadHandler::upload(link, &upload).await {
            Ok(receipt) => {
                SystemEventHandler::notify(link, SystemEventKind::PairComplete).await?;
                info!(file_index = receipt.file_index(), "pairing complete");
                Ok(receipt)
            }
            Err(error) => {
                if let Err(notify_error) =
                    SystemEventHandler::notify(link, SystemEventKind::PairFail).await
                {
                    warn!(%notify_error, "could not report pairing failure to device");
                }
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_settings_file_is_a_complete_fit_file() {
        let header_len = usize::from(DEFAULT_SETTINGS_FILE[0]);
        let data_len = u32::from_le_bytes([
            DEFAULT_SETTINGS_FILE[4],
            DEFAULT_SETTINGS_FILE[5],
            DEFAULT_SETTINGS_FILE[6],
            DEFAULT_SETTINGS_FILE[7],
        ]) as usize;

        assert_eq!(b".FIT", &DEFAULT_SETTINGS_FILE[8..12]);
        assert_eq!(header_len + data_len + 2, DEFAULT_SETTINGS_FILE.len());
    }
}
