use tracing::{info, instrument};

use crate::error::LinkError;
use crate::link::LinkSession;
use crate::messages::{Message, SystemEvent, SystemEventKind};

/// Sends host lifecycle events to the device.
pub struct SystemEventHandler;

impl SystemEventHandler {
    /// Sends one system event without extra data.
    ///
    /// # Errors
    ///
    /// Returns an error when the link is closed or the write fails.
    #[instrument(skip(link), level = "debug", fields(%kind))]
    pub async fn notify(link: &LinkSession, kind: SystemEventKind) -> Result<(), LinkError> {
        link.send(&Message::from(SystemEvent::from(kind))).await
    }

    /// Tells the device the sync finished, then closes the link.
    ///
    /// # Errors
    ///
    /// Returns an error when the event cannot be sent or the disconnect
    /// fails. The link is closed in either case.
    pub async fn finish_sync(link: &LinkSession) -> Result<(), LinkError> {
        let sent = Self::notify(link, SystemEventKind::SyncComplete).await;
        let closed = link.close().await;
        info!("sync finished");
        sent.and(closed)
    }
}
