use tracing::instrument;

use crate::clock::Clock;
use crate::error::LinkError;
use crate::link::LinkSession;
use crate::messages::{Message, SetSettings};

/// Handler for device time synchronisation.
pub struct TimeSyncHandler;

impl TimeSyncHandler {
    fn message_for(clock: &dyn Clock) -> SetSettings {
        SetSettings::time_from_clock(clock)
    }

    /// Sends the clock's current time, zone offset and DST state.
    ///
    /// ```no_run
    /// # async fn demo(link: vivolink::LinkSession) -> Result<(), vivolink::LinkError> {
    /// use vivolink::clock::SystemClock;
    /// use vivolink::handlers::TimeSyncHandler;
    ///
    /// TimeSyncHandler::sync_time(&link, &SystemClock::utc()).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the settings do not encode or the write fails.
    #[instrument(
        skip(link, clock),
        level = "debug",
        fields(unix_timestamp = clock.now().unix_timestamp())
    )]
    pub async fn sync_time(link: &LinkSession, clock: &dyn Clock) -> Result<SetSettings, LinkError> {
        let settings = Self::message_for(clock);
        link.send(&Message::from(settings.clone())).await?;
        Ok(settings)
    }
}
