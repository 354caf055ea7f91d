//! Host-driven flows built on a [`LinkSession`](crate::LinkSession).

mod pairing;
mod system_events;
mod time_sync;
mod upload;

pub use self::pairing::{DEFAULT_SETTINGS_FILE, PairingHandler, SETTINGS_FILE_SUBTYPE};
pub use self::system_events::SystemEventHandler;
pub use self::time_sync::TimeSyncHandler;
pub use self::upload::{FileUpload, UploadError, UploadHandler, UploadReceipt, UploadStep};
