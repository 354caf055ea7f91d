//! Live device link: transport seam, session tasks and an in-process device.

mod fake_device;
mod session;
mod transport;

pub use self::fake_device::{FakeDevice, FakeDeviceConfig, simulated_device_identity};
pub use self::session::{LinkSession, LinkState, PendingReply};
pub use self::transport::{ChunkStream, Transport};
