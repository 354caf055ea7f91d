mod app;
mod cli;
pub mod clock;
mod config;
pub mod dispatch;
mod error;
pub mod handlers;
pub mod link;
pub mod messages;
pub mod protocol;
pub mod store;
mod telemetry;
mod terminal;
mod utils;
pub mod wire;

pub use app::{run, run_with_clients, run_with_clients_and_log_level, run_with_log_level};
pub use cli::{
    Args, Command, DecodeArgs, EncodeArgs, EventName, LinkArgs, LogLevel, OutputFormat, Scenario,
    SimulateArgs, UploadArgs,
};
pub use config::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_REPLY_TIMEOUT, DEFAULT_TRANSFER_LIMIT, LinkConfig,
};
pub use dispatch::LinkEvent;
pub use error::{LinkError, ProtocolError, TransportError, VivolinkError};
pub use link::{FakeDevice, FakeDeviceConfig, LinkSession, LinkState, PendingReply, Transport};
pub use messages::{Acknowledgement, Message, MessageBody};
pub use protocol::MessageType;
pub use terminal::{SystemTerminalClient, TerminalClient};
pub use wire::{
    ChecksumAlgorithm, ChecksumPolicy, FrameDecodeError, FrameError, FramePipeline,
    IntegrityError,
};
