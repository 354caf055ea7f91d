use derive_more::From;
use thiserror::Error;

use crate::dispatch::OperationState;
use crate::handlers::UploadError;
use crate::protocol::MessageType;
use crate::wire::{FrameDecodeError, FrameError, IntegrityError};

/// Errors returned while interpreting message payloads.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message of {actual} bytes is too short for its 2-byte type header")]
    MissingHeader { actual: usize },
    #[error("message body truncated at `{field}`: needed {needed} bytes but {remaining} remain")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },
    #[error("expected message type {expected} but received {actual}")]
    UnexpectedType {
        expected: MessageType,
        actual: MessageType,
    },
    #[error("string field `{field}` is not valid UTF-8")]
    InvalidUtf8 {
        field: &'static str,
        source: std::string::FromUtf8Error,
    },
    #[error("string field `{field}` is {len} bytes long; the limit is {max}")]
    StringTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("field `{field}` holds {len} entries; the limit is {max}")]
    TooManyEntries {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("operation for {message_type} cannot move from {from} to {to}")]
    InvalidTransition {
        message_type: MessageType,
        from: OperationState,
        to: OperationState,
    },
}

/// Errors reported by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,
    #[error("notification stream closed")]
    NotificationsClosed,
    #[error("chunk of {len} bytes exceeds the transport limit of {max} bytes")]
    ChunkTooLarge { len: usize, max: usize },
    #[error("transport rejected write: {reason}")]
    WriteRejected { reason: String },
    #[error("transport failure: {reason}")]
    Io { reason: String },
}

/// Errors surfaced to callers of [`LinkSession`](crate::LinkSession).
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("no reply to {message_type} within {timeout:?}")]
    Timeout {
        message_type: MessageType,
        timeout: std::time::Duration,
    },
    #[error("link closed before a reply to {message_type} arrived")]
    Cancelled { message_type: MessageType },
    #[error("link is closed")]
    Closed,
    #[error("device did not announce itself within {timeout:?}")]
    HandshakeTimeout { timeout: std::time::Duration },
}

/// Errors returned when validating command-line options.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("invalid hex payload: {source}")]
    InvalidHex { source: hex::FromHexError },
    #[error("failed to read `{path}`")]
    ReadInput {
        path: String,
        source: std::io::Error,
    },
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Top-level errors wrapping module-specific error types.
#[derive(Debug, Error, From)]
pub enum VivolinkError {
    #[error(transparent)]
    #[from(FrameError, Box<FrameError>)]
    Frame(Box<FrameError>),
    #[error(transparent)]
    #[from(IntegrityError, Box<IntegrityError>)]
    Integrity(Box<IntegrityError>),
    #[error(transparent)]
    #[from(FrameDecodeError, Box<FrameDecodeError>)]
    FrameDecode(Box<FrameDecodeError>),
    #[error(transparent)]
    #[from(ProtocolError, Box<ProtocolError>)]
    Protocol(Box<ProtocolError>),
    #[error(transparent)]
    #[from(LinkError, Box<LinkError>)]
    Link(Box<LinkError>),
    #[error(transparent)]
    #[from(UploadError, Box<UploadError>)]
    Upload(Box<UploadError>),
}
