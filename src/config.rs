use std::time::Duration;

use bon::Builder;

use crate::messages::DeviceInformation;
use crate::wire::{ChecksumAlgorithm, ChecksumPolicy, DEFAULT_MAX_CHUNK_LEN, FramePipeline};

/// Default wait for a correlated reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default wait for the device to announce itself after connecting.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of file bytes carried by one transfer message.
pub const DEFAULT_TRANSFER_LIMIT: usize = 256;

/// Tunables for one link.
///
/// ```
/// use std::time::Duration;
/// use vivolink::{ChecksumPolicy, LinkConfig};
///
/// let config = LinkConfig::builder()
///     .reply_timeout(Duration::from_millis(250))
///     .checksum_policy(ChecksumPolicy::Enforce)
///     .build();
/// assert_eq!(20, config.max_chunk_len());
/// assert_eq!(Duration::from_millis(250), config.reply_timeout());
/// ```
#[derive(Debug, Clone, Builder)]
pub struct LinkConfig {
    #[builder(default = DEFAULT_MAX_CHUNK_LEN)]
    max_chunk_len: usize,
    #[builder(default = DEFAULT_REPLY_TIMEOUT)]
    reply_timeout: Duration,
    #[builder(default = DEFAULT_HANDSHAKE_TIMEOUT)]
    handshake_timeout: Duration,
    #[builder(default)]
    checksum: ChecksumAlgorithm,
    #[builder(default)]
    checksum_policy: ChecksumPolicy,
    /// Identity embedded in the reply to the device's own announcement.
    #[builder(default = DeviceInformation::host_default())]
    host_identity: DeviceInformation,
    /// Whether FIT messages from the device queue the host's canned reply.
    #[builder(default = true)]
    queue_fit_replies: bool,
    #[builder(default = DEFAULT_TRANSFER_LIMIT)]
    transfer_limit: usize,
    #[builder(default = 64)]
    event_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl LinkConfig {
    #[must_use]
    pub fn max_chunk_len(&self) -> usize {
        self.max_chunk_len
    }

    #[must_use]
    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    #[must_use]
    pub fn checksum(&self) -> ChecksumAlgorithm {
        self.checksum
    }

    #[must_use]
    pub fn checksum_policy(&self) -> ChecksumPolicy {
        self.checksum_policy
    }

    #[must_use]
    pub fn host_identity(&self) -> &DeviceInformation {
        &self.host_identity
    }

    #[must_use]
    pub fn queue_fit_replies(&self) -> bool {
        self.queue_fit_replies
    }

    /// Upload slice size used when a request does not set its own.
    #[must_use]
    pub fn transfer_limit(&self) -> usize {
        self.transfer_limit
    }

    #[must_use]
    pub fn event_capacity(&self) -> usize {
        self.event_capacity.max(1)
    }

    /// Frame pipeline matching this configuration.
    #[must_use]
    pub fn pipeline(&self) -> FramePipeline {
        FramePipeline::builder()
            .checksum(self.checksum)
            .checksum_policy(self.checksum_policy)
            .max_chunk_len(self.max_chunk_len)
            .build()
    }
}
