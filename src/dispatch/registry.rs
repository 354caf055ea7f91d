use std::collections::HashMap;
use std::fmt;

use crate::protocol::MessageType;

use super::operation::{
    DeviceInformationOperation, FitRecordOperation, InboundOperation, PassthroughOperation,
    SystemEventOperation,
};

type OperationFactory = Box<dyn Fn() -> Box<dyn InboundOperation> + Send + Sync>;

/// Maps inbound message types to the operation that handles them.
///
/// ```
/// use vivolink::MessageType;
/// use vivolink::dispatch::OperationRegistry;
///
/// let registry = OperationRegistry::standard();
/// assert!(registry.contains(MessageType::DEVICE_INFORMATION));
/// assert!(!registry.contains(MessageType::new(0x9999)));
/// ```
#[derive(Default)]
pub struct OperationRegistry {
    factories: HashMap<MessageType, OperationFactory>,
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.factories.keys().copied().collect();
        types.sort();
        f.debug_struct("OperationRegistry")
            .field("types", &types)
            .finish()
    }
}

impl OperationRegistry {
    /// Empty registry; every inbound message is unknown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the operations a vivofit 3 session needs.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(MessageType::DEVICE_INFORMATION, || {
            Box::new(DeviceInformationOperation::default())
        });
        registry.register(MessageType::SYSTEM_EVENT, || {
            Box::new(SystemEventOperation::default())
        });
        registry.register(MessageType::QUEUED_DOWNLOAD_REQUEST, || {
            Box::new(PassthroughOperation::new(MessageType::QUEUED_DOWNLOAD_REQUEST))
        });
        for fit_type in [MessageType::FIT_DEFINITION, MessageType::FIT_DATA] {
            registry.register(fit_type, move || Box::new(FitRecordOperation::new(fit_type)));
        }
        registry
    }

    /// Registers `factory` for `message_type`, replacing any earlier entry.
    pub fn register<F>(&mut self, message_type: MessageType, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn InboundOperation> + Send + Sync + 'static,
    {
        self.factories.insert(message_type, Box::new(factory));
        self
    }

    #[must_use]
    pub fn contains(&self, message_type: MessageType) -> bool {
        self.factories.contains_key(&message_type)
    }

    /// Builds a fresh operation for `message_type`, if one is registered.
    #[must_use]
    pub fn create(&self, message_type: MessageType) -> Option<Box<dyn InboundOperation>> {
        self.factories.get(&message_type).map(|factory| factory())
    }

    /// Registered types in ascending order.
    #[must_use]
    pub fn message_types(&self) -> Vec<MessageType> {
        let mut types: Vec<_> = self.factories.keys().copied().collect();
        types.sort();
        types
    }
}
