use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;

use crate::messages::Acknowledgement;
use crate::protocol::MessageType;

/// Handle to one registered waiter, used to withdraw it after a timeout.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ReplyTicket {
    message_type: MessageType,
    id: u64,
}

impl ReplyTicket {
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }
}

/// What happens when an acknowledgement reaches a waiter.
#[derive(Debug)]
pub enum Continuation {
    /// Hand the acknowledgement to a caller awaiting it.
    Deliver(oneshot::Sender<Acknowledgement>),
    /// Only record that the device acknowledged a fire-and-forget send.
    Log,
}

/// Result of routing one acknowledgement.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Resolution {
    Resolved,
    Unmatched,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    continuation: Continuation,
}

#[derive(Debug, Default)]
struct Queues {
    next_id: u64,
    by_type: HashMap<MessageType, VecDeque<Waiter>>,
}

/// Waiters for device acknowledgements, in send order per message type.
///
/// Acknowledgements carry no transaction id, so the oldest waiter for the
/// acknowledged type always receives the next acknowledgement of that type.
#[derive(Debug, Default)]
pub struct PendingReplies {
    queues: Mutex<Queues>,
}

impl PendingReplies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a waiter and runs `enqueue` while still holding the lock,
    /// so waiters and writes stay in the same order under concurrent
    /// callers. The waiter is dropped again if `enqueue` fails.
    ///
    /// # Errors
    ///
    /// Returns whatever `enqueue` returns.
    pub fn register_then<E>(
        &self,
        message_type: MessageType,
        continuation: Continuation,
        enqueue: impl FnOnce() -> Result<(), E>,
    ) -> Result<ReplyTicket, E> {
        let mut queues = self.lock();
        let id = queues.next_id;
        queues.next_id = queues.next_id.wrapping_add(1);
        queues
            .by_type
            .entry(message_type)
            .or_default()
            .push_back(Waiter { id, continuation });

        if let Err(error) = enqueue() {
            remove(&mut queues, message_type, id);
            return Err(error);
        }
        Ok(ReplyTicket { message_type, id })
    }

    /// Registers a waiter with nothing else to order against.
    pub fn register(&self, message_type: MessageType, continuation: Continuation) -> ReplyTicket {
        match self.register_then::<std::convert::Infallible>(message_type, continuation, || Ok(()))
        {
            Ok(ticket) => ticket,
            Err(never) => match never {},
        }
    }

    /// Hands `ack` to the oldest waiter for its original type.
    pub fn resolve(&self, ack: Acknowledgement) -> Resolution {
        let message_type = ack.original_type();
        let waiter = {
            let mut queues = self.lock();
            let Some(queue) = queues.by_type.get_mut(&message_type) else {
                return Resolution::Unmatched;
            };
            let waiter = queue.pop_front();
            if queue.is_empty() {
                queues.by_type.remove(&message_type);
            }
            waiter
        };

        let Some(waiter) = waiter else {
            return Resolution::Unmatched;
        };
        match waiter.continuation {
            Continuation::Deliver(sender) => {
                if sender.send(ack).is_err() {
                    debug!(%message_type, "reply waiter went away before delivery");
                }
            }
            Continuation::Log => {
                debug!(%message_type, status = ack.status(), "device acknowledged message");
            }
        }
        Resolution::Resolved
    }

    /// Removes a waiter that gave up, returning whether it was still queued.
    pub fn withdraw(&self, ticket: ReplyTicket) -> bool {
        remove(&mut self.lock(), ticket.message_type, ticket.id)
    }

    /// Drops every waiter; callers awaiting a reply observe a closed channel.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Waiter> = self
            .lock()
            .by_type
            .drain()
            .flat_map(|(_, queue)| queue)
            .collect();
        drained.len()
    }

    /// Number of outstanding waiters for `message_type`.
    #[must_use]
    pub fn outstanding(&self, message_type: MessageType) -> usize {
        self.lock()
            .by_type
            .get(&message_type)
            .map_or(0, VecDeque::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().by_type.is_empty()
    }
}

fn remove(queues: &mut Queues, message_type: MessageType, id: u64) -> bool {
    let Some(queue) = queues.by_type.get_mut(&message_type) else {
        return false;
    };
    let Some(position) = queue.iter().position(|waiter| waiter.id == id) else {
        return false;
    };
    queue.remove(position);
    if queue.is_empty() {
        queues.by_type.remove(&message_type);
    }
    true
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    fn ack(message_type: MessageType, status: u8) -> Acknowledgement {
        Acknowledgement::new(message_type, status, Vec::new())
    }

    #[test]
    fn replies_of_one_type_resolve_in_registration_order() {
        let pending = PendingReplies::new();
        let (first_tx, mut first_rx) = oneshot::channel();
        let (second_tx, mut second_rx) = oneshot::channel();
        pending.register(MessageType::CREATE_FILE, Continuation::Deliver(first_tx));
        pending.register(MessageType::CREATE_FILE, Continuation::Deliver(second_tx));

        assert_eq!(Resolution::Resolved, pending.resolve(ack(MessageType::CREATE_FILE, 1)));
        assert_eq!(Resolution::Resolved, pending.resolve(ack(MessageType::CREATE_FILE, 2)));

        assert_eq!(1, first_rx.try_recv().expect("first reply should arrive").status());
        assert_eq!(2, second_rx.try_recv().expect("second reply should arrive").status());
    }

    #[test]
    fn types_are_correlated_independently() {
        let pending = PendingReplies::new();
        let (create_tx, mut create_rx) = oneshot::channel();
        let (upload_tx, mut upload_rx) = oneshot::channel();
        pending.register(MessageType::CREATE_FILE, Continuation::Deliver(create_tx));
        pending.register(MessageType::UPLOAD_REQUEST, Continuation::Deliver(upload_tx));

        pending.resolve(ack(MessageType::UPLOAD_REQUEST, 0));

        assert_matches!(create_rx.try_recv(), Err(oneshot::error::TryRecvError::Empty));
        assert!(upload_rx.try_recv().is_ok());
        assert_eq!(1, pending.outstanding(MessageType::CREATE_FILE));
    }

    #[test]
    fn unmatched_ack_is_reported() {
        let pending = PendingReplies::new();
        assert_eq!(
            Resolution::Unmatched,
            pending.resolve(ack(MessageType::SYSTEM_EVENT, 0))
        );
    }

    #[test]
    fn withdrawn_waiter_does_not_consume_later_ack() {
        let pending = PendingReplies::new();
        let (stale_tx, _stale_rx) = oneshot::channel();
        let (fresh_tx, mut fresh_rx) = oneshot::channel();
        let stale = pending.register(MessageType::UPLOAD_REQUEST, Continuation::Deliver(stale_tx));
        pending.register(MessageType::UPLOAD_REQUEST, Continuation::Deliver(fresh_tx));

        assert!(pending.withdraw(stale));
        assert!(!pending.withdraw(stale));
        pending.resolve(ack(MessageType::UPLOAD_REQUEST, 0));

        assert!(fresh_rx.try_recv().is_ok());
        assert!(pending.is_empty());
    }

    #[test]
    fn failed_enqueue_unregisters() {
        let pending = PendingReplies::new();
        let result = pending.register_then(MessageType::CREATE_FILE, Continuation::Log, || {
            Err("writer gone")
        });
        assert_eq!(Err("writer gone"), result);
        assert!(pending.is_empty());
    }

    #[test]
    fn cancel_all_closes_waiters() {
        let pending = PendingReplies::new();
        let (tx, mut rx) = oneshot::channel();
        pending.register(MessageType::FILE_TRANSFER_DATA, Continuation::Deliver(tx));
        pending.register(MessageType::SET_SETTINGS, Continuation::Log);

        assert_eq!(2, pending.cancel_all());
        assert_matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Closed));
    }
}
