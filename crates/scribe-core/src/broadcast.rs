//! Fan-out of encoded messages to room members.
//!
//! A message is encoded once and the resulting payload is shared by every
//! recipient. Delivery only pushes onto each connection's outbound queue, so
//! it never suspends. A recipient whose queue is gone or full is logged,
//! counted in [`DROPPED_SENDS_TOTAL`] and skipped.

use crate::connection::{ConnectionHandle, Payload};
use metrics::counter;
use scribe_protocol::{codec, ServerMessage};
use std::sync::Arc;
use tracing::{error, trace, warn};

/// Counter of payloads dropped for a single recipient, labelled by `reason`.
pub const DROPPED_SENDS_TOTAL: &str = "scribe_dropped_sends_total";

/// Encode a message into a shareable payload.
///
/// Returns `None` (and logs) if the message cannot be encoded.
#[must_use]
pub fn encode(message: &ServerMessage) -> Option<Payload> {
    match codec::encode(message) {
        Ok(text) => Some(Arc::from(text)),
        Err(e) => {
            error!(kind = message.kind(), error = %e, "Failed to encode message");
            None
        }
    }
}

/// Deliver a payload to every recipient.
///
/// Returns the number of recipients the payload was queued for.
pub fn deliver<'a>(
    recipients: impl IntoIterator<Item = &'a ConnectionHandle>,
    payload: &Payload,
) -> usize {
    let mut delivered = 0;
    for handle in recipients {
        match handle.send(Arc::clone(payload)) {
            Ok(()) => delivered += 1,
            Err(e) => {
                warn!(connection = %handle.id(), error = %e, "Dropping message for unreachable connection");
                counter!(DROPPED_SENDS_TOTAL, "reason" => e.reason()).increment(1);
            }
        }
    }
    trace!(recipients = delivered, "Delivered payload");
    delivered
}

/// Encode and deliver a message to a single connection.
///
/// Returns `true` if the message was queued.
pub fn send_to(handle: &ConnectionHandle, message: &ServerMessage) -> bool {
    encode(message).is_some_and(|payload| deliver([handle], &payload) == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deliver_skips_closed_connections() {
        let (a, mut rx_a) = ConnectionHandle::channel();
        let (b, rx_b) = ConnectionHandle::channel();
        let (c, mut rx_c) = ConnectionHandle::channel();
        drop(rx_b);

        let payload = encode(&ServerMessage::typing("Red Panda")).unwrap();
        let delivered = deliver([&a, &b, &c], &payload);

        assert_eq!(delivered, 2);
        assert_eq!(&*rx_a.try_recv().unwrap(), r#"{"type":"typing","from":"Red Panda"}"#);
        assert!(rx_c.try_recv().is_ok());
    }

    #[test]
    fn test_deliver_skips_full_queue() {
        let (a, mut rx_a) = ConnectionHandle::with_capacity(1);
        let (b, mut rx_b) = ConnectionHandle::channel();

        let first = encode(&ServerMessage::edit("v1", "Red Panda")).unwrap();
        let second = encode(&ServerMessage::edit("v2", "Red Panda")).unwrap();
        assert_eq!(deliver([&a, &b], &first), 2);
        assert_eq!(deliver([&a, &b], &second), 1);

        assert_eq!(rx_a.try_recv().unwrap(), first);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), first);
        assert_eq!(rx_b.try_recv().unwrap(), second);
    }

    #[test]
    fn test_send_to() {
        let (a, mut rx_a) = ConnectionHandle::channel();
        assert!(send_to(&a, &ServerMessage::users(vec!["Red Panda".into()])));
        assert!(rx_a.try_recv().is_ok());

        drop(rx_a);
        assert!(!send_to(&a, &ServerMessage::users(vec![])));
    }
}
