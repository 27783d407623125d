//! The message record relayed between federate endpoints.

use crate::time::SimTime;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A message in flight between two endpoints.
///
/// `source`/`dest` are the current addressing of the message and may be
/// rewritten by filters; `original_source`/`original_dest` record the
/// addressing at send time and are preserved across reroutes and clones so
/// the receiver can always see where a message really came from.
///
/// The payload is a refcounted byte buffer: cloning a message for fan-out
/// shares the bytes rather than copying them.
///
/// # Examples
///
/// ```
/// use simbus_core::message::Message;
/// use simbus_core::time::SimTime;
///
/// let msg = Message::new("ept_a", "ept_b", "hello", SimTime::from_secs_f64(1.0));
/// assert_eq!(msg.original_dest, "ept_b");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Logical delivery timestamp.
    pub time: SimTime,
    /// Name of the endpoint the message currently claims as its origin.
    pub source: String,
    /// Name of the endpoint the message is currently addressed to.
    pub dest: String,
    /// Origin endpoint as recorded at send time.
    pub original_source: String,
    /// Destination endpoint as recorded at send time.
    pub original_dest: String,
    /// Opaque payload bytes.
    pub payload: Bytes,
}

impl Message {
    /// Creates a message, recording the supplied addressing as the original
    /// source and destination.
    pub fn new(
        source: impl Into<String>,
        dest: impl Into<String>,
        payload: impl Into<Bytes>,
        time: SimTime,
    ) -> Self {
        let source = source.into();
        let dest = dest.into();
        Self {
            time,
            original_source: source.clone(),
            original_dest: dest.clone(),
            source,
            dest,
            payload: payload.into(),
        }
    }

    /// Returns a copy of this message addressed to `dest`, leaving the
    /// original addressing fields untouched.
    pub fn redirected(&self, dest: impl Into<String>) -> Self {
        let mut clone = self.clone();
        clone.dest = dest.into();
        clone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_records_original_addressing() {
        let msg = Message::new("a", "b", "payload", SimTime::ZERO);
        assert_eq!(msg.source, "a");
        assert_eq!(msg.dest, "b");
        assert_eq!(msg.original_source, "a");
        assert_eq!(msg.original_dest, "b");
    }

    #[test]
    fn test_redirected_preserves_everything_else() {
        let msg = Message::new("a", "b", "payload", SimTime::from_secs_f64(2.0));
        let copy = msg.redirected("c");
        assert_eq!(copy.dest, "c");
        assert_eq!(copy.original_dest, "b");
        assert_eq!(copy.payload, msg.payload);
        assert_eq!(copy.time, msg.time);
    }

    #[test]
    fn test_payload_shares_storage() {
        let msg = Message::new("a", "b", vec![0u8; 1024], SimTime::ZERO);
        let copy = msg.clone();
        assert_eq!(msg.payload.as_ptr(), copy.payload.as_ptr());
    }
}
