use std::cell::Cell;

/// The two byte marker a relay places before the first payload it sends back to the client: the
/// request's version byte followed by a zero.
///
/// A session shares one prefix between everything that may produce the first response (each TCP
/// attempt, or every DNS exchange), and whichever gets there first consumes it.
#[derive(Debug)]
pub struct ResponsePrefix {
    bytes: [u8; 2],
    sent: Cell<bool>,
}

impl ResponsePrefix {
    pub const fn new(version: u8) -> Self {
        Self {
            bytes: [version, 0],
            sent: Cell::new(false),
        }
    }

    pub const fn bytes(&self) -> [u8; 2] {
        self.bytes
    }

    pub fn is_sent(&self) -> bool {
        self.sent.get()
    }

    /// Returns `payload` ready to be sent to the client, with the prefix in front of it unless it
    /// was already sent. The prefix only counts as sent once [`mark_sent`](Self::mark_sent) is
    /// called, so a message that never made it out can be rebuilt with the prefix again.
    pub fn frame(&self, payload: &[u8]) -> Vec<u8> {
        if self.sent.get() {
            return payload.to_vec();
        }

        let mut message = Vec::with_capacity(self.bytes.len() + payload.len());
        message.extend_from_slice(&self.bytes);
        message.extend_from_slice(payload);
        message
    }

    pub fn mark_sent(&self) {
        self.sent.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_framed_until_marked_sent() {
        let prefix = ResponsePrefix::new(7);
        assert!(!prefix.is_sent());

        assert_eq!(prefix.frame(b"first"), b"\x07\x00first");
        assert_eq!(prefix.frame(b"retry"), b"\x07\x00retry");

        prefix.mark_sent();
        assert!(prefix.is_sent());
        assert_eq!(prefix.frame(b"second"), b"second");
        assert_eq!(prefix.frame(b""), b"");
    }

    #[test]
    fn empty_first_payload_still_carries_the_prefix() {
        let prefix = ResponsePrefix::new(0);
        assert_eq!(prefix.frame(&[]), vec![0, 0]);
    }
}
