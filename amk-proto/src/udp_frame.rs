//! UDP datagrams cross the tunnel as `[u16 big-endian length][payload]` frames. The client is free
//! to pack several frames in one message or to split one over several, so [`UdpFrameDecoder`]
//! keeps whatever is left over until the rest arrives.

use bytes::{Buf, Bytes, BytesMut};

/// The size of the length field in front of every frame.
pub const FRAME_LEN_SIZE: usize = 2;

#[derive(Debug, Default)]
pub struct UdpFrameDecoder {
    buf: BytesMut,
}

impl UdpFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of client data in and returns every payload it completes, in order.
    /// Zero-length frames are consumed but not returned.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while self.buf.len() >= FRAME_LEN_SIZE {
            let len = u16::from_be_bytes([self.buf[0], self.buf[1]]) as usize;
            if self.buf.len() < FRAME_LEN_SIZE + len {
                break;
            }

            self.buf.advance(FRAME_LEN_SIZE);
            let frame = self.buf.split_to(len).freeze();
            if !frame.is_empty() {
                frames.push(frame);
            }
        }

        frames
    }

    /// How many bytes of an incomplete frame are being held back.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Frames a payload to be sent to the client. Returns `None` if it is too long for the length
/// field.
pub fn encode_frame(payload: &[u8]) -> Option<Vec<u8>> {
    let len = u16::try_from(payload.len()).ok()?;

    let mut frame = Vec::with_capacity(FRAME_LEN_SIZE + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenated_frames_come_out_in_order() {
        let mut decoder = UdpFrameDecoder::new();
        let frames = decoder.decode(b"\x00\x03abc\x00\x02de");

        assert_eq!(frames, vec![Bytes::from_static(b"abc"), Bytes::from_static(b"de")]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn split_frames_are_reassembled() {
        let mut decoder = UdpFrameDecoder::new();

        assert!(decoder.decode(b"\x00").is_empty());
        assert_eq!(decoder.pending(), 1);
        assert!(decoder.decode(b"\x05he").is_empty());
        assert_eq!(decoder.decode(b"llo\x00\x01"), vec![Bytes::from_static(b"hello")]);
        assert_eq!(decoder.pending(), 2);
        assert_eq!(decoder.decode(b"!"), vec![Bytes::from_static(b"!")]);
    }

    #[test]
    fn empty_frames_are_dropped() {
        let mut decoder = UdpFrameDecoder::new();
        assert_eq!(decoder.decode(b"\x00\x00\x00\x01x\x00\x00"), vec![Bytes::from_static(b"x")]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn encoding_checks_the_length() {
        assert_eq!(encode_frame(b"ab"), Some(vec![0, 2, b'a', b'b']));
        assert_eq!(encode_frame(&[]), Some(vec![0, 0]));
        assert!(encode_frame(&vec![0u8; u16::MAX as usize]).is_some());
        assert_eq!(encode_frame(&vec![0u8; u16::MAX as usize + 1]), None);
    }
}
