//! Defines [`SliceReader`], a cursor over a received message, and the [`ByteRead`] trait for the
//! fixed-width fields found in the request header.
//!
//! Unlike a stream, a header always arrives whole inside a single message, so reading never waits
//! and running past the end of the buffer is a protocol error ([`HeaderError::InvalidData`])
//! rather than a reason to read more. The reader remembers how far it got, which is what tells the
//! caller where the tunneled payload starts.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::HeaderError;

/// Reads values off the front of a byte slice, keeping track of how many bytes were consumed.
#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    buf: &'a [u8],
    position: usize,
}

impl<'a> SliceReader<'a> {
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, position: 0 }
    }

    /// The index of the next unread byte in the underlying buffer.
    pub const fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.position
    }

    /// Consumes the next `len` bytes, failing if the buffer doesn't hold that many.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], HeaderError> {
        let end = match self.position.checked_add(len) {
            Some(end) if end <= self.buf.len() => end,
            _ => return Err(HeaderError::InvalidData),
        };

        let bytes = &self.buf[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    pub fn read<T: ByteRead>(&mut self) -> Result<T, HeaderError> {
        T::read(self)
    }

    /// Reads a single byte and maps it onto a [`U8ReprEnum`]. The inner `Err` holds the byte when
    /// it doesn't name any variant, so the caller can report it.
    pub fn read_repr<T: U8ReprEnum>(&mut self) -> Result<Result<T, u8>, HeaderError> {
        let value = self.read::<u8>()?;
        Ok(T::from_u8(value).ok_or(value))
    }
}

/// Implemented by the single-byte tags of the protocol (commands, address types) so they can be
/// parsed from and turned back into their wire value.
pub trait U8ReprEnum: Sized + Copy {
    /// Returns the variant `value` stands for, or `None` if there is no such variant.
    fn from_u8(value: u8) -> Option<Self>;

    fn into_u8(self) -> u8;
}

/// Deserializes a type from the front of a [`SliceReader`].
pub trait ByteRead: Sized {
    fn read(reader: &mut SliceReader<'_>) -> Result<Self, HeaderError>;
}

impl ByteRead for u8 {
    fn read(reader: &mut SliceReader<'_>) -> Result<Self, HeaderError> {
        Ok(reader.take(1)?[0])
    }
}

impl ByteRead for u16 {
    fn read(reader: &mut SliceReader<'_>) -> Result<Self, HeaderError> {
        Ok(u16::from_be_bytes(<[u8; 2]>::read(reader)?))
    }
}

impl<const N: usize> ByteRead for [u8; N] {
    fn read(reader: &mut SliceReader<'_>) -> Result<Self, HeaderError> {
        let mut array = [0u8; N];
        array.copy_from_slice(reader.take(N)?);
        Ok(array)
    }
}

impl ByteRead for Ipv4Addr {
    fn read(reader: &mut SliceReader<'_>) -> Result<Self, HeaderError> {
        Ok(<[u8; 4]>::read(reader)?.into())
    }
}

impl ByteRead for Ipv6Addr {
    fn read(reader: &mut SliceReader<'_>) -> Result<Self, HeaderError> {
        Ok(<[u8; 16]>::read(reader)?.into())
    }
}
