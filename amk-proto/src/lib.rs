//! This crate describes the AMK protocol, a VLESS-style request header sent by a client as the
//! first WebSocket message of a tunnel, followed by raw tunneled bytes in both directions.
//!
//! Nothing in here performs I/O. The relay feeds byte buffers in and gets typed values out.
//!
//! # Request header
//! The first client message starts with the header, laid out as follows:
//!
//! ```text
//! [0]                 version
//! [1..17)             16-byte user id (a version-5 UUID)
//! [17]                options length N
//! [18..18+N)          options, skipped without interpretation
//! [18+N]              command: 1 = TCP, 2 = UDP, 3 = MUX
//! [18+N+1..18+N+3)    destination port, big-endian
//! [18+N+3]            address type: 1 = IPv4, 2 = domain name, 3 = IPv6
//! ...                 address: 4 bytes / 1 length byte + that many bytes / 16 bytes
//! ...                 payload up to the end of the message
//! ```
//!
//! The payload after the header is the first chunk of tunneled data and must be forwarded, see
//! [`RequestHeader::payload_offset`](header::RequestHeader::payload_offset).
//!
//! # Response prefix
//! The relay answers with a two byte marker, the echoed version followed by a zero, placed right
//! before the first response payload of the session and never again. See [`ResponsePrefix`].
//!
//! # UDP
//! Only DNS is allowed over UDP. Each datagram travels as a `[u16 length][payload]` frame in both
//! directions, and frames may be concatenated or split arbitrarily across WebSocket messages. See
//! [`udp_frame`].
//!
//! # Early data
//! Clients may piggyback the start of the stream on the WebSocket handshake, base64 encoded in the
//! `Sec-WebSocket-Protocol` header. See [`early_data`].

pub mod address;
pub mod early_data;
pub mod error;
pub mod header;
pub mod response;
pub mod serialize;
pub mod udp_frame;
pub mod user_id;

pub use address::DestinationAddress;
pub use error::{EarlyDataError, HeaderError};
pub use header::{parse_header, Command, RequestHeader};
pub use response::ResponsePrefix;
