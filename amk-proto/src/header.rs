use uuid::Uuid;

use crate::{
    address::{AddressType, DestinationAddress},
    error::HeaderError,
    response::ResponsePrefix,
    serialize::{SliceReader, U8ReprEnum},
    user_id::is_valid_user_id,
};

/// Buffers shorter than this are rejected before looking at any field.
pub const MIN_HEADER_LEN: usize = 24;

/// The only destination port UDP requests may target.
pub const DNS_PORT: u16 = 53;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Tcp = 1,
    Udp = 2,
    Mux = 3,
}

impl U8ReprEnum for Command {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Tcp),
            2 => Some(Self::Udp),
            3 => Some(Self::Mux),
            _ => None,
        }
    }

    fn into_u8(self) -> u8 {
        self as u8
    }
}

/// A fully validated request header. A header either parses completely or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub version: u8,
    pub user_id: Uuid,

    /// The options block, carried along but never interpreted.
    pub options: Vec<u8>,
    pub command: Command,
    pub port: u16,
    pub address: DestinationAddress,

    /// Index in the parsed buffer right after the address field. Everything from here to the end
    /// of the buffer is tunneled payload.
    pub payload_offset: usize,
}

impl RequestHeader {
    /// Creates the prefix to place before the first response payload of this session.
    pub const fn response_prefix(&self) -> ResponsePrefix {
        ResponsePrefix::new(self.version)
    }
}

/// Parses and validates the request header at the start of `buf`, the first message of a session.
///
/// `expected_user_id` must be in canonical lowercase hyphenated form. The user id in the buffer
/// has to both look like a version-5 UUID and match it, otherwise [`HeaderError::InvalidUser`] is
/// returned no matter what the rest of the buffer holds. UDP towards any port but 53 and MUX are
/// refused here too, so a successfully parsed header can always be routed.
pub fn parse_header(buf: &[u8], expected_user_id: &str) -> Result<RequestHeader, HeaderError> {
    if buf.len() < MIN_HEADER_LEN {
        return Err(HeaderError::InvalidData);
    }

    let mut reader = SliceReader::new(buf);
    let version = reader.read::<u8>()?;

    let user_id = Uuid::from_bytes(reader.read()?);
    let mut encode_buf = Uuid::encode_buffer();
    let rendered = user_id.hyphenated().encode_lower(&mut encode_buf);
    if !is_valid_user_id(&user_id) || &*rendered != expected_user_id {
        return Err(HeaderError::InvalidUser);
    }

    let options_len = reader.read::<u8>()? as usize;
    let options = reader.take(options_len)?.to_vec();

    let command = reader.read_repr::<Command>()?.map_err(HeaderError::UnsupportedCommand)?;
    let port = reader.read::<u16>()?;

    let address = match reader.read_repr::<AddressType>()? {
        Ok(AddressType::Ipv4) => DestinationAddress::Ipv4(reader.read()?),
        Ok(AddressType::Ipv6) => DestinationAddress::Ipv6(reader.read()?),
        Ok(AddressType::Domainname) => {
            let len = reader.read::<u8>()? as usize;
            let domainname = std::str::from_utf8(reader.take(len)?)
                .map_err(|_| HeaderError::InvalidAddress("domain name is not valid UTF-8".into()))?;

            if domainname.is_empty() {
                return Err(HeaderError::InvalidAddress("address is empty, address type is 2".into()));
            }

            DestinationAddress::Domainname(domainname.to_owned())
        }
        Err(atyp) => return Err(HeaderError::InvalidAddress(format!("invalid address type {atyp}"))),
    };

    match command {
        Command::Udp if port != DNS_PORT => return Err(HeaderError::PolicyViolation { port }),
        Command::Mux => return Err(HeaderError::NotSupported),
        Command::Tcp | Command::Udp => {}
    }

    Ok(RequestHeader {
        version,
        user_id,
        options,
        command,
        port,
        address,
        payload_offset: reader.position(),
    })
}
