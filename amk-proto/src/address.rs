use std::{
    fmt,
    net::{Ipv4Addr, Ipv6Addr},
};

use crate::serialize::U8ReprEnum;

/// The address type tag that precedes the destination address in a request header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Ipv4 = 1,
    Domainname = 2,
    Ipv6 = 3,
}

impl U8ReprEnum for AddressType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Ipv4),
            2 => Some(Self::Domainname),
            3 => Some(Self::Ipv6),
            _ => None,
        }
    }

    fn into_u8(self) -> u8 {
        self as u8
    }
}

/// Where the client wants its traffic to go.
///
/// The [`Display`](fmt::Display) impl produces the host string used to connect. IPv6 addresses
/// are rendered as all eight groups in lowercase hex without zero padding and without `::`
/// compression (`2001:db8:0:0:0:0:0:1`), which is what clients of this protocol have always
/// received and which [`std::net`] still parses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationAddress {
    Ipv4(Ipv4Addr),
    Domainname(String),
    Ipv6(Ipv6Addr),
}

impl DestinationAddress {
    pub fn address_type(&self) -> AddressType {
        match self {
            Self::Ipv4(_) => AddressType::Ipv4,
            Self::Domainname(_) => AddressType::Domainname,
            Self::Ipv6(_) => AddressType::Ipv6,
        }
    }
}

impl fmt::Display for DestinationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4(ip) => ip.fmt(f),
            Self::Domainname(domainname) => f.write_str(domainname),
            Self::Ipv6(ip) => {
                for (i, segment) in ip.segments().iter().enumerate() {
                    if i != 0 {
                        f.write_str(":")?;
                    }
                    write!(f, "{segment:x}")?;
                }

                Ok(())
            }
        }
    }
}
