use std::io::{Error, ErrorKind};

use thiserror::Error;

/// The reasons a request header can be rejected. Every one of these is fatal to the session that
/// sent it; none are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// The buffer is too short to hold a header, or a field runs past its end.
    #[error("Invalid data")]
    InvalidData,

    /// The user id is not a version-5 UUID, or is not the one this relay expects.
    #[error("Invalid user")]
    InvalidUser,

    #[error("Command {0} is not supported, command 01-tcp, 02-udp, 03-mux")]
    UnsupportedCommand(u8),

    /// UDP was requested towards a port other than 53.
    #[error("UDP proxy is only enabled for DNS which is port 53, requested port {port}")]
    PolicyViolation { port: u16 },

    /// The client asked for MUX.
    #[error("MUX is not supported")]
    NotSupported,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl From<HeaderError> for Error {
    fn from(value: HeaderError) -> Self {
        let kind = match value {
            HeaderError::UnsupportedCommand(_) | HeaderError::NotSupported => ErrorKind::Unsupported,
            HeaderError::PolicyViolation { .. } => ErrorKind::PermissionDenied,
            _ => ErrorKind::InvalidData,
        };

        Error::new(kind, value)
    }
}

/// The early data carried in the WebSocket handshake is not valid base64.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed early data: {0}")]
pub struct EarlyDataError(#[from] pub base64::DecodeError);

impl From<EarlyDataError> for Error {
    fn from(value: EarlyDataError) -> Self {
        Error::new(ErrorKind::InvalidData, value)
    }
}
