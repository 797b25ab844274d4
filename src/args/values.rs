use std::{
    fmt,
    io::ErrorKind,
    net::{SocketAddr, ToSocketAddrs},
    path::PathBuf,
};

use amk_proto::user_id::{parse_user_id, user_id_for_hostname};

#[derive(Debug, PartialEq, Eq)]
pub enum SocketErrorType {
    UnexpectedEnd(String),
    InvalidSocketAddress(String, String),
}

impl fmt::Display for SocketErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd(arg) => write!(f, "Expected socket address after {arg}"),
            Self::InvalidSocketAddress(arg, addr) => write!(f, "Invalid socket address after {arg}: {addr}"),
        }
    }
}

/// Parses a socket address argument, doing domain name resolution if necessary. If no port is
/// specified, `default_port` is used. The resulting [`SocketAddr`] instances are pushed onto
/// `result_vec`, skipping any already present.
pub(super) fn parse_socket_arg(
    result_vec: &mut Vec<SocketAddr>,
    arg: String,
    maybe_arg2: Option<String>,
    default_port: u16,
) -> Result<(), SocketErrorType> {
    let arg2 = match maybe_arg2 {
        Some(value) => value,
        None => return Err(SocketErrorType::UnexpectedEnd(arg)),
    };

    let iter = match arg2.to_socket_addrs() {
        Ok(iter) => iter,
        Err(err) if err.kind() == ErrorKind::InvalidInput => match (arg2.as_str(), default_port).to_socket_addrs() {
            Ok(iter) => iter,
            Err(_) => return Err(SocketErrorType::InvalidSocketAddress(arg, arg2)),
        },
        Err(_) => return Err(SocketErrorType::InvalidSocketAddress(arg, arg2)),
    };

    for sockaddr in iter {
        if !result_vec.contains(&sockaddr) {
            result_vec.push(sockaddr);
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
pub enum UserIdErrorType {
    UnexpectedEnd(String),
    InvalidValue(String, String),
    EmptyHostname(String),
}

impl fmt::Display for UserIdErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd(arg) => write!(f, "Expected value after {arg}"),
            Self::InvalidValue(arg, arg2) => write!(f, "Invalid user id after {arg}, expected a version-5 UUID: {arg2}"),
            Self::EmptyHostname(arg) => write!(f, "Empty hostname after {arg}"),
        }
    }
}

/// Parses a user id argument, which must be a version-5 UUID. Returns it in canonical form.
pub(super) fn parse_user_id_arg(arg: String, maybe_arg2: Option<String>) -> Result<String, UserIdErrorType> {
    let arg2 = match maybe_arg2 {
        Some(arg2) => arg2,
        None => return Err(UserIdErrorType::UnexpectedEnd(arg)),
    };

    match parse_user_id(&arg2) {
        Some(user_id) => Ok(user_id),
        None => Err(UserIdErrorType::InvalidValue(arg, arg2)),
    }
}

/// Parses a hostname argument and derives the user id for it.
pub(super) fn parse_hostname_arg(arg: String, maybe_arg2: Option<String>) -> Result<String, UserIdErrorType> {
    let arg2 = match maybe_arg2 {
        Some(arg2) => arg2,
        None => return Err(UserIdErrorType::UnexpectedEnd(arg)),
    };

    if arg2.trim().is_empty() {
        return Err(UserIdErrorType::EmptyHostname(arg));
    }

    Ok(user_id_for_hostname(&arg2))
}

#[derive(Debug, PartialEq, Eq)]
pub enum SettingErrorType {
    UnexpectedEnd(String),
    MissingEquals(String, String),
    EmptyKey(String, String),
}

impl fmt::Display for SettingErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd(arg) => write!(f, "Expected KEY=VALUE after {arg}"),
            Self::MissingEquals(arg, arg2) => write!(f, "Expected KEY=VALUE after {arg}, but found no '=': {arg2}"),
            Self::EmptyKey(arg, arg2) => write!(f, "Empty setting key after {arg}: {arg2}"),
        }
    }
}

/// Parses a `KEY=VALUE` settings override. Only the first `=` separates, so values may contain more.
pub(super) fn parse_setting_arg(arg: String, maybe_arg2: Option<String>) -> Result<(String, String), SettingErrorType> {
    let arg2 = match maybe_arg2 {
        Some(arg2) => arg2,
        None => return Err(SettingErrorType::UnexpectedEnd(arg)),
    };

    let (key, value) = match arg2.split_once('=') {
        Some(t) => t,
        None => return Err(SettingErrorType::MissingEquals(arg, arg2)),
    };

    let key = key.trim();
    if key.is_empty() {
        return Err(SettingErrorType::EmptyKey(arg, arg2));
    }

    Ok((key.to_owned(), value.to_owned()))
}

pub(super) fn parse_path_arg(arg: String, maybe_arg2: Option<String>) -> Result<PathBuf, String> {
    match maybe_arg2 {
        Some(arg2) if !arg2.is_empty() => Ok(PathBuf::from(arg2)),
        _ => Err(arg),
    }
}
