use std::{fmt, net::SocketAddr, path::PathBuf};

use super::{
    parse_hostname_arg, parse_path_arg, parse_setting_arg, parse_socket_arg, parse_user_id_arg, ArgumentsRequest, SettingErrorType,
    SocketErrorType, StartupArguments, UserIdErrorType, DEFAULT_LISTEN_ADDRESS, DEFAULT_PORT,
};

#[derive(Debug, PartialEq, Eq)]
pub enum ArgumentsError {
    UnknownArgument(String),
    ListenError(SocketErrorType),
    UserId(UserIdErrorType),
    SettingsFile(String),
    SettingOverride(SettingErrorType),
    VerboseAndSilent,
    UserIdAlreadySpecified(String),
    MissingUserId,
}

impl fmt::Display for ArgumentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownArgument(arg) => write!(f, "Unknown argument: {arg}"),
            Self::ListenError(socket_error) => socket_error.fmt(f),
            Self::UserId(user_id_error) => user_id_error.fmt(f),
            Self::SettingsFile(arg) => write!(f, "Expected file path after {arg}"),
            Self::SettingOverride(setting_error) => setting_error.fmt(f),
            Self::VerboseAndSilent => write!(f, "Cannot be both verbose and silent"),
            Self::UserIdAlreadySpecified(arg) => {
                write!(f, "Previous arguments already specified the user id, but {arg} is specifying it again")
            }
            Self::MissingUserId => write!(f, "A user id must be specified with either --uuid or --sni"),
        }
    }
}

struct StartupArgumentsParser {
    verbose: bool,
    silent: bool,
    listen: Vec<SocketAddr>,
    user_id: Option<String>,
    settings_file: Option<PathBuf>,
    settings_overrides: Vec<(String, String)>,
}

impl StartupArgumentsParser {
    const fn new() -> Self {
        Self {
            verbose: false,
            silent: false,
            listen: Vec::new(),
            user_id: None,
            settings_file: None,
            settings_overrides: Vec::new(),
        }
    }

    fn set_user_id<F>(&mut self, arg: String, f: F) -> Result<(), ArgumentsError>
    where
        F: FnOnce(String) -> Result<String, UserIdErrorType>,
    {
        if self.user_id.is_some() {
            return Err(ArgumentsError::UserIdAlreadySpecified(arg));
        }

        self.user_id = Some(f(arg).map_err(ArgumentsError::UserId)?);
        Ok(())
    }

    fn complete(mut self) -> Result<StartupArguments, ArgumentsError> {
        if self.verbose && self.silent {
            return Err(ArgumentsError::VerboseAndSilent);
        }

        let user_id = self.user_id.ok_or(ArgumentsError::MissingUserId)?;

        if self.listen.is_empty() {
            self.listen.push(DEFAULT_LISTEN_ADDRESS);
        }

        Ok(StartupArguments {
            verbose: self.verbose,
            silent: self.silent,
            listen: self.listen,
            user_id,
            settings_file: self.settings_file,
            settings_overrides: self.settings_overrides,
        })
    }
}

fn try_parse_general_argument(result: &mut StartupArgumentsParser, maybe_arg: &mut Option<String>) -> Result<bool, ArgumentsError> {
    let arg = match maybe_arg.take() {
        Some(s) => s,
        None => return Ok(false),
    };

    if arg.eq("-v") || arg.eq_ignore_ascii_case("--verbose") {
        result.verbose = true;
    } else if arg.eq("-s") || arg.eq_ignore_ascii_case("--silent") {
        result.silent = true;
    } else {
        *maybe_arg = Some(arg);
    }

    Ok(maybe_arg.is_none())
}

fn try_parse_listen_argument<F>(
    result: &mut StartupArgumentsParser,
    maybe_arg: &mut Option<String>,
    get_next_arg: F,
) -> Result<bool, ArgumentsError>
where
    F: FnOnce() -> Option<String>,
{
    let arg = match maybe_arg.take() {
        Some(s) => s,
        None => return Ok(false),
    };

    if arg.eq("-l") || arg.eq_ignore_ascii_case("--listen") {
        parse_socket_arg(&mut result.listen, arg, get_next_arg(), DEFAULT_PORT).map_err(ArgumentsError::ListenError)?;
    } else {
        *maybe_arg = Some(arg);
    }

    Ok(maybe_arg.is_none())
}

fn try_parse_user_id_argument<F>(
    result: &mut StartupArgumentsParser,
    maybe_arg: &mut Option<String>,
    get_next_arg: F,
) -> Result<bool, ArgumentsError>
where
    F: FnOnce() -> Option<String>,
{
    let arg = match maybe_arg.take() {
        Some(s) => s,
        None => return Ok(false),
    };

    if arg.eq("-u") || arg.eq_ignore_ascii_case("--uuid") {
        result.set_user_id(arg, |arg| parse_user_id_arg(arg, get_next_arg()))?;
    } else if arg.eq_ignore_ascii_case("--sni") {
        result.set_user_id(arg, |arg| parse_hostname_arg(arg, get_next_arg()))?;
    } else {
        *maybe_arg = Some(arg);
    }

    Ok(maybe_arg.is_none())
}

fn try_parse_settings_argument<F>(
    result: &mut StartupArgumentsParser,
    maybe_arg: &mut Option<String>,
    get_next_arg: F,
) -> Result<bool, ArgumentsError>
where
    F: FnOnce() -> Option<String>,
{
    let arg = match maybe_arg.take() {
        Some(s) => s,
        None => return Ok(false),
    };

    if arg.eq_ignore_ascii_case("--settings") {
        result.settings_file = Some(parse_path_arg(arg, get_next_arg()).map_err(ArgumentsError::SettingsFile)?);
    } else if arg.eq_ignore_ascii_case("--set") {
        let setting = parse_setting_arg(arg, get_next_arg()).map_err(ArgumentsError::SettingOverride)?;
        result.settings_overrides.push(setting);
    } else {
        *maybe_arg = Some(arg);
    }

    Ok(maybe_arg.is_none())
}

pub fn parse_arguments<T>(mut args: T) -> Result<ArgumentsRequest, ArgumentsError>
where
    T: Iterator<Item = String>,
{
    let mut result = StartupArgumentsParser::new();

    // Ignore the first argument, as it's by convention the name of the program
    args.next();

    while let Some(arg) = args.next() {
        if arg.is_empty() {
            continue;
        } else if arg.eq("-h") || arg.eq_ignore_ascii_case("--help") {
            return Ok(ArgumentsRequest::Help);
        } else if arg.eq("-V") || arg.eq_ignore_ascii_case("--version") {
            return Ok(ArgumentsRequest::Version);
        }

        let mut maybe_arg = Some(arg);
        let _ = !try_parse_general_argument(&mut result, &mut maybe_arg)?
            && !try_parse_listen_argument(&mut result, &mut maybe_arg, || args.next())?
            && !try_parse_user_id_argument(&mut result, &mut maybe_arg, || args.next())?
            && !try_parse_settings_argument(&mut result, &mut maybe_arg, || args.next())?;

        if let Some(arg) = maybe_arg {
            return Err(ArgumentsError::UnknownArgument(arg));
        }
    }

    let result = result.complete()?;
    Ok(ArgumentsRequest::Run(result))
}
