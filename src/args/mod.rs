use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::PathBuf,
};

mod parser;
mod values;

pub use parser::*;
pub use values::*;

/// The port to listen on when no `--listen` argument is given, or one is given without a port.
pub const DEFAULT_PORT: u16 = 8080;

/// The socket to listen on when no `--listen` argument is given.
pub const DEFAULT_LISTEN_ADDRESS: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT));

/// Gets a small string with this program's name and version.
pub fn get_version_string() -> String {
    format!(
        concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"), " ({} {})"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Gets a string with this program's help documentation.
pub fn get_help_string() -> &'static str {
    concat!(
        "Usage: ",
        env!("CARGO_PKG_NAME"),
        " (--uuid <UUID> | --sni <HOSTNAME>) [OPTIONS]\n",
        "\n",
        "Options:\n",
        "  -h, --help               Print this help menu and exit\n",
        "  -V, --version            Print the program's version and exit\n",
        "  -v, --verbose            Log additional debugging information\n",
        "  -s, --silent             Only log warnings and errors\n",
        "  -l, --listen <SOCKET>    Listen for WebSocket clients on this socket, may be repeated\n",
        "                           (default 0.0.0.0:8080)\n",
        "  -u, --uuid <UUID>        The version-5 UUID clients must present\n",
        "      --sni <HOSTNAME>     Derive the UUID clients must present from this hostname\n",
        "      --settings <FILE>    Load settings from a YAML file\n",
        "      --set <KEY=VALUE>    Override a single setting, may be repeated\n",
        "\n",
        "The RUST_LOG environment variable takes precedence over --verbose and --silent."
    )
}

/// The result of parsing the program's arguments.
#[derive(Debug, PartialEq)]
pub enum ArgumentsRequest {
    /// Print the help menu to stdout and exit.
    Help,

    /// Print this program's version to stdout and exit.
    Version,

    /// Run with the provided arguments.
    Run(StartupArguments),
}

/// Specifies the information on how the program should run.
#[derive(Debug, PartialEq)]
pub struct StartupArguments {
    /// Whether to log additional debugging information.
    pub verbose: bool,

    /// Whether to only log warnings and errors.
    pub silent: bool,

    /// The sockets to listen for incoming WebSocket connections on.
    pub listen: Vec<SocketAddr>,

    /// The user id clients must present, in canonical lowercase hyphenated form.
    pub user_id: String,

    /// A YAML file to load settings from.
    pub settings_file: Option<PathBuf>,

    /// Individual settings given on the command line, applied over the settings file in order.
    pub settings_overrides: Vec<(String, String)>,
}
