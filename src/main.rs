use std::{env, io, process::exit, rc::Rc};

use args::{ArgumentsRequest, StartupArguments};
use tokio::task::LocalSet;
use tracing::{debug, error};

use crate::{context::RelayContext, settings::Settings, upstream::HttpUpstream};

mod args;
mod client_socket;
mod client_stream;
mod context;
mod egress_pool;
mod logging;
mod server;
mod session;
mod settings;
mod tcp_relay;
mod udp_relay;
mod upstream;

#[cfg(test)]
mod test_utils;

fn main() {
    let arguments = match args::parse_arguments(env::args()) {
        Err(err) => {
            eprintln!("{err}\n\nType 'amk-relay --help' for a help menu");
            exit(1);
        }
        Ok(arguments) => arguments,
    };

    let startup_args = match arguments {
        ArgumentsRequest::Version => {
            println!("{}", args::get_version_string());
            return;
        }
        ArgumentsRequest::Help => {
            println!("{}", args::get_help_string());
            return;
        }
        ArgumentsRequest::Run(startup_args) => startup_args,
    };

    logging::init_logging(startup_args.verbose, startup_args.silent);

    let runtime_result = tokio::runtime::Builder::new_current_thread().enable_all().build();

    let result = match runtime_result {
        Ok(runtime) => LocalSet::new().block_on(&runtime, async_main(startup_args)),
        Err(err) => {
            eprintln!("Failed to start Tokio runtime: {err}");
            exit(1);
        }
    };

    if let Err(err) = result {
        error!("Relay finished with error: {err}");
        exit(1);
    }
}

async fn async_main(startup_args: StartupArguments) -> io::Result<()> {
    debug!("Startup arguments: {startup_args:?}");

    let settings = Settings::load(startup_args.settings_file.as_deref(), &startup_args.settings_overrides)?;
    let upstream = HttpUpstream::new()?;
    let context = Rc::new(RelayContext::new(startup_args.user_id, settings, upstream));

    let listeners = server::bind_listeners(&startup_args.listen).await?;
    server::run_server(listeners, context).await;

    Ok(())
}
