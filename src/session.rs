use std::{io, rc::Rc};

use amk_proto::{parse_header, Command, HeaderError};
use tracing::{debug, info};

use crate::{
    client_socket::ClientSocket, client_stream::ClientStream, context::RelayContext, tcp_relay::TcpRelay, udp_relay::UdpRelay,
    upstream::Upstream,
};

/// Where a session's client data goes once the request header has been read.
enum Outbound<U> {
    Tcp(TcpRelay),
    Dns(UdpRelay<U>),
}

/// Runs one client session: reads the request header from the first chunk, starts the relay it
/// asks for, and feeds it everything else the client sends.
///
/// A bad header or a broken client stream ends the session with an error, after closing the
/// client. A TCP relay already running is left to finish on its own; with the client closed,
/// whatever it reads is dropped. Otherwise the session lasts until the client is done sending and, for TCP, the relay
/// has finished.
pub async fn run_session<U: Upstream + 'static>(
    context: Rc<RelayContext<U>>,
    socket: Rc<ClientSocket>,
    mut stream: ClientStream,
) -> io::Result<()> {
    let mut outbound = None;

    while let Some(chunk) = stream.next_chunk().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => {
                stream.cancel().await;
                return Err(error);
            }
        };

        match &mut outbound {
            Some(Outbound::Dns(relay)) => relay.write(&chunk),
            Some(Outbound::Tcp(relay)) => {
                if relay.write(chunk).await.is_err() {
                    debug!("Outbound relay has finished, dropping client stream");
                    stream.cancel().await;
                    break;
                }
            }
            None => match start_outbound(&context, &socket, &chunk) {
                Ok(started) => outbound = Some(started),
                Err(error) => {
                    stream.cancel().await;
                    return Err(error.into());
                }
            },
        }
    }

    if let Some(Outbound::Tcp(relay)) = outbound {
        relay.finish().await;
    }

    Ok(())
}

fn start_outbound<U: Upstream + 'static>(
    context: &Rc<RelayContext<U>>,
    socket: &Rc<ClientSocket>,
    chunk: &[u8],
) -> Result<Outbound<U>, HeaderError> {
    let header = parse_header(chunk, &context.user_id)?;
    let payload = &chunk[header.payload_offset..];
    let prefix = Rc::new(header.response_prefix());

    match header.command {
        Command::Tcp => {
            info!("TCP session to {}:{}", header.address, header.port);
            let relay = TcpRelay::start(
                Rc::clone(context),
                Rc::clone(socket),
                header.address.to_string(),
                header.port,
                payload.to_vec(),
                prefix,
            );

            Ok(Outbound::Tcp(relay))
        }
        Command::Udp => {
            info!("DNS session to {}:{}", header.address, header.port);
            let mut relay = UdpRelay::open(Rc::clone(context), Rc::clone(socket), prefix);
            relay.write(payload);
            Ok(Outbound::Dns(relay))
        }
        Command::Mux => Err(HeaderError::NotSupported),
    }
}
