use std::{
    future::poll_fn,
    io::{self, ErrorKind},
    net::SocketAddr,
    rc::Rc,
    task::Poll,
};

use futures::StreamExt;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::header::SEC_WEBSOCKET_PROTOCOL,
        Error as WsError,
    },
    WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::{
    client_socket::ClientSocket, client_stream::ClientStream, context::RelayContext, session::run_session, upstream::Upstream,
};

/// Binds every address in `listen`, failing if none of them can be bound.
pub async fn bind_listeners(listen: &[SocketAddr]) -> io::Result<Vec<TcpListener>> {
    let mut listeners = Vec::with_capacity(listen.len());
    let mut last_error = None;

    for address in listen {
        match TcpListener::bind(address).await {
            Ok(listener) => {
                info!("Listening for clients on {address}");
                listeners.push(listener);
            }
            Err(error) => {
                warn!("Could not listen on {address}: {error}");
                last_error = Some(error);
            }
        }
    }

    if listeners.is_empty() {
        return Err(last_error.unwrap_or_else(|| io::Error::new(ErrorKind::InvalidInput, "No addresses to listen on")));
    }

    Ok(listeners)
}

pub async fn accept_from_any(listeners: &[TcpListener]) -> io::Result<(TcpStream, SocketAddr)> {
    poll_fn(|cx| {
        for listener in listeners {
            if let Poll::Ready(result) = listener.poll_accept(cx) {
                return Poll::Ready(result);
            }
        }

        Poll::Pending
    })
    .await
}

/// Accepts clients on every listener forever, running each one's session in its own local task.
pub async fn run_server<U: Upstream + 'static>(listeners: Vec<TcpListener>, context: Rc<RelayContext<U>>) {
    loop {
        let (stream, address) = match accept_from_any(&listeners).await {
            Ok(t) => t,
            Err(error) => {
                warn!("Error accepting new incoming connection: {error}");
                continue;
            }
        };

        debug!("Incoming connection from {address}");
        let _ = stream.set_nodelay(true);
        let context = Rc::clone(&context);
        tokio::task::spawn_local(async move {
            handle_client(context, stream, address).await;
        });
    }
}

async fn handle_client<U, S>(context: Rc<RelayContext<U>>, stream: S, address: SocketAddr)
where
    U: Upstream + 'static,
    S: AsyncRead + AsyncWrite + Unpin + 'static,
{
    let (websocket, early_data) = match accept_websocket(stream).await {
        Ok(t) => t,
        Err(error) => {
            debug!("WebSocket handshake with {address} failed: {error}");
            return;
        }
    };

    info!("Session from {address} started");
    let (sink, frames) = websocket.split();
    let socket = Rc::new(ClientSocket::new(sink));
    let client_stream = ClientStream::start(Rc::clone(&socket), frames, early_data);

    match run_session(context, socket, client_stream).await {
        Ok(()) => info!("Session from {address} finished"),
        Err(error) => warn!("Session from {address} finished with error: {error}"),
    }
}

/// Performs the server side of the WebSocket handshake. Returns the socket along with the value
/// of the `Sec-WebSocket-Protocol` header, which clients use to carry early data. The same value is
/// echoed back so that clients see their protocol accepted.
pub async fn accept_websocket<S>(stream: S) -> Result<(WebSocketStream<S>, Option<String>), WsError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut early_data = None;

    let websocket = accept_hdr_async(stream, |request: &Request, mut response: Response| {
        if let Some(value) = request.headers().get(SEC_WEBSOCKET_PROTOCOL) {
            early_data = value.to_str().ok().map(String::from);
            response.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value.clone());
        }

        Ok::<_, ErrorResponse>(response)
    })
    .await?;

    Ok((websocket, early_data))
}
