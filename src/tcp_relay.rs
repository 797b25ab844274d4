//! Relays a TCP session to its destination, falling back to the egress pool when the destination
//! doesn't answer.
//!
//! An attempt connects, sends the payload that came with the request header, and then pipes bytes
//! both ways until the destination stops sending. If it sent anything at all, the session is over
//! and the client is closed. If it sent nothing, or the connection couldn't even be made, the
//! attempt is repeated against a random egress candidate on the same port, up to [`MAX_RETRIES`]
//! times. Running out of retries or candidates ends the relay quietly, leaving the client open.

use std::{
    io::{self, ErrorKind},
    rc::Rc,
};

use amk_proto::ResponsePrefix;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    select,
    sync::mpsc::{self, Receiver, Sender},
    task::JoinHandle,
};
use tracing::debug;

use crate::{client_socket::ClientSocket, client_stream::CLIENT_CHUNK_BUFFER, context::RelayContext, upstream::Upstream};

pub const MAX_RETRIES: u32 = 5;

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// A handle to a running TCP relay.
pub struct TcpRelay {
    sender: Sender<Vec<u8>>,
    task: JoinHandle<()>,
}

impl TcpRelay {
    /// Starts relaying to `host:port` in a new local task.
    pub fn start<U: Upstream + 'static>(
        context: Rc<RelayContext<U>>,
        socket: Rc<ClientSocket>,
        host: String,
        port: u16,
        initial_payload: Vec<u8>,
        prefix: Rc<ResponsePrefix>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(CLIENT_CHUNK_BUFFER);
        let task = tokio::task::spawn_local(run_tcp_relay(context, socket, host, port, initial_payload, prefix, receiver));

        Self { sender, task }
    }

    /// Queues client data for the destination. Data sent while the relay is reconnecting goes to
    /// whichever attempt connects next. Fails once the relay has finished.
    pub async fn write(&self, chunk: Vec<u8>) -> io::Result<()> {
        self.sender
            .send(chunk)
            .await
            .map_err(|_| io::Error::new(ErrorKind::BrokenPipe, "The outbound relay has finished"))
    }

    /// Signals that the client is done sending and waits for the relay to finish.
    pub async fn finish(self) {
        let Self { sender, task } = self;
        drop(sender);
        let _ = task.await;
    }
}

async fn run_tcp_relay<U: Upstream>(
    context: Rc<RelayContext<U>>,
    socket: Rc<ClientSocket>,
    mut host: String,
    port: u16,
    initial_payload: Vec<u8>,
    prefix: Rc<ResponsePrefix>,
    mut receiver: Receiver<Vec<u8>>,
) {
    let mut retries = 0;

    loop {
        let received = match connect_and_write(&host, port, &initial_payload).await {
            Ok(stream) => {
                debug!("Connected to {host}:{port}");
                relay_connection(stream, &mut receiver, &socket, &prefix).await
            }
            Err(error) => {
                debug!("Could not connect to {host}:{port}: {error}");
                false
            }
        };

        if received {
            debug!("Outbound connection to {host}:{port} finished");
            socket.safe_close().await;
            return;
        }

        retries += 1;
        if retries > MAX_RETRIES {
            debug!("Nothing received from {host}:{port} and no retries left, giving up");
            return;
        }

        context.egress_pool.populate_if_empty(&context.upstream, &context.settings).await;
        host = match context.egress_pool.pick_random() {
            Some(candidate) => candidate,
            None => {
                debug!("Nothing received from {host}:{port} and no egress candidates to retry with");
                return;
            }
        };

        debug!("Retrying through {host}:{port} ({retries}/{MAX_RETRIES})");
    }
}

async fn connect_and_write(host: &str, port: u16, initial_payload: &[u8]) -> io::Result<TcpStream> {
    let mut stream = TcpStream::connect((host, port)).await?;
    let _ = stream.set_nodelay(true);
    stream.write_all(initial_payload).await?;
    Ok(stream)
}

/// Pipes bytes both ways over an established connection until the destination stops sending.
/// Returns whether anything was received from it.
async fn relay_connection(
    mut stream: TcpStream,
    receiver: &mut Receiver<Vec<u8>>,
    socket: &ClientSocket,
    prefix: &ResponsePrefix,
) -> bool {
    let (mut read_half, mut write_half) = stream.split();

    let forward = async {
        while let Some(chunk) = receiver.recv().await {
            write_half.write_all(&chunk).await?;
        }

        write_half.shutdown().await
    };

    let reverse = pipe_to_client(&mut read_half, socket, prefix);
    tokio::pin!(forward, reverse);

    select! {
        received = &mut reverse => received,
        result = &mut forward => {
            if let Err(error) = result {
                debug!("Error while writing to outbound connection: {error}");
            }

            reverse.await
        }
    }
}

/// Sends everything read from `reader` to the client, until EOF or an error. Data arriving once
/// the client is no longer open is read and dropped.
async fn pipe_to_client<R>(reader: &mut R, socket: &ClientSocket, prefix: &ResponsePrefix) -> bool
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut received = false;

    loop {
        let len = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(len) => len,
            Err(error) => {
                debug!("Error while reading from outbound connection: {error}");
                break;
            }
        };

        received = true;
        match socket.send_response(prefix, &buf[..len]).await {
            Ok(true) => {}
            Ok(false) => debug!("Client is no longer open, dropping {len} bytes"),
            Err(error) => debug!("Error while sending to client: {error}"),
        }
    }

    received
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, time::Duration};

    use futures::StreamExt;
    use tokio::{net::TcpListener, task::LocalSet};
    use tokio_tungstenite::tungstenite::Message;

    use super::*;
    use crate::{
        settings::{Settings, PROXIES_URI_KEY},
        test_utils::{channel_socket, test_context, StubUpstream},
    };

    const LIST_URI: &str = "https://lists.example/proxies.txt";

    fn pool_settings() -> Settings {
        let mut settings = Settings::new();
        settings.set(PROXIES_URI_KEY.into(), LIST_URI.into());
        settings
    }

    async fn local_listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    /// Accepts connections forever, closing each one right away. Returns how many were accepted.
    fn spawn_silent_destination(listener: TcpListener) -> Rc<Cell<usize>> {
        let accepted = Rc::new(Cell::new(0));
        let accepted2 = Rc::clone(&accepted);
        tokio::task::spawn_local(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accepted2.set(accepted2.get() + 1);
                drop(stream);
            }
        });

        accepted
    }

    #[tokio::test]
    async fn silent_destination_is_retried_through_the_pool() {
        LocalSet::new()
            .run_until(async {
                let (listener, port) = local_listener().await;
                let context = test_context(StubUpstream::with_proxies("127.0.0.1,US\n"), pool_settings());
                let (socket, receiver) = channel_socket();
                let prefix = Rc::new(ResponsePrefix::new(0));
                let relay = TcpRelay::start(Rc::clone(&context), socket, "127.0.0.1".into(), port, b"ping".to_vec(), prefix);

                let mut buf = [0u8; 4];
                let (mut first, _) = listener.accept().await.unwrap();
                first.read_exact(&mut buf).await.unwrap();
                assert_eq!(&buf, b"ping");
                drop(first);

                // The retry goes to the pool's candidate on the original port, with the same payload.
                let (mut second, _) = listener.accept().await.unwrap();
                second.read_exact(&mut buf).await.unwrap();
                assert_eq!(&buf, b"ping");
                second.write_all(b"pong").await.unwrap();
                drop(second);

                relay.finish().await;
                let messages: Vec<Message> = receiver.collect().await;
                assert_eq!(messages, vec![Message::Binary(b"\x00\x00pong".to_vec())]);
                assert_eq!(context.upstream.fetched(), vec![LIST_URI.to_string()]);
            })
            .await;
    }

    #[tokio::test]
    async fn refused_connect_is_retried_through_the_pool() {
        LocalSet::new()
            .run_until(async {
                // The listener is bound to 127.0.0.1 only, so the same port on 127.0.0.2 refuses.
                let (listener, port) = local_listener().await;
                let context = test_context(StubUpstream::with_proxies("127.0.0.1,US\n"), pool_settings());
                let (socket, receiver) = channel_socket();
                let prefix = Rc::new(ResponsePrefix::new(0));
                let relay = TcpRelay::start(Rc::clone(&context), socket, "127.0.0.2".into(), port, b"ping".to_vec(), prefix);

                let (mut candidate, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 4];
                candidate.read_exact(&mut buf).await.unwrap();
                assert_eq!(&buf, b"ping");
                candidate.write_all(b"pong").await.unwrap();
                drop(candidate);

                relay.finish().await;
                assert_eq!(context.upstream.fetched(), vec![LIST_URI.to_string()]);
                let messages: Vec<Message> = receiver.collect().await;
                assert_eq!(messages, vec![Message::Binary(b"\x00\x00pong".to_vec())]);
            })
            .await;
    }

    #[tokio::test]
    async fn reset_after_data_is_not_retried() {
        LocalSet::new()
            .run_until(async {
                let (listener, port) = local_listener().await;
                let context = test_context(StubUpstream::with_proxies("127.0.0.1,US\n"), pool_settings());
                let (socket, receiver) = channel_socket();
                let prefix = Rc::new(ResponsePrefix::new(4));
                let relay = TcpRelay::start(Rc::clone(&context), Rc::clone(&socket), "127.0.0.1".into(), port, b"ping".to_vec(), prefix);

                let (mut destination, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 4];
                destination.read_exact(&mut buf).await.unwrap();
                destination.write_all(b"x").await.unwrap();
                destination.set_linger(Some(Duration::ZERO)).unwrap();
                drop(destination);

                relay.finish().await;
                assert!(context.upstream.fetched().is_empty());
                assert!(!socket.is_open());
                drop(socket);

                let messages: Vec<Message> = receiver.collect().await;
                assert_eq!(messages, vec![Message::Binary(vec![4, 0, b'x'])]);
            })
            .await;
    }

    #[tokio::test]
    async fn dropped_handle_lets_the_attempt_complete() {
        LocalSet::new()
            .run_until(async {
                let (listener, port) = local_listener().await;
                let context = test_context(StubUpstream::default(), Settings::new());
                let (socket, receiver) = channel_socket();
                socket.safe_close().await;

                let prefix = Rc::new(ResponsePrefix::new(0));
                let relay = TcpRelay::start(context, Rc::clone(&socket), "127.0.0.1".into(), port, b"late".to_vec(), prefix);
                drop(relay);

                let (mut destination, _) = listener.accept().await.unwrap();
                let mut received = Vec::new();
                destination.read_to_end(&mut received).await.unwrap();
                assert_eq!(received, b"late");
                destination.write_all(b"discarded").await.unwrap();
                drop(destination);

                drop(socket);
                let messages: Vec<Message> = receiver.collect().await;
                assert!(messages.is_empty());
            })
            .await;
    }

    #[tokio::test]
    async fn data_forecloses_retry() {
        LocalSet::new()
            .run_until(async {
                let (listener, port) = local_listener().await;
                let context = test_context(StubUpstream::with_proxies("127.0.0.1,US\n"), pool_settings());
                let (socket, receiver) = channel_socket();
                let prefix = Rc::new(ResponsePrefix::new(0));
                let relay = TcpRelay::start(Rc::clone(&context), Rc::clone(&socket), "127.0.0.1".into(), port, vec![], prefix);

                let (mut destination, _) = listener.accept().await.unwrap();
                destination.write_all(b"hello").await.unwrap();
                drop(destination);

                relay.finish().await;
                assert!(!socket.is_open());
                drop(socket);

                let messages: Vec<Message> = receiver.collect().await;
                assert_eq!(messages, vec![Message::Binary(b"\x00\x00hello".to_vec())]);
                assert!(context.upstream.fetched().is_empty());
            })
            .await;
    }

    #[tokio::test]
    async fn client_chunks_reach_the_destination() {
        LocalSet::new()
            .run_until(async {
                let (listener, port) = local_listener().await;
                let context = test_context(StubUpstream::default(), Settings::new());
                let (socket, receiver) = channel_socket();
                let prefix = Rc::new(ResponsePrefix::new(9));
                let relay = TcpRelay::start(context, socket, "127.0.0.1".into(), port, b"GET".to_vec(), prefix);

                let destination = tokio::task::spawn_local(async move {
                    let (mut stream, _) = listener.accept().await.unwrap();
                    let mut received = Vec::new();
                    stream.read_to_end(&mut received).await.unwrap();
                    stream.write_all(b"done").await.unwrap();
                    received
                });

                relay.write(b" /a".to_vec()).await.unwrap();
                relay.write(b" /b".to_vec()).await.unwrap();
                relay.finish().await;

                assert_eq!(destination.await.unwrap(), b"GET /a /b");
                let messages: Vec<Message> = receiver.collect().await;
                assert_eq!(messages, vec![Message::Binary(b"\x09\x00done".to_vec())]);
            })
            .await;
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        LocalSet::new()
            .run_until(async {
                let (listener, port) = local_listener().await;
                let accepted = spawn_silent_destination(listener);
                let context = test_context(StubUpstream::with_proxies("127.0.0.1\n"), pool_settings());
                let (socket, _receiver) = channel_socket();
                let prefix = Rc::new(ResponsePrefix::new(0));
                let relay = TcpRelay::start(Rc::clone(&context), Rc::clone(&socket), "127.0.0.1".into(), port, b"x".to_vec(), prefix);

                relay.finish().await;

                assert_eq!(accepted.get(), 1 + MAX_RETRIES as usize);
                assert_eq!(context.upstream.fetched().len(), 1);
                assert!(socket.is_open());
            })
            .await;
    }

    #[tokio::test]
    async fn empty_pool_ends_without_retry() {
        LocalSet::new()
            .run_until(async {
                let (listener, port) = local_listener().await;
                let accepted = spawn_silent_destination(listener);
                let context = test_context(StubUpstream::default(), Settings::new());
                let (socket, _receiver) = channel_socket();
                let prefix = Rc::new(ResponsePrefix::new(0));
                let relay = TcpRelay::start(context, Rc::clone(&socket), "127.0.0.1".into(), port, b"x".to_vec(), prefix);

                relay.finish().await;

                assert_eq!(accepted.get(), 1);
                assert!(socket.is_open());
            })
            .await;
    }
}
