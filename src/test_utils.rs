use std::{cell::RefCell, io, rc::Rc};

use bytes::Bytes;
use futures::{channel::mpsc, SinkExt};
use tokio::io::DuplexStream;
use tokio_tungstenite::{
    tungstenite::{protocol::Role, Error as WsError, Message},
    WebSocketStream,
};

use crate::{client_socket::ClientSocket, context::RelayContext, settings::Settings, upstream::Upstream};

pub const USER: &str = "2f3c6b9e-2a8f-5d1e-9c4b-6a7f8e9d0c1b";

/// An [`Upstream`] that answers from memory and remembers what it was asked.
#[derive(Default)]
pub struct StubUpstream {
    proxies: String,
    fetched: RefCell<Vec<String>>,
    queries: RefCell<Vec<(String, Bytes)>>,
}

impl StubUpstream {
    pub fn with_proxies(proxies: &str) -> Self {
        Self {
            proxies: proxies.to_string(),
            ..Default::default()
        }
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }

    pub fn queries(&self) -> Vec<(String, Bytes)> {
        self.queries.borrow().clone()
    }
}

impl Upstream for StubUpstream {
    async fn fetch_text(&self, uri: &str) -> io::Result<String> {
        self.fetched.borrow_mut().push(uri.to_string());
        Ok(self.proxies.clone())
    }

    /// Answers `answer:` followed by the query, or fails if the query is `fail`.
    async fn dns_query(&self, resolver_url: &str, query: Bytes) -> io::Result<Bytes> {
        self.queries.borrow_mut().push((resolver_url.to_string(), query.clone()));
        if query.as_ref() == b"fail" {
            return Err(io::Error::other("resolver unavailable"));
        }

        let mut answer = b"answer:".to_vec();
        answer.extend_from_slice(&query);
        Ok(answer.into())
    }
}

pub fn test_context(upstream: StubUpstream, settings: Settings) -> Rc<RelayContext<StubUpstream>> {
    Rc::new(RelayContext::new(USER.to_string(), settings, upstream))
}

/// A server and a client WebSocket talking to each other in memory, handshake already done.
pub async fn websocket_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
    let (server_io, client_io) = tokio::io::duplex(64 * 1024);
    let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
    (server, client)
}

/// A [`ClientSocket`] whose messages end up in a channel.
pub fn channel_socket() -> (Rc<ClientSocket>, mpsc::UnboundedReceiver<Message>) {
    let (sender, receiver) = mpsc::unbounded();
    let socket = ClientSocket::new(sender.sink_map_err(|_| WsError::ConnectionClosed));
    (Rc::new(socket), receiver)
}

/// Builds the first message of a session with an empty options block.
pub fn build_request(command: u8, port: u16, address: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8];
    buf.extend_from_slice(uuid_bytes(USER).as_slice());
    buf.push(0);
    buf.push(command);
    buf.extend_from_slice(&port.to_be_bytes());
    buf.extend_from_slice(address);
    buf.extend_from_slice(payload);
    buf
}

fn uuid_bytes(user: &str) -> Vec<u8> {
    let hex: String = user.chars().filter(|c| *c != '-').collect();
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

/// The address field for an IPv4 destination.
pub fn ipv4_address(octets: [u8; 4]) -> Vec<u8> {
    let mut address = vec![1u8];
    address.extend_from_slice(&octets);
    address
}
