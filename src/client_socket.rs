use std::{cell::Cell, io, pin::Pin};

use amk_proto::ResponsePrefix;
use futures::{Sink, SinkExt};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

/// Mirrors the ready states of a browser WebSocket, as far as the relay cares about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Open,

    /// The client started the closing handshake.
    Closing,
    Closed,
}

/// The sending side of a client's WebSocket, shared by everything in a session that answers the
/// client. Sends are serialized, so messages never interleave.
pub struct ClientSocket {
    sink: Mutex<Pin<Box<dyn Sink<Message, Error = WsError>>>>,
    state: Cell<ReadyState>,
}

impl ClientSocket {
    pub fn new<S>(sink: S) -> Self
    where
        S: Sink<Message, Error = WsError> + 'static,
    {
        Self {
            sink: Mutex::new(Box::pin(sink)),
            state: Cell::new(ReadyState::Open),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.get() == ReadyState::Open
    }

    /// Records that the client sent a close frame.
    pub fn mark_closing(&self) {
        if self.state.get() == ReadyState::Open {
            self.state.set(ReadyState::Closing);
        }
    }

    /// Sends a response payload as a binary message, with the session's response prefix in front
    /// if nothing was sent before it. Returns whether the message was sent; nothing is sent once
    /// the socket is no longer open. The prefix is consumed only by a send that succeeds.
    pub async fn send_response(&self, prefix: &ResponsePrefix, payload: &[u8]) -> io::Result<bool> {
        let mut sink = self.sink.lock().await;
        if !self.is_open() {
            return Ok(false);
        }

        let message = Message::Binary(prefix.frame(payload));
        sink.send(message).await.map_err(io::Error::other)?;
        prefix.mark_sent();
        Ok(true)
    }

    /// Closes the socket if it is open or closing, and does nothing otherwise. Returns whether
    /// this call was the one to close it.
    pub async fn safe_close(&self) -> bool {
        match self.state.get() {
            ReadyState::Open | ReadyState::Closing => self.state.set(ReadyState::Closed),
            ReadyState::Closed => return false,
        }

        let mut sink = self.sink.lock().await;
        if let Err(error) = sink.close().await {
            debug!("Error while closing client socket: {error}");
        }

        true
    }
}
