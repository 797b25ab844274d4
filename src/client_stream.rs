//! Turns the frames a client sends over its WebSocket into one ordered sequence of byte chunks,
//! starting with the handshake's early data if there was any.
//!
//! A reader task pulls frames off the socket and queues their payloads on a bounded channel, so a
//! slow outbound pushes back on the client instead of buffering without limit. The sequence ends
//! when the client closes the socket, and an error ends it too, after being handed out as the
//! last item.

use std::{cell::Cell, io, rc::Rc};

use amk_proto::early_data::decode_early_data;
use futures::{Stream, StreamExt};
use tokio::{
    sync::mpsc::{self, Receiver, Sender},
    task::JoinHandle,
};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

use crate::client_socket::ClientSocket;

/// How many chunks may be waiting for the session before the reader stops reading.
pub const CLIENT_CHUNK_BUFFER: usize = 16;

pub struct ClientStream {
    receiver: Receiver<io::Result<Vec<u8>>>,
    socket: Rc<ClientSocket>,
    cancelled: Rc<Cell<bool>>,
    reader: JoinHandle<()>,
}

impl ClientStream {
    /// Starts reading `frames` in the background. Must be called from within a
    /// [`LocalSet`](tokio::task::LocalSet).
    pub fn start<S>(socket: Rc<ClientSocket>, frames: S, early_data: Option<String>) -> Self
    where
        S: Stream<Item = Result<Message, WsError>> + Unpin + 'static,
    {
        let (sender, receiver) = mpsc::channel(CLIENT_CHUNK_BUFFER);
        let cancelled = Rc::new(Cell::new(false));

        let reader = tokio::task::spawn_local(read_frames(
            frames,
            sender,
            Rc::clone(&socket),
            Rc::clone(&cancelled),
            early_data,
        ));

        Self {
            receiver,
            socket,
            cancelled,
            reader,
        }
    }

    /// Waits for the next chunk. `None` means the client is done sending.
    pub async fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>> {
        self.receiver.recv().await
    }

    /// Abandons the sequence: nothing more is queued and the client socket is closed.
    pub async fn cancel(&self) {
        debug!("Client stream cancelled");
        self.cancelled.set(true);
        self.socket.safe_close().await;
    }
}

impl Drop for ClientStream {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_frames<S>(
    mut frames: S,
    sender: Sender<io::Result<Vec<u8>>>,
    socket: Rc<ClientSocket>,
    cancelled: Rc<Cell<bool>>,
    early_data: Option<String>,
) where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    match decode_early_data(early_data.as_deref()) {
        Ok(Some(data)) => {
            debug!("Received {} bytes of early data", data.len());
            if sender.send(Ok(data)).await.is_err() {
                return;
            }
        }
        Ok(None) => {}
        Err(error) => {
            let _ = sender.send(Err(error.into())).await;
            return;
        }
    }

    while let Some(frame) = frames.next().await {
        if cancelled.get() {
            return;
        }

        let data = match frame {
            Ok(Message::Binary(data)) => data,
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(error) => {
                let _ = sender.send(Err(io::Error::other(error))).await;
                return;
            }
        };

        if sender.send(Ok(data)).await.is_err() {
            return;
        }
    }

    socket.mark_closing();
    if !cancelled.get() {
        socket.safe_close().await;
    }
}
