use std::rc::Rc;

use amk_proto::{
    udp_frame::{encode_frame, UdpFrameDecoder},
    ResponsePrefix,
};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    client_socket::ClientSocket,
    context::RelayContext,
    settings::BLOCK_PORN_KEY,
    upstream::{Upstream, FILTERED_RESOLVER, UNFILTERED_RESOLVER},
};

/// Relays the DNS queries of a UDP session to a DNS-over-HTTPS resolver.
///
/// Every query is its own exchange running in its own local task, so answers go back to the
/// client in the order they arrive, not the order they were asked. A failed query gets no answer
/// and doesn't affect the others.
pub struct UdpRelay<U> {
    context: Rc<RelayContext<U>>,
    socket: Rc<ClientSocket>,
    prefix: Rc<ResponsePrefix>,
    resolver: &'static str,
    decoder: UdpFrameDecoder,
}

impl<U: Upstream + 'static> UdpRelay<U> {
    pub fn open(context: Rc<RelayContext<U>>, socket: Rc<ClientSocket>, prefix: Rc<ResponsePrefix>) -> Self {
        let resolver = match context.settings.is_yes(BLOCK_PORN_KEY) {
            true => FILTERED_RESOLVER,
            false => UNFILTERED_RESOLVER,
        };

        debug!("Relaying DNS to {resolver}");
        Self {
            context,
            socket,
            prefix,
            resolver,
            decoder: UdpFrameDecoder::new(),
        }
    }

    /// Takes client data and starts an exchange for every query it completes.
    pub fn write(&mut self, chunk: &[u8]) {
        for query in self.decoder.decode(chunk) {
            let context = Rc::clone(&self.context);
            let socket = Rc::clone(&self.socket);
            let prefix = Rc::clone(&self.prefix);
            let resolver = self.resolver;

            tokio::task::spawn_local(async move {
                exchange(&context.upstream, &socket, &prefix, resolver, query).await;
            });
        }
    }
}

async fn exchange<U: Upstream>(upstream: &U, socket: &ClientSocket, prefix: &ResponsePrefix, resolver: &str, query: Bytes) {
    let query_len = query.len();
    let answer = match upstream.dns_query(resolver, query).await {
        Ok(answer) => answer,
        Err(error) => {
            warn!("DNS query of {query_len} bytes to {resolver} failed: {error}");
            return;
        }
    };

    let frame = match encode_frame(&answer) {
        Some(frame) => frame,
        None => {
            warn!("Dropping DNS answer of {} bytes, too long for a UDP frame", answer.len());
            return;
        }
    };

    match socket.send_response(prefix, &frame).await {
        Ok(true) => {}
        Ok(false) => debug!("Client is no longer open, dropping DNS answer"),
        Err(error) => debug!("Error while sending DNS answer to client: {error}"),
    }
}
