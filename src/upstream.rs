use std::io;

use bytes::Bytes;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    Client,
};

/// The media type of DNS wire-format messages carried over HTTPS.
pub const DNS_MESSAGE: &str = "application/dns-message";

/// The resolver DNS queries go to by default.
pub const UNFILTERED_RESOLVER: &str = "https://1.1.1.1/dns-query";

/// The resolver DNS queries go to when adult content is to be blocked.
pub const FILTERED_RESOLVER: &str = "https://1.1.1.3/dns-query";

/// The HTTP services the relay depends on.
#[allow(async_fn_in_trait)]
pub trait Upstream {
    /// Fetches a plain text document.
    async fn fetch_text(&self, uri: &str) -> io::Result<String>;

    /// Sends a DNS query in wire format to a DNS-over-HTTPS resolver and returns its answer.
    async fn dns_query(&self, resolver_url: &str, query: Bytes) -> io::Result<Bytes>;
}

pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    pub fn new() -> io::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(io::Error::other)?;

        Ok(Self { client })
    }
}

impl Upstream for HttpUpstream {
    async fn fetch_text(&self, uri: &str) -> io::Result<String> {
        let response = self.client.get(uri).send().await.map_err(io::Error::other)?;
        let response = response.error_for_status().map_err(io::Error::other)?;
        response.text().await.map_err(io::Error::other)
    }

    async fn dns_query(&self, resolver_url: &str, query: Bytes) -> io::Result<Bytes> {
        let response = self
            .client
            .post(resolver_url)
            .header(CONTENT_TYPE, DNS_MESSAGE)
            .header(ACCEPT, DNS_MESSAGE)
            .body(query)
            .send()
            .await
            .map_err(io::Error::other)?;

        let response = response.error_for_status().map_err(io::Error::other)?;
        response.bytes().await.map_err(io::Error::other)
    }
}
