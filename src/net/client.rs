use super::{Transport, TransportError, WireRequest, WireResponse};
use crate::codec::CONTENT_TYPE;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE as CONTENT_TYPE_HEADER, COOKIE};

/// [`Transport`] over HTTP using reqwest.
///
/// Timeouts are enforced by the invocation pipeline, so the inner client
/// does not need one of its own.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, TLS, connection pool limits).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: &WireRequest) -> Result<WireResponse, TransportError> {
        let mut builder = self.client.post(&request.url);

        if let Some(cookie) = &request.cookie {
            builder = builder.header(COOKIE, cookie);
        }

        builder = match &request.body {
            Some(body) => builder
                .header(CONTENT_TYPE_HEADER, CONTENT_TYPE)
                .body(body.clone()),
            None => builder.body(reqwest::Body::from(Vec::new())),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(TransportError::Body)?;
        Ok(WireResponse { status, body })
    }
}
