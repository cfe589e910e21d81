use crate::{
    client::ClientConfig,
    codec::ArgList,
    contract::{ContractInfo, MethodInfo, RpcError},
    net::{Transport, TransportError, WireRequest, WireResponse},
    session,
};
use bytes::Bytes;
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-contract method table shared by every proxy of that contract.
///
/// Built once per contract by [`Client`](crate::Client) and cached.
#[derive(Debug)]
pub struct Blueprint {
    contract: &'static ContractInfo,
    methods: HashMap<&'static str, &'static MethodInfo>,
}

impl Blueprint {
    pub(crate) fn new(contract: &'static ContractInfo) -> Self {
        let methods = contract.methods.iter().map(|m| (m.name, m)).collect();
        Self { contract, methods }
    }

    pub fn contract(&self) -> &'static ContractInfo {
        self.contract
    }

    pub fn method(&self, name: &str) -> Option<&'static MethodInfo> {
        self.methods.get(name).copied()
    }
}

/// State behind every generated proxy, and the single routine all proxy
/// methods forward to.
#[derive(Clone)]
pub struct ProxyCore {
    blueprint: Arc<Blueprint>,
    uri: Arc<str>,
    session: Uuid,
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl ProxyCore {
    pub(crate) fn new(
        blueprint: Arc<Blueprint>,
        uri: &str,
        session: Uuid,
        transport: Arc<dyn Transport>,
        config: ClientConfig,
    ) -> Self {
        Self {
            blueprint,
            uri: uri.trim_end_matches('/').into(),
            session,
            transport,
            config,
        }
    }

    pub fn contract(&self) -> &'static ContractInfo {
        self.blueprint.contract()
    }

    pub fn blueprint(&self) -> &Arc<Blueprint> {
        &self.blueprint
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// `None` when the proxy was created without a session.
    pub fn session_id(&self) -> Option<Uuid> {
        (!self.session.is_nil()).then_some(self.session)
    }

    /// Performs one remote call.
    ///
    /// Returns the raw response body on 2xx (empty for void methods); the
    /// generated proxy decodes it into the method's return type.
    pub async fn invoke(&self, method: &str, args: ArgList) -> Result<Bytes, RpcError> {
        let contract = self.contract();
        let info = self
            .blueprint
            .method(method)
            .ok_or_else(|| RpcError::NoSuchMethod {
                contract: contract.name,
                method: method.to_owned(),
            })?;

        if args.len() != info.arity() {
            return Err(RpcError::ArgumentCount {
                method: info.name,
                expected: info.arity(),
                actual: args.len(),
            });
        }

        let request = WireRequest {
            url: format!("{}?name={}&method={}", self.uri, contract.name, info.name),
            body: if info.arity() > 0 { Some(args.encode()?) } else { None },
            cookie: session::cookie_header(self.session),
        };

        let response = self.send_with_retry(&request).await?;

        if !response.is_success() {
            let message = String::from_utf8_lossy(&response.body).into_owned();
            debug!(status = response.status, %message, "remote call failed");
            return Err(RpcError::Remote {
                status: response.status,
                message,
            });
        }

        if info.returns_void {
            return Ok(Bytes::new());
        }
        Ok(response.body)
    }

    /// Retries only when no response arrived at all. Any status code, even
    /// 500, ends the loop so a non-idempotent call is never repeated.
    async fn send_with_retry(&self, request: &WireRequest) -> Result<WireResponse, RpcError> {
        let max_attempts = self.config.max_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(url = %request.url, attempt, "sending rpc request");

            let sent = tokio::time::timeout(self.config.timeout, self.transport.post(request));
            let error = match sent.await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(error)) => error,
                Err(_elapsed) => TransportError::Timeout,
            };

            if !error.is_retryable() || attempt >= max_attempts {
                return Err(RpcError::Transport {
                    attempts: attempt,
                    source: error,
                });
            }

            warn!(url = %request.url, attempt, %error, "rpc attempt failed, retrying");
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }
}

impl fmt::Debug for ProxyCore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ProxyCore")
            .field("contract", &self.contract().name)
            .field("uri", &self.uri)
            .field("session", &self.session_id())
            .finish_non_exhaustive()
    }
}
