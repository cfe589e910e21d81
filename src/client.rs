use crate::{
    contract::{Contract, ContractInfo, RpcError},
    net::{client::HttpTransport, Transport},
    proxy::{Blueprint, ProxyCore},
    session::{NoSession, SessionSource},
};
use dashmap::DashMap;
use std::{sync::Arc, time::Duration};
use tracing::debug;

/// Per-call settings shared by every proxy a [`Client`] creates.
#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    /// Limit for a single attempt, not for the whole call.
    pub timeout: Duration,
    /// Extra attempts after the first when no response arrives.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(300_000),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

/// Finds the endpoint serving a contract.
pub trait UriResolver: Send + Sync {
    fn resolve(&self, contract: &ContractInfo) -> Option<String>;
}

impl<F> UriResolver for F
where
    F: Fn(&ContractInfo) -> Option<String> + Send + Sync,
{
    fn resolve(&self, contract: &ContractInfo) -> Option<String> {
        self(contract)
    }
}

/// Every contract lives at the same endpoint.
#[derive(Debug, Clone)]
pub struct FixedUri(pub String);

impl UriResolver for FixedUri {
    fn resolve(&self, _contract: &ContractInfo) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Creates proxies for contracts.
///
/// Cheap to clone; clones share the transport and the per-contract
/// blueprint cache.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    resolver: Box<dyn UriResolver>,
    sessions: Box<dyn SessionSource>,
    transport: Arc<dyn Transport>,
    blueprints: DashMap<&'static str, Arc<Blueprint>>,
}

impl Client {
    pub fn new(resolver: impl UriResolver + 'static) -> Self {
        ClientBuilder::new(resolver).build()
    }

    pub fn builder(resolver: impl UriResolver + 'static) -> ClientBuilder {
        ClientBuilder::new(resolver)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Creates a proxy for contract `C`, e.g. `client.create::<dyn Greeter>()`.
    ///
    /// The session id is read once here and reused by every call made
    /// through the returned proxy.
    pub fn create<C>(&self) -> Result<C::Proxy, RpcError>
    where
        C: Contract + ?Sized,
    {
        let info = C::info();
        let blueprint = self.blueprint(info);
        let uri = self
            .inner
            .resolver
            .resolve(info)
            .ok_or(RpcError::UnresolvedUri {
                contract: info.name,
            })?;
        let session = self.inner.sessions.current_session();
        debug!(contract = info.name, %uri, %session, "creating proxy");

        let core = ProxyCore::new(
            blueprint,
            &uri,
            session,
            self.inner.transport.clone(),
            self.inner.config,
        );
        Ok(C::proxy(core))
    }

    /// Cached method table for `info`; built on first use.
    pub fn blueprint(&self, info: &'static ContractInfo) -> Arc<Blueprint> {
        if let Some(blueprint) = self.inner.blueprints.get(info.name) {
            return blueprint.value().clone();
        }
        self.inner
            .blueprints
            .entry(info.name)
            .or_insert_with(|| Arc::new(Blueprint::new(info)))
            .value()
            .clone()
    }
}

pub struct ClientBuilder {
    config: ClientConfig,
    resolver: Box<dyn UriResolver>,
    sessions: Box<dyn SessionSource>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    fn new(resolver: impl UriResolver + 'static) -> Self {
        Self {
            config: ClientConfig::default(),
            resolver: Box::new(resolver),
            sessions: Box::new(NoSession),
            transport: None,
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sessions(mut self, sessions: impl SessionSource + 'static) -> Self {
        self.sessions = Box::new(sessions);
        self
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn build(self) -> Client {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()),
        };
        Client {
            inner: Arc::new(ClientInner {
                config: self.config,
                resolver: self.resolver,
                sessions: self.sessions,
                transport,
                blueprints: DashMap::new(),
            }),
        }
    }
}
