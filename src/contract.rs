use crate::{
    codec::{ArgFrame, CodecError},
    dispatcher::DispatchError,
    net::TransportError,
    proxy::ProxyCore,
};
use bytes::Bytes;
use futures::future::BoxFuture;
use std::fmt;
use thiserror::Error;

/// Static description of a contract, produced by [`contract!`](crate::contract).
#[derive(Debug)]
pub struct ContractInfo {
    /// Fully-qualified name, `module::path::Trait`.
    pub name: &'static str,
    pub methods: &'static [MethodInfo],
}

impl ContractInfo {
    /// Exact, case-sensitive lookup.
    pub fn method(&self, name: &str) -> Option<&'static MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }
}

impl fmt::Display for ContractInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Debug)]
pub struct MethodInfo {
    pub name: &'static str,
    /// Parameter types as written in the contract, for diagnostics.
    pub params: &'static [&'static str],
    pub returns_void: bool,
}

impl MethodInfo {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Implemented by `dyn Trait` for every trait declared with
/// [`contract!`](crate::contract). Nothing else implements it, so only
/// contract traits can be turned into proxies or registered as services.
pub trait Contract: Send + Sync + 'static {
    type Proxy: Send + Sync;

    fn info() -> &'static ContractInfo;

    fn proxy(core: ProxyCore) -> Self::Proxy;

    /// Decodes `args` for `method`, calls it on `service` and encodes the
    /// result. `Ok(None)` means the method returns nothing.
    fn dispatch<'a>(
        service: &'a Self,
        method: &'a str,
        args: ArgFrame,
    ) -> BoxFuture<'a, Result<Option<Bytes>, DispatchError>>;
}

/// Gives generated proxies' shared state back to callers.
pub trait Proxy {
    fn core(&self) -> &ProxyCore;
}

/// Error type of every contract method.
///
/// Services return [`RpcError::Application`] (usually via
/// [`RpcError::application`]) to fail a call; the message reaches the client
/// unchanged as [`RpcError::Remote`].
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Unable to resolve service uri for type '{contract}'")]
    UnresolvedUri { contract: &'static str },

    #[error("no response from server after {attempts} attempts: {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// Any non-2xx response. Displays as the server's message only.
    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("{method} takes {expected} arguments, got {actual}")]
    ArgumentCount {
        method: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{method} is not part of {contract}")]
    NoSuchMethod {
        contract: &'static str,
        method: String,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Application(String),
}

impl RpcError {
    pub fn application(message: impl fmt::Display) -> Self {
        Self::Application(message.to_string())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}
