use crate::{
    codec::{ArgFrame, CodecError, CONTENT_TYPE},
    contract::RpcError,
    registry::{ServiceInstance, ServiceRegistry},
    session,
};
use bytes::Bytes;
use futures::FutureExt;
use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};
use thiserror::Error;
use tracing::{debug, debug_span, warn, Instrument};
use uuid::Uuid;

pub const STATUS_OK: u16 = 200;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("missing query parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("unknown contract '{0}'")]
    UnknownContract(String),

    #[error("no service implements '{0}'")]
    NoService(&'static str),

    #[error("no method named '{0}'")]
    NoSuchMethod(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Raised by the service itself; the message is passed through as is.
    #[error("{0}")]
    Application(String),

    #[error("service panicked: {0}")]
    Panicked(String),

    /// The HTTP layer could not read the request.
    #[error("unreadable request: {0}")]
    Request(String),
}

impl DispatchError {
    pub fn application(error: RpcError) -> Self {
        Self::Application(error.to_string())
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::UnknownContract(_) | Self::NoService(_) => STATUS_NOT_FOUND,
            _ => STATUS_INTERNAL_ERROR,
        }
    }
}

/// Decodes `payload` for `method`, calls it on `instance` and encodes the
/// result. `Ok(None)` is a void method's "no content".
pub async fn invoke(
    instance: &dyn ServiceInstance,
    method: &str,
    payload: Bytes,
) -> Result<Option<Bytes>, DispatchError> {
    let info = instance
        .contract()
        .method(method)
        .ok_or_else(|| DispatchError::NoSuchMethod(method.to_owned()))?;
    let args = ArgFrame::decode(payload, info.arity())?;
    instance.invoke(info.name, args).await
}

/// An inbound call as the HTTP layer sees it.
#[derive(Debug, Clone, Default)]
pub struct RpcRequest {
    pub name: Option<String>,
    pub method: Option<String>,
    pub body: Bytes,
    /// Raw `Cookie` header.
    pub cookie: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcResponse {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: Bytes,
}

impl RpcResponse {
    fn ok(body: Option<Bytes>) -> Self {
        match body {
            Some(body) => Self {
                status: STATUS_OK,
                content_type: Some(CONTENT_TYPE),
                body,
            },
            None => Self {
                status: STATUS_OK,
                content_type: None,
                body: Bytes::new(),
            },
        }
    }

    pub(crate) fn error(error: &DispatchError) -> Self {
        Self {
            status: error.status(),
            content_type: Some("text/plain; charset=utf-8"),
            body: Bytes::from(error.to_string()),
        }
    }
}

/// Turns [`RpcRequest`]s into [`RpcResponse`]s using the services in a
/// [`ServiceRegistry`].
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
}

impl Dispatcher {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        match self.call(request).await {
            Ok(body) => RpcResponse::ok(body),
            Err(error) => {
                debug!(%error, status = error.status(), "rpc call failed");
                RpcResponse::error(&error)
            }
        }
    }

    /// Resolves and runs one call. The caller's session id, if any, is
    /// visible to the service through [`session::current`].
    ///
    /// Services report failures by returning [`RpcError`]. A panic while
    /// activating or running the service is caught and answered like an
    /// error, so the caller gets a response and never retries the call.
    pub async fn call(&self, request: RpcRequest) -> Result<Option<Bytes>, DispatchError> {
        let name = non_blank(request.name).ok_or(DispatchError::MissingParameter("name"))?;
        let method = non_blank(request.method).ok_or(DispatchError::MissingParameter("method"))?;
        let session: Option<Uuid> = request.cookie.as_deref().and_then(session::parse_cookie);

        let contract = self
            .registry
            .resolve_contract(&name)
            .ok_or_else(|| DispatchError::UnknownContract(name.clone()))?;
        let activator = self
            .registry
            .find_service(contract)
            .ok_or(DispatchError::NoService(contract.name))?;

        let span = debug_span!("rpc", contract = contract.name, %method, ?session);
        let body = request.body;
        let run = async move {
            let instance = activator.activate();
            session::scope(session, invoke(instance.as_ref(), &method, body)).await
        };
        AssertUnwindSafe(run)
            .catch_unwind()
            .instrument(span)
            .await
            .unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                warn!(contract = contract.name, %message, "service panicked");
                Err(DispatchError::Panicked(message))
            })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
