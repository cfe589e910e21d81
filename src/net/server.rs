use crate::dispatcher::{DispatchError, Dispatcher, RpcRequest, RpcResponse};
use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, QueryRejection},
        DefaultBodyLimit, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use std::io;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Path the RPC endpoint is mounted on by [`router`].
pub const RPC_PATH: &str = "/rpc";

/// A router with the RPC endpoint at [`RPC_PATH`]. Merge or nest it into an
/// application router as needed.
pub fn router(dispatcher: Dispatcher) -> Router {
    router_at(RPC_PATH, dispatcher)
}

/// Like [`router`], mounted on `path`.
///
/// Request bodies are not size-limited. Add a
/// [`DefaultBodyLimit`] layer on top to cap them.
pub fn router_at(path: &str, dispatcher: Dispatcher) -> Router {
    Router::new()
        .route(path, post(handle_call))
        .layer(DefaultBodyLimit::disable())
        .with_state(dispatcher)
}

/// Serves [`router`] on `listener` until the process exits.
pub async fn serve(listener: TcpListener, dispatcher: Dispatcher) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, path = RPC_PATH, "serving rpc");
    }
    axum::serve(listener, router(dispatcher)).await
}

async fn handle_call(
    State(dispatcher): State<Dispatcher>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    // Rejections are answered by the dispatcher, never by axum, so every
    // failure carries one of its status codes.
    let pairs = match query {
        Ok(Query(pairs)) => pairs,
        Err(rejection) => return rejected(rejection.body_text()),
    };
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection.body_text()),
    };

    let cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");

    let request = RpcRequest {
        name: first_value(&pairs, "name"),
        method: first_value(&pairs, "method"),
        body,
        cookie: (!cookie.is_empty()).then_some(cookie),
    };
    dispatcher.handle(request).await.into_response()
}

/// Repeated keys are allowed; the first occurrence wins.
fn first_value(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

fn rejected(reason: String) -> Response {
    let error = DispatchError::Request(reason);
    debug!(%error, "rpc request rejected");
    RpcResponse::error(&error).into_response()
}

impl IntoResponse for RpcResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        match self.content_type {
            Some(content_type) => {
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
            None => {
                response.headers_mut().remove(header::CONTENT_TYPE);
            }
        }
        response
    }
}
