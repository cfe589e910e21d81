//! HTTP remote procedure calls through contract traits.
//!
//! Declare a contract with [`contract!`], implement it on the server and
//! register the implementation in a [`ServiceRegistry`], then call it from a
//! client through the proxy [`Client::create`] hands out:
//!
//! ```ignore
//! quickrpc::contract! {
//!     pub trait Greeter as GreeterProxy {
//!         fn hello(name: String) -> String;
//!     }
//! }
//!
//! let client = Client::new(FixedUri("http://localhost:8000/rpc".into()));
//! let greeter = client.create::<dyn Greeter>()?;
//! let greeting = greeter.hello("world".into()).await?;
//! ```

mod macros;

pub mod client;
pub mod codec;
pub mod contract;
pub mod dispatcher;
pub mod net;
pub mod proxy;
pub mod registry;
pub mod session;

pub use client::{Client, ClientBuilder, ClientConfig, FixedUri, UriResolver};
pub use contract::{Contract, ContractInfo, MethodInfo, Proxy, RpcError};
pub use dispatcher::{DispatchError, Dispatcher, RpcRequest, RpcResponse};
pub use proxy::{Blueprint, ProxyCore};
pub use registry::ServiceRegistry;
pub use session::SessionSource;

// Used by `contract!` expansions.
pub use async_trait::async_trait;
pub use bytes::Bytes;
pub use futures::future::BoxFuture;
