use quickrpc::{net::server, Client, Dispatcher, FixedUri, RpcError, ServiceRegistry};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, task};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
pub struct HelloRequest {
    pub name: String,
    pub age: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HelloResponse {
    pub name: String,
    pub age: i32,
}

quickrpc::contract! {
    pub trait Demo as DemoProxy {
        fn hello(name: String, age: i32, request: HelloRequest) -> HelloResponse;
    }
}

pub struct DemoService;

#[quickrpc::async_trait]
impl Demo for DemoService {
    async fn hello(
        &self,
        name: String,
        age: i32,
        _request: HelloRequest,
    ) -> Result<HelloResponse, RpcError> {
        Ok(HelloResponse {
            name: format!("Hello {name}"),
            age: age + 1,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let registry = ServiceRegistry::builder()
        .register::<dyn Demo, _>(|| Box::new(DemoService))
        .build();
    let listener = TcpListener::bind("127.0.0.1:8000").await?;
    task::spawn(server::serve(listener, Dispatcher::new(registry)));

    let client = Client::new(FixedUri("http://localhost:8000/rpc".into()));
    let demo = client.create::<dyn Demo>()?;
    let request = HelloRequest {
        name: "Jörg".into(),
        age: 40,
    };
    let response = demo.hello("Jörg".into(), 40, request).await?;
    println!("{response:?}");
    Ok(())
}
