use bytes::Bytes;
use quickrpc::{
    net::{Transport, TransportError, WireRequest, WireResponse},
    Client, ClientConfig, FixedUri, RpcError,
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::time::Instant;
use uuid::Uuid;

quickrpc::contract! {
    pub trait Counter as CounterProxy {
        fn add(amount: u64) -> u64;
        fn clear();
    }
}

#[derive(Clone, Copy)]
enum Failure {
    /// Never answers; the pipeline's timeout has to fire.
    Hang,
    /// Fails straight away, like a refused connection.
    Refuse,
}

/// Fails the first `failures` attempts, then answers with `response`.
#[derive(Clone)]
struct Scripted {
    inner: Arc<ScriptedInner>,
}

struct ScriptedInner {
    failures: usize,
    failure: Failure,
    response: WireResponse,
    attempts: AtomicUsize,
    seen: Mutex<Vec<WireRequest>>,
}

impl Scripted {
    fn new(failures: usize, failure: Failure, status: u16, body: &'static str) -> Self {
        Self {
            inner: Arc::new(ScriptedInner {
                failures,
                failure,
                response: WireResponse {
                    status,
                    body: Bytes::from_static(body.as_bytes()),
                },
                attempts: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }),
        }
    }

    fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> WireRequest {
        self.inner.seen.lock().unwrap().last().cloned().unwrap()
    }
}

#[quickrpc::async_trait]
impl Transport for Scripted {
    async fn post(&self, request: &WireRequest) -> Result<WireResponse, TransportError> {
        let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.seen.lock().unwrap().push(request.clone());

        if attempt <= self.inner.failures {
            return match self.inner.failure {
                Failure::Hang => {
                    futures::future::pending::<()>().await;
                    Err(TransportError::Timeout)
                }
                Failure::Refuse => Err(TransportError::Unreachable("connection refused".into())),
            };
        }
        Ok(self.inner.response.clone())
    }
}

fn counter(transport: Scripted, config: ClientConfig, session: Uuid) -> CounterProxy {
    Client::builder(FixedUri("http://rpc.test/rpc/".into()))
        .config(config)
        .sessions(move || session)
        .transport(transport)
        .build()
        .create::<dyn Counter>()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn three_timeouts_then_success() {
    let transport = Scripted::new(3, Failure::Hang, 200, "42");
    let config = ClientConfig::default().with_timeout(Duration::from_secs(5));
    let counter = counter(transport.clone(), config, Uuid::nil());

    let started = Instant::now();
    assert_eq!(counter.add(40).await.unwrap(), 42);

    assert_eq!(transport.attempts(), 4);
    // Three timeouts plus three one-second pauses between attempts.
    assert!(started.elapsed() >= Duration::from_secs(3 * 5 + 3));
}

#[tokio::test(start_paused = true)]
async fn backoff_is_one_second_between_attempts() {
    let transport = Scripted::new(3, Failure::Refuse, 200, "7");
    let counter = counter(transport.clone(), ClientConfig::default(), Uuid::nil());

    let started = Instant::now();
    assert_eq!(counter.add(7).await.unwrap(), 7);
    assert_eq!(transport.attempts(), 4);

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_four_attempts() {
    let transport = Scripted::new(usize::MAX, Failure::Refuse, 200, "0");
    let counter = counter(transport.clone(), ClientConfig::default(), Uuid::nil());

    let err = counter.add(1).await.unwrap_err();
    assert!(matches!(err, RpcError::Transport { attempts: 4, .. }), "{err:?}");
    assert_eq!(transport.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn error_responses_are_never_retried() {
    let transport = Scripted::new(0, Failure::Refuse, 500, "out of range");
    let counter = counter(transport.clone(), ClientConfig::default(), Uuid::nil());

    let err = counter.add(u64::MAX).await.unwrap_err();
    assert_eq!(err.to_string(), "out of range");
    assert!(matches!(err, RpcError::Remote { status: 500, .. }));
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test]
async fn request_shape() {
    let session = Uuid::new_v4();
    let transport = Scripted::new(0, Failure::Refuse, 200, "3");
    let counter = counter(transport.clone(), ClientConfig::default(), session);

    counter.add(3).await.unwrap();
    let request = transport.last_request();
    let name = <dyn Counter as quickrpc::Contract>::info().name;
    assert_eq!(
        request.url,
        format!("http://rpc.test/rpc?name={name}&method=add")
    );
    assert_eq!(request.cookie, Some(format!("sessionId={session}")));

    let mut frame = quickrpc::codec::ArgFrame::decode(request.body.unwrap(), 1).unwrap();
    assert_eq!(frame.next::<u64>().unwrap(), 3);
}

#[tokio::test]
async fn zero_argument_calls_send_no_body() {
    // Void calls ignore whatever body a 2xx carries.
    let transport = Scripted::new(0, Failure::Refuse, 204, "ignored");
    let counter = counter(transport.clone(), ClientConfig::default(), Uuid::nil());

    counter.clear().await.unwrap();
    let request = transport.last_request();
    assert!(request.body.is_none());
    assert!(request.cookie.is_none());
    assert!(request.url.ends_with("&method=clear"));
}

#[tokio::test]
async fn undecodable_result_is_a_codec_error() {
    let transport = Scripted::new(0, Failure::Refuse, 200, "\"forty-two\"");
    let counter = counter(transport, ClientConfig::default(), Uuid::nil());

    let err = counter.add(1).await.unwrap_err();
    assert!(matches!(err, RpcError::Codec(_)), "{err:?}");
}
