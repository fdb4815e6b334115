use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// One request as seen by the collector.
#[derive(Debug, Clone)]
pub struct Collected {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl Collected {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("collector received invalid JSON")
    }
}

/// A local HTTP endpoint that records every request and answers with a
/// configurable status code.
#[derive(Clone)]
pub struct Collector {
    pub port: u16,
    store: Arc<Mutex<Vec<Collected>>>,
    status: Arc<AtomicU16>,
}

impl Collector {
    pub async fn start() -> Self {
        Self::listen(None).await
    }

    /// Like [`Collector::start`], but every connection must complete a TLS
    /// handshake through `acceptor` first.
    pub async fn start_tls(acceptor: TlsAcceptor) -> Self {
        Self::listen(Some(acceptor)).await
    }

    async fn listen(tls: Option<TlsAcceptor>) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("failed to bind collector listener");
        let port = listener.local_addr().unwrap().port();
        let collector = Self {
            port,
            store: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(AtomicU16::new(200)),
        };

        let accept = collector.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let collector = accept.clone();
                let tls = tls.clone();
                tokio::spawn(async move {
                    match tls {
                        Some(acceptor) => {
                            if let Ok(stream) = acceptor.accept(stream).await {
                                collector.serve(stream).await;
                            }
                        }
                        None => collector.serve(stream).await,
                    }
                });
            }
        });

        collector
    }

    async fn serve<S>(self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let service = service_fn(move |req| {
            let collector = self.clone();
            async move { collector.handle(req).await }
        });
        let _ = http1::Builder::new()
            .serve_connection(TokioIo::new(stream), service)
            .await;
    }

    /// Answer subsequent requests with `status`.
    pub fn respond_with(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<Collected> {
        self.store.lock().unwrap().clone()
    }

    /// Wait until at least `min_expected` requests arrived or `timeout` passes.
    pub async fn wait_for(&self, min_expected: usize, timeout: Duration) -> Vec<Collected> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let current = self.requests();
            if current.len() >= min_expected || tokio::time::Instant::now() >= deadline {
                return current;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn handle(
        &self,
        req: Request<hyper::body::Incoming>,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let method = req.method().to_string();
        let path = req.uri().path().to_owned();
        let query = req.uri().query().map(str::to_owned);
        let headers = req
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect();
        let body = req
            .into_body()
            .collect()
            .await
            .map(|c| c.to_bytes())
            .unwrap_or_default();

        self.store.lock().unwrap().push(Collected {
            method,
            path,
            query,
            headers,
            body,
        });

        let status = StatusCode::from_u16(self.status.load(Ordering::SeqCst))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = if status.is_success() {
            Bytes::new()
        } else {
            Bytes::from_static(b"collector unavailable")
        };
        Ok(Response::builder()
            .status(status)
            .body(Full::new(body))
            .unwrap())
    }
}

/// Bind to port 0 and return the OS-assigned port.
/// The listener is dropped, so nothing is accepting on it afterwards.
pub async fn closed_port() -> u16 {
    tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}
