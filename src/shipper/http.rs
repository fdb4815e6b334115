use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use rustls::{ClientConfig, RootCertStore};
use thiserror::Error;
use tracing::debug;

use super::{Exporter, ShipError};
use crate::config::Config;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to read CA certificate {path}: {source}")]
    CaRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no PEM certificates found in {0}")]
    CaEmpty(PathBuf),

    #[error("TLS configuration rejected: {0}")]
    Tls(#[from] rustls::Error),

    #[error("endpoint is not a valid URI: {0}")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),
}

/// Sends batches with one request each over a pooled HTTP/1.1 client.
///
/// The connector speaks both schemes; the endpoint URL decides which one is
/// used. TLS material is loaded once here so a bad CA path fails at startup
/// rather than on the first flush.
pub struct HttpExporter {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    uri: Uri,
    method: Method,
    timeout: Duration,
}

impl HttpExporter {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        // The CA bundle only matters for HTTPS.
        let ca = config.ca.as_deref().filter(|_| config.secure);
        let tls = tls_config(ca)?;

        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .build();

        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
            uri: config.endpoint.as_str().parse()?,
            method: config.method.clone(),
            timeout: config.timeout,
        })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    async fn send(&self, payload: Vec<u8>) -> Result<(), ShipError> {
        let req = Request::builder()
            .method(self.method.clone())
            .uri(self.uri.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, payload.len())
            .body(Full::new(Bytes::from(payload)))?;

        let resp = self.client.request(req).await?;
        let status = resp.status();
        debug!(status = status.as_u16(), "HTTP responded");

        // Read the body even on success so the connection can go back to the pool.
        let body = resp.into_body().collect().await?.to_bytes();
        if status.as_u16() >= 400 {
            return Err(ShipError::Rejected {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(())
    }
}

impl Exporter for HttpExporter {
    async fn export(&self, payload: Vec<u8>) -> Result<(), ShipError> {
        tokio::time::timeout(self.timeout, self.send(payload))
            .await
            .map_err(|_| ShipError::Timeout(self.timeout))?
    }
}

fn tls_config(ca: Option<&Path>) -> Result<ClientConfig, TransportError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store(ca)?)
        .with_no_client_auth())
}

/// A configured CA bundle replaces the built-in web PKI roots entirely.
fn root_store(ca: Option<&Path>) -> Result<RootCertStore, TransportError> {
    let mut roots = RootCertStore::empty();
    let Some(path) = ca else {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        return Ok(roots);
    };

    let read_error = |source| TransportError::CaRead {
        path: path.to_owned(),
        source,
    };
    let file = File::open(path).map_err(read_error)?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_error)?;

    if certs.is_empty() {
        return Err(TransportError::CaEmpty(path.to_owned()));
    }
    for cert in certs {
        roots.add(cert)?;
    }
    Ok(roots)
}
