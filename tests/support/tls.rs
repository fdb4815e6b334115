use std::io::Write;
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tempfile::NamedTempFile;
use tokio_rustls::TlsAcceptor;

/// A self-signed server identity plus its certificate written out as a PEM
/// bundle the backend can trust.
pub struct SelfSigned {
    pub acceptor: TlsAcceptor,
    pub ca_file: NamedTempFile,
}

pub fn self_signed(host: &str) -> SelfSigned {
    let generated = rcgen::generate_simple_self_signed(vec![host.to_owned()])
        .expect("failed to generate test certificate");
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(generated.key_pair.serialize_der()));

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![generated.cert.der().clone()], key)
        .expect("test certificate rejected");

    let mut ca_file = NamedTempFile::new().unwrap();
    ca_file.write_all(generated.cert.pem().as_bytes()).unwrap();

    SelfSigned {
        acceptor: TlsAcceptor::from(Arc::new(config)),
        ca_file,
    }
}
