//! Client construction for the etcd HTTP and gRPC transports.
//!
//! TLS itself is provided by the client crates; this module only loads the
//! supplied PEM material and wires it in.

use crate::config::EtcdTlsConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Failures while preparing a transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to read TLS material {path}: {source}")]
    Pem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TLS material: {0}")]
    Tls(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

fn load_pem(path: &Path) -> Result<Vec<u8>, TransportError> {
    std::fs::read(path).map_err(|source| TransportError::Pem {
        path: path.to_path_buf(),
        source,
    })
}

/// HTTP client for `/version` probes and the v2 keys API.
pub fn http_client(
    tls: Option<&EtcdTlsConfig>,
    timeout: Duration,
) -> Result<reqwest::Client, TransportError> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .use_rustls_tls();

    if let Some(tls) = tls {
        let ca = reqwest::Certificate::from_pem(&load_pem(&tls.ca_cert)?)
            .map_err(|e| TransportError::Tls(format!("CA certificate: {}", e)))?;

        // rustls wants certificate and key in one PEM bundle
        let mut bundle = load_pem(&tls.client_cert)?;
        bundle.push(b'\n');
        bundle.extend_from_slice(&load_pem(&tls.client_key)?);
        let identity = reqwest::Identity::from_pem(&bundle)
            .map_err(|e| TransportError::Tls(format!("client identity: {}", e)))?;

        builder = builder.add_root_certificate(ca).identity(identity);
    }

    builder
        .build()
        .map_err(|e| TransportError::Client(e.to_string()))
}

/// Connection options for the v3 gRPC client.
pub fn etcd_connect_options(
    tls: Option<&EtcdTlsConfig>,
    timeout: Duration,
) -> Result<etcd_client::ConnectOptions, TransportError> {
    let mut options = etcd_client::ConnectOptions::new()
        .with_timeout(timeout)
        .with_connect_timeout(timeout);

    if let Some(tls) = tls {
        let ca = etcd_client::Certificate::from_pem(load_pem(&tls.ca_cert)?);
        let identity = etcd_client::Identity::from_pem(
            load_pem(&tls.client_cert)?,
            load_pem(&tls.client_key)?,
        );
        options = options.with_tls(
            etcd_client::TlsOptions::new()
                .ca_certificate(ca)
                .identity(identity),
        );
    }

    Ok(options)
}
