//! Endpoint probing: protocol generation and transport security.

use crate::config::EtcdTlsConfig;
use crate::transport;
use crate::types::{EtcdEndpoint, ProtocolVersion};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors raised while probing an endpoint
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("malformed endpoint {0:?}: expected an http:// or https:// URL")]
    MalformedEndpoint(String),

    #[error("etcd endpoint {endpoint} is unreachable: {cause}")]
    UnreachableEndpoint { endpoint: String, cause: String },

    #[error("transport configuration error for {endpoint}: {cause}")]
    TransportConfig { endpoint: String, cause: String },

    #[error("etcd at {endpoint} reports unsupported server version {version}")]
    UnsupportedVersion { endpoint: String, version: String },
}

/// Body of etcd's `/version` endpoint
#[derive(Debug, Deserialize)]
struct VersionInfo {
    etcdserver: String,
    #[serde(default)]
    etcdcluster: Option<String>,
}

/// Validate the URL shape and return whether it asks for TLS.
pub fn parse_scheme(url: &str) -> Result<bool, ProbeError> {
    let malformed = || ProbeError::MalformedEndpoint(url.to_string());

    let (secure, rest) = if let Some(rest) = url.strip_prefix("https://") {
        (true, rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        (false, rest)
    } else {
        return Err(malformed());
    };

    if rest.trim_matches('/').is_empty() {
        return Err(malformed());
    }
    reqwest::Url::parse(url).map_err(|_| malformed())?;

    Ok(secure)
}

/// Map an etcd server version string to the protocol it speaks.
pub fn classify_version(server_version: &str) -> Option<ProtocolVersion> {
    let major: u32 = server_version.trim().split('.').next()?.parse().ok()?;
    match major {
        2 => Some(ProtocolVersion::V2),
        m if m >= 3 => Some(ProtocolVersion::V3),
        _ => None,
    }
}

/// Determine which etcd protocol `url` speaks and whether it needs TLS.
///
/// `https` endpoints require TLS material; it is ignored for `http`.
/// Idempotent; the only side effect is one `GET /version` bounded by
/// `timeout`.
#[instrument(skip(tls), fields(endpoint = %url))]
pub async fn probe(
    url: &str,
    tls: Option<&EtcdTlsConfig>,
    timeout: Duration,
) -> Result<EtcdEndpoint, ProbeError> {
    let secure = parse_scheme(url)?;
    let base = url.trim_end_matches('/');

    let tls = match (secure, tls) {
        (true, None) => {
            return Err(ProbeError::TransportConfig {
                endpoint: base.to_string(),
                cause: "https endpoint but no client certificate, key and CA supplied".to_string(),
            })
        }
        (true, Some(tls)) => Some(tls),
        (false, Some(_)) => {
            debug!("Ignoring TLS material for plain http endpoint");
            None
        }
        (false, None) => None,
    };

    let client = transport::http_client(tls, timeout).map_err(|e| ProbeError::TransportConfig {
        endpoint: base.to_string(),
        cause: e.to_string(),
    })?;

    let unreachable = |cause: String| ProbeError::UnreachableEndpoint {
        endpoint: base.to_string(),
        cause,
    };

    let response = client
        .get(format!("{}/version", base))
        .send()
        .await
        .map_err(|e| unreachable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(unreachable(format!("/version answered HTTP {}", status)));
    }

    let info: VersionInfo = response
        .json()
        .await
        .map_err(|e| unreachable(format!("unexpected /version response: {}", e)))?;

    let protocol = classify_version(&info.etcdserver).ok_or_else(|| ProbeError::UnsupportedVersion {
        endpoint: base.to_string(),
        version: info.etcdserver.clone(),
    })?;

    info!(
        server = %info.etcdserver,
        cluster = ?info.etcdcluster,
        protocol = %protocol,
        secure,
        "Probed etcd endpoint"
    );

    Ok(EtcdEndpoint::new(base, protocol, secure, tls.cloned()))
}
