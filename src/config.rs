//! Configuration for a snapshot run.
//!
//! Everything the core needs from the outside world (TLS material, object
//! storage credentials, timeouts) is collected here once, at the boundary, and
//! handed down explicitly. Library code never reads the process environment;
//! only [`Config::from_env`] does, and it is meant for binaries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Path to the etcd client certificate (PEM)
pub const ENV_ETCD_CLIENT_CERT: &str = "RS_ETCD_CLIENT_CERT";
/// Path to the etcd client private key (PEM)
pub const ENV_ETCD_CLIENT_KEY: &str = "RS_ETCD_CLIENT_KEY";
/// Path to the CA certificate that signed the etcd server certificate (PEM)
pub const ENV_ETCD_CA_CERT: &str = "RS_ETCD_CA_CERT";
/// Object storage access key
pub const ENV_ACCESS_KEY_ID: &str = "ACCESS_KEY_ID";
/// Object storage secret key
pub const ENV_SECRET_ACCESS_KEY: &str = "SECRET_ACCESS_KEY";
/// Object storage region
pub const ENV_BACKUP_REGION: &str = "RS_BACKUP_REGION";
/// Talk to object storage over plain http when set to a truthy value
pub const ENV_BACKUP_INSECURE: &str = "RS_BACKUP_INSECURE";
/// Create the bucket when it does not exist
pub const ENV_BACKUP_CREATE_BUCKET: &str = "RS_BACKUP_CREATE_BUCKET";
/// Per request timeout in seconds
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "RS_REQUEST_TIMEOUT_SECS";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("incomplete etcd TLS configuration: {0} is not set")]
    IncompleteTls(&'static str),

    #[error("missing object storage credential: {0}")]
    MissingCredential(&'static str),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// PEM files used to talk to a secure etcd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtcdTlsConfig {
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
    pub ca_cert: PathBuf,
}

impl EtcdTlsConfig {
    pub fn new(
        client_cert: impl Into<PathBuf>,
        client_key: impl Into<PathBuf>,
        ca_cert: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client_cert: client_cert.into(),
            client_key: client_key.into(),
            ca_cert: ca_cert.into(),
        }
    }
}

/// Object storage destination for published archives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStoreTarget {
    /// `host:port` or a full URL
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    /// Use https when `endpoint` carries no scheme
    pub use_tls: bool,
    /// Create `bucket` if it is missing instead of failing
    pub create_bucket: bool,
}

impl ObjectStoreTarget {
    /// Endpoint as a URL, adding a scheme when only `host:port` was given.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            return self.endpoint.clone();
        }
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}", scheme, self.endpoint)
    }
}

/// Settings for probing, walking and publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub etcd_tls: Option<EtcdTlsConfig>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
    pub object_store_tls: bool,
    pub create_bucket: bool,
    /// Bound for every network request
    pub request_timeout: Duration,
    /// Keys fetched per v3 range request
    pub page_size: i64,
    /// Keep the materialized tree next to the archive
    pub retain_staging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            etcd_tls: None,
            access_key_id: None,
            secret_access_key: None,
            region: "us-east-1".to_string(),
            object_store_tls: true,
            create_bucket: false,
            request_timeout: Duration::from_secs(10),
            page_size: 500,
            retain_staging: false,
        }
    }
}

impl Config {
    /// Build a configuration from environment-style key/value pairs.
    ///
    /// Unknown keys are ignored; empty values count as unset.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();

        let mut config = Config {
            etcd_tls: tls_from_vars(&vars)?,
            access_key_id: vars.get(ENV_ACCESS_KEY_ID).cloned(),
            secret_access_key: vars.get(ENV_SECRET_ACCESS_KEY).cloned(),
            ..Config::default()
        };

        if let Some(region) = vars.get(ENV_BACKUP_REGION) {
            config.region = region.clone();
        }
        if let Some(value) = vars.get(ENV_BACKUP_INSECURE) {
            config.object_store_tls = !parse_flag(ENV_BACKUP_INSECURE, value)?;
        }
        if let Some(value) = vars.get(ENV_BACKUP_CREATE_BUCKET) {
            config.create_bucket = parse_flag(ENV_BACKUP_CREATE_BUCKET, value)?;
        }
        if let Some(value) = vars.get(ENV_REQUEST_TIMEOUT_SECS) {
            let secs: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_REQUEST_TIMEOUT_SECS,
                value: value.clone(),
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: ENV_REQUEST_TIMEOUT_SECS,
                    value: value.clone(),
                });
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Read the process environment. Intended for binaries only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_pairs(std::env::vars())
    }

    pub fn with_etcd_tls(mut self, tls: EtcdTlsConfig) -> Self {
        self.etcd_tls = Some(tls);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_retain_staging(mut self, retain: bool) -> Self {
        self.retain_staging = retain;
        self
    }

    /// Combine the stored credentials with a destination.
    pub fn object_store_target(
        &self,
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<ObjectStoreTarget, ConfigError> {
        let access_key_id = self
            .access_key_id
            .clone()
            .ok_or(ConfigError::MissingCredential(ENV_ACCESS_KEY_ID))?;
        let secret_access_key = self
            .secret_access_key
            .clone()
            .ok_or(ConfigError::MissingCredential(ENV_SECRET_ACCESS_KEY))?;

        Ok(ObjectStoreTarget {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id,
            secret_access_key,
            region: self.region.clone(),
            use_tls: self.object_store_tls,
            create_bucket: self.create_bucket,
        })
    }
}

fn tls_from_vars(vars: &HashMap<String, String>) -> Result<Option<EtcdTlsConfig>, ConfigError> {
    let cert = vars.get(ENV_ETCD_CLIENT_CERT);
    let key = vars.get(ENV_ETCD_CLIENT_KEY);
    let ca = vars.get(ENV_ETCD_CA_CERT);

    match (cert, key, ca) {
        (None, None, None) => Ok(None),
        (Some(cert), Some(key), Some(ca)) => Ok(Some(EtcdTlsConfig::new(cert, key, ca))),
        (None, _, _) => Err(ConfigError::IncompleteTls(ENV_ETCD_CLIENT_CERT)),
        (_, None, _) => Err(ConfigError::IncompleteTls(ENV_ETCD_CLIENT_KEY)),
        (_, _, None) => Err(ConfigError::IncompleteTls(ENV_ETCD_CA_CERT)),
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
