//! Endpoint discovery and keyspace statistics.

pub mod distro;
pub mod probe;
pub mod stats;

pub use distro::detect_distro;
pub use probe::{classify_version, parse_scheme, probe, ProbeError};
pub use stats::{count, count_keys_for, count_prefix};
