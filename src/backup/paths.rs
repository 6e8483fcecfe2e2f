//! Mapping of etcd keys onto a directory tree.
//!
//! Every key becomes a directory; its value is stored in a file named
//! [`CONTENT_FILE`] inside that directory. This keeps a key and the keys
//! nested below it apart even when a flat v3 keyspace uses the same string as
//! both a value and a prefix.
//!
//! Key components are escaped one by one, percent style:
//!
//! * `%` and characters that are unsafe in file names (`:`, `\`, `*`, `?`,
//!   `"`, `<`, `>`, `|`, control characters) become `%XX`;
//! * an empty component (from `//` or a trailing `/`) becomes a lone `%`;
//! * components that are `.`, `..` or [`CONTENT_FILE`] get their first byte
//!   encoded.
//!
//! The escaping is reversible with [`unescape_component`], so distinct keys
//! never share a path.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// File holding the value of a key inside the key's directory
pub const CONTENT_FILE: &str = "content";

/// Encoding of an empty key component
const EMPTY_COMPONENT: &str = "%";

/// Errors of the path mapper
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Not a store key. Skipped by the materializer.
    #[error("key {0:?} is not valid")]
    InvalidKey(String),

    #[error("malformed escaped path component {0:?}")]
    MalformedComponent(String),
}

/// Location of a key below a working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPath {
    /// Directory standing for the key
    pub dir: PathBuf,
    /// File receiving the key's value
    pub file: PathBuf,
    /// The key was `/`, which is written to a sentinel the caller removes
    pub is_root: bool,
}

fn needs_escape(c: char) -> bool {
    matches!(c, '%' | ':' | '\\' | '*' | '?' | '"' | '<' | '>' | '|' | '/') || c.is_control()
}

fn push_escaped(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    for byte in c.encode_utf8(&mut buf).bytes() {
        out.push_str(&format!("%{:02X}", byte));
    }
}

/// Escape one key component into a safe file name.
pub fn escape_component(component: &str) -> String {
    if component.is_empty() {
        return EMPTY_COMPONENT.to_string();
    }

    let reserved = matches!(component, "." | ".." | CONTENT_FILE);
    let mut out = String::with_capacity(component.len() + 2);
    for (idx, c) in component.chars().enumerate() {
        if needs_escape(c) || (reserved && idx == 0) {
            push_escaped(&mut out, c);
        } else {
            out.push(c);
        }
    }
    out
}

/// Invert [`escape_component`].
pub fn unescape_component(escaped: &str) -> Result<String, PathError> {
    if escaped == EMPTY_COMPONENT {
        return Ok(String::new());
    }

    let malformed = || PathError::MalformedComponent(escaped.to_string());
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            let hex = escaped.get(idx + 1..idx + 3).ok_or_else(malformed)?;
            out.push(u8::from_str_radix(hex, 16).map_err(|_| malformed())?);
            idx += 3;
        } else {
            out.push(bytes[idx]);
            idx += 1;
        }
    }
    String::from_utf8(out).map_err(|_| malformed())
}

/// Relative directory for `key`, or `None` for the root key `/`.
pub fn relative_key_dir(key: &str) -> Result<Option<PathBuf>, PathError> {
    let rest = key
        .strip_prefix('/')
        .ok_or_else(|| PathError::InvalidKey(key.to_string()))?;
    if rest.is_empty() {
        return Ok(None);
    }
    Ok(Some(rest.split('/').map(escape_component).collect()))
}

/// Map `key` to its directory and value file below `work_dir`.
///
/// Empty keys and keys not starting with `/` are rejected with
/// [`PathError::InvalidKey`]. The root key maps to `work_dir/content`, a
/// sentinel outside every per-key directory.
pub fn map_to_path(key: &str, work_dir: &Path) -> Result<MappedPath, PathError> {
    if key.is_empty() {
        return Err(PathError::InvalidKey(key.to_string()));
    }

    match relative_key_dir(key)? {
        Some(relative) => {
            let dir = work_dir.join(relative);
            let file = dir.join(CONTENT_FILE);
            Ok(MappedPath {
                dir,
                file,
                is_root: false,
            })
        }
        None => Ok(MappedPath {
            dir: work_dir.to_path_buf(),
            file: root_sentinel(work_dir),
            is_root: true,
        }),
    }
}

/// Where the value of the root key `/` ends up.
pub fn root_sentinel(work_dir: &Path) -> PathBuf {
    work_dir.join(CONTENT_FILE)
}

/// Rebuild the key a relative key directory was mapped from.
pub fn key_from_relative(relative: &Path) -> Result<String, PathError> {
    let mut key = String::new();
    for component in relative.iter() {
        let component = component
            .to_str()
            .ok_or_else(|| PathError::MalformedComponent(component.to_string_lossy().into_owned()))?;
        key.push('/');
        key.push_str(&unescape_component(component)?);
    }
    if key.is_empty() {
        key.push('/');
    }
    Ok(key)
}
