//! Loading of the charging-history document.
//!
//! The whole export is one JSON array. It is read into memory at once, after
//! checking it against the size cap.

use std::path::Path;

use charge_core::error::{ChargeError, Result};
use serde_json::Value;
use tracing::debug;

// ── Public API ────────────────────────────────────────────────────────────────

/// Read and parse the document at `path`.
///
/// The size cap is checked against file metadata before anything is read.
pub fn load_document(path: &Path, max_bytes: u64) -> Result<Value> {
    let file_read = |source| ChargeError::FileRead {
        path: path.to_path_buf(),
        source,
    };

    let size = std::fs::metadata(path).map_err(file_read)?.len();
    if size > max_bytes {
        return Err(ChargeError::DocumentTooLarge {
            size,
            limit: max_bytes,
        });
    }

    let bytes = std::fs::read(path).map_err(file_read)?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    parse_document(&bytes, max_bytes)
}

/// Parse an in-memory upload.
pub fn parse_document(bytes: &[u8], max_bytes: u64) -> Result<Value> {
    let size = bytes.len() as u64;
    if size > max_bytes {
        return Err(ChargeError::DocumentTooLarge {
            size,
            limit: max_bytes,
        });
    }
    Ok(serde_json::from_slice(bytes)?)
}

/// The session records of a parsed document.
///
/// Anything but a top-level array is rejected.
pub fn records(document: &Value) -> Result<&[Value]> {
    match document {
        Value::Array(items) => Ok(items.as_slice()),
        other => Err(ChargeError::NotAnArray {
            found: json_type_name(other),
        }),
    }
}

/// Human-readable JSON type of `value`.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
