//! Error handling for ascript-store
//!
//! Wraps ascript-core ExError with store-specific helpers

use ascript_core::errors::{ExError, ExErrorKind};
use std::path::Path;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create an IO error
pub fn io_error(operation: &str, path: &Path, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_entity_id(path.display().to_string())
        .with_message(err.to_string())
}

/// Create an error for a collection file that cannot be decoded
pub fn decode_error(path: &Path, err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op("load_collection")
        .with_entity_id(path.display().to_string())
        .with_message(err.to_string())
}

/// Create an error for a collection that cannot be encoded
pub fn encode_error(name: &str, err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op("save_collection")
        .with_entity_id(name.to_string())
        .with_message(err.to_string())
}

/// Create an error for a catalog that has no shadow location
pub fn outside_catalog_root(path: &Path) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("shadow_path")
        .with_entity_id(path.display().to_string())
        .with_message(format!(
            "Catalog {} is not under the configured catalog root",
            path.display()
        ))
}
