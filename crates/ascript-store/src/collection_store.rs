//! JSON persistence of collections and their shadow collections

use crate::atomic::atomic_write;
use crate::errors::{decode_error, encode_error, io_error, outside_catalog_root, Result};
use ascript_core::{log_op_end, log_op_error, log_op_start};
use ascript_core::{AscriptionConfig, Collection};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Read a collection written by [`save_collection`].
///
/// # Errors
///
/// `ERR_IO` when the file cannot be read, `ERR_SERIALIZATION` when its
/// content is not a collection.
pub fn load_collection(path: &Path) -> Result<Collection> {
    let start = Instant::now();
    log_op_start!("load_collection", path = %path.display());

    let result = fs::read(path)
        .map_err(|e| io_error("read_collection", path, e))
        .and_then(|bytes| serde_json::from_slice::<Collection>(&bytes).map_err(|e| decode_error(path, e)));

    match &result {
        Ok(collection) => {
            log_op_end!(
                "load_collection",
                duration_ms = start.elapsed().as_millis() as u64,
                collection = collection.name(),
                records = collection.len()
            );
        }
        Err(err) => {
            log_op_error!(
                "load_collection",
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
        }
    }
    result
}

/// Write a collection as pretty JSON, replacing the file atomically.
///
/// # Errors
///
/// `ERR_SERIALIZATION` when encoding fails, `ERR_IO` when the file or its
/// directory cannot be written.
pub fn save_collection(collection: &Collection, path: &Path) -> Result<()> {
    let start = Instant::now();
    log_op_start!(
        "save_collection",
        collection = collection.name(),
        path = %path.display()
    );

    let result = serde_json::to_vec_pretty(collection)
        .map_err(|e| encode_error(collection.name(), e))
        .and_then(|bytes| atomic_write(path, &bytes));

    match &result {
        Ok(()) => {
            log_op_end!(
                "save_collection",
                duration_ms = start.elapsed().as_millis() as u64,
                records = collection.len()
            );
        }
        Err(err) => {
            log_op_error!(
                "save_collection",
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
        }
    }
    result
}

/// Location of the shadow collection for a catalog file.
///
/// # Errors
///
/// `ERR_PERSISTENCE` when the catalog is not under the catalog root.
pub fn shadow_path(config: &AscriptionConfig, catalog_path: &Path) -> Result<PathBuf> {
    config
        .ascription_path_for(catalog_path)
        .ok_or_else(|| outside_catalog_root(catalog_path))
}

/// Load the shadow collection of a catalog file.
///
/// # Errors
///
/// As [`shadow_path`] and [`load_collection`].
pub fn load_shadow(config: &AscriptionConfig, catalog_path: &Path) -> Result<Collection> {
    load_collection(&shadow_path(config, catalog_path)?)
}

/// Load the shadow collection of a catalog file, or start an empty one
/// named after the shadow path when nothing was ascribed yet.
///
/// # Errors
///
/// As [`load_shadow`], except that a missing file is not an error.
pub fn load_shadow_or_empty(config: &AscriptionConfig, catalog_path: &Path) -> Result<Collection> {
    let path = shadow_path(config, catalog_path)?;
    match fs::metadata(&path) {
        Ok(_) => load_collection(&path),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No shadow collection yet");
            Ok(Collection::new(path.display().to_string()))
        }
        Err(e) => Err(io_error("stat_shadow", &path, e)),
    }
}

/// Save the shadow collection of a catalog file.
///
/// # Errors
///
/// As [`shadow_path`] and [`save_collection`].
pub fn save_shadow(
    config: &AscriptionConfig,
    catalog_path: &Path,
    shadows: &Collection,
) -> Result<PathBuf> {
    let path = shadow_path(config, catalog_path)?;
    save_collection(shadows, &path)?;
    Ok(path)
}
