//! ascript store - on-disk persistence for catalog and shadow collections
//!
//! Provides:
//! - Atomic temp-file-plus-rename writes
//! - JSON load/save of collections
//! - Shadow file resolution from the ascription configuration

pub mod atomic;
pub mod collection_store;
pub mod errors;

pub use collection_store::{
    load_collection, load_shadow, load_shadow_or_empty, save_collection, save_shadow,
    shadow_path,
};
pub use errors::Result;
