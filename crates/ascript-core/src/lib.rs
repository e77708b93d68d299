//! ascript core - authorship history, embedded diffs and patching for
//! translation catalogs
//!
//! This crate provides the in-memory engine behind ascription tracking,
//! including:
//! - Record and collection models for catalog entries
//! - The field-history codec used by shadow records
//! - History assembly with fuzzy-merge pivoting
//! - Selector algebra over records and their histories
//! - Cross-snapshot record pairing
//! - Embedded diffs and the patch engine that re-applies them
//!
//! Persistence lives in `ascript-store`; this crate does no file I/O beyond
//! reading the configuration file.

pub mod ascription;
pub mod codec;
pub mod config;
pub mod ediff;
pub mod errors;
pub mod history;
pub mod logging_facility;
pub mod merge;
pub mod model;
pub mod pairing;
pub mod patch;
pub mod selector;
pub mod textdiff;

// Re-export commonly used types
pub use ascription::{ascribe_modification, ascribe_review, AscriptionKind};
pub use config::{AscriptionConfig, UserData};
pub use ediff::{diff_collections, CollectionDiff, EmbeddedDiffRecord};
pub use errors::{AscriptError, ExError, ExErrorKind, Result};
pub use history::{collect_history, HistoryOptions, HistoryPoint};
pub use merge::{FuzzyTemplateMerger, NoMerge, TemplateMerger};
pub use model::{Collection, Key, Record};
pub use pairing::{pair_collections, PairingOptions, RecordPair};
pub use patch::{patch_collection, unembed_collection, PatchMode, PatchOptions, PatchReport};
pub use selector::{compile, CompiledSelector, SelectorCache, SelectorContext, SelectorRegistry, SelectorResult};
pub use textdiff::{TextDiffer, WordDiffer};
