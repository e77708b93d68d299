//! Embedded diffs between collection snapshots.
//!
//! A diff record holds both sides of a record change, so it can be read by a
//! reviewer, applied to a third collection, or resolved back to either side.
//!
//! ## Entry point
//!
//! ```ignore
//! use ascript_core::ediff::{diff_collections, CollectionDiff};
//!
//! let diff = diff_collections(&old, &new, &PairingOptions::default(), &WordDiffer, &NoMerge);
//! let text_form = diff.to_collection();
//! assert_eq!(CollectionDiff::from_collection(&text_form).len(), diff.len());
//! ```
//!
//! ## Guarantees
//!
//! - **Recoverability**: both sides of every diff are recoverable exactly,
//!   including absent versus empty fields.
//! - **Reviewable fuzzy transitions**: fuzzy records are diffed against
//!   their previous fields, and [`resolve_diff_pair`] undoes that
//!   rearrangement.
//! - **Ordering**: diffs follow the new collection; removals sit next to
//!   their source-file neighbours.

pub mod embed;
pub mod engine;
pub mod model;

pub use embed::{embed_segments, parse_embedded, EDIFF_COMMENT_HEAD};
pub use engine::{
    diff_collections, diff_pair, diff_records, fuzzy_match_source_files, resolve_diff_pair,
    special_diff_pair, ResolvedPair, SOURCE_RENAME_MIN_SHARE,
};
pub use model::{
    CollectionDiff, DiffField, DiffRouting, EmbeddedDiffRecord, FieldDiff, StateDiff, FLAG_EDIFF,
    FLAG_EDIFF_NO_MATCH, FLAG_EDIFF_TO_CURRENT, FLAG_EDIFF_TO_NEW,
};
