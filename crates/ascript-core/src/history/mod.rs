//! History assembly.
//!
//! Reconstructs the chronological history of a record from its shadow
//! record, following fuzzy-merge pivots back into the histories of the
//! records it was merged from.
//!
//! ## Entry point
//!
//! ```ignore
//! use ascript_core::history::{collect_history, HistoryOptions};
//!
//! let history = collect_history(&record, &shadows, &config, &HistoryOptions::default(), &WordDiffer);
//! assert_eq!(history[0].position, 1);
//! ```
//!
//! ## Guarantees
//!
//! - Points are ordered newest first by [`HistoryPoint::recency`],
//!   positions are dense from 1.
//! - The newest point always matches the record itself; an unascribed
//!   synthetic point is prepended when it would not.
//! - Pivot cycles end silently.

pub mod assemble;
pub mod point;
pub mod postprocess;

pub use assemble::{collect_history, single_history, HistoryOptions, MAX_PIVOT_DEPTH};
pub use point::{HistoryPoint, Recency};
pub use postprocess::{collapse_filtered, drop_merges, reduce_to_segments};
