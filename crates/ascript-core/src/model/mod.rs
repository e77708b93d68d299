pub mod collection;
pub mod record;

pub use collection::{insertion_position_in, Collection, SourceSynonyms};
pub use record::{IdFields, Key, Record, RecordInvariant, RecordState, SourceRef, FLAG_FUZZY};
