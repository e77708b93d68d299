use crate::ascription::AscriptionKind;
use crate::model::Record;
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;

/// Ordering key of a history point in time.
///
/// The unascribed point stands for the present state of the record, so it
/// is newer than every dated point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Recency {
    Dated(DateTime<FixedOffset>),
    Present,
}

/// One reconstructed past state of a record plus who produced it and when.
///
/// Points sharing a snapshot (a review and the modification it reviewed)
/// share the same `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    /// `None` for the synthetic point of an unascribed record
    pub author: Option<String>,
    pub kind: AscriptionKind,
    pub tag: String,
    /// `None` only for the synthetic point
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub snapshot: Arc<Record>,
    pub fuzzy: bool,
    pub obsolete: bool,
    /// 1-based position in the assembled history
    pub position: u32,
}

impl HistoryPoint {
    pub fn is_ascribed(&self) -> bool {
        self.author.is_some()
    }

    /// Newest-first histories are non-increasing in this key.
    pub fn recency(&self) -> Recency {
        match self.timestamp {
            Some(timestamp) => Recency::Dated(timestamp),
            None => Recency::Present,
        }
    }

    pub fn is_modification(&self) -> bool {
        self.kind == AscriptionKind::Modification
    }

    pub fn is_review(&self) -> bool {
        self.kind == AscriptionKind::Review
    }

    pub fn by_user_in<'a, I>(&self, users: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        match &self.author {
            Some(author) => users.into_iter().any(|u| u == author),
            None => false,
        }
    }

    /// Unascribed point standing for the record in its present state
    pub(crate) fn unascribed(record: &Record) -> Self {
        Self {
            author: None,
            kind: AscriptionKind::Modification,
            tag: String::new(),
            timestamp: None,
            snapshot: Arc::new(record.clone()),
            fuzzy: record.is_fuzzy(),
            obsolete: record.obsolete,
            position: 0,
        }
    }
}
