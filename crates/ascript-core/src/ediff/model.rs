//! Embedded diff types.
//!
//! An [`EmbeddedDiffRecord`] holds both sides of a record change as
//! per-field segment lists, so either side can be recovered from it.

use crate::model::{Key, Record};
use crate::textdiff::{new_text, old_text, Segment, SegmentKind};
use serde::{Deserialize, Serialize};

/// Flag of a diff that applies cleanly
pub const FLAG_EDIFF: &str = "ediff";
/// Flag of the old-to-current half of a split diff
pub const FLAG_EDIFF_TO_CURRENT: &str = "ediff-to-cur";
/// Flag of the current-to-new half of a split diff
pub const FLAG_EDIFF_TO_NEW: &str = "ediff-to-new";
/// Flag of a diff that matched nothing in the target
pub const FLAG_EDIFF_NO_MATCH: &str = "ediff-no-match";

/// Separator between flag names in the flags field text
pub(crate) const FLAG_LIST_SEPARATOR: &str = " ";

/// Part of a record a [`FieldDiff`] covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiffField {
    Context,
    Id,
    Plural,
    PreviousContext,
    PreviousId,
    PreviousPlural,
    Translation(usize),
    ManualComment(usize),
    /// Flags other than fuzzy, space separated
    Flags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: DiffField,
    pub segments: Vec<Segment>,
    /// Whether the field has a value on the old side
    pub old_present: bool,
    /// Whether the field has a value on the new side
    pub new_present: bool,
}

impl FieldDiff {
    pub fn old_value(&self) -> Option<String> {
        self.old_present.then(|| old_text(&self.segments))
    }

    pub fn new_value(&self) -> Option<String> {
        self.new_present.then(|| new_text(&self.segments))
    }

    pub fn is_change(&self) -> bool {
        self.old_present != self.new_present
            || self.segments.iter().any(|s| s.kind != SegmentKind::Equal)
    }
}

/// Fuzzy and obsolete state on both sides; an absent side counts as neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDiff {
    pub old_fuzzy: bool,
    pub new_fuzzy: bool,
    pub old_obsolete: bool,
    pub new_obsolete: bool,
}

impl StateDiff {
    pub fn is_change(&self) -> bool {
        self.old_fuzzy != self.new_fuzzy || self.old_obsolete != self.new_obsolete
    }
}

/// How a diff relates to the collection it was applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffRouting {
    /// Applies directly
    Clean,
    /// Old-to-current half of a split
    SplitToCurrent,
    /// Current-to-new half of a split; rejected on unembedding
    SplitUnresolved,
    /// Nothing in the target to apply to
    NoMatch,
}

impl DiffRouting {
    pub const ALL: [DiffRouting; 4] = [
        DiffRouting::Clean,
        DiffRouting::SplitToCurrent,
        DiffRouting::SplitUnresolved,
        DiffRouting::NoMatch,
    ];

    pub fn flag(self) -> &'static str {
        match self {
            DiffRouting::Clean => FLAG_EDIFF,
            DiffRouting::SplitToCurrent => FLAG_EDIFF_TO_CURRENT,
            DiffRouting::SplitUnresolved => FLAG_EDIFF_TO_NEW,
            DiffRouting::NoMatch => FLAG_EDIFF_NO_MATCH,
        }
    }

    pub fn from_flag(flag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.flag() == flag)
    }

    /// Whether the diff is accepted when unembedding
    pub fn is_accepted(self) -> bool {
        matches!(self, DiffRouting::Clean | DiffRouting::SplitToCurrent)
    }
}

/// Two-sided change of one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedDiffRecord {
    /// Record carrying the parts outside the diff (sources, auto comments,
    /// positions)
    pub base: Record,
    pub has_old: bool,
    pub has_new: bool,
    /// Field diffs, ordered by field
    pub fields: Vec<FieldDiff>,
    pub state: StateDiff,
    pub routing: DiffRouting,
}

#[derive(Clone, Copy)]
enum Side {
    Old,
    New,
}

impl EmbeddedDiffRecord {
    /// The old side as diffed.
    pub fn to_old(&self) -> Option<Record> {
        self.side(Side::Old)
    }

    /// The new side as diffed.
    pub fn to_new(&self) -> Option<Record> {
        self.side(Side::New)
    }

    /// Key of the new side, or of the old side when there is no new one.
    pub fn key(&self) -> Key {
        let side = if self.has_new { Side::New } else { Side::Old };
        let value = |field: DiffField| {
            self.field(field).and_then(|f| match side {
                Side::Old => f.old_value(),
                Side::New => f.new_value(),
            })
        };
        Key {
            context: value(DiffField::Context),
            id: value(DiffField::Id).unwrap_or_default(),
        }
    }

    pub fn field(&self, field: DiffField) -> Option<&FieldDiff> {
        self.fields.iter().find(|f| f.field == field)
    }

    /// Whether anything differs between the sides
    pub fn is_change(&self) -> bool {
        self.has_old != self.has_new
            || self.state.is_change()
            || self.fields.iter().any(FieldDiff::is_change)
    }

    pub fn with_routing(mut self, routing: DiffRouting) -> Self {
        self.routing = routing;
        self
    }

    fn side(&self, side: Side) -> Option<Record> {
        let (exists, fuzzy, obsolete) = match side {
            Side::Old => (self.has_old, self.state.old_fuzzy, self.state.old_obsolete),
            Side::New => (self.has_new, self.state.new_fuzzy, self.state.new_obsolete),
        };
        if !exists {
            return None;
        }

        let mut record = Record {
            sources: self.base.sources.clone(),
            auto_comments: self.base.auto_comments.clone(),
            entry: self.base.entry,
            line: self.base.line,
            ..Record::default()
        };
        for diff in &self.fields {
            let value = match side {
                Side::Old => diff.old_value(),
                Side::New => diff.new_value(),
            };
            let Some(value) = value else {
                continue;
            };
            match diff.field {
                DiffField::Context => record.context = Some(value),
                DiffField::Id => record.id = value,
                DiffField::Plural => record.plural = Some(value),
                DiffField::PreviousContext => record.previous_context = Some(value),
                DiffField::PreviousId => record.previous_id = Some(value),
                DiffField::PreviousPlural => record.previous_plural = Some(value),
                DiffField::Translation(_) => record.translations.push(value),
                DiffField::ManualComment(_) => record.manual_comments.push(value),
                DiffField::Flags => {
                    record.flags = value.split_whitespace().map(str::to_string).collect();
                }
            }
        }
        record.set_fuzzy(fuzzy);
        record.obsolete = obsolete;
        Some(record)
    }
}

/// Diffs between two collections, in the order of the new collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionDiff {
    pub name: String,
    pub diffs: Vec<EmbeddedDiffRecord>,
}

impl CollectionDiff {
    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EmbeddedDiffRecord> {
        self.diffs.iter()
    }
}
