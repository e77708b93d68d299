//! Diff computation between records and between collections.

use crate::ediff::model::{
    CollectionDiff, DiffField, DiffRouting, EmbeddedDiffRecord, FieldDiff, StateDiff,
    FLAG_LIST_SEPARATOR,
};
use crate::merge::TemplateMerger;
use crate::model::{insertion_position_in, Collection, Record, SourceSynonyms, FLAG_FUZZY};
use crate::pairing::{pair_collections, PairingOptions};
use crate::textdiff::TextDiffer;
use crate::{log_op_end, log_op_start};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

/// Minimum share of moved records for two source files to count as renames
pub const SOURCE_RENAME_MIN_SHARE: f64 = 0.7;

/// Logical and as-diffed sides of an embedded diff
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPair {
    pub old: Option<Record>,
    pub new: Option<Record>,
    pub old_special: Option<Record>,
    pub new_special: Option<Record>,
}

/// Diff two records field by field, as given. `None` when both are absent.
pub fn diff_records(
    old: Option<&Record>,
    new: Option<&Record>,
    differ: &dyn TextDiffer,
) -> Option<EmbeddedDiffRecord> {
    let base = new.or(old)?.clone();
    let mut fields = Vec::new();

    let mut push = |field: DiffField, a: Option<&str>, b: Option<&str>| {
        if a.is_none() && b.is_none() {
            return;
        }
        fields.push(FieldDiff {
            field,
            segments: differ.diff(a.unwrap_or(""), b.unwrap_or("")),
            old_present: a.is_some(),
            new_present: b.is_some(),
        });
    };

    let scalar = |record: Option<&Record>, field: DiffField| -> Option<String> {
        let r = record?;
        match field {
            DiffField::Context => r.context.clone(),
            DiffField::Id => Some(r.id.clone()),
            DiffField::Plural => r.plural.clone(),
            DiffField::PreviousContext => r.previous_context.clone(),
            DiffField::PreviousId => r.previous_id.clone(),
            DiffField::PreviousPlural => r.previous_plural.clone(),
            DiffField::Flags => {
                let flags: Vec<&str> = r
                    .flags
                    .iter()
                    .map(String::as_str)
                    .filter(|f| *f != FLAG_FUZZY)
                    .collect();
                (!flags.is_empty()).then(|| flags.join(FLAG_LIST_SEPARATOR))
            }
            DiffField::Translation(_) | DiffField::ManualComment(_) => None,
        }
    };

    for field in [
        DiffField::Context,
        DiffField::Id,
        DiffField::Plural,
        DiffField::PreviousContext,
        DiffField::PreviousId,
        DiffField::PreviousPlural,
    ] {
        let (a, b) = (scalar(old, field), scalar(new, field));
        push(field, a.as_deref(), b.as_deref());
    }

    let empty: &[String] = &[];
    let old_translations = old.map_or(empty, |r| r.translations.as_slice());
    let new_translations = new.map_or(empty, |r| r.translations.as_slice());
    for i in 0..old_translations.len().max(new_translations.len()) {
        push(
            DiffField::Translation(i),
            old_translations.get(i).map(String::as_str),
            new_translations.get(i).map(String::as_str),
        );
    }

    let old_comments = old.map_or(empty, |r| r.manual_comments.as_slice());
    let new_comments = new.map_or(empty, |r| r.manual_comments.as_slice());
    for i in 0..old_comments.len().max(new_comments.len()) {
        push(
            DiffField::ManualComment(i),
            old_comments.get(i).map(String::as_str),
            new_comments.get(i).map(String::as_str),
        );
    }

    let (a, b) = (scalar(old, DiffField::Flags), scalar(new, DiffField::Flags));
    push(DiffField::Flags, a.as_deref(), b.as_deref());

    Some(EmbeddedDiffRecord {
        base,
        has_old: old.is_some(),
        has_new: new.is_some(),
        fields,
        state: StateDiff {
            old_fuzzy: old.is_some_and(Record::is_fuzzy),
            new_fuzzy: new.is_some_and(Record::is_fuzzy),
            old_obsolete: old.is_some_and(|r| r.obsolete),
            new_obsolete: new.is_some_and(|r| r.obsolete),
        },
        routing: DiffRouting::Clean,
    })
}

/// Rearrange current and previous fields across a fuzzy transition so the
/// diff shows the change a translator actually has to review.
///
/// - fuzzy to non-fuzzy, same current fields: the old side shows its
///   previous fields as current
/// - fuzzy to non-fuzzy, other current fields: additionally the new side
///   takes the old current fields as previous
/// - non-fuzzy to fuzzy, new previous equal to old current: the new side
///   drops its previous fields
/// - non-fuzzy to fuzzy otherwise: the old side takes the new previous
///   fields, the new side its own current fields as previous
pub fn special_diff_pair(
    old: Option<&Record>,
    new: Option<&Record>,
) -> (Option<Record>, Option<Record>) {
    let (Some(old), Some(new)) = (old, new) else {
        return (old.cloned(), new.cloned());
    };
    let mut old_s = old.clone();
    let mut new_s = new.clone();

    if old.is_fuzzy() && old.has_previous() && !new.is_fuzzy() {
        old_s.set_current_ids(old.previous_ids());
        if old.current_ids() == new.current_ids() {
            old_s.clear_previous();
        } else {
            new_s.set_previous_ids(old.current_ids());
        }
    } else if !old.is_fuzzy() && new.is_fuzzy() && new.has_previous() {
        if old.current_ids() == new.previous_ids() {
            new_s.clear_previous();
        } else {
            old_s.set_previous_ids(new.previous_ids());
            new_s.set_previous_ids(new.current_ids());
        }
    }
    (Some(old_s), Some(new_s))
}

/// Recover the logical old and new records from a diff, undoing
/// [`special_diff_pair`].
pub fn resolve_diff_pair(diff: &EmbeddedDiffRecord) -> ResolvedPair {
    let old_special = diff.to_old();
    let new_special = diff.to_new();
    let (mut old, mut new) = (old_special.clone(), new_special.clone());

    if let (Some(os), Some(ns)) = (&old_special, &new_special) {
        if os.is_fuzzy() && !ns.is_fuzzy() {
            if !ns.has_previous() && os.current_ids() != ns.current_ids() {
                let mut o = os.clone();
                o.set_previous_ids(os.current_ids());
                o.set_current_ids(ns.current_ids());
                old = Some(o);
            } else if ns.has_previous() {
                let mut o = os.clone();
                o.set_current_ids(ns.previous_ids());
                let mut n = ns.clone();
                n.clear_previous();
                old = Some(o);
                new = Some(n);
            }
        } else if !os.is_fuzzy() && ns.is_fuzzy() {
            if !os.has_previous() && os.current_ids() != ns.current_ids() {
                let mut n = ns.clone();
                n.set_previous_ids(os.current_ids());
                new = Some(n);
            } else if os.has_previous() {
                let mut o = os.clone();
                o.clear_previous();
                let mut n = ns.clone();
                n.set_previous_ids(os.previous_ids());
                old = Some(o);
                new = Some(n);
            }
        }
    }

    ResolvedPair {
        old,
        new,
        old_special,
        new_special,
    }
}

/// Diff a pair of records, skipping pairs equal in their invariant parts.
pub fn diff_pair(
    old: Option<&Record>,
    new: Option<&Record>,
    differ: &dyn TextDiffer,
) -> Option<EmbeddedDiffRecord> {
    if let (Some(a), Some(b)) = (old, new) {
        if a.same_invariant(b) {
            return None;
        }
    }
    let (old_s, new_s) = special_diff_pair(old, new);
    diff_records(old_s.as_ref(), new_s.as_ref(), differ)
}

/// Guess which source files of `collection` were renamed to or from files
/// of `other`, by where records with equal keys are sourced from. The
/// result is symmetric.
pub fn fuzzy_match_source_files(
    collection: &Collection,
    other: &Collection,
    min_share: f64,
) -> SourceSynonyms {
    let own_files: HashSet<&str> = collection
        .iter()
        .flat_map(|r| r.sources.iter().map(|s| s.file.as_str()))
        .collect();

    let mut file_counts: BTreeMap<&str, f64> = BTreeMap::new();
    let mut cross_counts: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
    for record in collection {
        let Some(counterpart) = other.get(&record.key()) else {
            continue;
        };
        if record.sources.is_empty() {
            continue;
        }
        for src in &record.sources {
            *file_counts.entry(src.file.as_str()).or_default() += 1.0 / record.sources.len() as f64;
            let crossed = cross_counts.entry(src.file.as_str()).or_default();
            let mut counted: HashSet<&str> = HashSet::new();
            for osrc in &counterpart.sources {
                let ofile = osrc.file.as_str();
                if !own_files.contains(ofile) && counted.insert(ofile) {
                    *crossed.entry(ofile).or_default() += 1.0 / counterpart.sources.len() as f64;
                }
            }
        }
    }

    let mut synonyms = SourceSynonyms::new();
    for (file, count) in &file_counts {
        let Some(crossed) = cross_counts.get(file) else {
            continue;
        };
        let matches: Vec<&str> = crossed
            .iter()
            .filter(|(_, c)| **c / (count + 1.0) >= min_share)
            .map(|(f, _)| *f)
            .collect();
        if matches.is_empty() {
            continue;
        }
        let group: Vec<&str> = std::iter::once(*file).chain(matches).collect();
        for member in &group {
            let entry = synonyms.entry(member.to_string()).or_default();
            for syn in &group {
                if syn != member && !entry.iter().any(|e| e == syn) {
                    entry.push(syn.to_string());
                }
            }
        }
    }
    synonyms
}

/// Diff two snapshots of a collection.
///
/// Diffs of records present in `new` follow the order of `new`. Diffs of
/// removed records are placed after the diff of the nearest record from the
/// same (or a renamed) source file.
pub fn diff_collections(
    old: &Collection,
    new: &Collection,
    options: &PairingOptions,
    differ: &dyn TextDiffer,
    merger: &dyn TemplateMerger,
) -> CollectionDiff {
    let start = Instant::now();
    log_op_start!("diff_collections", collection = new.name());

    let pairs = pair_collections(old, new, options, merger);
    let (mut with_new, old_only): (Vec<_>, Vec<_>) = pairs.into_iter().partition(|p| p.new.is_some());
    with_new.sort_by_key(|p| {
        p.new
            .as_ref()
            .and_then(|r| new.position(&r.key()))
            .unwrap_or(usize::MAX)
    });

    let mut diffs: Vec<EmbeddedDiffRecord> = with_new
        .iter()
        .filter_map(|p| diff_pair(p.old.as_ref(), p.new.as_ref(), differ))
        .collect();

    if !old_only.is_empty() {
        let synonyms = fuzzy_match_source_files(new, old, SOURCE_RENAME_MIN_SHARE);
        for pair in &old_only {
            let Some(diff) = diff_pair(pair.old.as_ref(), None, differ) else {
                continue;
            };
            let bases: Vec<Record> = diffs.iter().map(|d| d.base.clone()).collect();
            let pos = insertion_position_in(&bases, &diff.base, &synonyms);
            diffs.insert(pos, diff);
        }
    }

    log_op_end!(
        "diff_collections",
        duration_ms = start.elapsed().as_millis() as u64,
        diff_len = diffs.len()
    );
    CollectionDiff {
        name: new.name().to_string(),
        diffs,
    }
}
