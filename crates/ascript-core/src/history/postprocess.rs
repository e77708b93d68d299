//! Optional history reductions, applied after assembly.

use super::point::HistoryPoint;
use crate::model::Record;
use crate::pairing::merge_modified;
use crate::textdiff::{select_segments, AddRem, TextDiffer};
use std::sync::Arc;

/// Drop modification points that are pure template merges of the point
/// right before them. Repeated until nothing more drops; the oldest point
/// is always kept.
pub fn drop_merges(mut history: Vec<HistoryPoint>) -> Vec<HistoryPoint> {
    loop {
        let before = history.len();
        let mut kept = Vec::with_capacity(before);
        for (i, point) in history.iter().enumerate() {
            let pure_merge = point.is_modification()
                && history
                    .get(i + 1)
                    .is_some_and(|older| merge_modified(&older.snapshot, &point.snapshot));
            if !pure_merge {
                kept.push(point.clone());
            }
        }
        if kept.len() == before {
            return kept;
        }
        history = kept;
    }
}

/// Collapse runs of modifications whose translations are equal after
/// `filter`, keeping the earliest point of each run.
pub fn collapse_filtered(history: Vec<HistoryPoint>, filter: &dyn Fn(&str) -> String) -> Vec<HistoryPoint> {
    let filtered = |record: &Record| {
        let mut record = record.clone();
        record.translations = record.translations.iter().map(|t| filter(t)).collect();
        record
    };

    let mut kept: Vec<HistoryPoint> = Vec::with_capacity(history.len());
    let mut last_modification: Option<Record> = None;
    for point in history.into_iter().rev() {
        if !point.is_modification() {
            kept.push(point);
            continue;
        }
        let current = filtered(&point.snapshot);
        let same = last_modification
            .as_ref()
            .is_some_and(|last| last.same_invariant(&current));
        if !same {
            last_modification = Some(current);
            kept.push(point);
        }
    }
    kept.reverse();
    kept
}

/// Replace each modification's translations and manual comments with the
/// segments of the given kind from its diff against the next older
/// modification. The oldest modification is left intact.
pub fn reduce_to_segments(
    history: &mut [HistoryPoint],
    mode: AddRem,
    separator: &str,
    differ: &dyn TextDiffer,
) {
    let modifications: Vec<usize> = history
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_modification())
        .map(|(i, _)| i)
        .collect();

    // Newest first: the older side of each pair is still unreduced.
    for pair in modifications.windows(2) {
        let (newer, older) = (pair[0], pair[1]);
        let older_snapshot = Arc::clone(&history[older].snapshot);
        let reduced = Arc::make_mut(&mut history[newer].snapshot);
        reduce_against(&older_snapshot, reduced, mode, separator, differ);
    }
}

/// Reduce the translations and manual comments of `newer` to the segments
/// of the given kind from its diff against `older`.
pub(crate) fn reduce_against(
    older: &Record,
    newer: &mut Record,
    mode: AddRem,
    separator: &str,
    differ: &dyn TextDiffer,
) {
    newer.translations = reduce_texts(&older.translations, &newer.translations, mode, separator, differ);
    newer.manual_comments = reduce_texts(
        &older.manual_comments,
        &newer.manual_comments,
        mode,
        separator,
        differ,
    );
}

fn reduce_texts(
    old: &[String],
    new: &[String],
    mode: AddRem,
    separator: &str,
    differ: &dyn TextDiffer,
) -> Vec<String> {
    (0..old.len().max(new.len()))
        .map(|i| {
            let a = old.get(i).map_or("", String::as_str);
            let b = new.get(i).map_or("", String::as_str);
            select_segments(&differ.diff(a, b), mode, separator)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ascription::{parse_timestamp, AscriptionKind};
    use crate::textdiff::WordDiffer;

    fn point(author: &str, kind: AscriptionKind, date: &str, record: Record) -> HistoryPoint {
        HistoryPoint {
            author: Some(author.to_string()),
            kind,
            tag: String::new(),
            timestamp: parse_timestamp(date),
            fuzzy: record.is_fuzzy(),
            obsolete: record.obsolete,
            snapshot: Arc::new(record),
            position: 0,
        }
    }

    fn modification(date: &str, record: Record) -> HistoryPoint {
        point("alice", AscriptionKind::Modification, date, record)
    }

    #[test]
    fn test_drop_merges_removes_obsoleting_merge() {
        let live = Record::new("File").with_translations(["Fichier"]);
        let mut gone = live.clone();
        gone.obsolete = true;
        let history = vec![modification("2020-02-01", gone), modification("2020-01-01", live)];

        let dropped = drop_merges(history);
        assert_eq!(dropped.len(), 1);
        assert!(!dropped[0].obsolete);
    }

    #[test]
    fn test_drop_merges_is_idempotent() {
        let v1 = Record::new("File").with_translations(["Fichier"]);
        let mut v2 = v1.clone();
        v2.obsolete = true;
        let v3 = Record::new("File").with_translations(["Dossier"]);
        let history = vec![
            modification("2020-03-01", v3),
            modification("2020-02-01", v2),
            modification("2020-01-01", v1),
        ];
        let once = drop_merges(history);
        let twice = drop_merges(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_reviews_are_never_dropped_as_merges() {
        let v1 = Record::new("File").with_translations(["Fichier"]);
        let history = vec![
            point("bob", AscriptionKind::Review, "2020-02-01", v1.clone()),
            modification("2020-01-01", v1),
        ];
        assert_eq!(drop_merges(history).len(), 2);
    }

    #[test]
    fn test_collapse_keeps_earliest_of_run() {
        let upper = |s: &str| s.to_uppercase();
        let history = vec![
            modification("2020-03-01", Record::new("x").with_translations(["FICHIER"])),
            modification("2020-02-01", Record::new("x").with_translations(["Fichier"])),
            modification("2020-01-01", Record::new("x").with_translations(["fichier"])),
        ];
        let collapsed = collapse_filtered(history, &upper);
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed[0].snapshot.translations, vec!["fichier"]);
    }

    #[test]
    fn test_reduce_to_added_segments() {
        let mut history = vec![
            modification("2020-02-01", Record::new("x").with_translations(["red yellow blue"])),
            modification("2020-01-01", Record::new("x").with_translations(["red blue"])),
        ];
        reduce_to_segments(&mut history, AddRem::Added, " ", &WordDiffer);
        assert_eq!(history[0].snapshot.translations, vec!["yellow "]);
        assert_eq!(history[1].snapshot.translations, vec!["red blue"]);
    }
}
