#![allow(clippy::unwrap_used, clippy::expect_used)]

/// Property tests over history encoding, pairing, patching and selectors.
mod common;

use ascript_core::history::drop_merges;
use ascript_core::selector::{compile, SelectorCache, SelectorContext, SelectorRegistry};
use ascript_core::{
    ascribe_modification, collect_history, diff_collections, pair_collections, patch_collection,
    Collection, HistoryOptions, HistoryPoint, NoMerge, PairingOptions, PatchOptions, Record,
    WordDiffer,
};
use chrono::Duration;
use common::{test_config, translated, ts};
use proptest::prelude::*;
use std::collections::BTreeMap;

const PLAIN_SPECS: &[&str] = &[
    "any",
    "active",
    "current",
    "nactive",
    "ncurrent",
    "e:2",
    "l:10",
    "espan:1:3",
    "lspan:8:",
    "fexpr:str=a",
    "nfexpr:id=b",
];

fn record_strategy() -> impl Strategy<Value = Record> {
    ("[ab]{1,3}", "[a-c ]{1,6}", 0usize..5, 0usize..20, any::<bool>(), any::<bool>()).prop_map(
        |(id, translation, entry, line, fuzzy, obsolete)| {
            let mut record = translated(&id, &translation);
            record.entry = entry;
            record.line = line;
            record.set_fuzzy(fuzzy);
            record.obsolete = obsolete;
            record
        },
    )
}

/// Snapshot entries by distinct id: fuzzy state and translation
fn snapshot_strategy() -> impl Strategy<Value = BTreeMap<String, (bool, String)>> {
    prop::collection::btree_map("[a-e]{1,2}", (any::<bool>(), "[x-z]{1,4}"), 0..8)
}

/// Two-letter ids are plural. Fuzzy records carry the upper-cased id as
/// previous id, which is never a key of its own.
fn snapshot_record(id: &str, fuzzy: bool, translation: &str) -> Record {
    let mut record = if id.len() == 2 {
        Record::new(id)
            .with_plural(format!("{id}s"))
            .with_translations([translation.to_string(), format!("{translation}s")])
    } else {
        translated(id, translation)
    };
    if fuzzy {
        record.set_fuzzy(true);
        record.previous_id = Some(id.to_uppercase());
    }
    record
}

fn to_collection(snapshot: &BTreeMap<String, (bool, String)>) -> Collection {
    Collection::from_records(
        "ui",
        snapshot
            .iter()
            .map(|(id, (fuzzy, tr))| snapshot_record(id, *fuzzy, tr))
            .collect::<Vec<_>>(),
    )
}

/// Drop consecutive repeats, which ascription does not record
fn dedup(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if out.last() != Some(value) {
            out.push(value.clone());
        }
    }
    out
}

proptest! {
    #[test]
    fn property_successive_snapshots_round_trip(translations in prop::collection::vec("[a-c|~ ]{1,8}", 1..6)) {
        let config = test_config();
        let mut shadows = Collection::new("ui.ascript");
        let base = ts("2022-05-01 12:00:00+0000");
        let mut last = Record::new("Message");
        for (i, text) in translations.iter().enumerate() {
            last = translated("Message", text);
            ascribe_modification(&last, &mut shadows, "alice", &config, base + Duration::minutes(i as i64)).unwrap();
        }

        let history = collect_history(&last, &shadows, &config, &HistoryOptions::default(), &WordDiffer);
        let decoded: Vec<String> = history
            .iter()
            .rev()
            .map(|p| p.snapshot.translations[0].clone())
            .collect();
        prop_assert_eq!(decoded, dedup(&translations));
    }

    #[test]
    fn property_history_positions_and_times_are_ordered(
        count in 1usize..6,
        reviews in prop::collection::vec(any::<bool>(), 6),
        edited_after in any::<bool>(),
    ) {
        let config = test_config();
        let mut shadows = Collection::new("ui.ascript");
        let base = ts("2022-05-01 12:00:00+0000");
        let mut record = translated("Message", "v0");
        for i in 0..count {
            let at = base + Duration::hours(i as i64);
            if reviews[i] && i > 0 {
                ascript_core::ascribe_review(&record, &mut shadows, &[], "bob", &config, at).unwrap();
            } else {
                record = translated("Message", &format!("v{i}"));
                ascribe_modification(&record, &mut shadows, "alice", &config, at).unwrap();
            }
        }
        if edited_after {
            record = translated("Message", "edited");
        }

        let history = collect_history(&record, &shadows, &config, &HistoryOptions::default(), &WordDiffer);
        prop_assert_eq!(history[0].is_ascribed(), !edited_after);
        for (i, point) in history.iter().enumerate() {
            prop_assert_eq!(point.position as usize, i + 1);
        }
        for pair in history.windows(2) {
            prop_assert!(pair[0].recency() >= pair[1].recency());
        }
    }

    #[test]
    fn property_drop_merges_is_idempotent(states in prop::collection::vec((any::<bool>(), any::<bool>(), "[xy]"), 1..8)) {
        let base = ts("2022-01-01 00:00:00+0000");
        let history: Vec<HistoryPoint> = states
            .iter()
            .enumerate()
            .rev()
            .map(|(i, (obsolete, fuzzy, text))| {
                let mut snapshot = translated("Message", text);
                snapshot.obsolete = *obsolete;
                snapshot.set_fuzzy(*fuzzy);
                HistoryPoint {
                    author: Some("alice".to_string()),
                    kind: ascript_core::AscriptionKind::Modification,
                    tag: String::new(),
                    timestamp: Some(base + Duration::days(i as i64)),
                    fuzzy: *fuzzy,
                    obsolete: *obsolete,
                    snapshot: std::sync::Arc::new(snapshot),
                    position: 0,
                }
            })
            .collect();

        let once = drop_merges(history);
        let twice = drop_merges(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn property_every_record_is_paired_once(old in snapshot_strategy(), new in snapshot_strategy()) {
        let (old, new) = (to_collection(&old), to_collection(&new));
        let pairs = pair_collections(&old, &new, &PairingOptions::default(), &NoMerge);

        let sorted_ids = |records: Vec<&Record>| {
            let mut ids: Vec<String> = records.into_iter().map(|r| r.id.clone()).collect();
            ids.sort();
            ids
        };
        prop_assert_eq!(
            sorted_ids(pairs.iter().filter_map(|p| p.old.as_ref()).collect()),
            sorted_ids(old.iter().collect())
        );
        prop_assert_eq!(
            sorted_ids(pairs.iter().filter_map(|p| p.new.as_ref()).collect()),
            sorted_ids(new.iter().collect())
        );
    }

    #[test]
    fn property_patch_with_own_diff_reproduces_new(a in snapshot_strategy(), b in snapshot_strategy()) {
        let (a, b) = (to_collection(&a), to_collection(&b));
        let diff = diff_collections(&a, &b, &PairingOptions::default(), &WordDiffer, &NoMerge);

        let mut target = a.clone();
        let report = patch_collection(&mut target, &diff, &PatchOptions::default(), &WordDiffer, &NoMerge);

        prop_assert!(report.rejects.is_empty());
        prop_assert_eq!(target.len(), b.len());
        for record in &b {
            let patched = target.get(&record.key());
            prop_assert!(patched.is_some_and(|p| p.same_invariant(record)));
        }
    }

    #[test]
    fn property_selector_composition_is_conjunction(
        record in record_strategy(),
        first in 0..PLAIN_SPECS.len(),
        second in 0..PLAIN_SPECS.len(),
    ) {
        let config = test_config();
        let collection = Collection::from_records("ui", vec![record.clone()]);
        let history: Vec<HistoryPoint> = Vec::new();
        let cache = SelectorCache::new();
        let ctx = SelectorContext {
            record: &record,
            collection: &collection,
            history: &history,
            config: &config,
            differ: &WordDiffer,
            cache: &cache,
        };
        let registry = SelectorRegistry::with_builtin();
        let (s1, s2) = (PLAIN_SPECS[first], PLAIN_SPECS[second]);

        let both = compile(&[s1, s2], &registry, false).unwrap().select(&ctx).unwrap().is_match();
        let one = compile(&[s1], &registry, false).unwrap().select(&ctx).unwrap().is_match();
        let two = compile(&[s2], &registry, false).unwrap().select(&ctx).unwrap().is_match();
        prop_assert_eq!(both, one && two);
    }
}
