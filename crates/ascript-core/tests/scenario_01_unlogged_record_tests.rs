#![allow(clippy::unwrap_used, clippy::expect_used)]

/// Scenario 1: Unlogged Record
///
/// A record with no shadow record has a history of exactly one synthetic,
/// unascribed point standing for its present state.
mod common;

use ascript_core::selector::{compile, SelectorCache, SelectorContext, SelectorRegistry, SelectorResult};
use ascript_core::{collect_history, Collection, HistoryOptions, Record, WordDiffer};
use common::{test_config, translated};

#[test]
fn test_scenario_01_unlogged_record_has_one_synthetic_point() {
    // GIVEN a translated record and an empty shadow collection
    let config = test_config();
    let record = translated("File", "Fichier");
    let shadows = Collection::new("ui.ascript");

    // WHEN assembling its history
    let history = collect_history(&record, &shadows, &config, &HistoryOptions::default(), &WordDiffer);

    // THEN there is one unascribed point at position 1
    assert_eq!(history.len(), 1);
    let point = &history[0];
    assert_eq!(point.author, None);
    assert_eq!(point.position, 1);
    assert!(point.timestamp.is_none());
    assert!(point.snapshot.same_invariant(&record));
}

#[test]
fn test_scenario_01_unlogged_record_is_selected_as_unascribed() {
    // GIVEN the synthetic history of a translated record
    let config = test_config();
    let record = translated("File", "Fichier");
    let collection = Collection::from_records("ui", vec![record.clone()]);
    let shadows = Collection::new("ui.ascript");
    let history = collect_history(&record, &shadows, &config, &HistoryOptions::default(), &WordDiffer);

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

    // THEN it is unascribed, and no history selector matches it
    let unasc = compile(&["unasc"], &registry, false).unwrap();
    assert_eq!(unasc.select(&ctx).unwrap(), SelectorResult::Matched);
    let asc = compile(&["asc"], &registry, true).unwrap();
    assert_eq!(asc.select(&ctx).unwrap(), SelectorResult::NotMatched);
}

#[test]
fn test_scenario_01_pristine_record_is_not_unascribed() {
    // GIVEN an untranslated record that was never touched
    let config = test_config();
    let record = Record::new("File");
    let collection = Collection::from_records("ui", vec![record.clone()]);
    let history = collect_history(
        &record,
        &Collection::new("ui.ascript"),
        &config,
        &HistoryOptions::default(),
        &WordDiffer,
    );
    let cache = SelectorCache::new();
    let ctx = SelectorContext {
        record: &record,
        collection: &collection,
        history: &history,
        config: &config,
        differ: &WordDiffer,
        cache: &cache,
    };

    // THEN unasc does not select it
    let unasc = compile(&["unasc"], &SelectorRegistry::with_builtin(), false).unwrap();
    assert!(!unasc.select(&ctx).unwrap().is_match());
}
