#![allow(clippy::unwrap_used, clippy::expect_used)]

/// Scenario 4: Fuzzy Record Paired Through Its Previous Fields
///
/// An old fuzzy record whose previous id equals the id of a new translated
/// record is paired with it, and the diff shows only the translation change.
mod common;

use ascript_core::ediff::{resolve_diff_pair, DiffField};
use ascript_core::{diff_collections, pair_collections, NoMerge, PairingOptions, WordDiffer};
use common::{collection, fuzzy, translated};

#[test]
fn test_scenario_04_pairs_via_inverted_key() {
    // GIVEN an old fuzzy record and a new record with its previous id
    let old = collection(vec![fuzzy("Open file", "Open", "Ouvrir")]);
    let new = collection(vec![translated("Open", "Ouvrir!")]);

    // WHEN pairing the snapshots without merge assistance
    let options = PairingOptions {
        use_merge: false,
        ..PairingOptions::default()
    };
    let pairs = pair_collections(&old, &new, &options, &NoMerge);

    // THEN they form one pair
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].old.as_ref().unwrap().id, "Open file");
    assert_eq!(pairs[0].new.as_ref().unwrap().id, "Open");
}

#[test]
fn test_scenario_04_diff_reduces_to_translation_delta() {
    // GIVEN the same snapshots
    let old = collection(vec![fuzzy("Open file", "Open", "Ouvrir")]);
    let new = collection(vec![translated("Open", "Ouvrir!")]);

    // WHEN diffing them
    let diff = diff_collections(&old, &new, &PairingOptions::default(), &WordDiffer, &NoMerge);

    // THEN there is one diff whose id is unchanged and whose translation changed
    assert_eq!(diff.len(), 1);
    let record_diff = &diff.diffs[0];
    assert!(!record_diff.field(DiffField::Id).unwrap().is_change());
    assert!(record_diff.field(DiffField::Translation(0)).unwrap().is_change());

    // AND resolving it gives back both original sides
    let resolved = resolve_diff_pair(record_diff);
    assert!(resolved.old.unwrap().same_invariant(&old.records()[0]));
    assert!(resolved.new.unwrap().same_invariant(&new.records()[0]));
}
