#![allow(clippy::unwrap_used, clippy::expect_used)]

/// Scenario 5: Splitting a Diff Against a Drifted Target
///
/// The target merged the record fuzzy against a different previous id, so the
/// diff does not apply directly. With re-merge assistance the diff splits
/// into old-to-current and current-to-new halves; without it, the diff is
/// rejected as having no match.
mod common;

use ascript_core::ediff::{DiffRouting, EmbeddedDiffRecord};
use ascript_core::{
    diff_collections, patch_collection, unembed_collection, Collection, CollectionDiff,
    FuzzyTemplateMerger, NoMerge, PairingOptions, PatchMode, PatchOptions, WordDiffer,
};
use common::{collection, fuzzy, translated};

fn setup() -> (CollectionDiff, Collection) {
    let a = collection(vec![translated("Open the file", "Ouvrir le fichier")]);
    let b = collection(vec![translated("Open the file", "Ouvre le fichier")]);
    let target = collection(vec![fuzzy("Open the files", "Open a file", "Ouvrir le fichier")]);
    let diff = diff_collections(&a, &b, &PairingOptions::default(), &WordDiffer, &NoMerge);
    (diff, target)
}

#[test]
fn test_scenario_05_split_halves_are_rejected_in_apply_mode() {
    // GIVEN a diff A->B and a target where the record drifted
    let (diff, mut target) = setup();
    let before = target.clone();

    // WHEN patching with merge assistance
    let merger = FuzzyTemplateMerger::new(WordDiffer);
    let report = patch_collection(&mut target, &diff, &PatchOptions::default(), &WordDiffer, &merger);

    // THEN the diff splits into two halves, both returned as rejects
    assert_eq!(report.applied, 0);
    let routings: Vec<DiffRouting> = report.rejects.iter().map(|d| d.routing).collect();
    assert_eq!(routings, vec![DiffRouting::SplitToCurrent, DiffRouting::SplitUnresolved]);

    // AND the target is untouched
    assert_eq!(target, before);
}

#[test]
fn test_scenario_05_split_halves_are_embedded_as_two_inserts() {
    // GIVEN the same diff and target
    let (diff, mut target) = setup();
    let current = target.get_at(0).unwrap().clone();

    // WHEN embedding the patch
    let merger = FuzzyTemplateMerger::new(WordDiffer);
    let options = PatchOptions {
        mode: PatchMode::Embed,
        ..PatchOptions::default()
    };
    patch_collection(&mut target, &diff, &options, &WordDiffer, &merger);

    // THEN both halves sit in the target as embedded diff records
    assert_eq!(target.len(), 2);
    let routings: Vec<DiffRouting> = target
        .iter()
        .map(|r| EmbeddedDiffRecord::from_record(r).unwrap().routing)
        .collect();
    assert!(routings.contains(&DiffRouting::SplitToCurrent));
    assert!(routings.contains(&DiffRouting::SplitUnresolved));

    // AND unembedding keeps the current record and drops the unresolved half
    unembed_collection(&mut target);
    assert_eq!(target.len(), 1);
    assert!(target.get_at(0).unwrap().same_invariant(&current));
}

#[test]
fn test_scenario_05_without_merge_the_diff_has_no_match() {
    // GIVEN the same diff and target
    let (diff, mut target) = setup();

    // WHEN patching without merge assistance
    let report = patch_collection(&mut target, &diff, &PatchOptions::default(), &WordDiffer, &NoMerge);

    // THEN the diff comes back unapplied with no match
    assert_eq!(report.applied, 0);
    assert_eq!(report.rejects.len(), 1);
    assert_eq!(report.rejects[0].routing, DiffRouting::NoMatch);
    assert_eq!(target.len(), 1);
}
