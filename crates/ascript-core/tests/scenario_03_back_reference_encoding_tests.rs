#![allow(clippy::unwrap_used, clippy::expect_used)]

/// Scenario 3: Back-Reference Encoding
///
/// A field value repeated by a later modification is stored as a reference
/// to the earlier entry, and decodes to the identical text.
mod common;

use ascript_core::{ascribe_modification, collect_history, Collection, HistoryOptions, WordDiffer};
use common::{test_config, translated, ts};

#[test]
fn test_scenario_03_repeated_translation_is_referenced() {
    // GIVEN two consecutive modifications that keep the translation but
    // change the manual comment
    let config = test_config();
    let mut shadows = Collection::new("ui.ascript");
    let first = translated("File", "Fichier");
    let mut second = first.clone();
    second.manual_comments.push("checked against the glossary".to_string());

    ascribe_modification(&first, &mut shadows, "alice", &config, ts("2021-03-01 08:00+0100")).unwrap();
    ascribe_modification(&second, &mut shadows, "bob", &config, ts("2021-03-02 08:00+0100")).unwrap();

    // THEN the translation chain holds the literal once and a reference after it
    let shadow = shadows.get(&first.key()).unwrap();
    assert_eq!(shadow.translations, vec!["Fichier|~\n|~e0"]);
    assert_eq!(shadow.translations[0].matches("Fichier").count(), 1);

    // AND decoding reproduces the same text for both entries
    let history = collect_history(&second, &shadows, &config, &HistoryOptions::default(), &WordDiffer);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].snapshot.translations, vec!["Fichier"]);
    assert_eq!(history[1].snapshot.translations, vec!["Fichier"]);
    assert_eq!(history[0].snapshot.manual_comments, second.manual_comments);
    assert!(history[1].snapshot.manual_comments.is_empty());
}

#[test]
fn test_scenario_03_value_returning_after_change_is_referenced() {
    // GIVEN a translation that changes and then reverts
    let config = test_config();
    let mut shadows = Collection::new("ui.ascript");
    let a = translated("File", "Fichier");
    let b = translated("File", "Dossier");
    ascribe_modification(&a, &mut shadows, "alice", &config, ts("2021-03-01 08:00+0000")).unwrap();
    ascribe_modification(&b, &mut shadows, "bob", &config, ts("2021-03-02 08:00+0000")).unwrap();
    ascribe_modification(&a, &mut shadows, "alice", &config, ts("2021-03-03 08:00+0000")).unwrap();

    // THEN the revert points back at the first entry
    let shadow = shadows.get(&a.key()).unwrap();
    assert!(shadow.translations[0].ends_with("|~e0"));

    let history = collect_history(&a, &shadows, &config, &HistoryOptions::default(), &WordDiffer);
    let texts: Vec<&str> = history.iter().map(|p| p.snapshot.translations[0].as_str()).collect();
    assert_eq!(texts, vec!["Fichier", "Dossier", "Fichier"]);
}
