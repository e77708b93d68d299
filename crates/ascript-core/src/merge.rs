//! Template re-merge.
//!
//! Re-merging a collection against a template yields a collection with
//! exactly the template's records, carrying over translations from the
//! collection: unchanged for exact key matches, as fuzzy records for close
//! matches, and empty otherwise. Records of the collection that served
//! neither as an exact nor as a close match are kept as obsolete; a close
//! match source lives on only in the previous fields of its fuzzy record.

use crate::model::{Collection, IdFields, Record};
use crate::textdiff::TextDiffer;

/// Black-box template re-merge primitive
pub trait TemplateMerger {
    /// Merge `collection` against `template`. `None` when merging is not
    /// possible for these inputs.
    fn merge(&self, collection: &Collection, template: &Collection) -> Option<Collection>;
}

/// Never merges; disables merge-assisted lookups.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMerge;

impl TemplateMerger for NoMerge {
    fn merge(&self, _collection: &Collection, _template: &Collection) -> Option<Collection> {
        None
    }
}

/// Similarity-based re-merge using a [`TextDiffer`] over the id fields
pub struct FuzzyTemplateMerger<D> {
    differ: D,
    /// Minimum similarity for a fuzzy match
    pub cutoff: f64,
}

pub const DEFAULT_FUZZY_CUTOFF: f64 = 0.6;

impl<D: TextDiffer> FuzzyTemplateMerger<D> {
    pub fn new(differ: D) -> Self {
        Self {
            differ,
            cutoff: DEFAULT_FUZZY_CUTOFF,
        }
    }

    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    fn closest<'c>(&self, template: &Record, candidates: &'c Collection) -> Option<&'c Record> {
        let mut best: Option<(f64, &Record)> = None;
        for candidate in candidates.iter().filter(|c| !c.obsolete && c.is_translated()) {
            if candidate.context != template.context {
                continue;
            }
            let ratio = self.differ.ratio(&candidate.id, &template.id);
            if ratio >= self.cutoff && best.map_or(true, |(r, _)| ratio > r) {
                best = Some((ratio, candidate));
            }
        }
        best.map(|(_, record)| record)
    }
}

impl<D: TextDiffer> TemplateMerger for FuzzyTemplateMerger<D> {
    fn merge(&self, collection: &Collection, template: &Collection) -> Option<Collection> {
        let mut merged = Collection::new(collection.name());
        let mut used = std::collections::HashSet::new();

        for tmpl in template {
            let mut record = tmpl.clone();
            record.obsolete = false;
            record.set_fuzzy(false);
            record.clear_previous();

            if let Some(exact) = collection.get(&tmpl.key()) {
                used.insert(exact.key());
                record.manual_comments = exact.manual_comments.clone();
                record.flags = exact.flags.clone();
                record.obsolete = false;
                if exact.plural.is_some() == tmpl.plural.is_some() {
                    record.translations = exact.translations.clone();
                    record.set_previous_ids(exact.previous_ids());
                } else {
                    record.translations = adapt_plurality(&exact.translations, tmpl.plural.is_some());
                    record.set_fuzzy(true);
                    record.set_previous_ids(exact.current_ids());
                }
            } else if let Some(close) = self.closest(tmpl, collection) {
                used.insert(close.key());
                record.manual_comments = close.manual_comments.clone();
                record.translations =
                    adapt_plurality(&close.translations, tmpl.plural.is_some());
                record.set_fuzzy(true);
                record.set_previous_ids(IdFields {
                    context: close.context.clone(),
                    id: Some(close.id.clone()),
                    plural: close.plural.clone(),
                });
            } else {
                record.translations = vec![String::new(); slots(tmpl.plural.is_some())];
            }
            record.cleanup();
            merged.add(record);
        }

        for leftover in collection.iter().filter(|r| !used.contains(&r.key())) {
            if merged.contains(&leftover.key()) {
                continue;
            }
            let mut record = leftover.clone();
            record.obsolete = true;
            merged.add(record);
        }
        Some(merged)
    }
}

fn slots(plural: bool) -> usize {
    if plural {
        2
    } else {
        1
    }
}

/// Multiply a singular translation into plural slots, or reduce plural
/// translations to the first form.
fn adapt_plurality(translations: &[String], plural: bool) -> Vec<String> {
    let first = translations.first().cloned().unwrap_or_default();
    if plural {
        if translations.len() > 1 {
            translations.to_vec()
        } else {
            vec![first; slots(true)]
        }
    } else {
        vec![first]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Key;
    use crate::textdiff::WordDiffer;

    fn merger() -> FuzzyTemplateMerger<WordDiffer> {
        FuzzyTemplateMerger::new(WordDiffer)
    }

    #[test]
    fn test_exact_match_keeps_translation() {
        let old = Collection::from_records("old", vec![Record::new("File").with_translations(["Fichier"])]);
        let tmpl = Collection::from_records("tmpl", vec![Record::new("File")]);
        let merged = merger().merge(&old, &tmpl).unwrap();
        let rec = merged.get(&Key::new(None, "File")).unwrap();
        assert_eq!(rec.translations, vec!["Fichier"]);
        assert!(!rec.is_fuzzy());
    }

    #[test]
    fn test_close_match_becomes_fuzzy_with_previous() {
        let old = Collection::from_records(
            "old",
            vec![Record::new("Open the file").with_translations(["Ouvrir le fichier"])],
        );
        let tmpl = Collection::from_records("tmpl", vec![Record::new("Open the files")]);
        let merged = merger().merge(&old, &tmpl).unwrap();

        let rec = merged.get(&Key::new(None, "Open the files")).unwrap();
        assert!(rec.is_fuzzy());
        assert_eq!(rec.previous_id.as_deref(), Some("Open the file"));
        assert_eq!(rec.translations, vec!["Ouvrir le fichier"]);

        assert!(merged.get(&Key::new(None, "Open the file")).is_none());
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_unused_record_is_kept_obsolete() {
        let old = Collection::from_records(
            "old",
            vec![
                Record::new("Open the file").with_translations(["Ouvrir le fichier"]),
                Record::new("Quit").with_translations(["Quitter"]),
            ],
        );
        let tmpl = Collection::from_records("tmpl", vec![Record::new("Open the files")]);
        let merged = merger().merge(&old, &tmpl).unwrap();

        let quit = merged.get(&Key::new(None, "Quit")).unwrap();
        assert!(quit.obsolete);
        assert_eq!(quit.translations, vec!["Quitter"]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_unmatched_template_record_is_untranslated() {
        let old = Collection::from_records("old", vec![Record::new("Quit").with_translations(["Quitter"])]);
        let tmpl = Collection::from_records("tmpl", vec![Record::new("a file").with_plural("%d files")]);
        let merged = merger().merge(&old, &tmpl).unwrap();
        let rec = merged.get(&Key::new(None, "a file")).unwrap();
        assert!(rec.is_untranslated());
        assert_eq!(rec.translations, vec!["", ""]);
    }

    #[test]
    fn test_plurality_change_multiplies_and_fuzzies() {
        let old = Collection::from_records("old", vec![Record::new("file").with_translations(["fichier"])]);
        let tmpl = Collection::from_records("tmpl", vec![Record::new("file").with_plural("files")]);
        let merged = merger().merge(&old, &tmpl).unwrap();
        let rec = merged.get(&Key::new(None, "file")).unwrap();
        assert!(rec.is_fuzzy());
        assert_eq!(rec.translations, vec!["fichier", "fichier"]);
    }

    #[test]
    fn test_no_merge() {
        let empty = Collection::new("x");
        assert!(NoMerge.merge(&empty, &empty).is_none());
    }
}
