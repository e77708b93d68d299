//! Record pairing between two snapshots of the same collection.

use crate::merge::TemplateMerger;
use crate::model::{Collection, IdFields, Record};
use once_cell::unsync::OnceCell;

/// Whether `new` could be the product of re-merging `old` with templates,
/// without any human edit in between.
pub fn merge_modified(old: &Record, new: &Record) -> bool {
    match (old.obsolete, new.obsolete) {
        (false, true) => return true,
        (true, false) => return false,
        _ => {}
    }

    if old.manual_comments != new.manual_comments {
        return false;
    }

    let (old_ids, new_ids): (IdFields, IdFields) = match (old.is_fuzzy(), new.is_fuzzy()) {
        (true, true) => (old.previous_ids(), new.previous_ids()),
        (false, false) => (old.current_ids(), new.current_ids()),
        (true, false) => (old.previous_ids(), new.current_ids()),
        (false, true) => (old.current_ids(), new.previous_ids()),
    };
    if old_ids != new_ids {
        return false;
    }

    if old.plural.is_some() != new.plural.is_some() {
        if !old.is_fuzzy() && !new.is_fuzzy() {
            return false;
        }
        let old_first = old.translations.first();
        if old.plural.is_some() {
            // reduction to singular
            old_first == new.translations.first()
        } else {
            // multiplication into plural forms
            new.translations.iter().all(|t| Some(t) == old_first)
        }
    } else {
        old.translations == new.translations
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingOptions {
    /// Fall back to merge-assisted lookups
    pub use_merge: bool,
    /// Emit new records left without a partner
    pub with_additions: bool,
    /// Emit old records left without a partner
    pub with_removals: bool,
}

impl Default for PairingOptions {
    fn default() -> Self {
        Self {
            use_merge: true,
            with_additions: true,
            with_removals: true,
        }
    }
}

/// Old and new version of one record; at least one side is present.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPair {
    pub old: Option<Record>,
    pub new: Option<Record>,
}

/// Finds partners of records in one snapshot, building the inverted and
/// merged views only when a lookup first needs them.
struct PartnerLookup<'a> {
    target: &'a Collection,
    template: &'a Collection,
    use_merge: bool,
    merger: &'a dyn TemplateMerger,
    inverted: OnceCell<Collection>,
    merged: OnceCell<Option<Collection>>,
}

impl<'a> PartnerLookup<'a> {
    fn new(
        target: &'a Collection,
        template: &'a Collection,
        use_merge: bool,
        merger: &'a dyn TemplateMerger,
    ) -> Self {
        Self {
            target,
            template,
            use_merge,
            merger,
            inverted: OnceCell::new(),
            merged: OnceCell::new(),
        }
    }

    /// Position of `record`'s partner in the target snapshot.
    fn find(&self, record: &Record) -> Option<usize> {
        if let Some(found) = probe(self.target, record) {
            return self.target.position(&found.key());
        }

        let inverted = self.inverted.get_or_init(|| invert(self.target));
        if let Some(pos) = probe(inverted, record).and_then(|found| self.map_back(found)) {
            return Some(pos);
        }

        if !self.use_merge {
            return None;
        }
        let merged = self
            .merged
            .get_or_init(|| self.merger.merge(self.target, self.template));
        merged
            .as_ref()
            .and_then(|merged| probe(merged, record))
            .and_then(|found| self.map_back(found))
    }

    fn map_back(&self, found: &Record) -> Option<usize> {
        self.target.position(&found.inverted_key())
    }
}

/// Direct lookup, then with current and previous fields swapped when the
/// record is fuzzy.
fn probe<'c>(collection: &'c Collection, record: &Record) -> Option<&'c Record> {
    collection.get(&record.key()).or_else(|| {
        if record.is_fuzzy() && record.has_previous() {
            collection.get(&record.inverted_key())
        } else {
            None
        }
    })
}

/// Lookup-only view keyed by previous fields; the first record claiming a
/// key wins.
fn invert(collection: &Collection) -> Collection {
    let mut inverted = Collection::new(collection.name());
    for record in collection {
        let mut swapped = Record::default();
        if record.has_previous() {
            swapped.set_current_ids(record.previous_ids());
            swapped.set_previous_ids(record.current_ids());
        } else {
            swapped.set_current_ids(record.current_ids());
        }
        if !inverted.contains(&swapped.key()) {
            inverted.add(swapped);
        }
    }
    inverted
}

fn cleaned(collection: &Collection) -> Collection {
    Collection::from_records(
        collection.name(),
        collection.iter().cloned().map(|mut record| {
            record.cleanup();
            record
        }),
    )
}

/// Pair the records of two snapshots.
///
/// New records look for partners first, then the old records still
/// unpaired. A partner already taken is never reused, so with additions and
/// removals enabled every record ends up in exactly one pair.
pub fn pair_collections(
    old: &Collection,
    new: &Collection,
    options: &PairingOptions,
    merger: &dyn TemplateMerger,
) -> Vec<RecordPair> {
    let old = cleaned(old);
    let new = cleaned(new);
    let in_old = PartnerLookup::new(&old, &new, options.use_merge, merger);
    let in_new = PartnerLookup::new(&new, &old, options.use_merge, merger);

    let mut old_paired = vec![false; old.len()];
    let mut new_paired = vec![false; new.len()];
    let mut pairs = Vec::new();

    for (j, record) in new.iter().enumerate() {
        if let Some(i) = in_old.find(record).filter(|&i| !old_paired[i]) {
            old_paired[i] = true;
            new_paired[j] = true;
            pairs.push(RecordPair {
                old: old.get_at(i).cloned(),
                new: Some(record.clone()),
            });
        }
    }

    for (i, record) in old.iter().enumerate() {
        if old_paired[i] {
            continue;
        }
        if let Some(j) = in_new.find(record).filter(|&j| !new_paired[j]) {
            old_paired[i] = true;
            new_paired[j] = true;
            pairs.push(RecordPair {
                old: Some(record.clone()),
                new: new.get_at(j).cloned(),
            });
        }
    }

    if options.with_additions {
        for (record, paired) in new.iter().zip(new_paired) {
            if !paired {
                pairs.push(RecordPair {
                    old: None,
                    new: Some(record.clone()),
                });
            }
        }
    }
    if options.with_removals {
        for (record, paired) in old.iter().zip(old_paired) {
            if !paired {
                pairs.push(RecordPair {
                    old: Some(record.clone()),
                    new: None,
                });
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{FuzzyTemplateMerger, NoMerge};
    use crate::textdiff::WordDiffer;

    fn fuzzy(id: &str, previous: &str, translation: &str) -> Record {
        let mut rec = Record::new(id).with_translations([translation]);
        rec.set_fuzzy(true);
        rec.previous_id = Some(previous.to_string());
        rec
    }

    #[test]
    fn test_merge_modified_obsolete_transitions() {
        let live = Record::new("File").with_translations(["Fichier"]);
        let mut gone = live.clone();
        gone.obsolete = true;
        assert!(merge_modified(&live, &gone));
        assert!(!merge_modified(&gone, &live));
    }

    #[test]
    fn test_merge_modified_fuzzy_flip() {
        let before = Record::new("Open").with_translations(["Ouvrir"]);
        let after = fuzzy("Open file", "Open", "Ouvrir");
        assert!(merge_modified(&before, &after));

        let edited = fuzzy("Open file", "Open", "Ouvrir un fichier");
        assert!(!merge_modified(&before, &edited));
    }

    #[test]
    fn test_merge_modified_plurality() {
        let singular = Record::new("file").with_translations(["fichier"]);
        let mut plural = Record::new("file")
            .with_plural("files")
            .with_translations(["fichier", "fichier"]);
        plural.set_fuzzy(true);
        plural.previous_id = Some("file".to_string());
        assert!(merge_modified(&singular, &plural));

        let mut unfuzzy = plural.clone();
        unfuzzy.set_fuzzy(false);
        unfuzzy.previous_id = None;
        assert!(!merge_modified(&singular, &unfuzzy));
    }

    #[test]
    fn test_merge_modified_manual_comments() {
        let a = Record::new("x").with_translations(["y"]);
        let mut b = a.clone();
        b.manual_comments.push("checked".to_string());
        assert!(!merge_modified(&a, &b));
    }

    #[test]
    fn test_pairs_direct_additions_removals() {
        let old = Collection::from_records(
            "old",
            vec![Record::new("Keep"), Record::new("Gone")],
        );
        let new = Collection::from_records("new", vec![Record::new("Keep"), Record::new("Fresh")]);
        let pairs = pair_collections(&old, &new, &PairingOptions::default(), &NoMerge);
        assert_eq!(pairs.len(), 3);
        assert!(pairs[0].old.is_some() && pairs[0].new.is_some());
        assert_eq!(pairs[1].new.as_ref().unwrap().id, "Fresh");
        assert!(pairs[1].old.is_none());
        assert_eq!(pairs[2].old.as_ref().unwrap().id, "Gone");

        let options = PairingOptions {
            with_additions: false,
            with_removals: false,
            ..PairingOptions::default()
        };
        assert_eq!(pair_collections(&old, &new, &options, &NoMerge).len(), 1);
    }

    #[test]
    fn test_pairs_through_inverted_index() {
        let old = Collection::from_records("old", vec![fuzzy("Open file", "Open", "Ouvrir")]);
        let new = Collection::from_records("new", vec![Record::new("Open").with_translations(["Ouvrir"])]);
        let pairs = pair_collections(&old, &new, &PairingOptions::default(), &NoMerge);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].old.as_ref().unwrap().id, "Open file");
        assert_eq!(pairs[0].new.as_ref().unwrap().id, "Open");
    }

    #[test]
    fn test_pairs_through_merge() {
        let old = Collection::from_records(
            "old",
            vec![Record::new("Open the file").with_translations(["Ouvrir le fichier"])],
        );
        let new = Collection::from_records(
            "new",
            vec![Record::new("Open the files").with_translations(["Ouvrir les fichiers"])],
        );
        let merger = FuzzyTemplateMerger::new(WordDiffer);
        let pairs = pair_collections(&old, &new, &PairingOptions::default(), &merger);
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].old.is_some() && pairs[0].new.is_some());

        let options = PairingOptions {
            use_merge: false,
            ..PairingOptions::default()
        };
        assert_eq!(pair_collections(&old, &new, &options, &merger).len(), 2);
    }

    #[test]
    fn test_partner_is_not_reused() {
        // Both new records point back to the same old one.
        let old = Collection::from_records("old", vec![Record::new("Open").with_translations(["Ouvrir"])]);
        let new = Collection::from_records(
            "new",
            vec![
                fuzzy("Open file", "Open", "Ouvrir"),
                fuzzy("Open folder", "Open", "Ouvrir"),
            ],
        );
        let pairs = pair_collections(&old, &new, &PairingOptions::default(), &NoMerge);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].new.as_ref().unwrap().id, "Open file");
        assert!(pairs[0].old.is_some());
        assert!(pairs[1].old.is_none());
    }

    #[test]
    fn test_cleanup_before_pairing() {
        let mut stale = Record::new("Open file").with_translations(["Ouvrir"]);
        stale.previous_id = Some("Open".to_string());
        let old = Collection::from_records("old", vec![stale]);
        let new = Collection::from_records("new", vec![Record::new("Open")]);
        let pairs = pair_collections(&old, &new, &PairingOptions::default(), &NoMerge);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|p| p.old.as_ref().map_or(true, |r| !r.has_previous())));
    }
}
