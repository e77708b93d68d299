//! Applying embedded diffs to a collection.
//!
//! Each diff is applied directly when the target still holds its old or new
//! side. Otherwise the target record may have drifted independently, and the
//! diff is split into an old-to-current half and a current-to-new half,
//! which a reviewer has to resolve. Diffs fitting nowhere are rejected.

use crate::ediff::embed::to_record_avoiding;
use crate::ediff::{
    diff_pair, fuzzy_match_source_files, resolve_diff_pair, CollectionDiff, DiffRouting,
    EmbeddedDiffRecord, SOURCE_RENAME_MIN_SHARE,
};
use crate::merge::TemplateMerger;
use crate::model::{Collection, Key, Record, SourceSynonyms};
use crate::pairing::{pair_collections, PairingOptions};
use crate::textdiff::TextDiffer;
use crate::{log_op_end, log_op_start};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// What happens to the target collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchMode {
    /// Write clean patches into the records, reject everything else
    #[default]
    Apply,
    /// Insert every patch as an embedded diff record for review
    Embed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOptions {
    pub mode: PatchMode,
    /// Let the split search pair records through template re-merge
    pub use_merge: bool,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            mode: PatchMode::Apply,
            use_merge: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchReport {
    /// Number of diffs that applied cleanly
    pub applied: usize,
    /// Diffs that did not apply cleanly, with their routing set
    pub rejects: Vec<EmbeddedDiffRecord>,
}

/// Order of application among patches at one position: a merge may free
/// the key an insert needs, and a removal must not shift the insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Action {
    Merge,
    Insert,
    Remove,
}

/// One planned change, positioned against the unpatched target
#[derive(Debug)]
struct Patch {
    position: usize,
    action: Action,
    diff: EmbeddedDiffRecord,
    /// Logical new side, written on merge and insert
    new: Option<Record>,
}

/// Old, current and new version of one target record, found by pairing the
/// diffs' sides against the target
#[derive(Debug)]
struct Triplet {
    old: Record,
    current: Record,
    new: Record,
}

fn cleaned(record: &Record) -> Record {
    let mut record = record.clone();
    record.cleanup();
    record
}

/// The candidate as it would look if a benign transformation explains the
/// difference: a fuzzy record rewound to its previous fields, or an
/// untranslated record given the incoming translation.
fn lenient(candidate: &Record, old: Option<&Record>, new: Option<&Record>) -> Record {
    let mut relaxed = candidate.clone();
    match (old, new) {
        (Some(old), Some(new))
            if candidate.is_fuzzy()
                && candidate.has_previous()
                && !old.is_fuzzy()
                && !new.is_fuzzy() =>
        {
            relaxed.set_current_ids(candidate.previous_ids());
            relaxed.clear_previous();
            relaxed.set_fuzzy(false);
        }
        (None, Some(new)) if candidate.is_untranslated() && new.is_translated() => {
            relaxed.translations = new.translations.clone();
        }
        _ => {}
    }
    relaxed
}

fn is_patchable(candidate: Option<&Record>, old: Option<&Record>, new: Option<&Record>) -> bool {
    let relaxed = candidate.map(|c| cleaned(&lenient(c, old, new)));
    let same = |a: &Record, b: &Record| a.same_invariant(&cleaned(b));
    match (relaxed.as_ref(), old, new) {
        (Some(c), Some(old), Some(new)) => same(c, old) || same(c, new),
        (None, Some(_), Some(_)) => false,
        (c, None, Some(new)) => c.map_or(true, |c| same(c, new)),
        (c, Some(old), None) => c.map_or(true, |c| same(c, old)),
        (c, None, None) => c.is_none(),
    }
}

fn build_triplets(
    target: &Collection,
    olds: &Collection,
    news: &Collection,
    use_merge: bool,
    merger: &dyn TemplateMerger,
) -> Vec<Triplet> {
    let options = PairingOptions {
        use_merge,
        with_additions: false,
        with_removals: false,
    };

    let mut to_old: HashMap<Key, Record> = HashMap::new();
    for pair in pair_collections(olds, target, &options, merger) {
        if let (Some(old), Some(current)) = (pair.old, pair.new) {
            to_old.insert(current.key(), old);
        }
    }

    let mut triplets = Vec::new();
    for pair in pair_collections(target, news, &options, merger) {
        let (Some(current), Some(new)) = (pair.old, pair.new) else {
            continue;
        };
        if let Some(old) = to_old.remove(&current.key()) {
            triplets.push(Triplet { old, current, new });
        }
    }
    triplets
}

struct Planner<'a> {
    target: &'a Collection,
    differ: &'a dyn TextDiffer,
    merger: &'a dyn TemplateMerger,
    use_merge: bool,
    olds: Collection,
    news: Collection,
    synonyms: SourceSynonyms,
    patched: HashSet<Key>,
    triplets: Option<Vec<Triplet>>,
}

impl<'a> Planner<'a> {
    fn insertion_position(&self, record: &Record) -> usize {
        self.target.insertion_position(record, &self.synonyms)
    }

    /// Merge into the record at `pos` unless an earlier patch already took
    /// it, in which case insert next to it.
    fn merge_or_insert(&mut self, pos: usize, new: &Record) -> (usize, Action) {
        if let Some(key) = self.target.get_at(pos).map(Record::key) {
            if self.patched.insert(key) {
                return (pos, Action::Merge);
            }
        }
        (self.insertion_position(new), Action::Insert)
    }

    fn plan(&mut self, diff: &EmbeddedDiffRecord) -> Vec<Patch> {
        let resolved = resolve_diff_pair(diff);
        let old = resolved.old.as_ref().map(cleaned);
        let new = resolved.new.as_ref().map(cleaned);

        let candidate_pos = new
            .as_ref()
            .and_then(|r| self.target.position(&r.key()))
            .or_else(|| old.as_ref().and_then(|r| self.target.position(&r.key())));
        let candidate = candidate_pos.and_then(|pos| self.target.get_at(pos));

        if is_patchable(candidate, old.as_ref(), new.as_ref()) {
            let clean = diff.clone().with_routing(DiffRouting::Clean);
            let (position, action) = match (&new, candidate_pos) {
                (Some(new), Some(pos)) => self.merge_or_insert(pos, new),
                (Some(new), None) => (self.insertion_position(new), Action::Insert),
                (None, Some(pos)) => {
                    if let Some(rec) = self.target.get_at(pos) {
                        self.patched.insert(rec.key());
                    }
                    (pos, Action::Remove)
                }
                (None, None) => {
                    // Nothing left to remove.
                    return vec![Patch {
                        position: usize::MAX,
                        action: Action::Remove,
                        diff: clean,
                        new: None,
                    }];
                }
            };
            return vec![Patch {
                position,
                action,
                diff: clean,
                new,
            }];
        }

        if let (Some(old), Some(new)) = (&old, &new) {
            if let Some(split) = self.split(old, new) {
                return split;
            }
        }

        let anchor = new.as_ref().or(old.as_ref()).unwrap_or(&diff.base);
        vec![Patch {
            position: self.insertion_position(anchor),
            action: Action::Insert,
            diff: diff.clone().with_routing(DiffRouting::NoMatch),
            new: None,
        }]
    }

    fn split(&mut self, old: &Record, new: &Record) -> Option<Vec<Patch>> {
        let target = self.target;
        let (olds, news, use_merge, merger) = (&self.olds, &self.news, self.use_merge, self.merger);
        let triplets = self
            .triplets
            .get_or_insert_with(|| build_triplets(target, olds, news, use_merge, merger));
        let found = triplets
            .iter()
            .position(|t| t.old.same_invariant(old) && t.new.same_invariant(new))?;
        let triplet = triplets.remove(found);

        let pos = self.target.position(&triplet.current.key())?;
        let (position, action) = self.merge_or_insert(pos, &triplet.new);

        let mut patches = Vec::new();
        if let Some(to_current) = diff_pair(Some(&triplet.old), Some(&triplet.current), self.differ) {
            patches.push(Patch {
                position,
                action: Action::Insert,
                diff: to_current.with_routing(DiffRouting::SplitToCurrent),
                new: Some(triplet.current.clone()),
            });
        }
        if let Some(to_new) = diff_pair(Some(&triplet.current), Some(&triplet.new), self.differ) {
            patches.push(Patch {
                position,
                action,
                diff: to_new.with_routing(DiffRouting::SplitUnresolved),
                new: Some(triplet.new.clone()),
            });
        }
        (!patches.is_empty()).then_some(patches)
    }
}

/// Apply `diffs` to `target`.
///
/// In [`PatchMode::Apply`] only clean patches change the target. In
/// [`PatchMode::Embed`] every patch lands in the target as an embedded diff
/// record, to be accepted later by [`unembed_collection`]. Either way, the
/// patches that did not apply cleanly come back as rejects.
pub fn patch_collection(
    target: &mut Collection,
    diffs: &CollectionDiff,
    options: &PatchOptions,
    differ: &dyn TextDiffer,
    merger: &dyn TemplateMerger,
) -> PatchReport {
    let start = Instant::now();
    log_op_start!("patch_collection", collection = target.name(), diff_len = diffs.len());

    let mut olds = Collection::new(format!("{}.old", diffs.name));
    let mut news = Collection::new(format!("{}.new", diffs.name));
    for diff in diffs.iter() {
        let resolved = resolve_diff_pair(diff);
        if let Some(old) = resolved.old {
            olds.add(old);
        }
        if let Some(new) = resolved.new {
            news.add(new);
        }
    }
    let synonyms = fuzzy_match_source_files(&news, target, SOURCE_RENAME_MIN_SHARE);

    let mut patches = {
        let mut planner = Planner {
            target: &*target,
            differ,
            merger,
            use_merge: options.use_merge,
            olds,
            news,
            synonyms,
            patched: HashSet::new(),
            triplets: None,
        };
        let mut patches = Vec::new();
        for diff in diffs.iter() {
            patches.extend(planner.plan(diff));
        }
        patches
    };
    // Rejects are reported in planning order, whatever the application order.
    let mut patches: Vec<(usize, Patch)> = patches.into_iter().enumerate().collect();
    patches.sort_by_key(|(_, p)| (p.position, p.action));

    let mut report = PatchReport::default();
    let mut rejects: Vec<(usize, EmbeddedDiffRecord)> = Vec::new();
    let mut offset: isize = 0;
    for (seq, patch) in patches {
        let accepted = patch.diff.routing == DiffRouting::Clean;
        if !accepted {
            rejects.push((seq, patch.diff.clone()));
        }
        if options.mode == PatchMode::Apply && !accepted {
            continue;
        }
        if patch.position == usize::MAX {
            report.applied += 1;
            continue;
        }
        let index = (patch.position as isize + offset).max(0) as usize;
        let done = match options.mode {
            PatchMode::Apply => apply_patch(target, &patch, index, &mut offset),
            PatchMode::Embed => embed_patch(target, &patch, index, &mut offset),
        };
        if accepted {
            if done {
                report.applied += 1;
            } else {
                tracing::warn!(
                    key = %patch.diff.key(),
                    "patch collides with another record, rejected"
                );
                rejects.push((seq, patch.diff.with_routing(DiffRouting::NoMatch)));
            }
        }
    }
    rejects.sort_by_key(|(seq, _)| *seq);
    report.rejects = rejects.into_iter().map(|(_, diff)| diff).collect();

    log_op_end!(
        "patch_collection",
        duration_ms = start.elapsed().as_millis() as u64,
        applied = report.applied,
        rejected = report.rejects.len()
    );
    report
}

fn apply_patch(target: &mut Collection, patch: &Patch, index: usize, offset: &mut isize) -> bool {
    match (patch.action, &patch.new) {
        (Action::Merge, Some(new)) => {
            let Some(mut merged) = target.get_at(index).cloned() else {
                return false;
            };
            merged.set_invariant_from(new);
            target.replace(index, merged)
        }
        (Action::Insert, Some(new)) => {
            let mut record = new.clone();
            record.sources = patch.diff.base.sources.clone();
            if !target.insert(index, record) {
                return false;
            }
            *offset += 1;
            true
        }
        (Action::Remove, _) => {
            if target.remove(index).is_some() {
                *offset -= 1;
            }
            true
        }
        (_, None) => false,
    }
}

fn embed_patch(target: &mut Collection, patch: &Patch, index: usize, offset: &mut isize) -> bool {
    match patch.action {
        Action::Merge | Action::Remove => {
            let Some(current) = target.get_at(index) else {
                return false;
            };
            let mut diff = patch.diff.clone();
            diff.base = current.clone();
            let record = to_record_avoiding(&diff, target, Some(index));
            target.replace(index, record)
        }
        Action::Insert => {
            let record = to_record_avoiding(&patch.diff, target, None);
            if !target.insert(index, record) {
                return false;
            }
            *offset += 1;
            true
        }
    }
}

/// Accept the embedded diffs of a collection: every diff record is replaced
/// by its logical new side, or removed when it has none. Unmatched diffs and
/// unresolved split halves are dropped. Returns the number of records
/// resolved.
pub fn unembed_collection(collection: &mut Collection) -> usize {
    let start = Instant::now();
    log_op_start!("unembed_collection", collection = collection.name());

    let mut resolved_count = 0;
    let mut seen: HashSet<Key> = HashSet::new();
    let mut records = Vec::with_capacity(collection.len());
    for record in collection.iter() {
        let Some(diff) = EmbeddedDiffRecord::from_record(record) else {
            if seen.insert(record.key()) {
                records.push(record.clone());
            }
            continue;
        };
        if !diff.routing.is_accepted() {
            continue;
        }
        let Some(new) = resolve_diff_pair(&diff).new else {
            resolved_count += 1;
            continue;
        };
        if !seen.insert(new.key()) {
            tracing::warn!(
                key = %new.key(),
                entry = record.entry,
                "unembedding yields a duplicate record, skipped"
            );
            continue;
        }
        resolved_count += 1;
        records.push(new);
    }
    *collection = Collection::from_records(collection.name().to_string(), records);

    log_op_end!(
        "unembed_collection",
        duration_ms = start.elapsed().as_millis() as u64,
        resolved = resolved_count
    );
    resolved_count
}
