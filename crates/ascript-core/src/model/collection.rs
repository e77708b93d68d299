use super::record::{Key, Record};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Maps a source file name to other names it is known under (renames).
pub type SourceSynonyms = HashMap<String, Vec<String>>;

/// Ordered records, unique by key, with constant-time key lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "CollectionRepr", into = "CollectionRepr")]
pub struct Collection {
    name: String,
    records: Vec<Record>,
    index: HashMap<Key, usize>,
}

#[derive(Serialize, Deserialize)]
struct CollectionRepr {
    name: String,
    records: Vec<Record>,
}

impl From<CollectionRepr> for Collection {
    fn from(repr: CollectionRepr) -> Self {
        Collection::from_records(repr.name, repr.records)
    }
}

impl From<Collection> for CollectionRepr {
    fn from(collection: Collection) -> Self {
        CollectionRepr {
            name: collection.name,
            records: collection.records,
        }
    }
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a collection; a later record with an already seen key replaces
    /// the earlier one in place.
    pub fn from_records<I>(name: impl Into<String>, records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        let mut collection = Self::new(name);
        for record in records {
            collection.add(record);
        }
        collection
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, key: &Key) -> Option<&Record> {
        self.index.get(key).map(|&pos| &self.records[pos])
    }

    pub fn get_at(&self, pos: usize) -> Option<&Record> {
        self.records.get(pos)
    }

    pub fn position(&self, key: &Key) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.index.contains_key(key)
    }

    /// Append a record, or replace the record with the same key in place.
    /// Returns the record's position.
    pub fn add(&mut self, record: Record) -> usize {
        let key = record.key();
        if let Some(&pos) = self.index.get(&key) {
            self.records[pos] = record;
            return pos;
        }
        self.records.push(record);
        let pos = self.records.len() - 1;
        self.index.insert(key, pos);
        pos
    }

    /// Insert a record at `pos` (clamped to the end). Fails, leaving the
    /// collection untouched, when a record with the same key exists.
    pub fn insert(&mut self, pos: usize, record: Record) -> bool {
        if self.index.contains_key(&record.key()) {
            return false;
        }
        let pos = pos.min(self.records.len());
        self.records.insert(pos, record);
        self.reindex();
        true
    }

    /// Replace the record at `pos`. Fails, leaving the collection untouched,
    /// when the new key already belongs to a record at another position.
    pub fn replace(&mut self, pos: usize, record: Record) -> bool {
        if pos >= self.records.len() {
            return false;
        }
        let key = record.key();
        match self.index.get(&key) {
            Some(&other) if other != pos => return false,
            _ => {}
        }
        let old_key = self.records[pos].key();
        self.records[pos] = record;
        if old_key != key {
            self.index.remove(&old_key);
            self.index.insert(key, pos);
        }
        true
    }

    pub fn remove(&mut self, pos: usize) -> Option<Record> {
        if pos >= self.records.len() {
            return None;
        }
        let record = self.records.remove(pos);
        self.reindex();
        Some(record)
    }

    /// Set every record's entry number to its 1-based position.
    pub fn renumber(&mut self) {
        for (i, record) in self.records.iter_mut().enumerate() {
            record.entry = i + 1;
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.key(), i))
            .collect();
    }

    /// Position at which `record` would best be inserted, judged by its
    /// source references. See [`insertion_position_in`].
    pub fn insertion_position(&self, record: &Record, synonyms: &SourceSynonyms) -> usize {
        insertion_position_in(&self.records, record, synonyms)
    }
}

/// Right after the closest preceding record from the same source file (or a
/// synonym of it), else right before the closest following one, else at the
/// end.
pub fn insertion_position_in(records: &[Record], record: &Record, synonyms: &SourceSynonyms) -> usize {
    let Some(first) = record.sources.first() else {
        return records.len();
    };
    let mut files: HashSet<&str> = HashSet::new();
    files.insert(first.file.as_str());
    if let Some(aliases) = synonyms.get(&first.file) {
        files.extend(aliases.iter().map(String::as_str));
    }

    let mut after: Option<(usize, usize)> = None;
    let mut before: Option<(usize, usize)> = None;
    for (pos, other) in records.iter().enumerate() {
        for src in other.sources.iter().filter(|s| files.contains(s.file.as_str())) {
            if src.line <= first.line {
                if after.map_or(true, |(line, _)| src.line >= line) {
                    after = Some((src.line, pos));
                }
            } else if before.map_or(true, |(line, _)| src.line < line) {
                before = Some((src.line, pos));
            }
        }
    }
    match (after, before) {
        (Some((_, pos)), _) => pos + 1,
        (None, Some((_, pos))) => pos,
        (None, None) => records.len(),
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
