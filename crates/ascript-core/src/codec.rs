//! Field history codec.
//!
//! Every tracked non-key field of a shadow record holds, per item (one per
//! translation slot, one for single-valued fields), a chain of entries
//! separated by newlines. Each modification appends one entry to every
//! chain:
//!
//! - `<literal><head>`: the item's new text,
//! - `<head>e<N>`: same text as modification entry N (0 = oldest),
//! - `<head>x`: no value.
//!
//! `<head>` is `|` followed by as many `~` as the entry's separator length,
//! chosen so that it occurs in none of the values written by that entry.

use crate::model::Record;
use std::collections::BTreeMap;

pub const SEPARATOR_HEAD: char = '|';
pub const SEPARATOR_EXT: char = '~';
const ITEM_TERMINATOR: char = '\n';
const MOD_NONE: char = 'x';
const MOD_EQUAL: char = 'e';

/// Non-key fields whose history is tracked, in encoding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackedField {
    Plural,
    Translations,
    PreviousContext,
    PreviousId,
    PreviousPlural,
    ManualComments,
}

pub const TRACKED_FIELDS: [TrackedField; 6] = [
    TrackedField::Plural,
    TrackedField::Translations,
    TrackedField::PreviousContext,
    TrackedField::PreviousId,
    TrackedField::PreviousPlural,
    TrackedField::ManualComments,
];

/// Decoded values per field, per item, per modification entry (oldest first)
pub type FieldChains = BTreeMap<TrackedField, Vec<Vec<Option<String>>>>;

impl TrackedField {
    pub fn is_previous(self) -> bool {
        matches!(
            self,
            TrackedField::PreviousContext | TrackedField::PreviousId | TrackedField::PreviousPlural
        )
    }

    /// Items of the field exactly as stored on the record.
    pub fn raw_items(self, record: &Record) -> Vec<String> {
        let single = |v: &Option<String>| v.iter().cloned().collect::<Vec<_>>();
        match self {
            TrackedField::Plural => single(&record.plural),
            TrackedField::Translations => record.translations.clone(),
            TrackedField::PreviousContext => single(&record.previous_context),
            TrackedField::PreviousId => single(&record.previous_id),
            TrackedField::PreviousPlural => single(&record.previous_plural),
            TrackedField::ManualComments => {
                if record.manual_comments.is_empty() {
                    Vec::new()
                } else {
                    vec![record.manual_comments.join("\n")]
                }
            }
        }
    }

    /// Items subject to ascription: previous fields of a non-fuzzy record
    /// carry no meaning and count as absent.
    pub fn tracked_items(self, record: &Record) -> Vec<String> {
        if self.is_previous() && !record.is_fuzzy() {
            Vec::new()
        } else {
            self.raw_items(record)
        }
    }

    /// Inverse of [`raw_items`](Self::raw_items).
    pub fn assign(self, record: &mut Record, items: Vec<String>) {
        let first = items.first().cloned();
        match self {
            TrackedField::Plural => record.plural = first,
            TrackedField::Translations => record.translations = items,
            TrackedField::PreviousContext => record.previous_context = first,
            TrackedField::PreviousId => record.previous_id = first,
            TrackedField::PreviousPlural => record.previous_plural = first,
            TrackedField::ManualComments => {
                record.manual_comments = first
                    .map(|joined| joined.split('\n').map(str::to_string).collect())
                    .unwrap_or_default();
            }
        }
    }
}

pub fn separator_head(len: usize) -> String {
    let mut head = String::with_capacity(len + 1);
    head.push(SEPARATOR_HEAD);
    head.extend(std::iter::repeat(SEPARATOR_EXT).take(len));
    head
}

/// Smallest separator length whose head occurs in no tracked value of the
/// record.
pub fn needed_separator_length(record: &Record) -> usize {
    let values: Vec<String> = TRACKED_FIELDS
        .iter()
        .flat_map(|f| f.tracked_items(record))
        .collect();
    let mut len = 1;
    loop {
        let head = separator_head(len);
        if !values.iter().any(|v| v.contains(&head)) {
            return len;
        }
        len += 1;
    }
}

/// True when the tracked non-key fields of `record` differ from `snapshot`.
pub fn tracked_fields_differ(snapshot: &Record, record: &Record) -> bool {
    TRACKED_FIELDS
        .iter()
        .any(|f| f.tracked_items(record) != f.raw_items(snapshot))
}

/// Append one modification entry for `record` to the chains of `shadow`.
///
/// `prior_separators` lists the separator lengths of the modification
/// entries already encoded (oldest first), and `chains` their decoded
/// values; both come from decoding the shadow record.
pub fn append_entry(
    shadow: &mut Record,
    record: &Record,
    separator_len: usize,
    prior_separators: &[usize],
    chains: &FieldChains,
) {
    let head = separator_head(separator_len);
    let padding = prior_separators
        .iter()
        .map(|&len| format!("{}{}", separator_head(len), MOD_NONE))
        .collect::<Vec<_>>()
        .join("\n");

    for field in TRACKED_FIELDS {
        let values = field.tracked_items(record);
        let mut items = field.raw_items(shadow);
        let field_chains = chains.get(&field);
        let count = values.len().max(items.len());

        for i in 0..count {
            let entry = match values.get(i) {
                Some(value) => {
                    let earlier = field_chains
                        .and_then(|c| c.get(i))
                        .and_then(|chain| chain.iter().position(|v| v.as_deref() == Some(value)));
                    match earlier {
                        Some(k) => format!("{}{}{}", head, MOD_EQUAL, k),
                        None => format!("{}{}", value, head),
                    }
                }
                None => format!("{}{}", head, MOD_NONE),
            };
            if i >= items.len() {
                items.push(padding.clone());
            }
            let text = &mut items[i];
            if !text.is_empty() || !prior_separators.is_empty() {
                text.push(ITEM_TERMINATOR);
            }
            text.push_str(&entry);
        }
        field.assign(shadow, items);
    }
}

/// Walks the chains of one shadow record entry by entry, oldest first.
pub struct HistoryDecoder {
    items: BTreeMap<TrackedField, Vec<String>>,
    cursors: BTreeMap<TrackedField, Vec<usize>>,
    chains: FieldChains,
    separators: Vec<usize>,
}

impl HistoryDecoder {
    pub fn new(shadow: &Record) -> Self {
        let items: BTreeMap<_, _> = TRACKED_FIELDS
            .iter()
            .map(|&f| (f, f.raw_items(shadow)))
            .collect();
        let cursors = items.iter().map(|(&f, v)| (f, vec![0; v.len()])).collect();
        let chains = items
            .iter()
            .map(|(&f, v)| (f, vec![Vec::new(); v.len()]))
            .collect();
        Self {
            items,
            cursors,
            chains,
            separators: Vec::new(),
        }
    }

    /// Decode the next modification entry into a record carrying only the
    /// tracked fields; key, state and the rest are up to the caller.
    pub fn step(&mut self, separator_len: usize) -> Record {
        let head = separator_head(separator_len);
        let mut snapshot = Record::default();

        for field in TRACKED_FIELDS {
            let (Some(texts), Some(cursors), Some(chains)) = (
                self.items.get(&field),
                self.cursors.get_mut(&field),
                self.chains.get_mut(&field),
            ) else {
                continue;
            };
            let mut values: Vec<String> = Vec::new();
            for (i, ((text, cursor), chain)) in texts
                .iter()
                .zip(cursors.iter_mut())
                .zip(chains.iter_mut())
                .enumerate()
            {
                let value = step_value(text, &head, cursor, chain);
                chain.push(value.clone());
                if let Some(value) = value {
                    if values.len() <= i {
                        values.resize(i + 1, String::new());
                    }
                    values[i] = value;
                }
            }
            field.assign(&mut snapshot, values);
        }
        self.separators.push(separator_len);
        snapshot
    }

    pub fn chains(&self) -> &FieldChains {
        &self.chains
    }

    /// Separator lengths of the entries decoded so far.
    pub fn separators(&self) -> &[usize] {
        &self.separators
    }
}

fn step_value(
    text: &str,
    head: &str,
    cursor: &mut usize,
    chain: &[Option<String>],
) -> Option<String> {
    let start = *cursor;
    if start > text.len() {
        return None;
    }
    let Some(rel) = text[start..].find(head) else {
        *cursor = text.len() + 1;
        return None;
    };
    let marker = start + rel;
    let mods_start = marker + head.len();
    let end = text[mods_start..]
        .find(ITEM_TERMINATOR)
        .map_or(text.len(), |r| mods_start + r);
    *cursor = end + ITEM_TERMINATOR.len_utf8();

    let mods = &text[mods_start..end];
    if let Some(p) = mods.find(MOD_EQUAL) {
        let digits: String = mods[p + 1..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        digits
            .parse::<usize>()
            .ok()
            .and_then(|k| chain.get(k).cloned().flatten())
    } else if mods.contains(MOD_NONE) {
        None
    } else {
        Some(text[start..marker].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_all(records: &[Record]) -> (Record, Vec<usize>) {
        let mut shadow = Record::new(records[0].id.clone());
        let mut seps = Vec::new();
        for record in records {
            let mut decoder = HistoryDecoder::new(&shadow);
            for &len in &seps {
                decoder.step(len);
            }
            let len = needed_separator_length(record);
            append_entry(&mut shadow, record, len, &seps, decoder.chains());
            seps.push(len);
        }
        (shadow, seps)
    }

    fn decode_all(shadow: &Record, seps: &[usize]) -> Vec<Record> {
        let mut decoder = HistoryDecoder::new(shadow);
        seps.iter().map(|&len| decoder.step(len)).collect()
    }

    fn tracked(record: &Record) -> Vec<Vec<String>> {
        TRACKED_FIELDS.iter().map(|f| f.tracked_items(record)).collect()
    }

    #[test]
    fn test_separator_length_avoids_values() {
        let plain = Record::new("x").with_translations(["plain"]);
        assert_eq!(needed_separator_length(&plain), 1);

        let piped = Record::new("x").with_translations(["a|~b", "c|~~d"]);
        assert_eq!(needed_separator_length(&piped), 3);
    }

    #[test]
    fn test_first_entry_is_literal() {
        let rec = Record::new("File").with_translations(["Fichier"]);
        let (shadow, _) = encode_all(&[rec]);
        assert_eq!(shadow.translations, vec!["Fichier|~"]);
    }

    #[test]
    fn test_back_reference_to_earlier_value() {
        let a = Record::new("File").with_translations(["Fichier"]);
        let b = Record::new("File").with_translations(["Dossier"]);
        let (shadow, seps) = encode_all(&[a.clone(), b, a.clone()]);
        assert_eq!(shadow.translations, vec!["Fichier|~\nDossier|~\n|~e0"]);
        let decoded = decode_all(&shadow, &seps);
        assert_eq!(decoded[2].translations, a.translations);
    }

    #[test]
    fn test_growing_plural_is_padded() {
        let singular = Record::new("file").with_translations(["fichier"]);
        let plural = Record::new("file")
            .with_plural("files")
            .with_translations(["fichier", "fichiers"]);
        let (shadow, seps) = encode_all(&[singular.clone(), plural.clone()]);
        assert_eq!(shadow.plural.as_deref(), Some("|~x\nfiles|~"));
        let decoded = decode_all(&shadow, &seps);
        assert_eq!(tracked(&decoded[0]), tracked(&singular));
        assert_eq!(tracked(&decoded[1]), tracked(&plural));
    }

    #[test]
    fn test_vanishing_field_is_none() {
        let mut with_comment = Record::new("x").with_translations(["y"]);
        with_comment.manual_comments = vec!["check this".to_string(), "twice".to_string()];
        let without = Record::new("x").with_translations(["y"]);
        let (shadow, seps) = encode_all(&[with_comment.clone(), without.clone()]);
        let decoded = decode_all(&shadow, &seps);
        assert_eq!(decoded[0].manual_comments, with_comment.manual_comments);
        assert!(decoded[1].manual_comments.is_empty());
    }

    #[test]
    fn test_previous_fields_ignored_when_not_fuzzy() {
        let mut rec = Record::new("Open file").with_translations(["Ouvrir"]);
        rec.previous_id = Some("Open".to_string());
        assert!(TrackedField::PreviousId.tracked_items(&rec).is_empty());
        rec.set_fuzzy(true);
        assert_eq!(TrackedField::PreviousId.tracked_items(&rec), vec!["Open"]);
    }

    #[test]
    fn test_values_containing_markers_round_trip() {
        let a = Record::new("x").with_translations(["ends with |", "has |~ inside"]);
        let b = Record::new("x").with_translations(["|~~|~", "line\nbreak"]);
        let (shadow, seps) = encode_all(&[a.clone(), b.clone()]);
        let decoded = decode_all(&shadow, &seps);
        assert_eq!(decoded[0].translations, a.translations);
        assert_eq!(decoded[1].translations, b.translations);
    }

    #[test]
    fn test_tracked_fields_differ() {
        let a = Record::new("x").with_translations(["y"]);
        let mut b = a.clone();
        assert!(!tracked_fields_differ(&a, &b));
        b.translations[0] = "z".to_string();
        assert!(tracked_fields_differ(&a, &b));
    }
}
