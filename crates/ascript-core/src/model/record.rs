use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Flag marking a record as approximate after a template re-merge
pub const FLAG_FUZZY: &str = "fuzzy";

/// Auto comment prefix listing the summit branches a record belongs to
const BRANCH_COMMENT_PREFIX: &str = "+>";

/// Lookup key of a record: optional disambiguating context plus the id text
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub context: Option<String>,
    pub id: String,
}

impl Key {
    pub fn new(context: Option<&str>, id: &str) -> Self {
        Self {
            context: context.map(str::to_string),
            id: id.to_string(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|~|{}", self.context.as_deref().unwrap_or(""), self.id)
    }
}

/// Source reference of a record (file, line)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub file: String,
    pub line: usize,
}

impl SourceRef {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

/// The identifying triple (context, id, plural), either current or previous
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdFields {
    pub context: Option<String>,
    pub id: Option<String>,
    pub plural: Option<String>,
}

/// Translation state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordState {
    Translated,
    Fuzzy,
    Untranslated,
    Obsolete,
}

/// One translatable entry of a catalog
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    pub context: Option<String>,
    pub id: String,
    pub plural: Option<String>,
    #[serde(default)]
    pub previous_context: Option<String>,
    #[serde(default)]
    pub previous_id: Option<String>,
    #[serde(default)]
    pub previous_plural: Option<String>,
    #[serde(default)]
    pub translations: Vec<String>,
    #[serde(default)]
    pub manual_comments: Vec<String>,
    #[serde(default)]
    pub auto_comments: Vec<String>,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    #[serde(default)]
    pub flags: BTreeSet<String>,
    #[serde(default)]
    pub obsolete: bool,
    /// 1-based entry number within the parsed catalog, 0 when unknown
    #[serde(default)]
    pub entry: usize,
    /// 1-based line number within the parsed catalog, 0 when unknown
    #[serde(default)]
    pub line: usize,
}

/// Borrowed view of the parts of a record that survive re-extraction.
///
/// Two records with equal invariants are the same record as far as history
/// and patching are concerned, even if their sources or positions differ.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordInvariant<'a> {
    context: Option<&'a str>,
    id: &'a str,
    plural: Option<&'a str>,
    previous_context: Option<&'a str>,
    previous_id: Option<&'a str>,
    previous_plural: Option<&'a str>,
    translations: &'a [String],
    manual_comments: &'a [String],
    fuzzy: bool,
    obsolete: bool,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = Some(plural.into());
        self
    }

    pub fn with_translations<I, S>(mut self, translations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.translations = translations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source(mut self, file: impl Into<String>, line: usize) -> Self {
        self.sources.push(SourceRef::new(file, line));
        self
    }

    pub fn key(&self) -> Key {
        Key {
            context: self.context.clone(),
            id: self.id.clone(),
        }
    }

    pub fn is_fuzzy(&self) -> bool {
        self.flags.contains(FLAG_FUZZY)
    }

    pub fn set_fuzzy(&mut self, fuzzy: bool) {
        if fuzzy {
            self.flags.insert(FLAG_FUZZY.to_string());
        } else {
            self.flags.remove(FLAG_FUZZY);
        }
    }

    /// Not fuzzy, and every translation slot is filled.
    pub fn is_translated(&self) -> bool {
        !self.is_fuzzy()
            && !self.translations.is_empty()
            && self.translations.iter().all(|t| !t.is_empty())
    }

    pub fn is_untranslated(&self) -> bool {
        !self.is_fuzzy() && !self.is_translated()
    }

    pub fn is_active(&self) -> bool {
        self.is_translated() && !self.obsolete
    }

    pub fn state(&self) -> RecordState {
        if self.obsolete {
            RecordState::Obsolete
        } else if self.is_fuzzy() {
            RecordState::Fuzzy
        } else if self.is_translated() {
            RecordState::Translated
        } else {
            RecordState::Untranslated
        }
    }

    pub fn has_previous(&self) -> bool {
        self.previous_id.is_some()
    }

    pub fn current_ids(&self) -> IdFields {
        IdFields {
            context: self.context.clone(),
            id: Some(self.id.clone()),
            plural: self.plural.clone(),
        }
    }

    pub fn previous_ids(&self) -> IdFields {
        IdFields {
            context: self.previous_context.clone(),
            id: self.previous_id.clone(),
            plural: self.previous_plural.clone(),
        }
    }

    pub fn set_current_ids(&mut self, ids: IdFields) {
        self.context = ids.context;
        self.id = ids.id.unwrap_or_default();
        self.plural = ids.plural;
    }

    pub fn set_previous_ids(&mut self, ids: IdFields) {
        self.previous_context = ids.context;
        self.previous_id = ids.id;
        self.previous_plural = ids.plural;
    }

    pub fn clear_previous(&mut self) {
        self.set_previous_ids(IdFields::default());
    }

    /// Key formed from the previous fields, or the own key when there are none.
    pub fn inverted_key(&self) -> Key {
        match &self.previous_id {
            Some(previous_id) => Key {
                context: self.previous_context.clone(),
                id: previous_id.clone(),
            },
            None => self.key(),
        }
    }

    /// Summit branches listed in `+>` auto comments
    pub fn branches(&self) -> BTreeSet<String> {
        self.auto_comments
            .iter()
            .filter_map(|c| c.strip_prefix(BRANCH_COMMENT_PREFIX))
            .flat_map(|rest| rest.split_whitespace().map(str::to_string))
            .collect()
    }

    pub fn invariant(&self) -> RecordInvariant<'_> {
        RecordInvariant {
            context: self.context.as_deref(),
            id: &self.id,
            plural: self.plural.as_deref(),
            previous_context: self.previous_context.as_deref(),
            previous_id: self.previous_id.as_deref(),
            previous_plural: self.previous_plural.as_deref(),
            translations: &self.translations,
            manual_comments: &self.manual_comments,
            fuzzy: self.is_fuzzy(),
            obsolete: self.obsolete,
        }
    }

    pub fn same_invariant(&self, other: &Record) -> bool {
        self.invariant() == other.invariant()
    }

    /// Copy the invariant parts and flags of `other` into this record,
    /// keeping sources, auto comments and positions.
    pub fn set_invariant_from(&mut self, other: &Record) {
        self.context = other.context.clone();
        self.id = other.id.clone();
        self.plural = other.plural.clone();
        self.previous_context = other.previous_context.clone();
        self.previous_id = other.previous_id.clone();
        self.previous_plural = other.previous_plural.clone();
        self.translations = other.translations.clone();
        self.manual_comments = other.manual_comments.clone();
        self.flags = other.flags.clone();
        self.obsolete = other.obsolete;
    }

    /// Drop previous fields from records that cannot meaningfully carry them.
    pub fn cleanup(&mut self) {
        if !self.is_fuzzy() || self.previous_id.is_none() {
            self.clear_previous();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states() {
        let mut rec = Record::new("File").with_translations(["Fichier"]);
        assert_eq!(rec.state(), RecordState::Translated);
        assert!(rec.is_active());

        rec.set_fuzzy(true);
        assert_eq!(rec.state(), RecordState::Fuzzy);
        assert!(!rec.is_translated());
        assert!(!rec.is_untranslated());

        rec.set_fuzzy(false);
        rec.obsolete = true;
        assert_eq!(rec.state(), RecordState::Obsolete);
        assert!(rec.is_translated());
        assert!(!rec.is_active());
    }

    #[test]
    fn test_partial_plural_is_untranslated() {
        let rec = Record::new("a file")
            .with_plural("%d files")
            .with_translations(["un fichier", ""]);
        assert!(rec.is_untranslated());
    }

    #[test]
    fn test_invariant_ignores_positions_and_sources() {
        let a = Record::new("File").with_source("a.c", 10);
        let mut b = Record::new("File").with_source("b.c", 20);
        b.entry = 7;
        b.auto_comments.push("extracted".to_string());
        assert!(a.same_invariant(&b));

        b.manual_comments.push("note".to_string());
        assert!(!a.same_invariant(&b));
    }

    #[test]
    fn test_invariant_counts_only_fuzzy_among_flags() {
        let plain = Record::new("%d files").with_translations(["%d fichiers"]);
        let mut formatted = plain.clone();
        formatted.flags.insert("c-format".to_string());
        assert!(plain.same_invariant(&formatted));

        formatted.set_fuzzy(true);
        assert!(!plain.same_invariant(&formatted));
    }

    #[test]
    fn test_inverted_key() {
        let mut rec = Record::new("Open file").with_context("menu");
        assert_eq!(rec.inverted_key(), rec.key());

        rec.previous_id = Some("Open".to_string());
        assert_eq!(rec.inverted_key(), Key::new(None, "Open"));
    }

    #[test]
    fn test_cleanup_drops_previous_of_non_fuzzy() {
        let mut rec = Record::new("Open file");
        rec.previous_id = Some("Open".to_string());
        rec.cleanup();
        assert!(!rec.has_previous());

        let mut fuzzy = Record::new("Open file");
        fuzzy.set_fuzzy(true);
        fuzzy.previous_id = Some("Open".to_string());
        fuzzy.cleanup();
        assert!(fuzzy.has_previous());
    }

    #[test]
    fn test_branches() {
        let mut rec = Record::new("x");
        rec.auto_comments.push("+> trunk stable".to_string());
        rec.auto_comments.push("not a branch".to_string());
        let branches = rec.branches();
        assert!(branches.contains("trunk"));
        assert!(branches.contains("stable"));
        assert_eq!(branches.len(), 2);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(Key::new(Some("menu"), "File").to_string(), "menu|~|File");
        assert_eq!(Key::new(None, "File").to_string(), "|~|File");
    }
}
