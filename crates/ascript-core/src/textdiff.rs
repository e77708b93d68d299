//! Text diff primitive.
//!
//! Diffs are sequences of [`Segment`]s. Concatenating the equal and removed
//! segments gives the old text back, concatenating the equal and added ones
//! gives the new text.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    Equal,
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
}

impl Segment {
    pub fn new(kind: SegmentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Which segments survive when a diff is reduced to one side of the change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddRem {
    Added,
    Removed,
    Equal,
}

impl AddRem {
    /// Parse a reduction spec: a mode character (`a`/`+`, `r`/`-`, `e`/`=`)
    /// optionally followed by the separator used to join the kept segments.
    pub fn parse(spec: &str) -> Option<(AddRem, String)> {
        let mut chars = spec.chars();
        let mode = match chars.next()? {
            'a' | '+' => AddRem::Added,
            'r' | '-' => AddRem::Removed,
            'e' | '=' => AddRem::Equal,
            _ => return None,
        };
        let rest: String = chars.collect();
        let separator = if rest.is_empty() { " ".to_string() } else { rest };
        Some((mode, separator))
    }

    fn keeps(self, kind: SegmentKind) -> bool {
        matches!(
            (self, kind),
            (AddRem::Added, SegmentKind::Added)
                | (AddRem::Removed, SegmentKind::Removed)
                | (AddRem::Equal, SegmentKind::Equal)
        )
    }
}

/// Pluggable text differ
pub trait TextDiffer {
    fn diff(&self, old: &str, new: &str) -> Vec<Segment>;

    /// Similarity in `[0, 1]`, 1 meaning identical.
    fn ratio(&self, old: &str, new: &str) -> f64 {
        similarity(&self.diff(old, new))
    }
}

/// Word-level longest-common-subsequence differ.
///
/// Texts are split into runs of word characters, runs of whitespace and
/// single punctuation characters, so changes never cut through a word.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordDiffer;

impl TextDiffer for WordDiffer {
    fn diff(&self, old: &str, new: &str) -> Vec<Segment> {
        let a = tokenize(old);
        let b = tokenize(new);
        let (n, m) = (a.len(), b.len());

        // lcs[i][j]: LCS length of a[i..] and b[j..]
        let mut lcs = vec![vec![0usize; m + 1]; n + 1];
        for i in (0..n).rev() {
            for j in (0..m).rev() {
                lcs[i][j] = if a[i] == b[j] {
                    lcs[i + 1][j + 1] + 1
                } else {
                    lcs[i + 1][j].max(lcs[i][j + 1])
                };
            }
        }

        let mut builder = SegmentBuilder::default();
        let (mut i, mut j) = (0, 0);
        while i < n || j < m {
            if i < n && j < m && a[i] == b[j] {
                builder.push(SegmentKind::Equal, a[i]);
                i += 1;
                j += 1;
            } else if j >= m || (i < n && lcs[i + 1][j] >= lcs[i][j + 1]) {
                builder.push(SegmentKind::Removed, a[i]);
                i += 1;
            } else {
                builder.push(SegmentKind::Added, b[j]);
                j += 1;
            }
        }
        builder.finish()
    }
}

/// Collects tokens into segments; every change run is emitted as one removed
/// segment followed by one added segment.
#[derive(Default)]
struct SegmentBuilder {
    segments: Vec<Segment>,
    removed: String,
    added: String,
}

impl SegmentBuilder {
    fn push(&mut self, kind: SegmentKind, text: &str) {
        match kind {
            SegmentKind::Removed => self.removed.push_str(text),
            SegmentKind::Added => self.added.push_str(text),
            SegmentKind::Equal => {
                self.flush_changes();
                match self.segments.last_mut() {
                    Some(last) if last.kind == SegmentKind::Equal => last.text.push_str(text),
                    _ => self.segments.push(Segment::new(SegmentKind::Equal, text)),
                }
            }
        }
    }

    fn flush_changes(&mut self) {
        if !self.removed.is_empty() {
            let text = std::mem::take(&mut self.removed);
            self.segments.push(Segment::new(SegmentKind::Removed, text));
        }
        if !self.added.is_empty() {
            let text = std::mem::take(&mut self.added);
            self.segments.push(Segment::new(SegmentKind::Added, text));
        }
    }

    fn finish(mut self) -> Vec<Segment> {
        self.flush_changes();
        self.segments
    }
}

fn tokenize(text: &str) -> Vec<&str> {
    #[derive(PartialEq, Clone, Copy)]
    enum Class {
        Word,
        Space,
        Other,
    }
    let class_of = |c: char| {
        if c.is_alphanumeric() || c == '_' {
            Class::Word
        } else if c.is_whitespace() {
            Class::Space
        } else {
            Class::Other
        }
    };

    let mut tokens = Vec::new();
    let mut start = 0;
    let mut current: Option<Class> = None;
    for (pos, c) in text.char_indices() {
        let class = class_of(c);
        if let Some(prev) = current {
            if prev != class || class == Class::Other {
                tokens.push(&text[start..pos]);
                start = pos;
            }
        }
        current = Some(class);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

/// Similarity ratio of a diff: twice the equal characters over the total
/// characters of both sides.
pub fn similarity(segments: &[Segment]) -> f64 {
    let (mut equal, mut total) = (0usize, 0usize);
    for seg in segments {
        let len = seg.text.chars().count();
        match seg.kind {
            SegmentKind::Equal => {
                equal += len;
                total += 2 * len;
            }
            SegmentKind::Added | SegmentKind::Removed => total += len,
        }
    }
    if total == 0 {
        1.0
    } else {
        (2 * equal) as f64 / total as f64
    }
}

/// Text of the old side of a diff.
pub fn old_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .filter(|s| s.kind != SegmentKind::Added)
        .map(|s| s.text.as_str())
        .collect()
}

/// Text of the new side of a diff.
pub fn new_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .filter(|s| s.kind != SegmentKind::Removed)
        .map(|s| s.text.as_str())
        .collect()
}

/// Join the segments selected by `mode` with `separator`.
pub fn select_segments(segments: &[Segment], mode: AddRem, separator: &str) -> String {
    segments
        .iter()
        .filter(|s| mode.keeps(s.kind))
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}
