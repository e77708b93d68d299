//! Textual form of embedded diffs.
//!
//! Each diffed field holds its two sides in one string, removed text in
//! `{-…-}` and added text in `{+…+}`:
//!
//! ```text
//! A new {-type-}{+kind+} of view
//! ```
//!
//! Wrapper sequences already present in the text are escaped by inserting
//! `~` between their two characters. A trailing `~` marks that the field is
//! absent on the other side. State changes, context padding and flag
//! changes go into an `ediff:` auto comment; the routing becomes a flag.

use crate::ediff::model::{
    CollectionDiff, DiffField, DiffRouting, EmbeddedDiffRecord, FieldDiff, StateDiff,
    FLAG_LIST_SEPARATOR,
};
use crate::model::{Collection, Record, FLAG_FUZZY};
use crate::textdiff::{Segment, SegmentKind};

pub const EDIFF_COMMENT_HEAD: &str = "ediff:";
const COMMENT_ESCAPE: char = '~';
const INDICATOR_SEPARATOR: &str = ", ";
const IND_STATE: &str = "state";
const IND_CTXTPAD: &str = "ctxtpad";
const IND_FLAGS: &str = "flags";
const STATE_FUZZY: &str = "fuzzy";
const STATE_OBSOLETE: &str = "obsolete";

const ADDED_OPEN: &str = "{+";
const ADDED_CLOSE: &str = "+}";
const REMOVED_OPEN: &str = "{-";
const REMOVED_CLOSE: &str = "-}";
const WRAPPER_PAIRS: [(char, char); 4] = [('{', '-'), ('-', '}'), ('{', '+'), ('+', '}')];
const ESCAPE: char = '~';
const OTHER_ABSENT: char = '~';
const CTXTPAD_SEPARATOR: char = '|';
const CTXTPAD_NO_CONTEXT: char = '~';

/// Insert (or with `unescape`, remove) one escape character between the two
/// characters of every wrapper sequence, counting escapes already there.
fn escape_wrappers(text: &str, unescape: bool) -> String {
    let mut text = text.to_string();
    for (start, end) in WRAPPER_PAIRS {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len() + 4);
        let mut i = 0;
        while i < chars.len() {
            out.push(chars[i]);
            if chars[i] != start {
                i += 1;
                continue;
            }
            let mut j = i + 1;
            while j < chars.len() && chars[j] == ESCAPE {
                j += 1;
            }
            let escapes = j - i - 1;
            if j < chars.len() && chars[j] == end && (!unescape || escapes > 0) {
                let kept = if unescape { escapes - 1 } else { escapes + 1 };
                out.extend(std::iter::repeat(ESCAPE).take(kept));
                out.push(end);
                i = j + 1;
            } else {
                i += 1;
            }
        }
        text = out;
    }
    text
}

/// Render segments as embedded text. `absent_other` marks that only the
/// side of the given segments exists.
pub fn embed_segments(segments: &[Segment], absent_other: bool) -> String {
    let mut text = String::new();
    for seg in segments {
        let escaped = escape_wrappers(&seg.text, false);
        match seg.kind {
            SegmentKind::Equal => text.push_str(&escaped),
            SegmentKind::Added => {
                text.push_str(ADDED_OPEN);
                text.push_str(&escaped);
                text.push_str(ADDED_CLOSE);
            }
            SegmentKind::Removed => {
                text.push_str(REMOVED_OPEN);
                text.push_str(&escaped);
                text.push_str(REMOVED_CLOSE);
            }
        }
    }
    if absent_other || text.ends_with(OTHER_ABSENT) {
        text.push(OTHER_ABSENT);
    }
    text
}

/// Parse embedded text back into segments. The flag is set when the text
/// marks the other side as absent.
pub fn parse_embedded(text: &str) -> (Vec<Segment>, bool) {
    let (body, marked) = match text.strip_suffix(OTHER_ABSENT) {
        Some(body) => (body, true),
        None => (text, false),
    };

    let mut segments: Vec<Segment> = Vec::new();
    let mut equal = String::new();
    let mut rest = body;
    while !rest.is_empty() {
        let wrapped = [
            (ADDED_OPEN, ADDED_CLOSE, SegmentKind::Added),
            (REMOVED_OPEN, REMOVED_CLOSE, SegmentKind::Removed),
        ]
        .into_iter()
        .find_map(|(open, close, kind)| {
            let inner = rest.strip_prefix(open)?;
            let end = inner.find(close)?;
            Some((kind, &inner[..end], &inner[end + close.len()..]))
        });
        match wrapped {
            Some((kind, inner, after)) => {
                if !equal.is_empty() {
                    segments.push(Segment::new(SegmentKind::Equal, escape_wrappers(&equal, true)));
                    equal.clear();
                }
                segments.push(Segment::new(kind, escape_wrappers(inner, true)));
                rest = after;
            }
            None => {
                let mut chars = rest.chars();
                if let Some(c) = chars.next() {
                    equal.push(c);
                }
                rest = chars.as_str();
            }
        }
    }
    if !equal.is_empty() {
        segments.push(Segment::new(SegmentKind::Equal, escape_wrappers(&equal, true)));
    }

    let one_sided = !segments.is_empty()
        && (segments.iter().all(|s| s.kind == SegmentKind::Added)
            || segments.iter().all(|s| s.kind == SegmentKind::Removed));
    (segments, marked && one_sided)
}

fn embed_field(diff: &FieldDiff) -> String {
    let absent_other = diff.old_present != diff.new_present;
    let mut segments = diff.segments.clone();
    if absent_other && segments.is_empty() {
        let kind = if diff.new_present {
            SegmentKind::Added
        } else {
            SegmentKind::Removed
        };
        segments.push(Segment::new(kind, ""));
    }
    embed_segments(&segments, absent_other)
}

fn parse_field(field: DiffField, text: &str, has_old: bool, has_new: bool) -> FieldDiff {
    let (segments, absent_other) = parse_embedded(text);
    let (old_present, new_present) = if absent_other {
        let added = segments.iter().all(|s| s.kind == SegmentKind::Added);
        (!added, added)
    } else {
        (has_old, has_new)
    };
    let segments = segments
        .into_iter()
        .filter(|s| !s.text.is_empty())
        .collect();
    FieldDiff {
        field,
        segments,
        old_present,
        new_present,
    }
}

fn is_ediff_comment(comment: &str) -> bool {
    comment.starts_with(EDIFF_COMMENT_HEAD)
}

/// Comments that merely look like an ediff comment get one more escape
/// character in front.
fn escape_comment(comment: &str) -> String {
    let trimmed = comment.trim_start_matches(COMMENT_ESCAPE);
    if trimmed.starts_with(EDIFF_COMMENT_HEAD) {
        format!("{}{}", COMMENT_ESCAPE, comment)
    } else {
        comment.to_string()
    }
}

fn unescape_comment(comment: &str) -> String {
    let trimmed = comment.trim_start_matches(COMMENT_ESCAPE);
    if trimmed.len() < comment.len() && trimmed.starts_with(EDIFF_COMMENT_HEAD) {
        comment[COMMENT_ESCAPE.len_utf8()..].to_string()
    } else {
        comment.to_string()
    }
}

impl EmbeddedDiffRecord {
    /// Textual form of the diff.
    pub fn to_record(&self) -> Record {
        self.to_record_padded(None)
    }

    /// Textual form with `padding` appended to the context, for embedding
    /// into a collection where the plain key is taken.
    pub fn to_record_padded(&self, padding: Option<&str>) -> Record {
        let mut record = self.base.clone();
        record.context = None;
        record.id = String::new();
        record.plural = None;
        record.clear_previous();
        record.translations.clear();
        record.manual_comments.clear();

        let mut flags_text: Option<String> = None;
        for diff in &self.fields {
            let text = embed_field(diff);
            match diff.field {
                DiffField::Context => record.context = Some(text),
                DiffField::Id => record.id = text,
                DiffField::Plural => record.plural = Some(text),
                DiffField::PreviousContext => record.previous_context = Some(text),
                DiffField::PreviousId => record.previous_id = Some(text),
                DiffField::PreviousPlural => record.previous_plural = Some(text),
                DiffField::Translation(_) => record.translations.push(text),
                DiffField::ManualComment(_) => record.manual_comments.push(text),
                DiffField::Flags => {
                    if diff.is_change() {
                        flags_text = Some(text);
                    }
                }
            }
        }

        let primary = if self.has_new { self.to_new() } else { self.to_old() };
        record.flags = primary.map(|r| r.flags).unwrap_or_default();
        record.flags.remove(FLAG_FUZZY);
        let (fuzzy, obsolete) = if self.has_new {
            (self.state.new_fuzzy, self.state.new_obsolete)
        } else {
            (self.state.old_fuzzy, self.state.old_obsolete)
        };
        record.set_fuzzy(fuzzy);
        record.obsolete = obsolete;
        record.flags.insert(self.routing.flag().to_string());

        let mut indicators = Vec::new();
        let mut state_tokens = Vec::new();
        for (name, old, new) in [
            (STATE_FUZZY, self.state.old_fuzzy, self.state.new_fuzzy),
            (STATE_OBSOLETE, self.state.old_obsolete, self.state.new_obsolete),
        ] {
            if old != new {
                let kind = if new {
                    SegmentKind::Added
                } else {
                    SegmentKind::Removed
                };
                state_tokens.push(embed_segments(&[Segment::new(kind, name)], false));
            }
        }
        if !state_tokens.is_empty() {
            indicators.push(format!("{} {}", IND_STATE, state_tokens.join(" ")));
        }
        if let Some(pad) = padding {
            let suffix = if record.context.is_none() {
                format!("{}{}{}", CTXTPAD_SEPARATOR, pad, CTXTPAD_NO_CONTEXT)
            } else {
                format!("{}{}", CTXTPAD_SEPARATOR, pad)
            };
            record.context = Some(format!("{}{}", record.context.unwrap_or_default(), suffix));
            indicators.push(format!("{} {}", IND_CTXTPAD, pad));
        }
        if let Some(text) = flags_text {
            indicators.push(format!("{} {}", IND_FLAGS, text));
        }

        record.auto_comments = record.auto_comments.iter().map(|c| escape_comment(c)).collect();
        if !indicators.is_empty() {
            record.auto_comments.insert(
                0,
                format!("{} {}", EDIFF_COMMENT_HEAD, indicators.join(INDICATOR_SEPARATOR)),
            );
        }
        record
    }

    /// Read a diff back from its textual form. `None` when the record carries
    /// no routing flag.
    pub fn from_record(record: &Record) -> Option<EmbeddedDiffRecord> {
        let routing = record.flags.iter().find_map(|f| DiffRouting::from_flag(f))?;

        let mut state_tokens: Vec<Segment> = Vec::new();
        let mut ctxtpad: Option<String> = None;
        let mut flags_text: Option<String> = None;
        let mut auto_comments = Vec::new();
        for comment in &record.auto_comments {
            if !is_ediff_comment(comment) {
                auto_comments.push(unescape_comment(comment));
                continue;
            }
            let body = comment[EDIFF_COMMENT_HEAD.len()..].trim();
            let mut rest = body;
            while !rest.is_empty() {
                // flags text may hold separators; it always comes last
                if let Some(text) = rest.strip_prefix(IND_FLAGS).and_then(|r| r.strip_prefix(' ')) {
                    flags_text = Some(text.to_string());
                    break;
                }
                let (indicator, tail) = rest.split_once(INDICATOR_SEPARATOR).unwrap_or((rest, ""));
                rest = tail;
                let mut words = indicator.split_whitespace();
                match words.next() {
                    Some(IND_STATE) => {
                        for token in words {
                            state_tokens.extend(parse_embedded(token).0);
                        }
                    }
                    Some(IND_CTXTPAD) => ctxtpad = words.next().map(str::to_string),
                    _ => {}
                }
            }
        }

        let mut context = record.context.clone();
        if let (Some(pad), Some(ctx)) = (&ctxtpad, &context) {
            let bare = format!("{}{}{}", CTXTPAD_SEPARATOR, pad, CTXTPAD_NO_CONTEXT);
            let padded = format!("{}{}", CTXTPAD_SEPARATOR, pad);
            context = if ctx.ends_with(&bare) {
                None
            } else {
                ctx.strip_suffix(&padded).map(str::to_string)
            };
        }

        let (id_segments, id_one_sided) = parse_embedded(&record.id);
        let (has_old, has_new) = if id_one_sided {
            let added = id_segments.iter().all(|s| s.kind == SegmentKind::Added);
            (!added, added)
        } else {
            (true, true)
        };

        let mut fields = Vec::new();
        let scalars = [
            (DiffField::Context, context.as_deref()),
            (DiffField::Id, Some(record.id.as_str())),
            (DiffField::Plural, record.plural.as_deref()),
            (DiffField::PreviousContext, record.previous_context.as_deref()),
            (DiffField::PreviousId, record.previous_id.as_deref()),
            (DiffField::PreviousPlural, record.previous_plural.as_deref()),
        ];
        for (field, text) in scalars {
            if let Some(text) = text {
                fields.push(parse_field(field, text, has_old, has_new));
            }
        }
        for (i, text) in record.translations.iter().enumerate() {
            fields.push(parse_field(DiffField::Translation(i), text, has_old, has_new));
        }
        for (i, text) in record.manual_comments.iter().enumerate() {
            fields.push(parse_field(DiffField::ManualComment(i), text, has_old, has_new));
        }

        let plain_flags: Vec<&str> = record
            .flags
            .iter()
            .map(String::as_str)
            .filter(|f| *f != FLAG_FUZZY && DiffRouting::from_flag(f).is_none())
            .collect();
        match flags_text {
            Some(text) => fields.push(parse_field(DiffField::Flags, &text, has_old, has_new)),
            None if !plain_flags.is_empty() => fields.push(FieldDiff {
                field: DiffField::Flags,
                segments: vec![Segment::new(
                    SegmentKind::Equal,
                    plain_flags.join(FLAG_LIST_SEPARATOR),
                )],
                old_present: has_old,
                new_present: has_new,
            }),
            None => {}
        }

        let mut state = StateDiff {
            old_fuzzy: has_old && record.is_fuzzy(),
            new_fuzzy: has_new && record.is_fuzzy(),
            old_obsolete: has_old && record.obsolete,
            new_obsolete: has_new && record.obsolete,
        };
        for token in &state_tokens {
            let (old, new) = match token.kind {
                SegmentKind::Added => (false, true),
                SegmentKind::Removed => (true, false),
                SegmentKind::Equal => continue,
            };
            match token.text.as_str() {
                STATE_FUZZY => {
                    state.old_fuzzy = old;
                    state.new_fuzzy = new;
                }
                STATE_OBSOLETE => {
                    state.old_obsolete = old;
                    state.new_obsolete = new;
                }
                _ => {}
            }
        }

        let mut base = record.clone();
        base.auto_comments = auto_comments;
        base.flags.retain(|f| DiffRouting::from_flag(f).is_none());
        Some(EmbeddedDiffRecord {
            base,
            has_old,
            has_new,
            fields,
            state,
            routing,
        })
    }
}

/// Generates context paddings that no record of a collection uses yet
struct PaddingSource {
    counter: usize,
}

impl PaddingSource {
    fn new() -> Self {
        Self { counter: 0 }
    }

    fn next(&mut self) -> String {
        const ALNUMS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
        self.counter += 1;
        let mut n = self.counter;
        let mut pad = String::with_capacity(5);
        for _ in 0..5 {
            pad.push(ALNUMS[n % ALNUMS.len()] as char);
            n /= ALNUMS.len();
        }
        pad
    }
}

/// Textual form of `diff`, with the context padded if its key is already
/// taken in `collection` by a record at another position than `ok_pos`.
pub(crate) fn to_record_avoiding(
    diff: &EmbeddedDiffRecord,
    collection: &Collection,
    ok_pos: Option<usize>,
) -> Record {
    let record = diff.to_record();
    let taken = |r: &Record| {
        collection
            .position(&r.key())
            .is_some_and(|pos| Some(pos) != ok_pos)
    };
    if !taken(&record) {
        return record;
    }
    let mut source = PaddingSource::new();
    loop {
        let pad = source.next();
        let padded = diff.to_record_padded(Some(&pad));
        if !taken(&padded) {
            return padded;
        }
    }
}

impl CollectionDiff {
    /// Embed every diff into a collection of textual diff records.
    pub fn to_collection(&self) -> Collection {
        let mut collection = Collection::new(self.name.clone());
        for diff in &self.diffs {
            let record = to_record_avoiding(diff, &collection, None);
            collection.add(record);
        }
        collection
    }

    /// Read back the diffs embedded in a collection; records without a
    /// routing flag are skipped.
    pub fn from_collection(collection: &Collection) -> Self {
        Self {
            name: collection.name().to_string(),
            diffs: collection
                .iter()
                .filter_map(EmbeddedDiffRecord::from_record)
                .collect(),
        }
    }
}
