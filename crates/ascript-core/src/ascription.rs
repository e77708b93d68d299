//! Ascription log lines and the write side of history.
//!
//! A shadow record keeps one auto comment per ascription:
//!
//! ```text
//! modified: alice | 2020-01-01 10:00:00+0000 | 1f
//! reviewed/spell: bob | 2020-01-02 09:30:00+0100
//! ```
//!
//! The optional third descriptor carries the separator length of the
//! encoded field entry (see [`crate::codec`]) followed by the obsolete
//! (`o`) and fuzzy (`f`) marks.

use crate::codec::{
    append_entry, needed_separator_length, tracked_fields_differ, FieldChains, HistoryDecoder,
    TRACKED_FIELDS,
};
use crate::config::AscriptionConfig;
use crate::errors::{AscriptError, Result};
use crate::history::HistoryPoint;
use crate::model::{Collection, Record};
use crate::{log_op_end, log_op_error, log_op_start};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub const KIND_MODIFIED: &str = "modified";
pub const KIND_REVIEWED: &str = "reviewed";
const TAG_SEPARATOR: char = '/';
const KIND_SEPARATOR: char = ':';
const DESCRIPTOR_SEPARATOR: char = '|';
const MARK_OBSOLETE: char = 'o';
const MARK_FUZZY: char = 'f';

/// Format used when writing timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%z";

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M%z",
    "%Y-%m-%d %H:%M %z",
];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AscriptionKind {
    Modification,
    Review,
}

impl AscriptionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AscriptionKind::Modification => KIND_MODIFIED,
            AscriptionKind::Review => KIND_REVIEWED,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            KIND_MODIFIED => Some(AscriptionKind::Modification),
            KIND_REVIEWED => Some(AscriptionKind::Review),
            _ => None,
        }
    }
}

/// One parsed ascription line
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub kind: AscriptionKind,
    pub tag: String,
    pub user: String,
    pub timestamp: DateTime<FixedOffset>,
    /// Separator length of the field entry written with this line, 0 if none
    pub separator_len: usize,
    pub fuzzy: bool,
    pub obsolete: bool,
}

/// Why a log line was skipped
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LogLineError {
    #[error("no ascription kind")]
    MissingKind,

    #[error("unknown ascription kind '{0}'")]
    UnknownKind(String),

    #[error("wrong number of descriptors ({0})")]
    DescriptorCount(usize),

    #[error("empty user")]
    EmptyUser,

    #[error("unknown user '{0}'")]
    UnknownUser(String),

    #[error("malformed timestamp '{0}'")]
    BadTimestamp(String),

    #[error("malformed separator length '{0}'")]
    BadSeparator(String),
}

/// Parse one log line. The fuzzy/obsolete flags of the result reflect only
/// the marks present on this line.
pub fn parse_log_line(
    line: &str,
    config: &AscriptionConfig,
) -> std::result::Result<LogEntry, LogLineError> {
    let (head, rest) = line
        .split_once(KIND_SEPARATOR)
        .ok_or(LogLineError::MissingKind)?;
    let (kind, tag) = match head.split_once(TAG_SEPARATOR) {
        Some((kind, tag)) => (kind.trim(), tag.trim()),
        None => (head.trim(), ""),
    };
    let kind = AscriptionKind::parse(kind).ok_or_else(|| LogLineError::UnknownKind(kind.to_string()))?;

    let descriptors: Vec<&str> = rest.split(DESCRIPTOR_SEPARATOR).map(str::trim).collect();
    if !(2..=3).contains(&descriptors.len()) {
        return Err(LogLineError::DescriptorCount(descriptors.len()));
    }

    let user = descriptors[0];
    if user.is_empty() {
        return Err(LogLineError::EmptyUser);
    }
    if !config.has_user(user) {
        return Err(LogLineError::UnknownUser(user.to_string()));
    }

    let timestamp = parse_timestamp(descriptors[1])
        .ok_or_else(|| LogLineError::BadTimestamp(descriptors[1].to_string()))?;

    let mut entry = LogEntry {
        kind,
        tag: tag.to_string(),
        user: user.to_string(),
        timestamp,
        separator_len: 0,
        fuzzy: false,
        obsolete: false,
    };
    if let Some(&details) = descriptors.get(2) {
        let mut digits = details.to_string();
        if let Some(p) = digits.find(MARK_FUZZY) {
            entry.fuzzy = true;
            digits.remove(p);
        }
        if let Some(p) = digits.find(MARK_OBSOLETE) {
            entry.obsolete = true;
            digits.remove(p);
        }
        if !digits.is_empty() {
            entry.separator_len = digits
                .parse()
                .map_err(|_| LogLineError::BadSeparator(details.to_string()))?;
        }
    }
    Ok(entry)
}

/// Format a log line; `with_details` adds the separator length and marks.
pub fn format_log_line(entry: &LogEntry, with_details: bool) -> String {
    let mut line = entry.kind.as_str().to_string();
    if !entry.tag.is_empty() {
        line.push(TAG_SEPARATOR);
        line.push_str(&entry.tag);
    }
    line.push(KIND_SEPARATOR);
    line.push(' ');
    line.push_str(&entry.user);
    line.push_str(" | ");
    line.push_str(&format_timestamp(&entry.timestamp));

    if with_details {
        let mut details = String::new();
        if entry.separator_len > 0 {
            details.push_str(&entry.separator_len.to_string());
        }
        if entry.obsolete {
            details.push(MARK_OBSOLETE);
        }
        if entry.fuzzy {
            details.push(MARK_FUZZY);
        }
        if !details.is_empty() {
            line.push_str(" | ");
            line.push_str(&details);
        }
    }
    line
}

/// Parse every log line of a shadow record, in log order. Malformed lines
/// are reported and skipped. Fuzzy and obsolete state reset on each
/// modification and carry over into the reviews that follow it.
pub fn parse_log_entries(shadow: &Record, config: &AscriptionConfig) -> Vec<LogEntry> {
    let (mut fuzzy, mut obsolete) = (false, false);
    let mut entries = Vec::new();
    for line in &shadow.auto_comments {
        match parse_log_line(line, config) {
            Ok(mut entry) => {
                if entry.kind == AscriptionKind::Modification {
                    fuzzy = false;
                    obsolete = false;
                }
                fuzzy |= entry.fuzzy;
                obsolete |= entry.obsolete;
                entry.fuzzy = fuzzy;
                entry.obsolete = obsolete;
                entries.push(entry);
            }
            Err(err) => {
                tracing::warn!(
                    record_key = %shadow.key(),
                    log_line = %line,
                    reason = %err,
                    "Skipping malformed ascription line"
                );
            }
        }
    }
    entries
}

/// Parse a log line timestamp.
///
/// Reading is lenient so that hand-edited or older logs still load: seconds
/// and the offset may be left out (a missing offset means UTC), and a bare
/// `YYYY-MM-DD` stands for midnight UTC. Writing is strict, see
/// [`format_timestamp`].
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    let utc = FixedOffset::east_opt(0)?;
    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .and_then(|naive| utc.from_local_datetime(&naive).single())
        })
}

/// Always `YYYY-MM-DD HH:MM:SS±ZZZZ`, whatever form the time was read from.
pub fn format_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// A shadow record decoded in log order
pub struct DecodedShadow {
    /// Points in log order (oldest written first), positions unassigned
    pub points: Vec<HistoryPoint>,
    /// Separator lengths of the encoded field entries, oldest first
    pub separators: Vec<usize>,
    pub chains: FieldChains,
}

/// Decode the history carried by one shadow record.
pub fn decode_shadow(shadow: &Record, config: &AscriptionConfig) -> DecodedShadow {
    let mut decoder = HistoryDecoder::new(shadow);
    let mut points: Vec<HistoryPoint> = Vec::new();

    for entry in parse_log_entries(shadow, config) {
        let snapshot = if entry.separator_len > 0 {
            let mut snapshot = decoder.step(entry.separator_len);
            snapshot.context = shadow.context.clone();
            snapshot.id = shadow.id.clone();
            snapshot.set_fuzzy(entry.fuzzy);
            snapshot.obsolete = entry.obsolete;
            Arc::new(snapshot)
        } else {
            match points.last() {
                Some(prev) if prev.fuzzy == entry.fuzzy && prev.obsolete == entry.obsolete => {
                    Arc::clone(&prev.snapshot)
                }
                Some(prev) => {
                    let mut snapshot = (*prev.snapshot).clone();
                    snapshot.set_fuzzy(entry.fuzzy);
                    snapshot.obsolete = entry.obsolete;
                    Arc::new(snapshot)
                }
                None => {
                    tracing::warn!(
                        record_key = %shadow.key(),
                        user = %entry.user,
                        "Ascription without field entry precedes any encoded entry"
                    );
                    let mut snapshot = Record {
                        context: shadow.context.clone(),
                        id: shadow.id.clone(),
                        ..Record::default()
                    };
                    snapshot.set_fuzzy(entry.fuzzy);
                    snapshot.obsolete = entry.obsolete;
                    Arc::new(snapshot)
                }
            }
        };
        points.push(HistoryPoint {
            author: Some(entry.user),
            kind: entry.kind,
            tag: entry.tag,
            timestamp: Some(entry.timestamp),
            fuzzy: entry.fuzzy,
            obsolete: entry.obsolete,
            snapshot,
            position: 0,
        });
    }

    DecodedShadow {
        points,
        separators: decoder.separators().to_vec(),
        chains: decoder.chains().clone(),
    }
}

fn same_state(a: &Record, b: &Record) -> bool {
    a.is_fuzzy() == b.is_fuzzy() && a.obsolete == b.obsolete && a.state() == b.state()
}

/// Ascription equality: same state and same tracked non-key fields, with
/// previous fields counting only on fuzzy records.
pub fn asc_eq(a: &Record, b: &Record) -> bool {
    same_state(a, b)
        && TRACKED_FIELDS
            .iter()
            .all(|f| f.tracked_items(a) == f.tracked_items(b))
}

/// Whether the record has anything worth ascribing. A pristine
/// untranslated record has nothing.
pub fn has_tracked_parts(record: &Record) -> bool {
    record.previous_context.is_some()
        || record.previous_id.is_some()
        || record.previous_plural.is_some()
        || record.translations.iter().any(|t| !t.is_empty())
        || !record.manual_comments.is_empty()
}

/// Ascribe a modification of `record` to `user`. Returns `false` without
/// touching the shadow collection when nothing changed since the newest
/// ascription.
pub fn ascribe_modification(
    record: &Record,
    shadows: &mut Collection,
    user: &str,
    config: &AscriptionConfig,
    at: DateTime<FixedOffset>,
) -> Result<bool> {
    ascribe(record, shadows, AscriptionKind::Modification, &[], user, config, at)
}

/// Ascribe a review of `record` by `user`, once per tag (the untagged review
/// when `tags` is empty).
pub fn ascribe_review(
    record: &Record,
    shadows: &mut Collection,
    tags: &[&str],
    user: &str,
    config: &AscriptionConfig,
    at: DateTime<FixedOffset>,
) -> Result<bool> {
    ascribe(record, shadows, AscriptionKind::Review, tags, user, config, at)
}

fn ascribe(
    record: &Record,
    shadows: &mut Collection,
    kind: AscriptionKind,
    tags: &[&str],
    user: &str,
    config: &AscriptionConfig,
    at: DateTime<FixedOffset>,
) -> Result<bool> {
    let start = Instant::now();
    let op = match kind {
        AscriptionKind::Modification => "ascribe_modification",
        AscriptionKind::Review => "ascribe_review",
    };
    log_op_start!(op, record_key = %record.key(), user = user);

    let result = ascribe_inner(record, shadows, kind, tags, user, config, at);
    match &result {
        Ok(written) => {
            log_op_end!(
                op,
                duration_ms = start.elapsed().as_millis() as u64,
                written = *written
            );
        }
        Err(err) => {
            log_op_error!(op, err.clone(), duration_ms = start.elapsed().as_millis() as u64);
        }
    }
    result
}

fn ascribe_inner(
    record: &Record,
    shadows: &mut Collection,
    kind: AscriptionKind,
    tags: &[&str],
    user: &str,
    config: &AscriptionConfig,
    at: DateTime<FixedOffset>,
) -> Result<bool> {
    if !config.has_user(user) {
        return Err(AscriptError::UnknownUser {
            user: user.to_string(),
        });
    }
    let tags: Vec<&str> = if tags.is_empty() { vec![""] } else { tags.to_vec() };
    if let Some(tag) = tags.iter().find(|t| !config.has_review_tag(t)) {
        return Err(AscriptError::UnknownReviewTag {
            tag: tag.to_string(),
        });
    }

    let key = record.key();
    let mut shadow = shadows.get(&key).cloned().unwrap_or_else(|| Record {
        context: record.context.clone(),
        id: record.id.clone(),
        ..Record::default()
    });

    let decoded = decode_shadow(&shadow, config);
    let newest = decoded
        .points
        .iter()
        .enumerate()
        .max_by_key(|(i, p)| (p.timestamp, *i))
        .map(|(_, p)| p);
    let (fields_differ, state_differs) = match newest {
        Some(point) => (
            tracked_fields_differ(&point.snapshot, record),
            !same_state(&point.snapshot, record),
        ),
        None => (true, true),
    };
    if kind == AscriptionKind::Modification && !fields_differ && !state_differs {
        return Ok(false);
    }

    let separator_len = if fields_differ {
        needed_separator_length(record)
    } else {
        0
    };
    for (i, tag) in tags.iter().enumerate() {
        let entry = LogEntry {
            kind,
            tag: if kind == AscriptionKind::Review {
                tag.to_string()
            } else {
                String::new()
            },
            user: user.to_string(),
            timestamp: at,
            separator_len,
            fuzzy: record.is_fuzzy(),
            obsolete: record.obsolete,
        };
        let with_details = i == 0 && (fields_differ || state_differs);
        shadow.auto_comments.push(format_log_line(&entry, with_details));
    }

    if fields_differ {
        append_entry(
            &mut shadow,
            record,
            separator_len,
            &decoded.separators,
            &decoded.chains,
        );
    }
    shadow.set_fuzzy(record.is_fuzzy());
    shadow.obsolete = record.obsolete;
    shadows.add(shadow);
    Ok(true)
}
