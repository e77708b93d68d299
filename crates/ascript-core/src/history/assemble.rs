use super::point::HistoryPoint;
use super::postprocess::{collapse_filtered, drop_merges, reduce_to_segments};
use crate::ascription::{asc_eq, decode_shadow};
use crate::config::AscriptionConfig;
use crate::log_op_end;
use crate::log_op_start;
use crate::model::{Collection, Key, Record};
use crate::textdiff::{AddRem, TextDiffer};
use chrono::{DateTime, FixedOffset};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Upper bound on the number of pivots followed for one record
pub const MAX_PIVOT_DEPTH: usize = 64;

/// Post-processing and traversal knobs for [`collect_history`]
#[derive(Clone, Copy, Default)]
pub struct HistoryOptions<'a> {
    /// Drop modifications that are pure template merges of the point before
    pub drop_merges: bool,
    /// Collapse runs of modifications equal under this translation filter
    pub filter: Option<&'a dyn Fn(&str) -> String>,
    /// Reduce modifications to one side of their diff against the previous one
    pub addrem: Option<(AddRem, &'a str)>,
    /// Do not follow fuzzy pivots
    pub shallow: bool,
    /// Only points at or before this time
    pub before: Option<DateTime<FixedOffset>>,
}

/// History carried by a single shadow record, newest first. Positions are
/// left unassigned.
pub fn single_history(shadow: &Record, config: &AscriptionConfig) -> Vec<HistoryPoint> {
    let mut points: Vec<(usize, HistoryPoint)> = decode_shadow(shadow, config)
        .points
        .into_iter()
        .enumerate()
        .collect();
    points.sort_by(|(i, a), (j, b)| b.timestamp.cmp(&a.timestamp).then(j.cmp(i)));
    points.into_iter().map(|(_, p)| p).collect()
}

/// Assemble the full history of `record` from the shadow collection.
pub fn collect_history(
    record: &Record,
    shadows: &Collection,
    config: &AscriptionConfig,
    options: &HistoryOptions<'_>,
    differ: &dyn TextDiffer,
) -> Vec<HistoryPoint> {
    let start = Instant::now();
    log_op_start!("collect_history", record_key = %record.key());

    let mut history = gather(record, shadows, config, options);

    if history
        .first()
        .map_or(true, |newest| !asc_eq(record, &newest.snapshot))
    {
        history.insert(0, HistoryPoint::unascribed(record));
    }
    for (i, point) in history.iter_mut().enumerate() {
        point.position = i as u32 + 1;
    }

    if options.drop_merges {
        history = drop_merges(history);
    }
    if let Some(filter) = options.filter {
        history = collapse_filtered(history, filter);
    }
    if let Some((mode, separator)) = options.addrem {
        reduce_to_segments(&mut history, mode, separator, differ);
    }

    log_op_end!(
        "collect_history",
        duration_ms = start.elapsed().as_millis() as u64,
        history_len = history.len()
    );
    history
}

/// Walk the pivot chain level by level. Each level after the first only
/// admits points strictly older than the oldest point gathered so far.
fn gather(
    record: &Record,
    shadows: &Collection,
    config: &AscriptionConfig,
    options: &HistoryOptions<'_>,
) -> Vec<HistoryPoint> {
    let mut history: Vec<HistoryPoint> = Vec::new();
    let mut visited: HashSet<Key> = HashSet::new();
    let mut probe = Arc::new(record.clone());
    let mut bound = options.before;
    let mut strict = false;

    for _ in 0..MAX_PIVOT_DEPTH {
        let key = probe.key();
        if !visited.insert(key.clone()) {
            break;
        }

        let level: Vec<HistoryPoint> = shadows
            .get(&key)
            .map(|shadow| single_history(shadow, config))
            .unwrap_or_default()
            .into_iter()
            .filter(|p| match (bound, p.timestamp) {
                (Some(b), Some(t)) if strict => t < b,
                (Some(b), Some(t)) => t <= b,
                _ => true,
            })
            .collect();

        if let Some(oldest) = level.last() {
            probe = Arc::clone(&oldest.snapshot);
            if oldest.timestamp.is_some() {
                bound = oldest.timestamp;
                strict = true;
            }
        }
        history.extend(level);

        if options.shallow || !(probe.is_fuzzy() && probe.previous_id.is_some()) {
            break;
        }
        let pivot = probe.inverted_key();
        probe = Arc::new(Record {
            context: pivot.context,
            id: pivot.id,
            ..Record::default()
        });
    }
    history
}
