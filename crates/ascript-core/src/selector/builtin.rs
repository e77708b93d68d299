//! Built-in selectors.
//!
//! History selectors never match a record whose newest history entry is
//! unascribed. User and tag arguments go through the per-run cache; an empty
//! user set means any user.

use super::registry::Builtin;
use super::timespec::parse_time_spec;
use super::{selector_fn, Selector, SelectorContext, SelectorResult};
use crate::ascription::{has_tracked_parts, AscriptionKind};
use crate::errors::{AscriptError, Result};
use crate::history::postprocess::reduce_against;
use crate::history::HistoryPoint;
use crate::model::Record;
use crate::textdiff::AddRem;
use std::collections::BTreeSet;

pub(crate) static BUILTIN_FACTORIES: &[Builtin] = &[
    Builtin { name: "any", history: false, max_args: 0, build: build_any },
    Builtin { name: "active", history: false, max_args: 0, build: build_active },
    Builtin { name: "current", history: false, max_args: 0, build: build_current },
    Builtin { name: "branch", history: false, max_args: 1, build: build_branch },
    Builtin { name: "unasc", history: false, max_args: 0, build: build_unasc },
    Builtin { name: "fexpr", history: false, max_args: 1, build: build_fexpr },
    Builtin { name: "e", history: false, max_args: 1, build: build_entry },
    Builtin { name: "l", history: false, max_args: 1, build: build_line },
    Builtin { name: "espan", history: false, max_args: 2, build: build_entry_span },
    Builtin { name: "lspan", history: false, max_args: 2, build: build_line_span },
    Builtin { name: "hexpr", history: true, max_args: 3, build: build_hexpr },
    Builtin { name: "asc", history: true, max_args: 1, build: build_asc },
    Builtin { name: "mod", history: true, max_args: 1, build: build_mod },
    Builtin { name: "rev", history: true, max_args: 2, build: build_rev },
    Builtin { name: "modar", history: true, max_args: 3, build: build_modar },
    Builtin { name: "modam", history: true, max_args: 2, build: build_modam },
    Builtin { name: "modarm", history: true, max_args: 3, build: build_modarm },
    Builtin { name: "tmodar", history: true, max_args: 3, build: build_tmodar },
    Builtin { name: "revbm", history: true, max_args: 3, build: build_revbm },
    Builtin { name: "modafter", history: true, max_args: 2, build: build_modafter },
];

/// Argument `i`, empty meaning absent
fn arg(args: &[String], i: usize) -> String {
    args.get(i).cloned().unwrap_or_default()
}

fn invalid(name: &str, reason: &str) -> AscriptError {
    AscriptError::InvalidSelectorArgument {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn required(name: &str, args: &[String], i: usize, what: &str) -> Result<String> {
    let value = arg(args, i);
    if value.trim().is_empty() {
        return Err(invalid(name, &format!("{what} cannot be empty")));
    }
    Ok(value)
}

fn number(name: &str, value: &str, what: &str) -> Result<usize> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid(name, &format!("{what} must be a positive integer")));
    }
    value
        .parse()
        .map_err(|_| invalid(name, &format!("{what} is out of range")))
}

fn optional_number(name: &str, value: &str, what: &str) -> Result<Option<usize>> {
    if value.is_empty() {
        Ok(None)
    } else {
        number(name, value, what).map(Some)
    }
}

/// Empty set or member
fn any_or_in(users: &BTreeSet<String>, point: &HistoryPoint) -> bool {
    users.is_empty() || point.by_user_in(users)
}

/// Empty set or not a member
fn any_or_not_in(users: &BTreeSet<String>, point: &HistoryPoint) -> bool {
    users.is_empty() || !point.by_user_in(users)
}

fn first_non_fuzzy(history: &[HistoryPoint], start: usize) -> Option<usize> {
    (start..history.len()).find(|&i| !history[i].fuzzy)
}

fn build_any(_args: &[String]) -> Result<Box<dyn Selector>> {
    Ok(selector_fn(|_| Ok(SelectorResult::Matched)))
}

fn build_active(_args: &[String]) -> Result<Box<dyn Selector>> {
    Ok(selector_fn(|ctx| Ok(SelectorResult::from_bool(ctx.record.is_active()))))
}

fn build_current(_args: &[String]) -> Result<Box<dyn Selector>> {
    Ok(selector_fn(|ctx| Ok(SelectorResult::from_bool(!ctx.record.obsolete))))
}

fn build_branch(args: &[String]) -> Result<Box<dyn Selector>> {
    let spec = required("branch", args, 0, "branch set")?;
    let wanted: BTreeSet<String> = spec
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .collect();
    Ok(selector_fn(move |ctx| {
        let branches = ctx.record.branches();
        Ok(SelectorResult::from_bool(
            wanted.iter().any(|b| branches.contains(b)),
        ))
    }))
}

fn build_unasc(_args: &[String]) -> Result<Box<dyn Selector>> {
    // Pristine records do not count as unascribed.
    Ok(selector_fn(|ctx| {
        Ok(SelectorResult::from_bool(
            ctx.is_unascribed() && has_tracked_parts(ctx.record),
        ))
    }))
}

fn build_fexpr(args: &[String]) -> Result<Box<dyn Selector>> {
    let expr = required("fexpr", args, 0, "matching expression")?;
    Ok(selector_fn(move |ctx| {
        let matcher = ctx.cache.matcher(&expr)?;
        Ok(SelectorResult::from_bool(
            matcher.matches(ctx.record, ctx.collection),
        ))
    }))
}

fn build_entry(args: &[String]) -> Result<Box<dyn Selector>> {
    let entry = number("e", &arg(args, 0), "entry reference")?;
    Ok(selector_fn(move |ctx| Ok(SelectorResult::from_bool(ctx.record.entry == entry))))
}

fn build_line(args: &[String]) -> Result<Box<dyn Selector>> {
    let line = number("l", &arg(args, 0), "line reference")?;
    Ok(selector_fn(move |ctx| {
        Ok(SelectorResult::from_bool(ctx.record.line.abs_diff(line) <= 1))
    }))
}

fn span(name: &'static str, args: &[String]) -> Result<(Option<usize>, Option<usize>)> {
    let (first, last) = (arg(args, 0), arg(args, 1));
    if first.is_empty() && last.is_empty() {
        return Err(invalid(name, "at least one of the first and last references must be given"));
    }
    Ok((
        optional_number(name, &first, "first reference")?,
        optional_number(name, &last, "last reference")?,
    ))
}

fn within(value: usize, (first, last): (Option<usize>, Option<usize>)) -> bool {
    first.map_or(true, |f| value >= f) && last.map_or(true, |l| value <= l)
}

fn build_entry_span(args: &[String]) -> Result<Box<dyn Selector>> {
    let bounds = span("espan", args)?;
    Ok(selector_fn(move |ctx| Ok(SelectorResult::from_bool(within(ctx.record.entry, bounds)))))
}

fn build_line_span(args: &[String]) -> Result<Box<dyn Selector>> {
    let bounds = span("lspan", args)?;
    Ok(selector_fn(move |ctx| Ok(SelectorResult::from_bool(within(ctx.record.line, bounds)))))
}

/// Snapshot with tracked non-key texts blanked, standing for the state
/// before the oldest entry.
fn blanked(record: &Record) -> Record {
    let mut blank = record.clone();
    blank.translations = vec![String::new(); record.translations.len()];
    blank.manual_comments = vec![String::new(); record.manual_comments.len()];
    blank
}

fn build_hexpr(args: &[String]) -> Result<Box<dyn Selector>> {
    let expr = required("hexpr", args, 0, "matching expression")?;
    let user_spec = arg(args, 1);
    let addrem_spec = arg(args, 2);
    let addrem = if addrem_spec.is_empty() {
        None
    } else {
        Some(AddRem::parse(&addrem_spec).ok_or_else(|| invalid("hexpr", "unknown diff reduction mode"))?)
    };

    Ok(selector_fn(move |ctx| {
        if ctx.is_unascribed() {
            return Ok(SelectorResult::NotMatched);
        }
        let matcher = ctx.cache.matcher(&expr)?;
        let users = ctx.cache.users(&user_spec, ctx.config)?;
        let history = ctx.history;

        let mut i = match addrem {
            None => 0,
            Some(_) => match first_non_fuzzy(history, 0) {
                Some(i) => i,
                None => return Ok(SelectorResult::NotMatched),
            },
        };
        while i < history.len() {
            let point = &history[i];
            let next = match addrem {
                None => i + 1,
                Some(_) => first_non_fuzzy(history, i + 1).unwrap_or(history.len()),
            };
            if !any_or_in(&users, point) {
                i += 1;
                continue;
            }

            let matched = match &addrem {
                None => matcher.matches(&point.snapshot, ctx.collection),
                Some((mode, separator)) => {
                    let older = match history.get(next) {
                        Some(older) => (*older.snapshot).clone(),
                        None => blanked(&point.snapshot),
                    };
                    let mut reduced = (*point.snapshot).clone();
                    reduce_against(&older, &mut reduced, *mode, separator, ctx.differ);
                    matcher.matches(&reduced, ctx.collection)
                }
            };
            if matched {
                return Ok(SelectorResult::from_index(Some(i)));
            }
            i = next;
        }
        Ok(SelectorResult::NotMatched)
    }))
}

fn build_asc(args: &[String]) -> Result<Box<dyn Selector>> {
    let user_spec = arg(args, 0);
    Ok(selector_fn(move |ctx| {
        if ctx.is_unascribed() {
            return Ok(SelectorResult::NotMatched);
        }
        let users = ctx.cache.users(&user_spec, ctx.config)?;
        Ok(SelectorResult::from_index(
            ctx.history.iter().position(|p| any_or_in(&users, p)),
        ))
    }))
}

fn build_mod(args: &[String]) -> Result<Box<dyn Selector>> {
    let user_spec = arg(args, 0);
    Ok(selector_fn(move |ctx| {
        if ctx.is_unascribed() {
            return Ok(SelectorResult::NotMatched);
        }
        let users = ctx.cache.users(&user_spec, ctx.config)?;
        Ok(SelectorResult::from_index(ctx.history.iter().position(|p| {
            p.is_ascribed() && p.is_modification() && any_or_in(&users, p)
        })))
    }))
}

fn build_rev(args: &[String]) -> Result<Box<dyn Selector>> {
    let user_spec = arg(args, 0);
    let tag_spec = arg(args, 1);
    Ok(selector_fn(move |ctx| {
        if ctx.is_unascribed() {
            return Ok(SelectorResult::NotMatched);
        }
        let users = ctx.cache.users(&user_spec, ctx.config)?;
        let tags = ctx.cache.review_tags(&tag_spec, ctx.config)?;
        Ok(SelectorResult::from_index(ctx.history.iter().position(|p| {
            p.is_review() && tags.contains(&p.tag) && any_or_in(&users, p)
        })))
    }))
}

/// Which entries by the other user set close the window
#[derive(Debug, Clone, Copy)]
struct Window {
    by_modification: bool,
    by_review: bool,
    translation_only: bool,
}

/// Earliest modification by `musers` and not by `rmusers` after the last
/// closing entry by `rmusers` and not by `musers`.
fn modification_window(
    ctx: &SelectorContext<'_>,
    window: Window,
    muser_spec: &str,
    rmuser_spec: &str,
    tag_spec: &str,
) -> Result<SelectorResult> {
    if ctx.is_unascribed() {
        return Ok(SelectorResult::NotMatched);
    }
    let musers = ctx.cache.users(muser_spec, ctx.config)?;
    let rmusers = ctx.cache.users(rmuser_spec, ctx.config)?;
    let tags = ctx.cache.review_tags(tag_spec, ctx.config)?;

    let mut selected = None;
    for (i, point) in ctx.history.iter().enumerate() {
        let closing = match point.kind {
            AscriptionKind::Modification => window.by_modification,
            AscriptionKind::Review => window.by_review && tags.contains(&point.tag),
        };
        if closing && any_or_in(&rmusers, point) && any_or_not_in(&musers, point) {
            break;
        }

        if point.is_modification() && any_or_in(&musers, point) && any_or_not_in(&rmusers, point) {
            let unchanged_translation = window.translation_only
                && ctx
                    .history
                    .get(i + 1)
                    .is_some_and(|older| older.snapshot.translations == point.snapshot.translations);
            if !unchanged_translation {
                selected = Some(i);
            }
        }
    }
    Ok(SelectorResult::from_index(selected))
}

fn window_selector(args: &[String], window: Window, with_tags: bool) -> Box<dyn Selector> {
    let muser_spec = arg(args, 0);
    let rmuser_spec = arg(args, 1);
    let tag_spec = if with_tags { arg(args, 2) } else { String::new() };
    selector_fn(move |ctx| modification_window(ctx, window, &muser_spec, &rmuser_spec, &tag_spec))
}

fn build_modar(args: &[String]) -> Result<Box<dyn Selector>> {
    let window = Window { by_modification: false, by_review: true, translation_only: false };
    Ok(window_selector(args, window, true))
}

fn build_modam(args: &[String]) -> Result<Box<dyn Selector>> {
    let window = Window { by_modification: true, by_review: false, translation_only: false };
    Ok(window_selector(args, window, false))
}

fn build_modarm(args: &[String]) -> Result<Box<dyn Selector>> {
    let window = Window { by_modification: true, by_review: true, translation_only: false };
    Ok(window_selector(args, window, true))
}

fn build_tmodar(args: &[String]) -> Result<Box<dyn Selector>> {
    let window = Window { by_modification: false, by_review: true, translation_only: true };
    Ok(window_selector(args, window, true))
}

fn build_revbm(args: &[String]) -> Result<Box<dyn Selector>> {
    let ruser_spec = arg(args, 0);
    let muser_spec = arg(args, 1);
    let tag_spec = arg(args, 2);
    Ok(selector_fn(move |ctx| {
        if ctx.is_unascribed() {
            return Ok(SelectorResult::NotMatched);
        }
        let rusers = ctx.cache.users(&ruser_spec, ctx.config)?;
        let musers = ctx.cache.users(&muser_spec, ctx.config)?;
        let tags = ctx.cache.review_tags(&tag_spec, ctx.config)?;

        let mut modified_since = false;
        for (i, point) in ctx.history.iter().enumerate() {
            if point.is_modification() && any_or_in(&musers, point) && any_or_not_in(&rusers, point) {
                modified_since = true;
            }
            if point.is_review()
                && tags.contains(&point.tag)
                && any_or_in(&rusers, point)
                && any_or_not_in(&musers, point)
            {
                return Ok(if modified_since {
                    SelectorResult::from_index(Some(i))
                } else {
                    SelectorResult::NotMatched
                });
            }
        }
        Ok(SelectorResult::NotMatched)
    }))
}

fn build_modafter(args: &[String]) -> Result<Box<dyn Selector>> {
    let time = parse_time_spec(&required("modafter", args, 0, "time specification")?)?;
    let user_spec = arg(args, 1);
    Ok(selector_fn(move |ctx| {
        if ctx.is_unascribed() {
            return Ok(SelectorResult::NotMatched);
        }
        let users = ctx.cache.users(&user_spec, ctx.config)?;
        Ok(SelectorResult::from_index(ctx.history.iter().rposition(|p| {
            p.is_modification()
                && any_or_in(&users, p)
                && p.timestamp.is_some_and(|t| t >= time)
        })))
    }))
}
