//! Per-run memo of parsed selector arguments, plus record matchers.

use crate::config::AscriptionConfig;
use crate::errors::{AscriptError, Result};
use crate::model::{Collection, Record};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

const INVERT_PREFIX: char = '~';
const SET_SEPARATOR: char = ',';

/// Free-form record predicate
pub trait RecordMatcher {
    fn matches(&self, record: &Record, collection: &Collection) -> bool;
}

/// Builds record matchers from expressions
pub trait MatcherFactory {
    fn build(&self, expr: &str) -> Result<Box<dyn RecordMatcher>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchField {
    Id,
    Plural,
    Context,
    Translation,
    Comment,
    Any,
}

static FIELD_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(id|plural|ctxt|str|comment|any)=(.*)$").expect("field prefix pattern")
});

/// Matches `[field=]regex`, field one of `id`, `plural`, `ctxt`, `str`,
/// `comment` or `any` (the default).
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexMatcherFactory;

struct RegexMatcher {
    field: MatchField,
    regex: Regex,
}

impl RegexMatcher {
    fn texts<'r>(&self, record: &'r Record) -> Vec<&'r str> {
        let mut texts = Vec::new();
        let all = self.field == MatchField::Any;
        if all || self.field == MatchField::Context {
            texts.extend(record.context.as_deref());
        }
        if all || self.field == MatchField::Id {
            texts.push(record.id.as_str());
        }
        if all || self.field == MatchField::Plural {
            texts.extend(record.plural.as_deref());
        }
        if all || self.field == MatchField::Translation {
            texts.extend(record.translations.iter().map(String::as_str));
        }
        if all || self.field == MatchField::Comment {
            texts.extend(record.manual_comments.iter().map(String::as_str));
        }
        texts
    }
}

impl RecordMatcher for RegexMatcher {
    fn matches(&self, record: &Record, _collection: &Collection) -> bool {
        self.texts(record).into_iter().any(|t| self.regex.is_match(t))
    }
}

impl MatcherFactory for RegexMatcherFactory {
    fn build(&self, expr: &str) -> Result<Box<dyn RecordMatcher>> {
        let (field, pattern) = match FIELD_PREFIX.captures(expr) {
            Some(caps) => {
                let field = match &caps[1] {
                    "id" => MatchField::Id,
                    "plural" => MatchField::Plural,
                    "ctxt" => MatchField::Context,
                    "str" => MatchField::Translation,
                    "comment" => MatchField::Comment,
                    _ => MatchField::Any,
                };
                (field, caps.get(2).map_or("", |m| m.as_str()))
            }
            None => (MatchField::Any, expr),
        };
        let regex = Regex::new(pattern).map_err(|e| AscriptError::InvalidMatcher {
            expr: expr.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(RegexMatcher { field, regex }))
    }
}

/// Parse a comma-separated set against the known members; a leading `~`
/// selects every known member not listed. Spaces are ignored.
fn parse_fixed_set<'k, K, E>(spec: &str, known: K, unknown: E) -> Result<BTreeSet<String>>
where
    K: IntoIterator<Item = &'k String> + Clone,
    E: Fn(&str) -> AscriptError,
{
    let spec: String = spec.chars().filter(|c| *c != ' ').collect();
    let (inverted, body) = match spec.strip_prefix(INVERT_PREFIX) {
        Some(rest) => (true, rest),
        None => (false, spec.as_str()),
    };

    let mut listed = BTreeSet::new();
    for item in body.split(SET_SEPARATOR).filter(|s| !s.is_empty()) {
        if !known.clone().into_iter().any(|k| k == item) {
            return Err(unknown(item));
        }
        listed.insert(item.to_string());
    }

    if inverted {
        Ok(known
            .into_iter()
            .filter(|k| !listed.contains(*k))
            .cloned()
            .collect())
    } else {
        Ok(listed)
    }
}

/// Users named by `spec`. An empty set means no restriction.
///
/// # Errors
///
/// `UnknownUser` when the spec names a user missing from the configuration.
pub fn parse_users(spec: &str, config: &AscriptionConfig) -> Result<BTreeSet<String>> {
    parse_fixed_set(spec, config.users.keys(), |user| AscriptError::UnknownUser {
        user: user.to_string(),
    })
}

/// Review tags named by `spec`; nothing named means the untagged review.
///
/// # Errors
///
/// `UnknownReviewTag` when the spec names a tag missing from the configuration.
pub fn parse_review_tags(spec: &str, config: &AscriptionConfig) -> Result<BTreeSet<String>> {
    let mut tags = parse_fixed_set(spec, config.review_tags.iter(), |tag| {
        AscriptError::UnknownReviewTag {
            tag: tag.to_string(),
        }
    })?;
    if tags.is_empty() {
        tags.insert(String::new());
    }
    Ok(tags)
}

type SetKey = (String, String);

/// Memoizes parsed user sets, tag sets and matchers for one selection run.
///
/// Entries are keyed by the expression and the configuration id, so one
/// cache may serve several configurations.
///
/// The cache is neither `Send` nor `Sync`: it belongs to the thread running
/// the selection. Threads selecting in parallel each build their own cache
/// and share only the configuration.
pub struct SelectorCache {
    matcher_factory: Box<dyn MatcherFactory>,
    users: RefCell<HashMap<SetKey, Rc<BTreeSet<String>>>>,
    tags: RefCell<HashMap<SetKey, Rc<BTreeSet<String>>>>,
    matchers: RefCell<HashMap<String, Rc<dyn RecordMatcher>>>,
}

impl Default for SelectorCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectorCache {
    pub fn new() -> Self {
        Self::with_matcher_factory(Box::new(RegexMatcherFactory))
    }

    pub fn with_matcher_factory(matcher_factory: Box<dyn MatcherFactory>) -> Self {
        Self {
            matcher_factory,
            users: RefCell::new(HashMap::new()),
            tags: RefCell::new(HashMap::new()),
            matchers: RefCell::new(HashMap::new()),
        }
    }

    /// # Errors
    ///
    /// See [`parse_users`].
    pub fn users(&self, spec: &str, config: &AscriptionConfig) -> Result<Rc<BTreeSet<String>>> {
        let key = (spec.to_string(), config.id.clone());
        if let Some(hit) = self.users.borrow().get(&key).cloned() {
            return Ok(hit);
        }
        let users = Rc::new(parse_users(spec, config)?);
        self.users.borrow_mut().insert(key, Rc::clone(&users));
        Ok(users)
    }

    /// # Errors
    ///
    /// See [`parse_review_tags`].
    pub fn review_tags(&self, spec: &str, config: &AscriptionConfig) -> Result<Rc<BTreeSet<String>>> {
        let key = (spec.to_string(), config.id.clone());
        if let Some(hit) = self.tags.borrow().get(&key).cloned() {
            return Ok(hit);
        }
        let tags = Rc::new(parse_review_tags(spec, config)?);
        self.tags.borrow_mut().insert(key, Rc::clone(&tags));
        Ok(tags)
    }

    /// # Errors
    ///
    /// Whatever the matcher factory reports for a bad expression.
    pub fn matcher(&self, expr: &str) -> Result<Rc<dyn RecordMatcher>> {
        if let Some(hit) = self.matchers.borrow().get(expr).cloned() {
            return Ok(hit);
        }
        let matcher: Rc<dyn RecordMatcher> = Rc::from(self.matcher_factory.build(expr)?);
        self.matchers
            .borrow_mut()
            .insert(expr.to_string(), Rc::clone(&matcher));
        Ok(matcher)
    }
}
