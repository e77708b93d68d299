//! Record selectors.
//!
//! A selector is compiled from one or more specifications of the form
//! `[n]name<sep>arg<sep>arg…`, where `<sep>` is the first character that is
//! neither alphanumeric nor `_` or `-` (`:` when there is none), and a leading
//! `n` negates. The parts are AND-linked.
//!
//! Plain selectors answer yes or no for a record. History selectors also
//! point at the history entry that made them match.
//!
//! ```ignore
//! use ascript_core::selector::{compile, SelectorRegistry};
//!
//! let registry = SelectorRegistry::with_builtin();
//! let selector = compile(&["active", "modar:alice:bob"], &registry, false)?;
//! let result = selector.select(&ctx)?;
//! ```

pub mod builtin;
pub mod cache;
pub mod registry;
pub mod timespec;

pub use cache::{
    parse_review_tags, parse_users, MatcherFactory, RecordMatcher, RegexMatcherFactory,
    SelectorCache,
};
pub use registry::{SelectorFactory, SelectorRegistry};
pub use timespec::parse_time_spec;

use crate::config::AscriptionConfig;
use crate::errors::{AscriptError, Result};
use crate::history::HistoryPoint;
use crate::model::{Collection, Record};
use crate::textdiff::TextDiffer;

const DEFAULT_ARG_SEPARATOR: char = ':';
const NEGATION_PREFIX: char = 'n';

/// Outcome of a selector on one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorResult {
    NotMatched,
    Matched,
    /// Matched at this 1-based history entry
    MatchedAt(usize),
}

impl SelectorResult {
    pub fn from_bool(matched: bool) -> Self {
        if matched {
            SelectorResult::Matched
        } else {
            SelectorResult::NotMatched
        }
    }

    /// From a 0-based history index
    pub fn from_index(index: Option<usize>) -> Self {
        index.map_or(SelectorResult::NotMatched, |i| SelectorResult::MatchedAt(i + 1))
    }

    pub fn is_match(self) -> bool {
        self != SelectorResult::NotMatched
    }

    /// 1-based history entry, for history matches
    pub fn history_index(self) -> Option<usize> {
        match self {
            SelectorResult::MatchedAt(i) => Some(i),
            _ => None,
        }
    }

    fn negated(self) -> Self {
        SelectorResult::from_bool(!self.is_match())
    }
}

/// Everything a selector may look at
pub struct SelectorContext<'a> {
    pub record: &'a Record,
    pub collection: &'a Collection,
    /// History of the record, newest first
    pub history: &'a [HistoryPoint],
    pub config: &'a AscriptionConfig,
    pub differ: &'a dyn TextDiffer,
    pub cache: &'a SelectorCache,
}

impl SelectorContext<'_> {
    /// Whether the newest history entry has no author
    pub fn is_unascribed(&self) -> bool {
        self.history.first().map_or(true, |p| !p.is_ascribed())
    }
}

pub trait Selector {
    /// # Errors
    ///
    /// Configuration problems met while resolving arguments, such as an
    /// unknown user.
    fn select(&self, ctx: &SelectorContext<'_>) -> Result<SelectorResult>;
}

impl<F> Selector for F
where
    F: Fn(&SelectorContext<'_>) -> Result<SelectorResult>,
{
    fn select(&self, ctx: &SelectorContext<'_>) -> Result<SelectorResult> {
        self(ctx)
    }
}

/// Box a closure as a selector
pub fn selector_fn<F>(f: F) -> Box<dyn Selector>
where
    F: Fn(&SelectorContext<'_>) -> Result<SelectorResult> + 'static,
{
    Box::new(f)
}

struct Part {
    spec: String,
    negated: bool,
    selector: Box<dyn Selector>,
}

/// AND-composition of compiled selector specifications
pub struct CompiledSelector {
    parts: Vec<Part>,
    history: bool,
}

impl std::fmt::Debug for CompiledSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSelector")
            .field("specs", &self.parts.iter().map(|p| &p.spec).collect::<Vec<_>>())
            .field("history", &self.history)
            .finish()
    }
}

impl CompiledSelector {
    /// Run the parts in order, stopping at the first one that does not
    /// match. The result of the last part run is returned.
    ///
    /// # Errors
    ///
    /// The first error raised by a part.
    pub fn select(&self, ctx: &SelectorContext<'_>) -> Result<SelectorResult> {
        let mut result = SelectorResult::NotMatched;
        for part in &self.parts {
            result = part.selector.select(ctx).map_err(|err| {
                tracing::debug!(selector = %part.spec, record_key = %ctx.record.key(), "selector failed");
                err
            })?;
            if part.negated {
                result = result.negated();
            }
            if !result.is_match() {
                break;
            }
        }
        Ok(result)
    }

    pub fn is_history(&self) -> bool {
        self.history
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Split a specification into negation, name and arguments.
fn split_spec(spec: &str) -> (bool, &str, Vec<String>) {
    let separator = spec
        .chars()
        .find(|c| !(c.is_alphanumeric() || *c == '_' || *c == '-'))
        .unwrap_or(DEFAULT_ARG_SEPARATOR);
    let mut pieces = spec.split(separator);
    let head = pieces.next().unwrap_or_default();
    let args = pieces.map(str::to_string).collect();
    match head.strip_prefix(NEGATION_PREFIX) {
        Some(name) => (true, name, args),
        None => (false, head, args),
    }
}

/// Compile selector specifications into one AND-linked selector.
///
/// With `require_history`, every part must be a history selector and none
/// may be negated.
///
/// # Errors
///
/// `UnknownSelector`, `SelectorArity`, `NotHistorySelector`,
/// `NegatedHistorySelector`, or whatever a factory reports for bad
/// arguments.
pub fn compile<S: AsRef<str>>(
    specs: &[S],
    registry: &SelectorRegistry,
    require_history: bool,
) -> Result<CompiledSelector> {
    let mut parts = Vec::with_capacity(specs.len());
    for spec in specs {
        let spec = spec.as_ref();
        let (negated, name, args) = split_spec(spec);
        // Names may themselves start with the negation letter.
        let (negated, name, factory) = match registry.get(name) {
            Some(factory) if negated => match registry.get(&format!("{}{}", NEGATION_PREFIX, name)) {
                Some(plain) => (false, name, plain),
                None => (true, name, factory),
            },
            Some(factory) => (negated, name, factory),
            None if negated => {
                let full = format!("{}{}", NEGATION_PREFIX, name);
                match registry.get(&full) {
                    Some(factory) => (false, name, factory),
                    None => return Err(AscriptError::UnknownSelector { name: full }),
                }
            }
            None => {
                return Err(AscriptError::UnknownSelector {
                    name: name.to_string(),
                })
            }
        };

        if require_history {
            if !factory.history_capable() {
                return Err(AscriptError::NotHistorySelector {
                    name: factory.name().to_string(),
                });
            }
            if negated {
                return Err(AscriptError::NegatedHistorySelector {
                    spec: spec.to_string(),
                });
            }
        }
        if args.len() > factory.max_args() {
            return Err(AscriptError::SelectorArity {
                name: name.to_string(),
                max: factory.max_args(),
                given: args.len(),
            });
        }

        parts.push(Part {
            spec: spec.to_string(),
            negated,
            selector: factory.build(&args)?,
        });
    }
    Ok(CompiledSelector {
        parts,
        history: require_history,
    })
}
