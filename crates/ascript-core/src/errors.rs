use thiserror::Error;

/// Result type alias using AscriptError
pub type Result<T> = std::result::Result<T, AscriptError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code used by logging and by callers that
/// need to branch on the failure class without matching on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Configuration
    InvalidConfig,
    DuplicateUser,
    MissingUserName,
    UnknownUser,
    UnknownReviewTag,
    RootPathCollision,

    // Selector compilation/evaluation
    UnknownSelector,
    SelectorArity,
    SelectorCapability,
    InvalidSelectorArgument,
    InvalidTimeSpec,
    InvalidMatcher,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::DuplicateUser => "ERR_DUPLICATE_USER",
            ExErrorKind::MissingUserName => "ERR_MISSING_USER_NAME",
            ExErrorKind::UnknownUser => "ERR_UNKNOWN_USER",
            ExErrorKind::UnknownReviewTag => "ERR_UNKNOWN_REVIEW_TAG",
            ExErrorKind::RootPathCollision => "ERR_ROOT_PATH_COLLISION",
            ExErrorKind::UnknownSelector => "ERR_UNKNOWN_SELECTOR",
            ExErrorKind::SelectorArity => "ERR_SELECTOR_ARITY",
            ExErrorKind::SelectorCapability => "ERR_SELECTOR_CAPABILITY",
            ExErrorKind::InvalidSelectorArgument => "ERR_INVALID_SELECTOR_ARGUMENT",
            ExErrorKind::InvalidTimeSpec => "ERR_INVALID_TIME_SPEC",
            ExErrorKind::InvalidMatcher => "ERR_INVALID_MATCHER",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification plus optional operation and entity context so
/// that a failure can be logged with stable fields.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity context (record key, user id, file path)
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity: {})", entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for ascript operations
///
/// Only configuration-class problems surface as errors. Per-entry parse
/// problems are logged and skipped, and unapplicable patches end up in the
/// reject list of a patch report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AscriptError {
    // ===== Configuration =====
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("User '{user}' defined more than once")]
    DuplicateUser { user: String },

    #[error("User '{user}' has no name")]
    MissingUserName { user: String },

    #[error("Unknown user: {user}")]
    UnknownUser { user: String },

    #[error("Unknown review tag: {tag}")]
    UnknownReviewTag { tag: String },

    #[error("Catalog root and ascription root resolve to the same path: {path}")]
    RootPathCollision { path: String },

    // ===== Selectors =====
    #[error("Unknown selector: {name}")]
    UnknownSelector { name: String },

    #[error("Selector '{name}' takes at most {max} arguments, got {given}")]
    SelectorArity {
        name: String,
        max: usize,
        given: usize,
    },

    #[error("Negated selectors cannot be used as history selectors: {spec}")]
    NegatedHistorySelector { spec: String },

    #[error("Selector '{name}' cannot be used as a history selector")]
    NotHistorySelector { name: String },

    #[error("Invalid argument for selector '{name}': {reason}")]
    InvalidSelectorArgument { name: String, reason: String },

    #[error("Invalid time specification: {spec}")]
    InvalidTimeSpec { spec: String },

    #[error("Invalid matcher expression '{expr}': {reason}")]
    InvalidMatcher { expr: String, reason: String },

    // ===== Integration =====
    #[error("IO error during {op}: {message}")]
    Io { op: String, message: String },
}

impl From<AscriptError> for ExError {
    fn from(err: AscriptError) -> Self {
        let message = err.to_string();
        match err {
            AscriptError::InvalidConfig { .. } => {
                ExError::new(ExErrorKind::InvalidConfig).with_message(message)
            }
            AscriptError::DuplicateUser { user } => ExError::new(ExErrorKind::DuplicateUser)
                .with_entity_id(user)
                .with_message(message),
            AscriptError::MissingUserName { user } => ExError::new(ExErrorKind::MissingUserName)
                .with_entity_id(user)
                .with_message(message),
            AscriptError::UnknownUser { user } => ExError::new(ExErrorKind::UnknownUser)
                .with_entity_id(user)
                .with_message(message),
            AscriptError::UnknownReviewTag { tag } => ExError::new(ExErrorKind::UnknownReviewTag)
                .with_entity_id(tag)
                .with_message(message),
            AscriptError::RootPathCollision { path } => {
                ExError::new(ExErrorKind::RootPathCollision)
                    .with_entity_id(path)
                    .with_op("load_config")
                    .with_message(message)
            }
            AscriptError::UnknownSelector { name } => ExError::new(ExErrorKind::UnknownSelector)
                .with_entity_id(name)
                .with_op("compile_selector")
                .with_message(message),
            AscriptError::SelectorArity { name, .. } => ExError::new(ExErrorKind::SelectorArity)
                .with_entity_id(name)
                .with_op("compile_selector")
                .with_message(message),
            AscriptError::NegatedHistorySelector { spec } => {
                ExError::new(ExErrorKind::SelectorCapability)
                    .with_entity_id(spec)
                    .with_op("compile_selector")
                    .with_message(message)
            }
            AscriptError::NotHistorySelector { name } => {
                ExError::new(ExErrorKind::SelectorCapability)
                    .with_entity_id(name)
                    .with_op("compile_selector")
                    .with_message(message)
            }
            AscriptError::InvalidSelectorArgument { name, .. } => {
                ExError::new(ExErrorKind::InvalidSelectorArgument)
                    .with_entity_id(name)
                    .with_message(message)
            }
            AscriptError::InvalidTimeSpec { spec } => ExError::new(ExErrorKind::InvalidTimeSpec)
                .with_entity_id(spec)
                .with_message(message),
            AscriptError::InvalidMatcher { expr, .. } => ExError::new(ExErrorKind::InvalidMatcher)
                .with_entity_id(expr)
                .with_message(message),
            AscriptError::Io { op, .. } => ExError::new(ExErrorKind::Io)
                .with_op(op)
                .with_message(message),
        }
    }
}

impl From<toml::de::Error> for AscriptError {
    fn from(err: toml::de::Error) -> Self {
        AscriptError::InvalidConfig {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes_are_stable() {
        let cases = [
            (ExErrorKind::UnknownUser, "ERR_UNKNOWN_USER"),
            (ExErrorKind::UnknownSelector, "ERR_UNKNOWN_SELECTOR"),
            (ExErrorKind::RootPathCollision, "ERR_ROOT_PATH_COLLISION"),
            (ExErrorKind::SelectorCapability, "ERR_SELECTOR_CAPABILITY"),
            (ExErrorKind::Io, "ERR_IO"),
            (ExErrorKind::Serialization, "ERR_SERIALIZATION"),
            (ExErrorKind::Persistence, "ERR_PERSISTENCE"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_conversion_keeps_entity() {
        let err = AscriptError::UnknownUser {
            user: "mallory".to_string(),
        };
        let ex: ExError = err.into();
        assert_eq!(ex.kind(), ExErrorKind::UnknownUser);
        assert_eq!(ex.entity_id(), Some("mallory"));
        assert!(ex.message().contains("mallory"));
    }

    #[test]
    fn test_history_capability_errors_share_kind() {
        let negated: ExError = AscriptError::NegatedHistorySelector {
            spec: "nmod".to_string(),
        }
        .into();
        let plain: ExError = AscriptError::NotHistorySelector {
            name: "any".to_string(),
        }
        .into();
        assert_eq!(negated.kind(), plain.kind());
        assert_eq!(negated.op(), Some("compile_selector"));
    }

    #[test]
    fn test_malformed_toml_is_invalid_config() {
        let err: AscriptError = toml::from_str::<toml::Value>("[global\n")
            .unwrap_err()
            .into();
        let ex: ExError = err.into();
        assert_eq!(ex.kind(), ExErrorKind::InvalidConfig);
        assert_eq!(ex.code(), "ERR_INVALID_CONFIG");
    }

    #[test]
    fn test_display_includes_code_and_op() {
        let ex = ExError::new(ExErrorKind::Io)
            .with_op("save_shadow")
            .with_message("disk full");
        let text = ex.to_string();
        assert!(text.starts_with("[ERR_IO]"));
        assert!(text.contains("save_shadow"));
        assert!(text.contains("disk full"));
    }
}
