#![allow(clippy::unwrap_used, clippy::expect_used)]

use ascript_core::errors::{AscriptError, ExError, ExErrorKind};
use ascript_core::selector::{compile, SelectorRegistry};
use ascript_core::AscriptionConfig;
use std::path::Path;

#[test]
fn test_unknown_selector_verifiable_by_kind() {
    let err = compile(&["nosuch:1"], &SelectorRegistry::with_builtin(), false).unwrap_err();

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::UnknownSelector);
    assert_eq!(ex_err.code(), "ERR_UNKNOWN_SELECTOR");
    assert_eq!(ex_err.entity_id(), Some("nosuch"));
    assert_eq!(ex_err.op(), Some("compile_selector"));
}

#[test]
fn test_capability_errors_share_a_kind() {
    let registry = SelectorRegistry::with_builtin();
    let negated: ExError = compile(&["nasc"], &registry, true).unwrap_err().into();
    let plain: ExError = compile(&["current"], &registry, true).unwrap_err().into();

    assert_eq!(negated.kind(), ExErrorKind::SelectorCapability);
    assert_eq!(plain.kind(), ExErrorKind::SelectorCapability);
    assert_eq!(negated.entity_id(), Some("nasc"));
    assert_eq!(plain.entity_id(), Some("current"));
}

#[test]
fn test_arity_error_message_names_limits() {
    let err = compile(&["asc:alice:extra"], &SelectorRegistry::with_builtin(), true).unwrap_err();
    assert!(matches!(
        err,
        AscriptError::SelectorArity { max: 1, given: 2, .. }
    ));

    let ex_err: ExError = err.into();
    assert_eq!(ex_err.code(), "ERR_SELECTOR_ARITY");
    assert!(ex_err.message().contains("at most 1"));
}

#[test]
fn test_root_collision_is_config_error() {
    let text = r#"
[global]
catalog-root = "po"
ascript-root = "po"
"#;
    let err = AscriptionConfig::from_toml_str(text, Path::new("/work")).unwrap_err();

    let ex_err: ExError = err.into();
    assert_eq!(ex_err.kind(), ExErrorKind::RootPathCollision);
    assert_eq!(ex_err.op(), Some("load_config"));
}

#[test]
fn test_display_carries_code_and_entity() {
    let ex_err: ExError = AscriptError::UnknownUser {
        user: "mallory".to_string(),
    }
    .into();

    let shown = ex_err.to_string();
    assert!(shown.starts_with("[ERR_UNKNOWN_USER]"));
    assert!(shown.contains("(entity: mallory)"));
}
