//! Operation boundary macros
//!
//! Every public engine operation logs one `start` event and exactly one of
//! `end` or `end_error`, all carrying `component` and `op`.

/// `start` boundary, optionally with extra fields:
/// `log_op_start!("collect_history", record_key = %key)`.
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = ascript_core_types::schema::EVENT_START,
            $($($field)*)?
        );
    };
}

/// `end` boundary; `duration_ms` comes first, extra fields follow.
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = ascript_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($($field)*)?
        );
    };
}

/// `end_error` boundary at error level. `$err` is anything convertible into
/// [`ExError`](crate::errors::ExError); its kind, code and entity are logged.
///
/// ```
/// # use ascript_core::{log_op_error, errors::AscriptError};
/// let err = AscriptError::UnknownUser { user: "mallory".to_string() };
/// log_op_error!("ascribe_modification", err, duration_ms = 1);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = ascript_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            entity = ex_err.entity_id().unwrap_or_default(),
            $($($field)*)?
        );
    }};
}
