//! Structured logging: one `init(profile)` call per process, operation
//! boundary macros, and an in-memory capture for tests.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
