//! Core types shared across ascript facilities
//!
//! This crate holds the canonical field keys and event names used by the
//! logging macros and by the error facility, so that every crate in the
//! workspace emits the same structured shape.

pub mod schema;
