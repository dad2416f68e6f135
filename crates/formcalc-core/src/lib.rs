//! Core types for formcalc.
//!
//! This crate holds the value model shared by every other crate: the
//! [`value::Value`] exchanged with calculation callables, the
//! [`submission::Submission`] a form pipeline hands in, and the read-only
//! [`submission::Scope`] snapshot formulas are evaluated against.

pub mod submission;
pub mod value;

pub use submission::{Scope, Submission};
pub use value::Value;
