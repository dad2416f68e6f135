//! Formula engine for calculated form fields.
//!
//! A calculated field carries a formula such as `sum([$price, $shipping])` or
//! `new LineItem(['price' => $price, 'quantity' => $qty])`. The formula is
//! parsed against a deliberately small call grammar ([`parser`]), the named
//! constructor or function is resolved in an allowlisted [`registry`], the
//! `$name` references are bound from the submission scope, and the call is
//! interpreted ([`engine`]). Nothing outside the grammar is ever executed.

pub mod builtins;
pub mod engine;
pub mod parser;
pub mod registry;
pub mod types;

pub use engine::{CalculatedField, Evaluator, FieldFailure, FieldResult, PassError, PassOutcome};
pub use registry::{Callable, Registry, StaticRegistry};
pub use types::{Arg, ArrayEntry, Call, CallError, CallKind, EvalError};
