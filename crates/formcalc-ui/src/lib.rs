//! Terminal rendering for formcalc.
//!
//! Turns computed [`formcalc_core::Value`]s into display text and provides
//! the Ayu-themed styling used by the CLI.

pub mod render;
pub mod styles;
pub mod terminal;

pub use render::{PlainRenderer, Renderer};
