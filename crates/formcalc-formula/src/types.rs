//! Formula syntax tree and error types.
//!
//! The grammar only admits a single call, so the tree is flat: a [`Call`]
//! names a constructor or function and carries one or two [`Arg`]s, each a
//! variable reference or an array literal of variable references.

use std::fmt;

use serde::Serialize;

/// Whether a formula constructs a type (`new Name(..)`) or calls a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Constructor,
    Function,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Constructor => "constructor",
            CallKind::Function => "function",
        }
    }
}

/// One entry of an array literal: `$name` or `'key' => $name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayEntry {
    pub key: Option<String>,
    pub var: String,
}

/// A call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// `$name`
    Ref(String),
    /// `[$a, 'k' => $b]`
    Array(Vec<ArrayEntry>),
}

/// A parsed formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: CallKind,
    pub name: String,
    pub args: Vec<Arg>,
}

impl Call {
    /// Every variable the formula references, sorted and deduplicated.
    pub fn variables(&self) -> Vec<&str> {
        let mut vars: Vec<&str> = self
            .args
            .iter()
            .flat_map(|arg| -> Vec<&str> {
                match arg {
                    Arg::Ref(name) => vec![name.as_str()],
                    Arg::Array(entries) => entries.iter().map(|e| e.var.as_str()).collect(),
                }
            })
            .collect();
        vars.sort_unstable();
        vars.dedup();
        vars
    }
}

impl fmt::Display for ArrayEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            // Keys cannot contain escapes, so pick the quote the key lacks.
            Some(key) if key.contains('\'') => write!(f, "\"{}\" => ${}", key, self.var),
            Some(key) => write!(f, "'{}' => ${}", key, self.var),
            None => write!(f, "${}", self.var),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Ref(name) => write!(f, "${}", name),
            Arg::Array(entries) => {
                f.write_str("[")?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", entry)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Canonical text of the call, e.g. `new LineItem(['price' => $p])`.
impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == CallKind::Constructor {
            f.write_str("new ")?;
        }
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure raised by a registered constructor or function.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    #[error("expected {expected} argument(s), got {got}")]
    Arity { expected: &'static str, got: usize },

    #[error("argument {index}: expected {expected}, got {got}")]
    Type {
        index: usize,
        expected: &'static str,
        got: &'static str,
    },

    #[error("{0}")]
    Domain(String),
}

impl CallError {
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }
}

/// Errors produced while evaluating a formula.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// The formula text is outside the call grammar.
    #[error("malformed formula '{formula}': {reason}")]
    MalformedFormula { formula: String, reason: String },

    /// `new Name(..)` where `Name` is not a registered constructor.
    #[error("unknown constructor: {0}")]
    UnknownConstructor(String),

    /// `name(..)` where `name` is not a registered function.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// The resolved callable itself failed. The cause is the error source.
    #[error("{name} failed")]
    Execution {
        name: String,
        #[source]
        source: CallError,
    },
}

impl EvalError {
    /// Structural and configuration mistakes are recoverable: the field is
    /// left empty and the pass continues. Execution failures are not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Execution { .. })
    }

    /// Short machine-readable kind, used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedFormula { .. } => "malformed_formula",
            Self::UnknownConstructor(_) => "unknown_constructor",
            Self::UnknownFunction(_) => "unknown_function",
            Self::Execution { .. } => "execution_error",
        }
    }
}
