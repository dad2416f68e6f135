//! Allowlisted constructors and functions a formula may invoke.
//!
//! The evaluator never discovers callables on its own: it can only reach what
//! a [`Registry`] hands back by exact name. [`StaticRegistry`] is populated
//! once at startup from a fixed list (see [`crate::builtins::registry`]) and
//! can be narrowed further by configuration.

use std::collections::BTreeMap;
use std::fmt;

use formcalc_core::Value;

use crate::types::CallError;

/// Something a formula can invoke: a constructor or a function.
///
/// Arguments arrive in formula order with their shape preserved: a `$name`
/// argument is the bound value, an array literal is a [`Value::List`] or
/// [`Value::Map`].
pub trait Callable: Send + Sync {
    fn invoke(&self, args: &[Value]) -> Result<Value, CallError>;
}

impl<F> Callable for F
where
    F: Fn(&[Value]) -> Result<Value, CallError> + Send + Sync,
{
    fn invoke(&self, args: &[Value]) -> Result<Value, CallError> {
        self(args)
    }
}

/// Name-based lookup of invocable constructors and functions.
pub trait Registry {
    /// Resolve the target of `new Name(..)`.
    fn constructor(&self, name: &str) -> Option<&dyn Callable>;

    /// Resolve the target of `name(..)`.
    fn function(&self, name: &str) -> Option<&dyn Callable>;
}

/// A registry fixed at construction time.
#[derive(Default)]
pub struct StaticRegistry {
    constructors: BTreeMap<String, Box<dyn Callable>>,
    functions: BTreeMap<String, Box<dyn Callable>>,
}

impl StaticRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registered constructor names, sorted.
    pub fn constructor_names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Registered function names, sorted.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Keep only the constructors named in `allowed`.
    ///
    /// Returns the allowlist entries that matched nothing.
    pub fn retain_constructors(&mut self, allowed: &[String]) -> Vec<String> {
        retain_allowed(&mut self.constructors, allowed)
    }

    /// Keep only the functions named in `allowed`.
    ///
    /// Returns the allowlist entries that matched nothing.
    pub fn retain_functions(&mut self, allowed: &[String]) -> Vec<String> {
        retain_allowed(&mut self.functions, allowed)
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty() && self.functions.is_empty()
    }
}

fn retain_allowed(entries: &mut BTreeMap<String, Box<dyn Callable>>, allowed: &[String]) -> Vec<String> {
    let unmatched = allowed
        .iter()
        .filter(|name| !entries.contains_key(name.as_str()))
        .cloned()
        .collect();
    entries.retain(|name, _| allowed.iter().any(|a| a == name));
    unmatched
}

impl Registry for StaticRegistry {
    fn constructor(&self, name: &str) -> Option<&dyn Callable> {
        self.constructors.get(name).map(|c| c.as_ref())
    }

    fn function(&self, name: &str) -> Option<&dyn Callable> {
        self.functions.get(name).map(|f| f.as_ref())
    }
}

impl fmt::Debug for StaticRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticRegistry")
            .field("constructors", &self.constructors.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`StaticRegistry`]. A later registration under the same name
/// replaces the earlier one.
#[derive(Default)]
pub struct RegistryBuilder {
    inner: StaticRegistry,
}

impl RegistryBuilder {
    pub fn constructor(mut self, name: impl Into<String>, callable: impl Callable + 'static) -> Self {
        self.inner.constructors.insert(name.into(), Box::new(callable));
        self
    }

    pub fn function(mut self, name: impl Into<String>, callable: impl Callable + 'static) -> Self {
        self.inner.functions.insert(name.into(), Box::new(callable));
        self
    }

    pub fn build(self) -> StaticRegistry {
        self.inner
    }
}
