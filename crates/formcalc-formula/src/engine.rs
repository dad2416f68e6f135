//! Evaluate formulas and run calculation passes over a submission.
//!
//! Evaluation is `parse -> resolve -> bind -> execute`, each step final:
//! a formula outside the grammar never reaches the registry, an unresolved
//! name never binds variables, and only a resolved callable is invoked.

use formcalc_core::{Scope, Submission, Value};
use serde::Serialize;
use tracing::{debug, warn};

use crate::parser;
use crate::registry::{Callable, Registry};
use crate::types::{Arg, ArrayEntry, Call, CallKind, EvalError};

/// Evaluates formulas against a registry.
///
/// Holds no state besides the registry reference, so evaluating the same
/// formula against the same scope always yields the same result.
pub struct Evaluator<'r, R: Registry + ?Sized> {
    registry: &'r R,
}

impl<'r, R: Registry + ?Sized> Evaluator<'r, R> {
    pub fn new(registry: &'r R) -> Self {
        Self { registry }
    }

    /// Parse and evaluate `formula` against `scope`.
    pub fn evaluate(&self, formula: &str, scope: &Scope) -> Result<Value, EvalError> {
        let call = parser::parse(formula)?;
        self.evaluate_call(&call, scope)
    }

    /// Evaluate an already-parsed call.
    pub fn evaluate_call(&self, call: &Call, scope: &Scope) -> Result<Value, EvalError> {
        let callable = self.resolve(call)?;
        let args = bind(call, scope);
        debug!(call = %call, "invoking {}", call.kind.as_str());
        callable
            .invoke(&args)
            .map_err(|source| EvalError::Execution {
                name: call.name.clone(),
                source,
            })
    }

    /// Look up the constructor or function a call names.
    pub fn resolve(&self, call: &Call) -> Result<&'r dyn Callable, EvalError> {
        match call.kind {
            CallKind::Constructor => self
                .registry
                .constructor(&call.name)
                .ok_or_else(|| EvalError::UnknownConstructor(call.name.clone())),
            CallKind::Function => self
                .registry
                .function(&call.name)
                .ok_or_else(|| EvalError::UnknownFunction(call.name.clone())),
        }
    }

    /// Evaluate every calculated field of `submission`.
    ///
    /// The scope is captured once, before any field is evaluated, and excludes
    /// all calculated fields. Malformed formulas and unknown names are logged
    /// and leave the field empty; a failing callable aborts the pass.
    pub fn run_pass(
        &self,
        submission: &Submission,
        fields: &[CalculatedField],
    ) -> Result<PassOutcome, PassError> {
        let calculated: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        let scope = Scope::extract(submission, calculated.as_slice());
        debug!(fields = fields.len(), vars = scope.len(), "starting calculation pass");

        let mut outcome = PassOutcome::default();
        for field in fields {
            let value = match field.formula() {
                None => {
                    debug!(field = %field.name, "no formula configured");
                    None
                }
                Some(formula) => match self.evaluate(formula, &scope) {
                    Ok(value) => Some(value),
                    Err(error) if error.is_recoverable() => {
                        warn!(field = %field.name, %error, "calculation skipped");
                        outcome.failures.push(FieldFailure {
                            field: field.name.clone(),
                            error,
                        });
                        None
                    }
                    Err(error) => {
                        return Err(PassError {
                            field: field.name.clone(),
                            source: error,
                        });
                    }
                },
            };
            outcome.results.push(FieldResult {
                field: field.name.clone(),
                value,
            });
        }

        debug!(
            computed = outcome.results.iter().filter(|r| r.value.is_some()).count(),
            failed = outcome.failures.len(),
            "calculation pass finished"
        );
        Ok(outcome)
    }
}

/// Bind a call's arguments from the scope, preserving their shape.
pub fn bind(call: &Call, scope: &Scope) -> Vec<Value> {
    call.args
        .iter()
        .map(|arg| match arg {
            Arg::Ref(name) => scope.get(name).clone(),
            Arg::Array(entries) => bind_array(entries, scope),
        })
        .collect()
}

/// Positional-only arrays become lists. Once any entry carries a key the
/// array becomes a map, positional entries taking keys `0`, `1`, ... in
/// order. A repeated key keeps the last value.
fn bind_array(entries: &[ArrayEntry], scope: &Scope) -> Value {
    if entries.iter().all(|e| e.key.is_none()) {
        return Value::List(entries.iter().map(|e| scope.get(&e.var).clone()).collect());
    }
    let mut next_index = 0usize;
    let map = entries
        .iter()
        .map(|entry| {
            let key = match &entry.key {
                Some(key) => key.clone(),
                None => {
                    let key = next_index.to_string();
                    next_index += 1;
                    key
                }
            };
            (key, scope.get(&entry.var).clone())
        })
        .collect();
    Value::Map(map)
}

// ---------------------------------------------------------------------------
// Pass types
// ---------------------------------------------------------------------------

/// A calculated field and its (optional) formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculatedField {
    pub name: String,
    pub formula: Option<String>,
}

impl CalculatedField {
    pub fn new(name: impl Into<String>, formula: Option<&str>) -> Self {
        Self {
            name: name.into(),
            formula: formula.map(str::to_string),
        }
    }

    /// The formula, if one is configured and not blank.
    pub fn formula(&self) -> Option<&str> {
        self.formula
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }
}

/// Computed value of one field; `None` when nothing could be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldResult {
    pub field: String,
    pub value: Option<Value>,
}

/// A field whose formula was rejected or named an unknown callable.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFailure {
    pub field: String,
    pub error: EvalError,
}

/// Everything one pass produced, in field order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PassOutcome {
    pub results: Vec<FieldResult>,
    pub failures: Vec<FieldFailure>,
}

impl PassOutcome {
    /// Computed value for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.results
            .iter()
            .find(|r| r.field == field)
            .and_then(|r| r.value.as_ref())
    }

    /// Store every result into `submission`; empty results are stored as null.
    pub fn apply(&self, submission: &mut Submission) {
        for result in &self.results {
            submission.set(result.field.clone(), result.value.clone().unwrap_or_default());
        }
    }
}

/// A callable failed while a pass was running.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("calculated field '{field}'")]
pub struct PassError {
    pub field: String,
    #[source]
    pub source: EvalError,
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;
    use crate::builtins;
    use crate::types::CallError;
    use pretty_assertions::assert_eq;

    /// Records every invocation and echoes its arguments back as a list.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Vec<Value>>>,
    }

    impl Callable for Recorder {
        fn invoke(&self, args: &[Value]) -> Result<Value, CallError> {
            self.calls.lock().unwrap().push(args.to_vec());
            Ok(Value::List(args.to_vec()))
        }
    }

    fn explode(_: &[Value]) -> Result<Value, CallError> {
        Err(CallError::domain("boom"))
    }

    #[derive(Default)]
    struct CountingRegistry {
        lookups: Cell<usize>,
        recorder: Recorder,
    }

    impl CountingRegistry {
        fn invocations(&self) -> Vec<Vec<Value>> {
            self.recorder.calls.lock().unwrap().clone()
        }
    }

    impl Registry for CountingRegistry {
        fn constructor(&self, name: &str) -> Option<&dyn Callable> {
            self.lookups.set(self.lookups.get() + 1);
            (name == "Foo").then_some(&self.recorder as &dyn Callable)
        }

        fn function(&self, name: &str) -> Option<&dyn Callable> {
            self.lookups.set(self.lookups.get() + 1);
            match name {
                "echo" | "double" => Some(&self.recorder as &dyn Callable),
                "explode" => Some(&explode as &dyn Callable),
                _ => None,
            }
        }
    }

    fn scope(pairs: &[(&str, Value)]) -> Scope {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    // -- Evaluator ---------------------------------------------------------

    #[test]
    fn malformed_formulas_never_reach_the_registry() {
        let reg = CountingRegistry::default();
        let eval = Evaluator::new(&reg);
        let s = scope(&[("x", n(1.0))]);
        for formula in [
            "echo($x + 1)",
            "echo(echo($x))",
            "echo($x) echo($x)",
            "echo",
            "DROP TABLE users;",
            "system('rm -rf /')",
            "",
        ] {
            let err = eval.evaluate(formula, &s).unwrap_err();
            assert!(
                matches!(err, EvalError::MalformedFormula { .. }),
                "{:?} -> {:?}",
                formula,
                err
            );
        }
        assert_eq!(reg.lookups.get(), 0);
        assert!(reg.invocations().is_empty());
    }

    #[test]
    fn unknown_function_is_not_invoked() {
        let reg = CountingRegistry::default();
        let eval = Evaluator::new(&reg);
        let err = eval.evaluate("foo($x)", &Scope::default()).unwrap_err();
        assert_eq!(err, EvalError::UnknownFunction("foo".into()));
        assert_eq!(reg.lookups.get(), 1);
        assert!(reg.invocations().is_empty());
    }

    #[test]
    fn unknown_constructor_is_not_invoked() {
        let reg = CountingRegistry::default();
        let eval = Evaluator::new(&reg);
        let err = eval.evaluate("new echo($x)", &Scope::default()).unwrap_err();
        assert_eq!(err, EvalError::UnknownConstructor("echo".into()));
        assert!(reg.invocations().is_empty());
    }

    #[test]
    fn constructor_receives_keyed_map() {
        let reg = CountingRegistry::default();
        let eval = Evaluator::new(&reg);
        let s = scope(&[("x", n(1.0))]);
        eval.evaluate("new Foo(['a' => $x, 'b' => $y])", &s).unwrap();

        let expected = Value::Map(BTreeMap::from([
            ("a".to_string(), n(1.0)),
            ("b".to_string(), Value::Null),
        ]));
        assert_eq!(reg.invocations(), vec![vec![expected]]);
    }

    #[test]
    fn mixed_array_numbers_positional_entries() {
        let reg = CountingRegistry::default();
        let eval = Evaluator::new(&reg);
        let s = scope(&[("a", n(1.0)), ("b", n(2.0)), ("c", n(3.0))]);
        let out = eval.evaluate("echo([$a, 'k' => $b, $c])", &s).unwrap();

        let expected = Value::Map(BTreeMap::from([
            ("0".to_string(), n(1.0)),
            ("k".to_string(), n(2.0)),
            ("1".to_string(), n(3.0)),
        ]));
        assert_eq!(out, Value::List(vec![expected]));
    }

    #[test]
    fn absent_variable_still_invokes() {
        let reg = CountingRegistry::default();
        let eval = Evaluator::new(&reg);
        let s = scope(&[("x", n(3.0))]);
        eval.evaluate("double($x, $y)", &s).unwrap();
        assert_eq!(reg.invocations(), vec![vec![n(3.0), Value::Null]]);
    }

    #[test]
    fn execution_errors_propagate() {
        let reg = CountingRegistry::default();
        let eval = Evaluator::new(&reg);
        let err = eval.evaluate("explode($x)", &Scope::default()).unwrap_err();
        assert_eq!(
            err,
            EvalError::Execution {
                name: "explode".into(),
                source: CallError::domain("boom"),
            }
        );
    }

    #[test]
    fn evaluation_is_idempotent() {
        let reg = builtins::registry();
        let eval = Evaluator::new(&reg);
        let s = scope(&[("price", Value::from("9.99")), ("qty", n(3.0))]);
        let formula = "new LineItem(['price' => $price, 'quantity' => $qty])";
        let first = eval.evaluate(formula, &s).unwrap();
        let second = eval.evaluate(formula, &s).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn sum_scenario() {
        let reg = builtins::registry();
        let eval = Evaluator::new(&reg);
        let s = scope(&[("x", n(3.0)), ("y", n(4.0))]);
        assert_eq!(eval.evaluate("sum([$x, $y])", &s).unwrap(), n(7.0));
    }

    #[test]
    fn works_through_a_trait_object() {
        let reg = builtins::registry();
        let dyn_reg: &dyn Registry = &reg;
        let eval = Evaluator::new(dyn_reg);
        let s = scope(&[("x", n(2.0))]);
        assert_eq!(eval.evaluate("max([$x, $x])", &s).unwrap(), n(2.0));
    }

    // -- Calculation pass --------------------------------------------------

    fn submission() -> Submission {
        [
            ("x", n(1.0)),
            ("total", Value::from("stale")),
            ("other", n(99.0)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn pass_excludes_calculated_fields_from_scope() {
        let reg = CountingRegistry::default();
        let eval = Evaluator::new(&reg);
        let fields = [
            CalculatedField::new("total", Some("echo([$x, $total, $other])")),
            CalculatedField::new("other", Some("echo($other)")),
        ];
        let outcome = eval.run_pass(&submission(), &fields).unwrap();
        assert_eq!(
            outcome.get("total"),
            Some(&Value::List(vec![Value::List(vec![n(1.0), Value::Null, Value::Null])]))
        );
        assert_eq!(outcome.get("other"), Some(&Value::List(vec![Value::Null])));
    }

    #[test]
    fn pass_absorbs_structural_failures() {
        let reg = CountingRegistry::default();
        let eval = Evaluator::new(&reg);
        let fields = [
            CalculatedField::new("bad", Some("echo($x +")),
            CalculatedField::new("unknown", Some("nope($x)")),
            CalculatedField::new("empty", None),
            CalculatedField::new("blank", Some("   ")),
            CalculatedField::new("good", Some("echo($x)")),
        ];
        let outcome = eval.run_pass(&submission(), &fields).unwrap();

        let fields: Vec<_> = outcome.results.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(fields, vec!["bad", "unknown", "empty", "blank", "good"]);
        assert_eq!(outcome.get("bad"), None);
        assert_eq!(outcome.get("empty"), None);
        assert_eq!(outcome.get("good"), Some(&Value::List(vec![n(1.0)])));

        let failed: Vec<_> = outcome
            .failures
            .iter()
            .map(|f| (f.field.as_str(), f.error.kind()))
            .collect();
        assert_eq!(
            failed,
            vec![("bad", "malformed_formula"), ("unknown", "unknown_function")]
        );
    }

    #[test]
    fn pass_aborts_on_execution_error() {
        let reg = CountingRegistry::default();
        let eval = Evaluator::new(&reg);
        let fields = [
            CalculatedField::new("first", Some("explode($x)")),
            CalculatedField::new("second", Some("echo($x)")),
        ];
        let err = eval.run_pass(&submission(), &fields).unwrap_err();
        assert_eq!(err.field, "first");
        let chain: Vec<String> = std::iter::successors(
            Some(&err as &(dyn std::error::Error + 'static)),
            |e| e.source(),
        )
        .map(|e| e.to_string())
        .collect();
        assert_eq!(
            chain,
            vec!["calculated field 'first'", "explode failed", "boom"]
        );
        assert!(reg.invocations().is_empty());
    }

    #[test]
    fn apply_writes_results_back() {
        let reg = builtins::registry();
        let eval = Evaluator::new(&reg);
        let mut sub = submission();
        let fields = [
            CalculatedField::new("total", Some("sum([$x, $x])")),
            CalculatedField::new("other", Some("bogus(")),
        ];
        let outcome = eval.run_pass(&sub, &fields).unwrap();
        outcome.apply(&mut sub);
        assert_eq!(sub.get("total"), Some(&n(2.0)));
        assert_eq!(sub.get("other"), Some(&Value::Null));
        assert_eq!(sub.get("x"), Some(&n(1.0)));
    }
}
