//! The standard allowlist of calculation callables.
//!
//! Aggregate functions flatten their arguments: a list contributes its items,
//! a map its values, a scalar itself. Null and empty-text values are skipped,
//! so an unfilled optional field never breaks a total.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use formcalc_core::Value;

use crate::registry::StaticRegistry;
use crate::types::CallError;

/// Highest precision accepted by `round`.
const MAX_PRECISION: i64 = 15;

/// Build the registry of built-in constructors and functions.
pub fn registry() -> StaticRegistry {
    StaticRegistry::builder()
        .function("sum", sum)
        .function("product", product)
        .function("min", min)
        .function("max", max)
        .function("average", average)
        .function("count", count)
        .function("round", round)
        .function("concat", concat)
        .function("join", join)
        .function("if_empty", if_empty)
        .function("days_between", days_between)
        .constructor("LineItem", line_item)
        .constructor("DateRange", date_range)
        .build()
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

fn sum(args: &[Value]) -> Result<Value, CallError> {
    finite(numbers(args)?.iter().sum()).map(Value::Number)
}

fn product(args: &[Value]) -> Result<Value, CallError> {
    finite(numbers(args)?.iter().product()).map(Value::Number)
}

fn min(args: &[Value]) -> Result<Value, CallError> {
    Ok(numbers(args)?
        .into_iter()
        .reduce(f64::min)
        .map_or(Value::Null, Value::Number))
}

fn max(args: &[Value]) -> Result<Value, CallError> {
    Ok(numbers(args)?
        .into_iter()
        .reduce(f64::max)
        .map_or(Value::Null, Value::Number))
}

fn average(args: &[Value]) -> Result<Value, CallError> {
    let nums = numbers(args)?;
    if nums.is_empty() {
        return Ok(Value::Null);
    }
    finite(nums.iter().sum::<f64>() / nums.len() as f64).map(Value::Number)
}

/// Number of non-empty values.
fn count(args: &[Value]) -> Result<Value, CallError> {
    let n = flatten(args).into_iter().filter(|(_, v)| !is_empty(v)).count();
    Ok(Value::from(n as i64))
}

/// `round($value)` or `round($value, $precision)`, half away from zero.
fn round(args: &[Value]) -> Result<Value, CallError> {
    let (value, precision) = match args {
        [value] => (value, 0),
        [value, precision] => (value, precision_arg(precision)?),
        _ => {
            return Err(CallError::Arity {
                expected: "1 or 2",
                got: args.len(),
            });
        }
    };
    if is_empty(value) {
        return Ok(Value::Null);
    }
    let n = number(1, value)?;
    let factor = 10_f64.powi(precision as i32);
    let scaled = n * factor;
    // Magnitudes this large carry no fractional digits.
    if !scaled.is_finite() {
        return Ok(Value::Number(n));
    }
    Ok(Value::Number(scaled.round() / factor))
}

fn precision_arg(value: &Value) -> Result<i64, CallError> {
    let n = number(2, value)?;
    if n.fract() != 0.0 || !(0.0..=MAX_PRECISION as f64).contains(&n) {
        return Err(CallError::domain(format!(
            "precision must be an integer between 0 and {}, got {}",
            MAX_PRECISION, n
        )));
    }
    Ok(n as i64)
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

fn concat(args: &[Value]) -> Result<Value, CallError> {
    let parts = texts(args)?;
    Ok(Value::Text(parts.concat()))
}

/// `join($values, $separator)`.
fn join(args: &[Value]) -> Result<Value, CallError> {
    let [values, separator] = args else {
        return Err(CallError::Arity {
            expected: "2",
            got: args.len(),
        });
    };
    let separator = match separator {
        Value::Null => "",
        Value::Text(s) => s.as_str(),
        other => {
            return Err(CallError::Type {
                index: 2,
                expected: "text",
                got: other.type_name(),
            });
        }
    };
    let parts = texts(std::slice::from_ref(values))?;
    Ok(Value::Text(parts.join(separator)))
}

/// `if_empty($value, $fallback)`.
fn if_empty(args: &[Value]) -> Result<Value, CallError> {
    let [value, fallback] = args else {
        return Err(CallError::Arity {
            expected: "2",
            got: args.len(),
        });
    };
    Ok(if is_empty(value) {
        fallback.clone()
    } else {
        value.clone()
    })
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// `days_between($start, $end)`: signed whole days from start to end.
fn days_between(args: &[Value]) -> Result<Value, CallError> {
    let [start, end] = args else {
        return Err(CallError::Arity {
            expected: "2",
            got: args.len(),
        });
    };
    match (date_arg(1, start)?, date_arg(2, end)?) {
        (Some(start), Some(end)) => Ok(Value::from((end - start).num_days())),
        _ => Ok(Value::Null),
    }
}

/// `new DateRange(['start' => $a, 'end' => $b])` or `new DateRange($a, $b)`.
///
/// Produces `{start, end, days}`; `days` is null while either date is empty.
/// An end before the start is an error.
fn date_range(args: &[Value]) -> Result<Value, CallError> {
    let (start, end) = match args {
        [Value::Map(map)] => (field(map, "start"), field(map, "end")),
        [start, end] => (start, end),
        [other] => {
            return Err(CallError::Type {
                index: 1,
                expected: "map",
                got: other.type_name(),
            });
        }
        _ => {
            return Err(CallError::Arity {
                expected: "1 or 2",
                got: args.len(),
            });
        }
    };
    let start_date = date_arg(1, start)?;
    let end_date = date_arg(2, end)?;

    let days = match (start_date, end_date) {
        (Some(s), Some(e)) if e < s => {
            return Err(CallError::domain(format!(
                "end date {} precedes start date {}",
                e, s
            )));
        }
        (Some(s), Some(e)) => Value::from((e - s).num_days()),
        _ => Value::Null,
    };

    let mut out = BTreeMap::new();
    out.insert("start".to_string(), date_value(start_date));
    out.insert("end".to_string(), date_value(end_date));
    out.insert("days".to_string(), days);
    Ok(Value::Map(out))
}

fn date_value(date: Option<NaiveDate>) -> Value {
    date.map_or(Value::Null, |d| Value::Text(d.format("%Y-%m-%d").to_string()))
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (date part is kept).
fn date_arg(index: usize, value: &Value) -> Result<Option<NaiveDate>, CallError> {
    if is_empty(value) {
        return Ok(None);
    }
    let Value::Text(raw) = value else {
        return Err(CallError::Type {
            index,
            expected: "date text",
            got: value.type_name(),
        });
    };
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| Some(dt.date_naive()))
        .map_err(|_| CallError::domain(format!("invalid date '{}'", raw)))
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

/// `new LineItem(['price' => $p, 'quantity' => $q, 'tax_rate' => $t])`.
///
/// Missing quantity defaults to 1, missing tax rate (a percentage) to 0.
/// Produces `{subtotal, tax, total}`.
fn line_item(args: &[Value]) -> Result<Value, CallError> {
    let map = match args {
        [Value::Map(map)] => map,
        [other] => {
            return Err(CallError::Type {
                index: 1,
                expected: "map",
                got: other.type_name(),
            });
        }
        _ => {
            return Err(CallError::Arity {
                expected: "1",
                got: args.len(),
            });
        }
    };
    let price = optional_number(field(map, "price"))?.unwrap_or(0.0);
    let quantity = optional_number(field(map, "quantity"))?.unwrap_or(1.0);
    let tax_rate = optional_number(field(map, "tax_rate"))?.unwrap_or(0.0);
    if quantity < 0.0 {
        return Err(CallError::domain(format!("quantity must not be negative, got {}", quantity)));
    }

    let subtotal = finite(price * quantity)?;
    let tax = finite(subtotal * tax_rate / 100.0)?;
    let total = finite(subtotal + tax)?;
    let mut out = BTreeMap::new();
    out.insert("subtotal".to_string(), Value::Number(subtotal));
    out.insert("tax".to_string(), Value::Number(tax));
    out.insert("total".to_string(), Value::Number(total));
    Ok(Value::Map(out))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

static NULL: Value = Value::Null;

fn field<'a>(map: &'a BTreeMap<String, Value>, key: &str) -> &'a Value {
    map.get(key).unwrap_or(&NULL)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(s) => s.trim().is_empty(),
        Value::List(items) => items.is_empty(),
        Value::Map(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Flatten arguments one level, tagging each item with its 1-based argument index.
fn flatten(args: &[Value]) -> Vec<(usize, &Value)> {
    let mut out = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        match arg {
            Value::List(items) => out.extend(items.iter().map(|v| (i + 1, v))),
            Value::Map(map) => out.extend(map.values().map(|v| (i + 1, v))),
            scalar => out.push((i + 1, scalar)),
        }
    }
    out
}

fn numbers(args: &[Value]) -> Result<Vec<f64>, CallError> {
    flatten(args)
        .into_iter()
        .filter(|(_, v)| !is_empty(v))
        .map(|(index, v)| number(index, v))
        .collect()
}

/// Arithmetic results must stay finite; JSON has no infinity.
fn finite(n: f64) -> Result<f64, CallError> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err(CallError::domain("numeric overflow"))
    }
}

fn number(index: usize, value: &Value) -> Result<f64, CallError> {
    value.as_number().ok_or(CallError::Type {
        index,
        expected: "number",
        got: value.type_name(),
    })
}

fn optional_number(value: &Value) -> Result<Option<f64>, CallError> {
    if is_empty(value) {
        return Ok(None);
    }
    number(1, value).map(Some)
}

fn texts(args: &[Value]) -> Result<Vec<String>, CallError> {
    flatten(args)
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(index, v)| match v {
            Value::Text(s) => Ok(s.clone()),
            Value::Number(n) => Ok(match v.as_integer() {
                Some(i) => i.to_string(),
                None => n.to_string(),
            }),
            Value::Bool(b) => Ok(if *b { "1".to_string() } else { String::new() }),
            other => Err(CallError::Type {
                index,
                expected: "scalar",
                got: other.type_name(),
            }),
        })
        .collect()
}
