//! `formcalc eval` -- evaluate one formula against ad-hoc variables.

use std::path::Path;

use anyhow::{Context, Result, bail};

use formcalc_core::{Scope, Submission, Value};
use formcalc_formula::Evaluator;
use formcalc_ui::Renderer;

use crate::cli::EvalArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `formcalc eval` command.
pub fn run(ctx: &RuntimeContext, args: &EvalArgs) -> Result<()> {
    let mut vars = match &args.vars_file {
        Some(path) => load_vars_file(path)?,
        None => Submission::new(),
    };
    for (name, value) in parse_var_flags(&args.vars)? {
        vars.set(name, value);
    }

    let no_calculated: &[&str] = &[];
    let scope = Scope::extract(&vars, no_calculated);

    let registry = ctx.registry();
    let value = Evaluator::new(&registry).evaluate(&args.formula, &scope)?;

    if ctx.json {
        output_json(&serde_json::json!({
            "formula": args.formula,
            "value": value,
        }));
    } else {
        println!("{}", ctx.renderer().render(&value));
    }
    Ok(())
}

/// Parse `--var key=value` flags.
///
/// A value that is valid JSON keeps its JSON type (`3` is a number, `"3"`
/// and `abc` are text).
pub(crate) fn parse_var_flags(vars: &[String]) -> Result<Vec<(String, Value)>> {
    vars.iter()
        .map(|v| {
            let Some((name, raw)) = v.split_once('=') else {
                bail!("invalid variable format '{}': expected key=value", v);
            };
            let name = name.trim();
            if name.is_empty() {
                bail!("invalid variable format '{}': empty key", v);
            }
            let value = serde_json::from_str::<serde_json::Value>(raw)
                .map(Value::from)
                .unwrap_or_else(|_| Value::from(raw));
            Ok((name.to_string(), value))
        })
        .collect()
}

fn load_vars_file(path: &Path) -> Result<Submission> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON object of variables", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn var_flags_keep_json_types() {
        let vars = parse_var_flags(&[
            "qty=3".to_string(),
            "name=Ada".to_string(),
            "code=\"007\"".to_string(),
            "zip=007".to_string(),
            "items=[1, 2]".to_string(),
            "note=a=b".to_string(),
            "blank=".to_string(),
        ])
        .unwrap();
        assert_eq!(
            vars,
            vec![
                ("qty".to_string(), Value::Number(3.0)),
                ("name".to_string(), Value::from("Ada")),
                ("code".to_string(), Value::from("007")),
                ("zip".to_string(), Value::from("007")),
                (
                    "items".to_string(),
                    Value::List(vec![Value::Number(1.0), Value::Number(2.0)])
                ),
                ("note".to_string(), Value::from("a=b")),
                ("blank".to_string(), Value::from("")),
            ]
        );
    }

    #[test]
    fn var_flags_require_key_value() {
        assert!(parse_var_flags(&["qty".to_string()]).is_err());
        assert!(parse_var_flags(&["=3".to_string()]).is_err());
    }

    #[test]
    fn vars_file_must_be_an_object() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"{"price": 12.5, "qty": 2}"#).unwrap();
        let vars = load_vars_file(&good).unwrap();
        assert_eq!(vars.get("price"), Some(&Value::Number(12.5)));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "[1, 2]").unwrap();
        assert!(load_vars_file(&bad).is_err());
    }
}
