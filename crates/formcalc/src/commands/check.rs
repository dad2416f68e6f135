//! `formcalc check` -- validate every configured formula without running it.
//!
//! Each formula is parsed and its constructor or function resolved against
//! the (allowlist-narrowed) registry. Nothing is invoked.

use anyhow::{Result, bail};
use serde::Serialize;

use formcalc_formula::{EvalError, Evaluator, parser};
use formcalc_ui::styles::{
    render_fail, render_fail_icon, render_muted, render_pass_icon, render_skip_icon, render_warn,
};

use crate::context::RuntimeContext;
use crate::output::{output_json, output_table};

/// Result of checking one calculated field.
#[derive(Debug, Serialize)]
struct FieldCheck {
    field: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    formula: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    variables: Vec<String>,
    /// Variables that name calculated fields and therefore always bind null.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    calculated_refs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl FieldCheck {
    fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Execute the `formcalc check` command.
pub fn run(ctx: &RuntimeContext) -> Result<()> {
    let registry = ctx.registry();
    let evaluator = Evaluator::new(&registry);
    let calculated: Vec<&str> = ctx.config.fields.iter().map(|f| f.name.as_str()).collect();

    let checks: Vec<FieldCheck> = ctx
        .calculated_fields()
        .iter()
        .map(|field| {
            let Some(formula) = field.formula() else {
                return FieldCheck {
                    field: field.name.clone(),
                    status: "skipped",
                    formula: None,
                    variables: Vec::new(),
                    calculated_refs: Vec::new(),
                    error: None,
                };
            };

            let resolved = parser::parse(formula)
                .and_then(|call| evaluator.resolve(&call).map(|_| call));
            match resolved {
                Ok(call) => {
                    let variables: Vec<String> =
                        call.variables().into_iter().map(String::from).collect();
                    let calculated_refs = variables
                        .iter()
                        .filter(|v| calculated.contains(&v.as_str()))
                        .cloned()
                        .collect();
                    FieldCheck {
                        field: field.name.clone(),
                        status: "ok",
                        formula: Some(call.to_string()),
                        variables,
                        calculated_refs,
                        error: None,
                    }
                }
                Err(e) => FieldCheck {
                    field: field.name.clone(),
                    status: e.kind(),
                    formula: Some(formula.to_string()),
                    variables: Vec::new(),
                    calculated_refs: Vec::new(),
                    error: Some(describe(&e)),
                },
            }
        })
        .collect();

    let failed = checks.iter().filter(|c| c.failed()).count();

    if ctx.json {
        output_json(&checks);
    } else if checks.is_empty() {
        if !ctx.quiet {
            println!("No calculated fields configured.");
        }
    } else {
        print_checks(ctx, &checks);
    }

    if failed > 0 {
        bail!("{} of {} formulas failed the check", failed, checks.len());
    }
    Ok(())
}

fn describe(error: &EvalError) -> String {
    match error {
        EvalError::MalformedFormula { reason, .. } => reason.clone(),
        other => other.to_string(),
    }
}

fn print_checks(ctx: &RuntimeContext, checks: &[FieldCheck]) {
    let rows: Vec<Vec<String>> = checks
        .iter()
        .map(|check| {
            let (icon, status, detail) = match (&check.error, check.status) {
                (Some(error), status) => (render_fail_icon(), render_fail(status), error.clone()),
                (None, "skipped") => (
                    render_skip_icon(),
                    render_muted("skipped"),
                    render_muted("no formula"),
                ),
                (None, status) => {
                    let mut detail = check.formula.clone().unwrap_or_default();
                    if !check.calculated_refs.is_empty() {
                        detail.push_str(&render_warn(&format!(
                            "  (always null: {})",
                            check.calculated_refs.join(", ")
                        )));
                    }
                    (render_pass_icon(), status.to_string(), detail)
                }
            };
            vec![
                format!("{} {}", icon, ctx.label(&check.field)),
                status,
                detail,
            ]
        })
        .collect();
    output_table(&["FIELD", "STATUS", "DETAIL"], &rows);
}
