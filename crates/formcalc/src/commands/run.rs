//! `formcalc run` -- run a calculation pass over a stored submission.
//!
//! Loads `<store>/<id>.json`, evaluates every configured calculated field
//! against the non-calculated values, prints the results and, with
//! `--write`, stores them back into the submission.

use anyhow::{Context, Result};

use formcalc_formula::{Evaluator, PassOutcome};
use formcalc_storage::{JsonFileStore, SubmissionStore};
use formcalc_ui::Renderer;
use formcalc_ui::styles::{render_category, render_muted, render_pass_icon, render_warn_icon};

use crate::cli::RunArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `formcalc run` command.
pub fn run(ctx: &RuntimeContext, args: &RunArgs) -> Result<()> {
    let store = JsonFileStore::new(&args.store);
    let mut submission = store
        .load(&args.id)
        .with_context(|| format!("failed to load submission '{}'", args.id))?;

    let registry = ctx.registry();
    let outcome = Evaluator::new(&registry)
        .run_pass(&submission, &ctx.calculated_fields())
        .with_context(|| format!("submission '{}'", args.id))?;

    if args.write {
        outcome.apply(&mut submission);
        store
            .save(&args.id, &submission)
            .with_context(|| format!("failed to save submission '{}'", args.id))?;
    }

    if ctx.json {
        print_json(&args.id, &outcome, args.write);
    } else {
        print_human(ctx, &outcome);
        if args.write && !ctx.quiet {
            println!();
            println!("Saved {} calculated field(s) to '{}'.", outcome.results.len(), args.id);
        }
    }
    Ok(())
}

fn print_json(id: &str, outcome: &PassOutcome, written: bool) {
    // Keyed by field, in configuration order.
    let results: serde_json::Map<String, serde_json::Value> = outcome
        .results
        .iter()
        .map(|r| (r.field.clone(), serde_json::json!(r.value)))
        .collect();
    let failures: Vec<serde_json::Value> = outcome
        .failures
        .iter()
        .map(|f| {
            serde_json::json!({
                "field": f.field,
                "kind": f.error.kind(),
                "error": f.error.to_string(),
            })
        })
        .collect();
    output_json(&serde_json::json!({
        "id": id,
        "results": results,
        "failures": failures,
        "written": written,
    }));
}

fn print_human(ctx: &RuntimeContext, outcome: &PassOutcome) {
    if outcome.results.is_empty() {
        if !ctx.quiet {
            println!("No calculated fields configured.");
        }
        return;
    }

    let renderer = ctx.renderer();
    if !ctx.quiet {
        println!("{}", render_category("Calculated fields"));
    }
    for result in &outcome.results {
        let label = ctx.label(&result.field);
        match &result.value {
            Some(value) => println!("{} {}: {}", render_pass_icon(), label, renderer.render(value)),
            None => {
                let reason = outcome
                    .failures
                    .iter()
                    .find(|f| f.field == result.field)
                    .map(|f| f.error.to_string())
                    .unwrap_or_else(|| "no formula".to_string());
                println!(
                    "{} {}: {}",
                    render_warn_icon(),
                    label,
                    render_muted(&format!("(empty: {})", reason))
                );
            }
        }
    }
}
