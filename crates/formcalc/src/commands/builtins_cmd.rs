//! `formcalc builtins` -- list what formulas may call.

use anyhow::Result;

use formcalc_ui::styles::{render_category, render_muted};

use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `formcalc builtins` command.
pub fn run(ctx: &RuntimeContext) -> Result<()> {
    let registry = ctx.registry();
    let functions: Vec<&str> = registry.function_names().collect();
    let constructors: Vec<&str> = registry.constructor_names().collect();

    if ctx.json {
        output_json(&serde_json::json!({
            "functions": functions,
            "constructors": constructors,
        }));
        return Ok(());
    }

    print_section("Functions", &functions, |name| format!("{}(..)", name));
    println!();
    print_section("Constructors", &constructors, |name| format!("new {}(..)", name));
    Ok(())
}

fn print_section(title: &str, names: &[&str], usage: impl Fn(&str) -> String) {
    println!("{}", render_category(title));
    if names.is_empty() {
        println!("  {}", render_muted("(none allowed)"));
    }
    for &name in names {
        println!("  {}", usage(name));
    }
}
