//! `formcalc` -- calculated form fields from the command line.
//!
//! Parses CLI arguments with clap, loads the configuration into a
//! [`RuntimeContext`], sets up logging, and dispatches to command handlers.

mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use context::RuntimeContext;

fn main() {
    let cli = Cli::parse();

    // Completions must work even when the config is broken.
    if let Some(Commands::Completion(args)) = &cli.command {
        exit_on_error(commands::completion::run(args), cli.global.json);
        return;
    }

    let ctx = match RuntimeContext::from_global_args(&cli.global) {
        Ok(ctx) => ctx,
        Err(e) => {
            exit_on_error(Err(e), cli.global.json);
            return;
        }
    };

    init_logging(&ctx);
    tracing::debug!(config = ?ctx.config_path, fields = ctx.config.fields.len(), "configuration loaded");

    let result = match &cli.command {
        Some(Commands::Eval(args)) => commands::eval::run(&ctx, args),
        Some(Commands::Check) => commands::check::run(&ctx),
        Some(Commands::Run(args)) => commands::run::run(&ctx, args),
        Some(Commands::Builtins) => commands::builtins_cmd::run(&ctx),
        Some(Commands::Version) => commands::version::run(&ctx),
        Some(Commands::Completion(args)) => commands::completion::run(args),
        None => {
            // No subcommand -- print help
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    exit_on_error(result, ctx.json);
}

/// Log to stderr. `RUST_LOG` wins, then `-v` / `-q`, then `log.level` from
/// the config.
fn init_logging(ctx: &RuntimeContext) {
    let default = if ctx.verbose {
        "formcalc=debug".to_string()
    } else if ctx.quiet {
        "error".to_string()
    } else {
        ctx.config.log.level.to_ascii_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Print the error (as JSON in `--json` mode) and exit with code 1.
fn exit_on_error(result: anyhow::Result<()>, json: bool) {
    let Err(e) = result else {
        return;
    };
    if json {
        let err_json = serde_json::json!({
            "error": format!("{:#}", e),
        });
        if let Ok(s) = serde_json::to_string_pretty(&err_json) {
            eprintln!("{}", s);
        }
    } else {
        eprintln!("Error: {:#}", e);
    }
    std::process::exit(1);
}
