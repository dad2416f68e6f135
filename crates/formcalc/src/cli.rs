//! Clap CLI definitions for the `formcalc` command.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// formcalc -- calculated form fields.
///
/// Evaluates the restricted call formulas of calculated fields against a
/// form submission, using only allowlisted constructors and functions.
#[derive(Parser, Debug)]
#[command(
    name = "formcalc",
    about = "Evaluate calculated form fields",
    long_about = "Evaluates the restricted call formulas of calculated fields against a form submission, using only allowlisted constructors and functions.",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Global flags available to all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config file (default: auto-discover .formcalc/config.yaml).
    #[arg(long, global = true, env = "FORMCALC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose/debug output.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output (errors only).
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,
}

/// All available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a single formula.
    Eval(EvalArgs),

    /// Parse and resolve every configured formula.
    Check,

    /// Run a calculation pass over a stored submission.
    Run(RunArgs),

    /// List the constructors and functions formulas may call.
    Builtins,

    /// Generate shell completions.
    Completion(CompletionArgs),

    /// Print version information.
    Version,
}

/// Arguments for `formcalc eval`.
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// The formula, e.g. `sum([$price, $shipping])`.
    pub formula: String,

    /// Variable binding (key=value, repeatable). Values that parse as JSON
    /// are used as such, anything else is text.
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// JSON object with variable bindings. `--var` entries take precedence.
    #[arg(long, value_name = "FILE")]
    pub vars_file: Option<PathBuf>,
}

/// Arguments for `formcalc run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Submission identifier (`<store>/<id>.json`).
    pub id: String,

    /// Directory holding submission files.
    #[arg(long, default_value = "submissions", env = "FORMCALC_STORE")]
    pub store: PathBuf,

    /// Write the calculated values back into the submission.
    #[arg(long)]
    pub write: bool,
}

/// Arguments for `formcalc completion`.
#[derive(Args, Debug)]
pub struct CompletionArgs {
    /// Target shell.
    #[arg(value_enum)]
    pub shell: Shell,
}
