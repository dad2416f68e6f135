//! Command handlers, one module per subcommand.

pub mod builtins_cmd;
pub mod check;
pub mod completion;
pub mod eval;
pub mod run;
pub mod version;
