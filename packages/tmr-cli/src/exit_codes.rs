//! Process exit codes shared by all subcommands.

pub const SUCCESS: i32 = 0;
/// The analysis ran and failed.
pub const EXECUTION_ERROR: i32 = 1;
/// Bad arguments or missing inputs.
pub const INPUT_ERROR: i32 = 2;
