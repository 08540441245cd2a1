//! Subcommand implementations

pub mod glue;
pub mod run;
