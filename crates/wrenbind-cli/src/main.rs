//! wrenbind command-line runner
//!
//! Runs script files in a session preloaded with a small set of demo
//! bindings, and prints the glue those bindings generate.

mod commands;
mod demo;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "wrenbind")]
#[command(about = "Run scripts against typed host bindings", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script file
    Run {
        /// Script to run as module `main`
        file: PathBuf,
        /// Directory searched for imported modules (repeatable)
        #[arg(short = 'I', long = "module-dir")]
        module_dirs: Vec<PathBuf>,
        /// Log the generated glue of every bound module
        #[arg(long)]
        dump_glue: bool,
        /// Log every bound class in declaration order
        #[arg(long)]
        dump_classes: bool,
        /// Append host backtraces to host function errors
        #[arg(long)]
        host_backtraces: bool,
        /// Session options file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the glue generated for the demo bindings
    Glue {
        /// Only print this module
        module: Option<String>,
    },
}

fn init_logging(diagnostics: bool) -> anyhow::Result<()> {
    let mut filter =
        EnvFilter::try_from_env("WRENBIND_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    if diagnostics {
        filter = filter
            .add_directive("wrenbind::glue=info".parse()?)
            .add_directive("wrenbind::classes=info".parse()?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run {
            file,
            module_dirs,
            dump_glue,
            dump_classes,
            host_backtraces,
            config,
        } => {
            init_logging(dump_glue || dump_classes)?;
            commands::run::execute(commands::run::RunArgs {
                file,
                module_dirs,
                dump_glue,
                dump_classes,
                host_backtraces,
                config,
            })
        }
        Commands::Glue { module } => {
            init_logging(false)?;
            commands::glue::execute(module.as_deref())
        }
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::FAILURE
        }
    }
}
