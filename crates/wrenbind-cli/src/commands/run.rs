//! `wrenbind run`: execute a script file with the demo bindings.

use std::path::{Path, PathBuf};

use anyhow::Context;
use wrenbind::{Config, Session, SessionError, SessionOptions};

use crate::demo;

pub struct RunArgs {
    pub file: PathBuf,
    pub module_dirs: Vec<PathBuf>,
    pub dump_glue: bool,
    pub dump_classes: bool,
    pub host_backtraces: bool,
    pub config: Option<PathBuf>,
}

/// Read session options from a TOML file.
pub fn load_options(path: &Path) -> anyhow::Result<SessionOptions> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Combine the config file with command-line flags. Flags only ever enable
/// options; module directories from both are searched, flags first, then
/// the script's own directory.
pub fn session_options(args: &RunArgs) -> anyhow::Result<SessionOptions> {
    let mut options = match &args.config {
        Some(path) => load_options(path)?,
        None => SessionOptions::default(),
    };
    options.dump_glue |= args.dump_glue;
    options.dump_classes |= args.dump_classes;
    options.host_backtraces |= args.host_backtraces;

    let mut dirs = args.module_dirs.clone();
    dirs.append(&mut options.module_dirs);
    if let Some(parent) = args.file.parent() {
        let parent = if parent.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            parent.to_path_buf()
        };
        if !dirs.contains(&parent) {
            dirs.push(parent);
        }
    }
    options.module_dirs = dirs;
    Ok(options)
}

pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    if !args.file.is_file() {
        anyhow::bail!("File not found: {}", args.file.display());
    }
    let options = session_options(&args)?;
    tracing::debug!(file = %args.file.display(), ?options, "running script");

    let mut session = Session::with_config(Config::new().with_options(options));
    demo::declare(&mut session)?;
    session.arm()?;

    match session.run_file("main", &args.file) {
        Err(SessionError::VmExecution { message, trace }) => {
            let mut report = message;
            for frame in trace {
                report.push_str(&format!(
                    "\n  at {} ({}:{})",
                    frame.function, frame.module, frame.line
                ));
            }
            anyhow::bail!(report)
        }
        other => other.with_context(|| format!("Failed to run {}", args.file.display())),
    }
}
