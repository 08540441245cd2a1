//! Session configuration

use std::path::PathBuf;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::resolver::ModuleLoader;

pub type WriteHook = Rc<dyn Fn(&str)>;
pub type ResolveHook = Rc<dyn Fn(&str, &str) -> String>;
pub type LoadHook = Rc<dyn Fn(&str) -> Result<String, LoadError>>;

/// Diagnostics switches, loadable from a config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Log the generated glue of each module when the session is armed
    pub dump_glue: bool,
    /// Log every bound class and member when the session is armed
    pub dump_classes: bool,
    /// Append a host backtrace to errors raised by host functions
    pub host_backtraces: bool,
    /// Directories searched for `<module>.wren` when no loader is set
    pub module_dirs: Vec<PathBuf>,
}

/// Hooks and options for a [`crate::Session`]
#[derive(Clone, Default)]
pub struct Config {
    pub(crate) write: Option<WriteHook>,
    pub(crate) resolve_module: Option<ResolveHook>,
    pub(crate) load_module: Option<LoadHook>,
    pub(crate) loader: Option<Rc<dyn ModuleLoader>>,
    pub options: SessionOptions,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Receive text printed by scripts. Defaults to stdout.
    pub fn on_write(mut self, hook: impl Fn(&str) + 'static) -> Self {
        self.write = Some(Rc::new(hook));
        self
    }

    /// Map `(importer, name)` to a canonical module name; return an empty
    /// string to reject the import.
    pub fn on_resolve_module(mut self, hook: impl Fn(&str, &str) -> String + 'static) -> Self {
        self.resolve_module = Some(Rc::new(hook));
        self
    }

    /// Supply the source of a resolved module.
    pub fn on_load_module(
        mut self,
        hook: impl Fn(&str) -> Result<String, LoadError> + 'static,
    ) -> Self {
        self.load_module = Some(Rc::new(hook));
        self
    }

    /// Use `loader` for imports not handled by the hooks above.
    pub fn with_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Some(Rc::new(loader));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_toml() {
        let options: SessionOptions = toml::from_str(
            r#"
dump_glue = true
module_dirs = ["scripts", "vendor/scripts"]
"#,
        )
        .unwrap();
        assert!(options.dump_glue);
        assert!(!options.host_backtraces);
        assert_eq!(options.module_dirs, vec![PathBuf::from("scripts"), PathBuf::from("vendor/scripts")]);
    }

    #[test]
    fn test_default_options() {
        let options: SessionOptions = toml::from_str("").unwrap();
        assert_eq!(options, SessionOptions::default());
    }
}
