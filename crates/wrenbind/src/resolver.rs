//! Module resolution and loading for script imports.

use std::path::PathBuf;

use rustc_hash::FxHashMap;

use crate::error::LoadError;

/// Supplies source text for imported modules.
pub trait ModuleLoader {
    /// Canonical name of module `name` imported from `importer`. An empty
    /// result means the import cannot be resolved.
    fn resolve(&self, importer: &str, name: &str) -> String {
        let _ = importer;
        name.to_string()
    }

    fn load(&self, name: &str) -> Result<String, LoadError>;
}

/// Rejects every import.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImports;

impl ModuleLoader for NoImports {
    fn load(&self, _name: &str) -> Result<String, LoadError> {
        Err(LoadError::ImportsDisabled)
    }
}

/// Serves modules registered in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    modules: FxHashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.modules.insert(name.into(), source.into());
    }
}

impl ModuleLoader for MemoryLoader {
    fn resolve(&self, importer: &str, name: &str) -> String {
        resolve_relative(importer, name)
    }

    fn load(&self, name: &str) -> Result<String, LoadError> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(name.to_string()))
    }
}

/// Loads `<name>.wren` from a list of search directories.
///
/// Directories are tried in order; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    search_dirs: Vec<PathBuf>,
}

impl FsLoader {
    pub const EXTENSION: &'static str = "wren";

    pub fn new(search_dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            search_dirs: search_dirs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }
}

impl ModuleLoader for FsLoader {
    fn resolve(&self, importer: &str, name: &str) -> String {
        resolve_relative(importer, name)
    }

    fn load(&self, name: &str) -> Result<String, LoadError> {
        for dir in &self.search_dirs {
            let path = dir.join(format!("{}.{}", name, Self::EXTENSION));
            if !path.is_file() {
                continue;
            }
            tracing::debug!(module = name, path = %path.display(), "loading module");
            return std::fs::read_to_string(&path).map_err(|e| LoadError::Io {
                name: name.to_string(),
                message: e.to_string(),
            });
        }
        Err(LoadError::NotFound(name.to_string()))
    }
}

/// Resolve `./` and `../` imports against the importing module's directory.
/// Other names are returned unchanged.
pub fn resolve_relative(importer: &str, name: &str) -> String {
    if !(name.starts_with("./") || name.starts_with("../")) {
        return name.to_string();
    }
    let mut segments: Vec<&str> = importer.split('/').collect();
    segments.pop();
    for segment in name.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return String::new();
                }
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_resolution() {
        assert_eq!(resolve_relative("main", "util"), "util");
        assert_eq!(resolve_relative("lib/io", "./fs"), "lib/fs");
        assert_eq!(resolve_relative("lib/net/http", "../io"), "lib/io");
        assert_eq!(resolve_relative("main", "./helpers/strings"), "helpers/strings");
        // Escaping above the root cannot be resolved.
        assert_eq!(resolve_relative("main", "../outside"), "");
    }

    #[test]
    fn test_no_imports() {
        assert_eq!(NoImports.load("anything"), Err(LoadError::ImportsDisabled));
        assert_eq!(NoImports.resolve("main", "x"), "x");
    }

    #[test]
    fn test_memory_loader() {
        let loader = MemoryLoader::new().with_module("util", "var x = 1");
        assert_eq!(loader.load("util").unwrap(), "var x = 1");
        assert_eq!(loader.load("nope"), Err(LoadError::NotFound("nope".to_string())));
    }

    #[test]
    fn test_fs_loader_search_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("shared.wren"), "var from = \"second\"").unwrap();
        std::fs::create_dir(first.path().join("lib")).unwrap();
        std::fs::write(first.path().join("lib/tool.wren"), "var from = \"first\"").unwrap();
        std::fs::write(first.path().join("shared.wren"), "var from = \"first\"").unwrap();

        let loader = FsLoader::new([first.path(), second.path()]);
        assert_eq!(loader.load("shared").unwrap(), "var from = \"first\"");
        assert_eq!(loader.load("lib/tool").unwrap(), "var from = \"first\"");
        assert!(matches!(loader.load("missing"), Err(LoadError::NotFound(_))));
    }
}
