//! Import resolution and loading

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use super::harness::*;
use wrenbind::{ClassDecl, Config, LoadError, MemoryLoader, ModuleDecl, SessionError, SessionOptions};

fn try_import(module: &str) -> String {
    format!(
        "var f = Fiber.new {{ import \"{}\" }}\nSystem.print(f.try())\n",
        module
    )
}

#[test]
fn test_imports_are_disabled_by_default() {
    let (mut session, output) = armed(vec![]);
    let printed = run_main(&mut session, &output, &try_import("util"));
    assert_eq!(printed, "Could not load module 'util': Imports are disabled\n");
}

#[test]
fn test_memory_loader_serves_modules() {
    let loader = MemoryLoader::new()
        .with_module("util", "class Util {\n  static shout(s) { s + \"!\" }\n}\n")
        .with_module("lib/a", "import \"./b\" for B\nvar A = \"a\" + B\n")
        .with_module("lib/b", "var B = \"b\"\n");
    let (mut session, output) = armed_with(Config::new().with_loader(loader), vec![]);
    let printed = run_main(
        &mut session,
        &output,
        "import \"util\" for Util\nimport \"lib/a\" for A\nSystem.print(Util.shout(A))\n",
    );
    assert_eq!(printed, "ab!\n");

    let printed = run_main(&mut session, &output, &try_import("missing"));
    assert_eq!(printed, "Could not load module 'missing': Module 'missing' not found\n");
}

#[test]
fn test_hooks_override_the_loader() {
    let requests = Rc::new(RefCell::new(Vec::new()));
    let seen = requests.clone();
    let config = Config::new()
        .on_resolve_module(|_importer, name| {
            if name.starts_with("secret") {
                String::new()
            } else {
                format!("std/{}", name)
            }
        })
        .on_load_module(move |name| {
            seen.borrow_mut().push(name.to_string());
            match name {
                "std/greet" => Ok("var Greeting = \"hello\"".to_string()),
                _ => Err(LoadError::NotFound(name.to_string())),
            }
        });
    let (mut session, output) = armed_with(config, vec![]);

    let printed = run_main(
        &mut session,
        &output,
        "import \"greet\" for Greeting\nSystem.print(Greeting)\n",
    );
    assert_eq!(printed, "hello\n");
    // Loaded modules are not loaded again.
    let printed = run_main(&mut session, &output, "import \"greet\" for Greeting as Again\nSystem.print(Again)\n");
    assert_eq!(printed, "hello\n");
    assert_eq!(*requests.borrow(), vec!["std/greet".to_string()]);

    let printed = run_main(&mut session, &output, &try_import("secret/keys"));
    assert_eq!(
        printed,
        "Could not resolve module 'secret/keys' imported from 'main'.\n"
    );
}

#[test]
fn test_module_dirs_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("shapes")).unwrap();
    std::fs::write(
        dir.path().join("shapes/square.wren"),
        "import \"./unit\" for Unit\nclass Square {\n  static area(s) { s * s * Unit }\n}\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("shapes/unit.wren"), "var Unit = 1\n").unwrap();

    let options = SessionOptions {
        module_dirs: vec![dir.path().to_path_buf()],
        ..SessionOptions::default()
    };
    let (mut session, output) = armed_with(Config::new().with_options(options), vec![]);
    let printed = run_main(
        &mut session,
        &output,
        "import \"shapes/square\" for Square\nSystem.print(Square.area(3))\n",
    );
    assert_eq!(printed, "9\n");
}

#[test]
fn test_bound_modules_are_importable() {
    let (mut session, output) = armed(vec![ModuleDecl::new("geometry").class(
        ClassDecl::namespace("Geo").proc("hypot", |a: f64, b: f64| a.hypot(b)),
    )]);
    let printed = run_main(
        &mut session,
        &output,
        "import \"geometry\" for Geo\nSystem.print(Geo.hypot(3, 4))\n",
    );
    assert_eq!(printed, "5\n");
    assert!(session.glue("geometry").unwrap().starts_with("class Geo {"));
    assert!(session.glue("main").is_none());
}

#[test]
fn test_run_file_reports_unreadable_paths() {
    let (mut session, _output) = armed(vec![]);
    let result = session.run_file("main", Path::new("/definitely/not/here.wren"));
    assert!(matches!(result, Err(SessionError::Load(LoadError::Io { .. }))));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("script.wren");
    std::fs::write(&path, "var answer = 6 * 7").unwrap();
    session.run_file("main", &path).unwrap();
    assert_eq!(session.get::<i64>("main", "answer").unwrap(), 42);
}

#[test]
fn test_compile_errors_name_the_module() {
    let (mut session, _output) = armed(vec![]);
    match session.run("broken", "var = 1") {
        Err(SessionError::Compile { module, .. }) => assert_eq!(module, "broken"),
        other => panic!("expected a compile error, got {:?}", other),
    }
}
