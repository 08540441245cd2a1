//! Shared session setup for the binding tests

use std::cell::RefCell;
use std::rc::Rc;

use wrenbind::{Config, ModuleDecl, Session};

/// Script output collected by a write hook.
pub type Output = Rc<RefCell<String>>;

/// A config whose write hook appends to the returned buffer.
pub fn capturing(config: Config) -> (Config, Output) {
    let output: Output = Rc::new(RefCell::new(String::new()));
    let sink = output.clone();
    let config = config.on_write(move |text| sink.borrow_mut().push_str(text));
    (config, output)
}

/// Declare `modules` in order and arm the session.
pub fn armed_with(config: Config, modules: Vec<ModuleDecl>) -> (Session, Output) {
    let (config, output) = capturing(config);
    let mut session = Session::with_config(config);
    for module in modules {
        session.declare(module).expect("bindings should compile");
    }
    session.arm().expect("session should arm");
    (session, output)
}

pub fn armed(modules: Vec<ModuleDecl>) -> (Session, Output) {
    armed_with(Config::new(), modules)
}

/// Run `source` as module `main` and return everything it printed.
pub fn run_main(session: &mut Session, output: &Output, source: &str) -> String {
    output.borrow_mut().clear();
    session.run("main", source).expect("script should run");
    let text = output.borrow().clone();
    text
}
