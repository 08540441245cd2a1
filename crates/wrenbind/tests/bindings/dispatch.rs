//! Foreign calls and the fiber abort channel

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use super::harness::*;
use wrenbind::{ClassDecl, Config, ModuleDecl, SessionError, SessionOptions};

#[derive(Debug)]
struct DivideByZero;

impl fmt::Display for DivideByZero {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot divide by zero")
    }
}

fn math() -> ModuleDecl {
    ModuleDecl::new("main").class(
        ClassDecl::namespace("Math")
            .proc("add", |a: i64, b: i64| a + b)
            .proc("divide", |a: f64, b: f64| -> Result<f64, DivideByZero> {
                if b == 0.0 {
                    Err(DivideByZero)
                } else {
                    Ok(a / b)
                }
            })
            .proc("explode", || -> i64 { panic!("host blew up") }),
    )
}

#[test]
fn test_host_failure_aborts_only_the_calling_fiber() {
    let (mut session, output) = armed(vec![math()]);
    let printed = run_main(
        &mut session,
        &output,
        r#"
var f = Fiber.new { Math.divide(1, 0) }
System.print(f.try())
System.print(f.isDone)
System.print(Math.divide(9, 2))
"#,
    );
    assert_eq!(printed, "cannot divide by zero [DivideByZero]\ntrue\n4.5\n");

    // The session keeps working after the abort.
    let printed = run_main(&mut session, &output, "System.print(Math.add(40, 2))");
    assert_eq!(printed, "42\n");
}

#[test]
fn test_argument_mismatch_aborts_the_fiber() {
    let (mut session, output) = armed(vec![math()]);
    let printed = run_main(
        &mut session,
        &output,
        r#"
var f = Fiber.new { Math.add(1, "two") }
System.print(f.try())
var g = Fiber.new { Math.add(true, 2) }
System.print(g.try())
"#,
    );
    assert_eq!(
        printed,
        "Math.add(_,_): argument 2 expected Int, got String [TypeMismatch]\n\
         Math.add(_,_): argument 1 expected Int, got Bool [TypeMismatch]\n"
    );
}

#[test]
fn test_numbers_coerce_between_int_and_float() {
    let (mut session, output) = armed(vec![math()]);
    // Floats passed for integer parameters are truncated toward zero.
    let printed = run_main(&mut session, &output, "System.print(Math.add(1.9, -1.9))");
    assert_eq!(printed, "0\n");
}

#[test]
fn test_panics_are_caught_at_the_boundary() {
    let (mut session, output) = armed(vec![math()]);
    let printed = run_main(
        &mut session,
        &output,
        "var f = Fiber.new { Math.explode() }\nSystem.print(f.try())\nSystem.print(Math.add(1, 1))\n",
    );
    assert_eq!(printed, "host blew up [panic]\n2\n");
}

#[test]
fn test_uncaught_abort_surfaces_as_execution_error() {
    let (mut session, _output) = armed(vec![math()]);
    let result = session.run("main", "Math.divide(1, 0)");
    match result {
        Err(SessionError::VmExecution { message, .. }) => {
            assert_eq!(message, "cannot divide by zero [DivideByZero]");
        }
        other => panic!("expected an execution error, got {:?}", other),
    }
    session.run("main", "var ok = Math.add(1, 2)").unwrap();
    assert_eq!(session.get::<i64>("main", "ok").unwrap(), 3);
}

#[test]
fn test_host_backtraces_are_appended_when_enabled() {
    let options = SessionOptions {
        host_backtraces: true,
        ..SessionOptions::default()
    };
    let (mut session, output) = armed_with(Config::new().with_options(options), vec![math()]);
    let printed = run_main(
        &mut session,
        &output,
        "var f = Fiber.new { Math.divide(1, 0) }\nSystem.print(f.try())\n",
    );
    assert!(printed.starts_with("cannot divide by zero [DivideByZero]\n"));
    assert!(printed.lines().count() > 1);
}

#[test]
fn test_host_closures_keep_their_state() {
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let (mut session, output) = armed(vec![ModuleDecl::new("main").class(
        ClassDecl::namespace("Counter").proc("next", move || {
            counter.set(counter.get() + 1);
            counter.get()
        }),
    )]);
    let printed = run_main(
        &mut session,
        &output,
        "for (i in 1..3) System.print(Counter.next())",
    );
    assert_eq!(printed, "1\n2\n3\n");
    assert_eq!(calls.get(), 3);
}

#[test]
fn test_write_hook_receives_script_output() {
    let (mut session, output) = armed(vec![]);
    session
        .run("main", "System.print(\"Testing output!\")")
        .unwrap();
    assert_eq!(*output.borrow(), "Testing output!\n");
}

#[test]
fn test_unbound_foreign_method_fails_loudly() {
    let (mut session, _output) = armed(vec![math()]);
    let result = session.run("main", "class Rogue {\n  foreign static missing(a)\n}\n");
    match result {
        Err(SessionError::Bind(error)) => {
            assert_eq!(
                error.to_string(),
                "No binding for foreign method Rogue.missing(_) in module 'main'"
            );
        }
        other => panic!("expected a binding error, got {:?}", other),
    }
}
