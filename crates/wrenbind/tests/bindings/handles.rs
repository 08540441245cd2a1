//! References to script values and host-initiated calls

use std::cell::RefCell;
use std::rc::Rc;

use super::harness::*;
use wrenbind::{ClassDecl, MarshalError, ModuleDecl, Session, SessionError, SessionState, WrenRef};

const ANIMALS: &str = r#"
class Dog {
  construct new(name) { _name = name }
  run() { "%(_name) the dog runs" }
  fetch(item, times) { "%(_name) fetched %(item) %(times) times" }
}
class Cat {
  construct new() {}
  run() { "the cat runs" }
  fail() { Fiber.abort("cat refused") }
}
var dog = Dog.new("Rex")
var cat = Cat.new()
"#;

fn animals() -> Session {
    let (mut session, _output) = armed(vec![]);
    session.run("main", ANIMALS).unwrap();
    session
}

#[test]
fn test_call_handle_dispatches_to_each_receiver() {
    let mut session = animals();
    let dog = session.get_ref("main", "dog").unwrap();
    let cat = session.get_ref("main", "cat").unwrap();
    let run = session.call_handle("run()").unwrap();

    let first: String = session.call(&dog, &run, ()).unwrap();
    let second: String = session.call(&cat, &run, ()).unwrap();
    assert_eq!(first, "Rex the dog runs");
    assert_eq!(second, "the cat runs");
    assert_eq!(session.call_handle("run()").unwrap(), run);
}

#[test]
fn test_call_with_arguments() {
    let mut session = animals();
    let dog = session.get_ref("main", "dog").unwrap();
    let fetched: String = session
        .call_method(&dog, "fetch(_,_)", ("ball", 3))
        .unwrap();
    assert_eq!(fetched, "Rex fetched ball 3 times");

    let fetch = session.call_handle("fetch(_,_)").unwrap();
    assert_eq!(fetch.arity(), 2);
    let result: Result<String, _> = session.call(&dog, &fetch, ("ball",));
    assert!(matches!(
        result,
        Err(SessionError::Marshal(MarshalError::ArityMismatch { expected: 2, found: 1 }))
    ));
}

#[test]
fn test_script_errors_during_calls_are_execution_errors() {
    let mut session = animals();
    let cat = session.get_ref("main", "cat").unwrap();
    let result: Result<(), _> = session.call_method(&cat, "fail()", ());
    match result {
        Err(SessionError::VmExecution { message, .. }) => assert_eq!(message, "cat refused"),
        other => panic!("expected an execution error, got {:?}", other),
    }
    // The receiver is still usable.
    let ran: String = session.call_method(&cat, "run()", ()).unwrap();
    assert_eq!(ran, "the cat runs");
}

#[test]
fn test_classes_can_be_receivers() {
    let (mut session, _output) = armed(vec![]);
    session
        .run("main", "class Math {\n  static twice(n) { n * 2 }\n}\n")
        .unwrap();
    let math = session.get_ref("main", "Math").unwrap();
    let doubled: f64 = session.call_method(&math, "twice(_)", (21,)).unwrap();
    assert_eq!(doubled, 42.0);
}

#[test]
fn test_dropped_refs_return_handles_to_baseline() {
    let mut session = animals();
    let run = session.call_handle("run()").unwrap();
    let baseline = session.live_handles();

    let dog = session.get_ref("main", "dog").unwrap();
    let alias = dog.clone();
    let cat = session.get_ref("main", "cat").unwrap();
    assert_eq!(session.live_handles(), baseline + 2);

    drop(dog);
    assert_eq!(session.live_handles(), baseline + 2);
    let still: String = session.call(&alias, &run, ()).unwrap();
    assert_eq!(still, "Rex the dog runs");

    drop(alias);
    drop(cat);
    assert_eq!(session.live_handles(), baseline);
}

#[test]
fn test_release_is_explicit_and_idempotent() {
    let mut session = animals();
    let run = session.call_handle("run()").unwrap();
    let baseline = session.live_handles();
    let dog = session.get_ref("main", "dog").unwrap();
    let alias = dog.clone();

    session.release(&dog).unwrap();
    assert!(alias.is_released());
    assert_eq!(session.live_handles(), baseline);
    session.release(&alias).unwrap();

    let result: Result<String, _> = session.call(&alias, &run, ());
    assert!(matches!(result, Err(SessionError::Released)));
    let result: Result<String, _> = session.call_method(&dog, "run()", ());
    assert!(matches!(result, Err(SessionError::Released)));

    drop(dog);
    drop(alias);
    assert_eq!(session.live_handles(), baseline);
}

#[test]
fn test_released_ref_cannot_be_passed_as_argument() {
    let mut session = animals();
    session
        .run("main", "class Box {\n  static hold(x) { x }\n}\n")
        .unwrap();
    let boxed = session.get_ref("main", "Box").unwrap();
    let dog = session.get_ref("main", "dog").unwrap();
    session.release(&dog).unwrap();
    let result: Result<WrenRef, _> = session.call_method(&boxed, "hold(_)", (&dog,));
    assert!(matches!(result, Err(SessionError::Released)));
}

#[test]
fn test_callbacks_run_after_the_foreign_call_returns() {
    let stored: Rc<RefCell<Option<WrenRef>>> = Rc::new(RefCell::new(None));
    let slot = stored.clone();
    let (mut session, output) = armed(vec![ModuleDecl::new("main").class(
        ClassDecl::namespace("Events").proc("onTick", move |callback: WrenRef| {
            *slot.borrow_mut() = Some(callback);
        }),
    )]);
    run_main(
        &mut session,
        &output,
        "Events.onTick { |n| System.print(\"tick %(n)\") }",
    );
    assert!(output.borrow().is_empty());

    let callback = stored.borrow_mut().take().unwrap();
    let call = session.call_handle("call(_)").unwrap();
    let _: () = session.call(&callback, &call, (1,)).unwrap();
    let _: () = session.call(&callback, &call, (2,)).unwrap();
    assert_eq!(*output.borrow(), "tick 1\ntick 2\n");
    assert_eq!(session.state(), SessionState::Executing);
}

#[test]
fn test_calls_require_an_armed_session() {
    let mut session = Session::new();
    assert!(matches!(session.call_handle("run()"), Err(SessionError::NotArmed)));
    assert!(matches!(session.get_ref("main", "x"), Err(SessionError::NotArmed)));
    assert_eq!(session.live_handles(), 0);
}
