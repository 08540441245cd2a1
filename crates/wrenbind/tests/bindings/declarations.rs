//! Declaration order, overloads, duplicates and enums

use super::harness::*;
use wrenbind::{
    host_enum, host_fields, BindError, BindingKind, ClassDecl, EnumDecl, ModuleDecl, Obj,
    Session, SessionError, SessionState,
};

#[derive(Debug, Clone, PartialEq)]
struct Vec2 {
    x: f64,
    y: f64,
}
host_fields!(Vec2 { x: f64, y: f64 });

host_enum! {
    #[allow(non_camel_case_types)]
    enum Opt { optStart, optHelp, optExit }
}

host_enum! {
    enum Level { Low = -3, Mid = 4, High = 9 }
}

fn bind_error(result: Result<(), SessionError>) -> BindError {
    match result {
        Err(SessionError::Bind(error)) => error,
        other => panic!("expected a binding error, got {:?}", other),
    }
}

// ============================================================================
// Overloads
// ============================================================================

#[test]
fn test_overloads_dispatch_on_argument_count() {
    let (mut session, output) = armed(vec![ModuleDecl::new("main").class(
        ClassDecl::namespace("Math")
            .proc("add", |a: i64, b: i64| format!("two:{}", a + b))
            .proc("add", |a: i64, b: i64, c: i64| format!("three:{}", a + b + c)),
    )]);
    let printed = run_main(
        &mut session,
        &output,
        "System.print(Math.add(1, 2))\nSystem.print(Math.add(1, 2, 3))\n",
    );
    assert_eq!(printed, "two:3\nthree:6\n");
}

#[test]
fn test_alias_renames_script_method_only() {
    let (mut session, output) = armed(vec![ModuleDecl::new("main").class(
        ClassDecl::namespace("Text").proc_as("to_upper", "upper", |s: String| s.to_uppercase()),
    )]);
    assert_eq!(run_main(&mut session, &output, "System.print(Text.upper(\"abc\"))"), "ABC\n");
    let entry = session
        .dispatch_table()
        .lookup("main", "Text", true, "upper(_)")
        .unwrap();
    assert_eq!(entry.host_name, "to_upper");
    assert_eq!(entry.arity, 1);
}

#[test]
fn test_inline_members_bind_like_procs() {
    let (mut session, output) = armed(vec![ModuleDecl::new("main").class(
        ClassDecl::namespace("Util").inline("twice", |n: f64| n * 2.0),
    )]);
    assert_eq!(run_main(&mut session, &output, "System.print(Util.twice(2.5))"), "5\n");
    assert!(session.dispatch_table().lookup("main", "Util", true, "twice(_)").unwrap().inline);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_duplicate_member_is_rejected() {
    let mut session = Session::new();
    let error = bind_error(session.declare(ModuleDecl::new("main").class(
        ClassDecl::namespace("Math")
            .proc("add", |a: i64, b: i64| a + b)
            .proc("add", |a: f64, b: f64| a + b),
    )));
    assert!(matches!(error, BindError::DuplicateBinding(ref what) if what.contains("add(_,_)")));
}

#[test]
fn test_duplicate_class_is_rejected_across_declarations() {
    let mut session = Session::new();
    session
        .declare(ModuleDecl::new("main").class(ClassDecl::namespace("Math")))
        .unwrap();
    let error = bind_error(session.declare(ModuleDecl::new("main").class(ClassDecl::namespace("Math"))));
    assert!(matches!(error, BindError::DuplicateBinding(_)));

    // The same class name in another module is a different binding.
    session
        .declare(ModuleDecl::new("other").class(ClassDecl::namespace("Math")))
        .unwrap();
}

#[test]
fn test_class_used_before_declaration_is_unknown() {
    let mut session = Session::new();
    let error = bind_error(
        session.declare(
            ModuleDecl::new("main")
                .class(ClassDecl::namespace("Geometry").proc("length", |v: Obj<Vec2>| {
                    let v = v.borrow();
                    (v.x * v.x + v.y * v.y).sqrt()
                }))
                .class(ClassDecl::object::<Vec2>()),
        ),
    );
    assert_eq!(
        error,
        BindError::UnknownType {
            type_name: "Vec2".to_string(),
            context: "Geometry.length".to_string(),
        }
    );
    assert!(session.registry().is_empty());

    // Declared in order, the same bindings compile.
    session
        .declare(
            ModuleDecl::new("main")
                .class(ClassDecl::object::<Vec2>())
                .class(ClassDecl::namespace("Geometry").proc("length", |v: Obj<Vec2>| {
                    let v = v.borrow();
                    (v.x * v.x + v.y * v.y).sqrt()
                })),
        )
        .unwrap();
}

#[test]
fn test_unknown_type_inside_composite_tags() {
    let mut session = Session::new();
    let error = bind_error(session.declare(
        ModuleDecl::new("main").class(ClassDecl::namespace("Bag").proc("all", || Vec::<Obj<Vec2>>::new())),
    ));
    assert!(matches!(error, BindError::UnknownType { ref type_name, .. } if type_name == "Vec2"));
}

#[test]
fn test_instance_member_requires_receiver() {
    let mut session = Session::new();
    let error = bind_error(session.declare(
        ModuleDecl::new("main").class(ClassDecl::object::<Vec2>().proc("scale", |k: f64| k)),
    ));
    assert_eq!(
        error,
        BindError::InvalidReceiver {
            class: "Vec2".to_string(),
            member: "scale".to_string(),
        }
    );
}

#[test]
fn test_reserved_names_are_rejected() {
    let mut session = Session::new();
    let error = bind_error(
        session.declare(ModuleDecl::new("main").class(ClassDecl::namespace("Keys").proc("while", || 1i64))),
    );
    assert_eq!(error, BindError::InvalidName("while".to_string()));
}

#[test]
fn test_declaration_after_arm_is_rejected() {
    let (mut session, _output) = armed(vec![ModuleDecl::new("main")]);
    assert_eq!(session.state(), SessionState::Armed);
    let error = bind_error(session.declare(ModuleDecl::new("late").class(ClassDecl::namespace("Late"))));
    assert_eq!(error, BindError::DeclarationAfterArm);
    assert!(session.registry().resolve_name("late", "Late").is_none());
}

#[test]
fn test_static_marker_on_namespace_is_ignored() {
    let (mut session, output) = armed(vec![ModuleDecl::new("main").class(
        ClassDecl::namespace("Clock").static_proc("ticks", || 42i64),
    )]);
    assert_eq!(run_main(&mut session, &output, "System.print(Clock.ticks())"), "42\n");
}

// ============================================================================
// Enums
// ============================================================================

#[test]
fn test_enum_prefix_is_stripped() {
    let (mut session, output) = armed(vec![
        ModuleDecl::new("main").class(EnumDecl::of::<Opt>().strip_prefix("opt"))
    ]);
    let printed = run_main(
        &mut session,
        &output,
        "System.print([Opt.Start, Opt.Help, Opt.Exit, Opt.low, Opt.high])",
    );
    assert_eq!(printed, "[0, 1, 2, 0, 2]\n");
    assert_eq!(
        session.glue("main").unwrap(),
        "class Opt {\n  static Start { 0 }\n  static Help { 1 }\n  static Exit { 2 }\n  static low { 0 }\n  static high { 2 }\n}\n\n"
    );
}

#[test]
fn test_enum_alias_and_explicit_ordinals() {
    let (mut session, output) = armed(vec![ModuleDecl::new("main")
        .class(EnumDecl::of::<Level>().alias("Severity"))
        .class(ClassDecl::namespace("Log").proc("describe", |level: Level| format!("{:?}", level)))]);
    let printed = run_main(
        &mut session,
        &output,
        "System.print([Severity.low, Severity.high])\nSystem.print(Log.describe(Severity.Mid))\n",
    );
    assert_eq!(printed, "[-3, 9]\nMid\n");

    let binding = session.registry().resolve_name("main", "Severity").unwrap();
    assert_eq!(binding.kind, BindingKind::Enum);
}

#[test]
fn test_unknown_enum_ordinal_aborts_fiber() {
    let (mut session, output) = armed(vec![ModuleDecl::new("main")
        .class(EnumDecl::of::<Level>())
        .class(ClassDecl::namespace("Log").proc("describe", |level: Level| format!("{:?}", level)))]);
    let printed = run_main(
        &mut session,
        &output,
        "var f = Fiber.new { Log.describe(5) }\nSystem.print(f.try())\n",
    );
    assert_eq!(printed, "Log.describe(_): argument 1 5 is out of range for Level [OutOfRange]\n");
}

// ============================================================================
// Introspection
// ============================================================================

#[test]
fn test_bound_classes_keep_declaration_order() {
    let mut session = Session::new();
    session
        .declare(
            ModuleDecl::new("main")
                .class(ClassDecl::object::<Vec2>())
                .class(EnumDecl::of::<Level>())
                .class(ClassDecl::namespace("Math").proc("neg", |n: f64| -n)),
        )
        .unwrap();
    session
        .declare(ModuleDecl::new("extra").class(ClassDecl::namespace("Util")))
        .unwrap();

    let classes: Vec<(&str, &str)> = session
        .classes()
        .map(|(module, class)| (module, class.name.as_str()))
        .collect();
    assert_eq!(
        classes,
        vec![("main", "Vec2"), ("main", "Level"), ("main", "Math"), ("extra", "Util")]
    );
    assert_eq!(session.modules(), vec!["main", "extra"]);

    let vec2 = session.classes().next().unwrap().1;
    assert_eq!(vec2.kind, BindingKind::Object);
    assert_eq!(
        vec2.members,
        vec!["foreign x", "foreign x=(a0)", "foreign y", "foreign y=(a0)"]
    );
}
