//! Values crossing the boundary in both directions

use std::collections::{BTreeMap, HashMap};

use super::harness::*;
use wrenbind::{ClassDecl, HostValue, MarshalError, ModuleDecl, SessionError};

fn echo() -> ModuleDecl {
    ModuleDecl::new("main").class(
        ClassDecl::namespace("Echo")
            .proc("int", |v: i64| v)
            .proc("float", |v: f64| v)
            .proc("bool", |v: bool| v)
            .proc("string", |v: String| v)
            .proc("maybe", |v: Option<String>| v)
            .proc("sum", |items: Vec<f64>| items.iter().sum::<f64>())
            .proc("range", |n: usize| (0..n).map(|i| i as i64).collect::<Vec<_>>())
            .proc("keys", |map: BTreeMap<String, i64>| {
                map.keys().cloned().collect::<Vec<_>>().join(",")
            })
            .proc("counts", |words: Vec<String>| {
                let mut counts: HashMap<String, i64> = HashMap::new();
                for word in words {
                    *counts.entry(word).or_default() += 1;
                }
                counts
            })
            .proc("describe", |value: HostValue| match value {
                HostValue::Null => "null".to_string(),
                HostValue::Bool(b) => format!("bool {}", b),
                HostValue::Num(n) => format!("num {}", n),
                HostValue::Str(s) => format!("str {}", s),
                HostValue::List(items) => format!("list of {}", items.len()),
                HostValue::Map(entries) => format!("map of {}", entries.len()),
                HostValue::Ref(_) => "ref".to_string(),
            }),
    )
}

#[test]
fn test_primitives_survive_a_round_trip() {
    let (mut session, output) = armed(vec![echo()]);
    session
        .run(
            "main",
            r#"
var i = Echo.int(-17)
var f = Echo.float(0.125)
var b = Echo.bool(false)
var s = Echo.string("héllo wörld")
"#,
        )
        .unwrap();
    assert_eq!(session.get::<i64>("main", "i").unwrap(), -17);
    assert_eq!(session.get::<f64>("main", "f").unwrap(), 0.125);
    assert!(!session.get::<bool>("main", "b").unwrap());
    assert_eq!(session.get::<String>("main", "s").unwrap(), "héllo wörld");
    assert!(output.borrow().is_empty());
}

#[test]
fn test_get_checks_the_expected_type() {
    let (mut session, _output) = armed(vec![]);
    session.run("main", "var myInt = 2").unwrap();
    assert_eq!(session.get::<i64>("main", "myInt").unwrap(), 2);
    assert_eq!(session.get::<f64>("main", "myInt").unwrap(), 2.0);

    match session.get::<String>("main", "myInt") {
        Err(SessionError::Marshal(MarshalError::TypeMismatch { expected, found })) => {
            assert_eq!(expected, "String");
            assert_eq!(found, "Num");
        }
        other => panic!("expected a type mismatch, got {:?}", other),
    }
    assert!(matches!(
        session.get::<bool>("main", "myInt"),
        Err(SessionError::Marshal(MarshalError::TypeMismatch { .. }))
    ));
}

#[test]
fn test_integer_range_is_checked() {
    let (mut session, _output) = armed(vec![]);
    session.run("main", "var big = 300\nvar negative = -1").unwrap();
    assert_eq!(session.get::<u16>("main", "big").unwrap(), 300);
    assert!(matches!(
        session.get::<u8>("main", "big"),
        Err(SessionError::Marshal(MarshalError::OutOfRange { .. }))
    ));
    assert!(matches!(
        session.get::<u32>("main", "negative"),
        Err(SessionError::Marshal(MarshalError::OutOfRange { .. }))
    ));
}

#[test]
fn test_missing_variables_are_reported() {
    let (mut session, _output) = armed(vec![]);
    session.run("main", "var x = 1").unwrap();
    assert!(session.has_variable("main", "x"));
    assert!(!session.has_variable("main", "y"));
    assert!(session.get::<i64>("main", "y").is_err());
    assert!(session.get::<i64>("elsewhere", "x").is_err());
}

#[test]
fn test_optional_values() {
    let (mut session, output) = armed(vec![echo()]);
    let printed = run_main(
        &mut session,
        &output,
        "System.print(Echo.maybe(null))\nSystem.print(Echo.maybe(\"x\"))\n",
    );
    assert_eq!(printed, "null\nx\n");
}

#[test]
fn test_lists_and_maps() {
    let (mut session, output) = armed(vec![echo()]);
    let printed = run_main(
        &mut session,
        &output,
        r#"
System.print(Echo.sum([1, 2, 3.5]))
System.print(Echo.range(4))
System.print(Echo.keys({"b": 2, "a": 1}))
var counts = Echo.counts(["x", "y", "x"])
System.print([counts["x"], counts["y"], counts.count])
"#,
    );
    assert_eq!(printed, "6.5\n[0, 1, 2, 3]\na,b\n[2, 1, 2]\n");
}

#[test]
fn test_list_element_mismatch_names_the_element_type() {
    let (mut session, output) = armed(vec![echo()]);
    let printed = run_main(
        &mut session,
        &output,
        "var f = Fiber.new { Echo.sum([1, \"2\"]) }\nSystem.print(f.try())\n",
    );
    assert_eq!(
        printed,
        "Echo.sum(_): argument 1 expected Float, got String [TypeMismatch]\n"
    );
}

#[test]
fn test_dynamic_values() {
    let (mut session, output) = armed(vec![echo()]);
    let printed = run_main(
        &mut session,
        &output,
        r#"
System.print(Echo.describe(null))
System.print(Echo.describe(true))
System.print(Echo.describe(1.5))
System.print(Echo.describe("s"))
System.print(Echo.describe([1, 2]))
System.print(Echo.describe({1: 2}))
System.print(Echo.describe(Echo))
"#,
    );
    assert_eq!(
        printed,
        "null\nbool true\nnum 1.5\nstr s\nlist of 2\nmap of 1\nref\n"
    );

    session.run("main", "var mixed = [1, \"two\", [null]]").unwrap();
    let mixed = session.get::<HostValue>("main", "mixed").unwrap();
    assert_eq!(
        mixed,
        HostValue::List(vec![
            HostValue::Num(1.0),
            HostValue::from("two"),
            HostValue::List(vec![HostValue::Null]),
        ])
    );
}
