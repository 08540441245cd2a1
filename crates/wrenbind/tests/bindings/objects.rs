//! Host objects wrapped in foreign classes

use super::harness::*;
use wrenbind::{host_fields, ClassDecl, MarshalError, ModuleDecl, Obj, SessionError};

#[derive(Debug, Clone, PartialEq)]
struct Vec2 {
    x: f64,
    y: f64,
}
host_fields!(Vec2 { x: f64, y: f64 });

#[derive(Debug, Clone, PartialEq)]
struct Polygon {
    points: Vec<(f64, f64)>,
}
host_fields!(Polygon);

struct Unbound;
host_fields!(Unbound);

fn vec2_class() -> ClassDecl {
    ClassDecl::object::<Vec2>()
        .constructor("new", |x: f64, y: f64| Obj::new(Vec2 { x, y }))
        .static_proc("zero", || Obj::new(Vec2 { x: 0.0, y: 0.0 }))
        .getter("length", |v: Obj<Vec2>| {
            let v = v.borrow();
            v.x.hypot(v.y)
        })
        .proc("scale", |v: Obj<Vec2>, k: f64| {
            let mut v = v.borrow_mut();
            v.x *= k;
            v.y *= k;
        })
        .operator("+", |a: Obj<Vec2>, b: Obj<Vec2>| {
            let (a, b) = (a.get(), b.get());
            Obj::new(Vec2 {
                x: a.x + b.x,
                y: a.y + b.y,
            })
        })
        .operator("-", |v: Obj<Vec2>| {
            let v = v.get();
            Obj::new(Vec2 { x: -v.x, y: -v.y })
        })
        .operator("==", |a: Obj<Vec2>, b: Obj<Vec2>| a.get() == b.get())
        .proc("toString", |v: Obj<Vec2>| {
            let v = v.borrow();
            format!("({}, {})", v.x, v.y)
        })
}

fn polygon_class() -> ClassDecl {
    ClassDecl::object::<Polygon>()
        .alias("Poly")
        .constructor("new", || Obj::new(Polygon { points: Vec::new() }))
        .proc("add", |poly: Obj<Polygon>, p: Obj<Vec2>| {
            let p = p.borrow();
            poly.borrow_mut().points.push((p.x, p.y));
        })
        .operator("[]", |poly: Obj<Polygon>, index: usize| -> Result<Obj<Vec2>, String> {
            let poly = poly.borrow();
            let (x, y) = *poly
                .points
                .get(index)
                .ok_or_else(|| format!("index {} out of bounds", index))?;
            Ok(Obj::new(Vec2 { x, y }))
        })
        .operator("[]=", |poly: Obj<Polygon>, index: usize, p: Obj<Vec2>| {
            let p = p.borrow();
            if let Some(point) = poly.borrow_mut().points.get_mut(index) {
                *point = (p.x, p.y);
            }
        })
        .getter("count", |poly: Obj<Polygon>| poly.borrow().points.len())
}

#[test]
fn test_constructors_fields_and_methods() {
    let (mut session, output) = armed(vec![ModuleDecl::new("main").class(vec2_class())]);
    let printed = run_main(
        &mut session,
        &output,
        r#"
var v = Vec2.new(3, 4)
System.print(v.length)
v.x = 6
v.scale(0.5)
System.print([v.x, v.y])
System.print(v.toString())
System.print(Vec2.zero().length)
"#,
    );
    assert_eq!(printed, "5\n[3, 2]\n(3, 2)\n0\n");
}

#[test]
fn test_operators() {
    let (mut session, output) = armed(vec![ModuleDecl::new("main").class(vec2_class())]);
    let printed = run_main(
        &mut session,
        &output,
        r#"
var sum = Vec2.new(1, 2) + Vec2.new(3, 4)
System.print(sum.toString())
System.print((-sum).toString())
System.print(sum == Vec2.new(4, 6))
"#,
    );
    assert_eq!(printed, "(4, 6)\n(-4, -6)\ntrue\n");
}

#[test]
fn test_script_mutation_is_visible_to_the_host() {
    let shared = Obj::new(Vec2 { x: 1.0, y: 1.0 });
    let origin = shared.clone();
    let (mut session, output) = armed(vec![ModuleDecl::new("main")
        .class(vec2_class())
        .class(ClassDecl::namespace("World").getter("origin", move || origin.clone()))]);
    run_main(&mut session, &output, "World.origin.x = 10\nWorld.origin.scale(2)\n");
    assert_eq!(shared.get(), Vec2 { x: 20.0, y: 2.0 });

    session.run("main", "var o = World.origin").unwrap();
    let fetched: Obj<Vec2> = session.get("main", "o").unwrap();
    assert!(fetched.ptr_eq(&shared));
}

#[test]
fn test_subscripts_and_aliases() {
    let (mut session, output) = armed(vec![ModuleDecl::new("main")
        .class(vec2_class())
        .class(polygon_class())]);
    let printed = run_main(
        &mut session,
        &output,
        r#"
var poly = Poly.new()
poly.add(Vec2.new(0, 0))
poly.add(Vec2.new(1, 0))
poly[1] = Vec2.new(5, 5)
System.print(poly[1].toString())
System.print(poly.count)
var f = Fiber.new { poly[7] }
System.print(f.try())
"#,
    );
    assert_eq!(printed, "(5, 5)\n2\nindex 7 out of bounds [String]\n");
}

#[test]
fn test_wrong_receiver_type_aborts_the_fiber() {
    let (mut session, output) = armed(vec![ModuleDecl::new("main")
        .class(vec2_class())
        .class(polygon_class())]);
    let printed = run_main(
        &mut session,
        &output,
        "var poly = Poly.new()\nvar f = Fiber.new { poly.add(poly) }\nSystem.print(f.try())\n",
    );
    assert_eq!(
        printed,
        "Poly.add(_): argument 1 expected Vec2, got Poly [TypeMismatch]\n"
    );
}

#[test]
fn test_objects_decode_only_as_their_own_type() {
    let (mut session, _output) = armed(vec![ModuleDecl::new("main").class(vec2_class())]);
    session.run("main", "var v = Vec2.new(1, 2)").unwrap();
    let v: Obj<Vec2> = session.get("main", "v").unwrap();
    assert_eq!(v.get(), Vec2 { x: 1.0, y: 2.0 });

    assert!(matches!(
        session.get::<Obj<Unbound>>("main", "v"),
        Err(SessionError::Marshal(MarshalError::TypeMismatch { .. }))
    ));
}

#[test]
fn test_unbound_object_types_cannot_be_encoded() {
    let (mut session, _output) = armed(vec![]);
    session
        .run("main", "class Box {\n  static hold(x) { x }\n}\n")
        .unwrap();
    let boxed = session.get_ref("main", "Box").unwrap();
    let result: Result<(), _> = session.call_method(&boxed, "hold(_)", (Obj::new(Unbound),));
    match result {
        Err(SessionError::Marshal(MarshalError::UnknownType(name))) => assert_eq!(name, "Unbound"),
        other => panic!("expected an unknown type, got {:?}", other),
    }
}
