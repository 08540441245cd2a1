//! Integration tests for the interpreter and the embedding API

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wrenbind_vm::{ErrorReport, ForeignMethodFn, Vm, VmConfig, VmError};

/// A VM whose output is captured into the returned buffer.
fn capturing_vm(config: VmConfig) -> (Vm, Rc<RefCell<String>>) {
    let output = Rc::new(RefCell::new(String::new()));
    let sink = output.clone();
    let vm = Vm::new(config.with_write(move |text| sink.borrow_mut().push_str(text)));
    (vm, output)
}

fn run(source: &str) -> String {
    let (mut vm, output) = capturing_vm(VmConfig::new());
    vm.interpret("main", source).expect("script should run");
    let text = output.borrow().clone();
    text
}

#[test]
fn test_print_formats_values() {
    let output = run(
        "System.print(1 + 2)\nSystem.print(7 / 2)\nSystem.print(\"a\" + \"b\")\nSystem.print([1, \"x\", null, true])\nSystem.print(1..3)\n",
    );
    assert_eq!(output, "3\n3.5\nab\n[1, x, null, true]\n1..3\n");
}

#[test]
fn test_classes_fields_and_operators() {
    let output = run(r#"
class Point {
  construct new(x, y) {
    _x = x
    _y = y
  }
  x { _x }
  y { _y }
  x=(value) { _x = value }
  +(other) { Point.new(_x + other.x, _y + other.y) }
  toString { "(%(_x), %(_y))" }
}
var p = Point.new(1, 2) + Point.new(3, 4)
System.print(p)
p.x = 10
System.print(p.x)
System.print(p is Point)
System.print(p is Num)
"#);
    assert_eq!(output, "(4, 6)\n10\ntrue\nfalse\n");
}

#[test]
fn test_inheritance_and_implicit_this() {
    let output = run(r#"
class Animal {
  construct new(name) { _name = name }
  name { _name }
  speak() { "%(name) makes a sound" }
}
class Dog is Animal {
  construct new(name) { _name = name }
  speak() { "%(name) barks" }
}
System.print(Animal.new("cat").speak())
System.print(Dog.new("rex").speak())
System.print(Dog.new("rex") is Animal)
"#);
    assert_eq!(output, "cat makes a sound\nrex barks\ntrue\n");
}

#[test]
fn test_closures_collections_and_loops() {
    let output = run(r#"
var list = [1, 2, 3, 4]
System.print(list.map { |n| n * 2 })
System.print(list.where { |n| n % 2 == 0 }.count)
var sum = 0
for (i in 1..4) sum = sum + i
System.print(sum)
var counter = Fn.new {
  sum = sum + 1
  return sum
}
counter.call()
System.print(sum)
var m = {"a": 1, "b": 2}
System.print(m["b"])
System.print(m.count)
var n = 0
while (true) {
  n = n + 1
  if (n == 3) break
}
System.print(n > 2 ? "stopped" : "running")
"#);
    assert_eq!(output, "[2, 4, 6, 8]\n2\n10\n11\n2\n2\nstopped\n");
}

#[test]
fn test_static_fields_and_methods() {
    let output = run(r#"
class Registry {
  static add(name) {
    if (__names == null) __names = []
    __names.add(name)
    return count
  }
  static count { __names.count }
}
Registry.add("a")
System.print(Registry.add("b"))
"#);
    assert_eq!(output, "2\n");
}

#[test]
fn test_string_from_code_point() {
    let output = run(r#"
System.print(String.fromCodePoint(65))
System.print(Fiber.new { String.fromCodePoint(-1) }.try())
System.print(Fiber.new { String.fromCodePoint(1.5) }.try())
System.print(Fiber.new { String.fromCodePoint("x") }.try())
"#);
    assert_eq!(
        output,
        "A\nCode point is out of range.\nCode point must be an integer.\nCode point must be a number.\n"
    );
}

#[test]
fn test_fiber_try_catches_errors() {
    let output = run(r#"
var f = Fiber.new { 1 + "x" }
System.print(f.try())
System.print(f.isDone)
var g = Fiber.new { Fiber.abort("custom") }
g.try()
System.print(g.error)
System.print("still running")
"#);
    assert_eq!(
        output,
        "Right operand must be a number.\ntrue\ncustom\nstill running\n"
    );
}

#[test]
fn test_uncaught_error_reports_trace() {
    let reports = Rc::new(RefCell::new(Vec::new()));
    let sink = reports.clone();
    let mut vm = Vm::new(VmConfig::new().with_error(move |report| sink.borrow_mut().push(report.clone())));
    let result = vm.interpret(
        "main",
        "class A {\n  static boom() { Fiber.abort(\"bad\") }\n}\nA.boom()\n",
    );
    match result {
        Err(VmError::Runtime { message, trace }) => {
            assert_eq!(message, "bad");
            assert_eq!(trace[0].function, "A.boom");
            assert_eq!(trace[0].line, 2);
            assert_eq!(trace[1].line, 4);
        }
        other => panic!("expected runtime error, got {:?}", other),
    }
    assert!(matches!(
        &reports.borrow()[0],
        ErrorReport::Runtime { message } if message == "bad"
    ));

    // The VM stays usable.
    vm.interpret("main", "var ok = true").expect("should run after error");
    assert!(vm.has_variable("main", "ok"));
}

#[test]
fn test_compile_error_is_reported() {
    let reports = Rc::new(RefCell::new(Vec::new()));
    let sink = reports.clone();
    let mut vm = Vm::new(VmConfig::new().with_error(move |report| sink.borrow_mut().push(report.clone())));
    let result = vm.interpret("main", "var = 3\n");
    assert!(matches!(result, Err(VmError::Compile { .. })));
    assert!(matches!(
        &reports.borrow()[0],
        ErrorReport::Compile { module, line: 1, .. } if module == "main"
    ));
}

fn counter_bindings() -> VmConfig {
    VmConfig::new().with_foreign_methods(|_module, class, is_static, signature| {
        let method: ForeignMethodFn = match (class, is_static, signature) {
            ("Counter", true, "new(_)") => Rc::new(|vm: &mut Vm| {
                let start = vm.get_slot_double(1).unwrap();
                let data: Rc<dyn Any> = Rc::new(Cell::new(start));
                vm.set_slot_new_foreign(0, 0, data).unwrap();
            }),
            ("Counter", false, "increment()") => Rc::new(|vm: &mut Vm| {
                let data = vm.get_slot_foreign(0).unwrap();
                let cell = data.downcast_ref::<Cell<f64>>().unwrap();
                cell.set(cell.get() + 1.0);
                vm.set_slot_double(0, cell.get()).unwrap();
            }),
            ("Counter", false, "fail()") => Rc::new(|vm: &mut Vm| {
                vm.set_slot_string(0, "boom").unwrap();
                vm.abort_fiber(0).unwrap();
            }),
            _ => return None,
        };
        Some(method)
    })
}

#[test]
fn test_foreign_class_and_abort() {
    let (mut vm, output) = capturing_vm(counter_bindings());
    vm.interpret(
        "main",
        r#"
foreign class Counter {
  foreign static new(start)
  foreign increment()
  foreign fail()
}
var c = Counter.new(5)
System.print(c.increment())
var f = Fiber.new { c.fail() }
System.print(f.try())
System.print(c.increment())
"#,
    )
    .expect("script should run");
    assert_eq!(*output.borrow(), "6\nboom\n7\n");
}

#[test]
fn test_missing_foreign_method_is_an_error() {
    let mut vm = Vm::new(VmConfig::new());
    let result = vm.interpret("main", "class A {\n  foreign static missing()\n}\n");
    match result {
        Err(VmError::Runtime { message, .. }) => {
            assert!(message.contains("Could not find foreign method 'missing()'"));
        }
        other => panic!("expected runtime error, got {:?}", other),
    }
}

#[test]
fn test_foreign_method_cannot_reenter() {
    let rejected = Rc::new(Cell::new(false));
    let flag = rejected.clone();
    let config = VmConfig::new().with_foreign_methods(move |_, _, _, signature| {
        if signature != "reenter()" {
            return None;
        }
        let flag = flag.clone();
        let method: ForeignMethodFn = Rc::new(move |vm: &mut Vm| {
            let nested = vm.interpret("other", "var x = 1");
            flag.set(matches!(nested, Err(VmError::Reentrant)));
        });
        Some(method)
    });
    let mut vm = Vm::new(config);
    vm.interpret("main", "class Host {\n  foreign static reenter()\n}\nHost.reenter()\n")
        .expect("script should run");
    assert!(rejected.get());
    assert!(!vm.has_module("other"));
}

#[test]
fn test_imports_use_hooks() {
    let config = VmConfig::new()
        .with_resolve_module(|_importer, name| Some(format!("lib/{}", name)))
        .with_load_module(|name| match name {
            "lib/util" => Ok("class Helper {\n  static greet(name) { \"hi %(name)\" }\n}\n".to_string()),
            _ => Err("not found".to_string()),
        });
    let (mut vm, output) = capturing_vm(config);
    vm.interpret(
        "main",
        "import \"util\" for Helper as H\nSystem.print(H.greet(\"bob\"))\nvar f = Fiber.new { import \"nope\" }\nSystem.print(f.try())\n",
    )
    .expect("script should run");
    assert_eq!(
        *output.borrow(),
        "hi bob\nCould not load module 'lib/nope': not found\n"
    );
    assert!(vm.has_module("lib/util"));
}

#[test]
fn test_import_without_loader_fails() {
    let output = run("var f = Fiber.new { import \"missing\" }\nSystem.print(f.try())\n");
    assert_eq!(
        output,
        "Could not load module 'missing': module loading is not configured\n"
    );
}

#[test]
fn test_call_handle_dispatches_per_receiver() {
    let mut vm = Vm::new(VmConfig::new());
    vm.interpret(
        "main",
        r#"
class Dog {
  construct new() {}
  run() { "dog runs" }
}
class Cat {
  construct new() {}
  run() { "cat runs" }
}
var dog = Dog.new()
var cat = Cat.new()
"#,
    )
    .expect("script should run");

    let run = vm.make_call_handle("run()");
    vm.ensure_slots(1);
    vm.get_variable("main", "dog", 0).unwrap();
    vm.call(run).unwrap();
    assert_eq!(vm.get_slot_string(0).unwrap(), "dog runs");
    vm.get_variable("main", "cat", 0).unwrap();
    vm.call(run).unwrap();
    assert_eq!(vm.get_slot_string(0).unwrap(), "cat runs");
}

#[test]
fn test_call_with_arguments_and_errors() {
    let mut vm = Vm::new(VmConfig::new());
    vm.interpret(
        "main",
        "class Math {\n  static add(a, b) { a + b }\n}\n",
    )
    .unwrap();
    let add = vm.make_call_handle("add(_,_)");
    vm.ensure_slots(3);
    vm.get_variable("main", "Math", 0).unwrap();
    vm.set_slot_double(1, 2.0).unwrap();
    vm.set_slot_double(2, 3.0).unwrap();
    vm.call(add).unwrap();
    assert_eq!(vm.get_slot_double(0).unwrap(), 5.0);

    vm.get_variable("main", "Math", 0).unwrap();
    vm.set_slot_string(1, "x").unwrap();
    vm.set_slot_double(2, 3.0).unwrap();
    assert!(matches!(vm.call(add), Err(VmError::Runtime { .. })));
}

#[test]
fn test_get_variable_errors() {
    let mut vm = Vm::new(VmConfig::new());
    vm.ensure_slots(1);
    assert!(matches!(
        vm.get_variable("nowhere", "x", 0),
        Err(VmError::UnknownModule(_))
    ));
    vm.interpret("main", "var x = 1").unwrap();
    assert!(matches!(
        vm.get_variable("main", "y", 0),
        Err(VmError::UnknownVariable { .. })
    ));
}
