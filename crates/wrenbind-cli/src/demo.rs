//! Bindings every script run by the CLI can use
//!
//! Module `main` gets `Math`, `Text`, `Vec2` and `Color`.

use std::fmt;

use wrenbind::{host_enum, host_fields, ClassDecl, EnumDecl, ModuleDecl, Obj, Session, SessionError};

#[derive(Debug, Clone, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}
host_fields!(Vec2 { x: f64, y: f64 });

host_enum! {
    pub enum Color { ColorRed, ColorGreen, ColorBlue }
}

#[derive(Debug)]
pub struct DivisionByZero;

impl fmt::Display for DivisionByZero {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "division by zero")
    }
}

fn vec2() -> ClassDecl {
    ClassDecl::object::<Vec2>()
        .constructor("new", |x: f64, y: f64| Obj::new(Vec2 { x, y }))
        .getter("length", |v: Obj<Vec2>| {
            let v = v.borrow();
            v.x.hypot(v.y)
        })
        .proc("dot", |a: Obj<Vec2>, b: Obj<Vec2>| {
            let (a, b) = (a.borrow(), b.borrow());
            a.x * b.x + a.y * b.y
        })
        .operator("+", |a: Obj<Vec2>, b: Obj<Vec2>| {
            let (a, b) = (a.borrow(), b.borrow());
            Obj::new(Vec2 {
                x: a.x + b.x,
                y: a.y + b.y,
            })
        })
        .operator("*", |v: Obj<Vec2>, k: f64| {
            let v = v.borrow();
            Obj::new(Vec2 {
                x: v.x * k,
                y: v.y * k,
            })
        })
        .getter("toString", |v: Obj<Vec2>| {
            let v = v.borrow();
            format!("Vec2({}, {})", v.x, v.y)
        })
}

fn math() -> ClassDecl {
    ClassDecl::namespace("Math")
        .proc("add", |a: f64, b: f64| a + b)
        .proc("add", |a: f64, b: f64, c: f64| a + b + c)
        .proc("divide", |a: f64, b: f64| -> Result<f64, DivisionByZero> {
            if b == 0.0 {
                Err(DivisionByZero)
            } else {
                Ok(a / b)
            }
        })
        .proc("clamp", |value: f64, low: f64, high: f64| value.clamp(low, high.max(low)))
        .getter("pi", || std::f64::consts::PI)
}

fn text() -> ClassDecl {
    ClassDecl::namespace("Text")
        .proc("upper", |s: String| s.to_uppercase())
        .proc("split", |s: String, sep: String| {
            s.split(sep.as_str()).map(str::to_string).collect::<Vec<_>>()
        })
        .proc("colorName", |color: Color| match color {
            Color::ColorRed => "red",
            Color::ColorGreen => "green",
            Color::ColorBlue => "blue",
        })
}

/// Declare the demo bindings on `session`.
pub fn declare(session: &mut Session) -> Result<(), SessionError> {
    session.declare(
        ModuleDecl::new("main")
            .class(vec2())
            .class(EnumDecl::of::<Color>().strip_prefix("Color"))
            .class(math())
            .class(text()),
    )
}
