//! Methods of the core classes.
//!
//! Core methods are resolved after script-defined methods, so a script class
//! may still override `==(_)` or `toString`. Each handler returns `Ok(None)`
//! when it does not know the signature.

use std::cell::RefCell;
use std::rc::Rc;

use crate::interpreter::Exec;
use crate::value::{
    format_num, ClassKind, ClassObj, Closure, FiberObj, FiberState, MapObj, RangeObj, Value,
};
use crate::vm::Vm;

impl Vm {
    /// Instance methods of built-in types.
    pub(crate) fn call_builtin(&mut self, receiver: &Value, signature: &str, args: &[Value]) -> Option<Exec<Value>> {
        let result = match receiver {
            Value::Num(n) => self.num_method(*n, signature, args),
            Value::Str(s) => self.string_method(s, signature, args),
            Value::List(list) => self.list_method(list, signature, args),
            Value::Map(map) => self.map_method(map, signature, args),
            Value::Range(range) => self.range_method(range, signature, args),
            Value::Fn(closure) => self.fn_method(closure, signature, args),
            Value::Fiber(fiber) => self.fiber_method(fiber, signature, args),
            Value::Class(class) => Ok(class_method(class, signature)),
            _ => Ok(None),
        };
        result.transpose()
    }

    /// Static methods of the core classes.
    pub(crate) fn call_static_builtin(&mut self, class: &Rc<ClassObj>, signature: &str, args: &[Value]) -> Option<Exec<Value>> {
        let result = match class.kind {
            ClassKind::System => self.system_static(signature, args),
            ClassKind::Fiber => self.fiber_static(signature, args),
            ClassKind::Fn => match signature {
                "new(_)" => self.fn_arg(args, 0).map(|f| Some(Value::Fn(f))),
                _ => Ok(None),
            },
            ClassKind::List => self.list_static(signature, args),
            ClassKind::Map => match signature {
                "new()" => Ok(Some(Value::Map(Rc::new(RefCell::new(MapObj::default()))))),
                _ => Ok(None),
            },
            ClassKind::Num => self.num_static(signature, args),
            ClassKind::String => match signature {
                "fromCodePoint(_)" => match self.int_arg(args, 0, "Code point") {
                    Ok(code) => match u32::try_from(code).ok().and_then(char::from_u32) {
                        Some(c) => Ok(Some(Value::str(c.encode_utf8(&mut [0; 4])))),
                        None => Err(self.error("Code point is out of range.")),
                    },
                    Err(error) => Err(error),
                },
                _ => Ok(None),
            },
            ClassKind::Object => match signature {
                "same(_,_)" => Ok(Some(Value::Bool(args[0].equals(&args[1])))),
                _ => Ok(None),
            },
            _ => Ok(None),
        };
        result.transpose()
    }

    /// Methods every value has.
    pub(crate) fn call_object_builtin(&mut self, receiver: &Value, signature: &str, args: &[Value]) -> Option<Exec<Value>> {
        let result = match signature {
            "==(_)" => Ok(Value::Bool(receiver.equals(&args[0]))),
            "!=(_)" => Ok(Value::Bool(!receiver.equals(&args[0]))),
            "!" => Ok(Value::Bool(!receiver.is_truthy())),
            "is(_)" => match &args[0] {
                Value::Class(class) => Ok(Value::Bool(self.class_of(receiver).is_subclass_of(class))),
                _ => Err(self.error("Right operand must be a class.")),
            },
            "toString" => self.to_display(receiver).map(|s| Value::str(&s)),
            "type" => Ok(Value::Class(self.class_of(receiver))),
            _ => return None,
        };
        Some(result)
    }

    // ========================================================================
    // Argument helpers
    // ========================================================================

    fn num_arg(&mut self, args: &[Value], index: usize, what: &str) -> Exec<f64> {
        match args.get(index) {
            Some(Value::Num(n)) => Ok(*n),
            _ => Err(self.error(format!("{} must be a number.", what))),
        }
    }

    fn int_arg(&mut self, args: &[Value], index: usize, what: &str) -> Exec<i64> {
        let n = self.num_arg(args, index, what)?;
        if n.trunc() != n || !n.is_finite() {
            return Err(self.error(format!("{} must be an integer.", what)));
        }
        Ok(n as i64)
    }

    fn str_arg(&mut self, args: &[Value], index: usize, what: &str) -> Exec<Rc<str>> {
        match args.get(index) {
            Some(Value::Str(s)) => Ok(s.clone()),
            _ => Err(self.error(format!("{} must be a string.", what))),
        }
    }

    fn fn_arg(&mut self, args: &[Value], index: usize) -> Exec<Rc<Closure>> {
        match args.get(index) {
            Some(Value::Fn(closure)) => Ok(closure.clone()),
            _ => Err(self.error("Argument must be a function.")),
        }
    }

    /// Resolve a subscript against a sequence of `len` elements; negative
    /// indices count from the end.
    fn resolve_index(&mut self, index: &Value, len: usize) -> Exec<usize> {
        let n = match index {
            Value::Num(n) if n.trunc() == *n => *n as i64,
            Value::Num(_) => return Err(self.error("Subscript must be an integer.")),
            _ => return Err(self.error("Subscript must be a number.")),
        };
        let resolved = if n < 0 { len as i64 + n } else { n };
        if resolved < 0 || resolved >= len as i64 {
            return Err(self.error("Subscript out of bounds."));
        }
        Ok(resolved as usize)
    }

    /// Elements of a list, range, string or map (keys).
    fn sequence_items(&mut self, value: &Value) -> Exec<Vec<Value>> {
        match value {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Range(range) => Ok(range.values()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.encode_utf8(&mut [0; 4]))).collect()),
            Value::Map(map) => Ok(map.borrow().entries().iter().map(|(k, _)| k.clone()).collect()),
            _ => Err(self.error("Argument must be a sequence.")),
        }
    }

    // ========================================================================
    // System
    // ========================================================================

    fn system_static(&mut self, signature: &str, args: &[Value]) -> Exec<Option<Value>> {
        let value = match signature {
            "print()" => {
                self.write("\n");
                Value::Null
            }
            "print(_)" => {
                let text = self.to_display(&args[0])?;
                self.write(&format!("{}\n", text));
                args[0].clone()
            }
            "write(_)" => {
                let text = self.to_display(&args[0])?;
                self.write(&text);
                args[0].clone()
            }
            "printAll(_)" | "writeAll(_)" => {
                let mut text = String::new();
                for item in self.sequence_items(&args[0])? {
                    text.push_str(&self.to_display(&item)?);
                }
                if signature == "printAll(_)" {
                    text.push('\n');
                }
                self.write(&text);
                Value::Null
            }
            "clock" => Value::Num(self.started.elapsed().as_secs_f64()),
            "gc()" => Value::Null,
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    // ========================================================================
    // Num
    // ========================================================================

    fn num_static(&mut self, signature: &str, args: &[Value]) -> Exec<Option<Value>> {
        let value = match signature {
            "fromString(_)" => {
                let text = self.str_arg(args, 0, "Argument")?;
                match text.trim().parse::<f64>() {
                    Ok(n) => Value::Num(n),
                    Err(_) => Value::Null,
                }
            }
            "pi" => Value::Num(std::f64::consts::PI),
            "infinity" => Value::Num(f64::INFINITY),
            "nan" => Value::Num(f64::NAN),
            "largest" => Value::Num(f64::MAX),
            "smallest" => Value::Num(f64::MIN_POSITIVE),
            "maxSafeInteger" => Value::Num(9007199254740991.0),
            "minSafeInteger" => Value::Num(-9007199254740991.0),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn num_method(&mut self, n: f64, signature: &str, args: &[Value]) -> Exec<Option<Value>> {
        const RHS: &str = "Right operand";
        let value = match signature {
            "-" => Value::Num(-n),
            "~" => Value::Num(!(n as u32) as f64),
            "+(_)" => Value::Num(n + self.num_arg(args, 0, RHS)?),
            "-(_)" => Value::Num(n - self.num_arg(args, 0, RHS)?),
            "*(_)" => Value::Num(n * self.num_arg(args, 0, RHS)?),
            "/(_)" => Value::Num(n / self.num_arg(args, 0, RHS)?),
            "%(_)" => Value::Num(n % self.num_arg(args, 0, RHS)?),
            "<(_)" => Value::Bool(n < self.num_arg(args, 0, RHS)?),
            ">(_)" => Value::Bool(n > self.num_arg(args, 0, RHS)?),
            "<=(_)" => Value::Bool(n <= self.num_arg(args, 0, RHS)?),
            ">=(_)" => Value::Bool(n >= self.num_arg(args, 0, RHS)?),
            "abs" => Value::Num(n.abs()),
            "ceil" => Value::Num(n.ceil()),
            "floor" => Value::Num(n.floor()),
            "round" => Value::Num(n.round()),
            "truncate" => Value::Num(n.trunc()),
            "fraction" => Value::Num(n.fract()),
            "sqrt" => Value::Num(n.sqrt()),
            "sin" => Value::Num(n.sin()),
            "cos" => Value::Num(n.cos()),
            "tan" => Value::Num(n.tan()),
            "log" => Value::Num(n.ln()),
            "exp" => Value::Num(n.exp()),
            "sign" => Value::Num(if n > 0.0 {
                1.0
            } else if n < 0.0 {
                -1.0
            } else {
                0.0
            }),
            "isInteger" => Value::Bool(n.is_finite() && n.trunc() == n),
            "isNan" => Value::Bool(n.is_nan()),
            "isInfinity" => Value::Bool(n.is_infinite()),
            "toString" => Value::str(&format_num(n)),
            "min(_)" => Value::Num(n.min(self.num_arg(args, 0, "Other value")?)),
            "max(_)" => Value::Num(n.max(self.num_arg(args, 0, "Other value")?)),
            "pow(_)" => Value::Num(n.powf(self.num_arg(args, 0, "Power value")?)),
            "clamp(_,_)" => {
                let min = self.num_arg(args, 0, "Min value")?;
                let max = self.num_arg(args, 1, "Max value")?;
                Value::Num(n.max(min).min(max))
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    // ========================================================================
    // String
    // ========================================================================

    fn string_method(&mut self, s: &Rc<str>, signature: &str, args: &[Value]) -> Exec<Option<Value>> {
        let value = match signature {
            "+(_)" => {
                let other = self.str_arg(args, 0, "Right operand")?;
                Value::str(&format!("{}{}", s, other))
            }
            "*(_)" => {
                let count = self.int_arg(args, 0, "Count")?;
                if count < 0 {
                    return Err(self.error("Count must be a non-negative integer."));
                }
                Value::str(&s.repeat(count as usize))
            }
            "count" => Value::Num(s.chars().count() as f64),
            "isEmpty" => Value::Bool(s.is_empty()),
            "contains(_)" => Value::Bool(s.contains(&*self.str_arg(args, 0, "Argument")?)),
            "startsWith(_)" => Value::Bool(s.starts_with(&*self.str_arg(args, 0, "Argument")?)),
            "endsWith(_)" => Value::Bool(s.ends_with(&*self.str_arg(args, 0, "Argument")?)),
            "indexOf(_)" => {
                let needle = self.str_arg(args, 0, "Argument")?;
                Value::Num(s.find(&*needle).map_or(-1.0, |i| i as f64))
            }
            "split(_)" => {
                let delimiter = self.str_arg(args, 0, "Delimiter")?;
                if delimiter.is_empty() {
                    return Err(self.error("Delimiter cannot be empty."));
                }
                Value::list(s.split(&*delimiter).map(Value::str).collect())
            }
            "replace(_,_)" => {
                let from = self.str_arg(args, 0, "From")?;
                let to = self.str_arg(args, 1, "To")?;
                if from.is_empty() {
                    return Err(self.error("From cannot be empty."));
                }
                Value::str(&s.replace(&*from, &to))
            }
            "trim()" => Value::str(s.trim()),
            "trimStart()" => Value::str(s.trim_start()),
            "trimEnd()" => Value::str(s.trim_end()),
            "[_]" => {
                let chars: Vec<char> = s.chars().collect();
                let index = self.resolve_index(&args[0], chars.len())?;
                Value::str(chars[index].encode_utf8(&mut [0; 4]))
            }
            "toString" => Value::Str(s.clone()),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    // ========================================================================
    // List
    // ========================================================================

    fn list_static(&mut self, signature: &str, args: &[Value]) -> Exec<Option<Value>> {
        let value = match signature {
            "new()" => Value::list(Vec::new()),
            "filled(_,_)" => {
                let count = self.int_arg(args, 0, "Size")?;
                if count < 0 {
                    return Err(self.error("Size cannot be negative."));
                }
                Value::list(vec![args[1].clone(); count as usize])
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn list_method(&mut self, list: &Rc<RefCell<Vec<Value>>>, signature: &str, args: &[Value]) -> Exec<Option<Value>> {
        let len = list.borrow().len();
        let value = match signature {
            "[_]" => {
                let index = self.resolve_index(&args[0], len)?;
                list.borrow()[index].clone()
            }
            "[_]=(_)" => {
                let index = self.resolve_index(&args[0], len)?;
                list.borrow_mut()[index] = args[1].clone();
                args[1].clone()
            }
            "add(_)" => {
                list.borrow_mut().push(args[0].clone());
                args[0].clone()
            }
            "addAll(_)" => {
                let items = self.sequence_items(&args[0])?;
                list.borrow_mut().extend(items);
                args[0].clone()
            }
            "insert(_,_)" => {
                let index = self.int_arg(args, 0, "Index")?;
                let position = if index < 0 { len as i64 + 1 + index } else { index };
                if position < 0 || position > len as i64 {
                    return Err(self.error("Index out of bounds."));
                }
                list.borrow_mut().insert(position as usize, args[1].clone());
                args[1].clone()
            }
            "removeAt(_)" => {
                let index = self.resolve_index(&args[0], len)?;
                list.borrow_mut().remove(index)
            }
            "remove(_)" => {
                let position = list.borrow().iter().position(|item| item.equals(&args[0]));
                match position {
                    Some(index) => list.borrow_mut().remove(index),
                    None => Value::Null,
                }
            }
            "indexOf(_)" => {
                let position = list.borrow().iter().position(|item| item.equals(&args[0]));
                Value::Num(position.map_or(-1.0, |i| i as f64))
            }
            "swap(_,_)" => {
                let a = self.resolve_index(&args[0], len)?;
                let b = self.resolve_index(&args[1], len)?;
                list.borrow_mut().swap(a, b);
                Value::Null
            }
            "clear()" => {
                list.borrow_mut().clear();
                Value::Null
            }
            "sort()" => {
                let mut items = list.borrow().clone();
                self.sort_values(&mut items)?;
                *list.borrow_mut() = items;
                Value::List(list.clone())
            }
            "+(_)" => {
                let mut items = list.borrow().clone();
                items.extend(self.sequence_items(&args[0])?);
                Value::list(items)
            }
            "toString" => {
                let text = self.to_display(&Value::List(list.clone()))?;
                Value::str(&text)
            }
            _ => {
                let items = list.borrow().clone();
                return self.sequence_method(items, signature, args);
            }
        };
        Ok(Some(value))
    }

    fn sort_values(&mut self, items: &mut [Value]) -> Exec<()> {
        let all_nums = items.iter().all(|v| matches!(v, Value::Num(_)));
        let all_strs = items.iter().all(|v| matches!(v, Value::Str(_)));
        if !all_nums && !all_strs {
            return Err(self.error("Can only sort lists of numbers or of strings."));
        }
        items.sort_by(|a, b| match (a, b) {
            (Value::Num(x), Value::Num(y)) => x.total_cmp(y),
            (Value::Str(x), Value::Str(y)) => x.cmp(y),
            _ => std::cmp::Ordering::Equal,
        });
        Ok(())
    }

    /// Methods shared by lists and ranges.
    fn sequence_method(&mut self, items: Vec<Value>, signature: &str, args: &[Value]) -> Exec<Option<Value>> {
        let value = match signature {
            "count" => Value::Num(items.len() as f64),
            "isEmpty" => Value::Bool(items.is_empty()),
            "toList" => Value::list(items),
            "contains(_)" => Value::Bool(items.iter().any(|item| item.equals(&args[0]))),
            "join()" | "join(_)" => {
                let separator = match args.first() {
                    Some(_) => self.str_arg(args, 0, "Separator")?.to_string(),
                    None => String::new(),
                };
                let mut parts = Vec::with_capacity(items.len());
                for item in &items {
                    parts.push(self.to_display(item)?);
                }
                Value::str(&parts.join(&separator))
            }
            "map(_)" => {
                let f = self.fn_arg(args, 0)?;
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.call_closure(&f, vec![item])?);
                }
                Value::list(out)
            }
            "where(_)" => {
                let f = self.fn_arg(args, 0)?;
                let mut out = Vec::new();
                for item in items {
                    if self.call_closure(&f, vec![item.clone()])?.is_truthy() {
                        out.push(item);
                    }
                }
                Value::list(out)
            }
            "each(_)" => {
                let f = self.fn_arg(args, 0)?;
                for item in items {
                    self.call_closure(&f, vec![item])?;
                }
                Value::Null
            }
            "any(_)" | "all(_)" | "count(_)" => {
                let f = self.fn_arg(args, 0)?;
                let mut matched = 0usize;
                for item in &items {
                    if self.call_closure(&f, vec![item.clone()])?.is_truthy() {
                        matched += 1;
                    }
                }
                match signature {
                    "any(_)" => Value::Bool(matched > 0),
                    "all(_)" => Value::Bool(matched == items.len()),
                    _ => Value::Num(matched as f64),
                }
            }
            "reduce(_)" => {
                let f = self.fn_arg(args, 0)?;
                let mut iter = items.into_iter();
                let Some(mut acc) = iter.next() else {
                    return Err(self.error("Can't reduce an empty sequence."));
                };
                for item in iter {
                    acc = self.call_closure(&f, vec![acc, item])?;
                }
                acc
            }
            "reduce(_,_)" => {
                let f = self.fn_arg(args, 1)?;
                let mut acc = args[0].clone();
                for item in items {
                    acc = self.call_closure(&f, vec![acc, item])?;
                }
                acc
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    // ========================================================================
    // Map
    // ========================================================================

    fn map_method(&mut self, map: &Rc<RefCell<MapObj>>, signature: &str, args: &[Value]) -> Exec<Option<Value>> {
        let value = match signature {
            "[_]" => {
                let key = self.map_key(&args[0])?;
                map.borrow().get(&key).cloned().unwrap_or(Value::Null)
            }
            "[_]=(_)" => {
                let key = self.map_key(&args[0])?;
                map.borrow_mut().insert(key, args[0].clone(), args[1].clone());
                args[1].clone()
            }
            "containsKey(_)" => {
                let key = self.map_key(&args[0])?;
                Value::Bool(map.borrow().contains(&key))
            }
            "remove(_)" => {
                let key = self.map_key(&args[0])?;
                map.borrow_mut().remove(&key).unwrap_or(Value::Null)
            }
            "clear()" => {
                map.borrow_mut().clear();
                Value::Null
            }
            "count" => Value::Num(map.borrow().len() as f64),
            "isEmpty" => Value::Bool(map.borrow().len() == 0),
            "keys" => Value::list(map.borrow().entries().iter().map(|(k, _)| k.clone()).collect()),
            "values" => Value::list(map.borrow().entries().iter().map(|(_, v)| v.clone()).collect()),
            "toString" => {
                let text = self.to_display(&Value::Map(map.clone()))?;
                Value::str(&text)
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    // ========================================================================
    // Range, Fn, Fiber
    // ========================================================================

    fn range_method(&mut self, range: &Rc<RangeObj>, signature: &str, args: &[Value]) -> Exec<Option<Value>> {
        let value = match signature {
            "from" => Value::Num(range.from),
            "to" => Value::Num(range.to),
            "min" => Value::Num(range.from.min(range.to)),
            "max" => Value::Num(range.from.max(range.to)),
            "isInclusive" => Value::Bool(range.inclusive),
            _ => return self.sequence_method(range.values(), signature, args),
        };
        Ok(Some(value))
    }

    fn fn_method(&mut self, closure: &Rc<Closure>, signature: &str, args: &[Value]) -> Exec<Option<Value>> {
        if signature == "arity" {
            return Ok(Some(Value::Num(closure.decl.params.len() as f64)));
        }
        if signature.starts_with("call(") {
            return self.call_closure(closure, args.to_vec()).map(Some);
        }
        Ok(None)
    }

    fn fiber_static(&mut self, signature: &str, args: &[Value]) -> Exec<Option<Value>> {
        match signature {
            "new(_)" => {
                let func = self.fn_arg(args, 0)?;
                Ok(Some(self.new_fiber(func)))
            }
            "abort(_)" => match &args[0] {
                Value::Null => Ok(Some(Value::Null)),
                error => Err(self.error_value(error.clone())),
            },
            _ => Ok(None),
        }
    }

    fn fiber_method(&mut self, fiber: &Rc<FiberObj>, signature: &str, args: &[Value]) -> Exec<Option<Value>> {
        let value = match signature {
            "try()" => self.run_fiber(fiber, None, true)?,
            "try(_)" => self.run_fiber(fiber, Some(args[0].clone()), true)?,
            "call()" => self.run_fiber(fiber, None, false)?,
            "call(_)" => self.run_fiber(fiber, Some(args[0].clone()), false)?,
            "error" => fiber.error.borrow().clone(),
            "isDone" => Value::Bool(fiber.state.get() == FiberState::Done),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}

fn class_method(class: &Rc<ClassObj>, signature: &str) -> Option<Value> {
    match signature {
        "name" | "toString" => Some(Value::Str(class.name.clone())),
        "supertype" => Some(
            class
                .superclass
                .as_ref()
                .map_or(Value::Null, |superclass| Value::Class(superclass.clone())),
        ),
        _ => None,
    }
}
