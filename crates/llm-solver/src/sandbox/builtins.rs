// Builtin globals and methods visible to snippets.
// Natives are dispatched by (receiver kind, method name); a method read off a
// value carries that value as its receiver.

use super::interpreter::{Abrupt, Eval, Interpreter};
use super::value::{
    ArrayRef, JsonError, Namespace, Native, Value, compare, number_to_string, strict_equals,
    to_fixed,
};
use rand::Rng;
use std::cmp::Ordering;
use std::rc::Rc;

const GLOBAL_FUNCTIONS: &[&str] = &[
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "String",
    "Boolean",
    "Error",
    "TypeError",
    "RangeError",
    "ReferenceError",
    "SyntaxError",
];

const MATH_FUNCTIONS: &[&str] = &[
    "abs", "sqrt", "cbrt", "pow", "exp", "expm1", "log", "log1p", "log2", "log10", "floor",
    "ceil", "round", "trunc", "sign", "min", "max", "sin", "cos", "tan", "asin", "acos", "atan",
    "atan2", "sinh", "cosh", "tanh", "hypot", "random",
];

const NUMBER_FUNCTIONS: &[&str] = &[
    "isInteger",
    "isFinite",
    "isNaN",
    "isSafeInteger",
    "parseFloat",
    "parseInt",
];

const JSON_FUNCTIONS: &[&str] = &["stringify", "parse"];
const CONSOLE_FUNCTIONS: &[&str] = &["log", "info", "warn", "error", "debug"];
const ARRAY_STATICS: &[&str] = &["from", "isArray", "of"];
const OBJECT_STATICS: &[&str] = &["keys", "values", "entries"];

const ARRAY_METHODS: &[&str] = &[
    "push", "pop", "shift", "unshift", "map", "filter", "reduce", "forEach", "slice", "concat",
    "join", "indexOf", "includes", "some", "every", "fill", "find", "findIndex", "sort",
    "reverse",
];

const STRING_METHODS: &[&str] = &[
    "toUpperCase",
    "toLowerCase",
    "includes",
    "slice",
    "split",
    "trim",
    "startsWith",
    "endsWith",
    "indexOf",
    "charAt",
    "repeat",
    "padStart",
    "padEnd",
    "concat",
];

const NUMBER_METHODS: &[&str] = &["toFixed", "toString"];
const OBJECT_METHODS: &[&str] = &["hasOwnProperty"];

fn intern(table: &'static [&'static str], key: &str) -> Option<&'static str> {
    table.iter().copied().find(|name| *name == key)
}

/// Builds an object shaped like a JavaScript `Error`.
pub(crate) fn error_value(name: &str, message: &str) -> Value {
    Value::object(vec![
        ("name".to_string(), Value::str(name)),
        ("message".to_string(), Value::str(message)),
    ])
}

pub(crate) fn throw(name: &str, message: impl AsRef<str>) -> Abrupt {
    Abrupt::Throw(error_value(name, message.as_ref()))
}

pub(crate) fn type_error(message: impl AsRef<str>) -> Abrupt {
    throw("TypeError", message)
}

/// Resolves identifiers that are not bound in any scope.
pub(crate) fn global(name: &str) -> Option<Value> {
    let value = match name {
        "NaN" => Value::Number(f64::NAN),
        "Infinity" => Value::Number(f64::INFINITY),
        "Math" => Value::Namespace(Namespace::Math),
        "JSON" => Value::Namespace(Namespace::Json),
        "Number" => Value::Namespace(Namespace::Number),
        "console" => Value::Namespace(Namespace::Console),
        "Array" => Value::Namespace(Namespace::Array),
        "Object" => Value::Namespace(Namespace::Object),
        _ => Value::native(intern(GLOBAL_FUNCTIONS, name)?, None),
    };
    Some(value)
}

/// Property read on a namespace object (`Math.PI`, `Math.sqrt`).
pub(crate) fn namespace_member(ns: Namespace, key: &str) -> Value {
    let constant = match (ns, key) {
        (Namespace::Math, "PI") => Some(std::f64::consts::PI),
        (Namespace::Math, "E") => Some(std::f64::consts::E),
        (Namespace::Math, "LN2") => Some(std::f64::consts::LN_2),
        (Namespace::Math, "LN10") => Some(std::f64::consts::LN_10),
        (Namespace::Math, "LOG2E") => Some(std::f64::consts::LOG2_E),
        (Namespace::Math, "LOG10E") => Some(std::f64::consts::LOG10_E),
        (Namespace::Math, "SQRT2") => Some(std::f64::consts::SQRT_2),
        (Namespace::Math, "SQRT1_2") => Some(std::f64::consts::FRAC_1_SQRT_2),
        (Namespace::Number, "EPSILON") => Some(f64::EPSILON),
        (Namespace::Number, "MAX_SAFE_INTEGER") => Some(9_007_199_254_740_991.0),
        (Namespace::Number, "MIN_SAFE_INTEGER") => Some(-9_007_199_254_740_991.0),
        (Namespace::Number, "MAX_VALUE") => Some(f64::MAX),
        (Namespace::Number, "MIN_VALUE") => Some(5e-324),
        (Namespace::Number, "POSITIVE_INFINITY") => Some(f64::INFINITY),
        (Namespace::Number, "NEGATIVE_INFINITY") => Some(f64::NEG_INFINITY),
        (Namespace::Number, "NaN") => Some(f64::NAN),
        _ => None,
    };
    if let Some(n) = constant {
        return Value::Number(n);
    }

    let table = match ns {
        Namespace::Math => MATH_FUNCTIONS,
        Namespace::Json => JSON_FUNCTIONS,
        Namespace::Number => NUMBER_FUNCTIONS,
        Namespace::Console => CONSOLE_FUNCTIONS,
        Namespace::Array => ARRAY_STATICS,
        Namespace::Object => OBJECT_STATICS,
    };
    match intern(table, key) {
        Some(name) => Value::native(name, Some(Value::Namespace(ns))),
        None => Value::Undefined,
    }
}

/// Looks up a method on a primitive, array or object receiver.
pub(crate) fn method(receiver: &Value, key: &str) -> Option<Value> {
    let table = match receiver {
        Value::Array(_) => ARRAY_METHODS,
        Value::Str(_) => STRING_METHODS,
        Value::Number(_) => NUMBER_METHODS,
        Value::Object(_) => OBJECT_METHODS,
        _ => return None,
    };
    intern(table, key).map(|name| Value::native(name, Some(receiver.clone())))
}

pub(crate) fn call_native(interp: &mut Interpreter, native: &Native, args: Vec<Value>) -> Eval<Value> {
    match &native.receiver {
        None => call_global(interp, native.name, args),
        Some(Value::Namespace(ns)) => call_static(interp, *ns, native.name, args),
        Some(Value::Array(items)) => call_array_method(interp, items, native.name, args),
        Some(Value::Str(s)) => call_string_method(interp, s, native.name, args),
        Some(Value::Number(n)) => call_number_method(*n, native.name, args),
        Some(receiver @ Value::Object(_)) => {
            let key = arg(&args, 0).to_display_string();
            Ok(Value::Bool(receiver.own_property(&key).is_some()))
        }
        Some(_) => Err(type_error(format!("{} is not a function", native.name))),
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn number_arg(args: &[Value], index: usize) -> f64 {
    arg(args, index).to_number()
}

fn call_global(interp: &Interpreter, name: &str, args: Vec<Value>) -> Eval<Value> {
    let value = match name {
        "parseInt" => {
            let radix = number_arg(&args, 1);
            Value::Number(parse_int(&arg(&args, 0).to_display_string(), radix))
        }
        "parseFloat" => Value::Number(parse_float(&arg(&args, 0).to_display_string())),
        "isNaN" => Value::Bool(number_arg(&args, 0).is_nan()),
        "isFinite" => Value::Bool(number_arg(&args, 0).is_finite()),
        "String" => match args.first() {
            Some(v) => Value::str(&v.to_display_string_within(interp.max_string_length())?),
            None => Value::str(""),
        },
        "Boolean" => Value::Bool(arg(&args, 0).truthy()),
        "Number" => match args.first() {
            Some(v) => Value::Number(v.to_number()),
            None => Value::Number(0.0),
        },
        error_name => {
            let message = match arg(&args, 0) {
                Value::Undefined => String::new(),
                other => other.to_display_string(),
            };
            error_value(error_name, &message)
        }
    };
    Ok(value)
}

/// Calling a namespace directly: `Number(x)`, and `Array(...)` with or
/// without `new`.
pub(crate) fn call_namespace(
    interp: &mut Interpreter,
    ns: Namespace,
    args: Vec<Value>,
) -> Eval<Value> {
    match ns {
        Namespace::Number => call_global(interp, "Number", args),
        Namespace::Array => array_constructor(interp, args),
        other => Err(type_error(format!("{} is not a function", other.name()))),
    }
}

/// `Array(n)` makes `n` empty slots, read back as `undefined`; any other
/// arguments become the elements.
fn array_constructor(interp: &mut Interpreter, args: Vec<Value>) -> Eval<Value> {
    if let [Value::Number(n)] = args.as_slice() {
        let n = *n;
        if n < 0.0 || n.fract() != 0.0 || n > 4_294_967_295.0 {
            return Err(throw("RangeError", "Invalid array length"));
        }
        interp.check_array_length(n as usize)?;
        return Ok(Value::array(vec![Value::Undefined; n as usize]));
    }
    interp.check_array_length(args.len())?;
    Ok(Value::array(args))
}

fn call_static(interp: &mut Interpreter, ns: Namespace, name: &str, args: Vec<Value>) -> Eval<Value> {
    match ns {
        Namespace::Math => Ok(Value::Number(math(name, &args))),
        Namespace::Number => {
            let v = arg(&args, 0);
            let n = match v {
                Value::Number(n) => Some(n),
                _ => None,
            };
            let result = match name {
                "isInteger" => Value::Bool(n.is_some_and(|n| n.is_finite() && n.fract() == 0.0)),
                "isSafeInteger" => Value::Bool(
                    n.is_some_and(|n| n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_991.0),
                ),
                "isFinite" => Value::Bool(n.is_some_and(f64::is_finite)),
                "isNaN" => Value::Bool(n.is_some_and(f64::is_nan)),
                other => return call_global(interp, other, args),
            };
            Ok(result)
        }
        Namespace::Json => match name {
            "stringify" => json_stringify(interp, &args),
            _ => json_parse(&arg(&args, 0).to_display_string()),
        },
        Namespace::Console => {
            let line = args
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(" ");
            log::debug!("snippet console.{name}: {line}");
            Ok(Value::Undefined)
        }
        Namespace::Array => match name {
            "isArray" => Ok(Value::Bool(matches!(arg(&args, 0), Value::Array(_)))),
            "of" => {
                interp.check_array_length(args.len())?;
                Ok(Value::array(args))
            }
            _ => array_from(interp, &args),
        },
        Namespace::Object => {
            let pairs = enumerate(&arg(&args, 0))?;
            let items = match name {
                "keys" => pairs.into_iter().map(|(k, _)| Value::str(&k)).collect(),
                "values" => pairs.into_iter().map(|(_, v)| v).collect(),
                _ => pairs
                    .into_iter()
                    .map(|(k, v)| Value::array(vec![Value::str(&k), v]))
                    .collect(),
            };
            Ok(Value::array(items))
        }
    }
}

fn enumerate(target: &Value) -> Eval<Vec<(String, Value)>> {
    Ok(match target {
        Value::Undefined | Value::Null => {
            return Err(type_error("Cannot convert undefined or null to object"));
        }
        Value::Object(props) => props.borrow().clone(),
        Value::Array(items) => items
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Value::Str(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::str(&c.to_string())))
            .collect(),
        _ => Vec::new(),
    })
}

fn math(name: &str, args: &[Value]) -> f64 {
    let x = number_arg(args, 0);
    let y = number_arg(args, 1);
    match name {
        "abs" => x.abs(),
        "sqrt" => x.sqrt(),
        "cbrt" => x.cbrt(),
        "pow" => super::value::pow(x, y),
        "exp" => x.exp(),
        "expm1" => x.exp_m1(),
        "log" => x.ln(),
        "log1p" => x.ln_1p(),
        "log2" => x.log2(),
        "log10" => x.log10(),
        "floor" => x.floor(),
        "ceil" => x.ceil(),
        "round" => (x + 0.5).floor(),
        "trunc" => x.trunc(),
        "sign" => {
            if x.is_nan() || x == 0.0 {
                x
            } else {
                x.signum()
            }
        }
        "min" | "max" => {
            let is_max = name == "max";
            let mut acc = if is_max { f64::NEG_INFINITY } else { f64::INFINITY };
            for v in args {
                let n = v.to_number();
                if n.is_nan() {
                    return f64::NAN;
                }
                acc = if is_max { acc.max(n) } else { acc.min(n) };
            }
            acc
        }
        "sin" => x.sin(),
        "cos" => x.cos(),
        "tan" => x.tan(),
        "asin" => x.asin(),
        "acos" => x.acos(),
        "atan" => x.atan(),
        "atan2" => x.atan2(y),
        "sinh" => x.sinh(),
        "cosh" => x.cosh(),
        "tanh" => x.tanh(),
        "hypot" => args
            .iter()
            .map(|v| v.to_number())
            .fold(0.0_f64, |acc, n| acc.hypot(n)),
        "random" => rand::thread_rng().r#gen::<f64>(),
        _ => f64::NAN,
    }
}

fn parse_int(text: &str, radix: f64) -> f64 {
    let mut s = text.trim();
    let mut sign = 1.0;
    if let Some(rest) = s.strip_prefix('-') {
        sign = -1.0;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    let explicit = !(radix.is_nan() || radix == 0.0);
    let mut radix = if explicit { radix.trunc() as u32 } else { 10 };
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    if (!explicit || radix == 16)
        && let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
    {
        s = rest;
        radix = 16;
    }

    let mut value = 0.0_f64;
    let mut any = false;
    for c in s.chars() {
        let Some(digit) = c.to_digit(radix) else {
            break;
        };
        value = value * f64::from(radix) + f64::from(digit);
        any = true;
    }
    if any { sign * value } else { f64::NAN }
}

fn parse_float(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }

    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let int_end = digits_from(end);
    let mut last = int_end;
    let mut seen_digit = int_end > end;
    if bytes.get(last) == Some(&b'.') {
        let frac_end = digits_from(last + 1);
        seen_digit |= frac_end > last + 1;
        last = frac_end;
    }
    if !seen_digit {
        return f64::NAN;
    }
    if matches!(bytes.get(last), Some(b'e') | Some(b'E')) {
        let mut exp = last + 1;
        if matches!(bytes.get(exp), Some(b'+') | Some(b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            last = exp_end;
        }
    }
    s[..last].trim_end_matches('.').parse::<f64>().unwrap_or(f64::NAN)
}

fn json_stringify(interp: &Interpreter, args: &[Value]) -> Eval<Value> {
    let pretty = match arg(args, 2) {
        Value::Number(n) => n >= 1.0,
        Value::Str(s) => !s.is_empty(),
        _ => false,
    };
    let mut budget = interp.max_string_length();
    let json = match arg(args, 0).to_json(0, &mut budget) {
        Ok(json) => json,
        Err(JsonError::Circular) => {
            return Err(type_error("Converting circular structure to JSON"));
        }
        Err(JsonError::TooLarge) => return Err(throw("RangeError", "Invalid string length")),
    };
    let Some(json) = json else {
        return Ok(Value::Undefined);
    };
    let text = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    let text = text.map_err(|e| type_error(e.to_string()))?;
    interp.check_string_length(text.len())?;
    Ok(Value::str(&text))
}

fn json_parse(text: &str) -> Eval<Value> {
    let parsed: serde_json::Value =
        serde_json::from_str(text).map_err(|e| throw("SyntaxError", e.to_string()))?;
    Ok(from_json(parsed))
}

fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::str(&s),
        serde_json::Value::Array(items) => Value::array(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            Value::object(map.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

fn array_from(interp: &mut Interpreter, args: &[Value]) -> Eval<Value> {
    let source = arg(args, 0);
    let items: Vec<Value> = match &source {
        Value::Array(items) => items.borrow().clone(),
        Value::Str(s) => s.chars().map(|c| Value::str(&c.to_string())).collect(),
        Value::Object(_) => {
            let length = source.own_property("length").map_or(0.0, |v| v.to_number());
            let length = if length.is_finite() && length > 0.0 { length.trunc() } else { 0.0 };
            if length > interp.max_array_length() as f64 {
                return Err(throw("RangeError", "Invalid array length"));
            }
            vec![Value::Undefined; length as usize]
        }
        Value::Undefined | Value::Null => {
            return Err(type_error(format!(
                "{} is not iterable",
                source.to_display_string()
            )));
        }
        _ => Vec::new(),
    };

    let mapper = arg(args, 1);
    if mapper.is_nullish() {
        return Ok(Value::array(items));
    }
    if !mapper.is_callable() {
        return Err(type_error(format!(
            "{} is not a function",
            mapper.to_display_string()
        )));
    }
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        out.push(interp.call_function(&mapper, vec![item, Value::Number(i as f64)])?);
    }
    Ok(Value::array(out))
}

/// Resolves a relative `slice`-style index against `len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => strict_equals(a, b),
    }
}

fn callback(args: &[Value], method: &str) -> Eval<Value> {
    let f = arg(args, 0);
    if f.is_callable() {
        Ok(f)
    } else {
        Err(type_error(format!(
            "{} is not a function (in Array.prototype.{method})",
            f.to_display_string()
        )))
    }
}

fn call_array_method(
    interp: &mut Interpreter,
    items: &ArrayRef,
    name: &str,
    args: Vec<Value>,
) -> Eval<Value> {
    let this = Value::Array(Rc::clone(items));
    // Callbacks see a snapshot; mutations they make land on the live array.
    let snapshot = || items.borrow().clone();

    match name {
        "push" => {
            let len = items.borrow().len() + args.len();
            interp.check_array_length(len)?;
            items.borrow_mut().extend(args);
            Ok(Value::Number(len as f64))
        }
        "pop" => Ok(items.borrow_mut().pop().unwrap_or(Value::Undefined)),
        "shift" => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                Ok(Value::Undefined)
            } else {
                Ok(items.remove(0))
            }
        }
        "unshift" => {
            let len = items.borrow().len() + args.len();
            interp.check_array_length(len)?;
            let mut items = items.borrow_mut();
            for (i, v) in args.into_iter().enumerate() {
                items.insert(i, v);
            }
            Ok(Value::Number(len as f64))
        }
        "map" | "filter" | "forEach" | "some" | "every" | "find" | "findIndex" => {
            let f = callback(&args, name)?;
            let mut mapped = Vec::new();
            for (i, item) in snapshot().into_iter().enumerate() {
                let out = interp.call_function(
                    &f,
                    vec![item.clone(), Value::Number(i as f64), this.clone()],
                )?;
                match name {
                    "map" => mapped.push(out),
                    "filter" if out.truthy() => mapped.push(item),
                    "some" if out.truthy() => return Ok(Value::Bool(true)),
                    "every" if !out.truthy() => return Ok(Value::Bool(false)),
                    "find" if out.truthy() => return Ok(item),
                    "findIndex" if out.truthy() => return Ok(Value::Number(i as f64)),
                    _ => {}
                }
            }
            Ok(match name {
                "map" | "filter" => Value::array(mapped),
                "some" => Value::Bool(false),
                "every" => Value::Bool(true),
                "findIndex" => Value::Number(-1.0),
                _ => Value::Undefined,
            })
        }
        "reduce" => {
            let f = callback(&args, name)?;
            let mut iter = snapshot().into_iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match iter.next() {
                    Some((_, first)) => first,
                    None => return Err(type_error("Reduce of empty array with no initial value")),
                },
            };
            for (i, item) in iter {
                acc = interp.call_function(
                    &f,
                    vec![acc, item, Value::Number(i as f64), this.clone()],
                )?;
            }
            Ok(acc)
        }
        "slice" => {
            let items = items.borrow();
            let len = items.len();
            let start = relative_index(&arg(&args, 0), len, 0);
            let end = relative_index(&arg(&args, 1), len, len);
            let out = if start < end { items[start..end].to_vec() } else { Vec::new() };
            Ok(Value::array(out))
        }
        "concat" => {
            let mut out = snapshot();
            for a in args {
                match a {
                    Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                    other => out.push(other),
                }
            }
            interp.check_array_length(out.len())?;
            Ok(Value::array(out))
        }
        "join" => {
            let sep = match arg(&args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_display_string(),
            };
            let limit = interp.max_string_length();
            let mut joined = String::new();
            for (i, v) in items.borrow().iter().enumerate() {
                if i > 0 {
                    interp.check_string_length(joined.len() + sep.len())?;
                    joined.push_str(&sep);
                }
                if !v.is_nullish() {
                    v.append_display(&mut joined, limit)?;
                }
            }
            Ok(Value::str(&joined))
        }
        "indexOf" => {
            let needle = arg(&args, 0);
            let pos = items.borrow().iter().position(|v| strict_equals(v, &needle));
            Ok(Value::Number(pos.map_or(-1.0, |p| p as f64)))
        }
        "includes" => {
            let needle = arg(&args, 0);
            Ok(Value::Bool(
                items.borrow().iter().any(|v| same_value_zero(v, &needle)),
            ))
        }
        "fill" => {
            let value = arg(&args, 0);
            {
                let mut items = items.borrow_mut();
                let len = items.len();
                let start = relative_index(&arg(&args, 1), len, 0);
                let end = relative_index(&arg(&args, 2), len, len);
                for slot in items.iter_mut().take(end).skip(start) {
                    *slot = value.clone();
                }
            }
            Ok(this)
        }
        "reverse" => {
            items.borrow_mut().reverse();
            Ok(this)
        }
        "sort" => {
            let comparator = arg(&args, 0);
            if !comparator.is_nullish() && !comparator.is_callable() {
                return Err(type_error(
                    "The comparison function must be either a function or undefined",
                ));
            }
            let mut sorted = snapshot();
            // Insertion sort: stable, and the comparator may fail part-way.
            for i in 1..sorted.len() {
                let mut j = i;
                while j > 0 {
                    interp.tick()?;
                    let order = sort_order(interp, &comparator, &sorted[j - 1], &sorted[j])?;
                    if order != Ordering::Greater {
                        break;
                    }
                    sorted.swap(j - 1, j);
                    j -= 1;
                }
            }
            *items.borrow_mut() = sorted;
            Ok(this)
        }
        _ => Err(type_error(format!("{name} is not a function"))),
    }
}

fn sort_order(interp: &mut Interpreter, comparator: &Value, a: &Value, b: &Value) -> Eval<Ordering> {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => return Ok(Ordering::Equal),
        (Value::Undefined, _) => return Ok(Ordering::Greater),
        (_, Value::Undefined) => return Ok(Ordering::Less),
        _ => {}
    }
    if comparator.is_callable() {
        let n = interp
            .call_function(comparator, vec![a.clone(), b.clone()])?
            .to_number();
        return Ok(if n > 0.0 {
            Ordering::Greater
        } else if n < 0.0 {
            Ordering::Less
        } else {
            Ordering::Equal
        });
    }
    Ok(compare(
        &Value::str(&a.to_display_string()),
        &Value::str(&b.to_display_string()),
    )
    .unwrap_or(Ordering::Equal))
}

fn call_string_method(
    interp: &Interpreter,
    s: &Rc<str>,
    name: &str,
    args: Vec<Value>,
) -> Eval<Value> {
    let text = arg(&args, 0).to_display_string();
    let value = match name {
        "toUpperCase" => Value::str(&s.to_uppercase()),
        "toLowerCase" => Value::str(&s.to_lowercase()),
        "trim" => Value::str(s.trim()),
        "includes" => Value::Bool(s.contains(text.as_str())),
        "startsWith" => Value::Bool(s.starts_with(text.as_str())),
        "endsWith" => Value::Bool(s.ends_with(text.as_str())),
        "indexOf" => {
            let pos = s
                .find(text.as_str())
                .map(|byte| s[..byte].chars().count() as f64);
            Value::Number(pos.unwrap_or(-1.0))
        }
        "charAt" => {
            let index = number_arg(&args, 0);
            let index = if index.is_nan() { 0.0 } else { index.trunc() };
            let c = if index < 0.0 {
                None
            } else {
                s.chars().nth(index as usize)
            };
            Value::str(&c.map(String::from).unwrap_or_default())
        }
        "slice" => {
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len();
            let start = relative_index(&arg(&args, 0), len, 0);
            let end = relative_index(&arg(&args, 1), len, len);
            let out: String = if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            };
            Value::str(&out)
        }
        "split" => {
            let parts: Vec<Value> = match arg(&args, 0) {
                Value::Undefined => vec![Value::Str(Rc::clone(s))],
                _ if text.is_empty() => {
                    interp.check_array_length(s.chars().count())?;
                    s.chars().map(|c| Value::str(&c.to_string())).collect()
                }
                _ => {
                    interp.check_array_length(s.matches(text.as_str()).count() + 1)?;
                    s.split(text.as_str()).map(Value::str).collect()
                }
            };
            Value::array(parts)
        }
        "repeat" => {
            let count = number_arg(&args, 0);
            let count = if count.is_nan() { 0.0 } else { count.trunc() };
            if count < 0.0 || count.is_infinite() {
                return Err(throw(
                    "RangeError",
                    format!("Invalid count value: {}", number_to_string(count)),
                ));
            }
            interp.check_string_length((s.len() as f64 * count) as usize)?;
            Value::str(&s.repeat(count as usize))
        }
        "concat" => {
            let limit = interp.max_string_length();
            let mut out = s.to_string();
            for value in &args {
                value.append_display(&mut out, limit)?;
            }
            Value::str(&out)
        }
        "padStart" | "padEnd" => {
            let target = number_arg(&args, 0);
            let target = if target.is_nan() { 0.0 } else { target.trunc() };
            let len = s.chars().count();
            let filler = match arg(&args, 1) {
                Value::Undefined => " ".to_string(),
                other => other.to_display_string(),
            };
            if target <= len as f64 || filler.is_empty() {
                return Ok(Value::Str(Rc::clone(s)));
            }
            interp.check_string_length(target as usize)?;
            let pad: String = filler.chars().cycle().take(target as usize - len).collect();
            let out = if name == "padStart" {
                format!("{pad}{s}")
            } else {
                format!("{s}{pad}")
            };
            Value::str(&out)
        }
        _ => return Err(type_error(format!("{name} is not a function"))),
    };
    Ok(value)
}

fn call_number_method(n: f64, name: &str, args: Vec<Value>) -> Eval<Value> {
    match name {
        "toFixed" => {
            let digits = number_arg(&args, 0);
            let digits = if digits.is_nan() { 0.0 } else { digits.trunc() };
            if !(0.0..=100.0).contains(&digits) {
                return Err(throw(
                    "RangeError",
                    "toFixed() digits argument must be between 0 and 100",
                ));
            }
            Ok(Value::str(&to_fixed(n, digits as usize)))
        }
        _ => {
            let radix = match arg(&args, 0) {
                Value::Undefined => 10.0,
                other => other.to_number().trunc(),
            };
            if !(2.0..=36.0).contains(&radix) {
                return Err(throw(
                    "RangeError",
                    "toString() radix must be between 2 and 36",
                ));
            }
            if radix == 10.0 || !n.is_finite() || n.fract() != 0.0 {
                return Ok(Value::str(&number_to_string(n)));
            }
            Ok(Value::str(&integer_to_radix(n, radix as u32)))
        }
    }
}

fn integer_to_radix(n: f64, radix: u32) -> String {
    let mut value = n.abs();
    let mut digits = Vec::new();
    while value >= 1.0 {
        let d = (value % f64::from(radix)) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
        value = (value / f64::from(radix)).trunc();
    }
    if digits.is_empty() {
        digits.push('0');
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42px", f64::NAN), 42.0);
        assert_eq!(parse_int("  -17", f64::NAN), -17.0);
        assert_eq!(parse_int("0x1A", f64::NAN), 26.0);
        assert_eq!(parse_int("101", 2.0), 5.0);
        assert!(parse_int("abc", f64::NAN).is_nan());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float("  -2.5e3"), -2500.0);
        assert_eq!(parse_float("1e"), 1.0);
        assert_eq!(parse_float(".5"), 0.5);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float("x1").is_nan());
    }

    #[test]
    fn test_math_rounding_matches_javascript() {
        assert_eq!(math("round", &[Value::Number(-2.5)]), -2.0);
        assert_eq!(math("round", &[Value::Number(2.5)]), 3.0);
        assert_eq!(math("max", &[]), f64::NEG_INFINITY);
        assert!(math("min", &[Value::Number(1.0), Value::Undefined]).is_nan());
    }

    #[test]
    fn test_integer_to_radix() {
        assert_eq!(integer_to_radix(255.0, 16), "ff");
        assert_eq!(integer_to_radix(-5.0, 2), "-101");
        assert_eq!(integer_to_radix(0.0, 2), "0");
    }

    #[test]
    fn test_error_value_shape() {
        let err = error_value("RangeError", "bad");
        assert_eq!(err.thrown_message(), "bad");
        assert_eq!(err.to_display_string(), "RangeError: bad");
    }
}
