//! Runtime values.
//!
//! [`Value`] is the interpreter's internal representation: reference types
//! share state through `Rc<RefCell<..>>`, so it never leaves the sandbox
//! thread. [`ExecValue`] is the owned, `Send` snapshot handed back to callers.

use super::ast::FunctionDef;
use super::interpreter::Scope;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Nesting depth at which snapshots stop descending (guards cyclic structures).
const MAX_SNAPSHOT_DEPTH: usize = 64;

/// Cut-off for text built only for messages, keys and comparisons.
const MAX_DISPLAY_LENGTH: usize = 1 << 20;

/// Text or a snapshot would pass the configured size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TooLarge;

/// Why `JSON.stringify` gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JsonError {
    Circular,
    TooLarge,
}

impl From<TooLarge> for JsonError {
    fn from(_: TooLarge) -> Self {
        JsonError::TooLarge
    }
}

fn spend(budget: &mut usize, amount: usize) -> Result<(), TooLarge> {
    *budget = budget.checked_sub(amount).ok_or(TooLarge)?;
    Ok(())
}

fn push_within(out: &mut String, text: &str, limit: usize) -> Result<(), TooLarge> {
    if out.len() + text.len() > limit {
        return Err(TooLarge);
    }
    out.push_str(text);
    Ok(())
}

pub(crate) type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub(crate) type ObjectRef = Rc<RefCell<Vec<(String, Value)>>>;

#[derive(Clone)]
pub(crate) enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Closure(Rc<Closure>),
    Native(Rc<Native>),
    Namespace(Namespace),
}

pub(crate) struct Closure {
    pub def: Rc<FunctionDef>,
    pub env: Rc<Scope>,
}

/// A builtin function, optionally bound to the value it was read from
/// (`[1, 2].map` carries the array).
pub(crate) struct Native {
    pub name: &'static str,
    pub receiver: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Namespace {
    Math,
    Json,
    Number,
    Console,
    Array,
    Object,
}

impl Namespace {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Namespace::Math => "Math",
            Namespace::Json => "JSON",
            Namespace::Number => "Number",
            Namespace::Console => "console",
            Namespace::Array => "Array",
            Namespace::Object => "Object",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Closure(c) => write!(f, "[Function {}]", c.name()),
            Value::Native(n) => write!(f, "[Function {}]", n.name),
            Value::Namespace(ns) => write!(f, "[{}]", ns.name()),
            other => write!(f, "{}", other.to_display_string()),
        }
    }
}

impl Closure {
    pub(crate) fn name(&self) -> &str {
        self.def.name.as_deref().unwrap_or("anonymous")
    }
}

impl Value {
    pub(crate) fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub(crate) fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub(crate) fn object(props: Vec<(String, Value)>) -> Value {
        Value::Object(Rc::new(RefCell::new(props)))
    }

    pub(crate) fn native(name: &'static str, receiver: Option<Value>) -> Value {
        Value::Native(Rc::new(Native { name, receiver }))
    }

    pub(crate) fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub(crate) fn is_callable(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Native(_))
    }

    pub(crate) fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub(crate) fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Namespace(Namespace::Array | Namespace::Number) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Namespace(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Closure(_) | Value::Native(_) => "function",
        }
    }

    pub(crate) fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => string_to_number(s),
            Value::Array(_) => string_to_number(&self.to_display_string()),
            _ => f64::NAN,
        }
    }

    /// `String(value)`. Arrays render at most `MAX_DISPLAY_LENGTH` bytes;
    /// use [`Value::to_display_string_within`] where the text becomes a value.
    pub(crate) fn to_display_string(&self) -> String {
        if let Value::Str(s) = self {
            return s.to_string();
        }
        let mut out = String::new();
        let _ = self.write_display(&mut out, MAX_DISPLAY_LENGTH, 0);
        out
    }

    /// `String(value)`, refusing to grow past `limit` bytes.
    pub(crate) fn to_display_string_within(&self, limit: usize) -> Result<String, TooLarge> {
        let mut out = String::new();
        self.write_display(&mut out, limit, 0)?;
        Ok(out)
    }

    /// Appends `String(value)` to `out`, keeping `out` within `limit` bytes.
    pub(crate) fn append_display(&self, out: &mut String, limit: usize) -> Result<(), TooLarge> {
        self.write_display(out, limit, 0)
    }

    fn write_display(&self, out: &mut String, limit: usize, depth: usize) -> Result<(), TooLarge> {
        if depth > MAX_SNAPSHOT_DEPTH {
            return Ok(());
        }
        let text = match self {
            Value::Str(s) => return push_within(out, s, limit),
            Value::Array(items) => {
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        push_within(out, ",", limit)?;
                    }
                    if !item.is_nullish() {
                        item.write_display(out, limit, depth + 1)?;
                    }
                }
                return Ok(());
            }
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::Object(_) => match self.error_parts() {
                Some((name, message)) if message.is_empty() => name,
                Some((name, message)) => format!("{name}: {message}"),
                None => "[object Object]".to_string(),
            },
            Value::Closure(c) => format!("function {}() {{ [code] }}", c.name()),
            Value::Native(n) => format!("function {}() {{ [native code] }}", n.name),
            Value::Namespace(ns) => format!("[object {}]", ns.name()),
        };
        push_within(out, &text, limit)
    }

    /// Property lookup on plain objects.
    pub(crate) fn own_property(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(props) => props
                .borrow()
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    /// Returns `(name, message)` for objects built by the `Error` constructors.
    pub(crate) fn error_parts(&self) -> Option<(String, String)> {
        let name = self.own_property("name")?;
        let message = self.own_property("message")?;
        match (name, message) {
            (Value::Str(name), Value::Str(message)) if name.ends_with("Error") => {
                Some((name.to_string(), message.to_string()))
            }
            _ => None,
        }
    }

    /// Text reported for an uncaught throw: an error's message, otherwise `String(v)`.
    pub(crate) fn thrown_message(&self) -> String {
        match self.error_parts() {
            Some((_, message)) => message,
            None => self.to_display_string(),
        }
    }

    /// Converts to the owned snapshot; `None` stands for `undefined`.
    ///
    /// `limit` bounds the total size (string bytes plus one per value) so a
    /// result cannot be expanded into something far larger than the heap
    /// that produced it.
    pub(crate) fn to_exec_value(&self, limit: usize) -> Result<Option<ExecValue>, TooLarge> {
        let mut budget = limit;
        self.snapshot(0, &mut budget)
    }

    fn snapshot(&self, depth: usize, budget: &mut usize) -> Result<Option<ExecValue>, TooLarge> {
        if depth > MAX_SNAPSHOT_DEPTH {
            return Ok(Some(ExecValue::String("[Circular]".to_string())));
        }
        spend(budget, 1)?;
        Ok(Some(match self {
            Value::Undefined => return Ok(None),
            Value::Null => ExecValue::Null,
            Value::Bool(b) => ExecValue::Bool(*b),
            Value::Number(n) => ExecValue::Number(*n),
            Value::Str(s) => {
                spend(budget, s.len())?;
                ExecValue::String(s.to_string())
            }
            Value::Array(items) => {
                let mut out = Vec::new();
                for item in items.borrow().iter() {
                    out.push(item.snapshot(depth + 1, budget)?.unwrap_or(ExecValue::Null));
                }
                ExecValue::Array(out)
            }
            Value::Object(props) => {
                let mut out = Vec::new();
                for (k, v) in props.borrow().iter() {
                    spend(budget, k.len())?;
                    if let Some(v) = v.snapshot(depth + 1, budget)? {
                        out.push((k.clone(), v));
                    }
                }
                ExecValue::Object(out)
            }
            Value::Closure(c) => ExecValue::Function(c.name().to_string()),
            Value::Native(n) => ExecValue::Function(n.name.to_string()),
            Value::Namespace(ns) => ExecValue::String(format!("[object {}]", ns.name())),
        }))
    }

    /// `JSON.stringify` view: `None` where the value is omitted. `budget`
    /// shrinks by the size of every string and value visited.
    pub(crate) fn to_json(
        &self,
        depth: usize,
        budget: &mut usize,
    ) -> Result<Option<serde_json::Value>, JsonError> {
        if depth > MAX_SNAPSHOT_DEPTH {
            return Err(JsonError::Circular);
        }
        spend(budget, 1)?;
        Ok(Some(match self {
            Value::Undefined | Value::Closure(_) | Value::Native(_) => return Ok(None),
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => json_number(*n),
            Value::Str(s) => {
                spend(budget, s.len())?;
                serde_json::Value::String(s.to_string())
            }
            Value::Array(items) => {
                let mut out = Vec::new();
                for item in items.borrow().iter() {
                    out.push(
                        item.to_json(depth + 1, budget)?
                            .unwrap_or(serde_json::Value::Null),
                    );
                }
                serde_json::Value::Array(out)
            }
            Value::Object(props) => {
                let mut map = serde_json::Map::new();
                for (k, v) in props.borrow().iter() {
                    spend(budget, k.len())?;
                    if let Some(v) = v.to_json(depth + 1, budget)? {
                        map.insert(k.clone(), v);
                    }
                }
                serde_json::Value::Object(map)
            }
            Value::Namespace(_) => serde_json::Value::Object(serde_json::Map::new()),
        }))
    }
}

/// JavaScript `Number.prototype.toString()` for base 10.
pub(crate) fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let s = format!("{n:e}");
        return match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => s,
        };
    }
    if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

/// JavaScript `ToNumber` on strings.
pub(crate) fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64);
    }
    let valid = t
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !valid {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// Integral numbers serialize without a fractional part; non-finite ones as `null`.
pub(crate) fn json_number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// `===`
pub(crate) fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(x, y),
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        (Value::Closure(x), Value::Closure(y)) => Rc::ptr_eq(x, y),
        (Value::Native(x), Value::Native(y)) => Rc::ptr_eq(x, y),
        (Value::Namespace(x), Value::Namespace(y)) => x == y,
        _ => false,
    }
}

fn is_primitive(v: &Value) -> bool {
    matches!(
        v,
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) | Value::Str(_)
    )
}

/// `==`
pub(crate) fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (x, y) if a.type_of() == b.type_of() && !(a.is_nullish() ^ b.is_nullish()) => {
            strict_equals(x, y)
        }
        (x, y) if x.is_nullish() || y.is_nullish() => x.is_nullish() && y.is_nullish(),
        (Value::Bool(_), _) => loose_equals(&Value::Number(a.to_number()), b),
        (_, Value::Bool(_)) => loose_equals(a, &Value::Number(b.to_number())),
        (Value::Number(x), Value::Str(_)) => *x == b.to_number(),
        (Value::Str(_), Value::Number(y)) => a.to_number() == *y,
        (x, y) if is_primitive(x) && !is_primitive(y) => {
            loose_equals(x, &Value::str(&y.to_display_string()))
        }
        (x, y) if !is_primitive(x) && is_primitive(y) => {
            loose_equals(&Value::str(&x.to_display_string()), y)
        }
        _ => false,
    }
}

/// `+`: string concatenation when either side is not a number-like primitive.
/// Concatenations longer than `limit` bytes fail.
pub(crate) fn add(a: &Value, b: &Value, limit: usize) -> Result<Value, TooLarge> {
    let stringy = |v: &Value| !matches!(v, Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_));
    if stringy(a) || stringy(b) {
        let mut s = a.to_display_string_within(limit)?;
        b.append_display(&mut s, limit)?;
        Ok(Value::Str(Rc::from(s)))
    } else {
        Ok(Value::Number(a.to_number() + b.to_number()))
    }
}

/// JavaScript `ToInt32`: truncate, then wrap modulo 2^32.
pub(crate) fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32 as i32
}

/// JavaScript `ToUint32`.
pub(crate) fn to_uint32(n: f64) -> u32 {
    to_int32(n) as u32
}

pub(crate) fn pow(base: f64, exp: f64) -> f64 {
    if exp.is_nan() || (base.abs() == 1.0 && exp.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exp)
}

/// Relational comparison; `None` when either side is NaN.
pub(crate) fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Value::Str(x), Value::Str(y)) = (a, b) {
        return Some(x.cmp(y));
    }
    a.to_number().partial_cmp(&b.to_number())
}

/// `Number.prototype.toFixed`; ties round away from zero.
pub(crate) fn to_fixed(n: f64, digits: usize) -> String {
    if !n.is_finite() || n.abs() >= 1e21 {
        return number_to_string(n);
    }
    let scale = 10f64.powi(digits as i32);
    let scaled = n * scale;
    if scaled.is_finite() && (scaled.fract().abs() - 0.5).abs() < f64::EPSILON {
        return format!("{:.*}", digits, scaled.round() / scale);
    }
    format!("{n:.digits$}")
}

/// Owned result of a snippet execution.
///
/// Mirrors the JavaScript value the snippet returned. `undefined` has no
/// variant; it is represented by the absence of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ExecValue>),
    /// Properties in insertion order.
    Object(Vec<(String, ExecValue)>),
    /// A function value, by name.
    Function(String),
}

impl ExecValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ExecValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExecValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, ExecValue::Number(_))
    }

    /// Compact JSON text, with the same placeholders as the `Serialize` impl.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("[Could not stringify object: {e}]"))
    }

    /// Indented JSON text, with the same placeholders as the `Serialize` impl.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|e| format!("[Could not stringify object: {e}]"))
    }
}

impl fmt::Display for ExecValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecValue::Null => write!(f, "null"),
            ExecValue::Bool(b) => write!(f, "{b}"),
            ExecValue::Number(n) => write!(f, "{}", number_to_string(*n)),
            ExecValue::String(s) => write!(f, "{s}"),
            ExecValue::Function(_) => write!(f, "[Function]"),
            ExecValue::Array(_) | ExecValue::Object(_) => write!(f, "{}", self.to_json_string()),
        }
    }
}

impl Serialize for ExecValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ExecValue::Null => serializer.serialize_unit(),
            ExecValue::Bool(b) => serializer.serialize_bool(*b),
            ExecValue::Number(n) if !n.is_finite() => {
                serializer.serialize_str(&number_to_string(*n))
            }
            ExecValue::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                serializer.serialize_i64(*n as i64)
            }
            ExecValue::Number(n) => serializer.serialize_f64(*n),
            ExecValue::String(s) => serializer.serialize_str(s),
            ExecValue::Function(_) => serializer.serialize_str("[Function]"),
            ExecValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ExecValue::Object(props) => {
                let mut map = serializer.serialize_map(Some(props.len()))?;
                for (k, v) in props {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl From<serde_json::Value> for ExecValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ExecValue::Null,
            serde_json::Value::Bool(b) => ExecValue::Bool(b),
            serde_json::Value::Number(n) => ExecValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => ExecValue::String(s),
            serde_json::Value::Array(items) => {
                ExecValue::Array(items.into_iter().map(ExecValue::from).collect())
            }
            serde_json::Value::Object(map) => ExecValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, ExecValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for ExecValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(ExecValue::from)
    }
}

impl From<f64> for ExecValue {
    fn from(n: f64) -> Self {
        ExecValue::Number(n)
    }
}

impl From<&str> for ExecValue {
    fn from(s: &str) -> Self {
        ExecValue::String(s.to_string())
    }
}
