//! Tree-walking evaluator for parsed snippets.
//!
//! Every statement and expression evaluation costs one step against the
//! configured budget; the wall clock is checked periodically. Runtime errors
//! (`TypeError`, `ReferenceError`) are ordinary thrown values and can be
//! caught by the snippet, while limit violations are fatal and bypass
//! `catch`/`finally`.

use super::SandboxConfig;
use super::ast::{
    BinaryOp, DeclKind, Expr, FunctionBody, LogicalOp, Stmt, TemplatePart, UnaryOp,
};
use super::builtins::{self, throw, type_error};
use super::error::ExecutionError;
use super::value::{self, Closure, Namespace, TooLarge, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// How often (in steps) the wall clock is consulted.
const CLOCK_CHECK_INTERVAL: u64 = 1024;

/// Non-local exit from an evaluation.
pub(crate) enum Abrupt {
    /// A value thrown by the snippet; catchable.
    Throw(Value),
    /// A sandbox limit was hit; not catchable.
    Fatal(ExecutionError),
}

pub(crate) type Eval<T> = Result<T, Abrupt>;

impl From<TooLarge> for Abrupt {
    fn from(_: TooLarge) -> Self {
        throw("RangeError", "Invalid string length")
    }
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

#[derive(Clone)]
struct Binding {
    value: Value,
    constant: bool,
}

/// A lexical environment.
pub(crate) struct Scope {
    vars: RefCell<HashMap<String, Binding>>,
    parent: Option<Rc<Scope>>,
    is_function: bool,
}

impl Scope {
    fn function(parent: Option<Rc<Scope>>) -> Rc<Scope> {
        Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent,
            is_function: true,
        })
    }

    fn block(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
            is_function: false,
        })
    }

    /// Copy of a loop head's bindings for the next iteration. Closures made
    /// in earlier iterations keep the old copy.
    fn next_iteration(&self) -> Rc<Scope> {
        Rc::new(Scope {
            vars: RefCell::new(self.vars.borrow().clone()),
            parent: self.parent.clone(),
            is_function: false,
        })
    }

    fn declare(&self, name: &str, value: Value, constant: bool) -> Eval<()> {
        let mut vars = self.vars.borrow_mut();
        if vars.contains_key(name) {
            return Err(throw(
                "SyntaxError",
                format!("Identifier '{name}' has already been declared"),
            ));
        }
        vars.insert(name.to_string(), Binding { value, constant });
        Ok(())
    }

    /// `var` semantics: redeclaration is allowed and keeps the binding.
    fn declare_var(&self, name: &str, value: Option<Value>) {
        let mut vars = self.vars.borrow_mut();
        match (vars.get_mut(name), value) {
            (Some(binding), Some(value)) => binding.value = value,
            (Some(_), None) => {}
            (None, value) => {
                vars.insert(
                    name.to_string(),
                    Binding {
                        value: value.unwrap_or(Value::Undefined),
                        constant: false,
                    },
                );
            }
        }
    }

    fn nearest_function(self: &Rc<Self>) -> Rc<Scope> {
        let mut scope = Rc::clone(self);
        while !scope.is_function {
            match &scope.parent {
                Some(parent) => scope = Rc::clone(parent),
                None => break,
            }
        }
        scope
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.vars.borrow().get(name) {
            return Some(binding.value.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    fn assign(&self, name: &str, value: Value) -> Eval<()> {
        if let Some(binding) = self.vars.borrow_mut().get_mut(name) {
            if binding.constant {
                return Err(type_error("Assignment to constant variable."));
            }
            binding.value = value;
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(throw("ReferenceError", format!("{name} is not defined"))),
        }
    }
}

pub(crate) struct Interpreter {
    steps: u64,
    step_budget: u64,
    started: Instant,
    timeout: Duration,
    depth: usize,
    max_depth: usize,
    max_array_length: usize,
    max_string_length: usize,
}

impl Interpreter {
    pub(crate) fn new(config: &SandboxConfig) -> Self {
        Self {
            steps: 0,
            step_budget: config.step_budget,
            started: Instant::now(),
            timeout: config.timeout,
            depth: 0,
            max_depth: config.max_call_depth,
            max_array_length: config.max_array_length,
            max_string_length: config.max_string_length,
        }
    }

    /// Runs `body` as the body of an argument-less function and returns its
    /// return value.
    pub(crate) fn run(&mut self, body: &[Stmt]) -> Result<Value, ExecutionError> {
        let scope = Scope::function(None);
        match self.run_function_body(body, &scope) {
            Ok(value) => Ok(value),
            Err(Abrupt::Throw(value)) => Err(ExecutionError::Thrown(value.thrown_message())),
            Err(Abrupt::Fatal(error)) => Err(error),
        }
    }

    pub(crate) fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn max_array_length(&self) -> usize {
        self.max_array_length
    }

    pub(crate) fn tick(&mut self) -> Eval<()> {
        self.steps += 1;
        if self.steps > self.step_budget {
            return Err(Abrupt::Fatal(ExecutionError::BudgetExceeded(self.step_budget)));
        }
        if self.steps % CLOCK_CHECK_INTERVAL == 0 && self.started.elapsed() > self.timeout {
            return Err(Abrupt::Fatal(ExecutionError::Timeout(self.timeout)));
        }
        Ok(())
    }

    pub(crate) fn max_string_length(&self) -> usize {
        self.max_string_length
    }

    pub(crate) fn check_string_length(&self, len: usize) -> Eval<()> {
        if len > self.max_string_length {
            return Err(TooLarge.into());
        }
        Ok(())
    }

    pub(crate) fn check_array_length(&self, len: usize) -> Eval<()> {
        if len > self.max_array_length {
            return Err(throw("RangeError", "Invalid array length"));
        }
        Ok(())
    }

    /// Calls any callable value.
    pub(crate) fn call_function(&mut self, callee: &Value, args: Vec<Value>) -> Eval<Value> {
        match callee {
            Value::Closure(closure) => self.call_closure(closure, args),
            Value::Native(native) => builtins::call_native(self, native, args),
            Value::Namespace(ns) => builtins::call_namespace(self, *ns, args),
            other => Err(type_error(format!(
                "{} is not a function",
                other.to_display_string()
            ))),
        }
    }

    fn call_closure(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Eval<Value> {
        if self.depth >= self.max_depth {
            return Err(Abrupt::Fatal(ExecutionError::StackOverflow));
        }
        self.depth += 1;
        let result = self.invoke(closure, args);
        self.depth -= 1;
        result
    }

    fn invoke(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Eval<Value> {
        let scope = Scope::function(Some(Rc::clone(&closure.env)));
        let mut args = args.into_iter();
        for param in &closure.def.params {
            let value = if param.rest {
                let rest: Vec<Value> = args.by_ref().collect();
                Value::array(rest)
            } else {
                match (args.next(), &param.default) {
                    (Some(Value::Undefined) | None, Some(default)) => self.eval(default, &scope)?,
                    (Some(value), _) => value,
                    (None, None) => Value::Undefined,
                }
            };
            scope.declare_var(&param.name, Some(value));
        }

        match &closure.def.body {
            FunctionBody::Block(body) => self.run_function_body(body, &scope),
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
        }
    }

    fn run_function_body(&mut self, body: &[Stmt], scope: &Rc<Scope>) -> Eval<Value> {
        let mut names = Vec::new();
        collect_var_names(body, &mut names);
        for name in names {
            scope.declare_var(&name, None);
        }
        match self.exec_block(body, scope)? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn exec_block(&mut self, body: &[Stmt], scope: &Rc<Scope>) -> Eval<Flow> {
        for stmt in body {
            if let Stmt::Function(def) = stmt {
                let closure = Value::Closure(Rc::new(Closure {
                    def: Rc::clone(def),
                    env: Rc::clone(scope),
                }));
                let name = def.name.as_deref().unwrap_or_default();
                scope.declare_var(name, Some(closure));
            }
        }
        for stmt in body {
            match self.exec(stmt, scope)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, scope: &Rc<Scope>) -> Eval<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Declare { kind, declarators } => {
                for (name, init) in declarators {
                    let value = match init {
                        Some(expr) => Some(self.eval(expr, scope)?),
                        None => None,
                    };
                    match kind {
                        DeclKind::Var => scope.nearest_function().declare_var(name, value),
                        DeclKind::Let | DeclKind::Const => scope.declare(
                            name,
                            value.unwrap_or(Value::Undefined),
                            *kind == DeclKind::Const,
                        )?,
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Flow::Normal),
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::Block(body) => self.exec_block(body, &Scope::block(scope)),
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.exec(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let mut loop_scope = Scope::block(scope);
                if let Some(init) = init {
                    self.exec(init, &loop_scope)?;
                }
                // `let`/`const` heads get fresh bindings every iteration.
                let per_iteration = matches!(
                    init.as_deref(),
                    Some(Stmt::Declare {
                        kind: DeclKind::Let | DeclKind::Const,
                        ..
                    })
                );
                loop {
                    if per_iteration {
                        loop_scope = loop_scope.next_iteration();
                    }
                    if let Some(test) = test
                        && !self.eval(test, &loop_scope)?.truthy()
                    {
                        break;
                    }
                    match self.exec(body, &Scope::block(&loop_scope))? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if per_iteration {
                        loop_scope = loop_scope.next_iteration();
                    }
                    if let Some(update) = update {
                        self.eval(update, &loop_scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ForOf {
                kind,
                name,
                iterable,
                body,
            } => {
                let items = iterate(self.eval(iterable, scope)?)?;
                for item in items {
                    self.tick()?;
                    let iteration = Scope::block(scope);
                    match kind {
                        DeclKind::Var => scope.nearest_function().declare_var(name, Some(item)),
                        _ => iteration.declare(name, item, *kind == DeclKind::Const)?,
                    }
                    match self.exec(body, &iteration)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::While { test, body } => {
                while self.eval(test, scope)?.truthy() {
                    match self.exec(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile { body, test } => {
                loop {
                    match self.exec(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(test, scope)?.truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                let mut outcome = self.exec_block(block, &Scope::block(scope));
                if let Some(handler) = handler {
                    outcome = match outcome {
                        Err(Abrupt::Throw(thrown)) => {
                            let catch_scope = Scope::block(scope);
                            if let Some(param) = param {
                                catch_scope.declare(param, thrown, false)?;
                            }
                            self.exec_block(handler, &catch_scope)
                        }
                        other => other,
                    };
                }
                if let Some(finalizer) = finalizer {
                    if let Err(Abrupt::Fatal(_)) = outcome {
                        return outcome;
                    }
                    match self.exec_block(finalizer, &Scope::block(scope))? {
                        Flow::Normal => {}
                        other => return Ok(other),
                    }
                }
                outcome
            }
            Stmt::Switch {
                discriminant,
                cases,
            } => {
                let value = self.eval(discriminant, scope)?;
                let mut start = None;
                for (i, case) in cases.iter().enumerate() {
                    if let Some(test) = &case.test
                        && value::strict_equals(&value, &self.eval(test, scope)?)
                    {
                        start = Some(i);
                        break;
                    }
                }
                let start = start.or_else(|| cases.iter().position(|c| c.test.is_none()));
                let Some(start) = start else {
                    return Ok(Flow::Normal);
                };
                let switch_scope = Scope::block(scope);
                for case in &cases[start..] {
                    match self.exec_block(&case.body, &switch_scope)? {
                        Flow::Normal => {}
                        Flow::Break => return Ok(Flow::Normal),
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Throw(expr) => Err(Abrupt::Throw(self.eval(expr, scope)?)),
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn eval(&mut self, expr: &Expr, scope: &Rc<Scope>) -> Eval<Value> {
        self.tick()?;
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(Rc::clone(s))),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => {
                            self.check_string_length(out.len() + text.len())?;
                            out.push_str(text);
                        }
                        TemplatePart::Expr(expr) => self
                            .eval(expr, scope)?
                            .append_display(&mut out, self.max_string_length)?,
                    }
                }
                Ok(Value::str(&out))
            }
            Expr::Array(items) => {
                let items = self.eval_list(items, scope)?;
                self.check_array_length(items.len())?;
                Ok(Value::array(items))
            }
            Expr::Object(props) => {
                let mut out: Vec<(String, Value)> = Vec::with_capacity(props.len());
                for (key, expr) in props {
                    let value = self.eval(expr, scope)?;
                    match out.iter_mut().find(|(k, _)| k == key) {
                        Some(slot) => slot.1 = value,
                        None => out.push((key.clone(), value)),
                    }
                }
                Ok(Value::object(out))
            }
            Expr::Ident(name) => self.lookup(name, scope),
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let target = self.eval(object, scope)?;
                if *optional && target.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = self.eval(property, scope)?;
                get_property(&target, &property_key(&key))
            }
            Expr::Call { callee, args } => {
                let function = self.eval(callee, scope)?;
                let args = self.eval_list(args, scope)?;
                if !function.is_callable() && !matches!(function, Value::Namespace(_)) {
                    return Err(type_error(format!(
                        "{} is not a function",
                        callee_text(callee)
                    )));
                }
                self.call_function(&function, args)
            }
            Expr::New { callee, args } => {
                let function = self.eval(callee, scope)?;
                let args = self.eval_list(args, scope)?;
                let constructible = function.is_callable()
                    || matches!(function, Value::Namespace(Namespace::Array));
                if !constructible {
                    return Err(type_error(format!(
                        "{} is not a constructor",
                        callee_text(callee)
                    )));
                }
                self.call_function(&function, args)
            }
            Expr::Function(def) => Ok(Value::Closure(Rc::new(Closure {
                def: Rc::clone(def),
                env: Rc::clone(scope),
            }))),
            Expr::Spread(_) => Err(Abrupt::Fatal(ExecutionError::Syntax(
                "Unexpected token '...'".to_string(),
            ))),
            Expr::Unary { op, operand } => {
                if *op == UnaryOp::TypeOf
                    && let Expr::Ident(name) = operand.as_ref()
                {
                    let value = self.lookup(name, scope).unwrap_or(Value::Undefined);
                    return Ok(Value::str(value.type_of()));
                }
                let value = self.eval(operand, scope)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::BitNot => Value::Number(f64::from(!value::to_int32(value.to_number()))),
                    UnaryOp::TypeOf => Value::str(value.type_of()),
                })
            }
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let old = self.eval(target, scope)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.assign(target, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, scope)?;
                let r = self.eval(right, scope)?;
                binary(*op, &l, &r, self.max_string_length)
            }
            Expr::Logical { op, left, right } => {
                let l = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !l.truthy(),
                    LogicalOp::Or => l.truthy(),
                    LogicalOp::Nullish => !l.is_nullish(),
                };
                if short_circuit {
                    Ok(l)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Assign { op, target, value } => {
                let value = match op {
                    None => self.eval(value, scope)?,
                    Some(op) => {
                        let current = self.eval(target, scope)?;
                        let rhs = self.eval(value, scope)?;
                        binary(*op, &current, &rhs, self.max_string_length)?
                    }
                };
                self.assign(target, value.clone(), scope)?;
                Ok(value)
            }
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
        }
    }

    fn lookup(&self, name: &str, scope: &Rc<Scope>) -> Eval<Value> {
        scope
            .lookup(name)
            .or_else(|| builtins::global(name))
            .ok_or_else(|| throw("ReferenceError", format!("{name} is not defined")))
    }

    fn eval_list(&mut self, exprs: &[Expr], scope: &Rc<Scope>) -> Eval<Vec<Value>> {
        let mut out = Vec::with_capacity(exprs.len());
        for expr in exprs {
            match expr {
                Expr::Spread(inner) => {
                    let value = self.eval(inner, scope)?;
                    out.extend(iterate(value)?);
                    self.check_array_length(out.len())?;
                }
                other => out.push(self.eval(other, scope)?),
            }
        }
        Ok(out)
    }

    fn assign(&mut self, target: &Expr, value: Value, scope: &Rc<Scope>) -> Eval<()> {
        match target {
            Expr::Ident(name) => scope.assign(name, value),
            Expr::Member {
                object, property, ..
            } => {
                let object = self.eval(object, scope)?;
                let key = property_key(&self.eval(property, scope)?);
                self.set_property(&object, &key, value)
            }
            _ => Err(Abrupt::Fatal(ExecutionError::Syntax(
                "Invalid left-hand side in assignment".to_string(),
            ))),
        }
    }

    fn set_property(&self, target: &Value, key: &str, value: Value) -> Eval<()> {
        match target {
            Value::Undefined | Value::Null => Err(type_error(format!(
                "Cannot set properties of {} (setting '{key}')",
                target.to_display_string()
            ))),
            Value::Array(items) => {
                if key == "length" {
                    let len = value.to_number();
                    if len < 0.0 || len.fract() != 0.0 || len > self.max_array_length as f64 {
                        return Err(throw("RangeError", "Invalid array length"));
                    }
                    items.borrow_mut().resize(len as usize, Value::Undefined);
                } else if let Some(index) = array_index(key) {
                    self.check_array_length(index + 1)?;
                    let mut items = items.borrow_mut();
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                }
                Ok(())
            }
            Value::Object(props) => {
                let mut props = props.borrow_mut();
                match props.iter_mut().find(|(k, _)| k == key) {
                    Some(slot) => slot.1 = value,
                    None => props.push((key.to_string(), value)),
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Property read with JavaScript-like semantics for the supported types.
fn get_property(target: &Value, key: &str) -> Eval<Value> {
    match target {
        Value::Undefined | Value::Null => Err(type_error(format!(
            "Cannot read properties of {} (reading '{key}')",
            target.to_display_string()
        ))),
        Value::Array(items) => {
            if key == "length" {
                return Ok(Value::Number(items.borrow().len() as f64));
            }
            if let Some(index) = array_index(key) {
                return Ok(items.borrow().get(index).cloned().unwrap_or(Value::Undefined));
            }
            Ok(builtins::method(target, key).unwrap_or(Value::Undefined))
        }
        Value::Str(s) => {
            if key == "length" {
                return Ok(Value::Number(s.chars().count() as f64));
            }
            if let Some(index) = array_index(key) {
                return Ok(s
                    .chars()
                    .nth(index)
                    .map_or(Value::Undefined, |c| Value::str(&c.to_string())));
            }
            Ok(builtins::method(target, key).unwrap_or(Value::Undefined))
        }
        Value::Object(_) => Ok(target
            .own_property(key)
            .or_else(|| builtins::method(target, key))
            .unwrap_or(Value::Undefined)),
        Value::Number(_) => Ok(builtins::method(target, key).unwrap_or(Value::Undefined)),
        Value::Namespace(ns) => Ok(builtins::namespace_member(*ns, key)),
        Value::Closure(closure) if key == "name" => Ok(Value::str(closure.name())),
        Value::Native(native) if key == "name" => Ok(Value::str(native.name)),
        _ => Ok(Value::Undefined),
    }
}

fn iterate(value: Value) -> Eval<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.borrow().clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::str(&c.to_string())).collect()),
        other => Err(type_error(format!(
            "{} is not iterable",
            other.to_display_string()
        ))),
    }
}

fn property_key(key: &Value) -> String {
    key.to_display_string()
}

fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

fn binary(op: BinaryOp, l: &Value, r: &Value, max_string_length: usize) -> Eval<Value> {
    use std::cmp::Ordering;

    let num = |f: fn(f64, f64) -> f64| Value::Number(f(l.to_number(), r.to_number()));
    let int = |f: fn(i32, u32) -> i32| {
        let (a, b) = (value::to_int32(l.to_number()), value::to_uint32(r.to_number()));
        Value::Number(f64::from(f(a, b)))
    };
    let ord = |accept: fn(Ordering) -> bool| {
        Value::Bool(value::compare(l, r).is_some_and(accept))
    };
    Ok(match op {
        BinaryOp::Add => value::add(l, r, max_string_length)?,
        BinaryOp::Sub => num(|a, b| a - b),
        BinaryOp::Mul => num(|a, b| a * b),
        BinaryOp::Div => num(|a, b| a / b),
        BinaryOp::Rem => num(|a, b| a % b),
        BinaryOp::Pow => num(value::pow),
        BinaryOp::Lt => ord(|o| o == Ordering::Less),
        BinaryOp::LtEq => ord(|o| o != Ordering::Greater),
        BinaryOp::Gt => ord(|o| o == Ordering::Greater),
        BinaryOp::GtEq => ord(|o| o != Ordering::Less),
        BinaryOp::Eq => Value::Bool(value::loose_equals(l, r)),
        BinaryOp::NotEq => Value::Bool(!value::loose_equals(l, r)),
        BinaryOp::StrictEq => Value::Bool(value::strict_equals(l, r)),
        BinaryOp::StrictNotEq => Value::Bool(!value::strict_equals(l, r)),
        BinaryOp::BitAnd => int(|a, b| a & b as i32),
        BinaryOp::BitOr => int(|a, b| a | b as i32),
        BinaryOp::BitXor => int(|a, b| a ^ b as i32),
        // Shift counts use the low five bits, as `wrapping_sh*` does.
        BinaryOp::Shl => int(i32::wrapping_shl),
        BinaryOp::Shr => int(i32::wrapping_shr),
        BinaryOp::UShr => {
            let a = value::to_uint32(l.to_number());
            Value::Number(f64::from(a.wrapping_shr(value::to_uint32(r.to_number()))))
        }
    })
}

fn callee_text(callee: &Expr) -> String {
    match callee {
        Expr::Ident(name) => name.clone(),
        Expr::Member {
            object, property, ..
        } => match property.as_ref() {
            Expr::Str(name) => format!("{}.{name}", callee_text(object)),
            _ => format!("{}[...]", callee_text(object)),
        },
        Expr::Call { callee, .. } => format!("{}(...)", callee_text(callee)),
        _ => "expression".to_string(),
    }
}

/// Collects `var` names declared anywhere in `body` outside nested functions.
fn collect_var_names(body: &[Stmt], names: &mut Vec<String>) {
    for stmt in body {
        match stmt {
            Stmt::Declare {
                kind: DeclKind::Var,
                declarators,
            } => names.extend(declarators.iter().map(|(name, _)| name.clone())),
            Stmt::ForOf {
                kind: DeclKind::Var,
                name,
                body,
                ..
            } => {
                names.push(name.clone());
                collect_var_names(std::slice::from_ref(body.as_ref()), names);
            }
            Stmt::Block(inner) => collect_var_names(inner, names),
            Stmt::If {
                consequent,
                alternate,
                ..
            } => {
                collect_var_names(std::slice::from_ref(consequent.as_ref()), names);
                if let Some(alternate) = alternate {
                    collect_var_names(std::slice::from_ref(alternate.as_ref()), names);
                }
            }
            Stmt::For { init, body, .. } => {
                if let Some(init) = init {
                    collect_var_names(std::slice::from_ref(init.as_ref()), names);
                }
                collect_var_names(std::slice::from_ref(body.as_ref()), names);
            }
            Stmt::ForOf { body, .. } | Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => {
                collect_var_names(std::slice::from_ref(body.as_ref()), names)
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                collect_var_names(block, names);
                for inner in [handler, finalizer].into_iter().flatten() {
                    collect_var_names(inner, names);
                }
            }
            Stmt::Switch { cases, .. } => {
                for case in cases {
                    collect_var_names(&case.body, names);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::parser::parse_program;

    fn run_with(src: &str, config: &SandboxConfig) -> Result<Value, ExecutionError> {
        let program = parse_program(src)?;
        Interpreter::new(config).run(&program)
    }

    fn run(src: &str) -> Result<Value, ExecutionError> {
        run_with(src, &SandboxConfig::default())
    }

    fn number(src: &str) -> f64 {
        match run(src) {
            Ok(Value::Number(n)) => n,
            other => panic!("expected number from {src:?}, got {other:?}"),
        }
    }

    fn text(src: &str) -> String {
        match run(src) {
            Ok(value) => value.to_display_string(),
            Err(e) => panic!("{src:?} failed: {e}"),
        }
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(number("return 2 + 3 * 4;"), 14.0);
        assert_eq!(number("return 2 ** 3 ** 2;"), 512.0);
        assert_eq!(number("return (1 + 2) * 3 % 4;"), 1.0);
        assert_eq!(number("return (-2) ** 2 === 4 ? 1 : 0"), 1.0);
    }

    #[test]
    fn test_loops_and_closures() {
        assert_eq!(
            number("let s = 0; for (let i = 1; i <= 10; i++) { s += i; } return s;"),
            55.0
        );
        assert_eq!(
            number("const make = () => { let c = 0; return () => ++c; }; const f = make(); f(); f(); return f();"),
            3.0
        );
        assert_eq!(
            number("let n = 0; while (true) { n++; if (n > 4) break; } return n;"),
            5.0
        );
        assert_eq!(number("let i = 0; do { i += 2; } while (i < 7); return i;"), 8.0);
    }

    #[test]
    fn test_function_hoisting_and_recursion() {
        let src = "return fact(5);\nfunction fact(n) { return n <= 1 ? 1 : n * fact(n - 1); }";
        assert_eq!(number(src), 120.0);
    }

    #[test]
    fn test_binomial_probability() {
        let src = r#"
            function choose(n, k) {
              let r = 1;
              for (let i = 1; i <= k; i++) r = r * (n - k + i) / i;
              return r;
            }
            let p = 0;
            for (let k = 7; k <= 10; k++) p += choose(10, k) / Math.pow(2, 10);
            return p;
        "#;
        assert!((number(src) - 176.0 / 1024.0).abs() < 1e-12);
    }

    #[test]
    fn test_array_methods() {
        assert_eq!(
            number("return [1, 2, 3, 4].filter(x => x % 2 === 0).map(x => x * 10).reduce((a, b) => a + b, 0);"),
            60.0
        );
        assert_eq!(text("return [3, 1, 2].sort((a, b) => a - b).join('-');"), "1-2-3");
        assert_eq!(text("return [10, 9, 1].sort().join();"), "1,10,9");
        assert_eq!(
            number("return Array.from({length: 5}, (_, i) => i * i).slice(-2)[0];"),
            9.0
        );
        assert_eq!(number("const a = []; a.push(1, 2); a[4] = 5; return a.length;"), 5.0);
        assert_eq!(text("return [...[1, 2], 3].concat([4]).includes(4);"), "true");
    }

    #[test]
    fn test_string_behaviour() {
        assert_eq!(text("return 'a' + 1 + 2;"), "a12");
        assert_eq!(text("return `x=${1 + 1}`.toUpperCase();"), "X=2");
        assert_eq!(text("return 'a,b,c'.split(',').length + '';"), "3");
        assert_eq!(text("return (0.1 + 0.2).toFixed(2);"), "0.30");
    }

    #[test]
    fn test_object_literals_and_access() {
        assert_eq!(
            number("const o = { a: 1, b: { c: 2 } }; o.d = 3; return o.a + o.b.c + o['d'];"),
            6.0
        );
        assert_eq!(text("return Object.keys({ x: 1, y: 2 }).join('');"), "xy");
        assert_eq!(text("return JSON.stringify({ a: [1, 2], b: 'x' });"), r#"{"a":[1,2],"b":"x"}"#);
        assert_eq!(text("const o = null; return o?.x ?? 'none';"), "none");
    }

    #[test]
    fn test_thrown_errors() {
        let err = run("throw new Error('x');").unwrap_err();
        assert_eq!(err, ExecutionError::Thrown("x".to_string()));

        let err = run("throw 'plain';").unwrap_err();
        assert_eq!(err.to_string(), "plain");

        let err = run("return missing + 1;").unwrap_err();
        assert_eq!(err.to_string(), "missing is not defined");

        let err = run("let u; return u.foo;").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot read properties of undefined (reading 'foo')"
        );

        let err = run("const c = 1; c = 2;").unwrap_err();
        assert_eq!(err.to_string(), "Assignment to constant variable.");

        let err = run("const o = {}; o.nope();").unwrap_err();
        assert_eq!(err.to_string(), "o.nope is not a function");
    }

    #[test]
    fn test_try_catch_finally() {
        assert_eq!(
            text("try { null.x; } catch (e) { return e.name + ': ' + e.message; }"),
            "TypeError: Cannot read properties of null (reading 'x')"
        );
        assert_eq!(
            number("let n = 0; try { throw 1; } catch (e) { n = e; } finally { n += 10; } return n;"),
            11.0
        );
    }

    #[test]
    fn test_switch_fallthrough() {
        let src = "let r = ''; switch (2) { case 1: r += 'a'; case 2: r += 'b'; case 3: r += 'c'; break; default: r += 'd'; } return r;";
        assert_eq!(text(src), "bc");
        assert_eq!(text("switch (9) { case 1: return 'a'; default: return 'z'; }"), "z");
    }

    #[test]
    fn test_typeof_and_equality() {
        assert_eq!(text("return typeof undeclared;"), "undefined");
        assert_eq!(text("return typeof Math.sqrt;"), "function");
        assert_eq!(text("return [1 == '1', 1 === '1', null == undefined];"), "true,false,true");
    }

    #[test]
    fn test_var_hoisting() {
        assert_eq!(text("if (true) { var v = 3; } return v;"), "3");
        assert_eq!(text("return typeof later; var later = 1;"), "undefined");
    }

    #[test]
    fn test_step_budget_stops_infinite_loop() {
        let config = SandboxConfig {
            step_budget: 10_000,
            ..SandboxConfig::default()
        };
        let err = run_with("while (true) {}", &config).unwrap_err();
        assert_eq!(err, ExecutionError::BudgetExceeded(10_000));
    }

    #[test]
    fn test_budget_is_not_catchable() {
        let config = SandboxConfig {
            step_budget: 5_000,
            ..SandboxConfig::default()
        };
        let err = run_with("try { for (;;) {} } catch (e) { return 1; }", &config).unwrap_err();
        assert!(err.is_limit());
    }

    #[test]
    fn test_call_depth_limit() {
        let config = SandboxConfig {
            max_call_depth: 32,
            ..SandboxConfig::default()
        };
        let err = run_with("function f(n) { return f(n + 1); } return f(0);", &config).unwrap_err();
        assert_eq!(err, ExecutionError::StackOverflow);
    }

    #[test]
    fn test_default_and_rest_params() {
        assert_eq!(number("const f = (a, b = 10) => a + b; return f(1);"), 11.0);
        assert_eq!(
            number("function sum(...xs) { return xs.reduce((a, b) => a + b, 0); } return sum(1, 2, 3);"),
            6.0
        );
    }

    #[test]
    fn test_let_loop_closures_capture_each_iteration() {
        let src = "const fs = []; for (let i = 0; i < 3; i++) { fs.push(() => i); } return fs.map(f => f()).join(',');";
        assert_eq!(text(src), "0,1,2");
        let src = "const fs = []; for (var i = 0; i < 3; i++) { fs.push(() => i); } return fs.map(f => f()).join(',');";
        assert_eq!(text(src), "3,3,3");
        let src = "const fs = []; for (let i = 0; i < 5; i++) { fs.push(() => i); i++; } return fs.map(f => f()).join(',');";
        assert_eq!(text(src), "1,3,5");
    }

    #[test]
    fn test_bitwise_operators() {
        assert_eq!(number("return 7 >> 1;"), 3.0);
        assert_eq!(number("return 5.7 | 0;"), 5.0);
        assert_eq!(number("return -1 >>> 0;"), 4_294_967_295.0);
        assert_eq!(number("return ~5;"), -6.0);
        assert_eq!(number("return 1 << 31;"), -2_147_483_648.0);
        assert_eq!(number("return -16 >> 2;"), -4.0);
        assert_eq!(number("return 6 & 3;"), 2.0);
        assert_eq!(number("return 6 ^ 3;"), 5.0);
        assert_eq!(number("return 1 << 33;"), 2.0);
        assert_eq!(number("let x = 4; x |= 1; x <<= 2; return x;"), 20.0);
        assert_eq!(number("let mask = 0; for (let i = 0; i < 4; i++) mask |= 1 << i; return mask;"), 15.0);
    }

    #[test]
    fn test_array_constructor() {
        assert_eq!(text("return new Array(3).fill(0).join(',');"), "0,0,0");
        assert_eq!(number("return Array(2).length;"), 2.0);
        assert_eq!(text("return new Array(1, 2, 3).join('-');"), "1-2-3");
        assert_eq!(text("return typeof Array;"), "function");

        let err = run("return new Array(-1);").unwrap_err();
        assert_eq!(err.to_string(), "Invalid array length");

        let config = SandboxConfig {
            max_array_length: 10,
            ..SandboxConfig::default()
        };
        let err = run_with("return new Array(11);", &config).unwrap_err();
        assert_eq!(err.to_string(), "Invalid array length");
    }

    #[test]
    fn test_string_length_limit() {
        let config = SandboxConfig::default().with_max_string_length(1024);
        let err = run_with("let s = 'x'; while (true) s += s;", &config).unwrap_err();
        assert_eq!(err, ExecutionError::Thrown("Invalid string length".to_string()));

        for src in [
            "let s = 'ab'; while (true) s = `${s}${s}`;",
            "return 'x'.repeat(2000);",
            "return 'x'.padStart(2000, '-');",
            "return new Array(600).fill('ab').join('');",
            "return JSON.stringify(new Array(600).fill('ab'));",
        ] {
            let err = run_with(src, &config).unwrap_err();
            assert_eq!(err.to_string(), "Invalid string length", "{src}");
        }

        assert_eq!(
            text("try { 'x'.repeat(1e9); } catch (e) { return e.name; }"),
            "RangeError"
        );
    }

    #[test]
    fn test_padding() {
        assert_eq!(text("return '7'.padStart(3, '0');"), "007");
        assert_eq!(text("return 'ab'.padEnd(5, 'xy');"), "abxyx");
        assert_eq!(text("return 'abc'.padStart(2);"), "abc");
        assert_eq!(text("return '1'.padStart(3);"), "  1");
    }

    #[test]
    fn test_steps_are_counted() {
        let program = parse_program("return 1 + 1;").unwrap();
        let mut interp = Interpreter::new(&SandboxConfig::default());
        interp.run(&program).unwrap();
        assert!(interp.steps() > 0);
    }
}
