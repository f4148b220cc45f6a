// eval.rs — Reference interpreter for emitted statements
//
// Executes `Stmt` sequences over an environment of runtime values. Mutable
// data (vectors, matrices, splines, ...) is modelled as `Value::Ref`, a shared
// cell; cloning a `Ref` aliases it, while a copy expression produces a fresh
// cell. This makes the difference between copied and shared padding
// observable.
//
// Preconditions: every variable read by a statement is bound in the
//   environment or by an earlier statement.
// Postconditions: each statement's target is bound to its value.
// Failure modes: unbound variables and operand type mismatches → `EvalError`.
// Side effects: mutates the environment.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::codegen::{Expr, Stmt};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    /// Mutable value behind a shared cell.
    Ref(Rc<RefCell<Value>>),
    List(Vec<Value>),
}

impl Value {
    pub fn shared(inner: Value) -> Value {
        Value::Ref(Rc::new(RefCell::new(inner)))
    }

    /// Duplicate without sharing any cell with `self`.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Ref(cell) => Value::shared(cell.borrow().deep_copy()),
            Value::List(items) => Value::List(items.iter().map(Value::deep_copy).collect()),
            other => other.clone(),
        }
    }

    /// True when both values are the same shared cell.
    pub fn aliases(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Ref(a), Value::Ref(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Text(_) => "text",
            Value::Ref(_) => "reference",
            Value::List(_) => "list",
        }
    }
}

pub type Env = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    Unbound(String),
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Unbound(name) => write!(f, "unbound variable '{}'", name),
            EvalError::TypeMismatch {
                op,
                expected,
                found,
            } => write!(f, "{}: expected {}, found {}", op, expected, found),
        }
    }
}

impl std::error::Error for EvalError {}

/// Run `stmts` in order, binding each target in `env`.
pub fn execute(stmts: &[Stmt], env: &mut Env) -> Result<(), EvalError> {
    for stmt in stmts {
        let value = eval(&stmt.value, env)?;
        env.insert(stmt.target.clone(), value);
    }
    Ok(())
}

pub fn eval(expr: &Expr, env: &Env) -> Result<Value, EvalError> {
    match expr {
        Expr::Var(name) => lookup(name, env).cloned(),
        Expr::Int(n) => Ok(Value::Int(*n)),
        Expr::Copy { var, .. } => Ok(lookup(var, env)?.deep_copy()),
        Expr::Len(e) => {
            let items = as_list("len", eval(e, env)?)?;
            Ok(Value::Int(items.len() as i64))
        }
        Expr::Sub(a, b) => {
            let a = as_int("-", eval(a, env)?)?;
            let b = as_int("-", eval(b, env)?)?;
            Ok(Value::Int(a.saturating_sub(b)))
        }
        Expr::Max(a, b) => {
            let a = as_int("max", eval(a, env)?)?;
            let b = as_int("max", eval(b, env)?)?;
            Ok(Value::Int(a.max(b)))
        }
        Expr::Repeat { element, count } => {
            let count = as_int("repeat", eval(count, env)?)?.max(0);
            // Grows as elements are produced; `count` may be huge.
            let items = (0..count)
                .map(|_| eval(element, env))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(items))
        }
        Expr::Concat(a, b) => {
            let mut items = as_list("++", eval(a, env)?)?;
            items.extend(as_list("++", eval(b, env)?)?);
            Ok(Value::List(items))
        }
    }
}

fn lookup<'a>(name: &str, env: &'a Env) -> Result<&'a Value, EvalError> {
    env.get(name)
        .ok_or_else(|| EvalError::Unbound(name.to_string()))
}

fn as_int(op: &'static str, value: Value) -> Result<i64, EvalError> {
    match value {
        Value::Int(n) => Ok(n),
        Value::Bool(b) => Ok(b as i64),
        other => Err(EvalError::TypeMismatch {
            op,
            expected: "integer",
            found: other.type_name(),
        }),
    }
}

fn as_list(op: &'static str, value: Value) -> Result<Vec<Value>, EvalError> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(EvalError::TypeMismatch {
            op,
            expected: "list",
            found: other.type_name(),
        }),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
