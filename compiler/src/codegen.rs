// codegen.rs — Code emission for the Fill List node
//
// Produces the node's contribution to the generated program: one statement
// building the padding sequence and one concatenating it with the input list.
// Statements are structured (`Stmt`/`Expr`) and render to text via `Display`.
//
// Preconditions: `node` is a fill node of `graph`.
// Postconditions: returns exactly two statements, binding `fillList` and then
//   the node's list output variable.
// Failure modes: a copy expression that cannot be resolved does not fail the
//   emission; it yields `CopyResolution::Shared(SharedReason::Unresolved)` and
//   the padding slots reuse the element value.
// Side effects: none (logs a warning on the sharing fallback).

use std::fmt;

use log::warn;

use crate::diag::{codes, Diagnostic};
use crate::graph::{NodeGraph, Port};
use crate::id::NodeId;
use crate::node::FillMode;
use crate::ports::PortRole;
use crate::registry::{sha256_hex, CopyError, CopyExpr, Registry};

/// Variable holding the padding sequence.
pub const FILL_LIST_VAR: &str = "fillList";

// ── Statement IR ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(String),
    Int(i64),
    /// Independent copy of a variable's value.
    Copy { expr: CopyExpr, var: String },
    Len(Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Max(Box<Expr>, Box<Expr>),
    /// `count` evaluations of `element`, in order.
    Repeat { element: Box<Expr>, count: Box<Expr> },
    /// Order-preserving list concatenation.
    Concat(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn var(name: &str) -> Expr {
        Expr::Var(name.to_string())
    }

    fn is_binary(&self) -> bool {
        matches!(self, Expr::Sub(..) | Expr::Concat(..))
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_binary() {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(name) => f.write_str(name),
            Expr::Int(n) => write!(f, "{}", n),
            Expr::Copy { expr, var } => f.write_str(&expr.apply(var)),
            Expr::Len(e) => write!(f, "len({})", e),
            Expr::Sub(a, b) => {
                a.fmt_operand(f)?;
                f.write_str(" - ")?;
                b.fmt_operand(f)
            }
            Expr::Max(a, b) => write!(f, "max({}, {})", a, b),
            Expr::Repeat { element, count } => write!(f, "repeat({}, {})", element, count),
            Expr::Concat(a, b) => {
                a.fmt_operand(f)?;
                f.write_str(" ++ ")?;
                b.fmt_operand(f)
            }
        }
    }
}

/// `target = value`
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub target: String,
    pub value: Expr,
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.target, self.value)
    }
}

// ── Copy resolution ─────────────────────────────────────────────────────────

/// Why padding slots share the element value instead of copying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedReason {
    /// Value type; sharing is safe.
    Immutable,
    /// No copy expression could be obtained. Mutable element values alias
    /// across every padding slot.
    Unresolved(CopyError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyResolution {
    Copy(CopyExpr),
    Shared(SharedReason),
}

impl CopyResolution {
    /// True when the padding may alias a mutable value.
    pub fn may_alias(&self) -> bool {
        matches!(self, CopyResolution::Shared(SharedReason::Unresolved(_)))
    }
}

/// Ask the registry how to copy values arriving on the element port.
pub fn resolve_copy(element: Option<&Port>, registry: &Registry) -> CopyResolution {
    let result = match element {
        Some(port) => registry.copy_expression_for(port),
        None => Err(CopyError::UnknownSocket(PortRole::ElementIn.name().to_string())),
    };
    match result {
        Ok(Some(expr)) => CopyResolution::Copy(expr),
        Ok(None) => CopyResolution::Shared(SharedReason::Immutable),
        Err(e) => {
            warn!("{}; padding will share one element value", e);
            CopyResolution::Shared(SharedReason::Unresolved(e))
        }
    }
}

// ── Emission ────────────────────────────────────────────────────────────────

/// Variable names the statements bind and read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bindings {
    pub length: String,
    pub in_list: String,
    pub element: String,
    pub out_list: String,
}

impl Default for Bindings {
    fn default() -> Self {
        Bindings {
            length: PortRole::Length.name().to_string(),
            in_list: PortRole::ListIn.name().to_string(),
            element: PortRole::ElementIn.name().to_string(),
            out_list: PortRole::ListOut.name().to_string(),
        }
    }
}

/// The statements for one node, with the copy decision they were built on.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedCode {
    pub statements: Vec<Stmt>,
    pub copy: CopyResolution,
}

impl EmittedCode {
    /// One statement per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for stmt in &self.statements {
            out.push_str(&stmt.to_string());
            out.push('\n');
        }
        out
    }

    /// SHA-256 of the rendered code; changes whenever the code does.
    pub fn fingerprint(&self) -> String {
        sha256_hex(self.render().as_bytes())
    }
}

/// Emit the statements of fill node `node`.
pub fn emit(graph: &NodeGraph, node: NodeId, registry: &Registry) -> Result<EmittedCode, Diagnostic> {
    let fill = graph.fill_node(node).ok_or_else(|| {
        Diagnostic::error(codes::NOT_A_FILL_NODE, "only Fill List nodes emit fill code")
            .with_subject(format!("node {}", node))
    })?;

    let port = |role: PortRole| graph.find_port(node, role.direction(), role.name());
    let bindings = Bindings::default();
    let copy = resolve_copy(port(PortRole::ElementIn), registry);
    let statements = emit_statements(fill.mode(), &copy, &bindings);
    Ok(EmittedCode { statements, copy })
}

/// Build the two statements for `mode` over `bindings`.
pub fn emit_statements(mode: FillMode, copy: &CopyResolution, bindings: &Bindings) -> Vec<Stmt> {
    let element = match copy {
        CopyResolution::Copy(expr) => Expr::Copy {
            expr: expr.clone(),
            var: bindings.element.clone(),
        },
        CopyResolution::Shared(_) => Expr::var(&bindings.element),
    };
    let missing = Expr::Sub(
        Box::new(Expr::var(&bindings.length)),
        Box::new(Expr::Len(Box::new(Expr::var(&bindings.in_list)))),
    );
    let fill_list = Stmt {
        target: FILL_LIST_VAR.to_string(),
        value: Expr::Repeat {
            element: Box::new(element),
            count: Box::new(Expr::Max(Box::new(missing), Box::new(Expr::Int(0)))),
        },
    };

    let (first, second) = match mode {
        FillMode::Prepend => (FILL_LIST_VAR, bindings.in_list.as_str()),
        FillMode::Append => (bindings.in_list.as_str(), FILL_LIST_VAR),
    };
    let out_list = Stmt {
        target: bindings.out_list.clone(),
        value: Expr::Concat(Box::new(Expr::var(first)), Box::new(Expr::var(second))),
    };

    vec![fill_list, out_list]
}

// ── Tests ───────────────────────────────────────────────────────────────────
