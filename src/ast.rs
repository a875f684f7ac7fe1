//! AST for the guest language.
//!
//! The crate has no lexer or parser: a front end (or the embedding host)
//! produces these nodes directly, already type-validated. Shared bodies use
//! `Rc` so routines and getter expressions can be referenced from metadata
//! without cloning statement trees.

use std::fmt;
use std::rc::Rc;

/// A literal value appearing directly in the AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Bool(bool),
    /// Enum member literal: type name plus ordinal.
    Enum { type_name: Rc<str>, ordinal: i64 },
}

/// Binary operators. Application semantics live in the evaluator; the AST
/// only names the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Floating-point division (`/`).
    Div,
    /// Integer division (`div`).
    IntDiv,
    /// Integer remainder (`mod`).
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => f.write_str("-"),
            UnaryOp::Not => f.write_str("not"),
        }
    }
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Identifier reference: a variable, a routine, a class name, or (in
    /// method context) an implicit-Self field or property.
    Ident(Rc<str>),
    /// The current receiver inside a method, getter, or destructor.
    SelfRef,
    /// `object.name` member access.
    Member { object: Box<Expr>, name: Rc<str> },
    /// `base[i, j, ...]` indexing: arrays, strings, indexed properties, or
    /// an object's default property.
    Index { base: Box<Expr>, indices: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Routine or method call. The callee is an `Ident` (free routine or
    /// routine-valued variable) or a `Member` (method on a receiver).
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// Constructor invocation: `TPoint.Create(...)` spelled as a node.
    New { class_name: Rc<str>, args: Vec<Expr> },
    /// Array literal. Adopts static bounds from a declared target type,
    /// otherwise builds a dynamic array.
    ArrayLit(Vec<Expr>),
}

impl Expr {
    pub fn nil() -> Expr {
        Expr::Literal(Literal::Nil)
    }

    pub fn int(v: i64) -> Expr {
        Expr::Literal(Literal::Int(v))
    }

    pub fn float(v: f64) -> Expr {
        Expr::Literal(Literal::Float(v))
    }

    pub fn str(v: impl Into<Rc<str>>) -> Expr {
        Expr::Literal(Literal::Str(v.into()))
    }

    pub fn bool(v: bool) -> Expr {
        Expr::Literal(Literal::Bool(v))
    }

    pub fn enum_lit(type_name: impl Into<Rc<str>>, ordinal: i64) -> Expr {
        Expr::Literal(Literal::Enum {
            type_name: type_name.into(),
            ordinal,
        })
    }

    pub fn ident(name: impl Into<Rc<str>>) -> Expr {
        Expr::Ident(name.into())
    }

    pub fn member(object: Expr, name: impl Into<Rc<str>>) -> Expr {
        Expr::Member {
            object: Box::new(object),
            name: name.into(),
        }
    }

    pub fn index(base: Expr, indices: Vec<Expr>) -> Expr {
        Expr::Index {
            base: Box::new(base),
            indices,
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            args,
        }
    }

    pub fn new_object(class_name: impl Into<Rc<str>>, args: Vec<Expr>) -> Expr {
        Expr::New {
            class_name: class_name.into(),
            args,
        }
    }
}

/// `except` clause of a try statement. A `None` binding leaves the caught
/// exception reachable only through a bare `raise`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptClause {
    pub binding: Option<Rc<str>>,
    pub body: Vec<Stmt>,
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Nested block with its own scope.
    Block(Vec<Stmt>),
    /// Variable declaration. When `type_name` is given the variable starts
    /// at that type's zero value before any initializer is assigned.
    VarDecl {
        name: Rc<str>,
        type_name: Option<Rc<str>>,
        init: Option<Expr>,
    },
    /// `target := value`.
    Assign { target: Expr, value: Expr },
    /// `target op= value` (read-modify-write).
    CompoundAssign {
        target: Expr,
        op: BinaryOp,
        value: Expr,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While { cond: Expr, body: Box<Stmt> },
    Repeat { body: Vec<Stmt>, until: Expr },
    For {
        var: Rc<str>,
        from: Expr,
        to: Expr,
        downto: bool,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    /// Exit the current routine, optionally setting its result.
    Exit(Option<Expr>),
    /// Raise an exception value; a bare `raise` re-raises the exception
    /// currently being handled.
    Raise(Option<Expr>),
    Try {
        body: Vec<Stmt>,
        except: Option<ExceptClause>,
        finally: Option<Vec<Stmt>>,
    },
}

impl Stmt {
    pub fn assign(target: Expr, value: Expr) -> Stmt {
        Stmt::Assign { target, value }
    }

    pub fn compound(target: Expr, op: BinaryOp, value: Expr) -> Stmt {
        Stmt::CompoundAssign { target, op, value }
    }

    pub fn var(name: impl Into<Rc<str>>, type_name: Option<&str>, init: Option<Expr>) -> Stmt {
        Stmt::VarDecl {
            name: name.into(),
            type_name: type_name.map(Rc::from),
            init,
        }
    }
}

/// Parameter passing mode. A `ByRef` parameter shares the caller's slot, so
/// writes inside the callee are visible to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    ByValue,
    ByRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Rc<str>,
    pub mode: ParamMode,
    pub type_name: Option<Rc<str>>,
}

impl Param {
    pub fn by_value(name: impl Into<Rc<str>>) -> Param {
        Param {
            name: name.into(),
            mode: ParamMode::ByValue,
            type_name: None,
        }
    }

    pub fn by_ref(name: impl Into<Rc<str>>) -> Param {
        Param {
            name: name.into(),
            mode: ParamMode::ByRef,
            type_name: None,
        }
    }
}

/// A free routine or a method body. Functions declare a `result_type` and
/// get an implicit `Result` local; procedures leave it `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    pub name: Rc<str>,
    pub params: Vec<Param>,
    pub result_type: Option<Rc<str>>,
    pub body: Vec<Stmt>,
}

impl Routine {
    pub fn procedure(name: impl Into<Rc<str>>, params: Vec<Param>, body: Vec<Stmt>) -> Routine {
        Routine {
            name: name.into(),
            params,
            result_type: None,
            body,
        }
    }

    pub fn function(
        name: impl Into<Rc<str>>,
        params: Vec<Param>,
        result_type: impl Into<Rc<str>>,
        body: Vec<Stmt>,
    ) -> Routine {
        Routine {
            name: name.into(),
            params,
            result_type: Some(result_type.into()),
            body,
        }
    }
}

/// A runnable program: a statement list executed in a fresh top-level scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}

impl Program {
    pub fn new(body: Vec<Stmt>) -> Program {
        Program { body }
    }
}
