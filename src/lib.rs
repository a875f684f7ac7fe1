//! Execution core for a Pascal-family scripting language, designed for
//! embedding in applications.
//!
//! The crate takes a pre-validated AST (there is no lexer or parser here)
//! and executes it with guest-language semantics: reference-counted objects
//! with deterministic destructors, interfaces, value-semantic records,
//! static/dynamic arrays, subrange validation, properties with
//! field/method/expression accessors, and implicit conversions.
//!
//! # Example
//!
//! ```
//! use pasrun::ast::{Expr, Program, Stmt};
//! use pasrun::{Runtime, Value};
//!
//! let mut runtime = Runtime::new();
//! let program = Program::new(vec![
//!     Stmt::var("x", Some("Integer"), Some(Expr::int(2))),
//!     Stmt::compound(Expr::ident("x"), pasrun::ast::BinaryOp::Mul, Expr::int(21)),
//! ]);
//! runtime.run(&program).unwrap();
//! assert_eq!(runtime.get("x"), Some(Value::Int(42)));
//! ```

pub mod api;
pub mod ast;
pub mod convert;
pub mod error;
pub mod interpreter;
pub mod meta;
pub mod rc;
pub mod symbol;
pub mod value;

pub use convert::{ConversionFn, Conversions};
pub use error::ExecError;
pub use interpreter::{ControlSignal, ExecContext, Interpreter};
pub use meta::{
    ClassInfo, EnumInfo, InterfaceInfo, PropertyAccess, PropertyInfo, RecordInfo, Registry,
};
pub use rc::RefCounts;
pub use symbol::Symbol;
pub use value::{CheapClone, Value};

/// The main runtime for executing guest programs: a thin facade over
/// [`Interpreter`] for hosts that only need to load declarations, run, and
/// read results back.
pub struct Runtime {
    interpreter: Interpreter,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Runtime {
        Runtime {
            interpreter: Interpreter::new(),
        }
    }

    /// Full access to the interpreter: registry, conversions, globals.
    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// Execute a program in a fresh top-level scope.
    pub fn run(&mut self, program: &ast::Program) -> Result<(), ExecError> {
        self.interpreter.run_program(program)
    }

    /// Evaluate one expression against the current global state.
    pub fn eval(&mut self, expr: &ast::Expr) -> Result<Value, ExecError> {
        self.interpreter.eval_expr(expr)
    }

    /// Read a variable left behind by a program run.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.interpreter.get_var(name)
    }
}
