//! Statement execution.
//!
//! Control flow is signal-driven: `break`/`continue`/`exit` set the
//! context's signal register, which is checked after every statement and on
//! every loop-condition re-check; unwinding never skips the checks that
//! clear or forward a signal. Guest exceptions travel as the `Raised`
//! marker error with the value in the context's active-exception slot.

use crate::ast::{Expr, Stmt};
use crate::error::ExecError;
use crate::symbol::Symbol;
use crate::value::Value;

use super::context::ControlSignal;
use super::Interpreter;

impl Interpreter {
    /// Execute a statement list, draining statement temporaries and pending
    /// destructors between statements.
    pub fn exec_block(&mut self, stmts: &[Stmt]) -> Result<(), ExecError> {
        for stmt in stmts {
            let result = self.exec_stmt(stmt);
            let boundary = self.statement_boundary();
            result?;
            boundary?;
            if self.ctx.signalled() {
                break;
            }
        }
        Ok(())
    }

    pub fn exec_stmt(&mut self, stmt: &Stmt) -> Result<(), ExecError> {
        match stmt {
            Stmt::Block(stmts) => {
                self.ctx.push_scope();
                let result = self.exec_block(stmts);
                let owned = self.ctx.pop_scope();
                for value in &owned {
                    self.abandon(value);
                }
                result
            }
            Stmt::VarDecl {
                name,
                type_name,
                init,
            } => {
                let zero = match type_name {
                    Some(t) => self.registry.zero_value(t)?,
                    None => Value::Nil,
                };
                self.declare_adopted(Symbol::new(name), zero);
                if let Some(init) = init {
                    let value = self.eval(init)?;
                    let from_index = matches!(init, Expr::Index { .. });
                    self.assign_simple(name, value, from_index)?;
                }
                Ok(())
            }
            Stmt::Assign { target, value } => {
                let v = self.eval(value)?;
                let from_index = matches!(value, Expr::Index { .. });
                self.assign_value(target, v, from_index)
            }
            Stmt::CompoundAssign { target, op, value } => {
                self.compound_assign(target, *op, value)
            }
            Stmt::Expr(expr) => self.eval(expr).map(|_| ()),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_condition(cond, "if")? {
                    self.exec_stmt(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmt(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::While { cond, body } => self.exec_while(cond, body),
            Stmt::Repeat { body, until } => self.exec_repeat(body, until),
            Stmt::For {
                var,
                from,
                to,
                downto,
                body,
            } => self.exec_for(var, from, to, *downto, body),
            Stmt::Break => {
                self.ctx.set_signal(ControlSignal::Break);
                Ok(())
            }
            Stmt::Continue => {
                self.ctx.set_signal(ControlSignal::Continue);
                Ok(())
            }
            Stmt::Exit(value) => {
                if let Some(expr) = value {
                    let v = self.eval(expr)?;
                    if self.ctx.is_declared("result") {
                        let from_index = matches!(expr, Expr::Index { .. });
                        self.assign_simple("Result", v, from_index)?;
                    }
                }
                self.ctx.set_signal(ControlSignal::Exit);
                Ok(())
            }
            Stmt::Raise(value) => match value {
                Some(expr) => {
                    let v = self.eval(expr)?;
                    self.set_exception(v);
                    Err(ExecError::Raised)
                }
                None => {
                    // Bare raise: rethrow the exception being handled.
                    let Some(current) = self.ctx.handler_exception.clone() else {
                        return Err(ExecError::unsupported("no exception to re-raise"));
                    };
                    self.set_exception(current);
                    Err(ExecError::Raised)
                }
            },
            Stmt::Try {
                body,
                except,
                finally,
            } => self.exec_try(body, except.as_ref(), finally.as_deref()),
        }
    }

    fn eval_condition(&mut self, cond: &Expr, construct: &str) -> Result<bool, ExecError> {
        let value = self.eval(cond)?;
        value.as_bool().ok_or_else(|| {
            ExecError::type_mismatch(construct, value.type_name(), "Boolean")
        })
    }

    fn exec_while(&mut self, cond: &Expr, body: &Stmt) -> Result<(), ExecError> {
        loop {
            if !self.eval_condition(cond, "while")? {
                break;
            }
            self.exec_stmt(body)?;
            self.statement_boundary()?;
            match self.ctx.signal() {
                ControlSignal::Break => {
                    self.ctx.clear_signal();
                    break;
                }
                ControlSignal::Continue => self.ctx.clear_signal(),
                ControlSignal::Exit | ControlSignal::Return => break,
                ControlSignal::None => {}
            }
        }
        Ok(())
    }

    fn exec_repeat(&mut self, body: &[Stmt], until: &Expr) -> Result<(), ExecError> {
        loop {
            self.exec_block(body)?;
            match self.ctx.signal() {
                ControlSignal::Break => {
                    self.ctx.clear_signal();
                    break;
                }
                ControlSignal::Continue => self.ctx.clear_signal(),
                ControlSignal::Exit | ControlSignal::Return => break,
                ControlSignal::None => {}
            }
            if self.eval_condition(until, "repeat")? {
                break;
            }
        }
        Ok(())
    }

    fn exec_for(
        &mut self,
        var: &str,
        from: &Expr,
        to: &Expr,
        downto: bool,
        body: &Stmt,
    ) -> Result<(), ExecError> {
        let from_value = self.eval(from)?;
        let start = from_value.as_int().ok_or_else(|| {
            ExecError::type_mismatch("for", from_value.type_name(), "Integer")
        })?;
        let to_value = self.eval(to)?;
        let stop = to_value.as_int().ok_or_else(|| {
            ExecError::type_mismatch("for", to_value.type_name(), "Integer")
        })?;

        self.ctx.push_scope();
        let slot = self.ctx.declare(Symbol::new(var), Value::Int(start));
        let mut i = start;
        let result = loop {
            let proceed = if downto { i >= stop } else { i <= stop };
            if !proceed {
                break Ok(());
            }
            *slot.borrow_mut() = Value::Int(i);
            if let Err(e) = self.exec_stmt(body) {
                break Err(e);
            }
            if let Err(e) = self.statement_boundary() {
                break Err(e);
            }
            match self.ctx.signal() {
                ControlSignal::Break => {
                    self.ctx.clear_signal();
                    break Ok(());
                }
                ControlSignal::Continue => self.ctx.clear_signal(),
                ControlSignal::Exit | ControlSignal::Return => break Ok(()),
                ControlSignal::None => {}
            }
            let next = if downto {
                i.checked_sub(1)
            } else {
                i.checked_add(1)
            };
            match next {
                Some(n) => i = n,
                None => break Ok(()),
            }
        };
        let owned = self.ctx.pop_scope();
        for value in &owned {
            self.abandon(value);
        }
        result
    }

    fn exec_try(
        &mut self,
        body: &[Stmt],
        except: Option<&crate::ast::ExceptClause>,
        finally: Option<&[Stmt]>,
    ) -> Result<(), ExecError> {
        let mut result = self.exec_block(body);

        if let Err(e) = &result {
            if e.is_raised() {
                if let Some(clause) = except {
                    // Take ownership of the in-flight exception and expose
                    // it to the handler (and to bare re-raise).
                    let exc = self.ctx.exception.take().unwrap_or(Value::Nil);
                    let saved_handler = self.ctx.handler_exception.take();
                    self.refs.retain_value(&exc);
                    self.ctx.handler_exception = Some(exc.clone());

                    self.ctx.push_scope();
                    if let Some(name) = &clause.binding {
                        self.declare_adopted(Symbol::new(name), exc.clone());
                    }
                    let handled = self.exec_block(&clause.body);
                    let owned = self.ctx.pop_scope();
                    for value in &owned {
                        self.abandon(value);
                    }

                    if let Some(h) = self.ctx.handler_exception.take() {
                        self.refs.release_value(&h);
                    }
                    self.ctx.handler_exception = saved_handler;
                    self.refs.release_value(&exc);

                    result = handled;
                }
            }
        }

        if let Some(fin) = finally {
            // finally runs on every path; a pending signal is parked so the
            // block executes fully, then restored unless it set its own.
            let saved_signal = self.ctx.signal();
            self.ctx.clear_signal();
            let fin_result = self.exec_block(fin);
            if self.ctx.signal() == ControlSignal::None {
                self.ctx.set_signal(saved_signal);
            }
            if fin_result.is_err() {
                result = fin_result;
            }
        }

        result
    }

    /// Park a guest exception in the active slot, taking a reference so it
    /// survives the statement temporaries being drained during unwinding.
    pub(crate) fn set_exception(&mut self, value: Value) {
        self.refs.retain_value(&value);
        if let Some(old) = self.ctx.exception.replace(value) {
            self.refs.release_value(&old);
        }
    }

    /// Take the unhandled exception value after a failed run, keeping it
    /// alive for the host.
    pub fn take_exception(&mut self) -> Option<Value> {
        let value = self.ctx.exception.take()?;
        // The slot's reference transfers to the escaped list.
        self.escaped.push(value.clone());
        Some(value)
    }
}
