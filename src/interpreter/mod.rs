//! Tree-walking interpreter for the guest AST.
//!
//! The [`Interpreter`] owns the type registry, the conversion table, the
//! reference-count manager, and the execution context; the submodules
//! contribute the evaluator, statement executor, assignment dispatch
//! engine, and property access subsystem as `impl Interpreter` blocks.

pub mod assign;
pub mod context;
pub mod eval;
pub mod exec;
pub mod property;
pub mod stack;

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{ParamMode, Routine};
use crate::convert::{Conversion, ConversionFn, Conversions, MAX_CHAIN_HOPS};
use crate::error::ExecError;
use crate::meta::Registry;
use crate::rc::RefCounts;
use crate::symbol::{Symbol, fold};
use crate::value::{CheapClone, ObjectRef, SlotRef, Value};

pub use context::{Binding, ControlSignal, ExecContext};
pub use stack::{CallStack, DEFAULT_MAX_DEPTH, StackFrame};

/// An argument prepared for a routine call: a plain value for by-value
/// parameters, or the caller's storage slot for `var` parameters.
pub enum CallArg {
    Value(Value),
    ByRef(SlotRef),
}

struct DestructorEntry {
    class: Symbol,
    routine: Rc<Routine>,
}

/// The interpreter state.
pub struct Interpreter {
    pub registry: Registry,
    pub conversions: Conversions,
    pub refs: RefCounts,
    pub ctx: ExecContext,
    /// Free routines registered by the host/front end.
    routines: FxHashMap<Symbol, Rc<Routine>>,
    /// Per-call-frame temporaries holding a reference until the enclosing
    /// statement completes. The base frame belongs to the program run.
    temps: Vec<Vec<Value>>,
    /// Values returned to the host that must stay referenced until released.
    escaped: Vec<Value>,
    /// Serializes destructor draining so cascades never stack.
    draining: bool,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Interpreter::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Create an interpreter with a custom call-depth limit.
    pub fn with_max_depth(max_depth: usize) -> Interpreter {
        Interpreter {
            registry: Registry::new(),
            conversions: Conversions::new(),
            refs: RefCounts::new(),
            ctx: ExecContext::new(max_depth),
            routines: FxHashMap::default(),
            temps: vec![Vec::new()],
            escaped: Vec::new(),
            draining: false,
        }
    }

    // ── Host surface ──────────────────────────────────────────────────────

    pub fn register_routine(&mut self, routine: Routine) {
        self.routines
            .insert(Symbol::new(&routine.name), Rc::new(routine));
    }

    pub fn routine(&self, name: &str) -> Option<Rc<Routine>> {
        self.routines.get(fold(name).as_str()).cloned()
    }

    /// Define a global variable, adopting any references the value carries.
    pub fn define_global(&mut self, name: &str, value: Value) {
        self.adopt(&value);
        self.ctx.declare_global(Symbol::new(name), value);
    }

    /// Define a host-bound global: readable from scripts, not assignable.
    pub fn define_external(&mut self, name: &str, value: Value) {
        self.adopt(&value);
        self.ctx.declare_external(Symbol::new(name), value);
    }

    /// Current value of a variable visible from the current scope.
    pub fn get_var(&self, name: &str) -> Option<Value> {
        let binding = self.ctx.lookup(name)?;
        let mut value = binding.slot.borrow().clone();
        while let Value::Ref(slot) = value {
            value = slot.borrow().clone();
        }
        Some(value)
    }

    /// Release every value previously escaped to the host via
    /// [`Interpreter::eval_expr`].
    pub fn release_escaped(&mut self) -> Result<(), ExecError> {
        let escaped = std::mem::take(&mut self.escaped);
        for value in &escaped {
            self.refs.release_value(value);
        }
        self.drain_destructors()
    }

    // ── Reference adoption ────────────────────────────────────────────────

    /// Adopt a value into a storage location: retain the references it
    /// carries, including those duplicated inside value-semantic containers.
    pub(crate) fn adopt(&mut self, value: &Value) {
        self.refs.retain_value(value);
        self.refs.retain_contained(value);
    }

    /// Mirror of [`Interpreter::adopt`], for a value leaving its location.
    pub(crate) fn abandon(&mut self, value: &Value) {
        self.refs.release_value(value);
        self.refs.release_contained(value);
    }

    pub(crate) fn declare_adopted(&mut self, name: Symbol, value: Value) {
        self.adopt(&value);
        self.ctx.declare(name, value);
    }

    // ── Temporaries ───────────────────────────────────────────────────────

    /// Hold a reference to an expression temporary until the enclosing
    /// statement completes (constructor results, routine results).
    pub(crate) fn note_temp(&mut self, value: &Value) {
        self.refs.retain_value(value);
        if let Some(frame) = self.temps.last_mut() {
            frame.push(value.cheap_clone());
        }
    }

    fn push_temp_frame(&mut self) {
        self.temps.push(Vec::new());
    }

    fn pop_temp_frame(&mut self) {
        if let Some(frame) = self.temps.pop() {
            for value in &frame {
                self.refs.release_value(value);
            }
        }
    }

    /// Release the current statement's temporaries and run any destructors
    /// that became due. Called between statements, never mid-expression.
    pub(crate) fn statement_boundary(&mut self) -> Result<(), ExecError> {
        if let Some(frame) = self.temps.last_mut() {
            let drained = std::mem::take(frame);
            for value in &drained {
                self.refs.release_value(value);
            }
        }
        self.drain_destructors()
    }

    // ── Destructors ───────────────────────────────────────────────────────

    /// Run destructors for every object whose count reached zero. Cascading
    /// releases inside a destructor queue more work; the loop picks it up
    /// without re-entering (the `draining` flag keeps nested statement
    /// boundaries from starting a second drain).
    pub(crate) fn drain_destructors(&mut self) -> Result<(), ExecError> {
        if self.draining {
            return Ok(());
        }
        self.draining = true;
        let result = self.drain_destructors_inner();
        self.draining = false;
        result
    }

    fn drain_destructors_inner(&mut self) -> Result<(), ExecError> {
        while self.refs.has_pending() {
            for obj in self.refs.take_pending() {
                self.destroy_object(obj)?;
            }
        }
        Ok(())
    }

    fn destroy_object(&mut self, obj: ObjectRef) -> Result<(), ExecError> {
        tracing::debug!(class = %obj.class_name(), "destroying instance");
        if let Some(entry) = self.find_destructor(obj.class_name()) {
            self.call_routine(
                &entry.routine,
                Some(Value::Object(obj.cheap_clone())),
                Some(entry.class),
                Vec::new(),
            )?;
        }
        // Cascade: every reference held by the dead object's fields is gone.
        let fields: Vec<Value> = obj.fields_mut().drain(..).map(|(_, v)| v).collect();
        for value in &fields {
            self.abandon(value);
        }
        Ok(())
    }

    fn find_destructor(&self, class: &Symbol) -> Option<DestructorEntry> {
        let mut current = self.registry.class(class.key());
        while let Some(info) = current {
            if let Some(name) = &info.destructor {
                if let Some(routine) = self.registry.class_method(info.name.key(), name.key()) {
                    return Some(DestructorEntry {
                        class: info.name.clone(),
                        routine,
                    });
                }
            }
            if let Some(routine) = info.methods.get("destroy") {
                return Some(DestructorEntry {
                    class: info.name.clone(),
                    routine: routine.clone(),
                });
            }
            current = info
                .parent
                .as_ref()
                .and_then(|p| self.registry.class(p.key()));
        }
        None
    }

    // ── Calls ─────────────────────────────────────────────────────────────

    /// Invoke a routine or method body: frame push with overflow detection,
    /// fresh lexical scope, parameter binding, receiver/current-class
    /// save-restore, and result extraction from the implicit `Result`.
    #[tracing::instrument(level = "debug", skip_all, fields(routine = %routine.name))]
    pub(crate) fn call_routine(
        &mut self,
        routine: &Rc<Routine>,
        receiver: Option<Value>,
        class: Option<Symbol>,
        args: Vec<CallArg>,
    ) -> Result<Value, ExecError> {
        if args.len() != routine.params.len() {
            return Err(ExecError::ArgumentCountMismatch {
                routine: routine.name.to_string(),
                expected: routine.params.len(),
                got: args.len(),
            });
        }

        let frame = match &class {
            Some(c) => StackFrame::method(c, &routine.name),
            None => StackFrame::routine(&routine.name),
        };
        self.ctx.stack.push(frame)?;
        self.push_temp_frame();
        let guard = self.ctx.push_routine_scope();
        let saved_receiver = self.ctx.receiver.take();
        let saved_class = self.ctx.current_class.take();
        self.ctx.receiver = receiver;
        self.ctx.current_class = class;

        let run = self.bind_params_and_run(routine, args);

        // Extract the function result before the scope goes away.
        let result = if routine.result_type.is_some() {
            self.ctx
                .lookup("result")
                .map(|b| b.slot.borrow().clone())
                .unwrap_or(Value::Nil)
        } else {
            Value::Nil
        };
        // Keep the result alive across the scope teardown.
        self.refs.retain_value(&result);

        let owned = self.ctx.restore_scope(guard);
        for value in &owned {
            self.abandon(value);
        }
        self.ctx.receiver = saved_receiver;
        self.ctx.current_class = saved_class;
        self.pop_temp_frame();
        self.ctx.stack.pop();

        // The result reference now belongs to the caller's statement.
        if let Some(frame) = self.temps.last_mut() {
            frame.push(result.cheap_clone());
        } else {
            self.refs.release_value(&result);
        }

        // A routine boundary consumes exit and absorbs stray loop signals.
        match self.ctx.signal() {
            ControlSignal::Exit | ControlSignal::Break | ControlSignal::Continue => {
                self.ctx.clear_signal();
            }
            _ => {}
        }

        run.map(|()| result)
    }

    fn bind_params_and_run(
        &mut self,
        routine: &Rc<Routine>,
        args: Vec<CallArg>,
    ) -> Result<(), ExecError> {
        for (param, arg) in routine.params.iter().zip(args) {
            let name = Symbol::new(&param.name);
            match (param.mode, arg) {
                (ParamMode::ByValue, CallArg::Value(v)) => {
                    let v = v.copy_semantics();
                    self.declare_adopted(name, v);
                }
                (ParamMode::ByValue, CallArg::ByRef(slot)) => {
                    let v = slot.borrow().clone().copy_semantics();
                    self.declare_adopted(name, v);
                }
                (ParamMode::ByRef, CallArg::ByRef(slot)) => {
                    self.ctx.declare(name, Value::Ref(slot));
                }
                (ParamMode::ByRef, CallArg::Value(_)) => {
                    return Err(ExecError::unsupported(format!(
                        "argument for var parameter '{}' of '{}' must be assignable",
                        param.name, routine.name
                    )));
                }
            }
        }

        if let Some(result_type) = &routine.result_type {
            let zero = self
                .registry
                .zero_value(result_type)
                .unwrap_or(Value::Nil);
            self.declare_adopted(Symbol::new("Result"), zero);
        }

        self.exec_block(&routine.body)
    }

    // ── Implicit conversion ───────────────────────────────────────────────

    /// Try to convert a value to the named target type. Returns the
    /// (possibly converted) value and whether a conversion applied. A
    /// conversion function that errors counts as "conversion not found";
    /// the original value is returned and nothing propagates.
    pub fn try_convert(&mut self, value: Value, target_type: &str) -> (Value, bool) {
        let source_type = value.type_name();
        if fold(&source_type) == fold(target_type) {
            return (value, false);
        }

        if let Some(conv) = self.conversions.find_direct(&source_type, target_type) {
            return match self.apply_conversion(&conv, &value) {
                Ok(converted) => (converted, true),
                Err(_) => {
                    self.swallow_conversion_error();
                    (value, false)
                }
            };
        }

        if let Some(chain) = self
            .conversions
            .find_chain(&source_type, target_type, MAX_CHAIN_HOPS)
        {
            let mut current = value.cheap_clone();
            for conv in &chain {
                match self.apply_conversion(conv, &current) {
                    Ok(next) => current = next,
                    Err(_) => {
                        self.swallow_conversion_error();
                        return (value, false);
                    }
                }
            }
            tracing::trace!(
                from = %source_type,
                to = %target_type,
                hops = chain.len(),
                "applied conversion chain"
            );
            return (current, true);
        }

        if let Some(widened) = crate::convert::builtin_widening(&value, target_type) {
            return (widened, true);
        }

        (value, false)
    }

    fn apply_conversion(&mut self, conv: &Conversion, value: &Value) -> Result<Value, ExecError> {
        match &conv.func {
            ConversionFn::Native(f) => f(value),
            ConversionFn::Routine(routine) => self.call_routine(
                routine,
                None,
                None,
                vec![CallArg::Value(value.cheap_clone())],
            ),
        }
    }

    /// A failed optional conversion must leave no guest exception behind.
    fn swallow_conversion_error(&mut self) {
        if let Some(old) = self.ctx.exception.take() {
            self.refs.release_value(&old);
        }
    }

    // ── Program entry ─────────────────────────────────────────────────────

    /// Execute a program body. Top-level declarations land in the global
    /// scope and persist across runs, so the host can read results back;
    /// inner blocks still get their own scopes.
    pub fn run_program(&mut self, program: &crate::ast::Program) -> Result<(), ExecError> {
        self.push_temp_frame();
        let run = self.exec_block(&program.body);
        if self.ctx.signal() == ControlSignal::Exit {
            // `exit` at the program level unwinds to the program boundary.
            self.ctx.set_signal(ControlSignal::Return);
        }
        self.pop_temp_frame();
        let drained = self.drain_destructors();
        self.ctx.clear_signal();
        run.and(drained)
    }

    /// Evaluate a single expression. Any references the result carries stay
    /// alive until [`Interpreter::release_escaped`].
    pub fn eval_expr(&mut self, expr: &crate::ast::Expr) -> Result<Value, ExecError> {
        self.push_temp_frame();
        let result = self.eval(expr);
        if let Ok(value) = &result {
            self.refs.retain_value(value);
            self.escaped.push(value.cheap_clone());
        }
        self.pop_temp_frame();
        self.drain_destructors()?;
        result
    }
}
