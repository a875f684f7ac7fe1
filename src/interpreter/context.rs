//! Execution context: variable environment, control-flow signaling,
//! exception slots, and the property-recursion guard.
//!
//! One context exists per logical script invocation. Scopes are lexically
//! nested with push/pop discipline; bindings live in shared slots so
//! by-reference parameters and write-back targets alias the same storage.
//! The control-flow signal is explicit state checked after every statement,
//! never an unwinding exception.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::ExecError;
use crate::symbol::{Symbol, fold};
use crate::value::{CheapClone, SlotRef, Value, new_slot};

use super::stack::CallStack;

/// Structured control-flow signal. `Break`/`Continue` unwind to the nearest
/// loop, `Exit` to the routine boundary, `Return` to the program boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlSignal {
    #[default]
    None,
    Break,
    Continue,
    Exit,
    Return,
}

/// A variable binding: a shared storage slot plus the host-bound marker.
/// Writing through an external binding is unsupported.
#[derive(Clone)]
pub struct Binding {
    pub slot: SlotRef,
    pub external: bool,
}

struct Scope {
    bindings: FxHashMap<Symbol, Binding>,
    parent: Option<ScopeRef>,
}

type ScopeRef = Rc<RefCell<Scope>>;

fn new_scope(parent: Option<ScopeRef>) -> ScopeRef {
    Rc::new(RefCell::new(Scope {
        bindings: FxHashMap::default(),
        parent,
    }))
}

/// Per-invocation execution state threaded through the whole engine.
pub struct ExecContext {
    globals: ScopeRef,
    scope: ScopeRef,
    pub stack: CallStack,
    signal: ControlSignal,
    /// Exception currently propagating (set by `raise`, cleared by a
    /// handler or the host boundary).
    pub exception: Option<Value>,
    /// Exception being handled by the innermost `except` block, kept for
    /// bare re-`raise`.
    pub handler_exception: Option<Value>,
    /// Ordered list of property names currently being evaluated, used to
    /// detect recursive property access.
    property_chain: Vec<Symbol>,
    /// The receiver (`Self`) of the innermost method/accessor frame.
    pub receiver: Option<Value>,
    /// Declaring class of the innermost method frame, for class-var and
    /// class-const fallback resolution.
    pub current_class: Option<Symbol>,
}

impl ExecContext {
    pub fn new(max_depth: usize) -> ExecContext {
        let globals = new_scope(None);
        ExecContext {
            scope: globals.clone(),
            globals,
            stack: CallStack::new(max_depth),
            signal: ControlSignal::None,
            exception: None,
            handler_exception: None,
            property_chain: Vec::new(),
            receiver: None,
            current_class: None,
        }
    }

    // ── Scopes ────────────────────────────────────────────────────────────

    pub fn push_scope(&mut self) {
        self.scope = new_scope(Some(self.scope.cheap_clone()));
    }

    /// Pop the current scope, returning the values it owned so the caller
    /// can release the references they carried. The global scope is never
    /// popped.
    pub fn pop_scope(&mut self) -> Vec<Value> {
        let parent = self.scope.borrow().parent.as_ref().map(CheapClone::cheap_clone);
        let Some(parent) = parent else {
            return Vec::new();
        };
        let owned: Vec<Value> = self
            .scope
            .borrow()
            .bindings
            .values()
            .map(|b| b.slot.borrow().clone())
            .collect();
        self.scope = parent;
        owned
    }

    /// Enter a routine body: a fresh scope chained to the globals (not the
    /// caller's locals; lexical scoping for free routines and methods).
    pub fn push_routine_scope(&mut self) -> ScopeGuard {
        let saved = self.scope.cheap_clone();
        self.scope = new_scope(Some(self.globals.cheap_clone()));
        ScopeGuard { saved }
    }

    pub fn restore_scope(&mut self, guard: ScopeGuard) -> Vec<Value> {
        let owned: Vec<Value> = self
            .scope
            .borrow()
            .bindings
            .values()
            .map(|b| b.slot.borrow().clone())
            .collect();
        self.scope = guard.saved;
        owned
    }

    // ── Bindings ──────────────────────────────────────────────────────────

    /// Declare a variable in the current scope, returning its slot.
    pub fn declare(&mut self, name: Symbol, value: Value) -> SlotRef {
        let slot = new_slot(value);
        self.scope.borrow_mut().bindings.insert(
            name,
            Binding {
                slot: slot.cheap_clone(),
                external: false,
            },
        );
        slot
    }

    /// Declare a variable in the global scope, regardless of the current
    /// scope depth.
    pub fn declare_global(&mut self, name: Symbol, value: Value) -> SlotRef {
        let slot = new_slot(value);
        self.globals.borrow_mut().bindings.insert(
            name,
            Binding {
                slot: slot.cheap_clone(),
                external: false,
            },
        );
        slot
    }

    /// Declare a host-bound (external) variable: readable, not assignable.
    pub fn declare_external(&mut self, name: Symbol, value: Value) {
        let slot = new_slot(value);
        self.scope.borrow_mut().bindings.insert(
            name,
            Binding {
                slot,
                external: true,
            },
        );
    }

    /// Bind a name directly to an existing slot (by-reference parameters).
    pub fn bind_slot(&mut self, name: Symbol, slot: SlotRef) {
        self.scope.borrow_mut().bindings.insert(
            name,
            Binding {
                slot,
                external: false,
            },
        );
    }

    /// Look a name up through the lexical scope chain.
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        let key = fold(name);
        let mut scope = Some(self.scope.cheap_clone());
        while let Some(s) = scope {
            if let Some(binding) = s.borrow().bindings.get(key.as_str()) {
                return Some(binding.clone());
            }
            scope = s.borrow().parent.as_ref().map(CheapClone::cheap_clone);
        }
        None
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    // ── Control-flow signal ───────────────────────────────────────────────

    pub fn signal(&self) -> ControlSignal {
        self.signal
    }

    pub fn set_signal(&mut self, signal: ControlSignal) {
        self.signal = signal;
    }

    pub fn clear_signal(&mut self) {
        self.signal = ControlSignal::None;
    }

    /// True when a signal is pending and statement execution must stop.
    pub fn signalled(&self) -> bool {
        self.signal != ControlSignal::None
    }

    // ── Property-recursion guard ──────────────────────────────────────────

    /// Push a property name onto the in-progress chain; detects circular
    /// property evaluation before any accessor work happens.
    pub fn enter_property(&mut self, name: &Symbol) -> Result<(), ExecError> {
        if self.property_chain.contains(name) {
            return Err(ExecError::CircularPropertyReference {
                property: name.as_str().to_owned(),
            });
        }
        self.property_chain.push(name.clone());
        Ok(())
    }

    /// Pop the most recent chain entry. Callers pop unconditionally,
    /// including on early error returns.
    pub fn leave_property(&mut self) {
        self.property_chain.pop();
    }

    pub fn property_chain_depth(&self) -> usize {
        self.property_chain.len()
    }
}

/// Saved scope handle returned by [`ExecContext::push_routine_scope`].
pub struct ScopeGuard {
    saved: ScopeRef,
}
