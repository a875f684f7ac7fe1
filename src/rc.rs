//! Guest-visible reference counting.
//!
//! The guest language defines observable destructor timing: an object is
//! destroyed exactly once, when its reference count transitions from one to
//! zero. Host `Rc` keeps the memory alive for the engine; this manager owns
//! the guest count stored intrusively on each [`ObjectInstance`] and queues
//! zero-count objects for destructor invocation. The interpreter drains the
//! queue, so destructor bodies (which may release further references) never
//! run re-entrantly inside a store.
//!
//! Invariant: across one assignment, retains and releases balance to exactly
//! the number of references created minus the number removed. Stores retain
//! the incoming reference before releasing the outgoing one, so a
//! self-assignment never passes through a transient zero.

use std::rc::Rc;

use crate::error::ExecError;
use crate::symbol::Symbol;
use crate::value::{ArrayKind, CheapClone, InterfaceInstance, ObjectRef, Value};

/// Tracks live references to reference-counted objects and interface
/// wrappers for one execution context's object graph.
#[derive(Default)]
pub struct RefCounts {
    /// Objects whose count reached zero, awaiting destructor invocation.
    pending: Vec<ObjectRef>,
}

impl RefCounts {
    pub fn new() -> RefCounts {
        RefCounts::default()
    }

    /// Adopt one new reference to an object.
    pub fn retain(&mut self, obj: &ObjectRef) {
        if obj.is_destroying() {
            return;
        }
        obj.set_ref_count(obj.ref_count() + 1);
    }

    /// Drop one reference to an object. At zero the object is queued for
    /// destruction; the `destroying` latch keeps cascading releases from
    /// queueing (or re-entering) it twice.
    pub fn release(&mut self, obj: &ObjectRef) {
        if obj.is_destroying() {
            return;
        }
        let count = obj.ref_count();
        if count > 0 {
            obj.set_ref_count(count - 1);
        }
        if obj.ref_count() == 0 {
            obj.mark_destroying();
            tracing::debug!(class = %obj.class_name(), "reference count reached zero");
            self.pending.push(obj.cheap_clone());
        }
    }

    /// Retain whatever references the value carries: the object itself, an
    /// interface's underlying object, or a method pointer's bound receiver.
    pub fn retain_value(&mut self, value: &Value) {
        match value {
            Value::Object(obj) => self.retain(obj),
            Value::Interface(iface) => {
                if let Some(obj) = &iface.underlying {
                    self.retain(obj);
                }
            }
            Value::Routine(routine) => {
                if let Some(receiver) = &routine.receiver {
                    self.retain(receiver);
                }
            }
            Value::Variant(inner) => self.retain_value(inner),
            _ => {}
        }
    }

    /// Mirror of [`RefCounts::retain_value`].
    pub fn release_value(&mut self, value: &Value) {
        match value {
            Value::Object(obj) => self.release(obj),
            Value::Interface(iface) => {
                if let Some(obj) = &iface.underlying {
                    self.release(obj);
                }
            }
            Value::Routine(routine) => {
                if let Some(receiver) = &routine.receiver {
                    self.release(receiver);
                }
            }
            Value::Variant(inner) => self.release_value(inner),
            _ => {}
        }
    }

    /// Release the underlying object behind an interface wrapper.
    pub fn release_interface(&mut self, iface: &Rc<InterfaceInstance>) {
        if let Some(obj) = &iface.underlying {
            self.release(obj);
        }
    }

    /// Retain every reference reachable through a copied value-semantic
    /// container (record or static array): the copy duplicated each
    /// contained object/interface reference, so each one counts again.
    pub fn retain_contained(&mut self, value: &Value) {
        match value {
            Value::Record(rec) => {
                let fields: Vec<Value> = rec.fields().values().cloned().collect();
                for field in &fields {
                    self.retain_value(field);
                    self.retain_contained(field);
                }
            }
            Value::Array(arr) => {
                let elems: Vec<Value> = {
                    let arr = arr.borrow();
                    if matches!(arr.kind, ArrayKind::Static { .. }) {
                        arr.elems.clone()
                    } else {
                        Vec::new()
                    }
                };
                for elem in &elems {
                    self.retain_value(elem);
                    self.retain_contained(elem);
                }
            }
            _ => {}
        }
    }

    /// Mirror of [`RefCounts::retain_contained`], for a value-semantic
    /// container leaving its holder.
    pub fn release_contained(&mut self, value: &Value) {
        match value {
            Value::Record(rec) => {
                let fields: Vec<Value> = rec.fields().values().cloned().collect();
                for field in &fields {
                    self.release_value(field);
                    self.release_contained(field);
                }
            }
            Value::Array(arr) => {
                let elems: Vec<Value> = {
                    let arr = arr.borrow();
                    if matches!(arr.kind, ArrayKind::Static { .. }) {
                        arr.elems.clone()
                    } else {
                        Vec::new()
                    }
                };
                for elem in &elems {
                    self.release_value(elem);
                    self.release_contained(elem);
                }
            }
            _ => {}
        }
    }

    /// Wrap a value into a fresh interface instance, retaining the
    /// underlying object. Accepts an object, another interface (re-wrap of
    /// its underlying object), or nil (unset interface).
    pub fn wrap_in_interface(
        &mut self,
        interface_name: Symbol,
        value: &Value,
    ) -> Result<Rc<InterfaceInstance>, ExecError> {
        let underlying = match value {
            Value::Nil => None,
            Value::Object(obj) => Some(obj.cheap_clone()),
            Value::Interface(iface) => iface.underlying.as_ref().map(CheapClone::cheap_clone),
            other => {
                return Err(ExecError::type_mismatch(
                    ":=",
                    interface_name.as_str(),
                    other.type_name(),
                ));
            }
        };
        if let Some(obj) = &underlying {
            self.retain(obj);
        }
        Ok(Rc::new(InterfaceInstance {
            interface_name,
            underlying,
        }))
    }

    /// Take the zero-count objects queued since the last drain. The caller
    /// (interpreter) invokes destructors and releases each object's fields,
    /// which may queue more work.
    pub fn take_pending(&mut self) -> Vec<ObjectRef> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
