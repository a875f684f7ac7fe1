//! Assignment dispatch engine.
//!
//! The top-level decision tree for every assignable target shape: plain
//! variables (with implicit-Self, class-var, and property fallback),
//! by-reference parameters, object and record fields, class vars,
//! array/string elements, indexed properties, and default indexed
//! properties, plus the compound (`op=`) variants, which visit each
//! getter/setter at most once.
//!
//! All mutation funnels into [`Interpreter::store_to_place`], which applies
//! the write-side semantics in order: subrange validation, interface
//! re-wrapping, object reference adoption, implicit conversion, variant
//! boxing, copy-semantic cloning, and reference-count bookkeeping. The
//! incoming reference is retained before the outgoing one is released, so a
//! self-assignment never passes through a transient zero count.

use std::rc::Rc;

use crate::ast::{BinaryOp, Expr};
use crate::error::ExecError;
use crate::meta::ClassInfo;
use crate::symbol::Symbol;
use crate::value::{
    ArrayKind, ArrayRef, ArrayValue, CheapClone, ObjectRef, RecordRef, SlotRef, SubrangeValue,
    Value,
};

use super::Interpreter;
use super::eval::{flatten_index, index_as_int, string_char_at};

/// An assignable storage location, resolved ahead of the write.
pub(crate) enum Place {
    Slot(SlotRef),
    ObjectField(ObjectRef, Symbol),
    RecordField(RecordRef, Symbol),
    ClassVar(Rc<ClassInfo>, Symbol),
    ArrayElem(ArrayRef, usize),
}

impl Interpreter {
    // ── Entry points ──────────────────────────────────────────────────────

    /// Perform `target := value` for any target shape. `source_is_index`
    /// marks values read from an index expression, which keep their aliasing
    /// instead of being cloned (write-back for `row := matrix[i]`).
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn assign_value(
        &mut self,
        target: &Expr,
        value: Value,
        source_is_index: bool,
    ) -> Result<(), ExecError> {
        match target {
            Expr::Ident(name) => self.assign_simple(name, value, source_is_index),
            Expr::Member { object, name } => {
                self.assign_member(object, name, value, source_is_index)
            }
            Expr::Index { .. } => self.assign_index(target, value, source_is_index),
            other => Err(ExecError::unsupported(format!(
                "not an assignable target: {other:?}"
            ))),
        }
    }

    /// Compound assignment `target op= rhs`: read through the normal read
    /// path, evaluate `rhs` once, apply the operator, write through the
    /// normal write path. Getters and setters run at most once each.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn compound_assign(
        &mut self,
        target: &Expr,
        op: BinaryOp,
        rhs_expr: &Expr,
    ) -> Result<(), ExecError> {
        match target {
            Expr::Ident(name) => {
                let current = self.read_ident(name)?;
                let rhs = self.eval(rhs_expr)?;
                let combined = self.apply_binary(op, &current, &rhs)?;
                self.assign_simple(name, combined, false)
            }
            Expr::Member { object, name } => {
                let receiver = self.eval(object)?;
                if let Some(prop) = self.property_of(&receiver, name) {
                    let current = self.read_property(&receiver, &prop, &[])?;
                    let rhs = self.eval(rhs_expr)?;
                    let combined = self.apply_binary(op, &current, &rhs)?;
                    self.write_property(&receiver, &prop, &[], combined)?;
                    return Ok(());
                }
                let current = self.read_member_value(&receiver, name)?;
                let rhs = self.eval(rhs_expr)?;
                let combined = self.apply_binary(op, &current, &rhs)?;
                self.assign_member_resolved(&receiver, name, combined, false)
            }
            Expr::Index { .. } => self.compound_index(target, op, rhs_expr),
            other => Err(ExecError::unsupported(format!(
                "not an assignable target: {other:?}"
            ))),
        }
    }

    // ── Simple name targets ───────────────────────────────────────────────

    /// Assign to a bare name. Resolution order: environment binding (with
    /// by-reference dereferencing and the external-binding refusal), then
    /// implicit-Self field, class var, and property.
    pub fn assign_simple(
        &mut self,
        name: &str,
        value: Value,
        source_is_index: bool,
    ) -> Result<(), ExecError> {
        if let Some(binding) = self.ctx.lookup(name) {
            if binding.external {
                return Err(ExecError::UnsupportedExternalAssignment {
                    name: name.to_owned(),
                });
            }
            // A by-reference parameter writes through to the caller's slot.
            let mut slot = binding.slot;
            loop {
                let inner = match &*slot.borrow() {
                    Value::Ref(inner) => inner.cheap_clone(),
                    _ => break,
                };
                slot = inner;
            }
            return self.store_to_place(&Place::Slot(slot), value, source_is_index);
        }

        // Implicit-Self field.
        if let Some(receiver) = self.ctx.receiver.clone() {
            match &receiver {
                Value::Object(obj) => {
                    if obj.get_field(name).is_some() {
                        let place = Place::ObjectField(obj.cheap_clone(), Symbol::new(name));
                        return self.store_to_place(&place, value, source_is_index);
                    }
                }
                Value::Record(rec) => {
                    if rec.get_field(name).is_some() {
                        let place = Place::RecordField(rec.cheap_clone(), Symbol::new(name));
                        return self.store_to_place(&place, value, source_is_index);
                    }
                }
                _ => {}
            }
        }

        // Class var of the current class.
        if let Some(class) = self.ctx.current_class.clone() {
            if let Some(owner) = self.class_var_owner(&class, name) {
                let place = Place::ClassVar(owner, Symbol::new(name));
                return self.store_to_place(&place, value, source_is_index);
            }
        }

        // Property on the receiver (or the current class).
        if let Some(receiver) = self.ctx.receiver.clone() {
            if let Some(prop) = self.property_of(&receiver, name) {
                return self.write_property(&receiver, &prop, &[], value).map(|_| ());
            }
        }
        if let Some(class) = self.ctx.current_class.clone() {
            if let Some(prop) = self.registry.class_property(class.key(), name) {
                let receiver = self
                    .ctx
                    .receiver
                    .clone()
                    .unwrap_or(Value::Class(class));
                return self.write_property(&receiver, &prop, &[], value).map(|_| ());
            }
        }

        Err(ExecError::undefined(name))
    }

    // ── Member targets ────────────────────────────────────────────────────

    /// Assign to `object.name`. The object sub-expression is resolved as an
    /// assignable location when possible so that a nil record-typed array
    /// element can be auto-initialized before the write proceeds.
    pub fn assign_member(
        &mut self,
        object_expr: &Expr,
        name: &str,
        value: Value,
        source_is_index: bool,
    ) -> Result<(), ExecError> {
        let place = self.resolve_place(object_expr)?;
        let mut receiver = match &place {
            Some(p) => self.place_read(p),
            None => self.eval(object_expr)?,
        };

        // Mutation-through-nil recovery, deliberately narrow: only an
        // array-element location whose element type is a record type is
        // auto-initialized to a zero-valued record.
        if receiver.is_nil() {
            if let Some(p @ Place::ArrayElem(arr, _)) = &place {
                let elem_type = arr.borrow().elem_type.clone();
                if let Some(t) = elem_type {
                    if let Some(rec_info) = self.registry.record_info(t.key()) {
                        let zero = self.registry.zero_record(&rec_info)?;
                        self.adopt(&zero);
                        let old = self.place_read(p);
                        self.place_write_raw(p, zero.cheap_clone())?;
                        self.abandon(&old);
                        receiver = zero;
                    }
                }
            }
        }

        self.assign_member_resolved(&receiver, name, value, source_is_index)
    }

    /// Route a member write by the resolved receiver's kind.
    pub(crate) fn assign_member_resolved(
        &mut self,
        receiver: &Value,
        name: &str,
        value: Value,
        source_is_index: bool,
    ) -> Result<(), ExecError> {
        match receiver {
            Value::Record(rec) => {
                if let Some(prop) = self.registry.record_property(rec.type_name().key(), name) {
                    return self.write_property(receiver, &prop, &[], value).map(|_| ());
                }
                let place = Place::RecordField(rec.cheap_clone(), Symbol::new(name));
                self.store_to_place(&place, value, source_is_index)
            }
            Value::Interface(iface) => {
                // Properties declared on the interface dispatch before the
                // wrapper is unwrapped.
                if let Some(prop) = self
                    .registry
                    .interface_property(iface.interface_name.key(), name)
                {
                    return self.write_property(receiver, &prop, &[], value).map(|_| ());
                }
                match &iface.underlying {
                    Some(obj) => self.assign_member_resolved(
                        &Value::Object(obj.cheap_clone()),
                        name,
                        value,
                        source_is_index,
                    ),
                    None => Err(ExecError::MemberAssignmentUnsupported {
                        kind: "unset interface",
                        member: name.to_owned(),
                    }),
                }
            }
            Value::Object(obj) => {
                if let Some(prop) = self.registry.class_property(obj.class_name().key(), name) {
                    return self.write_property(receiver, &prop, &[], value).map(|_| ());
                }
                let place = Place::ObjectField(obj.cheap_clone(), Symbol::new(name));
                self.store_to_place(&place, value, source_is_index)
            }
            Value::Class(class) => {
                if let Some(owner) = self.class_var_owner(class, name) {
                    let place = Place::ClassVar(owner, Symbol::new(name));
                    return self.store_to_place(&place, value, source_is_index);
                }
                if let Some(prop) = self.registry.class_property(class.key(), name) {
                    return self.write_property(receiver, &prop, &[], value).map(|_| ());
                }
                Err(ExecError::MemberAssignmentUnsupported {
                    kind: "class",
                    member: format!("{class}.{name}"),
                })
            }
            Value::Variant(inner) => {
                self.assign_member_resolved(inner, name, value, source_is_index)
            }
            other => Err(ExecError::MemberAssignmentUnsupported {
                kind: kind_label(other),
                member: name.to_owned(),
            }),
        }
    }

    // ── Index targets ─────────────────────────────────────────────────────

    /// Assign to `base[i, j, ...]`: an indexed-property write when the
    /// flattened chain is rooted at a property member, otherwise
    /// array/string element indexing (with default-property fallback for
    /// object receivers).
    pub fn assign_index(
        &mut self,
        target: &Expr,
        value: Value,
        source_is_index: bool,
    ) -> Result<(), ExecError> {
        let (root, index_exprs) = flatten_index(target);
        if let Expr::Member { object, name } = root {
            let receiver = self.eval(object)?;
            if let Some(prop) = self.property_of(&receiver, name) {
                let indices = self.eval_indices(&index_exprs)?;
                return self
                    .write_property(&receiver, &prop, &indices, value)
                    .map(|_| ());
            }
        }
        self.write_indexed(root, &index_exprs, value, source_is_index)
    }

    fn write_indexed(
        &mut self,
        root: &Expr,
        index_exprs: &[&Expr],
        value: Value,
        source_is_index: bool,
    ) -> Result<(), ExecError> {
        let mut cur_place = self.resolve_place(root)?;
        let mut current = match &cur_place {
            Some(p) => self.place_read(p),
            None => self.eval(root)?,
        };
        let indices = self.eval_indices(index_exprs)?;
        let last = indices.len().saturating_sub(1);

        for (at, idx) in indices.iter().enumerate() {
            while let Value::Variant(inner) = current {
                current = *inner;
            }
            match &current {
                Value::Array(arr) => {
                    let index = index_as_int(idx)?;
                    let phys = arr
                        .borrow()
                        .physical_index(index)
                        .map_err(|(lo, hi)| ExecError::IndexOutOfBounds { index, lo, hi })?;
                    let place = Place::ArrayElem(arr.cheap_clone(), phys);
                    if at == last {
                        return self.store_to_place(&place, value, source_is_index);
                    }
                    let elem = arr.borrow().elems[phys].clone();
                    cur_place = Some(place);
                    current = elem;
                }
                Value::Str(s) => {
                    if at != last {
                        return Err(ExecError::NotIndexable {
                            type_name: "String".to_owned(),
                        });
                    }
                    let index = index_as_int(idx)?;
                    return self.write_string_char(cur_place, s, index, &value);
                }
                Value::Object(_) | Value::Interface(_) => {
                    let prop = self
                        .registry
                        .default_property_of(&current)
                        .ok_or_else(|| ExecError::NotIndexable {
                            type_name: current.type_name(),
                        })?;
                    let receiver = current.cheap_clone();
                    return self
                        .write_property(&receiver, &prop, &indices[at..], value)
                        .map(|_| ());
                }
                other => {
                    return Err(ExecError::NotIndexable {
                        type_name: other.type_name(),
                    });
                }
            }
        }
        Err(ExecError::unsupported("index assignment without indices"))
    }

    /// Read-modify-write for indexed targets, with every sub-expression and
    /// accessor evaluated exactly once.
    fn compound_index(
        &mut self,
        target: &Expr,
        op: BinaryOp,
        rhs_expr: &Expr,
    ) -> Result<(), ExecError> {
        let (root, index_exprs) = flatten_index(target);
        if let Expr::Member { object, name } = root {
            let receiver = self.eval(object)?;
            if let Some(prop) = self.property_of(&receiver, name) {
                let indices = self.eval_indices(&index_exprs)?;
                let current = self.read_property(&receiver, &prop, &indices)?;
                let rhs = self.eval(rhs_expr)?;
                let combined = self.apply_binary(op, &current, &rhs)?;
                return self
                    .write_property(&receiver, &prop, &indices, combined)
                    .map(|_| ());
            }
        }

        let mut cur_place = self.resolve_place(root)?;
        let mut current = match &cur_place {
            Some(p) => self.place_read(p),
            None => self.eval(root)?,
        };
        let indices = self.eval_indices(&index_exprs)?;
        let last = indices.len().saturating_sub(1);

        for (at, idx) in indices.iter().enumerate() {
            while let Value::Variant(inner) = current {
                current = *inner;
            }
            match &current {
                Value::Array(arr) => {
                    let index = index_as_int(idx)?;
                    let phys = arr
                        .borrow()
                        .physical_index(index)
                        .map_err(|(lo, hi)| ExecError::IndexOutOfBounds { index, lo, hi })?;
                    let place = Place::ArrayElem(arr.cheap_clone(), phys);
                    let elem = arr.borrow().elems[phys].clone();
                    if at == last {
                        let rhs = self.eval(rhs_expr)?;
                        let combined = self.apply_binary(op, &elem, &rhs)?;
                        return self.store_to_place(&place, combined, false);
                    }
                    cur_place = Some(place);
                    current = elem;
                }
                Value::Str(s) => {
                    if at != last {
                        return Err(ExecError::NotIndexable {
                            type_name: "String".to_owned(),
                        });
                    }
                    let index = index_as_int(idx)?;
                    let ch = Value::Str(string_char_at(s, index)?);
                    let rhs = self.eval(rhs_expr)?;
                    let combined = self.apply_binary(op, &ch, &rhs)?;
                    return self.write_string_char(cur_place, s, index, &combined);
                }
                Value::Object(_) | Value::Interface(_) => {
                    let prop = self
                        .registry
                        .default_property_of(&current)
                        .ok_or_else(|| ExecError::NotIndexable {
                            type_name: current.type_name(),
                        })?;
                    let receiver = current.cheap_clone();
                    let rest = &indices[at..];
                    let elem = self.read_property(&receiver, &prop, rest)?;
                    let rhs = self.eval(rhs_expr)?;
                    let combined = self.apply_binary(op, &elem, &rhs)?;
                    return self
                        .write_property(&receiver, &prop, rest, combined)
                        .map(|_| ());
                }
                other => {
                    return Err(ExecError::NotIndexable {
                        type_name: other.type_name(),
                    });
                }
            }
        }
        Err(ExecError::unsupported("index assignment without indices"))
    }

    /// Replace one code point of a string, 1-based, writing the rebuilt
    /// string back through the place that held it. The incoming value must
    /// be exactly one code point.
    fn write_string_char(
        &mut self,
        place: Option<Place>,
        s: &Rc<str>,
        index: i64,
        value: &Value,
    ) -> Result<(), ExecError> {
        let Some(place) = place else {
            return Err(ExecError::unsupported(
                "cannot assign into a string expression",
            ));
        };
        let ch = value
            .as_str()
            .ok_or_else(|| ExecError::InvalidCharacterAssignment {
                got: value.type_name(),
            })?;
        if ch.chars().count() != 1 {
            return Err(ExecError::InvalidCharacterAssignment { got: ch.to_owned() });
        }
        let count = s.chars().count() as i64;
        if index < 1 || index > count {
            return Err(ExecError::IndexOutOfBounds {
                index,
                lo: 1,
                hi: count,
            });
        }
        let mut out = String::with_capacity(s.len() + ch.len());
        for (i, c) in s.chars().enumerate() {
            if i as i64 == index - 1 {
                out.push_str(ch);
            } else {
                out.push(c);
            }
        }
        self.place_write_raw(&place, Value::str(out))
    }

    // ── Place resolution ──────────────────────────────────────────────────

    /// Resolve an expression to an assignable location, when it has one.
    /// Property-backed members are not places (their writes go through
    /// setters); expressions without storage resolve to `None`.
    pub(crate) fn resolve_place(&mut self, expr: &Expr) -> Result<Option<Place>, ExecError> {
        match expr {
            Expr::Ident(name) => {
                if let Some(binding) = self.ctx.lookup(name) {
                    if binding.external {
                        return Ok(None);
                    }
                    let mut slot = binding.slot;
                    loop {
                        let inner = match &*slot.borrow() {
                            Value::Ref(inner) => inner.cheap_clone(),
                            _ => break,
                        };
                        slot = inner;
                    }
                    return Ok(Some(Place::Slot(slot)));
                }
                if let Some(receiver) = self.ctx.receiver.clone() {
                    match &receiver {
                        Value::Object(obj) if obj.get_field(name).is_some() => {
                            return Ok(Some(Place::ObjectField(
                                obj.cheap_clone(),
                                Symbol::new(name),
                            )));
                        }
                        Value::Record(rec) if rec.get_field(name).is_some() => {
                            return Ok(Some(Place::RecordField(
                                rec.cheap_clone(),
                                Symbol::new(name),
                            )));
                        }
                        _ => {}
                    }
                }
                if let Some(class) = self.ctx.current_class.clone() {
                    if let Some(owner) = self.class_var_owner(&class, name) {
                        return Ok(Some(Place::ClassVar(owner, Symbol::new(name))));
                    }
                }
                Ok(None)
            }
            Expr::Member { object, name } => {
                let receiver = match self.resolve_place(object)? {
                    Some(p) => self.place_read(&p),
                    None => self.eval(object)?,
                };
                self.member_place(&receiver, name)
            }
            Expr::Index { .. } => {
                let (root, index_exprs) = flatten_index(expr);
                if let Expr::Member { object, name } = root {
                    let receiver = self.eval(object)?;
                    if self.property_of(&receiver, name).is_some() {
                        return Ok(None);
                    }
                }
                let mut current = match self.resolve_place(root)? {
                    Some(p) => self.place_read(&p),
                    None => self.eval(root)?,
                };
                let indices = self.eval_indices(&index_exprs)?;
                let last = indices.len().saturating_sub(1);
                for (at, idx) in indices.iter().enumerate() {
                    while let Value::Variant(inner) = current {
                        current = *inner;
                    }
                    let Value::Array(arr) = &current else {
                        return Ok(None);
                    };
                    let index = index_as_int(idx)?;
                    let phys = arr
                        .borrow()
                        .physical_index(index)
                        .map_err(|(lo, hi)| ExecError::IndexOutOfBounds { index, lo, hi })?;
                    if at == last {
                        return Ok(Some(Place::ArrayElem(arr.cheap_clone(), phys)));
                    }
                    let elem = arr.borrow().elems[phys].clone();
                    current = elem;
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn member_place(&mut self, receiver: &Value, name: &str) -> Result<Option<Place>, ExecError> {
        match receiver {
            Value::Object(obj) => {
                if self
                    .registry
                    .class_property(obj.class_name().key(), name)
                    .is_some()
                {
                    return Ok(None);
                }
                Ok(Some(Place::ObjectField(obj.cheap_clone(), Symbol::new(name))))
            }
            Value::Record(rec) => {
                if self
                    .registry
                    .record_property(rec.type_name().key(), name)
                    .is_some()
                {
                    return Ok(None);
                }
                Ok(Some(Place::RecordField(rec.cheap_clone(), Symbol::new(name))))
            }
            Value::Interface(iface) => match &iface.underlying {
                Some(obj) => self.member_place(&Value::Object(obj.cheap_clone()), name),
                None => Ok(None),
            },
            Value::Class(class) => Ok(self
                .class_var_owner(class, name)
                .map(|owner| Place::ClassVar(owner, Symbol::new(name)))),
            _ => Ok(None),
        }
    }

    // ── The write-back core ───────────────────────────────────────────────

    pub(crate) fn place_read(&self, place: &Place) -> Value {
        match place {
            Place::Slot(slot) => slot.borrow().clone(),
            Place::ObjectField(obj, name) => obj.get_field(name.key()).unwrap_or(Value::Nil),
            Place::RecordField(rec, name) => rec.get_field(name.key()).unwrap_or(Value::Nil),
            Place::ClassVar(owner, name) => owner
                .class_vars
                .borrow()
                .get(name.key())
                .cloned()
                .unwrap_or(Value::Nil),
            Place::ArrayElem(arr, phys) => {
                arr.borrow().elems.get(*phys).cloned().unwrap_or(Value::Nil)
            }
        }
    }

    /// Write a value into a place with no conversion or reference-count
    /// bookkeeping. The array-element arm re-validates the physical offset:
    /// guest code run between resolution and write may have resized a
    /// dynamic array.
    pub(crate) fn place_write_raw(&mut self, place: &Place, value: Value) -> Result<(), ExecError> {
        match place {
            Place::Slot(slot) => {
                *slot.borrow_mut() = value;
                Ok(())
            }
            Place::ObjectField(obj, name) => {
                obj.set_field(name.clone(), value);
                Ok(())
            }
            Place::RecordField(rec, name) => {
                rec.set_field(name.clone(), value);
                Ok(())
            }
            Place::ClassVar(owner, name) => {
                owner.class_vars.borrow_mut().insert(name.clone(), value);
                Ok(())
            }
            Place::ArrayElem(arr, phys) => {
                let mut arr = arr.borrow_mut();
                let len = arr.elems.len();
                match arr.elems.get_mut(*phys) {
                    Some(slot) => {
                        *slot = value;
                        Ok(())
                    }
                    None => Err(ExecError::IndexOutOfBounds {
                        index: *phys as i64,
                        lo: 0,
                        hi: len as i64 - 1,
                    }),
                }
            }
        }
    }

    /// The unified mutation path: steps 4–7 of simple-name dispatch, shared
    /// by every target shape once its place is resolved.
    pub(crate) fn store_to_place(
        &mut self,
        place: &Place,
        value: Value,
        source_is_index: bool,
    ) -> Result<(), ExecError> {
        let current = self.place_read(place);
        match current {
            // Subrange targets validate before mutating; a rejected value
            // leaves the stored one untouched.
            Value::Subrange(sub) => {
                let incoming = value.as_int().ok_or_else(|| {
                    ExecError::type_mismatch(":=", value.type_name(), sub.type_name.as_str())
                })?;
                if !sub.contains(incoming) {
                    return Err(ExecError::SubrangeOutOfRange {
                        type_name: sub.type_name.as_str().to_owned(),
                        value: incoming,
                        lo: sub.lo,
                        hi: sub.hi,
                    });
                }
                self.place_write_raw(
                    place,
                    Value::Subrange(SubrangeValue {
                        value: incoming,
                        ..sub
                    }),
                )
            }
            // Interface targets re-wrap: retain the new underlying object
            // first, then release the old one, then swap the pointer.
            Value::Interface(old) => {
                let wrapper = self
                    .refs
                    .wrap_in_interface(old.interface_name.clone(), &value)?;
                self.refs.release_interface(&old);
                self.place_write_raw(place, Value::Interface(wrapper))
            }
            // Object targets have reference semantics: store as-is, adopt
            // the new reference before dropping the old.
            Value::Object(old) => {
                self.refs.retain_value(&value);
                self.refs.release(&old);
                self.place_write_raw(place, value)
            }
            current => {
                let target_type = current.type_name();
                let converted = if current.is_nil() {
                    value
                } else {
                    self.try_convert(value, &target_type).0
                };
                let final_value = if matches!(current, Value::Variant(_)) {
                    match converted {
                        v @ Value::Variant(_) => v,
                        v => Value::Variant(Box::new(v)),
                    }
                } else {
                    let shaped = shape_to_static(converted, &current);
                    if source_is_index {
                        // Value read from an index expression keeps its
                        // aliasing so parent-structure write-back works.
                        shaped
                    } else {
                        shaped.copy_semantics()
                    }
                };
                self.adopt(&final_value);
                self.place_write_raw(place, final_value)?;
                self.abandon(&current);
                Ok(())
            }
        }
    }
}

/// Adopt a dynamic array value into a static-array target's shape when the
/// lengths agree (array literals take their bounds from the target).
fn shape_to_static(value: Value, current: &Value) -> Value {
    let Value::Array(target) = current else {
        return value;
    };
    let ArrayKind::Static { low, high } = target.borrow().kind else {
        return value;
    };
    let Value::Array(src) = &value else {
        return value;
    };
    let reshaped = {
        let src = src.borrow();
        if src.kind == ArrayKind::Dynamic && src.elems.len() as i64 == high - low + 1 {
            Some(ArrayValue::new_static(
                low,
                high,
                target.borrow().elem_type.clone(),
                src.elems.clone(),
            ))
        } else {
            None
        }
    };
    match reshaped {
        Some(arr) => Value::Array(arr),
        None => value,
    }
}

fn kind_label(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Int(_) => "integer",
        Value::Float(_) => "float",
        Value::Bool(_) => "boolean",
        Value::Str(_) => "string",
        Value::Enum(_) => "enum",
        Value::Object(_) => "object",
        Value::Interface(_) => "interface",
        Value::Record(_) => "record",
        Value::Array(_) => "array",
        Value::Subrange(_) => "subrange",
        Value::Routine(_) => "routine",
        Value::Variant(_) => "variant",
        Value::Class(_) => "class",
        Value::Ref(_) => "reference",
    }
}
