//! Property access subsystem.
//!
//! Resolves and executes field-backed, method-backed, and expression-backed
//! getters and setters, including indexed and default-indexed properties.
//! Every getter/setter evaluation is guarded by the execution context's
//! property-access chain: a property already being evaluated aborts with a
//! circular-reference error before any accessor work happens, and the chain
//! entry is popped unconditionally, including on early error returns.

use std::rc::Rc;

use crate::ast::Expr;
use crate::error::ExecError;
use crate::meta::{ClassInfo, PropertyAccess, PropertyInfo};
use crate::symbol::Symbol;
use crate::value::{CheapClone, Value};

use super::assign::Place;
use super::{CallArg, Interpreter};

impl Interpreter {
    /// Read a property on a receiver. `indices` is empty for plain
    /// properties and carries the index arguments for indexed ones.
    #[tracing::instrument(level = "debug", skip_all, fields(property = %prop.name))]
    pub fn read_property(
        &mut self,
        receiver: &Value,
        prop: &Rc<PropertyInfo>,
        indices: &[Value],
    ) -> Result<Value, ExecError> {
        self.ctx.enter_property(&prop.name)?;
        let result = self.read_property_guarded(receiver, prop, indices);
        self.ctx.leave_property();
        result
    }

    /// Write a property on a receiver, returning the written value.
    #[tracing::instrument(level = "debug", skip_all, fields(property = %prop.name))]
    pub fn write_property(
        &mut self,
        receiver: &Value,
        prop: &Rc<PropertyInfo>,
        indices: &[Value],
        value: Value,
    ) -> Result<Value, ExecError> {
        self.ctx.enter_property(&prop.name)?;
        let result = self.write_property_guarded(receiver, prop, indices, value);
        self.ctx.leave_property();
        result
    }

    fn read_property_guarded(
        &mut self,
        receiver: &Value,
        prop: &Rc<PropertyInfo>,
        indices: &[Value],
    ) -> Result<Value, ExecError> {
        match &prop.read {
            PropertyAccess::None => Err(ExecError::unsupported(format!(
                "property '{}' is write-only",
                prop.name
            ))),
            PropertyAccess::Field(spec) => {
                self.check_plain_access(prop, indices, "<read>")?;
                self.read_field_backed(receiver, prop, spec)
            }
            PropertyAccess::Method(method_name) => {
                let mut args: Vec<Value> = Vec::with_capacity(indices.len() + 1);
                if let Some(directive) = prop.index_directive {
                    args.push(Value::Int(directive));
                }
                args.extend(indices.iter().cloned());
                self.invoke_accessor(receiver, prop, method_name, args)
            }
            PropertyAccess::Expr(expr) => {
                self.check_plain_access(prop, indices, "<expression>")?;
                self.eval_getter_expr(receiver, expr.cheap_clone())
            }
        }
    }

    fn write_property_guarded(
        &mut self,
        receiver: &Value,
        prop: &Rc<PropertyInfo>,
        indices: &[Value],
        value: Value,
    ) -> Result<Value, ExecError> {
        match &prop.write {
            PropertyAccess::None | PropertyAccess::Expr(_) => Err(ExecError::PropertyReadOnly {
                property: prop.name.as_str().to_owned(),
            }),
            PropertyAccess::Field(spec) => {
                self.check_plain_access(prop, indices, "<write>")?;
                self.write_field_backed(receiver, prop, spec, value)
            }
            PropertyAccess::Method(method_name) => {
                let mut args: Vec<Value> = Vec::with_capacity(indices.len() + 2);
                if let Some(directive) = prop.index_directive {
                    args.push(Value::Int(directive));
                }
                args.extend(indices.iter().cloned());
                args.push(value.cheap_clone());
                self.invoke_accessor(receiver, prop, method_name, args)?;
                Ok(value)
            }
        }
    }

    /// Field- and expression-backed properties take no index arguments.
    fn check_plain_access(
        &self,
        prop: &PropertyInfo,
        indices: &[Value],
        accessor: &str,
    ) -> Result<(), ExecError> {
        let expected = usize::from(prop.is_indexed);
        if indices.len() != expected {
            return Err(ExecError::PropertySignatureMismatch {
                property: prop.name.as_str().to_owned(),
                accessor: accessor.to_owned(),
                expected,
                got: indices.len(),
            });
        }
        Ok(())
    }

    // ── Field-backed dispatch ─────────────────────────────────────────────

    /// Read order: class var, class const (lazily evaluated), instance
    /// field, then the specifier as a zero-argument getter method.
    fn read_field_backed(
        &mut self,
        receiver: &Value,
        prop: &Rc<PropertyInfo>,
        spec: &Symbol,
    ) -> Result<Value, ExecError> {
        let receiver = self.unwrap_interface(receiver)?;
        match &receiver {
            Value::Object(obj) => {
                let class = obj.class_name().clone();
                if let Some(v) = self.class_var_get(&class, spec.key()) {
                    return Ok(v);
                }
                if let Some(v) = self.class_const_get(&class, spec.key())? {
                    return Ok(v);
                }
                if let Some(v) = obj.get_field(spec.key()) {
                    return Ok(v);
                }
                if let Some(decl) = self.registry.class_method(class.key(), spec.key()) {
                    if !decl.params.is_empty() {
                        return Err(ExecError::PropertySignatureMismatch {
                            property: prop.name.as_str().to_owned(),
                            accessor: spec.as_str().to_owned(),
                            expected: 0,
                            got: decl.params.len(),
                        });
                    }
                    return self.call_routine(
                        &decl,
                        Some(receiver.cheap_clone()),
                        Some(class),
                        Vec::new(),
                    );
                }
                Err(ExecError::undefined(format!("{class}.{spec}")))
            }
            Value::Record(rec) => rec
                .get_field(spec.key())
                .ok_or_else(|| ExecError::undefined(format!("{}.{}", rec.type_name(), spec))),
            Value::Class(class) => {
                if let Some(v) = self.class_var_get(class, spec.key()) {
                    return Ok(v);
                }
                if let Some(v) = self.class_const_get(class, spec.key())? {
                    return Ok(v);
                }
                Err(ExecError::undefined(format!("{class}.{spec}")))
            }
            other => Err(ExecError::undefined(format!(
                "{}.{}",
                other.type_name(),
                spec
            ))),
        }
    }

    /// Write mirror of the field-backed read order: class var, then direct
    /// instance field store (class consts are not assignable).
    fn write_field_backed(
        &mut self,
        receiver: &Value,
        prop: &Rc<PropertyInfo>,
        spec: &Symbol,
        value: Value,
    ) -> Result<Value, ExecError> {
        let receiver = self.unwrap_interface(receiver)?;
        match &receiver {
            Value::Object(obj) => {
                let class = obj.class_name().clone();
                if let Some(owner) = self.class_var_owner(&class, spec.key()) {
                    let place = Place::ClassVar(owner, spec.clone());
                    self.store_to_place(&place, value.cheap_clone(), false)?;
                    return Ok(value);
                }
                let place = Place::ObjectField(obj.cheap_clone(), spec.clone());
                self.store_to_place(&place, value.cheap_clone(), false)?;
                Ok(value)
            }
            Value::Record(rec) => {
                let place = Place::RecordField(rec.cheap_clone(), spec.clone());
                self.store_to_place(&place, value.cheap_clone(), false)?;
                Ok(value)
            }
            Value::Class(class) => {
                let owner = self.class_var_owner(class, spec.key()).ok_or_else(|| {
                    ExecError::undefined(format!("{class}.{spec}"))
                })?;
                let place = Place::ClassVar(owner, spec.clone());
                self.store_to_place(&place, value.cheap_clone(), false)?;
                Ok(value)
            }
            other => Err(ExecError::MemberAssignmentUnsupported {
                kind: "value",
                member: format!("{}.{}", other.type_name(), prop.name),
            }),
        }
    }

    // ── Method-backed dispatch ────────────────────────────────────────────

    /// Invoke a getter/setter method with exact parameter-count checking.
    fn invoke_accessor(
        &mut self,
        receiver: &Value,
        prop: &Rc<PropertyInfo>,
        method_name: &Symbol,
        args: Vec<Value>,
    ) -> Result<Value, ExecError> {
        let receiver = self.unwrap_interface(receiver)?;
        let class = match &receiver {
            Value::Object(obj) => obj.class_name().clone(),
            Value::Class(class) => class.clone(),
            other => {
                return Err(ExecError::unsupported(format!(
                    "method-backed property '{}' on {}",
                    prop.name,
                    other.type_name()
                )));
            }
        };
        let decl = self
            .registry
            .class_method(class.key(), method_name.key())
            .ok_or_else(|| ExecError::undefined(format!("{class}.{method_name}")))?;
        if decl.params.len() != args.len() {
            return Err(ExecError::PropertySignatureMismatch {
                property: prop.name.as_str().to_owned(),
                accessor: method_name.as_str().to_owned(),
                expected: decl.params.len(),
                got: args.len(),
            });
        }
        let call_args = args.into_iter().map(CallArg::Value).collect();
        self.call_routine(&decl, Some(receiver), Some(class), call_args)
    }

    // ── Expression-backed getters ─────────────────────────────────────────

    /// Evaluate a stored getter expression in a fresh scope with `Self`
    /// bound and every instance field pre-bound as a same-named local.
    fn eval_getter_expr(&mut self, receiver: &Value, expr: Rc<Expr>) -> Result<Value, ExecError> {
        let receiver = self.unwrap_interface(receiver)?;
        let fields: Vec<(Symbol, Value)> = match &receiver {
            Value::Object(obj) => obj.fields().iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Value::Record(rec) => rec.fields().iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => Vec::new(),
        };
        let class = match &receiver {
            Value::Object(obj) => Some(obj.class_name().clone()),
            _ => None,
        };

        let guard = self.ctx.push_routine_scope();
        let saved_receiver = self.ctx.receiver.take();
        let saved_class = self.ctx.current_class.take();
        self.ctx.receiver = Some(receiver);
        self.ctx.current_class = class;
        for (name, value) in fields {
            self.declare_adopted(name, value);
        }

        let result = self.eval(&expr);

        let owned = self.ctx.restore_scope(guard);
        for value in &owned {
            self.abandon(value);
        }
        self.ctx.receiver = saved_receiver;
        self.ctx.current_class = saved_class;
        result
    }

    // ── Class storage helpers ─────────────────────────────────────────────

    fn unwrap_interface(&self, receiver: &Value) -> Result<Value, ExecError> {
        match receiver {
            Value::Interface(iface) => match &iface.underlying {
                Some(obj) => Ok(Value::Object(obj.cheap_clone())),
                None => Err(ExecError::unsupported(format!(
                    "property access on unset interface {}",
                    iface.interface_name
                ))),
            },
            other => Ok(other.cheap_clone()),
        }
    }

    pub(crate) fn class_var_get(&self, class: &Symbol, name: &str) -> Option<Value> {
        let key = crate::symbol::fold(name);
        let mut current = self.registry.class(class.key());
        while let Some(info) = current {
            if let Some(v) = info.class_vars.borrow().get(key.as_str()) {
                return Some(v.clone());
            }
            current = info
                .parent
                .as_ref()
                .and_then(|p| self.registry.class(p.key()));
        }
        None
    }

    /// The class in the chain whose declaration owns this class var.
    pub(crate) fn class_var_owner(&self, class: &Symbol, name: &str) -> Option<Rc<ClassInfo>> {
        let key = crate::symbol::fold(name);
        let mut current = self.registry.class(class.key());
        while let Some(info) = current {
            if info.class_vars.borrow().contains_key(key.as_str()) {
                return Some(info);
            }
            current = info
                .parent
                .as_ref()
                .and_then(|p| self.registry.class(p.key()));
        }
        None
    }

    /// Class constant lookup; the initializer expression is evaluated on
    /// first access and cached.
    pub(crate) fn class_const_get(
        &mut self,
        class: &Symbol,
        name: &str,
    ) -> Result<Option<Value>, ExecError> {
        let key = crate::symbol::fold(name);
        let mut current = self.registry.class(class.key());
        while let Some(info) = current {
            if let Some(konst) = info.class_consts.get(key.as_str()) {
                if let Some(cached) = konst.cached.borrow().as_ref() {
                    return Ok(Some(cached.clone()));
                }
                let expr = konst.expr.cheap_clone();
                let value = self.eval(&expr)?;
                // Re-fetch: the initializer may itself have read the const.
                if let Some(konst) = info.class_consts.get(key.as_str()) {
                    *konst.cached.borrow_mut() = Some(value.clone());
                }
                return Ok(Some(value));
            }
            current = info
                .parent
                .as_ref()
                .and_then(|p| self.registry.class(p.key()));
        }
        Ok(None)
    }
}
