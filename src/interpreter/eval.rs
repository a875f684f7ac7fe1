//! Expression evaluation.
//!
//! Identifier resolution follows the same fallback order assignment uses:
//! environment binding, implicit-Self field or property, current-class
//! class var or class const, free routine, class name, enum member.
//! Operator application is the `Apply` contract consumed by compound
//! assignment: given an operator and two values, a combined value or a
//! type-mismatch error.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::ast::{BinaryOp, Expr, Literal, Routine, UnaryOp};
use crate::error::ExecError;
use crate::symbol::Symbol;
use crate::value::{
    ArrayValue, CheapClone, EnumValue, ObjectInstance, RoutineValue, SlotRef, Value,
};

use super::{CallArg, Interpreter};

impl Interpreter {
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn eval(&mut self, expr: &Expr) -> Result<Value, ExecError> {
        match expr {
            Expr::Literal(lit) => Ok(Self::literal_value(lit)),
            Expr::Ident(name) => self.read_ident(name),
            Expr::SelfRef => self
                .ctx
                .receiver
                .clone()
                .ok_or_else(|| ExecError::undefined("Self")),
            Expr::Member { object, name } => {
                let receiver = self.eval(object)?;
                self.read_member_value(&receiver, name)
            }
            Expr::Index { .. } => {
                let (root, index_exprs) = flatten_index(expr);
                self.read_index_chain(root, &index_exprs)
            }
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                self.apply_unary(*op, &v)
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left)?;
                // Boolean and/or short-circuit; bitwise forms evaluate both.
                match (op, l.as_bool()) {
                    (BinaryOp::And, Some(false)) => return Ok(Value::Bool(false)),
                    (BinaryOp::Or, Some(true)) => return Ok(Value::Bool(true)),
                    _ => {}
                }
                let r = self.eval(right)?;
                self.apply_binary(*op, &l, &r)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args),
            Expr::New { class_name, args } => self.construct_object(class_name, args),
            Expr::ArrayLit(elems) => {
                let mut values = Vec::with_capacity(elems.len());
                for e in elems {
                    values.push(self.eval(e)?);
                }
                Ok(Value::Array(ArrayValue::new_dynamic(None, values)))
            }
        }
    }

    fn literal_value(lit: &Literal) -> Value {
        match lit {
            Literal::Nil => Value::Nil,
            Literal::Int(v) => Value::Int(*v),
            Literal::Float(v) => Value::Float(*v),
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Enum { type_name, ordinal } => Value::Enum(EnumValue {
                type_name: Symbol::from(type_name.clone()),
                ordinal: *ordinal,
            }),
        }
    }

    // ── Identifiers ───────────────────────────────────────────────────────

    pub(crate) fn read_ident(&mut self, name: &str) -> Result<Value, ExecError> {
        if let Some(binding) = self.ctx.lookup(name) {
            let mut value = binding.slot.borrow().clone();
            while let Value::Ref(slot) = value {
                value = slot.borrow().clone();
            }
            return Ok(value);
        }

        // Implicit-Self field or property.
        if let Some(receiver) = self.ctx.receiver.clone() {
            match &receiver {
                Value::Object(obj) => {
                    if let Some(v) = obj.get_field(name) {
                        return Ok(v);
                    }
                    if let Some(prop) =
                        self.registry.class_property(obj.class_name().key(), name)
                    {
                        return self.read_property(&receiver, &prop, &[]);
                    }
                }
                Value::Record(rec) => {
                    if let Some(v) = rec.get_field(name) {
                        return Ok(v);
                    }
                    if let Some(prop) =
                        self.registry.record_property(rec.type_name().key(), name)
                    {
                        return self.read_property(&receiver, &prop, &[]);
                    }
                }
                _ => {}
            }
        }

        // Class vars and lazily-evaluated class consts of the current class.
        if let Some(class) = self.ctx.current_class.clone() {
            if let Some(v) = self.class_var_get(&class, name) {
                return Ok(v);
            }
            if let Some(v) = self.class_const_get(&class, name)? {
                return Ok(v);
            }
        }

        if let Some(decl) = self.routine(name) {
            return Ok(Value::Routine(RoutineValue {
                decl,
                receiver: None,
            }));
        }
        if self.registry.is_class(name) {
            return Ok(Value::Class(Symbol::new(name)));
        }
        if let Some(member) = self.registry.enum_member(name) {
            return Ok(Value::Enum(member));
        }

        Err(ExecError::undefined(name))
    }

    // ── Member reads ──────────────────────────────────────────────────────

    pub(crate) fn read_member_value(
        &mut self,
        receiver: &Value,
        name: &str,
    ) -> Result<Value, ExecError> {
        match receiver {
            Value::Object(obj) => {
                if let Some(prop) = self.registry.class_property(obj.class_name().key(), name) {
                    return self.read_property(receiver, &prop, &[]);
                }
                if let Some(v) = obj.get_field(name) {
                    return Ok(v);
                }
                if let Some(decl) = self.registry.class_method(obj.class_name().key(), name) {
                    return Ok(Value::Routine(RoutineValue {
                        decl,
                        receiver: Some(obj.cheap_clone()),
                    }));
                }
                Err(ExecError::undefined(format!("{}.{}", obj.class_name(), name)))
            }
            Value::Interface(iface) => {
                if let Some(prop) = self
                    .registry
                    .interface_property(iface.interface_name.key(), name)
                {
                    return self.read_property(receiver, &prop, &[]);
                }
                match &iface.underlying {
                    Some(obj) => self.read_member_value(&Value::Object(obj.cheap_clone()), name),
                    None => Err(ExecError::unsupported(format!(
                        "member access on unset interface {}",
                        iface.interface_name
                    ))),
                }
            }
            Value::Record(rec) => {
                if let Some(prop) = self.registry.record_property(rec.type_name().key(), name) {
                    return self.read_property(receiver, &prop, &[]);
                }
                rec.get_field(name)
                    .ok_or_else(|| ExecError::undefined(format!("{}.{}", rec.type_name(), name)))
            }
            Value::Class(class) => {
                if let Some(v) = self.class_var_get(class, name) {
                    return Ok(v);
                }
                if let Some(v) = self.class_const_get(class, name)? {
                    return Ok(v);
                }
                if let Some(prop) = self.registry.class_property(class.key(), name) {
                    return self.read_property(receiver, &prop, &[]);
                }
                if let Some(decl) = self.registry.class_method(class.key(), name) {
                    return Ok(Value::Routine(RoutineValue {
                        decl,
                        receiver: None,
                    }));
                }
                Err(ExecError::undefined(format!("{class}.{name}")))
            }
            Value::Variant(inner) => self.read_member_value(inner, name),
            Value::Nil => Err(ExecError::unsupported(format!(
                "member access on nil ('{name}')"
            ))),
            other => Err(ExecError::undefined(format!(
                "{}.{}",
                other.type_name(),
                name
            ))),
        }
    }

    // ── Index reads ───────────────────────────────────────────────────────

    pub(crate) fn read_index_chain(
        &mut self,
        root: &Expr,
        index_exprs: &[&Expr],
    ) -> Result<Value, ExecError> {
        // An index chain rooted at a property member is an indexed-property
        // read; everything else indexes the evaluated base value.
        if let Expr::Member { object, name } = root {
            let receiver = self.eval(object)?;
            if let Some(prop) = self.property_of(&receiver, name) {
                if prop.is_indexed {
                    let indices = self.eval_indices(index_exprs)?;
                    return self.read_property(&receiver, &prop, &indices);
                }
                // Non-indexed property: read it, then index the value.
                let base = self.read_property(&receiver, &prop, &[])?;
                let indices = self.eval_indices(index_exprs)?;
                return self.read_indexed(base, &indices);
            }
            let base = self.read_member_value(&receiver, name)?;
            let indices = self.eval_indices(index_exprs)?;
            return self.read_indexed(base, &indices);
        }
        let base = self.eval(root)?;
        let indices = self.eval_indices(index_exprs)?;
        self.read_indexed(base, &indices)
    }

    pub(crate) fn eval_indices(
        &mut self,
        index_exprs: &[&Expr],
    ) -> Result<SmallVec<[Value; 4]>, ExecError> {
        let mut indices = SmallVec::new();
        for e in index_exprs {
            indices.push(self.eval(e)?);
        }
        Ok(indices)
    }

    /// Index into a value, one dimension at a time. An object or interface
    /// consumes every remaining index through its default property.
    pub(crate) fn read_indexed(
        &mut self,
        base: Value,
        indices: &[Value],
    ) -> Result<Value, ExecError> {
        let mut current = base;
        let mut at = 0;
        while at < indices.len() {
            match &current {
                Value::Array(arr) => {
                    let index = index_as_int(&indices[at])?;
                    let elem = {
                        let arr = arr.borrow();
                        let phys = arr.physical_index(index).map_err(|(lo, hi)| {
                            ExecError::IndexOutOfBounds { index, lo, hi }
                        })?;
                        arr.elems[phys].clone()
                    };
                    current = elem;
                    at += 1;
                }
                Value::Str(s) => {
                    let index = index_as_int(&indices[at])?;
                    current = Value::Str(string_char_at(s, index)?);
                    at += 1;
                }
                Value::Object(_) | Value::Interface(_) => {
                    let prop = self
                        .registry
                        .default_property_of(&current)
                        .ok_or_else(|| ExecError::NotIndexable {
                            type_name: current.type_name(),
                        })?;
                    let receiver = current.cheap_clone();
                    return self.read_property(&receiver, &prop, &indices[at..]);
                }
                Value::Variant(inner) => current = inner.as_ref().clone(),
                other => {
                    return Err(ExecError::NotIndexable {
                        type_name: other.type_name(),
                    });
                }
            }
        }
        Ok(current)
    }

    /// The property descriptor `name` resolves to on this receiver, if any.
    pub(crate) fn property_of(
        &self,
        receiver: &Value,
        name: &str,
    ) -> Option<Rc<crate::meta::PropertyInfo>> {
        match receiver {
            Value::Object(obj) => self.registry.class_property(obj.class_name().key(), name),
            Value::Interface(iface) => self
                .registry
                .interface_property(iface.interface_name.key(), name)
                .or_else(|| {
                    iface.underlying.as_ref().and_then(|obj| {
                        self.registry.class_property(obj.class_name().key(), name)
                    })
                }),
            Value::Record(rec) => self.registry.record_property(rec.type_name().key(), name),
            Value::Class(class) => self.registry.class_property(class.key(), name),
            _ => None,
        }
    }

    // ── Operators (the Apply contract) ────────────────────────────────────

    pub fn apply_binary(
        &mut self,
        op: BinaryOp,
        left: &Value,
        right: &Value,
    ) -> Result<Value, ExecError> {
        use BinaryOp::*;
        let l = left.unboxed();
        let r = right.unboxed();
        let mismatch =
            || ExecError::type_mismatch(op.to_string(), left.type_name(), right.type_name());

        let value = match (op, &l, &r) {
            (Add, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(*b)),
            (Sub, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_sub(*b)),
            (Mul, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_mul(*b)),
            (Add | Sub | Mul, _, _) if numeric(&l) && numeric(&r) => {
                let (a, b) = (as_f64(&l), as_f64(&r));
                Value::Float(match op {
                    Add => a + b,
                    Sub => a - b,
                    _ => a * b,
                })
            }
            (Add, Value::Str(a), Value::Str(b)) => {
                let mut s = String::with_capacity(a.len() + b.len());
                s.push_str(a);
                s.push_str(b);
                Value::Str(Rc::from(s.as_str()))
            }
            (Div, _, _) if numeric(&l) && numeric(&r) => {
                let b = as_f64(&r);
                if b == 0.0 {
                    return Err(self.raise_text("division by zero"));
                }
                Value::Float(as_f64(&l) / b)
            }
            (IntDiv, Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    return Err(self.raise_text("division by zero"));
                }
                Value::Int(a.wrapping_div(*b))
            }
            (Mod, Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    return Err(self.raise_text("division by zero"));
                }
                Value::Int(a.wrapping_rem(*b))
            }
            (Eq, _, _) => Value::Bool(l == r),
            (Ne, _, _) => Value::Bool(l != r),
            (Lt | Le | Gt | Ge, _, _) => Value::Bool(apply_ordering(op, &l, &r).ok_or_else(mismatch)?),
            (And, Value::Bool(a), Value::Bool(b)) => Value::Bool(*a && *b),
            (Or, Value::Bool(a), Value::Bool(b)) => Value::Bool(*a || *b),
            (Xor, Value::Bool(a), Value::Bool(b)) => Value::Bool(*a != *b),
            (And, Value::Int(a), Value::Int(b)) => Value::Int(a & b),
            (Or, Value::Int(a), Value::Int(b)) => Value::Int(a | b),
            (Xor, Value::Int(a), Value::Int(b)) => Value::Int(a ^ b),
            _ => return Err(mismatch()),
        };
        Ok(value)
    }

    pub fn apply_unary(&mut self, op: UnaryOp, operand: &Value) -> Result<Value, ExecError> {
        let v = operand.unboxed();
        match (op, &v) {
            (UnaryOp::Neg, Value::Int(a)) => Ok(Value::Int(a.wrapping_neg())),
            (UnaryOp::Neg, Value::Float(a)) => Ok(Value::Float(-a)),
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Not, Value::Int(a)) => Ok(Value::Int(!a)),
            _ => Err(ExecError::type_mismatch(
                op.to_string(),
                operand.type_name(),
                "operand",
            )),
        }
    }

    /// Raise a guest exception carrying a plain message value.
    pub(crate) fn raise_text(&mut self, message: &str) -> ExecError {
        self.set_exception(Value::str(message));
        ExecError::Raised
    }

    // ── Calls ─────────────────────────────────────────────────────────────

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value, ExecError> {
        match callee {
            Expr::Member { object, name } => {
                let receiver = self.eval(object)?;
                self.call_member(&receiver, name, args)
            }
            Expr::Ident(name) => {
                if let Some(binding) = self.ctx.lookup(name) {
                    let mut value = binding.slot.borrow().clone();
                    while let Value::Ref(slot) = value {
                        value = slot.borrow().clone();
                    }
                    return match value {
                        Value::Routine(rv) => self.call_routine_value(&rv, args),
                        _ => Err(ExecError::not_callable(name.as_ref())),
                    };
                }
                if let Some(decl) = self.routine(name) {
                    let call_args = self.prepare_args(&decl, args)?;
                    return self.call_routine(&decl, None, None, call_args);
                }
                // Implicit-Self method call inside a method body.
                if let Some(Value::Object(obj)) = self.ctx.receiver.clone() {
                    if let Some(decl) =
                        self.registry.class_method(obj.class_name().key(), name)
                    {
                        let class = obj.class_name().clone();
                        let call_args = self.prepare_args(&decl, args)?;
                        return self.call_routine(
                            &decl,
                            Some(Value::Object(obj)),
                            Some(class),
                            call_args,
                        );
                    }
                }
                Err(ExecError::undefined(name.as_ref()))
            }
            other => {
                let value = self.eval(other)?;
                match value {
                    Value::Routine(rv) => self.call_routine_value(&rv, args),
                    _ => Err(ExecError::not_callable("expression")),
                }
            }
        }
    }

    fn call_routine_value(
        &mut self,
        rv: &RoutineValue,
        args: &[Expr],
    ) -> Result<Value, ExecError> {
        let call_args = self.prepare_args(&rv.decl, args)?;
        let (receiver, class) = match &rv.receiver {
            Some(obj) => (
                Some(Value::Object(obj.cheap_clone())),
                Some(obj.class_name().clone()),
            ),
            None => (None, None),
        };
        self.call_routine(&rv.decl, receiver, class, call_args)
    }

    pub(crate) fn call_member(
        &mut self,
        receiver: &Value,
        name: &str,
        args: &[Expr],
    ) -> Result<Value, ExecError> {
        match receiver {
            Value::Object(obj) => {
                let class = obj.class_name().clone();
                if let Some(decl) = self.registry.class_method(class.key(), name) {
                    let call_args = self.prepare_args(&decl, args)?;
                    return self.call_routine(
                        &decl,
                        Some(receiver.cheap_clone()),
                        Some(class),
                        call_args,
                    );
                }
                // A routine-valued field is callable through the member.
                if let Some(Value::Routine(rv)) = obj.get_field(name) {
                    return self.call_routine_value(&rv, args);
                }
                Err(ExecError::undefined(format!("{class}.{name}")))
            }
            Value::Interface(iface) => match &iface.underlying {
                Some(obj) => self.call_member(&Value::Object(obj.cheap_clone()), name, args),
                None => Err(ExecError::unsupported(format!(
                    "method call on unset interface {}",
                    iface.interface_name
                ))),
            },
            Value::Class(class) => {
                if crate::symbol::fold(name) == "create" {
                    return self.construct_for_class(class.key(), args);
                }
                if let Some(decl) = self.registry.class_method(class.key(), name) {
                    let call_args = self.prepare_args(&decl, args)?;
                    return self.call_routine(
                        &decl,
                        Some(receiver.cheap_clone()),
                        Some(class.clone()),
                        call_args,
                    );
                }
                Err(ExecError::undefined(format!("{class}.{name}")))
            }
            Value::Nil => Err(ExecError::unsupported(format!(
                "method call on nil ('{name}')"
            ))),
            other => Err(ExecError::not_callable(format!(
                "{}.{}",
                other.type_name(),
                name
            ))),
        }
    }

    pub(crate) fn prepare_args(
        &mut self,
        routine: &Rc<Routine>,
        args: &[Expr],
    ) -> Result<Vec<CallArg>, ExecError> {
        if args.len() != routine.params.len() {
            return Err(ExecError::ArgumentCountMismatch {
                routine: routine.name.to_string(),
                expected: routine.params.len(),
                got: args.len(),
            });
        }
        let mut out = Vec::with_capacity(args.len());
        for (param, expr) in routine.params.iter().zip(args) {
            match param.mode {
                crate::ast::ParamMode::ByValue => out.push(CallArg::Value(self.eval(expr)?)),
                crate::ast::ParamMode::ByRef => {
                    out.push(CallArg::ByRef(self.slot_for_byref(expr, &routine.name)?));
                }
            }
        }
        Ok(out)
    }

    fn slot_for_byref(&mut self, expr: &Expr, routine: &str) -> Result<SlotRef, ExecError> {
        let Expr::Ident(name) = expr else {
            return Err(ExecError::unsupported(format!(
                "var argument of '{routine}' must be a variable"
            )));
        };
        let binding = self
            .ctx
            .lookup(name)
            .ok_or_else(|| ExecError::undefined(name.as_ref()))?;
        if binding.external {
            return Err(ExecError::UnsupportedExternalAssignment {
                name: name.to_string(),
            });
        }
        let mut slot = binding.slot;
        loop {
            let inner = match &*slot.borrow() {
                Value::Ref(inner) => inner.cheap_clone(),
                _ => break,
            };
            slot = inner;
        }
        Ok(slot)
    }

    // ── Construction ──────────────────────────────────────────────────────

    pub(crate) fn construct_object(
        &mut self,
        class_name: &str,
        args: &[Expr],
    ) -> Result<Value, ExecError> {
        self.construct_for_class(class_name, args)
    }

    fn construct_for_class(&mut self, class_name: &str, args: &[Expr]) -> Result<Value, ExecError> {
        let info = self
            .registry
            .class(class_name)
            .ok_or_else(|| ExecError::unknown_type(class_name))?;
        let obj = ObjectInstance::new(info.name.clone());
        for field in self.registry.class_fields(class_name) {
            let zero = match &field.type_name {
                Some(t) => self.registry.zero_value(t.key())?,
                None => Value::Nil,
            };
            obj.set_field(field.name, zero);
        }
        let value = Value::Object(obj);
        // The fresh instance lives as a statement temporary until stored.
        self.note_temp(&value);

        if let Some(ctor) = self.registry.class_method(class_name, "create") {
            let call_args = self.prepare_args(&ctor, args)?;
            self.call_routine(&ctor, Some(value.cheap_clone()), Some(info.name.clone()), call_args)?;
        } else if !args.is_empty() {
            return Err(ExecError::ArgumentCountMismatch {
                routine: format!("{}.Create", info.name),
                expected: 0,
                got: args.len(),
            });
        }
        Ok(value)
    }
}

/// Flatten nested index nodes outward-in: `x[i][j]` yields the root base
/// and the index expressions in source order.
pub(crate) fn flatten_index(expr: &Expr) -> (&Expr, Vec<&Expr>) {
    match expr {
        Expr::Index { base, indices } => {
            let (root, mut collected) = flatten_index(base);
            collected.extend(indices.iter());
            (root, collected)
        }
        other => (other, Vec::new()),
    }
}

pub(crate) fn index_as_int(value: &Value) -> Result<i64, ExecError> {
    value.as_int().ok_or_else(|| {
        ExecError::type_mismatch("[]", value.type_name(), "Integer")
    })
}

/// 1-based, code-point-aware character read.
pub(crate) fn string_char_at(s: &str, index: i64) -> Result<Rc<str>, ExecError> {
    let count = s.chars().count() as i64;
    if index < 1 || index > count {
        return Err(ExecError::IndexOutOfBounds {
            index,
            lo: 1,
            hi: count,
        });
    }
    let ch = s
        .chars()
        .nth((index - 1) as usize)
        .map(|c| c.to_string())
        .unwrap_or_default();
    Ok(Rc::from(ch.as_str()))
}

fn numeric(v: &Value) -> bool {
    matches!(v, Value::Int(_) | Value::Float(_))
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int(a) => *a as f64,
        Value::Float(a) => *a,
        _ => f64::NAN,
    }
}

fn apply_ordering(op: BinaryOp, l: &Value, r: &Value) -> Option<bool> {
    use std::cmp::Ordering;
    let ord = match (l, r) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (Value::Enum(a), Value::Enum(b)) if a.type_name == b.type_name => {
            a.ordinal.cmp(&b.ordinal)
        }
        _ if numeric(l) && numeric(r) => as_f64(l).partial_cmp(&as_f64(r))?,
        _ => return None,
    };
    Some(match op {
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Le => ord != Ordering::Greater,
        BinaryOp::Gt => ord == Ordering::Greater,
        BinaryOp::Ge => ord != Ordering::Less,
        _ => return None,
    })
}
