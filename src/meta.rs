//! Type metadata registry.
//!
//! Declarations for classes, records, interfaces, enums, subrange types, and
//! named array types, pre-validated by the (out-of-crate) front end. The
//! engine consults this registry for property descriptors, member lookup,
//! kind queries, and zero-value construction. All lookups are
//! case-insensitive.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::ast::{Expr, Routine};
use crate::error::ExecError;
use crate::symbol::{Symbol, fold};
use crate::value::{ArrayKind, ArrayValue, RecordInstance, SubrangeValue, Value};

/// How one side (read or write) of a property is implemented.
#[derive(Debug, Clone)]
pub enum PropertyAccess {
    /// No accessor on this side; reading/writing through it is an error.
    None,
    /// Backed by a storage name: a class var, class const, or instance
    /// field, or, failing those on read, a zero-argument getter method.
    Field(Symbol),
    /// Backed by a method named here.
    Method(Symbol),
    /// Backed by a stored expression, evaluated with `Self` bound and every
    /// instance field pre-bound as a same-named local.
    Expr(Rc<Expr>),
}

/// A property declaration.
#[derive(Debug, Clone)]
pub struct PropertyInfo {
    pub name: Symbol,
    pub read: PropertyAccess,
    pub write: PropertyAccess,
    /// `index` directive: a literal prepended to accessor arguments.
    pub index_directive: Option<i64>,
    /// Declared with index parameters (`property Items[i: Integer]`).
    pub is_indexed: bool,
    /// The property used when the object itself is indexed.
    pub is_default: bool,
}

impl PropertyInfo {
    pub fn new(name: &str, read: PropertyAccess, write: PropertyAccess) -> PropertyInfo {
        PropertyInfo {
            name: Symbol::new(name),
            read,
            write,
            index_directive: None,
            is_indexed: false,
            is_default: false,
        }
    }

    pub fn indexed(mut self) -> PropertyInfo {
        self.is_indexed = true;
        self
    }

    pub fn default(mut self) -> PropertyInfo {
        self.is_indexed = true;
        self.is_default = true;
        self
    }

    pub fn with_index_directive(mut self, index: i64) -> PropertyInfo {
        self.index_directive = Some(index);
        self
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.write, PropertyAccess::None)
    }
}

/// A field declaration on a class or record.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: Symbol,
    pub type_name: Option<Symbol>,
}

/// A class constant: evaluated lazily on first access, then cached.
#[derive(Debug)]
pub struct ClassConst {
    pub expr: Rc<Expr>,
    pub cached: RefCell<Option<Value>>,
}

pub struct ClassInfo {
    pub name: Symbol,
    pub parent: Option<Symbol>,
    pub fields: Vec<FieldDecl>,
    pub methods: IndexMap<Symbol, Rc<Routine>>,
    pub properties: IndexMap<Symbol, Rc<PropertyInfo>>,
    /// Mutable per-class storage shared by all instances.
    pub class_vars: RefCell<IndexMap<Symbol, Value>>,
    pub class_consts: IndexMap<Symbol, ClassConst>,
    pub default_property: Option<Symbol>,
    /// Method invoked when the reference count reaches zero.
    pub destructor: Option<Symbol>,
}

impl ClassInfo {
    pub fn new(name: &str) -> ClassInfo {
        ClassInfo {
            name: Symbol::new(name),
            parent: None,
            fields: Vec::new(),
            methods: IndexMap::new(),
            properties: IndexMap::new(),
            class_vars: RefCell::new(IndexMap::new()),
            class_consts: IndexMap::new(),
            default_property: None,
            destructor: None,
        }
    }

    pub fn parent(mut self, name: &str) -> Self {
        self.parent = Some(Symbol::new(name));
        self
    }

    pub fn field(mut self, name: &str, type_name: &str) -> Self {
        self.fields.push(FieldDecl {
            name: Symbol::new(name),
            type_name: Some(Symbol::new(type_name)),
        });
        self
    }

    pub fn untyped_field(mut self, name: &str) -> Self {
        self.fields.push(FieldDecl {
            name: Symbol::new(name),
            type_name: None,
        });
        self
    }

    pub fn method(mut self, routine: Routine) -> Self {
        self.methods
            .insert(Symbol::new(&routine.name), Rc::new(routine));
        self
    }

    pub fn property(mut self, prop: PropertyInfo) -> Self {
        if prop.is_default {
            self.default_property = Some(prop.name.clone());
        }
        self.properties.insert(prop.name.clone(), Rc::new(prop));
        self
    }

    pub fn class_var(self, name: &str, initial: Value) -> Self {
        self.class_vars
            .borrow_mut()
            .insert(Symbol::new(name), initial);
        self
    }

    pub fn class_const(mut self, name: &str, expr: Expr) -> Self {
        self.class_consts.insert(
            Symbol::new(name),
            ClassConst {
                expr: Rc::new(expr),
                cached: RefCell::new(None),
            },
        );
        self
    }

    pub fn destructor(mut self, method_name: &str) -> Self {
        self.destructor = Some(Symbol::new(method_name));
        self
    }
}

pub struct RecordInfo {
    pub name: Symbol,
    pub fields: Vec<FieldDecl>,
    pub properties: IndexMap<Symbol, Rc<PropertyInfo>>,
}

impl RecordInfo {
    pub fn new(name: &str) -> RecordInfo {
        RecordInfo {
            name: Symbol::new(name),
            fields: Vec::new(),
            properties: IndexMap::new(),
        }
    }

    pub fn field(mut self, name: &str, type_name: &str) -> Self {
        self.fields.push(FieldDecl {
            name: Symbol::new(name),
            type_name: Some(Symbol::new(type_name)),
        });
        self
    }

    pub fn property(mut self, prop: PropertyInfo) -> Self {
        self.properties.insert(prop.name.clone(), Rc::new(prop));
        self
    }
}

pub struct InterfaceInfo {
    pub name: Symbol,
    pub properties: IndexMap<Symbol, Rc<PropertyInfo>>,
    pub default_property: Option<Symbol>,
}

impl InterfaceInfo {
    pub fn new(name: &str) -> InterfaceInfo {
        InterfaceInfo {
            name: Symbol::new(name),
            properties: IndexMap::new(),
            default_property: None,
        }
    }

    pub fn property(mut self, prop: PropertyInfo) -> Self {
        if prop.is_default {
            self.default_property = Some(prop.name.clone());
        }
        self.properties.insert(prop.name.clone(), Rc::new(prop));
        self
    }
}

pub struct EnumInfo {
    pub name: Symbol,
    pub members: Vec<Symbol>,
}

impl EnumInfo {
    pub fn new(name: &str, members: &[&str]) -> EnumInfo {
        EnumInfo {
            name: Symbol::new(name),
            members: members.iter().map(|m| Symbol::new(m)).collect(),
        }
    }
}

pub struct SubrangeInfo {
    pub name: Symbol,
    pub lo: i64,
    pub hi: i64,
}

/// A named array type (`TRow = array[1..3] of Integer`).
pub struct ArrayTypeInfo {
    pub name: Symbol,
    pub kind: ArrayKind,
    pub elem_type: Option<Symbol>,
}

/// The type registry. Populated by the host/front end before execution.
#[derive(Default)]
pub struct Registry {
    classes: FxHashMap<Symbol, Rc<ClassInfo>>,
    records: FxHashMap<Symbol, Rc<RecordInfo>>,
    interfaces: FxHashMap<Symbol, Rc<InterfaceInfo>>,
    enums: FxHashMap<Symbol, Rc<EnumInfo>>,
    subranges: FxHashMap<Symbol, Rc<SubrangeInfo>>,
    array_types: FxHashMap<Symbol, Rc<ArrayTypeInfo>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    pub fn register_class(&mut self, info: ClassInfo) {
        self.classes.insert(info.name.clone(), Rc::new(info));
    }

    pub fn register_record(&mut self, info: RecordInfo) {
        self.records.insert(info.name.clone(), Rc::new(info));
    }

    pub fn register_interface(&mut self, info: InterfaceInfo) {
        self.interfaces.insert(info.name.clone(), Rc::new(info));
    }

    pub fn register_enum(&mut self, info: EnumInfo) {
        self.enums.insert(info.name.clone(), Rc::new(info));
    }

    pub fn register_subrange(&mut self, name: &str, lo: i64, hi: i64) {
        let name = Symbol::new(name);
        self.subranges.insert(
            name.clone(),
            Rc::new(SubrangeInfo { name, lo, hi }),
        );
    }

    pub fn register_array_type(
        &mut self,
        name: &str,
        kind: ArrayKind,
        elem_type: Option<&str>,
    ) {
        let name = Symbol::new(name);
        self.array_types.insert(
            name.clone(),
            Rc::new(ArrayTypeInfo {
                name,
                kind,
                elem_type: elem_type.map(Symbol::new),
            }),
        );
    }

    pub fn class(&self, name: &str) -> Option<Rc<ClassInfo>> {
        self.classes.get(fold(name).as_str()).cloned()
    }

    pub fn record_info(&self, name: &str) -> Option<Rc<RecordInfo>> {
        self.records.get(fold(name).as_str()).cloned()
    }

    pub fn interface_info(&self, name: &str) -> Option<Rc<InterfaceInfo>> {
        self.interfaces.get(fold(name).as_str()).cloned()
    }

    pub fn enum_info(&self, name: &str) -> Option<Rc<EnumInfo>> {
        self.enums.get(fold(name).as_str()).cloned()
    }

    pub fn subrange_info(&self, name: &str) -> Option<Rc<SubrangeInfo>> {
        self.subranges.get(fold(name).as_str()).cloned()
    }

    pub fn array_type(&self, name: &str) -> Option<Rc<ArrayTypeInfo>> {
        self.array_types.get(fold(name).as_str()).cloned()
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.classes.contains_key(fold(name).as_str())
    }

    pub fn is_record(&self, name: &str) -> bool {
        self.records.contains_key(fold(name).as_str())
    }

    pub fn is_interface(&self, name: &str) -> bool {
        self.interfaces.contains_key(fold(name).as_str())
    }

    /// Property descriptor on a class, walking the parent chain.
    pub fn class_property(&self, class: &str, name: &str) -> Option<Rc<PropertyInfo>> {
        let mut current = self.class(class);
        let key = fold(name);
        while let Some(info) = current {
            if let Some(prop) = info.properties.get(key.as_str()) {
                return Some(prop.clone());
            }
            current = info.parent.as_ref().and_then(|p| self.class(p.key()));
        }
        None
    }

    pub fn record_property(&self, record: &str, name: &str) -> Option<Rc<PropertyInfo>> {
        self.record_info(record)
            .and_then(|info| info.properties.get(fold(name).as_str()).cloned())
    }

    pub fn interface_property(&self, iface: &str, name: &str) -> Option<Rc<PropertyInfo>> {
        self.interface_info(iface)
            .and_then(|info| info.properties.get(fold(name).as_str()).cloned())
    }

    /// Method lookup on a class, walking the parent chain.
    pub fn class_method(&self, class: &str, name: &str) -> Option<Rc<Routine>> {
        let mut current = self.class(class);
        let key = fold(name);
        while let Some(info) = current {
            if let Some(m) = info.methods.get(key.as_str()) {
                return Some(m.clone());
            }
            current = info.parent.as_ref().and_then(|p| self.class(p.key()));
        }
        None
    }

    /// The default indexed property of a class (parent chain included) or
    /// interface.
    pub fn default_property_of(&self, value: &Value) -> Option<Rc<PropertyInfo>> {
        match value {
            Value::Object(obj) => {
                let mut current = self.class(obj.class_name().key());
                while let Some(info) = current {
                    if let Some(name) = &info.default_property {
                        return info.properties.get(name.key()).cloned();
                    }
                    current = info.parent.as_ref().and_then(|p| self.class(p.key()));
                }
                None
            }
            Value::Interface(iface) => {
                let info = self.interface_info(iface.interface_name.key())?;
                let name = info.default_property.clone()?;
                info.properties.get(name.key()).cloned()
            }
            _ => None,
        }
    }

    /// Resolve a bare identifier as an enum member, yielding its value.
    pub fn enum_member(&self, name: &str) -> Option<crate::value::EnumValue> {
        let key = fold(name);
        for info in self.enums.values() {
            if let Some(ordinal) = info.members.iter().position(|m| m.key() == key) {
                return Some(crate::value::EnumValue {
                    type_name: info.name.clone(),
                    ordinal: ordinal as i64,
                });
            }
        }
        None
    }

    /// Declared instance fields of a class, parent chain first.
    pub fn class_fields(&self, class: &str) -> Vec<FieldDecl> {
        let mut chain = Vec::new();
        let mut current = self.class(class);
        while let Some(info) = current {
            chain.push(info.clone());
            current = info.parent.as_ref().and_then(|p| self.class(p.key()));
        }
        let mut fields = Vec::new();
        for info in chain.iter().rev() {
            fields.extend(info.fields.iter().cloned());
        }
        fields
    }

    /// The zero value for a declared type name.
    pub fn zero_value(&self, type_name: &str) -> Result<Value, ExecError> {
        let key = fold(type_name);
        let value = match key.as_str() {
            "integer" | "int64" | "cardinal" | "byte" | "word" => Value::Int(0),
            "float" | "double" | "single" | "extended" | "real" => Value::Float(0.0),
            "boolean" => Value::Bool(false),
            "string" => Value::Str(Rc::from("")),
            "variant" => Value::Variant(Box::new(Value::Nil)),
            _ => {
                if let Some(sub) = self.subrange_info(&key) {
                    Value::Subrange(SubrangeValue {
                        type_name: sub.name.clone(),
                        lo: sub.lo,
                        hi: sub.hi,
                        value: sub.lo,
                    })
                } else if let Some(en) = self.enum_info(&key) {
                    Value::Enum(crate::value::EnumValue {
                        type_name: en.name.clone(),
                        ordinal: 0,
                    })
                } else if let Some(rec) = self.record_info(&key) {
                    self.zero_record(&rec)?
                } else if let Some(arr) = self.array_type(&key) {
                    self.zero_array(&arr)?
                } else if let Some(iface) = self.interface_info(&key) {
                    // Interface variables start as an unset wrapper so
                    // assignment re-wraps through the interface path.
                    Value::Interface(Rc::new(crate::value::InterfaceInstance {
                        interface_name: iface.name.clone(),
                        underlying: None,
                    }))
                } else if self.is_class(&key) {
                    Value::Nil
                } else {
                    return Err(ExecError::unknown_type(type_name));
                }
            }
        };
        Ok(value)
    }

    /// A record instance with every declared field at its own zero value.
    pub fn zero_record(&self, info: &RecordInfo) -> Result<Value, ExecError> {
        let mut fields = IndexMap::new();
        for field in &info.fields {
            let value = match &field.type_name {
                Some(t) => self.zero_value(t.key())?,
                None => Value::Nil,
            };
            fields.insert(field.name.clone(), value);
        }
        Ok(Value::Record(RecordInstance::with_fields(
            info.name.clone(),
            fields,
        )))
    }

    fn zero_array(&self, info: &ArrayTypeInfo) -> Result<Value, ExecError> {
        match info.kind {
            ArrayKind::Static { low, high } => {
                let len = (high - low + 1).max(0) as usize;
                let elem = match &info.elem_type {
                    Some(t) => self.zero_value(t.key())?,
                    None => Value::Nil,
                };
                let elems = vec![elem; len];
                Ok(Value::Array(ArrayValue::new_static(
                    low,
                    high,
                    info.elem_type.clone(),
                    elems,
                )))
            }
            ArrayKind::Dynamic => Ok(Value::Array(ArrayValue::new_dynamic(
                info.elem_type.clone(),
                Vec::new(),
            ))),
        }
    }
}
