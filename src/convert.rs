//! Implicit conversion resolution.
//!
//! Finds a direct or chained conversion between two nominal types:
//! registry-driven user conversions plus built-in widenings. Resolution is
//! best-effort by contract: a conversion function that errors counts as
//! "conversion not found", and the caller proceeds with the original value.
//! No error ever propagates out of an optional conversion attempt.

use std::collections::VecDeque;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::Routine;
use crate::error::ExecError;
use crate::symbol::{Symbol, fold};
use crate::value::Value;

/// Longest chain of user conversions the resolver will assemble.
pub const MAX_CHAIN_HOPS: usize = 3;

/// The function behind a registered conversion: a host closure or a
/// one-argument guest routine (invoked by the interpreter).
#[derive(Clone)]
pub enum ConversionFn {
    Native(Rc<dyn Fn(&Value) -> Result<Value, ExecError>>),
    Routine(Rc<Routine>),
}

pub struct Conversion {
    pub from: Symbol,
    pub to: Symbol,
    pub func: ConversionFn,
}

/// Registered user conversions, indexed for direct lookup and breadth-first
/// chain search.
#[derive(Default)]
pub struct Conversions {
    direct: FxHashMap<(String, String), Rc<Conversion>>,
    by_source: FxHashMap<String, Vec<Rc<Conversion>>>,
}

impl Conversions {
    pub fn new() -> Conversions {
        Conversions::default()
    }

    pub fn register(&mut self, from: &str, to: &str, func: ConversionFn) {
        let conv = Rc::new(Conversion {
            from: Symbol::new(from),
            to: Symbol::new(to),
            func,
        });
        self.direct
            .insert((fold(from), fold(to)), conv.clone());
        self.by_source.entry(fold(from)).or_default().push(conv);
    }

    pub fn register_native(
        &mut self,
        from: &str,
        to: &str,
        func: impl Fn(&Value) -> Result<Value, ExecError> + 'static,
    ) {
        self.register(from, to, ConversionFn::Native(Rc::new(func)));
    }

    pub fn register_routine(&mut self, from: &str, to: &str, routine: Routine) {
        self.register(from, to, ConversionFn::Routine(Rc::new(routine)));
    }

    /// A single registered conversion from `from` to `to`, if any.
    pub fn find_direct(&self, from: &str, to: &str) -> Option<Rc<Conversion>> {
        self.direct.get(&(fold(from), fold(to))).cloned()
    }

    /// Breadth-first search for a conversion path of at most `max_hops`
    /// registered conversions. The shortest path wins; ties resolve in
    /// registration order.
    pub fn find_chain(&self, from: &str, to: &str, max_hops: usize) -> Option<Vec<Rc<Conversion>>> {
        let target = fold(to);
        let start = fold(from);
        let mut queue: VecDeque<(String, Vec<Rc<Conversion>>)> = VecDeque::new();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        seen.insert(start.clone());
        queue.push_back((start, Vec::new()));

        while let Some((node, path)) = queue.pop_front() {
            if path.len() >= max_hops {
                continue;
            }
            let Some(edges) = self.by_source.get(&node) else {
                continue;
            };
            for conv in edges {
                let next = conv.to.key().to_owned();
                if !seen.insert(next.clone()) {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(conv.clone());
                if next == target {
                    return Some(next_path);
                }
                queue.push_back((next, next_path));
            }
        }
        None
    }
}

/// Built-in widenings, applied when no user conversion resolves:
/// integer→float always, enum→integer via the ordinal.
pub fn builtin_widening(value: &Value, target_type: &str) -> Option<Value> {
    let target = fold(target_type);
    match (value.unboxed(), target.as_str()) {
        (Value::Int(v), "float" | "double" | "real" | "single" | "extended") => {
            Some(Value::Float(v as f64))
        }
        (Value::Enum(e), "integer" | "int64" | "cardinal") => Some(Value::Int(e.ordinal)),
        _ => None,
    }
}
