// ABOUTME: Comparer registry — dispatch table mapping a runtime type to an ordering function.

use crate::error::EvalError;
use crate::value::{to_decimal, TypeTag, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// An ordering function returning `{-1,0,1}` (§3 "Comparer").
pub type ComparerFn = Rc<dyn Fn(&Value, &Value) -> Result<i32, EvalError>>;

/// Key a comparer is registered under: a runtime tag, or a host-type token
/// (§3: "keyed by variant tag or by host-type token").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComparerKey {
    Tag(TypeTag),
    HostType(String),
}

/// Ordered mapping from type-tag/host-type predicate to ordering function,
/// plus the three built-ins that are always present (§3). The host may
/// register additional entries via [`ComparerRegistry::register`] (sourced
/// from its `known_comparers` capability, §6.2).
pub struct ComparerRegistry {
    entries: HashMap<ComparerKey, ComparerFn>,
}

impl Default for ComparerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComparerRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, key: ComparerKey, comparer: ComparerFn) {
        self.entries.insert(key, comparer);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = (ComparerKey, ComparerFn)>) {
        self.entries.extend(entries);
    }

    fn lookup(&self, key: &ComparerKey) -> Option<&ComparerFn> {
        self.entries.get(key)
    }
}

/// (a) `NullComparer`: 0 if both sides are `Null`, otherwise 1 (§3).
pub fn null_comparer(left: &Value, right: &Value) -> Result<i32, EvalError> {
    Ok(if left.is_null() && right.is_null() { 0 } else { 1 })
}

/// (b) `NumericComparer`: widens both sides to `Decimal` and compares (§3).
pub fn numeric_comparer(left: &Value, right: &Value) -> Result<i32, EvalError> {
    let l = to_decimal(left)?;
    let r = to_decimal(right)?;
    Ok(match l.cmp(&r) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    })
}

/// `DefaultComparer`: natural ordering of scalar values, used as the final
/// fallback (§3).
pub fn default_comparer(left: &Value, right: &Value) -> Result<i32, EvalError> {
    let ord = match (left, right) {
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Character(a), Value::Character(b)) => a.cmp(b),
        (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
        (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
        (Value::Duration(a), Value::Duration(b)) => a.cmp(b),
        (Value::Guid(a), Value::Guid(b)) => a.cmp(b),
        _ => {
            return Err(EvalError::type_error(
                format!(
                    "no comparer available between {:?} and {:?}",
                    left.type_tag(),
                    right.type_tag()
                ),
                None,
            ))
        }
    };
    Ok(match ord {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    })
}

/// Resolves and runs the comparer for `left`/`right` per the dispatch
/// algorithm in §4.2:
///
/// 1. either side `Null` → null-aware comparer;
/// 2. both numeric (`Integer`/`Decimal`, possibly mixed) → numeric comparer;
/// 3. differing tags where one is a host object assignable from the other →
///    the registry entry for the narrower host-type token (§3; since the
///    host type hierarchy itself is out of this crate's scope, both tokens
///    are tried, left operand's first — see DESIGN.md);
/// 4. same tag → registry entry for that tag;
/// 5. otherwise → the default comparer.
pub fn compare(registry: &ComparerRegistry, left: &Value, right: &Value) -> Result<i32, EvalError> {
    if left.is_null() || right.is_null() {
        return null_comparer(left, right);
    }
    if left.is_numeric() && right.is_numeric() {
        return numeric_comparer(left, right);
    }
    if let (Some(lt), Some(rt)) = (left.host_type_tag(), right.host_type_tag()) {
        if lt != rt {
            if let Some(f) = registry.lookup(&ComparerKey::HostType(lt.to_string())) {
                return f(left, right);
            }
            if let Some(f) = registry.lookup(&ComparerKey::HostType(rt.to_string())) {
                return f(left, right);
            }
            return default_comparer(left, right);
        }
    }
    if left.type_tag() == right.type_tag() {
        if let Some(f) = registry.lookup(&ComparerKey::Tag(left.type_tag())) {
            return f(left, right);
        }
        if let Some(tag) = left.host_type_tag() {
            if let Some(f) = registry.lookup(&ComparerKey::HostType(tag.to_string())) {
                return f(left, right);
            }
        }
    }
    default_comparer(left, right)
}
