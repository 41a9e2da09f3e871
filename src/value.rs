// ABOUTME: The tagged value universe the evaluator computes over, and its coercion helpers.

use crate::ast::Node;
use crate::error::EvalError;
use chrono::{Duration as ChronoDuration, NaiveDateTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use uuid::Uuid;

/// Marker trait for opaque host-supplied objects carried through host calls
/// (§3 `HostObject`). The host's concrete type implements this; the
/// evaluator never inspects it beyond `type_tag` (used for comparer
/// dispatch, §3 "host-type token") and `Debug` (used for `to_text`).
pub trait HostObject: fmt::Debug {
    /// A stable token identifying this object's host-side type, used to key
    /// the comparer registry (§3).
    fn type_tag(&self) -> &str;
}

/// A captured lambda: signature, body subtree, and a snapshot of the
/// defining scope's bindings (§3 "Lambda closure"). The snapshot is a copy
/// by value, never an alias onto the defining scope — see the crate-level
/// invariant in spec.md §3.
#[derive(Debug, Clone)]
pub struct LambdaValue {
    pub signature: Vec<String>,
    pub body: Rc<Node>,
    /// Bindings copied by value at capture time (§3 invariant: "closure
    /// contents are snapshots", never an alias onto the defining scope).
    pub closure: HashMap<String, Value>,
}

/// Ordered sequence of values, indexable by integer position or string key
/// (§3 `Collection`). String keys are optional per element; a collection
/// built purely as an array never populates `keys`.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    items: Vec<Value>,
    keys: IndexMap<String, usize>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<Value>) -> Self {
        Self {
            items,
            keys: IndexMap::new(),
        }
    }

    pub fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    pub fn set_key(&mut self, key: impl Into<String>, index: usize) {
        self.keys.insert(key.into(), index);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get_index(&self, index: i64) -> Option<&Value> {
        if index < 0 {
            return None;
        }
        self.items.get(index as usize)
    }

    pub fn get_key(&self, key: &str) -> Option<&Value> {
        self.keys.get(key).and_then(|&i| self.items.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }
}

/// The tagged value universe (§3). Every binary/unary operator dispatches on
/// the variant(s) involved; unsupported combinations fail with
/// [`EvalError::TypeError`].
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i32),
    Decimal(Decimal),
    Boolean(bool),
    Text(String),
    Character(char),
    DateTime(NaiveDateTime),
    Duration(ChronoDuration),
    Guid(Uuid),
    Null,
    Collection(Collection),
    HostObject(Rc<dyn HostObject>),
    Lambda(Rc<LambdaValue>),
}

/// Runtime type tag, used by the comparer registry (§3) and the numeric
/// predicate the design notes ask for in place of a module-level type list
/// (§9 "Global mutable state").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Integer,
    Decimal,
    Boolean,
    Text,
    Character,
    DateTime,
    Duration,
    Guid,
    Null,
    Collection,
    HostObject,
    Lambda,
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Integer(_) => TypeTag::Integer,
            Value::Decimal(_) => TypeTag::Decimal,
            Value::Boolean(_) => TypeTag::Boolean,
            Value::Text(_) => TypeTag::Text,
            Value::Character(_) => TypeTag::Character,
            Value::DateTime(_) => TypeTag::DateTime,
            Value::Duration(_) => TypeTag::Duration,
            Value::Guid(_) => TypeTag::Guid,
            Value::Null => TypeTag::Null,
            Value::Collection(_) => TypeTag::Collection,
            Value::HostObject(_) => TypeTag::HostObject,
            Value::Lambda(_) => TypeTag::Lambda,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The numeric-type predicate called for by §9's design note: replaces
    /// a module-level "numeric types" list with a tag check.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Decimal(_))
    }

    pub fn host_type_tag(&self) -> Option<&str> {
        match self {
            Value::HostObject(obj) => Some(obj.type_tag()),
            _ => None,
        }
    }
}

/// Structural equality used only by tests and by same-tag fast paths; the
/// language's `==`/`!=` operators go through the comparer registry instead
/// (spec §4.2), since they must widen mixed numeric tags and treat
/// mismatched incomparable tags as "not equal" rather than a Rust-level
/// `PartialEq` mismatch.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Character(a), Value::Character(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Guid(a), Value::Guid(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Collection(a), Value::Collection(b)) => {
                a.items == b.items && a.keys.len() == b.keys.len()
            }
            (Value::HostObject(a), Value::HostObject(b)) => Rc::ptr_eq(a, b),
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", to_text(self))
    }
}

/// `to_integer(v)` (§4.1): accepts `Integer`, `Decimal` (truncating toward
/// zero), `Boolean` (false→0, true→1), `Text` parseable as an integer.
pub fn to_integer(v: &Value) -> Result<i32, EvalError> {
    match v {
        Value::Integer(n) => Ok(*n),
        Value::Decimal(d) => d
            .trunc()
            .to_i32()
            .ok_or_else(|| EvalError::type_error(format!("decimal {d} does not fit in an integer"), None)),
        Value::Boolean(b) => Ok(if *b { 1 } else { 0 }),
        Value::Text(s) => s
            .trim()
            .parse::<i32>()
            .map_err(|_| EvalError::type_error(format!("text \"{s}\" is not a valid integer"), None)),
        other => Err(EvalError::type_error(
            format!("cannot convert {} to integer", other.type_tag_name()),
            None,
        )),
    }
}

/// `to_decimal(v)` (§4.1): accepts all numeric variants, `Boolean`, `Text`
/// parseable as a decimal in the invariant locale (accepts both `.` and
/// grouping separators).
pub fn to_decimal(v: &Value) -> Result<Decimal, EvalError> {
    match v {
        Value::Integer(n) => Ok(Decimal::from(*n)),
        Value::Decimal(d) => Ok(*d),
        Value::Boolean(b) => Ok(if *b { Decimal::ONE } else { Decimal::ZERO }),
        Value::Text(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            Decimal::from_str(&cleaned)
                .map_err(|_| EvalError::type_error(format!("text \"{s}\" is not a valid decimal"), None))
        }
        other => Err(EvalError::type_error(
            format!("cannot convert {} to decimal", other.type_tag_name()),
            None,
        )),
    }
}

/// `to_boolean(v)` (§4.1): accepts `Boolean`, `Text` in `{true,false}`
/// case-insensitive.
pub fn to_boolean(v: &Value) -> Result<bool, EvalError> {
    match v {
        Value::Boolean(b) => Ok(*b),
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(EvalError::type_error(
                format!("text \"{s}\" is not a valid boolean"),
                None,
            )),
        },
        other => Err(EvalError::type_error(
            format!("cannot convert {} to boolean", other.type_tag_name()),
            None,
        )),
    }
}

/// `to_text(v)` (§4.1): total — every variant has a canonical textual form.
pub fn to_text(v: &Value) -> String {
    match v {
        Value::Integer(n) => n.to_string(),
        Value::Decimal(d) => format_decimal(*d),
        Value::Boolean(b) => b.to_string(),
        Value::Text(s) => s.clone(),
        Value::Character(c) => c.to_string(),
        Value::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        Value::Duration(d) => format_duration(*d),
        Value::Guid(g) => g.to_string(),
        Value::Null => String::new(),
        Value::Collection(c) => {
            let parts: Vec<String> = c.iter().map(to_text).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::HostObject(obj) => format!("{obj:?}"),
        Value::Lambda(_) => "<lambda>".to_string(),
    }
}

/// Trims non-significant trailing zeros; keeps at least one fractional
/// digit when the magnitude is below 1 and non-zero (§4.1).
fn format_decimal(d: Decimal) -> String {
    let normalized = d.normalize();
    let text = normalized.to_string();
    if normalized.abs() < Decimal::ONE && !text.contains('.') && normalized != Decimal::ZERO {
        format!("{text}.0")
    } else {
        text
    }
}

fn format_duration(d: ChronoDuration) -> String {
    let negative = d < ChronoDuration::zero();
    let magnitude = if negative { -d } else { d };
    let days = magnitude.num_days();
    let hours = magnitude.num_hours() % 24;
    let minutes = magnitude.num_minutes() % 60;
    let seconds = magnitude.num_seconds() % 60;
    let millis = magnitude.num_milliseconds() % 1000;
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('P');
    if days != 0 {
        out.push_str(&format!("{days}D"));
    }
    out.push('T');
    out.push_str(&format!("{hours:02}H{minutes:02}M{seconds:02}.{millis:03}S"));
    out
}

impl Value {
    fn type_tag_name(&self) -> &'static str {
        match self.type_tag() {
            TypeTag::Integer => "Integer",
            TypeTag::Decimal => "Decimal",
            TypeTag::Boolean => "Boolean",
            TypeTag::Text => "Text",
            TypeTag::Character => "Character",
            TypeTag::DateTime => "DateTime",
            TypeTag::Duration => "Duration",
            TypeTag::Guid => "Guid",
            TypeTag::Null => "Null",
            TypeTag::Collection => "Collection",
            TypeTag::HostObject => "HostObject",
            TypeTag::Lambda => "Lambda",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_display_has_no_decimal_point() {
        assert_eq!(format!("{}", Value::Integer(42)), "42");
    }

    #[test]
    fn decimal_trims_trailing_zeros() {
        let v = Value::Decimal(Decimal::from_str("2.500").unwrap());
        assert_eq!(format!("{}", v), "2.5");
    }

    #[test]
    fn null_renders_as_empty_text() {
        assert_eq!(to_text(&Value::Null), "");
    }

    #[test]
    fn to_integer_truncates_decimal_toward_zero() {
        let v = Value::Decimal(Decimal::from_str("-3.9").unwrap());
        assert_eq!(to_integer(&v).unwrap(), -3);
    }

    #[test]
    fn to_boolean_accepts_case_insensitive_text() {
        assert!(to_boolean(&Value::Text("TRUE".into())).unwrap());
        assert!(!to_boolean(&Value::Text("False".into())).unwrap());
        assert!(to_boolean(&Value::Text("nope".into())).is_err());
    }

    #[test]
    fn to_decimal_accepts_grouping_separators() {
        let v = Value::Text("1,234.50".into());
        assert_eq!(to_decimal(&v).unwrap(), Decimal::from_str("1234.50").unwrap());
    }

    #[test]
    fn collection_supports_integer_and_string_indexing() {
        let mut c = Collection::new();
        c.push(Value::Integer(10));
        c.push(Value::Integer(20));
        c.set_key("second", 1);
        assert_eq!(c.get_index(0), Some(&Value::Integer(10)));
        assert_eq!(c.get_key("second"), Some(&Value::Integer(20)));
    }

    #[test]
    fn is_numeric_predicate_covers_integer_and_decimal_only() {
        assert!(Value::Integer(1).is_numeric());
        assert!(Value::Decimal(Decimal::ONE).is_numeric());
        assert!(!Value::Text("1".into()).is_numeric());
        assert!(!Value::Boolean(true).is_numeric());
    }
}
