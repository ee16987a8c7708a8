//! # Values
//!
//! The dynamic values that flow through an operation: arguments going out,
//! results coming back, and the members of user exceptions.
//!
//! A `Value` is pure data. What it *means* on the wire is decided by the
//! `TypeDescriptor` it is validated and marshaled against.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::current::Identity;
use crate::types::ClassDescriptor;

/// A host-runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent: a null proxy, a null object, or "no context".
    None,
    Bool(bool),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Sequence(Vec<Value>),
    /// Ordered key/value pairs.
    Dictionary(Vec<(Value, Value)>),
    /// An enumerator, by name.
    Enum(String),
    /// Struct members by name, in declaration order.
    Struct(Vec<(String, Value)>),
    Proxy(Identity),
    Object(Arc<ObjectValue>),
    /// Several results at once: `(return, out1, out2, ...)`.
    Tuple(Vec<Value>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Builds a string-to-string dictionary, e.g. a call context.
    pub fn context<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Value::Dictionary(
            pairs
                .into_iter()
                .map(|(k, v)| (Value::String(k.into()), Value::String(v.into())))
                .collect(),
        )
    }

    pub fn object(obj: ObjectValue) -> Self {
        Value::Object(Arc::new(obj))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Interprets the value as a string-to-string mapping.
    ///
    /// Returns `None` if it is not a dictionary or any key or value is not a string.
    pub fn as_string_map(&self) -> Option<HashMap<String, String>> {
        let Value::Dictionary(pairs) = self else { return None };
        pairs
            .iter()
            .map(|(k, v)| match (k, v) {
                (Value::String(k), Value::String(v)) => Some((k.clone(), v.clone())),
                _ => None,
            })
            .collect()
    }

    /// Short name of the value's kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Dictionary(_) => "dictionary",
            Value::Enum(_) => "enum",
            Value::Struct(_) => "struct",
            Value::Proxy(_) => "proxy",
            Value::Object(_) => "object",
            Value::Tuple(_) => "tuple",
        }
    }
}

/// An instance of a class type.
///
/// Instances are shared through `Arc`; the same instance referenced twice in
/// one request is sent once and comes back shared.
#[derive(Debug, Clone)]
pub struct ObjectValue {
    pub class: Arc<ClassDescriptor>,
    /// Members of every level of the hierarchy, by name.
    pub members: BTreeMap<String, Value>,
}

impl ObjectValue {
    pub fn new(class: Arc<ClassDescriptor>) -> Self {
        Self { class, members: BTreeMap::new() }
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.members.insert(name.into(), value);
        self
    }

    pub fn member(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        self.class.type_id == other.class.type_id && self.members == other.members
    }
}

/// A user exception: the only kind of failure carried across the wire as data.
#[derive(Debug, Clone, PartialEq)]
pub struct UserException {
    pub type_id: String,
    pub members: BTreeMap<String, Value>,
}

impl UserException {
    pub fn new(type_id: impl Into<String>) -> Self {
        Self { type_id: type_id.into(), members: BTreeMap::new() }
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.members.insert(name.into(), value);
        self
    }

    pub fn member(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }
}

impl fmt::Display for UserException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user exception {}", self.type_id)
    }
}

impl std::error::Error for UserException {}
