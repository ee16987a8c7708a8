//! # Type Descriptors
//!
//! The polymorphic encoder, decoder, and validator for every wire-representable
//! type. A `TypeDescriptor` is a cheap handle (`Arc` inside) built once when
//! interface metadata is loaded and shared by every call afterwards.
//!
//! ## Wire shapes
//!
//! - **Primitives**: one tagged scalar or string.
//! - **Sequences / Dictionaries**: a size followed by the elements (or key, value pairs).
//! - **Enums**: the enumerator ordinal as an `int`.
//! - **Structs**: members in declaration order, no names.
//! - **Proxies**: the identity as `name` then `category`; an empty name is null.
//! - **Classes**: an instance index (0 for null) and an inline flag. The first
//!   occurrence of an instance carries `(type_id, slice)` pairs from the most
//!   derived type to the root, ended by an empty type id.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::current::Identity;
use crate::marshal::Error;
use crate::marshal::Marshaler;
use crate::marshal::Result;
use crate::marshal::Unmarshaler;
use crate::value::ObjectValue;
use crate::value::Value;

/// Built-in scalar and string types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Byte => "byte",
            Primitive::Short => "short",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::String => "string",
        }
    }
}

/// A named, typed data member of a struct, class, or exception.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub ty: TypeDescriptor,
}

impl Member {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self { name: name.into(), ty }
    }
}

#[derive(Debug)]
pub struct EnumDescriptor {
    pub type_id: String,
    pub enumerators: Vec<String>,
}

impl EnumDescriptor {
    pub fn new(type_id: impl Into<String>, enumerators: &[&str]) -> Self {
        Self {
            type_id: type_id.into(),
            enumerators: enumerators.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn ordinal(&self, enumerator: &str) -> Option<usize> {
        self.enumerators.iter().position(|e| e == enumerator)
    }
}

#[derive(Debug)]
pub struct StructDescriptor {
    pub type_id: String,
    pub members: Vec<Member>,
}

impl StructDescriptor {
    pub fn new(type_id: impl Into<String>, members: Vec<Member>) -> Self {
        Self { type_id: type_id.into(), members }
    }
}

/// A proxy type. Any identity with a name is accepted; the type id is informational.
#[derive(Debug)]
pub struct ProxyDescriptor {
    pub type_id: String,
}

/// A class type with single inheritance.
#[derive(Debug)]
pub struct ClassDescriptor {
    pub type_id: String,
    pub base: Option<Arc<ClassDescriptor>>,
    /// Members declared at this level only.
    pub members: Vec<Member>,
}

impl ClassDescriptor {
    pub fn new(type_id: impl Into<String>, base: Option<Arc<ClassDescriptor>>, members: Vec<Member>) -> Self {
        Self { type_id: type_id.into(), base, members }
    }

    /// This class followed by its ancestors, most derived first.
    pub fn chain(&self) -> impl Iterator<Item = &ClassDescriptor> {
        std::iter::successors(Some(self), |c| c.base.as_deref())
    }

    /// True if `self` is `other` or derives from it.
    pub fn is_a(&self, other: &ClassDescriptor) -> bool {
        self.chain().any(|c| c.type_id == other.type_id)
    }
}

// ============================================================================
//  TYPE DESCRIPTOR
// ============================================================================

/// Validates, marshals, and unmarshals values of one wire type.
#[derive(Debug, Clone)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    Sequence(Arc<TypeDescriptor>),
    Dictionary(Arc<TypeDescriptor>, Arc<TypeDescriptor>),
    Enum(Arc<EnumDescriptor>),
    Struct(Arc<StructDescriptor>),
    Proxy(Arc<ProxyDescriptor>),
    Class(Arc<ClassDescriptor>),
}

impl TypeDescriptor {
    pub fn bool() -> Self { Self::Primitive(Primitive::Bool) }
    pub fn byte() -> Self { Self::Primitive(Primitive::Byte) }
    pub fn short() -> Self { Self::Primitive(Primitive::Short) }
    pub fn int() -> Self { Self::Primitive(Primitive::Int) }
    pub fn long() -> Self { Self::Primitive(Primitive::Long) }
    pub fn float() -> Self { Self::Primitive(Primitive::Float) }
    pub fn double() -> Self { Self::Primitive(Primitive::Double) }
    pub fn string() -> Self { Self::Primitive(Primitive::String) }

    pub fn sequence(elem: TypeDescriptor) -> Self {
        Self::Sequence(Arc::new(elem))
    }

    pub fn dictionary(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::Dictionary(Arc::new(key), Arc::new(value))
    }

    pub fn proxy(type_id: impl Into<String>) -> Self {
        Self::Proxy(Arc::new(ProxyDescriptor { type_id: type_id.into() }))
    }

    /// Checks that `value` can be marshaled as this type.
    pub fn validate(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Primitive(p), v) => matches!(
                (p, v),
                (Primitive::Bool, Value::Bool(_))
                    | (Primitive::Byte, Value::Byte(_))
                    | (Primitive::Short, Value::Short(_))
                    | (Primitive::Int, Value::Int(_))
                    | (Primitive::Long, Value::Long(_))
                    | (Primitive::Float, Value::Float(_))
                    | (Primitive::Double, Value::Double(_))
                    | (Primitive::String, Value::String(_))
            ),
            (Self::Sequence(elem), Value::Sequence(items)) => {
                items.iter().all(|item| elem.validate(item))
            }
            (Self::Dictionary(k, v), Value::Dictionary(pairs)) => {
                pairs.iter().all(|(key, val)| k.validate(key) && v.validate(val))
            }
            (Self::Enum(e), Value::Enum(name)) => e.ordinal(name).is_some(),
            (Self::Struct(s), Value::Struct(members)) => {
                members.len() == s.members.len()
                    && s.members.iter().zip(members).all(|(decl, (name, val))| {
                        decl.name == *name && decl.ty.validate(val)
                    })
            }
            (Self::Proxy(_), Value::None) => true,
            (Self::Proxy(_), Value::Proxy(id)) => !id.name.is_empty(),
            (Self::Class(_), Value::None) => true,
            (Self::Class(c), Value::Object(obj)) => {
                obj.class.is_a(c)
                    && obj.class.chain().all(|level| {
                        level.members.iter().all(|m| {
                            obj.member(&m.name).is_some_and(|v| m.ty.validate(v))
                        })
                    })
            }
            _ => false,
        }
    }

    /// Appends `value` to the stream.
    ///
    /// Callers validate first; a mismatch found here is still reported as
    /// `Error::InvalidValue` rather than producing bytes.
    pub fn marshal(&self, value: &Value, m: &mut Marshaler) -> Result<()> {
        m.enter()?;
        let result = self.marshal_impl(value, m);
        m.leave();
        result
    }

    fn marshal_impl(&self, value: &Value, m: &mut Marshaler) -> Result<()> {
        match (self, value) {
            (Self::Primitive(Primitive::Bool), Value::Bool(v)) => m.stream().write_bool(*v),
            (Self::Primitive(Primitive::Byte), Value::Byte(v)) => m.stream().write_byte(*v),
            (Self::Primitive(Primitive::Short), Value::Short(v)) => m.stream().write_short(*v),
            (Self::Primitive(Primitive::Int), Value::Int(v)) => m.stream().write_int(*v),
            (Self::Primitive(Primitive::Long), Value::Long(v)) => m.stream().write_long(*v),
            (Self::Primitive(Primitive::Float), Value::Float(v)) => m.stream().write_float(*v),
            (Self::Primitive(Primitive::Double), Value::Double(v)) => m.stream().write_double(*v),
            (Self::Primitive(Primitive::String), Value::String(v)) => m.stream().write_string(v)?,

            (Self::Sequence(elem), Value::Sequence(items)) => {
                m.stream().write_size(items.len())?;
                for item in items {
                    elem.marshal(item, m)?;
                }
            }

            (Self::Dictionary(k, v), Value::Dictionary(pairs)) => {
                m.stream().write_size(pairs.len())?;
                for (key, val) in pairs {
                    k.marshal(key, m)?;
                    v.marshal(val, m)?;
                }
            }

            (Self::Enum(e), Value::Enum(name)) => {
                let ordinal = e.ordinal(name).ok_or_else(|| Error::UnknownEnumerator {
                    type_id: e.type_id.clone(),
                    enumerator: name.clone(),
                })?;
                let ordinal = i32::try_from(ordinal).map_err(|_| Error::UnknownEnumerator {
                    type_id: e.type_id.clone(),
                    enumerator: name.clone(),
                })?;
                m.stream().write_int(ordinal);
            }

            (Self::Struct(s), Value::Struct(members)) => {
                for decl in &s.members {
                    let val = members
                        .iter()
                        .find(|(name, _)| *name == decl.name)
                        .map(|(_, v)| v)
                        .ok_or_else(|| Error::MissingMember {
                            type_id: s.type_id.clone(),
                            member: decl.name.clone(),
                        })?;
                    decl.ty.marshal(val, m)?;
                }
            }

            (Self::Proxy(_), Value::None) => {
                m.stream().write_string("")?;
                m.stream().write_string("")?;
            }
            (Self::Proxy(_), Value::Proxy(id)) if !id.name.is_empty() => {
                m.stream().write_string(&id.name)?;
                m.stream().write_string(&id.category)?;
            }

            (Self::Class(_), Value::None) => m.stream().write_size(0)?,
            (Self::Class(c), Value::Object(obj)) => {
                if !obj.class.is_a(c) {
                    return Err(Error::TypeIdMismatch {
                        expected: c.type_id.clone(),
                        found: obj.class.type_id.clone(),
                    });
                }
                let (index, inline) = m.instance_index(obj);
                m.stream().write_size(index)?;
                m.stream().write_bool(inline);
                if inline {
                    marshal_instance(obj, m)?;
                }
            }

            (ty, v) => {
                return Err(Error::InvalidValue { expected: ty.to_string(), found: v.kind() });
            }
        }
        Ok(())
    }

    /// Reads one value of this type from the stream.
    pub fn unmarshal(&self, u: &mut Unmarshaler<'_>) -> Result<Value> {
        u.enter()?;
        let result = self.unmarshal_impl(u);
        u.leave();
        result
    }

    fn unmarshal_impl(&self, u: &mut Unmarshaler<'_>) -> Result<Value> {
        let value = match self {
            Self::Primitive(Primitive::Bool) => Value::Bool(u.stream().read_bool()?),
            Self::Primitive(Primitive::Byte) => Value::Byte(u.stream().read_byte()?),
            Self::Primitive(Primitive::Short) => Value::Short(u.stream().read_short()?),
            Self::Primitive(Primitive::Int) => Value::Int(u.stream().read_int()?),
            Self::Primitive(Primitive::Long) => Value::Long(u.stream().read_long()?),
            Self::Primitive(Primitive::Float) => Value::Float(u.stream().read_float()?),
            Self::Primitive(Primitive::Double) => Value::Double(u.stream().read_double()?),
            Self::Primitive(Primitive::String) => Value::String(u.stream().read_string()?.to_string()),

            Self::Sequence(elem) => {
                let n = u.stream().read_size()?;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(elem.unmarshal(u)?);
                }
                Value::Sequence(items)
            }

            Self::Dictionary(k, v) => {
                let n = u.stream().read_size()?;
                let mut pairs = Vec::with_capacity(n);
                for _ in 0..n {
                    let key = k.unmarshal(u)?;
                    let val = v.unmarshal(u)?;
                    pairs.push((key, val));
                }
                Value::Dictionary(pairs)
            }

            Self::Enum(e) => {
                let ordinal = u.stream().read_int()?;
                let name = usize::try_from(ordinal)
                    .ok()
                    .and_then(|i| e.enumerators.get(i))
                    .ok_or_else(|| Error::UnknownEnumerator {
                        type_id: e.type_id.clone(),
                        enumerator: ordinal.to_string(),
                    })?;
                Value::Enum(name.clone())
            }

            Self::Struct(s) => {
                let mut members = Vec::with_capacity(s.members.len());
                for decl in &s.members {
                    members.push((decl.name.clone(), decl.ty.unmarshal(u)?));
                }
                Value::Struct(members)
            }

            Self::Proxy(_) => {
                let name = u.stream().read_string()?;
                let category = u.stream().read_string()?;
                match (name.is_empty(), category.is_empty()) {
                    (false, _) => Value::Proxy(Identity::with_category(name, category)),
                    (true, true) => Value::None,
                    (true, false) => {
                        return Err(Error::ProtocolViolation(format!(
                            "null proxy with category {}", category
                        )));
                    }
                }
            }

            Self::Class(c) => {
                let index = u.stream().read_index()?;
                if index == 0 {
                    return Ok(Value::None);
                }
                let inline = u.stream().read_bool()?;
                let obj = if inline {
                    u.reserve_instance(index)?;
                    let obj = Arc::new(unmarshal_instance(u)?);
                    u.complete_instance(index, Arc::clone(&obj));
                    obj
                } else {
                    u.instance(index)?
                };
                if !obj.class.is_a(c) {
                    return Err(Error::TypeIdMismatch {
                        expected: c.type_id.clone(),
                        found: obj.class.type_id.clone(),
                    });
                }
                Value::Object(obj)
            }
        };
        Ok(value)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => write!(f, "{}", p.name()),
            Self::Sequence(elem) => write!(f, "sequence<{}>", elem),
            Self::Dictionary(k, v) => write!(f, "dictionary<{}, {}>", k, v),
            Self::Enum(e) => write!(f, "{}", e.type_id),
            Self::Struct(s) => write!(f, "{}", s.type_id),
            Self::Proxy(p) => write!(f, "{}*", p.type_id),
            Self::Class(c) => write!(f, "{}", c.type_id),
        }
    }
}

// ============================================================================
//  CLASS INSTANCES
// ============================================================================

fn marshal_instance(obj: &ObjectValue, m: &mut Marshaler) -> Result<()> {
    for level in obj.class.chain() {
        m.stream().write_string(&level.type_id)?;
        m.stream().start_slice();
        for decl in &level.members {
            let val = obj.member(&decl.name).ok_or_else(|| Error::MissingMember {
                type_id: level.type_id.clone(),
                member: decl.name.clone(),
            })?;
            decl.ty.marshal(val, m)?;
        }
        m.stream().end_slice()?;
    }
    m.stream().write_string("")?;
    Ok(())
}

/// Decodes an instance from its first slice onward.
///
/// Slices whose type id is not registered are skipped, so an instance of a
/// newer derived class arrives as its most derived known ancestor.
fn unmarshal_instance(u: &mut Unmarshaler<'_>) -> Result<ObjectValue> {
    let mut most_derived: Option<String> = None;
    loop {
        let id = u.stream().read_string()?;
        if id.is_empty() {
            return Err(Error::NoClassFactory(most_derived.unwrap_or_default()));
        }
        most_derived.get_or_insert_with(|| id.to_string());

        let Some(class) = u.registry().class(id) else {
            u.stream().skip_slice()?;
            continue;
        };

        let mut members = BTreeMap::new();
        let mut first = true;
        for level in class.chain() {
            if !first {
                let next = u.stream().read_string()?;
                if next != level.type_id {
                    return Err(Error::ProtocolViolation(format!(
                        "expected slice for {}, found {}", level.type_id, next
                    )));
                }
            }
            first = false;
            u.in_slice(|u| {
                for decl in &level.members {
                    members.insert(decl.name.clone(), decl.ty.unmarshal(u)?);
                }
                Ok(())
            })?;
        }

        let end = u.stream().read_string()?;
        if !end.is_empty() {
            return Err(Error::ProtocolViolation(format!(
                "trailing slice {} after root class {}", end, class.type_id
            )));
        }
        return Ok(ObjectValue { class, members });
    }
}
