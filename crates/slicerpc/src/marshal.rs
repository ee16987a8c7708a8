//! # Marshaling State
//!
//! Per-call wrappers around the slicepack streams. They carry what a single
//! marshal or unmarshal pass needs beyond raw bytes: the class instance table
//! that preserves object sharing, the registry used to resolve type ids, and
//! a recursion guard.
//!
//! ## Invariants
//! - **Per-call**: a `Marshaler` or `Unmarshaler` never outlives one request or reply.
//! - **Sealed**: bytes only leave a `Marshaler` through `finished()`.
//! - **Recursion Safety**: nesting is bounded by `MAX_RECURSION_DEPTH`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use slicepack::InputStream;
use slicepack::OutputStream;

use crate::registry::Registry;
use crate::value::ObjectValue;

/// The maximum nesting depth for values before giving up.
const MAX_RECURSION_DEPTH: usize = 64;

/// Failures while turning values into bytes or bytes into values.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The underlying stream failed (truncation, bad tag, open slice...).
    Stream(slicepack::Error),
    /// A value did not match the type it was marshaled as.
    InvalidValue { expected: String, found: &'static str },
    /// An enumerator name or ordinal outside the enumeration.
    UnknownEnumerator { type_id: String, enumerator: String },
    /// A struct, class, or exception value lacks a declared member.
    MissingMember { type_id: String, member: String },
    /// No slice of a class instance named a type this side knows.
    NoClassFactory(String),
    /// An instance resolved to a type that is not the one declared.
    TypeIdMismatch { expected: String, found: String },
    /// An instance index that was never defined, or defined twice.
    BadInstanceIndex(usize),
    /// An instance referring to itself while still being decoded.
    CyclicObjectGraph(usize),
    /// The nested depth of the values exceeded the safety limit.
    RecursionLimitExceeded,
    /// The message did not have the expected shape.
    ProtocolViolation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(e) => write!(f, "stream error: {}", e),
            Self::InvalidValue { expected, found } => {
                write!(f, "cannot marshal {} as {}", found, expected)
            }
            Self::UnknownEnumerator { type_id, enumerator } => {
                write!(f, "`{}' is not an enumerator of {}", enumerator, type_id)
            }
            Self::MissingMember { type_id, member } => {
                write!(f, "{} value lacks member `{}'", type_id, member)
            }
            Self::NoClassFactory(id) => write!(f, "no class known for instance of {}", id),
            Self::TypeIdMismatch { expected, found } => {
                write!(f, "expected instance of {}, found {}", expected, found)
            }
            Self::BadInstanceIndex(i) => write!(f, "bad instance index {}", i),
            Self::CyclicObjectGraph(i) => write!(f, "instance {} refers to itself", i),
            Self::RecursionLimitExceeded => write!(f, "value nesting too deep"),
            Self::ProtocolViolation(msg) => write!(f, "protocol violation: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Stream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<slicepack::Error> for Error {
    fn from(e: slicepack::Error) -> Self { Self::Stream(e) }
}

pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
//  MARSHALER
// ============================================================================

/// Write-side state for one request or reply.
pub struct Marshaler {
    out: OutputStream,
    /// Instance address -> 1-based wire index.
    instances: HashMap<usize, usize>,
    depth: usize,
}

impl Marshaler {
    pub fn new() -> Self {
        Self {
            out: OutputStream::new(),
            instances: HashMap::new(),
            depth: 0,
        }
    }

    pub fn stream(&mut self) -> &mut OutputStream {
        &mut self.out
    }

    /// Seals the buffer. Nothing is sendable before this.
    pub fn finished(self) -> Result<Vec<u8>> {
        Ok(self.out.finished()?)
    }

    /// Returns the wire index for `obj` and whether this is its first occurrence.
    pub(crate) fn instance_index(&mut self, obj: &Arc<ObjectValue>) -> (usize, bool) {
        let key = Arc::as_ptr(obj) as usize;
        let next = self.instances.len() + 1;
        match self.instances.get(&key) {
            Some(index) => (*index, false),
            None => {
                self.instances.insert(key, next);
                (next, true)
            }
        }
    }

    pub(crate) fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_RECURSION_DEPTH {
            return Err(Error::RecursionLimitExceeded);
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }
}

impl Default for Marshaler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
//  UNMARSHALER
// ============================================================================

/// Read-side state for one request or reply.
pub struct Unmarshaler<'a> {
    input: InputStream<'a>,
    registry: &'a Registry,
    /// Decoded instances by wire index; `None` while an instance is still being decoded.
    instances: HashMap<usize, Option<Arc<ObjectValue>>>,
    depth: usize,
}

impl<'a> Unmarshaler<'a> {
    /// Opens a sealed buffer.
    pub fn new(bytes: &'a [u8], registry: &'a Registry) -> Result<Self> {
        Ok(Self {
            input: InputStream::new(bytes)?,
            registry,
            instances: HashMap::new(),
            depth: 0,
        })
    }

    pub fn stream(&mut self) -> &mut InputStream<'a> {
        &mut self.input
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Checks the buffer was consumed exactly.
    pub fn finished(&self) -> Result<()> {
        Ok(self.input.finished()?)
    }

    /// Runs `f` against the body of the next slice, which must be consumed exactly.
    pub(crate) fn in_slice<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let body = self.input.slice()?;
        let outer = std::mem::replace(&mut self.input, body);
        let result = f(self).and_then(|v| {
            self.input.finished()?;
            Ok(v)
        });
        self.input = outer;
        result
    }

    /// Claims `index` for an instance about to be decoded inline.
    pub(crate) fn reserve_instance(&mut self, index: usize) -> Result<()> {
        if index == 0 || self.instances.contains_key(&index) {
            return Err(Error::BadInstanceIndex(index));
        }
        self.instances.insert(index, None);
        Ok(())
    }

    pub(crate) fn complete_instance(&mut self, index: usize, obj: Arc<ObjectValue>) {
        self.instances.insert(index, Some(obj));
    }

    /// Looks up an instance decoded earlier in this pass.
    pub(crate) fn instance(&self, index: usize) -> Result<Arc<ObjectValue>> {
        match self.instances.get(&index) {
            Some(Some(obj)) => Ok(Arc::clone(obj)),
            Some(None) => Err(Error::CyclicObjectGraph(index)),
            None => Err(Error::BadInstanceIndex(index)),
        }
    }

    pub(crate) fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_RECURSION_DEPTH {
            return Err(Error::RecursionLimitExceeded);
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }
}
