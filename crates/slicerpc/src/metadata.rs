//! # Operation Metadata
//!
//! The loosely-typed description of an operation as it arrives from generated
//! code, before it is resolved against a `Registry` into an
//! `OperationDescriptor`. All resolution failures surface here, at load time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::operation::OperationDescriptor;
use crate::operation::OperationMode;
use crate::types::TypeDescriptor;

/// Errors raised while loading metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// A type ref named a type that is not registered.
    UnknownType { operation: String, type_id: String },
    /// A declared exception id is not registered.
    UnknownException { operation: String, type_id: String },
    /// An id registered twice.
    Duplicate(String),
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType { operation, type_id } => {
                write!(f, "operation `{}': unknown type {}", operation, type_id)
            }
            Self::UnknownException { operation, type_id } => {
                write!(f, "operation `{}': unknown exception {}", operation, type_id)
            }
            Self::Duplicate(id) => write!(f, "{} is already defined", id),
        }
    }
}

impl std::error::Error for MetadataError {}

/// A type given either directly or by registered id.
#[derive(Debug, Clone)]
pub enum TypeRef {
    Resolved(TypeDescriptor),
    Named(String),
}

impl From<TypeDescriptor> for TypeRef {
    fn from(ty: TypeDescriptor) -> Self { Self::Resolved(ty) }
}

impl From<&str> for TypeRef {
    fn from(id: &str) -> Self { Self::Named(id.to_string()) }
}

/// Builder for the description of one operation.
#[derive(Debug, Clone)]
pub struct OperationMetadata {
    pub name: String,
    pub mode: OperationMode,
    pub inputs: Vec<TypeRef>,
    pub outputs: Vec<TypeRef>,
    pub returns: Option<TypeRef>,
    pub throws: Vec<String>,
}

impl OperationMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: OperationMode::Normal,
            inputs: Vec::new(),
            outputs: Vec::new(),
            returns: None,
            throws: Vec::new(),
        }
    }

    pub fn idempotent(mut self) -> Self {
        self.mode = OperationMode::Idempotent;
        self
    }

    pub fn input(mut self, ty: impl Into<TypeRef>) -> Self {
        self.inputs.push(ty.into());
        self
    }

    pub fn output(mut self, ty: impl Into<TypeRef>) -> Self {
        self.outputs.push(ty.into());
        self
    }

    pub fn returns(mut self, ty: impl Into<TypeRef>) -> Self {
        self.returns = Some(ty.into());
        self
    }

    pub fn throws(mut self, type_id: impl Into<String>) -> Self {
        self.throws.push(type_id.into());
        self
    }
}

/// The operations of one interface, by name.
#[derive(Debug)]
pub struct InterfaceDescriptor {
    pub type_id: String,
    operations: HashMap<String, Arc<OperationDescriptor>>,
}

impl InterfaceDescriptor {
    pub(crate) fn new(type_id: String) -> Self {
        Self { type_id, operations: HashMap::new() }
    }

    pub(crate) fn insert(&mut self, op: OperationDescriptor) -> Result<(), MetadataError> {
        if self.operations.contains_key(&op.name) {
            return Err(MetadataError::Duplicate(format!("{}::{}", self.type_id, op.name)));
        }
        self.operations.insert(op.name.clone(), Arc::new(op));
        Ok(())
    }

    pub fn operation(&self, name: &str) -> Option<Arc<OperationDescriptor>> {
        self.operations.get(name).cloned()
    }
}
