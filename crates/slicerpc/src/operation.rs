//! # Operation Descriptors
//!
//! The resolved, immutable description of one remote operation. A descriptor
//! is built once from `OperationMetadata` and then shared (`Arc`) by every
//! invocation and dispatch of that operation across tasks.
//!
//! The client path lives in `invoke.rs`, the server path in `dispatch.rs`.
//!
//! ## Slots
//! - In-params occupy argument slots `0..n_in`, in declaration order.
//! - The return value occupies result slot 0.
//! - Out-params occupy result slots starting at 1 when there is a return
//!   value, at 0 otherwise.

use std::fmt;
use std::sync::Arc;

use crate::exception::ExceptionDescriptor;
use crate::metadata::MetadataError;
use crate::metadata::OperationMetadata;
use crate::metadata::TypeRef;
use crate::registry::Registry;
use crate::types::TypeDescriptor;

/// Whether repeating the operation is safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationMode {
    #[default]
    Normal,
    Idempotent,
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Idempotent => write!(f, "idempotent"),
        }
    }
}

/// A parameter and the slot its value occupies.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub slot: usize,
    pub ty: TypeDescriptor,
}

#[derive(Debug)]
pub struct OperationDescriptor {
    pub name: String,
    pub mode: OperationMode,
    pub in_params: Vec<ParameterDescriptor>,
    pub out_params: Vec<ParameterDescriptor>,
    pub return_type: Option<TypeDescriptor>,
    pub exceptions: Vec<Arc<ExceptionDescriptor>>,
}

impl OperationDescriptor {
    /// Resolves `meta` against `registry`.
    ///
    /// Fails if any type ref or declared exception id is unknown.
    pub fn new(registry: &Registry, meta: OperationMetadata) -> Result<Self, MetadataError> {
        let resolve = |r: TypeRef| match r {
            TypeRef::Resolved(ty) => Ok(ty),
            TypeRef::Named(id) => registry.type_by_id(&id).ok_or_else(|| MetadataError::UnknownType {
                operation: meta.name.clone(),
                type_id: id,
            }),
        };

        let return_type = meta.returns.clone().map(resolve).transpose()?;
        let first_out = usize::from(return_type.is_some());

        let in_params = meta
            .inputs
            .iter()
            .cloned()
            .enumerate()
            .map(|(slot, r)| Ok(ParameterDescriptor { slot, ty: resolve(r)? }))
            .collect::<Result<Vec<_>, MetadataError>>()?;

        let out_params = meta
            .outputs
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, r)| Ok(ParameterDescriptor { slot: first_out + i, ty: resolve(r)? }))
            .collect::<Result<Vec<_>, MetadataError>>()?;

        let exceptions = meta
            .throws
            .iter()
            .map(|id| {
                registry.exception(id).ok_or_else(|| MetadataError::UnknownException {
                    operation: meta.name.clone(),
                    type_id: id.clone(),
                })
            })
            .collect::<Result<Vec<_>, MetadataError>>()?;

        Ok(Self {
            name: meta.name,
            mode: meta.mode,
            in_params,
            out_params,
            return_type,
            exceptions,
        })
    }

    /// Number of values a successful reply carries.
    pub fn result_count(&self) -> usize {
        self.out_params.len() + usize::from(self.return_type.is_some())
    }

    /// True if `ex` is one of the declared exceptions or derives from one.
    pub fn declares(&self, ex: &ExceptionDescriptor) -> bool {
        self.exceptions.iter().any(|declared| ex.is_a(declared))
    }
}
