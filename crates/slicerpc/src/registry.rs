//! # Type Registry
//!
//! Maps type ids to descriptors so that metadata can refer to types by name
//! and so that decoders can resolve the type ids they find on the wire.
//!
//! ## Invariants
//! - **Write-once**: an id is registered at most once; re-registration is an error.
//! - **Shared**: lookups hand out `Arc` clones, never borrows into the maps.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::exception::ExceptionDescriptor;
use crate::metadata::InterfaceDescriptor;
use crate::metadata::MetadataError;
use crate::metadata::OperationMetadata;
use crate::operation::OperationDescriptor;
use crate::types::ClassDescriptor;
use crate::types::EnumDescriptor;
use crate::types::StructDescriptor;
use crate::types::TypeDescriptor;

/// Process-wide table of known types, exceptions, and interfaces.
#[derive(Default)]
pub struct Registry {
    types: DashMap<String, TypeDescriptor>,
    classes: DashMap<String, Arc<ClassDescriptor>>,
    exceptions: DashMap<String, Arc<ExceptionDescriptor>>,
    interfaces: DashMap<String, Arc<InterfaceDescriptor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named type (enum, struct, proxy, or alias).
    pub fn register_type(&self, type_id: impl Into<String>, ty: TypeDescriptor) -> Result<(), MetadataError> {
        insert_once(&self.types, type_id.into(), ty)
    }

    pub fn register_enum(&self, desc: EnumDescriptor) -> Result<TypeDescriptor, MetadataError> {
        let ty = TypeDescriptor::Enum(Arc::new(desc));
        self.register_type(ty.to_string(), ty.clone())?;
        Ok(ty)
    }

    pub fn register_struct(&self, desc: StructDescriptor) -> Result<TypeDescriptor, MetadataError> {
        let ty = TypeDescriptor::Struct(Arc::new(desc));
        self.register_type(ty.to_string(), ty.clone())?;
        Ok(ty)
    }

    /// Registers a class; it then resolves both as a type and on the wire.
    pub fn register_class(&self, desc: ClassDescriptor) -> Result<Arc<ClassDescriptor>, MetadataError> {
        let class = Arc::new(desc);
        insert_once(&self.classes, class.type_id.clone(), Arc::clone(&class))?;
        insert_once(&self.types, class.type_id.clone(), TypeDescriptor::Class(Arc::clone(&class)))?;
        Ok(class)
    }

    pub fn register_exception(&self, desc: ExceptionDescriptor) -> Result<Arc<ExceptionDescriptor>, MetadataError> {
        let ex = Arc::new(desc);
        insert_once(&self.exceptions, ex.type_id.clone(), Arc::clone(&ex))?;
        Ok(ex)
    }

    /// Builds every operation of an interface and registers the result.
    pub fn define_interface(
        &self,
        type_id: impl Into<String>,
        operations: Vec<OperationMetadata>,
    ) -> Result<Arc<InterfaceDescriptor>, MetadataError> {
        let type_id = type_id.into();
        if self.interfaces.contains_key(&type_id) {
            return Err(MetadataError::Duplicate(type_id));
        }
        let mut iface = InterfaceDescriptor::new(type_id.clone());
        for meta in operations {
            let op = OperationDescriptor::new(self, meta)?;
            iface.insert(op)?;
        }
        let iface = Arc::new(iface);
        insert_once(&self.interfaces, type_id, Arc::clone(&iface))?;
        Ok(iface)
    }

    pub fn type_by_id(&self, type_id: &str) -> Option<TypeDescriptor> {
        self.types.get(type_id).map(|t| t.clone())
    }

    pub fn class(&self, type_id: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.get(type_id).map(|c| Arc::clone(&c))
    }

    pub fn exception(&self, type_id: &str) -> Option<Arc<ExceptionDescriptor>> {
        self.exceptions.get(type_id).map(|e| Arc::clone(&e))
    }

    pub fn interface(&self, type_id: &str) -> Option<Arc<InterfaceDescriptor>> {
        self.interfaces.get(type_id).map(|i| Arc::clone(&i))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.types.len())
            .field("classes", &self.classes.len())
            .field("exceptions", &self.exceptions.len())
            .field("interfaces", &self.interfaces.len())
            .finish()
    }
}

fn insert_once<V>(map: &DashMap<String, V>, key: String, value: V) -> Result<(), MetadataError> {
    match map.entry(key) {
        Entry::Occupied(e) => Err(MetadataError::Duplicate(e.key().clone())),
        Entry::Vacant(e) => {
            e.insert(value);
            Ok(())
        }
    }
}
