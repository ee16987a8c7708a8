//! Per-request call context handed to servant methods.

use std::collections::HashMap;
use std::fmt;

use crate::operation::OperationMode;

/// String-keyed side-channel metadata carried alongside one call.
pub type Context = HashMap<String, String>;

/// The identity of a remote object: `category/name`, or just `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    pub name: String,
    pub category: String,
}

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), category: String::new() }
    }

    pub fn with_category(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self { name: name.into(), category: category.into() }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.category.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.category, self.name)
        }
    }
}

/// Information about the request being dispatched.
///
/// Built by the adapter for every incoming request and passed to the servant
/// method as the last argument slot.
#[derive(Debug, Clone)]
pub struct Current {
    /// Name of the adapter that received the request.
    pub adapter: String,
    pub id: Identity,
    pub operation: String,
    pub mode: OperationMode,
    pub ctx: Context,
    /// Zero for oneway requests.
    pub request_id: i32,
}

impl Current {
    pub fn new(adapter: impl Into<String>, id: Identity, operation: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            id,
            operation: operation.into(),
            mode: OperationMode::Normal,
            ctx: Context::new(),
            request_id: 0,
        }
    }
}
