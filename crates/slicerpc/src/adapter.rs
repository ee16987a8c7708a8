//! # Object Adapter
//!
//! Routes incoming requests to servants. An adapter owns an identity to
//! servant table, finds the interface a servant implements by its type id,
//! resolves the operation descriptor, builds the `Current`, and hands off to
//! the dispatch engine.

use std::sync::Arc;

use dashmap::DashMap;

use crate::current::Context;
use crate::current::Current;
use crate::current::Identity;
use crate::dispatch;
use crate::dispatch::DispatchError;
use crate::dispatch::DispatchReply;
use crate::host::Exclusive;
use crate::operation::OperationMode;
use crate::registry::Registry;
use crate::servant::Servant;

/// A request as it arrives at an adapter.
#[derive(Debug, Clone)]
pub struct IncomingRequest<'a> {
    pub identity: &'a Identity,
    pub operation: &'a str,
    pub mode: OperationMode,
    pub params: &'a [u8],
    pub context: Context,
    /// Zero for oneway requests.
    pub request_id: i32,
}

pub struct ObjectAdapter {
    name: String,
    registry: Arc<Registry>,
    servants: DashMap<Identity, Arc<Servant>>,
}

impl ObjectAdapter {
    pub fn new(name: impl Into<String>, registry: Arc<Registry>) -> Self {
        Self { name: name.into(), registry, servants: DashMap::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Registers `servant` under `identity`, returning the servant it replaces.
    pub fn add(&self, identity: Identity, servant: Servant) -> Option<Arc<Servant>> {
        self.servants.insert(identity, Arc::new(servant))
    }

    pub fn find(&self, identity: &Identity) -> Option<Arc<Servant>> {
        self.servants.get(identity).map(|s| Arc::clone(&s))
    }

    /// Dispatches one request to the servant registered under its identity.
    pub fn dispatch(&self, host: &Exclusive, request: IncomingRequest<'_>) -> dispatch::Result<DispatchReply> {
        let servant = self.find(request.identity).ok_or_else(|| DispatchError::ObjectNotExist {
            identity: request.identity.clone(),
        })?;

        let op = self
            .registry
            .interface(servant.type_id())
            .and_then(|iface| iface.operation(request.operation))
            .ok_or_else(|| DispatchError::OperationNotExist {
                identity: request.identity.clone(),
                operation: request.operation.to_string(),
            })?;

        let current = Current {
            adapter: self.name.clone(),
            id: request.identity.clone(),
            operation: request.operation.to_string(),
            mode: request.mode,
            ctx: request.context,
            request_id: request.request_id,
        };

        op.dispatch(host, &servant, request.params, current, &self.registry)
    }
}
