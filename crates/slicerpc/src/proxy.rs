//! Client-side handle to a remote object.

use std::fmt;
use std::sync::Arc;

use crate::channel::Channel;
use crate::current::Context;
use crate::current::Identity;
use crate::registry::Registry;

/// An identity reachable through a channel.
///
/// Cheap to clone; the builder methods return modified copies.
#[derive(Clone)]
pub struct Proxy {
    identity: Identity,
    channel: Arc<dyn Channel>,
    registry: Arc<Registry>,
    twoway: bool,
    context: Option<Context>,
}

impl Proxy {
    pub fn new(identity: Identity, channel: Arc<dyn Channel>, registry: Arc<Registry>) -> Self {
        Self { identity, channel, registry, twoway: true, context: None }
    }

    /// A copy whose requests expect no reply.
    pub fn oneway(mut self) -> Self {
        self.twoway = false;
        self
    }

    pub fn twoway(mut self) -> Self {
        self.twoway = true;
        self
    }

    /// A copy that sends `ctx` whenever a call supplies no context of its own.
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.context = Some(ctx);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// Registry used to resolve exceptions and classes in replies.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_twoway(&self) -> bool {
        self.twoway
    }

    pub fn default_context(&self) -> Option<&Context> {
        self.context.as_ref()
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("identity", &self.identity)
            .field("twoway", &self.twoway)
            .field("context", &self.context)
            .finish()
    }
}
