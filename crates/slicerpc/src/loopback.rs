//! # Loopback Channel
//!
//! An in-process `Channel` that dispatches every request straight into an
//! `ObjectAdapter` on the same host. Request and reply bodies still go
//! through the full marshal path, so the loopback exercises exactly what a
//! networked transport would carry.

use std::sync::Arc;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering;

use tracing::debug;
use tracing::error;

use crate::adapter::IncomingRequest;
use crate::adapter::ObjectAdapter;
use crate::channel;
use crate::channel::Channel;
use crate::channel::ChannelError;
use crate::channel::Reply;
use crate::channel::ReplyStatus;
use crate::channel::Request;
use crate::dispatch::DispatchError;
use crate::host::Host;

pub struct LoopbackChannel {
    adapter: Arc<ObjectAdapter>,
    host: Host,
    next_request_id: AtomicI32,
}

impl LoopbackChannel {
    pub fn new(adapter: Arc<ObjectAdapter>, host: Host) -> Self {
        Self { adapter, host, next_request_id: AtomicI32::new(1) }
    }
}

#[async_trait::async_trait]
impl Channel for LoopbackChannel {
    async fn send(&self, request: Request<'_>) -> channel::Result<Reply> {
        let request_id = if request.twoway { next_request_id(&self.next_request_id) } else { 0 };

        let outcome = {
            let host = self.host.enter().await;
            self.adapter.dispatch(&host, IncomingRequest {
                identity: request.identity,
                operation: request.operation,
                mode: request.mode,
                params: request.params,
                context: request.context.cloned().unwrap_or_default(),
                request_id,
            })
        };

        if let Err(DispatchError::Exit { code }) = outcome {
            error!(operation = request.operation, code, twoway = request.twoway, "servant requested exit");
            return Err(ChannelError::Exit { code });
        }

        if !request.twoway {
            match outcome {
                Ok(_) => debug!(operation = request.operation, "oneway request dispatched"),
                Err(e) => debug!(operation = request.operation, error = %e, "oneway request failed"),
            }
            return Ok(Reply::oneway());
        }

        match outcome {
            Ok(reply) => Ok(Reply {
                status: if reply.success { ReplyStatus::Success } else { ReplyStatus::UserException },
                body: reply.body,
            }),
            Err(e) => Err(into_channel_error(e)),
        }
    }
}

/// Hands out twoway request ids in `1..=i32::MAX`, wrapping back to 1.
/// Zero stays reserved for oneway requests.
pub(crate) fn next_request_id(counter: &AtomicI32) -> i32 {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| Some(if id == i32::MAX { 1 } else { id + 1 }))
        .unwrap_or_else(|id| id)
}

fn into_channel_error(e: DispatchError) -> ChannelError {
    match e {
        DispatchError::ObjectNotExist { identity } => ChannelError::ObjectNotExist { identity },
        DispatchError::OperationNotExist { identity, operation }
        | DispatchError::OperationNotImplemented { identity, operation } => {
            ChannelError::OperationNotExist { identity, operation }
        }
        DispatchError::UnknownUserException { unknown } => ChannelError::UnknownUserException { unknown },
        DispatchError::UnknownLocalException { unknown } => ChannelError::UnknownLocalException { unknown },
        DispatchError::Marshal(e) => ChannelError::UnknownLocalException { unknown: e.to_string() },
        e @ DispatchError::HostReleased => ChannelError::UnknownLocalException { unknown: e.to_string() },
        DispatchError::UnknownException { unknown } => ChannelError::UnknownException { unknown },
        e @ (DispatchError::MalformedResult { .. } | DispatchError::InvalidValue { .. }) => {
            ChannelError::UnknownException { unknown: e.to_string() }
        }
        DispatchError::Exit { code } => ChannelError::Exit { code },
    }
}
