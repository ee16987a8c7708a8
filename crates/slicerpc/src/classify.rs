//! # Exception Classification
//!
//! Decides which failures cross the wire as typed user exceptions and which
//! are downgraded to "unknown" failures.
//!
//! An exception is *declared* when its descriptor is, or derives from, one of
//! the operation's declared exceptions. Only declared exceptions are ever
//! marshaled, and only declared exceptions are ever surfaced to a caller as
//! `InvokeError::User`; anything else is downgraded on whichever side sees it.

use tracing::warn;

use crate::dispatch::DispatchError;
use crate::dispatch::DispatchReply;
use crate::invoke::InvokeError;
use crate::marshal;
use crate::marshal::Marshaler;
use crate::marshal::Unmarshaler;
use crate::operation::OperationDescriptor;
use crate::registry::Registry;
use crate::servant::HandlerError;

/// Turns a handler failure into a user exception reply or a fatal error.
pub(crate) fn marshal_raised(
    op: &OperationDescriptor,
    registry: &Registry,
    err: HandlerError,
) -> Result<DispatchReply, DispatchError> {
    let ex = match err {
        HandlerError::User(ex) => ex,
        HandlerError::Local(msg) => return Err(DispatchError::UnknownLocalException { unknown: msg }),
        HandlerError::Other(e) => return Err(DispatchError::UnknownException { unknown: format!("{:#}", e) }),
        HandlerError::Exit(code) => return Err(DispatchError::Exit { code }),
    };

    let desc = match registry.exception(&ex.type_id) {
        Some(desc) if op.declares(&desc) => desc,
        _ => {
            warn!(
                operation = %op.name,
                exception = %ex.type_id,
                "operation `{}' raised undeclared exception {}", op.name, ex.type_id
            );
            return Err(DispatchError::UnknownUserException { unknown: ex.type_id });
        }
    };

    let mut m = Marshaler::new();
    m.stream().write_bool(false);
    desc.marshal(&ex, &mut m)?;
    Ok(DispatchReply { body: m.finished()?, success: false })
}

/// Decodes a user exception reply body into the error the caller sees.
pub(crate) fn unmarshal_exception(op: &OperationDescriptor, registry: &Registry, body: &[u8]) -> InvokeError {
    match read_exception(op, registry, body) {
        Ok(err) => err,
        Err(e) => InvokeError::Marshal(e),
    }
}

fn read_exception(op: &OperationDescriptor, registry: &Registry, body: &[u8]) -> marshal::Result<InvokeError> {
    let mut u = Unmarshaler::new(body, registry)?;
    let _uses_classes = u.stream().read_bool()?;

    loop {
        let id = u.stream().read_string()?;
        if id.is_empty() {
            warn!(operation = %op.name, "reply carries a user exception of no known type");
            return Ok(InvokeError::UnknownUserException { unknown: String::new() });
        }

        let Some(desc) = registry.exception(id) else {
            u.stream().skip_slice()?;
            continue;
        };

        let ex = desc.unmarshal(&mut u)?;
        u.finished()?;

        if op.declares(&desc) {
            return Ok(InvokeError::User(ex));
        }
        warn!(
            operation = %op.name,
            exception = %ex.type_id,
            "operation `{}' received undeclared exception {}", op.name, ex.type_id
        );
        return Ok(InvokeError::UnknownUserException { unknown: ex.type_id });
    }
}
