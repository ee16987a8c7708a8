//! # Dispatch Engine
//!
//! The server path of an operation: decode the in-params of an incoming
//! request, call the servant's method, and encode whatever it produced as a
//! reply body.
//!
//! ## Invariants
//! - **Malformed input is fatal**: a request that does not decode exactly is
//!   a protocol error, never a user exception.
//! - **Exit is never classified**: a handler asking for termination always
//!   surfaces as `DispatchError::Exit`.
//! - **Host held**: nothing is decoded unless the `Exclusive` actually holds
//!   the host lock.
//! - **Sealed replies**: `DispatchReply::body` is a finished buffer, even when
//!   the operation has no results.

use std::fmt;

use tracing::debug;
use tracing::warn;

use crate::classify;
use crate::current::Current;
use crate::current::Identity;
use crate::host::Exclusive;
use crate::marshal;
use crate::marshal::Marshaler;
use crate::marshal::Unmarshaler;
use crate::operation::OperationDescriptor;
use crate::registry::Registry;
use crate::servant::Arguments;
use crate::servant::Servant;
use crate::value::Value;

/// Where a bad result value was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultPosition {
    /// 1-based among the out-params.
    OutArgument(usize),
    ReturnValue,
}

impl fmt::Display for ResultPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutArgument(n) => write!(f, "out argument {}", n),
            Self::ReturnValue => write!(f, "return value"),
        }
    }
}

/// The reply to send back for a dispatched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReply {
    pub body: Vec<u8>,
    /// False if `body` holds a user exception.
    pub success: bool,
}

/// Failures that produce no reply body.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The request or reply could not be (un)marshaled.
    Marshal(marshal::Error),
    /// No servant under the identity.
    ObjectNotExist { identity: Identity },
    /// The servant's interface has no such operation.
    OperationNotExist { identity: Identity, operation: String },
    /// The interface has the operation but the servant lacks the method.
    OperationNotImplemented { identity: Identity, operation: String },
    /// A multi-result operation did not get a tuple of the right length.
    MalformedResult { operation: String, expected: usize },
    /// A result value does not match its declared type.
    InvalidValue { operation: String, position: ResultPosition },
    UnknownUserException { unknown: String },
    UnknownLocalException { unknown: String },
    UnknownException { unknown: String },
    /// The handler asked the process to terminate.
    Exit { code: i32 },
    /// The `Exclusive` passed in had been released and never reacquired.
    HostReleased,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Marshal(e) => write!(f, "marshal error: {}", e),
            Self::ObjectNotExist { identity } => write!(f, "object `{}' does not exist", identity),
            Self::OperationNotExist { identity, operation } => {
                write!(f, "object `{}' has no operation `{}'", identity, operation)
            }
            Self::OperationNotImplemented { identity, operation } => write!(
                f,
                "servant for identity `{}' does not define operation `{}'",
                identity, operation
            ),
            Self::MalformedResult { operation, expected } => write!(
                f,
                "operation `{}' should return a tuple of length {}",
                operation, expected
            ),
            Self::InvalidValue { operation, position } => {
                write!(f, "invalid value for {} of operation `{}'", position, operation)
            }
            Self::UnknownUserException { unknown } => write!(f, "unknown user exception: {}", unknown),
            Self::UnknownLocalException { unknown } => write!(f, "unknown local exception: {}", unknown),
            Self::UnknownException { unknown } => write!(f, "unknown exception: {}", unknown),
            Self::Exit { code } => write!(f, "exit requested with status {}", code),
            Self::HostReleased => write!(f, "dispatch attempted without holding the host"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Marshal(e) => Some(e),
            _ => None,
        }
    }
}

impl From<marshal::Error> for DispatchError {
    fn from(e: marshal::Error) -> Self { Self::Marshal(e) }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

impl OperationDescriptor {
    /// Runs one incoming request against `servant`.
    ///
    /// `params` is the sealed in-param buffer; `current` describes the
    /// request and is handed to the method in the last argument slot.
    pub fn dispatch(
        &self,
        host: &Exclusive,
        servant: &Servant,
        params: &[u8],
        current: Current,
        registry: &Registry,
    ) -> Result<DispatchReply> {
        if !host.holds() {
            return Err(DispatchError::HostReleased);
        }

        let mut u = Unmarshaler::new(params, registry)?;
        let mut values = Vec::with_capacity(self.in_params.len());
        for param in &self.in_params {
            values.push(param.ty.unmarshal(&mut u)?);
        }
        u.finished()?;

        let Some(method) = servant.method(&self.name) else {
            warn!(
                identity = %current.id,
                operation = %self.name,
                "servant for identity `{}' does not define operation `{}'",
                current.id, self.name
            );
            return Err(DispatchError::OperationNotImplemented {
                identity: current.id,
                operation: self.name.clone(),
            });
        };

        debug!(
            operation = %self.name,
            identity = %current.id,
            mode = %current.mode,
            request_id = current.request_id,
            "dispatching"
        );

        match method.call(Arguments { params: values, current }) {
            Ok(result) => self.marshal_results(result),
            Err(e) => classify::marshal_raised(self, registry, e),
        }
    }

    fn marshal_results(&self, result: Value) -> Result<DispatchReply> {
        let count = self.result_count();
        let values = match (count, result) {
            (0, _) => Vec::new(),
            (1, v) => vec![v],
            (n, Value::Tuple(items)) if items.len() == n => items,
            (n, _) => {
                warn!(operation = %self.name, "operation `{}' should return a tuple of length {}", self.name, n);
                return Err(DispatchError::MalformedResult { operation: self.name.clone(), expected: n });
            }
        };

        let mut m = Marshaler::new();
        for (i, param) in self.out_params.iter().enumerate() {
            let value = &values[param.slot];
            if !param.ty.validate(value) {
                return Err(DispatchError::InvalidValue {
                    operation: self.name.clone(),
                    position: ResultPosition::OutArgument(i + 1),
                });
            }
            param.ty.marshal(value, &mut m)?;
        }
        if let Some(ty) = &self.return_type {
            let value = &values[0];
            if !ty.validate(value) {
                return Err(DispatchError::InvalidValue {
                    operation: self.name.clone(),
                    position: ResultPosition::ReturnValue,
                });
            }
            ty.marshal(value, &mut m)?;
        }

        Ok(DispatchReply { body: m.finished()?, success: true })
    }
}
