//! # Invocation Engine
//!
//! The client path of an operation: validate and marshal the caller's
//! arguments, send them through the proxy's channel, then decode the results
//! or the user exception that came back.
//!
//! ## Invariants
//! - **Nothing sent on bad input**: arity, context, and every argument are
//!   checked before the channel is touched.
//! - **Host released only for I/O**: the `Exclusive` is given up solely
//!   around `Channel::send`, and is held again before any marshaling, even
//!   when an earlier invocation was cancelled mid-send.
//! - **Exact replies**: a success body must be consumed completely.

use std::fmt;

use tracing::debug;

use crate::channel::ChannelError;
use crate::channel::ReplyStatus;
use crate::channel::Request;
use crate::classify;
use crate::host::Exclusive;
use crate::marshal;
use crate::marshal::Marshaler;
use crate::marshal::Unmarshaler;
use crate::operation::OperationDescriptor;
use crate::proxy::Proxy;
use crate::value::UserException;
use crate::value::Value;

/// Why an invocation failed.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeError {
    /// Wrong number of arguments; `expected` excludes the optional context.
    Arity { operation: String, expected: usize },
    /// The trailing context argument was not a string-to-string dictionary.
    ContextType { found: &'static str },
    /// The argument at 1-based `index` does not match its declared type.
    InvalidArgument { index: usize, operation: String },
    /// The remote raised a declared user exception.
    User(UserException),
    /// The remote raised a user exception this operation does not declare,
    /// or one this side cannot decode. Empty when no type id resolved.
    UnknownUserException { unknown: String },
    /// Encoding the request or decoding the reply failed.
    Marshal(marshal::Error),
    /// The channel reported a failure.
    Channel(ChannelError),
    /// The servant asked its process to exit; the caller should do so.
    Exit { code: i32 },
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arity { operation, expected } => {
                write!(f, "{} expects {} in parameters", operation, expected)
            }
            Self::ContextType { found } => {
                write!(f, "context argument must be a string dictionary, found {}", found)
            }
            Self::InvalidArgument { index, operation } => {
                write!(f, "invalid value for argument {} in operation `{}'", index, operation)
            }
            Self::User(ex) => write!(f, "{}", ex),
            Self::UnknownUserException { unknown } => {
                write!(f, "unknown user exception: {}", unknown)
            }
            Self::Marshal(e) => write!(f, "marshal error: {}", e),
            Self::Channel(e) => write!(f, "{}", e),
            Self::Exit { code } => write!(f, "exit requested with status {}", code),
        }
    }
}

impl std::error::Error for InvokeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::User(ex) => Some(ex),
            Self::Marshal(e) => Some(e),
            Self::Channel(e) => Some(e),
            _ => None,
        }
    }
}

impl From<marshal::Error> for InvokeError {
    fn from(e: marshal::Error) -> Self { Self::Marshal(e) }
}

impl From<ChannelError> for InvokeError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::Exit { code } => Self::Exit { code },
            e => Self::Channel(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, InvokeError>;

impl OperationDescriptor {
    /// Calls this operation on the object behind `proxy`.
    ///
    /// `args` holds one value per in-param, optionally followed by a context
    /// dictionary (`Value::None` means no context). Returns `None` when the
    /// operation has no results or the proxy is oneway, the single result
    /// unwrapped, or `Value::Tuple(ret, out1, ...)` when there are several.
    pub async fn invoke(
        &self,
        host: &mut Exclusive,
        proxy: &Proxy,
        args: &[Value],
    ) -> Result<Option<Value>> {
        host.reacquire().await;

        let n_in = self.in_params.len();
        if args.len() != n_in && args.len() != n_in + 1 {
            return Err(InvokeError::Arity { operation: self.name.clone(), expected: n_in });
        }

        let explicit_ctx = match args.get(n_in) {
            None | Some(Value::None) => None,
            Some(v) => Some(v.as_string_map().ok_or(InvokeError::ContextType { found: v.kind() })?),
        };

        let params = self.marshal_params(args)?;
        let context = explicit_ctx.as_ref().or(proxy.default_context());

        debug!(
            operation = %self.name,
            identity = %proxy.identity(),
            mode = %self.mode,
            twoway = proxy.is_twoway(),
            "invoking"
        );

        let request = Request {
            identity: proxy.identity(),
            operation: &self.name,
            mode: self.mode,
            params: &params,
            context,
            twoway: proxy.is_twoway(),
        };
        let reply = host.allow_threads(proxy.channel().send(request)).await?;

        if !proxy.is_twoway() {
            return Ok(None);
        }

        match reply.status {
            ReplyStatus::Success => Ok(self.unmarshal_results(proxy, &reply.body)?),
            ReplyStatus::UserException => {
                Err(classify::unmarshal_exception(self, proxy.registry(), &reply.body))
            }
            ReplyStatus::Oneway => Err(InvokeError::Marshal(marshal::Error::ProtocolViolation(
                format!("oneway reply to twoway request `{}'", self.name),
            ))),
        }
    }

    fn marshal_params(&self, args: &[Value]) -> Result<Vec<u8>> {
        let mut m = Marshaler::new();
        for (i, param) in self.in_params.iter().enumerate() {
            let value = &args[param.slot];
            if !param.ty.validate(value) {
                return Err(InvokeError::InvalidArgument { index: i + 1, operation: self.name.clone() });
            }
            param.ty.marshal(value, &mut m)?;
        }
        Ok(m.finished()?)
    }

    fn unmarshal_results(&self, proxy: &Proxy, body: &[u8]) -> marshal::Result<Option<Value>> {
        let count = self.result_count();
        if count == 0 {
            return Ok(None);
        }

        let mut u = Unmarshaler::new(body, proxy.registry())?;
        let mut results = vec![Value::None; count];
        for param in &self.out_params {
            results[param.slot] = param.ty.unmarshal(&mut u)?;
        }
        if let Some(ty) = &self.return_type {
            results[0] = ty.unmarshal(&mut u)?;
        }
        u.finished()?;

        if count == 1 {
            Ok(results.pop())
        } else {
            Ok(Some(Value::Tuple(results)))
        }
    }
}
