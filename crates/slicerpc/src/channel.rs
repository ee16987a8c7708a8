//! # Channel Abstraction
//!
//! The opaque request/reply transport an invocation sends through.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: a channel moves a sealed parameter buffer out and a
//!   sealed reply buffer back. It never interprets either.
//! - **Status, not exceptions**: a reply says whether its body holds results
//!   or a user exception. Every other remote failure is a `ChannelError`.

use std::fmt;

use crate::current::Context;
use crate::current::Identity;
use crate::operation::OperationMode;

/// Failures reported by a channel instead of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// No servant is registered under the identity.
    ObjectNotExist { identity: Identity },
    /// The servant's interface has no such operation.
    OperationNotExist { identity: Identity, operation: String },
    /// The remote raised a user exception it was not allowed to send.
    UnknownUserException { unknown: String },
    /// The remote failed with a local, runtime-level error.
    UnknownLocalException { unknown: String },
    /// The remote failed in a way that could not be classified.
    UnknownException { unknown: String },
    /// The peer is unreachable or went away mid-request.
    ConnectionLost(String),
    /// No reply arrived in time.
    Timeout,
    /// Generic I/O or internal transport failure.
    Io(String),
    /// The servant asked its process to exit with `code`.
    Exit { code: i32 },
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectNotExist { identity } => write!(f, "object `{}' does not exist", identity),
            Self::OperationNotExist { identity, operation } => {
                write!(f, "object `{}' has no operation `{}'", identity, operation)
            }
            Self::UnknownUserException { unknown } => write!(f, "unknown user exception: {}", unknown),
            Self::UnknownLocalException { unknown } => write!(f, "unknown local exception: {}", unknown),
            Self::UnknownException { unknown } => write!(f, "unknown exception: {}", unknown),
            Self::ConnectionLost(msg) => write!(f, "connection lost: {}", msg),
            Self::Timeout => write!(f, "request timed out"),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
            Self::Exit { code } => write!(f, "peer requested exit with status {}", code),
        }
    }
}

impl std::error::Error for ChannelError {}

pub type Result<T> = std::result::Result<T, ChannelError>;

/// One outgoing request.
#[derive(Debug, Clone)]
pub struct Request<'a> {
    pub identity: &'a Identity,
    pub operation: &'a str,
    pub mode: OperationMode,
    /// Sealed in-param buffer.
    pub params: &'a [u8],
    pub context: Option<&'a Context>,
    /// False for oneway requests, which expect no reply body.
    pub twoway: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// The body holds out-params and the return value.
    Success,
    /// The body holds a marshaled user exception.
    UserException,
    /// The request was oneway; there is no body.
    Oneway,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: ReplyStatus,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn oneway() -> Self {
        Self { status: ReplyStatus::Oneway, body: Vec::new() }
    }
}

/// A mechanism to send a request and receive its reply.
///
/// Object safe; proxies hold an `Arc<dyn Channel>`.
#[async_trait::async_trait]
pub trait Channel: Send + Sync + 'static {
    /// Sends `request` and waits for the reply.
    ///
    /// # invariants
    /// - A twoway request yields `Success` or `UserException`, or an error.
    /// - A oneway request yields `Oneway` as soon as the request is handed off.
    /// - A servant's exit request surfaces as `ChannelError::Exit` either way.
    async fn send(&self, request: Request<'_>) -> Result<Reply>;
}
