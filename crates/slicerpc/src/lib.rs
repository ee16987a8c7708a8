//! Operation invocation and dispatch over slicepack-encoded requests.
//!
//! The client side marshals a caller's arguments, sends them through a
//! `Channel`, and decodes results or user exceptions. The server side decodes
//! a request, calls a `Servant` method, and encodes the outcome.

pub mod adapter;
pub mod channel;
pub mod current;
pub mod dispatch;
pub mod exception;
pub mod host;
pub mod invoke;
pub mod loopback;
pub mod marshal;
pub mod metadata;
pub mod operation;
pub mod proxy;
pub mod registry;
pub mod servant;
pub mod types;
pub mod value;

mod classify;


pub use crate::adapter::IncomingRequest;
pub use crate::adapter::ObjectAdapter;
pub use crate::channel::Channel;
pub use crate::channel::ChannelError;
pub use crate::channel::Reply;
pub use crate::channel::ReplyStatus;
pub use crate::channel::Request;
pub use crate::current::Context;
pub use crate::current::Current;
pub use crate::current::Identity;
pub use crate::dispatch::DispatchError;
pub use crate::dispatch::DispatchReply;
pub use crate::dispatch::ResultPosition;
pub use crate::exception::ExceptionDescriptor;
pub use crate::host::Exclusive;
pub use crate::host::Host;
pub use crate::invoke::InvokeError;
pub use crate::loopback::LoopbackChannel;
pub use crate::metadata::InterfaceDescriptor;
pub use crate::metadata::MetadataError;
pub use crate::metadata::OperationMetadata;
pub use crate::metadata::TypeRef;
pub use crate::operation::OperationDescriptor;
pub use crate::operation::OperationMode;
pub use crate::operation::ParameterDescriptor;
pub use crate::proxy::Proxy;
pub use crate::registry::Registry;
pub use crate::servant::Arguments;
pub use crate::servant::HandlerError;
pub use crate::servant::Method;
pub use crate::servant::Servant;
pub use crate::types::ClassDescriptor;
pub use crate::types::EnumDescriptor;
pub use crate::types::Member;
pub use crate::types::Primitive;
pub use crate::types::ProxyDescriptor;
pub use crate::types::StructDescriptor;
pub use crate::types::TypeDescriptor;
pub use crate::value::ObjectValue;
pub use crate::value::UserException;
pub use crate::value::Value;
