//! # Servants
//!
//! A servant is a handler object with a capability table: operation name to
//! method. Dispatch looks a method up by name and calls it with the decoded
//! arguments; it never inspects the servant any other way.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::current::Current;
use crate::value::UserException;
use crate::value::Value;

/// Decoded in-params plus the call context, which fills the last slot.
#[derive(Debug, Clone)]
pub struct Arguments {
    pub params: Vec<Value>,
    pub current: Current,
}

impl Arguments {
    /// The in-param in `slot`, or `Value::None` if out of range.
    pub fn get(&self, slot: usize) -> &Value {
        static NONE: Value = Value::None;
        self.params.get(slot).unwrap_or(&NONE)
    }
}

/// How a servant method can fail.
#[derive(Debug)]
pub enum HandlerError {
    /// A user exception, sent back as data if the operation declares it.
    User(UserException),
    /// A runtime-level failure inside the handler.
    Local(String),
    /// Anything else.
    Other(anyhow::Error),
    /// The handler asked the process to terminate. Never classified.
    Exit(i32),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(ex) => write!(f, "{}", ex),
            Self::Local(msg) => write!(f, "local failure: {}", msg),
            Self::Other(e) => write!(f, "{}", e),
            Self::Exit(code) => write!(f, "exit requested with status {}", code),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::User(ex) => Some(ex),
            Self::Other(e) => Some(&**e),
            _ => None,
        }
    }
}

impl From<UserException> for HandlerError {
    fn from(ex: UserException) -> Self { Self::User(ex) }
}

impl From<anyhow::Error> for HandlerError {
    fn from(e: anyhow::Error) -> Self { Self::Other(e) }
}

/// One entry of a servant's capability table.
pub trait Method: Send + Sync {
    fn call(&self, args: Arguments) -> Result<Value, HandlerError>;
}

impl<F> Method for F
where
    F: Fn(Arguments) -> Result<Value, HandlerError> + Send + Sync,
{
    fn call(&self, args: Arguments) -> Result<Value, HandlerError> {
        self(args)
    }
}

/// A handler object implementing some interface.
#[derive(Clone)]
pub struct Servant {
    type_id: String,
    methods: HashMap<String, Arc<dyn Method>>,
}

impl Servant {
    /// A servant for the interface `type_id` with no methods yet.
    pub fn new(type_id: impl Into<String>) -> Self {
        Self { type_id: type_id.into(), methods: HashMap::new() }
    }

    /// Adds a closure as the method for operation `name`.
    pub fn with_method<F>(self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(Arguments) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.with_handler(name, method)
    }

    pub fn with_handler(mut self, name: impl Into<String>, method: impl Method + 'static) -> Self {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn method(&self, name: &str) -> Option<&Arc<dyn Method>> {
        self.methods.get(name)
    }
}

impl fmt::Debug for Servant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.methods.keys().collect();
        names.sort();
        f.debug_struct("Servant")
            .field("type_id", &self.type_id)
            .field("methods", &names)
            .finish()
    }
}
