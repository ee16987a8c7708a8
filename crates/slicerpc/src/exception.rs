//! # Exception Descriptors
//!
//! Type metadata for user exceptions, the only failures that travel as data.
//!
//! ## Wire shape
//!
//! An exception body is one `(type_id, slice)` pair per level of the
//! hierarchy, most derived first, ended by an empty type id. A receiver that
//! does not know the most derived type skips its slice and tries the next one.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::marshal::Error;
use crate::marshal::Marshaler;
use crate::marshal::Result;
use crate::marshal::Unmarshaler;
use crate::types::Member;
use crate::value::UserException;

/// A user exception type with single inheritance.
#[derive(Debug)]
pub struct ExceptionDescriptor {
    pub type_id: String,
    pub base: Option<Arc<ExceptionDescriptor>>,
    /// Members declared at this level only.
    pub members: Vec<Member>,
}

impl ExceptionDescriptor {
    pub fn new(
        type_id: impl Into<String>,
        base: Option<Arc<ExceptionDescriptor>>,
        members: Vec<Member>,
    ) -> Self {
        Self { type_id: type_id.into(), base, members }
    }

    /// This exception followed by its ancestors, most derived first.
    pub fn chain(&self) -> impl Iterator<Item = &ExceptionDescriptor> {
        std::iter::successors(Some(self), |e| e.base.as_deref())
    }

    /// True if `self` is `other` or derives from it.
    pub fn is_a(&self, other: &ExceptionDescriptor) -> bool {
        self.chain().any(|e| e.type_id == other.type_id)
    }

    /// Writes every level of `ex` into `m`.
    ///
    /// Every member declared anywhere in the chain must be present and valid.
    pub fn marshal(&self, ex: &UserException, m: &mut Marshaler) -> Result<()> {
        for level in self.chain() {
            m.stream().write_string(&level.type_id)?;
            m.stream().start_slice();
            for decl in &level.members {
                let val = ex.member(&decl.name).ok_or_else(|| Error::MissingMember {
                    type_id: level.type_id.clone(),
                    member: decl.name.clone(),
                })?;
                if !decl.ty.validate(val) {
                    return Err(Error::InvalidValue {
                        expected: decl.ty.to_string(),
                        found: val.kind(),
                    });
                }
                decl.ty.marshal(val, m)?;
            }
            m.stream().end_slice()?;
        }
        m.stream().write_string("")?;
        Ok(())
    }

    /// Decodes the slices of this exception and its ancestors.
    ///
    /// The caller has already consumed this level's type id; the remaining
    /// levels must follow in chain order.
    pub fn unmarshal(&self, u: &mut Unmarshaler<'_>) -> Result<UserException> {
        let mut members = BTreeMap::new();
        for (depth, level) in self.chain().enumerate() {
            if depth > 0 {
                let id = u.stream().read_string()?;
                if id != level.type_id {
                    return Err(Error::ProtocolViolation(format!(
                        "expected exception slice {}, found {}", level.type_id, id
                    )));
                }
            }
            u.in_slice(|u| {
                for decl in &level.members {
                    members.insert(decl.name.clone(), decl.ty.unmarshal(u)?);
                }
                Ok(())
            })?;
        }
        let end = u.stream().read_string()?;
        if !end.is_empty() {
            return Err(Error::ProtocolViolation(format!(
                "trailing slice {} after root exception", end
            )));
        }
        Ok(UserException { type_id: self.type_id.clone(), members })
    }
}
