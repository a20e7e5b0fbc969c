// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The object database: numbered objects, multi-parent inheritance with
//! parent-chain property order, verbs with wildcard name specs, and the
//! anonymous-object arena.

pub mod model;
pub mod store;
pub mod util;

pub use store::{ObjPtr, Object, ObjectStore, PropSlot, Verb, VerbDesc};

use barn_var::{ErrorCode, Obj};
use thiserror::Error;

/// Failures from world-state operations. Each maps onto a MOO error code at
/// the builtin/VM boundary.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum WorldStateError {
    #[error("Object not found: {0}")]
    ObjectNotFound(Obj),
    #[error("Property not found: {0}")]
    PropertyNotFound(String),
    #[error("Property already defined: {0}")]
    DuplicatePropertyDefinition(String),
    #[error("Verb not found: {0}")]
    VerbNotFound(String),
    #[error("Recursive parent or containment relationship")]
    RecursiveMove,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl WorldStateError {
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            WorldStateError::ObjectNotFound(_) => ErrorCode::E_INVARG,
            WorldStateError::PropertyNotFound(_) => ErrorCode::E_PROPNF,
            WorldStateError::DuplicatePropertyDefinition(_) => ErrorCode::E_INVARG,
            WorldStateError::VerbNotFound(_) => ErrorCode::E_VERBNF,
            WorldStateError::RecursiveMove => ErrorCode::E_RECMOVE,
            WorldStateError::InvalidArgument(_) => ErrorCode::E_INVARG,
            WorldStateError::PermissionDenied(_) => ErrorCode::E_PERM,
        }
    }
}
