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

use crate::var::Var;
use ErrorCode::*;
use std::{
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    ops::Deref,
};

/// A MOO error value: an error code plus the optional message and value
/// payloads that `raise()` can attach.
#[derive(Clone, Eq, Ord, PartialOrd)]
pub struct Error {
    pub err_type: ErrorCode,
    pub msg: Option<Box<String>>,
    pub value: Option<Box<Var>>,
}

impl Hash for Error {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.err_type.hash(state);
    }
}

impl Error {
    pub fn new(err_type: ErrorCode, msg: Option<String>, value: Option<Var>) -> Self {
        Self {
            err_type,
            msg: msg.map(Box::new),
            value: value.map(Box::new),
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err_type)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.msg.is_some() {
            write!(f, "{} ({})", self.err_type, self.message())
        } else {
            write!(f, "{}", self.err_type)
        }
    }
}

/// The closed set of MOO error codes. The numbering (see `to_int`) matches
/// LambdaMOO/ToastStunt and appears in textdumps.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[allow(non_camel_case_types)]
pub enum ErrorCode {
    E_NONE,
    E_TYPE,
    E_DIV,
    E_PERM,
    E_PROPNF,
    E_VERBNF,
    E_VARNF,
    E_INVIND,
    E_RECMOVE,
    E_MAXREC,
    E_RANGE,
    E_ARGS,
    E_NACC,
    E_INVARG,
    E_QUOTA,
    E_FLOAT,
    // Toast extensions:
    E_FILE,
    E_EXEC,
    E_INTRPT,
}

impl ErrorCode {
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "E_NONE" => Some(E_NONE),
            "E_TYPE" => Some(E_TYPE),
            "E_DIV" => Some(E_DIV),
            "E_PERM" => Some(E_PERM),
            "E_PROPNF" => Some(E_PROPNF),
            "E_VERBNF" => Some(E_VERBNF),
            "E_VARNF" => Some(E_VARNF),
            "E_INVIND" => Some(E_INVIND),
            "E_RECMOVE" => Some(E_RECMOVE),
            "E_MAXREC" => Some(E_MAXREC),
            "E_RANGE" => Some(E_RANGE),
            "E_ARGS" => Some(E_ARGS),
            "E_NACC" => Some(E_NACC),
            "E_INVARG" => Some(E_INVARG),
            "E_QUOTA" => Some(E_QUOTA),
            "E_FLOAT" => Some(E_FLOAT),
            "E_FILE" => Some(E_FILE),
            "E_EXEC" => Some(E_EXEC),
            "E_INTRPT" => Some(E_INTRPT),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            E_NONE => "E_NONE",
            E_TYPE => "E_TYPE",
            E_DIV => "E_DIV",
            E_PERM => "E_PERM",
            E_PROPNF => "E_PROPNF",
            E_VERBNF => "E_VERBNF",
            E_VARNF => "E_VARNF",
            E_INVIND => "E_INVIND",
            E_RECMOVE => "E_RECMOVE",
            E_MAXREC => "E_MAXREC",
            E_RANGE => "E_RANGE",
            E_ARGS => "E_ARGS",
            E_NACC => "E_NACC",
            E_INVARG => "E_INVARG",
            E_QUOTA => "E_QUOTA",
            E_FLOAT => "E_FLOAT",
            E_FILE => "E_FILE",
            E_EXEC => "E_EXEC",
            E_INTRPT => "E_INTRPT",
        }
    }

    pub fn from_repr(v: u8) -> Option<Self> {
        match v {
            0 => Some(E_NONE),
            1 => Some(E_TYPE),
            2 => Some(E_DIV),
            3 => Some(E_PERM),
            4 => Some(E_PROPNF),
            5 => Some(E_VERBNF),
            6 => Some(E_VARNF),
            7 => Some(E_INVIND),
            8 => Some(E_RECMOVE),
            9 => Some(E_MAXREC),
            10 => Some(E_RANGE),
            11 => Some(E_ARGS),
            12 => Some(E_NACC),
            13 => Some(E_INVARG),
            14 => Some(E_QUOTA),
            15 => Some(E_FLOAT),
            16 => Some(E_FILE),
            17 => Some(E_EXEC),
            18 => Some(E_INTRPT),
            _ => None,
        }
    }

    pub fn to_int(self) -> u8 {
        match self {
            E_NONE => 0,
            E_TYPE => 1,
            E_DIV => 2,
            E_PERM => 3,
            E_PROPNF => 4,
            E_VERBNF => 5,
            E_VARNF => 6,
            E_INVIND => 7,
            E_RECMOVE => 8,
            E_MAXREC => 9,
            E_RANGE => 10,
            E_ARGS => 11,
            E_NACC => 12,
            E_INVARG => 13,
            E_QUOTA => 14,
            E_FLOAT => 15,
            E_FILE => 16,
            E_EXEC => 17,
            E_INTRPT => 18,
        }
    }

    /// Attach a message, producing a full error value.
    pub fn msg<S: ToString>(self, s: S) -> Error {
        Error::new(self, Some(s.to_string()), None)
    }

    pub fn with_msg<F>(self, f: F) -> Error
    where
        F: FnOnce() -> String,
    {
        Error::new(self, Some(f()), None)
    }

    pub fn with_msg_and_value<F>(self, f: F, value: Var) -> Error
    where
        F: FnOnce() -> String,
    {
        Error::new(self, Some(f()), Some(value))
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl PartialEq<ErrorCode> for Error {
    fn eq(&self, other: &ErrorCode) -> bool {
        self.err_type == *other
    }
}

impl PartialEq<Error> for Error {
    fn eq(&self, other: &Error) -> bool {
        self.err_type == other.err_type
    }
}

impl From<ErrorCode> for Error {
    fn from(val: ErrorCode) -> Self {
        Error::new(val, None, None)
    }
}

impl std::error::Error for Error {}

impl Error {
    #[must_use]
    pub fn message(&self) -> String {
        if let Some(msg) = &self.msg {
            return msg.deref().clone();
        }
        // Default message if one not provided.
        match self.err_type {
            E_NONE => "No error".into(),
            E_TYPE => "Type mismatch".into(),
            E_DIV => "Division by zero".into(),
            E_PERM => "Permission denied".into(),
            E_PROPNF => "Property not found".into(),
            E_VERBNF => "Verb not found".into(),
            E_VARNF => "Variable not found".into(),
            E_INVIND => "Invalid indirection".into(),
            E_RECMOVE => "Recursive move".into(),
            E_MAXREC => "Too many verb calls".into(),
            E_RANGE => "Range error".into(),
            E_ARGS => "Incorrect number of arguments".into(),
            E_NACC => "Move refused by destination".into(),
            E_INVARG => "Invalid argument".into(),
            E_QUOTA => "Resource limit exceeded".into(),
            E_FLOAT => "Floating-point arithmetic error".into(),
            E_FILE => "File error".into(),
            E_EXEC => "Execution error".into(),
            E_INTRPT => "Interrupted".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_round_trip() {
        for i in 0..=18u8 {
            let code = ErrorCode::from_repr(i).unwrap();
            assert_eq!(code.to_int(), i);
            assert_eq!(ErrorCode::parse_str(code.name()), Some(code));
        }
        assert_eq!(ErrorCode::from_repr(19), None);
    }

    #[test]
    fn payload_does_not_affect_identity() {
        let bare: Error = E_PERM.into();
        let labeled = E_PERM.msg("you can't do that");
        assert_eq!(bare, labeled);
        assert_eq!(labeled.message(), "you can't do that");
        assert_eq!(bare.message(), "Permission denied");
    }
}
