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

use crate::anon::Anon;
use crate::list::List;
use crate::map::Map;
use crate::string::Str;
use crate::waif::Waif;
use crate::{Error, Obj};
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};

/// Our series of types.
#[derive(Clone)]
pub enum Variant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Obj(Obj),
    Err(Error),
    Str(Str),
    List(List),
    Map(Map),
    Anon(Anon),
    Waif(Waif),
}

impl Hash for Variant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Variant::None => 0.hash(state),
            Variant::Bool(b) => b.hash(state),
            Variant::Int(i) => i.hash(state),
            Variant::Float(f) => f.to_bits().hash(state),
            Variant::Obj(o) => o.hash(state),
            Variant::Err(e) => e.hash(state),
            Variant::Str(s) => s.hash(state),
            Variant::List(l) => l.hash(state),
            Variant::Map(m) => m.hash(state),
            Variant::Anon(a) => a.hash(state),
            Variant::Waif(w) => w.hash(state),
        }
    }
}

impl PartialEq<Self> for Variant {
    fn eq(&self, other: &Self) -> bool {
        // Type-strict: 1 == 1.0 is false, no coercions anywhere.
        match (self, other) {
            (Variant::None, Variant::None) => true,
            (Variant::Bool(s), Variant::Bool(o)) => s == o,
            (Variant::Int(s), Variant::Int(o)) => s == o,
            (Variant::Float(s), Variant::Float(o)) => s.to_bits() == o.to_bits(),
            (Variant::Obj(s), Variant::Obj(o)) => s == o,
            (Variant::Err(s), Variant::Err(o)) => s == o,
            (Variant::Str(s), Variant::Str(o)) => s == o,
            (Variant::List(s), Variant::List(o)) => s == o,
            (Variant::Map(s), Variant::Map(o)) => s == o,
            (Variant::Anon(s), Variant::Anon(o)) => s == o,
            (Variant::Waif(s), Variant::Waif(o)) => s == o,
            _ => false,
        }
    }
}

impl Eq for Variant {}

impl Ord for Variant {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Variant::None, Variant::None) => Ordering::Equal,
            (Variant::Bool(l), Variant::Bool(r)) => l.cmp(r),
            (Variant::Int(l), Variant::Int(r)) => l.cmp(r),
            (Variant::Float(l), Variant::Float(r)) => l.total_cmp(r),
            (Variant::Obj(l), Variant::Obj(r)) => l.cmp(r),
            (Variant::Err(l), Variant::Err(r)) => l.err_type.cmp(&r.err_type),
            (Variant::Str(l), Variant::Str(r)) => l.cmp(r),
            (Variant::List(l), Variant::List(r)) => l.cmp(r),
            (Variant::Map(l), Variant::Map(r)) => l.cmp(r),
            (Variant::Anon(l), Variant::Anon(r)) => l.cmp(r),
            (Variant::Waif(l), Variant::Waif(r)) => l.cmp(r),

            (Variant::None, _) => Ordering::Less,
            (_, Variant::None) => Ordering::Greater,
            (Variant::Bool(_), _) => Ordering::Less,
            (_, Variant::Bool(_)) => Ordering::Greater,
            (Variant::Int(_), _) => Ordering::Less,
            (_, Variant::Int(_)) => Ordering::Greater,
            (Variant::Float(_), _) => Ordering::Less,
            (_, Variant::Float(_)) => Ordering::Greater,
            (Variant::Obj(_), _) => Ordering::Less,
            (_, Variant::Obj(_)) => Ordering::Greater,
            (Variant::Err(_), _) => Ordering::Less,
            (_, Variant::Err(_)) => Ordering::Greater,
            (Variant::Str(_), _) => Ordering::Less,
            (_, Variant::Str(_)) => Ordering::Greater,
            (Variant::List(_), _) => Ordering::Less,
            (_, Variant::List(_)) => Ordering::Greater,
            (Variant::Map(_), _) => Ordering::Less,
            (_, Variant::Map(_)) => Ordering::Greater,
            (Variant::Anon(_), _) => Ordering::Less,
            (_, Variant::Anon(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Variant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Debug for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::None => write!(f, "None"),
            Variant::Bool(b) => write!(f, "{}", *b),
            Variant::Int(i) => write!(f, "Integer({i})"),
            Variant::Float(fl) => write!(f, "Float({fl})"),
            Variant::Obj(o) => write!(f, "Object({o})"),
            Variant::Err(e) => write!(f, "Error({e:?})"),
            Variant::Str(s) => write!(f, "{s:?}"),
            Variant::List(l) => write!(f, "{l:?}"),
            Variant::Map(m) => write!(f, "{m:?}"),
            Variant::Anon(a) => write!(f, "{a:?}"),
            Variant::Waif(w) => write!(f, "{w:?}"),
        }
    }
}
