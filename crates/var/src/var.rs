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
use crate::error::ErrorCode::{E_RANGE, E_TYPE};
use crate::list::List;
use crate::map::Map;
use crate::string::Str;
use crate::variant::Variant;
use crate::waif::Waif;
use crate::{Error, ErrorCode, Obj, VarType};
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::hash::Hash;

/// A MOO value.
#[derive(Clone)]
pub struct Var(Variant);

impl Debug for Var {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.variant())
    }
}

impl Var {
    pub fn from_variant(variant: Variant) -> Self {
        Var(variant)
    }

    pub fn variant(&self) -> &Variant {
        &self.0
    }

    pub fn type_code(&self) -> VarType {
        match self.variant() {
            Variant::None => VarType::TYPE_NONE,
            Variant::Bool(_) => VarType::TYPE_BOOL,
            Variant::Int(_) => VarType::TYPE_INT,
            Variant::Float(_) => VarType::TYPE_FLOAT,
            Variant::Obj(_) => VarType::TYPE_OBJ,
            Variant::Err(_) => VarType::TYPE_ERR,
            Variant::Str(_) => VarType::TYPE_STR,
            Variant::List(_) => VarType::TYPE_LIST,
            Variant::Map(_) => VarType::TYPE_MAP,
            Variant::Anon(_) => VarType::TYPE_ANON,
            Variant::Waif(_) => VarType::TYPE_WAIF,
        }
    }

    pub fn is_true(&self) -> bool {
        match self.variant() {
            Variant::None => false,
            Variant::Bool(b) => *b,
            Variant::Int(i) => *i != 0,
            Variant::Float(f) => *f != 0.0,
            Variant::Obj(_) => false,
            Variant::Err(e) => e.err_type != ErrorCode::E_NONE,
            Variant::Str(s) => !s.is_empty(),
            Variant::List(l) => !l.is_empty(),
            Variant::Map(m) => !m.is_empty(),
            Variant::Anon(_) => false,
            Variant::Waif(_) => false,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self.variant(), Variant::Str(_))
    }

    /// The `equal()` builtin's notion of equality: like `==` but strings
    /// compare case-sensitively, recursively.
    pub fn eq_case_sensitive(&self, other: &Var) -> bool {
        match (self.variant(), other.variant()) {
            (Variant::Str(a), Variant::Str(b)) => a.eq_case_sensitive(b),
            (Variant::List(a), Variant::List(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| x.eq_case_sensitive(y))
            }
            (Variant::Map(a), Variant::Map(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|((ka, va), (kb, vb))| {
                        ka.eq_case_sensitive(kb) && va.eq_case_sensitive(vb)
                    })
            }
            _ => self == other,
        }
    }

    /// Length of a sequence or association; scalars are `E_TYPE`.
    pub fn len(&self) -> Result<usize, Error> {
        match self.variant() {
            Variant::Str(s) => Ok(s.len()),
            Variant::List(l) => Ok(l.len()),
            Variant::Map(m) => Ok(m.len()),
            _ => Err(E_TYPE.into()),
        }
    }

    /// `v[index]` — 1-based for sequences, keyed for maps.
    pub fn index(&self, index: &Var) -> Result<Var, Error> {
        match self.variant() {
            Variant::Str(s) => {
                let Variant::Int(i) = index.variant() else {
                    return Err(E_TYPE.into());
                };
                s.index(*i)
            }
            Variant::List(l) => {
                let Variant::Int(i) = index.variant() else {
                    return Err(E_TYPE.into());
                };
                l.index(*i)
            }
            Variant::Map(m) => m.get(index),
            _ => Err(E_TYPE.into()),
        }
    }

    /// `v[index] = value`, yielding the modified value.
    pub fn index_set(&self, index: &Var, value: &Var) -> Result<Var, Error> {
        match self.variant() {
            Variant::Str(s) => {
                let Variant::Int(i) = index.variant() else {
                    return Err(E_TYPE.into());
                };
                s.index_set(*i, value)
            }
            Variant::List(l) => {
                let Variant::Int(i) = index.variant() else {
                    return Err(E_TYPE.into());
                };
                l.index_set(*i, value)
            }
            Variant::Map(m) => m.set(index, value),
            _ => Err(E_TYPE.into()),
        }
    }

    /// `v[from..to]` for sequences.
    pub fn range(&self, from: &Var, to: &Var) -> Result<Var, Error> {
        let (Variant::Int(from), Variant::Int(to)) = (from.variant(), to.variant()) else {
            return Err(E_TYPE.into());
        };
        match self.variant() {
            Variant::Str(s) => s.range(*from, *to),
            Variant::List(l) => l.range(*from, *to),
            _ => Err(E_TYPE.into()),
        }
    }

    /// `v[from..to] = value` for sequences.
    pub fn range_set(&self, from: &Var, to: &Var, value: &Var) -> Result<Var, Error> {
        let (Variant::Int(from), Variant::Int(to)) = (from.variant(), to.variant()) else {
            return Err(E_TYPE.into());
        };
        match self.variant() {
            Variant::Str(s) => s.range_set(*from, *to, value),
            Variant::List(l) => l.range_set(*from, *to, value),
            _ => Err(E_TYPE.into()),
        }
    }

    /// The `in` operator: 1-based position in a list, substring position in a
    /// string, key membership in a map. Case-insensitive, like `==`.
    pub fn index_in(&self, container: &Var) -> Result<Var, Error> {
        match container.variant() {
            Variant::List(l) => Ok(v_int(l.index_in(self, false))),
            Variant::Str(haystack) => {
                let Variant::Str(needle) = self.variant() else {
                    return Err(E_TYPE.into());
                };
                Ok(v_int(haystack.index_in(needle, false)))
            }
            Variant::Map(m) => Ok(v_bool_int(m.contains_key(self)?)),
            _ => Err(E_TYPE.into()),
        }
    }
}

pub fn v_int(i: i64) -> Var {
    Var(Variant::Int(i))
}

/// Produces a truthy integer, not a boolean, to stay compatible with
/// LambdaMOO cores.
pub fn v_bool_int(b: bool) -> Var {
    if b {
        v_int(1)
    } else {
        v_int(0)
    }
}

pub fn v_none() -> Var {
    Var(Variant::None)
}

pub fn v_float(f: f64) -> Var {
    Var(Variant::Float(f))
}

pub fn v_str(s: &str) -> Var {
    Var(Variant::Str(Str::mk_str(s)))
}

pub fn v_string(s: String) -> Var {
    Var(Variant::Str(Str::from(s)))
}

pub fn v_list(values: &[Var]) -> Var {
    Var(Variant::List(List::build(values)))
}

pub fn v_list_iter<IT: IntoIterator<Item = Var>>(values: IT) -> Var {
    Var(Variant::List(List::from_vec(values.into_iter().collect())))
}

/// Build a map from pairs; fails with `E_TYPE` on an illegal key type.
pub fn v_map(pairs: &[(Var, Var)]) -> Result<Var, Error> {
    Map::build(pairs.iter())
}

pub fn v_map_iter<'a, I: Iterator<Item = &'a (Var, Var)>>(pairs: I) -> Result<Var, Error> {
    Map::build(pairs)
}

pub fn v_empty_list() -> Var {
    v_list(&[])
}

pub fn v_empty_str() -> Var {
    v_str("")
}

pub fn v_empty_map() -> Var {
    Var(Variant::Map(Map::empty()))
}

pub fn v_err(e: ErrorCode) -> Var {
    Var(Variant::Err(e.into()))
}

pub fn v_error(e: Error) -> Var {
    Var(Variant::Err(e))
}

pub fn v_obj(o: Obj) -> Var {
    Var(Variant::Obj(o))
}

pub fn v_objid(o: i64) -> Var {
    Var(Variant::Obj(Obj(o)))
}

pub fn v_anon(a: Anon) -> Var {
    Var(Variant::Anon(a))
}

pub fn v_waif(w: Waif) -> Var {
    Var(Variant::Waif(w))
}

impl From<i64> for Var {
    fn from(i: i64) -> Self {
        v_int(i)
    }
}

impl From<&str> for Var {
    fn from(s: &str) -> Self {
        v_str(s)
    }
}

impl From<String> for Var {
    fn from(s: String) -> Self {
        v_string(s)
    }
}

impl From<Obj> for Var {
    fn from(o: Obj) -> Self {
        v_obj(o)
    }
}

impl From<Error> for Var {
    fn from(e: Error) -> Self {
        v_error(e)
    }
}

impl PartialEq<Self> for Var {
    fn eq(&self, other: &Self) -> bool {
        self.variant() == other.variant()
    }
}

impl Eq for Var {}

impl Ord for Var {
    fn cmp(&self, other: &Self) -> Ordering {
        self.variant().cmp(other.variant())
    }
}

impl PartialOrd<Self> for Var {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Var {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.variant().hash(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn equality_is_type_strict() {
        assert_ne!(v_int(1), v_float(1.0));
        assert_ne!(v_int(0), v_str(""));
        assert_eq!(v_int(1), v_int(1));
        assert_eq!(v_float(1.0), v_float(1.0));
    }

    #[test]
    fn truthiness() {
        assert!(!v_int(0).is_true());
        assert!(v_int(-3).is_true());
        assert!(!v_float(0.0).is_true());
        assert!(!v_str("").is_true());
        assert!(v_str("x").is_true());
        assert!(!v_empty_list().is_true());
        assert!(!v_objid(7).is_true());
        assert!(!v_err(ErrorCode::E_NONE).is_true());
        assert!(v_err(ErrorCode::E_PERM).is_true());
    }

    #[test]
    fn string_equality_folds_case_but_equal_does_not() {
        assert_eq!(v_str("Foo"), v_str("foo"));
        assert!(!v_str("Foo").eq_case_sensitive(&v_str("foo")));
        assert!(v_list(&[v_str("a")]).eq_case_sensitive(&v_list(&[v_str("a")])));
        assert!(!v_list(&[v_str("A")]).eq_case_sensitive(&v_list(&[v_str("a")])));
    }

    #[test]
    fn in_operator() {
        let l = v_list(&[v_int(1), v_str("two")]);
        assert_eq!(v_str("TWO").index_in(&l).unwrap(), v_int(2));
        assert_eq!(v_int(3).index_in(&l).unwrap(), v_int(0));
        assert_eq!(v_str("cd").index_in(&v_str("abcd")).unwrap(), v_int(3));
    }
}
