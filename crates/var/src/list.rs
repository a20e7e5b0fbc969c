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

use crate::error::ErrorCode::E_RANGE;
use crate::var::Var;
use crate::Error;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A MOO list: an ordered, 1-indexed sequence of values with copy-on-write
/// sharing. All mutating operations return a fresh list value.
#[derive(Clone)]
pub struct List(Rc<Vec<Var>>);

impl List {
    pub fn build(values: &[Var]) -> Self {
        List(Rc::new(values.to_vec()))
    }

    pub fn from_vec(values: Vec<Var>) -> Self {
        List(Rc::new(values))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Var> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Var] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 1-based element access.
    pub fn index(&self, idx: i64) -> Result<Var, Error> {
        if idx < 1 || idx as usize > self.0.len() {
            return Err(E_RANGE.into());
        }
        Ok(self.0[(idx - 1) as usize].clone())
    }

    /// 1-based inclusive range; `l[from..from-1]` is the empty list.
    pub fn range(&self, from: i64, to: i64) -> Result<Var, Error> {
        if to < from {
            if to == from - 1 {
                return Ok(Var::from(List::from_vec(vec![])));
            }
            return Err(E_RANGE.into());
        }
        if from < 1 || to as usize > self.0.len() {
            return Err(E_RANGE.into());
        }
        Ok(Var::from(List::from_vec(
            self.0[(from - 1) as usize..to as usize].to_vec(),
        )))
    }

    pub fn index_set(&self, idx: i64, value: &Var) -> Result<Var, Error> {
        if idx < 1 || idx as usize > self.0.len() {
            return Err(E_RANGE.into());
        }
        let mut values = self.0.as_ref().clone();
        values[(idx - 1) as usize] = value.clone();
        Ok(Var::from(List::from_vec(values)))
    }

    /// Splice the elements of `value` (a list) over `[from..to]`.
    pub fn range_set(&self, from: i64, to: i64, value: &Var) -> Result<Var, Error> {
        let crate::Variant::List(v) = value.variant() else {
            return Err(crate::E_TYPE.into());
        };
        let len = self.0.len() as i64;
        if from < 1 || from > len + 1 || to < from - 1 || to > len {
            return Err(E_RANGE.into());
        }
        let mut values = Vec::with_capacity(self.0.len());
        values.extend_from_slice(&self.0[..(from - 1) as usize]);
        values.extend_from_slice(v.as_slice());
        values.extend_from_slice(&self.0[to as usize..]);
        Ok(Var::from(List::from_vec(values)))
    }

    /// Append a single element at the tail.
    pub fn push(&self, value: &Var) -> Var {
        let mut values = self.0.as_ref().clone();
        values.push(value.clone());
        Var::from(List::from_vec(values))
    }

    /// Concatenate another list onto the tail.
    pub fn append(&self, other: &List) -> Var {
        let mut values = self.0.as_ref().clone();
        values.extend(other.iter().cloned());
        Var::from(List::from_vec(values))
    }

    /// Insert before 1-based position `idx`; positions past the end append,
    /// positions before the start prepend.
    pub fn insert(&self, idx: i64, value: &Var) -> Var {
        let pos = (idx - 1).clamp(0, self.0.len() as i64) as usize;
        let mut values = self.0.as_ref().clone();
        values.insert(pos, value.clone());
        Var::from(List::from_vec(values))
    }

    pub fn remove_at(&self, idx: i64) -> Result<Var, Error> {
        if idx < 1 || idx as usize > self.0.len() {
            return Err(E_RANGE.into());
        }
        let mut values = self.0.as_ref().clone();
        values.remove((idx - 1) as usize);
        Ok(Var::from(List::from_vec(values)))
    }

    /// 1-based position of `value`, 0 when absent. `case_sensitive` selects
    /// between `==` and `equal()` semantics for the element compare.
    pub fn index_in(&self, value: &Var, case_sensitive: bool) -> i64 {
        self.0
            .iter()
            .position(|v| {
                if case_sensitive {
                    v.eq_case_sensitive(value)
                } else {
                    v == value
                }
            })
            .map(|p| p as i64 + 1)
            .unwrap_or(0)
    }

    pub fn contains(&self, value: &Var, case_sensitive: bool) -> bool {
        self.index_in(value, case_sensitive) != 0
    }
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        self.0.len() == other.0.len() && self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }
}

impl Eq for List {}

impl PartialOrd for List {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for List {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().cmp(other.0.iter())
    }
}

impl Hash for List {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for v in self.0.iter() {
            v.hash(state);
        }
    }
}

impl Debug for List {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "List({:?})", self.0)
    }
}

impl From<List> for Var {
    fn from(l: List) -> Self {
        Var::from_variant(crate::Variant::List(l))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{v_int, v_list, v_str};

    #[test]
    fn one_based_access() {
        let l = List::build(&[v_int(10), v_int(20), v_int(30)]);
        assert_eq!(l.index(1).unwrap(), v_int(10));
        assert_eq!(l.index(3).unwrap(), v_int(30));
        assert!(l.index(0).is_err());
        assert!(l.index(4).is_err());
    }

    #[test]
    fn range_and_splice() {
        let l = List::build(&[v_int(1), v_int(2), v_int(3), v_int(4)]);
        assert_eq!(l.range(2, 3).unwrap(), v_list(&[v_int(2), v_int(3)]));
        assert_eq!(l.range(1, 0).unwrap(), v_list(&[]));
        let spliced = l
            .range_set(2, 3, &v_list(&[v_int(9)]))
            .unwrap();
        assert_eq!(spliced, v_list(&[v_int(1), v_int(9), v_int(4)]));
    }

    #[test]
    fn membership_folds_case_unless_asked() {
        let l = List::build(&[v_str("Foo"), v_str("bar")]);
        assert_eq!(l.index_in(&v_str("foo"), false), 1);
        assert_eq!(l.index_in(&v_str("foo"), true), 0);
    }
}
