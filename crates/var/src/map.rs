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

use crate::error::ErrorCode::{E_RANGE, E_TYPE};
use crate::var::Var;
use crate::variant::Variant;
use crate::Error;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A MOO map: an association kept sorted in the canonical key order
/// INT < OBJ < ERR < FLOAT < STR, then by intra-type order. Only those five
/// scalar types may be keys.
#[derive(Clone)]
pub struct Map(Rc<Vec<(Var, Var)>>);

/// The canonical cross-type rank of a map key.
fn key_rank(v: &Var) -> Option<u8> {
    match v.variant() {
        Variant::Int(_) => Some(0),
        Variant::Obj(_) => Some(1),
        Variant::Err(_) => Some(2),
        Variant::Float(_) => Some(3),
        Variant::Str(_) => Some(4),
        _ => None,
    }
}

/// Total order over legal map keys. Callers must have checked `key_rank`.
pub fn key_cmp(a: &Var, b: &Var) -> Ordering {
    let (ra, rb) = (key_rank(a).unwrap(), key_rank(b).unwrap());
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a.variant(), b.variant()) {
        (Variant::Int(x), Variant::Int(y)) => x.cmp(y),
        (Variant::Obj(x), Variant::Obj(y)) => x.cmp(y),
        (Variant::Err(x), Variant::Err(y)) => x.err_type.cmp(&y.err_type),
        (Variant::Float(x), Variant::Float(y)) => x.total_cmp(y),
        (Variant::Str(x), Variant::Str(y)) => x.cmp(y),
        _ => unreachable!("key_cmp on non-key variants"),
    }
}

impl Map {
    /// Build from arbitrary pairs; later duplicates win, exactly as if the
    /// pairs had been inserted in order.
    pub fn build<'a, I: Iterator<Item = &'a (Var, Var)>>(pairs: I) -> Result<Var, Error> {
        let mut entries: Vec<(Var, Var)> = Vec::new();
        for (k, v) in pairs {
            if key_rank(k).is_none() {
                return Err(E_TYPE.into());
            }
            match entries.binary_search_by(|(ek, _)| key_cmp(ek, k)) {
                Ok(i) => entries[i].1 = v.clone(),
                Err(i) => entries.insert(i, (k.clone(), v.clone())),
            }
        }
        Ok(Var::from_variant(Variant::Map(Map(Rc::new(entries)))))
    }

    pub fn empty() -> Self {
        Map(Rc::new(vec![]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Var, Var)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &Var) -> Result<Var, Error> {
        if key_rank(key).is_none() {
            return Err(E_TYPE.into());
        }
        match self.0.binary_search_by(|(ek, _)| key_cmp(ek, key)) {
            Ok(i) => Ok(self.0[i].1.clone()),
            Err(_) => Err(E_RANGE.into()),
        }
    }

    pub fn contains_key(&self, key: &Var) -> Result<bool, Error> {
        if key_rank(key).is_none() {
            return Err(E_TYPE.into());
        }
        Ok(self
            .0
            .binary_search_by(|(ek, _)| key_cmp(ek, key))
            .is_ok())
    }

    pub fn set(&self, key: &Var, value: &Var) -> Result<Var, Error> {
        if key_rank(key).is_none() {
            return Err(E_TYPE.into());
        }
        let mut entries = self.0.as_ref().clone();
        match entries.binary_search_by(|(ek, _)| key_cmp(ek, key)) {
            Ok(i) => entries[i].1 = value.clone(),
            Err(i) => entries.insert(i, (key.clone(), value.clone())),
        }
        Ok(Var::from_variant(Variant::Map(Map(Rc::new(entries)))))
    }

    /// Remove `key`, returning the shrunk map and the removed value.
    /// A missing key is `E_RANGE`.
    pub fn remove(&self, key: &Var) -> Result<(Var, Var), Error> {
        if key_rank(key).is_none() {
            return Err(E_TYPE.into());
        }
        let mut entries = self.0.as_ref().clone();
        match entries.binary_search_by(|(ek, _)| key_cmp(ek, key)) {
            Ok(i) => {
                let (_, v) = entries.remove(i);
                Ok((Var::from_variant(Variant::Map(Map(Rc::new(entries)))), v))
            }
            Err(_) => Err(E_RANGE.into()),
        }
    }

    pub fn keys(&self) -> Vec<Var> {
        self.0.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Var> {
        self.0.iter().map(|(_, v)| v.clone()).collect()
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.0 == b.0 && a.1 == b.1)
    }
}

impl Eq for Map {}

impl PartialOrd for Map {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Map {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().cmp(other.0.iter())
    }
}

impl Hash for Map {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for (k, v) in self.0.iter() {
            k.hash(state);
            v.hash(state);
        }
    }
}

impl Debug for Map {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Map({:?})", self.0)
    }
}

impl From<Map> for Var {
    fn from(m: Map) -> Self {
        Var::from_variant(Variant::Map(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{v_err, v_float, v_int, v_objid, v_str, ErrorCode};

    #[test]
    fn keys_sort_in_canonical_order() {
        let m = Map::build(
            [
                (v_str("a"), v_str("")),
                (v_float(2.5), v_str("")),
                (v_err(ErrorCode::E_NONE), v_str("")),
                (v_objid(0), v_str("")),
                (v_int(1), v_str("")),
            ]
            .iter(),
        )
        .unwrap();
        let Variant::Map(m) = m.variant().clone() else {
            unreachable!()
        };
        let keys = m.keys();
        assert_eq!(
            keys,
            vec![
                v_int(1),
                v_objid(0),
                v_err(ErrorCode::E_NONE),
                v_float(2.5),
                v_str("a")
            ]
        );
    }

    #[test]
    fn missing_key_is_range_error() {
        let m = Map::build([(v_str("a"), v_int(1))].iter()).unwrap();
        let Variant::Map(m) = m.variant().clone() else {
            unreachable!()
        };
        assert_eq!(m.get(&v_str("a")).unwrap(), v_int(1));
        assert_eq!(
            m.get(&v_str("b")).unwrap_err().err_type,
            ErrorCode::E_RANGE
        );
    }

    #[test]
    fn collection_keys_are_type_errors() {
        let err = Map::build([(crate::v_list(&[]), v_int(1))].iter()).unwrap_err();
        assert_eq!(err.err_type, ErrorCode::E_TYPE);
    }

    #[test]
    fn last_duplicate_wins() {
        let m = Map::build([(v_str("k"), v_int(1)), (v_str("K"), v_int(2))].iter()).unwrap();
        let Variant::Map(m) = m.variant().clone() else {
            unreachable!()
        };
        assert_eq!(m.len(), 1);
        assert_eq!(m.get(&v_str("k")).unwrap(), v_int(2));
    }
}
