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
use crate::variant::Variant;
use crate::{Obj, Symbol};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A waif: a lightweight instance bound to a class object. Waifs are
/// reference-typed — copying the `Var` copies the handle, and a property
/// write through any copy is visible through all of them. A waif has no id in
/// the object-number namespace.
#[derive(Clone)]
pub struct Waif(Rc<WaifInner>);

struct WaifInner {
    class: Obj,
    owner: Obj,
    props: RefCell<Vec<(Symbol, Var)>>,
}

impl Waif {
    pub fn new(class: Obj, owner: Obj) -> Self {
        Waif(Rc::new(WaifInner {
            class,
            owner,
            props: RefCell::new(vec![]),
        }))
    }

    /// The class object as stored. Callers that present `.class` to MOO code
    /// must substitute `#-1` when this object is no longer valid.
    pub fn class(&self) -> Obj {
        self.0.class
    }

    pub fn owner(&self) -> Obj {
        self.0.owner
    }

    pub fn get_prop(&self, name: Symbol) -> Option<Var> {
        self.0
            .props
            .borrow()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn set_prop(&self, name: Symbol, value: Var) {
        let mut props = self.0.props.borrow_mut();
        match props.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => props.push((name, value)),
        }
    }

    pub fn prop_names(&self) -> Vec<Symbol> {
        self.0.props.borrow().iter().map(|(n, _)| *n).collect()
    }

    pub fn same_handle(&self, other: &Waif) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Would storing `value` into a property of this waif create a cycle?
    /// True when `value` transitively contains this waif or its class object.
    pub fn would_cycle(&self, value: &Var) -> bool {
        fn walk(waif: &Waif, v: &Var) -> bool {
            match v.variant() {
                Variant::Waif(w) => {
                    if w.same_handle(waif) {
                        return true;
                    }
                    let props = w.0.props.borrow();
                    props.iter().any(|(_, pv)| walk(waif, pv))
                }
                Variant::Obj(o) => *o == waif.class(),
                Variant::List(l) => l.iter().any(|e| walk(waif, e)),
                Variant::Map(m) => m.iter().any(|(_, mv)| walk(waif, mv)),
                _ => false,
            }
        }
        walk(self, value)
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for Waif {
    fn eq(&self, other: &Self) -> bool {
        self.same_handle(other)
    }
}

impl Eq for Waif {}

impl PartialOrd for Waif {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waif {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr().cmp(&other.addr())
    }
}

impl Hash for Waif {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl Debug for Waif {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Waif(class = {})", self.0.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{v_int, v_list, v_waif, Obj};

    #[test]
    fn writes_are_visible_through_every_handle() {
        let w = Waif::new(Obj(5), Obj(2));
        let alias = w.clone();
        w.set_prop(Symbol::mk("hp"), v_int(10));
        assert_eq!(alias.get_prop(Symbol::mk("hp")), Some(v_int(10)));
        alias.set_prop(Symbol::mk("hp"), v_int(3));
        assert_eq!(w.get_prop(Symbol::mk("hp")), Some(v_int(3)));
    }

    #[test]
    fn self_containment_detected() {
        let w = Waif::new(Obj(5), Obj(2));
        let holding = v_list(&[v_int(1), v_waif(w.clone())]);
        assert!(w.would_cycle(&holding));
        assert!(w.would_cycle(&crate::v_objid(5)));
        assert!(!w.would_cycle(&v_int(1)));
    }
}
