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

//! The world: numbered objects in an id-indexed table with a recycled-id free
//! list, plus the arena of anonymous objects. All mutation goes through here
//! so the parent/child, location/contents, and property-slot invariants hold
//! at every return.

use crate::model::{
    verb_names_match, ObjFlag, ObjFlags, PropFlags, VerbArgsSpec, VerbFlags,
};
use crate::WorldStateError;
use barn_compiler::Program;
use barn_var::{Anon, Obj, Symbol, Var, NOTHING};
use std::collections::{HashMap, HashSet};

/// One property slot on an object: the local value (`None` = clear, inherit
/// the ancestor's), plus per-object ownership and permissions.
#[derive(Clone, Debug)]
pub struct PropSlot {
    pub value: Option<Var>,
    pub owner: Obj,
    pub flags: PropFlags,
}

/// A verb defined on some object.
#[derive(Clone, Debug)]
pub struct Verb {
    /// The name spec: whitespace-separated patterns, `*` wildcards allowed.
    pub names: String,
    pub owner: Obj,
    pub flags: VerbFlags,
    pub args: VerbArgsSpec,
    pub source: String,
    pub program: Option<Program>,
}

impl Verb {
    pub fn matches_name(&self, candidate: &str) -> bool {
        verb_names_match(&self.names, candidate)
    }

    /// The first pattern of the name spec, as tracebacks print it.
    pub fn first_name(&self) -> String {
        self.names
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string()
    }
}

#[derive(Clone, Debug)]
pub struct Object {
    pub id: Obj,
    pub name: String,
    pub owner: Obj,
    pub flags: ObjFlags,
    pub location: Obj,
    pub contents: Vec<Obj>,
    pub parents: Vec<Obj>,
    pub children: Vec<Obj>,
    /// Properties defined here, in definition order.
    pub propdefs: Vec<Symbol>,
    /// A slot for every property defined here or on an ancestor.
    pub propvals: HashMap<Symbol, PropSlot>,
    pub verbs: Vec<Verb>,
}

impl Object {
    fn new(id: Obj, owner: Obj) -> Self {
        Object {
            id,
            name: String::new(),
            owner,
            flags: ObjFlags::new(),
            location: NOTHING,
            contents: vec![],
            parents: vec![],
            children: vec![],
            propdefs: vec![],
            propvals: HashMap::new(),
            verbs: vec![],
        }
    }
}

/// A reference to a numbered or anonymous object. Anonymous objects have the
/// full object structure but no id in the numbered namespace.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ObjPtr {
    Num(Obj),
    Anon(u64),
}

impl From<Obj> for ObjPtr {
    fn from(o: Obj) -> Self {
        ObjPtr::Num(o)
    }
}

#[derive(Default)]
pub struct ObjectStore {
    objects: Vec<Option<Object>>,
    recycled: Vec<i64>,
    anon: HashMap<u64, Object>,
    anon_handles: HashMap<u64, Anon>,
    next_anon: u64,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- basic access ----

    pub fn valid(&self, obj: Obj) -> bool {
        obj.0 >= 0
            && (obj.0 as usize) < self.objects.len()
            && self.objects[obj.0 as usize].is_some()
    }

    pub fn valid_ptr(&self, ptr: ObjPtr) -> bool {
        match ptr {
            ObjPtr::Num(o) => self.valid(o),
            ObjPtr::Anon(id) => self.anon.contains_key(&id),
        }
    }

    pub fn max_object(&self) -> Obj {
        Obj(self.objects.len() as i64 - 1)
    }

    /// All valid numbered objects, ascending. Anonymous objects are never
    /// listed.
    pub fn all_objects(&self) -> Vec<Obj> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().map(|_| Obj(i as i64)))
            .collect()
    }

    pub fn get(&self, obj: Obj) -> Result<&Object, WorldStateError> {
        if obj.0 < 0 {
            return Err(WorldStateError::ObjectNotFound(obj));
        }
        self.objects
            .get(obj.0 as usize)
            .and_then(|o| o.as_ref())
            .ok_or(WorldStateError::ObjectNotFound(obj))
    }

    pub fn get_mut(&mut self, obj: Obj) -> Result<&mut Object, WorldStateError> {
        if obj.0 < 0 {
            return Err(WorldStateError::ObjectNotFound(obj));
        }
        self.objects
            .get_mut(obj.0 as usize)
            .and_then(|o| o.as_mut())
            .ok_or(WorldStateError::ObjectNotFound(obj))
    }

    pub fn get_ptr(&self, ptr: ObjPtr) -> Result<&Object, WorldStateError> {
        match ptr {
            ObjPtr::Num(o) => self.get(o),
            ObjPtr::Anon(id) => self
                .anon
                .get(&id)
                .ok_or(WorldStateError::ObjectNotFound(NOTHING)),
        }
    }

    pub fn get_ptr_mut(&mut self, ptr: ObjPtr) -> Result<&mut Object, WorldStateError> {
        match ptr {
            ObjPtr::Num(o) => self.get_mut(o),
            ObjPtr::Anon(id) => self
                .anon
                .get_mut(&id)
                .ok_or(WorldStateError::ObjectNotFound(NOTHING)),
        }
    }

    // ---- ancestry ----

    /// The inheritance chain from `ptr` up, depth-first, self first, each
    /// object once.
    pub fn ancestors_with_self(&self, ptr: ObjPtr) -> Vec<ObjPtr> {
        let mut seen = HashSet::new();
        let mut order = vec![];
        self.dfs_chain(ptr, &mut seen, &mut order);
        order
    }

    fn dfs_chain(&self, ptr: ObjPtr, seen: &mut HashSet<ObjPtr>, order: &mut Vec<ObjPtr>) {
        if !seen.insert(ptr) {
            return;
        }
        let Ok(o) = self.get_ptr(ptr) else {
            return;
        };
        order.push(ptr);
        for p in o.parents.clone() {
            self.dfs_chain(ObjPtr::Num(p), seen, order);
        }
    }

    pub fn ancestors(&self, obj: Obj) -> Vec<Obj> {
        self.ancestors_with_self(ObjPtr::Num(obj))
            .into_iter()
            .skip(1)
            .filter_map(|p| match p {
                ObjPtr::Num(o) => Some(o),
                ObjPtr::Anon(_) => None,
            })
            .collect()
    }

    /// All transitive children, not including `obj` itself.
    pub fn descendants(&self, obj: Obj) -> Vec<Obj> {
        let mut out = vec![];
        let mut queue = vec![obj];
        let mut seen = HashSet::new();
        while let Some(o) = queue.pop() {
            let Ok(object) = self.get(o) else { continue };
            for c in &object.children {
                if seen.insert(*c) {
                    out.push(*c);
                    queue.push(*c);
                }
            }
        }
        out
    }

    // ---- create / recycle / chparents / move ----

    pub fn create(&mut self, parents: Vec<Obj>, owner: Obj) -> Result<Obj, WorldStateError> {
        for p in &parents {
            if !self.valid(*p) {
                return Err(WorldStateError::ObjectNotFound(*p));
            }
        }
        let id = match self.recycled.pop() {
            Some(id) => id,
            None => {
                self.objects.push(None);
                self.objects.len() as i64 - 1
            }
        };
        let obj = Obj(id);
        let owner = if owner == NOTHING { obj } else { owner };
        let mut object = Object::new(obj, owner);
        object.parents = parents.clone();
        self.objects[id as usize] = Some(object);
        for p in &parents {
            self.get_mut(*p)?.children.push(obj);
        }
        self.refresh_inherited_slots(obj)?;
        Ok(obj)
    }

    pub fn create_anonymous(
        &mut self,
        parents: Vec<Obj>,
        owner: Obj,
    ) -> Result<Anon, WorldStateError> {
        for p in &parents {
            if !self.valid(*p) {
                return Err(WorldStateError::ObjectNotFound(*p));
            }
        }
        let id = self.next_anon;
        self.next_anon += 1;
        let mut object = Object::new(NOTHING, owner);
        object.parents = parents;
        // Anonymous objects are not in any children list; they inherit but
        // cannot be inherited from.
        self.anon.insert(id, object);
        self.refresh_inherited_slots_ptr(ObjPtr::Anon(id))?;
        let handle = Anon::new(id);
        self.anon_handles.insert(id, handle.clone());
        Ok(handle)
    }

    pub fn anon_valid(&self, id: u64) -> bool {
        self.anon.contains_key(&id)
    }

    /// The canonical handle for an anonymous object, so every `Var` holding
    /// it shares identity.
    pub fn anon_handle(&self, id: u64) -> Option<Anon> {
        self.anon_handles.get(&id).cloned()
    }

    pub fn recycle_anonymous(&mut self, id: u64) {
        self.anon.remove(&id);
        self.anon_handles.remove(&id);
    }

    /// Drop every anonymous object whose only live handle is the arena's own.
    /// Called at task boundaries; returns how many were reaped.
    pub fn reap_anonymous(&mut self) -> usize {
        let dead: Vec<u64> = self
            .anon_handles
            .iter()
            .filter(|(_, h)| h.handle_count() == 1)
            .map(|(id, _)| *id)
            .collect();
        for id in &dead {
            self.anon.remove(id);
            self.anon_handles.remove(id);
        }
        dead.len()
    }

    /// Tear a numbered object out of the world. The caller is responsible for
    /// having run the `:recycle` hook and relocated contents first.
    pub fn recycle(&mut self, obj: Obj) -> Result<(), WorldStateError> {
        let object = self.get(obj)?.clone();

        // Children are adopted by the recycled object's parents.
        for child in object.children.clone() {
            self.chparents(child, object.parents.clone())?;
        }
        for p in &object.parents {
            if let Ok(po) = self.get_mut(*p) {
                po.children.retain(|c| c != &obj);
            }
        }
        if object.location != NOTHING {
            if let Ok(loc) = self.get_mut(object.location) {
                loc.contents.retain(|c| c != &obj);
            }
        }
        for c in object.contents.clone() {
            if let Ok(co) = self.get_mut(c) {
                co.location = NOTHING;
            }
        }
        self.objects[obj.0 as usize] = None;
        self.recycled.push(obj.0);
        Ok(())
    }

    pub fn chparents(&mut self, obj: Obj, new_parents: Vec<Obj>) -> Result<(), WorldStateError> {
        for np in &new_parents {
            if !self.valid(*np) {
                return Err(WorldStateError::ObjectNotFound(*np));
            }
            if *np == obj || self.ancestors(*np).contains(&obj) {
                return Err(WorldStateError::RecursiveMove);
            }
        }
        let old_parents = self.get(obj)?.parents.clone();
        for op in &old_parents {
            if let Ok(po) = self.get_mut(*op) {
                po.children.retain(|c| c != &obj);
            }
        }
        self.get_mut(obj)?.parents = new_parents.clone();
        for np in &new_parents {
            self.get_mut(*np)?.children.push(obj);
        }
        // Rebuild inherited slots on the object and every descendant; values
        // survive by name wherever the definer is still on the chain.
        self.refresh_inherited_slots(obj)?;
        for d in self.descendants(obj) {
            self.refresh_inherited_slots(d)?;
        }
        Ok(())
    }

    /// Recompute which property slots an object should carry, adding clear
    /// slots for newly inherited definitions and dropping slots whose definer
    /// left the chain.
    fn refresh_inherited_slots(&mut self, obj: Obj) -> Result<(), WorldStateError> {
        self.refresh_inherited_slots_ptr(ObjPtr::Num(obj))
    }

    fn refresh_inherited_slots_ptr(&mut self, ptr: ObjPtr) -> Result<(), WorldStateError> {
        let chain = self.ancestors_with_self(ptr);
        let mut wanted: Vec<(Symbol, Obj, PropFlags)> = vec![];
        let mut seen = HashSet::new();
        for a in &chain {
            let ao = self.get_ptr(*a)?;
            for name in &ao.propdefs {
                if seen.insert(*name) {
                    let slot = &ao.propvals[name];
                    wanted.push((*name, slot.owner, slot.flags));
                }
            }
        }
        let object = self.get_ptr_mut(ptr)?;
        let wanted_names: HashSet<Symbol> = wanted.iter().map(|(n, _, _)| *n).collect();
        object.propvals.retain(|n, _| wanted_names.contains(n));
        for (name, def_owner, def_flags) in wanted {
            object.propvals.entry(name).or_insert(PropSlot {
                value: None,
                owner: def_owner,
                flags: def_flags,
            });
        }
        Ok(())
    }

    pub fn move_object(&mut self, what: Obj, where_to: Obj) -> Result<(), WorldStateError> {
        if !self.valid(what) {
            return Err(WorldStateError::ObjectNotFound(what));
        }
        if where_to != NOTHING {
            if !self.valid(where_to) {
                return Err(WorldStateError::ObjectNotFound(where_to));
            }
            // No object may end up inside its own transitive contents.
            let mut loc = where_to;
            while loc != NOTHING {
                if loc == what {
                    return Err(WorldStateError::RecursiveMove);
                }
                loc = self.get(loc)?.location;
            }
        }
        let old_location = self.get(what)?.location;
        if old_location != NOTHING {
            if let Ok(o) = self.get_mut(old_location) {
                o.contents.retain(|c| c != &what);
            }
        }
        self.get_mut(what)?.location = where_to;
        if where_to != NOTHING {
            self.get_mut(where_to)?.contents.push(what);
        }
        Ok(())
    }

    // ---- properties ----

    /// The full property order of an object: the parent chain walked
    /// depth-first, each ancestor's own definitions concatenated, first
    /// occurrence winning. This is the order `dump` writes and the order the
    /// textdump contract requires.
    pub fn property_order(&self, ptr: ObjPtr) -> Vec<Symbol> {
        let mut seen = HashSet::new();
        let mut order = vec![];
        for a in self.ancestors_with_self(ptr) {
            let Ok(ao) = self.get_ptr(a) else { continue };
            for name in &ao.propdefs {
                if seen.insert(*name) {
                    order.push(*name);
                }
            }
        }
        order
    }

    /// The object (in `ptr`'s chain) that defines `name`.
    pub fn property_definer(&self, ptr: ObjPtr, name: Symbol) -> Option<ObjPtr> {
        self.ancestors_with_self(ptr)
            .into_iter()
            .find(|a| {
                self.get_ptr(*a)
                    .map(|o| o.propdefs.contains(&name))
                    .unwrap_or(false)
            })
    }

    /// Resolve a property read: the local slot if set, else the nearest
    /// ancestor's value (the clear-slot rule). An object without a slot but
    /// whose chain defines the property reads as fully clear; this covers
    /// anonymous objects created before the definition appeared.
    pub fn resolve_property(
        &self,
        ptr: ObjPtr,
        name: Symbol,
    ) -> Result<(Var, Obj, PropFlags), WorldStateError> {
        let object = self.get_ptr(ptr)?;
        let (owner, flags, local) = match object.propvals.get(&name) {
            Some(slot) => (slot.owner, slot.flags, slot.value.clone()),
            None => {
                let Some(definer) = self.property_definer(ptr, name) else {
                    return Err(WorldStateError::PropertyNotFound(name.to_string()));
                };
                let slot = &self.get_ptr(definer)?.propvals[&name];
                (slot.owner, slot.flags, None)
            }
        };
        if let Some(v) = local {
            return Ok((v, owner, flags));
        }
        for a in self.ancestors_with_self(ptr).into_iter().skip(1) {
            let ao = self.get_ptr(a)?;
            if let Some(slot) = ao.propvals.get(&name) {
                if let Some(v) = &slot.value {
                    return Ok((v.clone(), owner, flags));
                }
            }
        }
        // A clear slot with no valued ancestor reads as 0, per the reference.
        Ok((barn_var::v_int(0), owner, flags))
    }

    pub fn set_property(
        &mut self,
        ptr: ObjPtr,
        name: Symbol,
        value: Var,
    ) -> Result<(), WorldStateError> {
        if self.get_ptr(ptr)?.propvals.get(&name).is_none() {
            // Materialize the slot if the chain defines the property.
            let Some(definer) = self.property_definer(ptr, name) else {
                return Err(WorldStateError::PropertyNotFound(name.to_string()));
            };
            let slot = self.get_ptr(definer)?.propvals[&name].clone();
            self.get_ptr_mut(ptr)?.propvals.insert(
                name,
                PropSlot {
                    value: None,
                    ..slot
                },
            );
        }
        let object = self.get_ptr_mut(ptr)?;
        let Some(slot) = object.propvals.get_mut(&name) else {
            return Err(WorldStateError::PropertyNotFound(name.to_string()));
        };
        slot.value = Some(value);
        Ok(())
    }

    pub fn add_property(
        &mut self,
        obj: Obj,
        name: Symbol,
        value: Var,
        owner: Obj,
        flags: PropFlags,
    ) -> Result<(), WorldStateError> {
        // Illegal if the name exists anywhere on the chain or below.
        if self.get(obj)?.propvals.contains_key(&name) {
            return Err(WorldStateError::DuplicatePropertyDefinition(
                name.to_string(),
            ));
        }
        for d in self.descendants(obj) {
            if self.get(d)?.propvals.contains_key(&name) {
                return Err(WorldStateError::DuplicatePropertyDefinition(
                    name.to_string(),
                ));
            }
        }
        {
            let object = self.get_mut(obj)?;
            object.propdefs.push(name);
            object.propvals.insert(
                name,
                PropSlot {
                    value: Some(value),
                    owner,
                    flags,
                },
            );
        }
        for d in self.descendants(obj) {
            self.get_mut(d)?.propvals.insert(
                name,
                PropSlot {
                    value: None,
                    owner,
                    flags,
                },
            );
        }
        Ok(())
    }

    pub fn delete_property(&mut self, obj: Obj, name: Symbol) -> Result<(), WorldStateError> {
        {
            let object = self.get_mut(obj)?;
            if !object.propdefs.contains(&name) {
                return Err(WorldStateError::PropertyNotFound(name.to_string()));
            }
            object.propdefs.retain(|n| n != &name);
            object.propvals.remove(&name);
        }
        for d in self.descendants(obj) {
            self.get_mut(d)?.propvals.remove(&name);
        }
        Ok(())
    }

    pub fn clear_property(&mut self, ptr: ObjPtr, name: Symbol) -> Result<(), WorldStateError> {
        // Clearing the definer's own slot is illegal; there is nothing to
        // inherit.
        if let Some(definer) = self.property_definer(ptr, name) {
            if definer == ptr {
                return Err(WorldStateError::InvalidArgument(
                    "cannot clear a property on its definer".into(),
                ));
            }
        }
        let object = self.get_ptr_mut(ptr)?;
        let Some(slot) = object.propvals.get_mut(&name) else {
            return Err(WorldStateError::PropertyNotFound(name.to_string()));
        };
        slot.value = None;
        Ok(())
    }

    pub fn is_clear_property(&self, ptr: ObjPtr, name: Symbol) -> Result<bool, WorldStateError> {
        let object = self.get_ptr(ptr)?;
        let Some(slot) = object.propvals.get(&name) else {
            return Err(WorldStateError::PropertyNotFound(name.to_string()));
        };
        Ok(slot.value.is_none())
    }

    pub fn property_info(
        &self,
        ptr: ObjPtr,
        name: Symbol,
    ) -> Result<(Obj, PropFlags), WorldStateError> {
        let object = self.get_ptr(ptr)?;
        let Some(slot) = object.propvals.get(&name) else {
            return Err(WorldStateError::PropertyNotFound(name.to_string()));
        };
        Ok((slot.owner, slot.flags))
    }

    pub fn set_property_info(
        &mut self,
        ptr: ObjPtr,
        name: Symbol,
        owner: Obj,
        flags: PropFlags,
        new_name: Option<Symbol>,
    ) -> Result<(), WorldStateError> {
        {
            let object = self.get_ptr_mut(ptr)?;
            let Some(slot) = object.propvals.get_mut(&name) else {
                return Err(WorldStateError::PropertyNotFound(name.to_string()));
            };
            slot.owner = owner;
            slot.flags = flags;
        }
        if let Some(new_name) = new_name {
            if new_name == name {
                return Ok(());
            }
            let ObjPtr::Num(obj) = ptr else {
                return Err(WorldStateError::InvalidArgument(
                    "cannot rename properties on anonymous objects".into(),
                ));
            };
            // Renames happen on the definer and ripple down the slot maps.
            if !self.get(obj)?.propdefs.contains(&name) {
                return Err(WorldStateError::InvalidArgument(
                    "property rename must happen on its definer".into(),
                ));
            }
            if self.get(obj)?.propvals.contains_key(&new_name) {
                return Err(WorldStateError::DuplicatePropertyDefinition(
                    new_name.to_string(),
                ));
            }
            {
                let object = self.get_mut(obj)?;
                for n in object.propdefs.iter_mut() {
                    if *n == name {
                        *n = new_name;
                    }
                }
                if let Some(slot) = object.propvals.remove(&name) {
                    object.propvals.insert(new_name, slot);
                }
            }
            for d in self.descendants(obj) {
                let dobj = self.get_mut(d)?;
                if let Some(slot) = dobj.propvals.remove(&name) {
                    dobj.propvals.insert(new_name, slot);
                }
            }
        }
        Ok(())
    }

    // ---- verbs ----

    /// Find a verb for dispatch: walk the inheritance chain depth-first and
    /// return the defining object and verb index of the first name match.
    /// `this` stays the receiver; the definer is what tracebacks print.
    pub fn find_verb(&self, ptr: ObjPtr, name: &str) -> Option<(ObjPtr, usize)> {
        for a in self.ancestors_with_self(ptr) {
            let Ok(ao) = self.get_ptr(a) else { continue };
            for (i, v) in ao.verbs.iter().enumerate() {
                if v.matches_name(name) {
                    return Some((a, i));
                }
            }
        }
        None
    }

    /// Find a command verb matching name + argument specs along the chain.
    pub fn find_command_verb(
        &self,
        ptr: ObjPtr,
        name: &str,
        dobj_matches: impl Fn(crate::model::ArgSpec) -> bool,
        prep_matches: impl Fn(crate::model::PrepSpec) -> bool,
        iobj_matches: impl Fn(crate::model::ArgSpec) -> bool,
    ) -> Option<(ObjPtr, usize)> {
        for a in self.ancestors_with_self(ptr) {
            let Ok(ao) = self.get_ptr(a) else { continue };
            for (i, v) in ao.verbs.iter().enumerate() {
                if v.matches_name(name)
                    && dobj_matches(v.args.dobj)
                    && prep_matches(v.args.prep)
                    && iobj_matches(v.args.iobj)
                {
                    return Some((a, i));
                }
            }
        }
        None
    }

    /// Locate a verb on the object itself (no inheritance) by name or 1-based
    /// index, the addressing `verb_info` and friends use.
    pub fn verb_index(&self, ptr: ObjPtr, desc: &VerbDesc) -> Result<usize, WorldStateError> {
        let object = self.get_ptr(ptr)?;
        match desc {
            VerbDesc::Index(i) => {
                if *i < 1 || *i as usize > object.verbs.len() {
                    return Err(WorldStateError::VerbNotFound(format!("verb #{i}")));
                }
                Ok(*i as usize - 1)
            }
            VerbDesc::Name(name) => object
                .verbs
                .iter()
                .position(|v| v.matches_name(name))
                .ok_or_else(|| WorldStateError::VerbNotFound(name.clone())),
        }
    }

    pub fn verb(&self, ptr: ObjPtr, index: usize) -> Result<&Verb, WorldStateError> {
        self.get_ptr(ptr)?
            .verbs
            .get(index)
            .ok_or_else(|| WorldStateError::VerbNotFound(format!("verb #{index}")))
    }

    pub fn verb_mut(&mut self, ptr: ObjPtr, index: usize) -> Result<&mut Verb, WorldStateError> {
        self.get_ptr_mut(ptr)?
            .verbs
            .get_mut(index)
            .ok_or_else(|| WorldStateError::VerbNotFound(format!("verb #{index}")))
    }

    pub fn add_verb(&mut self, ptr: ObjPtr, verb: Verb) -> Result<usize, WorldStateError> {
        let object = self.get_ptr_mut(ptr)?;
        object.verbs.push(verb);
        Ok(object.verbs.len())
    }

    pub fn delete_verb(&mut self, ptr: ObjPtr, index: usize) -> Result<(), WorldStateError> {
        let object = self.get_ptr_mut(ptr)?;
        if index >= object.verbs.len() {
            return Err(WorldStateError::VerbNotFound(format!("verb #{index}")));
        }
        object.verbs.remove(index);
        Ok(())
    }

    // ---- players ----

    pub fn players(&self) -> Vec<Obj> {
        self.all_objects()
            .into_iter()
            .filter(|o| {
                self.get(*o)
                    .map(|obj| obj.flags.contains(ObjFlag::User))
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn is_player(&self, obj: Obj) -> bool {
        self.get(obj)
            .map(|o| o.flags.contains(ObjFlag::User))
            .unwrap_or(false)
    }

    /// Used by the textdump loader, which knows ids up front.
    pub fn insert_raw(&mut self, object: Object) {
        let id = object.id.0 as usize;
        while self.objects.len() <= id {
            self.objects.push(None);
        }
        self.objects[id] = Some(object);
    }

    /// Rebuild the recycled-id free list after a raw load.
    pub fn rebuild_free_list(&mut self) {
        self.recycled = self
            .objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_none())
            .map(|(i, _)| i as i64)
            .collect();
        // Lowest ids get reused first.
        self.recycled.sort_by(|a, b| b.cmp(a));
    }
}

/// How builtins address a verb on an object: by name or by 1-based index.
#[derive(Clone, Debug)]
pub enum VerbDesc {
    Name(String),
    Index(i64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropFlag, VerbFlag};
    use barn_var::{v_int, v_str};

    fn store_with_root() -> (ObjectStore, Obj) {
        let mut store = ObjectStore::new();
        let root = store.create(vec![], NOTHING).unwrap();
        (store, root)
    }

    #[test]
    fn create_reuses_recycled_ids() {
        let (mut store, root) = store_with_root();
        let a = store.create(vec![root], NOTHING).unwrap();
        let b = store.create(vec![root], NOTHING).unwrap();
        assert_eq!(a, Obj(1));
        assert_eq!(b, Obj(2));
        store.recycle(a).unwrap();
        assert!(!store.valid(a));
        let c = store.create(vec![root], NOTHING).unwrap();
        assert_eq!(c, Obj(1));
        assert_eq!(store.max_object(), Obj(2));
    }

    #[test]
    fn property_inheritance_and_order() {
        let (mut store, root) = store_with_root();
        store
            .add_property(root, Symbol::mk("alpha"), v_int(1), root, PropFlags::new())
            .unwrap();
        store
            .add_property(root, Symbol::mk("beta"), v_int(2), root, PropFlags::new())
            .unwrap();
        let kid = store.create(vec![root], NOTHING).unwrap();
        store
            .add_property(kid, Symbol::mk("gamma"), v_int(3), kid, PropFlags::new())
            .unwrap();

        // Child slots exist, clear, and read through to the parent's value.
        let (v, _, _) = store
            .resolve_property(ObjPtr::Num(kid), Symbol::mk("alpha"))
            .unwrap();
        assert_eq!(v, v_int(1));
        assert!(store
            .is_clear_property(ObjPtr::Num(kid), Symbol::mk("alpha"))
            .unwrap());

        // Order: own definitions first, then the chain's.
        let order = store.property_order(ObjPtr::Num(kid));
        let names: Vec<String> = order.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["gamma", "alpha", "beta"]);

        // A local write un-clears.
        store
            .set_property(ObjPtr::Num(kid), Symbol::mk("alpha"), v_int(10))
            .unwrap();
        let (v, _, _) = store
            .resolve_property(ObjPtr::Num(kid), Symbol::mk("alpha"))
            .unwrap();
        assert_eq!(v, v_int(10));
        assert!(!store
            .is_clear_property(ObjPtr::Num(kid), Symbol::mk("alpha"))
            .unwrap());
    }

    #[test]
    fn duplicate_property_definitions_rejected() {
        let (mut store, root) = store_with_root();
        store
            .add_property(root, Symbol::mk("p"), v_int(1), root, PropFlags::new())
            .unwrap();
        let kid = store.create(vec![root], NOTHING).unwrap();
        assert!(matches!(
            store.add_property(kid, Symbol::mk("p"), v_int(2), kid, PropFlags::new()),
            Err(WorldStateError::DuplicatePropertyDefinition(_))
        ));
        // And defining below an object that has a descendant with the name.
        assert!(matches!(
            store.add_property(root, Symbol::mk("P"), v_int(2), root, PropFlags::new()),
            Err(WorldStateError::DuplicatePropertyDefinition(_))
        ));
    }

    #[test]
    fn chparents_rejects_cycles_and_preserves_values() {
        let (mut store, root) = store_with_root();
        let a = store.create(vec![root], NOTHING).unwrap();
        let b = store.create(vec![a], NOTHING).unwrap();
        assert!(matches!(
            store.chparents(root, vec![b]),
            Err(WorldStateError::RecursiveMove)
        ));
        assert!(matches!(
            store.chparents(a, vec![a]),
            Err(WorldStateError::RecursiveMove)
        ));

        // Retained-definer values survive a reparent.
        store
            .add_property(root, Symbol::mk("keep"), v_int(1), root, PropFlags::new())
            .unwrap();
        store
            .set_property(ObjPtr::Num(b), Symbol::mk("keep"), v_int(99))
            .unwrap();
        let c = store.create(vec![root], NOTHING).unwrap();
        store.chparents(b, vec![c]).unwrap();
        let (v, _, _) = store
            .resolve_property(ObjPtr::Num(b), Symbol::mk("keep"))
            .unwrap();
        assert_eq!(v, v_int(99));

        // Dropping the chain drops the slot.
        store.chparents(b, vec![]).unwrap();
        assert!(store
            .resolve_property(ObjPtr::Num(b), Symbol::mk("keep"))
            .is_err());
    }

    #[test]
    fn move_rejects_containment_cycles() {
        let (mut store, root) = store_with_root();
        let bag = store.create(vec![root], NOTHING).unwrap();
        let coin = store.create(vec![root], NOTHING).unwrap();
        store.move_object(coin, bag).unwrap();
        assert_eq!(store.get(coin).unwrap().location, bag);
        assert_eq!(store.get(bag).unwrap().contents, vec![coin]);
        assert!(matches!(
            store.move_object(bag, coin),
            Err(WorldStateError::RecursiveMove)
        ));
        assert!(matches!(
            store.move_object(bag, bag),
            Err(WorldStateError::RecursiveMove)
        ));
        store.move_object(coin, NOTHING).unwrap();
        assert!(store.get(bag).unwrap().contents.is_empty());
    }

    #[test]
    fn verb_dispatch_walks_chain_and_reports_definer() {
        let (mut store, root) = store_with_root();
        let kid = store.create(vec![root], NOTHING).unwrap();
        store
            .add_verb(
                ObjPtr::Num(root),
                Verb {
                    names: "look l*ook".into(),
                    owner: root,
                    flags: VerbFlags::new_with(VerbFlag::Exec),
                    args: VerbArgsSpec::this_none_this(),
                    source: String::new(),
                    program: None,
                },
            )
            .unwrap();
        let (definer, idx) = store.find_verb(ObjPtr::Num(kid), "look").unwrap();
        assert_eq!(definer, ObjPtr::Num(root));
        assert_eq!(idx, 0);
        assert!(store.find_verb(ObjPtr::Num(kid), "dance").is_none());
    }

    #[test]
    fn anonymous_objects_inherit_and_reap() {
        let (mut store, root) = store_with_root();
        store
            .add_property(root, Symbol::mk("hp"), v_str("full"), root, PropFlags::new())
            .unwrap();
        let handle = store.create_anonymous(vec![root], root).unwrap();
        let ptr = ObjPtr::Anon(handle.id());
        let (v, _, _) = store.resolve_property(ptr, Symbol::mk("hp")).unwrap();
        assert_eq!(v, v_str("full"));
        assert!(store.anon_valid(handle.id()));

        // While a handle is held, the reaper leaves it alone.
        assert_eq!(store.reap_anonymous(), 0);
        drop(handle);
        assert_eq!(store.reap_anonymous(), 1);
    }
}
