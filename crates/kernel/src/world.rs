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

//! Semantics layered over the raw store: builtin properties, permission
//! checks, receiver coercion (numbered, anonymous, waif, primitive), and
//! verb resolution for dispatch.

use barn_db::model::{ObjFlag, PropFlag, VerbFlag};
use barn_db::store::Verb;
use barn_db::{ObjPtr, ObjectStore};
use barn_var::ErrorCode::{E_INVARG, E_INVIND, E_PERM, E_PROPNF, E_RECMOVE, E_TYPE, E_VERBNF};
use barn_var::{
    v_bool_int, v_list, v_obj, v_objid, v_string, Error, Obj, Symbol, Var, VarType, Variant,
    NOTHING, SYSTEM_OBJECT,
};

/// Does `who` control an object owned by `owner`? Wizards control
/// everything; otherwise ownership decides.
pub fn controls(world: &ObjectStore, who: Obj, owner: Obj) -> bool {
    who == owner || is_wizard(world, who)
}

pub fn is_wizard(world: &ObjectStore, who: Obj) -> bool {
    world
        .get(who)
        .map(|o| o.flags.contains(ObjFlag::Wizard))
        .unwrap_or(false)
}

pub fn is_programmer(world: &ObjectStore, who: Obj) -> bool {
    world
        .get(who)
        .map(|o| o.flags.contains(ObjFlag::Programmer))
        .unwrap_or(false)
}

/// Coerce a receiver value to an object pointer. Invalid references are
/// `E_INVIND`, non-objects `E_TYPE`.
pub fn receiver_ptr(world: &ObjectStore, v: &Var) -> Result<ObjPtr, Error> {
    match v.variant() {
        Variant::Obj(o) => {
            if !world.valid(*o) {
                return Err(E_INVIND.into());
            }
            Ok(ObjPtr::Num(*o))
        }
        Variant::Anon(a) => {
            if !world.anon_valid(a.id()) {
                return Err(E_INVIND.into());
            }
            Ok(ObjPtr::Anon(a.id()))
        }
        _ => Err(E_TYPE.into()),
    }
}

/// Read a property off any receiver value, builtin properties included.
pub fn get_property(world: &ObjectStore, perms: Obj, target: &Var, name: &str) -> Result<Var, Error> {
    let name_sym = Symbol::mk(name);
    if let Variant::Waif(w) = target.variant() {
        return get_waif_property(world, w, name, name_sym);
    }
    let ptr = receiver_ptr(world, target)?;
    if let Some(v) = builtin_property(world, ptr, name)? {
        return Ok(v);
    }
    let (value, owner, flags) = world
        .resolve_property(ptr, name_sym)
        .map_err(|e| Error::from(e.to_error_code()))?;
    if !flags.contains(PropFlag::Read) && !controls(world, perms, owner) {
        return Err(E_PERM.into());
    }
    Ok(value)
}

fn get_waif_property(
    world: &ObjectStore,
    w: &barn_var::Waif,
    name: &str,
    name_sym: Symbol,
) -> Result<Var, Error> {
    match name.to_ascii_lowercase().as_str() {
        "owner" => return Ok(v_obj(w.owner())),
        "class" => {
            let class = w.class();
            return Ok(if world.valid(class) {
                v_obj(class)
            } else {
                v_obj(NOTHING)
            });
        }
        "wizard" | "programmer" => return Ok(v_bool_int(false)),
        _ => {}
    }
    if let Some(v) = w.get_prop(name_sym) {
        return Ok(v);
    }
    // Fall through to the class object on miss.
    let class = w.class();
    if !world.valid(class) {
        return Err(E_INVIND.into());
    }
    let (value, _, _) = world
        .resolve_property(ObjPtr::Num(class), name_sym)
        .map_err(|e| Error::from(e.to_error_code()))?;
    Ok(value)
}

/// The builtin properties every object carries.
fn builtin_property(
    world: &ObjectStore,
    ptr: ObjPtr,
    name: &str,
) -> Result<Option<Var>, Error> {
    let o = world
        .get_ptr(ptr)
        .map_err(|e| Error::from(e.to_error_code()))?;
    let v = match name.to_ascii_lowercase().as_str() {
        "name" => v_string(o.name.clone()),
        "owner" => v_obj(o.owner),
        "location" => v_obj(o.location),
        "contents" => v_list(&o.contents.iter().map(|c| v_obj(*c)).collect::<Vec<_>>()),
        "programmer" => v_bool_int(o.flags.contains(ObjFlag::Programmer)),
        "wizard" => v_bool_int(o.flags.contains(ObjFlag::Wizard)),
        "player" => v_bool_int(o.flags.contains(ObjFlag::User)),
        "r" => v_bool_int(o.flags.contains(ObjFlag::Read)),
        "w" => v_bool_int(o.flags.contains(ObjFlag::Write)),
        "f" => v_bool_int(o.flags.contains(ObjFlag::Fertile)),
        _ => return Ok(None),
    };
    Ok(Some(v))
}

/// Write a property on any receiver value.
pub fn set_property(
    world: &mut ObjectStore,
    perms: Obj,
    target: &Var,
    name: &str,
    value: Var,
) -> Result<(), Error> {
    let name_sym = Symbol::mk(name);
    if let Variant::Waif(w) = target.variant() {
        match name.to_ascii_lowercase().as_str() {
            "owner" | "class" | "wizard" | "programmer" => return Err(E_PERM.into()),
            _ => {}
        }
        if w.would_cycle(&value) {
            return Err(E_RECMOVE.into());
        }
        // The class chain must define the property for the waif to carry it.
        let class = w.class();
        if world.valid(class)
            && world
                .resolve_property(ObjPtr::Num(class), name_sym)
                .is_err()
            && w.get_prop(name_sym).is_none()
        {
            return Err(E_PROPNF.into());
        }
        w.set_prop(name_sym, value);
        return Ok(());
    }

    let ptr = receiver_ptr(world, target)?;
    match name.to_ascii_lowercase().as_str() {
        "name" => {
            let Variant::Str(s) = value.variant() else {
                return Err(E_TYPE.into());
            };
            let o = world.get_ptr(ptr).map_err(|e| Error::from(e.to_error_code()))?;
            if !controls(world, perms, o.owner) {
                return Err(E_PERM.into());
            }
            world
                .get_ptr_mut(ptr)
                .map_err(|e| Error::from(e.to_error_code()))?
                .name = s.to_text().into_owned();
            return Ok(());
        }
        "owner" => {
            let Variant::Obj(new_owner) = value.variant() else {
                return Err(E_TYPE.into());
            };
            if !is_wizard(world, perms) {
                return Err(E_PERM.into());
            }
            world
                .get_ptr_mut(ptr)
                .map_err(|e| Error::from(e.to_error_code()))?
                .owner = *new_owner;
            return Ok(());
        }
        "programmer" | "wizard" => {
            if !is_wizard(world, perms) {
                return Err(E_PERM.into());
            }
            let on = value.is_true();
            let flag = if name.eq_ignore_ascii_case("programmer") {
                ObjFlag::Programmer
            } else {
                ObjFlag::Wizard
            };
            world
                .get_ptr_mut(ptr)
                .map_err(|e| Error::from(e.to_error_code()))?
                .flags
                .set_to(flag, on);
            return Ok(());
        }
        "r" | "w" | "f" => {
            let o = world.get_ptr(ptr).map_err(|e| Error::from(e.to_error_code()))?;
            if !controls(world, perms, o.owner) {
                return Err(E_PERM.into());
            }
            let on = value.is_true();
            let flag = match name.to_ascii_lowercase().as_str() {
                "r" => ObjFlag::Read,
                "w" => ObjFlag::Write,
                _ => ObjFlag::Fertile,
            };
            world
                .get_ptr_mut(ptr)
                .map_err(|e| Error::from(e.to_error_code()))?
                .flags
                .set_to(flag, on);
            return Ok(());
        }
        "location" | "contents" | "player" => return Err(E_PERM.into()),
        _ => {}
    }

    let (_, owner, flags) = world
        .resolve_property(ptr, name_sym)
        .map_err(|e| Error::from(e.to_error_code()))?;
    if !flags.contains(PropFlag::Write) && !controls(world, perms, owner) {
        return Err(E_PERM.into());
    }
    world
        .set_property(ptr, name_sym, value)
        .map_err(|e| Error::from(e.to_error_code()))
}

/// A resolved verb call: what `this` binds to, where the verb is defined,
/// and the verb body itself.
pub struct ResolvedVerb {
    pub this: Var,
    pub verb_loc: Var,
    pub definer: ObjPtr,
    pub index: usize,
    pub owner: Obj,
    pub flags: barn_db::model::VerbFlags,
    pub names: String,
}

/// Resolve `receiver:name(...)`. Primitive receivers dispatch through the
/// `$<type>_proto` objects with `this` bound to the primitive; waifs
/// dispatch on their class with `this` bound to the waif.
pub fn resolve_verb(
    world: &ObjectStore,
    receiver: &Var,
    name: &str,
) -> Result<ResolvedVerb, Error> {
    let (search_ptr, this) = match receiver.variant() {
        Variant::Obj(o) => {
            if !world.valid(*o) {
                return Err(E_INVIND.into());
            }
            (ObjPtr::Num(*o), receiver.clone())
        }
        Variant::Anon(a) => {
            if !world.anon_valid(a.id()) {
                return Err(E_INVIND.into());
            }
            (ObjPtr::Anon(a.id()), receiver.clone())
        }
        Variant::Waif(w) => {
            let class = w.class();
            if !world.valid(class) {
                return Err(E_INVIND.into());
            }
            (ObjPtr::Num(class), receiver.clone())
        }
        _ => {
            let ptr = prototype_for(world, receiver)?;
            (ptr, receiver.clone())
        }
    };
    find_verb_from(world, search_ptr, this, name)
}

fn find_verb_from(
    world: &ObjectStore,
    search_ptr: ObjPtr,
    this: Var,
    name: &str,
) -> Result<ResolvedVerb, Error> {
    let Some((definer, index)) = world.find_verb(search_ptr, name) else {
        return Err(E_VERBNF.into());
    };
    let verb = world
        .verb(definer, index)
        .map_err(|e| Error::from(e.to_error_code()))?;
    if !verb.flags.contains(VerbFlag::Exec) {
        return Err(E_VERBNF.into());
    }
    Ok(ResolvedVerb {
        this,
        verb_loc: definer_value(world, definer),
        definer,
        index,
        owner: verb.owner,
        flags: verb.flags,
        names: verb.names.clone(),
    })
}

/// Resolve a `pass()` call: search starts at the parents of the frame's verb
/// location, `this` unchanged.
pub fn resolve_pass(
    world: &ObjectStore,
    verb_loc: &Var,
    this: &Var,
    name: &str,
) -> Result<ResolvedVerb, Error> {
    let loc_ptr = receiver_ptr(world, verb_loc)?;
    let parents = world
        .get_ptr(loc_ptr)
        .map_err(|e| Error::from(e.to_error_code()))?
        .parents
        .clone();
    for p in parents {
        if let Ok(found) = find_verb_from(world, ObjPtr::Num(p), this.clone(), name) {
            return Ok(found);
        }
    }
    Err(E_VERBNF.into())
}

fn definer_value(world: &ObjectStore, definer: ObjPtr) -> Var {
    match definer {
        ObjPtr::Num(o) => v_obj(o),
        ObjPtr::Anon(id) => {
            // Hand back the canonical handle so identity is preserved.
            world
                .anon_handle(id)
                .map(barn_var::v_anon)
                .unwrap_or_else(|| v_objid(-1))
        }
    }
}

/// `$list_proto` and friends, resolved off #0.
fn prototype_for(world: &ObjectStore, value: &Var) -> Result<ObjPtr, Error> {
    let prop = match value.type_code() {
        VarType::TYPE_INT | VarType::TYPE_BOOL => "int_proto",
        VarType::TYPE_FLOAT => "float_proto",
        VarType::TYPE_STR => "str_proto",
        VarType::TYPE_LIST => "list_proto",
        VarType::TYPE_MAP => "map_proto",
        VarType::TYPE_ERR => "err_proto",
        _ => return Err(E_TYPE.into()),
    };
    let (v, _, _) = world
        .resolve_property(ObjPtr::Num(SYSTEM_OBJECT), Symbol::mk(prop))
        .map_err(|_| Error::from(E_VERBNF))?;
    let Variant::Obj(proto) = v.variant() else {
        return Err(E_VERBNF.into());
    };
    if !world.valid(*proto) {
        return Err(E_VERBNF.into());
    }
    Ok(ObjPtr::Num(*proto))
}

/// Verb-call permission: executable verbs may be called by anyone; the
/// read/write bits gate introspection, checked by the builtins that do it.
pub fn verb_readable(world: &ObjectStore, perms: Obj, verb: &Verb) -> bool {
    verb.flags.contains(VerbFlag::Read) || controls(world, perms, verb.owner)
}

pub fn verb_writable(world: &ObjectStore, perms: Obj, verb: &Verb) -> bool {
    verb.flags.contains(VerbFlag::Write) || controls(world, perms, verb.owner)
}

/// Argument-position object coercion: non-objects are `E_TYPE`, invalid
/// object references `E_INVARG`.
pub fn obj_or_invarg(world: &ObjectStore, v: &Var) -> Result<Obj, Error> {
    let Variant::Obj(o) = v.variant() else {
        return Err(E_TYPE.into());
    };
    if !world.valid(*o) {
        return Err(E_INVARG.into());
    }
    Ok(*o)
}
