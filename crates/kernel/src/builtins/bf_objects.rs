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

//! Object manipulation builtins.

use crate::builtins::BfRet::Ret;
use crate::builtins::{call_verb_nested, register, BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::world;
use barn_db::model::ObjFlag;
use barn_db::ObjPtr;
use barn_var::ErrorCode::{E_INVARG, E_NACC, E_PERM, E_TYPE};
use barn_var::{
    v_anon, v_bool_int, v_int, v_list, v_obj, v_waif, Obj, Var, Variant, Waif, NOTHING,
};

fn obj_arg(bf_args: &BfCallState<'_, '_>, v: &Var) -> Result<Obj, BfErr> {
    world::obj_or_invarg(bf_args.world, v).map_err(BfErr::ErrValue)
}

/// Parse the parent argument of `create`: an object, `#-1`, or a list of
/// objects.
fn parents_arg(bf_args: &BfCallState<'_, '_>, v: &Var) -> Result<Vec<Obj>, BfErr> {
    match v.variant() {
        Variant::Obj(o) => {
            if *o == NOTHING {
                return Ok(vec![]);
            }
            if !bf_args.world.valid(*o) {
                return Err(BfErr::Code(E_INVARG));
            }
            Ok(vec![*o])
        }
        Variant::List(l) => {
            let mut parents = vec![];
            for p in l.iter() {
                parents.push(obj_arg(bf_args, p)?);
            }
            Ok(parents)
        }
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn check_fertile(bf_args: &BfCallState<'_, '_>, parents: &[Obj]) -> Result<(), BfErr> {
    if bf_args.wizard_perms() {
        return Ok(());
    }
    let perms = bf_args.task_perms();
    for p in parents {
        let po = bf_args
            .world
            .get(*p)
            .map_err(|e| BfErr::Code(e.to_error_code()))?;
        if !po.flags.contains(ObjFlag::Fertile) && !world::controls(bf_args.world, perms, po.owner)
        {
            return Err(BfErr::Code(E_PERM));
        }
    }
    Ok(())
}

/// `create(parent [, owner])`, or `create(parent, 1)` for an anonymous
/// object.
fn bf_create(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let parents = parents_arg(bf_args, &bf_args.args[0].clone())?;
    check_fertile(bf_args, &parents)?;
    let perms = bf_args.task_perms();

    let anonymous = matches!(bf_args.args.get(1), Some(v) if matches!(v.variant(), Variant::Int(1)));
    if anonymous {
        let handle = bf_args
            .world
            .create_anonymous(parents, perms)
            .map_err(|e| BfErr::Code(e.to_error_code()))?;
        let value = v_anon(handle);
        if let Some(Err(_)) = call_verb_nested(bf_args, &value, "initialize", vec![]) {
            // Initialization failures don't undo creation.
        }
        return Ok(Ret(value));
    }

    let owner = match bf_args.args.get(1) {
        None => perms,
        Some(v) => {
            let o = match v.variant() {
                Variant::Obj(o) => *o,
                _ => return Err(BfErr::Code(E_TYPE)),
            };
            if o != perms && o != NOTHING && !bf_args.wizard_perms() {
                return Err(BfErr::Code(E_PERM));
            }
            o
        }
    };
    let obj = bf_args
        .world
        .create(parents, owner)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    let value = v_obj(obj);
    if let Some(Err(_)) = call_verb_nested(bf_args, &value, "initialize", vec![]) {
        // As above.
    }
    Ok(Ret(value))
}

fn bf_recycle(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    match bf_args.args[0].clone().variant() {
        Variant::Obj(o) => {
            let o = *o;
            if !bf_args.world.valid(o) {
                return Err(BfErr::Code(E_INVARG));
            }
            let owner = bf_args
                .world
                .get(o)
                .map_err(|e| BfErr::Code(e.to_error_code()))?
                .owner;
            bf_args.check_controls(owner)?;
            // The object gets a last word before teardown.
            let _ = call_verb_nested(bf_args, &v_obj(o), "recycle", vec![]);
            bf_args
                .world
                .recycle(o)
                .map_err(|e| BfErr::Code(e.to_error_code()))?;
            Ok(Ret(v_int(0)))
        }
        Variant::Anon(a) => {
            if !bf_args.world.anon_valid(a.id()) {
                return Err(BfErr::Code(E_INVARG));
            }
            let owner = bf_args
                .world
                .get_ptr(ObjPtr::Anon(a.id()))
                .map_err(|e| BfErr::Code(e.to_error_code()))?
                .owner;
            bf_args.check_controls(owner)?;
            let value = bf_args.args[0].clone();
            let _ = call_verb_nested(bf_args, &value, "recycle", vec![]);
            bf_args.world.recycle_anonymous(a.id());
            Ok(Ret(v_int(0)))
        }
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

/// Valid means a live *numbered* object; anonymous objects and waifs read 0.
fn bf_valid(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let valid = match bf_args.args[0].variant() {
        Variant::Obj(o) => bf_args.world.valid(*o),
        _ => false,
    };
    Ok(Ret(v_bool_int(valid)))
}

fn receiver_ptr(bf_args: &BfCallState<'_, '_>, v: &Var) -> Result<ObjPtr, BfErr> {
    match v.variant() {
        Variant::Obj(o) => {
            if !bf_args.world.valid(*o) {
                return Err(BfErr::Code(E_INVARG));
            }
            Ok(ObjPtr::Num(*o))
        }
        Variant::Anon(a) => {
            if !bf_args.world.anon_valid(a.id()) {
                return Err(BfErr::Code(E_INVARG));
            }
            Ok(ObjPtr::Anon(a.id()))
        }
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn bf_parent(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let ptr = receiver_ptr(bf_args, &bf_args.args[0])?;
    let o = bf_args
        .world
        .get_ptr(ptr)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_obj(o.parents.first().copied().unwrap_or(NOTHING))))
}

fn bf_parents(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let ptr = receiver_ptr(bf_args, &bf_args.args[0])?;
    let o = bf_args
        .world
        .get_ptr(ptr)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_list(
        &o.parents.iter().map(|p| v_obj(*p)).collect::<Vec<_>>(),
    )))
}

fn bf_children(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, &bf_args.args[0])?;
    let o = bf_args
        .world
        .get(obj)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_list(
        &o.children.iter().map(|c| v_obj(*c)).collect::<Vec<_>>(),
    )))
}

fn do_chparents(bf_args: &mut BfCallState<'_, '_>, parents: Vec<Obj>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, &bf_args.args[0])?;
    let owner = bf_args
        .world
        .get(obj)
        .map_err(|e| BfErr::Code(e.to_error_code()))?
        .owner;
    bf_args.check_controls(owner)?;
    check_fertile(bf_args, &parents)?;
    bf_args
        .world
        .chparents(obj, parents)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_int(0)))
}

fn bf_chparent(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let parent = &bf_args.args[1];
    let parents = match parent.variant() {
        Variant::Obj(o) if *o == NOTHING => vec![],
        _ => vec![obj_arg(bf_args, parent)?],
    };
    do_chparents(bf_args, parents)
}

fn bf_chparents(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let parents = parents_arg(bf_args, &bf_args.args[1].clone())?;
    do_chparents(bf_args, parents)
}

fn bf_max_object(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_obj(bf_args.world.max_object())))
}

fn bf_objects(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_list(
        &bf_args
            .world
            .all_objects()
            .into_iter()
            .map(v_obj)
            .collect::<Vec<_>>(),
    )))
}

/// `move(what, where)`: permission, `:accept` consultation, containment
/// acyclicity, then the exit/enter notifications.
fn bf_move(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let what = obj_arg(bf_args, &bf_args.args[0])?;
    let where_to = match bf_args.args[1].variant() {
        Variant::Obj(o) if *o == NOTHING => NOTHING,
        _ => obj_arg(bf_args, &bf_args.args[1])?,
    };
    let owner = bf_args
        .world
        .get(what)
        .map_err(|e| BfErr::Code(e.to_error_code()))?
        .owner;
    bf_args.check_controls(owner)?;

    if where_to != NOTHING && !bf_args.wizard_perms() {
        let accepted = match call_verb_nested(
            bf_args,
            &v_obj(where_to),
            "accept",
            vec![v_obj(what)],
        ) {
            None => false,
            Some(Ok(v)) => v.is_true(),
            Some(Err(_)) => false,
        };
        if !accepted {
            return Err(BfErr::Code(E_NACC));
        }
    }

    let old_location = bf_args
        .world
        .get(what)
        .map_err(|e| BfErr::Code(e.to_error_code()))?
        .location;
    if old_location == where_to {
        return Ok(Ret(v_int(0)));
    }
    bf_args
        .world
        .move_object(what, where_to)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;

    // Notify the old and new containers; their failures are their own.
    if old_location != NOTHING && bf_args.world.valid(old_location) {
        let _ = call_verb_nested(bf_args, &v_obj(old_location), "exitfunc", vec![v_obj(what)]);
    }
    if where_to != NOTHING && bf_args.world.valid(where_to) {
        let _ = call_verb_nested(bf_args, &v_obj(where_to), "enterfunc", vec![v_obj(what)]);
    }
    Ok(Ret(v_int(0)))
}

fn bf_contents(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, &bf_args.args[0])?;
    let o = bf_args
        .world
        .get(obj)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_list(
        &o.contents.iter().map(|c| v_obj(*c)).collect::<Vec<_>>(),
    )))
}

fn bf_location(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, &bf_args.args[0])?;
    let o = bf_args
        .world
        .get(obj)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_obj(o.location)))
}

fn bf_players(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_list(
        &bf_args
            .world
            .players()
            .into_iter()
            .map(v_obj)
            .collect::<Vec<_>>(),
    )))
}

fn bf_is_player(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, &bf_args.args[0])?;
    Ok(Ret(v_bool_int(bf_args.world.is_player(obj))))
}

fn bf_set_player_flag(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, &bf_args.args[0])?;
    let on = bf_args.args[1].is_true();
    bf_args.check_wizard()?;
    bf_args
        .world
        .get_mut(obj)
        .map_err(|e| BfErr::Code(e.to_error_code()))?
        .flags
        .set_to(ObjFlag::User, on);
    Ok(Ret(v_int(0)))
}

/// `new_waif()`: class is the `this` of the calling verb, owner the frame's
/// programmer. Anonymous classes are refused.
fn bf_new_waif(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let this = bf_args.exec.top().this.clone();
    let class = match this.variant() {
        Variant::Obj(o) => *o,
        Variant::Anon(_) => return Err(BfErr::Code(E_INVARG)),
        _ => return Err(BfErr::Code(E_INVARG)),
    };
    if !bf_args.world.valid(class) {
        return Err(BfErr::Code(E_INVARG));
    }
    let owner = bf_args.task_perms();
    Ok(Ret(v_waif(Waif::new(class, owner))))
}

pub(crate) fn register_bf_objects(builtins: &mut [BuiltinFunction]) {
    register(builtins, "create", bf_create);
    register(builtins, "recycle", bf_recycle);
    register(builtins, "valid", bf_valid);
    register(builtins, "parent", bf_parent);
    register(builtins, "parents", bf_parents);
    register(builtins, "children", bf_children);
    register(builtins, "chparent", bf_chparent);
    register(builtins, "chparents", bf_chparents);
    register(builtins, "max_object", bf_max_object);
    register(builtins, "objects", bf_objects);
    register(builtins, "move", bf_move);
    register(builtins, "contents", bf_contents);
    register(builtins, "location", bf_location);
    register(builtins, "players", bf_players);
    register(builtins, "is_player", bf_is_player);
    register(builtins, "set_player_flag", bf_set_player_flag);
    register(builtins, "new_waif", bf_new_waif);
}
