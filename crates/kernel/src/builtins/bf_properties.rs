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

//! Property definition and introspection builtins.

use crate::builtins::BfRet::Ret;
use crate::builtins::{register, BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::world;
use barn_db::model::{prop_flags_from_str, prop_flags_to_string, PropFlags};
use barn_db::ObjPtr;
use barn_var::ErrorCode::{E_INVARG, E_TYPE};
use barn_var::{v_bool_int, v_int, v_list, v_obj, v_string, Obj, Symbol, Var, Variant};

fn ptr_arg(bf_args: &BfCallState<'_, '_>, v: &Var) -> Result<ObjPtr, BfErr> {
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

fn name_arg(v: &Var) -> Result<Symbol, BfErr> {
    match v.variant() {
        Variant::Str(s) => Ok(Symbol::mk(&s.to_text())),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn check_obj_readable(bf_args: &BfCallState<'_, '_>, ptr: ObjPtr) -> Result<(), BfErr> {
    let o = bf_args
        .world
        .get_ptr(ptr)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    if o.flags.contains(barn_db::model::ObjFlag::Read)
        || world::controls(bf_args.world, bf_args.task_perms(), o.owner)
        || bf_args.wizard_perms()
    {
        Ok(())
    } else {
        Err(BfErr::Code(barn_var::ErrorCode::E_PERM))
    }
}

/// Properties defined on the object itself, in definition order.
fn bf_properties(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let ptr = ptr_arg(bf_args, &bf_args.args[0])?;
    check_obj_readable(bf_args, ptr)?;
    let o = bf_args
        .world
        .get_ptr(ptr)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_list(
        &o.propdefs
            .iter()
            .map(|p| v_string(p.to_string()))
            .collect::<Vec<_>>(),
    )))
}

fn bf_property_info(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let ptr = ptr_arg(bf_args, &bf_args.args[0])?;
    let name = name_arg(&bf_args.args[1])?;
    let (owner, flags) = bf_args
        .world
        .property_info(ptr, name)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    if !flags.contains(barn_db::model::PropFlag::Read)
        && !world::controls(bf_args.world, bf_args.task_perms(), owner)
        && !bf_args.wizard_perms()
    {
        return Err(BfErr::Code(barn_var::ErrorCode::E_PERM));
    }
    Ok(Ret(v_list(&[
        v_obj(owner),
        v_string(prop_flags_to_string(flags)),
    ])))
}

fn parse_prop_info(
    bf_args: &BfCallState<'_, '_>,
    info: &Var,
) -> Result<(Obj, PropFlags, Option<Symbol>), BfErr> {
    let Variant::List(info) = info.variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if info.len() < 2 || info.len() > 3 {
        return Err(BfErr::Code(E_INVARG));
    }
    let owner = world::obj_or_invarg(bf_args.world, &info.index(1).unwrap())
        .map_err(BfErr::ErrValue)?;
    let Variant::Str(perms) = info.index(2).unwrap().variant().clone() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Some(flags) = prop_flags_from_str(&perms.to_text()) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let new_name = match info.len() {
        3 => Some(name_arg(&info.index(3).unwrap())?),
        _ => None,
    };
    Ok((owner, flags, new_name))
}

fn bf_set_property_info(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let ptr = ptr_arg(bf_args, &bf_args.args[0])?;
    let name = name_arg(&bf_args.args[1])?;
    let (cur_owner, _) = bf_args
        .world
        .property_info(ptr, name)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    bf_args.check_controls(cur_owner)?;
    let (owner, flags, new_name) = parse_prop_info(bf_args, &bf_args.args[2].clone())?;
    bf_args
        .world
        .set_property_info(ptr, name, owner, flags, new_name)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_int(0)))
}

fn bf_add_property(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Obj(obj) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let obj = *obj;
    if !bf_args.world.valid(obj) {
        return Err(BfErr::Code(E_INVARG));
    }
    let name = name_arg(&bf_args.args[1])?;
    let value = bf_args.args[2].clone();
    let (owner, flags, new_name) = parse_prop_info(bf_args, &bf_args.args[3].clone())?;
    if new_name.is_some() {
        return Err(BfErr::Code(E_INVARG));
    }
    let obj_owner = bf_args
        .world
        .get(obj)
        .map_err(|e| BfErr::Code(e.to_error_code()))?
        .owner;
    bf_args.check_controls(obj_owner)?;
    bf_args
        .world
        .add_property(obj, name, value, owner, flags)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_int(0)))
}

fn bf_delete_property(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Obj(obj) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let obj = *obj;
    if !bf_args.world.valid(obj) {
        return Err(BfErr::Code(E_INVARG));
    }
    let name = name_arg(&bf_args.args[1])?;
    let obj_owner = bf_args
        .world
        .get(obj)
        .map_err(|e| BfErr::Code(e.to_error_code()))?
        .owner;
    bf_args.check_controls(obj_owner)?;
    bf_args
        .world
        .delete_property(obj, name)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_int(0)))
}

fn bf_clear_property(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let ptr = ptr_arg(bf_args, &bf_args.args[0])?;
    let name = name_arg(&bf_args.args[1])?;
    let (owner, _) = bf_args
        .world
        .property_info(ptr, name)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    bf_args.check_controls(owner)?;
    bf_args
        .world
        .clear_property(ptr, name)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_int(0)))
}

fn bf_is_clear_property(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let ptr = ptr_arg(bf_args, &bf_args.args[0])?;
    let name = name_arg(&bf_args.args[1])?;
    let clear = bf_args
        .world
        .is_clear_property(ptr, name)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_bool_int(clear)))
}

pub(crate) fn register_bf_properties(builtins: &mut [BuiltinFunction]) {
    register(builtins, "properties", bf_properties);
    register(builtins, "property_info", bf_property_info);
    register(builtins, "set_property_info", bf_set_property_info);
    register(builtins, "add_property", bf_add_property);
    register(builtins, "delete_property", bf_delete_property);
    register(builtins, "clear_property", bf_clear_property);
    register(builtins, "is_clear_property", bf_is_clear_property);
}
