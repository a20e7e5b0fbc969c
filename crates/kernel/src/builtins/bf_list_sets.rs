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

//! List and set builtins.

use crate::builtins::BfRet::Ret;
use crate::builtins::{register, BfCallState, BfErr, BfRet, BuiltinFunction};
use barn_var::ErrorCode::E_TYPE;
use barn_var::{v_int, List, Var, Variant};

fn list_arg(v: &Var) -> Result<&List, BfErr> {
    match v.variant() {
        Variant::List(l) => Ok(l),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn int_arg(v: &Var) -> Result<i64, BfErr> {
    match v.variant() {
        Variant::Int(i) => Ok(*i),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

/// `listappend(list, value [, index])` — insert after `index`, default the
/// end.
fn bf_listappend(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(&bf_args.args[0])?;
    let value = &bf_args.args[1];
    let index = match bf_args.args.get(2) {
        None => list.len() as i64,
        Some(v) => int_arg(v)?,
    };
    Ok(Ret(list.insert(index + 1, value)))
}

/// `listinsert(list, value [, index])` — insert before `index`, default the
/// front.
fn bf_listinsert(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(&bf_args.args[0])?;
    let value = &bf_args.args[1];
    let index = match bf_args.args.get(2) {
        None => 1,
        Some(v) => int_arg(v)?,
    };
    Ok(Ret(list.insert(index, value)))
}

fn bf_listdelete(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(&bf_args.args[0])?;
    let index = int_arg(&bf_args.args[1])?;
    list.remove_at(index).map(Ret).map_err(BfErr::ErrValue)
}

fn bf_listset(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(&bf_args.args[0])?;
    let value = &bf_args.args[1];
    let index = int_arg(&bf_args.args[2])?;
    list.index_set(index, value)
        .map(Ret)
        .map_err(BfErr::ErrValue)
}

fn bf_setadd(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(&bf_args.args[0])?;
    let value = &bf_args.args[1];
    if list.contains(value, false) {
        return Ok(Ret(bf_args.args[0].clone()));
    }
    Ok(Ret(list.push(value)))
}

fn bf_setremove(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(&bf_args.args[0])?;
    let value = &bf_args.args[1];
    let index = list.index_in(value, false);
    if index == 0 {
        return Ok(Ret(bf_args.args[0].clone()));
    }
    list.remove_at(index).map(Ret).map_err(BfErr::ErrValue)
}

/// `is_member(value, list)` — 1-based position with `equal()` semantics
/// (case-sensitive), 0 when absent.
fn bf_is_member(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let value = &bf_args.args[0];
    let list = list_arg(&bf_args.args[1])?;
    Ok(Ret(v_int(list.index_in(value, true))))
}

pub(crate) fn register_bf_list_sets(builtins: &mut [BuiltinFunction]) {
    register(builtins, "listappend", bf_listappend);
    register(builtins, "listinsert", bf_listinsert);
    register(builtins, "listdelete", bf_listdelete);
    register(builtins, "listset", bf_listset);
    register(builtins, "setadd", bf_setadd);
    register(builtins, "setremove", bf_setremove);
    register(builtins, "is_member", bf_is_member);
}
