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

//! Verb definition, introspection, and programming builtins.

use crate::builtins::BfRet::Ret;
use crate::builtins::{register, BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::world;
use barn_compiler::{compile, disassemble_program};
use barn_db::model::{
    verb_flags_from_str, verb_flags_to_string, ArgSpec, PrepSpec, VerbArgsSpec, VerbFlags,
};
use barn_db::store::Verb;
use barn_db::{ObjPtr, VerbDesc};
use barn_var::ErrorCode::{E_INVARG, E_PERM, E_TYPE};
use barn_var::{v_int, v_list, v_obj, v_str, v_string, Obj, Var, Variant};

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

fn verb_desc(v: &Var) -> Result<VerbDesc, BfErr> {
    match v.variant() {
        Variant::Str(s) => Ok(VerbDesc::Name(s.to_text().into_owned())),
        Variant::Int(i) => Ok(VerbDesc::Index(*i)),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn find_verb(
    bf_args: &BfCallState<'_, '_>,
    obj: &Var,
    desc: &Var,
) -> Result<(ObjPtr, usize), BfErr> {
    let ptr = ptr_arg(bf_args, obj)?;
    let desc = verb_desc(desc)?;
    let index = bf_args
        .world
        .verb_index(ptr, &desc)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok((ptr, index))
}

fn bf_verbs(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let ptr = ptr_arg(bf_args, &bf_args.args[0])?;
    let o = bf_args
        .world
        .get_ptr(ptr)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_list(
        &o.verbs
            .iter()
            .map(|v| v_string(v.names.clone()))
            .collect::<Vec<_>>(),
    )))
}

fn bf_verb_info(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (ptr, index) = find_verb(bf_args, &bf_args.args[0], &bf_args.args[1])?;
    let verb = bf_args
        .world
        .verb(ptr, index)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    if !world::verb_readable(bf_args.world, bf_args.task_perms(), verb)
        && !bf_args.wizard_perms()
    {
        return Err(BfErr::Code(E_PERM));
    }
    Ok(Ret(v_list(&[
        v_obj(verb.owner),
        v_string(verb_flags_to_string(verb.flags)),
        v_string(verb.names.clone()),
    ])))
}

fn parse_verb_info(
    bf_args: &BfCallState<'_, '_>,
    info: &Var,
) -> Result<(Obj, VerbFlags, String), BfErr> {
    let Variant::List(info) = info.variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if info.len() != 3 {
        return Err(BfErr::Code(E_INVARG));
    }
    let owner =
        world::obj_or_invarg(bf_args.world, &info.index(1).unwrap()).map_err(BfErr::ErrValue)?;
    let Variant::Str(perms) = info.index(2).unwrap().variant().clone() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Some(flags) = verb_flags_from_str(&perms.to_text()) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let Variant::Str(names) = info.index(3).unwrap().variant().clone() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let names = names.to_text().into_owned();
    if names.trim().is_empty() {
        return Err(BfErr::Code(E_INVARG));
    }
    Ok((owner, flags, names))
}

fn parse_verb_args(info: &Var) -> Result<VerbArgsSpec, BfErr> {
    let Variant::List(info) = info.variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if info.len() != 3 {
        return Err(BfErr::Code(E_INVARG));
    }
    let spec_str = |v: Var| -> Result<String, BfErr> {
        match v.variant() {
            Variant::Str(s) => Ok(s.to_text().into_owned()),
            _ => Err(BfErr::Code(E_TYPE)),
        }
    };
    let dobj = ArgSpec::parse(&spec_str(info.index(1).unwrap())?)
        .ok_or(BfErr::Code(E_INVARG))?;
    let prep = PrepSpec::parse(&spec_str(info.index(2).unwrap())?)
        .ok_or(BfErr::Code(E_INVARG))?;
    let iobj = ArgSpec::parse(&spec_str(info.index(3).unwrap())?)
        .ok_or(BfErr::Code(E_INVARG))?;
    Ok(VerbArgsSpec { dobj, prep, iobj })
}

fn check_verb_writable(
    bf_args: &BfCallState<'_, '_>,
    ptr: ObjPtr,
    index: usize,
) -> Result<(), BfErr> {
    let verb = bf_args
        .world
        .verb(ptr, index)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    if world::verb_writable(bf_args.world, bf_args.task_perms(), verb) || bf_args.wizard_perms()
    {
        Ok(())
    } else {
        Err(BfErr::Code(E_PERM))
    }
}

fn bf_set_verb_info(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (ptr, index) = find_verb(bf_args, &bf_args.args[0], &bf_args.args[1])?;
    check_verb_writable(bf_args, ptr, index)?;
    let (owner, flags, names) = parse_verb_info(bf_args, &bf_args.args[2].clone())?;
    if owner != bf_args.task_perms() && !bf_args.wizard_perms() {
        return Err(BfErr::Code(E_PERM));
    }
    let verb = bf_args
        .world
        .verb_mut(ptr, index)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    verb.owner = owner;
    verb.flags = flags;
    verb.names = names;
    Ok(Ret(v_int(0)))
}

fn bf_verb_args(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (ptr, index) = find_verb(bf_args, &bf_args.args[0], &bf_args.args[1])?;
    let verb = bf_args
        .world
        .verb(ptr, index)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    if !world::verb_readable(bf_args.world, bf_args.task_perms(), verb)
        && !bf_args.wizard_perms()
    {
        return Err(BfErr::Code(E_PERM));
    }
    Ok(Ret(v_list(&[
        v_str(verb.args.dobj.to_string()),
        v_string(verb.args.prep.to_string()),
        v_str(verb.args.iobj.to_string()),
    ])))
}

fn bf_set_verb_args(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (ptr, index) = find_verb(bf_args, &bf_args.args[0], &bf_args.args[1])?;
    check_verb_writable(bf_args, ptr, index)?;
    let args = parse_verb_args(&bf_args.args[2])?;
    bf_args
        .world
        .verb_mut(ptr, index)
        .map_err(|e| BfErr::Code(e.to_error_code()))?
        .args = args;
    Ok(Ret(v_int(0)))
}

fn bf_verb_code(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (ptr, index) = find_verb(bf_args, &bf_args.args[0], &bf_args.args[1])?;
    let verb = bf_args
        .world
        .verb(ptr, index)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    if !world::verb_readable(bf_args.world, bf_args.task_perms(), verb)
        && !bf_args.wizard_perms()
    {
        return Err(BfErr::Code(E_PERM));
    }
    let lines: Vec<Var> = verb
        .source
        .lines()
        .map(|l| v_str(l))
        .collect();
    Ok(Ret(v_list(&lines)))
}

/// Program a verb. Success is the empty list; compile failures come back as
/// a list of error strings, LambdaMOO-style.
fn bf_set_verb_code(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (ptr, index) = find_verb(bf_args, &bf_args.args[0], &bf_args.args[1])?;
    check_verb_writable(bf_args, ptr, index)?;
    if !world::is_programmer(bf_args.world, bf_args.task_perms()) && !bf_args.wizard_perms() {
        return Err(BfErr::Code(E_PERM));
    }
    let Variant::List(lines) = bf_args.args[2].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let mut source_lines = Vec::with_capacity(lines.len());
    for line in lines.iter() {
        let Variant::Str(s) = line.variant() else {
            return Err(BfErr::Code(E_TYPE));
        };
        source_lines.push(s.to_text().into_owned());
    }
    let source = source_lines.join("\n");
    let program = match compile(&source) {
        Ok(p) => p,
        Err(e) => {
            return Ok(Ret(v_list(&[v_string(e.to_string())])));
        }
    };
    let verb = bf_args
        .world
        .verb_mut(ptr, index)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    verb.source = source;
    verb.program = Some(program);
    Ok(Ret(v_list(&[])))
}

fn bf_add_verb(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let ptr = ptr_arg(bf_args, &bf_args.args[0])?;
    let (owner, flags, names) = parse_verb_info(bf_args, &bf_args.args[1].clone())?;
    let args = parse_verb_args(&bf_args.args[2])?;
    let obj_owner = bf_args
        .world
        .get_ptr(ptr)
        .map_err(|e| BfErr::Code(e.to_error_code()))?
        .owner;
    bf_args.check_controls(obj_owner)?;
    if owner != bf_args.task_perms() && !bf_args.wizard_perms() {
        return Err(BfErr::Code(E_PERM));
    }
    let index = bf_args
        .world
        .add_verb(
            ptr,
            Verb {
                names,
                owner,
                flags,
                args,
                source: String::new(),
                program: None,
            },
        )
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_int(index as i64)))
}

fn bf_delete_verb(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (ptr, index) = find_verb(bf_args, &bf_args.args[0], &bf_args.args[1])?;
    check_verb_writable(bf_args, ptr, index)?;
    bf_args
        .world
        .delete_verb(ptr, index)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    Ok(Ret(v_int(0)))
}

fn bf_disassemble(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (ptr, index) = find_verb(bf_args, &bf_args.args[0], &bf_args.args[1])?;
    let verb = bf_args
        .world
        .verb(ptr, index)
        .map_err(|e| BfErr::Code(e.to_error_code()))?;
    if !world::verb_readable(bf_args.world, bf_args.task_perms(), verb)
        && !bf_args.wizard_perms()
    {
        return Err(BfErr::Code(E_PERM));
    }
    let Some(program) = &verb.program else {
        return Err(BfErr::Code(E_INVARG));
    };
    let lines: Vec<Var> = disassemble_program(program)
        .into_iter()
        .map(v_string)
        .collect();
    Ok(Ret(v_list(&lines)))
}

pub(crate) fn register_bf_verbs(builtins: &mut [BuiltinFunction]) {
    register(builtins, "verbs", bf_verbs);
    register(builtins, "verb_info", bf_verb_info);
    register(builtins, "set_verb_info", bf_set_verb_info);
    register(builtins, "verb_args", bf_verb_args);
    register(builtins, "set_verb_args", bf_set_verb_args);
    register(builtins, "verb_code", bf_verb_code);
    register(builtins, "set_verb_code", bf_set_verb_code);
    register(builtins, "add_verb", bf_add_verb);
    register(builtins, "delete_verb", bf_delete_verb);
    register(builtins, "disassemble", bf_disassemble);
}
