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

//! Builtins for value inspection and conversion.

use crate::builtins::bf_strings::{digest_hex, hmac_hex};
use crate::builtins::BfRet::Ret;
use crate::builtins::{register, BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::tasks::task::{run_nested, VmContext};
use crate::vm::activation::Activation;
use crate::world;
use barn_compiler::{compile, to_literal};
use barn_var::ErrorCode::{E_INVARG, E_TYPE};
use barn_var::{
    v_bool_int, v_float, v_int, v_list, v_obj, v_objid, v_str, v_string, Error, Obj, Var,
    Variant,
};

fn bf_typeof(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let arg = &bf_args.args[0];
    Ok(Ret(v_int(arg.type_code() as i64)))
}

pub(crate) fn tostr_value(arg: &Var) -> String {
    match arg.variant() {
        Variant::None => "0".to_string(),
        Variant::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Variant::Int(i) => i.to_string(),
        Variant::Float(f) => format!("{f:?}"),
        Variant::Str(s) => s.to_text().into_owned(),
        Variant::Obj(o) => o.to_string(),
        Variant::Err(e) => e.message(),
        Variant::List(_) => "{list}".to_string(),
        Variant::Map(_) => "[map]".to_string(),
        Variant::Anon(_) => "*anonymous*".to_string(),
        Variant::Waif(_) => "*waif*".to_string(),
    }
}

fn bf_tostr(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let mut result = String::new();
    for arg in &bf_args.args {
        result.push_str(&tostr_value(arg));
    }
    Ok(Ret(v_string(result)))
}

fn bf_toliteral(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_string(to_literal(&bf_args.args[0]))))
}

fn bf_toint(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    match bf_args.args[0].variant() {
        Variant::Int(i) => Ok(Ret(v_int(*i))),
        Variant::Bool(b) => Ok(Ret(v_bool_int(*b))),
        Variant::Float(f) => Ok(Ret(v_int(*f as i64))),
        Variant::Obj(o) => Ok(Ret(v_int(o.id()))),
        Variant::Err(e) => Ok(Ret(v_int(e.err_type.to_int() as i64))),
        Variant::Str(s) => {
            // An unparseable string is 0, never an error.
            let text = s.to_text();
            let text = text.trim();
            match text.parse::<f64>() {
                Ok(f) => Ok(Ret(v_int(f as i64))),
                Err(_) => Ok(Ret(v_int(0))),
            }
        }
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn bf_toobj(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    match bf_args.args[0].variant() {
        Variant::Int(i) => Ok(Ret(v_objid(*i))),
        Variant::Float(f) => Ok(Ret(v_objid(*f as i64))),
        Variant::Obj(o) => Ok(Ret(v_obj(*o))),
        Variant::Str(s) => {
            let text = s.to_text();
            let text = text.trim();
            let id = Obj::parse(text)
                .map(|o| o.0)
                .or_else(|| text.parse::<i64>().ok())
                .unwrap_or(0);
            Ok(Ret(v_objid(id)))
        }
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn bf_tofloat(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    match bf_args.args[0].variant() {
        Variant::Int(i) => Ok(Ret(v_float(*i as f64))),
        Variant::Float(f) => Ok(Ret(v_float(*f))),
        Variant::Err(e) => Ok(Ret(v_float(e.err_type.to_int() as f64))),
        Variant::Str(s) => {
            let text = s.to_text();
            match text.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Ret(v_float(f))),
                _ => Err(BfErr::Code(E_INVARG)),
            }
        }
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn bf_length(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    match bf_args.args[0].len() {
        Ok(l) => Ok(Ret(v_int(l as i64))),
        Err(e) => Err(BfErr::ErrValue(e)),
    }
}

fn bf_equal(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (a, b) = (&bf_args.args[0], &bf_args.args[1]);
    Ok(Ret(v_bool_int(a.eq_case_sensitive(b))))
}

/// A rough accounting of the memory a value occupies.
fn value_bytes(v: &Var) -> usize {
    let base = std::mem::size_of::<Var>();
    match v.variant() {
        Variant::Str(s) => base + s.len(),
        Variant::List(l) => base + l.iter().map(value_bytes).sum::<usize>(),
        Variant::Map(m) => {
            base + m
                .iter()
                .map(|(k, v)| value_bytes(k) + value_bytes(v))
                .sum::<usize>()
        }
        _ => base,
    }
}

fn bf_value_bytes(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_int(value_bytes(&bf_args.args[0]) as i64)))
}

fn bf_value_hash(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let literal = to_literal(&bf_args.args[0]);
    let algo = bf_args.args.get(1).cloned();
    let binary = bf_args
        .args
        .get(2)
        .map(|v| v.is_true())
        .unwrap_or(false);
    digest_hex(literal.as_bytes(), algo.as_ref(), binary).map(Ret)
}

fn bf_value_hmac(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let literal = to_literal(&bf_args.args[0]);
    let Variant::Str(key) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let algo = bf_args.args.get(2).cloned();
    let binary = bf_args
        .args
        .get(3)
        .map(|v| v.is_true())
        .unwrap_or(false);
    hmac_hex(literal.as_bytes(), key.as_bytes(), algo.as_ref(), binary).map(Ret)
}

fn bf_raise(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Err(e) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let msg = match bf_args.args.get(1) {
        None => None,
        Some(m) => match m.variant() {
            Variant::Str(s) => Some(s.to_text().into_owned()),
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    let value = bf_args.args.get(2).cloned();
    Err(BfErr::Raise(Error::new(e.err_type, msg, value)))
}

fn bf_eval(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Str(code) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let perms = bf_args.task_perms();
    if !world::is_programmer(bf_args.world, perms) && !bf_args.wizard_perms() {
        return Err(BfErr::Code(barn_var::ErrorCode::E_PERM));
    }
    let source = code.to_text().into_owned();
    let program = match compile(&source) {
        Ok(p) => p,
        Err(e) => {
            return Ok(Ret(v_list(&[
                v_int(0),
                v_list(&[v_string(e.to_string())]),
            ])))
        }
    };
    let player = bf_args.exec.top().player;
    let activation = Activation::for_eval(program, player, perms);
    let mut ctx = VmContext {
        world: &mut *bf_args.world,
        tasks: &mut *bf_args.tasks,
        conns: &mut *bf_args.conns,
        config: &mut *bf_args.config,
        server: &mut *bf_args.server,
        builtins: bf_args.builtins,
        meta: &mut *bf_args.meta,
    };
    match run_nested(activation, &mut ctx) {
        Ok(v) => Ok(Ret(v_list(&[v_int(1), v]))),
        Err(e) => Err(BfErr::Raise(Error::new(
            e.code.err_type,
            Some(e.msg.clone()),
            Some(e.value.clone()),
        ))),
    }
}

pub(crate) fn register_bf_values(builtins: &mut [BuiltinFunction]) {
    register(builtins, "typeof", bf_typeof);
    register(builtins, "tostr", bf_tostr);
    register(builtins, "toliteral", bf_toliteral);
    register(builtins, "toint", bf_toint);
    register(builtins, "tonum", bf_toint);
    register(builtins, "toobj", bf_toobj);
    register(builtins, "tofloat", bf_tofloat);
    register(builtins, "length", bf_length);
    register(builtins, "equal", bf_equal);
    register(builtins, "value_bytes", bf_value_bytes);
    register(builtins, "value_hash", bf_value_hash);
    register(builtins, "value_hmac", bf_value_hmac);
    register(builtins, "raise", bf_raise);
    register(builtins, "eval", bf_eval);
}
