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

//! Numeric builtins. The float functions are type-strict, like the
//! operators: `sqrt(4)` is `E_TYPE`, `sqrt(4.0)` is 2.0.

use crate::builtins::BfRet::Ret;
use crate::builtins::{register, BfCallState, BfErr, BfRet, BuiltinFunction};
use barn_var::ErrorCode::{E_FLOAT, E_INVARG, E_TYPE};
use barn_var::{v_float, v_int, v_string, Var, Variant};
use rand::Rng;

fn float_arg(v: &Var) -> Result<f64, BfErr> {
    match v.variant() {
        Variant::Float(f) => Ok(*f),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn float_ret(f: f64) -> Result<BfRet, BfErr> {
    if f.is_finite() {
        Ok(Ret(v_float(f)))
    } else {
        Err(BfErr::Code(E_FLOAT))
    }
}

fn bf_random(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let top = match bf_args.args.first() {
        None => i32::MAX as i64,
        Some(v) => match v.variant() {
            Variant::Int(i) => *i,
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    if top < 1 {
        return Err(BfErr::Code(E_INVARG));
    }
    let n = rand::rng().random_range(1..=top);
    Ok(Ret(v_int(n)))
}

fn minmax(bf_args: &BfCallState<'_, '_>, want_max: bool) -> Result<BfRet, BfErr> {
    let first = &bf_args.args[0];
    let mut best = first.clone();
    for v in &bf_args.args[1..] {
        match (best.variant(), v.variant()) {
            (Variant::Int(b), Variant::Int(c)) => {
                if (want_max && c > b) || (!want_max && c < b) {
                    best = v.clone();
                }
            }
            (Variant::Float(b), Variant::Float(c)) => {
                if (want_max && c > b) || (!want_max && c < b) {
                    best = v.clone();
                }
            }
            _ => return Err(BfErr::Code(E_TYPE)),
        }
    }
    match best.variant() {
        Variant::Int(_) | Variant::Float(_) => Ok(Ret(best)),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn bf_min(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    minmax(bf_args, false)
}

fn bf_max(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    minmax(bf_args, true)
}

fn bf_abs(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    match bf_args.args[0].variant() {
        Variant::Int(i) => Ok(Ret(v_int(i.wrapping_abs()))),
        Variant::Float(f) => Ok(Ret(v_float(f.abs()))),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

macro_rules! bf_float_fn {
    ($name:ident, $method:ident) => {
        fn $name(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
            let f = float_arg(&bf_args.args[0])?;
            float_ret(f.$method())
        }
    };
}

bf_float_fn!(bf_sqrt, sqrt);
bf_float_fn!(bf_sin, sin);
bf_float_fn!(bf_cos, cos);
bf_float_fn!(bf_tan, tan);
bf_float_fn!(bf_asin, asin);
bf_float_fn!(bf_acos, acos);
bf_float_fn!(bf_exp, exp);
bf_float_fn!(bf_log, ln);
bf_float_fn!(bf_log10, log10);
bf_float_fn!(bf_ceil, ceil);
bf_float_fn!(bf_floor, floor);
bf_float_fn!(bf_trunc, trunc);

fn bf_atan(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let y = float_arg(&bf_args.args[0])?;
    match bf_args.args.get(1) {
        None => float_ret(y.atan()),
        Some(x) => {
            let x = float_arg(x)?;
            float_ret(y.atan2(x))
        }
    }
}

fn bf_floatstr(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let f = float_arg(&bf_args.args[0])?;
    let Variant::Int(precision) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if *precision < 0 {
        return Err(BfErr::Code(E_INVARG));
    }
    let precision = (*precision as usize).min(19);
    let scientific = bf_args
        .args
        .get(2)
        .map(|v| v.is_true())
        .unwrap_or(false);
    let s = if scientific {
        format!("{f:.precision$e}")
    } else {
        format!("{f:.precision$}")
    };
    Ok(Ret(v_string(s)))
}

pub(crate) fn register_bf_num(builtins: &mut [BuiltinFunction]) {
    register(builtins, "random", bf_random);
    register(builtins, "min", bf_min);
    register(builtins, "max", bf_max);
    register(builtins, "abs", bf_abs);
    register(builtins, "sqrt", bf_sqrt);
    register(builtins, "sin", bf_sin);
    register(builtins, "cos", bf_cos);
    register(builtins, "tan", bf_tan);
    register(builtins, "asin", bf_asin);
    register(builtins, "acos", bf_acos);
    register(builtins, "atan", bf_atan);
    register(builtins, "exp", bf_exp);
    register(builtins, "log", bf_log);
    register(builtins, "log10", bf_log10);
    register(builtins, "ceil", bf_ceil);
    register(builtins, "floor", bf_floor);
    register(builtins, "trunc", bf_trunc);
    register(builtins, "floatstr", bf_floatstr);
}
