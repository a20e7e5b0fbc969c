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

use crate::builtins::BfRet::Ret;
use crate::builtins::{register, BfCallState, BfErr, BfRet, BuiltinFunction};
use barn_var::ErrorCode::E_TYPE;
use barn_var::{v_bool_int, v_list, Map, Var, Variant};

fn map_arg(v: &Var) -> Result<&Map, BfErr> {
    match v.variant() {
        Variant::Map(m) => Ok(m),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

/// Keys come back in the canonical map order: INT < OBJ < ERR < FLOAT < STR.
fn bf_mapkeys(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let m = map_arg(&bf_args.args[0])?;
    Ok(Ret(v_list(&m.keys())))
}

fn bf_mapvalues(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let m = map_arg(&bf_args.args[0])?;
    Ok(Ret(v_list(&m.values())))
}

fn bf_maphaskey(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let m = map_arg(&bf_args.args[0])?;
    let has = m.contains_key(&bf_args.args[1]).map_err(BfErr::ErrValue)?;
    Ok(Ret(v_bool_int(has)))
}

/// A missing key is `E_RANGE`.
fn bf_mapdelete(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let m = map_arg(&bf_args.args[0])?;
    let (shrunk, _) = m.remove(&bf_args.args[1]).map_err(BfErr::ErrValue)?;
    Ok(Ret(shrunk))
}

pub(crate) fn register_bf_maps(builtins: &mut [BuiltinFunction]) {
    register(builtins, "mapkeys", bf_mapkeys);
    register(builtins, "mapvalues", bf_mapvalues);
    register(builtins, "maphaskey", bf_maphaskey);
    register(builtins, "mapdelete", bf_mapdelete);
}
