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

//! Server, connection, and time builtins.

use crate::builtins::BfRet::Ret;
use crate::builtins::{call_verb_nested, register, BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::vm::ExecutionResult;
use chrono::{Local, TimeZone};
use barn_var::ErrorCode::{E_INVARG, E_PERM, E_TYPE};
use barn_var::{v_int, v_list, v_obj, v_string, Obj, Var, Variant, SYSTEM_OBJECT};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info};

fn bf_server_version(_bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_string(format!(
        "barn {}",
        env!("CARGO_PKG_VERSION")
    ))))
}

fn bf_server_log(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.check_wizard()?;
    let Variant::Str(msg) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let is_error = bf_args.args.get(1).map(|v| v.is_true()).unwrap_or(false);
    let text = msg.to_text();
    if is_error {
        error!("> {}", text);
    } else {
        info!("> {}", text);
    }
    Ok(Ret(v_int(0)))
}

fn bf_shutdown(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.check_wizard()?;
    let msg = match bf_args.args.first() {
        None => None,
        Some(v) => match v.variant() {
            Variant::Str(s) => Some(s.to_text().into_owned()),
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    bf_args.server.shutdown_requested = Some(msg.clone().unwrap_or_default());
    Ok(BfRet::VmInstr(ExecutionResult::Shutdown(msg)))
}

/// Schedules a checkpoint for the next task boundary and returns at once.
fn bf_dump_database(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.check_wizard()?;
    bf_args.server.checkpoint_requested = true;
    Ok(Ret(v_int(0)))
}

fn bf_load_server_options(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.check_wizard()?;
    bf_args.config.reload(bf_args.world);
    Ok(Ret(v_int(0)))
}

fn bf_memory_usage(_bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    // The reference returns allocator block statistics; a host allocator
    // gives us nothing comparable, so the list is empty.
    Ok(Ret(v_list(&[])))
}

fn bf_db_disk_size(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let size = std::fs::metadata(&bf_args.server.db_path)
        .map(|m| m.len() as i64)
        .unwrap_or(0);
    Ok(Ret(v_int(size)))
}

// ---- connections ----

fn player_arg(v: &Var) -> Result<Obj, BfErr> {
    match v.variant() {
        Variant::Obj(o) => Ok(*o),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn bf_connected_players(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let players: Vec<Var> = bf_args
        .conns
        .connected_players()
        .into_iter()
        .map(v_obj)
        .collect();
    Ok(Ret(v_list(&players)))
}

fn connection_time(
    bf_args: &BfCallState<'_, '_>,
    player: Obj,
    idle: bool,
) -> Result<i64, BfErr> {
    let conn = bf_args
        .conns
        .for_player(player)
        .ok_or(BfErr::Code(E_INVARG))?;
    let reference = if idle {
        conn.last_activity
    } else {
        conn.connected_at
    };
    Ok(SystemTime::now()
        .duration_since(reference)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0))
}

fn bf_connected_seconds(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let player = player_arg(&bf_args.args[0])?;
    Ok(Ret(v_int(connection_time(bf_args, player, false)?)))
}

fn bf_idle_seconds(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let player = player_arg(&bf_args.args[0])?;
    Ok(Ret(v_int(connection_time(bf_args, player, true)?)))
}

fn bf_connection_name(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let who = player_arg(&bf_args.args[0])?;
    let conn_id = bf_args
        .conns
        .resolve(who)
        .ok_or(BfErr::Code(E_INVARG))?;
    let conn = bf_args.conns.get(conn_id).ok_or(BfErr::Code(E_INVARG))?;
    Ok(Ret(v_string(conn.peer_name.clone())))
}

/// `notify(player, line [, flush])`. Output is buffered; a truthy third
/// argument flushes the connection immediately.
fn bf_notify(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let who = player_arg(&bf_args.args[0])?;
    let Variant::Str(line) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if bf_args.task_perms() != who && !bf_args.wizard_perms() {
        return Err(BfErr::Code(E_PERM));
    }
    let Some(conn_id) = bf_args.conns.resolve(who) else {
        // Notifying a disconnected player quietly succeeds.
        return Ok(Ret(v_int(0)));
    };
    bf_args
        .conns
        .push_output(conn_id, line.as_bytes().to_vec());
    let flush_now = bf_args.args.get(2).map(|v| v.is_true()).unwrap_or(false);
    if flush_now {
        bf_args.conns.flush(conn_id);
    }
    Ok(Ret(v_int(0)))
}

/// `read([player])` — park this task until the connection's next line.
fn bf_read(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let who = match bf_args.args.first() {
        None => bf_args.exec.top().player,
        Some(v) => player_arg(v)?,
    };
    if bf_args.exec.top().player != who && !bf_args.wizard_perms() {
        return Err(BfErr::Code(E_PERM));
    }
    let Some(conn_id) = bf_args.conns.resolve(who) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let conn = bf_args.conns.get(conn_id).ok_or(BfErr::Code(E_INVARG))?;
    if conn.reading_task.is_some() {
        return Err(BfErr::Code(E_INVARG));
    }
    Ok(BfRet::VmInstr(ExecutionResult::ReadLine {
        connection: conn_id,
    }))
}

fn bf_boot_player(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let who = player_arg(&bf_args.args[0])?;
    if bf_args.task_perms() != who && !bf_args.wizard_perms() {
        return Err(BfErr::Code(E_PERM));
    }
    let Some(conn_id) = bf_args.conns.resolve(who) else {
        return Ok(Ret(v_int(0)));
    };
    if let Some(conn) = bf_args.conns.get_mut(conn_id) {
        conn.booted = true;
    }
    Ok(Ret(v_int(0)))
}

/// `switch_player(old, new)` — rebind a connection to another player,
/// wizard-only, firing the user_disconnected/user_connected pair.
fn bf_switch_player(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.check_wizard()?;
    let old = player_arg(&bf_args.args[0])?;
    let new = player_arg(&bf_args.args[1])?;
    if old == new {
        return Err(BfErr::Code(E_INVARG));
    }
    if !bf_args.world.valid(new) || !bf_args.world.is_player(new) {
        return Err(BfErr::Code(E_INVARG));
    }
    let Some(conn_id) = bf_args.conns.resolve(old) else {
        return Err(BfErr::Code(E_INVARG));
    };
    // A connection already carrying `new` would end up ambiguous.
    if bf_args.conns.for_player(new).is_some() {
        return Err(BfErr::Code(E_INVARG));
    }
    if let Some(conn) = bf_args.conns.get_mut(conn_id) {
        conn.player = Some(new);
    }
    let sys = v_obj(SYSTEM_OBJECT);
    let _ = call_verb_nested(bf_args, &sys, "user_disconnected", vec![v_obj(old)]);
    let _ = call_verb_nested(bf_args, &sys, "user_connected", vec![v_obj(new)]);
    Ok(Ret(v_int(0)))
}

// ---- time ----

fn bf_time(_bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Ok(Ret(v_int(now)))
}

/// `ctime([time])` — `"Mon Jan _2 15:04:05 2006"` shape: space-padded day,
/// local timezone, no zone suffix. Floats truncate.
fn bf_ctime(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let t = match bf_args.args.first() {
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
        Some(v) => match v.variant() {
            Variant::Int(i) => *i,
            Variant::Float(f) => *f as i64,
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    let Some(dt) = Local.timestamp_opt(t, 0).single() else {
        return Err(BfErr::Code(E_INVARG));
    };
    Ok(Ret(v_string(
        dt.format("%a %b %e %H:%M:%S %Y").to_string(),
    )))
}

pub(crate) fn register_bf_server(builtins: &mut [BuiltinFunction]) {
    register(builtins, "server_version", bf_server_version);
    register(builtins, "server_log", bf_server_log);
    register(builtins, "shutdown", bf_shutdown);
    register(builtins, "dump_database", bf_dump_database);
    register(builtins, "load_server_options", bf_load_server_options);
    register(builtins, "memory_usage", bf_memory_usage);
    register(builtins, "db_disk_size", bf_db_disk_size);
    register(builtins, "connected_players", bf_connected_players);
    register(builtins, "connected_seconds", bf_connected_seconds);
    register(builtins, "idle_seconds", bf_idle_seconds);
    register(builtins, "connection_name", bf_connection_name);
    register(builtins, "notify", bf_notify);
    register(builtins, "read", bf_read);
    register(builtins, "boot_player", bf_boot_player);
    register(builtins, "switch_player", bf_switch_player);
    register(builtins, "time", bf_time);
    register(builtins, "ctime", bf_ctime);
}
