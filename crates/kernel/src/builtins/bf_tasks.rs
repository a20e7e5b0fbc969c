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

//! Task introspection and control builtins.

use crate::builtins::BfRet::Ret;
use crate::builtins::{register, BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::vm::ExecutionResult;
use barn_var::ErrorCode::{E_INVARG, E_PERM, E_TYPE};
use barn_var::{v_int, v_list, v_obj, v_str, Var, Variant};
use std::time::UNIX_EPOCH;

fn bf_task_id(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_int(bf_args.meta.id)))
}

fn bf_ticks_left(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_int(bf_args.meta.ticks_left())))
}

fn bf_seconds_left(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_int(bf_args.meta.seconds_left() as i64)))
}

fn bf_suspend(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let seconds = match bf_args.args.first() {
        None => None,
        Some(v) => match v.variant() {
            Variant::Int(i) if *i >= 0 => Some(*i as f64),
            Variant::Float(f) if *f >= 0.0 => Some(*f),
            Variant::Int(_) | Variant::Float(_) => return Err(BfErr::Code(E_INVARG)),
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    // The scheduler pushes the wake value when the task runs again.
    bf_args.meta.wake_value = v_int(0);
    Ok(BfRet::VmInstr(ExecutionResult::Suspend(seconds)))
}

fn bf_resume(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Int(id) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let id = *id;
    let value = bf_args.args.get(1).cloned().unwrap_or_else(|| v_int(0));
    let Some(task) = bf_args.tasks.tasks.get(&id) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let task_programmer = task.vm.top().permissions;
    if bf_args.task_perms() != task_programmer && !bf_args.wizard_perms() {
        return Err(BfErr::Code(E_PERM));
    }
    bf_args
        .tasks
        .resume(id, value)
        .map_err(BfErr::Code)?;
    Ok(Ret(v_int(0)))
}

fn bf_kill_task(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Int(id) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let id = *id;
    if id == bf_args.meta.id {
        // Killing yourself takes effect right now, skipping any finallys.
        return Ok(BfRet::VmInstr(ExecutionResult::Kill));
    }
    let Some(task) = bf_args.tasks.tasks.get(&id) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let task_programmer = task.vm.top().permissions;
    if bf_args.task_perms() != task_programmer && !bf_args.wizard_perms() {
        return Err(BfErr::Code(E_PERM));
    }
    bf_args.tasks.kill(id);
    Ok(Ret(v_int(0)))
}

/// `{task-id, start-time, x, ticks, programmer, verb-loc, verb-name, line,
/// this}` per queued (suspended or input-waiting) task.
fn bf_queued_tasks(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let perms = bf_args.task_perms();
    let wizard = bf_args.wizard_perms();
    let mut entries: Vec<(i64, Var)> = vec![];
    for (id, task) in &bf_args.tasks.tasks {
        let programmer = task.vm.top().permissions;
        if !wizard && programmer != perms {
            continue;
        }
        let start = task
            .meta
            .start_time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let top = task.vm.top();
        let line = top
            .frame
            .find_line_no()
            .map(|l| v_int(l as i64))
            .unwrap_or_else(|| v_int(0));
        let entry = v_list(&[
            v_int(*id),
            v_int(start),
            v_int(0),
            v_int(task.meta.tick_budget as i64),
            v_obj(programmer),
            top.verb_loc.clone(),
            v_str(&top.verb_name),
            line,
            top.this.clone(),
        ]);
        entries.push((*id, entry));
    }
    entries.sort_by_key(|(id, _)| *id);
    Ok(Ret(v_list(
        &entries.into_iter().map(|(_, e)| e).collect::<Vec<_>>(),
    )))
}

fn bf_task_stack(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Int(id) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let include_line = bf_args
        .args
        .get(1)
        .map(|v| v.is_true())
        .unwrap_or(false);
    let Some(task) = bf_args.tasks.tasks.get(id) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let programmer = task.vm.top().permissions;
    if bf_args.task_perms() != programmer && !bf_args.wizard_perms() {
        return Err(BfErr::Code(E_PERM));
    }
    Ok(Ret(v_list(&task.vm.stack_list(false, include_line))))
}

fn bf_callers(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let include_line = bf_args
        .args
        .first()
        .map(|v| v.is_true())
        .unwrap_or(false);
    Ok(Ret(v_list(&bf_args.exec.stack_list(true, include_line))))
}

fn bf_caller_perms(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_obj(bf_args.caller_perms())))
}

fn bf_set_task_perms(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Obj(who) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let who = *who;
    // Strictly the frame programmer here: a wizard *player* lending its
    // session does not let arbitrary code re-escalate.
    if who != bf_args.task_perms()
        && !crate::world::is_wizard(bf_args.world, bf_args.task_perms())
    {
        return Err(BfErr::Code(E_PERM));
    }
    bf_args.exec.top_mut().permissions = who;
    Ok(Ret(v_int(0)))
}

fn bf_task_local(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(bf_args.meta.task_local.clone()))
}

fn bf_set_task_local(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.meta.task_local = bf_args.args[0].clone();
    Ok(Ret(v_int(0)))
}

pub(crate) fn register_bf_tasks(builtins: &mut [BuiltinFunction]) {
    register(builtins, "task_id", bf_task_id);
    register(builtins, "ticks_left", bf_ticks_left);
    register(builtins, "seconds_left", bf_seconds_left);
    register(builtins, "suspend", bf_suspend);
    register(builtins, "resume", bf_resume);
    register(builtins, "kill_task", bf_kill_task);
    register(builtins, "queued_tasks", bf_queued_tasks);
    register(builtins, "task_stack", bf_task_stack);
    register(builtins, "callers", bf_callers);
    register(builtins, "caller_perms", bf_caller_perms);
    register(builtins, "set_task_perms", bf_set_task_perms);
    register(builtins, "task_local", bf_task_local);
    register(builtins, "set_task_local", bf_set_task_local);
}
