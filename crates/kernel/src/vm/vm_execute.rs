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

//! The op loop. One op, one tick; the loop exits only at task boundaries
//! (completion, exception, suspension, fork handoff, quota exhaustion).

use crate::builtins::{check_arity, BfCallState, BfErr, BfRet};
use crate::tasks::task::VmContext;
use crate::vm::moo_frame::{CatchType, ScopeType};
use crate::vm::vm_call::{call_pass, call_verb, push_moo_error};
use crate::vm::vm_unwind::FinallyReason;
use crate::vm::{ExecutionResult, VMExecState};
use crate::world;
use barn_compiler::{Op, ScatterArgs, ScatterLabel, BUILTINS};
use barn_var::ErrorCode::{E_ARGS, E_INVARG, E_TYPE, E_VARNF};
use barn_var::{v_bool_int, v_empty_list, v_int, v_list, Var, Variant};
use std::time::Instant;

/// How often the wall-clock budget is consulted, in ticks.
const SECONDS_CHECK_INTERVAL: u64 = 1024;

pub fn execute(vm: &mut VMExecState, ctx: &mut VmContext<'_>) -> ExecutionResult {
    let slice_start = Instant::now();
    let result = run_loop(vm, ctx, slice_start);
    ctx.meta.seconds_used += slice_start.elapsed().as_secs_f64();
    result
}

fn run_loop(
    vm: &mut VMExecState,
    ctx: &mut VmContext<'_>,
    slice_start: Instant,
) -> ExecutionResult {
    loop {
        if ctx.meta.kill_requested {
            return ExecutionResult::Kill;
        }
        ctx.meta.ticks_used += 1;
        if ctx.meta.ticks_used > ctx.meta.tick_budget {
            return ExecutionResult::TicksExceeded;
        }
        if ctx.meta.ticks_used % SECONDS_CHECK_INTERVAL == 0
            && ctx.meta.seconds_used + slice_start.elapsed().as_secs_f64()
                > ctx.meta.seconds_budget
        {
            return ExecutionResult::SecondsExceeded;
        }

        let Some(op) = vm.top_mut().frame.next_op() else {
            // Fell off the vector; identical to an implicit `return 0`.
            match vm.unwind_stack(FinallyReason::Return(v_int(0))) {
                ExecutionResult::More => continue,
                other => return other,
            }
        };

        let result = execute_op(vm, ctx, op);
        match result {
            ExecutionResult::More => continue,
            other => return other,
        }
    }
}

fn execute_op(vm: &mut VMExecState, ctx: &mut VmContext<'_>, op: Op) -> ExecutionResult {
    match op {
        Op::Imm(label) => {
            let v = vm.top().frame.program.literals[label.0 as usize].clone();
            vm.top_mut().frame.push(v);
        }
        Op::ImmInt(i) => vm.top_mut().frame.push(v_int(i)),
        Op::ImmFloat(f) => vm.top_mut().frame.push(barn_var::v_float(f)),
        Op::ImmObjid(o) => vm.top_mut().frame.push(barn_var::v_obj(o)),
        Op::ImmErr(e) => vm.top_mut().frame.push(barn_var::v_err(e)),
        Op::ImmNone => vm.top_mut().frame.push(barn_var::v_none()),
        Op::ImmEmptyList => vm.top_mut().frame.push(v_empty_list()),

        Op::MakeSingletonList => {
            let v = vm.top_mut().frame.pop();
            vm.top_mut().frame.push(v_list(&[v]));
        }
        Op::ListAddTail => {
            let tail = vm.top_mut().frame.pop();
            let list = vm.top_mut().frame.pop();
            let Variant::List(l) = list.variant() else {
                return vm.push_error(E_TYPE.into());
            };
            vm.top_mut().frame.push(l.push(&tail));
        }
        Op::CheckListForSplice => {
            let v = vm.top_mut().frame.pop();
            if !matches!(v.variant(), Variant::List(_)) {
                return vm.push_error(E_TYPE.into());
            }
            vm.top_mut().frame.push(v);
        }
        Op::ListAppend => {
            let tail = vm.top_mut().frame.pop();
            let list = vm.top_mut().frame.pop();
            let (Variant::List(l), Variant::List(t)) = (list.variant(), tail.variant()) else {
                return vm.push_error(E_TYPE.into());
            };
            vm.top_mut().frame.push(l.append(t));
        }
        Op::MakeMap => vm.top_mut().frame.push(barn_var::v_empty_map()),
        Op::MapInsert => {
            let value = vm.top_mut().frame.pop();
            let key = vm.top_mut().frame.pop();
            let map = vm.top_mut().frame.pop();
            let Variant::Map(m) = map.variant() else {
                return vm.push_error(E_TYPE.into());
            };
            match m.set(&key, &value) {
                Ok(m) => vm.top_mut().frame.push(m),
                Err(e) => return push_moo_error(vm, e),
            }
        }

        Op::Pop => {
            vm.top_mut().frame.pop();
        }
        Op::Push(name) => {
            let Some(v) = vm.top().frame.get_env(&name).cloned() else {
                return vm.push_error(E_VARNF.into());
            };
            vm.top_mut().frame.push(v);
        }
        Op::Put(name) => {
            let v = vm.top().frame.peek_top().clone();
            vm.top_mut().frame.set_env(&name, v);
        }
        Op::PutTemp => {
            let v = vm.top().frame.peek_top().clone();
            vm.top_mut().frame.temp = v;
        }
        Op::PushTemp => {
            let v = vm.top().frame.temp.clone();
            vm.top_mut().frame.push(v);
        }

        Op::Ref => {
            let index = vm.top_mut().frame.pop();
            let base = vm.top_mut().frame.pop();
            match base.index(&index) {
                Ok(v) => vm.top_mut().frame.push(v),
                Err(e) => return push_moo_error(vm, e),
            }
        }
        Op::PushRef => {
            let frame = &vm.top().frame;
            let index = frame.peek_abs(frame.valstack.len() - 1).clone();
            let base = frame.peek_abs(frame.valstack.len() - 2).clone();
            match base.index(&index) {
                Ok(v) => vm.top_mut().frame.push(v),
                Err(e) => return push_moo_error(vm, e),
            }
        }
        Op::RangeRef => {
            let to = vm.top_mut().frame.pop();
            let from = vm.top_mut().frame.pop();
            let base = vm.top_mut().frame.pop();
            match base.range(&from, &to) {
                Ok(v) => vm.top_mut().frame.push(v),
                Err(e) => return push_moo_error(vm, e),
            }
        }
        Op::IndexSet => {
            let value = vm.top_mut().frame.pop();
            let index = vm.top_mut().frame.pop();
            let base = vm.top_mut().frame.pop();
            match base.index_set(&index, &value) {
                Ok(v) => vm.top_mut().frame.push(v),
                Err(e) => return push_moo_error(vm, e),
            }
        }
        Op::RangeSet => {
            let value = vm.top_mut().frame.pop();
            let to = vm.top_mut().frame.pop();
            let from = vm.top_mut().frame.pop();
            let base = vm.top_mut().frame.pop();
            match base.range_set(&from, &to, &value) {
                Ok(v) => vm.top_mut().frame.push(v),
                Err(e) => return push_moo_error(vm, e),
            }
        }
        Op::Length(offset) => {
            let v = vm.top().frame.peek_abs(offset.0 as usize).clone();
            match v.len() {
                Ok(l) => vm.top_mut().frame.push(v_int(l as i64)),
                Err(e) => return push_moo_error(vm, e),
            }
        }

        Op::GetProp => {
            let name = vm.top_mut().frame.pop();
            let obj = vm.top_mut().frame.pop();
            return get_prop_result(vm, ctx, obj, name);
        }
        Op::PushGetProp => {
            let frame = &vm.top().frame;
            let name = frame.peek_abs(frame.valstack.len() - 1).clone();
            let obj = frame.peek_abs(frame.valstack.len() - 2).clone();
            return get_prop_result(vm, ctx, obj, name);
        }
        Op::PutProp => {
            let value = vm.top_mut().frame.pop();
            let name = vm.top_mut().frame.pop();
            let obj = vm.top_mut().frame.pop();
            let Variant::Str(name) = name.variant() else {
                return vm.push_error(E_TYPE.into());
            };
            let perms = vm.top().permissions;
            match world::set_property(
                ctx.world,
                perms,
                &obj,
                &name.to_text(),
                value.clone(),
            ) {
                Ok(()) => vm.top_mut().frame.push(value),
                Err(e) => return push_moo_error(vm, e),
            }
        }

        Op::Eq => {
            let (l, r) = pop2(vm);
            vm.top_mut().frame.push(v_bool_int(l == r));
        }
        Op::Ne => {
            let (l, r) = pop2(vm);
            vm.top_mut().frame.push(v_bool_int(l != r));
        }
        Op::Lt => return compare(vm, |o| o == std::cmp::Ordering::Less),
        Op::Le => return compare(vm, |o| o != std::cmp::Ordering::Greater),
        Op::Gt => return compare(vm, |o| o == std::cmp::Ordering::Greater),
        Op::Ge => return compare(vm, |o| o != std::cmp::Ordering::Less),
        Op::In => {
            let (value, container) = pop2(vm);
            match value.index_in(&container) {
                Ok(v) => vm.top_mut().frame.push(v),
                Err(e) => return push_moo_error(vm, e),
            }
        }

        Op::Add => return binary(vm, |l, r| l.add(r)),
        Op::Sub => return binary(vm, |l, r| l.sub(r)),
        Op::Mul => return binary(vm, |l, r| l.mul(r)),
        Op::Div => return binary(vm, |l, r| l.div(r)),
        Op::Mod => return binary(vm, |l, r| l.modulus(r)),
        Op::Exp => return binary(vm, |l, r| l.pow(r)),
        Op::BitAnd => return binary(vm, |l, r| l.bitand(r)),
        Op::BitOr => return binary(vm, |l, r| l.bitor(r)),
        Op::BitXor => return binary(vm, |l, r| l.bitxor(r)),
        Op::Shl => return binary(vm, |l, r| l.shl(r)),
        Op::Shr => return binary(vm, |l, r| l.shr(r)),
        Op::Complement => {
            let v = vm.top_mut().frame.pop();
            match v.complement() {
                Ok(v) => vm.top_mut().frame.push(v),
                Err(e) => return push_moo_error(vm, e),
            }
        }
        Op::Not => {
            let v = vm.top_mut().frame.pop();
            vm.top_mut().frame.push(v_bool_int(!v.is_true()));
        }
        Op::UnaryMinus => {
            let v = vm.top_mut().frame.pop();
            match v.neg() {
                Ok(v) => vm.top_mut().frame.push(v),
                Err(e) => return push_moo_error(vm, e),
            }
        }
        Op::And(label) => {
            if vm.top().frame.peek_top().is_true() {
                vm.top_mut().frame.pop();
            } else {
                vm.top_mut().frame.jump(&label);
            }
        }
        Op::Or(label) => {
            if vm.top().frame.peek_top().is_true() {
                vm.top_mut().frame.jump(&label);
            } else {
                vm.top_mut().frame.pop();
            }
        }

        Op::Jump { label } => vm.top_mut().frame.jump(&label),
        Op::If(label) | Op::Eif(label) | Op::IfQues(label) | Op::While(label) => {
            let cond = vm.top_mut().frame.pop();
            if !cond.is_true() {
                vm.top_mut().frame.jump(&label);
            }
        }
        Op::WhileId { id, end_label } => {
            let cond = vm.top_mut().frame.pop();
            vm.top_mut().frame.set_env(&id, cond.clone());
            if !cond.is_true() {
                vm.top_mut().frame.jump(&end_label);
            }
        }
        Op::ForList { id, aux, end_label } => {
            return for_list(vm, id, aux, end_label);
        }
        Op::ForRange { id, end_label } => {
            return for_range(vm, id, end_label);
        }
        Op::Exit { stack, label } => {
            return vm.unwind_stack(FinallyReason::Exit { stack, label });
        }

        Op::CallVerb => {
            let args = vm.top_mut().frame.pop();
            let verb = vm.top_mut().frame.pop();
            let obj = vm.top_mut().frame.pop();
            let Variant::List(args) = args.variant() else {
                return vm.push_error(E_TYPE.into());
            };
            return call_verb(vm, ctx, obj, verb, args.as_slice().to_vec());
        }
        Op::FuncCall { id } => {
            let args = vm.top_mut().frame.pop();
            let Variant::List(args) = args.variant() else {
                return vm.push_error(E_TYPE.into());
            };
            return call_builtin(vm, ctx, id, args.as_slice().to_vec());
        }
        Op::Pass => {
            let args = vm.top_mut().frame.pop();
            let Variant::List(args) = args.variant() else {
                return vm.push_error(E_TYPE.into());
            };
            return call_pass(vm, ctx, args.as_slice().to_vec());
        }
        Op::Return => {
            let v = vm.top_mut().frame.pop();
            return vm.unwind_stack(FinallyReason::Return(v));
        }
        Op::Return0 => {
            return vm.unwind_stack(FinallyReason::Return(v_int(0)));
        }
        Op::Done => {
            return vm.unwind_stack(FinallyReason::Return(v_int(0)));
        }

        Op::Fork { fv_offset, id } => {
            let delay = vm.top_mut().frame.pop();
            let delay = match delay.variant() {
                Variant::Int(i) if *i >= 0 => *i as f64,
                Variant::Float(f) if *f >= 0.0 => *f,
                Variant::Int(_) | Variant::Float(_) => {
                    return vm.push_error(E_INVARG.into());
                }
                _ => return vm.push_error(E_TYPE.into()),
            };
            return ExecutionResult::Fork {
                delay,
                id,
                fv_offset,
            };
        }
        Op::Scatter(sa) => return scatter_assign(vm, &sa),

        Op::PushCatchLabel(label) => {
            let codes = vm.top_mut().frame.pop();
            let entry = match codes.variant() {
                Variant::Int(0) => (CatchType::Any, label),
                Variant::List(l) => (
                    CatchType::Errors(l.as_slice().to_vec()),
                    label,
                ),
                _ => return vm.push_error(E_TYPE.into()),
            };
            vm.top_mut().frame.catch_stack.push(entry);
        }
        Op::TryCatch { handler_label: _ } => {
            let frame = &mut vm.top_mut().frame;
            let entry = frame
                .catch_stack
                .pop()
                .expect("catch expression without handler codes");
            frame.enter_scope(ScopeType::TryCatch(vec![entry]));
        }
        Op::TryExcept { num_excepts } => {
            let frame = &mut vm.top_mut().frame;
            let start = frame.catch_stack.len() - num_excepts;
            let catches: Vec<_> = frame.catch_stack.drain(start..).collect();
            frame.enter_scope(ScopeType::TryCatch(catches));
        }
        Op::EndCatch(label) | Op::EndExcept(label) => {
            let is_catch = matches!(op, Op::EndCatch(_));
            let v = if is_catch {
                Some(vm.top_mut().frame.pop())
            } else {
                None
            };
            vm.top_mut().frame.pop_scope();
            if let Some(v) = v {
                vm.top_mut().frame.push(v);
            }
            vm.top_mut().frame.jump(&label);
        }
        Op::TryFinally(label) => {
            vm.top_mut().frame.enter_scope(ScopeType::TryFinally(label));
        }
        Op::EndFinally => {
            let frame = &mut vm.top_mut().frame;
            frame.pop_scope();
            frame.finally_stack.push(FinallyReason::Fallthrough);
        }
        Op::FinallyContinue => {
            let reason = vm
                .top_mut()
                .frame
                .finally_stack
                .pop()
                .expect("finally continuation without a reason");
            match reason {
                FinallyReason::Fallthrough => {}
                other => return vm.unwind_stack(other),
            }
        }
    }
    ExecutionResult::More
}

fn pop2(vm: &mut VMExecState) -> (Var, Var) {
    let r = vm.top_mut().frame.pop();
    let l = vm.top_mut().frame.pop();
    (l, r)
}

fn binary(
    vm: &mut VMExecState,
    f: impl Fn(&Var, &Var) -> Result<Var, barn_var::Error>,
) -> ExecutionResult {
    let (l, r) = pop2(vm);
    match f(&l, &r) {
        Ok(v) => {
            vm.top_mut().frame.push(v);
            ExecutionResult::More
        }
        Err(e) => push_moo_error(vm, e),
    }
}

fn compare(
    vm: &mut VMExecState,
    f: impl Fn(std::cmp::Ordering) -> bool,
) -> ExecutionResult {
    let (l, r) = pop2(vm);
    match l.cmp_moo(&r) {
        Ok(ordering) => {
            vm.top_mut().frame.push(v_bool_int(f(ordering)));
            ExecutionResult::More
        }
        Err(e) => push_moo_error(vm, e),
    }
}

fn get_prop_result(
    vm: &mut VMExecState,
    ctx: &mut VmContext<'_>,
    obj: Var,
    name: Var,
) -> ExecutionResult {
    let Variant::Str(name) = name.variant() else {
        return vm.push_error(E_TYPE.into());
    };
    let perms = vm.top().permissions;
    match world::get_property(ctx.world, perms, &obj, &name.to_text()) {
        Ok(v) => {
            vm.top_mut().frame.push(v);
            ExecutionResult::More
        }
        Err(e) => push_moo_error(vm, e),
    }
}

/// One step of a `for x in (expr)` loop. The loop list and a 0-based counter
/// live on the value stack, counter on top.
fn for_list(
    vm: &mut VMExecState,
    id: barn_compiler::Name,
    aux: Option<barn_compiler::Name>,
    end_label: barn_compiler::Label,
) -> ExecutionResult {
    let frame = &mut vm.top_mut().frame;
    let count = {
        let Variant::Int(count) = frame.peek_top().variant() else {
            panic!("loop counter is not an integer");
        };
        *count as usize
    };
    let list = frame.peek_abs(frame.valstack.len() - 2).clone();
    match list.variant() {
        Variant::List(l) => {
            if count >= l.len() {
                frame.pop();
                frame.pop();
                frame.jump(&end_label);
                return ExecutionResult::More;
            }
            let item = l.as_slice()[count].clone();
            frame.set_env(&id, item);
            if let Some(aux) = aux {
                frame.set_env(&aux, v_int(count as i64 + 1));
            }
            frame.poke(0, v_int(count as i64 + 1));
        }
        Variant::Map(m) => {
            if count >= m.len() {
                frame.pop();
                frame.pop();
                frame.jump(&end_label);
                return ExecutionResult::More;
            }
            let (key, value) = m.iter().nth(count).unwrap().clone();
            match aux {
                // `for k, v in (map)` binds key then value; the single
                // variable form walks the values.
                Some(aux) => {
                    frame.set_env(&id, key);
                    frame.set_env(&aux, value);
                }
                None => frame.set_env(&id, value),
            }
            frame.poke(0, v_int(count as i64 + 1));
        }
        _ => {
            frame.pop();
            frame.pop();
            return vm.push_error(E_TYPE.into());
        }
    }
    ExecutionResult::More
}

/// One step of a `for x in [from..to]` loop; `from`/`to` live on the stack,
/// `to` on top.
fn for_range(
    vm: &mut VMExecState,
    id: barn_compiler::Name,
    end_label: barn_compiler::Label,
) -> ExecutionResult {
    let frame = &mut vm.top_mut().frame;
    let to = frame.peek_top().clone();
    let from = frame.peek_abs(frame.valstack.len() - 2).clone();
    let (current, next) = match (from.variant(), to.variant()) {
        (Variant::Int(f), Variant::Int(t)) => {
            if *f > *t {
                frame.pop();
                frame.pop();
                frame.jump(&end_label);
                return ExecutionResult::More;
            }
            (v_int(*f), v_int(*f + 1))
        }
        (Variant::Obj(f), Variant::Obj(t)) => {
            if f.0 > t.0 {
                frame.pop();
                frame.pop();
                frame.jump(&end_label);
                return ExecutionResult::More;
            }
            (barn_var::v_obj(*f), barn_var::v_objid(f.0 + 1))
        }
        _ => {
            frame.pop();
            frame.pop();
            return vm.push_error(E_TYPE.into());
        }
    };
    frame.set_env(&id, current);
    let pos = frame.valstack.len() - 2;
    frame.valstack[pos] = next;
    ExecutionResult::More
}

fn scatter_assign(vm: &mut VMExecState, sa: &ScatterArgs) -> ExecutionResult {
    let value = vm.top_mut().frame.pop();
    let Variant::List(list) = value.variant() else {
        return vm.push_error(E_TYPE.into());
    };
    let have = list.len();
    let nreq = sa
        .labels
        .iter()
        .filter(|l| matches!(l, ScatterLabel::Required(_)))
        .count();
    let nopt = sa
        .labels
        .iter()
        .filter(|l| matches!(l, ScatterLabel::Optional(..)))
        .count();
    let has_rest = sa.labels.iter().any(|l| matches!(l, ScatterLabel::Rest(_)));
    if have < nreq || (!has_rest && have > nreq + nopt) {
        return vm.push_error(E_ARGS.into());
    }

    let opt_fill = nopt.min(have - nreq);
    let rest_count = have - nreq - opt_fill;
    let items = list.as_slice();
    let mut offset = 0;
    let mut opts_filled = 0;
    let mut first_unfilled_default = None;
    let frame = &mut vm.top_mut().frame;
    for label in &sa.labels {
        match label {
            ScatterLabel::Required(id) => {
                frame.set_env(id, items[offset].clone());
                offset += 1;
            }
            ScatterLabel::Optional(id, default_label) => {
                if opts_filled < opt_fill {
                    frame.set_env(id, items[offset].clone());
                    offset += 1;
                    opts_filled += 1;
                } else if let Some(l) = default_label {
                    if first_unfilled_default.is_none() {
                        first_unfilled_default = Some(*l);
                    }
                }
            }
            ScatterLabel::Rest(id) => {
                let rest = items[offset..offset + rest_count].to_vec();
                frame.set_env(id, v_list(&rest));
                offset += rest_count;
            }
        }
    }
    // The scattered list is the value of the assignment expression.
    frame.push(value.clone());
    match first_unfilled_default {
        Some(l) => frame.jump(&l),
        None => frame.jump(&sa.done),
    }
    ExecutionResult::More
}

fn call_builtin(
    vm: &mut VMExecState,
    ctx: &mut VmContext<'_>,
    id: barn_compiler::BuiltinId,
    args: Vec<Var>,
) -> ExecutionResult {
    if let Err(e) = check_arity(&id, args.len()) {
        return bf_err_result(vm, e);
    }
    let name = BUILTINS.name_of(id).expect("builtin id out of range");
    let f = ctx.builtins.builtin_for(&id);
    let result = {
        let mut bf_args = BfCallState {
            name,
            args,
            exec: vm,
            world: &mut *ctx.world,
            tasks: &mut *ctx.tasks,
            conns: &mut *ctx.conns,
            config: &mut *ctx.config,
            server: &mut *ctx.server,
            meta: &mut *ctx.meta,
            builtins: ctx.builtins,
        };
        f(&mut bf_args)
    };
    match result {
        Ok(BfRet::Ret(v)) => {
            vm.top_mut().frame.push(v);
            ExecutionResult::More
        }
        Ok(BfRet::VmInstr(instr)) => instr,
        Err(e) => bf_err_result(vm, e),
    }
}

fn bf_err_result(vm: &mut VMExecState, e: BfErr) -> ExecutionResult {
    match e {
        BfErr::Code(code) => vm.push_error(code.into()),
        BfErr::ErrValue(e) => push_moo_error(vm, e),
        BfErr::Raise(e) => {
            let value = e.value.as_deref().cloned();
            vm.throw_error(e, value)
        }
    }
}
