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

use crate::tasks::task::VmContext;
use crate::vm::activation::Activation;
use crate::vm::{ExecutionResult, VMExecState};
use crate::world::{self, ResolvedVerb};
use barn_var::ErrorCode::{E_MAXREC, E_VERBNF};
use barn_var::{Error, Var, Variant};

/// Push a frame for a resolved verb and start executing it. The new frame
/// inherits `player`; `programmer` becomes the verb owner.
pub fn call_resolved(
    vm: &mut VMExecState,
    ctx: &VmContext<'_>,
    resolved: ResolvedVerb,
    verb_name: &str,
    args: Vec<Var>,
) -> ExecutionResult {
    if vm.depth() >= ctx.config.max_stack_depth {
        return vm.push_error(E_MAXREC.into());
    }
    let verb = match ctx.world.verb(resolved.definer, resolved.index) {
        Ok(v) => v,
        Err(e) => return vm.push_error(e.to_error_code().into()),
    };
    let Some(program) = verb.program.clone() else {
        // A verb with no program reads as not found.
        return vm.push_error(E_VERBNF.into());
    };
    let caller = vm.caller_value();
    let player = vm.top().player;
    let activation = Activation::for_call(
        program,
        resolved.this,
        player,
        caller,
        verb_name,
        resolved.verb_loc,
        resolved.owner,
        resolved.flags,
        args,
        None,
    );
    vm.stack.push(activation);
    ExecutionResult::More
}

/// The CallVerb op: `obj:verb(@args)`.
pub fn call_verb(
    vm: &mut VMExecState,
    ctx: &mut VmContext<'_>,
    receiver: Var,
    verb_name: Var,
    args: Vec<Var>,
) -> ExecutionResult {
    let Variant::Str(name) = verb_name.variant() else {
        return vm.push_error(barn_var::ErrorCode::E_TYPE.into());
    };
    let name = name.to_text().into_owned();
    match world::resolve_verb(ctx.world, &receiver, &name) {
        Ok(resolved) => call_resolved(vm, ctx, resolved, &name, args),
        Err(e) => push_moo_error(vm, e),
    }
}

/// The Pass op: re-resolve from the parents of the current frame's verb
/// location, keeping `this`.
pub fn call_pass(
    vm: &mut VMExecState,
    ctx: &mut VmContext<'_>,
    args: Vec<Var>,
) -> ExecutionResult {
    let (verb_loc, this, name) = {
        let top = vm.top();
        (top.verb_loc.clone(), top.this.clone(), top.verb_name.clone())
    };
    match world::resolve_pass(ctx.world, &verb_loc, &this, &name) {
        Ok(resolved) => call_resolved(vm, ctx, resolved, &name, args),
        Err(e) => push_moo_error(vm, e),
    }
}

/// Route a MOO-level error value through the d-flag rule, preserving any
/// message payload.
pub fn push_moo_error(vm: &mut VMExecState, e: Error) -> ExecutionResult {
    if vm.top().debug_on() {
        return vm.throw_error(e, None);
    }
    vm.top_mut().frame.push(barn_var::v_err(e.err_type));
    ExecutionResult::More
}
