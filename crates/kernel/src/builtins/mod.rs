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

//! The builtin function library. One slot per descriptor in the compiler's
//! BUILTINS table; registration is grouped by domain module. Every builtin
//! validates arguments and permissions before any side effect.

mod bf_list_sets;
mod bf_maps;
mod bf_num;
mod bf_objects;
mod bf_properties;
mod bf_server;
mod bf_strings;
mod bf_tasks;
mod bf_values;
mod bf_verbs;

pub use bf_strings::{binary_to_bytes, bytes_to_binary};

use crate::config::ServerOptions;
use crate::tasks::sessions::Connections;
use crate::tasks::task::{ServerControl, TaskMeta, TaskQ};
use crate::vm::{ExecutionResult, VMExecState};
use crate::world;
use barn_compiler::{BuiltinId, BUILTINS};
use barn_db::ObjectStore;
use barn_var::ErrorCode::{E_ARGS, E_PERM};
use barn_var::{Error, ErrorCode, Obj, Symbol, Var};

/// Everything a builtin can see: the running task's VM state and metadata,
/// the world, the other tasks, the connections, and the server controls.
/// All of it lives on the scheduler thread; no locks anywhere.
pub struct BfCallState<'a, 'b> {
    pub name: Symbol,
    pub args: Vec<Var>,
    pub exec: &'a mut VMExecState,
    pub world: &'a mut ObjectStore,
    pub tasks: &'a mut TaskQ,
    pub conns: &'a mut Connections,
    pub config: &'a mut ServerOptions,
    pub server: &'a mut ServerControl,
    pub meta: &'a mut TaskMeta,
    pub builtins: &'b BuiltinRegistry,
}

impl BfCallState<'_, '_> {
    /// The programmer of the current frame.
    pub fn task_perms(&self) -> Obj {
        self.exec.task_perms()
    }

    pub fn caller_perms(&self) -> Obj {
        self.exec.caller_perms()
    }

    /// Is the acting user privileged? True when the frame programmer is a
    /// wizard, or when the builtin's semantics concern the session's player
    /// and that player is a wizard.
    pub fn wizard_perms(&self) -> bool {
        if world::is_wizard(self.world, self.task_perms()) {
            return true;
        }
        let player = self.exec.top().player;
        world::is_wizard(self.world, player)
    }

    pub fn check_wizard(&self) -> Result<(), BfErr> {
        if self.wizard_perms() {
            Ok(())
        } else {
            Err(BfErr::Code(E_PERM))
        }
    }

    /// Many builtins allow the owner of the affected thing or a wizard.
    pub fn check_controls(&self, owner: Obj) -> Result<(), BfErr> {
        if world::controls(self.world, self.task_perms(), owner) || self.wizard_perms() {
            Ok(())
        } else {
            Err(BfErr::Code(E_PERM))
        }
    }
}

pub type BuiltinFunction = fn(&mut BfCallState<'_, '_>) -> Result<BfRet, BfErr>;

/// Return possibilities from a builtin.
pub enum BfRet {
    /// Successful return: push this value.
    Ret(Var),
    /// Hand control back to the VM loop: suspend, read, shutdown, ...
    VmInstr(ExecutionResult),
}

#[derive(Debug)]
pub enum BfErr {
    /// An error subject to the calling verb's `d` flag.
    Code(ErrorCode),
    ErrValue(Error),
    /// Raise unconditionally (the `raise()` builtin).
    Raise(Error),
}

pub fn bf_noop(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Err(BfErr::ErrValue(ErrorCode::E_INVARG.msg(format!(
        "builtin {} is not implemented",
        bf_args.name
    ))))
}

#[derive(Clone)]
pub struct BuiltinRegistry {
    builtins: std::rc::Rc<Vec<BuiltinFunction>>,
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        let mut builtins: Vec<BuiltinFunction> = vec![bf_noop; BUILTINS.len()];
        bf_values::register_bf_values(&mut builtins);
        bf_num::register_bf_num(&mut builtins);
        bf_strings::register_bf_strings(&mut builtins);
        bf_list_sets::register_bf_list_sets(&mut builtins);
        bf_maps::register_bf_maps(&mut builtins);
        bf_objects::register_bf_objects(&mut builtins);
        bf_properties::register_bf_properties(&mut builtins);
        bf_verbs::register_bf_verbs(&mut builtins);
        bf_tasks::register_bf_tasks(&mut builtins);
        bf_server::register_bf_server(&mut builtins);
        BuiltinRegistry {
            builtins: std::rc::Rc::new(builtins),
        }
    }

    pub fn builtin_for(&self, id: &BuiltinId) -> BuiltinFunction {
        self.builtins[id.0 as usize]
    }
}

/// Register by name; panics at startup if the compiler table disagrees, which
/// is a build mistake, not a runtime condition.
pub(crate) fn register(builtins: &mut [BuiltinFunction], name: &str, f: BuiltinFunction) {
    let id = BUILTINS
        .find_builtin(Symbol::mk(name))
        .unwrap_or_else(|| panic!("builtin {name} missing from descriptor table"));
    builtins[id.0 as usize] = f;
}

/// Call `receiver:verb(args)` synchronously within the current task context.
/// `None` when no such verb exists; otherwise the verb's result or its
/// uncaught exception.
pub(crate) fn call_verb_nested(
    bs: &mut BfCallState<'_, '_>,
    receiver: &Var,
    verb: &str,
    args: Vec<Var>,
) -> Option<Result<Var, Box<crate::vm::Exception>>> {
    use crate::tasks::task::{run_nested, VmContext};
    use crate::vm::activation::Activation;

    let resolved = world::resolve_verb(bs.world, receiver, verb).ok()?;
    let Ok(verb_body) = bs.world.verb(resolved.definer, resolved.index) else {
        return None;
    };
    let program = verb_body.program.clone()?;
    let player = bs.exec.top().player;
    let caller = bs.exec.caller_value();
    let activation = Activation::for_call(
        program,
        resolved.this,
        player,
        caller,
        verb,
        resolved.verb_loc,
        resolved.owner,
        resolved.flags,
        args,
        None,
    );
    let mut ctx = VmContext {
        world: &mut *bs.world,
        tasks: &mut *bs.tasks,
        conns: &mut *bs.conns,
        config: &mut *bs.config,
        server: &mut *bs.server,
        builtins: bs.builtins,
        meta: &mut *bs.meta,
    };
    Some(run_nested(activation, &mut ctx))
}

/// Arity check against the descriptor table, shared by the VM call site.
pub fn check_arity(id: &BuiltinId, nargs: usize) -> Result<(), BfErr> {
    let d = BUILTINS.description(*id);
    if nargs < d.min_args {
        return Err(BfErr::Code(E_ARGS));
    }
    if let Some(max) = d.max_args {
        if nargs > max {
            return Err(BfErr::Code(E_ARGS));
        }
    }
    Ok(())
}
