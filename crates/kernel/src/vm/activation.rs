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

use crate::tasks::command_parse::ParsedCommand;
use crate::vm::moo_frame::MooStackFrame;
use barn_compiler::{GlobalName, Program};
use barn_db::model::{VerbFlag, VerbFlags};
use barn_var::{
    v_empty_list, v_empty_str, v_list, v_obj, v_str, v_string, Obj, Var, NOTHING,
};

/// One layer of the call stack. `this` is a full value: for a primitive
/// prototype call it is the primitive itself, not the prototype object.
#[derive(Clone, Debug)]
pub struct Activation {
    pub frame: MooStackFrame,
    pub this: Var,
    pub player: Obj,
    /// Task permissions for this frame: the verb owner, unless overridden by
    /// `set_task_perms()`. `caller_perms()` reads the parent frame's value.
    pub permissions: Obj,
    pub verb_name: String,
    /// Where the verb is defined. Tracebacks print this, and `pass` resolves
    /// from its parents. `NOTHING` for eval/hook frames.
    pub verb_loc: Var,
    pub verb_flags: VerbFlags,
    pub args: Vec<Var>,
}

fn set_constants(frame: &mut MooStackFrame) {
    use barn_var::VarType::*;
    frame.set_gvar(GlobalName::NUM, barn_var::v_int(TYPE_INT as i64));
    frame.set_gvar(GlobalName::INT, barn_var::v_int(TYPE_INT as i64));
    frame.set_gvar(GlobalName::FLOAT, barn_var::v_int(TYPE_FLOAT as i64));
    frame.set_gvar(GlobalName::OBJ, barn_var::v_int(TYPE_OBJ as i64));
    frame.set_gvar(GlobalName::STR, barn_var::v_int(TYPE_STR as i64));
    frame.set_gvar(GlobalName::ERR, barn_var::v_int(TYPE_ERR as i64));
    frame.set_gvar(GlobalName::LIST, barn_var::v_int(TYPE_LIST as i64));
    frame.set_gvar(GlobalName::MAP, barn_var::v_int(TYPE_MAP as i64));
    frame.set_gvar(GlobalName::ANON, barn_var::v_int(TYPE_ANON as i64));
    frame.set_gvar(GlobalName::WAIF, barn_var::v_int(TYPE_WAIF as i64));
    frame.set_gvar(GlobalName::BOOL, barn_var::v_int(TYPE_BOOL as i64));
}

impl Activation {
    #[allow(clippy::too_many_arguments)]
    pub fn for_call(
        program: Program,
        this: Var,
        player: Obj,
        caller: Var,
        verb_name: &str,
        verb_loc: Var,
        verb_owner: Obj,
        verb_flags: VerbFlags,
        args: Vec<Var>,
        command: Option<&ParsedCommand>,
    ) -> Self {
        let mut frame = MooStackFrame::new(program);
        set_constants(&mut frame);
        frame.set_gvar(GlobalName::this, this.clone());
        frame.set_gvar(GlobalName::player, v_obj(player));
        frame.set_gvar(GlobalName::caller, caller);
        frame.set_gvar(GlobalName::verb, v_str(verb_name));
        frame.set_gvar(GlobalName::args, v_list(&args));
        match command {
            Some(command) => {
                frame.set_gvar(GlobalName::argstr, v_string(command.argstr.clone()));
                frame.set_gvar(GlobalName::dobj, v_obj(command.dobj.unwrap_or(NOTHING)));
                frame.set_gvar(
                    GlobalName::dobjstr,
                    command
                        .dobjstr
                        .clone()
                        .map_or_else(v_empty_str, v_string),
                );
                frame.set_gvar(
                    GlobalName::prepstr,
                    command
                        .prepstr
                        .clone()
                        .map_or_else(v_empty_str, v_string),
                );
                frame.set_gvar(GlobalName::iobj, v_obj(command.iobj.unwrap_or(NOTHING)));
                frame.set_gvar(
                    GlobalName::iobjstr,
                    command
                        .iobjstr
                        .clone()
                        .map_or_else(v_empty_str, v_string),
                );
            }
            None => {
                frame.set_gvar(GlobalName::argstr, v_empty_str());
                frame.set_gvar(GlobalName::dobj, v_obj(NOTHING));
                frame.set_gvar(GlobalName::dobjstr, v_empty_str());
                frame.set_gvar(GlobalName::prepstr, v_empty_str());
                frame.set_gvar(GlobalName::iobj, v_obj(NOTHING));
                frame.set_gvar(GlobalName::iobjstr, v_empty_str());
            }
        }

        Self {
            frame,
            this,
            player,
            permissions: verb_owner,
            verb_name: verb_name.to_string(),
            verb_loc,
            verb_flags,
            args,
        }
    }

    /// A frame for `eval()`, the `;` command, and server hooks: debug flag
    /// on, `this` nothing, permissions as given.
    pub fn for_eval(program: Program, player: Obj, permissions: Obj) -> Self {
        let mut frame = MooStackFrame::new(program);
        set_constants(&mut frame);
        frame.set_gvar(GlobalName::this, v_obj(NOTHING));
        frame.set_gvar(GlobalName::player, v_obj(player));
        frame.set_gvar(GlobalName::caller, v_obj(player));
        frame.set_gvar(GlobalName::verb, v_empty_str());
        frame.set_gvar(GlobalName::args, v_empty_list());
        frame.set_gvar(GlobalName::argstr, v_empty_str());
        frame.set_gvar(GlobalName::dobj, v_obj(NOTHING));
        frame.set_gvar(GlobalName::dobjstr, v_empty_str());
        frame.set_gvar(GlobalName::prepstr, v_empty_str());
        frame.set_gvar(GlobalName::iobj, v_obj(NOTHING));
        frame.set_gvar(GlobalName::iobjstr, v_empty_str());

        Self {
            frame,
            this: v_obj(NOTHING),
            player,
            permissions,
            verb_name: "eval".to_string(),
            verb_loc: v_obj(NOTHING),
            verb_flags: VerbFlags::new_with(VerbFlag::Exec) | VerbFlag::Debug,
            args: vec![],
        }
    }

    /// A forked task's frame: the forking frame's environment, pc 0 into the
    /// fork vector.
    pub fn for_fork(parent: &Activation, fv_offset: barn_compiler::Offset) -> Self {
        let mut frame = parent.frame.clone();
        frame.fork_vector = Some(fv_offset);
        frame.pc = 0;
        frame.valstack.clear();
        frame.scope_stack.clear();
        frame.catch_stack.clear();
        frame.finally_stack.clear();
        Self {
            frame,
            this: parent.this.clone(),
            player: parent.player,
            permissions: parent.permissions,
            verb_name: parent.verb_name.clone(),
            verb_loc: parent.verb_loc.clone(),
            verb_flags: parent.verb_flags,
            args: parent.args.clone(),
        }
    }

    pub fn debug_on(&self) -> bool {
        self.verb_flags.contains(VerbFlag::Debug)
    }
}
