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

use crate::vm::activation::Activation;
use barn_var::{v_int, v_list, v_none, v_obj, v_str, Obj, Var, NOTHING};

/// The call stack of one task.
#[derive(Debug, Default)]
pub struct VMExecState {
    pub stack: Vec<Activation>,
}

impl VMExecState {
    pub fn new() -> Self {
        Self { stack: vec![] }
    }

    pub fn top(&self) -> &Activation {
        self.stack.last().expect("empty activation stack")
    }

    pub fn top_mut(&mut self) -> &mut Activation {
        self.stack.last_mut().expect("empty activation stack")
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The permissions of the frame below the top: what `caller_perms()`
    /// reports. `#-1` at the top of the stack.
    pub fn caller_perms(&self) -> Obj {
        let len = self.stack.len();
        if len < 2 {
            return NOTHING;
        }
        self.stack[len - 2].permissions
    }

    /// The active task permissions: the top frame's.
    pub fn task_perms(&self) -> Obj {
        self.stack
            .last()
            .map(|a| a.permissions)
            .unwrap_or(NOTHING)
    }

    /// The `caller` value a newly pushed frame should see: the current
    /// frame's `this`, or the player at the bottom.
    pub fn caller_value(&self) -> Var {
        match self.stack.last() {
            Some(a) => a.this.clone(),
            None => v_obj(NOTHING),
        }
    }

    /// Current line in the top frame, for tracebacks.
    pub fn current_line(&self) -> Option<usize> {
        self.stack.last().and_then(|a| a.frame.find_line_no())
    }

    /// Frame descriptions for `callers()`/`task_stack()` and exception
    /// stacks: `{this, verb-name, programmer, verb-loc, player, line}`.
    /// `skip_top` elides the currently-running frame, as `callers()` does.
    pub fn stack_list(&self, skip_top: bool, include_line: bool) -> Vec<Var> {
        let mut out = vec![];
        let frames: Vec<&Activation> = self.stack.iter().rev().collect();
        let frames = if skip_top && !frames.is_empty() {
            &frames[1..]
        } else {
            &frames[..]
        };
        for a in frames {
            let line = match (include_line, a.frame.find_line_no()) {
                (true, Some(l)) => v_int(l as i64),
                _ => v_none(),
            };
            let mut entry = vec![
                a.this.clone(),
                v_str(&a.verb_name),
                v_obj(a.permissions),
                a.verb_loc.clone(),
                v_obj(a.player),
            ];
            if include_line {
                entry.push(line);
            }
            out.push(v_list(&entry));
        }
        out
    }
}
