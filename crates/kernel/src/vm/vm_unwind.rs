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

use crate::vm::moo_frame::{CatchType, ScopeType};
use crate::vm::{ExecutionResult, VMExecState};
use barn_compiler::{Label, Offset};
use barn_var::{v_err, v_int, v_list, v_str, v_string, Error, Var, Variant};

/// Why the stack is unwinding.
#[derive(Clone, Debug)]
pub enum FinallyReason {
    /// Normal fallthrough out of a finally body.
    Fallthrough,
    Raise(Exception),
    Return(Var),
    /// break/continue: trim the value stack and jump.
    Exit { stack: Offset, label: Label },
}

/// An in-flight MOO exception: code, message, value, and the captured frame
/// stack and formatted backtrace lines.
#[derive(Clone, Debug)]
pub struct Exception {
    pub code: Error,
    pub msg: String,
    pub value: Var,
    /// `{this, verb-name, programmer, verb-loc, player, line}` per frame,
    /// topmost first.
    pub stack: Vec<Var>,
    /// Human-readable traceback lines, topmost frame first.
    pub backtrace: Vec<Var>,
}

impl Exception {
    /// The 4-tuple bound by `except` clauses:
    /// `{code, message, value, traceback}`.
    pub fn as_moo_value(&self) -> Var {
        v_list(&[
            v_err(self.code.err_type),
            v_string(self.msg.clone()),
            self.value.clone(),
            v_list(&self.stack),
        ])
    }
}

impl VMExecState {
    /// Compose the traceback lines for an error raised in the current state.
    fn make_backtrace(&self, raise_msg: &str) -> Vec<Var> {
        let mut backtrace_list = vec![];
        for (i, a) in self.stack.iter().rev().enumerate() {
            let mut pieces = vec![];
            if i != 0 {
                pieces.push("... called from ".to_string());
            }
            let verb_loc = match a.verb_loc.variant() {
                Variant::Obj(o) => format!("{o}"),
                _ => "*anonymous*".to_string(),
            };
            pieces.push(format!("{}:{}", verb_loc, a.verb_name));
            if a.verb_loc != a.this {
                if let Variant::Obj(this) = a.this.variant() {
                    pieces.push(format!(" (this == {this})"));
                }
            }
            if let Some(line_num) = a.frame.find_line_no() {
                pieces.push(format!(", line {line_num}"));
            }
            if i == 0 {
                pieces.push(format!(":  {raise_msg}"));
            }
            backtrace_list.push(v_str(&pieces.join("")));
        }
        backtrace_list.push(v_str("(End of traceback)"));
        backtrace_list
    }

    pub fn make_exception(&self, code: Error, value: Option<Var>) -> Exception {
        let msg = code.message();
        Exception {
            value: value
                .or_else(|| code.value.as_deref().cloned())
                .unwrap_or_else(|| v_int(0)),
            backtrace: self.make_backtrace(&msg),
            stack: self.stack_list(false, true),
            code,
            msg,
        }
    }

    /// Raise unconditionally, seeking a handler down the stack.
    pub fn throw_error(&mut self, code: Error, value: Option<Var>) -> ExecutionResult {
        let exception = self.make_exception(code, value);
        self.unwind_stack(FinallyReason::Raise(exception))
    }

    /// The d-bit rule: raise if the running verb has the debug flag, else
    /// just leave the error value as the result of the failed operation.
    pub fn push_error(&mut self, code: Error) -> ExecutionResult {
        if self.top().debug_on() {
            return self.throw_error(code, None);
        }
        self.top_mut().frame.push(v_err(code.err_type));
        ExecutionResult::More
    }

    /// Unwind the activation stack for `why`, honoring catch and finally
    /// scopes on the way down. Frames are only popped once no handler in
    /// them applies; an uncaught exception leaves the whole stack in place
    /// for the caller to read.
    pub fn unwind_stack(&mut self, why: FinallyReason) -> ExecutionResult {
        loop {
            let Some(a) = self.stack.last_mut() else {
                break;
            };
            let frame = &mut a.frame;

            // Walk this frame's scopes innermost-first.
            loop {
                let Some(scope) = frame.pop_scope() else {
                    break;
                };
                match scope.scope_type {
                    ScopeType::TryFinally(finally_label) => {
                        // Run the finally body, remembering why we came.
                        frame.jump(&finally_label);
                        frame.finally_stack.push(why);
                        return ExecutionResult::More;
                    }
                    ScopeType::TryCatch(catches) => {
                        if let FinallyReason::Raise(exception) = &why {
                            for (catch_type, handler) in &catches {
                                let found = match catch_type {
                                    CatchType::Any => true,
                                    CatchType::Errors(codes) => codes.iter().any(|c| {
                                        matches!(c.variant(), Variant::Err(e) if *e == exception.code)
                                    }),
                                };
                                if found {
                                    frame.jump(handler);
                                    frame.push(exception.as_moo_value());
                                    return ExecutionResult::More;
                                }
                            }
                        }
                    }
                }
            }

            // Exits stay within the frame that compiled them.
            if let FinallyReason::Exit { stack, label } = &why {
                frame.valstack.truncate(stack.0 as usize);
                frame.jump(label);
                return ExecutionResult::More;
            }

            // No handler in this frame: pop it. An uncaught exception's
            // frame stack was captured into the Exception at raise time,
            // before any popping happened.
            self.stack.pop();
            if self.stack.is_empty() {
                break;
            }

            if let FinallyReason::Return(value) = &why {
                // The return value becomes the result of the caller's verb
                // call expression.
                self.top_mut().frame.push(value.clone());
                return ExecutionResult::More;
            }
            // A raise keeps looking for handlers in the frame below.
        }

        match why {
            FinallyReason::Return(v) => ExecutionResult::Complete(v),
            FinallyReason::Fallthrough => ExecutionResult::Complete(v_int(0)),
            FinallyReason::Raise(e) => ExecutionResult::Exception(e),
            FinallyReason::Exit { .. } => {
                // A loop exit that found no loop; compiler prevents this.
                ExecutionResult::Complete(v_int(0))
            }
        }
    }

    /// Format the backtrace for delivery to a player or the log.
    pub fn format_backtrace_lines(exception: &Exception) -> Vec<String> {
        exception
            .backtrace
            .iter()
            .map(|v| match v.variant() {
                Variant::Str(s) => s.to_text().into_owned(),
                _ => String::new(),
            })
            .collect()
    }
}
