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

//! The bytecode VM: activation frames, the op execution loop, and stack
//! unwinding with traceback capture.

pub mod activation;
pub mod exec_state;
pub mod moo_frame;
pub mod vm_call;
pub mod vm_execute;
pub mod vm_unwind;

pub use activation::Activation;
pub use exec_state::VMExecState;
pub use vm_unwind::{Exception, FinallyReason};

use barn_compiler::Offset;
use barn_var::Var;

/// What the op loop hands back to the task driver at a boundary.
#[derive(Debug)]
pub enum ExecutionResult {
    /// Keep executing.
    More,
    /// The bottom frame returned; the task is done.
    Complete(Var),
    /// An uncaught exception. The activation stack has NOT been popped; the
    /// caller extracts the traceback and then discards the state.
    Exception(Exception),
    /// `suspend(seconds?)`; `None` suspends indefinitely.
    Suspend(Option<f64>),
    /// `read()` — park until a line arrives on the connection.
    ReadLine { connection: i64 },
    /// A `fork` statement fired: schedule the fork vector after `delay`.
    Fork {
        delay: f64,
        id: Option<barn_compiler::Name>,
        fv_offset: Offset,
    },
    /// The task ran out of ticks or seconds; surfaced as an abort.
    TicksExceeded,
    SecondsExceeded,
    /// The task killed itself with `kill_task(task_id())`.
    Kill,
    /// The server is shutting down on this task's request.
    Shutdown(Option<String>),
}
