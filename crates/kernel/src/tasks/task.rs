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

//! Tasks: one unit of MOO execution, owned by the scheduler. A task survives
//! its connection; only the scheduler ever runs one, and only one runs at a
//! time.

use crate::builtins::BuiltinRegistry;
use crate::config::ServerOptions;
use crate::tasks::sessions::Connections;
use crate::vm::activation::Activation;
use crate::vm::{vm_execute, Exception, ExecutionResult, VMExecState};
use barn_db::ObjectStore;
use barn_var::ErrorCode::{E_INVARG, E_QUOTA};
use barn_var::{v_int, Obj, Var};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::time::{Duration, Instant, SystemTime};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskState {
    Ready,
    Running,
    Suspended,
    WaitingInput,
    Killed,
}

/// Task bookkeeping, separable from the VM state so builtins can hold both
/// mutably.
pub struct TaskMeta {
    pub id: i64,
    pub player: Obj,
    pub state: TaskState,
    pub tick_budget: u64,
    pub ticks_used: u64,
    pub seconds_budget: f64,
    pub seconds_used: f64,
    pub task_local: Var,
    /// What `suspend()`/`read()` returns on wakeup. Always a value, never
    /// nil; initialized to 0.
    pub wake_value: Var,
    pub wake_time: Option<Instant>,
    pub reading_connection: Option<i64>,
    pub kill_requested: bool,
    pub background: bool,
    pub start_time: SystemTime,
    /// The connection this task answers to, for result echo and tracebacks.
    pub origin_conn: Option<i64>,
    /// Print the completion value back to the origin (the `;` command).
    pub echo_result: bool,
    /// Set while parked in `suspend()`/`read()`: on resume, the wake value
    /// gets pushed as the suspending builtin's result.
    pub wake_pending: bool,
}

impl TaskMeta {
    pub fn new(id: i64, player: Obj, config: &ServerOptions, background: bool) -> Self {
        Self {
            id,
            player,
            state: TaskState::Ready,
            tick_budget: if background {
                config.bg_ticks
            } else {
                config.fg_ticks
            },
            ticks_used: 0,
            seconds_budget: if background {
                config.bg_seconds
            } else {
                config.fg_seconds
            },
            seconds_used: 0.0,
            task_local: v_int(0),
            wake_value: v_int(0),
            wake_time: None,
            reading_connection: None,
            kill_requested: false,
            background,
            start_time: SystemTime::now(),
            origin_conn: None,
            echo_result: false,
            wake_pending: false,
        }
    }

    pub fn ticks_left(&self) -> i64 {
        self.tick_budget.saturating_sub(self.ticks_used) as i64
    }

    pub fn seconds_left(&self) -> f64 {
        (self.seconds_budget - self.seconds_used).max(0.0)
    }
}

pub struct Task {
    pub meta: TaskMeta,
    pub vm: VMExecState,
}

/// Every task the scheduler is not currently running, plus the queues that
/// decide what runs next.
#[derive(Default)]
pub struct TaskQ {
    pub tasks: HashMap<i64, Task>,
    pub ready: VecDeque<i64>,
    timers: BinaryHeap<Reverse<(Instant, i64)>>,
    next_task_id: i64,
}

impl TaskQ {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            ready: VecDeque::new(),
            timers: BinaryHeap::new(),
            next_task_id: 1,
        }
    }

    pub fn allocate_task_id(&mut self) -> i64 {
        let id = self.next_task_id;
        self.next_task_id += 1;
        id
    }

    pub fn insert_ready(&mut self, task: Task) {
        let id = task.meta.id;
        self.tasks.insert(id, task);
        self.ready.push_back(id);
    }

    pub fn insert_at(&mut self, mut task: Task, wake: Instant) {
        task.meta.wake_time = Some(wake);
        task.meta.state = TaskState::Suspended;
        let id = task.meta.id;
        self.tasks.insert(id, task);
        self.timers.push(Reverse((wake, id)));
    }

    pub fn insert_waiting(&mut self, task: Task) {
        let id = task.meta.id;
        self.tasks.insert(id, task);
    }

    pub fn take(&mut self, id: i64) -> Option<Task> {
        self.ready.retain(|t| *t != id);
        self.tasks.remove(&id)
    }

    /// Wake a suspended task with a value; `E_INVARG` if it isn't waiting.
    pub fn resume(&mut self, id: i64, value: Var) -> Result<(), barn_var::ErrorCode> {
        let Some(task) = self.tasks.get_mut(&id) else {
            return Err(E_INVARG);
        };
        if task.meta.state != TaskState::Suspended {
            return Err(E_INVARG);
        }
        task.meta.wake_value = value;
        task.meta.wake_time = None;
        task.meta.state = TaskState::Ready;
        self.ready.push_back(id);
        Ok(())
    }

    pub fn kill(&mut self, id: i64) -> bool {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.meta.state = TaskState::Killed;
            self.ready.retain(|t| *t != id);
            self.tasks.remove(&id);
            return true;
        }
        false
    }

    /// Move timer-due tasks onto the ready queue; ties in wake time run in
    /// task-creation order via the id component of the heap key.
    pub fn drain_due(&mut self, now: Instant) {
        while let Some(Reverse((when, id))) = self.timers.peek().copied() {
            if when > now {
                break;
            }
            self.timers.pop();
            if let Some(task) = self.tasks.get_mut(&id) {
                // A resume() may have beaten the timer; only wake the still
                // suspended.
                if task.meta.state == TaskState::Suspended && task.meta.wake_time == Some(when) {
                    task.meta.state = TaskState::Ready;
                    task.meta.wake_time = None;
                    self.ready.push_back(id);
                }
            }
        }
    }

    pub fn next_wake(&self) -> Option<Instant> {
        self.timers.peek().map(|Reverse((when, _))| *when)
    }

    pub fn next_ready(&mut self) -> Option<i64> {
        self.ready.pop_front()
    }
}

/// Scheduler-wide flags builtins can set.
#[derive(Default)]
pub struct ServerControl {
    pub checkpoint_requested: bool,
    pub shutdown_requested: Option<String>,
    pub db_path: std::path::PathBuf,
}

/// The borrow bundle threaded through the op loop and into builtins while
/// one task runs.
pub struct VmContext<'a> {
    pub world: &'a mut ObjectStore,
    pub tasks: &'a mut TaskQ,
    pub conns: &'a mut Connections,
    pub config: &'a mut ServerOptions,
    pub server: &'a mut ServerControl,
    pub builtins: &'a BuiltinRegistry,
    pub meta: &'a mut TaskMeta,
}

/// The scheduler-visible outcome of running a task to a boundary.
pub enum TaskResult {
    Complete(Var),
    Exception(Exception),
    /// Parked (suspended or waiting for input); the task has been put back
    /// in the queue.
    Parked(Task),
    Killed,
    Shutdown(Option<String>),
}

/// Run one task until it completes, parks, or dies. Fork boundaries are
/// handled here: the child task is queued and the parent keeps running.
pub fn run_task(mut task: Task, ctx_parts: TaskRunParts<'_>) -> TaskResult {
    let TaskRunParts {
        world,
        tasks,
        conns,
        config,
        server,
        builtins,
    } = ctx_parts;
    task.meta.state = TaskState::Running;
    loop {
        let mut ctx = VmContext {
            world: &mut *world,
            tasks: &mut *tasks,
            conns: &mut *conns,
            config: &mut *config,
            server: &mut *server,
            builtins,
            meta: &mut task.meta,
        };
        let result = vm_execute::execute(&mut task.vm, &mut ctx);
        match result {
            ExecutionResult::More => continue,
            ExecutionResult::Complete(v) => return TaskResult::Complete(v),
            ExecutionResult::Exception(e) => return TaskResult::Exception(e),
            ExecutionResult::Suspend(seconds) => {
                task.meta.state = TaskState::Suspended;
                task.meta.wake_pending = true;
                task.meta.wake_time =
                    seconds.map(|s| Instant::now() + Duration::from_secs_f64(s.max(0.0)));
                return TaskResult::Parked(task);
            }
            ExecutionResult::ReadLine { connection } => {
                task.meta.state = TaskState::WaitingInput;
                task.meta.wake_pending = true;
                task.meta.reading_connection = Some(connection);
                return TaskResult::Parked(task);
            }
            ExecutionResult::Fork {
                delay,
                id,
                fv_offset,
            } => {
                let child_id = tasks.allocate_task_id();
                let parent_activation = task.vm.top();
                let mut child_activation =
                    Activation::for_fork(parent_activation, fv_offset);
                if let Some(name) = &id {
                    child_activation.frame.set_env(name, v_int(child_id));
                }
                let mut child_meta =
                    TaskMeta::new(child_id, task.meta.player, config, true);
                child_meta.state = TaskState::Suspended;
                child_meta.origin_conn = task.meta.origin_conn;
                let child = Task {
                    meta: child_meta,
                    vm: VMExecState {
                        stack: vec![child_activation],
                    },
                };
                tasks.insert_at(
                    child,
                    Instant::now() + Duration::from_secs_f64(delay.max(0.0)),
                );
                if let Some(name) = &id {
                    task.vm.top_mut().frame.set_env(name, v_int(child_id));
                }
                continue;
            }
            ExecutionResult::TicksExceeded => {
                let exception = task
                    .vm
                    .make_exception(E_QUOTA.msg("Task ran out of ticks"), None);
                return TaskResult::Exception(exception);
            }
            ExecutionResult::SecondsExceeded => {
                let exception = task
                    .vm
                    .make_exception(E_QUOTA.msg("Task ran out of seconds"), None);
                return TaskResult::Exception(exception);
            }
            ExecutionResult::Kill => return TaskResult::Killed,
            ExecutionResult::Shutdown(msg) => return TaskResult::Shutdown(msg),
        }
    }
}

/// The pieces `run_task` borrows from the scheduler.
pub struct TaskRunParts<'a> {
    pub world: &'a mut ObjectStore,
    pub tasks: &'a mut TaskQ,
    pub conns: &'a mut Connections,
    pub config: &'a mut ServerOptions,
    pub server: &'a mut ServerControl,
    pub builtins: &'a BuiltinRegistry,
}

/// Run a single activation synchronously to completion within the current
/// task context: server hooks and `eval()`. Suspension is illegal here.
pub fn run_nested(
    activation: Activation,
    ctx: &mut VmContext<'_>,
) -> Result<Var, Box<Exception>> {
    let mut vm = VMExecState {
        stack: vec![activation],
    };
    loop {
        let mut inner_ctx = VmContext {
            world: &mut *ctx.world,
            tasks: &mut *ctx.tasks,
            conns: &mut *ctx.conns,
            config: &mut *ctx.config,
            server: &mut *ctx.server,
            builtins: ctx.builtins,
            meta: &mut *ctx.meta,
        };
        match vm_execute::execute(&mut vm, &mut inner_ctx) {
            ExecutionResult::More => continue,
            ExecutionResult::Complete(v) => return Ok(v),
            ExecutionResult::Exception(e) => return Err(Box::new(e)),
            ExecutionResult::Suspend(_) | ExecutionResult::ReadLine { .. } => {
                let e = vm.make_exception(
                    E_INVARG.msg("Task may not suspend here"),
                    None,
                );
                return Err(Box::new(e));
            }
            ExecutionResult::Fork {
                delay,
                id,
                fv_offset,
            } => {
                let child_id = ctx.tasks.allocate_task_id();
                let mut child_activation = Activation::for_fork(vm.top(), fv_offset);
                if let Some(name) = &id {
                    child_activation.frame.set_env(name, v_int(child_id));
                    vm.top_mut().frame.set_env(name, v_int(child_id));
                }
                let mut child_meta =
                    TaskMeta::new(child_id, vm.top().player, ctx.config, true);
                child_meta.state = TaskState::Suspended;
                ctx.tasks.insert_at(
                    Task {
                        meta: child_meta,
                        vm: VMExecState {
                            stack: vec![child_activation],
                        },
                    },
                    Instant::now() + Duration::from_secs_f64(delay.max(0.0)),
                );
                continue;
            }
            ExecutionResult::TicksExceeded | ExecutionResult::SecondsExceeded => {
                let e = vm.make_exception(E_QUOTA.msg("Task ran out of ticks"), None);
                return Err(Box::new(e));
            }
            ExecutionResult::Kill => {
                let e = vm.make_exception(
                    barn_var::ErrorCode::E_INTRPT.msg("Interrupted"),
                    None,
                );
                return Err(Box::new(e));
            }
            ExecutionResult::Shutdown(_) => {
                // The flag is already set on the server control; finish the
                // nested call normally.
                return Ok(v_int(0));
            }
        }
    }
}
