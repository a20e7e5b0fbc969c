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

//! The scheduler: owner of the world, the tasks, and the connections. All
//! MOO execution is cooperative and single-threaded here; the network edge
//! feeds lines in over a channel and reads buffered output back.

use crate::builtins::BuiltinRegistry;
use crate::config::ServerOptions;
use crate::tasks::command_parse::{parse_command, parse_into_words, ParsedCommand};
use crate::tasks::matching::match_object;
use crate::tasks::sessions::{ConnectionOut, Connections};
use crate::tasks::task::{
    run_nested, run_task, ServerControl, Task, TaskMeta, TaskQ, TaskResult, TaskRunParts,
    TaskState, VmContext,
};
use crate::vm::activation::Activation;
use crate::vm::{Exception, VMExecState};
use crate::world;
use barn_compiler::compile;
use barn_db::model::ArgSpec;
use barn_db::model::ObjFlag;
use barn_db::model::PrepSpec;
use barn_db::{ObjPtr, ObjectStore};
use barn_textdump::{textdump_from_store, TextdumpWriter};
use barn_var::{
    v_int, v_obj, v_str, v_string, Obj, Var, Variant, NOTHING, SYSTEM_OBJECT,
};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// What the network front end sends the scheduler.
pub enum SchedulerMessage {
    Connected {
        peer: String,
        outbound: flume::Sender<ConnectionOut>,
        reply: flume::Sender<i64>,
    },
    Line {
        conn_id: i64,
        line: String,
    },
    Disconnected {
        conn_id: i64,
    },
    /// External stop request (signal handler).
    Stop,
}

/// Failures from direct evaluation.
#[derive(Debug)]
pub enum EvalError {
    Compile(barn_compiler::CompileError),
    Exception(Box<Exception>),
}

pub struct Scheduler {
    pub world: ObjectStore,
    pub tasks: TaskQ,
    pub conns: Connections,
    pub config: ServerOptions,
    pub server: ServerControl,
    pub builtins: BuiltinRegistry,
    control_rx: flume::Receiver<SchedulerMessage>,
    next_checkpoint: Instant,
}

impl Scheduler {
    pub fn new(
        world: ObjectStore,
        db_path: PathBuf,
    ) -> (Self, flume::Sender<SchedulerMessage>) {
        let (tx, rx) = flume::unbounded();
        let mut config = ServerOptions::default();
        config.reload(&world);
        let next_checkpoint = Instant::now() + Duration::from_secs(config.dump_interval);
        let scheduler = Scheduler {
            world,
            tasks: TaskQ::new(),
            conns: Connections::new(),
            config,
            server: ServerControl {
                checkpoint_requested: false,
                shutdown_requested: None,
                db_path,
            },
            builtins: BuiltinRegistry::new(),
            control_rx: rx,
            next_checkpoint,
        };
        (scheduler, tx)
    }

    /// The main loop. Returns when a shutdown has been requested and the
    /// final checkpoint is on disk.
    pub fn run(&mut self) {
        info!("scheduler running");
        loop {
            if self.server.shutdown_requested.is_some() {
                break;
            }

            // Sleep only when nothing is runnable, and never past the next
            // timer or checkpoint.
            if self.tasks.ready.is_empty() {
                let now = Instant::now();
                let mut deadline = self.next_checkpoint;
                if let Some(wake) = self.tasks.next_wake() {
                    deadline = deadline.min(wake);
                }
                let timeout = deadline.saturating_duration_since(now).min(
                    Duration::from_millis(250),
                );
                match self.control_rx.recv_timeout(timeout) {
                    Ok(msg) => self.handle_message(msg),
                    Err(flume::RecvTimeoutError::Timeout) => {}
                    Err(flume::RecvTimeoutError::Disconnected) => break,
                }
            }
            // Drain whatever else is waiting without blocking.
            while let Ok(msg) = self.control_rx.try_recv() {
                self.handle_message(msg);
            }

            self.tasks.drain_due(Instant::now());

            if let Some(id) = self.tasks.next_ready() {
                if let Some(task) = self.tasks.take(id) {
                    self.run_one(task);
                }
            }

            self.end_of_cycle();
        }

        let shutdown_msg = self
            .server
            .shutdown_requested
            .clone()
            .unwrap_or_default();
        info!("shutting down: {}", shutdown_msg);
        self.broadcast(&format!("*** Shutting down: {shutdown_msg} ***"));
        self.conns.flush_all();
        self.checkpoint();
    }

    // ---- message handling ----

    fn handle_message(&mut self, msg: SchedulerMessage) {
        match msg {
            SchedulerMessage::Connected {
                peer,
                outbound,
                reply,
            } => {
                let id = self.conns.register(peer, outbound);
                let _ = reply.send(id);
            }
            SchedulerMessage::Line { conn_id, line } => self.submit_line(conn_id, &line),
            SchedulerMessage::Disconnected { conn_id } => self.drop_connection(conn_id, false),
            SchedulerMessage::Stop => {
                self.server.shutdown_requested = Some("server stopped".to_string());
            }
        }
    }

    /// One input line from a connection, exactly as the network edge (or a
    /// test harness) would deliver it.
    pub fn submit_line(&mut self, conn_id: i64, line: &str) {
        let Some(conn) = self.conns.get_mut(conn_id) else {
            return;
        };
        conn.last_activity = std::time::SystemTime::now();

        // A task blocked in read() takes the line first.
        if let Some(reader) = conn.reading_task {
            conn.reading_task = None;
            if let Some(task) = self.tasks.tasks.get_mut(&reader) {
                task.meta.reading_connection = None;
                task.meta.wake_value = v_string(line.to_string());
                task.meta.state = TaskState::Ready;
                self.tasks.ready.push_back(reader);
            }
            return;
        }

        let player = conn.player;
        match player {
            None => self.handle_login_line(conn_id, line),
            Some(player) => self.handle_command_line(conn_id, player, line),
        }
    }

    fn drop_connection(&mut self, conn_id: i64, already_booted: bool) {
        let Some(conn) = self.conns.remove(conn_id) else {
            return;
        };
        // A reader parked on this connection wakes with a failed read.
        if let Some(reader) = conn.reading_task {
            if let Some(task) = self.tasks.tasks.get_mut(&reader) {
                task.meta.reading_connection = None;
                task.meta.wake_value = barn_var::v_err(barn_var::ErrorCode::E_INVARG);
                task.meta.state = TaskState::Ready;
                self.tasks.ready.push_back(reader);
            }
        }
        if let Some(player) = conn.player {
            if !already_booted {
                self.run_hook(player, Some(conn_id), "user_disconnected", vec![v_obj(player)]);
            }
        }
    }

    // ---- login FSM ----

    fn handle_login_line(&mut self, conn_id: i64, line: &str) {
        let words = parse_into_words(line);
        let mut args = vec![v_obj(Obj(conn_id))];
        args.extend(words.iter().map(|w| v_str(w)));

        let pre_call_max = self.world.max_object();
        let result = self.run_hook(Obj(conn_id), Some(conn_id), "do_login_command", args);
        let Some(result) = result else {
            self.notify_conn(conn_id, "The server is not accepting logins right now.");
            self.conns.flush(conn_id);
            return;
        };
        let Variant::Obj(player) = result.variant() else {
            self.conns.flush(conn_id);
            return;
        };
        let player = *player;
        if !self.world.valid(player) || !self.world.is_player(player) {
            self.conns.flush(conn_id);
            return;
        }

        // An existing connection for this player gets displaced.
        let reconnected = match self.conns.for_player(player) {
            Some(old) if old.id != conn_id => {
                let old_id = old.id;
                self.notify_conn(old_id, "*** Redirecting connection to new port ***");
                self.conns.flush(old_id);
                if let Some(old) = self.conns.get_mut(old_id) {
                    old.player = None;
                    old.booted = true;
                }
                true
            }
            _ => false,
        };

        if let Some(conn) = self.conns.get_mut(conn_id) {
            conn.player = Some(player);
        }

        let hook = if player > pre_call_max {
            "user_created"
        } else if reconnected {
            "user_reconnected"
        } else {
            "user_connected"
        };
        self.run_hook(player, Some(conn_id), hook, vec![v_obj(player)]);
        self.conns.flush(conn_id);
    }

    // ---- commands ----

    fn handle_command_line(&mut self, conn_id: i64, player: Obj, line: &str) {
        // MCP-style out-of-band lines bypass normal parsing; they reach
        // `#0:do_out_of_band_command` unchanged, or fall through to the
        // ordinary command path when no handler is installed.
        if line.starts_with("#$#")
            && self
                .resolve_system_verb("do_out_of_band_command")
                .is_some()
        {
            self.submit_verb_task(
                conn_id,
                player,
                v_obj(SYSTEM_OBJECT),
                "do_out_of_band_command",
                vec![v_str(line)],
                None,
            );
            return;
        }

        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix(';') {
            self.submit_eval_task(conn_id, player, rest);
            return;
        }

        // `#0:do_command` gets first crack; a true result swallows the line.
        if self.resolve_system_verb("do_command").is_some() {
            let mut args: Vec<Var> = parse_into_words(line)
                .iter()
                .map(|w| v_str(w))
                .collect();
            args.push(v_str(line));
            if let Some(result) = self.run_hook(player, Some(conn_id), "do_command", args) {
                if result.is_true() {
                    self.conns.flush(conn_id);
                    return;
                }
            }
        }

        let Some(mut command) = parse_command(line) else {
            return;
        };

        // Resolve objects against the player's surroundings.
        let dobj = command
            .dobjstr
            .as_deref()
            .map(|s| match_object(&self.world, player, s));
        let iobj = command
            .iobjstr
            .as_deref()
            .map(|s| match_object(&self.world, player, s));
        command.dobj = dobj;
        command.iobj = iobj;

        match self.find_command_target(player, &command) {
            Some((this, definer, index)) => {
                let Ok(verb) = self.world.verb(definer, index) else {
                    return;
                };
                let owner = verb.owner;
                let flags = verb.flags;
                let Some(program) = verb.program.clone() else {
                    self.notify_conn(conn_id, "I couldn't understand that.");
                    self.conns.flush(conn_id);
                    return;
                };
                let verb_loc = match definer {
                    ObjPtr::Num(o) => v_obj(o),
                    ObjPtr::Anon(_) => v_obj(NOTHING),
                };
                let activation = Activation::for_call(
                    program,
                    v_obj(this),
                    player,
                    v_obj(player),
                    &command.verb.clone(),
                    verb_loc,
                    owner,
                    flags,
                    command.args.clone(),
                    Some(&command),
                );
                self.submit_activation(conn_id, player, activation, false);
            }
            None => {
                // The room's `huh` verb is the last resort.
                let location = self
                    .world
                    .get(player)
                    .map(|p| p.location)
                    .unwrap_or(NOTHING);
                if location != NOTHING
                    && self
                        .world
                        .find_verb(ObjPtr::Num(location), "huh")
                        .is_some()
                {
                    self.submit_verb_task(
                        conn_id,
                        player,
                        v_obj(location),
                        "huh",
                        command.args.clone(),
                        Some(&command),
                    );
                    return;
                }
                self.notify_conn(conn_id, "I couldn't understand that.");
                self.conns.flush(conn_id);
            }
        }
    }

    /// Search player, location, dobj, iobj for a verb matching the command's
    /// name and argument specs.
    fn find_command_target(
        &self,
        player: Obj,
        command: &ParsedCommand,
    ) -> Option<(Obj, ObjPtr, usize)> {
        let location = self
            .world
            .get(player)
            .map(|p| p.location)
            .unwrap_or(NOTHING);
        let mut targets = vec![player];
        if location != NOTHING {
            targets.push(location);
        }
        if let Some(dobj) = command.dobj {
            if dobj.0 >= 0 {
                targets.push(dobj);
            }
        }
        if let Some(iobj) = command.iobj {
            if iobj.0 >= 0 {
                targets.push(iobj);
            }
        }

        for target in targets {
            if !self.world.valid(target) {
                continue;
            }
            let dobj = command.dobj.unwrap_or(NOTHING);
            let iobj = command.iobj.unwrap_or(NOTHING);
            let prep = command.prep;
            let found = self.world.find_command_verb(
                ObjPtr::Num(target),
                &command.verb,
                |spec| match spec {
                    ArgSpec::None => dobj == NOTHING && command.dobjstr.is_none(),
                    ArgSpec::Any => true,
                    ArgSpec::This => dobj == target,
                },
                |spec| match (spec, prep) {
                    (PrepSpec::Any, _) => true,
                    (PrepSpec::None, PrepSpec::None) => true,
                    (PrepSpec::Other(a), PrepSpec::Other(b)) => a == b,
                    _ => false,
                },
                |spec| match spec {
                    ArgSpec::None => iobj == NOTHING && command.iobjstr.is_none(),
                    ArgSpec::Any => true,
                    ArgSpec::This => iobj == target,
                },
            );
            if let Some((definer, index)) = found {
                return Some((target, definer, index));
            }
        }
        None
    }

    // ---- task submission ----

    fn submit_verb_task(
        &mut self,
        conn_id: i64,
        player: Obj,
        receiver: Var,
        verb: &str,
        args: Vec<Var>,
        command: Option<&ParsedCommand>,
    ) {
        let Ok(resolved) = world::resolve_verb(&self.world, &receiver, verb) else {
            return;
        };
        let Ok(verb_body) = self.world.verb(resolved.definer, resolved.index) else {
            return;
        };
        let Some(program) = verb_body.program.clone() else {
            return;
        };
        let activation = Activation::for_call(
            program,
            resolved.this,
            player,
            v_obj(player),
            verb,
            resolved.verb_loc,
            resolved.owner,
            resolved.flags,
            args,
            command,
        );
        self.submit_activation(conn_id, player, activation, false);
    }

    fn submit_eval_task(&mut self, conn_id: i64, player: Obj, source: &str) {
        if !world::is_programmer(&self.world, player) && !world::is_wizard(&self.world, player)
        {
            self.notify_conn(conn_id, "You are not a programmer.");
            self.conns.flush(conn_id);
            return;
        }

        // A core with its own `#0:eval` owns the `;` prefix.
        if self.resolve_system_verb("eval").is_some() {
            self.submit_verb_task(
                conn_id,
                player,
                v_obj(SYSTEM_OBJECT),
                "eval",
                vec![v_str(source)],
                None,
            );
            return;
        }

        let wrapped = format!("return {source};");
        let program = match compile(&wrapped).or_else(|_| compile(source)) {
            Ok(p) => p,
            Err(e) => {
                self.notify_conn(conn_id, &format!("{e}"));
                self.conns.flush(conn_id);
                return;
            }
        };
        let activation = Activation::for_eval(program, player, player);
        self.submit_activation(conn_id, player, activation, true);
    }

    fn submit_activation(
        &mut self,
        conn_id: i64,
        player: Obj,
        activation: Activation,
        echo_result: bool,
    ) {
        let id = self.tasks.allocate_task_id();
        let mut meta = TaskMeta::new(id, player, &self.config, false);
        meta.origin_conn = Some(conn_id);
        meta.echo_result = echo_result;
        let task = Task {
            meta,
            vm: VMExecState {
                stack: vec![activation],
            },
        };
        self.tasks.insert_ready(task);
    }

    // ---- running ----

    fn run_one(&mut self, mut task: Task) {
        let meta_conn = task.meta.origin_conn;
        let echo = task.meta.echo_result;
        let player = task.meta.player;
        // A resumed suspend()/read() sees its wake value as the builtin's
        // return.
        if task.meta.wake_pending {
            task.meta.wake_pending = false;
            let v = std::mem::replace(&mut task.meta.wake_value, v_int(0));
            task.vm.top_mut().frame.push(v);
        }
        let result = run_task(
            task,
            TaskRunParts {
                world: &mut self.world,
                tasks: &mut self.tasks,
                conns: &mut self.conns,
                config: &mut self.config,
                server: &mut self.server,
                builtins: &self.builtins,
            },
        );
        match result {
            TaskResult::Complete(v) => {
                if echo {
                    let conn = meta_conn.and_then(|c| self.conns.get(c).map(|c| c.id));
                    if let Some(conn) = conn {
                        self.notify_conn(conn, &format!("=> {}", barn_compiler::to_literal(&v)));
                    }
                }
            }
            TaskResult::Exception(e) => {
                self.deliver_traceback(player, meta_conn, &e);
            }
            TaskResult::Parked(task) => {
                // Wake bookkeeping happened in run_task; reinsert.
                match task.meta.state {
                    TaskState::Suspended => match task.meta.wake_time {
                        Some(when) => self.tasks.insert_at(task, when),
                        None => self.tasks.insert_waiting(task),
                    },
                    TaskState::WaitingInput => {
                        let conn = task.meta.reading_connection;
                        let id = task.meta.id;
                        self.tasks.insert_waiting(task);
                        if let Some(conn) = conn.and_then(|c| self.conns.get_mut(c)) {
                            conn.reading_task = Some(id);
                        }
                    }
                    _ => self.tasks.insert_waiting(task),
                }
            }
            TaskResult::Killed => {}
            TaskResult::Shutdown(_) => {}
        }
    }

    // ---- hooks ----

    fn resolve_system_verb(&self, name: &str) -> Option<(ObjPtr, usize)> {
        if !self.world.valid(SYSTEM_OBJECT) {
            return None;
        }
        self.world.find_verb(ObjPtr::Num(SYSTEM_OBJECT), name)
    }

    /// Run `#0:<verb>(args)` synchronously as a lightweight task. `None`
    /// when the hook doesn't exist; exceptions are reported and swallowed.
    pub fn run_hook(
        &mut self,
        player: Obj,
        conn_id: Option<i64>,
        verb: &str,
        args: Vec<Var>,
    ) -> Option<Var> {
        let (definer, index) = self.resolve_system_verb(verb)?;
        let verb_body = self.world.verb(definer, index).ok()?;
        let program = verb_body.program.clone()?;
        let owner = verb_body.owner;
        let flags = verb_body.flags;
        let verb_loc = match definer {
            ObjPtr::Num(o) => v_obj(o),
            ObjPtr::Anon(_) => v_obj(NOTHING),
        };
        let activation = Activation::for_call(
            program,
            v_obj(SYSTEM_OBJECT),
            player,
            v_obj(player),
            verb,
            verb_loc,
            owner,
            flags,
            args,
            None,
        );
        let hook_task_id = self.tasks.allocate_task_id();
        let mut meta = TaskMeta::new(hook_task_id, player, &self.config, false);
        meta.origin_conn = conn_id;
        let mut ctx = VmContext {
            world: &mut self.world,
            tasks: &mut self.tasks,
            conns: &mut self.conns,
            config: &mut self.config,
            server: &mut self.server,
            builtins: &self.builtins,
            meta: &mut meta,
        };
        match run_nested(activation, &mut ctx) {
            Ok(v) => Some(v),
            Err(e) => {
                self.deliver_traceback(player, conn_id, &e);
                None
            }
        }
    }

    // ---- output ----

    fn notify_conn(&mut self, conn_id: i64, line: &str) {
        self.conns.push_output(conn_id, line.as_bytes().to_vec());
    }

    fn broadcast(&mut self, line: &str) {
        for id in self.conns.ids() {
            self.conns.push_output(id, line.as_bytes().to_vec());
        }
    }

    /// Format and deliver an uncaught exception to the responsible player's
    /// connection, falling back to the server log.
    fn deliver_traceback(&mut self, player: Obj, conn_id: Option<i64>, exception: &Exception) {
        let lines = VMExecState::format_backtrace_lines(exception);
        let target = self
            .conns
            .resolve(player)
            .or(conn_id)
            .filter(|c| self.conns.get(*c).is_some());
        match target {
            Some(conn) => {
                for line in &lines {
                    self.conns.push_output(conn, line.as_bytes().to_vec());
                }
                self.conns.flush(conn);
            }
            None => {
                for line in &lines {
                    error!("traceback: {line}");
                }
            }
        }
    }

    // ---- cycle end ----

    fn end_of_cycle(&mut self) {
        // Booted connections go away at task boundaries.
        let booted: Vec<i64> = self
            .conns
            .ids()
            .into_iter()
            .filter(|id| {
                self.conns
                    .get(*id)
                    .map(|c| c.booted)
                    .unwrap_or(false)
            })
            .collect();
        for conn_id in booted {
            if let Some(player) = self.conns.get(conn_id).and_then(|c| c.player) {
                self.run_hook(player, Some(conn_id), "user_disconnected", vec![v_obj(player)]);
            }
            self.conns.flush(conn_id);
            if let Some(conn) = self.conns.get(conn_id) {
                let _ = conn.outbound.send(ConnectionOut::Disconnect);
            }
            self.conns.remove(conn_id);
        }

        self.conns.flush_all();
        self.world.reap_anonymous();

        if self.server.checkpoint_requested || Instant::now() >= self.next_checkpoint {
            self.server.checkpoint_requested = false;
            self.next_checkpoint =
                Instant::now() + Duration::from_secs(self.config.dump_interval);
            self.checkpoint();
        }
    }

    // ---- direct evaluation (CLI inspection, tests) ----

    /// Compile and synchronously evaluate `source` with the given player and
    /// permissions. Forked tasks land in the queues; exceptions come back
    /// with their captured stacks.
    pub fn eval(
        &mut self,
        player: Obj,
        perms: Obj,
        source: &str,
    ) -> Result<Var, EvalError> {
        let program = compile(source).map_err(EvalError::Compile)?;
        let activation = Activation::for_eval(program, player, perms);
        let task_id = self.tasks.allocate_task_id();
        let mut meta = TaskMeta::new(task_id, player, &self.config, false);
        let mut ctx = VmContext {
            world: &mut self.world,
            tasks: &mut self.tasks,
            conns: &mut self.conns,
            config: &mut self.config,
            server: &mut self.server,
            builtins: &self.builtins,
            meta: &mut meta,
        };
        run_nested(activation, &mut ctx).map_err(EvalError::Exception)
    }

    /// Drive queued tasks until the ready queue and due timers are empty.
    /// Test and CLI convenience; the real loop is `run`.
    pub fn run_until_quiet(&mut self) {
        for _ in 0..10_000 {
            self.tasks.drain_due(Instant::now());
            let Some(id) = self.tasks.next_ready() else {
                break;
            };
            if let Some(task) = self.tasks.take(id) {
                self.run_one(task);
            }
        }
        self.end_of_cycle();
    }

    /// Write the textdump: `<db>.new`, fsync, atomic rename, with the
    /// checkpoint hooks fired around it.
    pub fn checkpoint(&mut self) {
        info!("checkpoint starting");
        let wizard = self.any_wizard();
        self.run_hook(wizard, None, "checkpoint_started", vec![]);
        let ok = self.write_dump().is_ok();
        if !ok {
            error!("checkpoint failed");
        } else {
            info!("checkpoint finished");
        }
        self.run_hook(
            wizard,
            None,
            "checkpoint_finished",
            vec![barn_var::v_bool_int(ok)],
        );
    }

    fn write_dump(&self) -> std::io::Result<()> {
        let td = textdump_from_store(&self.world);
        let new_path = self.server.db_path.with_extension("new");
        {
            let file = std::fs::File::create(&new_path)?;
            let mut writer = std::io::BufWriter::new(&file);
            TextdumpWriter::new(&mut writer).write_textdump(&td)?;
            writer.flush()?;
            file.sync_all()?;
        }
        std::fs::rename(&new_path, &self.server.db_path)?;
        Ok(())
    }

    fn any_wizard(&self) -> Obj {
        self.world
            .all_objects()
            .into_iter()
            .find(|o| {
                self.world
                    .get(*o)
                    .map(|obj| obj.flags.contains(ObjFlag::Wizard))
                    .unwrap_or(false)
            })
            .unwrap_or(SYSTEM_OBJECT)
    }
}
