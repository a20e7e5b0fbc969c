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

//! Connection lifecycle and command dispatch, driven through the scheduler
//! with in-process channels standing in for sockets.

use barn_compiler::compile;
use barn_db::model::{ArgSpec, ObjFlag, PrepSpec, VerbArgsSpec, VerbFlag, VerbFlags};
use barn_db::store::Verb;
use barn_db::{ObjPtr, ObjectStore};
use barn_kernel::{ConnectionOut, Scheduler};
use barn_var::Obj;

struct FakeConn {
    id: i64,
    rx: flume::Receiver<ConnectionOut>,
}

impl FakeConn {
    fn lines(&self) -> Vec<String> {
        let mut out = vec![];
        while let Ok(msg) = self.rx.try_recv() {
            if let ConnectionOut::Line(bytes) = msg {
                out.push(String::from_utf8_lossy(&bytes).into_owned());
            }
        }
        out
    }

    fn disconnected(&self) -> bool {
        self.rx
            .try_iter()
            .any(|m| matches!(m, ConnectionOut::Disconnect))
    }
}

fn connect(scheduler: &mut Scheduler) -> FakeConn {
    let (tx, rx) = flume::unbounded();
    let id = scheduler
        .conns
        .register("port 7777 from test".to_string(), tx);
    FakeConn { id, rx }
}

fn send_line(scheduler: &mut Scheduler, conn: &FakeConn, line: &str) {
    scheduler.submit_line(conn.id, line);
}

fn add_verb_to(store: &mut ObjectStore, obj: Obj, names: &str, args: VerbArgsSpec, source: &str) {
    let mut flags = VerbFlags::new_with(VerbFlag::Read);
    flags.set(VerbFlag::Exec);
    flags.set(VerbFlag::Debug);
    store
        .add_verb(
            ObjPtr::Num(obj),
            Verb {
                names: names.to_string(),
                owner: Obj(2),
                flags,
                args,
                source: source.to_string(),
                program: Some(compile(source).unwrap()),
            },
        )
        .unwrap();
}

/// #0 with login/connection hooks, #1 a room, #2 a wizard player with a
/// `look` command verb.
fn login_world() -> Scheduler {
    let mut store = ObjectStore::new();
    let sys = store.create(vec![], Obj(2)).unwrap();
    let room = store.create(vec![], Obj(2)).unwrap();
    let wizard = store.create(vec![], Obj(2)).unwrap();
    assert_eq!((sys.0, room.0, wizard.0), (0, 1, 2));
    {
        let w = store.get_mut(wizard).unwrap();
        w.name = "Wizard".into();
        w.flags.set(ObjFlag::User);
        w.flags.set(ObjFlag::Wizard);
        w.flags.set(ObjFlag::Programmer);
    }
    store.move_object(wizard, room).unwrap();

    add_verb_to(
        &mut store,
        sys,
        "do_login_command",
        VerbArgsSpec::this_none_this(),
        // `connect` logs in as the wizard; everything else is refused.
        "if (length(args) >= 2 && args[2] == \"connect\")\n  return #2;\nendif\nnotify(toobj(args[1]), \"Bad login.\");\nreturn 0;\n",
    );
    add_verb_to(
        &mut store,
        sys,
        "user_connected",
        VerbArgsSpec::this_none_this(),
        "notify(args[1], \"*** Connected ***\");",
    );
    add_verb_to(
        &mut store,
        sys,
        "user_reconnected",
        VerbArgsSpec::this_none_this(),
        "notify(args[1], \"*** Reconnected ***\");",
    );
    add_verb_to(
        &mut store,
        sys,
        "user_disconnected",
        VerbArgsSpec::this_none_this(),
        "server_log(\"user_disconnected fired\");",
    );
    add_verb_to(
        &mut store,
        room,
        "look l*ook",
        VerbArgsSpec {
            dobj: ArgSpec::None,
            prep: PrepSpec::None,
            iobj: ArgSpec::None,
        },
        "notify(player, \"You see a test room.\");",
    );

    let (scheduler, _tx) = Scheduler::new(store, std::path::PathBuf::from("/tmp/sched-test.db"));
    scheduler
}

#[test]
fn login_fsm_connect_and_command() {
    let mut s = login_world();
    let conn = connect(&mut s);

    // Pre-auth gibberish is refused by do_login_command.
    send_line(&mut s, &conn, "frobnicate");
    let lines = conn.lines();
    assert!(
        lines.iter().any(|l| l.contains("Bad login.")),
        "{lines:?}"
    );

    // `connect` authenticates and fires user_connected exactly once.
    send_line(&mut s, &conn, "connect wizard");
    let lines = conn.lines();
    assert_eq!(
        lines
            .iter()
            .filter(|l| l.contains("*** Connected ***"))
            .count(),
        1,
        "{lines:?}"
    );
    assert_eq!(s.conns.for_player(Obj(2)).map(|c| c.id), Some(conn.id));

    // A command line parses and dispatches to the room verb, with output
    // flushed at the task boundary.
    send_line(&mut s, &conn, "look");
    s.run_until_quiet();
    let lines = conn.lines();
    assert!(
        lines.iter().any(|l| l.contains("You see a test room.")),
        "{lines:?}"
    );

    // The wildcard name spec matches too.
    send_line(&mut s, &conn, "lk");
    s.run_until_quiet();
    let lines = conn.lines();
    assert!(
        lines.iter().any(|l| l.contains("I couldn't understand that.")),
        "lk must not match l*ook under prefix+suffix rules: {lines:?}"
    );
    send_line(&mut s, &conn, "loook");
    s.run_until_quiet();
    let lines = conn.lines();
    assert!(
        lines.iter().any(|l| l.contains("You see a test room.")),
        "{lines:?}"
    );
}

#[test]
fn reconnect_displaces_old_connection() {
    let mut s = login_world();
    let first = connect(&mut s);
    send_line(&mut s, &first, "connect wizard");
    assert!(first.lines().iter().any(|l| l.contains("Connected")));

    let second = connect(&mut s);
    send_line(&mut s, &second, "connect wizard");
    let lines = second.lines();
    assert!(
        lines.iter().any(|l| l.contains("*** Reconnected ***")),
        "{lines:?}"
    );
    // The new connection owns the player; the old one is booted at the next
    // boundary.
    assert_eq!(s.conns.for_player(Obj(2)).map(|c| c.id), Some(second.id));
    s.run_until_quiet();
    assert!(first.disconnected() || s.conns.get(first.id).is_none());
}

#[test]
fn eval_command_echoes_result() {
    let mut s = login_world();
    let conn = connect(&mut s);
    send_line(&mut s, &conn, "connect wizard");
    conn.lines();

    send_line(&mut s, &conn, "; 6 * 7");
    s.run_until_quiet();
    let lines = conn.lines();
    assert!(lines.iter().any(|l| l.contains("=> 42")), "{lines:?}");
}

#[test]
fn uncaught_errors_reach_the_player_as_tracebacks() {
    let mut s = login_world();
    let conn = connect(&mut s);
    send_line(&mut s, &conn, "connect wizard");
    conn.lines();

    send_line(&mut s, &conn, "; 1/0");
    s.run_until_quiet();
    let lines = conn.lines();
    assert!(
        lines.iter().any(|l| l.contains("Division by zero")),
        "{lines:?}"
    );
    assert!(
        lines.iter().any(|l| l.contains("(End of traceback)")),
        "{lines:?}"
    );
}

#[test]
fn say_sugar_routes_to_verb() {
    let mut s = login_world();
    // A `say` verb on the room taking any dobj.
    {
        let store = &mut s.world;
        add_verb_to(
            store,
            Obj(1),
            "say",
            VerbArgsSpec {
                dobj: ArgSpec::Any,
                prep: PrepSpec::Any,
                iobj: ArgSpec::Any,
            },
            "notify(player, \"You say, \" + argstr);",
        );
    }
    let conn = connect(&mut s);
    send_line(&mut s, &conn, "connect wizard");
    conn.lines();

    send_line(&mut s, &conn, "\"hello there");
    s.run_until_quiet();
    let lines = conn.lines();
    assert!(
        lines.iter().any(|l| l.contains("You say, hello there")),
        "{lines:?}"
    );
}
