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

//! End-to-end semantics: compile MOO source, run it through the VM against a
//! small world, and check what comes out.

use barn_compiler::compile;
use barn_db::model::{ObjFlag, VerbArgsSpec, VerbFlag, VerbFlags};
use barn_db::store::Verb;
use barn_db::{ObjPtr, ObjectStore};
use barn_kernel::{EvalError, Scheduler, TaskState};
use barn_var::{
    v_err, v_float, v_int, v_list, v_obj, v_objid, v_str, ErrorCode, Obj, Var, Variant,
};
use pretty_assertions::assert_eq;

/// A tiny world: #0 system object, #1 root, #2 wizard player.
fn test_world() -> (ObjectStore, Obj) {
    let mut store = ObjectStore::new();
    let sys = store.create(vec![], Obj(0)).unwrap();
    assert_eq!(sys.0, 0);
    let root = store.create(vec![], Obj(2)).unwrap();
    assert_eq!(root.0, 1);
    let wizard = store.create(vec![root], Obj(2)).unwrap();
    assert_eq!(wizard.0, 2);
    {
        let w = store.get_mut(wizard).unwrap();
        w.name = "Wizard".into();
        w.flags.set(ObjFlag::User);
        w.flags.set(ObjFlag::Wizard);
        w.flags.set(ObjFlag::Programmer);
    }
    (store, wizard)
}

fn add_verb(store: &mut ObjectStore, obj: Obj, names: &str, source: &str) {
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
                args: VerbArgsSpec::this_none_this(),
                source: source.to_string(),
                program: Some(compile(source).unwrap()),
            },
        )
        .unwrap();
}

fn scheduler_with(store: ObjectStore) -> Scheduler {
    let (scheduler, _tx) = Scheduler::new(store, std::path::PathBuf::from("/tmp/test.db"));
    scheduler
}

fn eval_ok(scheduler: &mut Scheduler, source: &str) -> Var {
    match scheduler.eval(Obj(2), Obj(2), source) {
        Ok(v) => v,
        Err(EvalError::Compile(e)) => panic!("compile failed for {source:?}: {e}"),
        Err(EvalError::Exception(e)) => {
            panic!("unexpected exception for {source:?}: {:?} {}", e.code, e.msg)
        }
    }
}

fn eval_err(scheduler: &mut Scheduler, source: &str) -> barn_kernel::Exception {
    match scheduler.eval(Obj(2), Obj(2), source) {
        Ok(v) => panic!("expected exception for {source:?}, got {v:?}"),
        Err(EvalError::Exception(e)) => *e,
        Err(EvalError::Compile(e)) => panic!("compile failed for {source:?}: {e}"),
    }
}

fn fresh() -> Scheduler {
    let (store, _) = test_world();
    scheduler_with(store)
}

// ---- arithmetic & comparison (spec scenarios 1-2) ----

#[test]
fn arithmetic_and_type_strictness() {
    let mut s = fresh();
    assert_eq!(eval_ok(&mut s, "return 1 + 2;"), v_int(3));
    assert_eq!(eval_ok(&mut s, "return 1 == 1.0;"), v_int(0));
    let e = eval_err(&mut s, "return 1 < 1.0;");
    assert_eq!(e.code.err_type, ErrorCode::E_TYPE);
}

#[test]
fn division_by_zero_traceback() {
    let mut s = fresh();
    let e = eval_err(&mut s, "return 1/0;");
    assert_eq!(e.code.err_type, ErrorCode::E_DIV);
    assert_eq!(e.msg, "Division by zero");
    // The traceback has one line per frame plus the end marker.
    assert_eq!(e.backtrace.len(), e.stack.len() + 1);
}

#[test]
fn modulus_and_division_semantics() {
    let mut s = fresh();
    assert_eq!(eval_ok(&mut s, "return -7 % 3;"), v_int(2));
    assert_eq!(eval_ok(&mut s, "return 7 / -2;"), v_int(-3));
    assert_eq!(eval_ok(&mut s, "return -2 ^ 2;"), v_int(-4));
    assert_eq!(eval_ok(&mut s, "return 2 ^ 10;"), v_int(1024));
}

#[test]
fn bitwise_operators() {
    let mut s = fresh();
    assert_eq!(eval_ok(&mut s, "return 6 &. 3;"), v_int(2));
    assert_eq!(eval_ok(&mut s, "return 6 |. 3;"), v_int(7));
    assert_eq!(eval_ok(&mut s, "return 6 ^. 3;"), v_int(5));
    assert_eq!(eval_ok(&mut s, "return 1 << 4;"), v_int(16));
    assert_eq!(eval_ok(&mut s, "return -8 >> 1;"), v_int(-4));
    assert_eq!(eval_ok(&mut s, "return ~0;"), v_int(-1));
}

#[test]
fn logical_operators_return_operands() {
    let mut s = fresh();
    assert_eq!(eval_ok(&mut s, "return 0 || \"x\";"), v_str("x"));
    assert_eq!(eval_ok(&mut s, "return 5 && 7;"), v_int(7));
    assert_eq!(eval_ok(&mut s, "return 0 && 1/0;"), v_int(0));
    assert_eq!(eval_ok(&mut s, "return 1 ? 2 | 3;"), v_int(2));
}

// ---- strings ----

#[test]
fn strings_are_byte_sequences() {
    let mut s = fresh();
    assert_eq!(eval_ok(&mut s, "return length(\"日\");"), v_int(3));
    assert_eq!(eval_ok(&mut s, "return length(\"abc\");"), v_int(3));
    assert_eq!(eval_ok(&mut s, "return \"abc\"[2];"), v_str("b"));
    assert_eq!(eval_ok(&mut s, "return \"abcdef\"[2..4];"), v_str("bcd"));
    assert_eq!(eval_ok(&mut s, "return \"abc\"[$];"), v_str("c"));
    assert_eq!(eval_ok(&mut s, "return \"Foo\" == \"foo\";"), v_int(1));
    assert_eq!(eval_ok(&mut s, "return equal(\"Foo\", \"foo\");"), v_int(0));
    assert_eq!(eval_ok(&mut s, "return \"foo\" + \"bar\";"), v_str("foobar"));
}

#[test]
fn string_hash_defaults_to_sha256() {
    let mut s = fresh();
    assert_eq!(
        eval_ok(&mut s, "return string_hash(\"hello\");"),
        v_str("2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824")
    );
    assert_eq!(
        eval_ok(&mut s, "return string_hash(\"hello\", \"MD5\");"),
        v_str("5D41402ABC4B2A76B9719D911017C592")
    );
}

#[test]
fn moo_pattern_matching() {
    let mut s = fresh();
    let r = eval_ok(&mut s, "return match(\"foobar\", \"o*b\");");
    let Variant::List(l) = r.variant() else { panic!() };
    assert_eq!(l.index(1).unwrap(), v_int(2));
    assert_eq!(l.index(2).unwrap(), v_int(4));

    assert_eq!(
        eval_ok(&mut s, "return match(\"abc\", \"x\");"),
        v_list(&[])
    );

    let r = eval_ok(
        &mut s,
        "return substitute(\"%1 loves %2\", match(\"cats dogs\", \"%(%w+%) %(%w+%)\"));",
    );
    assert_eq!(r, v_str("cats loves dogs"));
}

// ---- lists, maps, scatter (spec scenario 3) ----

#[test]
fn map_semantics() {
    let mut s = fresh();
    assert_eq!(
        eval_ok(&mut s, "m = [\"a\" -> 1]; return m[\"a\"];"),
        v_int(1)
    );
    let e = eval_err(&mut s, "m = [\"a\" -> 1]; return m[\"b\"];");
    assert_eq!(e.code.err_type, ErrorCode::E_RANGE);

    // Canonical key order: INT < OBJ < ERR < FLOAT < STR.
    assert_eq!(
        eval_ok(
            &mut s,
            "return mapkeys([1 -> \"\", #0 -> \"\", E_NONE -> \"\", 2.5 -> \"\", \"a\" -> \"\"]);"
        ),
        v_list(&[
            v_int(1),
            v_objid(0),
            v_err(ErrorCode::E_NONE),
            v_float(2.5),
            v_str("a")
        ])
    );

    assert_eq!(
        eval_ok(&mut s, "return maphaskey([\"a\" -> 1], \"a\");"),
        v_int(1)
    );
    let e = eval_err(&mut s, "return mapdelete([\"a\" -> 1], \"b\");");
    assert_eq!(e.code.err_type, ErrorCode::E_RANGE);

    let e = eval_err(&mut s, "return [{1} -> 2];");
    assert_eq!(e.code.err_type, ErrorCode::E_TYPE);
}

#[test]
fn list_builtins() {
    let mut s = fresh();
    assert_eq!(
        eval_ok(&mut s, "return listappend({1, 2}, 3);"),
        v_list(&[v_int(1), v_int(2), v_int(3)])
    );
    assert_eq!(
        eval_ok(&mut s, "return listinsert({1, 2}, 0);"),
        v_list(&[v_int(0), v_int(1), v_int(2)])
    );
    assert_eq!(
        eval_ok(&mut s, "return setadd({1, 2}, 2);"),
        v_list(&[v_int(1), v_int(2)])
    );
    assert_eq!(
        eval_ok(&mut s, "return setremove({1, 2}, 1);"),
        v_list(&[v_int(2)])
    );
    assert_eq!(eval_ok(&mut s, "return 2 in {1, 2, 3};"), v_int(2));
    assert_eq!(
        eval_ok(&mut s, "l = {1, 2, 3}; l[2..3] = {9}; return l;"),
        v_list(&[v_int(1), v_int(9)])
    );
    assert_eq!(
        eval_ok(&mut s, "return {1, @{2, 3}, 4};"),
        v_list(&[v_int(1), v_int(2), v_int(3), v_int(4)])
    );
}

#[test]
fn scatter_assignment() {
    let mut s = fresh();
    assert_eq!(
        eval_ok(&mut s, "{a, ?b = 5, @c} = {1}; return {a, b, c};"),
        v_list(&[v_int(1), v_int(5), v_list(&[])])
    );
    assert_eq!(
        eval_ok(
            &mut s,
            "{a, ?b = 5, @c} = {1, 2, 3, 4}; return {a, b, c};"
        ),
        v_list(&[v_int(1), v_int(2), v_list(&[v_int(3), v_int(4)])])
    );
    // Overflow without a rest target is E_ARGS.
    let e = eval_err(&mut s, "{a, b} = {1, 2, 3}; return a;");
    assert_eq!(e.code.err_type, ErrorCode::E_ARGS);
    let e = eval_err(&mut s, "{a, b} = {1}; return a;");
    assert_eq!(e.code.err_type, ErrorCode::E_ARGS);
}

// ---- control flow ----

#[test]
fn loops_and_breaks() {
    let mut s = fresh();
    assert_eq!(
        eval_ok(
            &mut s,
            "x = 0; for i in [1..10] x = x + i; endfor return x;"
        ),
        v_int(55)
    );
    assert_eq!(
        eval_ok(
            &mut s,
            "x = 0; for i in ({1, 2, 3}) x = x + i; endfor return x;"
        ),
        v_int(6)
    );
    assert_eq!(
        eval_ok(
            &mut s,
            "x = 0; while (1) x = x + 1; if (x > 4) break; endif endwhile return x;"
        ),
        v_int(5)
    );
    assert_eq!(
        eval_ok(
            &mut s,
            "x = 0; for i in [1..5] if (i % 2) continue; endif x = x + i; endfor return x;"
        ),
        v_int(6)
    );
    // Two-variable iteration over a map: key then value.
    assert_eq!(
        eval_ok(
            &mut s,
            "r = {}; for k, v in ([\"a\" -> 1, \"b\" -> 2]) r = {@r, k, v}; endfor return r;"
        ),
        v_list(&[v_str("a"), v_int(1), v_str("b"), v_int(2)])
    );
}

#[test]
fn try_except_finally() {
    let mut s = fresh();
    assert_eq!(
        eval_ok(
            &mut s,
            "try return 1/0; except e (E_DIV) return e[1]; endtry"
        ),
        v_err(ErrorCode::E_DIV)
    );
    // The bound exception is {code, message, value, traceback}.
    assert_eq!(
        eval_ok(
            &mut s,
            "try raise(E_PERM, \"nope\", 42); except e (ANY) return {e[1], e[2], e[3]}; endtry"
        ),
        v_list(&[v_err(ErrorCode::E_PERM), v_str("nope"), v_int(42)])
    );
    // Non-matching codes propagate.
    let e = eval_err(
        &mut s,
        "try return 1/0; except e (E_PERM) return 0; endtry",
    );
    assert_eq!(e.code.err_type, ErrorCode::E_DIV);

    // finally runs on both paths, and return inside try runs it first.
    assert_eq!(
        eval_ok(
            &mut s,
            "x = 0; try x = 1; finally x = x + 10; endtry return x;"
        ),
        v_int(11)
    );
    let e = eval_err(
        &mut s,
        "try return 1/0; finally notify(player, \"cleanup\"); endtry",
    );
    assert_eq!(e.code.err_type, ErrorCode::E_DIV);
}

#[test]
fn catch_expressions() {
    let mut s = fresh();
    assert_eq!(
        eval_ok(&mut s, "return `1/0 ! ANY';"),
        v_err(ErrorCode::E_DIV)
    );
    assert_eq!(
        eval_ok(&mut s, "return `1/0 ! E_DIV => 17';"),
        v_int(17)
    );
    assert_eq!(eval_ok(&mut s, "return `1 + 1 ! ANY';"), v_int(2));
    let e = eval_err(&mut s, "return `1/0 ! E_PERM => 17';");
    assert_eq!(e.code.err_type, ErrorCode::E_DIV);
}

// ---- verbs, dispatch, pass, tracebacks (spec scenario 5) ----

#[test]
fn verb_dispatch_and_inheritance() {
    let (mut store, _) = test_world();
    add_verb(&mut store, Obj(1), "greet", "return \"hi from \" + tostr(this);");
    let kid = store.create(vec![Obj(1)], Obj(2)).unwrap();
    let mut s = scheduler_with(store);
    // Inherited dispatch: `this` is the receiver, not the definer.
    assert_eq!(
        eval_ok(&mut s, &format!("return {kid}:greet();")),
        v_str(&format!("hi from {kid}"))
    );
}

#[test]
fn pass_resolves_from_verb_location_parent() {
    let (mut store, _) = test_world();
    add_verb(&mut store, Obj(1), "describe", "return \"base\";");
    let kid = store.create(vec![Obj(1)], Obj(2)).unwrap();
    add_verb(&mut store, kid, "describe", "return pass() + \"+kid\";");
    let grandkid = store.create(vec![kid], Obj(2)).unwrap();
    let mut s = scheduler_with(store);
    // Called on the grandkid, the kid's verb runs; pass() must consult the
    // *verb location's* parent (root), not the receiver's parent (kid) —
    // otherwise this recurses forever.
    assert_eq!(
        eval_ok(&mut s, &format!("return {grandkid}:describe();")),
        v_str("base+kid")
    );
}

#[test]
fn traceback_reports_verb_locations_not_receivers() {
    let (mut store, _) = test_world();
    let a = store.create(vec![], Obj(2)).unwrap();
    let b = store.create(vec![], Obj(2)).unwrap();
    let c = store.create(vec![], Obj(2)).unwrap();
    add_verb(&mut store, a, "f", &format!("return {b}:g();"));
    add_verb(&mut store, b, "g", &format!("return {c}:h();"));
    add_verb(&mut store, c, "h", "return 1/0;");
    let mut s = scheduler_with(store);
    let e = eval_err(&mut s, &format!("return {a}:f();"));
    assert_eq!(e.code.err_type, ErrorCode::E_DIV);

    let lines: Vec<String> = e
        .backtrace
        .iter()
        .map(|v| match v.variant() {
            Variant::Str(s) => s.to_text().into_owned(),
            _ => String::new(),
        })
        .collect();
    // Frames from the raise site out: c:h, called from b:g, called from a:f.
    assert!(lines[0].starts_with(&format!("{c}:h")), "{lines:?}");
    assert!(lines[1].contains(&format!("... called from {b}:g")), "{lines:?}");
    assert!(lines[2].contains(&format!("... called from {a}:f")), "{lines:?}");
    assert_eq!(lines.last().unwrap(), "(End of traceback)");
    // One stack entry per live frame at the throw: h, g, f, eval.
    assert_eq!(e.stack.len(), 4);
}

#[test]
fn verb_wildcards_match_spec_style() {
    let (mut store, _) = test_world();
    add_verb(&mut store, Obj(1), "foo*bar", "return \"matched\";");
    let mut s = scheduler_with(store);
    assert_eq!(eval_ok(&mut s, "return #1:foobar();"), v_str("matched"));
    assert_eq!(eval_ok(&mut s, "return #1:fooXXbar();"), v_str("matched"));
    let e = eval_err(&mut s, "return #1:fooba();");
    assert_eq!(e.code.err_type, ErrorCode::E_VERBNF);
}

#[test]
fn primitive_prototype_dispatch_binds_primitive_this() {
    let (mut store, _) = test_world();
    // $str_proto with a verb observing `this`.
    let proto = store.create(vec![], Obj(2)).unwrap();
    add_verb(&mut store, proto, "reverse", "return {typeof(this), this};");
    store
        .add_property(
            Obj(0),
            barn_var::Symbol::mk("str_proto"),
            v_obj(proto),
            Obj(2),
            barn_db::model::PropFlags::new(),
        )
        .unwrap();
    let mut s = scheduler_with(store);
    assert_eq!(
        eval_ok(&mut s, "return \"abc\":reverse();"),
        v_list(&[v_int(2), v_str("abc")])
    );
}

// ---- objects, anon, waifs (spec scenario 6) ----

#[test]
fn anonymous_objects() {
    let mut s = fresh();
    assert_eq!(
        eval_ok(&mut s, "v = create(#1, 1); return {typeof(v), valid(v)};"),
        v_list(&[v_int(12), v_int(0)])
    );
    // Anonymous objects inherit properties and verbs through their parents.
    let (mut store, _) = test_world();
    store
        .add_property(
            Obj(1),
            barn_var::Symbol::mk("hp"),
            v_int(10),
            Obj(2),
            barn_db::model::PropFlags::new(),
        )
        .unwrap();
    let mut s = scheduler_with(store);
    assert_eq!(
        eval_ok(&mut s, "v = create(#1, 1); return v.hp;"),
        v_int(10)
    );
    // Not listed by objects().
    assert_eq!(
        eval_ok(&mut s, "n = length(objects()); v = create(#1, 1); return length(objects()) - n;"),
        v_int(0)
    );
}

#[test]
fn waif_lifecycle() {
    let (mut store, _) = test_world();
    let class = store.create(vec![Obj(1)], Obj(2)).unwrap();
    store
        .add_property(
            class,
            barn_var::Symbol::mk("hp"),
            v_int(100),
            Obj(2),
            barn_db::model::PropFlags::new(),
        )
        .unwrap();
    add_verb(&mut store, class, "make", "return new_waif();");
    store
        .add_property(
            Obj(0),
            barn_var::Symbol::mk("holder"),
            v_int(0),
            Obj(2),
            barn_db::model::PropFlags::new(),
        )
        .unwrap();
    let mut s = scheduler_with(store);

    assert_eq!(
        eval_ok(
            &mut s,
            &format!("w = {class}:make(); return {{typeof(w), w.class, w.owner, valid(w)}};")
        ),
        v_list(&[v_int(13), v_obj(class), v_objid(2), v_int(0)])
    );
    // Reads fall through to the class; writes stick to the instance, with
    // reference semantics across copies.
    assert_eq!(
        eval_ok(
            &mut s,
            &format!("w = {class}:make(); x = w.hp; w.hp = 3; return {{x, w.hp}};")
        ),
        v_list(&[v_int(100), v_int(3)])
    );
    assert_eq!(
        eval_ok(
            &mut s,
            &format!("w = {class}:make(); w2 = w; w.hp = 7; return w2.hp;")
        ),
        v_int(7)
    );
    // Protected properties refuse writes.
    let e = eval_err(
        &mut s,
        &format!("w = {class}:make(); w.owner = #2; return 0;"),
    );
    assert_eq!(e.code.err_type, ErrorCode::E_PERM);
    // Storing the waif into itself is a recursive-move error.
    let e = eval_err(
        &mut s,
        &format!("w = {class}:make(); w.hp = {{w}}; return 0;"),
    );
    assert_eq!(e.code.err_type, ErrorCode::E_RECMOVE);
    // Recycling the class makes `.class` read as #-1.
    assert_eq!(
        eval_ok(
            &mut s,
            &format!(
                "#0.holder = {class}:make(); recycle({class}); return #0.holder.class;"
            )
        ),
        v_objid(-1)
    );
}

#[test]
fn object_lifecycle_and_movement() {
    let mut s = fresh();
    assert_eq!(
        eval_ok(
            &mut s,
            "o = create(#1); move(o, #2); return {o.location, o in #2.contents};"
        ),
        v_list(&[v_objid(2), v_int(1)])
    );
    let e = eval_err(
        &mut s,
        "a = create(#1); b = create(#1); move(b, a); move(a, b); return 0;",
    );
    assert_eq!(e.code.err_type, ErrorCode::E_RECMOVE);
    let e = eval_err(&mut s, "return chparents(#1, {create(#1)});");
    assert_eq!(e.code.err_type, ErrorCode::E_RECMOVE);
}

// ---- tasks: fork, suspend, resume (spec scenario 4) ----

#[test]
fn fork_binds_task_id_in_both_frames() {
    let mut s = fresh();
    let v = eval_ok(&mut s, "fork t (1000) x = t; endfork return t;");
    let Variant::Int(task_id) = v.variant() else {
        panic!("fork variable was not a task id: {v:?}")
    };
    let task_id = *task_id;
    assert!(task_id > 0);
    // The child sits in the queues until its delay expires.
    assert!(s.tasks.tasks.contains_key(&task_id));
    assert_eq!(
        s.tasks.tasks[&task_id].meta.state,
        TaskState::Suspended
    );
}

#[test]
fn queued_tasks_and_resume() {
    let mut s = fresh();
    let v = eval_ok(&mut s, "fork t (1000) suspend(1000); endfork return t;");
    let Variant::Int(forked) = v.variant() else { panic!() };
    let forked = *forked;

    // queued_tasks() sees the forked task.
    let queued = eval_ok(&mut s, "return queued_tasks();");
    let Variant::List(entries) = queued.variant() else { panic!() };
    assert_eq!(entries.len(), 1);
    let Variant::List(entry) = entries.index(1).unwrap().variant().clone() else {
        panic!()
    };
    assert_eq!(entry.index(1).unwrap(), v_int(forked));

    // resume() wakes it early; it then parks again in suspend(1000).
    eval_ok(&mut s, &format!("return resume({forked});"));
    s.run_until_quiet();
    assert!(s.tasks.tasks.contains_key(&forked));
    assert_eq!(s.tasks.tasks[&forked].meta.state, TaskState::Suspended);

    // A second resume carries a wake value; nothing observable beyond
    // completion here, but the task must now be gone.
    eval_ok(&mut s, &format!("return resume({forked}, 42);"));
    s.run_until_quiet();
    assert!(!s.tasks.tasks.contains_key(&forked));
}

#[test]
fn kill_task_removes_queued_task() {
    let mut s = fresh();
    let v = eval_ok(&mut s, "fork t (1000) return 1; endfork return t;");
    let Variant::Int(forked) = v.variant() else { panic!() };
    let forked = *forked;
    assert_eq!(
        eval_ok(&mut s, &format!("return kill_task({forked});")),
        v_int(0)
    );
    assert!(!s.tasks.tasks.contains_key(&forked));
    let e = eval_err(&mut s, &format!("return kill_task({forked});"));
    assert_eq!(e.code.err_type, ErrorCode::E_INVARG);
}

#[test]
fn tick_quota_aborts_runaway_tasks() {
    let mut s = fresh();
    s.config.fg_ticks = 10_000;
    let e = eval_err(&mut s, "while (1) endwhile");
    assert_eq!(e.code.err_type, ErrorCode::E_QUOTA);
}

#[test]
fn caller_perms_sees_the_calling_frame() {
    let (mut store, _) = test_world();
    add_verb(&mut store, Obj(1), "whoami", "return caller_perms();");
    let mut s = scheduler_with(store);
    // Called from the eval frame (programmer #2), caller_perms is #2.
    assert_eq!(eval_ok(&mut s, "return #1:whoami();"), v_objid(2));
    // At the top frame there is no caller.
    assert_eq!(eval_ok(&mut s, "return caller_perms();"), v_objid(-1));
}

// ---- values & conversions ----

#[test]
fn conversions() {
    let mut s = fresh();
    assert_eq!(eval_ok(&mut s, "return toint(\"gibberish\");"), v_int(0));
    assert_eq!(eval_ok(&mut s, "return toint(\"12\");"), v_int(12));
    assert_eq!(eval_ok(&mut s, "return toobj(\"gibberish\");"), v_objid(0));
    assert_eq!(eval_ok(&mut s, "return toobj(\"#2\");"), v_objid(2));
    let e = eval_err(&mut s, "return tofloat(\"gibberish\");");
    assert_eq!(e.code.err_type, ErrorCode::E_INVARG);
    assert_eq!(eval_ok(&mut s, "return tonum(3.7);"), v_int(3));
    assert_eq!(eval_ok(&mut s, "return typeof(1.5);"), v_int(9));
    assert_eq!(eval_ok(&mut s, "return typeof([]);"), v_int(10));
}

#[test]
fn toliteral_parses_back() {
    let mut s = fresh();
    assert_eq!(
        eval_ok(
            &mut s,
            "x = {1, \"two\", 3.5, #4, E_PERM, [1 -> {2}]}; return equal(eval(\"return \" + toliteral(x) + \";\")[2], x);"
        ),
        v_int(1)
    );
}

#[test]
fn ctime_shape() {
    let mut s = fresh();
    let v = eval_ok(&mut s, "return ctime(0);");
    let Variant::Str(text) = v.variant() else { panic!() };
    let text = text.to_text().into_owned();
    // "Thu Jan  1 00:00:00 1970" (in some local zone): fixed-width fields,
    // space-padded day, no timezone suffix.
    assert_eq!(text.len(), 24, "{text:?}");
    assert!(text.ends_with("1969") || text.ends_with("1970"), "{text:?}");
    let day = &text[8..10];
    assert!(day.starts_with(' ') || day.chars().all(|c| c.is_ascii_digit()));
}

#[test]
fn verb_programming_builtins() {
    let mut s = fresh();
    assert_eq!(
        eval_ok(
            &mut s,
            "o = create(#1); add_verb(o, {player, \"rxd\", \"ping\"}, {\"this\", \"none\", \"this\"}); \
             set_verb_code(o, \"ping\", {\"return 99;\"}); return o:ping();"
        ),
        v_int(99)
    );
    // A compile failure reports error strings instead of programming.
    let v = eval_ok(
        &mut s,
        "o = create(#1); add_verb(o, {player, \"rxd\", \"bad\"}, {\"this\", \"none\", \"this\"}); \
         return length(set_verb_code(o, \"bad\", {\"return ;;;\"})) > 0;",
    );
    assert_eq!(v, v_int(1));
    // disassemble produces the well-known opcode names.
    let v = eval_ok(
        &mut s,
        "o = create(#1); add_verb(o, {player, \"rxd\", \"sum\"}, {\"this\", \"none\", \"this\"}); \
         set_verb_code(o, \"sum\", {\"return 1 + 2;\"}); return disassemble(o, \"sum\");",
    );
    let Variant::List(lines) = v.variant() else { panic!() };
    let joined: Vec<String> = lines
        .iter()
        .map(|l| match l.variant() {
            Variant::Str(s) => s.to_text().into_owned(),
            _ => String::new(),
        })
        .collect();
    assert!(joined.iter().any(|l| l.contains("ADD")), "{joined:?}");
}

#[test]
fn property_builtins() {
    let mut s = fresh();
    assert_eq!(
        eval_ok(
            &mut s,
            "o = create(#1); add_property(o, \"color\", \"red\", {player, \"rw\"}); return o.color;"
        ),
        v_str("red")
    );
    let e = eval_err(
        &mut s,
        "o = create(#1); add_property(o, \"color\", 1, {player, \"r\"}); \
         add_property(o, \"color\", 2, {player, \"r\"}); return 0;",
    );
    assert_eq!(e.code.err_type, ErrorCode::E_INVARG);
    assert_eq!(
        eval_ok(
            &mut s,
            "o = create(#1); add_property(o, \"p\", 1, {player, \"rc\"}); \
             k = create(o); clear_property(k, \"p\"); return {is_clear_property(k, \"p\"), k.p};"
        ),
        v_list(&[v_int(1), v_int(1)])
    );
}

#[test]
fn set_task_perms_requires_privilege() {
    let (mut store, _) = test_world();
    // A non-wizard, non-programmer player.
    let peon = store.create(vec![Obj(1)], Obj(2)).unwrap();
    {
        let p = store.get_mut(peon).unwrap();
        p.flags.set(ObjFlag::User);
    }
    let mut s = scheduler_with(store);
    // Wizard can drop perms...
    assert_eq!(
        eval_ok(&mut s, &format!("set_task_perms({peon}); return 1;")),
        v_int(1)
    );
    // ...and a non-wizard context cannot take them back up.
    let e = eval_err(
        &mut s,
        &format!("set_task_perms({peon}); set_task_perms(#2); return 0;"),
    );
    assert_eq!(e.code.err_type, ErrorCode::E_PERM);
}
