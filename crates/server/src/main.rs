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

mod listen;

use barn_db::model::ObjFlag;
use barn_db::{ObjPtr, ObjectStore, VerbDesc};
use barn_kernel::{EvalError, Scheduler, SchedulerMessage};
use barn_textdump::{load_textdump, TextdumpReader};
use barn_var::{Obj, NOTHING, SYSTEM_OBJECT};
use clap::Parser;
use eyre::{bail, eyre, WrapErr};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "barn", about = "A ToastStunt-compatible MOO server.")]
struct Args {
    /// Path to the textdump database.
    #[arg(long, default_value = "core.db")]
    db: PathBuf,

    /// TCP port to listen on.
    #[arg(long, default_value_t = 7777)]
    port: u16,

    /// Evaluate an expression against the database and exit.
    #[arg(long)]
    eval: Option<String>,

    /// Print the source of `#obj:verb` and exit.
    #[arg(long = "verb-code")]
    verb_code: Option<String>,

    /// Print a summary of `#obj` and exit.
    #[arg(long = "obj-info")]
    obj_info: Option<String>,
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let store = load_store(&args.db)?;

    if let Some(expr) = &args.eval {
        return inspect_eval(store, &args.db, expr);
    }
    if let Some(spec) = &args.verb_code {
        return inspect_verb_code(&store, spec);
    }
    if let Some(spec) = &args.obj_info {
        return inspect_obj_info(&store, spec);
    }

    serve(store, args)
}

fn load_store(path: &PathBuf) -> eyre::Result<ObjectStore> {
    let file = File::open(path)
        .wrap_err_with(|| format!("could not open database {}", path.display()))?;
    let reader = TextdumpReader::new(BufReader::new(file))?;
    let textdump = reader.read_textdump()?;
    let store = load_textdump(&textdump)?;
    info!(
        "loaded {} objects from {}",
        store.all_objects().len(),
        path.display()
    );
    Ok(store)
}

fn serve(store: ObjectStore, args: Args) -> eyre::Result<()> {
    let (mut scheduler, tx) = Scheduler::new(store, args.db.clone());

    listen::spawn_listener(args.port, tx.clone())?;

    // SIGINT/SIGTERM become a clean scheduler stop with a final checkpoint.
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let signal_tx = tx.clone();
    std::thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if signals.forever().next().is_some() {
                let _ = signal_tx.send(SchedulerMessage::Stop);
            }
        })?;

    scheduler.run();
    Ok(())
}

/// The wizard identity the inspection flags evaluate under: the first wizard
/// in the database, else #0.
fn pick_wizard(store: &ObjectStore) -> Obj {
    store
        .all_objects()
        .into_iter()
        .find(|o| {
            store
                .get(*o)
                .map(|obj| obj.flags.contains(ObjFlag::Wizard))
                .unwrap_or(false)
        })
        .unwrap_or(SYSTEM_OBJECT)
}

fn inspect_eval(store: ObjectStore, db: &PathBuf, expr: &str) -> eyre::Result<()> {
    let wizard = pick_wizard(&store);
    let (mut scheduler, _tx) = Scheduler::new(store, db.clone());
    let source = format!("return {expr};");
    let result = scheduler
        .eval(wizard, wizard, &source)
        .or_else(|_| scheduler.eval(wizard, wizard, expr));
    match result {
        Ok(v) => {
            println!("{}", barn_compiler::to_literal(&v));
            Ok(())
        }
        Err(EvalError::Compile(e)) => bail!("parse error: {e}"),
        Err(EvalError::Exception(e)) => {
            for line in barn_kernel::VMExecState::format_backtrace_lines(&e) {
                eprintln!("{line}");
            }
            bail!("{}", e.code)
        }
    }
}

/// Parse an `#obj:verb` or `#obj` spec.
fn parse_obj_spec(spec: &str) -> eyre::Result<(Obj, Option<String>)> {
    let (obj_part, verb_part) = match spec.split_once(':') {
        Some((o, v)) => (o, Some(v.to_string())),
        None => (spec, None),
    };
    let obj = Obj::parse(obj_part.trim())
        .ok_or_else(|| eyre!("malformed object reference: {obj_part}"))?;
    Ok((obj, verb_part))
}

fn inspect_verb_code(store: &ObjectStore, spec: &str) -> eyre::Result<()> {
    let (obj, verb) = parse_obj_spec(spec)?;
    let Some(verb) = verb else {
        bail!("expected #obj:verb, got {spec}");
    };
    if !store.valid(obj) {
        bail!("no such object: {obj}");
    }
    let index = store
        .verb_index(ObjPtr::Num(obj), &VerbDesc::Name(verb.clone()))
        .map_err(|_| eyre!("no such verb: {obj}:{verb}"))?;
    let verb = store.verb(ObjPtr::Num(obj), index)?;
    for line in verb.source.lines() {
        println!("{line}");
    }
    Ok(())
}

fn inspect_obj_info(store: &ObjectStore, spec: &str) -> eyre::Result<()> {
    let (obj, _) = parse_obj_spec(spec)?;
    if !store.valid(obj) {
        bail!("no such object: {obj}");
    }
    let o = store.get(obj)?;
    println!("object:     {obj}");
    println!("name:       {}", o.name);
    println!("owner:      {}", o.owner);
    println!(
        "parents:    {}",
        if o.parents.is_empty() {
            NOTHING.to_string()
        } else {
            o.parents
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }
    );
    println!("location:   {}", o.location);
    let mut flags = String::new();
    for (flag, c) in [
        (ObjFlag::User, 'u'),
        (ObjFlag::Programmer, 'p'),
        (ObjFlag::Wizard, 'w'),
        (ObjFlag::Read, 'r'),
        (ObjFlag::Write, 'W'),
        (ObjFlag::Fertile, 'f'),
    ] {
        if o.flags.contains(flag) {
            flags.push(c);
        }
    }
    println!("flags:      {flags}");
    println!(
        "contents:   {}",
        o.contents
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "verbs:      {}",
        o.verbs
            .iter()
            .map(|v| v.names.clone())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "properties: {}",
        o.propdefs
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}
