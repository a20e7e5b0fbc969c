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

//! The builtin function descriptor table. Function names are resolved to ids
//! here at compile time; the kernel registers an implementation per id. The
//! descriptors carry the arity bounds so `E_ARGS` can be produced before an
//! implementation ever runs.

use barn_var::Symbol;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Index of a builtin function, stable across compile and execution.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BuiltinId(pub u16);

pub struct Builtin {
    pub name: Symbol,
    pub min_args: usize,
    /// `None` is unbounded (varargs).
    pub max_args: Option<usize>,
}

pub struct Builtins {
    pub descriptors: Vec<Builtin>,
    names: HashMap<Symbol, BuiltinId>,
}

lazy_static! {
    pub static ref BUILTINS: Builtins = Builtins::new();
}

impl Builtins {
    fn new() -> Self {
        let mut b = Builtins {
            descriptors: Vec::new(),
            names: HashMap::new(),
        };
        for (name, min, max) in BUILTIN_DESCRIPTORS {
            b.register(name, *min, *max);
        }
        b
    }

    fn register(&mut self, name: &str, min_args: usize, max_args: Option<usize>) {
        let name = Symbol::mk(name);
        let id = BuiltinId(self.descriptors.len() as u16);
        self.descriptors.push(Builtin {
            name,
            min_args,
            max_args,
        });
        self.names.insert(name, id);
    }

    pub fn find_builtin(&self, name: Symbol) -> Option<BuiltinId> {
        self.names.get(&name).copied()
    }

    pub fn name_of(&self, id: BuiltinId) -> Option<Symbol> {
        self.descriptors.get(id.0 as usize).map(|d| d.name)
    }

    pub fn description(&self, id: BuiltinId) -> &Builtin {
        &self.descriptors[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// (name, min args, max args). Grouped by domain; the kernel's registration
/// modules follow the same grouping.
const BUILTIN_DESCRIPTORS: &[(&str, usize, Option<usize>)] = &[
    // Values & conversion
    ("typeof", 1, Some(1)),
    ("tostr", 0, None),
    ("toliteral", 1, Some(1)),
    ("toint", 1, Some(1)),
    ("tonum", 1, Some(1)),
    ("toobj", 1, Some(1)),
    ("tofloat", 1, Some(1)),
    ("length", 1, Some(1)),
    ("equal", 2, Some(2)),
    ("value_bytes", 1, Some(1)),
    ("value_hash", 1, Some(3)),
    ("value_hmac", 2, Some(4)),
    ("raise", 1, Some(3)),
    ("eval", 1, Some(1)),
    // Numbers
    ("random", 0, Some(1)),
    ("min", 1, None),
    ("max", 1, None),
    ("abs", 1, Some(1)),
    ("sqrt", 1, Some(1)),
    ("sin", 1, Some(1)),
    ("cos", 1, Some(1)),
    ("tan", 1, Some(1)),
    ("asin", 1, Some(1)),
    ("acos", 1, Some(1)),
    ("atan", 1, Some(2)),
    ("exp", 1, Some(1)),
    ("log", 1, Some(1)),
    ("log10", 1, Some(1)),
    ("ceil", 1, Some(1)),
    ("floor", 1, Some(1)),
    ("trunc", 1, Some(1)),
    ("floatstr", 2, Some(3)),
    // Strings
    ("index", 2, Some(3)),
    ("rindex", 2, Some(3)),
    ("strsub", 3, Some(4)),
    ("strcmp", 2, Some(2)),
    ("match", 2, Some(3)),
    ("rmatch", 2, Some(3)),
    ("substitute", 2, Some(2)),
    ("crypt", 1, Some(2)),
    ("salt", 2, Some(2)),
    ("random_bytes", 1, Some(1)),
    ("encode_base64", 1, Some(2)),
    ("decode_base64", 1, Some(2)),
    ("string_hash", 1, Some(3)),
    ("binary_hash", 1, Some(3)),
    ("string_hmac", 2, Some(4)),
    ("binary_hmac", 2, Some(4)),
    // Lists & sets
    ("listappend", 2, Some(3)),
    ("listinsert", 2, Some(3)),
    ("listdelete", 2, Some(2)),
    ("listset", 3, Some(3)),
    ("setadd", 2, Some(2)),
    ("setremove", 2, Some(2)),
    ("is_member", 2, Some(2)),
    // Maps
    ("mapkeys", 1, Some(1)),
    ("mapvalues", 1, Some(1)),
    ("maphaskey", 2, Some(2)),
    ("mapdelete", 2, Some(2)),
    // Objects
    ("create", 1, Some(2)),
    ("recycle", 1, Some(1)),
    ("valid", 1, Some(1)),
    ("parent", 1, Some(1)),
    ("parents", 1, Some(1)),
    ("children", 1, Some(1)),
    ("chparent", 2, Some(2)),
    ("chparents", 2, Some(2)),
    ("max_object", 0, Some(0)),
    ("objects", 0, Some(0)),
    ("move", 2, Some(2)),
    ("contents", 1, Some(1)),
    ("location", 1, Some(1)),
    ("players", 0, Some(0)),
    ("is_player", 1, Some(1)),
    ("set_player_flag", 2, Some(2)),
    ("new_waif", 0, Some(0)),
    // Properties
    ("properties", 1, Some(1)),
    ("property_info", 2, Some(2)),
    ("set_property_info", 3, Some(3)),
    ("add_property", 4, Some(4)),
    ("delete_property", 2, Some(2)),
    ("clear_property", 2, Some(2)),
    ("is_clear_property", 2, Some(2)),
    // Verbs
    ("verbs", 1, Some(1)),
    ("verb_info", 2, Some(2)),
    ("set_verb_info", 3, Some(3)),
    ("verb_args", 2, Some(2)),
    ("set_verb_args", 3, Some(3)),
    ("verb_code", 2, Some(4)),
    ("set_verb_code", 3, Some(3)),
    ("add_verb", 3, Some(3)),
    ("delete_verb", 2, Some(2)),
    ("disassemble", 2, Some(2)),
    // Tasks
    ("task_id", 0, Some(0)),
    ("ticks_left", 0, Some(0)),
    ("seconds_left", 0, Some(0)),
    ("suspend", 0, Some(1)),
    ("resume", 1, Some(2)),
    ("kill_task", 1, Some(1)),
    ("queued_tasks", 0, Some(0)),
    ("task_stack", 1, Some(2)),
    ("callers", 0, Some(1)),
    ("caller_perms", 0, Some(0)),
    ("set_task_perms", 1, Some(1)),
    ("task_local", 0, Some(0)),
    ("set_task_local", 1, Some(1)),
    // Server
    ("server_version", 0, Some(1)),
    ("server_log", 1, Some(2)),
    ("shutdown", 0, Some(1)),
    ("dump_database", 0, Some(0)),
    ("load_server_options", 0, Some(0)),
    ("memory_usage", 0, Some(0)),
    ("db_disk_size", 0, Some(0)),
    // Connections
    ("connected_players", 0, Some(1)),
    ("connected_seconds", 1, Some(1)),
    ("idle_seconds", 1, Some(1)),
    ("connection_name", 1, Some(1)),
    ("notify", 2, Some(3)),
    ("read", 0, Some(2)),
    ("boot_player", 1, Some(1)),
    ("switch_player", 2, Some(2)),
    // Time
    ("time", 0, Some(0)),
    ("ctime", 0, Some(1)),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_and_stable() {
        let id = BUILTINS.find_builtin(Symbol::mk("TOSTR")).unwrap();
        assert_eq!(BUILTINS.name_of(id), Some(Symbol::mk("tostr")));
        assert!(BUILTINS.find_builtin(Symbol::mk("no_such_fn")).is_none());
    }

    #[test]
    fn arity_bounds() {
        let id = BUILTINS.find_builtin(Symbol::mk("notify")).unwrap();
        let d = BUILTINS.description(id);
        assert_eq!(d.min_args, 2);
        assert_eq!(d.max_args, Some(3));
        let tostr = BUILTINS.find_builtin(Symbol::mk("tostr")).unwrap();
        assert_eq!(BUILTINS.description(tostr).max_args, None);
    }
}
