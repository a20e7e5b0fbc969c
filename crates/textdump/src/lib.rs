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

//! The LambdaMOO/ToastStunt textual database format. The in-memory
//! `Textdump` mirrors the file layout (positional property values, object
//! relationships as lists); `load`/`dump` convert between it and an
//! `ObjectStore`. Reading accepts the classic v4 layout (single parent,
//! head+sibling chains) and the ToastStunt-style v17 layout (parent,
//! contents, and children lists written as values); writing always produces
//! v17 so multi-parent objects survive a round trip.

mod load;
mod read;
mod write;

pub use load::{load_textdump, textdump_from_store};
pub use read::TextdumpReader;
pub use write::TextdumpWriter;

use barn_var::{Obj, Var};
use std::collections::BTreeMap;
use thiserror::Error;

pub const LAMBDAMOO_DB_VERSION_STRING: &str = "** LambdaMOO Database, Format Version 4 **";
pub const TOASTSTUNT_DB_VERSION_STRING: &str = "** LambdaMOO Database, Format Version 17 **";

/// Textdump type code for an inherited property slot with no local value.
pub const TYPE_CLEAR: i64 = 5;

#[derive(Debug, Error)]
pub enum TextdumpReaderError {
    #[error("could not open file: {0}")]
    CouldNotOpenFile(String),
    #[error("io error: {0} @ line {1}")]
    IoError(std::io::Error, usize),
    #[error("parse error: {0} @ line {1}")]
    ParseError(String, usize),
    #[error("db error while {0}: {1}")]
    LoadError(String, barn_db::WorldStateError),
    #[error("compile error while {0}: {1}")]
    VerbCompileError(String, barn_compiler::CompileError),
    #[error("textdump version error: {0}")]
    VersionError(String),
}

#[derive(Clone, Debug)]
pub struct TdVerbdef {
    pub name: String,
    pub owner: Obj,
    pub flags: u16,
    pub prep: i16,
}

#[derive(Clone, Debug)]
pub struct TdPropval {
    pub value: Var,
    pub is_clear: bool,
    pub owner: Obj,
    pub flags: u8,
}

/// One object block. Property values are positional in the parent-chain
/// property order. Relationships are kept as resolved lists here: the reader
/// turns the classic v4 head+sibling chains into these at load time, and the
/// v17 layout stores them as list values directly.
#[derive(Clone, Debug)]
pub struct TdObject {
    pub id: Obj,
    pub name: String,
    pub flags: u8,
    pub owner: Obj,
    pub location: Obj,
    pub contents: Vec<Obj>,
    pub parents: Vec<Obj>,
    pub children: Vec<Obj>,
    pub verbdefs: Vec<TdVerbdef>,
    pub propdefs: Vec<String>,
    pub propvals: Vec<TdPropval>,
}

/// A verb program block (`#obj:index` followed by source and a `.`).
#[derive(Clone, Debug)]
pub struct TdVerb {
    pub objid: Obj,
    pub verbnum: usize,
    pub program: String,
}

pub struct Textdump {
    pub version_string: String,
    pub objects: BTreeMap<i64, TdObject>,
    pub users: Vec<Obj>,
    pub verbs: BTreeMap<(i64, usize), TdVerb>,
}
