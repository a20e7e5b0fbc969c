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

use crate::labels::{JumpLabel, Offset};
use crate::names::Names;
use crate::opcode::Op;
use barn_var::Var;
use std::rc::Rc;

/// The bytecode of one `fork` block, with its own line-number spans.
#[derive(Clone, Debug, PartialEq)]
pub struct ForkVector {
    pub ops: Vec<Op>,
    pub line_number_spans: Vec<(usize, usize)>,
}

/// A compiled verb.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    /// Constants referenced by `Imm`.
    pub literals: Vec<Var>,
    /// Jump target fixups referenced by label id.
    pub jump_labels: Vec<JumpLabel>,
    /// Variable names, globals first.
    pub var_names: Names,
    /// The main opcode vector.
    pub main_vector: Rc<Vec<Op>>,
    /// One vector per `fork` statement, in encounter order.
    pub fork_vectors: Vec<ForkVector>,
    /// Pairs of (pc, source line), ascending by pc, for the main vector.
    pub line_number_spans: Vec<(usize, usize)>,
}

impl Program {
    /// The op vector selected by `fork_vector`: the main vector when `None`.
    pub fn vector(&self, fork_vector: Option<Offset>) -> &[Op] {
        match fork_vector {
            None => &self.main_vector,
            Some(o) => &self.fork_vectors[o.0 as usize].ops,
        }
    }

    /// Resolve a pc to a source line within the given vector.
    pub fn line_for_pc(&self, fork_vector: Option<Offset>, pc: usize) -> Option<usize> {
        let spans = match fork_vector {
            None => &self.line_number_spans,
            Some(o) => &self.fork_vectors[o.0 as usize].line_number_spans,
        };
        if spans.is_empty() {
            return None;
        }
        let mut last_line_num = 1;
        for (offset, line_no) in spans {
            if *offset > pc {
                return Some(last_line_num);
            }
            last_line_num = *line_no;
        }
        Some(last_line_num)
    }
}
