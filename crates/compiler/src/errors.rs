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

use thiserror::Error;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum CompileError {
    #[error("Failure to parse program @ line {line}: {message}")]
    ParseError { line: usize, message: String },
    #[error("Unknown built-in function: {0}")]
    UnknownBuiltinFunction(String),
    #[error("Unknown loop label: {0}")]
    UnknownLoopLabel(String),
    #[error("break/continue outside of loop")]
    ExitOutsideLoop,
    #[error("Invalid assignment target")]
    BadAssignmentTarget,
    #[error("Scatter pattern has more than one @rest target")]
    DuplicateRestTarget,
    #[error("'$' used outside an index")]
    LengthOutsideIndex,
}
