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

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::RwLock;

/// An interned, case-insensitive identifier. Verb names, property names, and
/// builtin names are all symbols; comparing two is an integer compare.
/// The originally-interned spelling is preserved for display.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Symbol(u32);

struct Interner {
    by_folded: HashMap<String, u32>,
    spellings: Vec<&'static str>,
}

lazy_static! {
    static ref INTERNER: RwLock<Interner> = RwLock::new(Interner {
        by_folded: HashMap::new(),
        spellings: Vec::new(),
    });
}

impl Symbol {
    /// Intern a string, case-insensitively. The first spelling seen wins for
    /// display purposes.
    pub fn mk(s: &str) -> Self {
        let folded = s.to_ascii_lowercase();
        {
            let interner = INTERNER.read().unwrap();
            if let Some(id) = interner.by_folded.get(&folded) {
                return Symbol(*id);
            }
        }
        let mut interner = INTERNER.write().unwrap();
        // Lost a race? Check again under the write lock.
        if let Some(id) = interner.by_folded.get(&folded) {
            return Symbol(*id);
        }
        let id = interner.spellings.len() as u32;
        // Interned spellings live for the process lifetime.
        let spelling: &'static str = Box::leak(s.to_string().into_boxed_str());
        interner.spellings.push(spelling);
        interner.by_folded.insert(folded, id);
        Symbol(id)
    }

    pub fn as_str(&self) -> &'static str {
        INTERNER.read().unwrap().spellings[self.0 as usize]
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Debug for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Symbol({})", self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::mk(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_identity() {
        let a = Symbol::mk("Tell");
        let b = Symbol::mk("tell");
        let c = Symbol::mk("TELL");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "Tell");
    }

    #[test]
    fn distinct_names_distinct_symbols() {
        assert_ne!(Symbol::mk("look"), Symbol::mk("look_self"));
    }
}
