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

//! Flag sets, verb argument specs, and the preposition table. Bit positions
//! match the LambdaMOO textdump encoding throughout.

use crate::util::{BitEnum, ToPrimitive};

/// Per-object flags. Bits 3 and 6 are obsolete in the file format and never
/// set here.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ObjFlag {
    User = 0,
    Programmer = 1,
    Wizard = 2,
    Read = 4,
    Write = 5,
    Fertile = 7,
}

impl ToPrimitive for ObjFlag {
    fn to_u16(&self) -> u16 {
        *self as u16
    }
}

pub type ObjFlags = BitEnum<ObjFlag>;

/// Verb permission bits. The textdump packs the dobj/iobj arg specs into the
/// same byte above these (see `VerbArgsSpec::from_packed`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VerbFlag {
    Read = 0,
    Write = 1,
    Exec = 2,
    Debug = 3,
}

impl ToPrimitive for VerbFlag {
    fn to_u16(&self) -> u16 {
        *self as u16
    }
}

pub type VerbFlags = BitEnum<VerbFlag>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PropFlag {
    Read = 0,
    Write = 1,
    Chown = 2,
}

impl ToPrimitive for PropFlag {
    fn to_u16(&self) -> u16 {
        *self as u16
    }
}

pub type PropFlags = BitEnum<PropFlag>;

pub fn prop_flags_from_str(s: &str) -> Option<PropFlags> {
    let mut flags = PropFlags::new();
    for c in s.chars() {
        match c.to_ascii_lowercase() {
            'r' => flags.set(PropFlag::Read),
            'w' => flags.set(PropFlag::Write),
            'c' => flags.set(PropFlag::Chown),
            _ => return None,
        }
    }
    Some(flags)
}

pub fn prop_flags_to_string(flags: PropFlags) -> String {
    let mut s = String::new();
    if flags.contains(PropFlag::Read) {
        s.push('r');
    }
    if flags.contains(PropFlag::Write) {
        s.push('w');
    }
    if flags.contains(PropFlag::Chown) {
        s.push('c');
    }
    s
}

pub fn verb_flags_from_str(s: &str) -> Option<VerbFlags> {
    let mut flags = VerbFlags::new();
    for c in s.chars() {
        match c.to_ascii_lowercase() {
            'r' => flags.set(VerbFlag::Read),
            'w' => flags.set(VerbFlag::Write),
            'x' => flags.set(VerbFlag::Exec),
            'd' => flags.set(VerbFlag::Debug),
            _ => return None,
        }
    }
    Some(flags)
}

pub fn verb_flags_to_string(flags: VerbFlags) -> String {
    let mut s = String::new();
    if flags.contains(VerbFlag::Read) {
        s.push('r');
    }
    if flags.contains(VerbFlag::Write) {
        s.push('w');
    }
    if flags.contains(VerbFlag::Exec) {
        s.push('x');
    }
    if flags.contains(VerbFlag::Debug) {
        s.push('d');
    }
    s
}

/// Direct/indirect object spec of a command verb.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArgSpec {
    None = 0,
    Any = 1,
    This = 2,
}

impl ArgSpec {
    pub fn from_repr(v: u16) -> Option<Self> {
        match v {
            0 => Some(ArgSpec::None),
            1 => Some(ArgSpec::Any),
            2 => Some(ArgSpec::This),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Some(ArgSpec::None),
            "any" => Some(ArgSpec::Any),
            "this" => Some(ArgSpec::This),
            _ => None,
        }
    }

    pub fn to_string(self) -> &'static str {
        match self {
            ArgSpec::None => "none",
            ArgSpec::Any => "any",
            ArgSpec::This => "this",
        }
    }
}

/// The canonical preposition table. Ids are the textdump encoding.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Preposition {
    WithUsing = 0,
    AtTo = 1,
    InFrontOf = 2,
    IntoIn = 3,
    OnTopOfOn = 4,
    OutOf = 5,
    Over = 6,
    Through = 7,
    Under = 8,
    Behind = 9,
    Beside = 10,
    ForAbout = 11,
    Is = 12,
    As = 13,
    OffOf = 14,
}

const PREPOSITION_ALIASES: &[(Preposition, &[&str])] = &[
    (Preposition::WithUsing, &["with", "using"]),
    (Preposition::AtTo, &["at", "to"]),
    (Preposition::InFrontOf, &["in front of"]),
    (Preposition::IntoIn, &["in", "inside", "into"]),
    (Preposition::OnTopOfOn, &["on top of", "on", "onto", "upon"]),
    (
        Preposition::OutOf,
        &["out of", "from inside", "from"],
    ),
    (Preposition::Over, &["over"]),
    (Preposition::Through, &["through"]),
    (
        Preposition::Under,
        &["under", "underneath", "beneath"],
    ),
    (Preposition::Behind, &["behind"]),
    (Preposition::Beside, &["beside"]),
    (Preposition::ForAbout, &["for", "about"]),
    (Preposition::Is, &["is"]),
    (Preposition::As, &["as"]),
    (Preposition::OffOf, &["off", "off of"]),
];

impl Preposition {
    pub fn from_repr(v: i16) -> Option<Self> {
        PREPOSITION_ALIASES
            .iter()
            .map(|(p, _)| *p)
            .find(|p| *p as i16 == v)
    }

    /// Match a single word (or multi-word string) against the alias table.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.to_ascii_lowercase();
        for (p, aliases) in PREPOSITION_ALIASES {
            if aliases.contains(&s.as_str()) {
                return Some(*p);
            }
        }
        None
    }

    /// The full alias spelling, as `verb_args` prints it.
    pub fn to_string_full(self) -> String {
        let aliases = PREPOSITION_ALIASES
            .iter()
            .find(|(p, _)| *p == self)
            .map(|(_, a)| *a)
            .unwrap();
        aliases.join("/")
    }

    /// Aliases, longest-phrase matching first, for the command parser.
    pub fn all_phrases() -> Vec<(&'static str, Preposition)> {
        let mut phrases: Vec<(&'static str, Preposition)> = PREPOSITION_ALIASES
            .iter()
            .flat_map(|(p, aliases)| aliases.iter().map(move |a| (*a, *p)))
            .collect();
        phrases.sort_by_key(|(a, _)| std::cmp::Reverse(a.split(' ').count()));
        phrases
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PrepSpec {
    Any,
    None,
    Other(Preposition),
}

impl PrepSpec {
    pub fn from_repr(v: i16) -> Option<Self> {
        match v {
            -2 => Some(PrepSpec::Any),
            -1 => Some(PrepSpec::None),
            v => Preposition::from_repr(v).map(PrepSpec::Other),
        }
    }

    pub fn to_repr(self) -> i16 {
        match self {
            PrepSpec::Any => -2,
            PrepSpec::None => -1,
            PrepSpec::Other(p) => p as i16,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Some(PrepSpec::Any),
            "none" => Some(PrepSpec::None),
            _ => Preposition::parse(s).map(PrepSpec::Other),
        }
    }

    pub fn to_string(self) -> String {
        match self {
            PrepSpec::Any => "any".to_string(),
            PrepSpec::None => "none".to_string(),
            PrepSpec::Other(p) => p.to_string_full(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VerbArgsSpec {
    pub dobj: ArgSpec,
    pub prep: PrepSpec,
    pub iobj: ArgSpec,
}

impl VerbArgsSpec {
    pub fn this_none_this() -> Self {
        VerbArgsSpec {
            dobj: ArgSpec::This,
            prep: PrepSpec::None,
            iobj: ArgSpec::This,
        }
    }

    /// Unpack from the textdump's verb permission word and preposition id.
    pub fn from_packed(perms: u16, prep: i16) -> Option<(VerbFlags, Self)> {
        let flags = VerbFlags::from_u16(perms & 0x0f);
        let dobj = ArgSpec::from_repr((perms >> 4) & 0x3)?;
        let iobj = ArgSpec::from_repr((perms >> 6) & 0x3)?;
        let prep = PrepSpec::from_repr(prep)?;
        Some((flags, VerbArgsSpec { dobj, prep, iobj }))
    }

    pub fn to_packed(self, flags: VerbFlags) -> (u16, i16) {
        let perms =
            flags.to_u16() | ((self.dobj as u16) << 4) | ((self.iobj as u16) << 6);
        (perms, self.prep.to_repr())
    }
}

/// Does `candidate` match the verb name `pattern`? Patterns are
/// case-insensitive; `*` splits them into a required prefix and suffix, and
/// the candidate must carry both with nothing lost: `foo*bar` matches any
/// name beginning `foo` and ending `bar` of length >= 6.
pub fn verbname_matches(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let candidate = candidate.to_ascii_lowercase();
    match pattern.split_once('*') {
        None => pattern == candidate,
        Some((prefix, suffix)) => {
            candidate.len() >= prefix.len() + suffix.len()
                && candidate.starts_with(prefix)
                && candidate.ends_with(suffix)
        }
    }
}

/// Does any whitespace-separated pattern in `names` match?
pub fn verb_names_match(names: &str, candidate: &str) -> bool {
    names
        .split_whitespace()
        .any(|pattern| verbname_matches(pattern, candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_wildcards() {
        assert!(verbname_matches("foo*bar", "foobar"));
        assert!(verbname_matches("foo*bar", "fooXYZbar"));
        assert!(!verbname_matches("foo*bar", "fooba"));
        assert!(!verbname_matches("foo*bar", "fob"));
        assert!(verbname_matches("*", "anything"));
        assert!(verbname_matches("foo*", "FOO"));
        assert!(verbname_matches("foo*", "foodle"));
        assert!(!verbname_matches("foo*", "fo"));
        assert!(verbname_matches("look", "LOOK"));
        assert!(verb_names_match("g*et take", "take"));
    }

    #[test]
    fn argspec_packing_round_trips() {
        let spec = VerbArgsSpec {
            dobj: ArgSpec::Any,
            prep: PrepSpec::Other(Preposition::AtTo),
            iobj: ArgSpec::This,
        };
        let mut flags = VerbFlags::new_with(VerbFlag::Read);
        flags.set(VerbFlag::Exec);
        flags.set(VerbFlag::Debug);
        let (perms, prep) = spec.to_packed(flags);
        let (flags2, spec2) = VerbArgsSpec::from_packed(perms, prep).unwrap();
        assert_eq!(flags, flags2);
        assert_eq!(spec, spec2);
    }

    #[test]
    fn prepositions_parse_aliases() {
        assert_eq!(Preposition::parse("to"), Some(Preposition::AtTo));
        assert_eq!(Preposition::parse("USING"), Some(Preposition::WithUsing));
        assert_eq!(Preposition::parse("in front of"), Some(Preposition::InFrontOf));
        assert_eq!(Preposition::parse("xyzzy"), None);
        assert_eq!(PrepSpec::parse("any"), Some(PrepSpec::Any));
        assert_eq!(PrepSpec::from_repr(-2), Some(PrepSpec::Any));
        assert_eq!(
            PrepSpec::Other(Preposition::OnTopOfOn).to_string(),
            "on top of/on/onto/upon"
        );
    }
}
