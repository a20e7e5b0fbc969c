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

//! Matching command noun phrases against the player's surroundings:
//! `me`/`here`, `#n` literals, `$prop` paths, then name/alias matching over
//! the player, their contents, and the room's contents.

use barn_db::{ObjPtr, ObjectStore};
use barn_var::{Obj, Symbol, Variant, AMBIGUOUS, FAILED_MATCH, NOTHING, SYSTEM_OBJECT};

/// Resolve a noun phrase for command parsing. Empty strings are `NOTHING`;
/// no candidate is `FAILED_MATCH` (#-3); several equally-good candidates are
/// `AMBIGUOUS` (#-2).
pub fn match_object(world: &ObjectStore, player: Obj, name: &str) -> Obj {
    let name = name.trim();
    if name.is_empty() {
        return NOTHING;
    }
    if name.eq_ignore_ascii_case("me") {
        return player;
    }
    if name.eq_ignore_ascii_case("here") {
        return world.get(player).map(|p| p.location).unwrap_or(NOTHING);
    }
    if let Some(obj) = Obj::parse(name) {
        return if world.valid(obj) { obj } else { FAILED_MATCH };
    }
    if let Some(rest) = name.strip_prefix('$') {
        return match_sysprop_path(world, rest);
    }

    // Candidate set: the player, what they carry, and what is around them.
    let mut candidates = vec![player];
    if let Ok(p) = world.get(player) {
        candidates.extend(p.contents.iter().copied());
        if p.location != NOTHING {
            candidates.push(p.location);
            if let Ok(room) = world.get(p.location) {
                candidates.extend(room.contents.iter().copied());
            }
        }
    }

    let mut exact = vec![];
    let mut prefix = vec![];
    for c in candidates {
        match name_match_quality(world, c, name) {
            MatchQuality::Exact => exact.push(c),
            MatchQuality::Prefix => prefix.push(c),
            MatchQuality::No => {}
        }
    }
    pick(&exact).or_else(|| pick(&prefix)).unwrap_or(FAILED_MATCH)
}

fn pick(candidates: &[Obj]) -> Option<Obj> {
    match candidates {
        [] => None,
        [one] => Some(*one),
        _ => Some(AMBIGUOUS),
    }
}

enum MatchQuality {
    Exact,
    Prefix,
    No,
}

/// Compare against the object's name and its `aliases` property, if any.
fn name_match_quality(world: &ObjectStore, obj: Obj, phrase: &str) -> MatchQuality {
    let Ok(o) = world.get(obj) else {
        return MatchQuality::No;
    };
    let mut names = vec![o.name.clone()];
    if let Ok((aliases, _, _)) =
        world.resolve_property(ObjPtr::Num(obj), Symbol::mk("aliases"))
    {
        if let Variant::List(aliases) = aliases.variant() {
            for a in aliases.iter() {
                if let Variant::Str(s) = a.variant() {
                    names.push(s.to_text().into_owned());
                }
            }
        }
    }
    let mut quality = MatchQuality::No;
    for n in names {
        if n.eq_ignore_ascii_case(phrase) {
            return MatchQuality::Exact;
        }
        if n.len() > phrase.len()
            && n
                .get(..phrase.len())
                .is_some_and(|p| p.eq_ignore_ascii_case(phrase))
        {
            quality = MatchQuality::Prefix;
        }
    }
    quality
}

/// `$foo` and `$foo.bar` paths rooted at #0.
fn match_sysprop_path(world: &ObjectStore, path: &str) -> Obj {
    let mut current = SYSTEM_OBJECT;
    for part in path.split('.') {
        if !world.valid(current) {
            return FAILED_MATCH;
        }
        let Ok((v, _, _)) = world.resolve_property(ObjPtr::Num(current), Symbol::mk(part))
        else {
            return FAILED_MATCH;
        };
        let Variant::Obj(next) = v.variant() else {
            return FAILED_MATCH;
        };
        current = *next;
    }
    if world.valid(current) {
        current
    } else {
        FAILED_MATCH
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barn_db::model::PropFlags;
    use barn_var::{v_list, v_obj, v_str};

    fn world_with_room() -> (ObjectStore, Obj, Obj, Obj) {
        let mut world = ObjectStore::new();
        let sys = world.create(vec![], Obj(0)).unwrap();
        assert_eq!(sys, SYSTEM_OBJECT);
        let room = world.create(vec![], Obj(0)).unwrap();
        let player = world.create(vec![], Obj(0)).unwrap();
        let lantern = world.create(vec![], Obj(0)).unwrap();
        world.get_mut(player).unwrap().name = "Mouse".into();
        world.get_mut(lantern).unwrap().name = "brass lantern".into();
        world.move_object(player, room).unwrap();
        world.move_object(lantern, room).unwrap();
        (world, room, player, lantern)
    }

    #[test]
    fn me_here_and_literals() {
        let (world, room, player, lantern) = world_with_room();
        assert_eq!(match_object(&world, player, "me"), player);
        assert_eq!(match_object(&world, player, "here"), room);
        assert_eq!(match_object(&world, player, &format!("{lantern}")), lantern);
        assert_eq!(match_object(&world, player, "#999"), FAILED_MATCH);
    }

    #[test]
    fn names_prefixes_and_aliases() {
        let (mut world, _, player, lantern) = world_with_room();
        assert_eq!(match_object(&world, player, "brass lantern"), lantern);
        assert_eq!(match_object(&world, player, "bras"), lantern);
        assert_eq!(match_object(&world, player, "xyzzy"), FAILED_MATCH);

        world
            .add_property(
                lantern,
                Symbol::mk("aliases"),
                v_list(&[v_str("lamp")]),
                lantern,
                PropFlags::new(),
            )
            .unwrap();
        assert_eq!(match_object(&world, player, "lamp"), lantern);
    }

    #[test]
    fn ambiguity_reports_ambiguous() {
        let (mut world, room, player, _) = world_with_room();
        let second = world.create(vec![], Obj(0)).unwrap();
        world.get_mut(second).unwrap().name = "brass key".into();
        world.move_object(second, room).unwrap();
        assert_eq!(match_object(&world, player, "bra"), AMBIGUOUS);
    }

    #[test]
    fn sysprop_paths() {
        let (mut world, room, player, _) = world_with_room();
        world
            .add_property(
                SYSTEM_OBJECT,
                Symbol::mk("lobby"),
                v_obj(room),
                SYSTEM_OBJECT,
                PropFlags::new(),
            )
            .unwrap();
        assert_eq!(match_object(&world, player, "$lobby"), room);
        assert_eq!(match_object(&world, player, "$nowhere"), FAILED_MATCH);
    }
}
