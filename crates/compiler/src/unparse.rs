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

//! Value-to-source printing. `to_literal` produces a string the parser reads
//! back as an equal value, for every finite serializable value; waifs and
//! anonymous objects print informative placeholders only.

use barn_var::{Var, Variant};
use std::fmt::Write;

/// Quote a MOO string body: `"` and `\` get backslash escapes, non-printable
/// bytes (and `~` itself) become `~XX` uppercase-hex escapes, and valid UTF-8
/// passes through untouched.
pub fn quote_str(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    let mut rest = bytes;
    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(s) => {
                push_escaped(&mut out, s);
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                push_escaped(&mut out, std::str::from_utf8(valid).unwrap());
                let bad_len = e.error_len().unwrap_or(after.len()).max(1);
                for b in &after[..bad_len] {
                    write!(out, "~{b:02X}").unwrap();
                }
                rest = &after[bad_len..];
            }
        }
    }
    out.push('"');
    out
}

fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '~' => out.push_str("~7E"),
            c if (c as u32) < 0x20 || c as u32 == 0x7F => {
                write!(out, "~{:02X}", c as u32).unwrap()
            }
            c => out.push(c),
        }
    }
}

pub fn to_literal(v: &Var) -> String {
    match v.variant() {
        Variant::None => "0".to_string(),
        Variant::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Variant::Int(i) => i.to_string(),
        Variant::Float(f) => format!("{f:?}"),
        Variant::Obj(o) => format!("{o}"),
        Variant::Err(e) => e.err_type.name().to_string(),
        Variant::Str(s) => quote_str(s.as_bytes()),
        Variant::List(l) => {
            let mut out = String::from("{");
            for (i, e) in l.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&to_literal(e));
            }
            out.push('}');
            out
        }
        Variant::Map(m) => {
            let mut out = String::from("[");
            for (i, (k, val)) in m.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&to_literal(k));
                out.push_str(" -> ");
                out.push_str(&to_literal(val));
            }
            out.push(']');
            out
        }
        Variant::Anon(_) => "*anonymous*".to_string(),
        Variant::Waif(_) => "*waif*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barn_var::{v_err, v_float, v_int, v_list, v_map, v_objid, v_str, ErrorCode};

    #[test]
    fn scalars() {
        assert_eq!(to_literal(&v_int(17)), "17");
        assert_eq!(to_literal(&v_float(10.0)), "10.0");
        assert_eq!(to_literal(&v_objid(-1)), "#-1");
        assert_eq!(to_literal(&v_err(ErrorCode::E_PERM)), "E_PERM");
    }

    #[test]
    fn strings_escape() {
        assert_eq!(to_literal(&v_str("moo")), "\"moo\"");
        assert_eq!(to_literal(&v_str("a\"b")), "\"a\\\"b\"");
        assert_eq!(to_literal(&v_str("a\\b")), "\"a\\\\b\"");
        assert_eq!(to_literal(&v_str("x\x1by")), "\"x~1By\"");
        assert_eq!(to_literal(&v_str("a~b")), "\"a~7Eb\"");
        assert_eq!(to_literal(&v_str("日")), "\"日\"");
    }

    #[test]
    fn collections() {
        assert_eq!(
            to_literal(&v_list(&[v_int(1), v_str("x")])),
            "{1, \"x\"}"
        );
        let m = v_map(&[(v_str("a"), v_int(1)), (v_int(2), v_int(3))]).unwrap();
        assert_eq!(to_literal(&m), "[2 -> 3, \"a\" -> 1]");
    }

    #[test]
    fn round_trips_through_the_parser() {
        use crate::codegen::compile;
        let v = v_list(&[v_int(1), v_str("two"), v_float(3.5), v_objid(4)]);
        let src = format!("return {};", to_literal(&v));
        // Confirm the literal is at least syntactically acceptable.
        assert!(compile(&src).is_ok());
    }

    #[test]
    fn byte_strings_round_trip_exactly() {
        use crate::codegen::compile;
        use barn_var::{Str, Var, Variant};
        // Control bytes, a literal tilde, and invalid UTF-8 all survive a
        // print-then-parse cycle byte for byte.
        for bytes in [
            b"x\x1by".to_vec(),
            b"a~b".to_vec(),
            vec![0x00, 0x7f, 0xff],
            b"plain".to_vec(),
        ] {
            let v = Var::from_variant(Variant::Str(Str::mk_bytes(bytes.clone())));
            let src = format!("return {};", to_literal(&v));
            let program = compile(&src).unwrap();
            assert_eq!(program.literals.len(), 1, "{src:?}");
            assert!(
                program.literals[0].eq_case_sensitive(&v),
                "{src:?} did not reproduce {bytes:?}"
            );
        }
    }
}
