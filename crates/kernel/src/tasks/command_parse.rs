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

//! Splitting command lines into words and the verb/dobj/preposition/iobj
//! shape. Object matching itself lives in `matching`.

use barn_db::model::{PrepSpec, Preposition};
use barn_var::{v_str, Obj, Var};

#[derive(Clone, Debug, PartialEq)]
pub struct ParsedCommand {
    pub verb: String,
    pub argstr: String,
    pub args: Vec<Var>,
    pub dobjstr: Option<String>,
    pub dobj: Option<Obj>,
    pub prepstr: Option<String>,
    pub prep: PrepSpec,
    pub iobjstr: Option<String>,
    pub iobj: Option<Obj>,
}

/// Split a command into words: double quotes group, backslash escapes the
/// next character, everything else splits on runs of spaces.
pub fn parse_into_words(input: &str) -> Vec<String> {
    let mut words = vec![];
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_word = false;
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_word = true;
            }
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                    has_word = true;
                }
            }
            ' ' | '\t' if !in_quotes => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            c => {
                current.push(c);
                has_word = true;
            }
        }
    }
    if has_word {
        words.push(current);
    }
    words
}

/// Find the first preposition in the word list, preferring longer phrases
/// ("in front of" over "in"). Returns the word span and the match.
fn seek_preposition(words: &[String]) -> Option<(usize, usize, Preposition, String)> {
    let phrases = Preposition::all_phrases();
    for start in 0..words.len() {
        for (phrase, prep) in &phrases {
            let phrase_words: Vec<&str> = phrase.split(' ').collect();
            let end = start + phrase_words.len();
            if end > words.len() {
                continue;
            }
            let matches = words[start..end]
                .iter()
                .zip(phrase_words.iter())
                .all(|(w, p)| w.eq_ignore_ascii_case(p));
            if matches {
                return Some((start, end, *prep, words[start..end].join(" ")));
            }
        }
    }
    None
}

/// Shape a (post-login, non-eval) command line. Direct/indirect objects come
/// back as strings; the caller resolves them against the player's
/// surroundings.
pub fn parse_command(input: &str) -> Option<ParsedCommand> {
    // The classic say/emote sugar.
    let mut command = input.trim_start().to_string();
    match command.chars().next() {
        Some('"') => command.replace_range(..1, "say "),
        Some(':') => command.replace_range(..1, "emote "),
        _ => {}
    }

    let mut parts = command.splitn(2, ' ');
    let verb = parts.next().unwrap_or_default().to_string();
    if verb.is_empty() {
        return None;
    }
    let argstr = parts.next().unwrap_or_default().to_string();
    let words = parse_into_words(&argstr);

    let (dobjstr, prepstr, prep, iobjstr) = match seek_preposition(&words) {
        Some((start, end, prep, prepstr)) => {
            let dobjstr = if start == 0 {
                None
            } else {
                Some(words[0..start].join(" "))
            };
            let iobjstr = Some(words[end..].join(" "));
            (dobjstr, Some(prepstr), PrepSpec::Other(prep), iobjstr)
        }
        None => {
            let dobjstr = if words.is_empty() {
                None
            } else {
                Some(words.join(" "))
            };
            (dobjstr, None, PrepSpec::None, None)
        }
    };

    let args: Vec<Var> = words.iter().map(|w| v_str(w)).collect();
    Some(ParsedCommand {
        verb,
        argstr,
        args,
        dobjstr,
        dobj: None,
        prepstr,
        prep,
        iobjstr,
        iobj: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_honor_quotes_and_backslashes() {
        assert_eq!(parse_into_words("hello world"), vec!["hello", "world"]);
        assert_eq!(
            parse_into_words("hello \"big world\""),
            vec!["hello", "big world"]
        );
        assert_eq!(
            parse_into_words(r"hello\ world frankly"),
            vec!["hello world", "frankly"]
        );
    }

    #[test]
    fn simple_command() {
        let parsed = parse_command("look lantern").unwrap();
        assert_eq!(parsed.verb, "look");
        assert_eq!(parsed.dobjstr.as_deref(), Some("lantern"));
        assert_eq!(parsed.prep, PrepSpec::None);
        assert_eq!(parsed.iobjstr, None);
        assert_eq!(parsed.argstr, "lantern");
    }

    #[test]
    fn preposition_splits_objects() {
        let parsed = parse_command("put coin in box").unwrap();
        assert_eq!(parsed.verb, "put");
        assert_eq!(parsed.dobjstr.as_deref(), Some("coin"));
        assert_eq!(parsed.prepstr.as_deref(), Some("in"));
        assert_eq!(parsed.prep, PrepSpec::Other(Preposition::IntoIn));
        assert_eq!(parsed.iobjstr.as_deref(), Some("box"));
    }

    #[test]
    fn multiword_preposition_wins() {
        let parsed = parse_command("hide key in front of door").unwrap();
        assert_eq!(parsed.prepstr.as_deref(), Some("in front of"));
        assert_eq!(parsed.prep, PrepSpec::Other(Preposition::InFrontOf));
        assert_eq!(parsed.dobjstr.as_deref(), Some("key"));
        assert_eq!(parsed.iobjstr.as_deref(), Some("door"));
    }

    #[test]
    fn say_sugar() {
        let parsed = parse_command("\"hello, world!").unwrap();
        assert_eq!(parsed.verb, "say");
        assert_eq!(parsed.argstr, "hello, world!");

        let parsed = parse_command(":waves").unwrap();
        assert_eq!(parsed.verb, "emote");
    }

    #[test]
    fn empty_line_is_no_command() {
        assert!(parse_command("").is_none());
        assert!(parse_command("   ").is_none());
    }
}
