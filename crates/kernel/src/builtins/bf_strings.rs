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

//! String builtins: searching, substitution, legacy MOO pattern matching,
//! binary-string codecs, and the hash/hmac/crypt family.

use crate::builtins::BfRet::Ret;
use crate::builtins::{register, BfCallState, BfErr, BfRet, BuiltinFunction};
use barn_var::ErrorCode::{E_INVARG, E_TYPE};
use barn_var::{v_int, v_list, v_str, v_string, Str, Var, Variant};
use base64::Engine;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fmt::Write;

fn str_arg(v: &Var) -> Result<&Str, BfErr> {
    match v.variant() {
        Variant::Str(s) => Ok(s),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

// ---- binary strings ----

/// Encode raw bytes as a MOO binary string: printable ASCII stays, `~` and
/// everything else becomes `~XX`.
pub fn bytes_to_binary(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for b in bytes {
        match b {
            b'~' => out.push_str("~7E"),
            0x20..=0x7e => out.push(*b as char),
            _ => write!(out, "~{b:02X}").unwrap(),
        }
    }
    out
}

/// Decode a MOO binary string; `None` on malformed `~` escapes.
pub fn binary_to_bytes(s: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len());
    let mut i = 0;
    while i < s.len() {
        if s[i] == b'~' {
            if i + 2 >= s.len() {
                return None;
            }
            let hex = std::str::from_utf8(&s[i + 1..i + 3]).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(s[i]);
            i += 1;
        }
    }
    Some(out)
}

// ---- searching ----

fn bf_index(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let haystack = str_arg(&bf_args.args[0])?;
    let needle = str_arg(&bf_args.args[1])?;
    let case = bf_args.args.get(2).map(|v| v.is_true()).unwrap_or(false);
    Ok(Ret(v_int(haystack.index_in(needle, case))))
}

fn bf_rindex(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let haystack = str_arg(&bf_args.args[0])?;
    let needle = str_arg(&bf_args.args[1])?;
    let case = bf_args.args.get(2).map(|v| v.is_true()).unwrap_or(false);
    Ok(Ret(v_int(haystack.rindex_in(needle, case))))
}

fn bf_strsub(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let subject = str_arg(&bf_args.args[0])?;
    let what = str_arg(&bf_args.args[1])?;
    let with = str_arg(&bf_args.args[2])?;
    let case = bf_args.args.get(3).map(|v| v.is_true()).unwrap_or(false);
    if what.is_empty() {
        return Err(BfErr::Code(E_INVARG));
    }
    let subject_b = subject.as_bytes();
    let what_len = what.len();
    let fold = |b: &[u8]| -> Vec<u8> {
        if case {
            b.to_vec()
        } else {
            b.iter().map(|c| c.to_ascii_lowercase()).collect()
        }
    };
    let hay = fold(subject_b);
    let pat = fold(what.as_bytes());
    let mut out: Vec<u8> = Vec::with_capacity(subject_b.len());
    let mut i = 0;
    while i < subject_b.len() {
        if i + what_len <= hay.len() && hay[i..i + what_len] == pat[..] {
            out.extend_from_slice(with.as_bytes());
            i += what_len;
        } else {
            out.push(subject_b[i]);
            i += 1;
        }
    }
    Ok(Ret(Var::from(Str::mk_bytes(out))))
}

fn bf_strcmp(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let a = str_arg(&bf_args.args[0])?;
    let b = str_arg(&bf_args.args[1])?;
    let ord = a.as_bytes().cmp(b.as_bytes());
    Ok(Ret(v_int(match ord {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    })))
}

// ---- legacy MOO patterns ----

/// Translate a MOO legacy pattern to the modern regex dialect. `%` is the
/// escape: `%(`/`%)` group, `%|` alternates, `%w` word char, `%b`/`%<`/`%>`
/// word boundaries; plain `(){}|` are literals. Backreferences (`%1`..`%9`)
/// are not supported by the engine underneath.
fn translate_pattern(pattern: &str) -> Result<String, BfErr> {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => {
                let Some(e) = chars.next() else {
                    return Err(BfErr::Code(E_INVARG));
                };
                match e {
                    '(' => out.push('('),
                    ')' => out.push(')'),
                    '|' => out.push('|'),
                    'w' => out.push_str("\\w"),
                    'W' => out.push_str("\\W"),
                    'b' | '<' | '>' => out.push_str("\\b"),
                    '%' => out.push('%'),
                    '1'..='9' => return Err(BfErr::Code(E_INVARG)),
                    other => {
                        // An escaped anything-else is that literal character.
                        for ec in regex::escape(&other.to_string()).chars() {
                            out.push(ec);
                        }
                    }
                }
            }
            '(' | ')' | '|' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn compiled_pattern(pattern: &str, case_matters: bool) -> Result<regex::Regex, BfErr> {
    let translated = translate_pattern(pattern)?;
    let prefixed = if case_matters {
        translated
    } else {
        format!("(?i){translated}")
    };
    regex::Regex::new(&prefixed).map_err(|_| BfErr::Code(E_INVARG))
}

/// `{start, end, replacements, subject}` for a regex match, 1-based
/// inclusive indices, `{0, -1}` for unmatched groups.
fn match_result(subject: &str, caps: &regex::Captures) -> Var {
    let whole = caps.get(0).unwrap();
    let mut replacements = vec![];
    for i in 1..=9 {
        let pair = match caps.get(i) {
            Some(m) => v_list(&[
                v_int(m.start() as i64 + 1),
                v_int(m.end() as i64),
            ]),
            None => v_list(&[v_int(0), v_int(-1)]),
        };
        replacements.push(pair);
    }
    v_list(&[
        v_int(whole.start() as i64 + 1),
        v_int(whole.end() as i64),
        v_list(&replacements),
        v_str(subject),
    ])
}

fn do_match(bf_args: &mut BfCallState<'_, '_>, reverse: bool) -> Result<BfRet, BfErr> {
    let subject = str_arg(&bf_args.args[0])?.to_text().into_owned();
    let pattern = str_arg(&bf_args.args[1])?.to_text().into_owned();
    let case = bf_args.args.get(2).map(|v| v.is_true()).unwrap_or(false);
    let re = compiled_pattern(&pattern, case)?;
    let caps = if reverse {
        let last = re.find_iter(&subject).last();
        match last {
            None => None,
            Some(m) => re.captures_at(&subject, m.start()),
        }
    } else {
        re.captures(&subject)
    };
    match caps {
        None => Ok(Ret(v_list(&[]))),
        Some(caps) => Ok(Ret(match_result(&subject, &caps))),
    }
}

fn bf_match(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    do_match(bf_args, false)
}

fn bf_rmatch(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    do_match(bf_args, true)
}

/// `substitute(template, match_result)`: interpolate `%0`..`%9` spans of the
/// matched subject into the template.
fn bf_substitute(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let template = str_arg(&bf_args.args[0])?.to_text().into_owned();
    let Variant::List(subs) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if subs.len() != 4 {
        return Err(BfErr::Code(E_INVARG));
    }
    let (start, end, replacements, subject) = (
        subs.index(1).unwrap(),
        subs.index(2).unwrap(),
        subs.index(3).unwrap(),
        subs.index(4).unwrap(),
    );
    let (Variant::Int(start), Variant::Int(end)) = (start.variant(), end.variant()) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let Variant::Str(subject) = subject.variant() else {
        return Err(BfErr::Code(E_INVARG));
    };
    let Variant::List(replacements) = replacements.variant() else {
        return Err(BfErr::Code(E_INVARG));
    };
    let subject = subject.to_text().into_owned();
    let span = |s: i64, e: i64| -> Result<String, BfErr> {
        if s == 0 && e == -1 {
            return Ok(String::new());
        }
        if s < 1 || e < s - 1 || e as usize > subject.len() {
            return Err(BfErr::Code(E_INVARG));
        }
        subject
            .get((s - 1) as usize..e as usize)
            .map(|p| p.to_string())
            .ok_or(BfErr::Code(E_INVARG))
    };
    let mut out = String::new();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(d @ '0'..='9') => {
                let n = d.to_digit(10).unwrap() as usize;
                let piece = if n == 0 {
                    span(*start, *end)?
                } else {
                    let Some(pair) = replacements.as_slice().get(n - 1) else {
                        return Err(BfErr::Code(E_INVARG));
                    };
                    let Variant::List(pair) = pair.variant() else {
                        return Err(BfErr::Code(E_INVARG));
                    };
                    let (Some(s), Some(e)) = (pair.as_slice().first(), pair.as_slice().get(1))
                    else {
                        return Err(BfErr::Code(E_INVARG));
                    };
                    let (Variant::Int(s), Variant::Int(e)) = (s.variant(), e.variant()) else {
                        return Err(BfErr::Code(E_INVARG));
                    };
                    span(*s, *e)?
                };
                out.push_str(&piece);
            }
            _ => return Err(BfErr::Code(E_INVARG)),
        }
    }
    Ok(Ret(v_string(out)))
}

// ---- crypt / salt / random bytes ----

fn bf_crypt(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let text = str_arg(&bf_args.args[0])?.to_text().into_owned();
    let salt = match bf_args.args.get(1) {
        Some(v) => str_arg(v)?.to_text().into_owned(),
        None => {
            // Two random characters from the crypt alphabet.
            const ALPHABET: &[u8] =
                b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
            let mut rng = rand::rng();
            let a = ALPHABET[rand::Rng::random_range(&mut rng, 0..ALPHABET.len())];
            let b = ALPHABET[rand::Rng::random_range(&mut rng, 0..ALPHABET.len())];
            String::from_utf8(vec![a, b]).unwrap()
        }
    };
    let hashed = pwhash::unix::crypt(text.as_str(), salt.as_str())
        .map_err(|_| BfErr::Code(E_INVARG))?;
    Ok(Ret(v_string(hashed)))
}

fn bf_salt(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let prefix = str_arg(&bf_args.args[0])?.to_text().into_owned();
    let random = str_arg(&bf_args.args[1])?;
    let Some(bytes) = binary_to_bytes(random.as_bytes()) else {
        return Err(BfErr::Code(E_INVARG));
    };
    if bytes.is_empty() {
        return Err(BfErr::Code(E_INVARG));
    }
    // The crypt64 alphabet, bias-folded over the random input.
    const ALPHABET: &[u8] =
        b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let salt_chars: String = bytes
        .iter()
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect();
    let salt = match prefix.as_str() {
        "" => salt_chars.chars().take(2).collect::<String>(),
        p if p.starts_with('$') => format!("{p}{salt_chars}$"),
        _ => return Err(BfErr::Code(E_INVARG)),
    };
    Ok(Ret(v_string(salt)))
}

fn bf_random_bytes(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Int(n) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if *n < 0 || *n > 10000 {
        return Err(BfErr::Code(E_INVARG));
    }
    let mut bytes = vec![0u8; *n as usize];
    rand::Rng::fill(&mut rand::rng(), &mut bytes[..]);
    Ok(Ret(v_string(bytes_to_binary(&bytes))))
}

// ---- base64 ----

fn bf_encode_base64(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let s = str_arg(&bf_args.args[0])?;
    let url_safe = bf_args.args.get(1).map(|v| v.is_true()).unwrap_or(false);
    let Some(bytes) = binary_to_bytes(s.as_bytes()) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let encoded = if url_safe {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&bytes)
    } else {
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    };
    Ok(Ret(v_string(encoded)))
}

fn bf_decode_base64(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let s = str_arg(&bf_args.args[0])?.to_text().into_owned();
    let url_safe = bf_args.args.get(1).map(|v| v.is_true()).unwrap_or(false);
    let decoded = if url_safe {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s.as_bytes())
    } else {
        base64::engine::general_purpose::STANDARD.decode(s.as_bytes())
    };
    let bytes = decoded.map_err(|_| BfErr::Code(E_INVARG))?;
    Ok(Ret(v_string(bytes_to_binary(&bytes))))
}

// ---- hashes ----

fn hex_upper(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02X}").unwrap();
    }
    s
}

/// Hash `data` with the named algorithm (default SHA256), yielding uppercase
/// hex or, with `binary`, a MOO binary string of the digest bytes.
pub(crate) fn digest_hex(
    data: &[u8],
    algo: Option<&Var>,
    binary: bool,
) -> Result<Var, BfErr> {
    let algo_name = match algo {
        None => "SHA256".to_string(),
        Some(v) => match v.variant() {
            Variant::Str(s) => s.to_text().to_ascii_uppercase(),
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    let digest: Vec<u8> = match algo_name.as_str() {
        "MD5" => Md5::digest(data).to_vec(),
        "SHA1" => Sha1::digest(data).to_vec(),
        "SHA256" => Sha256::digest(data).to_vec(),
        "SHA512" => Sha512::digest(data).to_vec(),
        _ => return Err(BfErr::Code(E_INVARG)),
    };
    Ok(if binary {
        v_string(bytes_to_binary(&digest))
    } else {
        v_string(hex_upper(&digest))
    })
}

pub(crate) fn hmac_hex(
    data: &[u8],
    key: &[u8],
    algo: Option<&Var>,
    binary: bool,
) -> Result<Var, BfErr> {
    let algo_name = match algo {
        None => "SHA256".to_string(),
        Some(v) => match v.variant() {
            Variant::Str(s) => s.to_text().to_ascii_uppercase(),
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    let digest: Vec<u8> = match algo_name.as_str() {
        "SHA1" => {
            let mut mac =
                Hmac::<Sha1>::new_from_slice(key).map_err(|_| BfErr::Code(E_INVARG))?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        "SHA256" => {
            let mut mac =
                Hmac::<Sha256>::new_from_slice(key).map_err(|_| BfErr::Code(E_INVARG))?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        "SHA512" => {
            let mut mac =
                Hmac::<Sha512>::new_from_slice(key).map_err(|_| BfErr::Code(E_INVARG))?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        _ => return Err(BfErr::Code(E_INVARG)),
    };
    Ok(if binary {
        v_string(bytes_to_binary(&digest))
    } else {
        v_string(hex_upper(&digest))
    })
}

fn bf_string_hash(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let s = str_arg(&bf_args.args[0])?;
    let binary = bf_args.args.get(2).map(|v| v.is_true()).unwrap_or(false);
    digest_hex(s.as_bytes(), bf_args.args.get(1), binary).map(Ret)
}

fn bf_binary_hash(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let s = str_arg(&bf_args.args[0])?;
    let Some(bytes) = binary_to_bytes(s.as_bytes()) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let binary = bf_args.args.get(2).map(|v| v.is_true()).unwrap_or(false);
    digest_hex(&bytes, bf_args.args.get(1), binary).map(Ret)
}

fn bf_string_hmac(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let s = str_arg(&bf_args.args[0])?;
    let key = str_arg(&bf_args.args[1])?;
    let binary = bf_args.args.get(3).map(|v| v.is_true()).unwrap_or(false);
    hmac_hex(s.as_bytes(), key.as_bytes(), bf_args.args.get(2), binary).map(Ret)
}

fn bf_binary_hmac(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let s = str_arg(&bf_args.args[0])?;
    let key = str_arg(&bf_args.args[1])?;
    let Some(bytes) = binary_to_bytes(s.as_bytes()) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let Some(key_bytes) = binary_to_bytes(key.as_bytes()) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let binary = bf_args.args.get(3).map(|v| v.is_true()).unwrap_or(false);
    hmac_hex(&bytes, &key_bytes, bf_args.args.get(2), binary).map(Ret)
}

pub(crate) fn register_bf_strings(builtins: &mut [BuiltinFunction]) {
    register(builtins, "index", bf_index);
    register(builtins, "rindex", bf_rindex);
    register(builtins, "strsub", bf_strsub);
    register(builtins, "strcmp", bf_strcmp);
    register(builtins, "match", bf_match);
    register(builtins, "rmatch", bf_rmatch);
    register(builtins, "substitute", bf_substitute);
    register(builtins, "crypt", bf_crypt);
    register(builtins, "salt", bf_salt);
    register(builtins, "random_bytes", bf_random_bytes);
    register(builtins, "encode_base64", bf_encode_base64);
    register(builtins, "decode_base64", bf_decode_base64);
    register(builtins, "string_hash", bf_string_hash);
    register(builtins, "binary_hash", bf_binary_hash);
    register(builtins, "string_hmac", bf_string_hmac);
    register(builtins, "binary_hmac", bf_binary_hmac);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_codec_round_trips() {
        let bytes = vec![0x00, 0x41, 0x7e, 0xff];
        let encoded = bytes_to_binary(&bytes);
        assert_eq!(encoded, "~00A~7E~FF");
        assert_eq!(binary_to_bytes(encoded.as_bytes()).unwrap(), bytes);
        assert!(binary_to_bytes(b"~G1").is_none());
        assert!(binary_to_bytes(b"abc~").is_none());
    }

    #[test]
    fn pattern_translation() {
        assert_eq!(translate_pattern("abc").unwrap(), "abc");
        assert_eq!(translate_pattern("a%(b%|c%)").unwrap(), "a(b|c)");
        assert_eq!(translate_pattern("(x)").unwrap(), "\\(x\\)");
        assert_eq!(translate_pattern("%w+").unwrap(), "\\w+");
        assert!(translate_pattern("%1").is_err());
    }
}
