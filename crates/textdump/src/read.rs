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

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader, Read};

use tracing::{info, warn};

use crate::{
    TdObject, TdPropval, TdVerb, TdVerbdef, Textdump, TextdumpReaderError, TYPE_CLEAR,
};
use barn_var::{
    v_bool_int, v_error, v_float, v_int, v_list, v_map_iter, v_obj, v_string, Error, Obj, Var,
    VarType, Variant, NOTHING,
};

/// The classic v4 layout encodes contents and children as head+sibling
/// chains; one of these per object carries the raw links until every block
/// is in and the chains can be resolved into lists.
struct ChainLinks {
    contents_head: Obj,
    next: Obj,
    child_head: Obj,
    sibling: Obj,
}

pub struct TextdumpReader<R: Read> {
    pub line_num: usize,
    pub version_string: String,
    version_num: u16,
    reader: BufReader<R>,
}

impl<R: Read> TextdumpReader<R> {
    pub fn new(mut reader: BufReader<R>) -> Result<Self, TextdumpReaderError> {
        let mut version_string = String::new();
        reader.read_line(&mut version_string).map_err(|e| {
            TextdumpReaderError::VersionError(format!("could not read textdump version: {e}"))
        })?;
        version_string.retain(|c| c != '\n' && c != '\r');

        info!("textdump version: {}", version_string);

        // "** LambdaMOO Database, Format Version N **" for N we understand:
        // the classic 1..=4 layouts, or the ToastStunt-style 17 with
        // relationship lists.
        let version_num = version_string
            .split("Format Version ")
            .nth(1)
            .and_then(|rest| rest.split(' ').next())
            .and_then(|n| n.parse::<u16>().ok())
            .ok_or_else(|| {
                TextdumpReaderError::VersionError(format!("invalid version: {version_string}"))
            })?;
        if !(1..=4).contains(&version_num) && version_num != 17 {
            return Err(TextdumpReaderError::VersionError(format!(
                "unsupported format version {version_num}"
            )));
        }

        Ok(Self {
            version_string,
            version_num,
            reader,
            line_num: 2,
        })
    }

    /// One raw line, without its terminator. Bytes, not UTF-8: MOO strings
    /// are byte sequences, and old dumps carry Latin-1.
    fn read_line_bytes(&mut self) -> Result<Vec<u8>, TextdumpReaderError> {
        let mut buf = Vec::new();
        self.reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| TextdumpReaderError::IoError(e, self.line_num))?;
        if buf.is_empty() {
            return Err(TextdumpReaderError::ParseError(
                "unexpected end of file".into(),
                self.line_num,
            ));
        }
        while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
            buf.pop();
        }
        self.line_num += 1;
        Ok(buf)
    }

    fn read_string(&mut self) -> Result<String, TextdumpReaderError> {
        let bytes = self.read_line_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_num(&mut self) -> Result<i64, TextdumpReaderError> {
        let buf = self.read_string()?;
        buf.trim().parse().map_err(|_| {
            TextdumpReaderError::ParseError(format!("invalid number: {buf}"), self.line_num)
        })
    }

    fn read_objid(&mut self) -> Result<Obj, TextdumpReaderError> {
        Ok(Obj(self.read_num()?))
    }

    fn read_float(&mut self) -> Result<f64, TextdumpReaderError> {
        let buf = self.read_string()?;
        buf.trim().parse().map_err(|_| {
            TextdumpReaderError::ParseError(format!("invalid float: {buf}"), self.line_num)
        })
    }

    fn read_verbdef(&mut self) -> Result<TdVerbdef, TextdumpReaderError> {
        let name = self.read_string()?;
        let owner = self.read_objid()?;
        let flags = self.read_num()? as u16;
        let prep = self.read_num()? as i16;
        Ok(TdVerbdef {
            name,
            owner,
            flags,
            prep,
        })
    }

    fn read_var(&mut self) -> Result<(Var, bool), TextdumpReaderError> {
        let t_num = self.read_num()?;
        if t_num == TYPE_CLEAR {
            return Ok((v_int(0), true));
        }
        let vtype = VarType::from_repr(t_num as u8).ok_or_else(|| {
            TextdumpReaderError::ParseError(format!("invalid type code: {t_num}"), self.line_num)
        })?;
        let v = match vtype {
            VarType::TYPE_INT => v_int(self.read_num()?),
            VarType::TYPE_OBJ => v_obj(self.read_objid()?),
            VarType::TYPE_STR => {
                let bytes = self.read_line_bytes()?;
                barn_var::Var::from_variant(barn_var::Variant::Str(barn_var::Str::mk_bytes(
                    bytes,
                )))
            }
            VarType::TYPE_ERR => {
                let e_num = self.read_num()?;
                let code = barn_var::ErrorCode::from_repr(e_num as u8).ok_or_else(|| {
                    TextdumpReaderError::ParseError(
                        format!("invalid error code: {e_num}"),
                        self.line_num,
                    )
                })?;
                v_error(Error::from(code))
            }
            VarType::TYPE_LIST => {
                let l_size = self.read_num()?;
                let mut v = Vec::with_capacity(l_size as usize);
                for _ in 0..l_size {
                    v.push(self.read_var()?.0);
                }
                v_list(&v)
            }
            VarType::TYPE_MAP => {
                let num_pairs = self.read_num()?;
                let mut pairs = Vec::with_capacity(num_pairs as usize);
                for _ in 0..num_pairs {
                    let key = self.read_var()?.0;
                    let value = self.read_var()?.0;
                    pairs.push((key, value));
                }
                v_map_iter(pairs.iter()).map_err(|e| {
                    TextdumpReaderError::ParseError(
                        format!("illegal map key in dump: {e}"),
                        self.line_num,
                    )
                })?
            }
            VarType::TYPE_NONE => v_int(0),
            VarType::TYPE_FLOAT => v_float(self.read_float()?),
            VarType::TYPE_BOOL => {
                let s = self.read_string()?;
                v_bool_int(s == "true" || s == "1")
            }
            _ => {
                return Err(TextdumpReaderError::ParseError(
                    format!("unsupported value type in dump: {vtype:?}"),
                    self.line_num,
                ))
            }
        };
        Ok((v, false))
    }

    fn read_propval(&mut self) -> Result<TdPropval, TextdumpReaderError> {
        let (value, is_clear) = self.read_var()?;
        let owner = self.read_objid()?;
        let flags = self.read_num()? as u8;
        Ok(TdPropval {
            value,
            is_clear,
            owner,
            flags,
        })
    }

    /// A value that must be an object reference or a list of them:
    /// the v17 encoding of parents, contents, and children. A bare `#-1`
    /// reads as the empty list.
    fn read_obj_list(&mut self) -> Result<Vec<Obj>, TextdumpReaderError> {
        let (v, _) = self.read_var()?;
        match v.variant() {
            Variant::Obj(o) => Ok(if *o == NOTHING { vec![] } else { vec![*o] }),
            Variant::List(l) => {
                let mut out = Vec::with_capacity(l.len());
                for e in l.iter() {
                    let Variant::Obj(o) = e.variant() else {
                        return Err(TextdumpReaderError::ParseError(
                            "non-object in object list".into(),
                            self.line_num,
                        ));
                    };
                    out.push(*o);
                }
                Ok(out)
            }
            _ => Err(TextdumpReaderError::ParseError(
                "expected object or object list".into(),
                self.line_num,
            )),
        }
    }

    fn read_object(
        &mut self,
    ) -> Result<Option<(TdObject, Option<ChainLinks>)>, TextdumpReaderError> {
        let id_line = self.read_string()?;
        let id_line = id_line.trim();
        let Some(rest) = id_line.strip_prefix('#') else {
            return Err(TextdumpReaderError::ParseError(
                format!("expected object header, got: {id_line}"),
                self.line_num,
            ));
        };
        if let Some(id_part) = rest.strip_suffix(" recycled") {
            let _id: i64 = id_part.trim().parse().map_err(|_| {
                TextdumpReaderError::ParseError(format!("bad object id: {id_line}"), self.line_num)
            })?;
            return Ok(None);
        }
        let id: i64 = rest.parse().map_err(|_| {
            TextdumpReaderError::ParseError(format!("bad object id: {id_line}"), self.line_num)
        })?;

        let name = self.read_string()?;
        let _handles = self.read_string()?; // historical, always blank
        let flags = self.read_num()? as u8;
        let owner = self.read_objid()?;
        let location = self.read_objid()?;

        // Object relationships: the classic layout carries a single parent
        // plus head+sibling chains (resolved after all blocks are in); v17
        // stores the lists directly.
        let (contents, parents, children, links) = if self.version_num <= 4 {
            let contents_head = self.read_objid()?;
            let next = self.read_objid()?;
            let parent = self.read_objid()?;
            let child_head = self.read_objid()?;
            let sibling = self.read_objid()?;
            let parents = if parent == NOTHING {
                vec![]
            } else {
                vec![parent]
            };
            (
                vec![],
                parents,
                vec![],
                Some(ChainLinks {
                    contents_head,
                    next,
                    child_head,
                    sibling,
                }),
            )
        } else {
            let contents = self.read_obj_list()?;
            let parents = self.read_obj_list()?;
            let children = self.read_obj_list()?;
            (contents, parents, children, None)
        };

        let num_verbs = self.read_num()?;
        let mut verbdefs = Vec::with_capacity(num_verbs as usize);
        for _ in 0..num_verbs {
            verbdefs.push(self.read_verbdef()?);
        }

        let num_propdefs = self.read_num()?;
        let mut propdefs = Vec::with_capacity(num_propdefs as usize);
        for _ in 0..num_propdefs {
            propdefs.push(self.read_string()?);
        }

        let num_propvals = self.read_num()?;
        let mut propvals = Vec::with_capacity(num_propvals as usize);
        for _ in 0..num_propvals {
            propvals.push(self.read_propval()?);
        }

        Ok(Some((
            TdObject {
                id: Obj(id),
                name,
                flags,
                owner,
                location,
                contents,
                parents,
                children,
                verbdefs,
                propdefs,
                propvals,
            },
            links,
        )))
    }

    fn read_program(&mut self) -> Result<String, TextdumpReaderError> {
        let mut lines = vec![];
        loop {
            let line = self.read_line_bytes()?;
            if line == b"." {
                return Ok(lines.join("\n"));
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
    }

    pub fn read_textdump(mut self) -> Result<Textdump, TextdumpReaderError> {
        let nobjs = self.read_num()?;
        let nprogs = self.read_num()?;
        let _dummy = self.read_num()?;
        let nusers = self.read_num()?;

        let mut users = Vec::with_capacity(nusers as usize);
        for _ in 0..nusers {
            users.push(self.read_objid()?);
        }

        let mut objects = BTreeMap::new();
        let mut chains: HashMap<i64, ChainLinks> = HashMap::new();
        for _ in 0..nobjs {
            if let Some((object, links)) = self.read_object()? {
                if let Some(links) = links {
                    chains.insert(object.id.0, links);
                }
                objects.insert(object.id.0, object);
            }
        }

        // Classic dumps: walk the head+sibling chains into the lists.
        if self.version_num <= 4 {
            let max_len = objects.len();
            let ids: Vec<i64> = objects.keys().copied().collect();
            for id in ids {
                let (contents_head, child_head) = match chains.get(&id) {
                    Some(l) => (l.contents_head, l.child_head),
                    None => (NOTHING, NOTHING),
                };
                let contents =
                    follow_chain(&chains, contents_head, max_len, |l| l.next);
                let children =
                    follow_chain(&chains, child_head, max_len, |l| l.sibling);
                let object = objects.get_mut(&id).expect("object just inserted");
                object.contents = contents;
                object.children = children;
            }
        }

        let mut verbs = BTreeMap::new();
        for _ in 0..nprogs {
            let header = self.read_string()?;
            let header = header.trim();
            let Some((objid, verbnum)) = header
                .strip_prefix('#')
                .and_then(|r| r.split_once(':'))
                .and_then(|(o, v)| {
                    Some((o.parse::<i64>().ok()?, v.parse::<usize>().ok()?))
                })
            else {
                return Err(TextdumpReaderError::ParseError(
                    format!("expected verb program header, got: {header}"),
                    self.line_num,
                ));
            };
            let program = self.read_program()?;
            verbs.insert(
                (objid, verbnum),
                TdVerb {
                    objid: Obj(objid),
                    verbnum,
                    program,
                },
            );
        }

        // Trailing clocks/tasks stanzas are accepted and ignored.
        Ok(Textdump {
            version_string: self.version_string,
            objects,
            users,
            verbs,
        })
    }
}

/// Walk one head+sibling chain, bounded by the object count so a corrupt
/// dump cannot loop forever.
fn follow_chain(
    chains: &HashMap<i64, ChainLinks>,
    head: Obj,
    max_len: usize,
    next: impl Fn(&ChainLinks) -> Obj,
) -> Vec<Obj> {
    let mut out = vec![];
    let mut cur = head;
    while cur != NOTHING {
        if out.len() > max_len {
            warn!("cyclic object chain in textdump at {}", cur);
            break;
        }
        out.push(cur);
        let Some(links) = chains.get(&cur.0) else {
            warn!("dangling chain reference to {} in textdump", cur);
            break;
        };
        cur = next(links);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    #[test]
    fn rejects_bad_version() {
        let src = "** Unknown Database **\n";
        assert!(TextdumpReader::new(BufReader::new(src.as_bytes())).is_err());
    }

    #[test]
    fn reads_minimal_dump() {
        let src = "\
** LambdaMOO Database, Format Version 4 **
1
0
0
0
#0
System Object

0
-1
-1
-1
-1
-1
-1
-1
0
1
test
1
0
17
-1
5
0 clocks
0 queued tasks
0 suspended tasks
";
        let reader = TextdumpReader::new(BufReader::new(src.as_bytes())).unwrap();
        let td = reader.read_textdump().unwrap();
        assert_eq!(td.objects.len(), 1);
        let o = &td.objects[&0];
        assert_eq!(o.name, "System Object");
        assert_eq!(o.propdefs, vec!["test".to_string()]);
        assert_eq!(o.propvals.len(), 1);
        assert_eq!(o.propvals[0].value, v_int(17));
        assert_eq!(o.propvals[0].flags, 5);
    }

    #[test]
    fn reads_string_and_list_values() {
        let src = "\
** LambdaMOO Database, Format Version 4 **
1
0
0
0
#0
Root

0
-1
-1
-1
-1
-1
-1
-1
0
1
stuff
1
4
2
2
hello
0
42
-1
5
";
        let td = TextdumpReader::new(BufReader::new(src.as_bytes()))
            .unwrap()
            .read_textdump()
            .unwrap();
        let pv = &td.objects[&0].propvals[0];
        assert_eq!(
            pv.value,
            v_list(&[v_string("hello".into()), v_int(42)])
        );
    }

    #[test]
    fn reads_v17_parent_lists() {
        // #2 inherits from both #0 and #1; #0 and #1 each list #2 as a
        // child. Relationships are values: `1` = TYPE_OBJ, `4` = TYPE_LIST.
        let src = "\
** LambdaMOO Database, Format Version 17 **
3
0
0
0
#0
Alpha

0
-1
-1
4
0
1
-1
4
1
1
2
0
0
0
#1
Beta

0
-1
-1
4
0
1
-1
4
1
1
2
0
0
0
#2
Gamma

0
-1
-1
4
0
4
2
1
0
1
1
1
-1
0
0
0
0 clocks
0 queued tasks
0 suspended tasks
";
        let td = TextdumpReader::new(BufReader::new(src.as_bytes()))
            .unwrap()
            .read_textdump()
            .unwrap();
        assert_eq!(td.objects[&2].parents, vec![Obj(0), Obj(1)]);
        assert_eq!(td.objects[&2].children, vec![]);
        assert_eq!(td.objects[&0].children, vec![Obj(2)]);
        assert_eq!(td.objects[&1].children, vec![Obj(2)]);
        assert_eq!(td.objects[&0].parents, vec![]);
        assert_eq!(td.objects[&0].contents, vec![]);
    }
}
