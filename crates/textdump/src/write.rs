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

use crate::{TdObject, TdPropval, TdVerbdef, Textdump, TYPE_CLEAR};
use barn_var::{Var, VarType, Variant};
use std::io;

pub struct TextdumpWriter<W: io::Write> {
    writer: W,
}

impl<W: io::Write> TextdumpWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_verbdef(&mut self, verbdef: &TdVerbdef) -> Result<(), io::Error> {
        writeln!(self.writer, "{}", verbdef.name)?;
        writeln!(self.writer, "{}", verbdef.owner.0)?;
        writeln!(self.writer, "{}", verbdef.flags)?;
        writeln!(self.writer, "{}", verbdef.prep)?;
        Ok(())
    }

    fn write_var(&mut self, var: &Var, is_clear: bool) -> Result<(), io::Error> {
        if is_clear {
            writeln!(self.writer, "{TYPE_CLEAR}")?;
            return Ok(());
        }
        match var.variant() {
            Variant::Int(i) => {
                writeln!(self.writer, "{}\n{}", VarType::TYPE_INT as i64, i)?;
            }
            Variant::Bool(b) => {
                writeln!(self.writer, "{}\n{}", VarType::TYPE_BOOL as i64, b)?;
            }
            Variant::Obj(o) => {
                writeln!(self.writer, "{}\n{}", VarType::TYPE_OBJ as i64, o.0)?;
            }
            Variant::Str(s) => {
                writeln!(self.writer, "{}", VarType::TYPE_STR as i64)?;
                self.writer.write_all(s.as_bytes())?;
                writeln!(self.writer)?;
            }
            Variant::Err(e) => {
                writeln!(
                    self.writer,
                    "{}\n{}",
                    VarType::TYPE_ERR as i64,
                    e.err_type.to_int()
                )?;
            }
            Variant::List(l) => {
                writeln!(self.writer, "{}\n{}", VarType::TYPE_LIST as i64, l.len())?;
                for v in l.iter() {
                    self.write_var(v, false)?;
                }
            }
            Variant::Map(m) => {
                writeln!(self.writer, "{}\n{}", VarType::TYPE_MAP as i64, m.len())?;
                for (k, v) in m.iter() {
                    self.write_var(k, false)?;
                    self.write_var(v, false)?;
                }
            }
            Variant::None => {
                writeln!(self.writer, "{}", VarType::TYPE_NONE as i64)?;
            }
            Variant::Float(f) => {
                writeln!(self.writer, "{}\n{:?}", VarType::TYPE_FLOAT as i64, f)?;
            }
            // Anonymous objects and waifs do not survive a dump; their slots
            // read back as 0.
            Variant::Anon(_) | Variant::Waif(_) => {
                writeln!(self.writer, "{}\n0", VarType::TYPE_INT as i64)?;
            }
        }
        Ok(())
    }

    fn write_propval(&mut self, propval: &TdPropval) -> Result<(), io::Error> {
        self.write_var(&propval.value, propval.is_clear)?;
        writeln!(self.writer, "{}", propval.owner.0)?;
        writeln!(self.writer, "{}", propval.flags)?;
        Ok(())
    }

    /// An object list as a value: `TYPE_LIST` of `TYPE_OBJ` entries.
    fn write_obj_list(&mut self, objs: &[barn_var::Obj]) -> Result<(), io::Error> {
        writeln!(self.writer, "{}\n{}", VarType::TYPE_LIST as i64, objs.len())?;
        for o in objs {
            writeln!(self.writer, "{}\n{}", VarType::TYPE_OBJ as i64, o.0)?;
        }
        Ok(())
    }

    /// The parents slot: a single object (or `#-1` for none) when there is
    /// at most one, a list when there are more.
    fn write_parents(&mut self, parents: &[barn_var::Obj]) -> Result<(), io::Error> {
        match parents {
            [] => writeln!(self.writer, "{}\n-1", VarType::TYPE_OBJ as i64),
            [p] => writeln!(self.writer, "{}\n{}", VarType::TYPE_OBJ as i64, p.0),
            many => self.write_obj_list(many),
        }
    }

    fn write_object(&mut self, object: &TdObject) -> Result<(), io::Error> {
        writeln!(self.writer, "#{}\n{}\n", object.id.0, &object.name)?;
        writeln!(self.writer, "{}", object.flags)?;
        writeln!(self.writer, "{}", object.owner.0)?;
        writeln!(self.writer, "{}", object.location.0)?;
        self.write_obj_list(&object.contents)?;
        self.write_parents(&object.parents)?;
        self.write_obj_list(&object.children)?;
        writeln!(self.writer, "{}", object.verbdefs.len())?;
        for verbdef in &object.verbdefs {
            self.write_verbdef(verbdef)?;
        }
        writeln!(self.writer, "{}", object.propdefs.len())?;
        for propdef in &object.propdefs {
            writeln!(self.writer, "{propdef}")?;
        }
        writeln!(self.writer, "{}", object.propvals.len())?;
        for propval in &object.propvals {
            self.write_propval(propval)?;
        }
        Ok(())
    }

    pub fn write_textdump(&mut self, textdump: &Textdump) -> Result<(), io::Error> {
        writeln!(self.writer, "{}", &textdump.version_string)?;
        writeln!(
            self.writer,
            "{}\n{}\n0\n{}",
            textdump.objects.len(),
            textdump.verbs.len(),
            textdump.users.len()
        )?;
        for user in &textdump.users {
            writeln!(self.writer, "{}", user.0)?;
        }
        for object in textdump.objects.values() {
            self.write_object(object)?;
        }
        for verb in textdump.verbs.values() {
            writeln!(self.writer, "#{}:{}", verb.objid.0, verb.verbnum)?;
            if !verb.program.is_empty() {
                writeln!(self.writer, "{}", verb.program)?;
            }
            writeln!(self.writer, ".")?;
        }
        writeln!(self.writer, "0 clocks")?;
        writeln!(self.writer, "0 queued tasks")?;
        writeln!(self.writer, "0 suspended tasks")?;
        Ok(())
    }
}
