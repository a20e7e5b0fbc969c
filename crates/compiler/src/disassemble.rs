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

use crate::builtins::BUILTINS;
use crate::opcode::{Op, ScatterLabel};
use crate::program::Program;
use crate::unparse::to_literal;

/// Render a compiled program as one string per instruction, for the
/// `disassemble()` builtin.
pub fn disassemble_program(program: &Program) -> Vec<String> {
    let mut out = vec![];
    out.push("Main vector:".to_string());
    render_vector(program, &program.main_vector, &mut out);
    for (i, fv) in program.fork_vectors.iter().enumerate() {
        out.push(format!("Fork vector {i}:"));
        render_vector(program, &fv.ops, &mut out);
    }
    out
}

fn render_vector(program: &Program, ops: &[Op], out: &mut Vec<String>) {
    for (pc, op) in ops.iter().enumerate() {
        out.push(format!("{pc:>4}: {}", render_op(program, op)));
    }
}

fn name_of(program: &Program, name: &crate::labels::Name) -> String {
    program
        .var_names
        .name_of(name)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("var{}", name.0))
}

fn render_op(program: &Program, op: &Op) -> String {
    match op {
        Op::Imm(label) => format!(
            "PUSH_LITERAL {}",
            to_literal(&program.literals[label.0 as usize])
        ),
        Op::ImmInt(i) => format!("PUSH_LITERAL {i}"),
        Op::ImmFloat(f) => format!("PUSH_LITERAL {f:?}"),
        Op::ImmObjid(o) => format!("PUSH_LITERAL {o}"),
        Op::ImmErr(e) => format!("PUSH_LITERAL {}", e.name()),
        Op::ImmNone => "PUSH_LITERAL 0".to_string(),
        Op::ImmEmptyList => "PUSH_LITERAL {}".to_string(),
        Op::MakeSingletonList => "MAKE_SINGLETON_LIST".to_string(),
        Op::ListAddTail => "LIST_ADD_TAIL".to_string(),
        Op::ListAppend => "LIST_APPEND".to_string(),
        Op::CheckListForSplice => "CHECK_LIST_FOR_SPLICE".to_string(),
        Op::MakeMap => "MAKE_MAP".to_string(),
        Op::MapInsert => "MAP_INSERT".to_string(),
        Op::Pop => "POP".to_string(),
        Op::Push(n) => format!("PUSH {}", name_of(program, n)),
        Op::Put(n) => format!("PUT {}", name_of(program, n)),
        Op::PutTemp => "PUT_TEMP".to_string(),
        Op::PushTemp => "PUSH_TEMP".to_string(),
        Op::Ref => "INDEX".to_string(),
        Op::PushRef => "INDEX_PUSH".to_string(),
        Op::RangeRef => "RANGE".to_string(),
        Op::IndexSet => "INDEXSET".to_string(),
        Op::RangeSet => "RANGESET".to_string(),
        Op::Length(o) => format!("LENGTH {}", o.0),
        Op::GetProp => "GET_PROP".to_string(),
        Op::PushGetProp => "PUSH_GET_PROP".to_string(),
        Op::PutProp => "PUT_PROP".to_string(),
        Op::Eq => "EQ".to_string(),
        Op::Ne => "NE".to_string(),
        Op::Gt => "GT".to_string(),
        Op::Lt => "LT".to_string(),
        Op::Ge => "GE".to_string(),
        Op::Le => "LE".to_string(),
        Op::In => "IN".to_string(),
        Op::Add => "ADD".to_string(),
        Op::Sub => "SUB".to_string(),
        Op::Mul => "MUL".to_string(),
        Op::Div => "DIV".to_string(),
        Op::Mod => "MOD".to_string(),
        Op::Exp => "POW".to_string(),
        Op::BitAnd => "BITAND".to_string(),
        Op::BitOr => "BITOR".to_string(),
        Op::BitXor => "BITXOR".to_string(),
        Op::Shl => "SHL".to_string(),
        Op::Shr => "SHR".to_string(),
        Op::Complement => "COMPLEMENT".to_string(),
        Op::Not => "NOT".to_string(),
        Op::UnaryMinus => "NEG".to_string(),
        Op::And(l) => format!("AND {}", l.0),
        Op::Or(l) => format!("OR {}", l.0),
        Op::Jump { label } => format!("JUMP {}", label.0),
        Op::If(l) => format!("IF {}", l.0),
        Op::Eif(l) => format!("EIF {}", l.0),
        Op::IfQues(l) => format!("IF_EXPR {}", l.0),
        Op::While(l) => format!("WHILE {}", l.0),
        Op::WhileId { id, end_label } => {
            format!("WHILE_ID {} {}", name_of(program, id), end_label.0)
        }
        Op::ForList { id, aux, end_label } => match aux {
            None => format!("FOR_LIST {} {}", name_of(program, id), end_label.0),
            Some(aux) => format!(
                "FOR_LIST {} {} {}",
                name_of(program, id),
                name_of(program, aux),
                end_label.0
            ),
        },
        Op::ForRange { id, end_label } => {
            format!("FOR_RANGE {} {}", name_of(program, id), end_label.0)
        }
        Op::Exit { label, .. } => format!("EXIT {}", label.0),
        Op::CallVerb => "CALL_VERB".to_string(),
        Op::FuncCall { id } => {
            let name = BUILTINS
                .name_of(*id)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("bf{}", id.0));
            format!("CALL_FUNC {name}")
        }
        Op::Pass => "PASS".to_string(),
        Op::Return => "RETURN".to_string(),
        Op::Return0 => "RETURN 0".to_string(),
        Op::Done => "DONE".to_string(),
        Op::Fork { fv_offset, id } => match id {
            None => format!("FORK {}", fv_offset.0),
            Some(id) => format!("FORK {} {}", fv_offset.0, name_of(program, id)),
        },
        Op::Scatter(sa) => {
            let parts: Vec<String> = sa
                .labels
                .iter()
                .map(|l| match l {
                    ScatterLabel::Required(n) => name_of(program, n),
                    ScatterLabel::Optional(n, _) => format!("?{}", name_of(program, n)),
                    ScatterLabel::Rest(n) => format!("@{}", name_of(program, n)),
                })
                .collect();
            format!("SCATTER {}", parts.join(", "))
        }
        Op::PushCatchLabel(l) => format!("PUSH_LABEL {}", l.0),
        Op::TryCatch { handler_label } => format!("TRY_CATCH {}", handler_label.0),
        Op::EndCatch(l) => format!("END_CATCH {}", l.0),
        Op::TryExcept { num_excepts } => format!("TRY_EXCEPT {num_excepts}"),
        Op::EndExcept(l) => format!("END_EXCEPT {}", l.0),
        Op::TryFinally(l) => format!("TRY_FINALLY {}", l.0),
        Op::EndFinally => "END_FINALLY".to_string(),
        Op::FinallyContinue => "FINALLY_CONTINUE".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::compile;

    #[test]
    fn well_known_names_appear() {
        let p = compile("return 1 + 2;").unwrap();
        let lines = disassemble_program(&p).join("\n");
        assert!(lines.contains("ADD"));
        assert!(lines.contains("RETURN"));

        let p = compile("return (1 &. 2) |. (3 ^. 4) << 1 >> ~1;").unwrap();
        let lines = disassemble_program(&p).join("\n");
        for needle in ["BITAND", "BITOR", "BITXOR", "SHL", "SHR", "COMPLEMENT"] {
            assert!(lines.contains(needle), "missing {needle} in:\n{lines}");
        }

        let p = compile("x = -y;").unwrap();
        let lines = disassemble_program(&p).join("\n");
        assert!(lines.contains("NEG"));
        assert!(lines.contains("PUSH y"));
        assert!(lines.contains("PUT x"));
    }
}
