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

//! Takes the AST and turns it into a flat list of opcodes with a jump-fixup
//! table, a literal pool, fork vectors, and line-number spans.

use crate::ast::{
    Arg, BinaryOp, CatchCodes, Expr, ScatterItem, ScatterKind, Stmt, StmtNode, UnaryOp,
};
use crate::builtins::BUILTINS;
use crate::errors::CompileError;
use crate::labels::{JumpLabel, Label, Name, Offset};
use crate::names::Names;
use crate::opcode::{Op, ScatterArgs, ScatterLabel};
use crate::parse::parse_program;
use crate::program::{ForkVector, Program};
use barn_var::Variant;
use std::rc::Rc;

struct Loop {
    loop_name: Option<Name>,
    top_label: Label,
    top_stack: Offset,
    bottom_label: Label,
    bottom_stack: Offset,
}

struct CodegenState {
    ops: Vec<Op>,
    jumps: Vec<JumpLabel>,
    var_names: Names,
    literals: Vec<barn_var::Var>,
    loops: Vec<Loop>,
    saved_stack: Option<Offset>,
    cur_stack: usize,
    max_stack: usize,
    fork_vectors: Vec<ForkVector>,
    line_number_spans: Vec<(usize, usize)>,
}

impl CodegenState {
    fn new(var_names: Names) -> Self {
        Self {
            ops: vec![],
            jumps: vec![],
            var_names,
            literals: vec![],
            loops: vec![],
            saved_stack: None,
            cur_stack: 0,
            max_stack: 0,
            fork_vectors: vec![],
            line_number_spans: vec![],
        }
    }

    // Create an anonymous jump label at the current position and return its id.
    fn make_jump_label(&mut self, name: Option<Name>) -> Label {
        let id = Label(self.jumps.len() as u16);
        let position = self.ops.len().into();
        self.jumps.push(JumpLabel { id, name, position });
        id
    }

    // Adjust the position of a jump label to the current position.
    fn commit_jump_label(&mut self, id: Label) {
        let position = self.ops.len();
        let jump = self
            .jumps
            .get_mut(id.0 as usize)
            .expect("invalid jump fixup");
        jump.position = position.into();
    }

    fn add_literal(&mut self, v: &barn_var::Var) -> Label {
        // Case-sensitive compare, so "Foo" and "foo" stay distinct literals.
        let lv_pos = self
            .literals
            .iter()
            .position(|lv| lv.eq_case_sensitive(v));
        let pos = lv_pos.unwrap_or_else(|| {
            self.literals.push(v.clone());
            self.literals.len() - 1
        });
        Label(pos as u16)
    }

    fn emit(&mut self, op: Op) {
        self.ops.push(op);
    }

    fn find_loop(&self, loop_label: &Name) -> Result<&Loop, CompileError> {
        self.loops
            .iter()
            .find(|l| l.loop_name.as_ref() == Some(loop_label))
            .ok_or_else(|| {
                let name = self
                    .var_names
                    .name_of(loop_label)
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                CompileError::UnknownLoopLabel(name)
            })
    }

    fn push_stack(&mut self, n: usize) {
        self.cur_stack += n;
        if self.cur_stack > self.max_stack {
            self.max_stack = self.cur_stack;
        }
    }

    fn pop_stack(&mut self, n: usize) {
        self.cur_stack -= n;
    }

    fn saved_stack_top(&self) -> Option<Offset> {
        self.saved_stack
    }

    fn save_stack_top(&mut self) -> Option<Offset> {
        let old = self.saved_stack;
        self.saved_stack = Some((self.cur_stack - 1).into());
        old
    }

    fn restore_stack_top(&mut self, old: Option<Offset>) {
        self.saved_stack = old
    }

    fn generate_assign(&mut self, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        self.push_lvalue(left, false)?;
        self.generate_expr(right)?;
        match left {
            Expr::Range { .. } | Expr::Index(..) => self.emit(Op::PutTemp),
            _ => {}
        }
        let mut is_indexed = false;
        let mut e = left;
        loop {
            // Figure out the form of assignment, handle it, then walk through
            // chained index/range targets toward the base.
            match e {
                Expr::Range { base, .. } => {
                    self.emit(Op::RangeSet);
                    self.pop_stack(3);
                    e = base;
                    is_indexed = true;
                }
                Expr::Index(lhs, _) => {
                    self.emit(Op::IndexSet);
                    self.pop_stack(2);
                    e = lhs;
                    is_indexed = true;
                }
                Expr::Id(name) => {
                    self.emit(Op::Put(*name));
                    break;
                }
                Expr::Prop { .. } => {
                    self.emit(Op::PutProp);
                    self.pop_stack(2);
                    break;
                }
                _ => return Err(CompileError::BadAssignmentTarget),
            }
        }
        if is_indexed {
            self.emit(Op::Pop);
            self.emit(Op::PushTemp);
        }
        Ok(())
    }

    fn generate_scatter_assign(
        &mut self,
        scatter: &[ScatterItem],
        right: &Expr,
    ) -> Result<(), CompileError> {
        self.generate_expr(right)?;
        let labels: Vec<(&ScatterItem, ScatterLabel)> = scatter
            .iter()
            .map(|s| {
                let kind_label = match s.kind {
                    ScatterKind::Required => ScatterLabel::Required(s.id),
                    ScatterKind::Optional => ScatterLabel::Optional(
                        s.id,
                        if s.expr.is_some() {
                            Some(self.make_jump_label(None))
                        } else {
                            None
                        },
                    ),
                    ScatterKind::Rest => ScatterLabel::Rest(s.id),
                };
                (s, kind_label)
            })
            .collect();
        let done = self.make_jump_label(None);
        self.emit(Op::Scatter(Box::new(ScatterArgs {
            labels: labels.iter().map(|(_, l)| l.clone()).collect(),
            done,
        })));
        for (s, label) in labels {
            if let ScatterLabel::Optional(_, Some(label)) = label {
                let Some(expr) = &s.expr else {
                    continue;
                };
                self.commit_jump_label(label);
                self.generate_expr(expr)?;
                self.emit(Op::Put(s.id));
                self.emit(Op::Pop);
                self.pop_stack(1);
            }
        }
        self.commit_jump_label(done);
        Ok(())
    }

    fn push_lvalue(&mut self, expr: &Expr, indexed_above: bool) -> Result<(), CompileError> {
        match expr {
            Expr::Range { base, from, to } => {
                self.push_lvalue(base.as_ref(), true)?;
                let old = self.save_stack_top();
                self.generate_expr(from.as_ref())?;
                self.generate_expr(to.as_ref())?;
                self.restore_stack_top(old);
            }
            Expr::Index(lhs, rhs) => {
                self.push_lvalue(lhs.as_ref(), true)?;
                let old = self.save_stack_top();
                self.generate_expr(rhs.as_ref())?;
                self.restore_stack_top(old);
                if indexed_above {
                    self.emit(Op::PushRef);
                    self.push_stack(1);
                }
            }
            Expr::Id(id) => {
                if indexed_above {
                    self.emit(Op::Push(*id));
                    self.push_stack(1);
                }
            }
            Expr::Prop { location, property } => {
                self.generate_expr(location.as_ref())?;
                self.generate_expr(property.as_ref())?;
                if indexed_above {
                    self.emit(Op::PushGetProp);
                    self.push_stack(1);
                }
            }
            _ => return Err(CompileError::BadAssignmentTarget),
        }
        Ok(())
    }

    fn generate_codes(&mut self, codes: &CatchCodes) -> Result<(), CompileError> {
        match codes {
            CatchCodes::Codes(codes) => {
                self.generate_arg_list(codes)?;
            }
            CatchCodes::Any => {
                self.emit(Op::ImmInt(0));
                self.push_stack(1);
            }
        }
        Ok(())
    }

    fn generate_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Value(v) => {
                match v.variant() {
                    Variant::None => self.emit(Op::ImmNone),
                    Variant::Int(i) => self.emit(Op::ImmInt(*i)),
                    Variant::Float(f) => self.emit(Op::ImmFloat(*f)),
                    Variant::Obj(o) => self.emit(Op::ImmObjid(*o)),
                    Variant::Err(e) => self.emit(Op::ImmErr(e.err_type)),
                    _ => {
                        let literal = self.add_literal(v);
                        self.emit(Op::Imm(literal));
                    }
                };
                self.push_stack(1);
            }
            Expr::Id(ident) => {
                self.emit(Op::Push(*ident));
                self.push_stack(1);
            }
            Expr::And(left, right) => {
                self.generate_expr(left.as_ref())?;
                let end_label = self.make_jump_label(None);
                self.emit(Op::And(end_label));
                self.pop_stack(1);
                self.generate_expr(right.as_ref())?;
                self.commit_jump_label(end_label);
            }
            Expr::Or(left, right) => {
                self.generate_expr(left.as_ref())?;
                let end_label = self.make_jump_label(None);
                self.emit(Op::Or(end_label));
                self.pop_stack(1);
                self.generate_expr(right.as_ref())?;
                self.commit_jump_label(end_label);
            }
            Expr::Binary(op, l, r) => {
                self.generate_expr(l)?;
                self.generate_expr(r)?;
                let binop = match op {
                    BinaryOp::Add => Op::Add,
                    BinaryOp::Sub => Op::Sub,
                    BinaryOp::Mul => Op::Mul,
                    BinaryOp::Div => Op::Div,
                    BinaryOp::Mod => Op::Mod,
                    BinaryOp::Eq => Op::Eq,
                    BinaryOp::NEq => Op::Ne,
                    BinaryOp::Gt => Op::Gt,
                    BinaryOp::GtE => Op::Ge,
                    BinaryOp::Lt => Op::Lt,
                    BinaryOp::LtE => Op::Le,
                    BinaryOp::Exp => Op::Exp,
                    BinaryOp::In => Op::In,
                    BinaryOp::BitAnd => Op::BitAnd,
                    BinaryOp::BitOr => Op::BitOr,
                    BinaryOp::BitXor => Op::BitXor,
                    BinaryOp::Shl => Op::Shl,
                    BinaryOp::Shr => Op::Shr,
                };
                self.emit(binop);
                self.pop_stack(1);
            }
            Expr::Index(lhs, rhs) => {
                self.generate_expr(lhs.as_ref())?;
                let old = self.save_stack_top();
                self.generate_expr(rhs.as_ref())?;
                self.restore_stack_top(old);
                self.emit(Op::Ref);
                self.pop_stack(1);
            }
            Expr::Range { base, from, to } => {
                self.generate_expr(base.as_ref())?;
                let old = self.save_stack_top();
                self.generate_expr(from.as_ref())?;
                self.generate_expr(to.as_ref())?;
                self.restore_stack_top(old);
                self.emit(Op::RangeRef);
                self.pop_stack(2);
            }
            Expr::Length => {
                let Some(saved) = self.saved_stack_top() else {
                    return Err(CompileError::LengthOutsideIndex);
                };
                self.emit(Op::Length(saved));
                self.push_stack(1);
            }
            Expr::Unary(op, expr) => {
                self.generate_expr(expr.as_ref())?;
                self.emit(match op {
                    UnaryOp::Neg => Op::UnaryMinus,
                    UnaryOp::Not => Op::Not,
                    UnaryOp::Complement => Op::Complement,
                });
            }
            Expr::Prop { location, property } => {
                self.generate_expr(location.as_ref())?;
                self.generate_expr(property.as_ref())?;
                self.emit(Op::GetProp);
                self.pop_stack(1);
            }
            Expr::Pass { args } => {
                self.generate_arg_list(args)?;
                self.emit(Op::Pass);
            }
            Expr::Call { function, args } => {
                let Some(id) = BUILTINS.find_builtin(*function) else {
                    return Err(CompileError::UnknownBuiltinFunction(function.to_string()));
                };
                self.generate_arg_list(args)?;
                self.emit(Op::FuncCall { id });
            }
            Expr::Verb {
                location,
                verb,
                args,
            } => {
                self.generate_expr(location.as_ref())?;
                self.generate_expr(verb.as_ref())?;
                self.generate_arg_list(args)?;
                self.emit(Op::CallVerb);
                self.pop_stack(2);
            }
            Expr::Cond {
                condition,
                consequence,
                alternative,
            } => {
                self.generate_expr(condition.as_ref())?;
                let else_label = self.make_jump_label(None);
                self.emit(Op::IfQues(else_label));
                self.pop_stack(1);
                self.generate_expr(consequence.as_ref())?;
                let end_label = self.make_jump_label(None);
                self.emit(Op::Jump { label: end_label });
                self.pop_stack(1);
                self.commit_jump_label(else_label);
                self.generate_expr(alternative.as_ref())?;
                self.commit_jump_label(end_label);
            }
            Expr::Catch {
                trye,
                codes,
                except,
            } => {
                let handler_label = self.make_jump_label(None);
                self.generate_codes(codes)?;
                self.emit(Op::PushCatchLabel(handler_label));
                self.pop_stack(1);
                self.emit(Op::TryCatch { handler_label });
                self.generate_expr(trye.as_ref())?;
                let end_label = self.make_jump_label(None);
                self.emit(Op::EndCatch(end_label));
                self.commit_jump_label(handler_label);

                // After this label the stack holds the exception tuple where
                // the expression value would have been.
                match except {
                    None => {
                        self.emit(Op::ImmInt(1));
                        self.emit(Op::Ref);
                    }
                    Some(except) => {
                        self.emit(Op::Pop);
                        self.pop_stack(1);
                        self.generate_expr(except.as_ref())?;
                    }
                }
                self.commit_jump_label(end_label);
            }
            Expr::List(l) => {
                self.generate_arg_list(l)?;
            }
            Expr::Map(pairs) => {
                self.emit(Op::MakeMap);
                self.push_stack(1);
                for (key, value) in pairs {
                    self.generate_expr(key)?;
                    self.generate_expr(value)?;
                    self.emit(Op::MapInsert);
                    self.pop_stack(2);
                }
            }
            Expr::Scatter(scatter, right) => self.generate_scatter_assign(scatter, right)?,
            Expr::Assign { left, right } => self.generate_assign(left, right)?,
        }
        Ok(())
    }

    fn generate_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        self.line_number_spans.push((self.ops.len(), stmt.line_no));
        match &stmt.node {
            StmtNode::Cond { arms, otherwise } => {
                let end_label = self.make_jump_label(None);
                let mut is_else = false;
                for arm in arms {
                    self.generate_expr(&arm.condition)?;
                    let otherwise_label = self.make_jump_label(None);
                    self.emit(if !is_else {
                        Op::If(otherwise_label)
                    } else {
                        Op::Eif(otherwise_label)
                    });
                    is_else = true;
                    self.pop_stack(1);
                    for stmt in &arm.statements {
                        self.generate_stmt(stmt)?;
                    }
                    self.emit(Op::Jump { label: end_label });
                    self.commit_jump_label(otherwise_label);
                }
                for stmt in otherwise {
                    self.generate_stmt(stmt)?;
                }
                self.commit_jump_label(end_label);
            }
            StmtNode::ForList {
                id,
                aux,
                expr,
                body,
            } => {
                self.generate_expr(expr)?;
                // Loop index counter; 0-based internally.
                self.emit(Op::ImmInt(0));
                self.push_stack(1);
                let loop_top = self.make_jump_label(Some(*id));
                self.commit_jump_label(loop_top);
                let end_label = self.make_jump_label(Some(*id));
                self.emit(Op::ForList {
                    id: *id,
                    aux: *aux,
                    end_label,
                });
                self.loops.push(Loop {
                    loop_name: Some(*id),
                    top_label: loop_top,
                    top_stack: self.cur_stack.into(),
                    bottom_label: end_label,
                    bottom_stack: (self.cur_stack - 2).into(),
                });
                for stmt in body {
                    self.generate_stmt(stmt)?;
                }
                self.emit(Op::Jump { label: loop_top });
                self.commit_jump_label(end_label);
                self.pop_stack(2);
                self.loops.pop();
            }
            StmtNode::ForRange { id, from, to, body } => {
                self.generate_expr(from)?;
                self.generate_expr(to)?;
                let loop_top = self.make_jump_label(Some(*id));
                self.commit_jump_label(loop_top);
                let end_label = self.make_jump_label(Some(*id));
                self.emit(Op::ForRange {
                    id: *id,
                    end_label,
                });
                self.loops.push(Loop {
                    loop_name: Some(*id),
                    top_label: loop_top,
                    top_stack: self.cur_stack.into(),
                    bottom_label: end_label,
                    bottom_stack: (self.cur_stack - 2).into(),
                });
                for stmt in body {
                    self.generate_stmt(stmt)?;
                }
                self.emit(Op::Jump { label: loop_top });
                self.commit_jump_label(end_label);
                self.pop_stack(2);
                self.loops.pop();
            }
            StmtNode::While {
                id,
                condition,
                body,
            } => {
                let loop_start_label = self.make_jump_label(*id);
                self.commit_jump_label(loop_start_label);
                let loop_end_label = self.make_jump_label(*id);
                self.generate_expr(condition)?;
                match id {
                    None => self.emit(Op::While(loop_end_label)),
                    Some(id) => self.emit(Op::WhileId {
                        id: *id,
                        end_label: loop_end_label,
                    }),
                }
                self.pop_stack(1);
                self.loops.push(Loop {
                    loop_name: *id,
                    top_label: loop_start_label,
                    top_stack: self.cur_stack.into(),
                    bottom_label: loop_end_label,
                    bottom_stack: self.cur_stack.into(),
                });
                for s in body {
                    self.generate_stmt(s)?;
                }
                self.emit(Op::Jump {
                    label: loop_start_label,
                });
                self.commit_jump_label(loop_end_label);
                self.loops.pop();
            }
            StmtNode::Fork { id, time, body } => {
                self.generate_expr(time)?;
                // Stash the main vector and its spans, compile the fork body
                // into a fresh vector, then restore.
                let stashed_ops = std::mem::take(&mut self.ops);
                let stashed_spans = std::mem::take(&mut self.line_number_spans);
                for stmt in body {
                    self.generate_stmt(stmt)?;
                }
                self.emit(Op::Done);
                let forked_ops = std::mem::take(&mut self.ops);
                let forked_spans = std::mem::take(&mut self.line_number_spans);
                let fv_id = Offset(self.fork_vectors.len() as u16);
                self.fork_vectors.push(ForkVector {
                    ops: forked_ops,
                    line_number_spans: forked_spans,
                });
                self.ops = stashed_ops;
                self.line_number_spans = stashed_spans;
                self.emit(Op::Fork {
                    fv_offset: fv_id,
                    id: *id,
                });
                self.pop_stack(1);
            }
            StmtNode::TryExcept { body, excepts } => {
                let mut labels = vec![];
                let num_excepts = excepts.len();
                for ex in excepts {
                    self.generate_codes(&ex.codes)?;
                    let push_label = self.make_jump_label(None);
                    self.emit(Op::PushCatchLabel(push_label));
                    labels.push(push_label);
                }
                self.pop_stack(num_excepts);
                self.emit(Op::TryExcept { num_excepts });
                for stmt in body {
                    self.generate_stmt(stmt)?;
                }
                let end_label = self.make_jump_label(None);
                self.emit(Op::EndExcept(end_label));
                for (i, ex) in excepts.iter().enumerate() {
                    self.commit_jump_label(labels[i]);
                    self.push_stack(1);
                    if let Some(id) = &ex.id {
                        self.emit(Op::Put(*id));
                    }
                    self.emit(Op::Pop);
                    self.pop_stack(1);
                    for stmt in &ex.statements {
                        self.generate_stmt(stmt)?;
                    }
                    if i + 1 < excepts.len() {
                        self.emit(Op::Jump { label: end_label });
                    }
                }
                self.commit_jump_label(end_label);
            }
            StmtNode::TryFinally { body, handler } => {
                let handler_label = self.make_jump_label(None);
                self.emit(Op::TryFinally(handler_label));
                for stmt in body {
                    self.generate_stmt(stmt)?;
                }
                self.emit(Op::EndFinally);
                self.commit_jump_label(handler_label);
                for stmt in handler {
                    self.generate_stmt(stmt)?;
                }
                self.emit(Op::FinallyContinue);
            }
            StmtNode::Break { exit: None } => {
                let Some(l) = self.loops.last() else {
                    return Err(CompileError::ExitOutsideLoop);
                };
                self.emit(Op::Exit {
                    stack: l.bottom_stack,
                    label: l.bottom_label,
                })
            }
            StmtNode::Break { exit: Some(l) } => {
                let l = self.find_loop(l)?;
                self.emit(Op::Exit {
                    stack: l.bottom_stack,
                    label: l.bottom_label,
                });
            }
            StmtNode::Continue { exit: None } => {
                let Some(l) = self.loops.last() else {
                    return Err(CompileError::ExitOutsideLoop);
                };
                self.emit(Op::Exit {
                    stack: l.top_stack,
                    label: l.top_label,
                })
            }
            StmtNode::Continue { exit: Some(l) } => {
                let l = self.find_loop(l)?;
                self.emit(Op::Exit {
                    stack: l.top_stack,
                    label: l.top_label,
                });
            }
            StmtNode::Return(Some(expr)) => {
                self.generate_expr(expr)?;
                self.emit(Op::Return);
                self.pop_stack(1);
            }
            StmtNode::Return(None) => self.emit(Op::Return0),
            StmtNode::Expr(e) => {
                self.generate_expr(e)?;
                self.emit(Op::Pop);
                self.pop_stack(1);
            }
        }
        Ok(())
    }

    fn generate_arg_list(&mut self, args: &Vec<Arg>) -> Result<(), CompileError> {
        if args.is_empty() {
            self.emit(Op::ImmEmptyList);
            self.push_stack(1);
            return Ok(());
        }

        let mut normal_op = Op::MakeSingletonList;
        let mut splice_op = Op::CheckListForSplice;
        let mut pop = 0;
        for a in args {
            match a {
                Arg::Normal(a) => {
                    self.generate_expr(a)?;
                    self.emit(normal_op.clone());
                }
                Arg::Splice(s) => {
                    self.generate_expr(s)?;
                    self.emit(splice_op.clone());
                }
            }
            self.pop_stack(pop);
            pop = 1;
            normal_op = Op::ListAddTail;
            splice_op = Op::ListAppend;
        }
        Ok(())
    }
}

/// Compile a MOO program (a verb body) into bytecode.
pub fn compile(program: &str) -> Result<Program, CompileError> {
    let parse = parse_program(program)?;

    let mut cg_state = CodegenState::new(parse.names);
    for x in parse.stmts {
        cg_state.generate_stmt(&x)?;
    }
    cg_state.emit(Op::Done);

    debug_assert!(
        cg_state.cur_stack == 0 && cg_state.saved_stack.is_none(),
        "stack not empty at end of compilation: {} / {:?}",
        cg_state.cur_stack,
        cg_state.saved_stack
    );

    Ok(Program {
        literals: cg_state.literals,
        jump_labels: cg_state.jumps,
        var_names: cg_state.var_names,
        main_vector: Rc::new(cg_state.ops),
        fork_vectors: cg_state.fork_vectors,
        line_number_spans: cg_state.line_number_spans,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Op;

    #[test]
    fn simple_arith_compiles_flat() {
        let p = compile("return 1 + 2;").unwrap();
        assert_eq!(
            &p.main_vector[..],
            &[
                Op::ImmInt(1),
                Op::ImmInt(2),
                Op::Add,
                Op::Return,
                Op::Done
            ]
        );
    }

    #[test]
    fn unknown_builtin_is_a_compile_error() {
        assert!(matches!(
            compile("frobnicate(1);"),
            Err(CompileError::UnknownBuiltinFunction(_))
        ));
    }

    #[test]
    fn if_produces_conditional_jumps() {
        let p = compile("if (1) return 2; endif return 3;").unwrap();
        assert!(p.main_vector.iter().any(|op| matches!(op, Op::If(_))));
        // The If's target must land after the arm's code.
        let Some(Op::If(label)) = p
            .main_vector
            .iter()
            .find(|op| matches!(op, Op::If(_)))
        else {
            panic!()
        };
        let target = p.jump_labels[label.0 as usize].position.0 as usize;
        assert!(target > 2);
        assert!(target <= p.main_vector.len());
    }

    #[test]
    fn fork_body_goes_to_fork_vector() {
        let p = compile("fork (5) x = 1; endfork return 2;").unwrap();
        assert_eq!(p.fork_vectors.len(), 1);
        assert!(matches!(
            p.main_vector[1],
            Op::Fork {
                fv_offset: Offset(0),
                id: None
            }
        ));
        assert!(matches!(p.fork_vectors[0].ops.last(), Some(Op::Done)));
    }

    #[test]
    fn literals_are_pooled_case_sensitively() {
        let p = compile(r#"x = "Foo"; y = "foo"; z = "Foo";"#).unwrap();
        assert_eq!(p.literals.len(), 2);
    }

    #[test]
    fn loop_break_targets_loop_end() {
        let p = compile("while (1) break; endwhile").unwrap();
        assert!(p
            .main_vector
            .iter()
            .any(|op| matches!(op, Op::Exit { .. })));
    }

    #[test]
    fn line_spans_ascend() {
        let p = compile("x = 1;\ny = 2;\nreturn x + y;\n").unwrap();
        let spans = &p.line_number_spans;
        assert_eq!(spans.len(), 3);
        assert!(spans.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(spans[0].1, 1);
        assert_eq!(spans[2].1, 3);
    }

    #[test]
    fn map_literal_ops() {
        let p = compile("m = [1 -> 2];").unwrap();
        assert!(p.main_vector.contains(&Op::MakeMap));
        assert!(p.main_vector.contains(&Op::MapInsert));
    }

    #[test]
    fn break_outside_loop_fails() {
        assert!(matches!(
            compile("break;"),
            Err(CompileError::ExitOutsideLoop)
        ));
    }

    #[test]
    fn dollar_outside_index_fails() {
        assert!(matches!(
            compile("return $;"),
            Err(CompileError::LengthOutsideIndex)
        ));
    }
}
