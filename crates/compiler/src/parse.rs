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

//! Recursive-descent parser for MOO source. Operator precedence, loosest to
//! tightest: assignment, `? |` ternary, `||`, `&&`, equality, ordering, `in`,
//! `|.`, `^.`, `&.`, shifts, additive, multiplicative, unary, `^` power,
//! postfix. Assignment and power associate right, everything else left.

use crate::ast::{
    Arg, BinaryOp, CatchCodes, CondArm, ExceptArm, Expr, ScatterItem, ScatterKind, Stmt, StmtNode,
    UnaryOp,
};
use crate::errors::CompileError;
use crate::labels::Name;
use crate::lexer::{Lexer, Tok};
use crate::names::Names;
use barn_var::{
    v_bool_int, v_float, v_int, v_objid, v_str, Str, Symbol, Var, Variant, SYSTEM_OBJECT,
};

pub struct Parse {
    pub stmts: Vec<Stmt>,
    pub names: Names,
}

pub fn parse_program(src: &str) -> Result<Parse, CompileError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        names: Names::new(),
    };
    let stmts = parser.parse_stmts(&[])?;
    parser.expect(&Tok::Eof)?;
    Ok(Parse {
        stmts,
        names: parser.names,
    })
}

struct Parser {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
    names: Names,
}

/// One element of a brace-enclosed list, before we know whether it is a list
/// constructor or a scatter-assignment target.
enum BraceElt {
    Arg(Arg),
    Optional(Name, Option<Expr>),
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].0
    }

    fn line(&self) -> usize {
        self.tokens[self.pos].1
    }

    fn bump(&mut self) -> Tok {
        let t = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, t: &Tok) -> bool {
        if self.peek() == t {
            self.bump();
            true
        } else {
            false
        }
    }

    fn err(&self, message: impl ToString) -> CompileError {
        CompileError::ParseError {
            line: self.line(),
            message: message.to_string(),
        }
    }

    fn expect(&mut self, t: &Tok) -> Result<(), CompileError> {
        if self.peek() == t {
            self.bump();
            Ok(())
        } else {
            Err(self.err(format!("expected {:?}, found {:?}", t, self.peek())))
        }
    }

    fn expect_ident(&mut self) -> Result<Symbol, CompileError> {
        match self.bump() {
            Tok::Ident(s) => Ok(Symbol::mk(&s)),
            other => Err(self.err(format!("expected identifier, found {other:?}"))),
        }
    }

    fn intern(&mut self, sym: Symbol) -> Name {
        self.names.find_or_add_name(sym)
    }

    // ---- statements ----

    fn parse_stmts(&mut self, terminators: &[Tok]) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = vec![];
        loop {
            let t = self.peek();
            if *t == Tok::Eof || terminators.contains(t) {
                return Ok(stmts);
            }
            stmts.push(self.parse_stmt()?);
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, CompileError> {
        let line = self.line();
        let node = match self.peek().clone() {
            Tok::If => {
                self.bump();
                self.expect(&Tok::LParen)?;
                let condition = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                let statements = self.parse_stmts(&[Tok::Elseif, Tok::Else, Tok::Endif])?;
                let mut arms = vec![CondArm {
                    condition,
                    statements,
                }];
                while self.eat(&Tok::Elseif) {
                    self.expect(&Tok::LParen)?;
                    let condition = self.parse_expr()?;
                    self.expect(&Tok::RParen)?;
                    let statements = self.parse_stmts(&[Tok::Elseif, Tok::Else, Tok::Endif])?;
                    arms.push(CondArm {
                        condition,
                        statements,
                    });
                }
                let otherwise = if self.eat(&Tok::Else) {
                    self.parse_stmts(&[Tok::Endif])?
                } else {
                    vec![]
                };
                self.expect(&Tok::Endif)?;
                StmtNode::Cond { arms, otherwise }
            }
            Tok::While => {
                self.bump();
                let id = match self.peek().clone() {
                    Tok::Ident(s) => {
                        self.bump();
                        Some(self.intern(Symbol::mk(&s)))
                    }
                    _ => None,
                };
                self.expect(&Tok::LParen)?;
                let condition = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                let body = self.parse_stmts(&[Tok::Endwhile])?;
                self.expect(&Tok::Endwhile)?;
                StmtNode::While {
                    id,
                    condition,
                    body,
                }
            }
            Tok::For => {
                self.bump();
                let id_sym = self.expect_ident()?;
                let id = self.intern(id_sym);
                let aux = if self.eat(&Tok::Comma) {
                    let aux_sym = self.expect_ident()?;
                    Some(self.intern(aux_sym))
                } else {
                    None
                };
                self.expect(&Tok::In)?;
                match self.peek() {
                    Tok::LParen => {
                        self.bump();
                        let expr = self.parse_expr()?;
                        self.expect(&Tok::RParen)?;
                        let body = self.parse_stmts(&[Tok::Endfor])?;
                        self.expect(&Tok::Endfor)?;
                        StmtNode::ForList {
                            id,
                            aux,
                            expr,
                            body,
                        }
                    }
                    Tok::LBracket => {
                        if aux.is_some() {
                            return Err(self.err("range loops take a single variable"));
                        }
                        self.bump();
                        let from = self.parse_expr()?;
                        self.expect(&Tok::DotDot)?;
                        let to = self.parse_expr()?;
                        self.expect(&Tok::RBracket)?;
                        let body = self.parse_stmts(&[Tok::Endfor])?;
                        self.expect(&Tok::Endfor)?;
                        StmtNode::ForRange { id, from, to, body }
                    }
                    other => {
                        return Err(self.err(format!("expected '(' or '[' in for, got {other:?}")))
                    }
                }
            }
            Tok::Fork => {
                self.bump();
                let id = match self.peek().clone() {
                    Tok::Ident(s) => {
                        self.bump();
                        Some(self.intern(Symbol::mk(&s)))
                    }
                    _ => None,
                };
                self.expect(&Tok::LParen)?;
                let time = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                let body = self.parse_stmts(&[Tok::Endfork])?;
                self.expect(&Tok::Endfork)?;
                StmtNode::Fork { id, time, body }
            }
            Tok::Return => {
                self.bump();
                let expr = if *self.peek() == Tok::Semi {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&Tok::Semi)?;
                StmtNode::Return(expr)
            }
            Tok::Break => {
                self.bump();
                let exit = match self.peek().clone() {
                    Tok::Ident(s) => {
                        self.bump();
                        Some(self.intern(Symbol::mk(&s)))
                    }
                    _ => None,
                };
                self.expect(&Tok::Semi)?;
                StmtNode::Break { exit }
            }
            Tok::Continue => {
                self.bump();
                let exit = match self.peek().clone() {
                    Tok::Ident(s) => {
                        self.bump();
                        Some(self.intern(Symbol::mk(&s)))
                    }
                    _ => None,
                };
                self.expect(&Tok::Semi)?;
                StmtNode::Continue { exit }
            }
            Tok::Try => {
                self.bump();
                let body = self.parse_stmts(&[Tok::Except, Tok::Finally, Tok::Endtry])?;
                if self.eat(&Tok::Finally) {
                    let handler = self.parse_stmts(&[Tok::Endtry])?;
                    self.expect(&Tok::Endtry)?;
                    StmtNode::TryFinally { body, handler }
                } else {
                    let mut excepts = vec![];
                    while self.eat(&Tok::Except) {
                        let id = match self.peek().clone() {
                            Tok::Ident(s) => {
                                self.bump();
                                Some(self.intern(Symbol::mk(&s)))
                            }
                            _ => None,
                        };
                        self.expect(&Tok::LParen)?;
                        let codes = self.parse_catch_codes()?;
                        self.expect(&Tok::RParen)?;
                        let statements = self.parse_stmts(&[Tok::Except, Tok::Endtry])?;
                        excepts.push(ExceptArm {
                            id,
                            codes,
                            statements,
                        });
                    }
                    if excepts.is_empty() {
                        return Err(self.err("try without except or finally"));
                    }
                    self.expect(&Tok::Endtry)?;
                    StmtNode::TryExcept { body, excepts }
                }
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&Tok::Semi)?;
                StmtNode::Expr(expr)
            }
        };
        Ok(Stmt::new(node, line))
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.parse_ternary()?;
        if self.eat(&Tok::Assign) {
            let rhs = self.parse_expr()?;
            return self.make_assignment(lhs, rhs);
        }
        Ok(lhs)
    }

    fn make_assignment(&mut self, lhs: Expr, rhs: Expr) -> Result<Expr, CompileError> {
        match lhs {
            Expr::Id(_) | Expr::Prop { .. } | Expr::Index(..) | Expr::Range { .. } => {
                Ok(Expr::Assign {
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                })
            }
            Expr::List(args) => {
                let mut items = vec![];
                let mut seen_rest = false;
                for arg in args {
                    let item = match arg {
                        Arg::Normal(Expr::Id(id)) => ScatterItem {
                            kind: ScatterKind::Required,
                            id,
                            expr: None,
                        },
                        Arg::Splice(Expr::Id(id)) => {
                            if seen_rest {
                                return Err(CompileError::DuplicateRestTarget);
                            }
                            seen_rest = true;
                            ScatterItem {
                                kind: ScatterKind::Rest,
                                id,
                                expr: None,
                            }
                        }
                        _ => return Err(CompileError::BadAssignmentTarget),
                    };
                    items.push(item);
                }
                Ok(Expr::Scatter(items, Box::new(rhs)))
            }
            _ => Err(CompileError::BadAssignmentTarget),
        }
    }

    fn parse_ternary(&mut self) -> Result<Expr, CompileError> {
        let condition = self.parse_binary(0)?;
        if self.eat(&Tok::Question) {
            let consequence = self.parse_ternary()?;
            self.expect(&Tok::Pipe)?;
            let alternative = self.parse_ternary()?;
            return Ok(Expr::Cond {
                condition: Box::new(condition),
                consequence: Box::new(consequence),
                alternative: Box::new(alternative),
            });
        }
        Ok(condition)
    }

    fn binary_prec(tok: &Tok) -> Option<(u8, Option<BinaryOp>)> {
        // (precedence, op); `||`/`&&` have no BinaryOp, they short-circuit.
        let r = match tok {
            Tok::OrOr => (1, None),
            Tok::AndAnd => (2, None),
            Tok::EqEq => (3, Some(BinaryOp::Eq)),
            Tok::Ne => (3, Some(BinaryOp::NEq)),
            Tok::Lt => (4, Some(BinaryOp::Lt)),
            Tok::Le => (4, Some(BinaryOp::LtE)),
            Tok::Gt => (4, Some(BinaryOp::Gt)),
            Tok::Ge => (4, Some(BinaryOp::GtE)),
            Tok::In => (5, Some(BinaryOp::In)),
            Tok::BitOr => (6, Some(BinaryOp::BitOr)),
            Tok::BitXor => (7, Some(BinaryOp::BitXor)),
            Tok::BitAnd => (8, Some(BinaryOp::BitAnd)),
            Tok::Shl => (9, Some(BinaryOp::Shl)),
            Tok::Shr => (9, Some(BinaryOp::Shr)),
            Tok::Plus => (10, Some(BinaryOp::Add)),
            Tok::Minus => (10, Some(BinaryOp::Sub)),
            Tok::Star => (11, Some(BinaryOp::Mul)),
            Tok::Slash => (11, Some(BinaryOp::Div)),
            Tok::Percent => (11, Some(BinaryOp::Mod)),
            _ => return None,
        };
        Some(r)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_unary()?;
        while let Some((prec, op)) = Self::binary_prec(self.peek()) {
            if prec < min_prec {
                break;
            }
            let tok = self.bump();
            let rhs = self.parse_binary(prec + 1)?;
            lhs = match op {
                Some(op) => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
                None if tok == Tok::OrOr => Expr::Or(Box::new(lhs), Box::new(rhs)),
                None => Expr::And(Box::new(lhs), Box::new(rhs)),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek() {
            Tok::Minus => Some(UnaryOp::Neg),
            Tok::Bang => Some(UnaryOp::Not),
            Tok::Tilde => Some(UnaryOp::Complement),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(op, Box::new(operand)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, CompileError> {
        let base = self.parse_postfix()?;
        if self.eat(&Tok::Caret) {
            // Right-associative, and the exponent may carry its own sign.
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(
                BinaryOp::Exp,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut e = self.parse_primary()?;
        loop {
            match self.peek().clone() {
                Tok::Dot => {
                    self.bump();
                    let property = match self.peek().clone() {
                        Tok::Ident(s) => {
                            self.bump();
                            Expr::Value(v_str(&s))
                        }
                        Tok::LParen => {
                            self.bump();
                            let inner = self.parse_expr()?;
                            self.expect(&Tok::RParen)?;
                            inner
                        }
                        other => {
                            return Err(self.err(format!("expected property name, got {other:?}")))
                        }
                    };
                    e = Expr::Prop {
                        location: Box::new(e),
                        property: Box::new(property),
                    };
                }
                Tok::Colon => {
                    self.bump();
                    let verb = match self.peek().clone() {
                        Tok::Ident(s) => {
                            self.bump();
                            Expr::Value(v_str(&s))
                        }
                        Tok::LParen => {
                            self.bump();
                            let inner = self.parse_expr()?;
                            self.expect(&Tok::RParen)?;
                            inner
                        }
                        other => {
                            return Err(self.err(format!("expected verb name, got {other:?}")))
                        }
                    };
                    self.expect(&Tok::LParen)?;
                    let args = self.parse_arg_list(&Tok::RParen)?;
                    self.expect(&Tok::RParen)?;
                    e = Expr::Verb {
                        location: Box::new(e),
                        verb: Box::new(verb),
                        args,
                    };
                }
                Tok::LBracket => {
                    self.bump();
                    let first = self.parse_expr()?;
                    if self.eat(&Tok::DotDot) {
                        let to = self.parse_expr()?;
                        self.expect(&Tok::RBracket)?;
                        e = Expr::Range {
                            base: Box::new(e),
                            from: Box::new(first),
                            to: Box::new(to),
                        };
                    } else {
                        self.expect(&Tok::RBracket)?;
                        e = Expr::Index(Box::new(e), Box::new(first));
                    }
                }
                _ => return Ok(e),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.bump() {
            Tok::Int(i) => Ok(Expr::Value(v_int(i))),
            Tok::Float(f) => Ok(Expr::Value(v_float(f))),
            Tok::Str(s) => Ok(Expr::Value(Var::from_variant(Variant::Str(Str::mk_bytes(s))))),
            Tok::ObjLit(o) => Ok(Expr::Value(v_objid(o))),
            Tok::ErrLit(e) => Ok(Expr::Value(Var::from_variant(Variant::Err(e.into())))),
            Tok::True => Ok(Expr::Value(v_bool_int(true))),
            Tok::False => Ok(Expr::Value(v_bool_int(false))),
            Tok::Ident(s) => {
                if *self.peek() == Tok::LParen {
                    self.bump();
                    let args = self.parse_arg_list(&Tok::RParen)?;
                    self.expect(&Tok::RParen)?;
                    let function = Symbol::mk(&s);
                    if function == Symbol::mk("pass") {
                        return Ok(Expr::Pass { args });
                    }
                    Ok(Expr::Call { function, args })
                } else {
                    let name = self.intern(Symbol::mk(&s));
                    Ok(Expr::Id(name))
                }
            }
            Tok::LParen => {
                let e = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                Ok(e)
            }
            Tok::LBrace => {
                let elts = self.parse_brace_elts()?;
                self.expect(&Tok::RBrace)?;
                let has_optionals = elts.iter().any(|e| matches!(e, BraceElt::Optional(..)));
                if has_optionals {
                    // Only legal as a scatter-assignment target.
                    self.expect(&Tok::Assign)?;
                    let rhs = self.parse_expr()?;
                    let mut items = vec![];
                    let mut seen_rest = false;
                    for elt in elts {
                        let item = match elt {
                            BraceElt::Optional(id, expr) => ScatterItem {
                                kind: ScatterKind::Optional,
                                id,
                                expr,
                            },
                            BraceElt::Arg(Arg::Normal(Expr::Id(id))) => ScatterItem {
                                kind: ScatterKind::Required,
                                id,
                                expr: None,
                            },
                            BraceElt::Arg(Arg::Splice(Expr::Id(id))) => {
                                if seen_rest {
                                    return Err(CompileError::DuplicateRestTarget);
                                }
                                seen_rest = true;
                                ScatterItem {
                                    kind: ScatterKind::Rest,
                                    id,
                                    expr: None,
                                }
                            }
                            BraceElt::Arg(_) => return Err(CompileError::BadAssignmentTarget),
                        };
                        items.push(item);
                    }
                    return Ok(Expr::Scatter(items, Box::new(rhs)));
                }
                let args = elts
                    .into_iter()
                    .map(|e| match e {
                        BraceElt::Arg(a) => a,
                        BraceElt::Optional(..) => unreachable!(),
                    })
                    .collect();
                Ok(Expr::List(args))
            }
            Tok::LBracket => {
                let mut pairs = vec![];
                if *self.peek() != Tok::RBracket {
                    loop {
                        let key = self.parse_expr()?;
                        self.expect(&Tok::Arrow)?;
                        let value = self.parse_expr()?;
                        pairs.push((key, value));
                        if !self.eat(&Tok::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&Tok::RBracket)?;
                Ok(Expr::Map(pairs))
            }
            Tok::Backtick => {
                let trye = self.parse_expr()?;
                self.expect(&Tok::Bang)?;
                let codes = self.parse_catch_codes()?;
                let except = if self.eat(&Tok::FatArrow) {
                    Some(Box::new(self.parse_expr()?))
                } else {
                    None
                };
                self.expect(&Tok::Quote)?;
                Ok(Expr::Catch {
                    trye: Box::new(trye),
                    codes,
                    except,
                })
            }
            Tok::Dollar => match self.peek().clone() {
                // `$name` is `#0.name`; `$name(...)` is `#0:name(...)`.
                Tok::Ident(s) => {
                    self.bump();
                    if *self.peek() == Tok::LParen {
                        self.bump();
                        let args = self.parse_arg_list(&Tok::RParen)?;
                        self.expect(&Tok::RParen)?;
                        Ok(Expr::Verb {
                            location: Box::new(Expr::Value(Var::from(SYSTEM_OBJECT))),
                            verb: Box::new(Expr::Value(v_str(&s))),
                            args,
                        })
                    } else {
                        Ok(Expr::Prop {
                            location: Box::new(Expr::Value(Var::from(SYSTEM_OBJECT))),
                            property: Box::new(Expr::Value(v_str(&s))),
                        })
                    }
                }
                _ => Ok(Expr::Length),
            },
            other => Err(self.err(format!("unexpected token in expression: {other:?}"))),
        }
    }

    fn parse_arg_list(&mut self, terminator: &Tok) -> Result<Vec<Arg>, CompileError> {
        let mut args = vec![];
        if self.peek() == terminator {
            return Ok(args);
        }
        loop {
            if self.eat(&Tok::At) {
                args.push(Arg::Splice(self.parse_expr()?));
            } else {
                args.push(Arg::Normal(self.parse_expr()?));
            }
            if !self.eat(&Tok::Comma) {
                return Ok(args);
            }
        }
    }

    fn parse_brace_elts(&mut self) -> Result<Vec<BraceElt>, CompileError> {
        let mut elts = vec![];
        if *self.peek() == Tok::RBrace {
            return Ok(elts);
        }
        loop {
            let elt = match self.peek().clone() {
                Tok::Question => {
                    self.bump();
                    let sym = self.expect_ident()?;
                    let id = self.intern(sym);
                    let default = if self.eat(&Tok::Assign) {
                        Some(self.parse_expr()?)
                    } else {
                        None
                    };
                    BraceElt::Optional(id, default)
                }
                Tok::At => {
                    self.bump();
                    BraceElt::Arg(Arg::Splice(self.parse_expr()?))
                }
                _ => BraceElt::Arg(Arg::Normal(self.parse_expr()?)),
            };
            elts.push(elt);
            if !self.eat(&Tok::Comma) {
                return Ok(elts);
            }
        }
    }

    fn parse_catch_codes(&mut self) -> Result<CatchCodes, CompileError> {
        if self.eat(&Tok::Any) {
            return Ok(CatchCodes::Any);
        }
        let mut codes = vec![];
        loop {
            if self.eat(&Tok::At) {
                codes.push(Arg::Splice(self.parse_expr()?));
            } else {
                codes.push(Arg::Normal(self.parse_expr()?));
            }
            if !self.eat(&Tok::Comma) {
                return Ok(CatchCodes::Codes(codes));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::GlobalName;

    fn parse(src: &str) -> Parse {
        parse_program(src).unwrap()
    }

    fn first_expr(p: &Parse) -> &Expr {
        match &p.stmts[0].node {
            StmtNode::Expr(e) => e,
            StmtNode::Return(Some(e)) => e,
            other => panic!("expected expr stmt, got {other:?}"),
        }
    }

    #[test]
    fn precedence_add_mul() {
        let p = parse("return 1 + 2 * 3;");
        let Expr::Binary(BinaryOp::Add, l, r) = first_expr(&p) else {
            panic!()
        };
        assert_eq!(**l, Expr::Value(v_int(1)));
        let Expr::Binary(BinaryOp::Mul, ..) = **r else {
            panic!()
        };
    }

    #[test]
    fn comparison_associates_left() {
        // 1 < 2 < 3 is (1 < 2) < 3.
        let p = parse("return 1 < 2 < 3;");
        let Expr::Binary(BinaryOp::Lt, l, r) = first_expr(&p) else {
            panic!()
        };
        assert!(matches!(**l, Expr::Binary(BinaryOp::Lt, ..)));
        assert_eq!(**r, Expr::Value(v_int(3)));
    }

    #[test]
    fn power_binds_tighter_than_unary_minus() {
        let p = parse("return -2 ^ 2;");
        let Expr::Unary(UnaryOp::Neg, inner) = first_expr(&p) else {
            panic!("got {:?}", first_expr(&p))
        };
        assert!(matches!(**inner, Expr::Binary(BinaryOp::Exp, ..)));
    }

    #[test]
    fn assignment_in_condition() {
        let p = parse("while (x = 1) endwhile");
        let StmtNode::While { condition, .. } = &p.stmts[0].node else {
            panic!()
        };
        assert!(matches!(condition, Expr::Assign { .. }));
    }

    #[test]
    fn ternary_uses_pipe() {
        let p = parse("return 1 ? 2 | 3;");
        assert!(matches!(first_expr(&p), Expr::Cond { .. }));
    }

    #[test]
    fn scatter_with_optional_and_rest() {
        let p = parse("{a, ?b = 5, @c} = args;");
        let Expr::Scatter(items, _) = first_expr(&p) else {
            panic!("got {:?}", first_expr(&p))
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].kind, ScatterKind::Required);
        assert_eq!(items[1].kind, ScatterKind::Optional);
        assert!(items[1].expr.is_some());
        assert_eq!(items[2].kind, ScatterKind::Rest);
    }

    #[test]
    fn sysprop_and_sysverb() {
        let p = parse("return $foo;");
        let Expr::Prop { location, .. } = first_expr(&p) else {
            panic!()
        };
        assert_eq!(**location, Expr::Value(Var::from(SYSTEM_OBJECT)));

        let p = parse("return $foo(1);");
        assert!(matches!(first_expr(&p), Expr::Verb { .. }));
    }

    #[test]
    fn dollar_is_length_in_index() {
        let p = parse("return x[$];");
        let Expr::Index(_, idx) = first_expr(&p) else {
            panic!()
        };
        assert_eq!(**idx, Expr::Length);
    }

    #[test]
    fn catch_expr() {
        let p = parse("return `x ! E_PROPNF, E_PERM => 17';");
        let Expr::Catch { codes, except, .. } = first_expr(&p) else {
            panic!()
        };
        let CatchCodes::Codes(codes) = codes else {
            panic!()
        };
        assert_eq!(codes.len(), 2);
        assert!(except.is_some());

        let p = parse("return `1/0 ! ANY';");
        let Expr::Catch { codes, except, .. } = first_expr(&p) else {
            panic!()
        };
        assert!(matches!(codes, CatchCodes::Any));
        assert!(except.is_none());
    }

    #[test]
    fn try_except_arms() {
        let p = parse("try x = 1; except e (E_TYPE) return 0; except (ANY) return 1; endtry");
        let StmtNode::TryExcept { excepts, .. } = &p.stmts[0].node else {
            panic!()
        };
        assert_eq!(excepts.len(), 2);
        assert!(excepts[0].id.is_some());
        assert!(excepts[1].id.is_none());
    }

    #[test]
    fn for_two_variable_form() {
        let p = parse("for k, v in (m) endfor");
        let StmtNode::ForList { id, aux, .. } = &p.stmts[0].node else {
            panic!()
        };
        assert!(aux.is_some());
        assert_ne!(Some(*id), *aux);
    }

    #[test]
    fn globals_resolve_to_fixed_slots() {
        let p = parse("return player;");
        let Expr::Id(name) = first_expr(&p) else {
            panic!()
        };
        assert_eq!(*name, Names::global(GlobalName::player));
    }

    #[test]
    fn map_literal() {
        let p = parse("return [\"a\" -> 1, 2 -> \"b\"];");
        let Expr::Map(pairs) = first_expr(&p) else {
            panic!()
        };
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn verb_call_and_dynamic_names() {
        let p = parse("return x:tell(1, @rest);");
        let Expr::Verb { args, .. } = first_expr(&p) else {
            panic!()
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(args[1], Arg::Splice(_)));

        let p = parse("return x:(\"te\" + \"ll\")();");
        assert!(matches!(first_expr(&p), Expr::Verb { .. }));

        let p = parse("return x.(\"name\");");
        assert!(matches!(first_expr(&p), Expr::Prop { .. }));
    }

    #[test]
    fn fork_with_id() {
        let p = parse("fork t (5) x = 1; endfork");
        let StmtNode::Fork { id, .. } = &p.stmts[0].node else {
            panic!()
        };
        assert!(id.is_some());
    }

    #[test]
    fn parse_failures() {
        assert!(parse_program("return 1").is_err());
        assert!(parse_program("if (1) endwhile").is_err());
        assert!(parse_program("{1 + 2} = x;").is_err());
        assert!(parse_program("{@a, @b} = x;").is_err());
        assert!(parse_program("x &&& y;").is_err());
    }
}
