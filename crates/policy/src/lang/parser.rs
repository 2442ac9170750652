//! 조건식 재귀 하강 파서
//!
//! 문법 (우선순위 낮은 것부터):
//!
//! ```text
//! expression := and_expr (OR and_expr)*
//! and_expr   := term (AND term)*
//! term       := NOT term
//!             | '(' expression ')'
//!             | atom EXISTS
//!             | atom binop atom
//!             | atom IN '(' atom (',' atom)* ')'
//!             | atom PMATCH '(' atom (',' atom)* ')'
//!             | atom                    # 매크로 참조
//! ```

use super::ast::{BinOp, Expr};
use super::lexer::Token;
use super::ErrorSink;

/// 토큰 열을 표현식으로 파싱합니다.
///
/// 복구 불가능한 문법 오류는 싱크에 수집되고 `None`이 반환됩니다.
pub fn parse(tokens: &[Token], origin: &str, sink: &mut ErrorSink) -> Option<Expr> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        origin,
        sink,
    };
    let expr = parser.expression()?;
    if parser.pos < parser.tokens.len() {
        parser.error(format!(
            "unexpected trailing token {:?}",
            parser.tokens[parser.pos]
        ));
        return None;
    }
    Some(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    origin: &'a str,
    sink: &'a mut ErrorSink,
}

impl Parser<'_> {
    fn error(&mut self, message: String) {
        self.sink.push(self.origin, Some(self.pos), message);
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expression(&mut self) -> Option<Expr> {
        let mut operands = vec![self.and_expr()?];
        while self.eat(&Token::Or) {
            operands.push(self.and_expr()?);
        }
        Some(if operands.len() == 1 {
            operands.pop()?
        } else {
            Expr::Or(operands)
        })
    }

    fn and_expr(&mut self) -> Option<Expr> {
        let mut operands = vec![self.term()?];
        while self.eat(&Token::And) {
            operands.push(self.term()?);
        }
        Some(if operands.len() == 1 {
            operands.pop()?
        } else {
            Expr::And(operands)
        })
    }

    fn term(&mut self) -> Option<Expr> {
        match self.advance().cloned() {
            Some(Token::Not) => Some(Expr::Not(Box::new(self.term()?))),
            Some(Token::LParen) => {
                let expr = self.expression()?;
                if !self.eat(&Token::RParen) {
                    self.error("expected ')'".to_owned());
                    return None;
                }
                Some(expr)
            }
            Some(Token::Atom(atom)) => self.atom_term(atom),
            Some(other) => {
                self.error(format!("unexpected token {other:?}"));
                None
            }
            None => {
                self.error("unexpected end of expression".to_owned());
                None
            }
        }
    }

    fn atom_term(&mut self, atom: String) -> Option<Expr> {
        let op = match self.peek() {
            Some(Token::Exists) => {
                self.pos += 1;
                return Some(Expr::Exists(atom));
            }
            Some(Token::In) => {
                self.pos += 1;
                let items = self.atom_list()?;
                return Some(Expr::InList { attr: atom, items });
            }
            Some(Token::PMatch) => {
                self.pos += 1;
                let items = self.atom_list()?;
                return Some(Expr::PMatch { attr: atom, items });
            }
            Some(Token::Eq) => Some(BinOp::Eq),
            Some(Token::NEq) => Some(BinOp::NEq),
            Some(Token::Gt) => Some(BinOp::Gt),
            Some(Token::Ge) => Some(BinOp::Ge),
            Some(Token::Lt) => Some(BinOp::Lt),
            Some(Token::Le) => Some(BinOp::Le),
            Some(Token::Contains) => Some(BinOp::Contains),
            Some(Token::IContains) => Some(BinOp::IContains),
            Some(Token::StartsWith) => Some(BinOp::StartsWith),
            Some(Token::EndsWith) => Some(BinOp::EndsWith),
            _ => None,
        };

        match op {
            Some(op) => {
                self.pos += 1;
                match self.advance().cloned() {
                    Some(Token::Atom(rhs)) => Some(Expr::Binary { op, lhs: atom, rhs }),
                    _ => {
                        self.error("expected atom after binary operator".to_owned());
                        None
                    }
                }
            }
            // 연산자가 따라오지 않는 아톰은 매크로 참조
            None => Some(Expr::Ident(atom)),
        }
    }

    /// `'(' atom (',' atom)* ')'`
    fn atom_list(&mut self) -> Option<Vec<String>> {
        if !self.eat(&Token::LParen) {
            self.error("expected '(' after list operator".to_owned());
            return None;
        }
        let mut items = Vec::new();
        loop {
            match self.advance().cloned() {
                Some(Token::Atom(item)) => items.push(item),
                Some(other) => {
                    self.error(format!("expected list item, found {other:?}"));
                    return None;
                }
                None => {
                    self.error("unterminated list".to_owned());
                    return None;
                }
            }
            match self.advance().cloned() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                Some(other) => {
                    self.error(format!("expected ',' or ')', found {other:?}"));
                    return None;
                }
                None => {
                    self.error("unterminated list".to_owned());
                    return None;
                }
            }
        }
        if items.is_empty() {
            self.error("empty list".to_owned());
            return None;
        }
        Some(items)
    }
}
