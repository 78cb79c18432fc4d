//! Expression parser and evaluator: turns a `LexToken` stream into a
//! token tree, then walks the tree against the module's symbol tables
//! to produce a typed `Value`.
//!
//! Precedence is the four groups from the lexer design — subexpression,
//! unary, `* / & < >`, `+ - ! \` — expressed here as three recursive
//! descent tiers instead of an explicit operator-precedence stack; the
//! two representations agree because every level is left-associative
//! and unary operators never need to look past their single operand.

mod eval;

pub use eval::{evaluate, Context};

use crate::ast::Node;
use crate::error::{Error, ErrorKind};
use crate::lexer::scan::LexToken;
use crate::token::{Operator, RegisterClass};

struct Parser<'a> {
    tokens: std::iter::Peekable<std::slice::Iter<'a, LexToken>>,
    line: u32,
}

/// Parse a fully tokenized operand field into a token tree. An empty
/// token slice parses to `Node::None` (an empty operand field, valid for
/// some pseudo-instructions).
pub fn parse(tokens: &[LexToken], line: u32) -> Result<Node, Error> {
    if tokens.is_empty() {
        return Ok(Node::None);
    }
    let mut parser = Parser {
        tokens: tokens.iter().peekable(),
        line,
    };
    let leading_literal = matches!(parser.tokens.peek(), Some(LexToken::LiteralMark));
    if leading_literal {
        parser.tokens.next();
        let inner = parser.parse_level3()?;
        return Ok(Node::Literal(Box::new(inner)));
    }
    parser.parse_level3()
}

impl<'a> Parser<'a> {
    fn err(&self, kind: ErrorKind) -> Error {
        Error::new(kind, self.line)
    }

    /// `+ - ! \`, left-associative, loosest binding.
    fn parse_level3(&mut self) -> Result<Node, Error> {
        let mut node = self.parse_level2()?;
        loop {
            let op = match self.tokens.peek() {
                Some(LexToken::Op(op @ (Operator::Add | Operator::Sub | Operator::Or | Operator::Xor))) => *op,
                _ => break,
            };
            self.tokens.next();
            let rhs = self.parse_level2()?;
            node = Node::Op {
                op,
                left: Some(Box::new(node)),
                right: Box::new(rhs),
            };
        }
        Ok(node)
    }

    /// `* / & < >`, left-associative.
    fn parse_level2(&mut self) -> Result<Node, Error> {
        let mut node = self.parse_unary()?;
        loop {
            let op = match self.tokens.peek() {
                Some(LexToken::Op(
                    op @ (Operator::Mul | Operator::Div | Operator::And | Operator::ShiftLeft | Operator::ShiftRight),
                )) => *op,
                _ => break,
            };
            self.tokens.next();
            let rhs = self.parse_unary()?;
            node = Node::Op {
                op,
                left: Some(Box::new(node)),
                right: Box::new(rhs),
            };
        }
        Ok(node)
    }

    /// Unary prefix operators, applied right before a primary term —
    /// the tightest-binding tier.
    fn parse_unary(&mut self) -> Result<Node, Error> {
        let op = match self.tokens.peek() {
            Some(LexToken::Op(op)) if op.is_unary() => Some(*op),
            _ => None,
        };
        if let Some(op) = op {
            self.tokens.next();
            let operand = self.parse_unary()?;
            return Ok(Node::Op {
                op,
                left: None,
                right: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node, Error> {
        match self.tokens.next() {
            Some(LexToken::Int(n)) => Ok(Node::Int(*n)),
            Some(LexToken::Float(n)) => Ok(Node::Float(*n)),
            Some(LexToken::Star) => Ok(Node::Name {
                name: "*".to_string(),
                qual: None,
            }),
            Some(LexToken::Str { bytes, count, justify }) => Ok(Node::Str {
                bytes: bytes.clone(),
                count: *count,
                justify: *justify,
            }),
            Some(LexToken::Register { class, ordinal }) => self.parse_register(*class, ordinal),
            Some(LexToken::LParen) => {
                let inner = self.parse_level3()?;
                match self.tokens.next() {
                    Some(LexToken::RParen) => Ok(Node::SubExpr(Box::new(inner))),
                    _ => Err(self.err(ErrorKind::Syntax)),
                }
            }
            Some(LexToken::Op(Operator::Div)) => self.parse_qualified_name(),
            Some(LexToken::Name { name, qual }) => Ok(Node::Name {
                name: name.clone(),
                qual: qual.clone(),
            }),
            _ => Err(self.err(ErrorKind::Syntax)),
        }
    }

    fn parse_register(&mut self, class: RegisterClass, ordinal: &str) -> Result<Node, Error> {
        let ordinal_node = if ordinal == "." {
            self.parse_unary()?
        } else {
            ordinal
                .parse::<i64>()
                .map(Node::Int)
                .map_err(|_| self.err(ErrorKind::Syntax))?
        };
        Ok(Node::Register {
            class,
            ordinal: Box::new(ordinal_node),
        })
    }

    /// `/QUAL/NAME`: the scanner already split `/` out as a divide
    /// operator, so a leading one that's actually a qualifier marker is
    /// recognized here by the `Name, /, Name` shape that follows.
    fn parse_qualified_name(&mut self) -> Result<Node, Error> {
        let qual = match self.tokens.next() {
            Some(LexToken::Name { name, qual: None }) => name.clone(),
            _ => return Err(self.err(ErrorKind::Syntax)),
        };
        match self.tokens.next() {
            Some(LexToken::Op(Operator::Div)) => {}
            _ => return Err(self.err(ErrorKind::Syntax)),
        }
        match self.tokens.next() {
            Some(LexToken::Name { name, qual: None }) => Ok(Node::Name {
                name: name.clone(),
                qual: Some(qual),
            }),
            _ => Err(self.err(ErrorKind::Syntax)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::scan::Scanner;

    fn parse_text(text: &str) -> Node {
        let toks = Scanner::new(text).scan_all().unwrap();
        parse(&toks, 1).unwrap()
    }

    #[test]
    fn precedence_binds_multiply_tighter_than_add() {
        let node = parse_text("1+2*3");
        match node {
            Node::Op {
                op: Operator::Add,
                left,
                right,
            } => {
                assert_eq!(*left.unwrap(), Node::Int(1));
                match *right {
                    Node::Op { op: Operator::Mul, .. } => {}
                    other => panic!("expected multiply, got {other:?}"),
                }
            }
            other => panic!("expected add at top, got {other:?}"),
        }
    }

    #[test]
    fn leading_literal_mark_wraps_in_literal_node() {
        let toks = Scanner::new("=5").scan_all().unwrap();
        let node = parse(&toks, 1).unwrap();
        assert_eq!(node, Node::Literal(Box::new(Node::Int(5))));
    }

    #[test]
    fn parenthesized_subexpression_wraps() {
        let node = parse_text("(1+2)");
        assert_eq!(
            node,
            Node::SubExpr(Box::new(Node::Op {
                op: Operator::Add,
                left: Some(Box::new(Node::Int(1))),
                right: Box::new(Node::Int(2)),
            }))
        );
    }

    #[test]
    fn empty_operand_is_none() {
        assert_eq!(parse(&[], 1).unwrap(), Node::None);
    }
}
