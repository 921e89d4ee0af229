//! Recursive-descent parser for the rating DSL.
//!
//! Grounded on the teacher's `calculator::parser::Parser` precedence-climbing
//! structure, retargeted at this grammar's statement-style `if/then/else/end`
//! blocks and its narrower, single operator-precedence ladder (no separate
//! string-operator tier).

use crate::ast::{BinaryOp, Block, Expr, IfStatement, UnaryOp};
use crate::error::ParsingError;
use crate::lexer::{Lexer, Position, Token};

/// Parse a complete formula body into a [`Block`].
///
/// `formula_name` is only used to label any [`ParsingError`] produced; it
/// does not affect parsing. Per the grammar, a formula is parsed as if it
/// ends with a newline, so a trailing `//` comment is honored even when the
/// caller's source text omits the final newline.
pub fn parse_program(formula_name: &str, source: &str) -> Result<Block, ParsingError> {
    let padded = if source.ends_with('\n') { source.to_string() } else { format!("{source}\n") };
    let mut parser = Parser::new(formula_name, source, &padded)?;
    let block = parser.parse_block()?;
    parser.expect(&Token::Eof)?;
    Ok(block)
}

struct Parser<'a> {
    lexer: Lexer,
    current: Token,
    current_pos: Position,
    formula_name: &'a str,
    source_text: &'a str,
}

impl<'a> Parser<'a> {
    fn new(formula_name: &'a str, source_text: &'a str, padded: &str) -> Result<Self, ParsingError> {
        let mut lexer = Lexer::new(padded);
        let (current, current_pos) =
            lexer.next_token().map_err(|message| err(formula_name, &message, Position { line: 1, column: 1 }, source_text))?;
        Ok(Self { lexer, current, current_pos, formula_name, source_text })
    }

    fn err(&self, message: impl Into<String>) -> ParsingError {
        err(self.formula_name, &message.into(), self.current_pos, self.source_text)
    }

    fn advance(&mut self) -> Result<(), ParsingError> {
        let (tok, pos) = self.lexer.next_token().map_err(|m| self.err(m))?;
        self.current = tok;
        self.current_pos = pos;
        Ok(())
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParsingError> {
        if &self.current == expected {
            self.advance()
        } else {
            Err(self.err(format!("expected '{expected}' but found '{}'", self.current)))
        }
    }

    fn parse_block(&mut self) -> Result<Block, ParsingError> {
        match &self.current {
            Token::If => Ok(Block::If(self.parse_if_statement()?)),
            Token::Return => {
                self.advance()?;
                Ok(Block::Return(self.parse_expression()?))
            }
            _ => {
                let expr = self.parse_expression()?;
                match expr {
                    Expr::Call { name, mut args } if name.eq_ignore_ascii_case("error") && args.len() == 1 => {
                        Ok(Block::Error(args.remove(0)))
                    }
                    _ => Err(self.err("expected 'if', 'return', or 'error(...)' statement")),
                }
            }
        }
    }

    fn parse_if_statement(&mut self) -> Result<IfStatement, ParsingError> {
        self.expect(&Token::If)?;
        self.expect(&Token::LParen)?;
        let head_cond = self.parse_expression()?;
        self.expect(&Token::RParen)?;
        self.expect(&Token::Then)?;
        let head_body = self.parse_block()?;

        let mut arms = vec![(head_cond, Box::new(head_body))];
        let mut else_branch = None;

        while self.current == Token::Else {
            self.advance()?;
            if self.current == Token::If {
                self.advance()?;
                self.expect(&Token::LParen)?;
                let cond = self.parse_expression()?;
                self.expect(&Token::RParen)?;
                self.expect(&Token::Then)?;
                let body = self.parse_block()?;
                arms.push((cond, Box::new(body)));
            } else {
                else_branch = Some(Box::new(self.parse_block()?));
                break;
            }
        }

        self.expect(&Token::End)?;
        Ok(IfStatement { arms, else_branch })
    }

    fn parse_expression(&mut self) -> Result<Expr, ParsingError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParsingError> {
        let mut left = self.parse_and()?;
        while self.current == Token::OrOr {
            self.advance()?;
            let right = self.parse_and()?;
            left = binary(left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParsingError> {
        let mut left = self.parse_equality()?;
        while self.current == Token::AndAnd {
            self.advance()?;
            let right = self.parse_equality()?;
            left = binary(left, BinaryOp::And, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParsingError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.current {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_comparison()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParsingError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current {
                Token::Lt => BinaryOp::Lt,
                Token::LtEq => BinaryOp::LtEq,
                Token::Gt => BinaryOp::Gt,
                Token::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_additive()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParsingError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParsingError> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.current {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Mod => BinaryOp::Mod,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_power()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    /// `^` binds right-associatively and tighter than the arithmetic tiers
    /// above it but looser than unary, per the grammar's precedence ladder.
    fn parse_power(&mut self) -> Result<Expr, ParsingError> {
        let left = self.parse_unary()?;
        if self.current == Token::Caret {
            self.advance()?;
            let right = self.parse_power()?;
            Ok(binary(left, BinaryOp::Pow, right))
        } else {
            Ok(left)
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParsingError> {
        match self.current {
            Token::Minus => {
                self.advance()?;
                let operand = self.parse_unary()?;
                Ok(Expr::Unary { op: UnaryOp::Negate, operand: Box::new(operand) })
            }
            Token::Bang => {
                self.advance()?;
                let operand = self.parse_unary()?;
                Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand) })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParsingError> {
        match self.current.clone() {
            Token::Number(n) => {
                self.advance()?;
                Ok(Expr::Number(n))
            }
            Token::Str(s) => {
                self.advance()?;
                Ok(Expr::Str(s))
            }
            Token::True => {
                self.advance()?;
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.advance()?;
                Ok(Expr::Bool(false))
            }
            Token::LParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::Ident(name) => {
                self.advance()?;
                if self.current == Token::LParen {
                    self.advance()?;
                    let args = self.parse_arg_list()?;
                    self.expect(&Token::RParen)?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => Err(self.err(format!("expected an expression but found '{other}'"))),
        }
    }

    fn parse_arg_list(&mut self) -> Result<Vec<Expr>, ParsingError> {
        let mut args = Vec::new();
        if self.current == Token::RParen {
            return Ok(args);
        }
        args.push(self.parse_expression()?);
        while self.current == Token::Comma {
            self.advance()?;
            args.push(self.parse_expression()?);
        }
        Ok(args)
    }
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::Binary { left: Box::new(left), op, right: Box::new(right) }
}

fn err(formula_name: &str, message: &str, pos: Position, source_text: &str) -> ParsingError {
    ParsingError::new(formula_name, message, pos.line, pos.column, source_text)
}
