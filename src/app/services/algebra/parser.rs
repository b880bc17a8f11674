//! Recursive-descent parser for algebra statements
//!
//! ```text
//! statement  := NAME '=' expression
//! expression := term (('+' | '-') term)*
//! term       := unary (('*' | '/') unary)*
//! unary      := '-' unary | factor
//! factor     := NUMBER | DATASETREF | FUNCTION '(' DATASETREF ')' | '(' expression ')'
//! DATASETREF := NAME ('[' INT (',' INT){0,3} ']')?
//! ```
//!
//! Every call builds its own parser state, so parsing is reentrant.

use super::ast::{AlgebraStatement, BinaryOp, DatasetRef, Expr, NeighborOffset, TemporalFunction};
use super::lexer::{Token, TokenKind, tokenize};
use crate::{Error, Result};

/// Deepest nesting of parentheses and unary minus accepted in one statement
const MAX_NESTING_DEPTH: usize = 256;

/// Parse `output = expression`
pub fn parse_statement(input: &str) -> Result<AlgebraStatement> {
    let mut parser = Parser::new(input)?;
    let statement = parser.statement()?;
    parser.expect_end()?;
    Ok(statement)
}

/// Parse a bare expression without output assignment
pub fn parse_expression(input: &str) -> Result<Expr> {
    let mut parser = Parser::new(input)?;
    let expression = parser.expression()?;
    parser.expect_end()?;
    Ok(expression)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(input: &str) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
            depth: 0,
        })
    }

    fn peek(&self) -> &Token {
        // tokenize always ends with End, and End is never consumed
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::End {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, token: &Token, message: impl Into<String>) -> Error {
        Error::syntax(token.kind.to_string(), token.position, message)
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token> {
        let token = self.advance();
        if token.kind == kind {
            Ok(token)
        } else {
            Err(self.error_at(&token, message))
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        let token = self.peek().clone();
        if token.kind == TokenKind::End {
            Ok(())
        } else {
            Err(self.error_at(&token, "Unexpected token after expression"))
        }
    }

    fn statement(&mut self) -> Result<AlgebraStatement> {
        let token = self.advance();
        let output = match &token.kind {
            TokenKind::Name(name) => name.clone(),
            _ => return Err(self.error_at(&token, "Expected the output dataset name")),
        };
        self.expect(TokenKind::Assign, "Expected '=' after the output name")?;
        let expression = self.expression()?;
        Ok(AlgebraStatement { output, expression })
    }

    fn expression(&mut self) -> Result<Expr> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    /// Every nested group and negation passes through here, so the depth
    /// check bounds the recursion.
    fn unary(&mut self) -> Result<Expr> {
        if self.depth >= MAX_NESTING_DEPTH {
            let token = self.peek().clone();
            return Err(self.error_at(&token, "Expression nested too deeply"));
        }
        self.depth += 1;
        let result = if self.peek().kind == TokenKind::Minus {
            self.advance();
            self.unary().map(|inner| Expr::Negate(Box::new(inner)))
        } else {
            self.factor()
        };
        self.depth -= 1;
        result
    }

    fn factor(&mut self) -> Result<Expr> {
        let token = self.advance();
        match &token.kind {
            TokenKind::Number(text) => Ok(Expr::Number(text.clone())),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "Expected ')'")?;
                Ok(Expr::Group(Box::new(inner)))
            }
            TokenKind::Name(name) if self.peek().kind == TokenKind::LParen => {
                let function: TemporalFunction = name
                    .parse()
                    .map_err(|_| self.error_at(&token, "Unknown function"))?;
                self.advance();
                let argument = self.dataset_ref()?;
                self.expect(TokenKind::RParen, "Expected ')' after the function argument")?;
                Ok(Expr::Function { function, argument })
            }
            TokenKind::Name(name) => {
                let offset = self.offset()?;
                Ok(Expr::Dataset(DatasetRef {
                    name: name.clone(),
                    offset,
                    position: token.position,
                }))
            }
            _ => Err(self.error_at(&token, "Expected a number, dataset or '('")),
        }
    }

    fn dataset_ref(&mut self) -> Result<DatasetRef> {
        let token = self.advance();
        let name = match &token.kind {
            TokenKind::Name(name) => name.clone(),
            _ => return Err(self.error_at(&token, "Expected a dataset name")),
        };
        let offset = self.offset()?;
        Ok(DatasetRef {
            name,
            offset,
            position: token.position,
        })
    }

    /// Optional `[i, j, ...]` suffix
    fn offset(&mut self) -> Result<NeighborOffset> {
        if self.peek().kind != TokenKind::LBracket {
            return Ok(NeighborOffset::default());
        }
        let open = self.advance();

        let mut values = vec![self.signed_integer()?];
        while self.peek().kind == TokenKind::Comma {
            self.advance();
            values.push(self.signed_integer()?);
        }
        self.expect(TokenKind::RBracket, "Expected ']' to close the offset list")?;

        NeighborOffset::from_values(&values).ok_or_else(|| {
            self.error_at(&open, format!("Offset lists take 1 to 4 values, got {}", values.len()))
        })
    }

    fn signed_integer(&mut self) -> Result<i64> {
        let negative = if self.peek().kind == TokenKind::Minus {
            self.advance();
            true
        } else {
            if self.peek().kind == TokenKind::Plus {
                self.advance();
            }
            false
        };
        let token = self.advance();
        let TokenKind::Number(text) = &token.kind else {
            return Err(self.error_at(&token, "Expected an integer offset"));
        };
        let value: i64 = text
            .parse()
            .map_err(|_| self.error_at(&token, "Offsets must be integers"))?;
        Ok(if negative { -value } else { value })
    }
}
