//! Recursive-descent parser producing an unbound expression tree.
//!
//! Precedence, loosest first: `or`, `and`, comparisons (`eq ne gt ge lt le
//! has in`), additive, multiplicative, unary (`not`, `-`), primary.

use super::ast::{BinaryOperatorKind, Literal, UnaryOperatorKind};
use super::errors::ParseError;
use super::lexer::{tokenize, Token, TokenKind};

/// Quantifier keyword.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LambdaKind {
    /// `any`
    Any,
    /// `all`
    All,
}

impl LambdaKind {
    /// Keyword as written.
    pub fn keyword(self) -> &'static str {
        match self {
            LambdaKind::Any => "any",
            LambdaKind::All => "all",
        }
    }
}

/// Syntax tree before names are resolved against a schema.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Literal value.
    Literal(Literal),
    /// Parenthesized, comma separated list.
    List(Vec<Expr>),
    /// `name` or `parent/name`.
    Member {
        /// Preceding path segment.
        parent: Option<Box<Expr>>,
        /// Segment name as written.
        name: String,
    },
    /// `source/any(v: body)`.
    Lambda {
        /// Quantifier.
        kind: LambdaKind,
        /// Collection path.
        source: Box<Expr>,
        /// Range variable.
        variable: Option<String>,
        /// Predicate.
        body: Option<Box<Expr>>,
    },
    /// `name(args)`.
    Call {
        /// Function name as written.
        name: String,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOperatorKind,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOperatorKind,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `left in right`.
    In {
        /// Tested value.
        left: Box<Expr>,
        /// Candidates.
        right: Box<Expr>,
    },
}

impl Expr {
    fn binary(op: BinaryOperatorKind, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Parses filter text. `max_depth` bounds parser recursion.
pub fn parse(input: &str, max_depth: usize) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
    };
    let expr = parser.expression()?;
    match parser.peek() {
        Some(tok) => Err(ParseError::unexpected(tok.text, "end of expression", tok.position)),
        None => Ok(expr),
    }
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind(0) == Some(kind) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().map_or(false, |t| t.is_keyword(keyword)) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<(), ParseError> {
        match self.advance() {
            Some(tok) if tok.kind == kind => Ok(()),
            Some(tok) => Err(ParseError::unexpected(tok.text, expected, tok.position)),
            None => Err(ParseError::UnexpectedEnd { expected }),
        }
    }

    fn expect_identifier(&mut self, expected: &'static str) -> Result<(String, usize), ParseError> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::Identifier(name),
                position,
                ..
            }) => Ok((name, position)),
            Some(tok) => Err(ParseError::unexpected(tok.text, expected, tok.position)),
            None => Err(ParseError::UnexpectedEnd { expected }),
        }
    }

    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= self.max_depth {
            return Err(ParseError::TooDeep {
                max: self.max_depth,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::or_expr)
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = Expr::binary(BinaryOperatorKind::Or, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.comparison()?;
        while self.eat_keyword("and") {
            let right = self.comparison()?;
            left = Expr::binary(BinaryOperatorKind::And, left, right);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.additive()?;
        loop {
            let op = self
                .peek()
                .and_then(Token::identifier)
                .and_then(BinaryOperatorKind::comparison);
            if let Some(op) = op {
                self.pos += 1;
                let right = self.additive()?;
                left = Expr::binary(op, left, right);
            } else if self.eat_keyword("in") {
                let right = self.additive()?;
                left = Expr::In {
                    left: Box::new(left),
                    right: Box::new(right),
                };
            } else {
                return Ok(left);
            }
        }
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.multiplicative()?;
        while let Some(op) = self
            .peek()
            .and_then(Token::identifier)
            .and_then(BinaryOperatorKind::additive)
        {
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        while let Some(op) = self
            .peek()
            .and_then(Token::identifier)
            .and_then(BinaryOperatorKind::multiplicative)
        {
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = if self.eat_keyword("not") {
            UnaryOperatorKind::Not
        } else if self.eat(&TokenKind::Minus) {
            UnaryOperatorKind::Negate
        } else {
            return self.primary();
        };
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.advance().ok_or(ParseError::UnexpectedEnd {
            expected: "an expression",
        })?;
        match token.kind {
            TokenKind::OpenParen => self.parenthesized(),
            TokenKind::Literal(value) => Ok(Expr::Literal(value)),
            TokenKind::Identifier(name) => {
                if let Some(value) = keyword_literal(&name) {
                    return Ok(Expr::Literal(value));
                }
                if self.eat(&TokenKind::OpenParen) {
                    let args = self.arguments()?;
                    return Ok(Expr::Call { name, args });
                }
                self.member_path(name)
            }
            _ => Err(ParseError::unexpected(
                token.text,
                "an expression",
                token.position,
            )),
        }
    }

    fn parenthesized(&mut self) -> Result<Expr, ParseError> {
        let first = self.expression()?;
        if !self.eat(&TokenKind::Comma) {
            self.expect(TokenKind::CloseParen, "')'")?;
            return Ok(first);
        }
        let mut items = vec![first];
        loop {
            items.push(self.expression()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen, "')'")?;
        Ok(Expr::List(items))
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::CloseParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::CloseParen, "',' or ')'")?;
            return Ok(args);
        }
    }

    fn member_path(&mut self, first: String) -> Result<Expr, ParseError> {
        let mut expr = Expr::Member {
            parent: None,
            name: first,
        };
        while self.eat(&TokenKind::Slash) {
            let (name, _) = self.expect_identifier("a property name after '/'")?;
            let lambda = match name.to_ascii_lowercase().as_str() {
                "any" => Some(LambdaKind::Any),
                "all" => Some(LambdaKind::All),
                _ => None,
            };
            match lambda {
                Some(kind) if self.peek_kind(0) == Some(&TokenKind::OpenParen) => {
                    expr = self.lambda(kind, expr)?;
                }
                _ => {
                    expr = Expr::Member {
                        parent: Some(Box::new(expr)),
                        name,
                    };
                }
            }
        }
        Ok(expr)
    }

    fn lambda(&mut self, kind: LambdaKind, source: Expr) -> Result<Expr, ParseError> {
        self.expect(TokenKind::OpenParen, "'('")?;
        if self.eat(&TokenKind::CloseParen) {
            return Ok(Expr::Lambda {
                kind,
                source: Box::new(source),
                variable: None,
                body: None,
            });
        }
        let (variable, _) = self.expect_identifier("a lambda variable")?;
        self.expect(TokenKind::Colon, "':'")?;
        let body = self.expression()?;
        self.expect(TokenKind::CloseParen, "')'")?;
        Ok(Expr::Lambda {
            kind,
            source: Box::new(source),
            variable: Some(variable),
            body: Some(Box::new(body)),
        })
    }
}

fn keyword_literal(name: &str) -> Option<Literal> {
    match name.to_ascii_lowercase().as_str() {
        "null" => Some(Literal::Null),
        "true" => Some(Literal::Boolean(true)),
        "false" => Some(Literal::Boolean(false)),
        _ => None,
    }
}
