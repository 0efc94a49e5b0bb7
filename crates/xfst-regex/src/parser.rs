// Recursive-descent parser from tokens to a regex tree.
//
// Precedence, tightest first: `:`, prefix `~ \ $`, postfix
// `* + ^ .i .u .l .r ::w`, ignore `/`, concatenation, `| & -`,
// `.x. .o.`.

use crate::lexer::{Spanned, Token};
use crate::RegexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Star,
    Plus,
    Optional,
    Invert,
    Upper,
    Lower,
    Reverse,
    Complement,
    TermComplement,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Union,
    Intersect,
    Minus,
    Ignore,
    Cross,
    Compose,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Regex {
    /// Unquoted symbol; may name a definition or list.
    Symbol(String),
    /// Quoted symbol.
    Literal(String),
    Chars(String),
    Epsilon,
    Any,
    Pair(Box<Regex>, Box<Regex>),
    Call(String, Vec<Regex>),
    Unary(UnaryOp, Box<Regex>),
    Binary(BinaryOp, Box<Regex>, Box<Regex>),
    Concat(Vec<Regex>),
    Repeat(Box<Regex>, usize, Option<usize>),
    Weighted(Box<Regex>, f32),
}

struct Parser<'t> {
    tokens: &'t [Spanned],
    pos: usize,
    end: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn bump(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|s| &s.token);
        self.pos += 1;
        token
    }

    fn unexpected(&self) -> RegexError {
        match self.tokens.get(self.pos) {
            Some(s) => RegexError::Syntax {
                position: s.span.start,
                message: format!("unexpected {:?}", s.token),
            },
            None => RegexError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), RegexError> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn starts_atom(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Symbol(_)
                    | Token::Quoted(_)
                    | Token::Chars(_)
                    | Token::Call(_)
                    | Token::Epsilon
                    | Token::Any
                    | Token::LBracket
                    | Token::LParen
                    | Token::Tilde
                    | Token::Backslash
                    | Token::Dollar
            )
        )
    }

    fn expr(&mut self) -> Result<Regex, RegexError> {
        let mut left = self.boolean()?;
        loop {
            let op = match self.peek() {
                Some(Token::Compose) => BinaryOp::Compose,
                Some(Token::Cross) => BinaryOp::Cross,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.boolean()?;
            left = Regex::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn boolean(&mut self) -> Result<Regex, RegexError> {
        let mut left = self.concat()?;
        loop {
            let op = match self.peek() {
                Some(Token::Pipe) => BinaryOp::Union,
                Some(Token::Amp) => BinaryOp::Intersect,
                Some(Token::Minus) => BinaryOp::Minus,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.concat()?;
            left = Regex::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn concat(&mut self) -> Result<Regex, RegexError> {
        let mut items = vec![self.ignore()?];
        while self.starts_atom() {
            items.push(self.ignore()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Regex::Concat(items)
        })
    }

    fn ignore(&mut self) -> Result<Regex, RegexError> {
        let mut left = self.postfix()?;
        while self.peek() == Some(&Token::Slash) {
            self.pos += 1;
            let right = self.postfix()?;
            left = Regex::Binary(BinaryOp::Ignore, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn postfix(&mut self) -> Result<Regex, RegexError> {
        let mut inner = self.prefix()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => UnaryOp::Star,
                Some(Token::Plus) => UnaryOp::Plus,
                Some(Token::Invert) => UnaryOp::Invert,
                Some(Token::Upper) => UnaryOp::Upper,
                Some(Token::Lower) => UnaryOp::Lower,
                Some(Token::Reverse) => UnaryOp::Reverse,
                Some(&Token::Repeat(min, max)) => {
                    self.pos += 1;
                    inner = Regex::Repeat(Box::new(inner), min, max);
                    continue;
                }
                Some(&Token::Weight(w)) => {
                    self.pos += 1;
                    inner = Regex::Weighted(Box::new(inner), w);
                    continue;
                }
                _ => return Ok(inner),
            };
            self.pos += 1;
            inner = Regex::Unary(op, Box::new(inner));
        }
    }

    fn prefix(&mut self) -> Result<Regex, RegexError> {
        let op = match self.peek() {
            Some(Token::Tilde) => UnaryOp::Complement,
            Some(Token::Backslash) => UnaryOp::TermComplement,
            Some(Token::Dollar) => UnaryOp::Contains,
            _ => return self.pair(),
        };
        self.pos += 1;
        Ok(Regex::Unary(op, Box::new(self.prefix()?)))
    }

    fn pair(&mut self) -> Result<Regex, RegexError> {
        let upper = self.atom()?;
        if self.peek() != Some(&Token::Colon) {
            return Ok(upper);
        }
        self.pos += 1;
        let lower = self.atom()?;
        Ok(Regex::Pair(Box::new(upper), Box::new(lower)))
    }

    fn atom(&mut self) -> Result<Regex, RegexError> {
        let token = self.bump().cloned();
        match token {
            Some(Token::Symbol(s)) => Ok(Regex::Symbol(s)),
            Some(Token::Quoted(s)) => Ok(Regex::Literal(s)),
            Some(Token::Chars(s)) => Ok(Regex::Chars(s)),
            Some(Token::Epsilon) => Ok(Regex::Epsilon),
            Some(Token::Any) => Ok(Regex::Any),
            Some(Token::LBracket) => {
                if self.peek() == Some(&Token::RBracket) {
                    self.pos += 1;
                    return Ok(Regex::Epsilon);
                }
                let inner = self.expr()?;
                self.expect(Token::RBracket)?;
                Ok(inner)
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(Regex::Unary(UnaryOp::Optional, Box::new(inner)))
            }
            Some(Token::Call(name)) => {
                let mut args = vec![self.expr()?];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    args.push(self.expr()?);
                }
                self.expect(Token::RParen)?;
                Ok(Regex::Call(name, args))
            }
            _ => {
                self.pos -= 1;
                Err(self.unexpected())
            }
        }
    }
}

/// Parse one regular expression. A trailing `;` is accepted; anything after
/// the expression is an error.
pub fn parse(tokens: &[Spanned]) -> Result<Regex, RegexError> {
    let end = match tokens.iter().position(|s| s.token == Token::Semicolon) {
        Some(i) => i,
        None => tokens.len(),
    };
    let mut parser = Parser {
        tokens: &tokens[..end],
        pos: 0,
        end,
    };
    let regex = parser.expr()?;
    if parser.pos < parser.end {
        return Err(parser.unexpected());
    }
    Ok(regex)
}
