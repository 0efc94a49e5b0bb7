// Tokens of the regular-expression language.
//
// An unquoted run of ordinary characters is one symbol (`cat` is a single
// multicharacter symbol); `%` escapes the next character inside a run. `0`
// alone is epsilon. `@...@` is read as one symbol so that flag diacritics
// need no quoting.

use std::ops::Range;

use crate::RegexError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Unquoted symbol or name.
    Symbol(String),
    /// `"..."`: always a literal symbol, never a name.
    Quoted(String),
    /// `{abc}`: one symbol per character.
    Chars(String),
    /// `Name(`: start of a function call. The name includes the parenthesis.
    Call(String),
    Epsilon,
    Any,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Colon,
    Comma,
    Pipe,
    Amp,
    Minus,
    Slash,
    Cross,
    Compose,
    Star,
    Plus,
    /// `^n`, `^{n,m}`, `^>n`, `^<n`: minimum and optional maximum count.
    Repeat(usize, Option<usize>),
    Invert,
    Upper,
    Lower,
    Reverse,
    Tilde,
    Backslash,
    Dollar,
    /// `::w`
    Weight(f32),
    Semicolon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Range<usize>,
}

const DELIMITERS: &str = "|&-/:;()[]{}*+^~\\$?\",.";

fn is_run_char(c: char) -> bool {
    !c.is_whitespace() && !DELIMITERS.contains(c)
}

struct Lexer<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or(self.text.len(), |&(i, _)| i)
    }

    fn error(&self, message: impl Into<String>) -> RegexError {
        RegexError::Syntax {
            position: self.offset(),
            message: message.into(),
        }
    }

    fn number(&mut self) -> Result<usize, RegexError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().map(|&(_, c)| c).collect();
        digits.parse().map_err(|_| self.error("expected a number"))
    }

    fn repeat(&mut self) -> Result<Token, RegexError> {
        match self.peek() {
            Some('{') => {
                self.pos += 1;
                let min = self.number()?;
                if self.peek() != Some(',') {
                    return Err(self.error("expected ',' in repetition range"));
                }
                self.pos += 1;
                let max = self.number()?;
                if self.peek() != Some('}') {
                    return Err(self.error("expected '}' after repetition range"));
                }
                self.pos += 1;
                if max < min {
                    return Err(self.error(format!("empty repetition range {{{min},{max}}}")));
                }
                Ok(Token::Repeat(min, Some(max)))
            }
            Some('>') => {
                self.pos += 1;
                let n = self.number()?;
                Ok(Token::Repeat(n + 1, None))
            }
            Some('<') => {
                self.pos += 1;
                let n = self.number()?;
                if n == 0 {
                    return Err(self.error("empty repetition range ^<0"));
                }
                Ok(Token::Repeat(0, Some(n - 1)))
            }
            _ => {
                let n = self.number()?;
                Ok(Token::Repeat(n, Some(n)))
            }
        }
    }

    fn weight(&mut self) -> Result<Token, RegexError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == '-' || c == '+' || c == 'e')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().map(|&(_, c)| c).collect();
        text.parse()
            .map(Token::Weight)
            .map_err(|_| self.error(format!("invalid weight '{text}'")))
    }

    fn quoted(&mut self) -> Result<String, RegexError> {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted symbol")),
                Some('"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some(c) => out.push(c),
                        None => return Err(self.error("unterminated quoted symbol")),
                    }
                    self.pos += 1;
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn braces(&mut self) -> Result<String, RegexError> {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated '{'")),
                Some('}') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('%') => {
                    self.pos += 1;
                    if let Some(c) = self.peek() {
                        out.push(c);
                        self.pos += 1;
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn run(&mut self) -> String {
        let mut out = String::new();
        if self.peek() == Some('@') {
            // @...@ up to the closing @, dots included.
            let mut k = 1;
            while self.peek_at(k).is_some_and(|c| c != '@' && !c.is_whitespace()) {
                k += 1;
            }
            if self.peek_at(k) == Some('@') {
                for &(_, c) in &self.chars[self.pos..=self.pos + k] {
                    out.push(c);
                }
                self.pos += k + 1;
                return out;
            }
        }
        while let Some(c) = self.peek() {
            if c == '%' {
                self.pos += 1;
                if let Some(escaped) = self.peek() {
                    out.push(escaped);
                    self.pos += 1;
                }
            } else if is_run_char(c) {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        out
    }

    fn dot_operator(&mut self) -> Result<Token, RegexError> {
        let rest = &self.text[self.offset()..];
        let table = [
            (".x.", Token::Cross),
            (".o.", Token::Compose),
            (".i", Token::Invert),
            (".u", Token::Upper),
            (".l", Token::Lower),
            (".r", Token::Reverse),
            (".1", Token::Upper),
            (".2", Token::Lower),
        ];
        for (spelling, token) in table {
            if rest.starts_with(spelling) {
                self.pos += spelling.chars().count();
                return Ok(token);
            }
        }
        Err(self.error("unknown '.' operator"))
    }

    fn next_token(&mut self) -> Result<Option<Token>, RegexError> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        let simple = match c {
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '|' => Some(Token::Pipe),
            '&' => Some(Token::Amp),
            '-' => Some(Token::Minus),
            '/' => Some(Token::Slash),
            '*' => Some(Token::Star),
            '+' => Some(Token::Plus),
            '~' => Some(Token::Tilde),
            '\\' => Some(Token::Backslash),
            '$' => Some(Token::Dollar),
            '?' => Some(Token::Any),
            ';' => Some(Token::Semicolon),
            _ => None,
        };
        if let Some(token) = simple {
            self.pos += 1;
            return Ok(Some(token));
        }
        match c {
            ':' => {
                self.pos += 1;
                if self.peek() == Some(':') {
                    self.pos += 1;
                    return self.weight().map(Some);
                }
                Ok(Some(Token::Colon))
            }
            '^' => {
                self.pos += 1;
                self.repeat().map(Some)
            }
            '"' => {
                self.pos += 1;
                self.quoted().map(|s| Some(Token::Quoted(s)))
            }
            '{' => {
                self.pos += 1;
                self.braces().map(|s| Some(Token::Chars(s)))
            }
            '.' => self.dot_operator().map(Some),
            _ => {
                let text = self.run();
                if text.is_empty() {
                    return Err(self.error(format!("unexpected character '{c}'")));
                }
                if text == "0" {
                    return Ok(Some(Token::Epsilon));
                }
                if self.peek() == Some('(') {
                    self.pos += 1;
                    return Ok(Some(Token::Call(format!("{text}("))));
                }
                Ok(Some(Token::Symbol(text)))
            }
        }
    }
}

/// Split `text` into tokens with their byte spans. Scanning stops after the
/// first `;`.
pub fn tokenize(text: &str) -> Result<Vec<Spanned>, RegexError> {
    let mut lexer = Lexer::new(text);
    let mut out = Vec::new();
    loop {
        let start = {
            while lexer.peek().is_some_and(char::is_whitespace) {
                lexer.pos += 1;
            }
            lexer.offset()
        };
        match lexer.next_token()? {
            None => break,
            Some(token) => {
                let done = token == Token::Semicolon;
                out.push(Spanned {
                    token,
                    span: start..lexer.offset(),
                });
                if done {
                    break;
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<Token> {
        tokenize(text).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn runs_are_single_symbols() {
        assert_eq!(
            kinds("cat dog"),
            vec![Token::Symbol("cat".into()), Token::Symbol("dog".into())]
        );
    }

    #[test]
    fn escapes_and_quotes() {
        assert_eq!(kinds("%+a"), vec![Token::Symbol("+a".into())]);
        assert_eq!(kinds("\"a b\""), vec![Token::Quoted("a b".into())]);
        assert_eq!(kinds("{ab}"), vec![Token::Chars("ab".into())]);
    }

    #[test]
    fn epsilon_and_pairs() {
        assert_eq!(
            kinds("a:0"),
            vec![Token::Symbol("a".into()), Token::Colon, Token::Epsilon]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds("a .o. b .x. c .i"),
            vec![
                Token::Symbol("a".into()),
                Token::Compose,
                Token::Symbol("b".into()),
                Token::Cross,
                Token::Symbol("c".into()),
                Token::Invert,
            ]
        );
    }

    #[test]
    fn repetitions() {
        assert_eq!(kinds("a^3")[1], Token::Repeat(3, Some(3)));
        assert_eq!(kinds("a^{1,4}")[1], Token::Repeat(1, Some(4)));
        assert_eq!(kinds("a^>2")[1], Token::Repeat(3, None));
        assert_eq!(kinds("a^<2")[1], Token::Repeat(0, Some(1)));
    }

    #[test]
    fn weights() {
        assert_eq!(kinds("a::1.5")[1], Token::Weight(1.5));
    }

    #[test]
    fn flag_diacritics_need_no_quotes() {
        assert_eq!(kinds("@U.F.x@ a")[0], Token::Symbol("@U.F.x@".into()));
    }

    #[test]
    fn function_call_and_spans() {
        let tokens = tokenize("Foo(a, b) ;rest").unwrap();
        assert_eq!(tokens[0].token, Token::Call("Foo(".into()));
        assert_eq!(tokens[0].span, 0..4);
        assert_eq!(tokens[1].span, 4..5);
        assert_eq!(tokens.last().map(|s| &s.token), Some(&Token::Semicolon));
        assert_eq!(tokens.len(), 6);
    }

    #[test]
    fn unknown_dot_operator() {
        assert!(matches!(tokenize("a .q"), Err(RegexError::Syntax { .. })));
    }
}
