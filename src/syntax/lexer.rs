//! Tokenizer for filter text.
//!
//! Literal words (numbers, dates, guids, typed literals) are classified here so
//! the parser only deals with identifiers, literals, and punctuation.

use std::sync::OnceLock;

use regex::Regex;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use super::ast::Literal;
use super::errors::ParseError;

/// Token categories.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// Member name, keyword, function name, or lambda variable.
    Identifier(String),
    /// Any literal value.
    Literal(Literal),
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `/`
    Slash,
    /// `-` not followed by a number.
    Minus,
}

/// Token with the source slice it was read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    /// Category and payload.
    pub kind: TokenKind,
    /// Raw source text.
    pub text: &'a str,
    /// Byte offset of the first character.
    pub position: usize,
}

impl Token<'_> {
    /// Returns the identifier text when this token is an identifier.
    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// Case-insensitive keyword test.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.identifier()
            .map_or(false, |name| name.eq_ignore_ascii_case(keyword))
    }
}

fn numeric_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<num>-?[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?)(?P<suffix>[lLmMdDfF])?$")
            .expect("numeric literal pattern is valid")
    })
}

fn guid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}")
            .expect("guid pattern is valid")
    })
}

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^-?P(?:[0-9]+D)?(?:T(?:[0-9]+H)?(?:[0-9]+M)?(?:[0-9]+(?:\.[0-9]+)?S)?)?$")
            .expect("duration pattern is valid")
    })
}

/// Splits filter text into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, ParseError> {
    Lexer { input, pos: 0 }.run()
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Vec<Token<'a>>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.pos += ch.len_utf8();
                continue;
            }
            let start = self.pos;
            let kind = match ch {
                '(' => self.punct(TokenKind::OpenParen),
                ')' => self.punct(TokenKind::CloseParen),
                ',' => self.punct(TokenKind::Comma),
                ':' => self.punct(TokenKind::Colon),
                '/' => self.punct(TokenKind::Slash),
                '\'' => TokenKind::Literal(Literal::String(self.quoted()?)),
                '-' if self.rest()[1..].starts_with("INF") => {
                    self.pos += 4;
                    TokenKind::Literal(Literal::Double("-INF".to_string()))
                }
                '-' if self.rest()[1..].starts_with(|c: char| c.is_ascii_digit()) => {
                    self.literal_word()?
                }
                '-' => self.punct(TokenKind::Minus),
                c if c.is_ascii_digit() => self.literal_word()?,
                c if c.is_alphabetic() || c == '_' || c == '$' => self.identifier()?,
                other => {
                    return Err(ParseError::UnexpectedCharacter {
                        ch: other,
                        position: start,
                    })
                }
            };
            tokens.push(Token {
                kind,
                text: &self.input[start..self.pos],
                position: start,
            });
        }
        Ok(tokens)
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn punct(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn take_while(&mut self, mut pred: impl FnMut(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !pred(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        &self.input[start..self.pos]
    }

    /// Reads a `'...'` body, collapsing `''` escapes.
    fn quoted(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::UnterminatedString { position: start }),
                Some('\'') if self.rest()[1..].starts_with('\'') => {
                    value.push('\'');
                    self.pos += 2;
                }
                Some('\'') => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some(ch) => {
                    value.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    fn literal_word(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        self.pos += 1;
        self.take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '+' | '-'));
        classify_word(&self.input[start..self.pos], start).map(TokenKind::Literal)
    }

    fn identifier(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        if let Some(found) = guid_pattern().find(self.rest()) {
            let end = start + found.end();
            let boundary = self.input[end..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_alphanumeric());
            if boundary {
                self.pos = end;
                return Ok(TokenKind::Literal(Literal::Guid(found.as_str().to_string())));
            }
        }

        self.pos += self.peek().map_or(1, char::len_utf8);
        loop {
            self.take_while(|c| c.is_alphanumeric() || c == '_');
            let rest = self.rest();
            let dotted = rest.starts_with('.')
                && rest[1..].starts_with(|c: char| c.is_alphabetic() || c == '_');
            if !dotted {
                break;
            }
            self.pos += 1;
        }
        let name = &self.input[start..self.pos];

        if self.peek() == Some('\'') {
            let body = self.quoted()?;
            return typed_literal(name, body, start).map(TokenKind::Literal);
        }
        let kind = match name {
            "INF" | "NaN" => TokenKind::Literal(Literal::Double(name.to_string())),
            _ => TokenKind::Identifier(name.to_string()),
        };
        Ok(kind)
    }
}

fn invalid(text: &str, kind: &'static str, position: usize) -> ParseError {
    ParseError::InvalidLiteral {
        text: text.to_string(),
        kind,
        position,
    }
}

fn typed_literal(prefix: &str, body: String, position: usize) -> Result<Literal, ParseError> {
    if prefix.eq_ignore_ascii_case("duration") {
        if body.len() > 1 && duration_pattern().is_match(&body) {
            return Ok(Literal::Duration(body));
        }
        return Err(invalid(&body, "duration", position));
    }
    match prefix.rsplit_once('.') {
        Some((_, short)) if !short.is_empty() => Ok(Literal::Enum {
            type_name: prefix.to_string(),
            member: body,
        }),
        _ => Err(invalid(prefix, "typed", position)),
    }
}

fn classify_word(text: &str, position: usize) -> Result<Literal, ParseError> {
    if guid_pattern().find(text).map_or(false, |m| m.end() == text.len()) {
        return Ok(Literal::Guid(text.to_string()));
    }
    let bytes = text.as_bytes();
    let date_like = bytes.len() >= 10 && bytes[4] == b'-' && bytes[7] == b'-';
    if date_like && bytes.len() > 10 {
        return time::OffsetDateTime::parse(text, &Rfc3339)
            .map(|_| Literal::DateTimeOffset(text.to_string()))
            .map_err(|_| invalid(text, "datetimeoffset", position));
    }
    if date_like {
        return time::Date::parse(text, format_description!("[year]-[month]-[day]"))
            .map(|_| Literal::Date(text.to_string()))
            .map_err(|_| invalid(text, "date", position));
    }
    if text.contains(':') {
        return time::Time::parse(
            text,
            format_description!("[hour]:[minute][optional [:[second][optional [.[subsecond]]]]]"),
        )
        .map(|_| Literal::TimeOfDay(text.to_string()))
        .map_err(|_| invalid(text, "timeofday", position));
    }
    numeric_literal(text, position)
}

fn numeric_literal(text: &str, position: usize) -> Result<Literal, ParseError> {
    let caps = numeric_pattern()
        .captures(text)
        .ok_or_else(|| invalid(text, "numeric", position))?;
    let num = caps.name("num").map_or("", |m| m.as_str());
    let fractional = num.contains(['.', 'e', 'E']);
    match caps.name("suffix").map(|m| m.as_str()) {
        Some("l" | "L") if !fractional => num
            .parse::<i64>()
            .map(Literal::Int64)
            .map_err(|_| invalid(text, "int64", position)),
        Some("l" | "L") => Err(invalid(text, "int64", position)),
        Some("m" | "M") => Ok(Literal::Decimal(num.to_string())),
        Some("d" | "D") => Ok(Literal::Double(num.to_string())),
        Some(_) => Ok(Literal::Single(num.to_string())),
        None if num.contains(['e', 'E']) => Ok(Literal::Double(num.to_string())),
        None if fractional => Ok(Literal::Decimal(num.to_string())),
        None => Ok(num
            .parse::<i32>()
            .map(Literal::Int32)
            .or_else(|_| num.parse::<i64>().map(Literal::Int64))
            .unwrap_or_else(|_| Literal::Decimal(num.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .expect("tokenize succeeds")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn literal(input: &str) -> Literal {
        match kinds(input).as_slice() {
            [TokenKind::Literal(lit)] => lit.clone(),
            other => panic!("expected a single literal, got {other:?}"),
        }
    }

    #[test]
    fn splits_member_paths_and_lambdas() {
        assert_eq!(
            kinds("socialLogins/any(s: s/name eq 'x')"),
            vec![
                TokenKind::Identifier("socialLogins".into()),
                TokenKind::Slash,
                TokenKind::Identifier("any".into()),
                TokenKind::OpenParen,
                TokenKind::Identifier("s".into()),
                TokenKind::Colon,
                TokenKind::Identifier("s".into()),
                TokenKind::Slash,
                TokenKind::Identifier("name".into()),
                TokenKind::Identifier("eq".into()),
                TokenKind::Literal(Literal::String("x".into())),
                TokenKind::CloseParen,
            ]
        );
    }

    #[test]
    fn classifies_numeric_literals() {
        assert_eq!(literal("42"), Literal::Int32(42));
        assert_eq!(literal("-7"), Literal::Int32(-7));
        assert_eq!(literal("4294967296"), Literal::Int64(4_294_967_296));
        assert_eq!(literal("5L"), Literal::Int64(5));
        assert_eq!(literal("1.5"), Literal::Decimal("1.5".into()));
        assert_eq!(literal("2m"), Literal::Decimal("2".into()));
        assert_eq!(literal("1e3"), Literal::Double("1e3".into()));
        assert_eq!(literal("1.5f"), Literal::Single("1.5".into()));
        assert_eq!(literal("INF"), Literal::Double("INF".into()));
        assert_eq!(literal("-INF"), Literal::Double("-INF".into()));
    }

    #[test]
    fn classifies_temporal_and_guid_literals() {
        assert_eq!(
            literal("2021-01-02T12:00:00Z"),
            Literal::DateTimeOffset("2021-01-02T12:00:00Z".into())
        );
        assert_eq!(literal("2021-01-02"), Literal::Date("2021-01-02".into()));
        assert_eq!(literal("12:30:15"), Literal::TimeOfDay("12:30:15".into()));
        assert_eq!(
            literal("a1b2c3d4-0000-1111-2222-333344445555"),
            Literal::Guid("a1b2c3d4-0000-1111-2222-333344445555".into())
        );
        assert_eq!(literal("duration'P1DT2H'"), Literal::Duration("P1DT2H".into()));
    }

    #[test]
    fn reads_escaped_strings_and_enum_literals() {
        assert_eq!(literal("'john''s'"), Literal::String("john's".into()));
        assert_eq!(
            literal("Default.UserType'Guest'"),
            Literal::Enum {
                type_name: "Default.UserType".into(),
                member: "Guest".into()
            }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            tokenize("name eq 'open"),
            Err(ParseError::UnterminatedString { position: 8 })
        ));
        assert!(matches!(
            tokenize("2021-13-45"),
            Err(ParseError::InvalidLiteral { kind: "date", .. })
        ));
        assert!(matches!(
            tokenize("id eq #"),
            Err(ParseError::UnexpectedCharacter { ch: '#', position: 6 })
        ));
    }

    #[test]
    fn minus_before_identifier_is_an_operator() {
        assert_eq!(
            kinds("-id"),
            vec![TokenKind::Minus, TokenKind::Identifier("id".into())]
        );
    }
}
