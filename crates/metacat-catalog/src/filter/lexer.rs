//! Tokenizer for partition filter expressions.

use std::iter::Peekable;
use std::str::CharIndices;

use super::{CompareOp, FilterError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(String),
    Str(String),
    Op(CompareOp),
    And,
    Or,
    Between,
    LParen,
    RParen,
    /// Recognized SQL keyword this grammar does not support.
    Reserved(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    /// Byte offset of the first character.
    pub(crate) position: usize,
}

const RESERVED: [&str; 5] = ["IN", "LIKE", "NOT", "IS", "NULL"];

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, FilterError> {
    let mut lexer = Lexer {
        chars: input.char_indices().peekable(),
        len: input.len(),
    };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
    len: usize,
}

impl Lexer<'_> {
    fn next_token(&mut self) -> Result<Option<Token>, FilterError> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((position, c)) = self.chars.next() else {
            return Ok(None);
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '=' => TokenKind::Op(CompareOp::Eq),
            '!' => {
                if self.chars.next_if(|(_, c)| *c == '=').is_some() {
                    TokenKind::Op(CompareOp::Ne)
                } else {
                    return Err(FilterError::syntax(position, "expected '=' after '!'"));
                }
            }
            '<' => {
                if self.chars.next_if(|(_, c)| *c == '=').is_some() {
                    TokenKind::Op(CompareOp::Le)
                } else if self.chars.next_if(|(_, c)| *c == '>').is_some() {
                    TokenKind::Op(CompareOp::Ne)
                } else {
                    TokenKind::Op(CompareOp::Lt)
                }
            }
            '>' => {
                if self.chars.next_if(|(_, c)| *c == '=').is_some() {
                    TokenKind::Op(CompareOp::Ge)
                } else {
                    TokenKind::Op(CompareOp::Gt)
                }
            }
            '"' => TokenKind::Str(self.string(position)?),
            '\'' => {
                return Err(FilterError::syntax(
                    position,
                    "string literals must be enclosed in double quotes",
                ));
            }
            '-' | '+' if self.chars.peek().is_some_and(|(_, c)| c.is_ascii_digit()) => {
                TokenKind::Number(self.number(c))
            }
            c if c.is_ascii_digit() => TokenKind::Number(self.number(c)),
            c if c.is_alphabetic() || c == '_' => Self::word(self.ident(c)),
            other => {
                return Err(FilterError::syntax(
                    position,
                    format!("unexpected character '{other}'"),
                ));
            }
        };

        Ok(Some(Token { kind, position }))
    }

    fn string(&mut self, start: usize) -> Result<String, FilterError> {
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some((_, '"')) => return Ok(value),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                },
                Some((_, c)) => value.push(c),
                None => break,
            }
        }
        Err(FilterError::syntax(
            start,
            format!("unterminated string literal (input ends at {})", self.len),
        ))
    }

    fn number(&mut self, first: char) -> String {
        let mut text = String::from(first);
        self.digits(&mut text);
        if self.chars.peek().is_some_and(|(_, c)| *c == '.') {
            text.push('.');
            self.chars.next();
            self.digits(&mut text);
        }
        if let Some((_, e)) = self.chars.next_if(|(_, c)| matches!(c, 'e' | 'E')) {
            text.push(e);
            if let Some((_, sign)) = self.chars.next_if(|(_, c)| matches!(c, '+' | '-')) {
                text.push(sign);
            }
            self.digits(&mut text);
        }
        text
    }

    fn digits(&mut self, text: &mut String) {
        while let Some((_, d)) = self.chars.next_if(|(_, c)| c.is_ascii_digit()) {
            text.push(d);
        }
    }

    fn ident(&mut self, first: char) -> String {
        let mut text = String::from(first);
        while let Some((_, c)) = self
            .chars
            .next_if(|(_, c)| c.is_alphanumeric() || *c == '_')
        {
            text.push(c);
        }
        text
    }

    fn word(text: String) -> TokenKind {
        let upper = text.to_ascii_uppercase();
        match upper.as_str() {
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "BETWEEN" => TokenKind::Between,
            _ if RESERVED.contains(&upper.as_str()) => TokenKind::Reserved(upper),
            _ => TokenKind::Ident(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenizes_comparison() {
        assert_eq!(
            kinds(r#"pk1 = "even""#),
            vec![
                TokenKind::Ident("pk1".into()),
                TokenKind::Op(CompareOp::Eq),
                TokenKind::Str("even".into()),
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("a<=1 b<>2 c!=3 d>=4"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Op(CompareOp::Le),
                TokenKind::Number("1".into()),
                TokenKind::Ident("b".into()),
                TokenKind::Op(CompareOp::Ne),
                TokenKind::Number("2".into()),
                TokenKind::Ident("c".into()),
                TokenKind::Op(CompareOp::Ne),
                TokenKind::Number("3".into()),
                TokenKind::Ident("d".into()),
                TokenKind::Op(CompareOp::Ge),
                TokenKind::Number("4".into()),
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("x between 1 And 2 oR y"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Between,
                TokenKind::Number("1".into()),
                TokenKind::And,
                TokenKind::Number("2".into()),
                TokenKind::Or,
                TokenKind::Ident("y".into()),
            ]
        );
        assert_eq!(kinds("not"), vec![TokenKind::Reserved("NOT".into())]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("-5 2.5 1e3"),
            vec![
                TokenKind::Number("-5".into()),
                TokenKind::Number("2.5".into()),
                TokenKind::Number("1e3".into()),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\\c""#),
            vec![TokenKind::Str(r#"a"b\c"#.into())]
        );
    }

    #[test]
    fn test_unterminated_string_reports_start() {
        let err = tokenize(r#"pk = "open"#).unwrap_err();
        assert!(matches!(err, FilterError::Syntax { position: 5, .. }));
    }

    #[test]
    fn test_single_quotes_rejected() {
        assert!(matches!(
            tokenize("pk = 'x'"),
            Err(FilterError::Syntax { position: 5, .. })
        ));
    }

    #[test]
    fn test_positions_are_byte_offsets() {
        let tokens = tokenize("  ab = 1").unwrap();
        assert_eq!(tokens[0].position, 2);
        assert_eq!(tokens[1].position, 5);
        assert_eq!(tokens[2].position, 7);
    }
}
