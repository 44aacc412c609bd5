//! Recursive-descent parser producing [`Predicate`] trees.
//!
//! Precedence is the usual SQL one: `AND` binds tighter than `OR`, both are
//! left-associative, and parentheses override.

use super::lexer::{Token, TokenKind, tokenize};
use super::{BareWordPolicy, CompareOp, FilterError, FilterOptions, Literal, Predicate};

/// Deepest parenthesis nesting a filter may use.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Most comparisons a single filter may contain.
pub const MAX_COMPARISONS: usize = 512;

/// Parses a filter expression.
///
/// An empty or whitespace-only filter yields [`Predicate::All`].
///
/// # Errors
///
/// Returns [`FilterError::Syntax`] with the byte position of the offending
/// token, including when the filter nests parentheses deeper than
/// [`MAX_NESTING_DEPTH`] or holds more than [`MAX_COMPARISONS`] comparisons.
pub fn parse(input: &str, options: &FilterOptions) -> Result<Predicate, FilterError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Ok(Predicate::All);
    }

    let mut parser = Parser {
        tokens,
        cursor: 0,
        end: input.len(),
        options,
        depth: 0,
        comparisons: 0,
    };
    let predicate = parser.or_expr()?;
    if let Some(token) = parser.peek() {
        return Err(FilterError::syntax(
            token.position,
            "unexpected token after end of expression",
        ));
    }
    Ok(predicate)
}

enum Operand {
    Key(String, usize),
    Literal(Literal),
}

struct Parser<'a> {
    tokens: Vec<Token>,
    cursor: usize,
    end: usize,
    options: &'a FilterOptions,
    depth: usize,
    comparisons: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn position(&self) -> usize {
        self.peek().map_or(self.end, |t| t.position)
    }

    fn or_expr(&mut self) -> Result<Predicate, FilterError> {
        let mut left = self.and_expr()?;
        while self.eat(&TokenKind::Or) {
            let right = self.and_expr()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Predicate, FilterError> {
        let mut left = self.primary()?;
        while self.eat(&TokenKind::And) {
            let right = self.primary()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Predicate, FilterError> {
        let open = self.position();
        if self.eat(&TokenKind::LParen) {
            self.depth += 1;
            if self.depth > MAX_NESTING_DEPTH {
                return Err(FilterError::syntax(
                    open,
                    format!("filter nests parentheses deeper than {MAX_NESTING_DEPTH} levels"),
                ));
            }
            let inner = self.or_expr()?;
            if !self.eat(&TokenKind::RParen) {
                return Err(FilterError::syntax(open, "unbalanced parenthesis"));
            }
            self.depth -= 1;
            return Ok(inner);
        }

        self.comparisons += 1;
        if self.comparisons > MAX_COMPARISONS {
            return Err(FilterError::syntax(
                open,
                format!("filter has more than {MAX_COMPARISONS} comparisons"),
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Predicate, FilterError> {
        let left = self.operand()?;
        let position = self.position();

        match self.next().map(|t| t.kind) {
            Some(TokenKind::Op(op)) => {
                let right = self.operand()?;
                self.build_compare(left, op, right, position)
            }
            Some(TokenKind::Between) => {
                let Operand::Key(key, _) = left else {
                    return Err(FilterError::syntax(
                        position,
                        "BETWEEN requires a partition key on the left",
                    ));
                };
                let low = self.bound()?;
                if !self.eat(&TokenKind::And) {
                    return Err(FilterError::syntax(
                        self.position(),
                        "expected AND between BETWEEN bounds",
                    ));
                }
                let high = self.bound()?;
                Ok(Predicate::Between { key, low, high })
            }
            Some(TokenKind::Reserved(word)) => Err(FilterError::syntax(
                position,
                format!("{word} is not supported in partition filters"),
            )),
            Some(_) => Err(FilterError::syntax(
                position,
                "expected a comparison operator",
            )),
            None => Err(FilterError::syntax(
                position,
                "unexpected end of filter, expected a comparison operator",
            )),
        }
    }

    fn operand(&mut self) -> Result<Operand, FilterError> {
        let position = self.position();
        match self.next().map(|t| t.kind) {
            Some(TokenKind::Ident(name)) => Ok(Operand::Key(name, position)),
            Some(TokenKind::Number(text)) => Ok(Operand::Literal(Literal::Number(text))),
            Some(TokenKind::Str(text)) => Ok(Operand::Literal(Literal::String(text))),
            Some(TokenKind::Reserved(word)) => Err(FilterError::syntax(
                position,
                format!("{word} is not supported in partition filters"),
            )),
            Some(_) => Err(FilterError::syntax(
                position,
                "expected a partition key or a literal",
            )),
            None => Err(FilterError::syntax(
                position,
                "unexpected end of filter, expected a partition key or a literal",
            )),
        }
    }

    fn bound(&mut self) -> Result<Literal, FilterError> {
        match self.operand()? {
            Operand::Literal(literal) => Ok(literal),
            Operand::Key(word, position) => self.bare_word(word, position),
        }
    }

    fn bare_word(&self, word: String, position: usize) -> Result<Literal, FilterError> {
        match self.options.bare_words {
            BareWordPolicy::AsString => Ok(Literal::String(word)),
            BareWordPolicy::Reject => Err(FilterError::syntax(
                position,
                format!("unquoted string literal '{word}'; enclose string values in double quotes"),
            )),
        }
    }

    fn build_compare(
        &self,
        left: Operand,
        op: CompareOp,
        right: Operand,
        position: usize,
    ) -> Result<Predicate, FilterError> {
        match (left, right) {
            (Operand::Key(key, _), Operand::Literal(value)) => {
                Ok(Predicate::Compare { key, op, value })
            }
            (Operand::Literal(value), Operand::Key(key, _)) => Ok(Predicate::Compare {
                key,
                op: op.mirror(),
                value,
            }),
            (Operand::Key(key, _), Operand::Key(word, word_position)) => {
                let value = self.bare_word(word, word_position)?;
                Ok(Predicate::Compare { key, op, value })
            }
            (Operand::Literal(_), Operand::Literal(_)) => Err(FilterError::syntax(
                position,
                "comparison must reference a partition key",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(input: &str) -> Predicate {
        parse(input, &FilterOptions::default()).unwrap()
    }

    fn err(input: &str) -> FilterError {
        parse(input, &FilterOptions::default()).unwrap_err()
    }

    fn cmp(key: &str, op: CompareOp, value: Literal) -> Predicate {
        Predicate::Compare {
            key: key.into(),
            op,
            value,
        }
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert_eq!(p(""), Predicate::All);
        assert_eq!(p("   \t"), Predicate::All);
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let parsed = p("a = 1 OR b = 2 AND c = 3");
        let expected = Predicate::Or(
            Box::new(cmp("a", CompareOp::Eq, Literal::Number("1".into()))),
            Box::new(Predicate::And(
                Box::new(cmp("b", CompareOp::Eq, Literal::Number("2".into()))),
                Box::new(cmp("c", CompareOp::Eq, Literal::Number("3".into()))),
            )),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let parsed = p("(a = 1 OR b = 2) AND c = 3");
        assert!(matches!(parsed, Predicate::And(..)));
    }

    #[test]
    fn test_literal_on_left_is_mirrored() {
        assert_eq!(
            p("5 < pk2"),
            cmp("pk2", CompareOp::Gt, Literal::Number("5".into()))
        );
        assert_eq!(
            p(r#""x" = pk1"#),
            cmp("pk1", CompareOp::Eq, Literal::String("x".into()))
        );
    }

    #[test]
    fn test_between() {
        assert_eq!(
            p("pk2 between 5 and 8"),
            Predicate::Between {
                key: "pk2".into(),
                low: Literal::Number("5".into()),
                high: Literal::Number("8".into()),
            }
        );
    }

    #[test]
    fn test_between_inside_conjunction() {
        let parsed = p(r#"pk2 between 5 and 8 and pk1 = "odd""#);
        let Predicate::And(left, right) = parsed else {
            panic!("expected conjunction");
        };
        assert!(matches!(*left, Predicate::Between { .. }));
        assert!(matches!(*right, Predicate::Compare { .. }));
    }

    #[test]
    fn test_bare_word_rejected_by_default() {
        let e = err("pk1=even");
        assert!(matches!(e, FilterError::Syntax { position: 4, .. }), "{e:?}");
    }

    #[test]
    fn test_bare_word_as_string_when_enabled() {
        let options = FilterOptions {
            bare_words: BareWordPolicy::AsString,
            ..FilterOptions::default()
        };
        assert_eq!(
            parse("pk1=even", &options).unwrap(),
            cmp("pk1", CompareOp::Eq, Literal::String("even".into()))
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(err("(a = 1"), FilterError::Syntax { position: 0, .. }));
        assert!(matches!(err("a = 1)"), FilterError::Syntax { position: 5, .. }));
        assert!(matches!(err("a ="), FilterError::Syntax { position: 3, .. }));
        assert!(matches!(err("a = 1 AND"), FilterError::Syntax { .. }));
        assert!(matches!(err("1 = 2"), FilterError::Syntax { .. }));
        assert!(matches!(err("a 1"), FilterError::Syntax { .. }));
    }

    #[test]
    fn test_reserved_words_rejected() {
        for input in ["a IN (1, 2)", "a LIKE \"x%\"", "NOT a = 1", "a IS NULL", "a = NULL"] {
            assert!(
                matches!(err(input), FilterError::Syntax { .. }),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for input in [
            r#"pk1 = "even" AND pk3 = 1"#,
            "pk2 BETWEEN 5 AND 8 OR pk2 > 12",
            r#"(a <> "x\"y" OR b <= -2.5) AND c >= 0"#,
        ] {
            let parsed = p(input);
            assert_eq!(p(&parsed.to_string()), parsed, "{input}");
        }
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let depth = 10_000;
        let input = format!("{}a = 1{}", "(".repeat(depth), ")".repeat(depth));
        let e = err(&input);
        assert!(
            matches!(e, FilterError::Syntax { position: 128, .. }),
            "{e:?}"
        );
    }

    #[test]
    fn test_nesting_up_to_the_limit_parses() {
        let input = format!(
            "{}a = 1{}",
            "(".repeat(MAX_NESTING_DEPTH),
            ")".repeat(MAX_NESTING_DEPTH)
        );
        assert_eq!(p(&input), cmp("a", CompareOp::Eq, Literal::Number("1".into())));

        let sibling_groups = vec!["((a = 1))"; 200].join(" OR ");
        assert!(matches!(p(&sibling_groups), Predicate::Or(..)));
    }

    #[test]
    fn test_comparison_count_is_capped() {
        let at_limit = vec!["a = 1"; MAX_COMPARISONS].join(" AND ");
        assert!(matches!(p(&at_limit), Predicate::And(..)));

        let over = vec!["a = 1"; 20_000].join(" OR ");
        assert!(matches!(err(&over), FilterError::Syntax { .. }));
    }
}
