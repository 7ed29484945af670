//! A small boolean expression language evaluated against a regex match.
//!
//! Conditions refine a path filter beyond "does the pattern match". They can
//! only see the match result and literals:
//!
//! ```text
//! expr       := and_expr (("or" | "||") and_expr)*
//! and_expr   := not_expr (("and" | "&&") not_expr)*
//! not_expr   := ("not" | "!") not_expr | comparison
//! comparison := primary (("==" | "!=" | "in" | "not" "in") primary)?
//! primary    := "true" | "false" | "none" | STRING | "(" expr ")"
//!             | "match" ( "." "group" "(" GROUP ")" | "[" GROUP "]" )?
//! GROUP      := INTEGER | STRING
//! ```
//!
//! Keywords also accept the capitalized `True`, `False` and `None`. `match`
//! is truthy whenever the pattern matched; a group evaluates to the captured
//! text, or `none` when it did not participate. `none` and `""` are falsy.
//!
//! # Example
//!
//! ```
//! use mirrordl_core::filter::Condition;
//! use regex::Regex;
//!
//! let pattern = Regex::new(r"/(CD\d)/").unwrap();
//! let condition = Condition::parse("not match or match.group(1) == 'CD1'").unwrap();
//!
//! assert!(condition.evaluate(pattern.captures("Artist/CD1/01.mp3").as_ref()));
//! assert!(!condition.evaluate(pattern.captures("Artist/CD2/01.mp3").as_ref()));
//! assert!(condition.evaluate(pattern.captures("Artist/cover.jpg").as_ref()));
//! ```

use std::iter::Peekable;
use std::str::CharIndices;

use regex::{Captures, Regex};

use super::FilterError;

/// Reference to a capture group by position or name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRef {
    /// Positional group (`0` is the whole match).
    Index(usize),
    /// Named group.
    Name(String),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `in` (substring test)
    In,
    /// `not in`
    NotIn,
}

/// Parsed condition expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `true` / `false`
    Bool(bool),
    /// Quoted string literal.
    Str(String),
    /// `none`
    None,
    /// The match result itself.
    Match,
    /// Text of one capture group.
    Group(GroupRef),
    /// Logical negation.
    Not(Box<Condition>),
    /// Short-circuit conjunction.
    And(Box<Condition>, Box<Condition>),
    /// Short-circuit disjunction.
    Or(Box<Condition>, Box<Condition>),
    /// Binary comparison.
    Compare {
        /// Operator.
        op: CompareOp,
        /// Left operand.
        lhs: Box<Condition>,
        /// Right operand.
        rhs: Box<Condition>,
    },
}

/// Runtime value of a sub-expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Value<'a> {
    Bool(bool),
    Str(&'a str),
    None,
    /// A successful match, carrying the matched text.
    Match(&'a str),
}

impl Value<'_> {
    fn is_truthy(self) -> bool {
        match self {
            Value::Bool(b) => b,
            Value::Str(s) => !s.is_empty(),
            Value::None => false,
            Value::Match(_) => true,
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Match(s) => Some(s),
            Value::Bool(_) | Value::None => None,
        }
    }
}

impl Condition {
    /// Parses a condition expression.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidCondition`] describing the first syntax
    /// problem and its byte offset.
    pub fn parse(source: &str) -> Result<Self, FilterError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let condition = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error_at(token.offset, format!("unexpected {}", token.kind)));
        }
        Ok(condition)
    }

    /// Checks that every group this condition reads exists in `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::UnknownGroup`] for the first missing group.
    pub fn check_groups(&self, pattern: &Regex) -> Result<(), FilterError> {
        match self {
            Condition::Group(GroupRef::Index(index)) if *index >= pattern.captures_len() => {
                Err(FilterError::UnknownGroup {
                    group: index.to_string(),
                })
            }
            Condition::Group(GroupRef::Name(name))
                if !pattern.capture_names().flatten().any(|n| n == name.as_str()) =>
            {
                Err(FilterError::UnknownGroup {
                    group: name.clone(),
                })
            }
            Condition::Not(inner) => inner.check_groups(pattern),
            Condition::And(lhs, rhs)
            | Condition::Or(lhs, rhs)
            | Condition::Compare { lhs, rhs, .. } => {
                lhs.check_groups(pattern)?;
                rhs.check_groups(pattern)
            }
            _ => Ok(()),
        }
    }

    /// Evaluates the condition with the pattern's match result bound to `match`.
    #[must_use]
    pub fn evaluate(&self, captures: Option<&Captures<'_>>) -> bool {
        self.value(captures).is_truthy()
    }

    fn value<'a>(&'a self, captures: Option<&Captures<'a>>) -> Value<'a> {
        match self {
            Condition::Bool(b) => Value::Bool(*b),
            Condition::Str(s) => Value::Str(s),
            Condition::None => Value::None,
            Condition::Match => captures
                .and_then(|caps| caps.get(0))
                .map_or(Value::None, |m| Value::Match(m.as_str())),
            Condition::Group(group) => {
                let found = captures.and_then(|caps| match group {
                    GroupRef::Index(index) => caps.get(*index),
                    GroupRef::Name(name) => caps.name(name),
                });
                found.map_or(Value::None, |m| Value::Str(m.as_str()))
            }
            Condition::Not(inner) => Value::Bool(!inner.value(captures).is_truthy()),
            Condition::And(lhs, rhs) => {
                Value::Bool(lhs.value(captures).is_truthy() && rhs.value(captures).is_truthy())
            }
            Condition::Or(lhs, rhs) => {
                Value::Bool(lhs.value(captures).is_truthy() || rhs.value(captures).is_truthy())
            }
            Condition::Compare { op, lhs, rhs } => {
                let lhs = lhs.value(captures);
                let rhs = rhs.value(captures);
                Value::Bool(compare(*op, lhs, rhs))
            }
        }
    }
}

fn compare(op: CompareOp, lhs: Value<'_>, rhs: Value<'_>) -> bool {
    match op {
        CompareOp::Eq => values_equal(lhs, rhs),
        CompareOp::Ne => !values_equal(lhs, rhs),
        CompareOp::In => contains(lhs, rhs),
        CompareOp::NotIn => !contains(lhs, rhs),
    }
}

fn values_equal(lhs: Value<'_>, rhs: Value<'_>) -> bool {
    match (lhs, rhs) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::None, Value::None) => true,
        _ => match (lhs.as_text(), rhs.as_text()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn contains(needle: Value<'_>, haystack: Value<'_>) -> bool {
    match (needle.as_text(), haystack.as_text()) {
        (Some(needle), Some(haystack)) => haystack.contains(needle),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Int(usize),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    EqEq,
    NotEq,
    Bang,
    AndAnd,
    OrOr,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "'{name}'"),
            TokenKind::Str(value) => write!(f, "string {value:?}"),
            TokenKind::Int(value) => write!(f, "integer {value}"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBracket => f.write_str("'['"),
            TokenKind::RBracket => f.write_str("']'"),
            TokenKind::Dot => f.write_str("'.'"),
            TokenKind::EqEq => f.write_str("'=='"),
            TokenKind::NotEq => f.write_str("'!='"),
            TokenKind::Bang => f.write_str("'!'"),
            TokenKind::AndAnd => f.write_str("'&&'"),
            TokenKind::OrOr => f.write_str("'||'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, FilterError> {
    let invalid = |offset: usize, reason: String| FilterError::InvalidCondition {
        condition: source.to_string(),
        offset,
        reason,
    };

    let mut tokens = Vec::new();
    let mut chars: Peekable<CharIndices<'_>> = source.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        let kind = match c {
            c if c.is_whitespace() => continue,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '.' => TokenKind::Dot,
            '=' if chars.next_if(|&(_, n)| n == '=').is_some() => TokenKind::EqEq,
            '!' if chars.next_if(|&(_, n)| n == '=').is_some() => TokenKind::NotEq,
            '!' => TokenKind::Bang,
            '&' if chars.next_if(|&(_, n)| n == '&').is_some() => TokenKind::AndAnd,
            '|' if chars.next_if(|&(_, n)| n == '|').is_some() => TokenKind::OrOr,
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, n)) = chars.next() {
                    match n {
                        '\\' => match chars.next() {
                            Some((_, escaped)) => value.push(escaped),
                            None => break,
                        },
                        n if n == quote => {
                            closed = true;
                            break;
                        }
                        n => value.push(n),
                    }
                }
                if !closed {
                    return Err(invalid(offset, "unterminated string literal".to_string()));
                }
                TokenKind::Str(value)
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::from(c);
                while let Some((_, d)) = chars.next_if(|&(_, d)| d.is_ascii_digit()) {
                    digits.push(d);
                }
                let value = digits
                    .parse()
                    .map_err(|_| invalid(offset, format!("integer {digits} out of range")))?;
                TokenKind::Int(value)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some((_, n)) = chars.next_if(|&(_, n)| n.is_alphanumeric() || n == '_')
                {
                    ident.push(n);
                }
                TokenKind::Ident(ident)
            }
            other => return Err(invalid(offset, format!("unexpected character '{other}'"))),
        };
        tokens.push(Token { kind, offset });
    }

    Ok(tokens)
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self, ahead: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + ahead).map(|t| &t.kind)
    }

    fn peek_ident(&self, ahead: usize, word: &str) -> bool {
        matches!(self.peek_kind(ahead), Some(TokenKind::Ident(name)) if name == word)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, offset: usize, reason: String) -> FilterError {
        FilterError::InvalidCondition {
            condition: self.source.to_string(),
            offset,
            reason,
        }
    }

    fn unexpected_end(&self) -> FilterError {
        self.error_at(self.source.len(), "unexpected end of expression".to_string())
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<(), FilterError> {
        match self.advance() {
            Some(token) if &token.kind == expected => Ok(()),
            Some(token) => Err(self.error_at(
                token.offset,
                format!("expected {expected}, found {}", token.kind),
            )),
            None => Err(self.unexpected_end()),
        }
    }

    fn parse_or(&mut self) -> Result<Condition, FilterError> {
        let mut lhs = self.parse_and()?;
        while self.peek_ident(0, "or") || self.peek_kind(0) == Some(&TokenKind::OrOr) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Condition::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Condition, FilterError> {
        let mut lhs = self.parse_not()?;
        while self.peek_ident(0, "and") || self.peek_kind(0) == Some(&TokenKind::AndAnd) {
            self.pos += 1;
            let rhs = self.parse_not()?;
            lhs = Condition::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Condition, FilterError> {
        if self.peek_ident(0, "not") || self.peek_kind(0) == Some(&TokenKind::Bang) {
            self.pos += 1;
            let inner = self.parse_not()?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Condition, FilterError> {
        let lhs = self.parse_primary()?;
        let op = match self.peek_kind(0) {
            Some(TokenKind::EqEq) => CompareOp::Eq,
            Some(TokenKind::NotEq) => CompareOp::Ne,
            Some(TokenKind::Ident(name)) if name == "in" => CompareOp::In,
            Some(TokenKind::Ident(name)) if name == "not" && self.peek_ident(1, "in") => {
                self.pos += 1;
                CompareOp::NotIn
            }
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_primary()?;
        Ok(Condition::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_primary(&mut self) -> Result<Condition, FilterError> {
        let Some(token) = self.advance() else {
            return Err(self.unexpected_end());
        };
        match token.kind {
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Str(value) => Ok(Condition::Str(value)),
            TokenKind::Ident(name) => match name.as_str() {
                "true" | "True" => Ok(Condition::Bool(true)),
                "false" | "False" => Ok(Condition::Bool(false)),
                "none" | "None" => Ok(Condition::None),
                "match" => self.parse_match_suffix(),
                _ => Err(self.error_at(token.offset, format!("unknown name '{name}'"))),
            },
            other => Err(self.error_at(token.offset, format!("unexpected {other}"))),
        }
    }

    fn parse_match_suffix(&mut self) -> Result<Condition, FilterError> {
        match self.peek_kind(0) {
            Some(TokenKind::Dot) => {
                self.pos += 1;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::Ident(method),
                        ..
                    }) if method == "group" => {}
                    Some(token) => {
                        return Err(self.error_at(
                            token.offset,
                            format!("expected 'group', found {}", token.kind),
                        ));
                    }
                    None => return Err(self.unexpected_end()),
                }
                self.expect(&TokenKind::LParen)?;
                let group = self.parse_group_ref()?;
                self.expect(&TokenKind::RParen)?;
                Ok(Condition::Group(group))
            }
            Some(TokenKind::LBracket) => {
                self.pos += 1;
                let group = self.parse_group_ref()?;
                self.expect(&TokenKind::RBracket)?;
                Ok(Condition::Group(group))
            }
            _ => Ok(Condition::Match),
        }
    }

    fn parse_group_ref(&mut self) -> Result<GroupRef, FilterError> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::Int(index),
                ..
            }) => Ok(GroupRef::Index(index)),
            Some(Token {
                kind: TokenKind::Str(name),
                ..
            }) => Ok(GroupRef::Name(name)),
            Some(token) => Err(self.error_at(
                token.offset,
                format!("expected group number or name, found {}", token.kind),
            )),
            None => Err(self.unexpected_end()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn eval(condition: &str, pattern: &str, subject: &str) -> bool {
        let pattern = Regex::new(pattern).unwrap();
        let condition = Condition::parse(condition).unwrap();
        condition.evaluate(pattern.captures(subject).as_ref())
    }

    #[test]
    fn test_condition_bare_match_follows_pattern() {
        assert!(eval("match", r"\.mp3$", "a/b/song.mp3"));
        assert!(!eval("match", r"\.mp3$", "a/b/song.flac"));
    }

    #[test]
    fn test_condition_negation_inverts_match() {
        assert!(!eval("not match", r"\.mp3$", "a/b/song.mp3"));
        assert!(eval("not match", r"\.mp3$", "a/b/song.flac"));
        assert!(eval("!match", r"\.mp3$", "a/b/song.flac"));
    }

    #[test]
    fn test_condition_empty_match_is_still_truthy() {
        assert!(eval("match", r"x*", "abc"));
    }

    #[test]
    fn test_condition_group_comparison() {
        let cond = "match and match.group(1) == 'CD1'";
        assert!(eval(cond, r"/(CD\d)/", "Artist/CD1/01.mp3"));
        assert!(!eval(cond, r"/(CD\d)/", "Artist/CD2/01.mp3"));
        assert!(!eval(cond, r"/(CD\d)/", "Artist/cover.jpg"));
    }

    #[test]
    fn test_condition_named_group_and_index_syntax() {
        let pattern = r"(?P<disc>CD\d)";
        assert!(eval("match['disc'] != \"CD2\"", pattern, "CD1/a.mp3"));
        assert!(eval("match[0] == 'CD1'", pattern, "CD1/a.mp3"));
        assert!(eval("match.group('disc') == 'CD2'", pattern, "x/CD2"));
    }

    #[test]
    fn test_condition_group_without_match_is_none() {
        assert!(eval("match.group(1) == none", r"(CD\d)", "cover.jpg"));
        assert!(!eval("match.group(1)", r"(CD\d)", "cover.jpg"));
    }

    #[test]
    fn test_condition_in_operators() {
        assert!(eval("'live' in match.group(1)", r"^([^/]+)/", "live 2019/a.mp3"));
        assert!(eval("'live' not in match.group(1)", r"^([^/]+)/", "studio/a.mp3"));
        assert!(!eval("'x' in none", r"a", "a"));
    }

    #[test]
    fn test_condition_precedence_and_parentheses() {
        assert!(eval("true or false and false", "a", "a"));
        assert!(!eval("(true or false) and false", "a", "a"));
        assert!(eval("not false == true", "a", "a"));
        assert!(eval("True && !False || None", "a", "a"));
    }

    #[test]
    fn test_condition_literal_truthiness() {
        assert!(!eval("''", "a", "a"));
        assert!(eval("'x'", "a", "a"));
        assert!(!eval("none", "a", "a"));
    }

    #[test]
    fn test_condition_rejects_arbitrary_code() {
        assert!(Condition::parse("__import__('os').system('rm -rf /')").is_err());
        assert!(Condition::parse("open('x')").is_err());
        assert!(Condition::parse("match.start()").is_err());
    }

    #[test]
    fn test_condition_syntax_errors_report_offset() {
        let err = Condition::parse("match and").unwrap_err();
        assert!(matches!(err, FilterError::InvalidCondition { offset: 9, .. }), "{err}");

        let err = Condition::parse("'open").unwrap_err();
        assert!(err.to_string().contains("unterminated"), "{err}");

        let err = Condition::parse("match )").unwrap_err();
        assert!(matches!(err, FilterError::InvalidCondition { offset: 6, .. }), "{err}");

        let err = Condition::parse("match = 'a'").unwrap_err();
        assert!(err.to_string().contains("unexpected character"), "{err}");
    }

    #[test]
    fn test_condition_check_groups_against_pattern() {
        let pattern = Regex::new(r"(?P<disc>CD\d)").unwrap();
        assert!(Condition::parse("match.group(1)").unwrap().check_groups(&pattern).is_ok());
        assert!(Condition::parse("match['disc']").unwrap().check_groups(&pattern).is_ok());
        assert!(matches!(
            Condition::parse("match.group(2)").unwrap().check_groups(&pattern),
            Err(FilterError::UnknownGroup { .. })
        ));
        assert!(matches!(
            Condition::parse("not (match['side'] == 'A')")
                .unwrap()
                .check_groups(&pattern),
            Err(FilterError::UnknownGroup { .. })
        ));
    }
}
