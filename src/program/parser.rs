//! Rule text → derivation tree.
//!
//! Parsing happens in two passes. The lexer and term parser turn text into
//! a plain call tree; the grammar then derives that tree top-down from its
//! start symbol, recovering the pass-through productions that rendering
//! elides. A call tree that is well-formed but not derivable (for example
//! `patternCont_` in the final position of a chain) is rejected.
//!
//! The `lambda x:` prefix written by older exports is accepted and ignored.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

use super::Expr;
use crate::grammar::{Grammar, Nonterminal, Op, Production};

/// Errors from parsing rule text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unterminated literal starting at offset {0}")]
    UnterminatedLiteral(usize),
    #[error("unexpected end of rule text")]
    UnexpectedEnd,
    #[error("unexpected `{found}` at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },
    #[error("unknown primitive `{0}`")]
    UnknownPrimitive(String),
    #[error("`{term}` cannot be derived from {nonterminal}")]
    NotDerivable {
        nonterminal: Nonterminal,
        term: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Comma,
    Colon,
    Ident(String),
    Int(u64),
    Quoted(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::Colon => f.write_str(":"),
            Token::Ident(s) => f.write_str(s),
            Token::Int(n) => write!(f, "{n}"),
            Token::Quoted(s) => write!(f, "'{s}'"),
        }
    }
}

struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
        }
    }

    fn next_token(&mut self) -> Result<Option<(usize, Token)>, ParseError> {
        while let Some(&(offset, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }
            let token = match c {
                '(' => {
                    self.chars.next();
                    Token::LParen
                }
                ')' => {
                    self.chars.next();
                    Token::RParen
                }
                ',' => {
                    self.chars.next();
                    Token::Comma
                }
                ':' => {
                    self.chars.next();
                    Token::Colon
                }
                '\'' | '"' => {
                    self.chars.next();
                    let mut s = String::new();
                    loop {
                        match self.chars.next() {
                            Some((_, q)) if q == c => break,
                            Some((_, x)) => s.push(x),
                            None => return Err(ParseError::UnterminatedLiteral(offset)),
                        }
                    }
                    Token::Quoted(s)
                }
                d if d.is_ascii_digit() => {
                    let mut n: u64 = 0;
                    while let Some(&(_, x)) = self.chars.peek() {
                        let Some(v) = x.to_digit(10) else { break };
                        n = n.saturating_mul(10).saturating_add(v as u64);
                        self.chars.next();
                    }
                    Token::Int(n)
                }
                a if a.is_ascii_alphabetic() || a == '_' => {
                    let mut s = String::new();
                    while let Some(&(_, x)) = self.chars.peek() {
                        if !(x.is_ascii_alphanumeric() || x == '_') {
                            break;
                        }
                        s.push(x);
                        self.chars.next();
                    }
                    Token::Ident(s)
                }
                other => return Err(ParseError::UnexpectedChar { ch: other, offset }),
            };
            return Ok(Some((offset, token)));
        }
        Ok(None)
    }
}

/// Grammar-agnostic call tree.
#[derive(Debug, Clone, PartialEq)]
enum Term {
    Input,
    Int(u64),
    Literal(String),
    Call(Op, Vec<Term>),
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Input => f.write_str("x"),
            Term::Int(n) => write!(f, "{n}"),
            Term::Literal(s) => write!(f, "'{s}'"),
            Term::Call(op, args) => {
                write!(f, "{}(", op.name().unwrap_or_default())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

struct TermParser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<(usize, Token)>,
}

impl<'a> TermParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input),
            peeked: None,
        }
    }

    fn peek(&mut self) -> Result<Option<&(usize, Token)>, ParseError> {
        if self.peeked.is_none() {
            self.peeked = self.lexer.next_token()?;
        }
        Ok(self.peeked.as_ref())
    }

    fn consume(&mut self) -> Result<Option<(usize, Token)>, ParseError> {
        match self.peeked.take() {
            Some(t) => Ok(Some(t)),
            None => self.lexer.next_token(),
        }
    }

    fn expect(&mut self, want: Token) -> Result<(), ParseError> {
        match self.consume()? {
            Some((_, t)) if t == want => Ok(()),
            Some((offset, t)) => Err(ParseError::UnexpectedToken {
                found: t.to_string(),
                offset,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    /// A complete rule, optionally prefixed with `lambda x:`.
    fn parse_rule(&mut self) -> Result<Term, ParseError> {
        if let Some((_, Token::Ident(name))) = self.peek()? {
            if name == "lambda" {
                self.consume()?;
                self.expect(Token::Ident("x".into()))?;
                self.expect(Token::Colon)?;
            }
        }

        let term = self.parse_term()?;
        match self.consume()? {
            None => Ok(term),
            Some((offset, t)) => Err(ParseError::UnexpectedToken {
                found: t.to_string(),
                offset,
            }),
        }
    }

    fn parse_term(&mut self) -> Result<Term, ParseError> {
        let Some((offset, token)) = self.consume()? else {
            return Err(ParseError::UnexpectedEnd);
        };

        match token {
            Token::Int(n) => Ok(Term::Int(n)),
            Token::Quoted(s) => Ok(Term::Literal(s)),
            Token::Ident(name) => {
                if matches!(self.peek()?, Some((_, Token::LParen))) {
                    self.consume()?;
                    let op = Op::from_name(&name).ok_or(ParseError::UnknownPrimitive(name))?;
                    let args = self.parse_args()?;
                    Ok(Term::Call(op, args))
                } else if name == "x" {
                    Ok(Term::Input)
                } else {
                    Err(ParseError::UnexpectedToken {
                        found: name,
                        offset,
                    })
                }
            }
            other => Err(ParseError::UnexpectedToken {
                found: other.to_string(),
                offset,
            }),
        }
    }

    /// Arguments after the opening parenthesis, through the closing one.
    fn parse_args(&mut self) -> Result<Vec<Term>, ParseError> {
        let mut args = Vec::new();
        if matches!(self.peek()?, Some((_, Token::RParen))) {
            self.consume()?;
            return Ok(args);
        }
        loop {
            args.push(self.parse_term()?);
            match self.consume()? {
                Some((_, Token::Comma)) => continue,
                Some((_, Token::RParen)) => return Ok(args),
                Some((offset, t)) => {
                    return Err(ParseError::UnexpectedToken {
                        found: t.to_string(),
                        offset,
                    });
                }
                None => return Err(ParseError::UnexpectedEnd),
            }
        }
    }
}

impl Grammar {
    /// Parse rule text into a derivation tree of this grammar.
    pub fn parse(&self, text: &str) -> Result<Expr, ParseError> {
        let term = TermParser::new(text).parse_rule()?;
        self.derive(self.start(), &term)
            .ok_or_else(|| ParseError::NotDerivable {
                nonterminal: self.start(),
                term: term.to_string(),
            })
    }

    /// First production of `nt` that derives `term`.
    ///
    /// The standard grammar is unambiguous, so "first" is also "only".
    fn derive(&self, nt: Nonterminal, term: &Term) -> Option<Expr> {
        for &id in self.rules_for(nt) {
            let p = self.production(id);
            let children = match (p.op, term) {
                (Op::Pass, _) => self.derive(p.children[0], term).map(|c| vec![c]),
                (Op::Literal(bit), Term::Literal(s)) => {
                    s.chars().eq(std::iter::once(bit.as_char())).then(Vec::new)
                }
                (Op::Int(n), Term::Int(m)) => (u64::from(n) == *m).then(Vec::new),
                (op, Term::Call(called, args)) if op == *called => self.derive_args(p, args),
                _ => None,
            };
            if let Some(children) = children {
                return Some(Expr::new(nt, id, p.op, children));
            }
        }
        None
    }

    fn derive_args(&self, p: &Production, args: &[Term]) -> Option<Vec<Expr>> {
        let rest = if p.op.takes_input() {
            match args.split_first() {
                Some((Term::Input, rest)) => rest,
                _ => return None,
            }
        } else {
            args
        };
        if rest.len() != p.children.len() {
            return None;
        }
        p.children
            .iter()
            .zip(rest)
            .map(|(&nt, t)| self.derive(nt, t))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Expr, ParseError> {
        Grammar::standard().parse(text)
    }

    #[test]
    fn test_roundtrip_canonical_text() {
        for text in [
            "'1'",
            "get_(x, 0)",
            "invert_(get_(x, 7))",
            "else_(patternCont_(x), '0')",
            "else_(invert_(streak_(x, 6)), else_(conform_(x, 4), invert_(get_(x, 0))))",
        ] {
            let e = parse(text).unwrap();
            assert_eq!(e.to_string(), text);
        }
    }

    #[test]
    fn test_lambda_prefix_accepted() {
        let e = parse("lambda x: else_(balance_(x, 1), '1')").unwrap();
        assert_eq!(e.to_string(), "else_(balance_(x, 1), '1')");
    }

    #[test]
    fn test_unknown_primitive() {
        assert_eq!(
            parse("majority_(x, 3)"),
            Err(ParseError::UnknownPrimitive("majority_".into()))
        );
    }

    #[test]
    fn test_out_of_domain_parameters_rejected() {
        // INDEX only covers 0 and 7; FREQ only 1..=4.
        assert!(matches!(parse("get_(x, 3)"), Err(ParseError::NotDerivable { .. })));
        assert!(matches!(
            parse("else_(balance_(x, 5), '1')"),
            Err(ParseError::NotDerivable { .. })
        ));
    }

    #[test]
    fn test_structural_violations_rejected() {
        // A chain must end in PRE_END.
        assert!(parse("else_(balance_(x, 2), streak_(x, 1))").is_err());
        // get_ cannot appear before the end of a chain.
        assert!(parse("else_(get_(x, 0), '1')").is_err());
        // Missing input argument.
        assert!(parse("get_(7)").is_err());
        // Double inversion is not derivable.
        assert!(parse("invert_(invert_(get_(x, 0)))").is_err());
    }

    #[test]
    fn test_lexical_errors() {
        assert_eq!(
            parse("get_(x, 7"),
            Err(ParseError::UnexpectedEnd)
        );
        assert!(matches!(
            parse("get_(x; 7)"),
            Err(ParseError::UnexpectedChar { ch: ';', .. })
        ));
        assert!(matches!(
            parse("else_(patternCont_(x), '1"),
            Err(ParseError::UnterminatedLiteral(_))
        ));
        assert!(matches!(
            parse("get_(x, 7) extra"),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }
}
