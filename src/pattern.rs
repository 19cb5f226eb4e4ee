use regex::Regex;

use crate::cursor::Fields;
use crate::error::Result;

/// One element of a declarative sentence grammar.
///
/// A grammar is a flat list of tokens compiled once per protocol variant.
/// Capture groups inside `Num` and `Expr` fragments become the fields a
/// matched sentence yields, in order of appearance.
#[derive(Debug, Clone, Copy)]
pub enum Token {
    /// Literal text, matched exactly.
    Text(&'static str),
    /// Numeric shorthand: `d` matches a digit, `x` a hex digit, `.` and `|`
    /// are literal. Everything else passes through as regular-expression
    /// syntax, so `(dd)` captures two digits and `(x+)?` an optional hex run.
    Num(&'static str),
    /// Raw regular-expression fragment.
    Expr(&'static str),
    /// Optional group: matches the inner tokens or nothing.
    Opt(&'static [Token]),
    /// Ordered alternation: the first branch that matches wins.
    Alt(&'static [&'static [Token]]),
    /// Wildcard tail.
    Any,
}

/// A compiled sentence grammar.
///
/// Matching is all-or-nothing over the entire input line: either the line
/// has exactly the described shape and [`Grammar::parse`] yields its captured
/// fields, or nothing is returned and no partial state is observable.
#[derive(Debug)]
pub struct Grammar {
    regex: Regex,
}

impl Grammar {
    /// Compile a token list into a grammar.
    ///
    /// Fails only on malformed token fragments, which is a programming
    /// mistake in the protocol definition rather than a runtime condition.
    pub fn compile(tokens: &[Token]) -> Result<Self> {
        let mut source = String::from("^(?:");
        write_tokens(&mut source, tokens);
        source.push_str(")$");
        Ok(Self {
            regex: Regex::new(&source)?,
        })
    }

    /// Match a line against the grammar.
    ///
    /// Returns a cursor over the captured fields, or `None` if the line does
    /// not have the described shape.
    pub fn parse(&self, line: &str) -> Option<Fields> {
        let captures = self.regex.captures(line)?;
        let values = (1..captures.len())
            .map(|i| captures.get(i).map(|m| m.as_str().to_string()))
            .collect();
        Some(Fields::new(values))
    }
}

fn write_tokens(out: &mut String, tokens: &[Token]) {
    for token in tokens {
        match token {
            Token::Text(text) => out.push_str(&regex::escape(text)),
            Token::Num(shorthand) => write_num(out, shorthand),
            Token::Expr(fragment) => out.push_str(fragment),
            Token::Opt(inner) => {
                out.push_str("(?:");
                write_tokens(out, inner);
                out.push_str(")?");
            }
            Token::Alt(branches) => {
                out.push_str("(?:");
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        out.push('|');
                    }
                    write_tokens(out, branch);
                }
                out.push(')');
            }
            Token::Any => out.push_str(".*"),
        }
    }
}

fn write_num(out: &mut String, shorthand: &str) {
    for c in shorthand.chars() {
        match c {
            'd' => out.push_str(r"\d"),
            'x' => out.push_str("[0-9a-fA-F]"),
            '.' | '|' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
}
