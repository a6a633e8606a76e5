//! Splitting an `EXPLAIN` command into its options and the statement.
//!
//! Two forms are accepted:
//!
//! ```text
//! EXPLAIN [ ANALYZE ] [ VERBOSE ] statement
//! EXPLAIN ( option [ value ] [, ...] ) statement
//! ```
//!
//! Option names are lower-cased and carry the byte offset of the name so
//! option errors can point at it. The statement is returned as text; planning
//! it is somebody else's job.

use crate::error::{PlanError, Result};
use crate::nodes::makefuncs::make_def_elem;
use crate::nodes::parsenodes::{DefElem, DefElemArg};

/// A tokenized `EXPLAIN` command.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplainCommand {
    /// Options in the order written.
    pub options: Vec<DefElem>,
    /// The statement to explain, without a trailing semicolon.
    pub statement: String,
    /// Byte offset of the statement inside the command.
    pub statement_location: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Word(String),
    Quoted(String),
    Str(String),
    Number,
    Punct(char),
}

#[derive(Debug, Clone)]
struct Token<'a> {
    kind: TokenKind,
    raw: &'a str,
    at: usize,
}

struct Lexer<'a> {
    text: &'a str,
    pos: usize,
}

fn syntax_error(token: Option<&Token<'_>>, end: usize) -> PlanError {
    match token {
        Some(tok) => PlanError::option_at(
            format!("syntax error at or near \"{}\"", tok.raw),
            Some(tok.at),
        ),
        None => PlanError::option_at("syntax error at end of input", Some(end)),
    }
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Lexer { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if trimmed.starts_with("--") {
                self.pos += trimmed.find('\n').unwrap_or(trimmed.len());
            } else if trimmed.starts_with("/*") {
                match trimmed[2..].find("*/") {
                    Some(end) => self.pos += end + 4,
                    None => self.pos = self.text.len(),
                }
            } else {
                return;
            }
        }
    }

    fn peek(&mut self) -> Result<Option<Token<'a>>> {
        let saved = self.pos;
        let token = self.next_token();
        self.pos = saved;
        token
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        self.skip_trivia();
        let start = self.pos;
        let rest = self.rest();
        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };
        let (kind, len) = if first.is_alphabetic() || first == '_' {
            let len = rest
                .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
                .unwrap_or(rest.len());
            (TokenKind::Word(rest[..len].to_lowercase()), len)
        } else if first.is_ascii_digit() || (first == '.' && rest[1..].starts_with(|c: char| c.is_ascii_digit())) {
            let len = number_len(rest);
            (TokenKind::Number, len)
        } else if first == '\'' || first == '"' {
            let (value, len) = quoted(rest, first).ok_or_else(|| {
                PlanError::option_at("unterminated quoted string", Some(start))
            })?;
            if first == '\'' {
                (TokenKind::Str(value), len)
            } else {
                (TokenKind::Quoted(value), len)
            }
        } else {
            (TokenKind::Punct(first), first.len_utf8())
        };
        self.pos += len;
        Ok(Some(Token {
            kind,
            raw: &self.text[start..start + len],
            at: start,
        }))
    }
}

fn number_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

/// Contents and byte length of a quoted token, with doubled quotes folded.
fn quoted(s: &str, quote: char) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut chars = s.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            if chars.peek().is_some_and(|&(_, next)| next == quote) {
                chars.next();
                value.push(quote);
                continue;
            }
            return Some((value, i + 1));
        }
        value.push(c);
    }
    None
}

fn numeric_arg(raw: &str) -> DefElemArg {
    if raw.contains(['.', 'e', 'E']) {
        return DefElemArg::Float(raw.to_string());
    }
    raw.parse::<i64>()
        .map(DefElemArg::Integer)
        .unwrap_or_else(|_| DefElemArg::Float(raw.to_string()))
}

fn option_value(lx: &mut Lexer<'_>) -> Result<Option<DefElemArg>> {
    let end = lx.text.len();
    let Some(tok) = lx.peek()? else {
        return Err(syntax_error(None, end));
    };
    let arg = match &tok.kind {
        TokenKind::Punct(',') | TokenKind::Punct(')') => return Ok(None),
        TokenKind::Word(w) | TokenKind::Quoted(w) | TokenKind::Str(w) => {
            DefElemArg::String(w.clone())
        }
        TokenKind::Number => numeric_arg(tok.raw),
        TokenKind::Punct(sign @ ('-' | '+')) => {
            let sign = *sign;
            lx.next_token()?;
            match lx.peek()? {
                Some(num) if num.kind == TokenKind::Number => {
                    let text = if sign == '-' {
                        format!("-{}", num.raw)
                    } else {
                        num.raw.to_string()
                    };
                    lx.next_token()?;
                    return Ok(Some(numeric_arg(&text)));
                }
                other => return Err(syntax_error(other.as_ref(), end)),
            }
        }
        TokenKind::Punct(_) => return Err(syntax_error(Some(&tok), end)),
    };
    lx.next_token()?;
    Ok(Some(arg))
}

fn option_list(lx: &mut Lexer<'_>) -> Result<Vec<DefElem>> {
    let end = lx.text.len();
    let mut options = Vec::new();
    loop {
        let tok = lx.next_token()?;
        let (name, at) = match &tok {
            Some(Token {
                kind: TokenKind::Word(w) | TokenKind::Quoted(w),
                at,
                ..
            }) => (w.clone(), *at),
            other => return Err(syntax_error(other.as_ref(), end)),
        };
        let arg = option_value(lx)?;
        options.push(make_def_elem(&name, arg, Some(at)));
        match lx.next_token()? {
            Some(Token {
                kind: TokenKind::Punct(','),
                ..
            }) => continue,
            Some(Token {
                kind: TokenKind::Punct(')'),
                ..
            }) => return Ok(options),
            other => return Err(syntax_error(other.as_ref(), end)),
        }
    }
}

/// Splits `text` into options and statement.
pub fn parse_explain_command(text: &str) -> Result<ExplainCommand> {
    let end = text.len();
    let mut lx = Lexer::new(text);
    match lx.next_token()? {
        Some(Token {
            kind: TokenKind::Word(w),
            ..
        }) if w == "explain" => {}
        other => return Err(syntax_error(other.as_ref(), end)),
    }

    let mut options = Vec::new();
    match lx.peek()? {
        Some(Token {
            kind: TokenKind::Punct('('),
            ..
        }) => {
            lx.next_token()?;
            options = option_list(&mut lx)?;
        }
        _ => {
            for (keywords, name) in [(&["analyze", "analyse"][..], "analyze"), (&["verbose"][..], "verbose")] {
                if let Some(Token {
                    kind: TokenKind::Word(w),
                    at,
                    ..
                }) = lx.peek()?
                {
                    if keywords.contains(&w.as_str()) {
                        lx.next_token()?;
                        options.push(make_def_elem(name, None, Some(at)));
                    }
                }
            }
        }
    }

    lx.skip_trivia();
    let statement_location = lx.pos;
    let statement = text[statement_location..]
        .trim_end()
        .trim_end_matches(';')
        .trim_end();
    if statement.is_empty() {
        return Err(syntax_error(None, end));
    }
    Ok(ExplainCommand {
        options,
        statement: statement.to_string(),
        statement_location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::ParseLoc;

    #[test]
    fn parenthesized_options_keep_locations() {
        let cmd = parse_explain_command("EXPLAIN (ANALYZE, Format JSON, costs off) SELECT 1;").unwrap();
        let names: Vec<_> = cmd.options.iter().map(|o| o.defname.as_str()).collect();
        assert_eq!(names, ["analyze", "format", "costs"]);
        assert_eq!(cmd.options[0].location, ParseLoc(9));
        assert_eq!(cmd.options[1].location, ParseLoc(18));
        assert_eq!(cmd.options[1].get_string().unwrap(), "json");
        assert!(cmd.options[0].arg.is_none());
        assert_eq!(cmd.statement, "SELECT 1");
        assert_eq!(cmd.statement_location, 42);
    }

    #[test]
    fn legacy_form() {
        let cmd = parse_explain_command("explain analyse verbose select * from t").unwrap();
        let names: Vec<_> = cmd.options.iter().map(|o| o.defname.as_str()).collect();
        assert_eq!(names, ["analyze", "verbose"]);
        assert_eq!(cmd.statement, "select * from t");

        let cmd = parse_explain_command("EXPLAIN SELECT 1").unwrap();
        assert!(cmd.options.is_empty());
    }

    #[test]
    fn option_values() {
        let cmd = parse_explain_command("EXPLAIN (serialize 'binary', bicycle -3, x 1.5, \"Y\") SELECT 1")
            .unwrap();
        assert_eq!(cmd.options[0].arg, Some(DefElemArg::String("binary".into())));
        assert_eq!(cmd.options[1].arg, Some(DefElemArg::Integer(-3)));
        assert_eq!(cmd.options[2].arg, Some(DefElemArg::Float("1.5".into())));
        assert_eq!(cmd.options[3].defname, "Y");
    }

    #[test]
    fn syntax_errors_point_at_the_token() {
        let err = parse_explain_command("EXPLAIN (analyze,, costs) SELECT 1").unwrap_err();
        assert_eq!(err.to_string(), "syntax error at or near \",\"");
        assert_eq!(err.location(), Some(17));

        let err = parse_explain_command("EXPLAIN (analyze").unwrap_err();
        assert_eq!(err.to_string(), "syntax error at end of input");

        let err = parse_explain_command("EXPLAIN (costs off)").unwrap_err();
        assert_eq!(err.to_string(), "syntax error at end of input");

        assert!(parse_explain_command("SELECT 1").is_err());
    }
}
