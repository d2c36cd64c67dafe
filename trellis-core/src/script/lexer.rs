//! Lexer for the script language.
//!
//! Uses logos for tokenization with custom handling for Python-style
//! indentation (INDENT/DEDENT tokens).
//!
//! # Indentation Handling
//!
//! The lexer tracks indentation levels using a stack. At the start of each line:
//! - If indentation increases: emit INDENT
//! - If indentation decreases: emit one or more DEDENT tokens
//! - Blank lines and comments are skipped
//!
//! Inside `()`, `[]` and `{}` newlines and indentation carry no meaning, so a
//! call may span several lines.

use std::fmt;

use logos::Logos;

use crate::error::ParseError;

/// A 1-based line/column position in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Span {
    pub line: u32,
    pub col: u32,
}

impl Span {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    /// Translate a span produced by a nested lexer whose input started at
    /// `origin`.
    pub(crate) fn relative_to(self, origin: Span) -> Span {
        if self.line == 1 {
            Span::new(origin.line, origin.col + self.col - 1)
        } else {
            Span::new(origin.line + self.line - 1, self.col)
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.col)
    }
}

/// A token with its span
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Token types for the script language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
pub enum Token {
    // Keywords
    #[token("def")]
    Def,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    None_,
    #[token("pass")]
    Pass,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(strip_quotes(lex.slice(), 1)))]
    #[regex(r"'([^'\\\n]|\\.)*'", |lex| unescape(strip_quotes(lex.slice(), 1)))]
    Str(String),

    /// Raw body of an f-string; interpolations are parsed by the parser.
    #[regex(r#"f"([^"\\\n]|\\.)*""#, |lex| strip_quotes(lex.slice(), 2).to_string())]
    #[regex(r"f'([^'\\\n]|\\.)*'", |lex| strip_quotes(lex.slice(), 2).to_string())]
    FStr(String),

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("=")]
    Eq,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    #[token("\n")]
    Newline,

    #[regex(r"#[^\n]*")]
    Comment,

    // Synthetic tokens, never matched by logos directly
    Indent,
    Dedent,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Def => write!(f, "def"),
            Token::Return => write!(f, "return"),
            Token::If => write!(f, "if"),
            Token::Elif => write!(f, "elif"),
            Token::Else => write!(f, "else"),
            Token::For => write!(f, "for"),
            Token::In => write!(f, "in"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::True => write!(f, "True"),
            Token::False => write!(f, "False"),
            Token::None_ => write!(f, "None"),
            Token::Pass => write!(f, "pass"),
            Token::Ident(name) => write!(f, "identifier '{}'", name),
            Token::Number(n) => write!(f, "number {}", n),
            Token::Str(_) => write!(f, "string literal"),
            Token::FStr(_) => write!(f, "f-string"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Percent => write!(f, "'%'"),
            Token::EqEq => write!(f, "'=='"),
            Token::NotEq => write!(f, "'!='"),
            Token::Lt => write!(f, "'<'"),
            Token::Gt => write!(f, "'>'"),
            Token::Le => write!(f, "'<='"),
            Token::Ge => write!(f, "'>='"),
            Token::Eq => write!(f, "'='"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::Comma => write!(f, "','"),
            Token::Colon => write!(f, "':'"),
            Token::Dot => write!(f, "'.'"),
            Token::Newline => write!(f, "newline"),
            Token::Comment => write!(f, "comment"),
            Token::Indent => write!(f, "indent"),
            Token::Dedent => write!(f, "dedent"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

fn strip_quotes(slice: &str, prefix: usize) -> &str {
    &slice[prefix..slice.len() - 1]
}

/// Resolve backslash escapes. Unknown escapes are kept verbatim.
pub(crate) fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Maps byte offsets to line/column spans.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn span(&self, source: &str, offset: usize) -> Span {
        let line = match self.starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        let start = self.starts[line];
        let col = source[start..offset].chars().count() + 1;
        Span::new(line as u32 + 1, col as u32)
    }

    fn line_start(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(exact) => self.starts[exact],
            Err(next) => self.starts[next - 1],
        }
    }
}

/// Tokenize `source`, resolving indentation into INDENT/DEDENT tokens.
///
/// The returned stream always ends with `Eof`, and every logical line ends
/// with `Newline`.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let index = LineIndex::new(source);
    let mut out = Vec::new();
    let mut indent_stack: Vec<usize> = vec![0];
    let mut bracket_depth = 0usize;
    let mut at_line_start = true;

    let mut lexer = Token::lexer(source);
    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = index.span(source, range.start);
        let token = result.map_err(|_| {
            ParseError::new(
                format!("unexpected character {:?}", &source[range.clone()]),
                span,
            )
        })?;

        match token {
            Token::Comment => continue,
            Token::Newline => {
                if bracket_depth == 0 {
                    if !at_line_start {
                        out.push(SpannedToken {
                            token: Token::Newline,
                            span,
                        });
                    }
                    at_line_start = true;
                }
                continue;
            }
            _ => {}
        }

        if at_line_start {
            let leading = &source[index.line_start(range.start)..range.start];
            let width = leading
                .chars()
                .map(|c| if c == '\t' { 4 } else { 1 })
                .sum::<usize>();
            let current = indent_stack.last().copied().unwrap_or(0);

            if width > current {
                indent_stack.push(width);
                out.push(SpannedToken {
                    token: Token::Indent,
                    span,
                });
            } else {
                while indent_stack.last().is_some_and(|&top| width < top) {
                    indent_stack.pop();
                    out.push(SpannedToken {
                        token: Token::Dedent,
                        span,
                    });
                }
                if indent_stack.last().copied() != Some(width) {
                    return Err(ParseError::new(
                        "unindent does not match any outer indentation level",
                        span,
                    ));
                }
            }
            at_line_start = false;
        }

        match token {
            Token::LParen | Token::LBracket | Token::LBrace => bracket_depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => {
                bracket_depth = bracket_depth.saturating_sub(1)
            }
            _ => {}
        }

        out.push(SpannedToken { token, span });
    }

    let end = index.span(source, source.len());
    if !at_line_start {
        out.push(SpannedToken {
            token: Token::Newline,
            span: end,
        });
    }
    while indent_stack.len() > 1 {
        indent_stack.pop();
        out.push(SpannedToken {
            token: Token::Dedent,
            span: end,
        });
    }
    out.push(SpannedToken {
        token: Token::Eof,
        span: end,
    });

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn simple_assignment() {
        assert_eq!(
            kinds("x = 1"),
            vec![
                Token::Ident("x".into()),
                Token::Eq,
                Token::Number(1.0),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn indentation_emits_indent_and_dedent() {
        let tokens = kinds("def f(a):\n    return a\nx = f(1)\n");
        let indents = tokens.iter().filter(|t| **t == Token::Indent).count();
        let dedents = tokens.iter().filter(|t| **t == Token::Dedent).count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);

        // The dedent comes before the statement that follows the block
        let dedent = tokens.iter().position(|t| *t == Token::Dedent).unwrap();
        assert_eq!(tokens[dedent + 1], Token::Ident("x".into()));
    }

    #[test]
    fn newlines_inside_brackets_are_ignored() {
        let tokens = kinds("slider(\n    \"N\",\n    min=0,\n)\n");
        assert_eq!(tokens.iter().filter(|t| **t == Token::Newline).count(), 1);
        assert!(!tokens.contains(&Token::Indent));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let tokens = kinds("# heading\n\nx = 1  # trailing\n\n");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("x".into()),
                Token::Eq,
                Token::Number(1.0),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn strings_and_fstrings() {
        let tokens = kinds(r#"a = "say \"hi\"" + f"n={n}""#);
        assert_eq!(tokens[2], Token::Str("say \"hi\"".into()));
        assert_eq!(tokens[4], Token::FStr("n={n}".into()));
    }

    #[test]
    fn keywords_are_not_identifiers() {
        let tokens = kinds("define = None");
        assert_eq!(tokens[0], Token::Ident("define".into()));
        assert_eq!(tokens[2], Token::None_);
    }

    #[test]
    fn spans_are_one_based() {
        let tokens = tokenize("x = 1\n  \ny = 2").unwrap();
        let y = tokens
            .iter()
            .find(|t| t.token == Token::Ident("y".into()))
            .unwrap();
        assert_eq!(y.span, Span::new(3, 1));
    }

    #[test]
    fn bad_dedent_is_an_error() {
        let err = tokenize("def f():\n        x = 1\n    y = 2\n").unwrap_err();
        assert!(err.message.contains("unindent"));
    }

    #[test]
    fn unexpected_character_is_an_error() {
        let err = tokenize("x = 1 $ 2").unwrap_err();
        assert_eq!(err.span, Span::new(1, 7));
    }
}
