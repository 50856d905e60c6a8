use serde::{Deserialize, Serialize};

use crate::error::{ParseError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Identifier,
    Numeric,
    StrLit,
    Separator,
    Assignment,
    End,

    Whitespace,
    Newline,
    Comment,
}

impl TokenKind {
    /// Layout tokens only matter when reproducing text; the parser never
    /// sees them.
    pub fn is_layout(self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Newline | TokenKind::Comment)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub lptr: usize,
    pub lno: usize,
    pub col: usize,
}

impl<'src> Token<'src> {
    fn new(kind: TokenKind, text: &'src str,
           lptr: usize, lno: usize, col: usize) -> Token<'src> {
        Token {
            kind,
            text,
            lptr,
            lno,
            col,
        }
    }

    pub fn is_separator(&self, sep: &str) -> bool {
        self.kind == TokenKind::Separator && self.text == sep
    }
}

const SEPARATORS: &str = "()[]{},;";

fn span_while(rest: &str, pred: impl Fn(char) -> bool) -> usize {
    rest.char_indices()
        .find(|&(_, c)| !pred(c))
        .map(|(offset, _)| offset)
        .unwrap_or(rest.len())
}

fn digits(rest: &str, radix: u32) -> usize {
    span_while(rest, |c| c.is_digit(radix))
}

/// Length of a quoted string at the start of `rest`, quotes included.
/// A backslash always escapes the character after it.
fn scan_string(rest: &str, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (offset, c) in rest.char_indices().skip(1) {
        if escaped {
            escaped = false;
        }
        else if c == '\\' {
            escaped = true;
        }
        else if c == quote {
            return Some(offset + c.len_utf8());
        }
    }
    None
}

/// `-?0x[hex]+(.[hex]+)?(p[+-]?[0-9]+)?`, case-insensitive.
fn scan_hex(rest: &str) -> Option<usize> {
    let sign = usize::from(rest.starts_with('-'));
    let body = &rest[sign..];
    if !(body.starts_with("0x") || body.starts_with("0X")) {
        return None;
    }
    let mut len = sign + 2;
    let whole = digits(&rest[len..], 16);
    if whole == 0 {
        return None;
    }
    len += whole;
    if rest[len..].starts_with('.') {
        let frac = digits(&rest[len + 1..], 16);
        if frac > 0 {
            len += 1 + frac;
        }
    }
    len += exponent(&rest[len..], ['p', 'P']);
    Some(len)
}

/// `-?[0-9]+(.[0-9]+)?(e[+-]?[0-9]+)?`
fn scan_decimal(rest: &str) -> Option<usize> {
    let sign = usize::from(rest.starts_with('-'));
    let whole = digits(&rest[sign..], 10);
    if whole == 0 {
        return None;
    }
    let mut len = sign + whole;
    if rest[len..].starts_with('.') {
        let frac = digits(&rest[len + 1..], 10);
        if frac > 0 {
            len += 1 + frac;
        }
    }
    len += exponent(&rest[len..], ['e', 'E']);
    Some(len)
}

fn exponent(rest: &str, markers: [char; 2]) -> usize {
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if markers.contains(&c) => {},
        _ => return 0,
    }
    let sign = match chars.next() {
        Some('+') | Some('-') => 1,
        _ => 0,
    };
    let exp = digits(&rest[1 + sign..], 10);
    if exp == 0 {
        0
    }
    else {
        1 + sign + exp
    }
}

fn scan_identifier(rest: &str) -> Option<usize> {
    match rest.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            Some(span_while(rest, |c| c.is_ascii_alphanumeric() || c == '_'))
        },
        _ => None,
    }
}

fn snippet(rest: &str) -> String {
    rest.lines()
        .next()
        .unwrap_or("")
        .chars()
        .take(24)
        .collect()
}

/// Split `input` into every token, layout included. The stream always ends
/// with a single `End` token whose text is empty.
pub fn tokenise_full<'src>(input: &'src str) -> Result<Vec<Token<'src>>> {
    let mut toks = Vec::new();
    let mut lptr: usize = 0;         // Left end of current Token - byte offset
    let mut lno: usize = 1;          // Line number of current char
    let mut col: usize = 0;          // Column number of current char

    loop {
        let rest = &input[lptr..];
        let c = match rest.chars().next() {
            Some(c) => c,
            None => {
                toks.push(Token::new(TokenKind::End, "", lptr, lno, col));
                break;
            },
        };

        let (kind, len) = match c {
            ' ' | '\r' | '\t' => {
                (TokenKind::Whitespace, span_while(rest, |c| matches!(c, ' ' | '\r' | '\t')))
            },
            '\n' => (TokenKind::Newline, 1),
            c if SEPARATORS.contains(c) => (TokenKind::Separator, 1),
            '-' if rest.starts_with("--") => {
                (TokenKind::Comment, rest.find('\n').unwrap_or(rest.len()))
            },
            '=' => (TokenKind::Assignment, 1),
            '"' | '\'' => {
                match scan_string(rest, c) {
                    Some(len) => (TokenKind::StrLit, len),
                    None => return Err(ParseError::UnterminatedString { line: lno, col }),
                }
            },
            _ => {
                if let Some(len) = scan_hex(rest).or_else(|| scan_decimal(rest)) {
                    (TokenKind::Numeric, len)
                }
                else if let Some(len) = scan_identifier(rest) {
                    (TokenKind::Identifier, len)
                }
                else {
                    return Err(ParseError::Unrecognised {
                        snippet: snippet(rest),
                        line: lno,
                        col,
                    });
                }
            },
        };

        let text = &rest[..len];
        toks.push(Token::new(kind, text, lptr, lno, col));

        for c in text.chars() {
            if c == '\n' {
                lno += 1;
                col = 0;
            }
            else {
                col += 1;
            }
        }
        lptr += len;
    }

    Ok(toks)
}

/// The semantic view of `input`: everything but whitespace, newlines and
/// comments.
pub fn tokenise<'src>(input: &'src str) -> Result<Vec<Token<'src>>> {
    Ok(tokenise_full(input)?
        .into_iter()
        .filter(|tok| !tok.kind.is_layout())
        .collect())
}
