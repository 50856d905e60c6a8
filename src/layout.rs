//! Layout capture: everything about the source text that the structured
//! value forgets.
//!
//! The recorder turns the full token stream into a flat replay log. Keys,
//! punctuation, comments and whitespace are kept verbatim; every value is
//! replaced by a [`LayoutToken::Leaf`] slot that the renderer fills from the
//! (possibly edited) data. Indentation is factored out per table: a line
//! that starts with the indent the renderer would insert anyway records
//! nothing, any other line records its actual leading whitespace.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ParseError, Result};
use crate::parser::{numeric_value, unescape, KEYWORDS};
use crate::tokeniser::{Token, TokenKind};
use crate::types::Value;

/// How one table body is laid out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndentFormat {
    /// The body spans more than one line.
    pub multiline: bool,
    /// Leading whitespace of the body's lines when multiline, otherwise the
    /// whitespace right after `{`.
    pub indent_text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LayoutToken {
    StartBracket,
    EndBracket,
    /// `,` or `;`
    Separator(char),
    Newline,
    Whitespace(String),
    Comment(String),
    /// A bare key, as in `name = ...`.
    Identifier(String),
    /// An integer key inside `[...]`.
    Numeric { text: String, key: i64 },
    /// A string key inside `[...]`.
    IndexKey { text: String, key: String },
    OpenIndex,
    CloseIndex,
    Assignment,
    /// A value slot. `text` is the literal as written and `original` the
    /// value it denoted, so unchanged values are reproduced verbatim.
    Leaf { text: String, original: Value },
}

/// Everything needed to turn a value back into the text it came from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentData {
    /// One entry per table, in the order the tables open.
    pub indentation: Vec<IndentFormat>,
    pub events: Vec<LayoutToken>,
}

fn unexpected(expected: &str, tok: &Token<'_>) -> ParseError {
    ParseError::Unexpected {
        expected: expected.to_string(),
        found: tok.text.to_string(),
        line: tok.lno,
        col: tok.col,
    }
}

fn leaf_value(tok: &Token<'_>) -> Result<Value> {
    match tok.kind {
        TokenKind::StrLit => Ok(Value::String(unescape(tok.text))),
        TokenKind::Numeric => {
            numeric_value(tok.text).ok_or_else(|| ParseError::InvalidNumber {
                text: tok.text.to_string(),
                line: tok.lno,
                col: tok.col,
            })
        },
        TokenKind::Identifier => {
            match tok.text {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                "nil" => Ok(Value::Nil),
                word if KEYWORDS.contains(&word) => Err(ParseError::Unsupported {
                    what: format!("keyword '{}'", word),
                    line: tok.lno,
                    col: tok.col,
                }),
                name => Ok(Value::String(name.to_string())),
            }
        },
        _ => Err(unexpected("value", tok)),
    }
}

fn index_key(tok: &Token<'_>) -> Result<LayoutToken> {
    let text = tok.text.to_string();
    match leaf_value(tok)? {
        Value::Integer(key) => Ok(LayoutToken::Numeric { text, key }),
        Value::String(key) => Ok(LayoutToken::IndexKey { text, key }),
        other => Err(ParseError::InvalidKey {
            found: other.type_name().to_string(),
            line: tok.lno,
            col: tok.col,
        }),
    }
}

fn is_blank(next: Option<&Token<'_>>) -> bool {
    next.map_or(true, |tok| matches!(tok.kind, TokenKind::Newline | TokenKind::End))
}

/// Leading whitespace of the line starting at `idx`, and the token after it.
fn line_start<'t, 'src>(tokens: &'t [Token<'src>], idx: usize) -> (&'src str, Option<&'t Token<'src>>) {
    match tokens.get(idx) {
        Some(tok) if tok.kind == TokenKind::Whitespace => (tok.text, tokens.get(idx + 1)),
        next => ("", next),
    }
}

struct Recorder<'t, 'src> {
    tokens: &'t [Token<'src>],
    ptr: usize,
    indents: Vec<String>,
    in_index: bool,
    data: CommentData,
}

impl<'t, 'src> Recorder<'t, 'src> {
    fn push(&mut self, event: LayoutToken) {
        self.data.events.push(event);
    }

    /// Scan ahead from the `{` at `open` to its matching `}`.
    fn indent_format(&self, open: usize) -> IndentFormat {
        let mut depth = 0usize;
        let mut multiline = false;
        let mut indent_text = None;

        for (idx, tok) in self.tokens.iter().enumerate().skip(open + 1) {
            match tok.kind {
                TokenKind::Separator if tok.text == "{" => depth += 1,
                TokenKind::Separator if tok.text == "}" => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                },
                TokenKind::Newline => {
                    multiline = true;
                    if depth == 0 && indent_text.is_none() {
                        let (ws, next) = line_start(self.tokens, idx + 1);
                        let closing = next.map_or(false, |tok| tok.is_separator("}"));
                        if !is_blank(next) && !closing {
                            indent_text = Some(ws);
                        }
                    }
                },
                TokenKind::End => break,
                _ => {},
            }
        }

        if !multiline {
            indent_text = match self.tokens.get(open + 1) {
                Some(tok) if tok.kind == TokenKind::Whitespace => Some(tok.text),
                _ => None,
            };
        }

        IndentFormat {
            multiline,
            indent_text: indent_text.unwrap_or("").to_string(),
        }
    }

    /// Called with `ptr` on the first token of a new line.
    fn line_break(&mut self) {
        let (ws, next) = line_start(self.tokens, self.ptr);
        if is_blank(next) {
            if !ws.is_empty() {
                self.push(LayoutToken::Whitespace(ws.to_string()));
            }
        }
        else {
            let closing = next.map_or(false, |tok| tok.is_separator("}"));
            let expected = if closing {
                self.indents.len().checked_sub(2).and_then(|idx| self.indents.get(idx))
            }
            else {
                self.indents.last()
            };
            if expected.map_or("", String::as_str) != ws {
                self.push(LayoutToken::Whitespace(ws.to_string()));
            }
        }
        if !ws.is_empty() {
            self.ptr += 1;
        }
    }

    /// Whether the identifier just consumed is a key, i.e. followed by `=`.
    fn at_assignment(&self) -> bool {
        self.tokens[self.ptr..]
            .iter()
            .find(|tok| !tok.kind.is_layout())
            .map_or(false, |tok| tok.kind == TokenKind::Assignment)
    }

    fn separator(&mut self, tok: &Token<'src>) -> Result<()> {
        match tok.text {
            "{" => {
                let format = self.indent_format(self.ptr - 1);
                self.indents.push(format.indent_text.clone());
                self.data.indentation.push(format);
                self.push(LayoutToken::StartBracket);
            },
            "}" => {
                self.push(LayoutToken::EndBracket);
                self.indents.pop();
            },
            "[" => {
                self.in_index = true;
                self.push(LayoutToken::OpenIndex);
            },
            "]" => {
                self.in_index = false;
                self.push(LayoutToken::CloseIndex);
            },
            "," => self.push(LayoutToken::Separator(',')),
            ";" => self.push(LayoutToken::Separator(';')),
            _ => {
                return Err(ParseError::Unsupported {
                    what: String::from("function call"),
                    line: tok.lno,
                    col: tok.col,
                });
            },
        }
        Ok(())
    }

    fn run(mut self) -> Result<CommentData> {
        let tokens = self.tokens;
        while let Some(tok) = tokens.get(self.ptr) {
            self.ptr += 1;
            match tok.kind {
                TokenKind::End => break,
                TokenKind::Whitespace => self.push(LayoutToken::Whitespace(tok.text.to_string())),
                TokenKind::Newline => {
                    self.push(LayoutToken::Newline);
                    self.line_break();
                },
                TokenKind::Comment => self.push(LayoutToken::Comment(tok.text.to_string())),
                TokenKind::Assignment => self.push(LayoutToken::Assignment),
                TokenKind::Separator => self.separator(tok)?,
                TokenKind::Identifier if !self.in_index && self.at_assignment() => {
                    self.push(LayoutToken::Identifier(tok.text.to_string()));
                },
                TokenKind::Identifier | TokenKind::Numeric | TokenKind::StrLit => {
                    let event = if self.in_index {
                        index_key(tok)?
                    }
                    else {
                        LayoutToken::Leaf {
                            text: tok.text.to_string(),
                            original: leaf_value(tok)?,
                        }
                    };
                    self.push(event);
                },
            }
        }
        Ok(self.data)
    }
}

/// Record the layout of a full token stream (layout tokens included).
pub fn record(tokens: &[Token<'_>]) -> Result<CommentData> {
    let recorder = Recorder {
        tokens,
        ptr: 0,
        indents: vec![String::new()],
        in_index: false,
        data: CommentData::default(),
    };
    let data = recorder.run()?;
    debug!(events = data.events.len(), tables = data.indentation.len(), "layout recorded");
    Ok(data)
}
