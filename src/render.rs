use tracing::{debug, trace};

use crate::error::RenderError;
use crate::layout::{CommentData, IndentFormat, LayoutToken};
use crate::types::{Key, Path, Segment, Value};

type Result<T> = std::result::Result<T, RenderError>;

/// Indent outside of every table.
static ROOT_INDENT: IndentFormat = IndentFormat {
    multiline: true,
    indent_text: String::new(),
};

enum LineState {
    WritingLine,
    AtLineBreak,
}

/* Table being filled */

struct Frame<'v> {
    value: &'v Value,
    path: Path,
    visited: usize,
    next_index: i64,
}

struct Renderer<'v, 'l> {
    root: &'v Value,
    started: bool,
    formats: std::slice::Iter<'l, IndentFormat>,
    indents: Vec<&'l IndentFormat>,
    frames: Vec<Frame<'v>>,
    pending_key: Option<Key>,
    lines: Vec<String>,
    line: String,
    state: LineState,
}

fn layout_error(msg: &str) -> RenderError {
    RenderError::Layout(msg.to_string())
}

/// Quote `text` as a Lua string literal, escaping what the tokeniser
/// would otherwise misread.
fn quote(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0b' => out.push_str("\\v"),
            '\x0c' => out.push_str("\\f"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            },
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// The text for a value slot. Unchanged values keep their literal as
/// written, so `0x10` stays `0x10` and `'a'` keeps its quotes.
fn leaf_text(value: &Value, text: &str, original: &Value, path: &Path) -> Result<String> {
    if value == original {
        return Ok(text.to_string());
    }
    match value {
        Value::Nil => Ok(String::from("nil")),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Integer(n) => Ok(n.to_string()),
        Value::Float(n) if !n.is_finite() => Err(RenderError::NonFinite { path: path.clone() }),
        Value::Float(n) => Ok(format!("{:?}", n)),
        Value::String(s) => {
            let q = match text.chars().next() {
                Some('\'') => '\'',
                _ => '"',
            };
            Ok(quote(s, q))
        },
        Value::Sequence(_) | Value::Table(_) => Err(RenderError::ExpectedLeaf {
            path: path.clone(),
            found: value.type_name(),
        }),
    }
}

impl<'v, 'l> Renderer<'v, 'l> {
    fn new(root: &'v Value, layout: &'l CommentData) -> Renderer<'v, 'l> {
        Renderer {
            root,
            started: false,
            formats: layout.indentation.iter(),
            indents: vec![&ROOT_INDENT],
            frames: Vec::new(),
            pending_key: None,
            lines: Vec::new(),
            line: String::new(),
            state: LineState::AtLineBreak,
        }
    }

    fn indent(&self) -> &'l IndentFormat {
        self.indents.last().copied().unwrap_or(&ROOT_INDENT)
    }

    fn write(&mut self, text: &str) {
        if let LineState::AtLineBreak = self.state {
            let indent = self.indent();
            self.line.push_str(&indent.indent_text);
            self.state = LineState::WritingLine;
        }
        self.line.push_str(text);
    }

    fn cartridge_return(&mut self) -> Result<()> {
        if !self.indent().multiline {
            return Err(layout_error("line break inside a single-line table"));
        }
        self.lines.push(std::mem::take(&mut self.line));
        self.state = LineState::AtLineBreak;
        Ok(())
    }

    /// The key of the next entry: the one just written, or the next
    /// positional index.
    fn take_key(&mut self) -> Result<Key> {
        if let Some(key) = self.pending_key.take() {
            return Ok(key);
        }
        let frame = self.frames.last_mut().ok_or_else(|| layout_error("value outside of a table"))?;
        let key = Key::Int(frame.next_index);
        frame.next_index += 1;
        Ok(key)
    }

    fn child(&mut self, key: Key) -> Result<(&'v Value, Path)> {
        let frame = self.frames.last_mut().ok_or_else(|| layout_error("value outside of a table"))?;
        let parent: &'v Value = frame.value;
        let segment = match (parent, &key) {
            (Value::Sequence(_), Key::Int(n)) => {
                match n.checked_sub(1).and_then(|idx| usize::try_from(idx).ok()) {
                    Some(idx) => Segment::Index(idx),
                    None => Segment::Key(key.clone()),
                }
            },
            _ => Segment::Key(key.clone()),
        };
        let path = frame.path.join(segment);
        match parent.entry(&key) {
            Some(value) => {
                frame.visited += 1;
                Ok((value, path))
            },
            None => Err(RenderError::MissingKey { path }),
        }
    }

    fn open_table(&mut self) -> Result<()> {
        let (value, path) = if self.started {
            let key = self.take_key()?;
            self.child(key)?
        }
        else {
            self.started = true;
            (self.root, Path::root())
        };
        if !value.is_container() {
            return Err(RenderError::ExpectedTable { path, found: value.type_name() });
        }

        self.write("{");
        let format = self.formats.next().ok_or_else(|| layout_error("more tables than indent formats"))?;
        self.indents.push(format);
        trace!(path = %path, multiline = format.multiline, "open table");
        self.frames.push(Frame {
            value,
            path,
            visited: 0,
            next_index: 1,
        });
        Ok(())
    }

    fn close_table(&mut self) -> Result<()> {
        let frame = self.frames.pop().ok_or_else(|| layout_error("unbalanced closing bracket"))?;
        let len = frame.value.len();
        if frame.visited < len {
            return Err(RenderError::UnrenderedEntries {
                path: frame.path,
                count: len - frame.visited,
            });
        }
        self.indents.pop();
        self.write("}");
        Ok(())
    }

    fn replay(&mut self, event: &LayoutToken) -> Result<()> {
        match event {
            LayoutToken::StartBracket => self.open_table()?,
            LayoutToken::EndBracket => self.close_table()?,
            LayoutToken::Separator(c) => self.write(c.encode_utf8(&mut [0; 4])),
            LayoutToken::Newline => self.cartridge_return()?,
            LayoutToken::Whitespace(ws) => {
                // At a line start this replaces the implied indent.
                self.state = LineState::WritingLine;
                self.line.push_str(ws);
            },
            LayoutToken::Comment(text) => self.write(text),
            LayoutToken::Identifier(name) => {
                self.write(name);
                self.pending_key = Some(Key::Str(name.clone()));
            },
            LayoutToken::Numeric { text, key } => {
                self.write(text);
                self.pending_key = Some(Key::Int(*key));
            },
            LayoutToken::IndexKey { text, key } => {
                self.write(text);
                self.pending_key = Some(Key::Str(key.clone()));
            },
            LayoutToken::OpenIndex => self.write("["),
            LayoutToken::CloseIndex => self.write("]"),
            LayoutToken::Assignment => self.write("="),
            LayoutToken::Leaf { text, original } => {
                let key = self.take_key()?;
                let (value, path) = self.child(key)?;
                let text = leaf_text(value, text, original, &path)?;
                self.write(&text);
            },
        }
        Ok(())
    }

    fn finish(mut self) -> Result<String> {
        if !self.started {
            return Err(layout_error("no root table"));
        }
        if !self.frames.is_empty() {
            return Err(layout_error("unclosed table"));
        }
        self.lines.push(self.line);
        Ok(self.lines.join("\n"))
    }
}

/// Write `value` back out in the layout recorded for it.
pub fn render(value: &Value, layout: &CommentData) -> Result<String> {
    let mut renderer = Renderer::new(value, layout);
    for event in &layout.events {
        renderer.replay(event)?;
    }
    let text = renderer.finish()?;
    debug!(events = layout.events.len(), bytes = text.len(), "rendered");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use crate::types::Table;

    fn roundtrip(input: &str) {
        let (value, layout) = parse(input).unwrap();
        assert_eq!(render(&value, &layout).unwrap(), input);
    }

    #[test]
    fn unchanged_values_roundtrip() {
        roundtrip("{}");
        roundtrip("{ a = 1, b = 'two'; [3] = 0x1F }\n");
        roundtrip("{\n\t'x',\n\t{ 1, 2 },\n\t-- trailing\n}");
        roundtrip("{\r\n  a = \"\\\"q\\\"\",\r\n}\r\n");
    }

    #[test]
    fn changed_leaves_are_formatted() {
        let (mut value, layout) = parse("{ a = 'x', b = \"y\", c = 1, d = 2.5 }").unwrap();
        if let Value::Table(table) = &mut value {
            table.insert(Key::from("a"), Value::from("it's"));
            table.insert(Key::from("b"), Value::from("line\nbreak"));
            table.insert(Key::from("c"), Value::Float(1.0));
            table.insert(Key::from("d"), Value::Nil);
        }
        assert_eq!(
            render(&value, &layout).unwrap(),
            "{ a = 'it\\'s', b = \"line\\nbreak\", c = 1.0, d = nil }"
        );
    }

    #[test]
    fn sequences_index_from_one() {
        let (mut value, layout) = parse("{\n  months = { 'jan', 'feb' },\n}").unwrap();
        let path = Path::from(vec![Segment::Key(Key::from("months")), Segment::Index(1)]);
        *value.get_mut(&path).unwrap() = Value::from("février");
        assert_eq!(render(&value, &layout).unwrap(), "{\n  months = { 'jan', 'février' },\n}");
    }

    #[test]
    fn shape_mismatches_fail() {
        let (_, layout) = parse("{ a = { 1 }, b = 2 }").unwrap();

        let mut table = Table::new();
        table.insert(Key::from("a"), Value::Sequence(vec![Value::Integer(1)]));
        let err = render(&Value::Table(table.clone()), &layout).unwrap_err();
        assert_eq!(err.to_string(), "no value at b");

        table.insert(Key::from("b"), Value::Sequence(Vec::new()));
        let err = render(&Value::Table(table.clone()), &layout).unwrap_err();
        assert_eq!(err.to_string(), "expected a single value at b, found a sequence");

        table.insert(Key::from("b"), Value::Integer(2));
        table.insert(Key::from("c"), Value::Integer(3));
        let err = render(&Value::Table(table.clone()), &layout).unwrap_err();
        assert_eq!(err, RenderError::UnrenderedEntries { path: Path::root(), count: 1 });

        table.shift_remove(&Key::from("c"));
        table.insert(Key::from("a"), Value::Integer(1));
        let err = render(&Value::Table(table), &layout).unwrap_err();
        assert_eq!(err.to_string(), "expected a table at a, found integer");
    }

    #[test]
    fn non_finite_floats_fail() {
        let (_, layout) = parse("{ 1.5 }").unwrap();
        let value = Value::Sequence(vec![Value::Float(f64::NAN)]);
        let err = render(&value, &layout).unwrap_err();
        assert_eq!(err.to_string(), "cannot write non-finite number at [1]");
    }

    #[test]
    fn quoting_escapes_controls() {
        assert_eq!(quote("a\\b\t\x07", '"'), "\"a\\\\b\\t\\a\"");
        assert_eq!(quote("say \"hi\"", '\''), "'say \"hi\"'");
    }
}
