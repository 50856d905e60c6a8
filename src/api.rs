use serde::{Deserialize, Serialize};

use crate::error::{ParseError, RenderError};
use crate::layout::CommentData;
use crate::options::Options;
use crate::types::{Path, Segment, Value};

/// A parsed file: its data and the layout needed to write it back.
///
/// ```
/// let mut doc = luatab::Document::parse("{\n  greeting = 'Hello', -- shown on login\n}\n").unwrap();
/// doc.map_strings(|_, s| Some(s.replace("Hello", "Bonjour")));
/// assert_eq!(doc.render().unwrap(), "{\n  greeting = 'Bonjour', -- shown on login\n}\n");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    value: Value,
    layout: CommentData,
}

fn collect_strings<'d>(value: &'d Value, path: &mut Path, out: &mut Vec<(Path, &'d str)>) {
    match value {
        Value::String(s) => out.push((path.clone(), s.as_str())),
        Value::Sequence(items) => {
            for (idx, item) in items.iter().enumerate() {
                path.push(Segment::Index(idx));
                collect_strings(item, path, out);
                path.pop();
            }
        },
        Value::Table(table) => {
            for (key, item) in table {
                path.push(Segment::Key(key.clone()));
                collect_strings(item, path, out);
                path.pop();
            }
        },
        _ => {},
    }
}

impl Document {
    pub fn parse(text: &str) -> Result<Document, ParseError> {
        Document::parse_with(text, &Options::default())
    }

    pub fn parse_with(text: &str, options: &Options) -> Result<Document, ParseError> {
        let (value, layout) = crate::parse_with(text, options)?;
        Ok(Document { value, layout })
    }

    /// Reassemble a document from a value and the layout it was parsed with.
    pub fn from_parts(value: Value, layout: CommentData) -> Document {
        Document { value, layout }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Leaves may be changed freely. Adding or removing entries makes
    /// [`render`](Document::render) fail.
    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn layout(&self) -> &CommentData {
        &self.layout
    }

    pub fn render(&self) -> Result<String, RenderError> {
        crate::render(&self.value, &self.layout)
    }

    /// Every string leaf with its location, in source order.
    pub fn strings(&self) -> Vec<(Path, &str)> {
        let mut out = Vec::new();
        collect_strings(&self.value, &mut Path::root(), &mut out);
        out
    }

    /// Replace string leaves in place; see [`Value::map_strings`].
    pub fn map_strings<F>(&mut self, f: F) -> usize
        where F: FnMut(&Path, &str) -> Option<String>
    {
        self.value.map_strings(f)
    }

    pub fn into_parts(self) -> (Value, CommentData) {
        (self.value, self.layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Key;

    const LANG: &str = "{\n\ttitle = \"Settings\",\n\tdays = { 'Mon', 'Tue' },\n\tcount = 2,\n}\n";

    #[test]
    fn strings_in_source_order() {
        let doc = Document::parse(LANG).unwrap();
        let strings: Vec<(String, &str)> = doc.strings()
            .into_iter()
            .map(|(path, s)| (path.to_string(), s))
            .collect();
        assert_eq!(strings, vec![
            ("title".to_string(), "Settings"),
            ("days[1]".to_string(), "Mon"),
            ("days[2]".to_string(), "Tue"),
        ]);
    }

    #[test]
    fn translation_keeps_layout() {
        let mut doc = Document::parse(LANG).unwrap();
        let replaced = doc.map_strings(|path, s| {
            match path.to_string().as_str() {
                "title" => Some(String::from("Réglages")),
                _ => Some(s.to_lowercase()),
            }
        });
        assert_eq!(replaced, 3);
        assert_eq!(
            doc.render().unwrap(),
            "{\n\ttitle = \"Réglages\",\n\tdays = { 'mon', 'tue' },\n\tcount = 2,\n}\n"
        );
    }

    #[test]
    fn parts_reassemble() {
        let doc = Document::parse(LANG).unwrap();
        let (mut value, layout) = doc.clone().into_parts();
        if let Value::Table(table) = &mut value {
            table.insert(Key::from("count"), Value::Integer(3));
        }
        let edited = Document::from_parts(value, layout);
        assert_ne!(edited, doc);
        assert!(edited.render().unwrap().contains("count = 3,"));
    }
}
