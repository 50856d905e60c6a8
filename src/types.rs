use std::fmt;

use indexmap::map::IndexMap;
use serde::{Deserialize, Serialize};

/// A table key. Lua allows any value as a key, this format only integers
/// and strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{}", n),
            Key::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Key {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Key {
        Key::Str(s)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Key {
        Key::Int(n)
    }
}

pub type Table = IndexMap<Key, Value>;

/// The reduced form of a parsed table.
///
/// A table whose keys are exactly `1..=N` in order becomes a `Sequence`;
/// Lua index `n` lives at `Sequence[n - 1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    #[serde(with = "table_entries")]
    Table(Table),
}

/// Tables serialize as `[key, value]` pairs. Most formats only allow string
/// map keys, which would merge `[1]` and `['1']`.
mod table_entries {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{Key, Table, Value};

    pub fn serialize<S: Serializer>(table: &Table, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(table.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Table, D::Error> {
        let entries = Vec::<(Key, Value)>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Table(_) => "table",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Sequence(_) | Value::Table(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Number of entries in a container, 0 for anything else.
    pub fn len(&self) -> usize {
        match self {
            Value::Sequence(items) => items.len(),
            Value::Table(table) => table.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a key the way Lua would, so integer keys also index sequences.
    pub fn entry(&self, key: &Key) -> Option<&Value> {
        match (self, key) {
            (Value::Table(table), key) => table.get(key),
            (Value::Sequence(items), Key::Int(n)) => {
                usize::try_from(*n).ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|idx| items.get(idx))
            },
            _ => None,
        }
    }

    pub fn entry_mut(&mut self, key: &Key) -> Option<&mut Value> {
        match (self, key) {
            (Value::Table(table), key) => table.get_mut(key),
            (Value::Sequence(items), Key::Int(n)) => {
                usize::try_from(*n).ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(move |idx| items.get_mut(idx))
            },
            _ => None,
        }
    }

    pub fn get(&self, path: &Path) -> Option<&Value> {
        path.segments().iter().try_fold(self, |value, segment| {
            match (value, segment) {
                (Value::Sequence(items), Segment::Index(idx)) => items.get(*idx),
                (value, Segment::Key(key)) => value.entry(key),
                _ => None,
            }
        })
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Value> {
        let mut value = self;
        for segment in path.segments() {
            value = match (value, segment) {
                (Value::Sequence(items), Segment::Index(idx)) => items.get_mut(*idx)?,
                (value, Segment::Key(key)) => value.entry_mut(key)?,
                _ => return None,
            };
        }
        Some(value)
    }

    /// Visit every string leaf in source order, replacing those for which
    /// `f` returns a new text. Returns how many were replaced.
    pub fn map_strings<F>(&mut self, mut f: F) -> usize
        where F: FnMut(&Path, &str) -> Option<String>
    {
        let mut path = Path::root();
        map_strings_inner(self, &mut path, &mut f)
    }
}

fn map_strings_inner<F>(value: &mut Value, path: &mut Path, f: &mut F) -> usize
    where F: FnMut(&Path, &str) -> Option<String>
{
    match value {
        Value::String(s) => {
            match f(path, s) {
                Some(new) => {
                    *s = new;
                    1
                },
                None => 0,
            }
        },
        Value::Sequence(items) => {
            let mut count = 0;
            for (idx, item) in items.iter_mut().enumerate() {
                path.push(Segment::Index(idx));
                count += map_strings_inner(item, path, f);
                path.pop();
            }
            count
        },
        Value::Table(table) => {
            let mut count = 0;
            for (key, item) in table.iter_mut() {
                path.push(Segment::Key(key.clone()));
                count += map_strings_inner(item, path, f);
                path.pop();
            }
            count
        },
        _ => 0,
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Boolean(b)
    }
}

/// One step into a value: a table key, or a 0-based sequence position.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Key(Key),
    Index(usize),
}

/// Location of a value inside a document, e.g. `relationStatuses[1][0]`.
///
/// Sequence positions display with Lua's 1-based numbering.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(Vec<Segment>);

impl Path {
    pub fn root() -> Path {
        Path(Vec::new())
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, segment: Segment) {
        self.0.push(segment);
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.0.pop()
    }

    pub fn join(&self, segment: Segment) -> Path {
        let mut path = self.clone();
        path.push(segment);
        path
    }
}

impl From<Vec<Segment>> for Path {
    fn from(segments: Vec<Segment>) -> Path {
        Path(segments)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(root)");
        }
        for (idx, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(Key::Str(name)) => {
                    if idx > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", name)?;
                },
                Segment::Key(Key::Int(n)) => write!(f, "[{}]", n)?,
                Segment::Index(pos) => write!(f, "[{}]", pos + 1)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        let mut inner = Table::new();
        inner.insert(Key::from("name"), Value::from("Alice"));
        let mut root = Table::new();
        root.insert(Key::from("person"), Value::Table(inner));
        root.insert(Key::from("months"), Value::Sequence(vec!["jan".into(), "feb".into()]));
        Value::Table(root)
    }

    #[test]
    fn integer_keys_index_sequences() {
        let value = sample();
        let months = value.entry(&Key::from("months")).unwrap();
        assert_eq!(months.entry(&Key::Int(1)), Some(&Value::from("jan")));
        assert_eq!(months.entry(&Key::Int(2)), Some(&Value::from("feb")));
        assert_eq!(months.entry(&Key::Int(0)), None);
        assert_eq!(months.entry(&Key::Int(3)), None);
    }

    #[test]
    fn paths_display_lua_style() {
        let path = Path::from(vec![
            Segment::Key(Key::from("relationStatuses")),
            Segment::Index(0),
            Segment::Key(Key::Int(0)),
        ]);
        assert_eq!(path.to_string(), "relationStatuses[1][0]");
        assert_eq!(Path::root().to_string(), "(root)");
    }

    #[test]
    fn map_strings_visits_in_order() {
        let mut value = sample();
        let mut seen = Vec::new();
        let replaced = value.map_strings(|path, s| {
            seen.push(path.to_string());
            Some(s.to_uppercase())
        });
        assert_eq!(replaced, 3);
        assert_eq!(seen, vec!["person.name", "months[1]", "months[2]"]);
        let path = Path::from(vec![Segment::Key(Key::from("months")), Segment::Index(1)]);
        assert_eq!(value.get(&path), Some(&Value::from("FEB")));
    }
}
