use indexmap::map::IndexMap;
use tracing::trace;

use crate::error::{ParseError, Result};
use crate::options::Options;
use crate::parser::Node;
use crate::tokeniser::Token;
use crate::types::{Key, Table, Value};

struct Reducer<'src> {
    from_tokens: Vec<Token<'src>>,
    convert_lists: bool,
}

fn position(node: &Node<'_>) -> (usize, usize) {
    node.token().map(|tok| (tok.lno, tok.col)).unwrap_or((0, 0))
}

fn unsupported(what: &str, node: &Node<'_>) -> ParseError {
    let (line, col) = position(node);
    ParseError::Unsupported { what: what.to_string(), line, col }
}

impl<'src> Reducer<'src> {
    fn record(&mut self, node: &Node<'src>) {
        if let Some(tok) = node.token() {
            self.from_tokens.push(tok.clone());
        }
    }

    fn read_value(&mut self, node: &Node<'src>) -> Result<Value> {
        match node {
            Node::String { value, .. } => {
                self.record(node);
                Ok(Value::String(value.clone()))
            },
            Node::Integer { value, .. } => {
                self.record(node);
                Ok(Value::Integer(*value))
            },
            Node::Float { value, .. } => {
                self.record(node);
                Ok(Value::Float(*value))
            },
            Node::Boolean { value, .. } => {
                self.record(node);
                Ok(Value::Boolean(*value))
            },
            Node::Identifier { name, .. } => {
                self.record(node);
                Ok(Value::String(name.to_string()))
            },
            Node::Keyword { word, .. } => {
                self.record(node);
                if *word == "nil" {
                    Ok(Value::Nil)
                }
                else {
                    Err(unsupported(&format!("keyword '{}'", word), node))
                }
            },
            Node::Table { fields, .. } => {
                self.record(node);
                self.read_table(fields)
            },
            Node::Assignment { .. } => Err(unsupported("assignment outside of a table", node)),
            Node::FunctionCall { .. } | Node::Arguments(_) => {
                Err(unsupported("function call", node))
            },
            Node::Field { .. } => Err(unsupported("field outside of a table", node)),
        }
    }

    fn read_key(&mut self, node: &Node<'src>) -> Result<Key> {
        match self.read_value(node)? {
            Value::Integer(n) => Ok(Key::Int(n)),
            Value::String(s) => Ok(Key::Str(s)),
            other => {
                let (line, col) = position(node);
                Err(ParseError::InvalidKey { found: other.type_name().to_string(), line, col })
            },
        }
    }

    fn read_field(&mut self, node: &Node<'src>) -> Result<(Key, Value)> {
        match node {
            Node::Assignment { name, value } => {
                let key = self.read_key(name)?;
                Ok((key, self.read_value(value)?))
            },
            Node::Field { key, value, .. } => {
                let key = self.read_key(key)?;
                Ok((key, self.read_value(value)?))
            },
            _ => Err(unsupported(&format!("{} as a table field", node.name()), node)),
        }
    }

    fn read_table(&mut self, fields: &[Node<'src>]) -> Result<Value> {
        let mut table: Table = IndexMap::with_capacity(fields.len());
        let mut last_int_key = 0;
        let mut convert_list = self.convert_lists && !fields.is_empty();

        for field in fields {
            let (key, value) = self.read_field(field)?;
            if convert_list {
                match key {
                    Key::Int(n) if n == last_int_key + 1 => last_int_key = n,
                    _ => convert_list = false,
                }
            }
            if table.contains_key(&key) {
                let (line, col) = position(field);
                return Err(ParseError::DuplicateKey { key: key.to_string(), line, col });
            }
            table.insert(key, value);
        }

        if convert_list {
            trace!(len = table.len(), "table collapsed to sequence");
            Ok(Value::Sequence(table.into_values().collect()))
        }
        else {
            Ok(Value::Table(table))
        }
    }
}

/// Reduce a parsed table to its structured value, collecting the source
/// token of every node read along the way.
pub fn reduce<'src>(node: &Node<'src>) -> Result<(Value, Vec<Token<'src>>)> {
    reduce_with(node, &Options::default())
}

pub fn reduce_with<'src>(node: &Node<'src>, options: &Options) -> Result<(Value, Vec<Token<'src>>)> {
    let mut reducer = Reducer {
        from_tokens: Vec::new(),
        convert_lists: options.convert_lists,
    };
    let value = reducer.read_value(node)?;
    Ok((value, reducer.from_tokens))
}
