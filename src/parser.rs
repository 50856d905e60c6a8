use std::fmt;

use crate::error::{ParseError, Result};
use crate::options::Options;
use crate::tokeniser::{Token, TokenKind};
use crate::types::Value;
use crate::util::{list_or, repr};

pub const KEYWORDS: [&str; 22] = [
    "and", "break", "do", "else", "elseif", "end", "false", "for",
    "function", "goto", "if", "in", "local", "nil", "not", "or",
    "repeat", "return", "then", "true", "until", "while",
];

/// Parse tree produced from the semantic token stream.
///
/// `Table` only ever holds `Field` and `Assignment` children; positional
/// entries are stored as a `Field` whose key is the implicit index.
#[derive(Clone, Debug, PartialEq)]
pub enum Node<'src> {
    String { value: String, token: Token<'src> },
    Integer { value: i64, token: Option<Token<'src>> },
    Float { value: f64, token: Token<'src> },
    Boolean { value: bool, token: Token<'src> },
    Identifier { name: &'src str, token: Token<'src> },
    Keyword { word: &'src str, token: Token<'src> },
    Table { fields: Vec<Node<'src>>, token: Token<'src> },
    Field { key: Box<Node<'src>>, value: Box<Node<'src>>, token: Option<Token<'src>> },
    Assignment { name: Box<Node<'src>>, value: Box<Node<'src>> },
    FunctionCall { callee: Box<Node<'src>>, args: Box<Node<'src>> },
    Arguments(Vec<Node<'src>>),
}

impl<'src> Node<'src> {
    pub fn name(&self) -> &'static str {
        match self {
            Node::String { .. } => "String",
            Node::Integer { .. } => "Integer",
            Node::Float { .. } => "Float",
            Node::Boolean { .. } => "Boolean",
            Node::Identifier { .. } => "Identifier",
            Node::Keyword { .. } => "Keyword",
            Node::Table { .. } => "Table",
            Node::Field { .. } => "Field",
            Node::Assignment { .. } => "Assignment",
            Node::FunctionCall { .. } => "FunctionCall",
            Node::Arguments(_) => "Arguments",
        }
    }

    /// The source token this node starts at, where there is one.
    pub fn token(&self) -> Option<&Token<'src>> {
        match self {
            Node::String { token, .. }
            | Node::Float { token, .. }
            | Node::Boolean { token, .. }
            | Node::Identifier { token, .. }
            | Node::Keyword { token, .. }
            | Node::Table { token, .. } => Some(token),
            Node::Integer { token, .. } => token.as_ref(),
            Node::Field { token, value, .. } => token.as_ref().or_else(|| value.token()),
            Node::Assignment { name, .. } => name.token(),
            Node::FunctionCall { callee, .. } => callee.token(),
            Node::Arguments(args) => args.first().and_then(|arg| arg.token()),
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, name: &str, args: &[&Node<'_>]) -> fmt::Result {
    if args.is_empty() {
        return write!(f, "{}", name);
    }
    write!(f, "{}[", name)?;
    for (idx, arg) in args.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", arg)?;
    }
    write!(f, "]")
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::String { value, .. } => write!(f, "String[{}]", repr(value)),
            Node::Integer { value, .. } => write!(f, "Integer[{}]", value),
            Node::Float { value, .. } => write!(f, "Float[{:?}]", value),
            Node::Boolean { value, .. } => write!(f, "Boolean[{}]", value),
            Node::Identifier { name, .. } => write!(f, "Identifier[{}]", repr(name)),
            Node::Keyword { word, .. } => write!(f, "Keyword[{}]", repr(word)),
            Node::Table { fields, .. } => {
                write_args(f, "Table", &fields.iter().collect::<Vec<_>>())
            },
            Node::Field { key, value, .. } => write_args(f, "Field", &[&**key, &**value]),
            Node::Assignment { name, value } => write_args(f, "Assignment", &[&**name, &**value]),
            Node::FunctionCall { callee, args } => {
                write_args(f, "FunctionCall", &[&**callee, &**args])
            },
            Node::Arguments(args) => {
                write_args(f, "Arguments", &args.iter().collect::<Vec<_>>())
            },
        }
    }
}

/* Literals */

/// Strip the quotes off a string literal and resolve its escapes.
/// Escapes without a special meaning stand for the escaped character.
pub fn unescape(literal: &str) -> String {
    let mut quoted = literal.chars();
    let inner = match quoted.next() {
        Some(quote) if quote == '"' || quote == '\'' => {
            let rest = quoted.as_str();
            rest.strip_suffix(quote).unwrap_or(rest)
        },
        _ => literal,
    };
    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some('a') => value.push('\x07'),
            Some('b') => value.push('\x08'),
            Some('f') => value.push('\x0c'),
            Some('n') => value.push('\n'),
            Some('r') => value.push('\r'),
            Some('t') => value.push('\t'),
            Some('v') => value.push('\x0b'),
            Some(other) => value.push(other),
            None => {},
        }
    }
    value
}

fn hex_digits(text: &str) -> Option<impl Iterator<Item = u32> + '_> {
    if text.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(text.chars().filter_map(|c| c.to_digit(16)))
    }
    else {
        None
    }
}

/// Hex literals are a mantissa in base 16 scaled by a binary exponent.
/// Hex integers wrap around into `i64` like Lua's do.
fn hex_value(negative: bool, body: &str) -> Option<Value> {
    let (mantissa, exponent) = match body.find(['p', 'P']) {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };
    let (whole, fraction) = match mantissa.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (mantissa, None),
    };
    if whole.is_empty() {
        return None;
    }

    if fraction.is_none() && exponent.is_none() {
        let value = hex_digits(whole)?
            .fold(0u64, |acc, d| acc.wrapping_mul(16).wrapping_add(u64::from(d))) as i64;
        return Some(Value::Integer(if negative { value.wrapping_neg() } else { value }));
    }

    let mut mant: u64 = 0;
    let mut exp: i32 = 0;
    for d in hex_digits(whole)? {
        if mant >> 60 == 0 {
            mant = mant * 16 + u64::from(d);
        }
        else {
            exp += 4;
        }
    }
    for d in hex_digits(fraction.unwrap_or(""))? {
        if mant >> 60 == 0 {
            mant = mant * 16 + u64::from(d);
            exp -= 4;
        }
    }
    if let Some(e) = exponent {
        exp = exp.saturating_add(binary_exponent(e)?);
    }
    let value = scale(mant as f64, exp);
    Some(Value::Float(if negative { -value } else { value }))
}

/// Decimal exponent of a hex float, clamped far past the range of `f64`
/// so oversized exponents give `inf` or `0` instead of an error.
fn binary_exponent(text: &str) -> Option<i32> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let magnitude = digits.chars()
        .filter_map(|c| c.to_digit(10))
        .fold(0i32, |acc, d| acc.saturating_mul(10).saturating_add(d as i32).min(100_000));
    Some(if negative { -magnitude } else { magnitude })
}

/// `value * 2^exp` in steps that stay inside the normal range, so results
/// in the subnormal range are rounded once instead of flushed to zero.
fn scale(mut value: f64, mut exp: i32) -> f64 {
    while exp < f64::MIN_EXP - 1 && value != 0.0 {
        value *= 2f64.powi(f64::MIN_EXP - 1);
        exp -= f64::MIN_EXP - 1;
    }
    while exp > f64::MAX_EXP - 1 && value.is_finite() {
        value *= 2f64.powi(f64::MAX_EXP - 1);
        exp -= f64::MAX_EXP - 1;
    }
    value * 2f64.powi(exp)
}

/// Numeric value of a literal the tokeniser accepted as `Numeric`.
pub fn numeric_value(text: &str) -> Option<Value> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    if let Some(body) = unsigned.strip_prefix("0x").or_else(|| unsigned.strip_prefix("0X")) {
        return hex_value(negative, body);
    }
    let is_float = text.contains(['.', 'e', 'E']);
    if !is_float {
        if let Ok(value) = text.parse::<i64>() {
            return Some(Value::Integer(value));
        }
    }
    text.parse::<f64>().ok().map(Value::Float)
}

/* Parser */

pub struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    ptr: usize,
    depth: usize,
    recursion_limit: Option<usize>,
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Token<'src>>) -> Parser<'src> {
        Parser::with_options(tokens, &Options::default())
    }

    pub fn with_options(tokens: Vec<Token<'src>>, options: &Options) -> Parser<'src> {
        Parser {
            tokens,
            ptr: 0,
            depth: 0,
            recursion_limit: options.recursion_limit,
        }
    }

    fn peek(&self) -> Result<&Token<'src>> {
        self.tokens.get(self.ptr).ok_or(ParseError::OutOfTokens)
    }

    fn next(&mut self) -> Result<Token<'src>> {
        let tok = self.peek()?.clone();
        self.ptr += 1;
        Ok(tok)
    }

    fn back(&mut self) {
        self.ptr -= 1;
    }

    fn unexpected(expected: String, tok: &Token<'src>) -> ParseError {
        ParseError::Unexpected {
            expected,
            found: tok.text.to_string(),
            line: tok.lno,
            col: tok.col,
        }
    }

    fn expect(&mut self, text: &str) -> Result<Token<'src>> {
        let tok = self.next()?;
        if tok.text != text {
            return Err(Parser::unexpected(list_or(&[text]), &tok));
        }
        Ok(tok)
    }

    fn expect_or(&mut self, options: &[&str]) -> Result<Token<'src>> {
        let tok = self.next()?;
        if !options.contains(&tok.text) {
            let mut sorted = options.to_vec();
            sorted.sort_unstable();
            return Err(Parser::unexpected(list_or(&sorted), &tok));
        }
        Ok(tok)
    }

    fn expect_kind(&mut self, kind: TokenKind) -> Result<Token<'src>> {
        let tok = self.next()?;
        if tok.kind != kind {
            return Err(Parser::unexpected(format!("'{:?}'", kind), &tok));
        }
        Ok(tok)
    }

    /// A whole document: exactly one table and nothing after it.
    pub fn parse_document(&mut self) -> Result<Node<'src>> {
        let table = self.parse_table()?;
        self.expect_kind(TokenKind::End)?;
        Ok(table)
    }

    pub fn parse_value(&mut self) -> Result<Node<'src>> {
        let tok = self.peek()?.clone();
        match tok.kind {
            TokenKind::StrLit => self.parse_string_literal(),
            TokenKind::Numeric => self.parse_numeric_literal(),
            TokenKind::Identifier => self.parse_identifier(),
            TokenKind::Separator if tok.text == "{" => self.parse_table(),
            _ => Err(Parser::unexpected(String::from("value"), &tok)),
        }
    }

    pub fn parse_string_literal(&mut self) -> Result<Node<'src>> {
        let token = self.expect_kind(TokenKind::StrLit)?;
        Ok(Node::String { value: unescape(token.text), token })
    }

    pub fn parse_numeric_literal(&mut self) -> Result<Node<'src>> {
        let token = self.expect_kind(TokenKind::Numeric)?;
        match numeric_value(token.text) {
            Some(Value::Integer(value)) => Ok(Node::Integer { value, token: Some(token) }),
            Some(Value::Float(value)) => Ok(Node::Float { value, token }),
            _ => Err(ParseError::InvalidNumber {
                text: token.text.to_string(),
                line: token.lno,
                col: token.col,
            }),
        }
    }

    pub fn parse_table(&mut self) -> Result<Node<'src>> {
        let token = self.expect("{")?;
        self.depth += 1;
        if let Some(limit) = self.recursion_limit {
            if self.depth > limit {
                return Err(ParseError::RecursionLimit { limit, line: token.lno, col: token.col });
            }
        }

        let mut next_index: i64 = 1;
        let mut fields = Vec::new();
        while !self.peek()?.is_separator("}") {
            fields.push(self.parse_field(&mut next_index)?);
            if self.expect_or(&[",", ";", "}"])?.text == "}" {
                self.back();
            }
        }
        self.expect("}")?;
        self.depth -= 1;
        Ok(Node::Table { fields, token })
    }

    /// One table entry. Positional entries take the next implicit index of
    /// the enclosing table.
    pub fn parse_field(&mut self, next_index: &mut i64) -> Result<Node<'src>> {
        if self.peek()?.is_separator("[") {
            let token = self.expect("[")?;
            let key = self.parse_value()?;
            self.expect("]")?;
            self.expect_kind(TokenKind::Assignment)?;
            let value = self.parse_value()?;
            return Ok(Node::Field {
                key: Box::new(key),
                value: Box::new(value),
                token: Some(token),
            });
        }

        let value = self.parse_value()?;
        if let Node::Assignment { .. } = value {
            return Ok(value);
        }
        let index = *next_index;
        *next_index += 1;
        Ok(Node::Field {
            key: Box::new(Node::Integer { value: index, token: None }),
            value: Box::new(value),
            token: None,
        })
    }

    fn parse_function_arguments(&mut self) -> Result<Vec<Node<'src>>> {
        self.expect("(")?;
        let mut arguments = Vec::new();
        while !self.peek()?.is_separator(")") {
            arguments.push(self.parse_value()?);
            if self.expect_or(&[",", ")"])?.text == ")" {
                self.back();
            }
        }
        self.expect(")")?;
        Ok(arguments)
    }

    pub fn parse_identifier(&mut self) -> Result<Node<'src>> {
        let token = self.expect_kind(TokenKind::Identifier)?;
        let text = token.text;
        if text == "true" || text == "false" {
            return Ok(Node::Boolean { value: text == "true", token });
        }
        if KEYWORDS.contains(&text) {
            return Ok(Node::Keyword { word: text, token });
        }

        let callee = Box::new(Node::Identifier { name: text, token });
        let next = self.peek()?.clone();
        match next.kind {
            TokenKind::Separator if next.text == "(" => {
                let args = self.parse_function_arguments()?;
                Ok(Node::FunctionCall { callee, args: Box::new(Node::Arguments(args)) })
            },
            TokenKind::Separator if next.text == "{" => {
                let table = self.parse_table()?;
                Ok(Node::FunctionCall { callee, args: Box::new(Node::Arguments(vec![table])) })
            },
            TokenKind::StrLit => {
                let string = self.parse_string_literal()?;
                Ok(Node::FunctionCall { callee, args: Box::new(Node::Arguments(vec![string])) })
            },
            TokenKind::Assignment => {
                self.expect_kind(TokenKind::Assignment)?;
                let value = self.parse_value()?;
                Ok(Node::Assignment { name: callee, value: Box::new(value) })
            },
            _ => Ok(*callee),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokeniser::tokenise;

    fn parser(input: &str) -> Parser<'_> {
        Parser::new(tokenise(input).unwrap())
    }

    #[test]
    fn float_constants() {
        let cases = [
            ("3.0", 3.0),
            ("-3.0", -3.0),
            ("3.1416", 3.1416),
            ("314.16e-2", 3.1416),
            ("0.31416E1", 3.1416),
            ("34e1", 340.0),
            ("0x0.1E", 0.1171875),
            ("0xA23p-4", 162.1875),
            ("0X1.921FB54442D18P+1", 3.141592653589793),
            ("0x1p-1022", 2.2250738585072014e-308),
            ("0x1p-1030", f64::from_bits(1 << 44)),
            ("0x1p-1074", 5e-324),
            ("0x1p-1075", 0.0),
            ("0x1p1023", 8.98846567431158e307),
            ("0x1p1024", f64::INFINITY),
            ("0x1p99999999999", f64::INFINITY),
            ("0x1p-99999999999", 0.0),
        ];
        for (constant, expect) in cases {
            let node = parser(constant).parse_numeric_literal().unwrap();
            assert_eq!(node.to_string(), format!("Float[{:?}]", expect), "{}", constant);
        }
    }

    #[test]
    fn integer_constants() {
        assert_eq!(numeric_value("0xBEBADA"), Some(Value::Integer(12499674)));
        assert_eq!(numeric_value("-42"), Some(Value::Integer(-42)));
        assert_eq!(numeric_value("0xffffffffffffffff"), Some(Value::Integer(-1)));
        assert_eq!(numeric_value("9223372036854775808"), Some(Value::Float(9223372036854775808.0)));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(unescape(r#""also\n123\"""#), "also\n123\"");
        assert_eq!(unescape(r"'\97lo\10\04923'"), "97lo1004923");
        assert_eq!(unescape(r#""\a\b\f\v\\""#), "\x07\x08\x0c\x0b\\");
        assert_eq!(unescape("'é'"), "é");
        assert_eq!(unescape("é"), "é");
        assert_eq!(unescape("\"a"), "a");
        assert_eq!(unescape(""), "");
    }

    #[test]
    fn assignments_and_calls() {
        let mut p = parser(concat!(
            " a = 'also\\n123\"'\n",
            " c = 0X1.921FB54442D18P+1\n",
            " e = 0xBEBADA\n",
            " a = { [f(1)] = g; \"x\", \"y\"; x = 1, f(x), [30] = 23; 45 }",
        ));
        assert_eq!(p.parse_identifier().unwrap().to_string(),
                   "Assignment[Identifier['a'], String['also\\n123\"']]");
        assert_eq!(p.parse_identifier().unwrap().to_string(),
                   "Assignment[Identifier['c'], Float[3.141592653589793]]");
        assert_eq!(p.parse_identifier().unwrap().to_string(),
                   "Assignment[Identifier['e'], Integer[12499674]]");
        assert_eq!(p.parse_identifier().unwrap().to_string(), concat!(
            "Assignment[Identifier['a'], Table[",
            "Field[FunctionCall[Identifier['f'], Arguments[Integer[1]]], Identifier['g']], ",
            "Field[Integer[1], String['x']], ",
            "Field[Integer[2], String['y']], ",
            "Assignment[Identifier['x'], Integer[1]], ",
            "Field[Integer[3], FunctionCall[Identifier['f'], Arguments[Identifier['x']]]], ",
            "Field[Integer[30], Integer[23]], ",
            "Field[Integer[4], Integer[45]]]]",
        ));
    }

    #[test]
    fn call_sugar() {
        let node = parser("f{1}").parse_value().unwrap();
        assert_eq!(node.to_string(), "FunctionCall[Identifier['f'], Arguments[Table[Field[Integer[1], Integer[1]]]]]");
        let node = parser("f'x'").parse_value().unwrap();
        assert_eq!(node.to_string(), "FunctionCall[Identifier['f'], Arguments[String['x']]]");
    }

    #[test]
    fn keywords_and_booleans() {
        let node = parser("{ true, nil, x }").parse_table().unwrap();
        assert_eq!(node.to_string(), concat!(
            "Table[Field[Integer[1], Boolean[true]], ",
            "Field[Integer[2], Keyword['nil']], ",
            "Field[Integer[3], Identifier['x']]]",
        ));
    }

    #[test]
    fn implicit_index_is_per_table() {
        let node = parser("{ 'a', { 'b' }, 'c' }").parse_table().unwrap();
        assert_eq!(node.to_string(), concat!(
            "Table[Field[Integer[1], String['a']], ",
            "Field[Integer[2], Table[Field[Integer[1], String['b']]]], ",
            "Field[Integer[3], String['c']]]",
        ));
    }

    #[test]
    fn missing_close_brace() {
        let err = parser("{ a = 1, b = 2 ").parse_document().unwrap_err();
        assert_eq!(err.to_string(), "Expected ',', ';', or '}', got '' (1:15)");
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let err = parser("{} x").parse_document().unwrap_err();
        assert_eq!(err.to_string(), "Expected 'End', got 'x' (1:3)");
    }

    #[test]
    fn recursion_limit() {
        let tokens = tokenise("{{{}}}").unwrap();
        let options = Options::default().with_recursion_limit(2);
        let err = Parser::with_options(tokens, &options).parse_document().unwrap_err();
        assert_eq!(err, ParseError::RecursionLimit { limit: 2, line: 1, col: 2 });
    }

    #[test]
    fn running_out_of_tokens() {
        let mut p = Parser::new(Vec::new());
        assert_eq!(p.parse_value().unwrap_err(), ParseError::OutOfTokens);
    }
}
