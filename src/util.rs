use crate::Lines;

/// Byte spans `(start, end)` of every line in `input`, newline excluded.
pub fn line_spans(input: &str) -> Lines {
    let mut lines = Vec::new();
    let mut start = 0;
    for (offset, c) in input.char_indices() {
        if c == '\n' {
            lines.push((start, offset));
            start = offset + 1;
        }
    }
    lines.push((start, input.len()));
    lines
}

pub fn source_line<'src>(input: &'src str, lines: &Lines, lno: usize) -> &'src str {
    match lno.checked_sub(1).and_then(|idx| lines.get(idx)) {
        Some(&(start, end)) => input[start..end].trim_end_matches('\r'),
        None => "",
    }
}

/// Join quoted alternatives the way error messages list them:
/// `'a' or 'b'`, `'a', 'b', or 'c'`.
pub fn list_or(values: &[&str]) -> String {
    let quoted = values.iter()
        .map(|v| format!("'{}'", v))
        .collect::<Vec<String>>();
    match quoted.split_last() {
        Some((last, rest)) if rest.len() >= 2 => {
            format!("{}, or {}", rest.join(", "), last)
        },
        _ => quoted.join(" or "),
    }
}

/// Python-style `repr` of a string, used when printing parse trees.
pub fn repr(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
