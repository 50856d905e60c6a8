//! Property tests: generated table literals with arbitrary layout survive a
//! parse/render cycle, and translated strings read back as written.

use std::collections::HashSet;

use luatab::parser::KEYWORDS;
use luatab::{parse, render, Document};
use proptest::prelude::*;

#[derive(Clone, Debug)]
struct Entry {
    /// Source text of the key and the key it denotes, for deduplication.
    key: Option<(String, String)>,
    value: String,
    around_eq: (&'static str, &'static str),
    sep: &'static str,
    after: &'static str,
}

fn layout() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just(""),
        Just(" "),
        Just("  "),
        Just("\n"),
        Just("\n\t"),
        Just("\n    "),
        Just("\r\n  "),
        Just("\n\n  "),
        Just(" -- note\n  "),
    ]
}

fn name() -> impl Strategy<Value = String> {
    "[a-z_][a-zA-Z0-9_]{0,6}".prop_filter("reserved word", |s| {
        !KEYWORDS.contains(&s.as_str()) && s != "true" && s != "false"
    })
}

fn key() -> impl Strategy<Value = Option<(String, String)>> {
    prop_oneof![
        3 => Just(None),
        2 => name().prop_map(|s| Some((s.clone(), s))),
        1 => "[a-z ]{1,5}".prop_map(|s| Some((format!("['{}']", s), s))),
        1 => (-3i64..=0).prop_map(|n| Some((format!("[{}]", n), format!("#{}", n)))),
    ]
}

fn leaf() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z ,.!?']{0,12}".prop_map(|s| format!("\"{}\"", s)),
        "[a-zA-Z \"]{0,8}".prop_map(|s| format!("'{}'", s)),
        any::<i32>().prop_map(|n| n.to_string()),
        (0u32..1000, 1u32..100).prop_map(|(a, b)| format!("{}.{}", a, b)),
        (0u32..0xffff).prop_map(|n| format!("0x{:X}", n)),
        name(),
        Just(String::from("true")),
        Just(String::from("nil")),
    ]
}

fn table(value: BoxedStrategy<String>) -> impl Strategy<Value = String> {
    let entry = (key(), value, layout(), layout(), prop_oneof![Just(","), Just(";")], layout())
        .prop_map(|(key, value, before_eq, after_eq, sep, after)| Entry {
            key,
            value,
            around_eq: (before_eq, after_eq),
            sep,
            after,
        });
    (prop::collection::vec(entry, 0..5), layout(), any::<bool>())
        .prop_map(|(entries, open, trailing)| assemble(entries, open, trailing))
}

fn assemble(entries: Vec<Entry>, open: &str, trailing: bool) -> String {
    let mut seen = HashSet::new();
    let entries: Vec<Entry> = entries.into_iter()
        .filter(|entry| entry.key.as_ref().map_or(true, |(_, key)| seen.insert(key.clone())))
        .collect();

    let mut out = format!("{{{}", open);
    for (idx, entry) in entries.iter().enumerate() {
        if let Some((key, _)) = &entry.key {
            out.push_str(key);
            out.push_str(entry.around_eq.0);
            out.push('=');
            out.push_str(entry.around_eq.1);
        }
        out.push_str(&entry.value);
        if idx + 1 < entries.len() || trailing {
            out.push_str(entry.sep);
        }
        out.push_str(entry.after);
    }
    out.push('}');
    out
}

fn document() -> impl Strategy<Value = String> {
    let value = leaf().prop_recursive(3, 32, 5, |inner| table(inner.boxed()));
    (layout(), table(value.boxed()), layout())
        .prop_map(|(before, table, after)| format!("{}{}{}", before, table, after))
}

proptest! {
    #[test]
    fn parse_render_is_identity(source in document()) {
        let (value, layout) = parse(&source).unwrap();
        prop_assert_eq!(render(&value, &layout).unwrap(), source);
    }

    #[test]
    fn translated_strings_read_back(source in document()) {
        let mut doc = Document::parse(&source).unwrap();
        doc.map_strings(|_, s| Some(format!("«{}» \\ \"'", s.to_uppercase())));
        let rendered = doc.render().unwrap();
        let reparsed = Document::parse(&rendered).unwrap();
        prop_assert_eq!(reparsed.value(), doc.value());
        prop_assert_eq!(rendered.lines().count(), source.lines().count());
    }
}
