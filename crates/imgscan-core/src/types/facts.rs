//! Fact record sets and the flat `key value` file format stages emit.

use std::collections::BTreeMap;

/// One flat category of facts: key → value. Structured values are JSON text.
pub type FactSet = BTreeMap<String, String>;

/// Every category stored for an image.
pub type FactMap = BTreeMap<String, FactSet>;

/// Parse a kv fact file: one `key value` pair per line, split on the first
/// space. Blank lines are ignored; a line without a value maps to an empty
/// string. Returns the offending line number on keys that are empty.
pub fn parse_kv(content: &str) -> Result<FactSet, usize> {
    let mut facts = FactSet::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = match line.split_once(' ') {
            Some((k, v)) => (k, v),
            None => (line, ""),
        };
        if key.is_empty() {
            return Err(idx + 1);
        }
        facts.insert(key.to_string(), value.to_string());
    }
    Ok(facts)
}

/// Render a fact set in kv file form. Keys containing spaces cannot round-trip
/// and are written with spaces replaced by `_`.
pub fn render_kv(facts: &FactSet) -> String {
    let mut out = String::new();
    for (key, value) in facts {
        out.push_str(&key.replace(' ', "_"));
        out.push(' ');
        out.push_str(&value.replace('\n', " "));
        out.push('\n');
    }
    out
}
