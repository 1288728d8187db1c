//! Line-oriented block tokenizer for the bin text form.
//!
//! The format has no published grammar; nesting is expressed only by brace balance. This
//! module is the one place that decides where a block starts and ends, so the extractor
//! and the replacer always agree. Braces inside double-quoted strings are ignored.

use crate::statics;
use crate::value::EntryKey;
use regex::Regex;
use std::sync::LazyLock;

/// `<"quoted" | 0xhash> = TypeName {` on a line of its own (optionally closed as `{}`).
static ENTRY_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*("(?:[^"\\]|\\.)*"|0[xX][0-9a-fA-F]+)\s*=\s*([A-Za-z_][A-Za-z0-9_]*)\s*\{\s*\}?\s*$"#)
        .expect("entry header regex")
});

/// `TypeName {` opening an element of a pointer/embed list.
static ELEMENT_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*\{\s*\}?\s*$").expect("element header regex")
});

/// `<key> = <value>` where both sides are quoted strings or hash literals.
static MAP_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(\s*)("(?:[^"\\]|\\.)*"|0[xX][0-9a-fA-F]+)(\s*=\s*)("(?:[^"\\]|\\.)*"|0[xX][0-9a-fA-F]+)(\s*)$"#,
    )
    .expect("map pair regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    System,
    Material,
    ResourceResolver,
    SkinProperties,
    Other,
}

impl BlockKind {
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name {
            statics::TYPE_SYSTEM => BlockKind::System,
            statics::TYPE_MATERIAL => BlockKind::Material,
            statics::TYPE_RESOURCE_RESOLVER => BlockKind::ResourceResolver,
            statics::TYPE_SKIN_PROPERTIES => BlockKind::SkinProperties,
            _ => BlockKind::Other,
        }
    }
}

/// One top-level entry: `(kind, key, start_line, end_line)`, lines inclusive and 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    pub kind: BlockKind,
    pub key: EntryKey,
    pub type_name: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl BlockSpan {
    pub fn text(&self, lines: &[&str]) -> String {
        lines[self.start_line..=self.end_line].concat()
    }
}

/// A `name: type = value` line, split into its parts. `value` has surrounding whitespace
/// (including the line terminator) trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLine<'a> {
    pub name: &'a str,
    pub ty: &'a str,
    pub value: &'a str,
}

impl FieldLine<'_> {
    /// True when the value opens a nested block (`{`, `Type {`, or the empty `{}`).
    pub fn opens_block(&self) -> bool {
        self.value.ends_with('{') || self.value.ends_with("{}")
    }
}

/// Split text into lines that keep their terminators, so `concat()` restores the input.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

pub fn indent_of(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

/// The line terminator of `line` (`\r\n`, `\n`, or empty for an unterminated last line).
pub fn terminator_of(line: &str) -> &str {
    if line.ends_with("\r\n") {
        &line[line.len() - 2..]
    } else if line.ends_with('\n') {
        &line[line.len() - 1..]
    } else {
        ""
    }
}

/// Net brace depth change of a line, ignoring braces inside string literals.
pub fn brace_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut in_string = false;
    let mut escaped = false;
    for ch in line.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => delta += 1,
            '}' => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Index of the line that closes the block opened on `start`.
///
/// A header that is balanced on its own line (`X {}`) closes itself. Returns `None` when
/// the header opens nothing or the block never closes.
pub fn block_end(lines: &[&str], start: usize) -> Option<usize> {
    let first = brace_delta(lines.get(start)?);
    if first <= 0 {
        return lines[start].contains('{').then_some(start);
    }
    let mut depth = first;
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        depth += brace_delta(line);
        if depth <= 0 {
            return Some(i);
        }
    }
    None
}

/// Brace depth in effect at the start of every line, relative to `lines[0]`.
pub fn depths(lines: &[&str]) -> Vec<i32> {
    let mut out = Vec::with_capacity(lines.len());
    let mut depth = 0;
    for line in lines {
        out.push(depth);
        depth += brace_delta(line);
    }
    out
}

pub fn parse_field(line: &str) -> Option<FieldLine<'_>> {
    let trimmed = line.trim_start();
    let name_len = trimmed
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(trimmed.len());
    if name_len == 0 {
        return None;
    }
    let name = &trimmed[..name_len];
    let rest = trimmed[name_len..].trim_start().strip_prefix(':')?;
    let eq = rest.find('=')?;
    let ty = rest[..eq].trim();
    if ty.is_empty() {
        return None;
    }
    let value = rest[eq + 1..].trim();
    Some(FieldLine { name, ty, value })
}

/// Element header type name (`VfxEmitterDefinitionData {` → `VfxEmitterDefinitionData`).
pub fn element_type(line: &str) -> Option<&str> {
    ELEMENT_HEADER_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Every top-level entry, in file order.
///
/// Entries are recognized at whatever depth they appear (inside `entries: map[...]` or
/// bare), but never inside another entry.
pub fn scan_entries(lines: &[&str]) -> Vec<BlockSpan> {
    let mut spans = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let Some(caps) = ENTRY_HEADER_RE.captures(lines[i]) else {
            i += 1;
            continue;
        };
        let (Some(key_tok), Some(type_tok)) = (caps.get(1), caps.get(2)) else {
            i += 1;
            continue;
        };
        let Some(key) = EntryKey::parse(key_tok.as_str()) else {
            i += 1;
            continue;
        };
        let Some(end) = block_end(lines, i) else {
            tracing::warn!(line = i + 1, key = %key, "entry block never closes");
            i += 1;
            continue;
        };
        let type_name = type_tok.as_str().to_string();
        spans.push(BlockSpan {
            kind: BlockKind::from_type_name(&type_name),
            key,
            type_name,
            start_line: i,
            end_line: end,
        });
        i = end + 1;
    }
    spans
}

/// Locate an entry by key at call time.
pub fn find_entry(lines: &[&str], key: &EntryKey) -> Option<BlockSpan> {
    scan_entries(lines).into_iter().find(|s| &s.key == key)
}

/// Byte range of the key token on an entry header line.
pub fn entry_key_range(line: &str) -> Option<std::ops::Range<usize>> {
    ENTRY_HEADER_RE.captures(line)?.get(1).map(|m| m.range())
}

/// `(start, end)` of every element block of `type_name` inside `lines`, outermost only.
pub fn scan_elements(lines: &[&str], type_name: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if element_type(lines[i]) == Some(type_name) {
            if let Some(end) = block_end(lines, i) {
                out.push((i, end));
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// First line at relative `depth` holding the field `name`.
pub fn find_field_at_depth(lines: &[&str], name: &str, depth: i32) -> Option<usize> {
    let levels = depths(lines);
    lines
        .iter()
        .zip(levels)
        .position(|(line, d)| d == depth && parse_field(line).is_some_and(|f| f.name == name))
}

/// `(start, end)` of the block opened by field `name` at relative `depth`.
pub fn find_field_block(lines: &[&str], name: &str, depth: i32) -> Option<(usize, usize)> {
    let start = find_field_at_depth(lines, name, depth)?;
    let field = parse_field(lines[start])?;
    if !field.opens_block() {
        return None;
    }
    Some((start, block_end(lines, start)?))
}

/// `(start, end)` of every block opened by field `name`, at any depth.
pub fn find_field_blocks_anywhere(lines: &[&str], name: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let opens = parse_field(lines[i]).is_some_and(|f| f.name == name && f.opens_block());
        if opens {
            if let Some(end) = block_end(lines, i) {
                out.push((i, end));
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// Pieces of a `<key> = <value>` map line: `(indent, key, separator, value, trailing)`.
pub fn parse_map_pair(line: &str) -> Option<[&str; 5]> {
    let caps = MAP_PAIR_RE.captures(line)?;
    let mut out = [""; 5];
    for (slot, idx) in out.iter_mut().zip(1..=5) {
        *slot = caps.get(idx)?.as_str();
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"#PROP_text
entries: map[hash,embed] = {
    "Fx_A" = VfxSystemDefinitionData {
        particleName: string = "Fx_A"
        complexEmitterDefinitionData: list[pointer] = {
            VfxEmitterDefinitionData {
                emitterName: string = "Glow {weird}"
            }
        }
    }
    0x0000abcd = StaticMaterialDef {}
}
"#;

    #[test]
    fn brace_delta_ignores_string_contents() {
        assert_eq!(brace_delta("a = \"{{{\" {"), 1);
        assert_eq!(brace_delta("x: string = \"\\\"}\""), 0);
        assert_eq!(brace_delta("}"), -1);
    }

    #[test]
    fn scan_entries_finds_systems_and_single_line_blocks() {
        let lines = split_lines(SAMPLE);
        let spans = scan_entries(&lines);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].kind, BlockKind::System);
        assert_eq!(spans[0].key, EntryKey::Name("Fx_A".to_string()));
        assert_eq!((spans[0].start_line, spans[0].end_line), (2, 9));
        assert_eq!(spans[1].kind, BlockKind::Material);
        assert_eq!((spans[1].start_line, spans[1].end_line), (10, 10));
    }

    #[test]
    fn split_lines_concat_is_identity() {
        let text = "a\r\nb\nc";
        assert_eq!(split_lines(text).concat(), text);
        assert_eq!(terminator_of("a\r\n"), "\r\n");
        assert_eq!(terminator_of("c"), "");
    }

    #[test]
    fn parse_field_splits_name_type_value() {
        let f = parse_field("        blendMode: u8 = 4\n").unwrap();
        assert_eq!((f.name, f.ty, f.value), ("blendMode", "u8", "4"));
        let f = parse_field("rate: embed = ValueFloat {\n").unwrap();
        assert!(f.opens_block());
        assert!(parse_field("\"Fx_A\" = \"Fx_A\"").is_none());
    }

    #[test]
    fn scan_elements_and_field_blocks() {
        let lines = split_lines(SAMPLE);
        let span = &scan_entries(&lines)[0];
        let block = &lines[span.start_line..=span.end_line];
        assert_eq!(scan_elements(block, statics::TYPE_EMITTER), vec![(3, 5)]);
        assert_eq!(
            find_field_block(block, statics::FIELD_EMITTERS, 1),
            Some((2, 6))
        );
        assert_eq!(find_field_at_depth(block, statics::FIELD_PARTICLE_NAME, 1), Some(1));
    }

    #[test]
    fn map_pairs_keep_their_pieces() {
        let parts = parse_map_pair("            \"Fx_A\" = 0x0000abcd\n").unwrap();
        assert_eq!(parts[1], "\"Fx_A\"");
        assert_eq!(parts[2], " = ");
        assert_eq!(parts[3], "0x0000abcd");
        assert_eq!(parts[4], "\n");
    }
}
