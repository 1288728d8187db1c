//! In-place splicing of block text. Everything outside the edited range is copied through
//! byte-for-byte; positions are always re-resolved from the current text.

use crate::error::{Result, VfxError};
use crate::scan;
use crate::statics;
use crate::tree::LineRange;
use crate::value::EntryKey;

/// Replace lines `start..=end` with `replacement`.
pub fn replace_lines(lines: &[&str], start: usize, end: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(lines.iter().map(|l| l.len()).sum::<usize>());
    for line in &lines[..start] {
        out.push_str(line);
    }
    out.push_str(replacement);
    for line in &lines[end + 1..] {
        out.push_str(line);
    }
    out
}

fn ensure_terminated(block: &str, terminator: &str) -> String {
    if terminator.is_empty() || block.ends_with('\n') {
        block.to_string()
    } else {
        format!("{block}{terminator}")
    }
}

/// Line content without its terminator.
fn content_of(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Replace the entry addressed by `key` with `new_block`.
pub fn replace_block(text: &str, key: &str, new_block: &str) -> Result<String> {
    replace_entry(text, &EntryKey::from_lookup(key), new_block)
}

pub fn replace_entry(text: &str, key: &EntryKey, new_block: &str) -> Result<String> {
    let lines = scan::split_lines(text);
    let span = scan::find_entry(&lines, key).ok_or_else(|| VfxError::not_found("entry", key.lookup()))?;
    let terminator = scan::terminator_of(lines[span.end_line]);
    let block = ensure_terminated(new_block, terminator);
    Ok(replace_lines(&lines, span.start_line, span.end_line, &block))
}

/// Indentation new top-level entries should use.
pub fn entry_indent(text: &str) -> String {
    let lines = scan::split_lines(text);
    match scan::find_field_blocks_anywhere(&lines, statics::FIELD_ENTRIES).first() {
        Some(&(start, _)) => format!("{}{}", scan::indent_of(lines[start]), statics::INDENT),
        None => String::new(),
    }
}

/// Append a new top-level entry at the end of the `entries` map, or at the end of the
/// file when there is no map.
pub fn insert_entry(text: &str, block: &str, newline: &str) -> String {
    let block = ensure_terminated(block, newline);
    let lines = scan::split_lines(text);

    let Some(&(start, end)) = scan::find_field_blocks_anywhere(&lines, statics::FIELD_ENTRIES).first()
    else {
        let mut out = text.to_string();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push_str(newline);
        }
        out.push_str(&block);
        return out;
    };

    if start == end {
        // `entries: map[hash,embed] = {}`
        return replace_lines(&lines, start, end, &expand_line(lines[start], &block, newline));
    }

    let replacement = format!("{block}{}", lines[end]);
    replace_lines(&lines, end, end, &replacement)
}

/// `block` with every line terminator converted to `newline`.
pub fn with_line_ending(block: &str, newline: &str) -> String {
    let lf = block.replace("\r\n", "\n");
    if newline == statics::NL_LF {
        lf
    } else {
        lf.replace('\n', newline)
    }
}

/// Shift every line of `block` from its header's indentation to `to_indent`.
pub fn reindent(block: &str, to_indent: &str) -> String {
    let lines = scan::split_lines(block);
    let Some(first) = lines.first() else {
        return String::new();
    };
    let from_indent = scan::indent_of(first);
    if from_indent == to_indent {
        return block.to_string();
    }
    let mut out = String::with_capacity(block.len());
    for line in &lines {
        if content_of(line).trim().is_empty() {
            out.push_str(line);
        } else if let Some(rest) = line.strip_prefix(from_indent) {
            out.push_str(to_indent);
            out.push_str(rest);
        } else {
            out.push_str(to_indent);
            out.push_str(line.trim_start());
        }
    }
    out
}

/// Rewrite the value of a single `name: type = value` line at relative `depth`, keeping
/// everything up to and including the `=` untouched.
pub fn set_field_value(block: &str, field: &str, depth: i32, new_value: &str) -> Option<String> {
    let lines = scan::split_lines(block);
    let idx = scan::find_field_at_depth(&lines, field, depth)?;
    Some(replace_lines(&lines, idx, idx, &rewrite_value(lines[idx], new_value)?))
}

/// `line` with everything after the field's `=` replaced by `new_value`.
pub fn rewrite_value(line: &str, new_value: &str) -> Option<String> {
    let colon = line.find(':')?;
    let eq = colon + line[colon..].find('=')?;
    let rest = &line[eq + 1..];
    let gap = &rest[..rest.len() - rest.trim_start_matches([' ', '\t']).len()];
    Some(format!(
        "{}{gap}{new_value}{}",
        &line[..=eq],
        scan::terminator_of(line)
    ))
}

/// Builds synthesized block text line by line with a fixed base indentation and the
/// document's line ending.
pub struct BlockWriter<'a> {
    base: String,
    newline: &'a str,
    out: String,
}

impl<'a> BlockWriter<'a> {
    pub fn new(base_indent: &str, newline: &'a str) -> Self {
        Self {
            base: base_indent.to_string(),
            newline,
            out: String::new(),
        }
    }

    pub fn line(&mut self, depth: usize, content: &str) -> &mut Self {
        self.out.push_str(&self.base);
        for _ in 0..depth {
            self.out.push_str(statics::INDENT);
        }
        self.out.push_str(content);
        self.out.push_str(self.newline);
        self
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Append `element` to the list opened by `field` (at depth 1 of `block`), creating or
/// expanding the list as needed. The element is re-indented to the list's element depth.
pub fn append_list_element(
    block: &str,
    field: &str,
    list_type: &str,
    element: &str,
    newline: &str,
) -> Result<String> {
    let lines = scan::split_lines(block);
    let Some(header) = lines.first() else {
        return Err(VfxError::InvalidInput("empty block".to_string()));
    };
    let field_indent = format!("{}{}", scan::indent_of(header), statics::INDENT);

    if let Some((start, end)) = scan::find_field_block(&lines, field, 1) {
        let element_indent = format!("{}{}", scan::indent_of(lines[start]), statics::INDENT);
        let body = ensure_terminated(&reindent(element, &element_indent), newline);
        if start == end {
            let replacement = expand_line(lines[start], &body, newline);
            return Ok(replace_lines(&lines, start, end, &replacement));
        }
        let replacement = format!("{body}{}", lines[end]);
        return Ok(replace_lines(&lines, end, end, &replacement));
    }

    // No list yet: add one right before the block's closing brace.
    let element_indent = format!("{field_indent}{}", statics::INDENT);
    let body = ensure_terminated(&reindent(element, &element_indent), newline);
    let list = format!("{field_indent}{field}: {list_type} = {{{newline}{body}{field_indent}}}{newline}");

    let last = lines.len() - 1;
    if last == 0 {
        return Ok(replace_lines(&lines, 0, 0, &expand_line(header, &list, newline)));
    }
    let replacement = format!("{list}{}", lines[last]);
    Ok(replace_lines(&lines, last, last, &replacement))
}

/// Turn a self-closed `... {}` line into `... {`, `inner`, `}`.
pub fn expand_line(line: &str, inner: &str, newline: &str) -> String {
    let content = content_of(line);
    let opened = content.strip_suffix("{}").unwrap_or(content);
    let term = match scan::terminator_of(line) {
        "" => newline,
        t => t,
    };
    format!("{opened}{{{newline}{inner}{}}}{term}", scan::indent_of(line))
}

/// Append an emitter body to the system's emitter list.
pub fn append_emitter(system_block: &str, emitter_body: &str, newline: &str) -> Result<String> {
    append_list_element(
        system_block,
        statics::FIELD_EMITTERS,
        "list[pointer]",
        emitter_body,
        newline,
    )
}

/// Remove the emitter at `span` (relative to the system block). An emitter list left
/// without elements collapses to `{}`.
pub fn remove_emitter_at(system_block: &str, span: LineRange) -> String {
    let lines = scan::split_lines(system_block);
    let removed = replace_lines(&lines, span.start, span.end, "");
    collapse_empty_list(&removed, statics::FIELD_EMITTERS)
}

/// Replace the emitter at `span` (relative to the system block) with `new_body`.
pub fn replace_emitter_at(system_block: &str, span: LineRange, new_body: &str) -> String {
    let lines = scan::split_lines(system_block);
    let terminator = scan::terminator_of(lines[span.end]);
    let body = ensure_terminated(new_body, terminator);
    replace_lines(&lines, span.start, span.end, &body)
}

/// Remove every `type_name` element of the list opened by `field` (depth 1) for which
/// `matches` returns true. Returns the new block and how many elements were removed.
pub fn remove_list_elements(
    block: &str,
    field: &str,
    type_name: &str,
    matches: impl Fn(&str) -> bool,
) -> (String, usize) {
    let lines = scan::split_lines(block);
    let Some((start, end)) = scan::find_field_block(&lines, field, 1) else {
        return (block.to_string(), 0);
    };

    let doomed: Vec<(usize, usize)> = scan::scan_elements(&lines[start..=end], type_name)
        .into_iter()
        .map(|(s, e)| (start + s, start + e))
        .filter(|&(s, e)| matches(&lines[s..=e].concat()))
        .collect();
    if doomed.is_empty() {
        return (block.to_string(), 0);
    }

    let mut out = String::with_capacity(block.len());
    let mut skip = doomed.iter().peekable();
    for (idx, line) in lines.iter().enumerate() {
        while skip.peek().is_some_and(|&&(_, e)| e < idx) {
            skip.next();
        }
        if skip.peek().is_some_and(|&&(s, e)| (s..=e).contains(&idx)) {
            continue;
        }
        out.push_str(line);
    }
    (collapse_empty_list(&out, field), doomed.len())
}

fn collapse_empty_list(block: &str, field: &str) -> String {
    let lines = scan::split_lines(block);
    let Some((start, end)) = scan::find_field_block(&lines, field, 1) else {
        return block.to_string();
    };
    if start == end {
        return block.to_string();
    }
    let only_blank = lines[start + 1..end]
        .iter()
        .all(|l| content_of(l).trim().is_empty());
    if !only_blank {
        return block.to_string();
    }
    let content = content_of(lines[start]).trim_end();
    let collapsed = format!("{content}}}{}", scan::terminator_of(lines[end]));
    replace_lines(&lines, start, end, &collapsed)
}

/// Swap the key token of an entry header line for `new_token`.
pub fn rewrite_entry_key(header: &str, new_token: &str) -> Option<String> {
    let range = scan::entry_key_range(header)?;
    Some(format!("{}{new_token}{}", &header[..range.start], &header[range.end..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SYSTEM: &str = concat!(
        "    \"Fx_A\" = VfxSystemDefinitionData {\n",
        "        complexEmitterDefinitionData: list[pointer] = {\n",
        "            VfxEmitterDefinitionData {\n",
        "                emitterName: string = \"Glow\"\n",
        "            }\n",
        "        }\n",
        "        particleName: string = \"Fx_A\"\n",
        "    }\n",
    );

    const EMITTER: &str = concat!(
        "VfxEmitterDefinitionData {\n",
        "    emitterName: string = \"Spark\"\n",
        "}\n",
    );

    #[test]
    fn replace_block_with_itself_is_identity() {
        let text = format!("entries: map[hash,embed] = {{\n{SYSTEM}}}\n");
        let block = crate::tree::extract_block(&text, "Fx_A").unwrap();
        assert_eq!(replace_block(&text, "Fx_A", &block).unwrap(), text);
        assert!(replace_block(&text, "Fx_B", &block).is_err());
    }

    #[test]
    fn append_emitter_reindents_into_list() {
        let out = append_emitter(SYSTEM, EMITTER, "\n").unwrap();
        assert!(out.contains(concat!(
            "            }\n",
            "            VfxEmitterDefinitionData {\n",
            "                emitterName: string = \"Spark\"\n",
            "            }\n",
            "        }\n",
        )));
    }

    #[test]
    fn removing_last_emitter_collapses_list() {
        let out = remove_emitter_at(SYSTEM, LineRange { start: 2, end: 4 });
        assert_eq!(
            out,
            concat!(
                "    \"Fx_A\" = VfxSystemDefinitionData {\n",
                "        complexEmitterDefinitionData: list[pointer] = {}\n",
                "        particleName: string = \"Fx_A\"\n",
                "    }\n",
            )
        );

        let refilled = append_emitter(&out, EMITTER, "\n").unwrap();
        assert!(refilled.contains(concat!(
            "        complexEmitterDefinitionData: list[pointer] = {\n",
            "            VfxEmitterDefinitionData {\n",
        )));
    }

    #[test]
    fn append_emitter_creates_missing_list() {
        let empty = "    \"Fx_B\" = VfxSystemDefinitionData {}\n";
        let out = append_emitter(empty, EMITTER, "\n").unwrap();
        assert_eq!(
            out,
            concat!(
                "    \"Fx_B\" = VfxSystemDefinitionData {\n",
                "        complexEmitterDefinitionData: list[pointer] = {\n",
                "            VfxEmitterDefinitionData {\n",
                "                emitterName: string = \"Spark\"\n",
                "            }\n",
                "        }\n",
                "    }\n",
            )
        );
    }

    #[test]
    fn insert_entry_goes_before_map_close() {
        let text = "#PROP_text\nentries: map[hash,embed] = {\n    \"A\" = X {}\n}\n";
        let out = insert_entry(text, "    \"B\" = X {}", "\n");
        assert_eq!(
            out,
            "#PROP_text\nentries: map[hash,embed] = {\n    \"A\" = X {}\n    \"B\" = X {}\n}\n"
        );
        assert_eq!(entry_indent(text), "    ");
    }

    #[test]
    fn remove_list_elements_filters_and_collapses() {
        let block = concat!(
            "    \"Skin\" = SkinCharacterDataProperties {\n",
            "        idleParticlesEffects: list[embed] = {\n",
            "            SkinCharacterDataProperties_CharacterIdleEffect {\n",
            "                effectKey: hash = \"Fx_A\"\n",
            "            }\n",
            "        }\n",
            "    }\n",
        );
        let (same, removed) = remove_list_elements(
            block,
            statics::FIELD_IDLE_EFFECTS,
            statics::TYPE_IDLE_EFFECT,
            |e| e.contains("Fx_B"),
        );
        assert_eq!((same.as_str(), removed), (block, 0));

        let (out, removed) = remove_list_elements(
            block,
            statics::FIELD_IDLE_EFFECTS,
            statics::TYPE_IDLE_EFFECT,
            |e| e.contains("Fx_A"),
        );
        assert_eq!(removed, 1);
        assert_eq!(
            out,
            concat!(
                "    \"Skin\" = SkinCharacterDataProperties {\n",
                "        idleParticlesEffects: list[embed] = {}\n",
                "    }\n",
            )
        );
    }

    #[test]
    fn rewrite_entry_key_and_line_endings() {
        assert_eq!(
            rewrite_entry_key("    \"Fx_A\" = VfxSystemDefinitionData {\r\n", "\"Fx_B\"").as_deref(),
            Some("    \"Fx_B\" = VfxSystemDefinitionData {\r\n")
        );
        assert!(rewrite_entry_key("name: string = \"x\"\n", "\"y\"").is_none());
        assert_eq!(with_line_ending("a\r\nb\n", "\r\n"), "a\r\nb\r\n");
        assert_eq!(with_line_ending("a\r\nb\n", "\n"), "a\nb\n");
    }

    #[test]
    fn set_field_value_keeps_prefix() {
        let out = set_field_value(SYSTEM, statics::FIELD_PARTICLE_NAME, 1, "\"Fx_B\"").unwrap();
        assert!(out.contains("        particleName: string = \"Fx_B\"\n"));
        assert_eq!(out.len(), SYSTEM.len());
    }

    #[test]
    fn rewrite_value_keeps_spacing_after_equals() {
        assert_eq!(
            rewrite_value("    value: vec4 =  { 0, 0, 0, 1 }\r\n", "{ 1, 1, 1, 1 }").as_deref(),
            Some("    value: vec4 =  { 1, 1, 1, 1 }\r\n")
        );
        assert_eq!(
            rewrite_value("    name: string =\"a\"\n", "\"b\"").as_deref(),
            Some("    name: string =\"b\"\n")
        );
        assert_eq!(
            rewrite_value("\tname: string =\t\"a\"", "\"b\"").as_deref(),
            Some("\tname: string =\t\"b\"")
        );
    }
}
