//! Keeps `resourceMap: map[hash,link]` entries pointing at systems across renames.
//!
//! Each side of an entry is matched against the old name with one fixed precedence:
//! exact, then case-insensitive, then path suffix. A hash-literal side matches when it
//! equals the hash of the old name; it is rewritten to the hash of the new name so the
//! side keeps its original format.

use crate::scan;
use crate::statics;
use crate::value::{self, EntryKey};

/// How one side of an entry matched the old name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SideMatch {
    Exact,
    CaseInsensitive,
    PathSuffix,
}

/// Strongest match for a whole entry, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMatch {
    ExactKey,
    ExactValue,
    CaseInsensitive,
    PathSuffix,
    NoMatch,
}

pub fn match_side(side: &EntryKey, old: &EntryKey) -> Option<SideMatch> {
    match (side, old) {
        (EntryKey::Hash(h), _) => (*h == old.hash()).then_some(SideMatch::Exact),
        (EntryKey::Name(s), EntryKey::Hash(h)) => {
            (value::fnv1a_lower(s) == *h).then_some(SideMatch::CaseInsensitive)
        }
        (EntryKey::Name(s), EntryKey::Name(o)) => {
            if s == o {
                Some(SideMatch::Exact)
            } else if s.eq_ignore_ascii_case(o) {
                Some(SideMatch::CaseInsensitive)
            } else if s.len() > o.len()
                && s.to_ascii_lowercase()
                    .ends_with(&format!("/{}", o.to_ascii_lowercase()))
            {
                Some(SideMatch::PathSuffix)
            } else {
                None
            }
        }
    }
}

pub fn classify(key: &EntryKey, val: &EntryKey, old: &EntryKey) -> MapMatch {
    combine(match_side(key, old), match_side(val, old))
}

fn combine(k: Option<SideMatch>, v: Option<SideMatch>) -> MapMatch {
    if k == Some(SideMatch::Exact) {
        MapMatch::ExactKey
    } else if v == Some(SideMatch::Exact) {
        MapMatch::ExactValue
    } else if k == Some(SideMatch::CaseInsensitive) || v == Some(SideMatch::CaseInsensitive) {
        MapMatch::CaseInsensitive
    } else if k == Some(SideMatch::PathSuffix) || v == Some(SideMatch::PathSuffix) {
        MapMatch::PathSuffix
    } else {
        MapMatch::NoMatch
    }
}

/// The renamed side, or `None` when the side does not refer to `old`.
pub fn rename_side(side: &EntryKey, old: &EntryKey, new: &str) -> Option<EntryKey> {
    let kind = match_side(side, old)?;
    Some(renamed_side(side, kind, old, new))
}

fn renamed_side(side: &EntryKey, kind: SideMatch, old: &EntryKey, new: &str) -> EntryKey {
    match (side, kind) {
        (EntryKey::Hash(_), _) => EntryKey::Hash(value::fnv1a_lower(new)),
        (EntryKey::Name(s), SideMatch::PathSuffix) => {
            let old_len = old.as_name().map(str::len).unwrap_or(0);
            EntryKey::Name(format!("{}{new}", &s[..s.len() - old_len]))
        }
        (EntryKey::Name(_), _) => EntryKey::Name(new.to_string()),
    }
}

/// How `side` refers to `old`, ignoring loose matches on a side that names some other
/// entry of the file.
fn effective_match(side: &EntryKey, old: &EntryKey, entries: &[EntryKey]) -> Option<SideMatch> {
    let kind = match_side(side, old)?;
    let names_other = entries
        .iter()
        .any(|k| k.hash() != old.hash() && k.hash() == side.hash());
    (kind == SideMatch::Exact || !names_other).then_some(kind)
}

/// One rewritten resource-map line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRewrite {
    pub line: usize,
    pub matched: MapMatch,
    pub before: String,
    pub after: String,
}

/// Rewrite every resource-map entry that refers to `old` so it refers to `new`.
///
/// Only the matched sides of matched lines change; every other byte is copied through.
/// `entries` lists the file's top-level keys: a case-insensitive or path-suffix match on
/// a side that is itself the key of another entry is left alone.
pub fn sync_rename(
    text: &str,
    old: &EntryKey,
    new: &str,
    entries: &[EntryKey],
) -> (String, Vec<MapRewrite>) {
    let lines = scan::split_lines(text);
    let mut rewrites = Vec::new();

    for (start, end) in scan::find_field_blocks_anywhere(&lines, statics::FIELD_RESOURCE_MAP) {
        for (idx, line) in lines.iter().enumerate().take(end).skip(start + 1) {
            let Some([indent, key_tok, sep, val_tok, trailing]) = scan::parse_map_pair(line) else {
                continue;
            };
            let (Some(key), Some(val)) = (EntryKey::parse(key_tok), EntryKey::parse(val_tok))
            else {
                continue;
            };

            let key_match = effective_match(&key, old, entries);
            let val_match = effective_match(&val, old, entries);
            let matched = combine(key_match, val_match);
            if matched == MapMatch::NoMatch {
                continue;
            }

            let new_key = key_match
                .map(|m| renamed_side(&key, m, old, new).to_token())
                .unwrap_or_else(|| key_tok.to_string());
            let new_val = val_match
                .map(|m| renamed_side(&val, m, old, new).to_token())
                .unwrap_or_else(|| val_tok.to_string());

            let after = format!("{indent}{new_key}{sep}{new_val}{trailing}");
            if after != *line {
                rewrites.push(MapRewrite {
                    line: idx,
                    matched,
                    before: line.to_string(),
                    after,
                });
            }
        }
    }

    if rewrites.is_empty() {
        return (text.to_string(), rewrites);
    }

    let mut out = String::with_capacity(text.len());
    let mut next = rewrites.iter().peekable();
    for (idx, line) in lines.iter().enumerate() {
        match next.peek() {
            Some(rw) if rw.line == idx => {
                out.push_str(&rw.after);
                next.next();
            }
            _ => out.push_str(line),
        }
    }
    tracing::debug!(old = %old, new, count = rewrites.len(), "resource map synchronized");
    (out, rewrites)
}
