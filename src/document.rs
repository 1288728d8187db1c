use crate::error::{Result, VfxError};
use crate::statics;
use crate::tree::{System, VfxTree};
use crate::value::EntryKey;
use indexmap::IndexSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => statics::NL_LF,
            LineEnding::CrLf => statics::NL_CRLF,
        }
    }
}

/// An emitter the user deleted; port-all never brings it back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeletedEmitter {
    pub system_key: String,
    pub emitter_name: String,
}

/// One loaded bin text file: the raw text, the tree derived from it, and the editing
/// state that travels with the text through undo.
#[derive(Debug, Clone)]
pub struct Document {
    pub source_path: Option<PathBuf>,
    pub line_ending: LineEnding,
    pub text: String,
    pub tree: VfxTree,
    pub deleted_emitters: IndexSet<DeletedEmitter>,
    /// Systems created in this session, for highlighting.
    pub created_systems: IndexSet<String>,
}

impl Document {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let line_ending = detect_line_ending(text.as_bytes());
        let tree = VfxTree::parse(&text);
        Self {
            source_path: None,
            line_ending,
            text,
            tree,
            deleted_emitters: IndexSet::new(),
            created_systems: IndexSet::new(),
        }
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn newline(&self) -> &'static str {
        self.line_ending.as_str()
    }

    /// The same document with new text. The tree is re-derived; the line ending is kept
    /// from the loaded file rather than re-detected.
    pub fn with_text(&self, text: String) -> Self {
        Self {
            source_path: self.source_path.clone(),
            line_ending: self.line_ending,
            tree: VfxTree::parse(&text),
            text,
            deleted_emitters: self.deleted_emitters.clone(),
            created_systems: self.created_systems.clone(),
        }
    }

    pub fn system(&self, key: &str) -> Result<&System> {
        self.tree
            .system(key)
            .ok_or_else(|| VfxError::not_found("system", key))
    }

    /// Keys of every top-level entry, whatever its type.
    pub fn entry_keys(&self) -> Vec<EntryKey> {
        let lines = crate::scan::split_lines(&self.text);
        crate::scan::scan_entries(&lines)
            .into_iter()
            .map(|span| span.key)
            .collect()
    }

    /// True when some top-level entry would collide with `name` once compiled. Names hash
    /// case-insensitively, so `Fx_A` and `fx_a` are the same entry.
    pub fn has_entry(&self, name: &str) -> bool {
        let wanted = EntryKey::from_lookup(name).hash();
        self.entry_keys().iter().any(|k| k.hash() == wanted)
    }

    pub fn is_deleted(&self, system_key: &str, emitter_name: &str) -> bool {
        self.deleted_emitters.contains(&DeletedEmitter {
            system_key: system_key.to_string(),
            emitter_name: emitter_name.to_string(),
        })
    }
}

/// Majority vote over actual line terminators, so a few stray CRLFs in an LF file do not
/// flip the whole document.
pub fn detect_line_ending(text_bytes: &[u8]) -> LineEnding {
    let mut lf_count = 0usize;
    let mut crlf_count = 0usize;

    for (i, b) in text_bytes.iter().enumerate() {
        if *b != b'\n' {
            continue;
        }
        if i > 0 && text_bytes[i - 1] == b'\r' {
            crlf_count += 1;
        } else {
            lf_count += 1;
        }
    }

    if crlf_count > lf_count {
        LineEnding::CrLf
    } else {
        LineEnding::Lf
    }
}
