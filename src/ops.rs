//! Structural mutations.
//!
//! Every operation reads a `Document` and returns the complete next document inside an
//! `Edit`. The input is never modified, so a failed operation leaves nothing behind and
//! the caller decides whether to commit.

use crate::assets;
use crate::document::{DeletedEmitter, Document};
use crate::error::{Result, VfxError};
use crate::naming::{self, NameAllocator};
use crate::resource_map;
use crate::scan;
use crate::splice::{self, BlockWriter};
use crate::statics;
use crate::tree::System;
use crate::value::{self, EntryKey};
use indexmap::IndexSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Result of a successful operation.
#[derive(Debug, Clone)]
pub struct Edit {
    pub document: Document,
    pub description: String,
    /// `(old, new)` system key, so a selection can follow a rename.
    pub renamed: Option<(String, String)>,
    /// Asset paths referenced by content copied in from a donor.
    pub asset_refs: Vec<String>,
    /// Port-all stopped early. Whatever was copied before the stop is kept.
    pub cancelled: bool,
}

impl Edit {
    pub(crate) fn new(document: Document, description: impl Into<String>) -> Self {
        Self {
            document,
            description: description.into(),
            renamed: None,
            asset_refs: Vec::new(),
            cancelled: false,
        }
    }
}

/// Cooperative cancellation for long port operations, checked between items.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortProgress {
    pub done: usize,
    pub total: usize,
    pub emitter: String,
}

fn required_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        Err(VfxError::EmptyName)
    } else {
        Ok(name)
    }
}

fn last_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn missing_emitter(system: &System, name: &str) -> VfxError {
    VfxError::not_found("emitter", format!("{name} in {}", system.display_name))
}

/// `body` with its `emitterName` set to `name`. Emitters that had no name field get one
/// right under their header.
fn with_emitter_name(body: &str, name: &str, newline: &str) -> String {
    let lines = scan::split_lines(body);
    let quoted = value::quote(name);

    if let Some(idx) = scan::find_field_at_depth(&lines, statics::FIELD_EMITTER_NAME, 1) {
        let current = scan::parse_field(lines[idx]).and_then(|f| value::unquote(f.value));
        if current.as_deref() == Some(name) {
            return body.to_string();
        }
        return splice::rewrite_value(lines[idx], &quoted)
            .map(|line| splice::replace_lines(&lines, idx, idx, &line))
            .unwrap_or_else(|| body.to_string());
    }

    let Some(header) = lines.first() else {
        return body.to_string();
    };
    let field = format!(
        "{}{}{}: string = {quoted}{newline}",
        scan::indent_of(header),
        statics::INDENT,
        statics::FIELD_EMITTER_NAME
    );
    if lines.len() == 1 {
        return splice::expand_line(header, &field, newline);
    }
    splice::replace_lines(&lines, 0, 0, &format!("{header}{field}"))
}

/// A `particleName`/`particlePath` value after its system is renamed from `old` to `new`,
/// or `None` when the value does not refer to the old name.
fn renamed_reference(current: &str, old: &EntryKey, new: &str) -> Option<String> {
    let side = EntryKey::Name(current.to_string());
    if let Some(EntryKey::Name(renamed)) = resource_map::rename_side(&side, old, new) {
        return Some(renamed);
    }
    let old_short = last_segment(old.as_name()?);
    current
        .eq_ignore_ascii_case(old_short)
        .then(|| last_segment(new).to_string())
}

/// Rewrite a system block's header key plus its `particleName`/`particlePath` fields.
/// Fields that refer to the old name keep their form (short name or path); any other
/// value is replaced by the new name's last segment or full path.
fn rename_system_block(block: &str, old: &EntryKey, new: &str) -> Result<String> {
    let lines = scan::split_lines(block);
    let header = lines
        .first()
        .and_then(|h| splice::rewrite_entry_key(h, &value::quote(new)))
        .ok_or_else(|| VfxError::Malformed {
            key: old.lookup(),
            reason: "unrecognized entry header".to_string(),
        })?;
    let mut out = splice::replace_lines(&lines, 0, 0, &header);

    for field in [statics::FIELD_PARTICLE_NAME, statics::FIELD_PARTICLE_PATH] {
        let lines = scan::split_lines(&out);
        let Some(idx) = scan::find_field_at_depth(&lines, field, 1) else {
            continue;
        };
        let Some(current) = scan::parse_field(lines[idx]).and_then(|f| value::unquote(f.value))
        else {
            continue;
        };
        // A value that no longer tracks the key is reset so the rename is never partial.
        let renamed = renamed_reference(&current, old, new).unwrap_or_else(|| {
            if field == statics::FIELD_PARTICLE_NAME {
                last_segment(new).to_string()
            } else {
                new.to_string()
            }
        });
        let Some(line) = splice::rewrite_value(lines[idx], &value::quote(&renamed)) else {
            continue;
        };
        out = splice::replace_lines(&lines, idx, idx, &line);
    }
    Ok(out)
}

fn forget_deleted(doc: &mut Document, system_key: &str, emitter_name: &str) {
    doc.deleted_emitters.shift_remove(&DeletedEmitter {
        system_key: system_key.to_string(),
        emitter_name: emitter_name.to_string(),
    });
}

/// Add a new, empty system. A taken name is resolved to the next free `name_N`.
pub fn create_system(doc: &Document, name: &str) -> Result<Edit> {
    let desired = required_name(name)?;
    let name = naming::unique_name(desired, |n| doc.has_entry(n));
    let newline = doc.newline();

    let mut writer = BlockWriter::new(&splice::entry_indent(&doc.text), newline);
    writer
        .line(0, &format!("{} = {} {{", value::quote(&name), statics::TYPE_SYSTEM))
        .line(1, &format!("{}: list[pointer] = {{}}", statics::FIELD_EMITTERS))
        .line(
            1,
            &format!(
                "{}: string = {}",
                statics::FIELD_PARTICLE_NAME,
                value::quote(last_segment(&name))
            ),
        )
        .line(
            1,
            &format!("{}: string = {}", statics::FIELD_PARTICLE_PATH, value::quote(&name)),
        )
        .line(0, "}");

    let text = splice::insert_entry(&doc.text, &writer.finish(), newline);
    let mut next = doc.with_text(text);
    next.created_systems.insert(name.clone());

    tracing::debug!(system = %name, "created system");
    let description = if name == desired {
        format!("Created system {name}")
    } else {
        format!("Created system {name} ({desired} is taken)")
    };
    Ok(Edit::new(next, description))
}

/// Rename a system: header key, `particleName`, `particlePath`, and every resource-map
/// entry that refers to it.
pub fn rename_system(doc: &Document, old_key: &str, new_name: &str) -> Result<Edit> {
    let new_name = required_name(new_name)?;
    let system = doc.system(old_key)?;
    let old_lookup = system.key.lookup();
    if old_lookup == new_name {
        return Err(VfxError::InvalidInput(format!(
            "system is already named {new_name}"
        )));
    }

    let entry_keys = doc.entry_keys();
    let new_hash = value::fnv1a_lower(new_name);
    let collides = entry_keys
        .iter()
        .any(|k| k != &system.key && k.hash() == new_hash);
    if collides {
        return Err(VfxError::Collision {
            kind: "system",
            name: new_name.to_string(),
            scope: None,
        });
    }

    let block = rename_system_block(&system.raw, &system.key, new_name)?;
    let text = splice::replace_entry(&doc.text, &system.key, &block)?;
    let (text, rewrites) = resource_map::sync_rename(&text, &system.key, new_name, &entry_keys);

    let mut next = doc.with_text(text);
    next.deleted_emitters = doc
        .deleted_emitters
        .iter()
        .map(|d| {
            if d.system_key == old_lookup {
                DeletedEmitter {
                    system_key: new_name.to_string(),
                    emitter_name: d.emitter_name.clone(),
                }
            } else {
                d.clone()
            }
        })
        .collect();
    if next.created_systems.shift_remove(&old_lookup) {
        next.created_systems.insert(new_name.to_string());
    }

    tracing::debug!(old = %old_lookup, new = new_name, map_entries = rewrites.len(), "renamed system");
    let mut edit = Edit::new(
        next,
        format!(
            "Renamed system {old_lookup} to {new_name} ({} resource map entries updated)",
            rewrites.len()
        ),
    );
    edit.renamed = Some((old_lookup, new_name.to_string()));
    Ok(edit)
}

/// Change an emitter's `emitterName`. Refuses outright when the system already has an
/// emitter with the new name.
pub fn rename_emitter(
    doc: &Document,
    system_key: &str,
    old_name: &str,
    new_name: &str,
) -> Result<Edit> {
    let new_name = required_name(new_name)?;
    let system = doc.system(system_key)?;
    let emitter = system
        .emitter(old_name)
        .ok_or_else(|| missing_emitter(system, old_name))?;
    if old_name == new_name {
        return Err(VfxError::InvalidInput(format!(
            "emitter is already named {new_name}"
        )));
    }
    if system.has_emitter(new_name) {
        return Err(VfxError::Collision {
            kind: "emitter",
            name: new_name.to_string(),
            scope: Some(system.display_name.clone()),
        });
    }

    let body = system
        .emitter_body(old_name)
        .ok_or_else(|| missing_emitter(system, old_name))?;
    let body = with_emitter_name(&body, new_name, doc.newline());
    let block = splice::replace_emitter_at(&system.raw, emitter.span, &body);
    let text = splice::replace_entry(&doc.text, &system.key, &block)?;
    let mut next = doc.with_text(text);
    forget_deleted(&mut next, &system.key.lookup(), new_name);

    tracing::debug!(system = %system.key, old = old_name, new = new_name, "renamed emitter");
    Ok(Edit::new(
        next,
        format!(
            "Renamed emitter {old_name} to {new_name} in {}",
            system.display_name
        ),
    ))
}

pub fn delete_emitter(doc: &Document, system_key: &str, name: &str) -> Result<Edit> {
    let system = doc.system(system_key)?;
    let emitter = system
        .emitter(name)
        .ok_or_else(|| missing_emitter(system, name))?;

    let block = splice::remove_emitter_at(&system.raw, emitter.span);
    let text = splice::replace_entry(&doc.text, &system.key, &block)?;
    let mut next = doc.with_text(text);
    next.deleted_emitters.insert(DeletedEmitter {
        system_key: system.key.lookup(),
        emitter_name: name.to_string(),
    });

    tracing::debug!(system = %system.key, emitter = name, "deleted emitter");
    Ok(Edit::new(
        next,
        format!("Deleted emitter {name} from {}", system.display_name),
    ))
}

pub fn delete_all_emitters(doc: &Document, system_key: &str) -> Result<Edit> {
    let system = doc.system(system_key)?;
    if system.emitters.is_empty() {
        return Err(VfxError::InvalidInput(format!(
            "{} has no emitters",
            system.display_name
        )));
    }

    // Last to first, so earlier spans stay valid.
    let mut block = system.raw.clone();
    for emitter in system.emitters.iter().rev() {
        block = splice::remove_emitter_at(&block, emitter.span);
    }
    let text = splice::replace_entry(&doc.text, &system.key, &block)?;

    let mut next = doc.with_text(text);
    let system_lookup = system.key.lookup();
    for emitter in &system.emitters {
        next.deleted_emitters.insert(DeletedEmitter {
            system_key: system_lookup.clone(),
            emitter_name: emitter.name.clone(),
        });
    }

    tracing::debug!(system = %system.key, count = system.emitters.len(), "deleted all emitters");
    Ok(Edit::new(
        next,
        format!(
            "Deleted {} emitters from {}",
            system.emitters.len(),
            system.display_name
        ),
    ))
}

/// Move an emitter between two systems of the same document in one text update.
pub fn move_emitter(doc: &Document, from: &str, name: &str, to: &str) -> Result<Edit> {
    let source = doc.system(from)?;
    let dest = doc.system(to)?;
    if source.key == dest.key {
        return Err(VfxError::InvalidInput(
            "cannot move an emitter into the system it is already in".to_string(),
        ));
    }
    let emitter = source
        .emitter(name)
        .ok_or_else(|| missing_emitter(source, name))?;
    let body = source
        .emitter_body(name)
        .ok_or_else(|| missing_emitter(source, name))?;

    let newline = doc.newline();
    let final_name = naming::unique_name(name, |n| dest.has_emitter(n));
    let body = if final_name == name {
        body
    } else {
        with_emitter_name(&body, &final_name, newline)
    };

    let dest_block = splice::append_emitter(&dest.raw, &body, newline)?;
    let source_block = splice::remove_emitter_at(&source.raw, emitter.span);
    let text = splice::replace_entry(&doc.text, &dest.key, &dest_block)?;
    let text = splice::replace_entry(&text, &source.key, &source_block)?;

    let mut next = doc.with_text(text);
    forget_deleted(&mut next, &dest.key.lookup(), &final_name);

    tracing::debug!(from = %source.key, to = %dest.key, emitter = name, as_name = %final_name, "moved emitter");
    let renamed = if final_name == name {
        String::new()
    } else {
        format!(" as {final_name}")
    };
    Ok(Edit::new(
        next,
        format!(
            "Moved emitter {name} from {} to {}{renamed}",
            source.display_name, dest.display_name
        ),
    ))
}

/// Copy one emitter from a donor document's system into a target system.
pub fn port_emitter(
    target: &Document,
    target_system: &str,
    donor: &Document,
    donor_system: &str,
    name: &str,
) -> Result<Edit> {
    let source = donor.system(donor_system)?;
    let dest = target.system(target_system)?;
    let body = source
        .emitter_body(name)
        .ok_or_else(|| missing_emitter(source, name))?;

    let newline = target.newline();
    let final_name = naming::unique_name(name, |n| dest.has_emitter(n));
    let body = with_emitter_name(&splice::with_line_ending(&body, newline), &final_name, newline);

    let block = splice::append_emitter(&dest.raw, &body, newline)?;
    let text = splice::replace_entry(&target.text, &dest.key, &block)?;
    let mut next = target.with_text(text);
    forget_deleted(&mut next, &dest.key.lookup(), &final_name);

    tracing::debug!(from = %source.key, to = %dest.key, emitter = name, as_name = %final_name, "ported emitter");
    let mut edit = Edit::new(
        next,
        format!(
            "Ported emitter {final_name} from {} into {}",
            source.display_name, dest.display_name
        ),
    );
    edit.asset_refs = assets::asset_references(&body);
    Ok(edit)
}

/// Copy every donor emitter into the target system, skipping names the user deleted from
/// it. Progress is reported after each emitter; `cancel` is checked before each one.
pub fn port_all_emitters(
    target: &Document,
    target_system: &str,
    donor: &Document,
    donor_system: &str,
    cancel: &CancelFlag,
    mut progress: impl FnMut(&PortProgress),
) -> Result<Edit> {
    let source = donor.system(donor_system)?;
    let dest = target.system(target_system)?;
    let dest_lookup = dest.key.lookup();

    let candidates: Vec<&str> = source
        .emitters
        .iter()
        .map(|e| e.name.as_str())
        .filter(|name| !target.is_deleted(&dest_lookup, name))
        .collect();
    if candidates.is_empty() {
        return Err(VfxError::InvalidInput(format!(
            "nothing to port from {}",
            source.display_name
        )));
    }

    let newline = target.newline();
    let total = candidates.len();
    let mut names = NameAllocator::new(dest.emitter_names());
    let mut block = dest.raw.clone();
    let mut ported = Vec::new();
    let mut refs = IndexSet::new();
    let mut cancelled = false;

    for (i, name) in candidates.iter().enumerate() {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        let Some(body) = source.emitter_body(name) else {
            continue;
        };
        let final_name = names.allocate(name);
        let body = with_emitter_name(&splice::with_line_ending(&body, newline), &final_name, newline);
        block = splice::append_emitter(&block, &body, newline)?;
        refs.extend(assets::asset_references(&body));
        ported.push(final_name);
        progress(&PortProgress {
            done: i + 1,
            total,
            emitter: name.to_string(),
        });
    }

    if ported.is_empty() {
        return Err(VfxError::InvalidInput(if cancelled {
            "port cancelled before any emitter was copied".to_string()
        } else {
            format!("nothing to port from {}", source.display_name)
        }));
    }

    let text = splice::replace_entry(&target.text, &dest.key, &block)?;
    let mut next = target.with_text(text);
    for name in &ported {
        forget_deleted(&mut next, &dest_lookup, name);
    }

    let skipped = source.emitters.len() - total;
    tracing::debug!(from = %source.key, to = %dest.key, ported = ported.len(), skipped, cancelled, "ported emitters");
    let mut description = format!(
        "Ported {} of {total} emitters from {} into {}",
        ported.len(),
        source.display_name,
        dest.display_name
    );
    if skipped > 0 {
        description.push_str(&format!(", skipped {skipped} deleted"));
    }
    if cancelled {
        description.push_str(" (cancelled)");
    }
    let mut edit = Edit::new(next, description);
    edit.asset_refs = refs.into_iter().collect();
    edit.cancelled = cancelled;
    Ok(edit)
}

/// Copy a whole donor system into the target as a new entry. A taken name is resolved to
/// the next free `name_N`; a taken hash key cannot be and is refused.
pub fn port_system(target: &Document, donor: &Document, donor_key: &str) -> Result<Edit> {
    let source = donor.system(donor_key)?;
    let newline = target.newline();

    let (block, final_key) = match &source.key {
        EntryKey::Name(name) => {
            let final_name = naming::unique_name(name, |n| target.has_entry(n));
            let block = if &final_name == name {
                source.raw.clone()
            } else {
                rename_system_block(&source.raw, &source.key, &final_name)?
            };
            (block, final_name)
        }
        EntryKey::Hash(_) => {
            let lookup = source.key.lookup();
            if target.has_entry(&lookup) {
                return Err(VfxError::Collision {
                    kind: "system",
                    name: lookup,
                    scope: None,
                });
            }
            (source.raw.clone(), lookup)
        }
    };

    let block = splice::reindent(
        &splice::with_line_ending(&block, newline),
        &splice::entry_indent(&target.text),
    );
    let text = splice::insert_entry(&target.text, &block, newline);
    let mut next = target.with_text(text);
    next.created_systems.insert(final_key.clone());

    tracing::debug!(from = %source.key, as_key = %final_key, "ported system");
    let mut edit = Edit::new(
        next,
        format!(
            "Ported system {final_key} with {} emitters",
            source.emitters.len()
        ),
    );
    edit.asset_refs = assets::asset_references(&block);
    Ok(edit)
}

/// Overwrite one material parameter's vec4 in place. Only that one line changes.
pub fn set_color_param(
    doc: &Document,
    material_key: &str,
    param: &str,
    color: [f32; 4],
) -> Result<Edit> {
    let material = doc
        .tree
        .material(material_key)
        .ok_or_else(|| VfxError::not_found("material", material_key))?;
    let target = material
        .param(param)
        .ok_or_else(|| VfxError::not_found("material parameter", param))?;
    if color.iter().any(|c| !c.is_finite()) {
        return Err(VfxError::InvalidInput(format!(
            "color components must be finite: {color:?}"
        )));
    }

    let malformed = || VfxError::Malformed {
        key: material.key.lookup(),
        reason: format!("parameter {param} has no vec4 value line"),
    };
    let lines = scan::split_lines(&doc.text);
    let line = lines.get(target.line).ok_or_else(malformed)?;
    let patched = splice::rewrite_value(line, &value::format_vec4(color)).ok_or_else(malformed)?;
    let text = splice::replace_lines(&lines, target.line, target.line, &patched);

    tracing::debug!(material = %material.key, param, "set material parameter");
    Ok(Edit::new(
        doc.with_text(text),
        format!("Set {param} on {}", material.display_name),
    ))
}
