//! The editing session: owns the loaded document (and an optional donor), runs every
//! mutation through one commit path, and talks to the compiler and the file system.
//!
//! All entry points take `&mut self`, so mutations, saves and compiler runs never
//! interleave. Mutation failures come back as `Outcome::Rejected` status text; only load
//! and save return `Err`, and only for IO or compiler failures (plus `NotLoaded`).

use crate::assets::{self, AssetCopier};
use crate::compiler::{Compiler, ExternalCompiler};
use crate::conditions::{self, ConditionMode, PersistentCondition};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::error::{Result, VfxError};
use crate::history::{UndoHistory, UndoSnapshot};
use crate::ops::{self, CancelFlag, Edit, PortProgress};
use crate::statics;
use crate::storage::{FileSystem, StdFileSystem};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// What happened to a requested mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied {
        description: String,
        /// Non-fatal problems, such as assets that could not be copied.
        warnings: Vec<String>,
    },
    Rejected {
        reason: String,
    },
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied { .. })
    }

    /// One line of status text for either case.
    pub fn status(&self) -> &str {
        match self {
            Outcome::Applied { description, .. } => description,
            Outcome::Rejected { reason } => reason,
        }
    }

    fn rejected(err: &VfxError) -> Self {
        let reason = match err {
            VfxError::NotLoaded => statics::EN_STATUS_NOT_LOADED.to_string(),
            other => other.to_string(),
        };
        Outcome::Rejected { reason }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub path: PathBuf,
    pub systems: usize,
    pub emitters: usize,
    pub materials: usize,
    /// No readable names; editing continues with hash keys only.
    pub hashed: bool,
    pub warnings: Vec<String>,
}

/// Text captured for a save that runs after the user stops editing.
#[derive(Debug, Clone)]
pub struct SaveTicket {
    version: u64,
    text: String,
    path: PathBuf,
}

impl SaveTicket {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundSave {
    Written,
    /// The document changed after the ticket was taken; nothing was written.
    Superseded,
}

/// Idle timer for automatic saves: due once `delay` has passed since the last touch.
#[derive(Debug, Clone)]
pub struct SaveDebounce {
    delay: Duration,
    pending_since: Option<Instant>,
}

impl SaveDebounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending_since: None,
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.pending_since = Some(now);
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.pending_since
            .is_some_and(|since| now.saturating_duration_since(since) >= self.delay)
    }

    pub fn clear(&mut self) {
        self.pending_since = None;
    }
}

/// Status text for a blocking failure, with the hint that the last good file is intact.
pub fn describe_failure(err: &VfxError) -> String {
    if err.is_blocking() {
        format!("{err}. {}", statics::EN_STATUS_BACKUP_HINT)
    } else {
        err.to_string()
    }
}

fn is_bin(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(statics::BIN_EXTENSION))
}

pub struct EditSession {
    config: EditorConfig,
    compiler: Option<Box<dyn Compiler>>,
    fs: Box<dyn FileSystem>,
    doc: Option<Document>,
    donor: Option<Document>,
    history: UndoHistory,
    selected: Option<String>,
    version: u64,
    saved_version: u64,
    debounce: SaveDebounce,
}

impl EditSession {
    /// A session on the real file system, using the configured compiler if any.
    pub fn new(config: EditorConfig) -> Self {
        let compiler = config
            .compiler_path
            .clone()
            .map(|p| Box::new(ExternalCompiler::new(p)) as Box<dyn Compiler>);
        Self::with_collaborators(config, compiler, Box::new(StdFileSystem))
    }

    pub fn with_collaborators(
        config: EditorConfig,
        compiler: Option<Box<dyn Compiler>>,
        fs: Box<dyn FileSystem>,
    ) -> Self {
        let history = UndoHistory::with_limit(config.history_limit);
        let debounce = SaveDebounce::new(Duration::from_millis(config.save_debounce_ms));
        Self {
            config,
            compiler,
            fs,
            doc: None,
            donor: None,
            history,
            selected: None,
            version: 0,
            saved_version: 0,
            debounce,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> Option<&Document> {
        self.doc.as_ref()
    }

    pub fn donor(&self) -> Option<&Document> {
        self.donor.as_ref()
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    pub fn selected_system(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Bumped by every committed mutation and every undo.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.doc.is_some() && self.version != self.saved_version
    }

    pub fn select_system(&mut self, key: Option<&str>) -> Outcome {
        let Some(doc) = &self.doc else {
            return Outcome::rejected(&VfxError::NotLoaded);
        };
        if let Some(key) = key {
            if let Err(e) = doc.system(key) {
                return Outcome::rejected(&e);
            }
        }
        self.selected = key.map(str::to_string);
        Outcome::Applied {
            description: key.map_or_else(
                || "Selection cleared".to_string(),
                |k| format!("Selected {k}"),
            ),
            warnings: Vec::new(),
        }
    }

    fn compiler(&self) -> Result<&dyn Compiler> {
        self.compiler
            .as_deref()
            .ok_or_else(|| VfxError::ExternalTool {
                tool: "compiler".to_string(),
                status: "not configured".to_string(),
                stderr: "set compiler_path to open or save .bin files".to_string(),
            })
    }

    fn read_document(&self, path: &Path) -> Result<Document> {
        let text = if is_bin(path) {
            let text_path = path.with_extension(statics::TEXT_EXTENSION);
            self.compiler()?.bin_to_text(path, &text_path)?;
            self.fs.read_text(&text_path)?
        } else {
            self.fs.read_text(path)?
        };
        Ok(Document::from_text(text).with_source(path))
    }

    /// Load a `.bin` (through the compiler) or a text dump as the document being edited.
    /// History, selection and version start over.
    pub fn open(&mut self, path: &Path) -> Result<LoadReport> {
        let doc = self.read_document(path)?;

        let hashed = doc.tree.looks_hashed();
        let mut warnings = Vec::new();
        if hashed {
            tracing::warn!(path = %path.display(), "content looks hashed");
            warnings.push(statics::EN_STATUS_HASHED_CONTENT.to_string());
        }
        let report = LoadReport {
            path: path.to_path_buf(),
            systems: doc.tree.systems.len(),
            emitters: doc.tree.emitter_count(),
            materials: doc.tree.materials.len(),
            hashed,
            warnings,
        };
        tracing::info!(
            path = %path.display(),
            systems = report.systems,
            emitters = report.emitters,
            materials = report.materials,
            "loaded"
        );

        self.doc = Some(doc);
        self.history.clear();
        self.selected = None;
        self.version = 0;
        self.saved_version = 0;
        self.debounce.clear();
        Ok(report)
    }

    /// Load the file emitters and systems are ported from. It is never edited.
    pub fn open_donor(&mut self, path: &Path) -> Result<()> {
        let donor = self.read_document(path)?;
        tracing::info!(path = %path.display(), systems = donor.tree.systems.len(), "loaded donor");
        self.donor = Some(donor);
        Ok(())
    }

    fn with_doc(&self, op: impl FnOnce(&Document) -> Result<Edit>) -> Result<Edit> {
        op(self.doc.as_ref().ok_or(VfxError::NotLoaded)?)
    }

    fn with_donor(&self, op: impl FnOnce(&Document, &Document) -> Result<Edit>) -> Result<Edit> {
        let doc = self.doc.as_ref().ok_or(VfxError::NotLoaded)?;
        let donor = self
            .donor
            .as_ref()
            .ok_or_else(|| VfxError::InvalidInput("no donor file is loaded".to_string()))?;
        op(doc, donor)
    }

    fn copy_assets(&self, refs: &[String]) -> Vec<String> {
        if !self.config.copy_assets_on_port || refs.is_empty() {
            return Vec::new();
        }
        let donor_path = self.donor.as_ref().and_then(|d| d.source_path.as_deref());
        let target_path = self.doc.as_ref().and_then(|d| d.source_path.as_deref());
        let (Some(donor_path), Some(target_path)) = (donor_path, target_path) else {
            return Vec::new();
        };
        let donor_root = assets::asset_root(donor_path);
        let target_root = assets::asset_root(target_path);
        if donor_root == target_root {
            return Vec::new();
        }
        AssetCopier::new(self.fs.as_ref(), donor_root, target_root)
            .copy_all(refs)
            .warnings()
    }

    /// The one commit path: snapshot, swap in the new document, bump the version.
    fn finish(&mut self, result: Result<Edit>) -> Outcome {
        let edit = match result {
            Ok(edit) => edit,
            Err(e) => {
                tracing::debug!(error = %e, "edit rejected");
                return Outcome::rejected(&e);
            }
        };
        let Some(previous) = self.doc.take() else {
            return Outcome::rejected(&VfxError::NotLoaded);
        };

        self.history.push(UndoSnapshot::capture(
            &previous,
            self.selected.as_deref(),
            edit.description.clone(),
        ));
        if let Some((old, new)) = &edit.renamed {
            if self.selected.as_deref() == Some(old.as_str()) {
                self.selected = Some(new.clone());
            }
        }
        self.doc = Some(edit.document);
        self.version += 1;
        self.debounce.touch(Instant::now());

        let warnings = self.copy_assets(&edit.asset_refs);
        tracing::info!(version = self.version, description = %edit.description, "edit applied");
        Outcome::Applied {
            description: edit.description,
            warnings,
        }
    }

    pub fn create_system(&mut self, name: &str) -> Outcome {
        let result = self.with_doc(|doc| ops::create_system(doc, name));
        self.finish(result)
    }

    pub fn rename_system(&mut self, old_key: &str, new_name: &str) -> Outcome {
        let result = self.with_doc(|doc| ops::rename_system(doc, old_key, new_name));
        self.finish(result)
    }

    pub fn rename_emitter(&mut self, system: &str, old_name: &str, new_name: &str) -> Outcome {
        let result = self.with_doc(|doc| ops::rename_emitter(doc, system, old_name, new_name));
        self.finish(result)
    }

    pub fn delete_emitter(&mut self, system: &str, name: &str) -> Outcome {
        let result = self.with_doc(|doc| ops::delete_emitter(doc, system, name));
        self.finish(result)
    }

    pub fn delete_all_emitters(&mut self, system: &str) -> Outcome {
        let result = self.with_doc(|doc| ops::delete_all_emitters(doc, system));
        self.finish(result)
    }

    pub fn move_emitter(&mut self, from: &str, name: &str, to: &str) -> Outcome {
        let result = self.with_doc(|doc| ops::move_emitter(doc, from, name, to));
        self.finish(result)
    }

    pub fn set_color_param(&mut self, material: &str, param: &str, color: [f32; 4]) -> Outcome {
        let result = self.with_doc(|doc| ops::set_color_param(doc, material, param, color));
        self.finish(result)
    }

    pub fn port_emitter(&mut self, target_system: &str, donor_system: &str, name: &str) -> Outcome {
        let result = self.with_donor(|doc, donor| {
            ops::port_emitter(doc, target_system, donor, donor_system, name)
        });
        self.finish(result)
    }

    pub fn port_all_emitters(
        &mut self,
        target_system: &str,
        donor_system: &str,
        cancel: &CancelFlag,
        progress: impl FnMut(&PortProgress),
    ) -> Outcome {
        let result = self.with_donor(|doc, donor| {
            ops::port_all_emitters(doc, target_system, donor, donor_system, cancel, progress)
        });
        self.finish(result)
    }

    pub fn port_system(&mut self, donor_system: &str) -> Outcome {
        let result = self.with_donor(|doc, donor| ops::port_system(doc, donor, donor_system));
        self.finish(result)
    }

    pub fn add_child_particle(
        &mut self,
        parent: &str,
        child: &str,
        emitter_name: Option<&str>,
        mode: ConditionMode,
    ) -> Outcome {
        let result = self.with_doc(|doc| {
            conditions::add_child_particle(doc, parent, child, emitter_name, mode)
        });
        self.finish(result)
    }

    pub fn add_idle_particle(&mut self, effect: &str, bone: Option<&str>, mode: ConditionMode) -> Outcome {
        let result = self.with_doc(|doc| conditions::add_idle_particle(doc, effect, bone, mode));
        self.finish(result)
    }

    pub fn add_persistent_effect(
        &mut self,
        effect: &str,
        bone: Option<&str>,
        condition: &PersistentCondition,
        mode: ConditionMode,
    ) -> Outcome {
        let result = self.with_doc(|doc| {
            conditions::add_persistent_effect(doc, effect, bone, condition, mode)
        });
        self.finish(result)
    }

    /// Restore the state from before the last committed mutation.
    pub fn undo(&mut self) -> Outcome {
        if self.doc.is_none() {
            return Outcome::rejected(&VfxError::NotLoaded);
        }
        let Some(snapshot) = self.history.pop() else {
            return Outcome::Rejected {
                reason: statics::EN_STATUS_NOTHING_TO_UNDO.to_string(),
            };
        };
        self.doc = Some(snapshot.document);
        self.selected = snapshot.selected_system;
        self.version += 1;
        self.debounce.touch(Instant::now());

        tracing::info!(version = self.version, undone = %snapshot.description, "undo");
        Outcome::Applied {
            description: format!("Undid: {}", snapshot.description),
            warnings: Vec::new(),
        }
    }

    fn save_target(&self, path: Option<&Path>) -> Result<PathBuf> {
        let doc = self.doc.as_ref().ok_or(VfxError::NotLoaded)?;
        path.map(Path::to_path_buf)
            .or_else(|| doc.source_path.clone())
            .ok_or_else(|| VfxError::InvalidInput("no path to save to".to_string()))
    }

    /// Write `text` to `target`; for `.bin` targets the text dump is written next to it
    /// and compiled.
    fn write_document(&self, target: &Path, text: &str) -> Result<()> {
        if !is_bin(target) {
            return self.fs.write_text(target, text);
        }
        let text_path = target.with_extension(statics::TEXT_EXTENSION);
        self.fs.write_text(&text_path, text)?;
        self.compiler()?.text_to_bin(&text_path, target)
    }

    /// Save now, to `path` or to the file the document was loaded from. On failure the
    /// document and its dirty state are left as they were.
    pub fn save(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let target = self.save_target(path)?;
        let text = self.doc.as_ref().map(|d| d.text.clone()).unwrap_or_default();

        if let Err(e) = self.write_document(&target, &text) {
            tracing::warn!(path = %target.display(), error = %e, "save failed");
            return Err(e);
        }
        self.saved_version = self.version;
        self.debounce.clear();
        tracing::info!(path = %target.display(), version = self.version, "saved");
        Ok(target)
    }

    /// True once the document is dirty and the idle delay has passed.
    pub fn autosave_due(&self, now: Instant) -> bool {
        self.is_dirty() && self.debounce.is_due(now)
    }

    /// Capture the current text and version for a deferred save.
    pub fn begin_background_save(&self) -> Result<SaveTicket> {
        let target = self.save_target(None)?;
        let doc = self.doc.as_ref().ok_or(VfxError::NotLoaded)?;
        Ok(SaveTicket {
            version: self.version,
            text: doc.text.clone(),
            path: target,
        })
    }

    /// Write a ticket's text only if nothing was committed since it was taken.
    pub fn finish_background_save(&mut self, ticket: SaveTicket) -> Result<BackgroundSave> {
        if ticket.version != self.version {
            tracing::debug!(ticket = ticket.version, live = self.version, "background save superseded");
            return Ok(BackgroundSave::Superseded);
        }
        if let Err(e) = self.write_document(&ticket.path, &ticket.text) {
            tracing::warn!(path = %ticket.path.display(), error = %e, "background save failed");
            return Err(e);
        }
        self.saved_version = ticket.version;
        self.debounce.clear();
        tracing::info!(path = %ticket.path.display(), version = ticket.version, "background save written");
        Ok(BackgroundSave::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_is_due_only_after_the_delay() {
        let start = Instant::now();
        let mut debounce = SaveDebounce::new(Duration::from_millis(500));
        assert!(!debounce.is_due(start));
        debounce.touch(start);
        assert!(!debounce.is_due(start + Duration::from_millis(499)));
        assert!(debounce.is_due(start + Duration::from_millis(500)));
        debounce.touch(start + Duration::from_millis(400));
        assert!(!debounce.is_due(start + Duration::from_millis(800)));
        debounce.clear();
        assert!(!debounce.is_due(start + Duration::from_secs(10)));
    }

    #[test]
    fn mutations_before_load_report_not_loaded() {
        let mut session = EditSession::new(EditorConfig::default());
        let outcome = session.create_system("Fx_A");
        assert_eq!(
            outcome,
            Outcome::Rejected {
                reason: statics::EN_STATUS_NOT_LOADED.to_string()
            }
        );
        assert_eq!(session.undo().status(), statics::EN_STATUS_NOT_LOADED);
        assert!(matches!(session.save(None), Err(VfxError::NotLoaded)));
        assert!(!session.is_dirty());
    }

    #[test]
    fn describe_failure_adds_backup_hint_for_blocking_errors() {
        let err = VfxError::ExternalTool {
            tool: "ritobin".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "bad token".to_string(),
        };
        assert!(describe_failure(&err).ends_with(statics::EN_STATUS_BACKUP_HINT));
        assert_eq!(describe_failure(&VfxError::EmptyName), "name is empty");
    }
}
