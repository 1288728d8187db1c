//! Core library for VFXBIN, a structural editor for VFX bin text dumps.
//! Parses systems, emitters and materials out of the compiler's text form and applies
//! targeted edits (rename, move, port, delete, effect conditions) that leave every
//! untouched byte of the file as it was, with snapshot undo on top.

pub mod assets;
pub mod compiler;
pub mod conditions;
pub mod config;
pub mod document;
pub mod error;
pub mod history;
pub mod naming;
pub mod ops;
pub mod resource_map;
pub mod scan;
pub mod session;
pub mod splice;
pub mod statics;
pub mod storage;
pub mod tree;
pub mod value;

pub use compiler::{Compiler, ExternalCompiler};
pub use conditions::{ConditionMode, PersistentCondition};
pub use config::EditorConfig;
pub use document::{DeletedEmitter, Document, LineEnding};
pub use error::{Result, VfxError};
pub use ops::{CancelFlag, Edit, PortProgress};
pub use session::{BackgroundSave, EditSession, LoadReport, Outcome, SaveTicket};
pub use storage::{FileSystem, StdFileSystem};
pub use tree::{Emitter, Material, System, VfxTree};
pub use value::EntryKey;
