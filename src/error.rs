use std::path::PathBuf;

/// Everything an edit, load or save can fail with.
///
/// Operations return these; `EditSession` turns all of them into advisory status text
/// except the blocking ones (`ExternalTool`, `Io`), which it hands back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum VfxError {
    #[error("no file is loaded")]
    NotLoaded,

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("name is empty")]
    EmptyName,

    #[error("{kind} {name:?} already exists{}", .scope.as_ref().map(|s| format!(" in {s}")).unwrap_or_default())]
    Collision {
        kind: &'static str,
        name: String,
        scope: Option<String>,
    },

    #[error("malformed block {key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{tool} failed ({status}): {stderr}")]
    ExternalTool {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("IO error{}: {source}", .path.as_ref().map(|p| format!(" at '{}'", p.display())).unwrap_or_default())]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
}

impl VfxError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        VfxError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn io_with_path(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        VfxError::Io {
            source,
            path: Some(path.into()),
        }
    }

    /// External tool and IO failures abort the surrounding action and must be shown to
    /// the user; everything else is a status message.
    pub fn is_blocking(&self) -> bool {
        matches!(self, VfxError::ExternalTool { .. } | VfxError::Io { .. })
    }
}

impl From<std::io::Error> for VfxError {
    fn from(source: std::io::Error) -> Self {
        VfxError::Io { source, path: None }
    }
}

pub type Result<T> = std::result::Result<T, VfxError>;
