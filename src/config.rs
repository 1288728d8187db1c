use crate::statics;
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Editor settings, read from a JSON5 file. Every key is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// The bin <-> text converter. Required only for opening or saving `.bin` files.
    pub compiler_path: Option<PathBuf>,
    pub history_limit: usize,
    pub save_debounce_ms: u64,
    pub copy_assets_on_port: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            compiler_path: None,
            history_limit: statics::DEFAULT_HISTORY_LIMIT,
            save_debounce_ms: statics::DEFAULT_SAVE_DEBOUNCE_MS,
            copy_assets_on_port: true,
        }
    }
}

impl EditorConfig {
    pub fn from_json5(text: &str) -> anyhow::Result<Self> {
        let mut config: EditorConfig = json5::from_str(text).context("parsing editor config")?;
        config.history_limit = config.history_limit.clamp(1, statics::MAX_HISTORY_LIMIT);
        Ok(config)
    }

    pub fn load_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
        Self::from_json5(&text).with_context(|| format!("loading config {path:?}"))
    }
}
