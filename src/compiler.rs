//! The external bin <-> text converter. Only its invocation contract lives here: run
//! `<program> <input> <output>`, succeed when it exits 0 and the output exists.

use crate::error::{Result, VfxError};
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait Compiler {
    /// Convert a binary property file into its text form at `text`.
    fn bin_to_text(&self, bin: &Path, text: &Path) -> Result<()>;
    /// Compile a text dump back into a binary property file at `bin`.
    fn text_to_bin(&self, text: &Path, bin: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ExternalCompiler {
    program: PathBuf,
}

impl ExternalCompiler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run(&self, input: &Path, output: &Path) -> Result<()> {
        let tool = self.program.display().to_string();
        tracing::info!(tool = %tool, input = %input.display(), output = %output.display(), "running compiler");

        let out = Command::new(&self.program)
            .arg(input)
            .arg(output)
            .output()
            .map_err(|e| VfxError::ExternalTool {
                tool: tool.clone(),
                status: "failed to start".to_string(),
                stderr: e.to_string(),
            })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
            tracing::warn!(tool = %tool, status = %out.status, "compiler exited with an error");
            return Err(VfxError::ExternalTool {
                tool,
                status: out.status.to_string(),
                stderr,
            });
        }
        if !output.exists() {
            return Err(VfxError::ExternalTool {
                tool,
                status: out.status.to_string(),
                stderr: format!("no output written to {}", output.display()),
            });
        }
        Ok(())
    }
}

impl Compiler for ExternalCompiler {
    fn bin_to_text(&self, bin: &Path, text: &Path) -> Result<()> {
        self.run(bin, text)
    }

    fn text_to_bin(&self, text: &Path, bin: &Path) -> Result<()> {
        self.run(text, bin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_an_external_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = ExternalCompiler::new(dir.path().join("no-such-compiler"));
        let err = compiler
            .bin_to_text(&dir.path().join("in.bin"), &dir.path().join("out.py"))
            .unwrap_err();
        assert!(matches!(err, VfxError::ExternalTool { .. }));
        assert!(err.is_blocking());
    }
}
