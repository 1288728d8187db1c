//! Assets referenced from emitter bodies (textures, meshes, ...) and copying them from a
//! donor mod folder into the target one.

use crate::scan;
use crate::statics;
use crate::storage::FileSystem;
use crate::value;
use indexmap::IndexSet;
use std::path::{Path, PathBuf};

/// True for string values that name a game asset: an `assets/` or `data/` path, or
/// anything ending in a known asset extension.
pub fn is_asset_path(s: &str) -> bool {
    if s.len() < 5 {
        return false;
    }
    let starts_with = |prefix: &str| {
        s.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    };
    let prefixed = starts_with("assets/") || starts_with("data/");
    let extension = Path::new(s)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            statics::ASSET_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(e))
        });
    extension || (prefixed && s.contains('.'))
}

/// Every asset path mentioned in `body`, in first-seen order, with `\` normalized to `/`.
pub fn asset_references(body: &str) -> Vec<String> {
    let mut found = IndexSet::new();
    for line in scan::split_lines(body) {
        let Some(field) = scan::parse_field(line) else {
            continue;
        };
        if field.ty != "string" {
            continue;
        }
        let Some(s) = value::unquote(field.value) else {
            continue;
        };
        let s = s.replace('\\', "/");
        if is_asset_path(&s) {
            found.insert(s);
        }
    }
    found.into_iter().collect()
}

/// Folder asset paths are relative to: the parent of the nearest `data` directory above
/// `file`, or the file's own directory when there is none.
pub fn asset_root(file: &Path) -> PathBuf {
    let data_parent = file.ancestors().skip(1).find_map(|dir| {
        let is_data = dir
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.eq_ignore_ascii_case("data"));
        if is_data { dir.parent() } else { None }
    });
    data_parent
        .or_else(|| file.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetReport {
    pub copied: Vec<String>,
    /// Already present in the target.
    pub skipped: Vec<String>,
    /// Not found in the donor.
    pub missing: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl AssetReport {
    /// One line per problem, for surfacing as warnings.
    pub fn warnings(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .missing
            .iter()
            .map(|p| format!("asset missing in donor: {p}"))
            .collect();
        out.extend(
            self.failed
                .iter()
                .map(|(p, why)| format!("asset copy failed for {p}: {why}")),
        );
        out
    }
}

pub struct AssetCopier<'a> {
    fs: &'a dyn FileSystem,
    donor_root: PathBuf,
    target_root: PathBuf,
}

impl<'a> AssetCopier<'a> {
    pub fn new(fs: &'a dyn FileSystem, donor_root: PathBuf, target_root: PathBuf) -> Self {
        Self {
            fs,
            donor_root,
            target_root,
        }
    }

    /// Copy each referenced asset that exists under the donor root and is not already in
    /// the target. Failures are collected, never raised.
    pub fn copy_all(&self, refs: &[String]) -> AssetReport {
        let mut report = AssetReport::default();
        for rel in refs {
            let from = self.donor_root.join(rel);
            let to = self.target_root.join(rel);
            if self.fs.exists(&to) {
                report.skipped.push(rel.clone());
                continue;
            }
            if !self.fs.exists(&from) {
                tracing::warn!(asset = %rel, "referenced asset not found in donor");
                report.missing.push(rel.clone());
                continue;
            }
            match self.fs.copy(&from, &to) {
                Ok(()) => report.copied.push(rel.clone()),
                Err(e) => {
                    tracing::warn!(asset = %rel, error = %e, "asset copy failed");
                    report.failed.push((rel.clone(), e.to_string()));
                }
            }
        }
        tracing::debug!(
            copied = report.copied.len(),
            skipped = report.skipped.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "asset copy finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StdFileSystem;

    #[test]
    fn references_are_string_fields_with_asset_paths() {
        let body = concat!(
            "VfxEmitterDefinitionData {\n",
            "    emitterName: string = \"Glow\"\n",
            "    texture: string = \"ASSETS/Characters/Ahri/Glow.dds\"\n",
            "    particleColorTexture: string = \"ASSETS\\\\Shared\\\\ramp.tex\"\n",
            "    mesh: embed = VfxMeshDefinitionData {\n",
            "        mMeshName: string = \"ASSETS/Characters/Ahri/orb.scb\"\n",
            "    }\n",
            "    texture: string = \"ASSETS/Characters/Ahri/Glow.dds\"\n",
            "    rate: f32 = 1\n",
            "}\n",
        );
        assert_eq!(
            asset_references(body),
            vec![
                "ASSETS/Characters/Ahri/Glow.dds".to_string(),
                "ASSETS/Shared/ramp.tex".to_string(),
                "ASSETS/Characters/Ahri/orb.scb".to_string(),
            ]
        );
    }

    #[test]
    fn asset_root_prefers_parent_of_data_dir() {
        let file = Path::new("/mods/Ahri/data/characters/ahri/skins/skin0.py");
        assert_eq!(asset_root(file), PathBuf::from("/mods/Ahri"));
        let loose = Path::new("/tmp/work/skin0.py");
        assert_eq!(asset_root(loose), PathBuf::from("/tmp/work"));
    }

    #[test]
    fn copier_reports_each_outcome() {
        let donor = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        let fs = StdFileSystem;
        std::fs::create_dir_all(donor.path().join("ASSETS")).unwrap();
        fs.write_bytes(&donor.path().join("ASSETS/a.dds"), b"a").unwrap();
        std::fs::create_dir_all(target.path().join("ASSETS")).unwrap();
        fs.write_bytes(&target.path().join("ASSETS/b.dds"), b"b").unwrap();

        let copier = AssetCopier::new(&fs, donor.path().to_path_buf(), target.path().to_path_buf());
        let refs = vec![
            "ASSETS/a.dds".to_string(),
            "ASSETS/b.dds".to_string(),
            "ASSETS/c.dds".to_string(),
        ];
        let report = copier.copy_all(&refs);
        assert_eq!(report.copied, vec!["ASSETS/a.dds".to_string()]);
        assert_eq!(report.skipped, vec!["ASSETS/b.dds".to_string()]);
        assert_eq!(report.missing, vec!["ASSETS/c.dds".to_string()]);
        assert!(report.failed.is_empty());
        assert_eq!(report.warnings().len(), 1);
        assert!(target.path().join("ASSETS/a.dds").exists());
    }
}
