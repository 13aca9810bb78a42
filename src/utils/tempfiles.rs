use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::config::PackagePaths;

/// Get the temporary path an output file is staged at before the final rename.
pub fn temp_path_for(out_path: &Path) -> PathBuf {
    let name = out_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_else(|| PackagePaths::get().archive_filename());
    out_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!("{name}.tmp"))
}

/// Write `bytes` to `out_path` via a sibling temp file and rename (atomic replace).
/// A stale temp from an earlier interrupted run is removed first.
pub fn write_atomic(out_path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = temp_path_for(out_path);
    if temp_path.exists() {
        fs::remove_file(&temp_path)
            .with_context(|| format!("remove stale temp file at {}", temp_path.display()))?;
    }
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output directory {}", parent.display()))?;
    }
    fs::write(&temp_path, bytes)
        .with_context(|| format!("write temp file {}", temp_path.display()))?;
    rename_temp_to_final(&temp_path, out_path)
}

pub fn rename_temp_to_final(temp_path: &Path, final_path: &Path) -> Result<()> {
    fs::rename(temp_path, final_path).with_context(|| {
        format!(
            "atomic rename temp output to final path ({} -> {})",
            temp_path.display(),
            final_path.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_is_sibling() {
        let p = temp_path_for(Path::new("out/qr-codes.zip"));
        assert_eq!(p, PathBuf::from("out/qr-codes.zip.tmp"));
    }

    #[test]
    fn test_write_atomic_replaces_and_cleans_temp() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("a.zip");
        write_atomic(&out, b"first").unwrap();
        write_atomic(&out, b"second").unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"second");
        assert!(!temp_path_for(&out).exists());
    }
}
