//! Archive packager: rendered images + `manifest.csv` in one zip.

use anyhow::{Context, Result};
use log::debug;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::utils::config::{CONTENT_FILENAME_MAX_LEN, PackagePaths};
use crate::utils::tempfiles::write_atomic;
use crate::{FilenamePolicy, ResultMap};

/// Entry name for item `index` (0-based).
///
/// Sequential: `qr-001.png`. Content-derived: payload with every char outside
/// `[A-Za-z0-9_-]` replaced by `_`, cut to 40 chars, trailing `_` removed;
/// `qr-{index+1}.png` when nothing survives.
pub fn generate_filename(index: usize, content: &str, policy: FilenamePolicy) -> String {
    match policy {
        FilenamePolicy::Sequential => format!("qr-{:03}.png", index + 1),
        FilenamePolicy::ContentDerived => {
            let sanitized: String = content
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                        c
                    } else {
                        '_'
                    }
                })
                .take(CONTENT_FILENAME_MAX_LEN)
                .collect();
            let sanitized = sanitized.trim_end_matches('_');
            if sanitized.is_empty() {
                format!("qr-{}.png", index + 1)
            } else {
                format!("qr-{sanitized}.png")
            }
        }
    }
}

/// `(filename, payload)` per packaged index, ascending. Colliding names get `-{index+1}` before the extension.
pub fn manifest_rows(results: &ResultMap, items: &[String], policy: FilenamePolicy) -> Vec<(String, String)> {
    let mut taken: HashSet<String> = HashSet::new();
    taken.insert(PackagePaths::get().manifest_filename().to_string());
    results
        .keys()
        .map(|&index| {
            let content = items.get(index).cloned().unwrap_or_default();
            let mut name = generate_filename(index, &content, policy);
            while taken.contains(&name) {
                let stem = name.trim_end_matches(".png");
                name = format!("{}-{}.png", stem, index + 1);
            }
            taken.insert(name.clone());
            (name, content)
        })
        .collect()
}

fn manifest_csv(rows: &[(String, String)]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["filename", "content"])
        .context("write manifest header")?;
    for (name, content) in rows {
        wtr.write_record([name, content])
            .with_context(|| format!("write manifest row for {name}"))?;
    }
    wtr.into_inner()
        .map_err(|e| anyhow::anyhow!("flush manifest: {}", e.error()))
}

/// Build the zip in memory. Missing indices are skipped; an empty result map yields a manifest-only archive.
pub fn build_archive(results: &ResultMap, items: &[String], policy: FilenamePolicy) -> Result<Vec<u8>> {
    let rows = manifest_rows(results, items, policy);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    // PNG is already compressed.
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for ((name, _), bytes) in rows.iter().zip(results.values()) {
        zip.start_file(name.as_str(), stored)
            .with_context(|| format!("start archive entry {name}"))?;
        zip.write_all(bytes)
            .with_context(|| format!("write archive entry {name}"))?;
    }

    let manifest_name = PackagePaths::get().manifest_filename();
    zip.start_file(manifest_name, deflated)
        .context("start manifest entry")?;
    zip.write_all(&manifest_csv(&rows)?)
        .context("write manifest entry")?;

    let cursor = zip.finish().context("finalize archive")?;
    debug!("Archive built: {} images", rows.len());
    Ok(cursor.into_inner())
}

/// Build the archive and write it to `out_path` through a temp file + rename.
pub fn write_archive(
    out_path: &Path,
    results: &ResultMap,
    items: &[String],
    policy: FilenamePolicy,
) -> Result<usize> {
    let bytes = build_archive(results, items, policy)?;
    write_atomic(out_path, &bytes)?;
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_names() {
        assert_eq!(generate_filename(0, "x", FilenamePolicy::Sequential), "qr-001.png");
        assert_eq!(generate_filename(41, "x", FilenamePolicy::Sequential), "qr-042.png");
        assert_eq!(generate_filename(999, "x", FilenamePolicy::Sequential), "qr-1000.png");
    }

    #[test]
    fn test_content_names() {
        assert_eq!(
            generate_filename(0, "https://example.com", FilenamePolicy::ContentDerived),
            "qr-https___example_com.png"
        );
        assert_eq!(
            generate_filename(4, "!!!", FilenamePolicy::ContentDerived),
            "qr-5.png"
        );
        let long = "a".repeat(60);
        assert_eq!(
            generate_filename(0, &long, FilenamePolicy::ContentDerived),
            format!("qr-{}.png", "a".repeat(40))
        );
        assert_eq!(
            generate_filename(0, "hello world?", FilenamePolicy::ContentDerived),
            "qr-hello_world.png"
        );
    }

    #[test]
    fn test_duplicate_content_names_disambiguated() {
        let items: Vec<String> = vec!["same".into(), "same".into(), "other".into()];
        let results: ResultMap = (0..3).map(|i| (i, vec![i as u8])).collect();
        let rows = manifest_rows(&results, &items, FilenamePolicy::ContentDerived);
        let names: Vec<&str> = rows.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["qr-same.png", "qr-same-2.png", "qr-other.png"]);
    }

    #[test]
    fn test_manifest_quotes_commas() {
        let rows = vec![("qr-001.png".to_string(), "a,b \"c\"".to_string())];
        let csv = String::from_utf8(manifest_csv(&rows).unwrap()).unwrap();
        assert_eq!(csv, "filename,content\nqr-001.png,\"a,b \"\"c\"\"\"\n");
    }
}
