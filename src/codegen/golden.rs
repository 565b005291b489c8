//! Writing artifacts to disk and comparing them against golden outputs.

use super::GeneratedArtifact;
use crate::error::GenerationError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of generated and golden files.
pub const ARTIFACT_EXTENSION: &str = "rs";

/// Write every artifact under `dir`, skipping files whose content is unchanged.
///
/// Returns the paths actually written.
pub fn write_dir(
    dir: &Path,
    artifacts: &[GeneratedArtifact],
) -> Result<Vec<PathBuf>, GenerationError> {
    let mut written = Vec::new();
    for artifact in artifacts {
        let path = artifact_path(dir, &artifact.file_name);
        if fs::read(&path).is_ok_and(|existing| existing == artifact.content.as_bytes()) {
            tracing::debug!(path = %path.display(), "artifact unchanged");
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &artifact.content)?;
        tracing::info!(module = %artifact.module, path = %path.display(), "wrote artifact");
        written.push(path);
    }
    Ok(written)
}

/// A generated file that differs from its golden counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub file_name: String,
    /// Byte offset of the first difference.
    pub offset: usize,
    pub expected_len: usize,
    pub actual_len: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GoldenReport {
    pub matched: usize,
    pub mismatches: Vec<Mismatch>,
    /// Generated files with no golden counterpart.
    pub missing: Vec<String>,
    /// Golden files nothing was generated for.
    pub unexpected: Vec<String>,
}

impl GoldenReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty() && self.missing.is_empty() && self.unexpected.is_empty()
    }
}

impl fmt::Display for GoldenReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} matched", self.matched)?;
        for m in &self.mismatches {
            writeln!(
                f,
                "{}: differs at byte {} (golden {} bytes, generated {} bytes)",
                m.file_name, m.offset, m.expected_len, m.actual_len
            )?;
        }
        for name in &self.missing {
            writeln!(f, "{}: no golden file", name)?;
        }
        for name in &self.unexpected {
            writeln!(f, "{}: golden file without a module", name)?;
        }
        Ok(())
    }
}

/// Compare artifacts byte for byte against the golden files under `dir`.
pub fn compare_dir(
    dir: &Path,
    artifacts: &[GeneratedArtifact],
) -> Result<GoldenReport, GenerationError> {
    let mut report = GoldenReport::default();
    let mut expected_files = BTreeSet::new();

    for artifact in artifacts {
        expected_files.insert(artifact.file_name.clone());
        let path = artifact_path(dir, &artifact.file_name);
        let golden = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                report.missing.push(artifact.file_name.clone());
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        let generated = artifact.content.as_bytes();
        match first_difference(&golden, generated) {
            None => report.matched += 1,
            Some(offset) => report.mismatches.push(Mismatch {
                file_name: artifact.file_name.clone(),
                offset,
                expected_len: golden.len(),
                actual_len: generated.len(),
            }),
        }
    }

    if dir.is_dir() {
        let mut on_disk = Vec::new();
        collect_files(dir, dir, &mut on_disk)?;
        report.unexpected = on_disk
            .into_iter()
            .filter(|name| !expected_files.contains(name))
            .collect();
    }

    tracing::debug!(
        matched = report.matched,
        mismatched = report.mismatches.len(),
        missing = report.missing.len(),
        unexpected = report.unexpected.len(),
        "compared golden files"
    );
    Ok(report)
}

/// Offset of the first differing byte, or `None` when the slices are equal.
pub fn first_difference(expected: &[u8], actual: &[u8]) -> Option<usize> {
    match expected.iter().zip(actual).position(|(a, b)| a != b) {
        Some(offset) => Some(offset),
        None if expected.len() != actual.len() => Some(expected.len().min(actual.len())),
        None => None,
    }
}

fn artifact_path(dir: &Path, file_name: &str) -> PathBuf {
    file_name
        .split('/')
        .fold(dir.to_path_buf(), |path, part| path.join(part))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), GenerationError> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if path.extension().is_some_and(|e| e == ARTIFACT_EXTENSION) {
            if let Ok(relative) = path.strip_prefix(root) {
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(name);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::content_hash;
    use pretty_assertions::assert_eq;

    fn artifact(file_name: &str, content: &str) -> GeneratedArtifact {
        GeneratedArtifact {
            module: file_name.trim_end_matches(".rs").to_string(),
            identifier: file_name.trim_end_matches(".rs").to_string(),
            file_name: file_name.to_string(),
            content: content.to_string(),
            hash: content_hash(content),
        }
    }

    #[test]
    fn test_first_difference() {
        assert_eq!(first_difference(b"abc", b"abc"), None);
        assert_eq!(first_difference(b"abc", b"abd"), Some(2));
        assert_eq!(first_difference(b"abc", b"ab"), Some(2));
        assert_eq!(first_difference(b"", b"x"), Some(0));
    }

    #[test]
    fn test_write_then_compare() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = vec![
            artifact("pets/by_owner.rs", "pub const SQL: &str = \"x\";\n"),
            artifact("owners.rs", "pub const SQL: &str = \"y\";\n"),
        ];
        let written = write_dir(dir.path(), &artifacts).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("pets").join("by_owner.rs").is_file());

        // unchanged content is not rewritten
        assert!(write_dir(dir.path(), &artifacts).unwrap().is_empty());

        let report = compare_dir(dir.path(), &artifacts).unwrap();
        assert!(report.is_clean(), "{}", report);
        assert_eq!(report.matched, 2);
    }

    #[test]
    fn test_compare_reports_differences() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("owners.rs"), "pub const SQL: &str = \"z\";\n").unwrap();
        fs::write(dir.path().join("stale.rs"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let artifacts = vec![
            artifact("owners.rs", "pub const SQL: &str = \"y\";\n"),
            artifact("pets.rs", ""),
        ];
        let report = compare_dir(dir.path(), &artifacts).unwrap();
        assert_eq!(
            report.mismatches,
            vec![Mismatch {
                file_name: "owners.rs".into(),
                offset: 23,
                expected_len: 27,
                actual_len: 27,
            }]
        );
        assert_eq!(report.missing, vec!["pets.rs"]);
        assert_eq!(report.unexpected, vec!["stale.rs"]);
        assert!(!report.is_clean());
        assert!(report.to_string().contains("owners.rs: differs at byte 23"));
    }

    #[test]
    fn test_compare_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let report = compare_dir(&dir.path().join("absent"), &[artifact("a.rs", "x")]).unwrap();
        assert_eq!(report.missing, vec!["a.rs"]);
        assert!(report.unexpected.is_empty());
    }
}
