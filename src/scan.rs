//! Turn command-line paths into uploads.
//!
//! Files are taken as given; directories are walked recursively with
//! `walkdir`, skipping anything matched by the exclude globs. The declared
//! type of each upload is derived from its extension, with
//! [`MIME_UNKNOWN`] for anything unrecognized so the pipeline reports it as
//! unsupported instead of guessing.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::models::{FileType, UploadedFile, MIME_UNKNOWN};

pub const DEFAULT_EXCLUDES: [&str; 3] = ["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Declared MIME type for a path, from its extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(FileType::from_extension)
        .map(|ft| ft.mime())
        .unwrap_or(MIME_UNKNOWN)
}

/// List the files named by `paths`, in argument order; each directory's
/// files are sorted by relative path.
pub fn collect_paths(paths: &[PathBuf], excludes: &[String]) -> Result<Vec<PathBuf>> {
    let mut patterns: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    patterns.extend(excludes.iter().cloned());
    let exclude_set = build_globset(&patterns)?;

    let mut files = Vec::new();
    for root in paths {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        if !root.is_dir() {
            bail!("Path does not exist: {}", root.display());
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();
            if exclude_set.is_match(&rel_str) {
                continue;
            }
            found.push((rel_str, path.to_path_buf()));
        }

        // Sort for deterministic ordering
        found.sort_by(|a, b| a.0.cmp(&b.0));
        files.extend(found.into_iter().map(|(_, p)| p));
    }

    Ok(files)
}

/// Read each file into an [`UploadedFile`] named by its basename.
pub fn read_uploads(files: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    files
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            Ok(UploadedFile::new(name, mime_for_path(path), bytes))
        })
        .collect()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MIME_JSON, MIME_MARKDOWN, MIME_PDF, MIME_TEXT};
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a.pdf")), MIME_PDF);
        assert_eq!(mime_for_path(Path::new("a.TXT")), MIME_TEXT);
        assert_eq!(mime_for_path(Path::new("dir/readme.md")), MIME_MARKDOWN);
        assert_eq!(mime_for_path(Path::new("data.json")), MIME_JSON);
        assert_eq!(mime_for_path(Path::new("photo.png")), MIME_UNKNOWN);
        assert_eq!(mime_for_path(Path::new("Makefile")), MIME_UNKNOWN);
    }

    #[test]
    fn test_walks_directories_sorted_with_excludes() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.md", "b");
        touch(tmp.path(), "a.txt", "a");
        touch(tmp.path(), "sub/c.json", "{}");
        touch(tmp.path(), ".git/HEAD", "ref");
        touch(tmp.path(), "drafts/skip.txt", "x");

        let files = collect_paths(&[tmp.path().to_path_buf()], &["drafts/**".to_string()]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.md", "sub/c.json"]);
    }

    #[test]
    fn test_explicit_file_and_missing_path() {
        let tmp = TempDir::new().unwrap();
        let file = touch(tmp.path(), "notes.txt", "n");
        assert_eq!(collect_paths(&[file.clone()], &[]).unwrap(), vec![file]);

        let err = collect_paths(&[tmp.path().join("nope")], &[]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_read_uploads_uses_basename_and_mime() {
        let tmp = TempDir::new().unwrap();
        let file = touch(tmp.path(), "sub/guide.md", "# Guide");
        let uploads = read_uploads(&[file]).unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].name, "guide.md");
        assert_eq!(uploads[0].content_type, MIME_MARKDOWN);
        assert_eq!(uploads[0].bytes, b"# Guide");
    }
}
