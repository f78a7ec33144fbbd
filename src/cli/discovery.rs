//! Spec file discovery
//!
//! Files named explicitly on the command line are always kept, in the order given, even if they don't exist (the
//! runner then reports them as missing). Directories are searched recursively for `*.spec.pf` and `test_*.pf` files,
//! skipping hidden directories, `target` and `node_modules`; a directory's files are sorted among themselves and
//! take the directory's place in the list. A directory without any spec file is an error.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::{CliError, CliResult};

/// Default search path when no spec paths are given
pub const DEFAULT_SPEC_DIR: &str = "test";

/// Whether a file name looks like a spec file.
pub fn is_spec_file_name(name: &str) -> bool {
    name.ends_with(".spec.pf") || (name.starts_with("test_") && name.ends_with(".pf"))
}

/// Expand command-line paths into spec files, keeping the first occurrence of each.
pub fn discover_spec_files(paths: &[PathBuf]) -> CliResult<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for path in paths {
        let found = if path.is_dir() {
            let mut found = Vec::new();
            collect_dir(path, &mut found);
            if found.is_empty() {
                return Err(CliError::failure(format!(
                    "Error: No test files found: \"{}\"",
                    path.display()
                )));
            }
            found.sort();
            found
        } else {
            vec![path.clone()]
        };
        files.extend(found.into_iter().filter(|file| seen.insert(file.clone())));
    }
    Ok(files)
}

fn collect_dir(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(dir = %dir.display(), error = %err, "cannot read directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let entry_path = entry.path();
        let name = entry_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if entry_path.is_dir() {
            if !name.starts_with('.') && name != "target" && name != "node_modules" {
                collect_dir(&entry_path, files);
            }
        } else if is_spec_file_name(name) {
            files.push(entry_path);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::ExitCode;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("preflight-discovery-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_spec_file_names() {
        assert!(is_spec_file_name("async.spec.pf"));
        assert!(is_spec_file_name("test_async.pf"));
        assert!(!is_spec_file_name("async-setup.pf"));
        assert!(!is_spec_file_name("test_notes.txt"));
    }

    #[test]
    fn test_directory_search() {
        let dir = scratch_dir("search");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::create_dir_all(dir.join(".hidden")).unwrap();
        fs::create_dir_all(dir.join("target")).unwrap();
        fs::write(dir.join("b.spec.pf"), "").unwrap();
        fs::write(dir.join("helper.pf"), "").unwrap();
        fs::write(dir.join("nested/test_a.pf"), "").unwrap();
        fs::write(dir.join(".hidden/c.spec.pf"), "").unwrap();
        fs::write(dir.join("target/d.spec.pf"), "").unwrap();

        let files = discover_spec_files(std::slice::from_ref(&dir)).unwrap();
        assert_eq!(files, vec![dir.join("b.spec.pf"), dir.join("nested/test_a.pf")]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_explicit_files_kept_as_given() {
        let files = discover_spec_files(&[
            PathBuf::from("missing/z.spec.pf"),
            PathBuf::from("missing/a.spec.pf"),
            PathBuf::from("missing/z.spec.pf"),
        ])
        .unwrap();
        assert_eq!(files, vec![PathBuf::from("missing/z.spec.pf"), PathBuf::from("missing/a.spec.pf")]);
    }

    #[test]
    fn test_directory_files_take_directory_position() {
        let dir = scratch_dir("position");
        fs::write(dir.join("b.spec.pf"), "").unwrap();
        fs::write(dir.join("a.spec.pf"), "").unwrap();

        let files = discover_spec_files(&[PathBuf::from("first.spec.pf"), dir.clone(), dir.join("b.spec.pf")]).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("first.spec.pf"), dir.join("a.spec.pf"), dir.join("b.spec.pf")]
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_directory_without_specs_is_an_error() {
        let dir = scratch_dir("empty");
        fs::write(dir.join("helper.pf"), "").unwrap();

        let err = discover_spec_files(std::slice::from_ref(&dir)).unwrap_err();
        assert_eq!(err.exit_code, ExitCode::FAILURE);
        assert!(err.message.contains("No test files found"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
