use std::fs;
use std::path::Path;
use std::path::PathBuf;

use crate::patterns::has_allowed_extension;
use crate::patterns::matches_deny_pattern;

pub const MAX_FILES_PER_REQUEST: usize = 10;
pub const MAX_FILE_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    EscapesWorkingDirectory,
    DisallowedExtension,
    SensitivePath(&'static str),
    TooLarge { bytes: u64 },
    NotFound,
    TooManyFiles,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::EscapesWorkingDirectory => {
                write!(f, "path escapes the working directory")
            }
            RejectReason::DisallowedExtension => write!(f, "extension not in allow-list"),
            RejectReason::SensitivePath(pattern) => {
                write!(f, "path matches sensitive pattern '{pattern}'")
            }
            RejectReason::TooLarge { bytes } => write!(f, "file is {bytes} bytes, exceeds 1MB cap"),
            RejectReason::NotFound => write!(f, "file not found"),
            RejectReason::TooManyFiles => write!(f, "more than {MAX_FILES_PER_REQUEST} files in one request"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub content: String,
}

/// Validate that `candidate` resolves inside `working_dir` with no `..`
/// escape, following symlinks via canonicalization (spec §4.9).
fn validate_containment(working_dir: &Path, candidate: &Path) -> Result<PathBuf, RejectReason> {
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        working_dir.join(candidate)
    };

    let canonical_root = fs::canonicalize(working_dir).map_err(|_| RejectReason::NotFound)?;
    let canonical = fs::canonicalize(&joined).map_err(|_| RejectReason::NotFound)?;

    if canonical.starts_with(&canonical_root) {
        Ok(canonical)
    } else {
        Err(RejectReason::EscapesWorkingDirectory)
    }
}

/// Resolve a single `@path` mention into inlined content, or a rejection
/// reason. Does not enforce the per-request file count; callers expanding
/// multiple mentions should stop at `MAX_FILES_PER_REQUEST`.
pub fn resolve_mention(working_dir: &Path, mention: &str) -> Result<ResolvedFile, RejectReason> {
    let candidate = Path::new(mention);

    if let Some(pattern) = matches_deny_pattern(candidate) {
        return Err(RejectReason::SensitivePath(pattern));
    }

    if !has_allowed_extension(candidate) {
        return Err(RejectReason::DisallowedExtension);
    }

    let resolved = validate_containment(working_dir, candidate)?;

    if let Some(pattern) = matches_deny_pattern(&resolved) {
        return Err(RejectReason::SensitivePath(pattern));
    }

    let meta = fs::metadata(&resolved).map_err(|_| RejectReason::NotFound)?;
    if meta.len() > MAX_FILE_BYTES {
        return Err(RejectReason::TooLarge { bytes: meta.len() });
    }

    let content = fs::read_to_string(&resolved).map_err(|_| RejectReason::NotFound)?;
    Ok(ResolvedFile {
        path: resolved,
        content,
    })
}

/// Expand every `@path` mention found in `text`, replacing rejected
/// mentions with `@path (reason)` in place and appending accepted file
/// bodies. Caps total expansions at `MAX_FILES_PER_REQUEST`; mentions
/// beyond the cap are left as rejected with `TooManyFiles`.
pub fn expand_mentions(working_dir: &Path, text: &str) -> (String, Vec<ResolvedFile>) {
    let mut rewritten = String::new();
    let mut resolved = Vec::new();
    let mut count = 0usize;

    for token in text.split_whitespace() {
        if let Some(mention) = token.strip_prefix('@') {
            if !rewritten.is_empty() {
                rewritten.push(' ');
            }
            if count >= MAX_FILES_PER_REQUEST {
                rewritten.push_str(&format!("@{mention} ({})", RejectReason::TooManyFiles));
                continue;
            }
            match resolve_mention(working_dir, mention) {
                Ok(file) => {
                    rewritten.push_str(token);
                    resolved.push(file);
                    count += 1;
                }
                Err(reason) => {
                    rewritten.push_str(&format!("@{mention} ({reason})"));
                }
            }
        } else {
            if !rewritten.is_empty() {
                rewritten.push(' ');
            }
            rewritten.push_str(token);
        }
    }

    (rewritten, resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn resolves_file_within_working_dir() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("notes.md");
        File::create(&file_path).unwrap().write_all(b"hello").unwrap();

        let result = resolve_mention(dir.path(), "notes.md").unwrap();
        assert_eq!(result.content, "hello");
    }

    #[test]
    fn rejects_path_escape() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let secret = outside.path().join("secret.md");
        File::create(&secret).unwrap().write_all(b"x").unwrap();

        let mention = format!("../{}/secret.md", outside.path().file_name().unwrap().to_string_lossy());
        let err = resolve_mention(dir.path(), &mention).unwrap_err();
        assert_eq!(err, RejectReason::EscapesWorkingDirectory);
    }

    #[test]
    fn rejects_disallowed_extension() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("image.png")).unwrap();
        let err = resolve_mention(dir.path(), "image.png").unwrap_err();
        assert_eq!(err, RejectReason::DisallowedExtension);
    }

    #[test]
    fn rejects_sensitive_name() {
        let dir = tempdir().unwrap();
        let err = resolve_mention(dir.path(), ".env").unwrap_err();
        assert!(matches!(err, RejectReason::SensitivePath(_)) || err == RejectReason::DisallowedExtension);
    }

    #[test]
    fn expand_mentions_rewrites_rejected_with_reason() {
        let dir = tempdir().unwrap();
        let (rewritten, resolved) = expand_mentions(dir.path(), "see @missing.md for detail");
        assert!(rewritten.contains("@missing.md ("));
        assert!(resolved.is_empty());
    }
}
