//! Default allow/deny patterns for `@path` file reference expansion
//! (spec §4.9).

use std::sync::OnceLock;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;

/// Extensions considered safe text/code content for inlining.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rs", "py", "js", "ts", "tsx", "jsx", "go", "java", "c", "h", "cpp",
    "hpp", "json", "yaml", "yml", "toml", "csv", "html", "css", "sh", "rb", "php", "sql", "xml",
];

/// Sensitive directory and filename fragments rejected even if the
/// extension is otherwise allowed. Compiled into a `GlobSet` as
/// `*pattern*`, so a match fires anywhere in the path, not just a whole
/// component.
pub const DENY_NAME_PATTERNS: &[&str] = &[
    ".env", ".ssh", "credential", "password", "secret", "id_rsa", ".aws", ".gnupg", ".netrc",
];

pub fn has_allowed_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false)
}

fn deny_glob_set() -> &'static GlobSet {
    static SET: OnceLock<GlobSet> = OnceLock::new();
    SET.get_or_init(|| {
        let mut builder = GlobSetBuilder::new();
        for pattern in DENY_NAME_PATTERNS {
            builder.add(Glob::new(&format!("*{pattern}*")).expect("deny pattern must compile"));
        }
        builder.build().expect("deny glob set must compile")
    })
}

pub fn matches_deny_pattern(path: &std::path::Path) -> Option<&'static str> {
    let path_str = path.to_string_lossy().to_lowercase();
    deny_glob_set()
        .matches(&path_str)
        .first()
        .map(|&i| DENY_NAME_PATTERNS[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn allowed_extension_recognized() {
        assert!(has_allowed_extension(Path::new("notes.md")));
        assert!(!has_allowed_extension(Path::new("photo.png")));
    }

    #[test]
    fn deny_pattern_matches_env_file() {
        assert_eq!(matches_deny_pattern(Path::new("./.env")), Some(".env"));
        assert_eq!(matches_deny_pattern(Path::new("~/.ssh/config")), Some(".ssh"));
        assert_eq!(matches_deny_pattern(Path::new("article.md")), None);
    }
}
