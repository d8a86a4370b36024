use directories::BaseDirs;
use std::path::{Path, PathBuf};

pub fn short_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Maps a working-copy name onto the character set hosted repository names accept.
pub fn proposed_repo_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => ch,
            _ => '-',
        })
        .collect();
    while sanitized.ends_with('.') {
        sanitized.pop();
    }
    let trimmed = sanitized.trim_start_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Expands a leading `~` against the current user's home directory.
pub fn expand_home(entry: &str) -> PathBuf {
    let home = || BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    if entry == "~" {
        if let Some(home) = home() {
            return home;
        }
    } else if let Some(rest) = entry.strip_prefix("~/")
        && let Some(home) = home()
    {
        return home.join(rest);
    }
    PathBuf::from(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_ignores_trailing_separator() {
        assert_eq!(short_name(Path::new("/srv/repos/notes/")), "notes");
    }

    #[test]
    fn proposed_name_replaces_disallowed_chars() {
        assert_eq!(proposed_repo_name("my notes (old)"), "my-notes--old-");
        assert_eq!(proposed_repo_name("tools.rs"), "tools.rs");
        assert_eq!(proposed_repo_name(".hidden."), "hidden");
        assert_eq!(proposed_repo_name("..."), "_");
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/opt/work"), PathBuf::from("/opt/work"));
        if let Some(dirs) = BaseDirs::new() {
            assert_eq!(expand_home("~/code"), dirs.home_dir().join("code"));
        }
    }
}
