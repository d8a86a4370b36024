use crate::error::StartupError;
use crate::model::RepositoryRef;
use crate::paths::expand_home;
use anyhow::Context;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const COMMENT_MARKER: char = '#';

/// Reads the candidate list and returns the working copies it names, in list order.
pub fn discover(list_path: &Path) -> anyhow::Result<Vec<RepositoryRef>> {
    if !list_path.exists() {
        return Err(StartupError::MissingCandidates(list_path.to_path_buf()).into());
    }
    let contents = fs::read_to_string(list_path)
        .with_context(|| format!("read candidate list {}", list_path.display()))?;
    let repos = filter_working_copies(parse_candidates(&contents));
    info!(
        list = %list_path.display(),
        repos = repos.len(),
        "discovered working copies"
    );
    Ok(repos)
}

pub fn parse_candidates(contents: &str) -> Vec<PathBuf> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(COMMENT_MARKER))
        .map(expand_home)
        .collect()
}

pub fn filter_working_copies(candidates: Vec<PathBuf>) -> Vec<RepositoryRef> {
    let mut seen = HashSet::new();
    let mut repos = Vec::new();
    for path in candidates {
        if !is_working_copy(&path) {
            debug!(path = %path.display(), "candidate is not a working copy; skipping");
            continue;
        }
        if seen.insert(path.clone()) {
            repos.push(RepositoryRef::new(path));
        }
    }
    repos
}

pub fn is_working_copy(path: &Path) -> bool {
    path.is_dir() && path.join(".git").is_dir()
}

/// Rewrites the candidate list without entries whose path no longer exists.
/// Comments and blank lines are kept. Returns the number of dropped entries.
pub fn prune_candidate_list(list_path: &Path) -> anyhow::Result<usize> {
    let contents = fs::read_to_string(list_path)
        .with_context(|| format!("read candidate list {}", list_path.display()))?;
    let mut kept = Vec::new();
    let mut dropped = 0;
    for line in contents.lines() {
        let entry = line.trim();
        if entry.is_empty() || entry.starts_with(COMMENT_MARKER) || expand_home(entry).exists() {
            kept.push(line);
        } else {
            debug!(entry, "dropping stale candidate");
            dropped += 1;
        }
    }
    if dropped > 0 {
        let mut data = kept.join("\n");
        data.push('\n');
        fs::write(list_path, data)
            .with_context(|| format!("rewrite candidate list {}", list_path.display()))?;
        info!(dropped, "pruned candidate list");
    }
    Ok(dropped)
}
