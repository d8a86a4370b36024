use anyhow::Context;
use git2::{
    ErrorCode, IndexAddOption, Oid, Rebase, RebaseOptions, Repository, Signature, StatusOptions,
    build::CheckoutBuilder,
};
use std::path::Path;
use tracing::{debug, info, warn};

pub const ORIGIN: &str = "origin";
pub const PLACEHOLDER_MESSAGE: &str = "Initial commit";
const FALLBACK_AUTHOR: &str = "reposync";

/// How the local branch was brought level with its upstream.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Integration {
    NoUpstream,
    UpToDate,
    FastForwarded,
    Rebased,
    Merged,
    Conflict,
}

/// The metadata directory plus the two files every working copy carries.
pub fn has_valid_metadata(path: &Path) -> bool {
    let git_dir = path.join(".git");
    git_dir.is_dir() && git_dir.join("HEAD").is_file() && git_dir.join("config").is_file()
}

pub fn open_repo(path: &Path) -> anyhow::Result<Repository> {
    Repository::open(path).with_context(|| format!("open repo {}", path.display()))
}

pub fn has_commits(repo: &Repository) -> anyhow::Result<bool> {
    match repo.head() {
        Ok(head) => Ok(head.target().is_some()),
        Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            Ok(false)
        }
        Err(err) => Err(err).context("resolve HEAD"),
    }
}

/// Creates one empty commit on `branch` and points HEAD at it.
pub fn create_placeholder_commit(
    repo: &Repository,
    branch: &str,
    sig: &Signature<'_>,
) -> anyhow::Result<Oid> {
    let tree_id = repo
        .treebuilder(None)
        .and_then(|builder| builder.write())
        .context("write empty tree")?;
    let tree = repo.find_tree(tree_id).context("find empty tree")?;
    let refname = format!("refs/heads/{branch}");
    let oid = repo
        .commit(Some(&refname), sig, sig, PLACEHOLDER_MESSAGE, &tree, &[])
        .context("create placeholder commit")?;
    repo.set_head(&refname).context("point HEAD at initial branch")?;
    info!(branch, commit = %oid, "created placeholder commit");
    Ok(oid)
}

/// Current branch name, or `None` when HEAD is detached.
pub fn current_branch(repo: &Repository) -> anyhow::Result<Option<String>> {
    if repo.head_detached().context("inspect HEAD")? {
        return Ok(None);
    }
    let head = repo.head().context("resolve HEAD")?;
    if !head.is_branch() {
        return Ok(None);
    }
    Ok(head.shorthand().map(|name| name.to_string()))
}

pub fn has_local_changes(repo: &Repository) -> anyhow::Result<bool> {
    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repo.statuses(Some(&mut options)).context("status repo")?;
    Ok(!statuses.is_empty())
}

/// Stages additions, modifications and deletions, then commits them on HEAD.
pub fn stage_and_commit(
    repo: &Repository,
    message: &str,
    sig: &Signature<'_>,
) -> anyhow::Result<Oid> {
    let mut index = repo.index().context("open index")?;
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .context("stage changes")?;
    index
        .update_all(["*"].iter(), None)
        .context("stage removals")?;
    index.write().context("write index")?;
    let tree_id = index.write_tree().context("write tree")?;
    let parent = repo
        .head()
        .and_then(|head| head.peel_to_commit())
        .context("resolve parent commit")?;
    if parent.tree_id() == tree_id {
        anyhow::bail!("nothing staged to commit");
    }
    let tree = repo.find_tree(tree_id).context("find tree")?;
    let oid = repo
        .commit(Some("HEAD"), sig, sig, message, &tree, &[&parent])
        .context("commit changes")?;
    Ok(oid)
}

pub fn origin_url(repo: &Repository) -> Option<String> {
    repo.find_remote(ORIGIN)
        .ok()
        .and_then(|remote| remote.url().map(|url| url.to_string()))
}

/// Points `origin` at `url`, creating the remote when it does not exist yet.
pub fn bind_origin(repo: &Repository, url: &str) -> anyhow::Result<()> {
    match repo.find_remote(ORIGIN) {
        Ok(remote) => {
            let current = remote.url().unwrap_or_default();
            if current != url {
                repo.remote_set_url(ORIGIN, url)
                    .context("update origin remote url")?;
                info!(url, previous = current, "rebound origin");
            }
        }
        Err(_) => {
            repo.remote(ORIGIN, url).context("create origin remote")?;
            info!(url, "added origin");
        }
    }
    Ok(())
}

/// Committer identity: the repository's configured user, else a fixed name with `email`.
pub fn signature(repo: &Repository, email: &str) -> anyhow::Result<Signature<'static>> {
    match repo.signature() {
        Ok(sig) => Ok(sig),
        Err(_) => Signature::now(FALLBACK_AUTHOR, email).context("build signature"),
    }
}

fn upstream_oid(repo: &Repository, branch: &str) -> Option<Oid> {
    repo.refname_to_id(&format!("refs/remotes/{ORIGIN}/{branch}"))
        .ok()
}

/// Replays local commits onto `origin/<branch>`. Any failure aborts the rebase,
/// leaving HEAD and the working tree exactly as they were.
pub fn rebase_onto_upstream(
    repo: &Repository,
    branch: &str,
    sig: &Signature<'_>,
) -> anyhow::Result<Integration> {
    let Some(upstream) = upstream_oid(repo, branch) else {
        debug!(branch, "no upstream branch yet; nothing to rebase onto");
        return Ok(Integration::NoUpstream);
    };
    let head = repo.head().context("resolve HEAD")?;
    let local = head.target().context("HEAD has no target")?;
    let (ahead, behind) = repo
        .graph_ahead_behind(local, upstream)
        .context("compare local and upstream")?;
    if behind == 0 {
        return Ok(Integration::UpToDate);
    }
    if ahead == 0 {
        fast_forward(repo, branch, upstream)?;
        return Ok(Integration::FastForwarded);
    }

    let local_commit = repo
        .reference_to_annotated_commit(&head)
        .context("annotate local branch")?;
    let upstream_commit = repo
        .find_annotated_commit(upstream)
        .context("annotate upstream")?;
    let mut options = RebaseOptions::new();
    options.quiet(true);
    let mut rebase = repo
        .rebase(
            Some(&local_commit),
            Some(&upstream_commit),
            None,
            Some(&mut options),
        )
        .context("start rebase")?;

    match replay(repo, &mut rebase, sig) {
        Ok(()) => {
            rebase.finish(Some(sig)).context("finish rebase")?;
            info!(branch, ahead, behind, "rebased onto upstream");
            Ok(Integration::Rebased)
        }
        Err(err) => {
            warn!(branch, error = %err, "rebase failed; aborting");
            rebase.abort().context("abort rebase")?;
            Ok(Integration::Conflict)
        }
    }
}

fn replay(repo: &Repository, rebase: &mut Rebase<'_>, sig: &Signature<'_>) -> anyhow::Result<()> {
    while let Some(step) = rebase.next() {
        step.context("apply rebase step")?;
        if repo.index().context("open index")?.has_conflicts() {
            anyhow::bail!("rebase step has conflicts");
        }
        match rebase.commit(None, sig, None) {
            Ok(_) => {}
            Err(err) if err.code() == ErrorCode::Applied => {
                debug!("rebase step already applied upstream");
            }
            Err(err) => return Err(err).context("commit rebase step"),
        }
    }
    Ok(())
}

/// Integrates `origin/<branch>` with a merge commit built in memory; the
/// working tree is only touched once the merge is known to be clean.
pub fn merge_upstream(
    repo: &Repository,
    branch: &str,
    sig: &Signature<'_>,
) -> anyhow::Result<Integration> {
    let Some(upstream) = upstream_oid(repo, branch) else {
        return Ok(Integration::NoUpstream);
    };
    let local = repo
        .head()
        .and_then(|head| head.peel_to_commit())
        .context("resolve HEAD commit")?;
    let theirs = repo.find_commit(upstream).context("find upstream commit")?;
    let mut index = repo
        .merge_commits(&local, &theirs, None)
        .context("merge upstream")?;
    if index.has_conflicts() {
        warn!(branch, "merge with upstream conflicts");
        return Ok(Integration::Conflict);
    }
    let tree_id = index.write_tree_to(repo).context("write merge tree")?;
    let tree = repo.find_tree(tree_id).context("find merge tree")?;
    let message = format!("Merge {ORIGIN}/{branch}");
    repo.commit(Some("HEAD"), sig, sig, &message, &tree, &[&local, &theirs])
        .context("commit merge")?;
    checkout_head(repo)?;
    info!(branch, "merged upstream");
    Ok(Integration::Merged)
}

fn fast_forward(repo: &Repository, branch: &str, target: Oid) -> anyhow::Result<()> {
    let refname = format!("refs/heads/{branch}");
    let mut reference = repo
        .find_reference(&refname)
        .with_context(|| format!("find local ref {refname}"))?;
    reference
        .set_target(target, "fast-forward")
        .context("set local ref target")?;
    checkout_head(repo)?;
    info!(branch, commit = %target, "fast-forwarded to upstream");
    Ok(())
}

fn checkout_head(repo: &Repository) -> anyhow::Result<()> {
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_head(Some(&mut checkout))
        .context("checkout head")?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use git2::Commit;
    use std::fs;
    use tempfile::TempDir;

    pub(crate) fn test_sig() -> Signature<'static> {
        Signature::now("tester", "tester@example.com").unwrap()
    }

    pub(crate) fn commit_file(
        repo: &Repository,
        name: &str,
        contents: &str,
        parents: &[&Commit<'_>],
        update_ref: Option<&str>,
    ) -> Oid {
        let workdir = repo.workdir().unwrap();
        fs::write(workdir.join(name), contents).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = test_sig();
        repo.commit(update_ref, &sig, &sig, "commit", &tree, parents)
            .unwrap()
    }

    /// Repository on `main` with one commit holding `file.txt = base`.
    pub(crate) fn repo_with_base(tmp: &TempDir) -> (Repository, Oid) {
        let repo = Repository::init(tmp.path()).unwrap();
        let base = commit_file(&repo, "file.txt", "base", &[], Some("refs/heads/main"));
        repo.set_head("refs/heads/main").unwrap();
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        repo.checkout_head(Some(&mut checkout)).unwrap();
        (repo, base)
    }

    /// Records a commit on `refs/remotes/origin/main` without touching the working tree.
    pub(crate) fn upstream_commit(repo: &Repository, parent: Oid, name: &str, contents: &str) -> Oid {
        let blob = repo.blob(contents.as_bytes()).unwrap();
        let parent = repo.find_commit(parent).unwrap();
        let mut builder = repo.treebuilder(Some(&parent.tree().unwrap())).unwrap();
        builder.insert(name, blob, 0o100644).unwrap();
        let tree = repo.find_tree(builder.write().unwrap()).unwrap();
        let sig = test_sig();
        repo.commit(
            Some("refs/remotes/origin/main"),
            &sig,
            &sig,
            "upstream",
            &tree,
            &[&parent],
        )
        .unwrap()
    }

    #[test]
    fn metadata_requires_head_and_config() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        assert!(!has_valid_metadata(tmp.path()));
        Repository::init(tmp.path()).unwrap();
        assert!(has_valid_metadata(tmp.path()));
    }

    #[test]
    fn placeholder_commit_gives_history_on_initial_branch() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        assert!(!has_commits(&repo).unwrap());

        create_placeholder_commit(&repo, "main", &test_sig()).unwrap();
        assert!(has_commits(&repo).unwrap());
        assert_eq!(current_branch(&repo).unwrap().as_deref(), Some("main"));
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.parent_count(), 0);
        assert_eq!(head.tree().unwrap().len(), 0);
    }

    #[test]
    fn detached_head_has_no_branch() {
        let tmp = TempDir::new().unwrap();
        let (repo, base) = repo_with_base(&tmp);
        repo.set_head_detached(base).unwrap();
        assert_eq!(current_branch(&repo).unwrap(), None);
    }

    #[test]
    fn stage_and_commit_picks_up_untracked_and_deleted() {
        let tmp = TempDir::new().unwrap();
        let (repo, _) = repo_with_base(&tmp);
        assert!(!has_local_changes(&repo).unwrap());

        fs::write(tmp.path().join("new.txt"), "new").unwrap();
        fs::remove_file(tmp.path().join("file.txt")).unwrap();
        assert!(has_local_changes(&repo).unwrap());

        stage_and_commit(&repo, "auto-update", &test_sig()).unwrap();
        assert!(!has_local_changes(&repo).unwrap());
        let tree = repo.head().unwrap().peel_to_tree().unwrap();
        assert!(tree.get_name("new.txt").is_some());
        assert!(tree.get_name("file.txt").is_none());
    }

    #[test]
    fn commit_without_changes_fails() {
        let tmp = TempDir::new().unwrap();
        let (repo, _) = repo_with_base(&tmp);
        assert!(stage_and_commit(&repo, "auto-update", &test_sig()).is_err());
    }

    #[test]
    fn bind_origin_adds_then_updates() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        assert_eq!(origin_url(&repo), None);
        bind_origin(&repo, "https://github.com/dev/old.git").unwrap();
        bind_origin(&repo, "git@github.com:dev/new.git").unwrap();
        assert_eq!(
            origin_url(&repo).as_deref(),
            Some("git@github.com:dev/new.git")
        );
    }

    #[test]
    fn rebase_without_upstream_is_noop() {
        let tmp = TempDir::new().unwrap();
        let (repo, _) = repo_with_base(&tmp);
        let outcome = rebase_onto_upstream(&repo, "main", &test_sig()).unwrap();
        assert_eq!(outcome, Integration::NoUpstream);
    }

    #[test]
    fn rebase_replays_local_commit_on_diverged_upstream() {
        let tmp = TempDir::new().unwrap();
        let (repo, base) = repo_with_base(&tmp);
        let remote = upstream_commit(&repo, base, "remote.txt", "remote");
        let base_commit = repo.find_commit(base).unwrap();
        commit_file(&repo, "local.txt", "local", &[&base_commit], Some("HEAD"));

        let outcome = rebase_onto_upstream(&repo, "main", &test_sig()).unwrap();
        assert_eq!(outcome, Integration::Rebased);
        assert_eq!(current_branch(&repo).unwrap().as_deref(), Some("main"));
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.parent_id(0).unwrap(), remote);
        assert!(tmp.path().join("remote.txt").exists());
        assert!(!has_local_changes(&repo).unwrap());
    }

    #[test]
    fn conflicting_rebase_is_aborted_cleanly() {
        let tmp = TempDir::new().unwrap();
        let (repo, base) = repo_with_base(&tmp);
        upstream_commit(&repo, base, "file.txt", "remote");
        let base_commit = repo.find_commit(base).unwrap();
        let local = commit_file(&repo, "file.txt", "local", &[&base_commit], Some("HEAD"));

        let outcome = rebase_onto_upstream(&repo, "main", &test_sig()).unwrap();
        assert_eq!(outcome, Integration::Conflict);
        assert_eq!(repo.head().unwrap().target(), Some(local));
        assert_eq!(current_branch(&repo).unwrap().as_deref(), Some("main"));
        assert_eq!(
            fs::read_to_string(tmp.path().join("file.txt")).unwrap(),
            "local"
        );
        assert_eq!(repo.state(), git2::RepositoryState::Clean);
        assert!(!has_local_changes(&repo).unwrap());
    }

    #[test]
    fn behind_only_fast_forwards() {
        let tmp = TempDir::new().unwrap();
        let (repo, base) = repo_with_base(&tmp);
        let remote = upstream_commit(&repo, base, "remote.txt", "remote");

        let outcome = rebase_onto_upstream(&repo, "main", &test_sig()).unwrap();
        assert_eq!(outcome, Integration::FastForwarded);
        assert_eq!(repo.head().unwrap().target(), Some(remote));
        assert_eq!(
            fs::read_to_string(tmp.path().join("remote.txt")).unwrap(),
            "remote"
        );
    }

    #[test]
    fn merge_fallback_refuses_conflicts_and_merges_clean_divergence() {
        let tmp = TempDir::new().unwrap();
        let (repo, base) = repo_with_base(&tmp);
        upstream_commit(&repo, base, "file.txt", "remote");
        let base_commit = repo.find_commit(base).unwrap();
        let local = commit_file(&repo, "file.txt", "local", &[&base_commit], Some("HEAD"));
        assert_eq!(
            merge_upstream(&repo, "main", &test_sig()).unwrap(),
            Integration::Conflict
        );
        assert_eq!(repo.head().unwrap().target(), Some(local));

        let tmp = TempDir::new().unwrap();
        let (repo, base) = repo_with_base(&tmp);
        upstream_commit(&repo, base, "other.txt", "remote");
        let base_commit = repo.find_commit(base).unwrap();
        commit_file(&repo, "mine.txt", "local", &[&base_commit], Some("HEAD"));
        assert_eq!(
            merge_upstream(&repo, "main", &test_sig()).unwrap(),
            Integration::Merged
        );
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.parent_count(), 2);
        assert!(tmp.path().join("other.txt").exists());
    }
}
