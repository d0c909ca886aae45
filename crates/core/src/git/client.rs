//! Git transport operations via `git2`.
//!
//! The [`GitClient`] owns a scratch repository that exists only to shuttle
//! refs between remotes: trunk and fork branches are fetched into it, branch
//! refs are updated locally, and the result is pushed to the trusted
//! upstream. Branch names and SHAs are always passed as typed arguments --
//! never interpolated into shell strings.

use std::path::{Path, PathBuf};

use git2::{Cred, Direction, FetchOptions, Oid, PushOptions, RemoteCallbacks, Repository};
use tracing::{debug, info, instrument, warn};

use crate::errors::GitError;

/// High-level Git client wrapping a scratch `git2::Repository`.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
}

impl GitClient {
    /// Open the scratch repository at `path`, initializing it if absent.
    pub fn init_scratch<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let path = path.as_ref();
        let repo = if path.join(".git").exists() {
            info!(path = %path.display(), "opening scratch git repository");
            Repository::open(path)?
        } else {
            info!(path = %path.display(), "initializing scratch git repository");
            std::fs::create_dir_all(path)?;
            Repository::init(path)?
        };
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    /// Open an existing repository at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let path = path.as_ref();
        let repo = Repository::open(path)?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn callbacks(token: Option<&str>) -> RemoteCallbacks<'static> {
        let mut callbacks = RemoteCallbacks::new();
        if let Some(tok) = token {
            let tok = tok.to_string();
            callbacks.credentials(move |_url, _username, _allowed| {
                Cred::userpass_plaintext("x-access-token", &tok)
            });
        }
        callbacks
    }

    /// Check whether `refs/heads/<branch>` exists on the remote.
    #[instrument(skip(self, token))]
    pub fn remote_branch_exists(
        &self,
        remote_url: &str,
        branch: &str,
        token: Option<&str>,
    ) -> Result<bool, GitError> {
        let mut remote = self.repo.remote_anonymous(remote_url)?;
        let connection =
            remote.connect_auth(Direction::Fetch, Some(Self::callbacks(token)), None)?;
        let wanted = format!("refs/heads/{}", branch);
        let exists = connection
            .list()?
            .iter()
            .any(|head| head.name() == wanted.as_str());
        debug!(branch, exists, "listed remote heads");
        Ok(exists)
    }

    /// Fetch `refs/heads/<branch>` from `remote_url` into `local_ref`,
    /// overwriting whatever the local ref pointed at.
    #[instrument(skip(self, token))]
    pub fn fetch_branch(
        &self,
        remote_url: &str,
        branch: &str,
        local_ref: &str,
        token: Option<&str>,
    ) -> Result<(), GitError> {
        info!(remote = remote_url, branch, local_ref, "fetching branch");
        let mut remote = self.repo.remote_anonymous(remote_url)?;
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(Self::callbacks(token));
        let refspec = format!("+refs/heads/{}:{}", branch, local_ref);
        remote
            .fetch(&[refspec.as_str()], Some(&mut fetch_opts), None)
            .map_err(|e| GitError::FetchFailed {
                remote: remote_url.to_string(),
                ref_name: branch.to_string(),
                detail: e.message().to_string(),
            })?;
        debug!("fetch completed");
        Ok(())
    }

    /// Resolve a ref name to the SHA of the commit it points at.
    pub fn resolve_ref(&self, refname: &str) -> Result<String, GitError> {
        Ok(self.commit_oid(refname)?.to_string())
    }

    /// SHA of the nearest common ancestor of two refs.
    pub fn merge_base(&self, ref_a: &str, ref_b: &str) -> Result<String, GitError> {
        let a = self.commit_oid(ref_a)?;
        let b = self.commit_oid(ref_b)?;
        let base = self.repo.merge_base(a, b)?;
        debug!(ref_a, ref_b, base = %base, "computed merge base");
        Ok(base.to_string())
    }

    /// Point the local branch `name` at `sha`, creating or moving it.
    #[instrument(skip(self))]
    pub fn force_branch(&self, name: &str, sha: &str) -> Result<(), GitError> {
        let oid = Oid::from_str(sha)?;
        let commit = self.repo.find_commit(oid)?;
        self.repo.branch(name, &commit, true)?;
        info!(name, sha, "updated local branch");
        Ok(())
    }

    /// Push the local branch `branch` to the remote under its own name.
    ///
    /// With `force` set, the refspec is prefixed so a rewritten branch still
    /// lands; without it, a non-fast-forward push is rejected by the remote.
    #[instrument(skip(self, token))]
    pub fn push_branch(
        &self,
        remote_url: &str,
        branch: &str,
        force: bool,
        token: Option<&str>,
    ) -> Result<(), GitError> {
        info!(remote = remote_url, branch, force, "pushing branch");
        let mut remote = self.repo.remote_anonymous(remote_url)?;
        let mut callbacks = Self::callbacks(token);

        let push_error = std::sync::Arc::new(std::sync::Mutex::new(None::<String>));
        let push_error_clone = push_error.clone();
        callbacks.push_update_reference(move |refname, status| {
            if let Some(msg) = status {
                warn!(refname, msg, "push rejected");
                *push_error_clone.lock().unwrap() = Some(msg.to_string());
            }
            Ok(())
        });

        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(callbacks);
        let prefix = if force { "+" } else { "" };
        let refspec = format!("{}refs/heads/{}:refs/heads/{}", prefix, branch, branch);
        remote.push(&[&refspec], Some(&mut push_opts))?;

        if let Some(err_msg) = push_error.lock().unwrap().take() {
            return Err(GitError::PushRejected {
                branch: branch.to_string(),
                detail: err_msg,
            });
        }
        info!("push completed");
        Ok(())
    }

    fn commit_oid(&self, refname: &str) -> Result<Oid, GitError> {
        let object = self
            .repo
            .revparse_single(refname)
            .map_err(|_| GitError::RefNotFound(refname.to_string()))?;
        let commit = object.peel(git2::ObjectType::Commit)?;
        Ok(commit.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;

    /// Init a repository whose initial branch is `main`.
    fn init_repo(path: &Path) -> Repository {
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        Repository::init_opts(path, &opts).unwrap()
    }

    /// Write a file and commit it on the current HEAD branch.
    fn commit_file(repo: &Repository, name: &str, content: &str, msg: &str) -> Oid {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Test", "test@test.com").unwrap();
        let parent = repo.head().ok().map(|h| h.peel_to_commit().unwrap());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &parents)
            .unwrap()
    }

    #[test]
    fn test_init_scratch_is_reopenable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch");
        GitClient::init_scratch(&path).unwrap();
        GitClient::init_scratch(&path).unwrap();
    }

    #[test]
    fn test_resolve_missing_ref() {
        let dir = tempfile::tempdir().unwrap();
        let client = GitClient::init_scratch(dir.path().join("scratch")).unwrap();
        assert!(matches!(
            client.resolve_ref("refs/heads/nope"),
            Err(GitError::RefNotFound(_))
        ));
    }

    #[test]
    fn test_fetch_branch_from_local_remote() {
        let dir = tempfile::tempdir().unwrap();
        let src = init_repo(&dir.path().join("src"));
        let oid = commit_file(&src, "a.txt", "one", "init");

        let client = GitClient::init_scratch(dir.path().join("scratch")).unwrap();
        let src_url = dir.path().join("src").display().to_string();
        client
            .fetch_branch(&src_url, "main", "refs/forkmirror/test", None)
            .unwrap();
        assert_eq!(
            client.resolve_ref("refs/forkmirror/test").unwrap(),
            oid.to_string()
        );
    }

    #[test]
    fn test_fetch_missing_branch_fails() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(&dir.path().join("src"));
        let client = GitClient::init_scratch(dir.path().join("scratch")).unwrap();
        let src_url = dir.path().join("src").display().to_string();
        let result = client.fetch_branch(&src_url, "does-not-exist", "refs/forkmirror/test", None);
        assert!(matches!(result, Err(GitError::FetchFailed { .. })));
    }

    #[test]
    fn test_merge_base_of_diverged_branches() {
        let dir = tempfile::tempdir().unwrap();
        let src = init_repo(&dir.path().join("src"));
        let base = commit_file(&src, "a.txt", "one", "base");

        // Branch off, then advance the feature branch only.
        let base_commit = src.find_commit(base).unwrap();
        src.branch("feature", &base_commit, false).unwrap();
        src.set_head("refs/heads/feature").unwrap();
        commit_file(&src, "b.txt", "two", "feature work");

        let client = GitClient::open(dir.path().join("src")).unwrap();
        assert_eq!(
            client
                .merge_base("refs/heads/main", "refs/heads/feature")
                .unwrap(),
            base.to_string()
        );
        // Trunk head equals the merge base: feature is a strict descendant.
        assert_eq!(
            client.resolve_ref("refs/heads/main").unwrap(),
            base.to_string()
        );
    }

    #[test]
    fn test_remote_branch_exists() {
        let dir = tempfile::tempdir().unwrap();
        let src = init_repo(&dir.path().join("src"));
        commit_file(&src, "a.txt", "one", "init");

        let client = GitClient::init_scratch(dir.path().join("scratch")).unwrap();
        let src_url = dir.path().join("src").display().to_string();
        assert!(client.remote_branch_exists(&src_url, "main", None).unwrap());
        assert!(!client
            .remote_branch_exists(&src_url, "feature-x", None)
            .unwrap());
    }

    #[test]
    fn test_force_branch_and_push_to_bare() {
        let dir = tempfile::tempdir().unwrap();
        let src = init_repo(&dir.path().join("src"));
        let oid = commit_file(&src, "a.txt", "one", "init");

        let bare_path = dir.path().join("upstream.git");
        Repository::init_bare(&bare_path).unwrap();

        let client = GitClient::init_scratch(dir.path().join("scratch")).unwrap();
        let src_url = dir.path().join("src").display().to_string();
        client
            .fetch_branch(&src_url, "main", "refs/forkmirror/staging", None)
            .unwrap();
        client.force_branch("feature-x", &oid.to_string()).unwrap();

        let bare_url = bare_path.display().to_string();
        client.push_branch(&bare_url, "feature-x", false, None).unwrap();

        let upstream = Repository::open_bare(&bare_path).unwrap();
        let pushed = upstream.find_reference("refs/heads/feature-x").unwrap();
        assert_eq!(pushed.target().unwrap(), oid);
    }
}
