//! Hunt repository access: per-run working copies, commits and pushes.
//!
//! Every run clones the hunt repository into its own temporary directory, so
//! concurrent runs never share a working tree and a failed run never leaves
//! anything behind in a shared checkout. Pushing the branch is the single step
//! that makes a run's output visible.

use std::path::{Path, PathBuf};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, Cred, CredentialType, ErrorClass, ErrorCode, FetchOptions, IndexAddOption, Oid,
    PushOptions, Reference, RemoteCallbacks, Repository, Signature,
};
use tempfile::TempDir;

use crate::config::RepositoryConfig;
use crate::postprod::pipeline::Cause;

const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error("failed to create working directory: {0}")]
    Workdir(std::io::Error),

    #[error("failed to clone repository {url}: {source}")]
    CloneFailed { url: String, source: git2::Error },

    #[error("ref '{git_ref}' not found in {url}")]
    RefNotFound { url: String, git_ref: String },

    #[error("failed to checkout branch '{branch}': {source}")]
    CheckoutFailed { branch: String, source: git2::Error },

    #[error("failed to commit changes: {0}")]
    CommitFailed(git2::Error),

    #[error("failed to push branch '{branch}' to {url}: {source}")]
    PushFailed {
        url: String,
        branch: String,
        source: git2::Error,
    },

    #[error("push of branch '{branch}' was rejected: {reason}")]
    Rejected { branch: String, reason: String },
}

impl PublishError {
    pub fn cause(&self) -> Cause {
        match self {
            PublishError::CloneFailed { source, .. } | PublishError::PushFailed { source, .. } => {
                classify(source)
            }
            PublishError::RefNotFound { .. } => Cause::NotFound,
            PublishError::Rejected { .. } => Cause::Rejected,
            PublishError::Workdir(_)
            | PublishError::CheckoutFailed { .. }
            | PublishError::CommitFailed(_) => Cause::Io,
        }
    }
}

fn classify(error: &git2::Error) -> Cause {
    match error.code() {
        ErrorCode::Auth | ErrorCode::Certificate => Cause::Unauthorized,
        ErrorCode::NotFastForward => Cause::Rejected,
        ErrorCode::NotFound => Cause::NotFound,
        _ => match error.class() {
            ErrorClass::Net | ErrorClass::Ssh | ErrorClass::Http | ErrorClass::Ssl => {
                Cause::Network
            }
            _ => Cause::Io,
        },
    }
}

// =============================================================================
// HuntRepo
// =============================================================================

/// The remote hunt repository that postprod branches are pushed to.
#[derive(Debug, Clone)]
pub struct HuntRepo {
    url: String,
    base_branch: String,
    ssh_key: Option<PathBuf>,
    push: bool,
    author_name: String,
    author_email: String,
}

impl HuntRepo {
    pub fn from_config(config: &RepositoryConfig) -> Self {
        Self {
            url: config.url.clone(),
            base_branch: config.base_branch.clone(),
            ssh_key: config.ssh_key.clone(),
            push: config.push,
            author_name: config.author.name.clone(),
            author_email: config.author.email.clone(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether commits are pushed to the remote.
    pub fn pushes(&self) -> bool {
        self.push
    }

    pub fn signature(&self) -> Result<Signature<'static>, PublishError> {
        Signature::now(&self.author_name, &self.author_email).map_err(PublishError::CommitFailed)
    }

    /// Clone into a fresh temporary directory and check out `branch`.
    ///
    /// An existing remote `branch` is continued; otherwise it is started from
    /// the base branch.
    pub fn checkout(&self, branch: &str) -> Result<Workspace, PublishError> {
        let dir = tempfile::Builder::new()
            .prefix("autopostprod-")
            .tempdir()
            .map_err(PublishError::Workdir)?;

        tracing::info!(url = %self.url, branch, "cloning hunt repository");
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(self.callbacks());
        let repo = RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(&self.url, dir.path())
            .map_err(|source| PublishError::CloneFailed {
                url: self.url.clone(),
                source,
            })?;

        self.checkout_branch(&repo, branch)?;

        Ok(Workspace {
            root: dir.path().to_path_buf(),
            repo,
            dir: Some(dir),
            branch: branch.to_string(),
        })
    }

    fn checkout_branch(&self, repo: &Repository, branch: &str) -> Result<(), PublishError> {
        let failed = |source| PublishError::CheckoutFailed {
            branch: branch.to_string(),
            source,
        };

        let start = match repo.find_branch(&format!("origin/{branch}"), BranchType::Remote) {
            Ok(remote) => {
                tracing::debug!(branch, "continuing existing remote branch");
                remote.get().peel_to_commit().map_err(failed)?
            }
            Err(_) => {
                tracing::debug!(branch, base = %self.base_branch, "starting new branch");
                self.resolve_ref(repo, &self.base_branch)?
                    .peel_to_commit()
                    .map_err(failed)?
            }
        };

        // The clone's default branch is already checked out and cannot be force-updated
        let is_head = repo
            .find_branch(branch, BranchType::Local)
            .map(|local| local.is_head())
            .unwrap_or(false);
        if !is_head {
            repo.branch(branch, &start, true).map_err(failed)?;
        }

        repo.set_head(&format!("refs/heads/{branch}"))
            .map_err(failed)?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))
            .map_err(failed)?;
        Ok(())
    }

    /// Resolve a ref string to a git object.
    ///
    /// Tries the following in order:
    /// 1. Remote branch (origin/ref)
    /// 2. Local branch
    /// 3. Tag
    /// 4. Commit SHA (full or abbreviated)
    fn resolve_ref<'a>(
        &self,
        repo: &'a Repository,
        git_ref: &str,
    ) -> Result<git2::Object<'a>, PublishError> {
        if let Ok(branch) = repo.find_branch(&format!("origin/{git_ref}"), BranchType::Remote)
            && let Ok(obj) = branch.get().peel(git2::ObjectType::Commit)
        {
            return Ok(obj);
        }

        if let Ok(branch) = repo.find_branch(git_ref, BranchType::Local)
            && let Ok(obj) = branch.get().peel(git2::ObjectType::Commit)
        {
            return Ok(obj);
        }

        if let Ok(reference) = repo.find_reference(&format!("refs/tags/{git_ref}"))
            && let Ok(obj) = reference.peel(git2::ObjectType::Commit)
        {
            return Ok(obj);
        }

        if let Ok(obj) = repo.revparse_single(git_ref) {
            return Ok(obj);
        }

        Err(PublishError::RefNotFound {
            url: self.url.clone(),
            git_ref: git_ref.to_string(),
        })
    }

    fn callbacks(&self) -> RemoteCallbacks<'_> {
        let mut callbacks = RemoteCallbacks::new();
        let mut attempts = 0;
        callbacks.credentials(move |_url, username, allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::new(
                    ErrorCode::Auth,
                    ErrorClass::Ssh,
                    "no accepted credentials for the hunt repository",
                ));
            }
            let username = username.unwrap_or("git");
            if allowed.contains(CredentialType::SSH_KEY) {
                return match &self.ssh_key {
                    Some(key) => Cred::ssh_key(username, None, key, None),
                    None => Cred::ssh_key_from_agent(username),
                };
            }
            if allowed.contains(CredentialType::USERNAME) {
                return Cred::username(username);
            }
            Cred::default()
        });
        callbacks
    }
}

/// True if `branch` can be used as a branch name.
pub fn is_valid_branch_name(branch: &str) -> bool {
    Reference::is_valid_name(&format!("refs/heads/{branch}"))
}

// =============================================================================
// Workspace
// =============================================================================

/// A run's private working copy, removed on drop unless persisted.
pub struct Workspace {
    root: PathBuf,
    repo: Repository,
    dir: Option<TempDir>,
    branch: String,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("root", &self.root)
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Keep the working copy on disk after this workspace is dropped.
    pub fn persist(&mut self) -> PathBuf {
        if let Some(dir) = self.dir.take() {
            let _ = dir.keep();
        }
        self.root.clone()
    }

    /// Stage every change in the working tree and commit it.
    ///
    /// Returns `None` when the tree is identical to HEAD's.
    pub fn commit_all(
        &self,
        message: &str,
        author: &Signature<'_>,
    ) -> Result<Option<Oid>, PublishError> {
        self.try_commit_all(message, author)
            .map_err(PublishError::CommitFailed)
    }

    fn try_commit_all(
        &self,
        message: &str,
        author: &Signature<'_>,
    ) -> Result<Option<Oid>, git2::Error> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        let tree_id = index.write_tree()?;

        let parent = self.repo.head()?.peel_to_commit()?;
        if parent.tree_id() == tree_id {
            tracing::info!(branch = %self.branch, "no changes to commit");
            return Ok(None);
        }

        let tree = self.repo.find_tree(tree_id)?;
        let oid = self
            .repo
            .commit(Some("HEAD"), author, author, message, &tree, &[&parent])?;
        tracing::info!(branch = %self.branch, commit = %oid, "committed changes");
        Ok(Some(oid))
    }

    /// Push the branch to `origin`.
    pub fn push(&self, hunt: &HuntRepo) -> Result<(), PublishError> {
        let failed = |source| PublishError::PushFailed {
            url: hunt.url.clone(),
            branch: self.branch.clone(),
            source,
        };

        let mut remote = self.repo.find_remote("origin").map_err(failed)?;
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", self.branch);
        let mut rejection = None;
        {
            let mut callbacks = hunt.callbacks();
            callbacks.push_update_reference(|refname, status| {
                if let Some(status) = status {
                    rejection = Some(format!("{refname}: {status}"));
                }
                Ok(())
            });
            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            remote
                .push(&[refspec.as_str()], Some(&mut options))
                .map_err(failed)?;
        }

        match rejection {
            Some(reason) => Err(PublishError::Rejected {
                branch: self.branch.clone(),
                reason,
            }),
            None => {
                tracing::info!(url = %hunt.url, branch = %self.branch, "pushed branch");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A bare repository with one commit on `main`, usable as a remote.
    pub(crate) fn bare_remote() -> (TempDir, String) {
        let dir = TempDir::new().unwrap();
        let bare_path = dir.path().join("hunt.git");
        let bare = Repository::init_bare(&bare_path).unwrap();

        let seed_path = dir.path().join("seed");
        let seed = Repository::init(&seed_path).unwrap();
        std::fs::write(seed_path.join("README.md"), "hunt\n").unwrap();
        let mut index = seed.index().unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        index.write().unwrap();
        let tree = seed.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Seed", "seed@example.com").unwrap();
        seed.commit(Some("refs/heads/main"), &sig, &sig, "Initial commit", &tree, &[])
            .unwrap();

        let mut remote = seed.remote("origin", bare_path.to_str().unwrap()).unwrap();
        remote
            .push(&["refs/heads/main:refs/heads/main"], None)
            .unwrap();
        bare.set_head("refs/heads/main").unwrap();

        (dir, bare_path.to_string_lossy().into_owned())
    }

    /// Contents of `path` on `branch` of the repository at `url`.
    pub(crate) fn remote_file(url: &str, branch: &str, path: &str) -> Option<String> {
        let repo = Repository::open_bare(url).unwrap();
        let reference = repo.find_reference(&format!("refs/heads/{branch}")).ok()?;
        let tree = reference.peel_to_tree().unwrap();
        let entry = tree.get_path(Path::new(path)).ok()?;
        let blob = entry.to_object(&repo).unwrap().peel_to_blob().unwrap();
        Some(String::from_utf8_lossy(blob.content()).into_owned())
    }

    pub(crate) fn remote_head(url: &str, branch: &str) -> Option<Oid> {
        let repo = Repository::open_bare(url).unwrap();
        repo.refname_to_id(&format!("refs/heads/{branch}")).ok()
    }

    fn hunt(url: &str) -> HuntRepo {
        HuntRepo::from_config(&RepositoryConfig {
            url: url.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_checkout_new_branch_from_base() {
        let (_remote_dir, url) = bare_remote();
        let workspace = hunt(&url).checkout("crossword").unwrap();

        assert_eq!(workspace.branch(), "crossword");
        assert!(workspace.path().join("README.md").is_file());
        let head = workspace.repo.head().unwrap();
        assert_eq!(head.name(), Some("refs/heads/crossword"));
    }

    #[test]
    fn test_commit_and_push() {
        let (_remote_dir, url) = bare_remote();
        let hunt = hunt(&url);
        let workspace = hunt.checkout("crossword").unwrap();

        std::fs::create_dir_all(workspace.path().join("client")).unwrap();
        std::fs::write(workspace.path().join("client/page.tsx"), "page").unwrap();
        let commit = workspace
            .commit_all("Postprodding 'crossword'", &hunt.signature().unwrap())
            .unwrap();
        assert!(commit.is_some());

        workspace.push(&hunt).unwrap();
        assert_eq!(remote_head(&url, "crossword"), commit);
        assert_eq!(
            remote_file(&url, "crossword", "client/page.tsx").as_deref(),
            Some("page")
        );
        // The base branch is untouched
        assert!(remote_file(&url, "main", "client/page.tsx").is_none());
    }

    #[test]
    fn test_commit_without_changes() {
        let (_remote_dir, url) = bare_remote();
        let hunt = hunt(&url);
        let workspace = hunt.checkout("crossword").unwrap();
        let commit = workspace
            .commit_all("nothing", &hunt.signature().unwrap())
            .unwrap();
        assert!(commit.is_none());
    }

    #[test]
    fn test_commit_records_deletions() {
        let (_remote_dir, url) = bare_remote();
        let hunt = hunt(&url);
        let workspace = hunt.checkout("cleanup").unwrap();
        std::fs::remove_file(workspace.path().join("README.md")).unwrap();

        assert!(
            workspace
                .commit_all("remove readme", &hunt.signature().unwrap())
                .unwrap()
                .is_some()
        );
        workspace.push(&hunt).unwrap();
        assert!(remote_file(&url, "cleanup", "README.md").is_none());
    }

    #[test]
    fn test_checkout_continues_existing_branch() {
        let (_remote_dir, url) = bare_remote();
        let hunt = hunt(&url);

        let first = hunt.checkout("crossword").unwrap();
        std::fs::write(first.path().join("notes.txt"), "v1").unwrap();
        first
            .commit_all("first", &hunt.signature().unwrap())
            .unwrap();
        first.push(&hunt).unwrap();

        let second = hunt.checkout("crossword").unwrap();
        assert_eq!(
            std::fs::read_to_string(second.path().join("notes.txt")).unwrap(),
            "v1"
        );
    }

    #[test]
    fn test_checkout_base_branch_itself() {
        let (_remote_dir, url) = bare_remote();
        let workspace = hunt(&url).checkout("main").unwrap();
        assert_eq!(workspace.branch(), "main");
        assert!(workspace.path().join("README.md").is_file());
    }

    #[test]
    fn test_missing_base_branch() {
        let (_remote_dir, url) = bare_remote();
        let hunt = HuntRepo::from_config(&RepositoryConfig {
            url: url.clone(),
            base_branch: "does-not-exist".to_string(),
            ..Default::default()
        });
        let err = hunt.checkout("crossword").unwrap_err();
        assert!(matches!(err, PublishError::RefNotFound { .. }));
        assert_eq!(err.cause(), Cause::NotFound);
    }

    #[test]
    fn test_clone_failure() {
        let err = hunt("/nonexistent/hunt.git").checkout("crossword").unwrap_err();
        assert!(matches!(err, PublishError::CloneFailed { .. }));
    }

    #[test]
    fn test_diverged_push_leaves_remote_unchanged() {
        let (_remote_dir, url) = bare_remote();
        let hunt = hunt(&url);
        let sig = hunt.signature().unwrap();

        let a = hunt.checkout("crossword").unwrap();
        let b = hunt.checkout("crossword").unwrap();

        std::fs::write(a.path().join("a.txt"), "a").unwrap();
        let a_commit = a.commit_all("a", &sig).unwrap();
        a.push(&hunt).unwrap();

        std::fs::write(b.path().join("b.txt"), "b").unwrap();
        b.commit_all("b", &sig).unwrap();
        let err = b.push(&hunt).unwrap_err();
        assert_eq!(err.cause(), Cause::Rejected);
        assert_eq!(remote_head(&url, "crossword"), a_commit);
    }

    #[test]
    fn test_persist_keeps_directory() {
        let (_remote_dir, url) = bare_remote();
        let mut workspace = hunt(&url).checkout("crossword").unwrap();
        let path = workspace.persist();
        drop(workspace);

        assert!(path.join("README.md").is_file());
        std::fs::remove_dir_all(path).unwrap();
    }

    #[test]
    fn test_dropped_workspace_is_removed() {
        let (_remote_dir, url) = bare_remote();
        let workspace = hunt(&url).checkout("crossword").unwrap();
        let path = workspace.path().to_path_buf();
        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn test_branch_names() {
        assert!(is_valid_branch_name("crossword"));
        assert!(is_valid_branch_name("postprod/crossword"));
        assert!(!is_valid_branch_name("bad..name"));
        assert!(!is_valid_branch_name("has space"));
    }

    #[test]
    fn test_classify_errors() {
        let auth = git2::Error::new(ErrorCode::Auth, ErrorClass::Ssh, "denied");
        assert_eq!(classify(&auth), Cause::Unauthorized);
        let nff = git2::Error::new(ErrorCode::NotFastForward, ErrorClass::Reference, "nff");
        assert_eq!(classify(&nff), Cause::Rejected);
        let net = git2::Error::new(ErrorCode::GenericError, ErrorClass::Net, "down");
        assert_eq!(classify(&net), Cause::Network);
    }
}
