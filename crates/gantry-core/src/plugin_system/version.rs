use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Failure to resolve a ref or fetch repository content.
///
/// Always retryable by the caller; never retried automatically here, and a
/// timeout is never read as "nothing newer".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("ref '{git_ref}' not found in {repository_url}")]
    RefNotFound {
        repository_url: String,
        git_ref: String,
    },

    #[error("repository {repository_url} is unreachable: {reason}")]
    Unreachable {
        repository_url: String,
        reason: String,
    },

    #[error("{operation} for {repository_url} timed out after {}s", .after.as_secs_f64())]
    Timeout {
        repository_url: String,
        operation: String,
        after: Duration,
    },

    #[error("manifest '{path}' is not available in {repository_url} at {commit}: {reason}")]
    ManifestUnavailable {
        repository_url: String,
        commit: String,
        path: String,
        reason: String,
    },
}

impl ResolutionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResolutionError::Timeout { .. })
    }
}

/// A ref pinned to the commit it pointed at when resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRef {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub commit: String,
}

impl ResolvedRef {
    pub fn new(git_ref: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            git_ref: git_ref.into(),
            commit: commit.into(),
        }
    }

    /// Whether this resolution points somewhere other than `installed_commit`.
    pub fn is_newer_than(&self, installed_commit: &str) -> bool {
        !commits_match(installed_commit, &self.commit)
    }
}

impl fmt::Display for ResolvedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.git_ref, self.commit)
    }
}

/// Compare two commit ids, tolerating case and abbreviation.
///
/// An abbreviated id matches a longer one it prefixes, provided the
/// abbreviation is at least four characters.
pub fn commits_match(a: &str, b: &str) -> bool {
    let a = a.trim().to_ascii_lowercase();
    let b = b.trim().to_ascii_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let (short, long) = if a.len() < b.len() { (&a, &b) } else { (&b, &a) };
    short.len() >= 4 && long.starts_with(short.as_str())
}

/// Version-control collaborator.
///
/// Implementations must be safe to call concurrently for different
/// repositories and must not share mutable state between calls.
#[async_trait]
pub trait Vcs: Send + Sync + Debug {
    /// Resolve `git_ref` in `repository_url` to an immutable commit id.
    async fn resolve(&self, repository_url: &str, git_ref: &str) -> Result<String, ResolutionError>;

    /// Fetch the raw manifest document at `path` as of `commit`.
    async fn fetch_manifest(
        &self,
        repository_url: &str,
        commit: &str,
        path: &str,
    ) -> Result<String, ResolutionError>;
}

/// Resolves refs through a [`Vcs`] with a deadline on every call.
#[derive(Clone)]
pub struct VersionResolver {
    vcs: Arc<dyn Vcs>,
    resolve_timeout: Duration,
    fetch_timeout: Duration,
    manifest_path: String,
}

impl VersionResolver {
    pub fn new(vcs: Arc<dyn Vcs>, resolve_timeout: Duration, fetch_timeout: Duration) -> Self {
        Self {
            vcs,
            resolve_timeout,
            fetch_timeout,
            manifest_path: crate::kernel::constants::DEFAULT_MANIFEST_PATH.to_string(),
        }
    }

    pub fn with_manifest_path(mut self, manifest_path: impl Into<String>) -> Self {
        self.manifest_path = manifest_path.into();
        self
    }

    pub fn manifest_path(&self) -> &str {
        &self.manifest_path
    }

    pub fn resolve_timeout(&self) -> Duration {
        self.resolve_timeout
    }

    pub async fn resolve(&self, repository_url: &str, git_ref: &str) -> Result<ResolvedRef, ResolutionError> {
        let commit = with_deadline(
            repository_url,
            "resolve",
            self.resolve_timeout,
            self.vcs.resolve(repository_url, git_ref),
        )
        .await?;
        let commit = commit.trim();
        if commit.is_empty() {
            return Err(ResolutionError::Unreachable {
                repository_url: repository_url.to_string(),
                reason: format!("ref '{}' resolved to an empty commit id", git_ref),
            });
        }
        Ok(ResolvedRef::new(git_ref, commit))
    }

    pub async fn fetch_manifest(&self, repository_url: &str, commit: &str) -> Result<String, ResolutionError> {
        with_deadline(
            repository_url,
            "manifest fetch",
            self.fetch_timeout,
            self.vcs.fetch_manifest(repository_url, commit, &self.manifest_path),
        )
        .await
    }

    /// Re-resolve the ref an install was made from and report whether it moved.
    pub async fn check_newer(
        &self,
        repository_url: &str,
        git_ref: &str,
        installed_commit: &str,
    ) -> Result<(ResolvedRef, bool), ResolutionError> {
        let latest = self.resolve(repository_url, git_ref).await?;
        let newer = latest.is_newer_than(installed_commit);
        Ok((latest, newer))
    }
}

async fn with_deadline<T, F>(
    repository_url: &str,
    operation: &str,
    after: Duration,
    fut: F,
) -> Result<T, ResolutionError>
where
    F: Future<Output = Result<T, ResolutionError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(ResolutionError::Timeout {
            repository_url: repository_url.to_string(),
            operation: operation.to_string(),
            after,
        }),
    }
}

impl Debug for VersionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionResolver")
            .field("vcs", &self.vcs)
            .field("resolve_timeout", &self.resolve_timeout)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("manifest_path", &self.manifest_path)
            .finish()
    }
}
