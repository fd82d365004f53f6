//! [`Vcs`] backed by the `git` command line.
//!
//! `resolve` asks the remote with `git ls-remote`; `fetch_manifest` does a
//! depth-1 fetch of the single commit into a scratch repository and reads
//! the manifest with `git show`. Nothing is cached between calls.
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

use crate::plugin_system::version::{ResolutionError, Vcs};

#[derive(Debug, Clone)]
pub struct GitCommandVcs {
    git_binary: String,
}

impl GitCommandVcs {
    pub fn new(git_binary: impl Into<String>) -> Self {
        Self {
            git_binary: git_binary.into(),
        }
    }

    async fn run_git(&self, repository_url: &str, cwd: Option<&Path>, args: &[&str]) -> Result<GitOutput, ResolutionError> {
        let mut command = Command::new(&self.git_binary);
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The resolver's deadline drops this future; take the child with it
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        debug!("Running {} {}", self.git_binary, args.join(" "));
        let output = command.output().await.map_err(|e| ResolutionError::Unreachable {
            repository_url: repository_url.to_string(),
            reason: format!("failed to run {}: {}", self.git_binary, e),
        })?;
        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl Default for GitCommandVcs {
    fn default() -> Self {
        Self::new(crate::kernel::constants::DEFAULT_GIT_BINARY)
    }
}

struct GitOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// Pick the commit for `git_ref` out of `git ls-remote` output.
///
/// Exact ref names win over branch and tag expansions; for annotated tags
/// the peeled (`^{}`) commit wins over the tag object.
pub fn select_commit(ls_remote: &str, git_ref: &str) -> Option<String> {
    let entries: Vec<(&str, &str)> = ls_remote
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            Some((parts.next()?, parts.next()?))
        })
        .collect();

    let candidates = [
        git_ref.to_string(),
        format!("refs/heads/{}", git_ref),
        format!("refs/tags/{}", git_ref),
    ];
    for candidate in &candidates {
        let peeled = format!("{}^{{}}", candidate);
        if let Some((commit, _)) = entries.iter().find(|(_, name)| *name == peeled.as_str()) {
            return Some(commit.to_string());
        }
        if let Some((commit, _)) = entries.iter().find(|(_, name)| *name == candidate.as_str()) {
            return Some(commit.to_string());
        }
    }

    // A full commit id the remote advertises at some ref
    if looks_like_commit(git_ref) {
        let wanted = git_ref.to_ascii_lowercase();
        if let Some((commit, _)) = entries.iter().find(|(commit, _)| commit.eq_ignore_ascii_case(&wanted)) {
            return Some(commit.to_string());
        }
    }
    None
}

/// Refuse caller-supplied values git would parse as options.
fn reject_option_like(repository_url: &str, value: &str) -> Result<(), ResolutionError> {
    if value.trim_start().starts_with('-') {
        return Err(ResolutionError::Unreachable {
            repository_url: repository_url.to_string(),
            reason: format!("refusing argument that looks like a git option: '{}'", value),
        });
    }
    Ok(())
}

fn looks_like_commit(value: &str) -> bool {
    value.len() == 40 && value.chars().all(|c| c.is_ascii_hexdigit())
}

#[async_trait]
impl Vcs for GitCommandVcs {
    async fn resolve(&self, repository_url: &str, git_ref: &str) -> Result<String, ResolutionError> {
        reject_option_like(repository_url, repository_url)?;
        reject_option_like(repository_url, git_ref)?;
        let output = if looks_like_commit(git_ref) {
            self.run_git(repository_url, None, &["ls-remote", "--", repository_url]).await?
        } else {
            self.run_git(repository_url, None, &["ls-remote", "--", repository_url, git_ref]).await?
        };
        if !output.success {
            return Err(ResolutionError::Unreachable {
                repository_url: repository_url.to_string(),
                reason: output.stderr,
            });
        }
        let mut commit = select_commit(&output.stdout, git_ref);
        if commit.is_none() && !looks_like_commit(git_ref) {
            // `git ls-remote <url> <pattern>` only matches path suffixes; retry over all refs
            let all = self.run_git(repository_url, None, &["ls-remote", "--", repository_url]).await?;
            if all.success {
                commit = select_commit(&all.stdout, git_ref);
            }
        }
        commit.ok_or_else(|| ResolutionError::RefNotFound {
            repository_url: repository_url.to_string(),
            git_ref: git_ref.to_string(),
        })
    }

    async fn fetch_manifest(&self, repository_url: &str, commit: &str, path: &str) -> Result<String, ResolutionError> {
        reject_option_like(repository_url, repository_url)?;
        reject_option_like(repository_url, commit)?;
        let scratch = tempfile::tempdir().map_err(|e| ResolutionError::Unreachable {
            repository_url: repository_url.to_string(),
            reason: format!("could not create scratch directory: {}", e),
        })?;
        let dir = scratch.path();

        let init = self.run_git(repository_url, Some(dir), &["init", "--quiet"]).await?;
        if !init.success {
            return Err(ResolutionError::Unreachable {
                repository_url: repository_url.to_string(),
                reason: format!("git init failed: {}", init.stderr),
            });
        }
        let fetch = self
            .run_git(repository_url, Some(dir), &["fetch", "--quiet", "--depth", "1", "--", repository_url, commit])
            .await?;
        if !fetch.success {
            return Err(ResolutionError::Unreachable {
                repository_url: repository_url.to_string(),
                reason: fetch.stderr,
            });
        }
        let object = format!("{}:{}", commit, path);
        let show = self.run_git(repository_url, Some(dir), &["show", &object]).await?;
        if !show.success {
            return Err(ResolutionError::ManifestUnavailable {
                repository_url: repository_url.to_string(),
                commit: commit.to_string(),
                path: path.to_string(),
                reason: show.stderr,
            });
        }
        Ok(show.stdout)
    }
}
