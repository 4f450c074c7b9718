//! Version-control interface
//!
//! The review gate only needs one capability: fetching a unified diff. The
//! trait keeps the gate testable with a canned-diff stub; the production
//! implementation shells out to git.

use std::path::PathBuf;

use async_trait::async_trait;
use eyre::{Result, eyre};
use tracing::debug;

/// Minimal version-control capability
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Unified diff of the working tree; empty string means no changes.
    async fn diff(&self, staged: bool) -> Result<String>;
}

/// Git-backed implementation
pub struct GitVcs {
    working_dir: PathBuf,
}

impl GitVcs {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

#[async_trait]
impl Vcs for GitVcs {
    async fn diff(&self, staged: bool) -> Result<String> {
        debug!(working_dir = ?self.working_dir, staged, "GitVcs::diff: called");
        let mut args = vec!["diff"];
        if staged {
            args.push("--staged");
        }

        let output = tokio::process::Command::new("git")
            .args(&args)
            .current_dir(&self.working_dir)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(eyre!("git diff failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn git(dir: &std::path::Path, args: &[&str]) {
        let status = tokio::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .await
            .unwrap();
        assert!(status.status.success(), "git {:?} failed", args);
    }

    #[tokio::test]
    async fn test_diff_empty_repo() {
        let temp = tempdir().unwrap();
        git(temp.path(), &["init"]).await;

        let vcs = GitVcs::new(temp.path());
        let diff = vcs.diff(false).await.unwrap();
        assert!(diff.is_empty());
    }

    #[tokio::test]
    async fn test_diff_reports_changes() {
        let temp = tempdir().unwrap();
        git(temp.path(), &["init"]).await;
        git(temp.path(), &["config", "user.email", "t@t"]).await;
        git(temp.path(), &["config", "user.name", "t"]).await;

        std::fs::write(temp.path().join("a.txt"), "one\n").unwrap();
        git(temp.path(), &["add", "."]).await;
        git(temp.path(), &["commit", "-m", "init"]).await;

        std::fs::write(temp.path().join("a.txt"), "two\n").unwrap();
        let vcs = GitVcs::new(temp.path());
        let diff = vcs.diff(false).await.unwrap();
        assert!(diff.contains("-one"));
        assert!(diff.contains("+two"));

        // nothing staged yet
        let staged = vcs.diff(true).await.unwrap();
        assert!(staged.is_empty());
    }

    #[tokio::test]
    async fn test_diff_outside_repo_errors() {
        let temp = tempdir().unwrap();
        let vcs = GitVcs::new(temp.path());
        assert!(vcs.diff(false).await.is_err());
    }
}
