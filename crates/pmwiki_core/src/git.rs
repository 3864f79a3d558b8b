//! Replays page snapshots as commits of a git working tree.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use crate::config::GitSettings;
use crate::pagefile::PageFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Nothing to commit, e.g. deleting a page that was never written.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
    settings: GitSettings,
}

impl GitRepo {
    pub fn open(path: &Path, settings: &GitSettings) -> Result<Self> {
        let root = fs::canonicalize(path)
            .with_context(|| format!("failed to resolve {}", path.display()))?;
        if !root.is_dir() {
            bail!("not a directory: {}", root.display());
        }
        Ok(Self {
            root,
            settings: settings.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write (or remove) the page file of `snapshot` and commit it as its author.
    pub fn commit_snapshot(&self, snapshot: &PageFile) -> Result<CommitOutcome> {
        let relative = page_path(&snapshot.name)?;
        let file = self.root.join(&relative);
        let relative_arg = relative.to_string_lossy().into_owned();

        let message = if snapshot.is_deletion() {
            if !file.exists() {
                warn!(
                    page = %snapshot.name,
                    rev = snapshot.rev,
                    "revision has empty text, but the file does not exist"
                );
                return Ok(CommitOutcome::Skipped);
            }
            self.run(&["rm", "--quiet", "--", relative_arg.as_str()], &[])?;
            format!("Deleted {}", snapshot.name)
        } else {
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(&file, &snapshot.text)
                .with_context(|| format!("failed to write {}", file.display()))?;
            self.run(&["add", "--", relative_arg.as_str()], &[])?;
            format!("Modified {}", snapshot.name)
        };

        let status = self.run(&["status", "--porcelain"], &[])?;
        if status.trim().is_empty() {
            warn!(
                page = %snapshot.name,
                rev = snapshot.rev,
                "revision did not produce a committable difference"
            );
            return Ok(CommitOutcome::Skipped);
        }

        let identity = commit_identity(snapshot, &self.settings)?;
        self.run(&["commit", "--quiet", "-m", message.as_str()], &identity)?;
        debug!(page = %snapshot.name, rev = snapshot.rev, %message, "committed revision");
        Ok(CommitOutcome::Committed)
    }

    /// Run git inside the working tree and return its combined output.
    fn run(&self, args: &[&str], envs: &[(&'static str, String)]) -> Result<String> {
        let subcommand = args.first().copied().unwrap_or_default();
        let output = Command::new(&self.settings.git_binary)
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .envs(envs.iter().map(|(key, value)| (*key, value)))
            .output()
            .with_context(|| format!("failed to execute {}", self.settings.git_binary))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            bail!("git {subcommand} failed ({}): {}", output.status, combined.trim());
        }
        Ok(combined)
    }
}

/// Map a page name to its path in the working tree: `Group.Page` becomes
/// `Group/Page`. Only the first dot separates the group.
pub fn page_path(name: &str) -> Result<PathBuf> {
    let joined = name.replacen('.', "/", 1);
    let path: PathBuf = Path::new(&joined)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();
    if path.as_os_str().is_empty() {
        bail!("page name {name:?} does not map to a file");
    }
    Ok(path)
}

/// Author and committer environment for a snapshot's commit.
pub fn commit_identity(
    snapshot: &PageFile,
    settings: &GitSettings,
) -> Result<Vec<(&'static str, String)>> {
    let Some(time) = snapshot.time else {
        bail!("revision {} of {} has no time", snapshot.rev, snapshot.name);
    };
    let author = if snapshot.author.is_empty() {
        settings.default_author.as_str()
    } else {
        snapshot.author.as_str()
    };
    let email = format!("{author}@{}", settings.email_domain);
    let date = time.to_rfc2822();

    Ok(vec![
        ("GIT_AUTHOR_NAME", author.to_string()),
        ("GIT_AUTHOR_EMAIL", email.clone()),
        ("GIT_AUTHOR_DATE", date.clone()),
        ("GIT_COMMITTER_NAME", author.to_string()),
        ("GIT_COMMITTER_EMAIL", email),
        ("GIT_COMMITTER_DATE", date),
    ])
}
