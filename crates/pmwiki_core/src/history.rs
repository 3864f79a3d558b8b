//! Walks a page's stored diffs backwards to rebuild every earlier revision.

use std::collections::BTreeMap;
use std::mem;
use std::net::{IpAddr, Ipv6Addr};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::ReconstructionError;
use crate::pagefile::{PageFile, PageFileRevision};
use crate::patch_parse::parse_patch;

enum Step<'a> {
    /// Yield the deletion snapshot, if the page was deleted.
    Deletion,
    /// Decide between the stored history and the page on its own.
    Current,
    /// Emit the revision found at `cursor` with the given text.
    Emit {
        text: String,
        cursor: Option<DateTime<Utc>>,
        rev: i64,
    },
    /// Apply the diff of `revision`, numbered `rev`, to get the text of the
    /// revision before it.
    Follow {
        text: String,
        revision: &'a PageFileRevision,
        rev: i64,
    },
    Done,
}

/// Snapshots of a page, newest first. Created by [`PageFile::revisions`].
///
/// Each diff is parsed only when the walk reaches it. The first error ends the
/// iteration; snapshots yielded before it are complete.
pub struct Revisions<'a> {
    page: &'a PageFile,
    step: Step<'a>,
}

impl PageFile {
    /// Iterate over this page's reconstructed history.
    ///
    /// Every call starts a fresh walk from the current text.
    pub fn revisions(&self) -> Revisions<'_> {
        Revisions {
            page: self,
            step: Step::Deletion,
        }
    }
}

impl Revisions<'_> {
    fn snapshot(&self, text: String, revision: &PageFileRevision, rev: i64) -> PageFile {
        PageFile {
            version: self.page.version.clone(),
            name: self.page.name.clone(),
            time: Some(revision.time),
            text,
            author: revision.author.clone().unwrap_or_default(),
            host: revision.host,
            rev,
            revisions: BTreeMap::new(),
            deleted: None,
        }
    }

    fn deletion_snapshot(&self, deleted: DateTime<Utc>) -> Result<PageFile, ReconstructionError> {
        let rev = self
            .page
            .rev
            .checked_add(1)
            .ok_or(ReconstructionError::RevOutOfRange { rev: self.page.rev })?;
        Ok(PageFile {
            version: self.page.version.clone(),
            name: self.page.name.clone(),
            time: Some(deleted),
            text: String::new(),
            author: String::new(),
            host: Some(IpAddr::V6(Ipv6Addr::LOCALHOST)),
            rev,
            revisions: BTreeMap::new(),
            deleted: None,
        })
    }

    /// Number and text of the revision before `revision`, or `None` when its
    /// diff is the last one.
    fn follow(
        &self,
        text: &str,
        revision: &PageFileRevision,
        current: i64,
    ) -> Option<Result<(i64, String), ReconstructionError>> {
        let diff = revision.diff_text.as_deref().filter(|diff| !diff.is_empty())?;
        let Some(rev) = current.checked_sub(1) else {
            return Some(Err(ReconstructionError::RevOutOfRange { rev: current }));
        };
        let result = parse_patch(diff)
            .map_err(|source| ReconstructionError::Patch { rev, source })
            .and_then(|patch| {
                patch
                    .apply(text)
                    .map_err(|source| ReconstructionError::Apply { rev, source })
            });
        Some(result.map(|previous| (rev, previous)))
    }
}

impl Iterator for Revisions<'_> {
    type Item = Result<PageFile, ReconstructionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match mem::replace(&mut self.step, Step::Done) {
                Step::Done => return None,
                Step::Deletion => {
                    let Some(deleted) = self.page.deleted else {
                        self.step = Step::Current;
                        continue;
                    };
                    debug!(page = %self.page.name, %deleted, "page was deleted");
                    let snapshot = self.deletion_snapshot(deleted);
                    if snapshot.is_ok() {
                        self.step = Step::Current;
                    }
                    return Some(snapshot);
                }
                Step::Current => {
                    if self.page.revisions.is_empty() {
                        return Some(Ok(PageFile {
                            revisions: BTreeMap::new(),
                            deleted: None,
                            ..self.page.clone()
                        }));
                    }
                    self.step = Step::Emit {
                        text: self.page.text.clone(),
                        cursor: self.page.time,
                        rev: self.page.rev,
                    };
                }
                Step::Emit { text, cursor, rev } => {
                    if text.is_empty() {
                        return None;
                    }
                    let page = self.page;
                    let Some(revision) = cursor.and_then(|time| page.revisions.get(&time)) else {
                        return Some(Err(ReconstructionError::MissingRevision { rev }));
                    };
                    debug!(page = %page.name, rev, time = %revision.time, "rebuilt revision");
                    let snapshot = self.snapshot(text.clone(), revision, rev);
                    self.step = Step::Follow {
                        text,
                        revision,
                        rev,
                    };
                    return Some(Ok(snapshot));
                }
                Step::Follow {
                    text,
                    revision,
                    rev,
                } => match self.follow(&text, revision, rev)? {
                    Ok((rev, previous)) => {
                        self.step = Step::Emit {
                            text: previous,
                            cursor: revision.diff_against,
                            rev,
                        };
                    }
                    Err(err) => return Some(Err(err)),
                },
            }
        }
    }
}
