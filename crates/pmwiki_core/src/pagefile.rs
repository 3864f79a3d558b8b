use std::collections::BTreeMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ParseError;

/// One stored diff of a page, keyed by the time of the revision that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFileRevision {
    pub time: DateTime<Utc>,
    pub author: Option<String>,
    pub host: Option<IpAddr>,
    /// Raw diff body. Parsed only when the history is walked.
    pub diff_text: Option<String>,
    /// The earlier revision this diff leads to.
    pub diff_against: Option<DateTime<Utc>>,
}

impl PageFileRevision {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time,
            author: None,
            host: None,
            diff_text: None,
            diff_against: None,
        }
    }
}

/// A PmWiki page including its stored history.
///
/// Parsed once from a `wiki.d` file and read-only afterwards. Reconstructed
/// snapshots reuse the type with an empty revision map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageFile {
    pub version: String,
    pub name: String,
    pub time: Option<DateTime<Utc>>,
    pub text: String,
    pub author: String,
    pub host: Option<IpAddr>,
    pub rev: i64,
    pub revisions: BTreeMap<DateTime<Utc>, PageFileRevision>,
    /// Deletion time, taken from the storage file name rather than its content.
    pub deleted: Option<DateTime<Utc>>,
}

impl PageFile {
    /// Whether this page (or snapshot) represents a deletion.
    pub fn is_deletion(&self) -> bool {
        self.text.is_empty()
    }
}

/// Parse decimal Unix seconds into a UTC timestamp.
pub fn parse_unix_timestamp(value: &str) -> Result<DateTime<Utc>, ParseError> {
    value
        .parse::<i64>()
        .ok()
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .ok_or_else(|| ParseError::InvalidTimestamp(value.to_string()))
}

/// Stable chronological sort of pages or snapshots. Entries without a time go first.
pub fn sort_by_time(pages: &mut [PageFile]) {
    pages.sort_by_key(|page| page.time);
}
