use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, error};
use walkdir::WalkDir;

use crate::error::ParseError;
use crate::pagefile::{PageFile, parse_unix_timestamp};
use crate::pagefile_parse::parse_page_file;

const DELETION_MARKER: &str = ",del-";

/// A page file found in a `wiki.d` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPage {
    /// File name without a deletion marker, e.g. `Main.HomePage`.
    pub identifier: String,
    pub path: PathBuf,
    pub deleted: Option<DateTime<Utc>>,
}

impl StoredPage {
    /// Describe a single page file, e.g. one named on the command line.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("no usable file name in {}", path.display()))?;
        let (identifier, deleted) = deletion_marker(file_name)
            .with_context(|| format!("invalid deletion marker in {}", path.display()))?;
        Ok(Self {
            identifier: identifier.to_string(),
            path: path.to_path_buf(),
            deleted,
        })
    }
}

/// List the page files of a `wiki.d` directory, ordered by file name.
///
/// Dot-files and subdirectories are skipped, as are files whose deletion
/// marker does not hold a valid timestamp.
pub fn scan_pages(dir: &Path) -> Result<Vec<StoredPage>> {
    let mut pages = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        match StoredPage::from_path(entry.path()) {
            Ok(page) => pages.push(page),
            Err(err) => error!(error = %format!("{err:#}"), "skipping page file"),
        }
    }
    Ok(pages)
}

/// Split a storage file name like `Main.Old,del-1600000000` into the page
/// identifier and its deletion time.
pub fn deletion_marker(file_name: &str) -> Result<(&str, Option<DateTime<Utc>>), ParseError> {
    match file_name.rsplit_once(DELETION_MARKER) {
        Some((identifier, digits))
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            Ok((identifier, Some(parse_unix_timestamp(digits)?)))
        }
        _ => Ok((file_name, None)),
    }
}

/// Read and parse a stored page. Invalid UTF-8 is replaced rather than rejected.
pub fn load_page(stored: &StoredPage) -> Result<PageFile> {
    let bytes =
        fs::read(&stored.path).with_context(|| format!("failed to read {}", stored.path.display()))?;
    let content = String::from_utf8_lossy(&bytes);
    let mut page = parse_page_file(&content)
        .with_context(|| format!("failed to parse page file {}", stored.path.display()))?;
    if page.name.is_empty() {
        page.name = stored.identifier.clone();
    }
    page.deleted = stored.deleted;
    debug!(
        page = %page.name,
        revisions = page.revisions.len(),
        deleted = page.deleted.is_some(),
        "loaded page file"
    );
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SIEBTER_PAGE;
    use tempfile::tempdir;

    #[test]
    fn deletion_marker_extracts_timestamp() {
        let (identifier, deleted) = deletion_marker("Main.Old,del-1600000000").expect("marker");
        assert_eq!(identifier, "Main.Old");
        assert_eq!(deleted, DateTime::from_timestamp(1_600_000_000, 0));
    }

    #[test]
    fn deletion_marker_ignores_plain_names() {
        for name in ["Main.HomePage", "Main.Odd,del-", "Main.Odd,del-12a", "Main.Odd,del"] {
            assert_eq!(deletion_marker(name).expect("marker"), (name, None), "{name}");
        }
    }

    #[test]
    fn deletion_marker_rejects_out_of_range_timestamps() {
        assert!(deletion_marker("Main.Old,del-99999999999999999999").is_err());
    }

    #[test]
    fn scan_pages_skips_dot_files_and_directories() {
        let temp = tempdir().expect("tempdir");
        let wiki_d = temp.path();
        fs::write(wiki_d.join(".flock"), "").expect("write lock");
        fs::write(wiki_d.join(".pageindex"), "").expect("write index");
        fs::write(wiki_d.join("Main.HomePage"), "version=1\n").expect("write page");
        fs::write(wiki_d.join("Main.Gone,del-1600000000"), "version=1\n").expect("write page");
        fs::write(wiki_d.join("Main.Broken,del-99999999999999999999"), "version=1\n")
            .expect("write page");
        fs::create_dir(wiki_d.join("Site.Nested")).expect("mkdir");

        let pages = scan_pages(wiki_d).expect("scan");
        let names: Vec<_> = pages
            .iter()
            .map(|page| (page.identifier.as_str(), page.deleted.is_some()))
            .collect();
        assert_eq!(names, vec![("Main.Gone", true), ("Main.HomePage", false)]);
        assert_eq!(pages[1].path, wiki_d.join("Main.HomePage"));
    }

    #[test]
    fn stored_page_from_path_reads_marker() {
        let stored =
            StoredPage::from_path(Path::new("/srv/wiki.d/Main.Old,del-1600000000")).expect("page");
        assert_eq!(stored.identifier, "Main.Old");
        assert_eq!(stored.deleted, DateTime::from_timestamp(1_600_000_000, 0));

        assert!(StoredPage::from_path(Path::new("/")).is_err());
        assert!(StoredPage::from_path(Path::new("Main.Old,del-99999999999999999999")).is_err());
    }

    #[test]
    fn scan_pages_fails_for_missing_directory() {
        let temp = tempdir().expect("tempdir");
        assert!(scan_pages(&temp.path().join("nope")).is_err());
    }

    #[test]
    fn load_page_attaches_deletion_time() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("Events.2020-11-07-Siebter,del-1603500000");
        fs::write(&path, SIEBTER_PAGE).expect("write page");

        let pages = scan_pages(temp.path()).expect("scan");
        assert_eq!(pages.len(), 1);
        let page = load_page(&pages[0]).expect("load");
        assert_eq!(page.name, "Events.2020-11-07-Siebter");
        assert_eq!(page.deleted, DateTime::from_timestamp(1_603_500_000, 0));
        assert_eq!(page.rev, 4);
    }

    #[test]
    fn load_page_falls_back_to_identifier_and_tolerates_bad_utf8() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("Main.Latin1");
        fs::write(&path, b"version=pmwiki-0.6\ntext=caf\xe9\n").expect("write page");

        let stored = StoredPage {
            identifier: "Main.Latin1".to_string(),
            path,
            deleted: None,
        };
        let page = load_page(&stored).expect("load");
        assert_eq!(page.name, "Main.Latin1");
        assert_eq!(page.text, "caf\u{fffd}");
    }

    #[test]
    fn load_page_reports_parse_failures() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("Main.Junk");
        fs::write(&path, "not a page file").expect("write page");
        let stored = StoredPage {
            identifier: "Main.Junk".to_string(),
            path,
            deleted: None,
        };
        let error = load_page(&stored).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse page file"));
    }
}
