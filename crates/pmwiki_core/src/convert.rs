use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::pagefile::{PageFile, sort_by_time};
use crate::scan::{StoredPage, load_page, scan_pages};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Abort on the first page that cannot be read or rebuilt.
    pub fail_fast: bool,
}

/// Every snapshot of a `wiki.d` directory in commit order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertReport {
    pub snapshots: Vec<PageFile>,
    pub pages: usize,
    pub failed_pages: usize,
}

/// Scan `dir`, rebuild each page's history and sort all snapshots by time.
///
/// A failing page is logged and counted. Snapshots it produced before failing
/// are kept.
pub fn collect_snapshots(dir: &Path, options: ConvertOptions) -> Result<ConvertReport> {
    let stored = scan_pages(dir)?;
    let mut report = ConvertReport::default();

    for page in &stored {
        report.pages += 1;
        if let Err(err) = page_snapshots(page, &mut report.snapshots) {
            if options.fail_fast {
                return Err(err);
            }
            report.failed_pages += 1;
            error!(file = %page.identifier, error = %format!("{err:#}"), "skipping rest of page");
        }
    }

    sort_by_time(&mut report.snapshots);
    info!(
        pages = report.pages,
        failed = report.failed_pages,
        snapshots = report.snapshots.len(),
        "collected page revisions"
    );
    Ok(report)
}

fn page_snapshots(stored: &StoredPage, out: &mut Vec<PageFile>) -> Result<()> {
    let page = load_page(stored)?;
    for snapshot in page.revisions() {
        let snapshot =
            snapshot.with_context(|| format!("cannot rebuild history of {}", page.name))?;
        out.push(snapshot);
    }
    Ok(())
}
