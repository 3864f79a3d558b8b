//! Recovers the full history of PmWiki pages from their `wiki.d` storage files.
//!
//! A page file keeps the current text plus one reverse diff per revision.
//! [`PageFile::revisions`] walks those diffs backwards, [`convert`] gathers the
//! snapshots of a whole directory and [`git`] replays them as commits.

pub mod config;
pub mod convert;
pub mod error;
pub mod git;
pub mod history;
pub mod pagefile;
pub mod pagefile_lex;
pub mod pagefile_parse;
pub mod patch;
pub mod patch_lex;
pub mod patch_parse;
pub mod scan;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ApplyError, LexError, ParseError, ReconstructionError};
pub use history::Revisions;
pub use pagefile::{PageFile, PageFileRevision, sort_by_time};
pub use pagefile_parse::parse_page_file;
pub use patch::{Patch, PatchAction, PatchMode};
pub use patch_parse::parse_patch;
