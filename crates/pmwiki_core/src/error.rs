use chrono::{DateTime, Utc};
use thiserror::Error;

/// Malformed input detected while tokenizing a page file or a stored diff.
///
/// Line numbers are 1-based and refer to the text handed to the lexer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("line {line}: unexpected end of input")]
    UnexpectedEnd { line: usize },

    #[error("line {line}: unexpected white space in field name")]
    UnexpectedWhitespace { line: usize },

    #[error("line {line}: unexpected character {found:?} {context}")]
    UnexpectedChar {
        line: usize,
        found: char,
        context: &'static str,
    },

    #[error("line {line}: range contains more than one comma")]
    DoubleComma { line: usize },
}

/// A well-formed token stream that does not describe a valid page file or patch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("no version banner: {0}")]
    MissingVersion(String),

    #[error("expected {expected}, received {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    #[error("{0} field was already set")]
    DuplicateField(&'static str),

    #[error("{field} field of revision {time} was already set")]
    DuplicateRevisionField {
        field: &'static str,
        time: DateTime<Utc>,
    },

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("invalid host {0:?}")]
    InvalidHost(String),

    #[error("invalid rev {0:?}")]
    InvalidRev(String),

    #[error("URL decoding value failed: {0}")]
    InvalidEncoding(String),

    #[error("diff of revision {0} requires at least two key options")]
    MissingDiffAgainst(DateTime<Utc>),

    #[error("invalid hunk range {0:?}")]
    InvalidRange(String),

    #[error("invalid hunk mode {0:?}")]
    InvalidMode(char),
}

/// A patch that does not fit the text it is applied to.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("line {line}: expected {expected:?}, got {found:?}")]
    Mismatch {
        line: usize,
        expected: String,
        found: String,
    },

    #[error("line {line}: input ended while deleting {expected:?}")]
    Exhausted { line: usize, expected: String },

    #[error("hunk at line {start_line} lies beyond the end of the text")]
    Unapplied { start_line: usize },
}

/// Failure while walking a page's revision chain. Snapshots produced before it stay valid.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconstructionError {
    #[error("revision {rev} is missing")]
    MissingRevision { rev: i64 },

    #[error("revision number {rev} has no neighbouring number")]
    RevOutOfRange { rev: i64 },

    #[error("revision {rev} cannot be rebuilt, malformed diff: {source}")]
    Patch {
        rev: i64,
        #[source]
        source: ParseError,
    },

    #[error("revision {rev} cannot be rebuilt, diff does not apply: {source}")]
    Apply {
        rev: i64,
        #[source]
        source: ApplyError,
    },
}
