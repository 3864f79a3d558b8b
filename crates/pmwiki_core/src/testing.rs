//! Shared fixtures for unit tests.

use std::ops::Range;

use similar::{Algorithm, DiffTag, capture_diff_slices};

/// The usage example of the `diff` article on Wikipedia.
pub const WIKIPEDIA_DIFF: &str = "0a1,6\n> This is an important\n> notice! It should\n\
    > therefore be located at\n> the beginning of this\n> document!\n>\n11,15d16\n\
    < This paragraph contains\n< text that is outdated.\n< It will be deleted in the\n\
    < near future.\n<\n17c18\n< check this dokument. On\n---\n> check this document. On\n\
    24a26,29\n>\n> This paragraph contains\n> important new additions\n> to this document.\n";

pub const WIKIPEDIA_BEFORE: &str = "This part of the\ndocument has stayed the\n\
    same from version to\nversion.  It shouldn't\nbe shown if it doesn't\n\
    change.  Otherwise, that\nwould not be helping to\ncompress the size of the\n\
    changes.\n\nThis paragraph contains\ntext that is outdated.\nIt will be deleted in the\n\
    near future.\n\nIt is important to spell\ncheck this dokument. On\nthe other hand, a\n\
    misspelled word isn't\nthe end of the world.\nNothing in the rest of\n\
    this paragraph needs to\nbe changed. Things can\nbe added after it.";

pub const WIKIPEDIA_AFTER: &str = "This is an important\nnotice! It should\n\
    therefore be located at\nthe beginning of this\ndocument!\n\nThis part of the\n\
    document has stayed the\nsame from version to\nversion.  It shouldn't\n\
    be shown if it doesn't\nchange.  Otherwise, that\nwould not be helping to\n\
    compress the size of the\nchanges.\n\nIt is important to spell\n\
    check this document. On\nthe other hand, a\nmisspelled word isn't\n\
    the end of the world.\nNothing in the rest of\nthis paragraph needs to\n\
    be changed. Things can\nbe added after it.\n\nThis paragraph contains\n\
    important new additions\nto this document.\n";

/// A real page of the hsmr wiki, four revisions deep.
pub const SIEBTER_PAGE: &str = include_str!("../tests/fixtures/Events.2020-11-07-Siebter");

/// Render the line difference of two texts the way `diff` without options does.
///
/// Adjacent deletions and insertions form one `c` hunk, as in `diff` output.
pub fn normal_diff(old: &str, new: &str) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let mut hunks: Vec<(Range<usize>, Range<usize>)> = Vec::new();
    let mut previous_equal = true;

    for op in capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            previous_equal = true;
            continue;
        }
        match hunks.last_mut() {
            Some((old_hunk, new_hunk)) if !previous_equal => {
                old_hunk.end = old_range.end;
                new_hunk.end = new_range.end;
            }
            _ => hunks.push((old_range, new_range)),
        }
        previous_equal = false;
    }

    let mut out = String::new();
    for (old_range, new_range) in hunks {
        let old_span = span(old_range.start + 1, old_range.end);
        let new_span = span(new_range.start + 1, new_range.end);
        if old_range.is_empty() {
            out.push_str(&format!("{}a{new_span}\n", old_range.start));
        } else if new_range.is_empty() {
            out.push_str(&format!("{old_span}d{}\n", new_range.start));
        } else {
            out.push_str(&format!("{old_span}c{new_span}\n"));
        }
        for line in &old_lines[old_range.clone()] {
            push_line(&mut out, '<', line);
        }
        if !old_range.is_empty() && !new_range.is_empty() {
            out.push_str("---\n");
        }
        for line in &new_lines[new_range] {
            push_line(&mut out, '>', line);
        }
    }
    out
}

fn span(first: usize, last: usize) -> String {
    if last <= first {
        first.to_string()
    } else {
        format!("{first},{last}")
    }
}

fn push_line(out: &mut String, marker: char, line: &str) {
    out.push(marker);
    if !line.is_empty() {
        out.push(' ');
        out.push_str(line);
    }
    out.push('\n');
}
