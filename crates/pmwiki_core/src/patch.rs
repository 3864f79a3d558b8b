use crate::error::ApplyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchMode {
    Addition,
    Deletion,
    /// Deletion and addition at the same position.
    Change,
}

impl PatchMode {
    fn deletes(self) -> bool {
        matches!(self, Self::Deletion | Self::Change)
    }
}

/// One hunk of a traditional diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchAction {
    pub mode: PatchMode,
    /// Line of the pre-image this hunk is anchored at, as written in its header.
    pub start_line: usize,
    pub addition_lines: Vec<String>,
    pub deletion_lines: Vec<String>,
}

impl PatchAction {
    pub fn new(mode: PatchMode, start_line: usize) -> Self {
        Self {
            mode,
            start_line,
            addition_lines: Vec::new(),
            deletion_lines: Vec::new(),
        }
    }

    fn write_additions(&self, out: &mut String) {
        for line in &self.addition_lines {
            out.push_str(line);
            out.push('\n');
        }
    }
}

/// The difference between two revisions, as stored in a `diff:` item.
///
/// Hunks keep the order of the diff they were parsed from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    actions: Vec<PatchAction>,
}

impl Patch {
    pub fn new(actions: Vec<PatchAction>) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &[PatchAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Apply this patch to `input`, returning the patched text.
    ///
    /// Every output line is newline terminated. A hunk anchored behind the end
    /// of the input means the patch does not belong to this text and fails with
    /// [`ApplyError::Unapplied`].
    pub fn apply(&self, input: &str) -> Result<String, ApplyError> {
        let mut lines = input.lines();
        let mut actions = self.actions.iter().peekable();
        let mut out = String::with_capacity(input.len());
        let mut line = 0;

        loop {
            // Deletions and changes consume the lines they replace.
            if let Some(action) = actions.next_if(|a| a.mode.deletes() && a.start_line == line) {
                delete_lines(action, &mut lines, line)?;
                if action.mode == PatchMode::Change {
                    action.write_additions(&mut out);
                }
                line += action.deletion_lines.len();
            }

            // Copy one line, except before the first one so additions at line
            // zero land in front of the text.
            if line > 0 {
                let Some(copied) = lines.next() else {
                    break;
                };
                out.push_str(copied);
                out.push('\n');
            }

            if let Some(action) =
                actions.next_if(|a| a.mode == PatchMode::Addition && a.start_line == line)
            {
                action.write_additions(&mut out);
            }

            line += 1;
        }

        if let Some(action) = actions.next() {
            return Err(ApplyError::Unapplied {
                start_line: action.start_line,
            });
        }
        Ok(out)
    }
}

fn delete_lines<'a>(
    action: &PatchAction,
    lines: &mut impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<(), ApplyError> {
    for (offset, expected) in action.deletion_lines.iter().enumerate() {
        let Some(found) = lines.next() else {
            return Err(ApplyError::Exhausted {
                line: line + offset,
                expected: expected.clone(),
            });
        };
        if !deletion_matches(found, expected) {
            return Err(ApplyError::Mismatch {
                line: line + offset,
                expected: expected.clone(),
                found: found.to_string(),
            });
        }
    }
    Ok(())
}

/// PmWiki sometimes truncates whitespace in stored diffs, so lines also match
/// once surrounding whitespace is trimmed.
///
/// Both sides are trimmed, not only the stored line: `"  x  "` in the text
/// matches a stored `x`. This is looser than PmWiki itself, which only trims
/// the stored line.
fn deletion_matches(found: &str, expected: &str) -> bool {
    found == expected || found.trim() == expected.trim()
}
