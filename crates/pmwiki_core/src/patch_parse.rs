use std::iter::Peekable;

use crate::error::ParseError;
use crate::patch::{Patch, PatchAction, PatchMode};
use crate::patch_lex::{PatchLexer, PatchToken, lex_patch};

struct PatchParser<'a> {
    tokens: Peekable<PatchLexer<'a>>,
}

/// Parse a stored diff into a [`Patch`]. Nothing is returned for a diff that
/// fails half way through.
pub fn parse_patch(data: &str) -> Result<Patch, ParseError> {
    let mut parser = PatchParser {
        tokens: lex_patch(data).peekable(),
    };
    let mut actions = Vec::new();
    while let Some(action) = parser.parse_hunk()? {
        actions.push(action);
    }
    Ok(Patch::new(actions))
}

impl PatchParser<'_> {
    fn next_token(&mut self) -> Result<PatchToken, ParseError> {
        Ok(self.tokens.next().unwrap_or(Ok(PatchToken::Eof))?)
    }

    /// Parses the next `<range><mode><range>` header and its lines, or `None` at the end.
    fn parse_hunk(&mut self) -> Result<Option<PatchAction>, ParseError> {
        let start_line = match self.next_token()? {
            PatchToken::Eof => return Ok(None),
            PatchToken::Range(range) => parse_start_line(&range)?,
            other => return Err(unexpected("hunk header", other)),
        };
        let mode = match self.next_token()? {
            PatchToken::Mode('a') => PatchMode::Addition,
            PatchToken::Mode('d') => PatchMode::Deletion,
            PatchToken::Mode('c') => PatchMode::Change,
            PatchToken::Mode(other) => return Err(ParseError::InvalidMode(other)),
            other => return Err(unexpected("hunk mode", other)),
        };
        match self.next_token()? {
            PatchToken::Range(_) => {}
            other => return Err(unexpected("hunk range", other)),
        }

        let mut action = PatchAction::new(mode, start_line);
        if mode != PatchMode::Addition {
            action.deletion_lines = self.collect_deletions();
        }
        if mode != PatchMode::Deletion {
            action.addition_lines = self.collect_additions();
        }
        Ok(Some(action))
    }

    fn collect_additions(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(Ok(PatchToken::Addition(line))) = self
            .tokens
            .next_if(|token| matches!(token, Ok(PatchToken::Addition(_))))
        {
            lines.push(line);
        }
        lines
    }

    fn collect_deletions(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(Ok(PatchToken::Deletion(line))) = self
            .tokens
            .next_if(|token| matches!(token, Ok(PatchToken::Deletion(_))))
        {
            lines.push(line);
        }
        lines
    }
}

fn parse_start_line(range: &str) -> Result<usize, ParseError> {
    range
        .split(',')
        .next()
        .and_then(|start| start.parse().ok())
        .ok_or_else(|| ParseError::InvalidRange(range.to_string()))
}

fn unexpected(expected: &'static str, found: PatchToken) -> ParseError {
    ParseError::UnexpectedToken {
        expected,
        found: format!("{found:?}"),
    }
}
