//! Tokenizer for the traditional ("normal") diff output PmWiki stores per revision.

use crate::error::LexError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchToken {
    /// Line range of a hunk header, e.g. `2` or `2,5`.
    Range(String),
    /// Hunk mode between the two ranges: `a`, `d` or `c`.
    Mode(char),
    /// Content of a `>` line.
    Addition(String),
    /// Content of a `<` line.
    Deletion(String),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Addition,
    Deletion,
}

impl LineKind {
    fn marker(self) -> char {
        match self {
            Self::Addition => '>',
            Self::Deletion => '<',
        }
    }

    fn token(self, content: String) -> PatchToken {
        match self {
            Self::Addition => PatchToken::Addition(content),
            Self::Deletion => PatchToken::Deletion(content),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Begin,
    Range,
    Mode,
    Done,
}

pub struct PatchLexer<'a> {
    data: &'a str,
    start: usize,
    pos: usize,
    line: usize,
    state: State,
}

/// Start tokenizing a diff body.
pub fn lex_patch(data: &str) -> PatchLexer<'_> {
    PatchLexer {
        data,
        start: 0,
        pos: 0,
        line: 1,
        state: State::Begin,
    }
}

impl PatchLexer<'_> {
    fn peek(&self) -> Option<char> {
        self.data[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn backup(&mut self, ch: char) {
        self.pos -= ch.len_utf8();
    }

    fn ignore(&mut self) {
        self.start = self.pos;
    }

    fn take(&mut self) -> String {
        let taken = self.data[self.start..self.pos].to_string();
        self.start = self.pos;
        taken
    }

    fn unexpected(&self, found: Option<char>, context: &'static str) -> LexError {
        match found {
            Some(found) => LexError::UnexpectedChar {
                line: self.line,
                found,
                context,
            },
            None => LexError::UnexpectedEnd { line: self.line },
        }
    }

    fn lex_begin(&mut self) -> Result<PatchToken, LexError> {
        loop {
            let Some(ch) = self.peek() else {
                self.state = State::Done;
                return Ok(PatchToken::Eof);
            };
            match ch {
                '\n' => {
                    self.bump();
                    self.line += 1;
                    self.ignore();
                }
                '-' => self.lex_separator()?,
                '>' => return self.lex_line(LineKind::Addition),
                '<' => return self.lex_line(LineKind::Deletion),
                ch if ch.is_ascii_digit() => return self.lex_range(),
                other => return Err(self.unexpected(Some(other), "at line start")),
            }
        }
    }

    fn lex_range(&mut self) -> Result<PatchToken, LexError> {
        let mut had_comma = false;
        loop {
            match self.bump() {
                Some(ch) if ch.is_ascii_digit() => {}
                Some(',') if had_comma => return Err(LexError::DoubleComma { line: self.line }),
                Some(',') => had_comma = true,
                Some(ch @ ('a' | 'd' | 'c')) => {
                    self.backup(ch);
                    self.state = State::Mode;
                    return Ok(PatchToken::Range(self.take()));
                }
                Some('\n') => {
                    self.backup('\n');
                    self.state = State::Begin;
                    return Ok(PatchToken::Range(self.take()));
                }
                other => return Err(self.unexpected(other, "within range")),
            }
        }
    }

    fn lex_mode(&mut self) -> Result<PatchToken, LexError> {
        match self.bump() {
            Some(mode @ ('a' | 'd' | 'c')) => {
                self.ignore();
                self.state = State::Range;
                Ok(PatchToken::Mode(mode))
            }
            other => Err(self.unexpected(other, "as hunk mode")),
        }
    }

    /// Lexes a `>` or `<` line: the marker followed by either a newline or a
    /// single space and the line content.
    fn lex_line(&mut self, kind: LineKind) -> Result<PatchToken, LexError> {
        match self.bump() {
            Some(marker) if marker == kind.marker() => self.ignore(),
            other => return Err(self.unexpected(other, "as line marker")),
        }
        match self.bump() {
            Some('\n') => {
                self.backup('\n');
                self.state = State::Begin;
                return Ok(kind.token(String::new()));
            }
            Some(' ') => self.ignore(),
            other => return Err(self.unexpected(other, "after line marker")),
        }
        loop {
            match self.bump() {
                Some('\n') => {
                    self.backup('\n');
                    self.state = State::Begin;
                    return Ok(kind.token(self.take()));
                }
                Some(_) => {}
                None => return Err(LexError::UnexpectedEnd { line: self.line }),
            }
        }
    }

    /// Consumes the `---` line between the deletions and additions of a change.
    fn lex_separator(&mut self) -> Result<(), LexError> {
        for expected in "---\n".chars() {
            match self.bump() {
                Some(ch) if ch == expected => {}
                other => return Err(self.unexpected(other, "in change separator")),
            }
        }
        self.line += 1;
        self.ignore();
        Ok(())
    }
}

impl Iterator for PatchLexer<'_> {
    type Item = Result<PatchToken, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = match self.state {
            State::Done => return None,
            State::Begin => self.lex_begin(),
            State::Range => self.lex_range(),
            State::Mode => self.lex_mode(),
        };
        if item.is_err() {
            self.state = State::Done;
        }
        Some(item)
    }
}
