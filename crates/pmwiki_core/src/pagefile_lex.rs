//! Tokenizer for PmWiki's PageFileFormat.
//!
//! Every record line has the shape `field[:opt]*=value\n`. The lexer is a pull
//! based state machine: each call to [`Iterator::next`] runs the current state
//! until it produces exactly one token.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::LexError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageFileToken {
    /// First field name of a line.
    Key(String),
    /// Additional colon separated options of the preceding key.
    KeyOpt(String),
    /// Everything after the first `=` up to the end of the line.
    Value(String),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Key,
    KeyOpt,
}

impl FieldKind {
    fn token(self, field: String) -> PageFileToken {
        match self {
            Self::Key => PageFileToken::Key(field),
            Self::KeyOpt => PageFileToken::KeyOpt(field),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Begin,
    Field(FieldKind),
    Value,
    Done,
}

pub struct PageFileLexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    state: State,
}

/// Start tokenizing a page file.
pub fn lex_page_file(input: &str) -> PageFileLexer<'_> {
    PageFileLexer {
        chars: input.chars().peekable(),
        line: 1,
        state: State::Begin,
    }
}

impl PageFileLexer<'_> {
    fn lex_begin(&mut self) -> Result<PageFileToken, LexError> {
        if self.chars.peek().is_none() {
            self.state = State::Done;
            return Ok(PageFileToken::Eof);
        }
        self.lex_field(FieldKind::Key)
    }

    fn lex_field(&mut self, kind: FieldKind) -> Result<PageFileToken, LexError> {
        let mut field = String::new();
        loop {
            match self.chars.next() {
                None => return Err(LexError::UnexpectedEnd { line: self.line }),
                Some(':') => {
                    self.state = State::Field(FieldKind::KeyOpt);
                    return Ok(kind.token(field));
                }
                Some('=') => {
                    self.state = State::Value;
                    return Ok(kind.token(field));
                }
                Some(ch) if ch.is_whitespace() => {
                    return Err(LexError::UnexpectedWhitespace { line: self.line });
                }
                Some(ch) => field.push(ch),
            }
        }
    }

    fn lex_value(&mut self) -> Result<PageFileToken, LexError> {
        let mut value = String::new();
        loop {
            match self.chars.next() {
                None => return Err(LexError::UnexpectedEnd { line: self.line }),
                Some('\n') => {
                    self.line += 1;
                    self.state = State::Begin;
                    return Ok(PageFileToken::Value(value));
                }
                Some(ch) => value.push(ch),
            }
        }
    }
}

impl Iterator for PageFileLexer<'_> {
    type Item = Result<PageFileToken, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = match self.state {
            State::Done => return None,
            State::Begin => self.lex_begin(),
            State::Field(kind) => self.lex_field(kind),
            State::Value => self.lex_value(),
        };
        if item.is_err() {
            self.state = State::Done;
        }
        Some(item)
    }
}
