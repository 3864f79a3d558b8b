use std::borrow::Cow;
use std::collections::BTreeSet;
use std::net::IpAddr;

use percent_encoding::percent_decode_str;

use crate::error::ParseError;
use crate::pagefile::{PageFile, PageFileRevision, parse_unix_timestamp};
use crate::pagefile_lex::{PageFileLexer, PageFileToken, lex_page_file};

/// Fields of a page that may appear at most once without key options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MainField {
    Name,
    Time,
    Text,
    Author,
    Host,
    Rev,
}

impl MainField {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "name" => Some(Self::Name),
            "time" => Some(Self::Time),
            "text" => Some(Self::Text),
            "author" => Some(Self::Author),
            "host" => Some(Self::Host),
            "rev" => Some(Self::Rev),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Time => "time",
            Self::Text => "text",
            Self::Author => "author",
            Self::Host => "host",
            Self::Rev => "rev",
        }
    }
}

/// Revision scoped fields, i.e. `key:<time>[:...]=value` items we care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RevisionField {
    Author,
    Host,
    Diff,
}

impl RevisionField {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "author" => Some(Self::Author),
            "host" => Some(Self::Host),
            "diff" => Some(Self::Diff),
            _ => None,
        }
    }
}

struct PageFileParser<'a> {
    tokens: PageFileLexer<'a>,
    urlencoded: bool,
    seen: BTreeSet<MainField>,
    page: PageFile,
}

/// Parse PmWiki's PageFileFormat into a [`PageFile`].
///
/// Diff bodies are stored verbatim and only parsed when the history is walked,
/// so a malformed diff never fails this call.
pub fn parse_page_file(input: &str) -> Result<PageFile, ParseError> {
    let mut parser = PageFileParser {
        tokens: lex_page_file(input),
        urlencoded: false,
        seen: BTreeSet::new(),
        page: PageFile::default(),
    };
    parser.parse_version()?;
    parser.parse_fields()?;
    Ok(parser.page)
}

impl PageFileParser<'_> {
    fn next_token(&mut self) -> Result<PageFileToken, ParseError> {
        Ok(self.tokens.next().unwrap_or(Ok(PageFileToken::Eof))?)
    }

    fn parse_version(&mut self) -> Result<(), ParseError> {
        match self.next_token()? {
            PageFileToken::Key(key) if key == "version" => {}
            other => return Err(ParseError::MissingVersion(format!("{other:?}"))),
        }
        match self.next_token()? {
            PageFileToken::Value(version) => {
                self.urlencoded = version.contains("urlencoded=1");
                self.page.version = version;
                Ok(())
            }
            other => Err(ParseError::MissingVersion(format!("{other:?}"))),
        }
    }

    fn parse_fields(&mut self) -> Result<(), ParseError> {
        loop {
            let key = match self.next_token()? {
                PageFileToken::Key(key) => key,
                PageFileToken::Eof => return Ok(()),
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "key",
                        found: format!("{other:?}"),
                    });
                }
            };

            let mut opts = Vec::new();
            let value = loop {
                match self.next_token()? {
                    PageFileToken::KeyOpt(opt) => opts.push(opt),
                    PageFileToken::Value(value) => break self.decode(value)?,
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            expected: "key option or value",
                            found: format!("{other:?}"),
                        });
                    }
                }
            };

            if opts.is_empty() {
                self.set_main_field(&key, value)?;
            } else {
                self.set_revision_field(&key, value, &opts)?;
            }
        }
    }

    /// Percent-decode a value if the version banner asked for it. A `+` stays a
    /// literal plus sign and every `%` must start a two digit hex escape.
    fn decode(&self, value: String) -> Result<String, ParseError> {
        if !self.urlencoded {
            return Ok(value);
        }
        if let Some(escape) = malformed_escape(&value) {
            return Err(ParseError::InvalidEncoding(format!(
                "invalid escape {escape:?}"
            )));
        }
        percent_decode_str(&value)
            .decode_utf8()
            .map(Cow::into_owned)
            .map_err(|err| ParseError::InvalidEncoding(err.to_string()))
    }

    fn set_main_field(&mut self, key: &str, value: String) -> Result<(), ParseError> {
        let Some(field) = MainField::from_key(key) else {
            return Ok(());
        };
        if !self.seen.insert(field) {
            return Err(ParseError::DuplicateField(field.as_str()));
        }

        match field {
            MainField::Name => self.page.name = value,
            MainField::Time => self.page.time = Some(parse_unix_timestamp(&value)?),
            MainField::Text => self.page.text = value,
            MainField::Author => self.page.author = value,
            MainField::Host => self.page.host = Some(parse_host(&value)?),
            MainField::Rev => {
                self.page.rev = value
                    .parse()
                    .map_err(|_| ParseError::InvalidRev(value.clone()))?;
            }
        }
        Ok(())
    }

    fn set_revision_field(
        &mut self,
        key: &str,
        value: String,
        opts: &[String],
    ) -> Result<(), ParseError> {
        // PmWiki leaves duplicate empty items behind, e.g. `diff:1:0:=`.
        if value.is_empty() {
            return Ok(());
        }
        // Only items keyed by a revision time are of interest.
        let Ok(time) = parse_unix_timestamp(&opts[0]) else {
            return Ok(());
        };
        let Some(field) = RevisionField::from_key(key) else {
            return Ok(());
        };

        let revision = self
            .page
            .revisions
            .entry(time)
            .or_insert_with(|| PageFileRevision::new(time));

        match field {
            RevisionField::Author => {
                if revision.author.is_some() {
                    return Err(ParseError::DuplicateRevisionField {
                        field: "author",
                        time,
                    });
                }
                revision.author = Some(value);
            }
            RevisionField::Host => {
                if revision.host.is_some() {
                    return Err(ParseError::DuplicateRevisionField {
                        field: "host",
                        time,
                    });
                }
                revision.host = Some(parse_host(&value)?);
            }
            RevisionField::Diff => {
                if revision.diff_text.is_some() || revision.diff_against.is_some() {
                    return Err(ParseError::DuplicateRevisionField {
                        field: "diff",
                        time,
                    });
                }
                let against = opts.get(1).ok_or(ParseError::MissingDiffAgainst(time))?;
                revision.diff_against = Some(parse_unix_timestamp(against)?);
                revision.diff_text = Some(value);
            }
        }
        Ok(())
    }
}

fn parse_host(value: &str) -> Result<IpAddr, ParseError> {
    value
        .parse()
        .map_err(|_| ParseError::InvalidHost(value.to_string()))
}

/// The first `%` escape not followed by two hex digits, with up to two
/// characters after it.
fn malformed_escape(value: &str) -> Option<&str> {
    value.match_indices('%').find_map(|(start, _)| {
        let digits = value.as_bytes().get(start + 1..start + 3);
        match digits {
            Some([high, low]) if high.is_ascii_hexdigit() && low.is_ascii_hexdigit() => None,
            _ => {
                let end = value[start + 1..]
                    .char_indices()
                    .nth(2)
                    .map_or(value.len(), |(offset, _)| start + 1 + offset);
                Some(&value[start..end])
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    const VERSION: &str = "version=pmwiki-2.1.0 urlencoded=1\n";

    fn parse(body: &str) -> Result<PageFile, ParseError> {
        parse_page_file(&format!("{VERSION}{body}"))
    }

    #[test]
    fn parses_version_only() {
        let page = parse("").expect("parse");
        assert_eq!(page.version, "pmwiki-2.1.0 urlencoded=1");
        assert!(page.revisions.is_empty());
    }

    #[test]
    fn parses_all_main_fields() {
        let page = parse_page_file(
            "version=v urlencoded=1\nname=A\ntime=100\nauthor=u\nhost=::1\nrev=3\ntext=hi\n",
        )
        .expect("parse");

        assert_eq!(page.name, "A");
        assert_eq!(page.time, DateTime::from_timestamp(100, 0));
        assert_eq!(page.author, "u");
        assert_eq!(page.host, Some("::1".parse().expect("ip")));
        assert_eq!(page.rev, 3);
        assert_eq!(page.text, "hi");
        assert!(page.revisions.is_empty());
        assert_eq!(page.deleted, None);
    }

    #[test]
    fn decodes_urlencoded_text() {
        let page = parse("text=%0ahello%0aworld\n").expect("parse");
        assert_eq!(page.text, "\nhello\nworld");
    }

    #[test]
    fn plus_sign_stays_literal() {
        let page = parse("text=1+1%2b1\n").expect("parse");
        assert_eq!(page.text, "1+1+1");
    }

    #[test]
    fn plain_values_are_not_decoded() {
        let page = parse_page_file("version=pmwiki-1.0\ntext=a%0ab\n").expect("parse");
        assert_eq!(page.text, "a%0ab");
    }

    #[test]
    fn ignores_unknown_main_fields() {
        let page = parse("random=data\nctime=1142030000\n").expect("parse");
        assert_eq!(page, PageFile {
            version: "pmwiki-2.1.0 urlencoded=1".to_string(),
            ..PageFile::default()
        });
    }

    #[test]
    fn indexes_revision_by_time() {
        let page = parse("text=t\nhost:42=::1\ndiff:42:23:=0a1%0a> add%0a\n").expect("parse");

        assert_eq!(page.revisions.len(), 1);
        let time = DateTime::from_timestamp(42, 0).expect("time");
        let revision = &page.revisions[&time];
        assert_eq!(revision.time, time);
        assert_eq!(revision.host, Some("::1".parse().expect("ip")));
        assert_eq!(revision.diff_against, DateTime::from_timestamp(23, 0));
        assert_eq!(revision.diff_text.as_deref(), Some("0a1\n> add\n"));
        assert_eq!(revision.author, None);
    }

    #[test]
    fn ignores_unsupported_key_options() {
        for body in ["text=t\nfoo:bar=buz\n", "text=t\nfoo:23=buz\n"] {
            let page = parse(body).expect("parse");
            assert!(page.revisions.is_empty(), "{body:?}");
        }
    }

    #[test]
    fn skips_empty_revision_items() {
        let page = parse("diff:42:23:=\ndiff:42:23:=\nauthor:42=\n").expect("parse");
        assert!(page.revisions.is_empty());
    }

    #[test]
    fn rejects_invalid_page_files() {
        let cases = [
            ("empty", ""),
            ("not starting with version", "foo=bar\nversion=pmwiki-2.1.0 urlencoded=1\n"),
            ("version with keyopts", "version:nope=pmwiki-23.42\n"),
            ("early eof", "version=pmwiki-2.1.0 urlencoded=1\ntext=Markup text"),
            ("invalid time", "version=v\ntime=0xacab\n"),
            ("invalid host", "version=v\nhost=dtn://host/\n"),
            ("invalid rev", "version=v\nrev=latest and greatest\n"),
            ("invalid revision host", "version=v\nhost:42=nope\n"),
            ("diff without against", "version=v\ndiff:42=0a1\n"),
            ("diff with invalid against", "version=v\ndiff:42:yesterday:=0a1\n"),
        ];
        for (name, input) in cases {
            assert!(parse_page_file(input).is_err(), "{name} did not fail");
        }
    }

    #[test]
    fn rejects_malformed_percent_escapes() {
        for value in ["bad%zz", "end%4", "end%", "%g0", "caf%e"] {
            let input = format!("version=pmwiki-2.2.106 urlencoded=1\ntext={value}\n");
            assert!(
                matches!(parse_page_file(&input), Err(ParseError::InvalidEncoding(_))),
                "{value} was accepted"
            );
        }
        let page = parse_page_file("version=pmwiki-2.2.106 urlencoded=1\ntext=100%25 %C3%A9\n")
            .expect("parse");
        assert_eq!(page.text, "100% \u{e9}");

        let raw = parse_page_file("version=pmwiki-0.6\ntext=50%zz\n").expect("parse");
        assert_eq!(raw.text, "50%zz");
    }

    #[test]
    fn rejects_duplicate_main_fields() {
        let fields = [
            ("name", "a"),
            ("time", "123456"),
            ("text", "foo"),
            ("author", "foo"),
            ("host", "2001:db8::1"),
            ("rev", "1"),
        ];
        for (key, value) in fields {
            let input = format!("version=v\n{key}={value}\n{key}={value}\n");
            assert_eq!(
                parse_page_file(&input),
                Err(ParseError::DuplicateField(key)),
                "{key}"
            );
        }
        assert!(parse_page_file("version=v\nname=a\nname=b\n").is_err());
    }

    #[test]
    fn rejects_duplicate_revision_fields() {
        let time = DateTime::from_timestamp(42, 0).expect("time");
        for (field, body) in [
            ("author", "author:42=a\nauthor:42=b\n"),
            ("host", "host:42=::1\nhost:42=::2\n"),
            ("diff", "diff:42:23:=0a1%0a\ndiff:42:23:=0a1%0a\n"),
        ] {
            assert_eq!(
                parse(body),
                Err(ParseError::DuplicateRevisionField { field, time }),
                "{field}"
            );
        }
    }
}
