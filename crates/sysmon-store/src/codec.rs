//! Minimal RFC 4180 CSV encoding shared by the CSV backend and the exporter.
//!
//! Fields containing a comma, quote or line break are quoted and embedded
//! quotes doubled. The reader reports whether each record was terminated by
//! a line break so callers can ignore a trailing in-flight append.

use std::borrow::Cow;
use std::io::{self, Write};
use std::ops::Range;

/// Quotes a field if it needs quoting.
pub(crate) fn encode_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Writes one record followed by `\n`.
pub(crate) fn write_record<W: Write>(writer: &mut W, fields: &[&str]) -> io::Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            writer.write_all(b",")?;
        }
        writer.write_all(encode_field(field).as_bytes())?;
    }
    writer.write_all(b"\n")
}

/// One parsed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Record {
    /// 1-based line on which the record starts.
    pub line: usize,
    /// Decoded fields. Invalid UTF-8 is replaced and flagged in `malformed`.
    pub fields: Vec<String>,
    /// Byte range of the record in the input, line break included.
    pub span: Range<usize>,
    /// False if input ended before the record's line break.
    pub terminated: bool,
    /// Set when the record is broken: text after a closing quote, or bytes
    /// that are not UTF-8.
    pub malformed: Option<String>,
}

/// Iterator over the records of a CSV document. Blank lines are skipped.
///
/// Works on bytes: every delimiter is ASCII and cannot occur inside a
/// multi-byte UTF-8 sequence, so one undecodable record never hides the
/// records around it.
pub(crate) struct Records<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Records<'a> {
    pub(crate) const fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
        }
    }

    fn next_record(&mut self) -> Option<Record> {
        let start = self.pos;
        let rest = &self.input[start..];
        if rest.is_empty() {
            return None;
        }

        let start_line = self.line;
        let mut fields: Vec<Vec<u8>> = Vec::new();
        let mut field = Vec::new();
        let mut in_quotes = false;
        let mut after_quote = false;
        let mut malformed = None;
        let mut bytes = rest.iter().copied().enumerate().peekable();

        while let Some((offset, b)) = bytes.next() {
            if in_quotes {
                if b == b'"' {
                    if bytes.peek().is_some_and(|&(_, next)| next == b'"') {
                        bytes.next();
                        field.push(b'"');
                    } else {
                        in_quotes = false;
                        after_quote = true;
                    }
                } else {
                    if b == b'\n' {
                        self.line += 1;
                    }
                    field.push(b);
                }
                continue;
            }

            match b {
                b',' => {
                    fields.push(std::mem::take(&mut field));
                    after_quote = false;
                }
                b'\n' => {
                    fields.push(std::mem::take(&mut field));
                    self.pos = start + offset + 1;
                    self.line += 1;
                    return Some(build(start_line, fields, start..self.pos, true, malformed));
                }
                b'\r' if bytes.peek().is_some_and(|&(_, next)| next == b'\n') => {}
                b'"' if field.is_empty() && !after_quote => in_quotes = true,
                other => {
                    if after_quote && malformed.is_none() {
                        malformed = Some(format!(
                            "unexpected '{}' after closing quote",
                            other.escape_ascii()
                        ));
                    }
                    field.push(other);
                }
            }
        }

        fields.push(field);
        self.pos = self.input.len();
        Some(build(start_line, fields, start..self.pos, false, malformed))
    }
}

fn build(
    line: usize,
    raw: Vec<Vec<u8>>,
    span: Range<usize>,
    terminated: bool,
    mut malformed: Option<String>,
) -> Record {
    let fields = raw
        .into_iter()
        .enumerate()
        .map(|(i, bytes)| {
            String::from_utf8(bytes).unwrap_or_else(|e| {
                if malformed.is_none() {
                    malformed = Some(format!("field {} is not valid UTF-8", i + 1));
                }
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            })
        })
        .collect();

    Record {
        line,
        fields,
        span,
        terminated,
        malformed,
    }
}

impl Iterator for Records<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = self.next_record()?;
            let blank = record.fields.len() == 1 && record.fields[0].is_empty();
            match (blank, record.terminated) {
                (false, _) => return Some(record),
                (true, false) => return None,
                (true, true) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(fields: &[&str]) -> String {
        let mut buf = Vec::new();
        write_record(&mut buf, fields).unwrap();
        String::from_utf8(buf).unwrap()
    }

    mod encode_tests {
        use super::*;

        #[test]
        fn plain_fields_are_unquoted() {
            assert_eq!(encode(&["a", "b", "1.000"]), "a,b,1.000\n");
        }

        #[test]
        fn special_fields_are_quoted() {
            assert_eq!(encode(&["a,b", "say \"hi\""]), "\"a,b\",\"say \"\"hi\"\"\"\n");
        }

        #[test]
        fn line_breaks_are_quoted() {
            assert_eq!(encode(&["two\nlines"]), "\"two\nlines\"\n");
        }
    }

    mod decode_tests {
        use super::*;

        #[test]
        fn reads_simple_records() {
            let records: Vec<Record> = Records::new(b"a,b\nc,d\n").collect();
            assert_eq!(records.len(), 2);
            assert_eq!(records[0].fields, vec!["a", "b"]);
            assert_eq!(records[1].fields, vec!["c", "d"]);
            assert_eq!(records[1].line, 2);
            assert!(records.iter().all(|r| r.terminated));
        }

        #[test]
        fn reads_quoted_fields() {
            let records: Vec<Record> =
                Records::new(b"\"a,b\",\"say \"\"hi\"\"\",\"two\nlines\"\nnext\n").collect();
            assert_eq!(records[0].fields, vec!["a,b", "say \"hi\"", "two\nlines"]);
            assert_eq!(records[1].fields, vec!["next"]);
            assert_eq!(records[1].line, 3);
        }

        #[test]
        fn handles_crlf() {
            let records: Vec<Record> = Records::new(b"a,b\r\nc,d\r\n").collect();
            assert_eq!(records[0].fields, vec!["a", "b"]);
            assert_eq!(records[1].fields, vec!["c", "d"]);
        }

        #[test]
        fn skips_blank_lines() {
            let records: Vec<Record> = Records::new(b"a\n\n\nb\n").collect();
            assert_eq!(records.len(), 2);
            assert_eq!(records[1].line, 4);
        }

        #[test]
        fn flags_unterminated_trailing_record() {
            let records: Vec<Record> = Records::new(b"a,b\nc,d").collect();
            assert!(records[0].terminated);
            assert!(!records[1].terminated);
        }

        #[test]
        fn flags_text_after_closing_quote() {
            let records: Vec<Record> = Records::new(b"\"a\"x,b\n").collect();
            assert!(records[0].malformed.is_some());
        }

        #[test]
        fn invalid_utf8_is_confined_to_its_record() {
            let records: Vec<Record> = Records::new(b"a,b\nh\xff\xfe,c\nd,e\n").collect();
            assert_eq!(records.len(), 3);
            assert!(records[0].malformed.is_none());
            assert_eq!(
                records[1].malformed.as_deref(),
                Some("field 1 is not valid UTF-8")
            );
            assert_eq!(records[2].fields, vec!["d", "e"]);
            assert!(records[2].malformed.is_none());
        }

        #[test]
        fn spans_cover_raw_bytes() {
            let input = b"a,b\r\n\"x\ny\",z\ntail";
            let records: Vec<Record> = Records::new(input).collect();
            assert_eq!(&input[records[0].span.clone()], b"a,b\r\n");
            assert_eq!(&input[records[1].span.clone()], b"\"x\ny\",z\n");
            assert_eq!(&input[records[2].span.clone()], b"tail");
        }

        #[test]
        fn encoded_records_decode_back() {
            let fields = ["host, inc", "\"quoted\"", "plain"];
            let text = encode(&fields);
            let records: Vec<Record> = Records::new(text.as_bytes()).collect();
            assert_eq!(records[0].fields, fields);
        }
    }
}
