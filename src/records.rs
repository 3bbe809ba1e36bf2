//! Minimal CSV record reader for priority files.
//!
//! Handles comma separated fields, double-quoted fields with embedded commas,
//! newlines and `""` escapes, CRLF line endings, and a leading UTF-8 BOM.
//! Blank lines are skipped, except a blank first line, which is reported as an
//! empty record so a missing header row can be told apart.

use std::io::{self, BufRead};

const BOM: char = '\u{feff}';

/// Iterator over the records of a CSV stream.
pub struct Records<R> {
    reader: R,
    at_start: bool,
}

impl<R: BufRead> Records<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            at_start: true,
        }
    }

    fn read_record(&mut self) -> io::Result<Option<Vec<String>>> {
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut consumed_any = false;
        let mut line = String::new();

        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                if !consumed_any {
                    return Ok(None);
                }
                // EOF inside an open quote keeps what was read so far
                fields.push(field);
                return Ok(Some(fields));
            }

            let mut text = line.as_str();
            let first_line = self.at_start;
            if first_line {
                self.at_start = false;
                text = text.strip_prefix(BOM).unwrap_or(text);
            }

            if !in_quotes && text.trim_end_matches(['\r', '\n']).is_empty() {
                // a blank first line is an empty header row, not padding
                if first_line {
                    return Ok(Some(Vec::new()));
                }
                continue;
            }
            consumed_any = true;

            let mut chars = text.chars().peekable();
            while let Some(ch) = chars.next() {
                if in_quotes {
                    if ch == '"' {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            field.push('"');
                        } else {
                            in_quotes = false;
                        }
                    } else {
                        field.push(ch);
                    }
                    continue;
                }

                match ch {
                    '"' if field.is_empty() => in_quotes = true,
                    ',' => fields.push(std::mem::take(&mut field)),
                    '\r' if chars.peek() == Some(&'\n') => {}
                    '\n' => {
                        fields.push(field);
                        return Ok(Some(fields));
                    }
                    _ => field.push(ch),
                }
            }

            if !in_quotes {
                // last line without a trailing newline
                fields.push(field);
                return Ok(Some(fields));
            }
        }
    }
}

impl<R: BufRead> Iterator for Records<R> {
    type Item = io::Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}
