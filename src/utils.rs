use std::str::FromStr;

use crate::error::{Result, WfdbError};

/// Parses an optional header field, falling back to `default` when absent
/// or empty.
pub fn parse_or_default<T: FromStr>(field: Option<&str>, default: T, name: &str) -> Result<T> {
    match field.map(str::trim) {
        None | Some("") => Ok(default),
        Some(text) => text
            .parse()
            .map_err(|_| WfdbError::InvalidHeader(format!("invalid {}: {:?}", name, text))),
    }
}

/// Splits off the first `count` whitespace-separated fields of `line` and
/// returns them with the trimmed remainder.
pub fn split_fields(line: &str, count: usize) -> (Vec<&str>, &str) {
    let mut fields = Vec::with_capacity(count);
    let mut rest = line.trim_start();
    while fields.len() < count && !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    (fields, rest.trim_end())
}

/// Splits a leading run of ASCII digits (with an optional `-` sign) off `s`.
pub fn split_number(s: &str) -> (&str, &str) {
    let sign = usize::from(s.starts_with('-'));
    let end = s[sign..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(s.len(), |i| i + sign);
    s.split_at(end)
}

/// Sample index reached after `milliseconds` at `frequency` Hz, rounded to
/// the nearest sample.
pub fn sample_index(milliseconds: u64, frequency: f64) -> u64 {
    let index = (frequency * milliseconds as f64 / 1000.0).round();
    if index <= 0.0 {
        0
    } else {
        index as u64
    }
}
