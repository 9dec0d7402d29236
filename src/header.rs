//! Parsing and serialization of `.hea` header text.
//!
//! A header is line oriented: a record line, then one line per signal (or
//! per segment for a multi-segment record). Lines starting with `#` are
//! comments and are kept in order.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};

use crate::error::{Result, WfdbError};
use crate::types::{Header, MultiSegmentHeader, RecordMeta, SegmentMeta, SignalMeta, SingleSegmentHeader};
use crate::utils::{parse_or_default, split_fields, split_number};
use crate::DEFAULT_SAMPLING_FREQUENCY;

const TIME_FORMAT: &str = "%H:%M:%S";
const DATE_FORMAT: &str = "%d/%m/%Y";

impl RecordMeta {
    /// Parses a record line:
    /// `name[/segments] signals [fs[/counter_fs[(base_counter)]] [samples [base_time [base_date]]]]`.
    ///
    /// # Errors
    ///
    /// * `WfdbError::InvalidHeader` - the name or signal count is missing, or a field does not parse
    pub fn from_line(line: &str) -> Result<Self> {
        let (fields, _) = split_fields(line, 6);
        let (Some(&name_field), Some(&signals)) = (fields.first(), fields.get(1)) else {
            return Err(WfdbError::InvalidHeader(format!("record line too short: {:?}", line)));
        };

        let (name, segments) = match name_field.split_once('/') {
            Some((name, segments)) => (name, parse_or_default(Some(segments), 1u32, "segment count")?),
            None => (name_field, 1),
        };
        if name.is_empty() {
            return Err(WfdbError::InvalidHeader("record name is empty".to_string()));
        }
        let signal_count = parse_or_default(Some(signals), 0usize, "signal count")?;

        let (frequency, counter) = match fields.get(2) {
            Some(field) => match field.split_once('/') {
                Some((fs, counter)) => (fs, Some(counter)),
                None => (*field, None),
            },
            None => ("", None),
        };
        let sampling_frequency = parse_or_default(Some(frequency), DEFAULT_SAMPLING_FREQUENCY, "sampling frequency")?;
        let (counter_frequency, base_counter) = match counter {
            None => (sampling_frequency, 0.0),
            Some(counter) => match counter.split_once('(') {
                Some((freq, base)) => (
                    parse_or_default(Some(freq), sampling_frequency, "counter frequency")?,
                    parse_or_default(Some(base.trim_end_matches(')')), 0.0, "base counter")?,
                ),
                None => (parse_or_default(Some(counter), sampling_frequency, "counter frequency")?, 0.0),
            },
        };

        let mut record = RecordMeta::new(name, signal_count, sampling_frequency, 0);
        record.segments = segments;
        record.counter_frequency = counter_frequency;
        record.base_counter = base_counter;
        record.samples_per_signal = parse_or_default(fields.get(3).copied(), 0u64, "sample count")?;
        record.base_time = fields.get(4).map(|t| parse_time(t)).transpose()?;
        record.base_date = fields.get(5).map(|d| parse_date(d)).transpose()?;
        Ok(record)
    }

    /// Formats the record line. `segmented` writes the `/segments` marker.
    pub fn to_line(&self, segmented: bool) -> String {
        let mut line = self.name.clone();
        if segmented {
            line.push_str(&format!("/{}", self.segments));
        }
        line.push_str(&format!(" {} {}", self.signal_count, self.sampling_frequency));
        if self.counter_frequency != self.sampling_frequency || self.base_counter != 0.0 {
            line.push_str(&format!("/{}", self.counter_frequency));
            if self.base_counter != 0.0 {
                line.push_str(&format!("({})", self.base_counter));
            }
        }
        line.push_str(&format!(" {}", self.samples_per_signal));
        if let Some(time) = self.base_time {
            line.push_str(&format!(" {}", time.format(TIME_FORMAT)));
            if let Some(date) = self.base_date {
                line.push_str(&format!(" {}", date.format(DATE_FORMAT)));
            }
        }
        line
    }
}

fn parse_time(text: &str) -> Result<NaiveTime> {
    // fractional seconds are dropped
    let whole = text.split('.').next().unwrap_or(text);
    NaiveTime::parse_from_str(whole, TIME_FORMAT)
        .map_err(|e| WfdbError::InvalidHeader(format!("invalid base time {:?}: {}", text, e)))
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|e| WfdbError::InvalidHeader(format!("invalid base date {:?}: {}", text, e)))
}

impl SignalMeta {
    /// Parses a signal line:
    /// `file format[xspf][:skew][+offset] [gain[(baseline)][/units] [adc_res [adc_zero [initial [checksum [block_size [description]]]]]]]`.
    ///
    /// # Errors
    ///
    /// * `WfdbError::UnsupportedFormat` - the format code is not supported
    /// * `WfdbError::InvalidHeader` - the line is too short or a field does not parse
    pub fn from_line(line: &str) -> Result<Self> {
        let (fields, description) = split_fields(line, 8);
        let (Some(&file_name), Some(&format_field)) = (fields.first(), fields.get(1)) else {
            return Err(WfdbError::InvalidHeader(format!("signal line too short: {:?}", line)));
        };

        let (code, mut modifiers) = split_number(format_field);
        let mut signal = SignalMeta::new(file_name, code.parse()?);
        if let Some(rest) = modifiers.strip_prefix('x') {
            let (spf, rest) = split_number(rest);
            signal.samples_per_frame = parse_or_default(Some(spf), 1, "samples per frame")?;
            modifiers = rest;
        }
        if let Some(rest) = modifiers.strip_prefix(':') {
            let (skew, rest) = split_number(rest);
            signal.skew = parse_or_default(Some(skew), 0, "skew")?;
            modifiers = rest;
        }
        if let Some(rest) = modifiers.strip_prefix('+') {
            let (offset, rest) = split_number(rest);
            signal.byte_offset = parse_or_default(Some(offset), 0, "byte offset")?;
            modifiers = rest;
        }
        if !modifiers.is_empty() {
            return Err(WfdbError::InvalidHeader(format!("invalid format field {:?}", format_field)));
        }

        let mut baseline = None;
        if let Some(&gain_field) = fields.get(2) {
            let (gain, units) = match gain_field.split_once('/') {
                Some((gain, units)) => (gain, Some(units)),
                None => (gain_field, None),
            };
            let gain = match gain.split_once('(') {
                Some((gain, base)) => {
                    baseline = Some(parse_or_default(Some(base.trim_end_matches(')')), 0i32, "baseline")?);
                    gain
                }
                None => gain,
            };
            signal.adc_gain = parse_or_default(Some(gain), crate::DEFAULT_ADC_GAIN, "ADC gain")?;
            if let Some(units) = units.filter(|u| !u.is_empty()) {
                signal.units = units.to_string();
            }
        }
        signal.adc_resolution = parse_or_default(fields.get(3).copied(), crate::DEFAULT_ADC_RESOLUTION, "ADC resolution")?;
        signal.adc_zero = parse_or_default(fields.get(4).copied(), 0, "ADC zero")?;
        signal.baseline = baseline.unwrap_or(signal.adc_zero);
        signal.initial_value = parse_or_default(fields.get(5).copied(), 0, "initial value")?;
        signal.checksum = parse_or_default(fields.get(6).copied(), 0, "checksum")?;
        signal.block_size = parse_or_default(fields.get(7).copied(), 0, "block size")?;
        signal.description = description.to_string();
        Ok(signal)
    }

    pub fn to_line(&self) -> String {
        let mut line = format!("{} {}", self.file_name, self.format);
        if self.samples_per_frame != 1 {
            line.push_str(&format!("x{}", self.samples_per_frame));
        }
        if self.skew != 0 {
            line.push_str(&format!(":{}", self.skew));
        }
        if self.byte_offset != 0 {
            line.push_str(&format!("+{}", self.byte_offset));
        }
        line.push_str(&format!(
            " {}({})/{} {} {} {} {} {}",
            self.adc_gain,
            self.baseline,
            self.units,
            self.adc_resolution,
            self.adc_zero,
            self.initial_value,
            self.checksum,
            self.block_size
        ));
        if !self.description.is_empty() {
            line.push(' ');
            line.push_str(&self.description);
        }
        line
    }
}

impl SegmentMeta {
    /// Parses a segment line: `name samples`.
    ///
    /// # Errors
    ///
    /// * `WfdbError::InvalidHeader` - a field is missing or does not parse
    pub fn from_line(line: &str) -> Result<Self> {
        let (fields, _) = split_fields(line, 2);
        let [name, samples] = fields[..] else {
            return Err(WfdbError::InvalidHeader(format!("segment line too short: {:?}", line)));
        };
        Ok(SegmentMeta {
            name: name.to_string(),
            samples_per_signal: parse_or_default(Some(samples), 0, "segment length")?,
        })
    }

    pub fn to_line(&self) -> String {
        format!("{} {}", self.name, self.samples_per_signal)
    }
}

/// Header text split into its record line, the lines after it, and comments.
struct HeaderLines<'a> {
    record: &'a str,
    body: Vec<&'a str>,
    comments: Vec<String>,
}

fn split_lines(text: &str) -> Result<HeaderLines<'_>> {
    let mut comments = Vec::new();
    let mut lines = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with('#') {
            comments.push(line.to_string());
        } else {
            lines.push(line);
        }
    }
    let mut lines = lines.into_iter();
    let record = lines
        .next()
        .ok_or_else(|| WfdbError::InvalidHeader("header has no record line".to_string()))?;
    Ok(HeaderLines {
        record,
        body: lines.collect(),
        comments,
    })
}

fn check_line_count(kind: &str, declared: usize, found: usize) -> Result<()> {
    if declared != found {
        return Err(WfdbError::InvalidHeader(format!(
            "record line declares {} {}, found {}",
            declared, kind, found
        )));
    }
    Ok(())
}

fn append_comments(text: &mut String, comments: &[String]) {
    for comment in comments {
        text.push_str(comment);
        text.push('\n');
    }
}

impl SingleSegmentHeader {
    /// # Errors
    ///
    /// * `WfdbError::InvalidHeader` - malformed lines or a signal count that does not match
    /// * `WfdbError::UnsupportedFormat` - a signal uses an unknown format code
    pub fn parse(text: &str) -> Result<Self> {
        let lines = split_lines(text)?;
        let record = RecordMeta::from_line(lines.record)?;
        check_line_count("signals", record.signal_count, lines.body.len())?;
        let signals = lines
            .body
            .iter()
            .map(|line| SignalMeta::from_line(line))
            .collect::<Result<Vec<_>>>()?;
        Ok(SingleSegmentHeader {
            record,
            signals,
            comments: lines.comments,
        })
    }

    pub fn to_text(&self) -> String {
        let mut text = self.record.to_line(false);
        text.push('\n');
        for signal in &self.signals {
            text.push_str(&signal.to_line());
            text.push('\n');
        }
        append_comments(&mut text, &self.comments);
        text
    }
}

impl MultiSegmentHeader {
    /// # Errors
    ///
    /// * `WfdbError::InvalidHeader` - malformed lines or a segment count that does not match
    pub fn parse(text: &str) -> Result<Self> {
        let lines = split_lines(text)?;
        let record = RecordMeta::from_line(lines.record)?;
        check_line_count("segments", record.segments as usize, lines.body.len())?;
        let segments = lines
            .body
            .iter()
            .map(|line| SegmentMeta::from_line(line))
            .collect::<Result<Vec<_>>>()?;
        Ok(MultiSegmentHeader {
            record,
            segments,
            comments: lines.comments,
        })
    }

    pub fn to_text(&self) -> String {
        let mut text = self.record.to_line(true);
        text.push('\n');
        for segment in &self.segments {
            text.push_str(&segment.to_line());
            text.push('\n');
        }
        append_comments(&mut text, &self.comments);
        text
    }
}

impl Header {
    /// Parses header text, choosing the multi-segment form when the record
    /// name carries a `/segments` marker.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wfdb::Header;
    ///
    /// let header = Header::parse("100 1 360 650000\n100.dat 212 200 11 1024 995 -22131 0 MLII\n")?;
    /// assert_eq!(header.record().sampling_frequency, 360.0);
    ///
    /// let header = Header::parse("multi/2 1 360 100\n~ 40\nseg_1 60\n")?;
    /// assert!(matches!(header, Header::Multi(_)));
    /// # Ok::<(), wfdb::WfdbError>(())
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let segmented = split_lines(text)?
            .record
            .split_whitespace()
            .next()
            .is_some_and(|name| name.contains('/'));
        if segmented {
            MultiSegmentHeader::parse(text).map(Header::Multi)
        } else {
            SingleSegmentHeader::parse(text).map(Header::Single)
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Header::Single(header) => header.to_text(),
            Header::Multi(header) => header.to_text(),
        }
    }
}

impl FromStr for Header {
    type Err = WfdbError;

    fn from_str(s: &str) -> Result<Self> {
        Header::parse(s)
    }
}

/// Name of the header file of a record.
pub fn header_file_name(record_name: &str) -> String {
    format!("{}.hea", record_name)
}

/// Checks that every signal can be decoded by the sample pipeline.
///
/// # Errors
///
/// * `WfdbError::InvalidHeader` - a signal stores more than one sample per frame
pub fn check_frame_layout(signals: &[SignalMeta]) -> Result<()> {
    if let Some((index, signal)) = signals.iter().enumerate().find(|(_, s)| s.samples_per_frame > 1) {
        return Err(WfdbError::InvalidHeader(format!(
            "signal {} has {} samples per frame, only 1 is supported",
            index, signal.samples_per_frame
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SignalFormat;

    const RECORD_100: &str = "100 2 360 650000\n\
        100.dat 212 200 11 1024 995 -22131 0 MLII\n\
        100.dat 212 200 11 1024 1011 20052 0 V5\n\
        # 69 M 1085 1629 x1\n\
        # Aldomet, Inderal\n";

    #[test]
    fn test_parse_single_segment() {
        let header = SingleSegmentHeader::parse(RECORD_100).unwrap();
        assert_eq!(header.record.name, "100");
        assert_eq!(header.record.signal_count, 2);
        assert_eq!(header.record.sampling_frequency, 360.0);
        assert_eq!(header.record.counter_frequency, 360.0);
        assert_eq!(header.record.samples_per_signal, 650000);
        assert_eq!(header.record.base_time, None);

        let mlii = &header.signals[0];
        assert_eq!(mlii.file_name, "100.dat");
        assert_eq!(mlii.format, SignalFormat::Format212);
        assert_eq!(mlii.adc_gain, 200.0);
        assert_eq!(mlii.adc_resolution, 11);
        assert_eq!(mlii.adc_zero, 1024);
        assert_eq!(mlii.baseline, 1024);
        assert_eq!(mlii.initial_value, 995);
        assert_eq!(mlii.checksum, -22131);
        assert_eq!(mlii.units, "mV");
        assert_eq!(mlii.description, "MLII");
        assert_eq!(header.comments, vec!["# 69 M 1085 1629 x1", "# Aldomet, Inderal"]);
        assert!(header.signals.iter().all(|s| s.format == SignalFormat::Format212));
    }

    #[test]
    fn test_parse_defaults() {
        let header = SingleSegmentHeader::parse("rec 1\nrec.dat 16\n").unwrap();
        assert_eq!(header.record.sampling_frequency, DEFAULT_SAMPLING_FREQUENCY);
        assert_eq!(header.record.samples_per_signal, 0);
        let signal = &header.signals[0];
        assert_eq!(signal.adc_gain, 200.0);
        assert_eq!(signal.adc_resolution, 12);
        assert_eq!(signal.samples_per_frame, 1);
        assert_eq!(signal.checksum, 0);
        assert!(signal.description.is_empty());
    }

    #[test]
    fn test_parse_modifiers_and_calibration() {
        let signal = SignalMeta::from_line("a.dat 16x2:3+512 500(-12)/uV 16 0 7 -3 0 ECG lead I").unwrap();
        assert_eq!(signal.samples_per_frame, 2);
        assert_eq!(signal.skew, 3);
        assert_eq!(signal.byte_offset, 512);
        assert_eq!(signal.adc_gain, 500.0);
        assert_eq!(signal.baseline, -12);
        assert_eq!(signal.units, "uV");
        assert_eq!(signal.description, "ECG lead I");
        assert!(check_frame_layout(&[signal]).is_err());
    }

    #[test]
    fn test_record_line_time_and_counter() {
        let record = RecordMeta::from_line("r 3 250/1000(20) 5000 10:32:05.250 07/03/2019").unwrap();
        assert_eq!(record.counter_frequency, 1000.0);
        assert_eq!(record.base_counter, 20.0);
        assert_eq!(record.base_time, NaiveTime::from_hms_opt(10, 32, 5));
        assert_eq!(record.base_date, NaiveDate::from_ymd_opt(2019, 3, 7));
        assert_eq!(record.to_line(false), "r 3 250/1000(20) 5000 10:32:05 07/03/2019");

        // 非整数频率原样写出
        let record = RecordMeta::from_line("r 1 128.5 10").unwrap();
        assert_eq!(record.to_line(false), "r 1 128.5 10");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(SingleSegmentHeader::parse(""), Err(WfdbError::InvalidHeader(_))));
        assert!(matches!(SingleSegmentHeader::parse("r 2\nr.dat 16\n"), Err(WfdbError::InvalidHeader(_))));
        assert!(matches!(SingleSegmentHeader::parse("r 1\nr.dat 999\n"), Err(WfdbError::UnsupportedFormat(_))));
        assert!(matches!(SignalMeta::from_line("r.dat 16q"), Err(WfdbError::InvalidHeader(_))));
        assert!(matches!(RecordMeta::from_line("r x"), Err(WfdbError::InvalidHeader(_))));
        assert!(matches!(RecordMeta::from_line("r 1 360 10 25:00:00"), Err(WfdbError::InvalidHeader(_))));
    }

    #[test]
    fn test_parse_multi_segment() {
        let text = "multi/3 2 360 45000 08:00:00\n100_layout 0\n~ 5000\n100_1 40000\n";
        let header = match Header::parse(text).unwrap() {
            Header::Multi(header) => header,
            Header::Single(_) => panic!("expected a multi-segment header"),
        };
        assert_eq!(header.record.segments, 3);
        assert!(header.record.is_multi_segment());
        assert!(header.segments[0].is_layout());
        assert!(header.segments[1].is_null());
        assert_eq!(header.segments[2].samples_per_signal, 40000);
        assert_eq!(header.to_text(), text);
    }

    #[test]
    fn test_serialize_then_parse() {
        let header = SingleSegmentHeader::parse(RECORD_100).unwrap();
        let text = header.to_text();
        assert!(text.starts_with("100 2 360 650000\n100.dat 212 200(1024)/mV 11 1024 995 -22131 0 MLII\n"));
        assert_eq!(SingleSegmentHeader::parse(&text).unwrap(), header);

        let parsed: Header = text.parse().unwrap();
        assert_eq!(parsed, Header::Single(header));
    }
}
