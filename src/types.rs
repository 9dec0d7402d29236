use chrono::{NaiveDate, NaiveTime};

use crate::error::{Result, WfdbError};
use crate::format::SignalFormat;

/// Record line of a header: what the whole recording looks like.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMeta {
    pub name: String,
    /// Number of segments, 1 for a single-segment record
    pub segments: u32,
    pub signal_count: usize,
    /// Samples per second per signal
    pub sampling_frequency: f64,
    pub counter_frequency: f64,
    pub base_counter: f64,
    /// Samples per signal, 0 when the header leaves it open
    pub samples_per_signal: u64,
    pub base_time: Option<NaiveTime>,
    pub base_date: Option<NaiveDate>,
}

impl RecordMeta {
    pub fn new(name: &str, signal_count: usize, sampling_frequency: f64, samples_per_signal: u64) -> Self {
        RecordMeta {
            name: name.to_string(),
            segments: 1,
            signal_count,
            sampling_frequency,
            counter_frequency: sampling_frequency,
            base_counter: 0.0,
            samples_per_signal,
            base_time: None,
            base_date: None,
        }
    }

    pub fn is_multi_segment(&self) -> bool {
        self.segments > 1
    }

    /// Record duration in whole milliseconds, truncated.
    pub fn duration_ms(&self) -> u64 {
        if self.sampling_frequency <= 0.0 {
            return 0;
        }
        (self.samples_per_signal as f64 / self.sampling_frequency * 1000.0) as u64
    }
}

/// Signal line of a header: where one signal is stored and how.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMeta {
    /// Backing sample file, relative to the header
    pub file_name: String,
    pub format: SignalFormat,
    pub samples_per_frame: u32,
    pub skew: u32,
    /// Byte offset of the first sample of this file's signal group
    pub byte_offset: u64,
    pub adc_gain: f64,
    pub baseline: i32,
    pub units: String,
    pub adc_resolution: u32,
    pub adc_zero: i32,
    /// First sample of the signal
    pub initial_value: i32,
    /// 16-bit checksum of all the samples
    pub checksum: i32,
    pub block_size: u32,
    pub description: String,
}

impl SignalMeta {
    /// Signal stored in `file_name` with header defaults for everything else.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wfdb::{SignalFormat, SignalMeta};
    ///
    /// let signal = SignalMeta::new("100.dat", SignalFormat::Format212);
    /// assert_eq!(signal.adc_gain, 200.0);
    /// assert_eq!(signal.units, "mV");
    /// ```
    pub fn new(file_name: &str, format: SignalFormat) -> Self {
        SignalMeta {
            file_name: file_name.to_string(),
            format,
            samples_per_frame: 1,
            skew: 0,
            byte_offset: 0,
            adc_gain: crate::DEFAULT_ADC_GAIN,
            baseline: 0,
            units: crate::DEFAULT_UNITS.to_string(),
            adc_resolution: crate::DEFAULT_ADC_RESOLUTION,
            adc_zero: 0,
            initial_value: 0,
            checksum: 0,
            block_size: 0,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// Segment line of a multi-segment header.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMeta {
    pub name: String,
    pub samples_per_signal: u64,
}

impl SegmentMeta {
    /// A `~` segment is a gap with no backing record.
    pub fn is_null(&self) -> bool {
        self.name == "~"
    }

    /// A zero-length segment describes the signal layout and holds no samples.
    pub fn is_layout(&self) -> bool {
        !self.is_null() && self.samples_per_signal == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleSegmentHeader {
    pub record: RecordMeta,
    pub signals: Vec<SignalMeta>,
    /// Comment lines, `#` included
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiSegmentHeader {
    pub record: RecordMeta,
    pub segments: Vec<SegmentMeta>,
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Header {
    Single(SingleSegmentHeader),
    Multi(MultiSegmentHeader),
}

impl Header {
    pub fn record(&self) -> &RecordMeta {
        match self {
            Header::Single(header) => &header.record,
            Header::Multi(header) => &header.record,
        }
    }
}

/// Decoded samples of a record, one equally long row per signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleMatrix {
    signals: Vec<Vec<i32>>,
}

impl SampleMatrix {
    /// # Errors
    ///
    /// * `WfdbError::InvalidArgument` - the rows differ in length
    pub fn new(signals: Vec<Vec<i32>>) -> Result<Self> {
        if let Some(first) = signals.first() {
            let len = first.len();
            if let Some(index) = signals.iter().position(|s| s.len() != len) {
                return Err(WfdbError::InvalidArgument(format!(
                    "signal {} has {} samples, expected {}",
                    index,
                    signals[index].len(),
                    len
                )));
            }
        }
        Ok(SampleMatrix { signals })
    }

    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    pub fn samples_per_signal(&self) -> usize {
        self.signals.first().map_or(0, Vec::len)
    }

    pub fn signal(&self, index: usize) -> Option<&[i32]> {
        self.signals.get(index).map(Vec::as_slice)
    }

    pub fn signals(&self) -> &[Vec<i32>] {
        &self.signals
    }

    pub fn into_inner(self) -> Vec<Vec<i32>> {
        self.signals
    }
}
