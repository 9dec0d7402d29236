//! Time/signal filters and the byte ranges they select in a sample file.

use std::fmt;

use crate::error::{Result, WfdbError};
use crate::format::SignalFormat;
use crate::mux::SignalGroup;
use crate::types::RecordMeta;
use crate::utils::sample_index;

/// Restriction of a read to a time window and a subset of signals.
///
/// Fields left unset mean "no restriction"; the default filter reads
/// everything.
///
/// # Examples
///
/// ```rust
/// use wfdb::Filter;
///
/// let filter = Filter::builder()
///     .start_time(0)
///     .end_time(5000)
///     .signals(vec![0, 1, 2])
///     .build();
/// assert!(!filter.is_default());
/// assert!(Filter::default().is_default());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Filter {
    start_time_ms: Option<u64>,
    end_time_ms: Option<u64>,
    signals: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    filter: Filter,
}

impl FilterBuilder {
    pub fn start_time(mut self, milliseconds: u64) -> Self {
        self.filter.start_time_ms = Some(milliseconds);
        self
    }

    pub fn end_time(mut self, milliseconds: u64) -> Self {
        self.filter.end_time_ms = Some(milliseconds);
        self
    }

    pub fn signals(mut self, indices: Vec<usize>) -> Self {
        self.filter.signals = Some(indices);
        self
    }

    pub fn build(self) -> Filter {
        self.filter
    }
}

impl Filter {
    pub fn builder() -> FilterBuilder {
        FilterBuilder::default()
    }

    pub fn is_default(&self) -> bool {
        self.start_time_ms.is_none() && self.end_time_ms.is_none() && self.signals.is_none()
    }

    pub fn start_time_ms(&self) -> Option<u64> {
        self.start_time_ms
    }

    pub fn end_time_ms(&self) -> Option<u64> {
        self.end_time_ms
    }

    pub fn signals(&self) -> Option<&[usize]> {
        self.signals.as_deref()
    }

    /// Checks the filter against a record and turns it into sample indices.
    ///
    /// The window is clamped to the declared sample count when the header
    /// has one.
    ///
    /// # Errors
    ///
    /// * `WfdbError::InvalidFilter` - start after end, or a signal index that is
    ///   out of range, repeated, or an empty signal list
    pub fn resolve(&self, record: &RecordMeta) -> Result<ResolvedFilter> {
        let signals = match &self.signals {
            None => (0..record.signal_count).collect(),
            Some(indices) => {
                if indices.is_empty() {
                    return Err(WfdbError::InvalidFilter("no signals selected".to_string()));
                }
                for (position, &index) in indices.iter().enumerate() {
                    if index >= record.signal_count {
                        return Err(WfdbError::InvalidFilter(format!(
                            "signal {} out of range for {} signals",
                            index, record.signal_count
                        )));
                    }
                    if indices[..position].contains(&index) {
                        return Err(WfdbError::InvalidFilter(format!("signal {} selected twice", index)));
                    }
                }
                indices.clone()
            }
        };

        if let (Some(start), Some(end)) = (self.start_time_ms, self.end_time_ms) {
            if start > end {
                return Err(WfdbError::InvalidFilter(format!(
                    "start time {} ms is after end time {} ms",
                    start, end
                )));
            }
        }

        let total = record.samples_per_signal;
        let clamp = |index: u64| if total > 0 { index.min(total) } else { index };
        let start_sample = clamp(
            self.start_time_ms
                .map_or(0, |ms| sample_index(ms, record.sampling_frequency)),
        );
        let end_sample = match self.end_time_ms {
            Some(ms) => Some(clamp(sample_index(ms, record.sampling_frequency))),
            None if total > 0 => Some(total),
            None => None,
        };
        if let Some(end) = end_sample {
            if start_sample > end {
                return Err(WfdbError::InvalidFilter(format!(
                    "window starts at sample {} past its end {}",
                    start_sample, end
                )));
            }
        }

        Ok(ResolvedFilter {
            whole_file: self.start_time_ms.is_none() && self.end_time_ms.is_none(),
            start_sample,
            end_sample,
            signals,
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Filter [start_time = {:?}, end_time = {:?}, signals = {:?}]",
            self.start_time_ms, self.end_time_ms, self.signals
        )
    }
}

/// Half-open byte range `[start, end)` into one backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// # Errors
    ///
    /// * `WfdbError::InvalidByteRange` - `start` is greater than `end`
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if start > end {
            return Err(WfdbError::InvalidByteRange { start, end });
        }
        Ok(ByteRange { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn total(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A filter checked against one record: the selected signals in output
/// order and the selected window in per-signal sample indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFilter {
    /// No time bounds were given; reads take whole files
    pub whole_file: bool,
    pub start_sample: u64,
    /// `None` when neither the filter nor the header bounds the window
    pub end_sample: Option<u64>,
    pub signals: Vec<usize>,
}

/// What to read from one backing file and how to cut the decoded run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRead {
    pub range: ByteRange,
    /// Flat samples to decode from the start of `range`; `None` means
    /// every whole frame the bytes hold
    pub count: Option<usize>,
    /// Leading decoded flat samples that fall before the window
    pub skip: usize,
}

impl ResolvedFilter {
    /// Whether the window starts at the first sample of the record.
    pub fn starts_at_beginning(&self) -> bool {
        self.start_sample == 0
    }

    /// Whether the window spans every sample the header declares.
    pub fn covers_record(&self, record: &RecordMeta) -> bool {
        self.whole_file
            || (self.start_sample == 0
                && record.samples_per_signal > 0
                && self.end_sample == Some(record.samples_per_signal))
    }

    /// Byte range of the window in a group's file, before any alignment to
    /// packing groups.
    ///
    /// Sample indices are scaled by the number of signals in the file and
    /// turned into bytes rounding up, so the range always contains the
    /// requested samples. Unbounded reads take the file from the group
    /// offset to its end without any arithmetic on the time window.
    ///
    /// # Errors
    ///
    /// * `WfdbError::MalformedSampleData` - the file ends before the group offset
    /// * `WfdbError::InvalidFilter` - the window lies beyond any addressable byte
    pub fn byte_range(&self, group: &SignalGroup, file_len: u64) -> Result<ByteRange> {
        available_bytes(group, file_len)?;
        let end_sample = match (self.whole_file, self.end_sample) {
            (false, Some(end)) => end,
            _ => return ByteRange::new(group.byte_offset, file_len),
        };
        let signals = group.len() as u64;
        let (start, end) = window_bytes(
            group.format,
            flat_index(self.start_sample, signals)?,
            flat_index(end_sample, signals)?,
        )?;
        let offset = |bytes: u64| group.byte_offset.checked_add(bytes).ok_or_else(window_too_large);
        ByteRange::new(offset(start)?, offset(end)?)
    }

    /// Plans the read of one group: where to start so the decoder sees
    /// whole packing groups (and, for differential data, the anchor of the
    /// running sum), where to stop so the last sample's bits are present,
    /// and how many decoded samples to drop in front of the window.
    ///
    /// When the header gives no sample count the window is cut at the last
    /// whole frame the file holds.
    ///
    /// # Errors
    ///
    /// * `WfdbError::MalformedSampleData` - the file is too short for the declared
    ///   samples, or the declared count is too large to address
    /// * `WfdbError::InvalidFilter` - the window lies beyond any addressable byte
    pub fn plan_group(&self, record: &RecordMeta, group: &SignalGroup, file_len: u64) -> Result<GroupRead> {
        let signals = group.len() as u64;
        let format = group.format;
        let available = available_bytes(group, file_len)?;

        if self.whole_file {
            if record.samples_per_signal == 0 {
                return Ok(GroupRead {
                    range: self.byte_range(group, file_len)?,
                    count: None,
                    skip: 0,
                });
            }
            let (count, needed) = record
                .samples_per_signal
                .checked_mul(signals)
                .and_then(|count| Some((count, format.encoded_len(count)?)))
                .ok_or_else(|| {
                    WfdbError::MalformedSampleData(format!(
                        "{} samples per signal in {} cannot be addressed",
                        record.samples_per_signal, group.file_name
                    ))
                })?;
            if needed > available {
                return Err(short_file(group, needed, available));
            }
            return Ok(GroupRead {
                range: ByteRange::new(group.byte_offset, group.byte_offset + needed)?,
                count: Some(count as usize),
                skip: 0,
            });
        }

        let (start_sample, end_sample) = match self.end_sample {
            Some(end) if record.samples_per_signal > 0 => (self.start_sample, end),
            end => {
                let frames = format.samples_in_bytes(available) / signals;
                (self.start_sample.min(frames), end.map_or(frames, |end| end.min(frames)))
            }
        };
        let window_start = flat_index(start_sample, signals)?;
        let window_end = flat_index(end_sample, signals)?;
        let (start_bytes, end_bytes) = window_bytes(format, window_start, window_end)?;

        let bytes = format.bytes_per_sample();
        let (decode_start, start) = if format.is_differential() {
            (0, 0)
        } else {
            (bytes.align_down(window_start), bytes.align_bytes_down(start_bytes))
        };
        let end = format.complete_bytes(end_bytes).ok_or_else(window_too_large)?;
        if end > available {
            return Err(short_file(group, end, available));
        }
        Ok(GroupRead {
            range: ByteRange::new(group.byte_offset + start, group.byte_offset + end)?,
            count: Some((window_end - decode_start) as usize),
            skip: (window_start - decode_start) as usize,
        })
    }
}

fn available_bytes(group: &SignalGroup, file_len: u64) -> Result<u64> {
    file_len.checked_sub(group.byte_offset).ok_or_else(|| {
        WfdbError::MalformedSampleData(format!(
            "{} is {} bytes, shorter than its offset {}",
            group.file_name, file_len, group.byte_offset
        ))
    })
}

/// Position in the flat multiplexed run of per-signal sample `sample`.
fn flat_index(sample: u64, signals: u64) -> Result<u64> {
    sample.checked_mul(signals).ok_or_else(window_too_large)
}

/// Bytes up to two flat sample positions, rounded up.
fn window_bytes(format: SignalFormat, start: u64, end: u64) -> Result<(u64, u64)> {
    let bytes = format.bytes_per_sample();
    match (bytes.bytes_for(start), bytes.bytes_for(end)) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(window_too_large()),
    }
}

fn window_too_large() -> WfdbError {
    WfdbError::InvalidFilter("window lies beyond any addressable byte".to_string())
}

fn short_file(group: &SignalGroup, needed: u64, available: u64) -> WfdbError {
    WfdbError::MalformedSampleData(format!(
        "{} holds {} sample bytes, {} needed",
        group.file_name, available, needed
    ))
}
