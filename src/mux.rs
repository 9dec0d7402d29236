//! Interleaving of per-signal sample rows against the flat sample stream
//! of a backing file, and grouping of signals by the file they live in.

use crate::error::{Result, WfdbError};
use crate::format::SignalFormat;
use crate::types::SignalMeta;

/// Signals sharing one backing file, in header order.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalGroup {
    pub file_name: String,
    pub format: SignalFormat,
    pub byte_offset: u64,
    /// Header indices of the member signals
    pub indices: Vec<usize>,
}

impl SignalGroup {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Initial values of the member signals, in multiplex order.
    pub fn initial_values(&self, signals: &[SignalMeta]) -> Vec<i32> {
        self.indices.iter().map(|&i| signals[i].initial_value).collect()
    }
}

/// Groups signals by backing file, keeping files in order of first
/// appearance. Format and byte offset come from the first signal of a file.
///
/// # Errors
///
/// * `WfdbError::InvalidHeader` - two signals in one file disagree on the format
pub fn group_by_file(signals: &[SignalMeta]) -> Result<Vec<SignalGroup>> {
    let mut groups: Vec<SignalGroup> = Vec::new();
    for (index, signal) in signals.iter().enumerate() {
        match groups.iter_mut().find(|g| g.file_name == signal.file_name) {
            Some(group) => {
                if group.format != signal.format {
                    return Err(WfdbError::InvalidHeader(format!(
                        "file {} mixes formats {} and {}",
                        signal.file_name, group.format, signal.format
                    )));
                }
                group.indices.push(index);
            }
            None => groups.push(SignalGroup {
                file_name: signal.file_name.clone(),
                format: signal.format,
                byte_offset: signal.byte_offset,
                indices: vec![index],
            }),
        }
    }
    Ok(groups)
}

/// Splits a flat multiplexed run into `signals` rows: flat index `i`
/// belongs to row `i % signals` at position `i / signals`. A trailing
/// incomplete frame is dropped.
///
/// # Examples
///
/// ```rust
/// use wfdb::mux::demux;
///
/// assert_eq!(demux(&[1, 2, 3, 4], 2), vec![vec![1, 3], vec![2, 4]]);
/// ```
pub fn demux(flat: &[i32], signals: usize) -> Vec<Vec<i32>> {
    if signals == 0 {
        return Vec::new();
    }
    let frames = flat.len() / signals;
    let mut rows = vec![Vec::with_capacity(frames); signals];
    for frame in flat.chunks_exact(signals) {
        for (row, &sample) in rows.iter_mut().zip(frame) {
            row.push(sample);
        }
    }
    rows
}

/// Interleaves equally long rows into one flat run, the inverse of [`demux`].
///
/// # Errors
///
/// * `WfdbError::InvalidArgument` - the rows differ in length
pub fn mux<R: AsRef<[i32]>>(rows: &[R]) -> Result<Vec<i32>> {
    let frames = rows.first().map_or(0, |r| r.as_ref().len());
    if let Some(index) = rows.iter().position(|r| r.as_ref().len() != frames) {
        return Err(WfdbError::InvalidArgument(format!(
            "cannot multiplex signal {} with {} samples against {}",
            index,
            rows[index].as_ref().len(),
            frames
        )));
    }
    let mut flat = Vec::with_capacity(frames * rows.len());
    for position in 0..frames {
        flat.extend(rows.iter().map(|r| r.as_ref()[position]));
    }
    Ok(flat)
}
