use std::path::Path;

use chrono::{NaiveDate, NaiveTime};
use tracing::debug;

use crate::checksum::regenerate;
use crate::error::{Result, WfdbError};
use crate::header::header_file_name;
use crate::mux::{group_by_file, mux, SignalGroup};
use crate::reader::SingleSegmentRecord;
use crate::storage::{DirectoryStorage, RecordStorage};
use crate::types::{RecordMeta, SignalMeta, SingleSegmentHeader};
use crate::DEFAULT_SAMPLING_FREQUENCY;

/// Progress of an export, logged as it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportStage {
    Assembled,
    Muxed,
    Encoded,
    Written,
}

/// Writer for single-segment WFDB records.
///
/// Signals are declared first, then samples are appended block by block.
/// Nothing is written until [`WfdbWriter::finalize`], which regenerates
/// each signal's initial value and checksum from the samples, encodes
/// every sample file and writes the header last.
///
/// # Examples
///
/// ```rust
/// use wfdb::{SignalFormat, SignalMeta, WfdbWriter};
///
/// let mut writer = WfdbWriter::create("writer_doc", "rec")?;
/// writer.set_sampling_frequency(500.0)?;
/// writer.add_signal(SignalMeta::new("rec.dat", SignalFormat::Format212).with_description("I"))?;
/// writer.add_signal(SignalMeta::new("rec.dat", SignalFormat::Format212).with_description("II"))?;
///
/// for block in 0..4 {
///     let lead_i: Vec<i32> = (0..500).map(|i| (i % 50) * 10 - 250 + block).collect();
///     let lead_ii: Vec<i32> = lead_i.iter().map(|v| v / 2).collect();
///     writer.write_samples(&[lead_i, lead_ii])?;
/// }
///
/// let header = writer.finalize()?;
/// assert_eq!(header.record.samples_per_signal, 2000);
/// assert_eq!(header.signals[0].initial_value, -250);
/// # std::fs::remove_dir_all("writer_doc").ok();
/// # Ok::<(), wfdb::WfdbError>(())
/// ```
pub struct WfdbWriter<S = DirectoryStorage> {
    storage: S,
    record: RecordMeta,
    signals: Vec<SignalMeta>,
    comments: Vec<String>,
    /// 每个信号已追加的样本
    samples: Vec<Vec<i32>>,
    samples_written: bool,
}

impl WfdbWriter<DirectoryStorage> {
    /// Starts a record named `record_name` in directory `dir`. The directory
    /// is created when the record is finalized.
    ///
    /// # Errors
    ///
    /// * `WfdbError::InvalidArgument` - the record name is empty or contains whitespace or `/`
    pub fn create<P: AsRef<Path>>(dir: P, record_name: &str) -> Result<Self> {
        Self::with_storage(DirectoryStorage::new(dir), record_name)
    }
}

impl<S: RecordStorage> WfdbWriter<S> {
    /// # Errors
    ///
    /// Same as [`WfdbWriter::create`].
    pub fn with_storage(storage: S, record_name: &str) -> Result<Self> {
        check_name("record name", record_name)?;
        Ok(WfdbWriter {
            storage,
            record: RecordMeta::new(record_name, 0, DEFAULT_SAMPLING_FREQUENCY, 0),
            signals: Vec::new(),
            comments: Vec::new(),
            samples: Vec::new(),
            samples_written: false,
        })
    }

    /// # Errors
    ///
    /// * `WfdbError::InvalidArgument` - `frequency` is not a positive number
    pub fn set_sampling_frequency(&mut self, frequency: f64) -> Result<()> {
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(WfdbError::InvalidArgument(format!(
                "sampling frequency must be positive, got {}",
                frequency
            )));
        }
        if self.record.counter_frequency == self.record.sampling_frequency {
            self.record.counter_frequency = frequency;
        }
        self.record.sampling_frequency = frequency;
        Ok(())
    }

    pub fn set_base_time(&mut self, time: NaiveTime) {
        self.record.base_time = Some(time);
    }

    pub fn set_base_date(&mut self, date: NaiveDate) {
        self.record.base_date = Some(date);
    }

    /// Adds a comment line to the header. A leading `#` is added when missing.
    pub fn add_comment(&mut self, comment: &str) {
        let comment = comment.trim();
        if comment.starts_with('#') {
            self.comments.push(comment.to_string());
        } else {
            self.comments.push(format!("# {}", comment));
        }
    }

    /// Declares the next signal. Signals sharing a file name are
    /// multiplexed into that file in declaration order.
    ///
    /// The byte offset is reset to 0 because every file is written from
    /// scratch; the initial value and checksum are recomputed on finalize.
    ///
    /// # Errors
    ///
    /// * `WfdbError::InvalidArgument` - samples were already written, the file name is
    ///   unusable, the signal has more than one sample per frame, or it
    ///   shares a file with a signal of another format
    pub fn add_signal(&mut self, mut signal: SignalMeta) -> Result<()> {
        if self.samples_written {
            return Err(WfdbError::InvalidArgument(
                "cannot add a signal after samples were written".to_string(),
            ));
        }
        check_name("file name", &signal.file_name)?;
        if signal.samples_per_frame != 1 {
            return Err(WfdbError::InvalidArgument(format!(
                "{} samples per frame cannot be written",
                signal.samples_per_frame
            )));
        }
        if let Some(other) = self
            .signals
            .iter()
            .find(|s| s.file_name == signal.file_name && s.format != signal.format)
        {
            return Err(WfdbError::InvalidArgument(format!(
                "{} already holds format {}, cannot add format {}",
                signal.file_name, other.format, signal.format
            )));
        }
        signal.byte_offset = 0;
        self.signals.push(signal);
        self.samples.push(Vec::new());
        Ok(())
    }

    /// Appends one block of samples, one equally long row per signal in
    /// declaration order.
    ///
    /// # Errors
    ///
    /// * `WfdbError::InvalidArgument` - the rows do not match the declared signals or
    ///   a value does not fit its signal's format
    pub fn write_samples(&mut self, samples: &[Vec<i32>]) -> Result<()> {
        if samples.len() != self.signals.len() {
            return Err(WfdbError::InvalidArgument(format!(
                "{} sample rows for {} signals",
                samples.len(),
                self.signals.len()
            )));
        }
        if let Some(first) = samples.first() {
            if let Some(index) = samples.iter().position(|row| row.len() != first.len()) {
                return Err(WfdbError::InvalidArgument(format!(
                    "signal {} has {} samples in this block, signal 0 has {}",
                    index,
                    samples[index].len(),
                    first.len()
                )));
            }
        }

        // 先检查全部数据，避免写入一半
        for (index, (row, signal)) in samples.iter().zip(&self.signals).enumerate() {
            let (min, max) = signal.format.sample_range();
            if let Some(value) = row.iter().find(|&&v| (v as i64) < min || (v as i64) > max) {
                return Err(WfdbError::InvalidArgument(format!(
                    "signal {} value {} does not fit format {}",
                    index, value, signal.format
                )));
            }
        }

        for (stored, row) in self.samples.iter_mut().zip(samples) {
            stored.extend_from_slice(row);
        }
        self.samples_written = true;
        Ok(())
    }

    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Samples per signal appended so far.
    pub fn samples_per_signal(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    /// Encodes and writes every sample file, then the header, and returns
    /// the header that was written.
    ///
    /// # Errors
    ///
    /// * `WfdbError::InvalidArgument` - a format 8 signal changes by more than one byte
    ///   can hold between two samples
    /// * `WfdbError::Io` / `WfdbError::FileNotFound` - a file could not be written
    pub fn finalize(mut self) -> Result<SingleSegmentHeader> {
        let record_name = self.record.name.clone();
        let advance = |stage: ExportStage| debug!(record = %record_name, ?stage, "export stage");

        for (signal, samples) in self.signals.iter_mut().zip(&self.samples) {
            regenerate(signal, samples);
        }
        self.record.signal_count = self.signals.len();
        self.record.samples_per_signal = self.samples_per_signal() as u64;
        advance(ExportStage::Assembled);

        let groups = group_by_file(&self.signals)?;
        let mut muxed: Vec<(&SignalGroup, Vec<i32>)> = Vec::with_capacity(groups.len());
        for group in &groups {
            let rows: Vec<&[i32]> = group.indices.iter().map(|&i| self.samples[i].as_slice()).collect();
            if group.format.is_differential() {
                check_differences(group, &rows)?;
            }
            muxed.push((group, mux(&rows)?));
        }
        advance(ExportStage::Muxed);

        let encoded: Vec<(&SignalGroup, Vec<u8>)> = muxed
            .into_iter()
            .map(|(group, flat)| {
                let initial_values = group.initial_values(&self.signals);
                (group, group.format.encode(&flat, &initial_values))
            })
            .collect();
        advance(ExportStage::Encoded);

        for (group, bytes) in &encoded {
            debug!(file = %group.file_name, bytes = bytes.len(), signals = group.len(), "writing sample file");
            self.storage.write_bytes(&group.file_name, bytes)?;
        }
        let header = SingleSegmentHeader {
            record: self.record.clone(),
            signals: self.signals.clone(),
            comments: self.comments.clone(),
        };
        self.storage.write_text(&header_file_name(&record_name), &header.to_text())?;
        advance(ExportStage::Written);
        Ok(header)
    }
}

fn check_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.contains(char::is_whitespace) || name.contains('/') {
        return Err(WfdbError::InvalidArgument(format!("invalid {}: {:?}", kind, name)));
    }
    Ok(())
}

/// First differences of a format 8 signal must each fit in one signed byte.
fn check_differences(group: &SignalGroup, rows: &[&[i32]]) -> Result<()> {
    for (&index, row) in group.indices.iter().zip(rows) {
        if let Some(step) = row
            .windows(2)
            .map(|pair| pair[1] as i64 - pair[0] as i64)
            .find(|step| !(i8::MIN as i64..=i8::MAX as i64).contains(step))
        {
            return Err(WfdbError::InvalidArgument(format!(
                "signal {} changes by {} between samples, format 8 holds -128..=127",
                index, step
            )));
        }
    }
    Ok(())
}

impl SingleSegmentRecord {
    /// Writes the record into directory `dir` under its own name.
    ///
    /// The header written is regenerated from the samples, so a filtered
    /// record exports as a consistent record of its own.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wfdb::{Filter, SingleSegmentRecord};
    ///
    /// # wfdb::doctest_utils::create_simple_test_record("export_doc")?;
    /// let filter = Filter::builder().end_time(1000).build();
    /// let record = SingleSegmentRecord::parse_with_filter("export_doc", &filter)?;
    /// record.export("export_doc_out")?;
    ///
    /// let copy = SingleSegmentRecord::parse("export_doc_out/export_doc")?;
    /// assert_eq!(copy.samples(), record.samples());
    /// # wfdb::doctest_utils::remove_test_record("export_doc");
    /// # std::fs::remove_dir_all("export_doc_out").ok();
    /// # Ok::<(), wfdb::WfdbError>(())
    /// ```
    pub fn export<P: AsRef<Path>>(&self, dir: P) -> Result<SingleSegmentHeader> {
        self.export_to(DirectoryStorage::new(dir))
    }

    /// Writes the record into `storage` under its own name.
    pub fn export_to<S: RecordStorage>(&self, storage: S) -> Result<SingleSegmentHeader> {
        let header = self.header();
        let mut writer = WfdbWriter::with_storage(storage, &header.record.name)?;
        writer.record = header.record.clone();
        writer.record.segments = 1;
        writer.comments = header.comments.clone();
        for signal in &header.signals {
            writer.add_signal(signal.clone())?;
        }
        writer.write_samples(self.samples().signals())?;
        writer.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::format::SignalFormat;
    use crate::reader::WfdbReader;
    use crate::storage::MemoryStorage;
    use crate::types::SampleMatrix;

    fn ramp(len: usize, format: SignalFormat, phase: i32) -> Vec<i32> {
        let (min, max) = format.sample_range();
        let span = (max.min(1000) - min.max(-1000)) as i32;
        (0..len as i32).map(|i| (i * 7 + phase) % span - span / 2).collect()
    }

    fn smooth(len: usize, phase: i32) -> Vec<i32> {
        (0..len as i32).map(|i| ((i * 13 + phase) % 200) - 100).map(|v| v.abs() * 3).collect()
    }

    #[test]
    fn test_write_then_read_every_format() {
        for format in SignalFormat::ALL {
            let mut storage = MemoryStorage::new();
            let mut writer = WfdbWriter::with_storage(&mut storage, "rt").unwrap();
            writer.set_sampling_frequency(360.0).unwrap();
            writer.add_signal(SignalMeta::new("rt.dat", format)).unwrap();
            writer.add_signal(SignalMeta::new("rt.dat", format)).unwrap();
            let rows = if format.is_differential() {
                vec![smooth(37, 0), smooth(37, 50)]
            } else {
                vec![ramp(37, format, 0), ramp(37, format, 11)]
            };
            writer.write_samples(&rows).unwrap();
            let header = writer.finalize().unwrap();
            assert_eq!(header.signals[1].initial_value, rows[1][0], "format {}", format);

            let record = WfdbReader::with_storage(&mut storage, "rt")
                .unwrap()
                .read_record(&Filter::default())
                .unwrap();
            assert_eq!(record.samples().signals(), &rows[..], "format {}", format);
            assert_eq!(record.header(), &header);
        }
    }

    #[test]
    fn test_signals_grouped_into_files() {
        let mut storage = MemoryStorage::new();
        let mut writer = WfdbWriter::with_storage(&mut storage, "two").unwrap();
        writer.add_signal(SignalMeta::new("two_a.dat", SignalFormat::Format16)).unwrap();
        writer.add_signal(SignalMeta::new("two_b.dat", SignalFormat::Format80)).unwrap();
        writer.add_signal(SignalMeta::new("two_a.dat", SignalFormat::Format16)).unwrap();
        writer.write_samples(&[vec![1, 2], vec![-3, 4], vec![5, 6]]).unwrap();
        writer.add_comment("written by a test");
        writer.finalize().unwrap();

        assert_eq!(storage.get("two_a.dat"), Some(&[1u8, 0, 5, 0, 2, 0, 6, 0][..]));
        assert_eq!(storage.get("two_b.dat"), Some(&[125u8, 132][..]));
        let text = String::from_utf8(storage.get("two.hea").unwrap().to_vec()).unwrap();
        assert!(text.starts_with("two 3 250 2\n"));
        assert!(text.ends_with("# written by a test\n"));
    }

    #[test]
    fn test_writer_rejects_bad_input() {
        let mut storage = MemoryStorage::new();
        assert!(WfdbWriter::with_storage(&mut storage, "bad name").is_err());

        let mut writer = WfdbWriter::with_storage(&mut storage, "w").unwrap();
        assert!(writer.set_sampling_frequency(0.0).is_err());
        writer.add_signal(SignalMeta::new("w.dat", SignalFormat::Format212)).unwrap();
        assert!(writer.add_signal(SignalMeta::new("w.dat", SignalFormat::Format16)).is_err());

        let mut framed = SignalMeta::new("f.dat", SignalFormat::Format16);
        framed.samples_per_frame = 4;
        assert!(writer.add_signal(framed).is_err());

        assert!(matches!(writer.write_samples(&[vec![2048]]), Err(WfdbError::InvalidArgument(_))));
        assert!(matches!(writer.write_samples(&[vec![1], vec![2]]), Err(WfdbError::InvalidArgument(_))));
        writer.write_samples(&[vec![2047, -2048]]).unwrap();
        assert_eq!(writer.samples_per_signal(), 2);
        assert!(writer.add_signal(SignalMeta::new("w2.dat", SignalFormat::Format16)).is_err());
    }

    #[test]
    fn test_format_8_steps_must_fit() {
        let mut storage = MemoryStorage::new();
        let mut writer = WfdbWriter::with_storage(&mut storage, "d").unwrap();
        writer.add_signal(SignalMeta::new("d.dat", SignalFormat::Format8)).unwrap();
        writer.write_samples(&[vec![0, 100, 300]]).unwrap();
        assert!(matches!(writer.finalize(), Err(WfdbError::InvalidArgument(_))));
        assert!(storage.file_names().is_empty());
    }

    #[test]
    fn test_export_regenerates_header() {
        let mut signal = SignalMeta::new("src.dat", SignalFormat::Format16).with_description("V5");
        signal.byte_offset = 64;
        signal.checksum = 1234;
        signal.initial_value = -9;
        let header = SingleSegmentHeader {
            record: RecordMeta::new("src", 1, 128.0, 3),
            signals: vec![signal],
            comments: vec!["# kept".to_string()],
        };
        let record = SingleSegmentRecord::new(header, SampleMatrix::new(vec![vec![4, 5, 6]]).unwrap()).unwrap();

        let mut storage = MemoryStorage::new();
        let written = record.export_to(&mut storage).unwrap();
        assert_eq!(written.signals[0].byte_offset, 0);
        assert_eq!(written.signals[0].checksum, 15);
        assert_eq!(written.signals[0].initial_value, 4);
        assert_eq!(written.signals[0].description, "V5");
        assert_eq!(written.comments, vec!["# kept"]);
        assert_eq!(storage.get("src.dat").map(<[u8]>::len), Some(6));
    }
}
