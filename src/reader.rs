use std::path::Path;

use tracing::{debug, warn};

use crate::checksum::{regenerate, verify_checksum, verify_initial_value};
use crate::config::ReadOptions;
use crate::error::{Result, WfdbError};
use crate::filter::Filter;
use crate::header::{check_frame_layout, header_file_name};
use crate::mux::{demux, group_by_file};
use crate::storage::{DirectoryStorage, RecordStorage};
use crate::types::{Header, MultiSegmentHeader, SampleMatrix, SingleSegmentHeader};

/// Progress of one record read.
///
/// A read walks `HeaderResolved → FilterApplied → SamplesDecoded →
/// Validated → Assembled`; any error ends it in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStage {
    Idle,
    HeaderResolved,
    FilterApplied,
    SamplesDecoded,
    Validated,
    Assembled,
    Failed,
}

struct Progress<'a> {
    record: &'a str,
    stage: AssemblyStage,
}

impl<'a> Progress<'a> {
    fn new(record: &'a str) -> Self {
        let mut progress = Progress {
            record,
            stage: AssemblyStage::Idle,
        };
        progress.advance(AssemblyStage::HeaderResolved);
        progress
    }

    fn advance(&mut self, stage: AssemblyStage) {
        debug!(record = self.record, from = ?self.stage, to = ?stage, "assembly stage");
        self.stage = stage;
    }

    fn finish<T>(self, result: &Result<T>) -> AssemblyStage {
        match result {
            Ok(_) => self.stage,
            Err(e) => {
                warn!(record = self.record, stage = ?self.stage, error = %e, "record assembly failed");
                AssemblyStage::Failed
            }
        }
    }
}

/// A single-segment record: its header and one row of samples per signal.
///
/// After a filtered read the header describes the selection: the signal
/// lines are those of the selected signals, and the sample count,
/// initial values and checksums match the decoded window.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleSegmentRecord {
    header: SingleSegmentHeader,
    samples: SampleMatrix,
}

impl SingleSegmentRecord {
    /// Pairs a header with samples.
    ///
    /// # Errors
    ///
    /// * `WfdbError::InvalidArgument` - the header does not have one signal line per sample row
    pub fn new(header: SingleSegmentHeader, samples: SampleMatrix) -> Result<Self> {
        if header.signals.len() != samples.signal_count() {
            return Err(WfdbError::InvalidArgument(format!(
                "header describes {} signals, samples hold {}",
                header.signals.len(),
                samples.signal_count()
            )));
        }
        Ok(SingleSegmentRecord { header, samples })
    }

    /// Reads a whole record from disk.
    ///
    /// `path` names the record: `data/100` and `data/100.hea` both read
    /// `data/100.hea` and the sample files it lists.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wfdb::SingleSegmentRecord;
    ///
    /// # wfdb::doctest_utils::create_simple_test_record("parse_doc")?;
    /// let record = SingleSegmentRecord::parse("parse_doc")?;
    /// assert_eq!(record.header().record.signal_count, 2);
    /// assert_eq!(record.samples().samples_per_signal(), 720);
    /// # wfdb::doctest_utils::remove_test_record("parse_doc");
    /// # Ok::<(), wfdb::WfdbError>(())
    /// ```
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        WfdbReader::open(path)?.read_record(&Filter::default())
    }

    /// Reads the part of a record selected by `filter`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wfdb::{Filter, SingleSegmentRecord};
    ///
    /// # wfdb::doctest_utils::create_simple_test_record("filter_doc")?;
    /// let filter = Filter::builder().start_time(500).end_time(1000).signals(vec![1]).build();
    /// let record = SingleSegmentRecord::parse_with_filter("filter_doc", &filter)?;
    ///
    /// // 500 ms at 360 Hz
    /// assert_eq!(record.samples().samples_per_signal(), 180);
    /// assert_eq!(record.header().signals.len(), 1);
    /// # wfdb::doctest_utils::remove_test_record("filter_doc");
    /// # Ok::<(), wfdb::WfdbError>(())
    /// ```
    pub fn parse_with_filter<P: AsRef<Path>>(path: P, filter: &Filter) -> Result<Self> {
        WfdbReader::open(path)?.read_record(filter)
    }

    pub fn header(&self) -> &SingleSegmentHeader {
        &self.header
    }

    pub fn samples(&self) -> &SampleMatrix {
        &self.samples
    }

    /// Samples of one signal.
    ///
    /// # Errors
    ///
    /// * `WfdbError::InvalidSignalIndex` - `index` is not a signal of this record
    pub fn signal(&self, index: usize) -> Result<&[i32]> {
        self.samples.signal(index).ok_or(WfdbError::InvalidSignalIndex(index))
    }

    pub fn into_parts(self) -> (SingleSegmentHeader, SampleMatrix) {
        (self.header, self.samples)
    }
}

/// One segment of a multi-segment record.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// A segment backed by its own single-segment record
    Record(SingleSegmentRecord),
    /// A gap (`~`) of `samples` samples with no data
    Null { samples: u64 },
    /// The zero-length layout segment naming the signals
    Layout { name: String },
}

impl Segment {
    pub fn samples_per_signal(&self) -> u64 {
        match self {
            Segment::Record(record) => record.samples().samples_per_signal() as u64,
            Segment::Null { samples } => *samples,
            Segment::Layout { .. } => 0,
        }
    }
}

/// A record split into consecutive segments.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiSegmentRecord {
    header: MultiSegmentHeader,
    segments: Vec<Segment>,
}

impl MultiSegmentRecord {
    /// Reads a multi-segment record and every segment it lists from disk.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wfdb::{MultiSegmentRecord, Segment};
    ///
    /// # wfdb::doctest_utils::create_multi_segment_test_record("multi_doc")?;
    /// let record = MultiSegmentRecord::parse("multi_doc")?;
    /// assert_eq!(record.samples_per_signal(), record.header().record.samples_per_signal);
    /// assert!(record.segments().iter().any(|s| matches!(s, Segment::Null { .. })));
    /// # wfdb::doctest_utils::remove_multi_segment_test_record("multi_doc");
    /// # Ok::<(), wfdb::WfdbError>(())
    /// ```
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        WfdbReader::open(path)?.read_multi_segment()
    }

    pub fn header(&self) -> &MultiSegmentHeader {
        &self.header
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total length of the record, gaps included.
    pub fn samples_per_signal(&self) -> u64 {
        self.segments.iter().map(Segment::samples_per_signal).sum()
    }
}

/// Reader for WFDB records.
///
/// The header is parsed when the reader is created; samples are read on
/// demand. Each backing file is opened only for the read of its own
/// signal group.
///
/// # Examples
///
/// ```rust
/// use wfdb::{Filter, Header, WfdbReader};
///
/// # wfdb::doctest_utils::create_simple_test_record("reader_doc")?;
/// let mut reader = WfdbReader::open("reader_doc.hea")?;
/// if let Header::Single(header) = reader.header() {
///     for signal in &header.signals {
///         println!("{} ({}) in {}", signal.description, signal.format, signal.file_name);
///     }
/// }
///
/// let first_second = Filter::builder().end_time(1000).build();
/// let record = reader.read_record(&first_second)?;
/// assert_eq!(record.signal(0)?.len(), 360);
/// # wfdb::doctest_utils::remove_test_record("reader_doc");
/// # Ok::<(), wfdb::WfdbError>(())
/// ```
pub struct WfdbReader<S = DirectoryStorage> {
    storage: S,
    record_name: String,
    header: Header,
    options: ReadOptions,
    /// 最近一次读取的阶段
    stage: AssemblyStage,
}

impl WfdbReader<DirectoryStorage> {
    /// Opens the record named by `path`, with or without its `.hea` extension.
    ///
    /// # Errors
    ///
    /// * `WfdbError::FileNotFound` - the header file doesn't exist or can't be opened
    /// * `WfdbError::InvalidHeader` - the header text is malformed
    /// * `WfdbError::UnsupportedFormat` - a signal uses an unknown format code
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| WfdbError::InvalidArgument(format!("{} does not name a record", path.display())))?;
        let record_name = file_name.strip_suffix(".hea").unwrap_or(file_name);
        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Self::with_storage(DirectoryStorage::new(root), record_name)
    }
}

impl<S: RecordStorage> WfdbReader<S> {
    /// Reads and parses the header of `record_name` from `storage`.
    ///
    /// # Errors
    ///
    /// Same as [`WfdbReader::open`].
    pub fn with_storage(storage: S, record_name: &str) -> Result<Self> {
        let text = storage.read_text(&header_file_name(record_name))?;
        let header = Header::parse(&text)?;
        debug!(record = record_name, multi_segment = matches!(header, Header::Multi(_)), "header resolved");
        Ok(WfdbReader {
            storage,
            record_name: record_name.to_string(),
            header,
            options: ReadOptions::default(),
            stage: AssemblyStage::HeaderResolved,
        })
    }

    pub fn with_options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    pub fn options(&self) -> ReadOptions {
        self.options
    }

    /// Where the last read stopped: `Assembled` after a success, `Failed`
    /// after an error.
    pub fn stage(&self) -> AssemblyStage {
        self.stage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Decodes the samples selected by `filter` from a single-segment record.
    ///
    /// Declared checksums are checked when every sample of a signal is
    /// read, declared initial values when the read starts at the first
    /// sample, both as the [`ReadOptions`] validation policy allows.
    ///
    /// # Errors
    ///
    /// * `WfdbError::InvalidHeader` - the record is multi-segment, or a signal has more than one sample per frame
    /// * `WfdbError::InvalidFilter` - the filter does not fit the record
    /// * `WfdbError::FileNotFound` - a sample file is missing
    /// * `WfdbError::MalformedSampleData` - a sample file is too short
    /// * `WfdbError::ChecksumMismatch` / `WfdbError::InitialValueMismatch` - samples disagree with the header
    pub fn read_record(&mut self, filter: &Filter) -> Result<SingleSegmentRecord> {
        let Header::Single(header) = &self.header else {
            return Err(WfdbError::InvalidHeader(format!(
                "{} is a multi-segment record",
                self.record_name
            )));
        };
        let mut progress = Progress::new(&self.record_name);
        let result = assemble(&self.storage, header, filter, self.options, &mut progress);
        let stage = progress.finish(&result);
        self.stage = stage;
        result
    }

    /// Reads every segment of a multi-segment record.
    ///
    /// Segment lengths are checked against the record line before any
    /// sample file is opened, and each decoded segment against its own
    /// segment line.
    ///
    /// # Errors
    ///
    /// * `WfdbError::InvalidHeader` - the record is single-segment
    /// * `WfdbError::SegmentLengthMismatch` - segment lengths disagree with the header
    /// * any error of [`WfdbReader::read_record`] for a segment
    pub fn read_multi_segment(&mut self) -> Result<MultiSegmentRecord> {
        let Header::Multi(header) = &self.header else {
            return Err(WfdbError::InvalidHeader(format!(
                "{} is a single-segment record",
                self.record_name
            )));
        };

        let declared = header.record.samples_per_signal;
        let Some(actual) = header
            .segments
            .iter()
            .try_fold(0u64, |total, s| total.checked_add(s.samples_per_signal))
        else {
            self.stage = AssemblyStage::Failed;
            return Err(WfdbError::InvalidHeader(format!(
                "segment lengths of {} add up past u64::MAX",
                self.record_name
            )));
        };
        if declared > 0 && declared != actual {
            self.stage = AssemblyStage::Failed;
            warn!(record = %self.record_name, declared, actual, "segment lengths disagree with the record");
            return Err(WfdbError::SegmentLengthMismatch { declared, actual });
        }

        let mut segments = Vec::with_capacity(header.segments.len());
        for meta in &header.segments {
            if meta.is_null() {
                segments.push(Segment::Null {
                    samples: meta.samples_per_signal,
                });
                continue;
            }
            if meta.is_layout() {
                segments.push(Segment::Layout { name: meta.name.clone() });
                continue;
            }

            let mut progress = Progress::new(&meta.name);
            let result = self
                .storage
                .read_text(&header_file_name(&meta.name))
                .and_then(|text| SingleSegmentHeader::parse(&text))
                .and_then(|segment_header| {
                    assemble(&self.storage, &segment_header, &Filter::default(), self.options, &mut progress)
                })
                .and_then(|record| {
                    let actual = record.samples().samples_per_signal() as u64;
                    if actual != meta.samples_per_signal {
                        return Err(WfdbError::SegmentLengthMismatch {
                            declared: meta.samples_per_signal,
                            actual,
                        });
                    }
                    Ok(record)
                });
            let stage = progress.finish(&result);
            self.stage = stage;
            segments.push(Segment::Record(result?));
        }

        self.stage = AssemblyStage::Assembled;
        Ok(MultiSegmentRecord {
            header: header.clone(),
            segments,
        })
    }
}

fn assemble<S: RecordStorage + ?Sized>(
    storage: &S,
    header: &SingleSegmentHeader,
    filter: &Filter,
    options: ReadOptions,
    progress: &mut Progress<'_>,
) -> Result<SingleSegmentRecord> {
    check_frame_layout(&header.signals)?;
    let groups = group_by_file(&header.signals)?;
    let resolved = filter.resolve(&header.record)?;
    progress.advance(AssemblyStage::FilterApplied);

    // 按信号索引存放解码结果
    let mut decoded: Vec<Option<Vec<i32>>> = vec![None; header.signals.len()];
    for group in &groups {
        if !group.indices.iter().any(|i| resolved.signals.contains(i)) {
            continue;
        }
        let file_len = storage.file_len(&group.file_name)?;
        let plan = resolved.plan_group(&header.record, group, file_len)?;
        debug!(
            file = %group.file_name,
            format = group.format.code(),
            start = plan.range.start(),
            end = plan.range.end(),
            "reading signal group"
        );
        let bytes = storage.read_range(&group.file_name, plan.range)?;
        let initial_values = group.initial_values(&header.signals);
        let mut flat = match plan.count {
            Some(count) => group.format.decode_exact(&bytes, count, &initial_values)?,
            None => group.format.decode(&bytes, &initial_values),
        };
        flat.drain(..plan.skip.min(flat.len()));
        for (&index, row) in group.indices.iter().zip(demux(&flat, group.len())) {
            decoded[index] = Some(row);
        }
    }

    let mut rows = Vec::with_capacity(resolved.signals.len());
    for &index in &resolved.signals {
        let row = decoded[index]
            .take()
            .ok_or_else(|| WfdbError::MalformedSampleData(format!("signal {} was not decoded", index)))?;
        rows.push(row);
    }
    if let Some(first) = rows.first() {
        if rows.iter().any(|r| r.len() != first.len()) {
            return Err(WfdbError::MalformedSampleData(
                "sample files hold different numbers of samples".to_string(),
            ));
        }
    }
    progress.advance(AssemblyStage::SamplesDecoded);

    let full_range = resolved.covers_record(&header.record);
    for (&index, row) in resolved.signals.iter().zip(&rows) {
        let signal = &header.signals[index];
        if full_range {
            verify_checksum(index, signal.checksum, row, options.validation)?;
        }
        if resolved.starts_at_beginning() {
            verify_initial_value(index, signal.initial_value, row, options.validation)?;
        }
    }
    progress.advance(AssemblyStage::Validated);

    let samples_per_signal = rows.first().map_or(0, Vec::len) as u64;
    let mut record_header = header.clone();
    if filter.is_default() {
        record_header.record.samples_per_signal = samples_per_signal;
    } else {
        record_header.record.signal_count = resolved.signals.len();
        record_header.record.samples_per_signal = samples_per_signal;
        record_header.signals = resolved.signals.iter().map(|&i| header.signals[i].clone()).collect();
        for (signal, row) in record_header.signals.iter_mut().zip(&rows) {
            regenerate(signal, row);
        }
    }
    let record = SingleSegmentRecord::new(record_header, SampleMatrix::new(rows)?)?;
    progress.advance(AssemblyStage::Assembled);
    Ok(record)
}
