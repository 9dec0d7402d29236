//! # WFDB Library for Rust
//!
//! A pure Rust library for reading and writing WFDB waveform records: a text
//! header (`.hea`) describing one or more signals, and binary sample files in
//! which those signals are multiplexed.
//!
//! All ten WFDB sample formats are supported (8, 16, 24, 32, 61, 80, 160,
//! 212, 310 and 311). Reads can be limited to a time window and a subset of
//! signals, in which case only the bytes holding the window are read.
//!
//! ## Quick Start
//!
//! ### Reading a record
//!
//! ```rust
//! use wfdb::{SingleSegmentRecord, Result};
//!
//! fn main() -> Result<()> {
//!     # wfdb::doctest_utils::create_simple_test_record("quick_read")?;
//!     // Reads quick_read.hea and the sample files it lists
//!     let record = SingleSegmentRecord::parse("quick_read")?;
//!
//!     let header = record.header();
//!     println!("{} signals at {} Hz", header.record.signal_count, header.record.sampling_frequency);
//!
//!     for (i, signal) in header.signals.iter().enumerate() {
//!         let samples = record.signal(i)?;
//!         let max = samples.iter().max().copied().unwrap_or(0);
//!         println!("{}: {} samples, peak {} adu", signal.description, samples.len(), max);
//!     }
//!     # wfdb::doctest_utils::remove_test_record("quick_read");
//!     Ok(())
//! }
//! ```
//!
//! ### Reading part of a record
//!
//! ```rust
//! use wfdb::{Filter, ReadOptions, ValidationPolicy, WfdbReader};
//!
//! # wfdb::doctest_utils::create_simple_test_record("quick_filter")?;
//! let mut reader = WfdbReader::open("quick_filter")?
//!     .with_options(ReadOptions::default().validation(ValidationPolicy::Strict));
//!
//! // Second signal only, from 0.5 s to 1.5 s
//! let filter = Filter::builder()
//!     .start_time(500)
//!     .end_time(1500)
//!     .signals(vec![1])
//!     .build();
//! let record = reader.read_record(&filter)?;
//!
//! assert_eq!(record.samples().signal_count(), 1);
//! assert_eq!(record.samples().samples_per_signal(), 360);
//!
//! // The header of a filtered record describes the window
//! assert_eq!(record.header().signals[0].initial_value, record.signal(0)?[0]);
//! # wfdb::doctest_utils::remove_test_record("quick_filter");
//! # Ok::<(), wfdb::WfdbError>(())
//! ```
//!
//! ### Creating a record
//!
//! ```rust
//! use wfdb::{SignalFormat, SignalMeta, WfdbWriter, Result};
//!
//! fn main() -> Result<()> {
//!     let mut writer = WfdbWriter::create("quick_write", "ecg")?;
//!     writer.set_sampling_frequency(250.0)?;
//!
//!     // Both leads share ecg.dat, interleaved sample by sample
//!     writer.add_signal(SignalMeta::new("ecg.dat", SignalFormat::Format16).with_description("lead I"))?;
//!     writer.add_signal(SignalMeta::new("ecg.dat", SignalFormat::Format16).with_description("lead II"))?;
//!
//!     let lead_i: Vec<i32> = (0..250).map(|i| ((i as f64 / 250.0 * 6.28).sin() * 1000.0) as i32).collect();
//!     let lead_ii: Vec<i32> = lead_i.iter().map(|v| v * 2).collect();
//!     writer.write_samples(&[lead_i, lead_ii])?;
//!
//!     // Checksums and initial values are computed from the samples
//!     let header = writer.finalize()?;
//!     assert_eq!(header.signals[0].initial_value, 0);
//!
//!     # std::fs::remove_dir_all("quick_write").ok();
//!     Ok(())
//! }
//! ```
//!
//! ## Working with Sample Formats
//!
//! Each format is a [`SignalFormat`] with its own codec. The byte/sample
//! ratio is kept exact, so packed formats never drift on long files:
//!
//! ```rust
//! use wfdb::SignalFormat;
//!
//! let format = SignalFormat::from_code(310)?;
//! let ratio = format.bytes_per_sample();
//! assert_eq!((ratio.bytes, ratio.samples), (4, 3));
//!
//! let bytes = format.encode(&[256, -511, 0], &[]);
//! assert_eq!(bytes, vec![0, 2, 2, 4]);
//! assert_eq!(format.decode(&bytes, &[]), vec![256, -511, 0]);
//! # Ok::<(), wfdb::WfdbError>(())
//! ```
//!
//! ## Logging
//!
//! The library reports its progress through [`tracing`] at `debug` and
//! `trace` level and never installs a subscriber of its own.

pub mod checksum;
pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod format;
pub mod header;
pub mod mux;
pub mod reader;
pub mod storage;
pub mod types;
pub mod utils;
pub mod writer;

#[doc(hidden)]
pub mod doctest_utils; // For internal doctest support

// Re-export main types for convenience
pub use config::{ReadOptions, ValidationPolicy};
pub use error::{Result, WfdbError};
pub use filter::{ByteRange, Filter, FilterBuilder};
pub use format::{BytesPerSample, SignalFormat};
pub use reader::{AssemblyStage, MultiSegmentRecord, Segment, SingleSegmentRecord, WfdbReader};
pub use storage::{DirectoryStorage, MemoryStorage, RecordStorage};
pub use types::{Header, MultiSegmentHeader, RecordMeta, SampleMatrix, SegmentMeta, SignalMeta, SingleSegmentHeader};
pub use writer::WfdbWriter;

// Header defaults
pub const DEFAULT_SAMPLING_FREQUENCY: f64 = 250.0;
pub const DEFAULT_ADC_GAIN: f64 = 200.0;
pub const DEFAULT_ADC_RESOLUTION: u32 = 12;
pub const DEFAULT_UNITS: &str = "mV";

/// Library version
///
/// Returns the current version of the wfdb library.
///
/// # Examples
///
/// ```rust
/// let version = wfdb::version();
/// assert!(!version.is_empty());
/// assert!(version.contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
