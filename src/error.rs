use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WfdbError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unsupported signal format: {0}")]
    UnsupportedFormat(String),

    #[error("Checksum mismatch on signal {signal}: header declares {declared}, samples give {actual}")]
    ChecksumMismatch {
        signal: usize,
        declared: i32,
        actual: i32,
    },

    #[error("Initial value mismatch on signal {signal}: header declares {declared}, first sample is {actual}")]
    InitialValueMismatch {
        signal: usize,
        declared: i32,
        actual: i32,
    },

    #[error("Malformed sample data: {0}")]
    MalformedSampleData(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid byte range: start {start}, end {end}")]
    InvalidByteRange { start: u64, end: u64 },

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Segment length mismatch: header declares {declared} samples, found {actual}")]
    SegmentLengthMismatch { declared: u64, actual: u64 },

    #[error("Signal index {0} out of range")]
    InvalidSignalIndex(usize),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, WfdbError>;
