use std::fmt;
use std::str::FromStr;

use crate::error::{Result, WfdbError};

/// Storage format of the samples in a WFDB signal file.
///
/// Every variant carries its own bit resolution and byte/sample ratio, and
/// is the single value threaded through the decode and encode paths, so
/// the codec is chosen once at lookup time.
///
/// # Examples
///
/// ```rust
/// use wfdb::SignalFormat;
///
/// let format: SignalFormat = "212".parse()?;
/// assert_eq!(format.bit_resolution(), 12);
/// assert_eq!(format.bytes_per_sample().bytes_for(3), Some(5));
///
/// assert!("999".parse::<SignalFormat>().is_err());
/// # Ok::<(), wfdb::WfdbError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalFormat {
    /// 8-bit first differences
    Format8,
    /// 16-bit two's complement, little-endian
    Format16,
    /// 24-bit two's complement, little-endian
    Format24,
    /// 32-bit two's complement, little-endian
    Format32,
    /// 16-bit two's complement, big-endian
    Format61,
    /// 8-bit offset binary
    Format80,
    /// 16-bit offset binary, little-endian
    Format160,
    /// two 12-bit samples packed in 3 bytes
    Format212,
    /// three 10-bit samples packed in two 16-bit halfwords
    Format310,
    /// three 10-bit samples packed in one 32-bit word
    Format311,
}

/// Exact byte/sample ratio of a format, kept as the packing group
/// (`bytes` bytes hold `samples` samples) so fractional ratios never round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BytesPerSample {
    pub bytes: u64,
    pub samples: u64,
}

impl BytesPerSample {
    /// Number of bytes needed to hold `samples` samples, rounded up.
    /// `None` when the count does not fit in a `u64`.
    pub fn bytes_for(&self, samples: u64) -> Option<u64> {
        let whole = (samples / self.samples).checked_mul(self.bytes)?;
        whole.checked_add((samples % self.samples * self.bytes).div_ceil(self.samples))
    }

    /// Number of whole samples recoverable from `bytes` bytes.
    pub fn samples_in(&self, bytes: u64) -> u64 {
        bytes / self.bytes * self.samples + bytes % self.bytes * self.samples / self.bytes
    }

    /// Rounds a sample count down to the start of its packing group.
    pub fn align_down(&self, samples: u64) -> u64 {
        samples - samples % self.samples
    }

    /// Rounds a byte count down to the start of its packing group.
    pub fn align_bytes_down(&self, bytes: u64) -> u64 {
        bytes - bytes % self.bytes
    }

    pub fn as_f64(&self) -> f64 {
        self.bytes as f64 / self.samples as f64
    }
}

impl SignalFormat {
    pub const ALL: [SignalFormat; 10] = [
        SignalFormat::Format8,
        SignalFormat::Format16,
        SignalFormat::Format24,
        SignalFormat::Format32,
        SignalFormat::Format61,
        SignalFormat::Format80,
        SignalFormat::Format160,
        SignalFormat::Format212,
        SignalFormat::Format310,
        SignalFormat::Format311,
    ];

    /// Looks up the format registered under a numeric WFDB code.
    ///
    /// # Errors
    ///
    /// * `WfdbError::UnsupportedFormat` - the code is not one of the ten supported formats
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            8 => Ok(SignalFormat::Format8),
            16 => Ok(SignalFormat::Format16),
            24 => Ok(SignalFormat::Format24),
            32 => Ok(SignalFormat::Format32),
            61 => Ok(SignalFormat::Format61),
            80 => Ok(SignalFormat::Format80),
            160 => Ok(SignalFormat::Format160),
            212 => Ok(SignalFormat::Format212),
            310 => Ok(SignalFormat::Format310),
            311 => Ok(SignalFormat::Format311),
            other => Err(WfdbError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            SignalFormat::Format8 => 8,
            SignalFormat::Format16 => 16,
            SignalFormat::Format24 => 24,
            SignalFormat::Format32 => 32,
            SignalFormat::Format61 => 61,
            SignalFormat::Format80 => 80,
            SignalFormat::Format160 => 160,
            SignalFormat::Format212 => 212,
            SignalFormat::Format310 => 310,
            SignalFormat::Format311 => 311,
        }
    }

    pub fn bit_resolution(&self) -> u32 {
        match self {
            SignalFormat::Format8 | SignalFormat::Format80 => 8,
            SignalFormat::Format16 | SignalFormat::Format61 | SignalFormat::Format160 => 16,
            SignalFormat::Format24 => 24,
            SignalFormat::Format32 => 32,
            SignalFormat::Format212 => 12,
            SignalFormat::Format310 | SignalFormat::Format311 => 10,
        }
    }

    pub fn bytes_per_sample(&self) -> BytesPerSample {
        let (bytes, samples) = match self {
            SignalFormat::Format8 | SignalFormat::Format80 => (1, 1),
            SignalFormat::Format16 | SignalFormat::Format61 | SignalFormat::Format160 => (2, 1),
            SignalFormat::Format24 => (3, 1),
            SignalFormat::Format32 => (4, 1),
            SignalFormat::Format212 => (3, 2),
            SignalFormat::Format310 | SignalFormat::Format311 => (4, 3),
        };
        BytesPerSample { bytes, samples }
    }

    /// Number of bytes a run of `samples` samples occupies on disk, or
    /// `None` when that does not fit in a `u64`.
    ///
    /// A trailing partial group keeps every byte that carries one of its
    /// bits. For 310 that means whole halfwords: two samples need all four
    /// bytes of the group because the second sample lives in the second
    /// halfword.
    pub fn encoded_len(&self, samples: u64) -> Option<u64> {
        self.bytes_per_sample()
            .bytes_for(samples)
            .and_then(|bytes| self.complete_bytes(bytes))
    }

    /// Extends a byte count cut at the plain byte/sample ratio to the end of
    /// the storage unit holding its last bits.
    pub fn complete_bytes(&self, bytes: u64) -> Option<u64> {
        match self {
            SignalFormat::Format310 => bytes.checked_add(bytes % 2),
            _ => Some(bytes),
        }
    }

    /// Largest number of samples whose bits are all present in `bytes` bytes.
    pub fn samples_in_bytes(&self, bytes: u64) -> u64 {
        match self {
            SignalFormat::Format310 => bytes / 4 * 3 + u64::from(bytes % 4 >= 2),
            _ => self.bytes_per_sample().samples_in(bytes),
        }
    }

    /// Whether each stored value is a difference from the previous sample.
    pub fn is_differential(&self) -> bool {
        matches!(self, SignalFormat::Format8)
    }

    /// Inclusive range of sample values the format can store.
    pub fn sample_range(&self) -> (i64, i64) {
        match self {
            // differences are bounded, amplitudes are not
            SignalFormat::Format8 => (i32::MIN as i64, i32::MAX as i64),
            _ => {
                let bits = self.bit_resolution();
                (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
            }
        }
    }
}

impl FromStr for SignalFormat {
    type Err = WfdbError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let code = text
            .parse::<u32>()
            .map_err(|_| WfdbError::UnsupportedFormat(text.to_string()))?;
        SignalFormat::from_code(code)
    }
}

impl fmt::Display for SignalFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
