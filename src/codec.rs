//! Sample codecs for the ten WFDB storage formats.
//!
//! Decoding turns a byte buffer into a flat run of multiplexed samples and
//! encoding does the reverse. The codecs know nothing about headers: the only
//! outside input is the per-signal initial values that the differential
//! format 8 needs to anchor its running sums.
//!
//! Packed formats (212, 310, 311) pad the input up to a whole packing group
//! before unpacking and trim the output back to the requested count, so a
//! byte range cut at the tail of a file still yields its last sample.

use crate::error::{Result, WfdbError};
use crate::format::SignalFormat;

impl SignalFormat {
    /// Decodes every sample whose bits are fully present in `source`.
    ///
    /// `initial_values` holds one entry per signal multiplexed in the buffer
    /// and is only read by format 8; other formats ignore it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wfdb::SignalFormat;
    ///
    /// let samples = SignalFormat::Format212.decode(&[1, 2, 3], &[]);
    /// assert_eq!(samples, vec![513, 3]);
    ///
    /// let samples = SignalFormat::Format8.decode(&[0, 0x80, 0x7f], &[-2047]);
    /// assert_eq!(samples, vec![-2047, -2175, -2048]);
    /// ```
    pub fn decode(&self, source: &[u8], initial_values: &[i32]) -> Vec<i32> {
        let count = self.samples_in_bytes(source.len() as u64) as usize;
        decode_unchecked(*self, source, count, initial_values)
    }

    /// Decodes exactly `count` samples from the start of `source`.
    ///
    /// Bytes past the last requested sample are ignored.
    ///
    /// # Errors
    ///
    /// * `WfdbError::MalformedSampleData` - `source` is too short to hold `count` samples
    pub fn decode_exact(&self, source: &[u8], count: usize, initial_values: &[i32]) -> Result<Vec<i32>> {
        match self.encoded_len(count as u64) {
            Some(needed) if source.len() as u64 >= needed => Ok(decode_unchecked(*self, source, count, initial_values)),
            needed => Err(WfdbError::MalformedSampleData(format!(
                "format {} needs {} bytes for {} samples, got {}",
                self,
                needed.map_or_else(|| "more than u64::MAX".to_string(), |n| n.to_string()),
                count,
                source.len()
            ))),
        }
    }

    /// Encodes a flat run of multiplexed samples.
    ///
    /// Values outside the format's bit resolution are truncated to it. The
    /// output is exactly [`SignalFormat::encoded_len`] bytes long.
    pub fn encode(&self, samples: &[i32], initial_values: &[i32]) -> Vec<u8> {
        let mut bytes = match self {
            SignalFormat::Format8 => encode_8(samples, initial_values),
            SignalFormat::Format16 => samples.iter().flat_map(|&s| (s as i16).to_le_bytes()).collect(),
            SignalFormat::Format61 => samples.iter().flat_map(|&s| (s as i16).to_be_bytes()).collect(),
            SignalFormat::Format24 => samples
                .iter()
                .flat_map(|&s| {
                    let [b0, b1, b2, _] = s.to_le_bytes();
                    [b0, b1, b2]
                })
                .collect(),
            SignalFormat::Format32 => samples.iter().flat_map(|&s| s.to_le_bytes()).collect(),
            SignalFormat::Format80 => samples.iter().map(|&s| s.wrapping_add(128) as u8).collect(),
            SignalFormat::Format160 => samples
                .iter()
                .flat_map(|&s| (s.wrapping_add(32768) as u16).to_le_bytes())
                .collect(),
            SignalFormat::Format212 => pack_groups::<2, 3>(samples, pack_212),
            SignalFormat::Format310 => pack_groups::<3, 4>(samples, pack_310),
            SignalFormat::Format311 => pack_groups::<3, 4>(samples, pack_311),
        };
        if let Some(len) = self.encoded_len(samples.len() as u64) {
            bytes.truncate(len as usize);
        }
        bytes
    }
}

fn decode_unchecked(format: SignalFormat, source: &[u8], count: usize, initial_values: &[i32]) -> Vec<i32> {
    match format {
        SignalFormat::Format8 => decode_8(&source[..count], initial_values),
        SignalFormat::Format16 => fixed::<2>(source, count, |b| i16::from_le_bytes(b) as i32),
        SignalFormat::Format61 => fixed::<2>(source, count, |b| i16::from_be_bytes(b) as i32),
        SignalFormat::Format24 => fixed::<3>(source, count, |[b0, b1, b2]| {
            sign_extend(u32::from_le_bytes([b0, b1, b2, 0]), 24)
        }),
        SignalFormat::Format32 => fixed::<4>(source, count, i32::from_le_bytes),
        SignalFormat::Format80 => fixed::<1>(source, count, |[b]| b as i32 - 128),
        SignalFormat::Format160 => fixed::<2>(source, count, |b| u16::from_le_bytes(b) as i32 - 32768),
        SignalFormat::Format212 => unpack_groups::<2, 3>(source, count, unpack_212),
        SignalFormat::Format310 => unpack_groups::<3, 4>(source, count, unpack_310),
        SignalFormat::Format311 => unpack_groups::<3, 4>(source, count, unpack_311),
    }
}

/// Interprets the low `bits` bits of `value` as two's complement.
fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

fn fixed<const N: usize>(source: &[u8], count: usize, read: impl Fn([u8; N]) -> i32) -> Vec<i32> {
    source
        .chunks_exact(N)
        .take(count)
        .map(|chunk| {
            let mut buf = [0u8; N];
            buf.copy_from_slice(chunk);
            read(buf)
        })
        .collect()
}

/// Per-stream running sums anchored at the initial values. Stream `k`
/// owns every byte at position `i` with `i % streams == k`.
fn decode_8(source: &[u8], initial_values: &[i32]) -> Vec<i32> {
    let mut previous: Vec<i32> = if initial_values.is_empty() {
        vec![0]
    } else {
        initial_values.to_vec()
    };
    let streams = previous.len();
    source
        .iter()
        .enumerate()
        .map(|(i, &byte)| {
            let slot = &mut previous[i % streams];
            *slot = slot.wrapping_add(byte as i8 as i32);
            *slot
        })
        .collect()
}

fn encode_8(samples: &[i32], initial_values: &[i32]) -> Vec<u8> {
    let mut previous: Vec<i32> = if initial_values.is_empty() {
        vec![0]
    } else {
        initial_values.to_vec()
    };
    let streams = previous.len();
    samples
        .iter()
        .enumerate()
        .map(|(i, &sample)| {
            let slot = &mut previous[i % streams];
            let difference = sample.wrapping_sub(*slot);
            *slot = sample;
            difference as i8 as u8
        })
        .collect()
}

/// Unpacks `count` samples from groups of `B` bytes holding `S` samples,
/// zero-padding a trailing partial group.
fn unpack_groups<const S: usize, const B: usize>(
    source: &[u8],
    count: usize,
    unpack: fn([u8; B]) -> [i32; S],
) -> Vec<i32> {
    let groups = count.div_ceil(S);
    let mut samples = Vec::with_capacity(groups * S);
    for g in 0..groups {
        let mut group = [0u8; B];
        let start = (g * B).min(source.len());
        let end = (start + B).min(source.len());
        group[..end - start].copy_from_slice(&source[start..end]);
        samples.extend_from_slice(&unpack(group));
    }
    samples.truncate(count);
    samples
}

/// Packs samples into groups of `B` bytes, zero-padding a trailing
/// partial group. The caller trims the surplus bytes.
fn pack_groups<const S: usize, const B: usize>(samples: &[i32], pack: fn([i32; S]) -> [u8; B]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len().div_ceil(S) * B);
    for chunk in samples.chunks(S) {
        let mut group = [0i32; S];
        group[..chunk.len()].copy_from_slice(chunk);
        bytes.extend_from_slice(&pack(group));
    }
    bytes
}

fn unpack_212([b0, b1, b2]: [u8; 3]) -> [i32; 2] {
    let first = b0 as u32 | ((b1 as u32 & 0x0f) << 8);
    let second = b2 as u32 | ((b1 as u32 >> 4) << 8);
    [sign_extend(first, 12), sign_extend(second, 12)]
}

fn pack_212([s0, s1]: [i32; 2]) -> [u8; 3] {
    let first = s0 as u32 & 0xfff;
    let second = s1 as u32 & 0xfff;
    [
        first as u8,
        ((first >> 8) | ((second >> 8) << 4)) as u8,
        second as u8,
    ]
}

fn unpack_310([b0, b1, b2, b3]: [u8; 4]) -> [i32; 3] {
    let low = u16::from_le_bytes([b0, b1]) as u32;
    let high = u16::from_le_bytes([b2, b3]) as u32;
    let first = (low >> 1) & 0x3ff;
    let second = (high >> 1) & 0x3ff;
    let third = (low >> 11) | ((high >> 11) << 5);
    [sign_extend(first, 10), sign_extend(second, 10), sign_extend(third, 10)]
}

fn pack_310([s0, s1, s2]: [i32; 3]) -> [u8; 4] {
    let (first, second, third) = (s0 as u32 & 0x3ff, s1 as u32 & 0x3ff, s2 as u32 & 0x3ff);
    let low = ((first << 1) | ((third & 0x1f) << 11)) as u16;
    let high = ((second << 1) | ((third >> 5) << 11)) as u16;
    let [b0, b1] = low.to_le_bytes();
    let [b2, b3] = high.to_le_bytes();
    [b0, b1, b2, b3]
}

fn unpack_311(bytes: [u8; 4]) -> [i32; 3] {
    let word = u32::from_le_bytes(bytes);
    [
        sign_extend(word & 0x3ff, 10),
        sign_extend((word >> 10) & 0x3ff, 10),
        sign_extend((word >> 20) & 0x3ff, 10),
    ]
}

fn pack_311([s0, s1, s2]: [i32; 3]) -> [u8; 4] {
    let word = (s0 as u32 & 0x3ff) | ((s1 as u32 & 0x3ff) << 10) | ((s2 as u32 & 0x3ff) << 20);
    word.to_le_bytes()
}
