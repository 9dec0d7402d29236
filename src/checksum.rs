use tracing::trace;

use crate::config::ValidationPolicy;
use crate::error::{Result, WfdbError};
use crate::types::SignalMeta;

/// 16-bit checksum of a signal: the sum of its samples modulo 65536,
/// read as a signed value.
///
/// # Examples
///
/// ```rust
/// use wfdb::checksum::calculate_checksum;
///
/// assert_eq!(calculate_checksum(&[2, 4, 6, 8]), 20);
/// assert_eq!(calculate_checksum(&[32767, 1]), -32768);
/// ```
pub fn calculate_checksum(samples: &[i32]) -> i16 {
    let sum: i64 = samples.iter().map(|&s| s as i64).sum();
    sum.rem_euclid(65536) as u16 as i16
}

/// Whether `declared` is the checksum of `samples`, read either signed or
/// as its unsigned 16-bit form.
pub fn match_checksum(declared: i32, samples: &[i32]) -> bool {
    let signed = calculate_checksum(samples);
    declared == signed as i32 || declared == signed as u16 as i32
}

/// # Errors
///
/// * `WfdbError::ChecksumMismatch` - the policy checks `declared` and it does not match
pub fn verify_checksum(signal: usize, declared: i32, samples: &[i32], policy: ValidationPolicy) -> Result<()> {
    if !policy.checks_checksum(declared) {
        trace!(signal, declared, "checksum not checked");
        return Ok(());
    }
    if match_checksum(declared, samples) {
        return Ok(());
    }
    Err(WfdbError::ChecksumMismatch {
        signal,
        declared,
        actual: calculate_checksum(samples) as i32,
    })
}

/// # Errors
///
/// * `WfdbError::InitialValueMismatch` - the policy checks `declared` and the first sample differs
pub fn verify_initial_value(signal: usize, declared: i32, samples: &[i32], policy: ValidationPolicy) -> Result<()> {
    let Some(&first) = samples.first() else {
        return Ok(());
    };
    if !policy.checks_initial_value(declared) || first == declared {
        return Ok(());
    }
    Err(WfdbError::InitialValueMismatch {
        signal,
        declared,
        actual: first,
    })
}

/// Rewrites the initial value and checksum of `meta` from `samples`.
pub fn regenerate(meta: &mut SignalMeta, samples: &[i32]) {
    meta.initial_value = samples.first().copied().unwrap_or(0);
    meta.checksum = calculate_checksum(samples) as i32;
}
