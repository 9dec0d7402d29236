// Internal utilities for documentation tests
// This file contains helper functions to generate test records for doctests

use std::fs;

use crate::types::{MultiSegmentHeader, RecordMeta, SegmentMeta};
use crate::{Result, SignalFormat, SignalMeta, WfdbWriter};

fn triangle(len: usize, period: i32, amplitude: i32) -> Vec<i32> {
    (0..len as i32)
        .map(|i| {
            let phase = i % period;
            let half = period / 2;
            let rise = if phase < half { phase } else { period - phase };
            rise * 2 * amplitude / period - amplitude / 2
        })
        .collect()
}

fn write_record(dir: &str, name: &str, samples: usize) -> Result<()> {
    let mut writer = WfdbWriter::create(dir, name)?;
    writer.set_sampling_frequency(360.0)?;
    let file_name = format!("{}.dat", name);
    writer.add_signal(SignalMeta::new(&file_name, SignalFormat::Format212).with_description("MLII"))?;
    writer.add_signal(SignalMeta::new(&file_name, SignalFormat::Format212).with_description("V5"))?;
    writer.add_comment("generated for documentation");
    writer.write_samples(&[triangle(samples, 72, 800), triangle(samples, 90, 400)])?;
    writer.finalize()?;
    Ok(())
}

/// Creates a two-signal format 212 record of 720 samples at 360 Hz in the
/// working directory
pub fn create_simple_test_record(name: &str) -> Result<()> {
    write_record(".", name, 720)
}

pub fn remove_test_record(name: &str) {
    fs::remove_file(format!("{}.hea", name)).ok();
    fs::remove_file(format!("{}.dat", name)).ok();
}

/// Creates a multi-segment record: a layout segment, two data segments
/// and a gap between them
pub fn create_multi_segment_test_record(name: &str) -> Result<()> {
    let first = format!("{}_1", name);
    let second = format!("{}_2", name);
    write_record(".", &first, 100)?;
    write_record(".", &second, 200)?;

    let mut record = RecordMeta::new(name, 2, 360.0, 350);
    record.segments = 4;
    let segment = |name: &str, samples| SegmentMeta {
        name: name.to_string(),
        samples_per_signal: samples,
    };
    let header = MultiSegmentHeader {
        record,
        segments: vec![
            segment(&format!("{}_layout", name), 0),
            segment(&first, 100),
            segment("~", 50),
            segment(&second, 200),
        ],
        comments: Vec::new(),
    };
    fs::write(format!("{}.hea", name), header.to_text())?;
    Ok(())
}

pub fn remove_multi_segment_test_record(name: &str) {
    fs::remove_file(format!("{}.hea", name)).ok();
    remove_test_record(&format!("{}_1", name));
    remove_test_record(&format!("{}_2", name));
}
