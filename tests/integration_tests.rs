use wfdb::checksum::calculate_checksum;
use wfdb::mux::demux;
use wfdb::{
    Filter, ReadOptions, SignalFormat, SignalMeta, SingleSegmentRecord, ValidationPolicy, WfdbError, WfdbReader,
    WfdbWriter,
};
use std::fs;
use std::path::Path;

// 清理测试目录的辅助函数
fn cleanup_test_dir(dir: &str) {
    if Path::new(dir).exists() {
        fs::remove_dir_all(dir).ok();
    }
}

// 生成适合格式的测试信号
fn test_signal(format: SignalFormat, signal: usize, len: usize) -> Vec<i32> {
    if format.is_differential() {
        let mut value = signal as i32 * 40 - 60;
        return (0..len)
            .map(|i| {
                value += ((i * 31 + signal * 17) % 41) as i32 - 20;
                value
            })
            .collect();
    }
    let (min, max) = format.sample_range();
    let (low, high) = (min.max(-1000), max.min(1000));
    let span = (high - low + 1) as usize;
    (0..len)
        .map(|i| (low + ((i * 37 + signal * 101) % span) as i64) as i32)
        .collect()
}

fn write_test_record(dir: &str, name: &str, format: SignalFormat, signals: usize, len: usize) -> Vec<Vec<i32>> {
    let mut writer = WfdbWriter::create(dir, name).unwrap();
    writer.set_sampling_frequency(1000.0).unwrap();
    let file_name = format!("{}.dat", name);
    for i in 0..signals {
        writer
            .add_signal(SignalMeta::new(&file_name, format).with_description(&format!("sig{}", i)))
            .unwrap();
    }
    let data: Vec<Vec<i32>> = (0..signals).map(|i| test_signal(format, i, len)).collect();
    // 分两块写入
    let half = len / 2;
    let first: Vec<Vec<i32>> = data.iter().map(|row| row[..half].to_vec()).collect();
    let second: Vec<Vec<i32>> = data.iter().map(|row| row[half..].to_vec()).collect();
    writer.write_samples(&first).unwrap();
    writer.write_samples(&second).unwrap();
    writer.finalize().unwrap();
    data
}

#[test]
fn test_basic_write_read_cycle() {
    let dir = "test_basic_cycle";
    cleanup_test_dir(dir);

    // 写入阶段
    let data = write_test_record(dir, "basic", SignalFormat::Format212, 2, 720);

    // 读取阶段
    let record = SingleSegmentRecord::parse(format!("{}/basic.hea", dir)).unwrap();
    let header = record.header();
    assert_eq!(header.record.name, "basic");
    assert_eq!(header.record.signal_count, 2);
    assert_eq!(header.record.sampling_frequency, 1000.0);
    assert_eq!(header.record.samples_per_signal, 720);
    assert_eq!(header.signals[1].description, "sig1");
    assert_eq!(record.samples().signals(), &data[..]);

    for (i, row) in data.iter().enumerate() {
        assert_eq!(header.signals[i].initial_value, row[0]);
        assert_eq!(header.signals[i].checksum, calculate_checksum(row) as i32);
    }

    cleanup_test_dir(dir);
}

#[test]
fn test_end_to_end_demux_scenario() {
    // 两个信号、格式 16，小端交织
    let bytes = [1u8, 0, 2, 0, 3, 0, 4, 0];
    let flat = SignalFormat::Format16.decode(&bytes, &[]);
    assert_eq!(flat, vec![1, 2, 3, 4]);
    assert_eq!(demux(&flat, 2), vec![vec![1, 3], vec![2, 4]]);

    let dir = "test_end_to_end";
    cleanup_test_dir(dir);
    fs::create_dir_all(dir).unwrap();
    fs::write(format!("{}/e2e.dat", dir), bytes).unwrap();

    // 头部声明的样本数远大于文件内容
    fs::write(format!("{}/e2e.hea", dir), "e2e 2 360 650000\ne2e.dat 16\ne2e.dat 16\n").unwrap();
    let result = SingleSegmentRecord::parse(format!("{}/e2e", dir));
    assert!(matches!(result, Err(WfdbError::MalformedSampleData(_))));

    // 不声明样本数时从文件长度推导
    fs::write(format!("{}/e2e.hea", dir), "e2e 2 360\ne2e.dat 16\ne2e.dat 16\n").unwrap();
    let record = SingleSegmentRecord::parse(format!("{}/e2e", dir)).unwrap();
    assert_eq!(record.signal(0).unwrap(), &[1, 3]);
    assert_eq!(record.signal(1).unwrap(), &[2, 4]);

    cleanup_test_dir(dir);
}

#[test]
fn test_filtered_reads_match_full_read() {
    let dir = "test_filtered_reads";
    cleanup_test_dir(dir);
    let len = 600;

    let windows: [(Option<u64>, Option<u64>); 10] = [
        (None, None),
        (Some(0), Some(1)),
        (Some(1), Some(2)),
        (Some(3), Some(10)),
        (Some(5), Some(5)),
        (Some(7), Some(600)),
        (Some(123), Some(457)),
        (Some(599), Some(600)),
        (Some(250), None),
        (None, Some(5)),
    ];

    for format in SignalFormat::ALL {
        for signals in 1..=3 {
            let name = format!("rec_{}_{}", format, signals);
            let data = write_test_record(dir, &name, format, signals, len);
            let subsets = [None, Some(vec![signals - 1]), Some((0..signals).rev().collect::<Vec<_>>())];

            for (start, end) in windows {
                for subset in &subsets {
                    let mut builder = Filter::builder();
                    if let Some(start) = start {
                        builder = builder.start_time(start);
                    }
                    if let Some(end) = end {
                        builder = builder.end_time(end);
                    }
                    if let Some(subset) = subset {
                        builder = builder.signals(subset.clone());
                    }
                    let filter = builder.build();

                    let mut reader = WfdbReader::open(format!("{}/{}", dir, name))
                        .unwrap()
                        .with_options(ReadOptions::default().validation(ValidationPolicy::Strict));
                    let record = reader.read_record(&filter).unwrap_or_else(|e| {
                        panic!("format {} signals {} filter {}: {}", format, signals, filter, e)
                    });

                    // 采样率 1000 Hz 时毫秒即样本序号
                    let from = start.unwrap_or(0) as usize;
                    let to = end.unwrap_or(len as u64) as usize;
                    let selected: Vec<usize> = subset.clone().unwrap_or_else(|| (0..signals).collect());
                    let expected: Vec<Vec<i32>> = selected.iter().map(|&i| data[i][from..to].to_vec()).collect();
                    assert_eq!(
                        record.samples().signals(),
                        &expected[..],
                        "format {} signals {} filter {}",
                        format,
                        signals,
                        filter
                    );

                    let header = record.header();
                    assert_eq!(header.record.samples_per_signal, (to - from) as u64);
                    for (meta, row) in header.signals.iter().zip(&expected) {
                        assert_eq!(meta.checksum, calculate_checksum(row) as i32);
                    }
                }
            }
        }
    }

    cleanup_test_dir(dir);
}

#[test]
fn test_checksum_validation_on_disk() {
    let dir = "test_checksum_validation";
    cleanup_test_dir(dir);
    let data = write_test_record(dir, "check", SignalFormat::Format16, 1, 100);

    let header_path = format!("{}/check.hea", dir);
    let text = fs::read_to_string(&header_path).unwrap();
    let checksum = calculate_checksum(&data[0]);

    // 无符号写法同样被接受
    let unsigned = text.replace(&format!(" {} 0", checksum), &format!(" {} 0", checksum as u16));
    fs::write(&header_path, &unsigned).unwrap();
    assert!(SingleSegmentRecord::parse(&header_path).is_ok());

    let wrong = checksum.wrapping_add(1);
    fs::write(&header_path, text.replace(&format!(" {} 0", checksum), &format!(" {} 0", wrong))).unwrap();
    match SingleSegmentRecord::parse(&header_path) {
        Err(WfdbError::ChecksumMismatch { signal, declared, actual }) => {
            assert_eq!(signal, 0);
            assert_eq!(declared, wrong as i32);
            assert_eq!(actual, checksum as i32);
        }
        other => panic!("expected a checksum mismatch, got {:?}", other.map(|_| ())),
    }

    // 关闭校验后可以读取
    let mut reader = WfdbReader::open(&header_path)
        .unwrap()
        .with_options(ReadOptions::default().validation(ValidationPolicy::Disabled));
    assert_eq!(reader.read_record(&Filter::default()).unwrap().signal(0).unwrap(), &data[0][..]);

    cleanup_test_dir(dir);
}

#[test]
fn test_export_filtered_record() {
    let dir = "test_export_filtered";
    let out = "test_export_filtered_out";
    cleanup_test_dir(dir);
    cleanup_test_dir(out);
    let data = write_test_record(dir, "src", SignalFormat::Format311, 3, 300);

    let filter = Filter::builder().start_time(100).end_time(200).signals(vec![2, 0]).build();
    let record = SingleSegmentRecord::parse_with_filter(format!("{}/src", dir), &filter).unwrap();
    let written = record.export(out).unwrap();
    assert_eq!(written.record.signal_count, 2);
    assert_eq!(written.record.samples_per_signal, 100);
    assert_eq!(written.signals[0].initial_value, data[2][100]);

    // 导出的记录在严格校验下可以完整读回
    let mut reader = WfdbReader::open(format!("{}/src", out))
        .unwrap()
        .with_options(ReadOptions::default().validation(ValidationPolicy::Strict));
    let copy = reader.read_record(&Filter::default()).unwrap();
    assert_eq!(copy.signal(0).unwrap(), &data[2][100..200]);
    assert_eq!(copy.signal(1).unwrap(), &data[0][100..200]);
    assert_eq!(copy.header(), &written);

    cleanup_test_dir(dir);
    cleanup_test_dir(out);
}

#[test]
fn test_signals_in_separate_files_with_offset() {
    let dir = "test_separate_files";
    cleanup_test_dir(dir);
    fs::create_dir_all(dir).unwrap();

    // 前 4 个字节是文件头，信号从偏移 4 开始
    let mut a = vec![0xAA, 0xBB, 0xCC, 0xDD];
    a.extend([10i16, -10, 20, -20].iter().flat_map(|v| v.to_le_bytes()));
    fs::write(format!("{}/a.dat", dir), &a).unwrap();
    fs::write(format!("{}/b.dat", dir), [0u8, 0x80, 0xFF]).unwrap();
    fs::write(
        format!("{}/split.hea", dir),
        "split 3 100 2\na.dat 16+4\nb.dat 8 100 8 0 -3 0 0\na.dat 16+4\n",
    )
    .unwrap();

    let record = SingleSegmentRecord::parse(format!("{}/split", dir)).unwrap();
    assert_eq!(record.signal(0).unwrap(), &[10, 20]);
    assert_eq!(record.signal(1).unwrap(), &[-3, -131]);
    assert_eq!(record.signal(2).unwrap(), &[-10, -20]);

    // 时间窗口从第二个样本开始
    let filter = Filter::builder().start_time(10).build();
    let record = SingleSegmentRecord::parse_with_filter(format!("{}/split", dir), &filter).unwrap();
    assert_eq!(record.signal(0).unwrap(), &[20]);
    assert_eq!(record.signal(1).unwrap(), &[-131]);
    assert_eq!(record.signal(2).unwrap(), &[-20]);

    cleanup_test_dir(dir);
}

#[test]
fn test_open_errors() {
    assert!(matches!(
        WfdbReader::open("no_such_dir/no_such_record"),
        Err(WfdbError::FileNotFound(_))
    ));

    let dir = "test_open_errors";
    cleanup_test_dir(dir);
    fs::create_dir_all(dir).unwrap();
    fs::write(format!("{}/odd.hea", dir), "odd 1 360 10\nodd.dat 42\n").unwrap();
    assert!(matches!(
        WfdbReader::open(format!("{}/odd", dir)),
        Err(WfdbError::UnsupportedFormat(_))
    ));

    fs::write(format!("{}/lost.hea", dir), "lost 1 360 10\nlost.dat 16\n").unwrap();
    let mut reader = WfdbReader::open(format!("{}/lost", dir)).unwrap();
    assert!(matches!(reader.read_record(&Filter::default()), Err(WfdbError::FileNotFound(_))));
    assert_eq!(reader.stage(), wfdb::AssemblyStage::Failed);

    cleanup_test_dir(dir);
}
