// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use memtrace::analyzer::{write_reports, Analyzer, AnalyzerStats};
use memtrace::clock::ManualClock;
use memtrace::codec::{encode_header, encode_record, FRAME_METADATA_LEN};
use memtrace::options::{AnalyzerOptions, ShmSinkOptions, TraceOptions};
use memtrace::sink::{FileSink, ShmRegionReader, ShmSink, TraceSink};
use memtrace::{IoRecord, OpKind, TraceError, TraceHeader, TraceReader, TraceRecord, Tracer};
use std::path::Path;
use std::sync::Arc;

fn unit_options() -> AnalyzerOptions {
    AnalyzerOptions {
        bucket_width: 1,
        time_unit: 1,
    }
}

/// Replays `path` and returns the stats of the good prefix and the error that stopped it.
fn analyze_file(path: &Path, options: AnalyzerOptions) -> (AnalyzerStats, Option<TraceError>) {
    let mut reader = TraceReader::open(path).unwrap();
    let header = reader.read_header().unwrap();
    let mut analyzer = Analyzer::new(options, &header);
    let mut error = None;
    for record in reader {
        match record {
            Ok(record) => analyzer.record(&record),
            Err(e) => error = Some(e),
        }
    }
    (analyzer.finish(), error)
}

fn trace_small_workload(path: &Path) {
    let tracer = Tracer::new();
    let clock = Arc::new(ManualClock::new(0));
    tracer
        .start_trace(
            clock.clone(),
            TraceOptions::default(),
            Box::new(FileSink::create(path).unwrap()),
        )
        .unwrap();
    tracer.notify(OpKind::Insert, 1, 1, b"a", b"1").unwrap();
    clock.set(1);
    tracer.notify(OpKind::Lookup, 1, 2, b"a", b"1").unwrap();
    tracer.notify(OpKind::Insert, 2, 3, b"b", b"2").unwrap();
    tracer.end_trace().unwrap();
}

#[test]
fn traced_workload_analyzes_deterministically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.log");
    trace_small_workload(&path);

    let (stats, error) = analyze_file(&path, unit_options());
    assert!(error.is_none());
    assert_eq!(stats.total_insert, 2);
    assert_eq!(stats.total_lookup, 1);
    assert_eq!(stats.per_entity[&1].insert_count, 1);
    assert_eq!(stats.per_entity[&1].lookup_count, 1);
    assert_eq!(stats.per_entity[&2].insert_count, 1);
    assert_eq!(stats.per_entity[&1].insert_peak_qps, 1);

    let first = write_reports(&stats, &dir.path().join("run1")).unwrap();
    let (again, _) = analyze_file(&path, unit_options());
    let second = write_reports(&again, &dir.path().join("run2")).unwrap();
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.file_name(), b.file_name());
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }
}

#[test]
fn truncated_log_keeps_good_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.log");
    trace_small_workload(&path);

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();

    let (stats, error) = analyze_file(&path, unit_options());
    assert!(error.unwrap().is_incomplete());
    assert_eq!(stats.total_insert, 1);
    assert_eq!(stats.total_lookup, 1);
    assert!(!stats.per_entity.contains_key(&2));
}

#[test]
fn corrupted_magic_reads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.log");
    trace_small_workload(&path);

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[FRAME_METADATA_LEN + 3] = b'!';
    std::fs::write(&path, &bytes).unwrap();

    let mut reader = TraceReader::open(&path).unwrap();
    assert!(matches!(
        reader.read_header(),
        Err(TraceError::Corruption(_))
    ));
    assert_eq!(reader.by_ref().count(), 0);
    assert_eq!(reader.records_read(), 0);
}

#[test]
fn io_records_flow_through() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("io.log");
    let mut sink = FileSink::create(&path).unwrap();
    sink.append(&encode_header(&TraceHeader::new(0)).unwrap())
        .unwrap();
    for (ts, op, len) in [(1_000_000, "Append", 4096), (2_000_000, "Read", 1024)] {
        let record = TraceRecord::Io(IoRecord {
            timestamp: ts,
            file_operation: op.to_owned(),
            latency: 10,
            io_status: "OK".to_owned(),
            file_name: "000001.log".to_owned(),
            len: Some(len),
            ..Default::default()
        });
        sink.append(&encode_record(&record).unwrap()).unwrap();
    }
    sink.close().unwrap();

    let (stats, error) = analyze_file(&path, AnalyzerOptions::default());
    assert!(error.is_none());
    assert_eq!(stats.io.write_bytes, 4096);
    assert_eq!(stats.io.read_bytes, 1024);
    assert_eq!(stats.io.write_speed, 2048.0);

    let out = dir.path().join("reports");
    write_reports(&stats, &out).unwrap();
    assert_eq!(
        std::fs::read_to_string(out.join("io.txt")).unwrap(),
        "******** Analyze IO speed ********\n\
         Read Bytes: 1024 Read Speed: 512.00 Write Bytes: 4096 Write Speed: 2048.00\n"
    );
}

#[test]
#[cfg_attr(miri, ignore)]
fn shared_memory_trace_replays_from_companion() {
    let key = format!("/tmp/memtrace-replay-test/{}/trace", std::process::id());
    let sink = ShmSink::new(&ShmSinkOptions {
        key: Some(key.clone()),
        capacity: 4096,
        file_checksum: true,
        ..Default::default()
    })
    .unwrap();
    let monitor = sink.size_monitor();

    let tracer = Tracer::new();
    tracer
        .start_trace(
            Arc::new(ManualClock::new(10)),
            TraceOptions::default(),
            Box::new(sink),
        )
        .unwrap();
    tracer.notify(OpKind::Insert, 3, 1, b"k1", b"v1").unwrap();
    tracer.notify(OpKind::Lookup, 3, 2, b"k1", b"v1").unwrap();
    assert_eq!(monitor.get(), tracer.trace_size().unwrap());

    let companion = ShmRegionReader::attach(&key).unwrap();
    assert_eq!(companion.committed_len(), monitor.get());
    let mut reader = companion.trace_reader();
    assert_eq!(reader.read_header().unwrap().start_time, 10);
    let records: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
    assert_eq!(
        records,
        vec![
            TraceRecord::memtable(OpKind::Insert, 10, 3, 1, b"k1", b"v1"),
            TraceRecord::memtable(OpKind::Lookup, 10, 3, 2, b"k1", b"v1"),
        ]
    );

    tracer.end_trace().unwrap();
    memtrace_shm::ShmMapping::unlink(&memtrace_shm::ShmKey::from_path(&key)).unwrap();
}

#[test]
#[cfg_attr(miri, ignore)]
fn full_shared_memory_sink_is_exhausted() {
    let sink = ShmSink::new(&ShmSinkOptions {
        capacity: 64,
        ..Default::default()
    })
    .unwrap();
    let monitor = sink.size_monitor();
    let tracer = Tracer::new();
    tracer
        .start_trace(
            Arc::new(ManualClock::new(0)),
            TraceOptions::default(),
            Box::new(sink),
        )
        .unwrap();
    let before = monitor.get();
    let err = tracer
        .notify(OpKind::Insert, 1, 1, &[0u8; 64], b"")
        .unwrap_err();
    assert!(matches!(err, TraceError::ResourceExhausted(_)), "{err}");
    assert_eq!(monitor.get(), before);
    assert!(tracer.is_tracing());
}
