use sched_cdict::parser::{
    adapt, parse_perf_line, FieldValue, InputFormat, OccurrenceKind, PayloadShape, PerfTextReader,
    RawLineReader, Tracepoint,
};
use sched_cdict::utils::error::{ParseError, PayloadError};
use std::io::BufReader;

#[test]
fn test_perf_text_nanosecond_timestamps() {
    let occ = parse_perf_line(
        "qemu-system-x86 27637 [006] 622048.897809123: kvm:kvm_entry: vcpu 3, rip 0xffffffff81000000",
        1,
    )
    .unwrap()
    .unwrap();
    assert_eq!(occ.common.nsecs, 897_809_123);
    assert_eq!(occ.common.usecs(), 622_048_897_809);
    assert_eq!(occ.kind, OccurrenceKind::KvmEntry { vcpu_id: 3 });
}

#[test]
fn test_perf_text_newer_kvm_exit_layout() {
    let occ = parse_perf_line(
        "CPU 0/KVM 4410/4421 [002] 100.5: kvm:kvm_exit: vcpu 0 reason MSR_WRITE rip 0xffffffff8106b6b4 info 0 0",
        1,
    )
    .unwrap()
    .unwrap();
    assert_eq!(occ.common.comm, "CPU 0/KVM");
    assert_eq!(occ.common.pid, 4421);
    assert_eq!(
        occ.kind,
        OccurrenceKind::KvmExit {
            exit_reason: "MSR_WRITE".to_string()
        }
    );
}

#[test]
fn test_perf_text_reader_stops_with_line_number() {
    let input = "bash 1 [000] 1.0: kvm:kvm_entry: vcpu 0\nbash 1 [000] 1.1: kvm:kvm_entry: vcpu x\n";
    let results: Vec<_> = PerfTextReader::new(input.as_bytes()).collect();
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(ParseError::MalformedLine { line: 2, .. })
    ));
}

#[test]
fn test_raw_reader_feeds_adapter() {
    let input = "{\"event\": \"sched__sched_switch\", \"fields\": [3, 5, 0, 42, \"bash\", \"bash\", 42, 120, 1, \"swapper/3\", 0, 120]}\n";
    let line = RawLineReader::new(input.as_bytes()).next().unwrap().unwrap();
    assert_eq!(
        PayloadShape::detect(Tracepoint::SchedSwitch, line.occurrence.fields.len()),
        Some(PayloadShape::Plain)
    );
    let occ = adapt(Tracepoint::SchedSwitch, &line.occurrence).unwrap();
    assert_eq!(
        occ.kind,
        OccurrenceKind::SchedSwitch {
            prev_comm: "bash".to_string(),
            prev_pid: 42,
            next_comm: "swapper/3".to_string(),
            next_pid: 0,
        }
    );
}

#[test]
fn test_adapter_rejects_two_extra_fields() {
    let mut fields = vec![
        FieldValue::Int(0),
        FieldValue::Int(0),
        FieldValue::Int(0),
        FieldValue::Int(1),
        FieldValue::Str("a".to_string()),
    ];
    fields.extend([FieldValue::Null, FieldValue::Null, FieldValue::Int(0)]);
    let raw = sched_cdict::parser::RawOccurrence {
        event: "kvm__kvm_entry".to_string(),
        fields,
    };
    assert!(matches!(
        adapt(Tracepoint::KvmEntry, &raw),
        Err(PayloadError::ArityMismatch {
            expected: 6,
            found: 8,
            ..
        })
    ));
}

#[test]
fn test_detect_format_skips_comments() {
    let mut reader = BufReader::new("#\n# perf script\n  bash 1 [000] 1.0: a:b: c\n".as_bytes());
    assert_eq!(InputFormat::detect(&mut reader).unwrap(), InputFormat::PerfText);
}
