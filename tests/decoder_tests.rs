use pretty_assertions::assert_eq;
use sched_cdict::aggregator::{KvmPairingTracker, RuntimeAggregator};
use sched_cdict::decoder::{decode_stream, EventDispatcher};
use sched_cdict::naming::NameCache;
use sched_cdict::parser::{CommonFields, FieldValue, InputFormat, Occurrence, OccurrenceKind, RawOccurrence};
use sched_cdict::utils::error::{ParseError, PayloadError};

fn common(cpu: u32, usecs: u64, pid: i32, comm: &str) -> CommonFields {
    CommonFields {
        cpu,
        secs: usecs / 1_000_000,
        nsecs: (usecs % 1_000_000) * 1000,
        pid,
        comm: comm.to_string(),
    }
}

fn kvm_entry(usecs: u64, tid: i32) -> Occurrence {
    Occurrence {
        common: common(0, usecs, tid, "qemu"),
        kind: OccurrenceKind::KvmEntry { vcpu_id: 0 },
    }
}

fn kvm_exit(usecs: u64, tid: i32, reason: &str) -> Occurrence {
    Occurrence {
        common: common(0, usecs, tid, "qemu"),
        kind: OccurrenceKind::KvmExit {
            exit_reason: reason.to_string(),
        },
    }
}

fn int(v: i64) -> FieldValue {
    FieldValue::Int(v)
}

fn text(s: &str) -> FieldValue {
    FieldValue::Str(s.to_string())
}

#[test]
fn test_runtime_samples_sum_into_switch() {
    let mut runtime = RuntimeAggregator::new();
    assert_eq!(runtime.on_switch(3), None);
    runtime.on_runtime_sample(3, 1000);
    runtime.on_runtime_sample(3, 2000);
    assert_eq!(runtime.on_switch(3), Some(3));
    // accumulator reset
    assert_eq!(runtime.on_switch(3), Some(0));
}

#[test]
fn test_kvm_entry_exit_entry_pairing() {
    let mut dispatcher = EventDispatcher::new(NameCache::offline());
    dispatcher.dispatch(kvm_entry(100, 7));
    dispatcher.dispatch(kvm_exit(250, 7, "HLT"));
    dispatcher.dispatch(kvm_entry(400, 7));

    let out = dispatcher.finish();
    assert_eq!(out.log.events(), ["kvm-exit", "kvm-entry"]);
    assert_eq!(out.log.durations(), [150, 150]);
    assert_eq!(out.log.next_comms(), [Some("HLT".to_string()), None]);
    assert_eq!(out.log.next_pids(), [None, None]);
    assert_eq!(out.log.pids(), [7, 7]);
}

#[test]
fn test_kvm_threads_are_independent() {
    let mut kvm = KvmPairingTracker::new();
    assert_eq!(kvm.on_entry(1, 10), None);
    assert_eq!(kvm.on_exit(2, 20), None);
    assert_eq!(kvm.on_exit(1, 35), Some(25));
    assert_eq!(kvm.on_entry(2, 50), Some(30));
    assert_eq!(kvm.tracked_threads(), 2);
}

#[test]
fn test_usecs_zero_based_and_non_decreasing() {
    let input = "\
 qemu 7 [001] 622048.000100: kvm:kvm_entry: vcpu 0
 qemu 7 [001] 622048.000250: kvm:kvm_exit: reason HLT
 bash 9 [002] 622048.000300: sched:sched_switch: prev_comm=bash prev_pid=9 prev_prio=120 prev_state=S ==> next_comm=swapper/2 next_pid=0 next_prio=120
 bash 9 [002] 622048.000310: sched:sched_stat_sleep: comm=sshd pid=12 delay=2500 [ns]
 qemu 7 [001] 622048.000400: kvm:kvm_entry: vcpu 0
 swapper 0 [002] 622048.000500: sched:sched_stat_iowait: comm=dd pid=33 delay=9000 [ns]
";
    let mut dispatcher = EventDispatcher::new(NameCache::offline());
    decode_stream(input.as_bytes(), InputFormat::PerfText, &mut dispatcher).unwrap();
    let out = dispatcher.finish();

    let usecs = out.log.usecs();
    assert_eq!(usecs[0], 0);
    assert!(usecs.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(usecs, [0, 60, 150, 250]);
    assert_eq!(
        out.log.events(),
        ["kvm-exit", "sched-runtime-sleep-wake", "kvm-entry", "sched-runtime-iowait"]
    );
    assert_eq!(out.log.durations(), [150, 2, 150, 9]);
}

#[test]
fn test_columns_stay_equal_length() {
    let mut dispatcher = EventDispatcher::new(NameCache::offline());
    for step in 0..50u64 {
        dispatcher.dispatch(kvm_entry(step * 20, 7));
        dispatcher.dispatch(kvm_exit(step * 20 + 10, 7, "IO_INSTRUCTION"));
        let log = dispatcher.log();
        let len = log.len();
        assert_eq!(log.events().len(), len);
        assert_eq!(log.cpus().len(), len);
        assert_eq!(log.usecs().len(), len);
        assert_eq!(log.pids().len(), len);
        assert_eq!(log.task_names().len(), len);
        assert_eq!(log.durations().len(), len);
        assert_eq!(log.next_pids().len(), len);
        assert_eq!(log.next_comms().len(), len);
    }
    assert_eq!(dispatcher.log().len(), 99);
}

#[test]
fn test_raw_payload_both_shapes() {
    let plain = RawOccurrence {
        event: "kvm__kvm_entry".to_string(),
        fields: vec![int(1), int(0), int(100_000), int(7), text("qemu"), int(0)],
    };
    let with_callchain = RawOccurrence {
        event: "kvm__kvm_exit".to_string(),
        fields: vec![
            int(1),
            int(0),
            int(250_000),
            int(7),
            text("qemu"),
            FieldValue::List(vec![]),
            text("HLT"),
            int(0),
            int(1),
            int(0),
            int(0),
        ],
    };

    let mut dispatcher = EventDispatcher::new(NameCache::offline());
    dispatcher.dispatch_raw(&plain).unwrap();
    dispatcher.dispatch_raw(&with_callchain).unwrap();

    let out = dispatcher.finish();
    assert_eq!(out.log.len(), 1);
    let record = out.log.get(0).unwrap();
    assert_eq!(record.event, "kvm-exit");
    assert_eq!(record.duration, 150);
    assert_eq!(record.next_comm.as_deref(), Some("HLT"));
    assert_eq!(out.tally.handled["kvm_entry"], 1);
    assert_eq!(out.tally.handled["kvm_exit"], 1);
}

#[test]
fn test_raw_payload_wrong_type_is_fatal() {
    let raw = RawOccurrence {
        event: "sched__sched_stat_runtime".to_string(),
        fields: vec![int(1), int(0), int(0), int(7), text("bash"), text("bash"), text("seven"), int(10), int(0)],
    };
    let mut dispatcher = EventDispatcher::new(NameCache::offline());
    let err = dispatcher.dispatch_raw(&raw).unwrap_err();
    assert!(matches!(err, PayloadError::FieldType { name: "pid", .. }));
}

#[test]
fn test_raw_stream_stops_at_first_malformed_line() {
    let input = r#"{"event": "sched__sched_wakeup", "fields": [0, 0, 0, 1, "a", "b", 2, 120, 1, 0]}
{"event": "kvm__kvm_entry", "fields": [0, 0, 0, 1, "a", 0, 0, 0]}
{"event": "kvm__kvm_entry", "fields": [0, 0, 0, 1, "a", 0]}
"#;
    let mut dispatcher = EventDispatcher::new(NameCache::offline());
    let err = decode_stream(input.as_bytes(), InputFormat::Raw, &mut dispatcher).unwrap_err();
    assert!(matches!(
        err,
        ParseError::Payload {
            line: 2,
            source: PayloadError::ArityMismatch { found: 8, .. }
        }
    ));
    assert_eq!(dispatcher.tally().dropped["sched_wakeup"], 1);
    assert!(dispatcher.tally().handled.is_empty());
}

#[test]
fn test_tallies_split_dropped_and_unhandled() {
    let input = "\
 sshd 12 [000] 1.0: sched:sched_wakeup: comm=bash pid=9 prio=120 target_cpu=000
 sshd 12 [000] 1.1: sched:sched_wakeup: comm=bash pid=9 prio=120 target_cpu=000
 sshd 12 [000] 1.2: irq:irq_handler_entry: irq=24 name=eth0
 sshd 12 [000] 1.3: sched:sched_stat_runtime: comm=sshd pid=12 runtime=5000 [ns] vruntime=1 [ns]
";
    let mut dispatcher = EventDispatcher::new(NameCache::offline());
    let count = decode_stream(input.as_bytes(), InputFormat::PerfText, &mut dispatcher).unwrap();
    let out = dispatcher.finish();

    assert_eq!(count, 4);
    assert!(out.log.is_empty());
    assert_eq!(out.tally.dropped["sched_wakeup"], 2);
    assert_eq!(out.tally.unhandled["irq_handler_entry"], 1);
    assert_eq!(out.tally.handled["sched_stat_runtime"], 1);
    // no switch on cpu 0 yet
    assert_eq!(out.stats.dropped_runtime_samples, 1);
}
