//! Configuration and constants for the decoder and CLI.

/// Default name of the cdict file written by `decode`
pub const DEFAULT_CDICT_FILE: &str = "perf.cdict";

/// Extension every cdict file carries
pub const CDICT_EXTENSION: &str = "cdict";

/// Deepest container nesting accepted in a legacy marshal payload
/// (a cdict is dict -> list -> scalar)
pub const MAX_MARSHAL_DEPTH: usize = 8;

/// Current run report schema version
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

// Positional payload layout shared by every tracepoint callback:
// cpu, secs, nsecs, pid, comm
pub const COMMON_FIELD_COUNT: usize = 5;

// Newer perf inserts common_callchain right after common_comm
pub const CALLCHAIN_FIELD_INDEX: usize = 5;

// Virtualization host detection (libvirt-managed qemu)
pub const QEMU_CMDLINE_PREFIX: &str = "/usr/bin/qemu-system";
pub const QEMU_UUID_PATTERN: &str = r"-uuid ([a-fA-F0-9\-]*)";

// /proc/<tid>/cpuset of a libvirt qemu thread:
// /machine/instance-000065d7.libvirt-qemu/emulator
// /machine/instance-000065d3.libvirt-qemu/vcpu0
pub const CPUSET_PATTERN: &str = r"^/machine/(instance-[a-fA-F0-9]*).libvirt-qemu/(\w*)";

/// Tracepoints recognized but intentionally not stored in the cdict
pub const DROPPED_EVENT_NAMES: &[&str] = &[
    "sched_wakeup",
    "sched_wakeup_new",
    "sched_waking",
    "sched_process_hang",
    "sched_pi_setprio",
    "sched_stat_blocked",
    "sched_stat_wait",
    "sched_process_exec",
    "sched_process_fork",
    "sched_process_wait",
    "sched_wait_task",
    "sched_process_exit",
    "sched_process_free",
    "sched_migrate_task",
    "sched_kthread_stop_ret",
    "sched_kthread_stop",
    "kvm_async_pf_completed",
    "kvm_async_pf_ready",
    "kvm_async_pf_not_present",
    "kvm_async_pf_doublefault",
    "kvm_try_async_get_page",
    "kvm_age_page",
    "kvm_fpu",
    "kvm_mmio",
    "kvm_ack_irq",
    "kvm_msi_set_irq",
    "kvm_ioapic_set_irq",
    "kvm_set_irq",
    "kvm_userspace_exit",
    "kvm_track_tsc",
    "kvm_update_master_clock",
    "kvm_write_tsc_offset",
    "vcpu_match_mmio",
    "kvm_emulate_insn",
    "kvm_skinit",
    "kvm_invlpga",
    "kvm_nested_intr_vmexit",
    "kvm_nested_vmexit_inject",
    "kvm_nested_vmexit",
    "kvm_nested_intercepts",
    "kvm_nested_vmrun",
    "kvm_pv_eoi",
    "kvm_eoi",
    "kvm_apic_accept_irq",
    "kvm_apic_ipi",
    "kvm_pic_set_irq",
    "kvm_apic",
    "kvm_cr",
    "kvm_msr",
    "kvm_page_fault",
    "kvm_inj_exception",
    "kvm_inj_virq",
    "kvm_cpuid",
    "kvm_pio",
    "kvm_hv_hypercall",
    "kvm_hypercall",
    "kvm_ple_window",
];
