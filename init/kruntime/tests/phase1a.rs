// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use kprocess::{
    Pid, StartArg, config::MAX_PROC, config::MIN_STACK, dump_processes, getpid, join,
    process_info, quit, spork, temp_switch_to,
};
use kruntime::{BootConfig, run_on};
use simcpu::{Machine, Psr, console, psr_set};

#[ctor::ctor]
unsafe fn init_logger() {
    klogger::init_klogger();
}

const HACK: &str = "Phase 1A TEMPORARY HACK: init() manually switching to testcase_main() after using spork() to create it.\n";
const DONE: &str = "Phase 1A: testcase_main() returned, simulation will now halt.\n";

fn parent_pid() -> Pid {
    process_info(getpid()).unwrap().ppid
}

fn label(arg: &StartArg) -> &'static str {
    arg.get::<&'static str>().copied().unwrap_or("?")
}

fn xxp1(arg: StartArg) -> i32 {
    console!("XXp1(): started\n");
    console!("XXp1(): arg = '{}'\n", label(&arg));
    quit(3, parent_pid())
}

fn xxp2(arg: StartArg) -> i32 {
    console!("XXp2(): started\n");
    console!("XXp2(): arg = '{}'\n", label(&arg));
    quit(5, parent_pid())
}

/// XXp1 runs right away and quits with 3; XXp2 only runs when switched to
/// between the two joins, and quits with 5.
fn two_children(_: StartArg) -> i32 {
    console!("testcase_main(): started\n");

    let pid1 = spork(Some("XXp1"), Some(xxp1), StartArg::new("XXp1"), MIN_STACK, 2).unwrap();
    console!("testcase_main(): switching to child {pid1}\n");
    temp_switch_to(pid1);

    let pid2 = spork(Some("XXp2"), Some(xxp2), StartArg::new("XXp2"), MIN_STACK, 5).unwrap();
    console!("testcase_main(): after spork of child {pid2}\n");

    let mut status = 0;
    let kid = join(Some(&mut status)).unwrap();
    assert_eq!((kid, status), (pid1, 3));
    console!("testcase_main(): exit status for child {kid} is {status}\n");

    temp_switch_to(pid2);
    let kid = join(Some(&mut status)).unwrap();
    assert_eq!((kid, status), (pid2, 5));
    console!("testcase_main(): exit status for child {kid} is {status}\n");
    0
}

#[test]
fn two_children_quit_in_handoff_order() {
    let m = Machine::new();
    let code = run_on(&m, BootConfig::new(two_children));
    assert_eq!(code, 0);

    let expected = [
        HACK,
        "testcase_main(): started\n",
        "testcase_main(): switching to child 3\n",
        "XXp1(): started\n",
        "XXp1(): arg = 'XXp1'\n",
        "testcase_main(): after spork of child 4\n",
        "testcase_main(): exit status for child 3 is 3\n",
        "XXp2(): started\n",
        "XXp2(): arg = 'XXp2'\n",
        "testcase_main(): exit status for child 4 is 5\n",
        DONE,
    ]
    .concat();
    assert_eq!(m.console_output(), expected);
}

fn quit_two(_: StartArg) -> i32 {
    quit(2, parent_pid())
}

/// Creates MAX_PROC + 2 children without joining any of them. init and
/// testcase_main hold two slots, so the last four requests fail.
fn fill_table(_: StartArg) -> i32 {
    for i in 0..MAX_PROC + 2 {
        match spork(Some("XXp1"), Some(quit_two), StartArg::new("XXp1"), MIN_STACK, 2) {
            Ok(pid) => temp_switch_to(pid),
            Err(err) => console!("testcase_main(): spork() failed: i={i}, pid is {}.\n", err.code()),
        }
    }
    dump_processes();

    for i in 0..MAX_PROC + 2 {
        let mut status_ignored = 0;
        if let Err(err) = join(Some(&mut status_ignored)) {
            console!("testcase_main(): join() failed: i={i}, pid is {}.\n", err.code());
        }
    }
    dump_processes();
    0
}

#[test]
fn full_table_rejects_the_overflow() {
    let m = Machine::new();
    let code = run_on(&m, BootConfig::new(fill_table));
    assert_eq!(code, 0);

    let out = m.console_output();
    let lines: Vec<&str> = out.lines().collect();

    let spork_failures: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| l.contains("spork() failed"))
        .collect();
    assert_eq!(
        spork_failures,
        (48..52)
            .map(|i| format!("testcase_main(): spork() failed: i={i}, pid is -1."))
            .collect::<Vec<_>>()
    );

    let join_failures = lines.iter().filter(|l| l.contains("join() failed")).count();
    assert_eq!(join_failures, 4);
    assert!(lines.contains(&"testcase_main(): join() failed: i=48, pid is -2."));

    let headers: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.starts_with(" PID  PPID"))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(headers.len(), 2);

    // The first dump lists every slot: init, testcase_main and 48 children.
    let first = &lines[headers[0] + 1..headers[0] + 1 + MAX_PROC];
    assert_eq!(first.iter().filter(|l| l.contains("XXp1")).count(), 48);
    assert!(first.iter().all(|l| !l.contains("PID")));
    assert_eq!(first[0], "  50     2  XXp1              2        Terminated(2)");
    assert_eq!(first[1], "   1     0  init              6        Ready");
    assert_eq!(first[2], "   2     1  testcase_main     3        Running");

    // The second one only init and testcase_main.
    assert_eq!(
        &lines[headers[1] + 1..headers[1] + 3],
        [
            "   1     0  init              6        Ready",
            "   2     1  testcase_main     3        Running",
        ]
    );
    assert_eq!(lines.last(), Some(&DONE.trim_end()));
}

fn user_mode_getpid(_: StartArg) -> i32 {
    console!("testcase_main(): dropping to user mode\n");
    psr_set((Psr::read() - Psr::CURRENT_MODE).bits());
    getpid();
    console!("testcase_main(): getpid() returned in user mode\n");
    0
}

#[test]
fn kernel_call_from_user_mode_halts() {
    let m = Machine::new();
    let code = run_on(&m, BootConfig::new(user_mode_getpid));
    assert_eq!(code, 1);
    assert_eq!(
        m.console_output(),
        [
            HACK,
            "testcase_main(): dropping to user mode\n",
            "ERROR: Someone attempted to call getpid while in user mode!\n",
        ]
        .concat()
    );
}

fn service_a() {
    console!("service a\n");
}

fn service_b() {
    console!("service b (pid {})\n", getpid());
}

fn report_arg(arg: StartArg) -> i32 {
    console!("testcase_main(): arg = '{}'\n", label(&arg));
    7
}

#[test]
fn services_run_before_testcase_main() {
    let m = Machine::new();
    let config = BootConfig::new(report_arg)
        .arg(StartArg::new("hello"))
        .service("a", service_a)
        .service("b", service_b)
        .log_level("warn");
    let code = run_on(&m, config);
    assert_eq!(code, 7);
    assert_eq!(
        m.console_output(),
        [
            "service a\n",
            "service b (pid 1)\n",
            HACK,
            "testcase_main(): arg = 'hello'\n",
            DONE,
        ]
        .concat()
    );
}

#[test]
fn run_creates_its_own_machine() {
    fn quick(_: StartArg) -> i32 {
        assert_eq!(getpid(), 2);
        11
    }
    assert_eq!(kruntime::run(BootConfig::new(quick)), 11);
}
