// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Handing the processor from one process to another.

use kguard::KernelGuard;
use simcpu::{Psr, launch, switch};

use crate::{
    Pid,
    config::INIT_PID,
    kernel::{current_slot, fatal, with_table},
    pcb::ProcState,
};

/// Where a terminating process sends the processor.
pub(crate) enum Handoff {
    To(Pid),
    Parent,
}

/// Switches to process `pid` until some process switches back.
///
/// Kept for phase 1A, where no scheduler picks the next process yet.
pub fn temp_switch_to(pid: Pid) {
    let _guard = KernelGuard::enter("temp_switch_to");
    handoff(pid);
}

/// Makes init the running process. Never returns.
///
/// Called once, from the boot context, after [`init`](crate::init).
pub fn start_processes() -> ! {
    let guard = KernelGuard::enter("start_processes");
    if with_table(|table| table.current_slot().is_some()) {
        fatal(format_args!("ERROR: processes were already started\n"));
    }
    guard.leak();
    handoff(INIT_PID);
    fatal(format_args!("ERROR: the boot context was resumed\n"))
}

/// Marks `pid` running and switches to it.
///
/// The previous process turns `Ready` unless it has terminated. Returns when
/// the caller is switched back to, right away if `pid` is the caller. The
/// table is unlocked before the switch, the interrupt mask of the caller is
/// not.
pub(crate) fn handoff(pid: Pid) {
    let handles = with_table(|table| {
        let Some(target) = table.lookup(pid) else {
            fatal(format_args!("ERROR: cannot switch to nonexistent pid {pid}\n"));
        };
        if table[target].state.is_terminated() {
            fatal(format_args!("ERROR: cannot switch to terminated pid {pid}\n"));
        }
        let prev = table.current_slot();
        if prev == Some(target) {
            return None;
        }
        if let Some(prev) = prev {
            let pcb = &mut table[prev];
            if !pcb.state.is_terminated() {
                pcb.state = ProcState::Ready;
            }
        }
        trace!("handoff {} -> {pid}", table.current_pid());
        table[target].state = ProcState::Running;
        table.set_current(target);
        let old = prev.map(|prev| table[prev].context.handle());
        Some((old, table[target].context.handle()))
    });

    match handles {
        None => {}
        Some((Some(old), new)) => switch(&old, &new),
        Some((None, new)) => launch(&new),
    }
}

/// Entry of every process context.
///
/// Enables interrupts, runs the start function and terminates the process
/// with its return value, handing the processor to the parent.
pub(crate) fn trampoline() -> ! {
    let mut psr = Psr::read();
    psr.insert(Psr::CURRENT_INT);
    psr.write();

    let (entry, arg) = {
        let _guard = KernelGuard::enter("trampoline");
        with_table(|table| {
            let pcb = &table[current_slot(table, "trampoline")];
            (pcb.entry, pcb.arg.clone())
        })
    };
    let status = entry(arg);

    let guard = KernelGuard::enter("trampoline");
    terminate_current(status, Handoff::Parent, guard)
}

/// Shared tail of [`quit`](crate::quit) and of start functions returning.
///
/// The caller's guard is leaked: this context never resumes, so nothing may
/// restore its interrupt state later.
pub(crate) fn terminate_current(status: i32, next: Handoff, guard: KernelGuard) -> ! {
    let (me, target) = with_table(|table| {
        let slot = current_slot(table, guard.op());
        let pcb = &table[slot];
        if table.has_children(slot) {
            fatal(format_args!(
                "ERROR: Process pid {} called quit() while it still had children.\n",
                pcb.pid
            ));
        }
        let target = match next {
            Handoff::To(pid) => pid,
            Handoff::Parent => match pcb.parent {
                Some(parent) => table.pid_at(parent),
                None => fatal(format_args!(
                    "ERROR: process pid {} returned with no parent to resume\n",
                    pcb.pid
                )),
            },
        };
        let me = pcb.pid;
        table[slot].state = ProcState::Terminated(status);
        (me, target)
    });
    debug!("pid {me} terminated with status {status}, handing off to {target}");

    guard.leak();
    handoff(target);
    fatal(format_args!("ERROR: terminated pid {me} was resumed\n"))
}
