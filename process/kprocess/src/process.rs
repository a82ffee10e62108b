// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Process lifecycle operations.

use alloc::{string::String, vec::Vec};

use kguard::{KernelGuard, SpinRaw};
use simcpu::{Context, console};

use crate::{
    JoinError, Pid, SporkError,
    config::{
        INIT_NAME, INIT_PID, INIT_PRIORITY, INIT_STACK_SIZE, MAX_PRIORITY, MIN_PRIORITY, MIN_STACK,
    },
    kernel::{current_slot, fatal, kernel, with_table},
    pcb::{Pcb, ProcInfo, ProcName, StartArg, StartFunc},
    switch::{Handoff, terminate_current, trampoline},
    table::ProcTable,
};

fn new_context(stack_size: usize) -> Context {
    Context::new(stack_size, trampoline)
        .unwrap_or_else(|err| fatal(format_args!("ERROR: cannot create a process context: {err}\n")))
}

/// Phase-1 initialization: creates the process table holding the init
/// process, which will run `entry(arg)`.
///
/// Init gets pid [`INIT_PID`] and priority [`INIT_PRIORITY`]. It stays
/// `Ready` until [`start_processes`](crate::start_processes). Calling this a
/// second time on the same machine is fatal.
pub fn init(entry: StartFunc, arg: StartArg) {
    let _guard = KernelGuard::enter("init");
    let kernel = kernel();
    if kernel.table.is_inited() {
        fatal(format_args!("ERROR: phase-1 initialization ran twice\n"));
    }

    let Ok(name) = ProcName::try_from(INIT_NAME) else {
        fatal(format_args!("ERROR: init name {INIT_NAME:?} does not fit a process name\n"));
    };
    let mut table = ProcTable::new();
    let context = new_context(INIT_STACK_SIZE);
    let pcb = Pcb::new(INIT_PID, name, INIT_PRIORITY, entry, arg, context);
    table.insert(ProcTable::slot_of(INIT_PID), pcb);
    kernel.table.init_once(SpinRaw::new(table));
    info!("process table initialized, init is pid {INIT_PID}");
}

/// Creates a child of the running process and returns its pid.
///
/// The child starts `Ready`, as the youngest child of the caller, and runs
/// `func(arg)` on a stack of `stack_size` bytes the first time it is switched
/// to. A rejected request changes nothing.
pub fn spork(
    name: Option<&str>,
    func: Option<StartFunc>,
    arg: StartArg,
    stack_size: usize,
    priority: i32,
) -> Result<Pid, SporkError> {
    let _guard = KernelGuard::enter("spork");
    if stack_size < MIN_STACK {
        return Err(SporkError::InvalidStack);
    }
    let (Some(name), Some(func)) = (name, func) else {
        return Err(SporkError::InvalidArgument);
    };
    let Ok(name) = ProcName::try_from(name) else {
        return Err(SporkError::InvalidArgument);
    };
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        return Err(SporkError::InvalidArgument);
    }

    with_table(|table| {
        let parent = current_slot(table, "spork");
        let Ok((slot, pid)) = table.allocate() else {
            warn!("spork {name:?}: process table is full");
            return Err(SporkError::InvalidArgument);
        };
        let context = new_context(stack_size);
        debug!("spork {name:?}: pid {pid}, priority {priority}, parent {}", table.pid_at(parent));
        table.insert(slot, Pcb::new(pid, name, priority, func, arg, context));
        table.attach_child(parent, slot);
        Ok(pid)
    })
}

/// Reclaims one terminated child of the running process.
///
/// Stores the child's exit status in `status`, frees its slot and stack, and
/// returns its pid. Never blocks: a caller whose children are all still alive
/// gets [`JoinError::NoneTerminated`].
pub fn join(status: Option<&mut i32>) -> Result<Pid, JoinError> {
    let _guard = KernelGuard::enter("join");
    let Some(status) = status else {
        return Err(JoinError::InvalidArgument);
    };

    let child = with_table(|table| {
        let me = current_slot(table, "join");
        let slot = table.detach_terminated_child(me)?;
        Ok::<_, JoinError>(table.release(slot))
    })?;
    *status = child.state.exit_status().unwrap_or_default();
    debug!("join: reclaimed pid {} with status {}", child.pid, *status);
    let pid = child.pid;
    // Waits for the child's frames to unwind; the table must be unlocked here.
    drop(child);
    Ok(pid)
}

/// Terminates the running process with `status` and hands the processor to
/// `switch_to`.
///
/// A process must join all its children first: quitting with children left
/// is fatal.
pub fn quit(status: i32, switch_to: Pid) -> ! {
    let guard = KernelGuard::enter("quit");
    terminate_current(status, Handoff::To(switch_to), guard)
}

/// Pid of the running process, [`NO_PID`](crate::config::NO_PID) before the
/// first handoff.
pub fn getpid() -> Pid {
    let _guard = KernelGuard::enter("getpid");
    with_table(|table| table.current_pid())
}

/// Prints the process table on the console.
pub fn dump_processes() {
    let _guard = KernelGuard::enter("dump_processes");
    with_table(|table| console!("{table}"));
}

/// Returns a snapshot of the live process `pid`.
pub fn process_info(pid: Pid) -> Option<ProcInfo> {
    let _guard = KernelGuard::enter("process_info");
    with_table(|table| {
        let slot = table.lookup(pid)?;
        let pcb = &table[slot];
        Some(ProcInfo {
            pid,
            ppid: table.ppid_at(slot),
            name: String::from(pcb.name.as_str()),
            priority: pcb.priority,
            state: pcb.state,
        })
    })
}

/// Children of the live process `pid`, youngest first.
pub fn children_of(pid: Pid) -> Vec<Pid> {
    let _guard = KernelGuard::enter("children_of");
    with_table(|table| match table.lookup(pid) {
        Some(slot) => table
            .children(slot)
            .map(|child| table.pid_at(child))
            .collect(),
        None => Vec::new(),
    })
}

/// Number of occupied table slots.
pub fn live_count() -> usize {
    let _guard = KernelGuard::enter("live_count");
    with_table(|table| table.occupied())
}
