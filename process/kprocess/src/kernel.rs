// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Per-machine kernel state.

use alloc::sync::Arc;
use core::fmt;

use kguard::SpinRaw;
use lazyinit::LazyInit;
use simcpu::{console_fmt, cpu_local, halt};

use crate::table::ProcTable;

/// State shared by every process of one machine.
pub(crate) struct Kernel {
    pub table: LazyInit<SpinRaw<ProcTable>>,
}

pub(crate) fn kernel() -> Arc<Kernel> {
    cpu_local(|| Kernel {
        table: LazyInit::new(),
    })
}

/// Runs `f` with the process table locked.
///
/// The lock must never be held across a context switch, so callers collect
/// what they need and switch after `f` returns.
pub(crate) fn with_table<R>(f: impl FnOnce(&mut ProcTable) -> R) -> R {
    let kernel = kernel();
    let Some(table) = kernel.table.get() else {
        fatal(format_args!("ERROR: process table used before phase-1 initialization\n"));
    };
    let mut table = table.lock();
    f(&mut table)
}

/// Slot of the running process. Fatal if no process is running.
pub(crate) fn current_slot(table: &ProcTable, op: &str) -> usize {
    match table.current_slot() {
        Some(slot) => slot,
        None => fatal(format_args!("ERROR: {op}() called with no running process\n")),
    }
}

/// Prints `args` on the console and halts with status 1.
pub(crate) fn fatal(args: fmt::Arguments) -> ! {
    console_fmt(args);
    error!("kernel invariant violated, halting");
    halt(1)
}
