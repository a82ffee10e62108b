// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use simcpu::{Psr, console, halt};

/// A guard that does something on entering a critical section and undoes it
/// on leaving.
pub trait BaseGuard {
    /// What `acquire` saved for `release`.
    type State: Clone + Copy;

    /// Enters the critical section.
    fn acquire() -> Self::State;

    /// Leaves the critical section.
    fn release(state: Self::State);
}

/// A guard that does nothing.
pub struct NoOp;

impl BaseGuard for NoOp {
    type State = ();

    fn acquire() -> Self::State {}

    fn release(_state: Self::State) {}
}

/// A guard that masks interrupts and restores the previous enable bit.
pub struct IrqSave(bool);

impl BaseGuard for IrqSave {
    type State = bool;

    #[inline]
    fn acquire() -> Self::State {
        let psr = Psr::read();
        (psr - Psr::CURRENT_INT).write();
        psr.contains(Psr::CURRENT_INT)
    }

    #[inline]
    fn release(enabled: Self::State) {
        let mut psr = Psr::read();
        psr.set(Psr::CURRENT_INT, enabled);
        psr.write();
    }
}

impl IrqSave {
    /// Masks interrupts until the returned guard is dropped.
    pub fn new() -> Self {
        Self(Self::acquire())
    }
}

impl Drop for IrqSave {
    fn drop(&mut self) {
        Self::release(self.0);
    }
}

/// Entry guard of a kernel operation.
///
/// Entering checks the current-mode bit: calling a kernel operation from user
/// mode prints a diagnostic and halts the machine with status 1. Interrupts
/// stay masked until the guard is dropped, which restores the interrupt-enable
/// bit seen on entry.
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct KernelGuard {
    irq: IrqSave,
    op: &'static str,
}

impl KernelGuard {
    /// Enters kernel operation `op`.
    pub fn enter(op: &'static str) -> Self {
        if !Psr::in_kernel_mode() {
            console!("ERROR: Someone attempted to call {op} while in user mode!\n");
            halt(1);
        }
        Self {
            irq: IrqSave::new(),
            op,
        }
    }

    /// Name of the operation that entered the guard.
    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Forgets the guard, leaving interrupts masked.
    ///
    /// For handoffs that never come back to the caller: the next context
    /// decides the interrupt state from there on.
    pub fn leak(self) {
        trace!("{} leaves interrupts masked", self.op);
        core::mem::forget(self);
    }
}
