// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Processor status register.

use core::sync::atomic::Ordering;

use bitflags::bitflags;

use crate::machine::{halt, with_current};

bitflags! {
    /// Bits of the processor status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Psr: u32 {
        /// Set while the processor runs in kernel mode.
        const CURRENT_MODE = 0x1;
        /// Set while interrupts are enabled.
        const CURRENT_INT  = 0x2;
        /// Mode before the last interrupt.
        const PREV_MODE    = 0x4;
        /// Interrupt-enable state before the last interrupt.
        const PREV_INT     = 0x8;
    }
}

impl Psr {
    /// Value loaded at reset: kernel mode, interrupts disabled.
    pub const RESET: Psr = Psr::CURRENT_MODE;

    /// Reads the register of the current machine.
    pub fn read() -> Psr {
        Psr::from_bits_truncate(psr_get())
    }

    /// Writes the register of the current machine.
    ///
    /// Unlike [`psr_set`] this cannot fail: every `Psr` is a valid value.
    pub fn write(self) {
        with_current(|m| m.psr.store(self.bits(), Ordering::SeqCst));
    }

    /// Returns `true` if the current machine runs in kernel mode.
    pub fn in_kernel_mode() -> bool {
        Psr::read().contains(Psr::CURRENT_MODE)
    }
}

/// Returns the raw register value.
pub fn psr_get() -> u32 {
    with_current(|m| m.psr.load(Ordering::SeqCst))
}

/// Writes the raw register value.
///
/// Undefined bits are a fatal error: the machine reports it on the console
/// and halts with status 1.
pub fn psr_set(value: u32) {
    let Some(psr) = Psr::from_bits(value) else {
        crate::console!("ERROR: invalid PSR value {:#x}\n", value);
        halt(1);
    };
    psr.write();
}
