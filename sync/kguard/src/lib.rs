// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Guards for kernel critical sections on the simulated processor.
//!
//! - [`KernelGuard`]: the entry check of every kernel operation. It requires
//!   kernel mode and keeps interrupts masked until it is dropped.
//! - [`BaseSpinLock`]: a spinlock that holds a [`BaseGuard`] for as long as it
//!   is locked. Kernel state uses the [`SpinRaw`] flavour, since every
//!   operation already runs inside a [`KernelGuard`].

#[macro_use]
extern crate log;

mod guard;
mod lock;


pub use guard::{BaseGuard, IrqSave, KernelGuard, NoOp};
pub use lock::{BaseSpinLock, BaseSpinLockGuard};

/// A spinlock that only spins.
pub type SpinRaw<T> = BaseSpinLock<NoOp, T>;
