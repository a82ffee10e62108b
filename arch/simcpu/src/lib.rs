// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! A simulated uniprocessor for the cooperative kernel.
//!
//! The machine exposes the small surface a kernel expects from real hardware:
//!
//! - a processor status register ([`Psr`]) holding the current/previous
//!   privilege mode and interrupt-enable bits;
//! - execution contexts ([`Context`]) with their own stacks, and a primitive
//!   that hands the processor from one context to another;
//! - a console and an unconditional [`halt`].
//!
//! Every context is backed by a host thread, but only the context holding the
//! processor ever runs. All of the above may only be used from code running on
//! a [`Machine`], i.e. from the boot closure or from a context it created.

#[macro_use]
extern crate log;

mod console;
mod context;
mod logger;
mod machine;
mod psr;

#[cfg(test)]
mod tests;

pub use console::console_fmt;
pub use context::{Context, ContextError, ContextHandle, launch, switch};
pub use machine::{Machine, cpu_local, current_machine, halt};
pub use psr::{Psr, psr_get, psr_set};

/// Smallest stack a context may be created with, in bytes.
pub const MIN_STACK: usize = 80 * 1024;
