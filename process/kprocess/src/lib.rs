// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Process Management
//!
//! A fixed table of process control blocks, the parent/child tree threaded
//! through it, and the operations that create, reclaim and terminate
//! processes and hand the processor between them.
//!
//! Every public operation runs under a [`kguard::KernelGuard`]: it must be
//! called in kernel mode and keeps interrupts masked while it touches the
//! table.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;
extern crate alloc;

pub mod config;

mod error;
mod kernel;
mod pcb;
mod process;
mod switch;
mod table;
mod tree;


/// A process ID.
pub type Pid = i32;

pub use error::{JoinError, SporkError};
pub use pcb::{ProcInfo, ProcState, StartArg, StartFunc};
pub use process::{
    children_of, dump_processes, getpid, init, join, live_count, process_info, quit, spork,
};
pub use switch::{start_processes, temp_switch_to};
