// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Process management constants.

use crate::Pid;

pub use simcpu::MIN_STACK;

/// Capacity of the process table, including the init process.
pub const MAX_PROC: usize = 50;

/// Longest process name, in bytes.
pub const MAX_NAME: usize = 50;

/// Lowest priority an ordinary process may have.
pub const MIN_PRIORITY: i32 = 1;

/// Highest priority an ordinary process may have.
pub const MAX_PRIORITY: i32 = 5;

/// Priority of the init process. Never accepted from `spork`.
pub const INIT_PRIORITY: i32 = 6;

/// Pid of the init process.
pub const INIT_PID: Pid = 1;

/// Name of the init process.
pub const INIT_NAME: &str = "init";

/// Stack size of the init process.
pub const INIT_STACK_SIZE: usize = 4 * MIN_STACK;

/// Pid reported for an empty slot, or when no process is running.
pub const NO_PID: Pid = -1;

/// Parent pid reported for the init process.
pub const NO_PARENT: Pid = 0;
