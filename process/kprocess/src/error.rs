// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Errors returned by the process operations.
//!
//! Each error has a stable negative code, for callers that report results as
//! plain integers.

use core::fmt;

use crate::tree::DetachError;

/// Why [`spork`](crate::spork) refused to create a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SporkError {
    /// The table is full, or the name, function or priority is unacceptable.
    InvalidArgument,
    /// The stack is smaller than [`MIN_STACK`](crate::config::MIN_STACK).
    InvalidStack,
}

impl SporkError {
    /// Integer code of the error.
    pub const fn code(self) -> i32 {
        match self {
            SporkError::InvalidArgument => -1,
            SporkError::InvalidStack => -2,
        }
    }
}

impl fmt::Display for SporkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SporkError::InvalidArgument => write!(f, "invalid process arguments or no free slot"),
            SporkError::InvalidStack => write!(f, "stack size below the minimum"),
        }
    }
}

impl From<SporkError> for i32 {
    fn from(err: SporkError) -> i32 {
        err.code()
    }
}

/// Why [`join`](crate::join) reclaimed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// No place to store the exit status.
    InvalidArgument,
    /// The caller has no children.
    NoChildren,
    /// The caller has children, but none has terminated yet.
    NoneTerminated,
}

impl JoinError {
    /// Integer code of the error.
    pub const fn code(self) -> i32 {
        match self {
            JoinError::InvalidArgument => -3,
            JoinError::NoChildren => -2,
            JoinError::NoneTerminated => -4,
        }
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::InvalidArgument => write!(f, "no status out-parameter"),
            JoinError::NoChildren => write!(f, "no children to join"),
            JoinError::NoneTerminated => write!(f, "no child has terminated yet"),
        }
    }
}

impl From<JoinError> for i32 {
    fn from(err: JoinError) -> i32 {
        err.code()
    }
}

impl From<DetachError> for JoinError {
    fn from(err: DetachError) -> Self {
        match err {
            DetachError::NoChildren => JoinError::NoChildren,
            DetachError::NoneTerminated => JoinError::NoneTerminated,
        }
    }
}
