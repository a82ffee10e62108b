// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use alloc::{string::String, sync::Arc};
use core::{any::Any, fmt};

use simcpu::Context;
use strum::IntoStaticStr;

use crate::{Pid, config::MAX_NAME};

/// Start function of a process. Its return value becomes the exit status.
pub type StartFunc = fn(StartArg) -> i32;

/// Opaque argument handed to a [`StartFunc`].
#[derive(Clone, Default)]
pub struct StartArg(Option<Arc<dyn Any + Send + Sync>>);

impl StartArg {
    /// An empty argument.
    pub const fn none() -> Self {
        Self(None)
    }

    /// Wraps `value`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    /// Returns the wrapped value if it is a `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.0.as_deref()?.downcast_ref()
    }

    /// Returns `true` if nothing is wrapped.
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for StartArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("StartArg(..)"),
            None => f.write_str("StartArg(None)"),
        }
    }
}

/// Scheduling state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum ProcState {
    /// Runnable, waiting for a handoff.
    Ready,
    /// Holding the processor.
    Running,
    /// Quit with the given status, waiting to be joined.
    Terminated(i32),
}

impl ProcState {
    /// Exit status of a terminated process.
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            ProcState::Terminated(status) => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for [`ProcState::Terminated`].
    pub fn is_terminated(&self) -> bool {
        matches!(self, ProcState::Terminated(_))
    }
}

impl fmt::Display for ProcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label: &'static str = self.into();
        f.write_str(label)?;
        if let ProcState::Terminated(status) = self {
            write!(f, "({status})")?;
        }
        Ok(())
    }
}

/// Process name, at most [`MAX_NAME`] bytes.
pub(crate) type ProcName = heapless::String<MAX_NAME>;

/// Process control block.
pub(crate) struct Pcb {
    pub pid: Pid,
    pub name: ProcName,
    pub priority: i32,
    pub state: ProcState,
    pub entry: StartFunc,
    pub arg: StartArg,
    pub context: Context,
    pub parent: Option<usize>,
    pub youngest_child: Option<usize>,
    pub next_older_sibling: Option<usize>,
}

impl Pcb {
    /// A ready, unlinked process.
    pub fn new(
        pid: Pid,
        name: ProcName,
        priority: i32,
        entry: StartFunc,
        arg: StartArg,
        context: Context,
    ) -> Self {
        Self {
            pid,
            name,
            priority,
            state: ProcState::Ready,
            entry,
            arg,
            context,
            parent: None,
            youngest_child: None,
            next_older_sibling: None,
        }
    }
}

impl fmt::Debug for Pcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pcb")
            .field("pid", &self.pid)
            .field("name", &self.name.as_str())
            .field("priority", &self.priority)
            .field("state", &self.state)
            .field("context", &self.context)
            .finish()
    }
}

/// Snapshot of one process, as seen by [`process_info`](crate::process_info).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcInfo {
    /// Process ID.
    pub pid: Pid,
    /// Parent pid, [`NO_PARENT`](crate::config::NO_PARENT) for init.
    pub ppid: Pid,
    /// Name given at creation.
    pub name: String,
    /// Priority given at creation.
    pub priority: i32,
    /// Current state.
    pub state: ProcState,
}
