// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! The process table.
//!
//! A pid always lives in slot `pid mod MAX_PROC`. New pids come from a
//! counter: a candidate whose slot is taken is skipped, so live pids stay
//! unique while freed slots get reused by later pids.

use core::{
    fmt,
    ops::{Index, IndexMut},
};

use crate::{
    Pid,
    config::{INIT_PID, MAX_PROC, NO_PARENT, NO_PID},
    pcb::Pcb,
};

/// Every slot of the table is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableFull;

pub(crate) struct ProcTable {
    slots: [Option<Pcb>; MAX_PROC],
    next_pid: Pid,
    occupied: usize,
    current: Option<usize>,
}

impl ProcTable {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            next_pid: INIT_PID + 1,
            occupied: 0,
            current: None,
        }
    }

    /// Slot a pid lives in.
    pub fn slot_of(pid: Pid) -> usize {
        pid.rem_euclid(MAX_PROC as Pid) as usize
    }

    /// Picks a free slot and the pid that goes with it.
    ///
    /// Nothing is reserved: the slot stays free until [`insert`](Self::insert).
    pub fn allocate(&mut self) -> Result<(usize, Pid), TableFull> {
        if self.occupied >= MAX_PROC {
            return Err(TableFull);
        }
        loop {
            let pid = self.next_pid;
            self.next_pid = if pid == Pid::MAX { INIT_PID + 1 } else { pid + 1 };
            let slot = Self::slot_of(pid);
            if self.slots[slot].is_none() {
                return Ok((slot, pid));
            }
        }
    }

    pub fn insert(&mut self, slot: usize, pcb: Pcb) {
        debug_assert!(self.slots[slot].is_none());
        debug_assert_eq!(Self::slot_of(pcb.pid), slot);
        self.slots[slot] = Some(pcb);
        self.occupied += 1;
    }

    /// Frees `slot` and hands back its PCB.
    ///
    /// # Panics
    ///
    /// Panics if the slot is empty.
    pub fn release(&mut self, slot: usize) -> Pcb {
        match self.slots[slot].take() {
            Some(pcb) => {
                self.occupied -= 1;
                if self.current == Some(slot) {
                    self.current = None;
                }
                pcb
            }
            None => panic!("releasing empty process slot {slot}"),
        }
    }

    /// Slot of the live process `pid`.
    pub fn lookup(&self, pid: Pid) -> Option<usize> {
        if pid < 0 {
            return None;
        }
        let slot = Self::slot_of(pid);
        match &self.slots[slot] {
            Some(pcb) if pcb.pid == pid => Some(slot),
            _ => None,
        }
    }

    pub fn get(&self, slot: usize) -> Option<&Pcb> {
        self.slots.get(slot)?.as_ref()
    }

    /// Pid stored in `slot`, [`NO_PID`] when the slot is free.
    pub fn pid_at(&self, slot: usize) -> Pid {
        self.get(slot).map_or(NO_PID, |pcb| pcb.pid)
    }

    /// Pid of the parent of the process in `slot`.
    pub fn ppid_at(&self, slot: usize) -> Pid {
        self.get(slot)
            .and_then(|pcb| pcb.parent)
            .map_or(NO_PARENT, |parent| self.pid_at(parent))
    }

    pub fn occupied(&self) -> usize {
        self.occupied
    }

    pub fn current_slot(&self) -> Option<usize> {
        self.current
    }

    pub fn set_current(&mut self, slot: usize) {
        self.current = Some(slot);
    }

    /// Pid of the running process, [`NO_PID`] before the first handoff.
    pub fn current_pid(&self) -> Pid {
        self.current.map_or(NO_PID, |slot| self.pid_at(slot))
    }

    /// Occupied slots in table order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Pcb)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, pcb)| Some((slot, pcb.as_ref()?)))
    }
}

/// One header line, then one line per occupied slot.
impl fmt::Display for ProcTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " PID  PPID  NAME              PRIORITY STATE")?;
        for (slot, pcb) in self.iter() {
            writeln!(
                f,
                "{:>4}{:>6}  {:<18}{:<9}{}",
                pcb.pid,
                self.ppid_at(slot),
                pcb.name.as_str(),
                pcb.priority,
                pcb.state,
            )?;
        }
        Ok(())
    }
}

impl Index<usize> for ProcTable {
    type Output = Pcb;

    fn index(&self, slot: usize) -> &Pcb {
        match &self.slots[slot] {
            Some(pcb) => pcb,
            None => panic!("process slot {slot} is empty"),
        }
    }
}

impl IndexMut<usize> for ProcTable {
    fn index_mut(&mut self, slot: usize) -> &mut Pcb {
        match &mut self.slots[slot] {
            Some(pcb) => pcb,
            None => panic!("process slot {slot} is empty"),
        }
    }
}
