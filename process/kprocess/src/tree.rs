// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Parent/child links threaded through the process table.
//!
//! A parent points at its youngest child; each child points at its next
//! older sibling. All links are slot indices into the same table.

use crate::table::ProcTable;

/// Why no child could be detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DetachError {
    NoChildren,
    NoneTerminated,
}

/// Children of one process, youngest first.
pub(crate) struct Children<'a> {
    table: &'a ProcTable,
    cursor: Option<usize>,
}

impl Iterator for Children<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let slot = self.cursor?;
        self.cursor = self.table[slot].next_older_sibling;
        Some(slot)
    }
}

impl ProcTable {
    /// Makes `child` the youngest child of `parent`.
    pub fn attach_child(&mut self, parent: usize, child: usize) {
        let older = self[parent].youngest_child;
        let pcb = &mut self[child];
        pcb.parent = Some(parent);
        pcb.next_older_sibling = older;
        self[parent].youngest_child = Some(child);
    }

    pub fn children(&self, parent: usize) -> Children<'_> {
        Children {
            table: self,
            cursor: self[parent].youngest_child,
        }
    }

    pub fn has_children(&self, slot: usize) -> bool {
        self[slot].youngest_child.is_some()
    }

    /// Unlinks the youngest terminated child of `parent` and returns its slot.
    pub fn detach_terminated_child(&mut self, parent: usize) -> Result<usize, DetachError> {
        let mut prev: Option<usize> = None;
        let mut cursor = self[parent].youngest_child;
        if cursor.is_none() {
            return Err(DetachError::NoChildren);
        }
        while let Some(slot) = cursor {
            let older = self[slot].next_older_sibling;
            if self[slot].state.is_terminated() {
                match prev {
                    Some(prev) => self[prev].next_older_sibling = older,
                    None => self[parent].youngest_child = older,
                }
                let pcb = &mut self[slot];
                pcb.parent = None;
                pcb.next_older_sibling = None;
                return Ok(slot);
            }
            prev = Some(slot);
            cursor = older;
        }
        Err(DetachError::NoneTerminated)
    }
}
