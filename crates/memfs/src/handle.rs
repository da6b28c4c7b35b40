// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::node::{NodeId, ObjectKind};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./handle_test.rs"]
mod handle_test;

/// An open file or directory
///
/// The context refers to its node by id rather than by path, so
/// it remains valid when the node or one of its parents is renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenContext {
    /// The host visible handle value, never zero
    pub handle: u64,
    /// The node that was opened
    pub node: NodeId,
    /// Whether a file or directory was opened
    pub kind: ObjectKind,
}

/// Allocates handle values and tracks the open context of each.
#[derive(Debug)]
pub struct HandleTable {
    next_handle: AtomicU64,
    handles: DashMap<u64, OpenContext>,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl HandleTable {
    pub(crate) fn starting_at(first: u64) -> Self {
        Self {
            next_handle: AtomicU64::new(first),
            handles: DashMap::new(),
        }
    }

    /// Register a new open context, returning its handle
    pub fn open(&self, node: NodeId, kind: ObjectKind) -> u64 {
        loop {
            let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
            if handle as u32 == 0 {
                // zero means "no handle" to the host, and hosts with a
                // 32-bit handle width only see the low half of the value
                continue;
            }
            match self.handles.entry(handle) {
                // continue until we find a vacant entry for this handle
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(v) => {
                    v.insert(OpenContext { handle, node, kind });
                    break handle;
                }
            }
        }
    }

    /// Look up the context of an open handle
    pub fn get(&self, handle: u64) -> Result<OpenContext> {
        if handle == 0 {
            return Err(Error::InternalError("handle zero is never allocated".into()));
        }
        self.handles
            .get(&handle)
            .map(|kv| *kv.value())
            .ok_or(Error::InvalidHandle(handle))
    }

    /// Release a handle, returning its context if it was open
    pub fn close(&self, handle: u64) -> Option<OpenContext> {
        self.handles.remove(&handle).map(|(_, ctx)| ctx)
    }

    /// The number of currently open handles
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True if no handles are open
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
