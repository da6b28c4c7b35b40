// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use crate::info::{filetime_now, FileAttributes, FileInfo};
use crate::reparse::ReparsePoint;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./node_test.rs"]
mod node_test;

/// Identifies a node for its entire lifetime, regardless of renames.
///
/// This is also the index number reported to the host.
pub type NodeId = u64;

/// Size limits applied to file content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Allocation sizes are always a multiple of this value
    pub allocation_unit: u64,
    /// No file may be allocated more than this many bytes
    pub max_file_size: u64,
}

impl Limits {
    /// Round `size` up to the next allocation unit boundary, failing
    /// if the result would exceed the maximum file size.
    pub fn allocation_for(&self, size: u64) -> Result<u64> {
        if size > self.max_file_size {
            return Err(Error::DiskFull {
                requested: size,
                limit: self.max_file_size,
            });
        }
        let rounded = size.div_ceil(self.allocation_unit) * self.allocation_unit;
        if rounded > self.max_file_size {
            return Err(Error::DiskFull {
                requested: rounded,
                limit: self.max_file_size,
            });
        }
        Ok(rounded)
    }
}

/// The bytes of a single file.
///
/// The backing buffer is always exactly `allocation_size` bytes long
/// and every byte past `file_size` is zero.
#[derive(Debug, Default)]
pub struct FileContent {
    data: Vec<u8>,
    file_size: u64,
}

impl FileContent {
    /// The number of bytes of readable content
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The number of bytes reserved for this file
    pub fn allocation_size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Change the reserved size of this file.
    ///
    /// The new size is rounded up to the allocation unit. Content past
    /// a smaller allocation is discarded and the file size truncated.
    pub fn set_allocation_size(&mut self, size: u64, limits: &Limits) -> Result<()> {
        let size = limits.allocation_for(size)?;
        self.data.resize(size as usize, 0);
        if self.file_size > size {
            self.file_size = size;
        }
        Ok(())
    }

    /// Change the readable size of this file.
    ///
    /// Growing past the allocation extends the allocation, shrinking
    /// zeroes the vacated bytes but keeps the allocation as-is.
    pub fn set_file_size(&mut self, size: u64, limits: &Limits) -> Result<()> {
        if size > self.allocation_size() {
            self.set_allocation_size(size, limits)?;
        }
        if size < self.file_size {
            self.data[size as usize..self.file_size as usize].fill(0);
        }
        self.file_size = size;
        Ok(())
    }

    /// Copy content starting at `offset` into `buffer`.
    pub fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        if offset >= self.file_size {
            return Err(Error::EndOfFile {
                offset,
                size: self.file_size,
            });
        }
        let end = self.file_size.min(offset.saturating_add(buffer.len() as u64));
        let count = (end - offset) as usize;
        buffer[..count].copy_from_slice(&self.data[offset as usize..end as usize]);
        Ok(count)
    }

    /// Store `data` at `offset`, returning the number of bytes written.
    ///
    /// A constrained write never changes the file size and only writes
    /// the portion of `data` that overlaps existing content. Otherwise
    /// all of `data` is written, extending the file as needed, and
    /// `write_to_end` places it after the current end of file.
    pub fn write(
        &mut self,
        offset: u64,
        data: &[u8],
        write_to_end: bool,
        constrained: bool,
        limits: &Limits,
    ) -> Result<usize> {
        let length = data.len() as u64;
        let (offset, end) = if constrained {
            if offset >= self.file_size {
                return Ok(0);
            }
            (offset, self.file_size.min(offset.saturating_add(length)))
        } else {
            let offset = if write_to_end { self.file_size } else { offset };
            let Some(end) = offset.checked_add(length) else {
                return Err(Error::DiskFull {
                    requested: u64::MAX,
                    limit: limits.max_file_size,
                });
            };
            if end > self.file_size {
                self.set_file_size(end, limits)?;
            }
            (offset, end)
        };
        let count = (end - offset) as usize;
        self.data[offset as usize..end as usize].copy_from_slice(&data[..count]);
        Ok(count)
    }
}

/// The kind of a filesystem object, without its data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// A regular file with content
    File,
    /// A directory that may contain other objects
    Directory,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Directory => f.write_str("directory"),
        }
    }
}

/// Kind-specific data of a node
#[derive(Debug)]
pub enum NodeData {
    /// File content is locked separately from the namespace so that
    /// transfers on different files never contend with each other
    File(Arc<Mutex<FileContent>>),
    Directory,
}

/// A single file or directory stored in the namespace
#[derive(Debug)]
pub struct Node {
    /// The current path of this node, rewritten on rename
    pub path: String,
    pub data: NodeData,
    pub attributes: FileAttributes,
    pub creation_time: u64,
    pub last_access_time: u64,
    pub last_write_time: u64,
    pub change_time: u64,
    /// Assigned by the namespace when the node is inserted
    pub index_number: NodeId,
    pub security_descriptor: Bytes,
    pub reparse: Option<ReparsePoint>,
}

impl Node {
    /// Create a directory node, stamped with the current time
    pub fn new_dir(path: String, attributes: FileAttributes, security_descriptor: Bytes) -> Self {
        Self::new(
            path,
            NodeData::Directory,
            attributes | FileAttributes::DIRECTORY,
            security_descriptor,
        )
    }

    /// Create an empty file node, stamped with the current time
    pub fn new_file(path: String, attributes: FileAttributes, security_descriptor: Bytes) -> Self {
        Self::new(
            path,
            NodeData::File(Default::default()),
            (attributes | FileAttributes::ARCHIVE) - FileAttributes::DIRECTORY,
            security_descriptor,
        )
    }

    fn new(
        path: String,
        data: NodeData,
        attributes: FileAttributes,
        security_descriptor: Bytes,
    ) -> Self {
        let now = filetime_now();
        Self {
            path,
            data,
            attributes,
            creation_time: now,
            last_access_time: now,
            last_write_time: now,
            change_time: now,
            index_number: 0,
            security_descriptor,
            reparse: None,
        }
    }

    /// The kind of this node
    pub fn kind(&self) -> ObjectKind {
        match self.data {
            NodeData::File(_) => ObjectKind::File,
            NodeData::Directory => ObjectKind::Directory,
        }
    }

    /// True if this node is a directory
    pub fn is_dir(&self) -> bool {
        matches!(self.data, NodeData::Directory)
    }

    /// A shared reference to the content of this file, or
    /// [`Error::FileIsADirectory`].
    pub fn content(&self) -> Result<Arc<Mutex<FileContent>>> {
        match &self.data {
            NodeData::File(content) => Ok(Arc::clone(content)),
            NodeData::Directory => Err(Error::FileIsADirectory(self.path.clone())),
        }
    }

    /// Replace this node's attributes, keeping the kind-specific bits
    /// consistent with the node kind.
    pub fn set_attributes(&mut self, attributes: FileAttributes) {
        let reparse = self.attributes & FileAttributes::REPARSE_POINT;
        let attributes = (attributes - FileAttributes::REPARSE_POINT) | reparse;
        self.attributes = if self.is_dir() {
            attributes | FileAttributes::DIRECTORY
        } else {
            attributes - FileAttributes::DIRECTORY
        };
    }

    /// Set the access, write and change times to the same value
    pub fn touch(&mut self, now: u64) {
        self.last_access_time = now;
        self.last_write_time = now;
        self.change_time = now;
    }

    /// Take a snapshot of this node's metadata.
    ///
    /// For files this briefly takes the content lock, so it must never
    /// be called while that lock is already held.
    pub fn file_info(&self) -> Result<FileInfo> {
        let (allocation_size, file_size) = match &self.data {
            NodeData::File(content) => {
                let content = lock_content(content)?;
                (content.allocation_size(), content.file_size())
            }
            NodeData::Directory => (0, 0),
        };
        Ok(FileInfo {
            file_attributes: self.attributes,
            reparse_tag: self.reparse.as_ref().map(|r| r.tag).unwrap_or_default(),
            allocation_size,
            file_size,
            creation_time: self.creation_time,
            last_access_time: self.last_access_time,
            last_write_time: self.last_write_time,
            change_time: self.change_time,
            index_number: self.index_number,
            hard_links: 0,
            ea_size: 0,
        })
    }
}

/// Lock a file's content, reporting a poisoned lock as an error
pub fn lock_content(content: &Mutex<FileContent>) -> Result<MutexGuard<'_, FileContent>> {
    content.lock().map_err(Error::lock_poisoned)
}
