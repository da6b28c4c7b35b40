// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::time::{SystemTime, UNIX_EPOCH};

use bitflags::bitflags;

#[cfg(test)]
#[path = "./info_test.rs"]
mod info_test;

/// Passed in place of attributes to mean "leave them unchanged"
pub const INVALID_FILE_ATTRIBUTES: u32 = u32::MAX;

// 100ns intervals between 1601-01-01 and 1970-01-01
const FILETIME_UNIX_EPOCH: u64 = 116_444_736_000_000_000;

bitflags! {
    /// Windows file attribute bits, as stored on every object.
    ///
    /// Unknown bits provided by a host are retained as-is.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FileAttributes: u32 {
        const READONLY = 0x0000_0001;
        const HIDDEN = 0x0000_0002;
        const SYSTEM = 0x0000_0004;
        const DIRECTORY = 0x0000_0010;
        const ARCHIVE = 0x0000_0020;
        const NORMAL = 0x0000_0080;
        const TEMPORARY = 0x0000_0100;
        const SPARSE_FILE = 0x0000_0200;
        const REPARSE_POINT = 0x0000_0400;
        const COMPRESSED = 0x0000_0800;
        const OFFLINE = 0x0000_1000;
        const NOT_CONTENT_INDEXED = 0x0000_2000;
        const ENCRYPTED = 0x0000_4000;
    }
}

bitflags! {
    /// Work requested by the host when the last handle of an open
    /// file is cleaned up
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CleanupFlags: u32 {
        /// Unlink the object
        const DELETE = 0x01;
        /// Shrink the allocation to fit the file size
        const SET_ALLOCATION_SIZE = 0x02;
        const SET_ARCHIVE_BIT = 0x10;
        const SET_LAST_ACCESS_TIME = 0x20;
        const SET_LAST_WRITE_TIME = 0x40;
        const SET_CHANGE_TIME = 0x80;
    }
}

/// The current time as a count of 100ns ticks since 1601-01-01 UTC
pub fn filetime_now() -> u64 {
    let since_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    FILETIME_UNIX_EPOCH + (since_unix.as_nanos() / 100) as u64
}

/// A point in time snapshot of an object's metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub file_attributes: FileAttributes,
    pub reparse_tag: u32,
    pub allocation_size: u64,
    pub file_size: u64,
    pub creation_time: u64,
    pub last_access_time: u64,
    pub last_write_time: u64,
    pub change_time: u64,
    pub index_number: u64,
    pub hard_links: u32,
    pub ea_size: u32,
}

impl FileInfo {
    /// True if this info describes a directory
    pub fn is_dir(&self) -> bool {
        self.file_attributes.contains(FileAttributes::DIRECTORY)
    }
}

/// One entry produced while reading a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirInfo {
    /// The name of the entry relative to the listed directory
    pub name: String,
    /// The entry's metadata
    pub info: FileInfo,
}

/// Size and label information for the whole volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub total_size: u64,
    pub free_size: u64,
    pub volume_label: String,
}

/// The result of a security lookup by path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSecurity {
    /// True if the lookup stopped at a reparse point that the host
    /// must resolve before going any further
    pub reparse: bool,
    /// The size of the object's security descriptor in bytes
    pub sz_security_descriptor: usize,
    pub attributes: FileAttributes,
}

/// Changes requested through a set-basic-info call.
///
/// Every field left as `None` is not modified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicInfo {
    pub attributes: Option<FileAttributes>,
    pub creation_time: Option<u64>,
    pub last_access_time: Option<u64>,
    pub last_write_time: Option<u64>,
    pub change_time: Option<u64>,
}

impl BasicInfo {
    /// Build from the raw values of the host protocol, where
    /// [`INVALID_FILE_ATTRIBUTES`] and a zero time mean "unchanged".
    pub fn from_raw(
        file_attributes: u32,
        creation_time: u64,
        last_access_time: u64,
        last_write_time: u64,
        change_time: u64,
    ) -> Self {
        let time = |t: u64| (t != 0).then_some(t);
        Self {
            attributes: (file_attributes != INVALID_FILE_ATTRIBUTES)
                .then(|| FileAttributes::from_bits_retain(file_attributes)),
            creation_time: time(creation_time),
            last_access_time: time(last_access_time),
            last_write_time: time(last_write_time),
            change_time: time(change_time),
        }
    }
}
