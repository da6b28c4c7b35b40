// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use bytes::Bytes;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./reparse_test.rs"]
mod reparse_test;

/// Reparse tag used by windows for symbolic links
pub const IO_REPARSE_TAG_SYMLINK: u32 = 0xA000_000C;
/// Reparse tag used by windows for junctions and mount points
pub const IO_REPARSE_TAG_MOUNT_POINT: u32 = 0xA000_0003;

/// Opaque reparse data attached to a filesystem object.
///
/// The data is the full reparse buffer as provided by the host,
/// which begins with the little-endian reparse tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReparsePoint {
    pub tag: u32,
    pub data: Bytes,
}

impl ReparsePoint {
    /// Construct a reparse point with an explicit tag
    pub fn new(tag: u32, data: impl Into<Bytes>) -> Self {
        Self {
            tag,
            data: data.into(),
        }
    }

    /// Construct a reparse point from a host reparse buffer, reading
    /// the tag from its first four bytes.
    pub fn from_buffer(buffer: &[u8]) -> Result<Self> {
        let tag = tag_of(buffer)?;
        Ok(Self::new(tag, Bytes::copy_from_slice(buffer)))
    }
}

/// Read the reparse tag at the start of a host reparse buffer
pub fn tag_of(buffer: &[u8]) -> Result<u32> {
    let Some(head) = buffer.first_chunk::<4>() else {
        return Err(Error::InvalidParameter(format!(
            "reparse buffer of {} bytes is too short to hold a tag",
            buffer.len()
        )));
    };
    Ok(u32::from_le_bytes(*head))
}

/// Decides if existing reparse points may be replaced or deleted.
///
/// Compatibility between two reparse payloads is a host policy, so
/// the filesystem defers the decision to an implementation of this trait.
pub trait ReparseValidator: Send + Sync {
    /// Return an error if `current` cannot be replaced (or deleted)
    /// using reparse data with the given tag and contents.
    fn can_replace(&self, current: &ReparsePoint, tag: u32, data: &[u8]) -> Result<()>;
}

/// Requires that the replacement carries the same reparse tag.
///
/// This matches the default rule applied by WinFsp.
#[derive(Debug, Default, Clone, Copy)]
pub struct TagMatch;

impl ReparseValidator for TagMatch {
    fn can_replace(&self, current: &ReparsePoint, tag: u32, _data: &[u8]) -> Result<()> {
        if current.tag != tag {
            return Err(Error::ReparseTagMismatch {
                current: current.tag,
                requested: tag,
            });
        }
        Ok(())
    }
}

/// Allows any reparse point to be replaced.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl ReparseValidator for AllowAll {
    fn can_replace(&self, _current: &ReparsePoint, _tag: u32, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}
