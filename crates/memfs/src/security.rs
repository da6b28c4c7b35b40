// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

//! Copy-out of opaque blobs (security descriptors, reparse data)
//! into buffers owned by the host.

use crate::{Error, Result};

#[cfg(test)]
#[path = "./security_test.rs"]
mod security_test;

/// Copy `blob` into the optional host buffer, returning the blob size.
///
/// Without a buffer only the size is reported so that the host
/// can allocate appropriately and ask again.
pub fn copy_out(blob: &[u8], buffer: Option<&mut [u8]>) -> Result<usize> {
    let Some(buffer) = buffer else {
        return Ok(blob.len());
    };
    if buffer.len() < blob.len() {
        return Err(Error::BufferTooSmall {
            required: blob.len(),
            available: buffer.len(),
        });
    }
    buffer[..blob.len()].copy_from_slice(blob);
    Ok(blob.len())
}
