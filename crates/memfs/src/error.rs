// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use miette::Diagnostic;
use thiserror::Error;

#[cfg(test)]
#[path = "./error_test.rs"]
mod error_test;

// NTSTATUS values as reported to a WinFsp host. These are defined here
// rather than pulled from the windows bindings so that the mapping is
// available on every platform.
const STATUS_INVALID_HANDLE: u32 = 0xC000_0008;
const STATUS_INVALID_PARAMETER: u32 = 0xC000_000D;
const STATUS_END_OF_FILE: u32 = 0xC000_0011;
const STATUS_ACCESS_DENIED: u32 = 0xC000_0022;
const STATUS_BUFFER_TOO_SMALL: u32 = 0xC000_0023;
const STATUS_OBJECT_NAME_NOT_FOUND: u32 = 0xC000_0034;
const STATUS_OBJECT_NAME_COLLISION: u32 = 0xC000_0035;
const STATUS_OBJECT_PATH_NOT_FOUND: u32 = 0xC000_003A;
const STATUS_DISK_FULL: u32 = 0xC000_007F;
const STATUS_FILE_IS_A_DIRECTORY: u32 = 0xC000_00BA;
const STATUS_INTERNAL_ERROR: u32 = 0xC000_00E5;
const STATUS_DIRECTORY_NOT_EMPTY: u32 = 0xC000_0101;
const STATUS_NOT_A_DIRECTORY: u32 = 0xC000_0103;
const STATUS_NOT_A_REPARSE_POINT: u32 = 0xC000_0275;
const STATUS_IO_REPARSE_TAG_MISMATCH: u32 = 0xC000_0277;
const STATUS_CANNOT_MAKE: u32 = 0xC000_02EA;

/// Errors reported by filesystem operations.
///
/// Each variant corresponds to exactly one host status code, see
/// [`Error::ntstatus`] and [`Error::os_error`].
#[derive(Diagnostic, Debug, Error)]
#[diagnostic(
    url(
        "https://spkenv.dev/error_codes#{}",
        self.code().unwrap_or_else(|| Box::new("memfs::generic"))
    )
)]
pub enum Error {
    /// The final component of a path does not exist
    #[error("Object name not found: {0}")]
    #[diagnostic(code(memfs::not_found))]
    NotFound(String),

    /// An intermediate component of a path does not exist
    #[error("Object path not found: {0}")]
    #[diagnostic(code(memfs::path_not_found))]
    PathNotFound(String),

    /// A path component that must be a directory is a file
    #[error("Not a directory: {0}")]
    #[diagnostic(code(memfs::not_a_directory))]
    NotADirectory(String),

    /// A file operation was requested on a directory
    #[error("File is a directory: {0}")]
    #[diagnostic(code(memfs::file_is_a_directory))]
    FileIsADirectory(String),

    /// The target name is already taken
    #[error("Object name collision: {0}")]
    #[diagnostic(code(memfs::name_collision))]
    NameCollision(String),

    /// A directory still has children
    #[error("Directory not empty: {0}")]
    #[diagnostic(code(memfs::directory_not_empty))]
    DirectoryNotEmpty(String),

    /// The operation is never permitted on this object
    #[error("Access denied: {0}")]
    #[diagnostic(code(memfs::access_denied))]
    AccessDenied(String),

    /// The configured node count has been reached
    #[error("Cannot create more than {limit} filesystem objects")]
    #[diagnostic(code(memfs::cannot_make))]
    CannotMake {
        /// The configured node cap
        limit: u64,
    },

    /// A file would grow beyond the configured file size cap
    #[error("Requested size {requested} exceeds the maximum file size {limit}")]
    #[diagnostic(code(memfs::disk_full))]
    DiskFull {
        /// The size that was asked for
        requested: u64,
        /// The configured per-file cap
        limit: u64,
    },

    /// A read started at or past the end of the file
    #[error("Read at offset {offset} is past the end of file ({size} bytes)")]
    #[diagnostic(code(memfs::end_of_file))]
    EndOfFile {
        /// The requested read offset
        offset: u64,
        /// The current file size
        size: u64,
    },

    /// A caller provided buffer cannot hold the result
    #[error("Buffer too small, {required} bytes required but only {available} provided")]
    #[diagnostic(code(memfs::buffer_too_small))]
    BufferTooSmall {
        /// The number of bytes needed
        required: usize,
        /// The size of the provided buffer
        available: usize,
    },

    /// The object does not carry a reparse point
    #[error("Not a reparse point: {0}")]
    #[diagnostic(code(memfs::not_a_reparse_point))]
    NotAReparsePoint(String),

    /// A reparse point cannot be replaced or removed with the given data
    #[error("Reparse tag mismatch, existing {current:#010x} but got {requested:#010x}")]
    #[diagnostic(code(memfs::reparse_tag_mismatch))]
    ReparseTagMismatch {
        /// Tag of the reparse point currently attached
        current: u32,
        /// Tag of the provided reparse data
        requested: u32,
    },

    /// The handle is unknown, or was already closed
    #[error("Invalid handle: {0}")]
    #[diagnostic(code(memfs::invalid_handle))]
    InvalidHandle(u64),

    /// The request itself is malformed
    #[error("Invalid parameter: {0}")]
    #[diagnostic(code(memfs::invalid_parameter))]
    InvalidParameter(String),

    /// An internal invariant was violated
    #[error("Internal error: {0}")]
    #[diagnostic(code(memfs::internal_error))]
    InternalError(String),

    /// The configuration could not be loaded
    #[error(transparent)]
    #[diagnostic(code(memfs::config))]
    Config(#[from] config::ConfigError),

    /// The loaded configuration has unusable values
    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(memfs::invalid_config))]
    InvalidConfig(String),
}

impl Error {
    /// The NTSTATUS value that a WinFsp host should report for this error.
    pub fn ntstatus(&self) -> i32 {
        let status = match self {
            Error::NotFound(_) => STATUS_OBJECT_NAME_NOT_FOUND,
            Error::PathNotFound(_) => STATUS_OBJECT_PATH_NOT_FOUND,
            Error::NotADirectory(_) => STATUS_NOT_A_DIRECTORY,
            Error::FileIsADirectory(_) => STATUS_FILE_IS_A_DIRECTORY,
            Error::NameCollision(_) => STATUS_OBJECT_NAME_COLLISION,
            Error::DirectoryNotEmpty(_) => STATUS_DIRECTORY_NOT_EMPTY,
            Error::AccessDenied(_) => STATUS_ACCESS_DENIED,
            Error::CannotMake { .. } => STATUS_CANNOT_MAKE,
            Error::DiskFull { .. } => STATUS_DISK_FULL,
            Error::EndOfFile { .. } => STATUS_END_OF_FILE,
            Error::BufferTooSmall { .. } => STATUS_BUFFER_TOO_SMALL,
            Error::NotAReparsePoint(_) => STATUS_NOT_A_REPARSE_POINT,
            Error::ReparseTagMismatch { .. } => STATUS_IO_REPARSE_TAG_MISMATCH,
            Error::InvalidHandle(_) => STATUS_INVALID_HANDLE,
            Error::InvalidParameter(_) => STATUS_INVALID_PARAMETER,
            Error::InternalError(_) => STATUS_INTERNAL_ERROR,
            Error::Config(_) | Error::InvalidConfig(_) => STATUS_INVALID_PARAMETER,
        };
        status as i32
    }

    /// The errno value that a FUSE host should reply with for this error.
    ///
    /// Reads past the end of a file have no errno, a FUSE read
    /// at the end of a file is answered with an empty reply instead.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            Error::NotFound(_) | Error::PathNotFound(_) => Some(libc::ENOENT),
            Error::NotADirectory(_) => Some(libc::ENOTDIR),
            Error::FileIsADirectory(_) => Some(libc::EISDIR),
            Error::NameCollision(_) => Some(libc::EEXIST),
            Error::DirectoryNotEmpty(_) => Some(libc::ENOTEMPTY),
            Error::AccessDenied(_) => Some(libc::EACCES),
            Error::CannotMake { .. } | Error::DiskFull { .. } => Some(libc::ENOSPC),
            Error::EndOfFile { .. } => None,
            Error::BufferTooSmall { .. } => Some(libc::ERANGE),
            Error::NotAReparsePoint(_) => Some(libc::EINVAL),
            Error::ReparseTagMismatch { .. } => Some(libc::EINVAL),
            Error::InvalidHandle(_) => Some(libc::EBADF),
            Error::InvalidParameter(_) => Some(libc::EINVAL),
            Error::InternalError(_) => Some(libc::EIO),
            Error::Config(_) | Error::InvalidConfig(_) => Some(libc::EINVAL),
        }
    }

    pub(crate) fn lock_poisoned<T>(_err: std::sync::PoisonError<T>) -> Self {
        Error::InternalError("lock has been poisoned".into())
    }
}

/// A result whose error is [`enum@Error`]
pub type Result<T> = std::result::Result<T, Error>;
