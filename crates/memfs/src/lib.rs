// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

//! An in-memory filesystem engine
//!
//! Provides the storage and semantics behind a user-mode filesystem
//! host such as WinFsp: a hierarchical namespace of files and
//! directories with Windows style attributes, timestamps, security
//! descriptors and reparse points. Hosts translate their requests
//! into calls on a [`MemFs`] and report any [`Error`] using
//! [`Error::ntstatus`] or [`Error::os_error`].

mod config;
mod error;
mod filesystem;
pub mod handle;
pub mod info;
pub mod namespace;
pub mod natural;
pub mod node;
pub mod path;
pub mod reparse;
pub mod security;

pub use error::{Error, Result};
pub use filesystem::MemFs;
pub use handle::{HandleTable, OpenContext};
pub use info::{
    BasicInfo,
    CleanupFlags,
    DirInfo,
    FileAttributes,
    FileInfo,
    FileSecurity,
    VolumeInfo,
};
pub use natural::natural_cmp;
pub use node::{Limits, ObjectKind};
pub use reparse::{AllowAll, ReparsePoint, ReparseValidator, TagMatch};

pub use self::config::{load_config, Config, Filesystem, Volume, DEFAULT_ALLOCATION_UNIT};
