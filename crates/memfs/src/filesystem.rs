// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::cmp::Ordering;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;

use crate::handle::HandleTable;
use crate::info::{
    filetime_now,
    BasicInfo,
    CleanupFlags,
    DirInfo,
    FileAttributes,
    FileInfo,
    FileSecurity,
    VolumeInfo,
};
use crate::namespace::Namespace;
use crate::natural::natural_cmp;
use crate::node::{lock_content, Limits, Node, ObjectKind};
use crate::path::{self, ROOT};
use crate::reparse::{ReparsePoint, ReparseValidator, TagMatch};
use crate::security::copy_out;
use crate::{Config, Error, Result};

#[cfg(test)]
#[path = "./filesystem_test.rs"]
mod filesystem_test;

/// Volume labels hold at most this many utf-16 code units
const MAX_VOLUME_LABEL_LENGTH: usize = 32;

/// An in-memory filesystem, implementing each request that a
/// user-mode filesystem host can make.
///
/// All operations are synchronous and safe to call from any number
/// of host worker threads at once. A single lock protects the
/// namespace, while each file's content has its own lock so that
/// transfers on different files do not contend. When both are
/// needed, the namespace lock is always taken first.
pub struct MemFs {
    limits: Limits,
    max_file_nodes: u64,
    volume_label: Mutex<String>,
    namespace: Mutex<Namespace>,
    handles: HandleTable,
    reparse_validator: Box<dyn ReparseValidator>,
}

impl std::fmt::Debug for MemFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemFs")
            .field("limits", &self.limits)
            .field("max_file_nodes", &self.max_file_nodes)
            .finish_non_exhaustive()
    }
}

impl MemFs {
    /// Construct an empty filesystem, holding only its root directory.
    ///
    /// Existing reparse points can only be replaced by ones with the
    /// same tag, see [`MemFs::with_reparse_validator`] to change this.
    pub fn new(config: &Config) -> Result<Self> {
        let config = config.clone().validate()?;
        let root = Node::new_dir(
            ROOT.to_string(),
            FileAttributes::empty(),
            config.root_security_descriptor()?,
        );
        let mut label = config.volume.label.clone();
        truncate_volume_label(&mut label);
        Ok(Self {
            limits: Limits {
                allocation_unit: config.filesystem.allocation_unit,
                max_file_size: config.filesystem.max_file_size,
            },
            max_file_nodes: config.filesystem.max_file_nodes,
            volume_label: Mutex::new(label),
            namespace: Mutex::new(Namespace::new(root)),
            handles: HandleTable::default(),
            reparse_validator: Box::new(TagMatch),
        })
    }

    /// Use the given policy when existing reparse points are
    /// replaced or deleted.
    pub fn with_reparse_validator(mut self, validator: impl ReparseValidator + 'static) -> Self {
        self.reparse_validator = Box::new(validator);
        self
    }

    /// The limits applied to file content
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// The number of currently open handles
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    /// The current path of the object behind an open handle.
    ///
    /// This always reflects renames of the object or any of its
    /// parents, no matter which handle they were made through.
    pub fn handle_path(&self, handle: u64) -> Result<String> {
        let ns = self.namespace()?;
        Ok(self.context_node(&ns, handle)?.path.clone())
    }

    /// Report the size and label of the volume
    pub fn get_volume_info(&self) -> Result<VolumeInfo> {
        let node_count = self.namespace()?.len() as u64;
        let volume_label = self
            .volume_label
            .lock()
            .map_err(Error::lock_poisoned)?
            .clone();
        Ok(VolumeInfo {
            total_size: self.max_file_nodes.saturating_mul(self.limits.max_file_size),
            free_size: self
                .max_file_nodes
                .saturating_sub(node_count)
                .saturating_mul(self.limits.max_file_size),
            volume_label,
        })
    }

    /// Change the volume label, truncating it if needed
    pub fn set_volume_label(&self, label: &str) -> Result<VolumeInfo> {
        {
            let mut current = self.volume_label.lock().map_err(Error::lock_poisoned)?;
            *current = label.to_string();
            truncate_volume_label(&mut current);
        }
        self.get_volume_info()
    }

    /// Look up the attributes and security descriptor of a path.
    ///
    /// If any intermediate component of the path is a reparse point,
    /// the lookup stops there and reports it so that the host can
    /// resolve it, without copying any descriptor.
    pub fn get_security_by_name(
        &self,
        path: &str,
        security_descriptor: Option<&mut [u8]>,
    ) -> Result<FileSecurity> {
        let path = path::normalize(path);
        let ns = self.namespace()?;
        for step in path::intermediates(&path) {
            let Some(node) = ns.id_of(step).and_then(|id| ns.node(id)) else {
                break;
            };
            if node.reparse.is_some() {
                return Ok(FileSecurity {
                    reparse: true,
                    sz_security_descriptor: node.security_descriptor.len(),
                    attributes: node.attributes,
                });
            }
        }
        let id = ns.get(&path)?;
        let node = self.node(&ns, id)?;
        let size = copy_out(&node.security_descriptor, security_descriptor)?;
        Ok(FileSecurity {
            reparse: false,
            sz_security_descriptor: size,
            attributes: node.attributes,
        })
    }

    /// Create a new file or directory and open it.
    ///
    /// Files always gain the archive attribute. If a reparse buffer is
    /// given, the new object is created as a reparse point holding it.
    pub fn create(
        &self,
        path: &str,
        is_directory: bool,
        attributes: FileAttributes,
        security_descriptor: Bytes,
        allocation_size: u64,
        reparse_buffer: Option<&[u8]>,
    ) -> Result<(u64, FileInfo)> {
        let path = path::normalize(path);
        let reparse = reparse_buffer.map(ReparsePoint::from_buffer).transpose()?;
        let mut ns = self.namespace()?;
        if ns.exists(&path) {
            return Err(Error::NameCollision(path));
        }
        ns.parent_dir(&path)?;
        if ns.len() as u64 >= self.max_file_nodes {
            return Err(Error::CannotMake {
                limit: self.max_file_nodes,
            });
        }

        let allocation_size = self.limits.allocation_for(allocation_size)?;
        let mut node = if is_directory {
            Node::new_dir(path.clone(), attributes, security_descriptor)
        } else {
            let node = Node::new_file(path.clone(), attributes, security_descriptor);
            lock_content(&*node.content()?)?.set_allocation_size(allocation_size, &self.limits)?;
            node
        };
        if let Some(reparse) = reparse {
            node.attributes |= FileAttributes::REPARSE_POINT;
            node.reparse = Some(reparse);
        }
        let kind = node.kind();
        let id = ns.insert(node);
        let info = self.node(&ns, id)?.file_info()?;
        let handle = self.handles.open(id, kind);
        tracing::trace!("create {path} [{kind}] = {handle}");
        Ok((handle, info))
    }

    /// Open an existing file or directory
    pub fn open(&self, path: &str) -> Result<(u64, FileInfo)> {
        let path = path::normalize(path);
        let ns = self.namespace()?;
        let id = ns.get(&path)?;
        let node = self.node(&ns, id)?;
        let info = node.file_info()?;
        let handle = self.handles.open(id, node.kind());
        tracing::trace!("open {path} = {handle}");
        Ok((handle, info))
    }

    /// Truncate an open file to zero length, as when a host
    /// supersedes or overwrites an existing file.
    ///
    /// With `replace_attributes`, the given attributes replace the
    /// current ones, otherwise they are added.
    pub fn overwrite(
        &self,
        handle: u64,
        attributes: FileAttributes,
        replace_attributes: bool,
        allocation_size: u64,
    ) -> Result<FileInfo> {
        let mut ns = self.namespace()?;
        let node = self.context_node_mut(&mut ns, handle)?;
        let content = node.content()?;
        let allocation_size = self.limits.allocation_for(allocation_size)?;
        {
            let mut content = lock_content(&content)?;
            content.set_file_size(0, &self.limits)?;
            content.set_allocation_size(allocation_size, &self.limits)?;
        }
        let attributes = if replace_attributes {
            attributes
        } else {
            node.attributes | attributes
        };
        node.set_attributes(attributes | FileAttributes::ARCHIVE);
        node.touch(filetime_now());
        node.file_info()
    }

    /// Apply the final updates requested when the last handle to an
    /// object is cleaned up, possibly deleting the object.
    ///
    /// The host protocol gives this request no way to report failure,
    /// so any error is logged and otherwise dropped. Notably, a delete
    /// request for a directory that is not empty is ignored.
    pub fn cleanup(&self, handle: u64, flags: CleanupFlags) {
        if let Err(err) = self.try_cleanup(handle, flags) {
            tracing::debug!("cleanup {handle} {flags:?} failed: {err}");
        }
    }

    fn try_cleanup(&self, handle: u64, flags: CleanupFlags) -> Result<()> {
        let mut ns = self.namespace()?;
        let node = self.context_node_mut(&mut ns, handle)?;
        if flags.contains(CleanupFlags::SET_ARCHIVE_BIT) && !node.is_dir() {
            node.attributes |= FileAttributes::ARCHIVE;
        }
        let now = filetime_now();
        if flags.contains(CleanupFlags::SET_LAST_ACCESS_TIME) {
            node.last_access_time = now;
        }
        if flags.contains(CleanupFlags::SET_LAST_WRITE_TIME) {
            node.last_write_time = now;
        }
        if flags.contains(CleanupFlags::SET_CHANGE_TIME) {
            node.change_time = now;
        }
        if flags.contains(CleanupFlags::SET_ALLOCATION_SIZE) && !node.is_dir() {
            let content = node.content()?;
            let mut content = lock_content(&content)?;
            let file_size = content.file_size();
            content.set_allocation_size(file_size, &self.limits)?;
        }
        if flags.contains(CleanupFlags::DELETE) {
            let path = node.path.clone();
            if path == ROOT {
                tracing::debug!("cleanup {handle}: refusing to delete the root directory");
            } else if ns.has_descendants(&path) {
                tracing::debug!("cleanup {handle}: {path} is not empty, not deleting");
            } else {
                ns.remove(&path);
                tracing::trace!("cleanup {handle}: deleted {path}");
            }
        }
        Ok(())
    }

    /// Release an open handle. Stored data is never affected.
    pub fn close(&self, handle: u64) {
        match self.handles.close(handle) {
            Some(_) => tracing::trace!("close {handle}"),
            None => tracing::debug!("close {handle}: handle was not open"),
        }
    }

    /// Read file content starting at `offset` into `buffer`,
    /// returning the number of bytes transferred.
    pub fn read(&self, handle: u64, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        let content = {
            let ns = self.namespace()?;
            self.context_node(&ns, handle)?.content()?
        };
        let count = lock_content(&content)?.read(offset, buffer)?;
        {
            let mut ns = self.namespace()?;
            if let Ok(node) = self.context_node_mut(&mut ns, handle) {
                node.last_access_time = filetime_now();
            }
        }
        tracing::trace!("read {handle} = {count}/{}", buffer.len());
        Ok(count)
    }

    /// Write `data` to a file, returning the number of bytes
    /// transferred and the updated file info.
    ///
    /// With `write_to_end` the data is appended regardless of `offset`.
    /// A `constrained` write never changes the size of the file, only
    /// the part of `data` that overlaps existing content is written.
    pub fn write(
        &self,
        handle: u64,
        offset: u64,
        data: &[u8],
        write_to_end: bool,
        constrained: bool,
    ) -> Result<(usize, FileInfo)> {
        let (content, mut info) = {
            let ns = self.namespace()?;
            let node = self.context_node(&ns, handle)?;
            (node.content()?, node.file_info()?)
        };
        let count = {
            let mut content = lock_content(&content)?;
            let count = content.write(offset, data, write_to_end, constrained, &self.limits)?;
            info.file_size = content.file_size();
            info.allocation_size = content.allocation_size();
            count
        };
        let now = filetime_now();
        info.last_write_time = now;
        info.change_time = now;
        {
            let mut ns = self.namespace()?;
            // the data is already stored, a node deleted in the meantime
            // only loses its timestamp update
            if let Ok(node) = self.context_node_mut(&mut ns, handle) {
                node.last_write_time = now;
                node.change_time = now;
                info = node.file_info()?;
            }
        }
        tracing::trace!("write {handle} = {count}/{}", data.len());
        Ok((count, info))
    }

    /// Nothing is buffered, so this only reports the current file info
    /// when flushing a specific file rather than the whole volume.
    pub fn flush(&self, handle: Option<u64>) -> Result<Option<FileInfo>> {
        handle.map(|h| self.get_file_info(h)).transpose()
    }

    /// Report the current metadata of an open object
    pub fn get_file_info(&self, handle: u64) -> Result<FileInfo> {
        let ns = self.namespace()?;
        self.context_node(&ns, handle)?.file_info()
    }

    /// Change attributes and timestamps of an open object
    pub fn set_basic_info(&self, handle: u64, basic: BasicInfo) -> Result<FileInfo> {
        let mut ns = self.namespace()?;
        let node = self.context_node_mut(&mut ns, handle)?;
        if let Some(attributes) = basic.attributes {
            node.set_attributes(attributes);
        }
        if let Some(time) = basic.creation_time {
            node.creation_time = time;
        }
        if let Some(time) = basic.last_access_time {
            node.last_access_time = time;
        }
        if let Some(time) = basic.last_write_time {
            node.last_write_time = time;
        }
        if let Some(time) = basic.change_time {
            node.change_time = time;
        }
        node.file_info()
    }

    /// Change either the allocation size or the file size of a file
    pub fn set_file_size(
        &self,
        handle: u64,
        new_size: u64,
        set_allocation_size: bool,
    ) -> Result<FileInfo> {
        let ns = self.namespace()?;
        let node = self.context_node(&ns, handle)?;
        {
            let content = node.content()?;
            let mut content = lock_content(&content)?;
            if set_allocation_size {
                content.set_allocation_size(new_size, &self.limits)?;
            } else {
                content.set_file_size(new_size, &self.limits)?;
            }
        }
        node.file_info()
    }

    /// Check that an open object could be deleted
    pub fn can_delete(&self, handle: u64) -> Result<()> {
        let ns = self.namespace()?;
        let node = self.context_node(&ns, handle)?;
        if node.path == ROOT {
            return Err(Error::AccessDenied(node.path.clone()));
        }
        if node.is_dir() && ns.has_descendants(&node.path) {
            return Err(Error::DirectoryNotEmpty(node.path.clone()));
        }
        Ok(())
    }

    /// Move an object, and everything below it, to a new path.
    ///
    /// Open handles anywhere in the moved subtree remain valid and
    /// report their new paths from then on.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn rename(
        &self,
        handle: u64,
        old_path: &str,
        new_path: &str,
        replace_if_exists: bool,
    ) -> Result<()> {
        let old_path = path::normalize(old_path);
        let new_path = path::normalize(new_path);
        let mut ns = self.namespace()?;
        self.context_node(&ns, handle)?;
        ns.get(&old_path)?;
        if old_path == ROOT {
            return Err(Error::AccessDenied(old_path));
        }
        if old_path == new_path {
            return Ok(());
        }
        if path::is_descendant(&new_path, &old_path) {
            return Err(Error::InvalidParameter(format!(
                "cannot move {old_path} inside of itself to {new_path}"
            )));
        }

        let replaced = ns.id_of(&new_path);
        if let Some(target) = replaced {
            if !replace_if_exists {
                return Err(Error::NameCollision(new_path));
            }
            if self.node(&ns, target)?.is_dir() {
                return Err(Error::AccessDenied(new_path));
            }
        }
        ns.parent_dir(&new_path)?;

        if replaced.is_some() {
            ns.remove(&new_path);
        }
        ns.rename(&old_path, &new_path)?;
        tracing::trace!("renamed {old_path} => {new_path}");
        Ok(())
    }

    /// Copy the security descriptor of an open object into the
    /// optional buffer, returning its size.
    pub fn get_security(
        &self,
        handle: u64,
        security_descriptor: Option<&mut [u8]>,
    ) -> Result<usize> {
        let ns = self.namespace()?;
        let node = self.context_node(&ns, handle)?;
        copy_out(&node.security_descriptor, security_descriptor)
    }

    /// Replace the security descriptor of an open object.
    ///
    /// The modifier receives the current descriptor and produces the
    /// new one. Descriptors are opaque here, merging a partial update
    /// into an existing descriptor is up to the modifier. It runs under
    /// the namespace lock so concurrent updates are never lost.
    pub fn set_security<F>(&self, handle: u64, modifier: F) -> Result<()>
    where
        F: FnOnce(&[u8]) -> Result<Bytes>,
    {
        let mut ns = self.namespace()?;
        let node = self.context_node_mut(&mut ns, handle)?;
        node.security_descriptor = modifier(&node.security_descriptor)?;
        Ok(())
    }

    /// List the entries of an open directory.
    ///
    /// Entries are produced in natural order, after the `.` and `..`
    /// entries of any directory other than the root. When a marker is
    /// given, only entries that sort after it are produced so that a
    /// host can resume a listing that was cut short. The consumer
    /// returns false to stop receiving entries.
    ///
    /// The pattern is not applied, hosts are expected to filter the
    /// returned entries themselves.
    pub fn read_directory<F>(
        &self,
        handle: u64,
        _pattern: Option<&str>,
        marker: Option<&str>,
        mut consumer: F,
    ) -> Result<()>
    where
        F: FnMut(DirInfo) -> bool,
    {
        let (dots, mut entries) = {
            let ns = self.namespace()?;
            let dir = self.context_node(&ns, handle)?;
            if !dir.is_dir() {
                return Err(Error::NotADirectory(dir.path.clone()));
            }
            let dots = match path::parent(&dir.path) {
                None => None,
                Some(parent) => {
                    let parent = self.node(&ns, ns.get(parent)?)?;
                    Some((dir.file_info()?, parent.file_info()?))
                }
            };
            let entries = ns
                .children(&dir.path)
                .into_iter()
                .map(|id| -> Result<DirInfo> {
                    let child = self.node(&ns, id)?;
                    Ok(DirInfo {
                        name: path::file_name(&child.path).to_string(),
                        info: child.file_info()?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            (dots, entries)
        };
        entries.sort_by(|a, b| natural_cmp(&a.name, &b.name));

        let mut marker = marker;
        if let Some((own, parent)) = dots {
            if marker.is_none() {
                let dot = DirInfo {
                    name: ".".into(),
                    info: own,
                };
                if !consumer(dot) {
                    return Ok(());
                }
            }
            if matches!(marker, None | Some(".")) {
                let dotdot = DirInfo {
                    name: "..".into(),
                    info: parent,
                };
                if !consumer(dotdot) {
                    return Ok(());
                }
            }
            if matches!(marker, Some(".") | Some("..")) {
                marker = None;
            }
        }

        for entry in entries {
            if let Some(marker) = marker {
                // the marker is the last name the host already received
                if natural_cmp(&entry.name, marker) != Ordering::Greater {
                    continue;
                }
            }
            if !consumer(entry) {
                break;
            }
        }
        Ok(())
    }

    /// Look up a single entry of an open directory by name
    pub fn get_dir_info_by_name(&self, handle: u64, name: &str) -> Result<DirInfo> {
        let ns = self.namespace()?;
        let dir = self.context_node(&ns, handle)?;
        if !dir.is_dir() {
            return Err(Error::NotADirectory(dir.path.clone()));
        }
        let path = path::join(&dir.path, name);
        let Some(id) = ns.id_of(&path) else {
            return Err(Error::NotFound(path));
        };
        Ok(DirInfo {
            name: name.to_string(),
            info: self.node(&ns, id)?.file_info()?,
        })
    }

    /// The reparse data attached to an open object
    pub fn get_reparse_point(&self, handle: u64) -> Result<Bytes> {
        let ns = self.namespace()?;
        let node = self.context_node(&ns, handle)?;
        reparse_data(node).cloned()
    }

    /// Copy the reparse data of the object at `path` into the optional
    /// buffer, returning its size.
    pub fn get_reparse_point_by_name(&self, path: &str, buffer: Option<&mut [u8]>) -> Result<usize> {
        let path = path::normalize(path);
        let ns = self.namespace()?;
        let node = self.node(&ns, ns.get(&path)?)?;
        copy_out(reparse_data(node)?, buffer)
    }

    /// Turn an open object into a reparse point, or replace its
    /// existing reparse data.
    ///
    /// Directories must be empty. Replacing existing data must be
    /// allowed by the configured [`ReparseValidator`].
    pub fn set_reparse_point(&self, handle: u64, data: &[u8], tag: u32) -> Result<()> {
        let mut ns = self.namespace()?;
        let (is_dir, path) = {
            let node = self.context_node(&ns, handle)?;
            (node.is_dir(), node.path.clone())
        };
        if is_dir && ns.has_descendants(&path) {
            return Err(Error::DirectoryNotEmpty(path));
        }
        let node = self.context_node_mut(&mut ns, handle)?;
        if let Some(current) = &node.reparse {
            self.reparse_validator.can_replace(current, tag, data)?;
        }
        node.reparse = Some(ReparsePoint::new(tag, Bytes::copy_from_slice(data)));
        node.attributes |= FileAttributes::REPARSE_POINT;
        node.change_time = filetime_now();
        tracing::trace!("set reparse point {tag:#010x} on {path}");
        Ok(())
    }

    /// Remove the reparse point from an open object.
    ///
    /// The given data must be accepted by the configured
    /// [`ReparseValidator`] as matching the current reparse point.
    pub fn delete_reparse_point(&self, handle: u64, data: &[u8], tag: u32) -> Result<()> {
        let mut ns = self.namespace()?;
        let node = self.context_node_mut(&mut ns, handle)?;
        let current = match &node.reparse {
            Some(current) if node.attributes.contains(FileAttributes::REPARSE_POINT) => current,
            _ => return Err(Error::NotAReparsePoint(node.path.clone())),
        };
        self.reparse_validator.can_replace(current, tag, data)?;
        node.reparse = None;
        node.attributes -= FileAttributes::REPARSE_POINT;
        node.change_time = filetime_now();
        Ok(())
    }

    fn namespace(&self) -> Result<MutexGuard<'_, Namespace>> {
        self.namespace.lock().map_err(Error::lock_poisoned)
    }

    fn node<'a>(&self, ns: &'a Namespace, id: u64) -> Result<&'a Node> {
        ns.node(id)
            .ok_or_else(|| Error::InternalError(format!("path index refers to missing node {id}")))
    }

    fn context_node<'a>(&self, ns: &'a Namespace, handle: u64) -> Result<&'a Node> {
        let ctx = self.handles.get(handle)?;
        // the node may have been deleted through another handle
        ns.node(ctx.node).ok_or(Error::InvalidHandle(handle))
    }

    fn context_node_mut<'a>(&self, ns: &'a mut Namespace, handle: u64) -> Result<&'a mut Node> {
        let ctx = self.handles.get(handle)?;
        ns.node_mut(ctx.node).ok_or(Error::InvalidHandle(handle))
    }
}

fn reparse_data(node: &Node) -> Result<&Bytes> {
    match &node.reparse {
        Some(reparse) if node.attributes.contains(FileAttributes::REPARSE_POINT) => {
            Ok(&reparse.data)
        }
        _ => Err(Error::NotAReparsePoint(node.path.clone())),
    }
}

fn truncate_volume_label(label: &mut String) {
    let mut units = 0;
    let mut end = label.len();
    for (idx, c) in label.char_indices() {
        units += c.len_utf16();
        if units > MAX_VOLUME_LABEL_LENGTH {
            end = idx;
            break;
        }
    }
    label.truncate(end);
}
