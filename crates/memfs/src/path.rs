// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

//! Helpers for the slash-rooted paths used as namespace keys.
//!
//! Every stored path is absolute, uses `/` as its only separator,
//! never has a trailing separator (except for the root itself) and
//! is compared case-sensitively.

#[cfg(test)]
#[path = "./path_test.rs"]
mod path_test;

/// The path of the root directory
pub const ROOT: &str = "/";

/// Normalize a path received from a filesystem host.
///
/// Windows style separators are converted, repeated separators are
/// collapsed and any trailing separator is removed.
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut normalized = String::with_capacity(path.len() + 1);
    for step in path.split('/').filter(|s| !s.is_empty()) {
        normalized.push('/');
        normalized.push_str(step);
    }
    if normalized.is_empty() {
        normalized.push_str(ROOT);
    }
    normalized
}

/// The path of the directory containing `path`, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// The final component of `path`, which is empty for the root.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Append a single name to a directory path
pub fn join(dir: &str, name: &str) -> String {
    if dir == ROOT {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// True if `path` lies strictly below `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT {
        return path != ROOT;
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// The prefix that every strict descendant of `dir` starts with.
pub fn descendant_prefix(dir: &str) -> String {
    if dir == ROOT {
        ROOT.to_string()
    } else {
        format!("{dir}/")
    }
}

/// Replace the leading `old` portion of `path` with `new`.
///
/// `path` must be `old` itself or one of its descendants.
pub fn reparent(path: &str, old: &str, new: &str) -> String {
    if path == old {
        return new.to_string();
    }
    let tail = if old == ROOT {
        &path[1..]
    } else {
        &path[old.len() + 1..]
    };
    join(new, tail)
}

/// The strict ancestors of `path` below the root, shallowest first.
///
/// For `/a/b/c` this yields `/a` and then `/a/b`.
pub fn intermediates(path: &str) -> impl Iterator<Item = &str> + '_ {
    path.match_indices('/')
        .map(|(idx, _)| idx)
        .filter(|idx| *idx > 0)
        .map(move |idx| &path[..idx])
}
