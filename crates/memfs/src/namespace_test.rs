// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use bytes::Bytes;
use rstest::{fixture, rstest};

use super::Namespace;
use crate::info::FileAttributes;
use crate::node::Node;
use crate::Error;

fn dir(path: &str) -> Node {
    Node::new_dir(path.into(), FileAttributes::empty(), Bytes::new())
}

fn file(path: &str) -> Node {
    Node::new_file(path.into(), FileAttributes::empty(), Bytes::new())
}

#[fixture]
fn namespace() -> Namespace {
    let mut ns = Namespace::new(dir("/"));
    ns.insert(dir("/d"));
    ns.insert(file("/d/x"));
    ns.insert(dir("/d/sub"));
    ns.insert(file("/d/sub/y"));
    ns.insert(file("/d-sibling"));
    ns.insert(file("/f"));
    ns
}

#[rstest]
fn test_root_is_always_present() {
    let mut ns = Namespace::new(dir("/"));
    assert!(ns.exists("/"));
    assert_eq!(ns.len(), 1);
    assert!(ns.remove("/").is_none(), "the root is never removed");
}

#[rstest]
fn test_index_numbers_are_monotonic(mut namespace: Namespace) {
    let a = namespace.insert(file("/a"));
    let b = namespace.insert(file("/b"));
    assert!(b > a);
    assert_eq!(namespace.node(b).unwrap().index_number, b);
}

#[rstest]
#[case("/d/x", None)]
#[case("/d/missing", Some("not_found"))]
#[case("/missing/x", Some("path_not_found"))]
#[case("/f/x", Some("not_a_directory"))]
#[case("/f/x/y", Some("not_a_directory"))]
fn test_get_distinguishes_missing_components(
    namespace: Namespace,
    #[case] path: &str,
    #[case] expected: Option<&str>,
) {
    let res = namespace.get(path);
    let kind = match res {
        Ok(_) => None,
        Err(Error::NotFound(_)) => Some("not_found"),
        Err(Error::PathNotFound(_)) => Some("path_not_found"),
        Err(Error::NotADirectory(_)) => Some("not_a_directory"),
        Err(err) => panic!("unexpected error: {err:?}"),
    };
    assert_eq!(kind, expected);
}

#[rstest]
fn test_children_are_direct_only(namespace: Namespace) {
    let mut names: Vec<_> = namespace
        .children("/d")
        .into_iter()
        .map(|id| namespace.node(id).unwrap().path.clone())
        .collect();
    names.sort();
    assert_eq!(names, vec!["/d/sub", "/d/x"]);

    let root_children = namespace.children("/");
    assert_eq!(root_children.len(), 3);
}

#[rstest]
fn test_has_descendants(namespace: Namespace) {
    assert!(namespace.has_descendants("/d"));
    assert!(!namespace.has_descendants("/d/sub/y"));
    assert!(!namespace.has_descendants("/d-sibling"));
}

#[rstest]
fn test_rename_moves_subtree(mut namespace: Namespace) {
    let sub = namespace.id_of("/d/sub").unwrap();
    namespace.rename("/d", "/e").unwrap();
    for path in ["/e", "/e/x", "/e/sub", "/e/sub/y"] {
        assert!(namespace.exists(path), "{path} should exist");
    }
    for path in ["/d", "/d/x", "/d/sub", "/d/sub/y"] {
        assert!(!namespace.exists(path), "{path} should not exist");
    }
    assert!(namespace.exists("/d-sibling"), "siblings are not moved");
    assert_eq!(namespace.id_of("/e/sub"), Some(sub), "node ids are stable");
    assert_eq!(namespace.node(sub).unwrap().path, "/e/sub");
}

#[rstest]
fn test_rename_and_back_restores(mut namespace: Namespace) {
    let mut before: Vec<_> = namespace.children("/").into_iter().collect();
    before.sort();
    namespace.rename("/d", "/f2").unwrap();
    namespace.rename("/f2", "/d").unwrap();
    let mut after: Vec<_> = namespace.children("/").into_iter().collect();
    after.sort();
    assert_eq!(before, after);
    assert!(namespace.exists("/d/sub/y"));
    assert_eq!(namespace.len(), 7);
}

#[rstest]
fn test_insert_replaces_existing(mut namespace: Namespace) {
    let old = namespace.id_of("/f").unwrap();
    let new = namespace.insert(file("/f"));
    assert_ne!(old, new);
    assert!(namespace.node(old).is_none());
    assert_eq!(namespace.len(), 7);
}
