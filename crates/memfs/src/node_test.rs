// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use proptest::prelude::*;
use rstest::{fixture, rstest};

use super::*;

#[fixture]
fn limits() -> Limits {
    Limits {
        allocation_unit: 512,
        max_file_size: 64 * 1024,
    }
}

#[rstest]
#[case(0, 0)]
#[case(1, 512)]
#[case(512, 512)]
#[case(600, 1024)]
fn test_allocation_rounds_up(limits: Limits, #[case] size: u64, #[case] expected: u64) {
    assert_eq!(limits.allocation_for(size).unwrap(), expected);
}

#[rstest]
fn test_allocation_over_limit(limits: Limits) {
    let res = limits.allocation_for(limits.max_file_size + 1);
    assert!(matches!(res, Err(Error::DiskFull { .. })), "got {res:?}");
}

#[rstest]
fn test_write_extends_and_rounds(limits: Limits) {
    let mut content = FileContent::default();
    let written = content
        .write(0, &[7u8; 600], false, false, &limits)
        .unwrap();
    assert_eq!(written, 600);
    assert_eq!(content.file_size(), 600);
    assert_eq!(content.allocation_size(), 1024);
}

#[rstest]
fn test_constrained_write_never_extends(limits: Limits) {
    let mut content = FileContent::default();
    content.write(0, &[1u8; 600], false, false, &limits).unwrap();
    let written = content.write(550, &[2u8; 100], false, true, &limits).unwrap();
    assert_eq!(written, 50);
    assert_eq!(content.file_size(), 600);

    let written = content.write(600, &[3u8; 10], false, true, &limits).unwrap();
    assert_eq!(written, 0, "constrained writes at the end transfer nothing");

    let mut buf = [0u8; 60];
    let read = content.read(545, &mut buf).unwrap();
    assert_eq!(read, 55);
    assert_eq!(&buf[..5], &[1u8; 5]);
    assert_eq!(&buf[5..55], &[2u8; 50]);
}

#[rstest]
fn test_write_to_end_appends(limits: Limits) {
    let mut content = FileContent::default();
    content.write(0, b"hello", false, false, &limits).unwrap();
    content.write(0, b" world", true, false, &limits).unwrap();
    let mut buf = [0u8; 11];
    content.read(0, &mut buf).unwrap();
    assert_eq!(&buf, b"hello world");
}

#[rstest]
fn test_read_past_end(limits: Limits) {
    let mut content = FileContent::default();
    content.write(0, b"abc", false, false, &limits).unwrap();
    let mut buf = [0u8; 4];
    let res = content.read(3, &mut buf);
    assert!(
        matches!(res, Err(Error::EndOfFile { offset: 3, size: 3 })),
        "got {res:?}"
    );
}

#[rstest]
fn test_write_beyond_limit_fails_without_change(limits: Limits) {
    let mut content = FileContent::default();
    content.write(0, b"abc", false, false, &limits).unwrap();
    let res = content.write(limits.max_file_size, b"x", false, false, &limits);
    assert!(matches!(res, Err(Error::DiskFull { .. })), "got {res:?}");
    assert_eq!(content.file_size(), 3);
    assert_eq!(content.allocation_size(), 512);
}

#[rstest]
fn test_shrink_then_grow_exposes_zeros(limits: Limits) {
    let mut content = FileContent::default();
    content.write(0, &[9u8; 100], false, false, &limits).unwrap();
    content.set_file_size(10, &limits).unwrap();
    assert_eq!(content.allocation_size(), 512, "shrinking keeps the allocation");
    content.set_file_size(100, &limits).unwrap();
    let mut buf = [0xffu8; 100];
    content.read(0, &mut buf).unwrap();
    assert_eq!(&buf[..10], &[9u8; 10]);
    assert_eq!(&buf[10..], &[0u8; 90]);
}

#[rstest]
fn test_smaller_allocation_truncates(limits: Limits) {
    let mut content = FileContent::default();
    content.write(0, &[1u8; 1500], false, false, &limits).unwrap();
    content.set_allocation_size(700, &limits).unwrap();
    assert_eq!(content.allocation_size(), 1024);
    assert_eq!(content.file_size(), 1024);
}

#[rstest]
fn test_new_file_attributes() {
    let node = Node::new_file(
        "/f".into(),
        FileAttributes::DIRECTORY | FileAttributes::HIDDEN,
        Bytes::new(),
    );
    assert_eq!(
        node.attributes,
        FileAttributes::HIDDEN | FileAttributes::ARCHIVE
    );
    let dir = Node::new_dir("/d".into(), FileAttributes::empty(), Bytes::new());
    assert!(dir.attributes.contains(FileAttributes::DIRECTORY));
    let info = dir.file_info().unwrap();
    assert_eq!((info.allocation_size, info.file_size), (0, 0));
}

#[rstest]
fn test_set_attributes_keeps_kind_bits() {
    let mut dir = Node::new_dir("/d".into(), FileAttributes::empty(), Bytes::new());
    dir.set_attributes(FileAttributes::READONLY);
    assert_eq!(
        dir.attributes,
        FileAttributes::READONLY | FileAttributes::DIRECTORY
    );
    let mut file = Node::new_file("/f".into(), FileAttributes::empty(), Bytes::new());
    file.set_attributes(FileAttributes::DIRECTORY | FileAttributes::REPARSE_POINT);
    assert_eq!(file.attributes, FileAttributes::empty());
}

#[derive(Debug, Clone)]
enum Op {
    Write {
        offset: u64,
        len: usize,
        to_end: bool,
        constrained: bool,
    },
    SetFileSize(u64),
    SetAllocationSize(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..5000, 0usize..3000, any::<bool>(), any::<bool>()).prop_map(
            |(offset, len, to_end, constrained)| Op::Write {
                offset,
                len,
                to_end,
                constrained
            }
        ),
        (0u64..9000).prop_map(Op::SetFileSize),
        (0u64..9000).prop_map(Op::SetAllocationSize),
    ]
}

proptest! {
    #[test]
    fn test_allocation_invariants_hold(ops in prop::collection::vec(op(), 1..40)) {
        let limits = Limits { allocation_unit: 512, max_file_size: 8192 };
        let mut content = FileContent::default();
        for op in ops {
            // failures are expected for oversized requests, the
            // invariants must hold either way
            let _ = match op {
                Op::Write { offset, len, to_end, constrained } => content
                    .write(offset, &vec![0xab; len], to_end, constrained, &limits)
                    .map(|_| ()),
                Op::SetFileSize(size) => content.set_file_size(size, &limits),
                Op::SetAllocationSize(size) => content.set_allocation_size(size, &limits),
            };
            prop_assert_eq!(content.allocation_size() % limits.allocation_unit, 0);
            prop_assert!(content.file_size() <= content.allocation_size());
            prop_assert!(content.allocation_size() <= limits.max_file_size);
        }
    }

    #[test]
    fn test_write_then_read_round_trip(data in prop::collection::vec(any::<u8>(), 1..4096)) {
        let limits = Limits { allocation_unit: 512, max_file_size: 8192 };
        let mut content = FileContent::default();
        let written = content.write(0, &data, false, false, &limits).unwrap();
        prop_assert_eq!(written, data.len());
        let mut buf = vec![0u8; data.len()];
        let read = content.read(0, &mut buf).unwrap();
        prop_assert_eq!(read, data.len());
        prop_assert_eq!(buf, data);
    }
}
