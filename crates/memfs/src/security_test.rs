// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use rstest::rstest;

use super::copy_out;
use crate::Error;

#[rstest]
fn test_copy_out_size_only() {
    assert_eq!(copy_out(b"descriptor", None).unwrap(), 10);
}

#[rstest]
fn test_copy_out_exact_buffer() {
    let mut buffer = [0u8; 4];
    assert_eq!(copy_out(b"abcd", Some(&mut buffer)).unwrap(), 4);
    assert_eq!(&buffer, b"abcd");
}

#[rstest]
fn test_copy_out_buffer_too_small() {
    let mut buffer = [0u8; 3];
    let res = copy_out(b"abcd", Some(&mut buffer));
    assert!(
        matches!(
            res,
            Err(Error::BufferTooSmall {
                required: 4,
                available: 3
            })
        ),
        "got {res:?}"
    );
    assert_eq!(buffer, [0, 0, 0], "nothing is copied on failure");
}
