// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use miette::Diagnostic;
use rstest::rstest;

use super::Error;

#[rstest]
#[case(Error::NotFound("/a".into()), 0xC000_0034)]
#[case(Error::PathNotFound("/a/b".into()), 0xC000_003A)]
#[case(Error::NameCollision("/a".into()), 0xC000_0035)]
#[case(Error::CannotMake { limit: 4 }, 0xC000_02EA)]
#[case(Error::DiskFull { requested: 10, limit: 5 }, 0xC000_007F)]
#[case(Error::EndOfFile { offset: 3, size: 3 }, 0xC000_0011)]
fn test_error_ntstatus(#[case] err: Error, #[case] expected: u32) {
    assert_eq!(err.ntstatus(), expected as i32);
}

#[rstest]
fn test_error_os_error() {
    assert_eq!(Error::NotFound("/a".into()).os_error(), Some(libc::ENOENT));
    assert_eq!(
        Error::DirectoryNotEmpty("/a".into()).os_error(),
        Some(libc::ENOTEMPTY)
    );
    assert_eq!(Error::InvalidHandle(7).os_error(), Some(libc::EBADF));
    assert_eq!(Error::EndOfFile { offset: 0, size: 0 }.os_error(), None);
}

#[rstest]
fn test_error_has_diagnostic_code() {
    let err = Error::NotADirectory("/f/x".into());
    let code = err.code().expect("every error has a code").to_string();
    assert_eq!(code, "memfs::not_a_directory");
}
