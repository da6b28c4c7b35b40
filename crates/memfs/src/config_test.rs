// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use rstest::rstest;
use serial_test::serial;

use super::{load_config, Config, DEFAULT_ALLOCATION_UNIT};
use crate::Error;

#[rstest]
fn test_config_defaults_are_valid() {
    let config = Config::default().validate().unwrap();
    assert_eq!(config.filesystem.allocation_unit, DEFAULT_ALLOCATION_UNIT);
    assert!(config.root_security_descriptor().unwrap().is_empty());
}

#[rstest]
fn test_config_load_string() {
    let config = Config::load_string(
        "[filesystem]\nallocation_unit=4096\nmax_file_nodes=8\n[volume]\nlabel=SCRATCH",
    )
    .unwrap();
    assert_eq!(config.filesystem.allocation_unit, 4096);
    assert_eq!(config.filesystem.max_file_nodes, 8);
    assert_eq!(config.volume.label, "SCRATCH");
}

#[rstest]
fn test_config_max_file_size_rounded_to_unit() {
    let config =
        Config::load_string("[filesystem]\nallocation_unit=512\nmax_file_size=1500").unwrap();
    assert_eq!(config.filesystem.max_file_size, 1024);
}

#[rstest]
fn test_config_zero_allocation_unit() {
    let res = Config::load_string("[filesystem]\nallocation_unit=0");
    assert!(matches!(res, Err(Error::InvalidConfig(_))), "got {res:?}");
}

#[rstest]
fn test_config_root_descriptor_decoded() {
    let config =
        Config::load_string("[filesystem]\nroot_security_descriptor=AQIDBA==").unwrap();
    let descriptor = config.root_security_descriptor().unwrap();
    assert_eq!(descriptor.as_ref(), &[1, 2, 3, 4]);
}

#[rstest]
fn test_config_root_descriptor_invalid() {
    let res = Config::load_string("[filesystem]\nroot_security_descriptor=not*base64");
    assert!(matches!(res, Err(Error::InvalidConfig(_))), "got {res:?}");
}

#[rstest]
#[serial(env)]
fn test_config_env_override() {
    // Safety: tests that touch the environment are serialized
    unsafe {
        std::env::set_var("MEMFS_FILESYSTEM_MAX_FILE_NODES", "77");
        std::env::set_var("MEMFS_VOLUME_LABEL", "FROMENV");
    }
    let res = load_config();
    unsafe {
        std::env::remove_var("MEMFS_FILESYSTEM_MAX_FILE_NODES");
        std::env::remove_var("MEMFS_VOLUME_LABEL");
    }
    let config = res.unwrap();
    assert_eq!(config.filesystem.max_file_nodes, 77);
    assert_eq!(config.volume.label, "FROMENV");
}

#[rstest]
#[serial(env)]
#[cfg(target_os = "linux")]
fn test_config_user_file_is_loaded() {
    let tmpdir = tempfile::tempdir().unwrap();
    let user_dir = tmpdir.path().join("memfs");
    std::fs::create_dir_all(&user_dir).unwrap();
    std::fs::write(
        user_dir.join("memfs.ini"),
        "[filesystem]\nmax_file_nodes=3\n",
    )
    .unwrap();

    let previous = std::env::var_os("XDG_CONFIG_HOME");
    // Safety: tests that touch the environment are serialized
    unsafe { std::env::set_var("XDG_CONFIG_HOME", tmpdir.path()) };
    let res = load_config();
    unsafe {
        match previous {
            Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }
    assert_eq!(res.unwrap().filesystem.max_file_nodes, 3);
}
