// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

/// The allocation granularity used when none is configured
pub const DEFAULT_ALLOCATION_UNIT: u64 = 512;

/// Limits and defaults of the filesystem itself
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Filesystem {
    /// File allocation sizes are always a multiple of this many bytes
    pub allocation_unit: u64,

    /// The maximum number of files and directories, including the root
    pub max_file_nodes: u64,

    /// The maximum allocation size of any single file.
    ///
    /// This is rounded down to a multiple of the allocation unit
    /// when the configuration is validated.
    pub max_file_size: u64,

    /// The security descriptor given to the root directory, as
    /// base64 encoded self-relative descriptor bytes.
    ///
    /// The engine never interprets these bytes, they are produced
    /// by whatever converts descriptors for the host (eg: from SDDL).
    pub root_security_descriptor: String,
}

impl Default for Filesystem {
    fn default() -> Self {
        Self {
            allocation_unit: DEFAULT_ALLOCATION_UNIT,
            max_file_nodes: 1024,
            max_file_size: 16 * 1024 * 1024,
            root_security_descriptor: String::new(),
        }
    }
}

/// Volume properties reported to the host
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Volume {
    /// The label reported for the volume
    pub label: String,
}

impl Default for Volume {
    fn default() -> Self {
        Self {
            label: "MEMFS".into(),
        }
    }
}

/// Configuration values for an in-memory filesystem.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    // These sub-types should aim to only have one level of
    // values within them, otherwise they become impossible to address
    // with environment variables.
    /// Filesystem limits
    pub filesystem: Filesystem,
    /// Volume properties
    pub volume: Volume,
}

impl Config {
    /// Load the config from disk and the environment
    pub fn load() -> Result<Self> {
        load_config()
    }

    /// Parse a configuration from an ini-formatted string
    pub fn load_string<S: AsRef<str>>(conf: S) -> Result<Self> {
        use config::{Config as RawConfig, File, FileFormat};

        let config = RawConfig::builder()
            .add_source(File::from_str(conf.as_ref(), FileFormat::Ini))
            .build()?;
        Config::deserialize(config)?.validate()
    }

    /// Check these values for consistency, normalizing where possible.
    pub fn validate(mut self) -> Result<Self> {
        let fs = &mut self.filesystem;
        if fs.allocation_unit == 0 {
            return Err(Error::InvalidConfig(
                "filesystem.allocation_unit must be greater than zero".into(),
            ));
        }
        if fs.max_file_nodes == 0 {
            return Err(Error::InvalidConfig(
                "filesystem.max_file_nodes must allow at least the root directory".into(),
            ));
        }
        fs.max_file_size = fs.max_file_size / fs.allocation_unit * fs.allocation_unit;
        self.root_security_descriptor()?;
        Ok(self)
    }

    /// Decode the configured root security descriptor
    pub fn root_security_descriptor(&self) -> Result<Bytes> {
        let encoded = self.filesystem.root_security_descriptor.trim();
        data_encoding::BASE64
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(|err| {
                Error::InvalidConfig(format!(
                    "filesystem.root_security_descriptor is not valid base64: {err}"
                ))
            })
    }
}

/// Load the memfs configuration, layering the system and user
/// configuration files (if they exist) and environment overrides.
///
/// Environment variables are named `MEMFS_<SECTION>_<NAME>`, for
/// example `MEMFS_FILESYSTEM_MAX_FILE_NODES`.
pub fn load_config() -> Result<Config> {
    use config::{Config as RawConfig, File};

    let mut config_builder = RawConfig::builder()
        // the system config can also be in any support format: toml, yaml, json, ini, etc
        .add_source(File::with_name("/etc/memfs").required(false));

    if let Some(user_config_dir) = dirs::config_dir() {
        let user_config = user_config_dir.join("memfs").join("memfs");
        config_builder = config_builder
            .add_source(File::with_name(&format!("{}", user_config.display())).required(false));
    }

    for (var, value) in std::env::vars() {
        let Some(tail) = var.strip_prefix("MEMFS_") else {
            continue;
        };
        let Some((section, name)) = tail.split_once('_') else {
            // a value with no section is not a configuration
            // value, and can be skipped (eg: MEMFS_LOG)
            continue;
        };

        let key = format!("{}.{}", section.to_lowercase(), name.to_lowercase());
        config_builder = config_builder.set_override(key, value)?;
    }

    let config = config_builder.build()?;
    tracing::debug!("memfs configuration loaded");
    Config::deserialize(config)?.validate()
}
