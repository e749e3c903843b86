// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.
//

//! The logic used to configure Hearth.
//!
//! Configuration is layered: built-in defaults, then the user's config file, then
//! `HEARTH__`-prefixed environment variables (e.g. `HEARTH__DOCKER__SOCKET`). The result
//! is an immutable [`Config`] that is handed to whatever needs it.

use std::path::{Path, PathBuf};

use anyhow::Result;
use directories::ProjectDirs;
use serde::Deserialize;

use crate::{dispatch::ExecutionTarget, docker::ImagePullPolicy};

/// The base level config for Hearth.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Configuration specific to Docker.
    pub docker: DockerConfig,
    /// Configuration specific to license handling.
    pub license: LicenseConfig,
    /// The FreeSurfer toolchain, used for resampling.
    pub freesurfer: ToolchainConfig,
    /// The dcmqi toolchain, used for DICOM SEG conversion.
    pub dcmqi: ToolchainConfig,
}

/// Configuration specific to Docker.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DockerConfig {
    /// Name of the Docker client binary, looked up on `PATH`.
    pub client: String,
    /// Full path to the Docker socket.
    #[serde(deserialize_with = "serde_helpers::expand_pathbuf")]
    pub socket: PathBuf,
    /// Image pull policy applied before each batch of container commands.
    #[serde(default)]
    pub pull: ImagePullPolicy,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            client: "docker".to_owned(),
            socket: PathBuf::from("/var/run/docker.sock"),
            pull: ImagePullPolicy::default(),
        }
    }
}

/// Configuration specific to license handling.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LicenseConfig {
    /// Environment variable that carries the encoded license into containers.
    pub env: String,
}

/// Configuration for one external toolchain.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Container image providing the toolchain.
    pub image: String,
    /// Where the toolchain runs unless overridden on the command line.
    #[serde(default)]
    pub target: ExecutionTarget,
}

impl Config {
    /// Load the config, reading `file` instead of the default config file when given.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let builder = config::Config::builder();

        // Add defaults
        let builder = builder.add_source(config::File::from_str(
            include_str!("config/defaults.toml"),
            config::FileFormat::Toml,
        ));
        // Add config file if it exists
        let builder = match file {
            Some(file) => {
                tracing::info!(file = ?file, "Reading config file");
                builder.add_source(config::File::from(file).required(true))
            }
            None => match get_config_file() {
                Some(config_file) => {
                    tracing::info!(file = ?config_file, "Reading config file");
                    builder.add_source(config::File::from(config_file).required(false))
                }
                None => builder,
            },
        };
        // Environment overrides
        let builder = builder.add_source(
            config::Environment::with_prefix("HEARTH")
                .prefix_separator("__")
                .separator("__"),
        );

        builder
            .build()?
            .try_deserialize()
            .map_err(anyhow::Error::from)
    }
}

/// Get the location for Hearth's config file in the OS's canonical config path.
fn get_config_file() -> Option<PathBuf> {
    ProjectDirs::from("org", "hearth", "hearth")
        .map(|d| d.config_dir().join("config.toml"))
        .filter(|p| p.exists())
}

mod serde_helpers {
    use serde::{Deserialize, Deserializer};
    use std::path::PathBuf;

    pub fn expand_pathbuf<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
    where
        D: Deserializer<'de>,
    {
        let p = PathBuf::deserialize(deserializer)?;
        let p = shellexpand::full(
            p.to_str()
                .ok_or_else(|| serde::de::Error::custom("path is not a UTF-8 string"))?,
        )
        .map_err(serde::de::Error::custom)?;
        let p = p.as_ref();
        Ok(PathBuf::from(p))
    }
}
