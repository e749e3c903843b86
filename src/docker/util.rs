// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.

//! Helpers for finding and connecting to Docker.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bollard::{Docker, API_DEFAULT_VERSION};

use crate::config::DockerConfig;

/// Spawn a bollard::Docker using the configured Unix socket and the default API version.
pub fn client(config: &DockerConfig) -> Result<Docker> {
    Docker::connect_with_unix(
        config
            .socket
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("bad docker socket path in config"))?,
        120,
        API_DEFAULT_VERSION,
    )
    .context("failed to spawn client")
}

/// Look up the Docker client binary on `PATH`.
pub fn find_runtime(config: &DockerConfig) -> Option<PathBuf> {
    match which::which(&config.client) {
        Ok(path) => {
            tracing::debug!(client = ?config.client, path = ?path, "found container runtime");
            Some(path)
        }
        Err(e) => {
            tracing::debug!(client = ?config.client, err = ?e, "container runtime not found");
            None
        }
    }
}
