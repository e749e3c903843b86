// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.

//! Helpers for running a command to completion in a fresh container.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context as _, Result};
use bollard::{
    container::{Config, LogOutput, LogsOptions, RemoveContainerOptions, WaitContainerOptions},
    models::HostConfig,
    Docker,
};
use futures::StreamExt;

use super::ImagePullPolicy;
use crate::host::OwnershipToken;

/// Host directories to bind mount into the container, keyed by host path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeMap(BTreeMap<PathBuf, PathBuf>);

impl VolumeMap {
    /// Mount `host` at `container`, replacing any earlier mount of `host`.
    pub fn insert<H: Into<PathBuf>, C: Into<PathBuf>>(&mut self, host: H, container: C) {
        self.0.insert(host.into(), container.into());
    }

    /// Mount `dir` at the same path inside the container.
    ///
    /// The filesystem root is skipped, Docker refuses `/` as a mount destination.
    pub fn mirror<P: AsRef<Path>>(&mut self, dir: P) {
        let dir = dir.as_ref();
        if dir.parent().is_none() {
            tracing::warn!(dir = ?dir, "not mounting the filesystem root");
            return;
        }
        self.insert(dir, dir);
    }

    /// Render the mounts as Docker bind strings (`host:container:rw`).
    pub fn binds(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|(host, container)| format!("{}:{}:rw", host.display(), container.display()))
            .collect()
    }

    /// Whether no mounts are defined.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything needed to run a batch of commands in a container.
#[derive(Debug, Clone)]
pub struct ContainerRunConfig {
    /// Image name, including tag (e.g. `freesurfer/freesurfer:7.1.1`).
    pub image: String,
    /// What to do about the image before the first command.
    pub pull: ImagePullPolicy,
    /// Bind mounts for every container in the batch.
    pub volumes: VolumeMap,
    /// User and group the container processes run as.
    pub user: OwnershipToken,
    /// Extra environment variables.
    pub environment: BTreeMap<String, String>,
    /// Working directory inside the container.
    pub working_dir: PathBuf,
}

impl ContainerRunConfig {
    fn env(&self) -> Vec<String> {
        self.environment
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }
}

/// Result of a container that ran to completion.
#[derive(Debug)]
pub struct ContainerOutput {
    /// Exit code reported by the runtime.
    pub exit_code: i64,
    /// Interleaved stdout and stderr.
    pub output: Vec<u8>,
}

/// Create a container from `config` running `argv`, wait for it to exit, and collect its
/// output. The container is removed afterwards whether or not it succeeded.
pub async fn run_to_completion(
    client: &Docker,
    config: &ContainerRunConfig,
    argv: Vec<String>,
) -> Result<ContainerOutput> {
    let host_config = HostConfig {
        binds: Some(config.volumes.binds()),
        ..Default::default()
    };
    let container_config = Config {
        image: Some(config.image.clone()),
        cmd: Some(argv),
        env: Some(config.env()),
        user: Some(config.user.to_string()),
        working_dir: Some(config.working_dir.to_string_lossy().into_owned()),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        host_config: Some(host_config),
        ..Default::default()
    };

    let id = client
        .create_container::<String, String>(None, container_config)
        .await
        .context("failed to create container")?
        .id;
    tracing::debug!(id = ?id, image = ?config.image, "created container");

    let result = wait_and_collect(client, &id).await;

    let opts = RemoveContainerOptions {
        v: true,
        force: true,
        link: false,
    };
    if let Err(e) = client.remove_container(&id, Some(opts)).await {
        tracing::warn!(err = ?e, id = ?id, "failed to remove container");
    }

    result
}

async fn wait_and_collect(client: &Docker, id: &str) -> Result<ContainerOutput> {
    client
        .start_container::<String>(id, None)
        .await
        .context("failed to start container")?;

    let opts = WaitContainerOptions {
        condition: "not-running",
    };
    let mut stream = client.wait_container(id, Some(opts));
    let mut exit_code = None;
    while let Some(res) = stream.next().await {
        let res = res.context("failed to wait for container")?;
        if let Some(err) = res.error.and_then(|e| e.message) {
            anyhow::bail!("container wait error: {}", err);
        }
        exit_code = Some(res.status_code);
    }
    let exit_code =
        exit_code.ok_or_else(|| anyhow::anyhow!("container did not report an exit code"))?;

    let opts = LogsOptions::<String> {
        stdout: true,
        stderr: true,
        tail: "all".to_owned(),
        ..Default::default()
    };
    let mut output = Vec::new();
    let mut stream = client.logs(id, Some(opts));
    while let Some(res) = stream.next().await {
        match res.context("failed to read container logs")? {
            LogOutput::StdOut { message }
            | LogOutput::StdErr { message }
            | LogOutput::StdIn { message }
            | LogOutput::Console { message } => output.extend_from_slice(&message),
        }
    }

    Ok(ContainerOutput { exit_code, output })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::DockerConfig, docker::util::client};
    use tracing_test::traced_test;

    #[test]
    fn test_volume_binds() {
        let mut volumes = VolumeMap::default();
        assert!(volumes.is_empty());

        volumes.mirror("/data/subj01");
        volumes.insert("/home/me/license", "/license");
        volumes.mirror("/data/subj01");

        assert_eq!(
            volumes.binds(),
            vec![
                "/data/subj01:/data/subj01:rw".to_owned(),
                "/home/me/license:/license:rw".to_owned(),
            ]
        );
    }

    #[test]
    #[traced_test]
    fn test_root_is_never_mirrored() {
        let mut volumes = VolumeMap::default();
        volumes.mirror("/");
        assert!(volumes.is_empty());

        volumes.mirror("/out");
        assert_eq!(volumes.binds(), vec!["/out:/out:rw".to_owned()]);
    }

    #[test]
    fn test_env_rendering() {
        let config = ContainerRunConfig {
            image: "bash".into(),
            pull: ImagePullPolicy::Never,
            volumes: VolumeMap::default(),
            user: OwnershipToken { uid: 1000, gid: 100 },
            environment: [("FS_KEY".to_owned(), "abc=".to_owned())].into_iter().collect(),
            working_dir: PathBuf::from("/"),
        };
        assert_eq!(config.env(), vec!["FS_KEY=abc=".to_owned()]);
    }

    #[tokio::test]
    #[traced_test]
    #[ignore = "requires a running Docker daemon"]
    async fn test_run_to_completion() {
        let client = client(&DockerConfig::default()).expect("failed to get client");
        ImagePullPolicy::IfNotPresent
            .acquire_image(&client, "bash:5")
            .await
            .expect("image should pull");

        let f = tempfile::NamedTempFile::new().expect("tempfile");
        let config = ContainerRunConfig {
            image: "bash:5".into(),
            pull: ImagePullPolicy::IfNotPresent,
            volumes: VolumeMap::default(),
            user: OwnershipToken::for_file(f.path()).expect("token"),
            environment: [("GREETING".to_owned(), "hello".to_owned())].into_iter().collect(),
            working_dir: PathBuf::from("/tmp"),
        };

        let argv = vec!["bash".into(), "-c".into(), "echo $GREETING; pwd; exit 3".into()];
        let out = run_to_completion(&client, &config, argv)
            .await
            .expect("container should run");
        assert_eq!(out.exit_code, 3);
        assert_eq!(String::from_utf8_lossy(&out.output), "hello\n/tmp\n");
    }
}
