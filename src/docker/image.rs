// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.

//! Helpers for acquiring the tool images before a run.

use anyhow::{Context as _, Result};
use bollard::{image::CreateImageOptions, Docker};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

/// Defines policy for what to do about acquiring a container image before running commands.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub enum ImagePullPolicy {
    /// Always pull the image, even when it exists on the host.
    Always,
    /// Pull the image only when it is missing on the host.
    IfNotPresent,
    /// Never pull the image.
    /// Requires that the image is always present locally.
    Never,
}

impl Default for ImagePullPolicy {
    fn default() -> Self {
        Self::Always
    }
}

impl ImagePullPolicy {
    /// Acquire a Docker image according to the ImagePullPolicy.
    pub async fn acquire_image(&self, client: &Docker, image: &str) -> Result<()> {
        match self {
            ImagePullPolicy::Never => Ok(()),
            ImagePullPolicy::IfNotPresent => {
                if client.inspect_image(image).await.is_ok() {
                    tracing::debug!(image = ?image, "image present, skipping pull");
                    return Ok(());
                }
                pull(client, image).await.context("failed to pull image")
            }
            ImagePullPolicy::Always => pull(client, image).await.context("failed to pull image"),
        }
    }
}

async fn pull(client: &Docker, image: &str) -> Result<()> {
    let (name, tag) = split_reference(image);
    tracing::info!(image = ?name, tag = ?tag, "pulling image");

    let opts = CreateImageOptions {
        from_image: name,
        tag,
        ..Default::default()
    };

    let mut stream = client.create_image(Some(opts), None, None);
    while let Some(res) = stream.next().await {
        let info = res.context("failed to send request")?;
        if let Some(err) = info.error {
            return Err(anyhow::anyhow!("{}", err).context("error from docker"));
        }
        if let Some(status) = info.status {
            tracing::trace!(status = ?status, "image pull status")
        }
        if let Some(detail) = info.progress_detail {
            tracing::debug!(
                curr = detail.current,
                total = detail.total,
                "image pull progress"
            )
        }
    }

    Ok(())
}

/// Split an image reference into name and tag, defaulting the tag to `latest`.
///
/// A colon only introduces a tag after the last `/`, since registries may carry a port.
fn split_reference(image: &str) -> (&str, &str) {
    let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[name_start..].rfind(':') {
        Some(i) => (&image[..name_start + i], &image[name_start + i + 1..]),
        None => (image, "latest"),
    }
}

#[cfg(test)]
mod tests {
    use crate::{config::DockerConfig, docker::util::client, testutils::assert_yaml_deserialize};

    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_image_pull_policy_serde() {
        assert_eq!(
            assert_yaml_deserialize::<ImagePullPolicy>("always"),
            ImagePullPolicy::Always
        );
        assert_eq!(
            assert_yaml_deserialize::<ImagePullPolicy>("ifNotPresent"),
            ImagePullPolicy::IfNotPresent
        );
        assert_eq!(
            assert_yaml_deserialize::<ImagePullPolicy>("never"),
            ImagePullPolicy::Never
        );
        assert_eq!(ImagePullPolicy::default(), ImagePullPolicy::Always);
    }

    #[test]
    fn test_split_reference() {
        assert_eq!(split_reference("bash"), ("bash", "latest"));
        assert_eq!(
            split_reference("freesurfer/freesurfer:7.1.1"),
            ("freesurfer/freesurfer", "7.1.1")
        );
        assert_eq!(
            split_reference("localhost:5000/qiicr/dcmqi"),
            ("localhost:5000/qiicr/dcmqi", "latest")
        );
        assert_eq!(
            split_reference("localhost:5000/qiicr/dcmqi:v1.2.4"),
            ("localhost:5000/qiicr/dcmqi", "v1.2.4")
        );
    }

    #[tokio::test]
    #[traced_test]
    #[ignore = "requires a running Docker daemon"]
    async fn test_image_pull() {
        let client = client(&DockerConfig::default()).expect("failed to get client");

        ImagePullPolicy::IfNotPresent
            .acquire_image(&client, "bash:5")
            .await
            .expect("image should pull");

        client
            .inspect_image("bash:5")
            .await
            .expect("image should exist");
    }
}
