// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.
//

//! Running commands in a toolchain's container image.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use bollard::Docker;

use super::{CommandOutcome, Executor, RunOutcome};
use crate::{
    commands::CommandSpec,
    config::DockerConfig,
    docker::{run_to_completion, util::client, ContainerRunConfig},
};

/// Separator printed after each command's output.
const SEPARATOR: &str = "--------";

/// Runs each command in its own container and echoes the container's output.
///
/// Unlike [`super::LocalExecutor`], any fault stops the batch, including a non-zero exit
/// from the containerized tool.
#[derive(Debug, Clone)]
pub struct ContainerExecutor {
    docker: DockerConfig,
    run: ContainerRunConfig,
}

impl ContainerExecutor {
    /// Run commands per `run`, talking to the Docker daemon described by `docker`.
    pub fn new(docker: DockerConfig, run: ContainerRunConfig) -> Self {
        Self { docker, run }
    }
}

#[async_trait]
impl Executor for ContainerExecutor {
    async fn run(&self, batch: &[CommandSpec]) -> Result<RunOutcome> {
        // One client per batch, released however the batch ends.
        let client = scopeguard::guard(client(&self.docker)?, |client: Docker| {
            drop(client);
            tracing::debug!("released docker client");
        });

        self.run
            .pull
            .acquire_image(&client, &self.run.image)
            .await
            .with_context(|| format!("failed to acquire container image {}", self.run.image))?;

        let mut outcome = RunOutcome::default();
        for cmd in batch {
            let argv = cmd.tokens()?;
            println!("[RunningCommand] {}\n", cmd);

            let out = run_to_completion(&client, &self.run, argv)
                .await
                .with_context(|| format!("failed to run `{}` in {}", cmd, self.run.image))?;

            let log = String::from_utf8_lossy(&out.output);
            for line in log.split('\n') {
                println!("{}", line);
            }
            println!("{}", SEPARATOR);

            if out.exit_code != 0 {
                anyhow::bail!(
                    "command `{}` in {} exited with status {}",
                    cmd,
                    self.run.image,
                    out.exit_code
                );
            }

            outcome.commands.push(CommandOutcome {
                command: cmd.clone(),
                exit_code: Some(out.exit_code),
            });
        }

        Ok(outcome)
    }
}
