// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.
//

//! Running command batches on the host or in a container.
//!
//! A [`Dispatcher`] can only be obtained through [`Dispatcher::prepare`], which checks that
//! every toolchain about to run has what it needs (a container runtime, a license). Once
//! prepared, it hands out one [`Executor`] per toolchain invocation.

mod container;
mod local;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use clap_derive::ArgEnum;
use serde::{Deserialize, Serialize};

pub use self::{container::ContainerExecutor, local::LocalExecutor};
use crate::{
    commands::CommandSpec,
    config::{Config, DockerConfig, ToolchainConfig},
    docker::{util::find_runtime, ContainerRunConfig, VolumeMap},
    host::OwnershipToken,
    license::LicenseMaterial,
};

/// Environment variable the command line reads the license path from.
pub const LICENSE_PATH_ENV: &str = "FS_LICENSE_KEY";

/// Where a toolchain's commands run.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, ArgEnum)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionTarget {
    /// Run the tools installed on the host.
    Local,
    /// Run the tools inside the toolchain's container image.
    #[serde(alias = "docker")]
    #[clap(alias = "docker")]
    Container,
}

impl Default for ExecutionTarget {
    fn default() -> Self {
        ExecutionTarget::Container
    }
}

/// An external toolchain and how it should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Human readable name, used in messages.
    pub name: String,
    /// Container image providing the toolchain.
    pub image: String,
    /// Where the toolchain runs.
    pub target: ExecutionTarget,
    /// Whether the toolchain needs a license file when run in a container.
    pub license_gated: bool,
}

impl Toolchain {
    /// The FreeSurfer toolchain. Its image refuses to run without a license.
    pub fn freesurfer(config: &ToolchainConfig) -> Self {
        Self {
            name: "FreeSurfer".to_owned(),
            image: config.image.clone(),
            target: config.target,
            license_gated: true,
        }
    }

    /// The dcmqi toolchain.
    pub fn dcmqi(config: &ToolchainConfig) -> Self {
        Self {
            name: "dcmqi".to_owned(),
            image: config.image.clone(),
            target: config.target,
            license_gated: false,
        }
    }

    /// Override the configured target, if `target` is set.
    pub fn with_target(mut self, target: Option<ExecutionTarget>) -> Self {
        if let Some(target) = target {
            self.target = target;
        }
        self
    }
}

/// Errors that stop a run before any command executes.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The container runtime client could not be found on `PATH`.
    #[error(
        "{runtime} is not available on your system, but {toolchain} is set to run in a container. \
         Either install docker (https://docs.docker.com/install/), \
         or run {toolchain} commands locally (using the 'local' option)"
    )]
    EnvironmentUnavailable {
        /// Toolchain that wanted a container.
        toolchain: String,
        /// Name of the runtime client that was looked up.
        runtime: String,
    },
    /// A license gated toolchain was asked to run without a license.
    #[error(
        "Path to the {toolchain} license file is needed! \
         Pass it with the --fs-license-key flag, \
         or set the environment variable {}",
        LICENSE_PATH_ENV
    )]
    CredentialMissing {
        /// Toolchain that needs the license.
        toolchain: String,
    },
    /// The license file was given but could not be read.
    #[error("failed to read license file {}", path.display())]
    CredentialUnreadable {
        /// Path that was given.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Settings the dispatcher needs, fixed for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// How to reach Docker.
    pub docker: DockerConfig,
    /// Name of the container environment variable carrying the license.
    pub license_env: String,
    /// Working directory for commands, on the host and inside containers.
    pub working_dir: PathBuf,
}

impl DispatchConfig {
    /// Derive the dispatch settings from the loaded config, working in the current
    /// directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            docker: config.docker.clone(),
            license_env: config.license.env.clone(),
            working_dir: std::env::current_dir().context("failed to read current directory")?,
        })
    }
}

/// Per-invocation inputs for a container run.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// File whose group ownership the container inherits.
    pub reference: PathBuf,
    /// Host directories the commands need.
    pub volumes: VolumeMap,
}

/// Status of one command in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// The command that ran.
    pub command: CommandSpec,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i64>,
}

impl CommandOutcome {
    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Statuses of every command an executor ran, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// One entry per command.
    pub commands: Vec<CommandOutcome>,
}

impl RunOutcome {
    /// Whether every command succeeded.
    pub fn success(&self) -> bool {
        self.commands.iter().all(CommandOutcome::success)
    }

    /// Commands that did not succeed.
    pub fn failures(&self) -> impl Iterator<Item = &CommandOutcome> {
        self.commands.iter().filter(|c| !c.success())
    }

    /// Append the outcomes of a later batch.
    pub fn extend(&mut self, other: RunOutcome) {
        self.commands.extend(other.commands)
    }
}

/// Runs a batch of commands, one after the other.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run every command in `batch` in order.
    async fn run(&self, batch: &[CommandSpec]) -> Result<RunOutcome>;
}

/// Gatekeeper for running toolchains, see the [module docs](self).
pub struct Dispatcher {
    config: DispatchConfig,
    license: Option<String>,
}

impl Dispatcher {
    /// Check that every toolchain in `toolchains` can run, and encode `license` when a
    /// license gated toolchain runs in a container. Otherwise `license` is never read.
    ///
    /// Nothing is executed here; on error no command has run.
    pub fn prepare<'a, I>(
        config: DispatchConfig,
        toolchains: I,
        license: Option<&Path>,
    ) -> Result<Self, DispatchError>
    where
        I: IntoIterator<Item = &'a Toolchain>,
    {
        let mut needs_license = false;
        for toolchain in toolchains {
            if toolchain.target != ExecutionTarget::Container {
                continue;
            }
            if find_runtime(&config.docker).is_none() {
                return Err(DispatchError::EnvironmentUnavailable {
                    toolchain: toolchain.name.clone(),
                    runtime: config.docker.client.clone(),
                });
            }
            if toolchain.license_gated {
                if license.is_none() {
                    return Err(DispatchError::CredentialMissing {
                        toolchain: toolchain.name.clone(),
                    });
                }
                needs_license = true;
            }
        }

        let license = license
            .filter(|_| needs_license)
            .map(|path| {
                LicenseMaterial::read(path)
                    .map(|l| l.encode())
                    .map_err(|source| DispatchError::CredentialUnreadable {
                        path: path.to_owned(),
                        source,
                    })
            })
            .transpose()?;

        tracing::debug!(license = license.is_some(), "preconditions checked");
        Ok(Self { config, license })
    }

    /// Environment variables injected into `toolchain`'s containers.
    pub fn environment(&self, toolchain: &Toolchain) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        if toolchain.license_gated {
            if let Some(license) = &self.license {
                env.insert(self.config.license_env.clone(), license.clone());
            }
        }
        env
    }

    /// Build the executor for running `toolchain` for `invocation`.
    pub fn executor(
        &self,
        toolchain: &Toolchain,
        invocation: &Invocation,
    ) -> Result<Box<dyn Executor>> {
        match toolchain.target {
            ExecutionTarget::Local => Ok(Box::new(LocalExecutor::new(&self.config.working_dir))),
            ExecutionTarget::Container => {
                let mut volumes = invocation.volumes.clone();
                volumes.mirror(&self.config.working_dir);

                let run = ContainerRunConfig {
                    image: toolchain.image.clone(),
                    pull: self.config.docker.pull,
                    volumes,
                    user: OwnershipToken::for_file(&invocation.reference)?,
                    environment: self.environment(toolchain),
                    working_dir: self.config.working_dir.clone(),
                };
                tracing::debug!(
                    toolchain = ?toolchain.name,
                    run = ?RedactedRun(&run),
                    "container run config"
                );
                Ok(Box::new(ContainerExecutor::new(self.config.docker.clone(), run)))
            }
        }
    }

    /// Run `batch` with `toolchain`.
    pub async fn run(
        &self,
        toolchain: &Toolchain,
        invocation: &Invocation,
        batch: &[CommandSpec],
    ) -> Result<RunOutcome> {
        tracing::info!(
            toolchain = ?toolchain.name,
            target = ?toolchain.target,
            "running toolchain"
        );
        self.executor(toolchain, invocation)?.run(batch).await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("license", &self.license.is_some())
            .finish()
    }
}

/// Debug view of a run config with environment values hidden.
struct RedactedRun<'a>(&'a ContainerRunConfig);

impl std::fmt::Debug for RedactedRun<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerRunConfig")
            .field("image", &self.0.image)
            .field("pull", &self.0.pull)
            .field("volumes", &self.0.volumes)
            .field("user", &self.0.user.to_string())
            .field("environment", &self.0.environment.keys().collect::<Vec<_>>())
            .field("working_dir", &self.0.working_dir)
            .finish()
    }
}
