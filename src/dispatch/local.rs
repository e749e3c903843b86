// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.
//

//! Running commands on the host.

use std::{
    os::unix::process::ExitStatusExt,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use tokio::process::Command;

use super::{CommandOutcome, Executor, RunOutcome};
use crate::commands::CommandSpec;

/// Runs commands as host processes sharing Hearth's stdio.
///
/// A failing command does not stop the batch; its status is recorded and the next command
/// runs anyway.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    working_dir: PathBuf,
}

impl LocalExecutor {
    /// Run commands from `working_dir`.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_owned(),
        }
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn run(&self, batch: &[CommandSpec]) -> Result<RunOutcome> {
        let mut outcome = RunOutcome::default();

        for cmd in batch {
            let argv = cmd.tokens()?;
            tracing::info!(cmd = %cmd, "running command");

            let status = Command::new(&argv[0])
                .args(&argv[1..])
                .current_dir(&self.working_dir)
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .with_context(|| format!("failed to run command `{}`", argv[0]))?;

            if !status.success() {
                match status.code() {
                    Some(code) => tracing::warn!(cmd = %cmd, code, "command failed"),
                    None => {
                        let signal = status.signal();
                        tracing::warn!(cmd = %cmd, signal = ?signal, "command killed by signal")
                    }
                }
            }

            outcome.commands.push(CommandOutcome {
                command: cmd.clone(),
                exit_code: status.code().map(i64::from),
            });
        }

        Ok(outcome)
    }
}
