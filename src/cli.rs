// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.
//

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::{
    config::Config,
    dispatch::{DispatchConfig, Dispatcher, ExecutionTarget, Toolchain},
    logging::LoggingFormat,
    pipeline::{Pipeline, SegPaths, Stage},
};

/// Convert FreeSurfer aseg segmentations to DICOM SEG, running FreeSurfer and dcmqi
/// locally or in Docker.
#[derive(clap_derive::Parser, Debug)]
#[clap(author, version, about)]
pub struct Cli {
    /// Increase log verbosity (repeat for more).
    #[clap(short, long, parse(from_occurrences), global = true)]
    pub verbose: u8,
    /// Silence all logging.
    #[clap(short, long, global = true)]
    pub quiet: bool,
    /// Log format.
    #[clap(long, arg_enum, default_value = "auto", global = true)]
    pub log_format: LoggingFormat,
    /// Config file to read instead of the default one.
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    /// Check preconditions and print the commands without running them.
    #[clap(long, global = true)]
    pub dry_run: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap_derive::Subcommand, Debug)]
enum Command {
    /// Resample an aseg volume into the voxel space of a T1w DICOM series.
    Resample {
        /// FreeSurfer aseg volume (e.g. aseg.mgz).
        #[clap(long)]
        aseg: PathBuf,
        /// Any file of the T1w DICOM series.
        #[clap(long)]
        t1_dicom: PathBuf,
        /// Output path for the resampled aseg.
        #[clap(long)]
        output: PathBuf,
        #[clap(flatten)]
        freesurfer: FreeSurferArgs,
    },
    /// Encode a resampled aseg as a DICOM SEG.
    DicomSeg {
        /// Aseg already resampled to the T1w DICOM space.
        #[clap(long)]
        resampled_aseg: PathBuf,
        /// dcmqi metadata schema relating aseg labels to anatomy.
        #[clap(long)]
        metadata: PathBuf,
        /// Any file of the T1w DICOM series.
        #[clap(long)]
        t1_dicom: PathBuf,
        /// Output path for the DICOM SEG.
        #[clap(long)]
        output: PathBuf,
        #[clap(flatten)]
        dcmqi: DcmqiArgs,
    },
    /// Resample an aseg and encode it as a DICOM SEG.
    Aseg2dcmseg {
        /// FreeSurfer aseg volume (e.g. aseg.mgz).
        #[clap(long)]
        aseg: PathBuf,
        /// Any file of the T1w DICOM series.
        #[clap(long)]
        t1_dicom: PathBuf,
        /// dcmqi metadata schema relating aseg labels to anatomy.
        #[clap(long)]
        metadata: PathBuf,
        /// Output path for the DICOM SEG.
        #[clap(long)]
        output: PathBuf,
        /// Where to write the intermediate resampled aseg. Defaults to
        /// aseg_resampled.mgz next to the output.
        #[clap(long)]
        resampled: Option<PathBuf>,
        #[clap(flatten)]
        freesurfer: FreeSurferArgs,
        #[clap(flatten)]
        dcmqi: DcmqiArgs,
    },
}

#[derive(clap_derive::Args, Debug)]
struct FreeSurferArgs {
    /// Where to run FreeSurfer. Defaults to the configured target.
    #[clap(long, arg_enum)]
    freesurfer_type: Option<ExecutionTarget>,
    /// FreeSurfer license file, required when FreeSurfer runs in Docker.
    #[clap(long, env = "FS_LICENSE_KEY")]
    fs_license_key: Option<PathBuf>,
}

#[derive(clap_derive::Args, Debug)]
struct DcmqiArgs {
    /// Where to run dcmqi. Defaults to the configured target.
    #[clap(long, arg_enum)]
    dcmqi_type: Option<ExecutionTarget>,
}

impl Cli {
    /// Run the selected subcommand.
    pub async fn run(self) -> Result<()> {
        let config = Config::load(self.config.as_deref()).context("failed to load config")?;
        tracing::debug!(config = ?config, "hearth config");

        let (pipeline, license) = self.command.plan(&config);

        let dispatch_config = DispatchConfig::from_config(&config)?;
        let dispatcher =
            Dispatcher::prepare(dispatch_config, pipeline.toolchains(), license.as_deref())?;

        if self.dry_run {
            for stage in pipeline.stages() {
                for cmd in &stage.commands {
                    println!("[{:?}] {}", stage.toolchain.target, cmd);
                }
            }
            return Ok(());
        }

        let outcome = pipeline.run(&dispatcher).await?;
        let failed: Vec<_> = outcome.failures().map(|c| c.command.to_string()).collect();
        if !failed.is_empty() {
            anyhow::bail!("{} command(s) did not succeed: {:?}", failed.len(), failed);
        }

        Ok(())
    }
}

impl Command {
    fn plan(&self, config: &Config) -> (Pipeline, Option<PathBuf>) {
        match self {
            Command::Resample {
                aseg,
                t1_dicom,
                output,
                freesurfer,
            } => {
                let fs = Toolchain::freesurfer(&config.freesurfer)
                    .with_target(freesurfer.freesurfer_type);
                let pipeline = Pipeline::new().stage(Stage::resample(fs, aseg, t1_dicom, output));
                (pipeline, freesurfer.fs_license_key.clone())
            }
            Command::DicomSeg {
                resampled_aseg,
                metadata,
                t1_dicom,
                output,
                dcmqi,
            } => {
                let dcmqi = Toolchain::dcmqi(&config.dcmqi).with_target(dcmqi.dcmqi_type);
                let pipeline = Pipeline::new().stage(Stage::segmentation(
                    dcmqi,
                    resampled_aseg,
                    metadata,
                    t1_dicom,
                    output,
                ));
                (pipeline, None)
            }
            Command::Aseg2dcmseg {
                aseg,
                t1_dicom,
                metadata,
                output,
                resampled,
                freesurfer,
                dcmqi,
            } => {
                let paths = SegPaths {
                    aseg: aseg.clone(),
                    t1_dicom: t1_dicom.clone(),
                    metadata: metadata.clone(),
                    output: output.clone(),
                    resampled: resampled.clone(),
                };
                let fs = Toolchain::freesurfer(&config.freesurfer)
                    .with_target(freesurfer.freesurfer_type);
                let dcmqi = Toolchain::dcmqi(&config.dcmqi).with_target(dcmqi.dcmqi_type);
                let pipeline = Pipeline::aseg_to_dicom_seg(fs, dcmqi, &paths);
                (pipeline, freesurfer.fs_license_key.clone())
            }
        }
    }
}
