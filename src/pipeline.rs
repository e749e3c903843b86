// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.
//

//! The aseg to DICOM SEG workflow, as an ordered list of toolchain stages.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::{
    commands::{abs_dirname, build_resample_command, build_segmentation_command, CommandSpec},
    dispatch::{Dispatcher, Invocation, RunOutcome, Toolchain},
    docker::VolumeMap,
};

/// Default file name of the resampled aseg, written next to the DICOM SEG output.
pub const RESAMPLED_ASEG_NAME: &str = "aseg_resampled.mgz";

/// One toolchain and the commands it runs.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Toolchain running the commands.
    pub toolchain: Toolchain,
    /// Commands, in order.
    pub commands: Vec<CommandSpec>,
    /// File whose group the outputs should share.
    pub reference: PathBuf,
    /// Every path the commands read or write.
    pub paths: Vec<PathBuf>,
}

impl Stage {
    /// Resample `aseg` into the space of `t1_dicom`.
    pub fn resample(toolchain: Toolchain, aseg: &Path, t1_dicom: &Path, output: &Path) -> Self {
        Self {
            toolchain,
            commands: vec![build_resample_command(aseg, t1_dicom, output)],
            reference: aseg.to_owned(),
            paths: vec![aseg.to_owned(), t1_dicom.to_owned(), output.to_owned()],
        }
    }

    /// Encode `resampled_aseg` as a DICOM SEG referencing the series of `t1_dicom`.
    pub fn segmentation(
        toolchain: Toolchain,
        resampled_aseg: &Path,
        metadata: &Path,
        t1_dicom: &Path,
        output: &Path,
    ) -> Self {
        Self {
            toolchain,
            commands: vec![build_segmentation_command(
                resampled_aseg,
                metadata,
                t1_dicom,
                output,
            )],
            reference: resampled_aseg.to_owned(),
            paths: vec![
                resampled_aseg.to_owned(),
                metadata.to_owned(),
                t1_dicom.to_owned(),
                output.to_owned(),
            ],
        }
    }

    /// Use `reference` for group ownership instead of the stage's own input.
    pub fn with_reference<P: Into<PathBuf>>(mut self, reference: P) -> Self {
        self.reference = reference.into();
        self
    }

    /// The directories to mount so that every path in the commands resolves the same way
    /// inside a container.
    pub fn volumes(&self) -> VolumeMap {
        let mut volumes = VolumeMap::default();
        for path in &self.paths {
            volumes.mirror(abs_dirname(path));
        }
        volumes
    }

    fn invocation(&self) -> Invocation {
        Invocation {
            reference: self.reference.clone(),
            volumes: self.volumes(),
        }
    }
}

/// Paths for the full aseg to DICOM SEG conversion.
#[derive(Debug, Clone)]
pub struct SegPaths {
    /// FreeSurfer aseg volume.
    pub aseg: PathBuf,
    /// Any file of the T1w DICOM series.
    pub t1_dicom: PathBuf,
    /// dcmqi metadata schema mapping labels to anatomy.
    pub metadata: PathBuf,
    /// Output DICOM SEG file.
    pub output: PathBuf,
    /// Intermediate resampled aseg. Defaults to [`RESAMPLED_ASEG_NAME`] next to `output`.
    pub resampled: Option<PathBuf>,
}

impl SegPaths {
    /// Where the resampled aseg is written.
    pub fn resampled(&self) -> PathBuf {
        match &self.resampled {
            Some(p) => p.clone(),
            None => self
                .output
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(RESAMPLED_ASEG_NAME),
        }
    }
}

/// An ordered list of stages.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Resample the aseg with FreeSurfer, then convert it to DICOM SEG with dcmqi.
    pub fn aseg_to_dicom_seg(freesurfer: Toolchain, dcmqi: Toolchain, paths: &SegPaths) -> Self {
        let resampled = paths.resampled();
        Self::new()
            .stage(Stage::resample(
                freesurfer,
                &paths.aseg,
                &paths.t1_dicom,
                &resampled,
            ))
            .stage(
                Stage::segmentation(
                    dcmqi,
                    &resampled,
                    &paths.metadata,
                    &paths.t1_dicom,
                    &paths.output,
                )
                .with_reference(&paths.aseg),
            )
    }

    /// The stages, in order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// The toolchains of every stage, for precondition checks.
    pub fn toolchains(&self) -> impl Iterator<Item = &Toolchain> {
        self.stages.iter().map(|s| &s.toolchain)
    }

    /// Every command, in the order they run.
    pub fn commands(&self) -> impl Iterator<Item = &CommandSpec> {
        self.stages.iter().flat_map(|s| s.commands.iter())
    }

    /// Run each stage in order. A stage whose commands fail does not stop later stages;
    /// the combined outcome reports every command.
    pub async fn run(&self, dispatcher: &Dispatcher) -> Result<RunOutcome> {
        let mut outcome = RunOutcome::default();
        for stage in &self.stages {
            let stage_outcome = dispatcher
                .run(&stage.toolchain, &stage.invocation(), &stage.commands)
                .await?;
            if !stage_outcome.success() {
                tracing::warn!(toolchain = ?stage.toolchain.name, "stage finished with failures");
            }
            outcome.extend(stage_outcome);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DockerConfig;
    use crate::dispatch::{DispatchConfig, ExecutionTarget};
    use tracing_test::traced_test;

    fn toolchain(name: &str, target: ExecutionTarget) -> Toolchain {
        Toolchain {
            name: name.to_owned(),
            image: format!("{}:test", name),
            target,
            license_gated: name == "FreeSurfer",
        }
    }

    fn paths() -> SegPaths {
        SegPaths {
            aseg: PathBuf::from("/subjects/bert/mri/aseg.mgz"),
            t1_dicom: PathBuf::from("/dicom/bert/t1/IM0001.dcm"),
            metadata: PathBuf::from("/opt/hearth/aseg-dicom-seg-metadata.json"),
            output: PathBuf::from("/out/bert/aseg.dcm"),
            resampled: None,
        }
    }

    #[test]
    fn test_aseg_to_dicom_seg_commands() {
        let pipeline = Pipeline::aseg_to_dicom_seg(
            toolchain("FreeSurfer", ExecutionTarget::Container),
            toolchain("dcmqi", ExecutionTarget::Local),
            &paths(),
        );

        let commands: Vec<_> = pipeline.commands().map(CommandSpec::as_str).collect();
        assert_eq!(
            commands,
            vec![
                "mri_vol2vol --mov /subjects/bert/mri/aseg.mgz --targ /dicom/bert/t1/IM0001.dcm \
                 --regheader --nearest --o /out/bert/aseg_resampled.mgz",
                "itkimage2segimage --inputDICOMDirectory /dicom/bert/t1 \
                 --inputMetadata /opt/hearth/aseg-dicom-seg-metadata.json \
                 --inputImageList /out/bert/aseg_resampled.mgz \
                 --outputDICOM /out/bert/aseg.dcm --skip",
            ]
        );

        let names: Vec<_> = pipeline.toolchains().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["FreeSurfer", "dcmqi"]);

        // Both stages take their group from the original aseg.
        for stage in pipeline.stages() {
            assert_eq!(stage.reference, PathBuf::from("/subjects/bert/mri/aseg.mgz"));
        }
    }

    #[test]
    fn test_explicit_resampled_path() {
        let explicit = SegPaths {
            resampled: Some(PathBuf::from("/scratch/r.mgz")),
            ..paths()
        };
        assert_eq!(explicit.resampled(), PathBuf::from("/scratch/r.mgz"));

        let bare = SegPaths {
            output: PathBuf::from("seg.dcm"),
            ..paths()
        };
        assert_eq!(bare.resampled(), PathBuf::from(RESAMPLED_ASEG_NAME));
    }

    #[test]
    fn test_stage_volumes() {
        let stage = Stage::segmentation(
            toolchain("dcmqi", ExecutionTarget::Container),
            Path::new("/out/bert/aseg_resampled.mgz"),
            Path::new("/opt/hearth/meta.json"),
            Path::new("/dicom/bert/t1/IM0001.dcm"),
            Path::new("/out/bert/aseg.dcm"),
        );
        assert_eq!(
            stage.volumes().binds(),
            vec![
                "/dicom/bert/t1:/dicom/bert/t1:rw".to_owned(),
                "/opt/hearth:/opt/hearth:rw".to_owned(),
                "/out/bert:/out/bert:rw".to_owned(),
            ]
        );
    }

    #[test]
    #[traced_test]
    fn test_file_under_root_mounts_nothing_for_root() {
        let stage = Stage::resample(
            toolchain("FreeSurfer", ExecutionTarget::Container),
            Path::new("/aseg.mgz"),
            Path::new("/dicom/t1.dcm"),
            Path::new("/out/r.mgz"),
        );
        assert_eq!(
            stage.volumes().binds(),
            vec!["/dicom:/dicom:rw".to_owned(), "/out:/out:rw".to_owned()]
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_local_stages_run_best_effort() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = Stage {
            toolchain: toolchain("first", ExecutionTarget::Local),
            commands: vec![CommandSpec::new("false")],
            reference: dir.path().to_owned(),
            paths: vec![],
        };
        let second = Stage {
            toolchain: toolchain("second", ExecutionTarget::Local),
            commands: vec![CommandSpec::new("touch second-ran")],
            reference: dir.path().to_owned(),
            paths: vec![],
        };
        let pipeline = Pipeline::new().stage(first).stage(second);

        let config = DispatchConfig {
            docker: DockerConfig::default(),
            license_env: "FS_KEY".to_owned(),
            working_dir: dir.path().to_owned(),
        };
        let dispatcher = Dispatcher::prepare(config, pipeline.toolchains(), None)
            .expect("local stages have no preconditions");

        let outcome = pipeline.run(&dispatcher).await.expect("pipeline should run");
        assert_eq!(outcome.commands.len(), 2);
        assert_eq!(outcome.failures().count(), 1);
        assert!(dir.path().join("second-ran").exists());
    }
}
