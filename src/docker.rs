// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.

//! Hearth's interaction with the Docker API.

mod container;
mod image;
pub mod util;

pub use container::{run_to_completion, ContainerOutput, ContainerRunConfig, VolumeMap};
pub use image::ImagePullPolicy;
