// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.
//

//! The library behind the `hearth` binary: builds the FreeSurfer and dcmqi command lines
//! for turning an aseg into a DICOM SEG, and runs them either on the host or in Docker.

#![deny(missing_docs)]

mod cli;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod docker;
pub mod host;
pub mod license;
pub mod logging;
pub mod pipeline;
mod testutils;

pub use cli::Cli;
