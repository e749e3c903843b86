// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.
//

//! Packaging of the FreeSurfer license for use inside a container.
//!
//! The FreeSurfer image reads its license from an environment variable holding the
//! base64 encoded license file, the same value `base64 -w 0 license.txt` produces.

use std::{io, path::Path};

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Raw bytes of a license file. Only ever held in memory.
pub struct LicenseMaterial {
    bytes: Vec<u8>,
}

impl LicenseMaterial {
    /// Read the whole license file at `path`.
    pub fn read<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self { bytes })
    }

    /// Encode the license as padded, unwrapped standard base64.
    pub fn encode(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

impl From<Vec<u8>> for LicenseMaterial {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

// Keep the license out of logs.
impl std::fmt::Debug for LicenseMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseMaterial")
            .field("len", &self.bytes.len())
            .finish()
    }
}
