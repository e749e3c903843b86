// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.
//

//! Host identity used to run containers.

use std::{fmt::Display, os::unix::fs::MetadataExt, path::Path};

use anyhow::{Context as _, Result};
use nix::unistd::getuid;

/// The `uid:gid` a container runs as.
///
/// The UID is the invoking user, but the GID is taken from the group that owns an input
/// file, so outputs end up readable by the same group as the inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipToken {
    /// User ID of the current process.
    pub uid: u32,
    /// Group ID owning the reference file.
    pub gid: u32,
}

impl OwnershipToken {
    /// Compute the token for `reference`.
    pub fn for_file<P: AsRef<Path>>(reference: P) -> Result<Self> {
        let reference = reference.as_ref();
        let metadata = std::fs::metadata(reference).with_context(|| {
            format!("failed to stat reference file {}", reference.display())
        })?;

        Ok(Self {
            uid: getuid().as_raw(),
            gid: metadata.gid(),
        })
    }
}

impl Display for OwnershipToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_format() {
        let f = tempfile::NamedTempFile::new().expect("tempfile");
        let token = OwnershipToken::for_file(f.path()).expect("should stat");

        let s = token.to_string();
        let parts: Vec<_> = s.split(':').collect();
        assert_eq!(parts.len(), 2);
        for part in parts {
            assert!(!part.is_empty());
            assert!(part.chars().all(|c| c.is_ascii_digit()), "{} is not numeric", s);
        }
    }

    #[test]
    fn test_token_uses_file_group() {
        let f = tempfile::NamedTempFile::new().expect("tempfile");
        let token = OwnershipToken::for_file(f.path()).expect("should stat");

        let metadata = std::fs::metadata(f.path()).expect("metadata");
        assert_eq!(token.uid, getuid().as_raw());
        assert_eq!(token.gid, metadata.gid());
    }

    #[test]
    fn test_token_missing_reference() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(OwnershipToken::for_file(dir.path().join("aseg.mgz")).is_err());
    }
}
