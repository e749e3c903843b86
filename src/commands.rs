// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.
//

//! Builders for the FreeSurfer and dcmqi command lines that Hearth runs.
//!
//! Everything in here is pure string formatting. Paths are never checked for existence;
//! a bad path only shows up once the external tool runs.

use std::{
    borrow::Cow,
    fmt::Display,
    path::{Component, Path, PathBuf},
};

use anyhow::{Context as _, Result};

/// A single command line for an external tool, stored as one shell-style string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandSpec(String);

impl CommandSpec {
    /// Wrap an already formatted command line.
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self(command.into())
    }

    /// Split the command line into argv-style tokens using POSIX shell quoting rules.
    pub fn tokens(&self) -> Result<Vec<String>> {
        let tokens = shell_words::split(&self.0)
            .with_context(|| format!("failed to tokenize command `{}`", self.0))?;
        if tokens.is_empty() {
            anyhow::bail!("command is empty");
        }
        Ok(tokens)
    }

    /// The command line as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CommandSpec {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the `mri_vol2vol` command that moves `aseg` into the voxel space of
/// `t1_reference` with nearest neighbour interpolation, writing to `output`.
pub fn build_resample_command<A, T, O>(aseg: A, t1_reference: T, output: O) -> CommandSpec
where
    A: AsRef<Path>,
    T: AsRef<Path>,
    O: AsRef<Path>,
{
    CommandSpec(format!(
        "mri_vol2vol --mov {} --targ {} --regheader --nearest --o {}",
        quote(aseg.as_ref()),
        quote(t1_reference.as_ref()),
        quote(output.as_ref()),
    ))
}

/// Build the `itkimage2segimage` command that encodes `resampled_aseg` as a DICOM SEG.
///
/// The DICOM series directory handed to dcmqi is the directory containing
/// `t1_reference`, see [`abs_dirname`].
pub fn build_segmentation_command<R, M, T, O>(
    resampled_aseg: R,
    metadata: M,
    t1_reference: T,
    output: O,
) -> CommandSpec
where
    R: AsRef<Path>,
    M: AsRef<Path>,
    T: AsRef<Path>,
    O: AsRef<Path>,
{
    let dicom_dir = abs_dirname(t1_reference);
    CommandSpec(format!(
        "itkimage2segimage --inputDICOMDirectory {} --inputMetadata {} --inputImageList {} --outputDICOM {} --skip",
        quote(&dicom_dir),
        quote(metadata.as_ref()),
        quote(resampled_aseg.as_ref()),
        quote(output.as_ref()),
    ))
}

/// Absolute path of the directory containing `path`.
///
/// A leading `~` is expanded, relative paths are anchored at the current directory, and
/// `.`/`..` components are removed lexically. Symlinks are left alone and the filesystem
/// is never touched beyond reading the current directory.
pub fn abs_dirname<P: AsRef<Path>>(path: P) -> PathBuf {
    let absolute = absolute(path.as_ref());
    match absolute.parent() {
        Some(parent) => parent.to_owned(),
        // Only the root has no parent.
        None => absolute,
    }
}

/// Lexically absolute, user-expanded form of `path`.
pub(crate) fn absolute(path: &Path) -> PathBuf {
    let expanded = expand_user(path);
    let anchored = if expanded.is_absolute() {
        expanded
    } else {
        // An unreadable cwd leaves the path relative, mirroring what the tool would see.
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(expanded),
            Err(e) => {
                tracing::warn!(err = ?e, "failed to read current directory");
                expanded
            }
        }
    };
    normalize(&anchored)
}

fn expand_user(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
        None => path.to_owned(),
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root.
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Paths are interpolated as given, unless they hold whitespace, quotes or backslashes,
/// which would otherwise split or mangle the argument when the line is tokenized.
fn quote(path: &Path) -> Cow<'_, str> {
    let s = path.to_string_lossy();
    let needs_quoting = s
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '\\'));
    if !needs_quoting {
        return s;
    }
    Cow::Owned(shell_words::quote(&s).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_command_scenario() {
        let cmd = build_resample_command("aseg.mgz", "t1.dcm", "resampled.mgz");
        assert_eq!(
            cmd.as_str(),
            "mri_vol2vol --mov aseg.mgz --targ t1.dcm --regheader --nearest --o resampled.mgz"
        );
    }

    #[test]
    fn test_resample_command_flag_order() {
        let cmd = build_resample_command("/in/aseg.mgz", "../t1/IM0001", "~/out.mgz");
        let tokens = cmd.tokens().expect("should tokenize");
        assert_eq!(
            tokens,
            vec![
                "mri_vol2vol",
                "--mov",
                "/in/aseg.mgz",
                "--targ",
                "../t1/IM0001",
                "--regheader",
                "--nearest",
                "--o",
                "~/out.mgz",
            ]
        );
    }

    #[test]
    fn test_resample_command_keeps_paths_verbatim() {
        let cmd = build_resample_command("~/subj/aseg.mgz", "t1=a.dcm", "out%1.mgz");
        assert_eq!(
            cmd.as_str(),
            "mri_vol2vol --mov ~/subj/aseg.mgz --targ t1=a.dcm --regheader --nearest --o out%1.mgz"
        );
        assert_eq!(cmd.tokens().expect("should tokenize")[2], "~/subj/aseg.mgz");
    }

    #[test]
    fn test_segmentation_command_absolute_reference() {
        let cmd = build_segmentation_command(
            "resampled.mgz",
            "schema.json",
            "/data/subj01/dicom/t1.dcm",
            "seg.dcm",
        );
        assert_eq!(
            cmd.as_str(),
            "itkimage2segimage --inputDICOMDirectory /data/subj01/dicom \
             --inputMetadata schema.json --inputImageList resampled.mgz \
             --outputDICOM seg.dcm --skip"
        );
    }

    #[test]
    fn test_segmentation_command_relative_reference() {
        let cwd = std::env::current_dir().expect("cwd");
        let cmd = build_segmentation_command("r.mgz", "m.json", "./scan/../dicom/t1.dcm", "o.dcm");
        let tokens = cmd.tokens().expect("should tokenize");
        assert_eq!(tokens[1], "--inputDICOMDirectory");
        assert_eq!(PathBuf::from(&tokens[2]), cwd.join("dicom"));
        assert_eq!(tokens.last().map(String::as_str), Some("--skip"));
    }

    #[test]
    fn test_segmentation_command_home_reference() {
        let home = PathBuf::from(shellexpand::tilde("~").as_ref());
        let cmd = build_segmentation_command("r.mgz", "m.json", "~/data/scan/t1.dcm", "o.dcm");
        let tokens = cmd.tokens().expect("should tokenize");
        assert_eq!(PathBuf::from(&tokens[2]), home.join("data").join("scan"));
    }

    #[test]
    fn test_abs_dirname() {
        assert_eq!(abs_dirname("/a/b/c.dcm"), PathBuf::from("/a/b"));
        assert_eq!(abs_dirname("/a/./b/../c.dcm"), PathBuf::from("/a"));
        assert_eq!(abs_dirname("/c.dcm"), PathBuf::from("/"));
        assert_eq!(abs_dirname("/"), PathBuf::from("/"));
        assert_eq!(abs_dirname("/../x"), PathBuf::from("/"));
    }

    #[test]
    fn test_paths_with_spaces_stay_single_tokens() {
        let cmd = build_resample_command("my aseg.mgz", "t1.dcm", "out dir/r.mgz");
        let tokens = cmd.tokens().expect("should tokenize");
        assert_eq!(tokens[2], "my aseg.mgz");
        assert_eq!(tokens[8], "out dir/r.mgz");

        let cmd = build_resample_command("it's.mgz", "t1.dcm", "r.mgz");
        assert_eq!(cmd.tokens().expect("should tokenize")[2], "it's.mgz");
    }

    #[test]
    fn test_empty_command_does_not_tokenize() {
        assert!(CommandSpec::new("   ").tokens().is_err());
        assert!(CommandSpec::new("echo 'unterminated").tokens().is_err());
    }
}
