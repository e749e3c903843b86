// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.
//

//! This module contains helper functions to set up logging for Hearth.

use crate::cli;
use anyhow::{Context as _, Result};
use clap_derive::ArgEnum;
use std::fmt::Display;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{fmt::SubscriberBuilder, FmtSubscriber};

/// Formatter to use in the logging subscriber.
/// [`Auto`](LoggingFormat::Auto) implies pretty if the target is a TTY, JSON otherwise.
#[derive(Debug, ArgEnum, Clone, Copy, PartialEq, Eq)]
pub enum LoggingFormat {
    /// Implies Json if stderr is a file, else Pretty
    Auto,
    /// Pretty logs log messages on multiple lines
    Pretty,
    /// Human logs in a human-readable format
    Full,
    /// Compact is a more compact version of Full
    Compact,
    /// Json logs in a machine-readable JSON format
    Json,
}

impl Display for LoggingFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl LoggingFormat {
    /// Resolve [`LoggingFormat::Auto`] against whether stderr is a terminal.
    fn resolve(self, stderr_is_tty: bool) -> Self {
        match self {
            LoggingFormat::Auto if stderr_is_tty => LoggingFormat::Pretty,
            LoggingFormat::Auto => LoggingFormat::Json,
            format => format,
        }
    }
}

fn max_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

// It is necessary to split up the builder like this because mutating the formatter
// changes its type. See the beginning of init() for details.
fn builder(args: &cli::Cli) -> SubscriberBuilder {
    let builder = FmtSubscriber::builder();

    // Set verbosity
    let builder = builder.with_max_level(max_level(args.verbose, args.quiet));

    // Set remaining options
    builder
        .with_level(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_thread_names(true)
}

/// Initialize the logger by setting the right subscriber.
pub fn init(args: &cli::Cli) -> Result<()> {
    let format = args.log_format.resolve(atty::is(atty::Stream::Stderr));

    // Setting the formatter mutates the builder's type, so each format gets its own
    // subscriber type.
    match format {
        LoggingFormat::Auto => unreachable!("auto is resolved above"),
        LoggingFormat::Json => tracing::subscriber::set_global_default(
            builder(args).with_writer(std::io::stderr).json().finish(),
        ),
        LoggingFormat::Pretty => tracing::subscriber::set_global_default(
            builder(args).with_writer(std::io::stderr).pretty().finish(),
        ),
        LoggingFormat::Full => tracing::subscriber::set_global_default(
            builder(args).with_writer(std::io::stderr).finish(),
        ),
        LoggingFormat::Compact => tracing::subscriber::set_global_default(
            builder(args).with_writer(std::io::stderr).compact().finish(),
        ),
    }
    .context("setting tracing default has failed")?;

    tracing_log::LogTracer::init().context("failed to initialize tracing compatibility layer")
}
