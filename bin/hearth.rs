// SPDX-License-Identifier: Apache-2.0
//
// Hearth  FreeSurfer aseg to DICOM SEG
// Copyright (c) 2026  The Hearth Authors
//
// October 19, 2026  The Hearth Authors  Created this.
//

use anyhow::Result;
use clap::Parser;
use hearth::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments.
    let args = Cli::parse();

    // Initialize the "tracing" logger.
    hearth::logging::init(&args)?;

    // We want to log panics in debug mode, but produce a human panic message in release.
    log_panics::init();
    human_panic::setup_panic!();

    tracing::debug!(args = ?&args, "cli args");

    // After parsing arguments, we can consume them and run the corresponding subcommand.
    match args.run().await {
        Ok(()) => Ok(()),
        // Log fatal errors along with their causes before they reach stderr.
        Err(e) => {
            let errs: Vec<_> = e.chain().skip(1).map(|e| e.to_string()).collect();
            tracing::error!(err = &*e.to_string(), caused_by = ?errs, "fatal error");
            Err(e)
        }
    }
}
