// Output configuration arguments
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use clap::Args;
use std::path::PathBuf;

/// Report destinations and logging
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Write the text report to FILE ("-" for standard output)
    #[arg(long = "text", value_name = "FILE")]
    pub text: Option<PathBuf>,

    /// Write the JSON report to FILE ("-" for standard output)
    #[arg(long = "json", value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Include certificates in PEM format
    #[arg(long = "certs")]
    pub certs: bool,

    /// Hex dump of all exchanged bytes to FILE
    #[arg(long = "log", value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl OutputArgs {
    /// Text goes to standard output when nothing else is requested
    pub fn text_to_stdout(&self) -> bool {
        match (&self.text, &self.json) {
            (Some(path), _) => path.as_os_str() == "-",
            (None, None) => true,
            (None, Some(_)) => false,
        }
    }
}
