// sslprobe - SSL/TLS server analyzer
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use sslprobe::report::{generate_json, generate_text, write_json_file, write_text_file};
use sslprobe::{Args, Prober};
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

async fn run(args: Args) -> Result<()> {
    let config = args.to_config()?;
    let mut report = Prober::new(config)?.run().await?;
    report.show_pem = args.output.certs;

    if args.output.text_to_stdout() {
        let color = std::io::stdout().is_terminal();
        print!("{}", generate_text(&report, color)?);
    } else if let Some(path) = &args.output.text {
        write_text_file(&report, path)?;
    }
    if args.json_to_stdout() {
        println!("{}", generate_json(&report, true)?);
    } else if let Some(path) = &args.output.json {
        write_json_file(&report, path, true)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();

    // Initialize logging - respect RUST_LOG environment variable, -v forces DEBUG
    let log_level = if args.output.verbose {
        Level::DEBUG
    } else {
        std::env::var("RUST_LOG")
            .ok()
            .and_then(|s| s.parse::<Level>().ok())
            .unwrap_or(Level::INFO)
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "ERROR:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
