// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OpenEFT: EFT fingerprint submission generator and editor
//
// Entry point. Initialises logging, loads configuration, and dispatches the
// requested subcommand to the service layer.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use openeft_core::error::{EftError, Result};
use openeft_core::human_errors::humanize_error;
use openeft_core::types::FingerPosition;
use openeft_imaging::processor::load_capture;

use openeft_app::services::card::CardService;
use openeft_app::services::data_dir;
use openeft_app::services::editor::{
    EditorService, parse_assignments, parse_display_assignments,
};
use openeft_app::services::generator::{Capture, EftService, GenerateRequest};

/// Generate, inspect and edit ANSI/NIST-ITL EFT fingerprint submissions.
#[derive(Parser)]
#[command(name = "openeft", version)]
struct Cli {
    /// JSON configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a new submission from demographics and captures.
    Generate {
        /// Demographic field, e.g. `2.018=DOE, JOHN`
        #[arg(long = "field", value_name = "TAG=VALUE")]
        fields: Vec<String>,
        /// Capture image, e.g. `13=right_slap.png`
        #[arg(long = "image", value_name = "POS=PATH", required = true)]
        images: Vec<String>,
        /// Output file or directory (defaults to `<tcn>.eft` here)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Override the configured size ceiling
        #[arg(long)]
        max_bytes: Option<u64>,
        /// Leave the SSN field empty
        #[arg(long)]
        bypass_ssn: bool,
        /// Two-digit TCN sequence instead of a random one
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=99))]
        sequence: Option<u8>,
    },
    /// Print every field of an existing file.
    Inspect {
        file: PathBuf,
        /// Emit the field map as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change fields of an existing file.
    Edit {
        file: PathBuf,
        /// Raw value to store in the first record of the tag's type; an
        /// empty value removes the field
        #[arg(long = "set", value_name = "TAG=VALUE", required_unless_present = "edits_at")]
        edits: Vec<String>,
        /// As `--set`, addressed by record index as `inspect --json` prints it
        #[arg(long = "set-at", value_name = "[INDEX] TAG=VALUE")]
        edits_at: Vec<String>,
        /// Write here instead of overwriting the input
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Lay out an FD-258 fingerprint card as PDF.
    Fd258 {
        /// Demographic field, e.g. `2.018=DOE, JOHN`
        #[arg(long = "field", value_name = "TAG=VALUE")]
        fields: Vec<String>,
        /// Capture image, e.g. `1=right_thumb.png`
        #[arg(long = "image", value_name = "POS=PATH")]
        images: Vec<String>,
        #[arg(long, default_value = "fd258.pdf")]
        out: PathBuf,
        /// Leave the SSN block empty
        #[arg(long)]
        bypass_ssn: bool,
    },
    /// Write the embedded images to separate files.
    Extract {
        file: PathBuf,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("OpenEFT starting");

    if let Err(err) = run(Cli::parse()) {
        let human = humanize_error(&err);
        eprintln!("error: {}", human.message);
        eprintln!("  {}", human.suggestion);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            fields,
            images,
            out,
            max_bytes,
            bypass_ssn,
            sequence,
        } => {
            let config = data_dir::load_config(cli.config.as_deref())?;
            let max_bytes = max_bytes.unwrap_or(config.max_bytes);
            let service = EftService::new(config)?;
            let fields = parse_assignments(&fields)?;
            let captures = images
                .iter()
                .map(|arg| parse_capture(arg))
                .collect::<Result<Vec<_>>>()?;
            let request = GenerateRequest {
                sequence,
                bypass_ssn,
                ..GenerateRequest::today()
            };

            let generated = service.generate_with(&fields, &captures, max_bytes, &request)?;
            let path = match out {
                Some(dir) if dir.is_dir() => dir.join(&generated.file_name),
                Some(file) => file,
                None => PathBuf::from(&generated.file_name),
            };
            std::fs::write(&path, &generated.bytes)?;
            let quality = generated
                .quality
                .map_or_else(|| "uncompressed".to_string(), |q| format!("quality {q}"));
            println!(
                "{} ({} bytes, {quality}) sha256 {}",
                path.display(),
                generated.bytes.len(),
                generated.sha256
            );
        }
        Command::Inspect { file, json } => {
            let editor = EditorService::new();
            let transaction = editor.load_file(&file)?;
            if json {
                println!("{}", editor.display_json(&transaction)?);
            } else {
                print!("{}", editor.text_dump(&transaction));
            }
        }
        Command::Edit {
            file,
            edits,
            edits_at,
            out,
        } => {
            let editor = EditorService::new();
            let edits = parse_assignments(&edits)?;
            let edits_at = parse_display_assignments(&edits_at)?;
            let transaction = editor.load_file(&file)?;
            let transaction = editor.update_fields(transaction, &edits)?;
            let transaction = editor.update_display_fields(transaction, &edits_at)?;
            let target = out.unwrap_or_else(|| file.clone());
            let sha256 = editor.save(&transaction, &target)?;
            println!("{} sha256 {sha256}", target.display());
        }
        Command::Fd258 {
            fields,
            images,
            out,
            bypass_ssn,
        } => {
            let config = data_dir::load_config(cli.config.as_deref())?;
            let fields = parse_assignments(&fields)?;
            let captures = images
                .iter()
                .map(|arg| parse_capture(arg))
                .collect::<Result<Vec<_>>>()?;
            let request = GenerateRequest {
                capture_date: chrono::Local::now().date_naive(),
                sequence: None,
                bypass_ssn,
            };
            let bytes = CardService::new(config).render(&fields, &captures, &request)?;
            std::fs::write(&out, &bytes)?;
            println!("{} ({} bytes)", out.display(), bytes.len());
        }
        Command::Extract { file, out_dir } => {
            let editor = EditorService::new();
            let transaction = editor.load_file(&file)?;
            for path in editor.extract_to(&transaction, &out_dir)? {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

/// `POS=PATH` to a normalised capture.
fn parse_capture(arg: &str) -> Result<Capture> {
    let (position, path) = arg.split_once('=').ok_or_else(|| {
        EftError::InvalidConfig(format!("image '{arg}' is not of the form POS=PATH"))
    })?;
    let position = position
        .trim()
        .parse::<u8>()
        .ok()
        .and_then(FingerPosition::new)
        .ok_or_else(|| {
            EftError::InvalidConfig(format!("'{position}' is not a finger position (0-15)"))
        })?;
    Ok(Capture {
        position,
        image: load_capture(Path::new(path))?,
    })
}
